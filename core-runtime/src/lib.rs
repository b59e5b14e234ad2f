//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by every pipeline crate:
//! - Logging and tracing setup, plus the phase timer used for completion lines
//! - The immutable [`PipelineConfig`](config::PipelineConfig) built once at startup
//!
//! ## Overview
//!
//! Nothing in the pipeline reads the environment on its own. The binary builds
//! a `PipelineConfig` (from the environment or the builder), initializes
//! logging, then hands the relevant settings to each component's constructor.

pub mod config;
pub mod error;
pub mod logging;

pub use config::PipelineConfig;
pub use error::{Error, Result};
