//! # Desktop Bridge Implementations
//!
//! Host-side implementations of bridge traits for the command-line pipeline:
//! - `HttpClient` using `reqwest`
//! - `ConfirmationPrompt` reading answers from standard input
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, StdinConfirmationPrompt};
//! use std::sync::Arc;
//!
//! let http_client = Arc::new(ReqwestHttpClient::new()?);
//! let prompt = StdinConfirmationPrompt::new();
//! ```

mod http;
mod prompt;

pub use http::ReqwestHttpClient;
pub use prompt::{parse_answer, StdinConfirmationPrompt};
