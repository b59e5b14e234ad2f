//! Workspace facade crate.
//!
//! Re-exports the pipeline crates so a host can depend on
//! `snapshot-pipeline-workspace` and pick the bundled providers through the
//! `s3` and `spotify` features instead of wiring each crate individually.

pub use core_library;
pub use core_storage;
pub use core_sync;

#[cfg(feature = "s3")]
pub use provider_s3;

#[cfg(feature = "spotify")]
pub use provider_spotify;
