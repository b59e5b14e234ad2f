//! # Bridge Traits
//!
//! Contracts between the snapshot pipeline core and its collaborators.
//!
//! ## Overview
//!
//! The core never talks to a network service, a terminal or the wall clock
//! directly. Each of those is a trait defined here and implemented in a
//! separate crate, so every pipeline stage can be exercised against fakes.
//!
//! ## Traits
//!
//! - [`ObjectStore`](object_store::ObjectStore) - Bucket-addressed blob store (list, get, put, multipart, copy, delete)
//! - [`CatalogClient`](catalog::CatalogClient) - Artist metrics from the external catalog API
//! - [`HttpClient`](http::HttpClient) - Async HTTP used by the catalog provider
//! - [`ConfirmationPrompt`](prompt::ConfirmationPrompt) - Yes/no gate before deletions
//! - [`Clock`](time::Clock) - Time source for deterministic scheduling
//!
//! ## Implementations
//!
//! | Trait | Crate |
//! |-------|-------|
//! | `ObjectStore` | `provider-s3` |
//! | `CatalogClient` | `provider-spotify` |
//! | `HttpClient`, `ConfirmationPrompt` | `bridge-desktop` |
//!
//! ## Error Handling
//!
//! All traits return [`BridgeError`](error::BridgeError). Throttling must be
//! reported as `BridgeError::RateLimited` so callers can distinguish it from
//! other failures.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync` so implementations can be shared across
//! spawned tasks behind an `Arc`.

pub mod catalog;
pub mod error;
pub mod http;
pub mod object_store;
pub mod prompt;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use catalog::{ArtistMetric, CatalogClient, CredentialPair};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use object_store::{CompletedPart, ObjectBody, ObjectStore, ObjectSummary};
pub use prompt::{ConfirmationPrompt, FixedAnswerPrompt};
pub use time::{Clock, FixedClock, LogLevel, SystemClock};
