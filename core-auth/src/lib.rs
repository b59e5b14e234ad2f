//! # Authentication Module
//!
//! Credential handling for the external catalog API.
//!
//! ## Overview
//!
//! - [`CredentialRotator`] picks one pair from the configured pool per request
//!   batch: deterministically by hour of day, or uniformly at random as a
//!   fallback when a pair keeps failing.
//! - [`ClientCredentialsFlow`] exchanges a pair for a short-lived bearer
//!   token (OAuth 2.0 client-credentials grant).

pub mod error;
pub mod oauth;
pub mod rotator;
pub mod types;

pub use error::{AuthError, Result};
pub use oauth::ClientCredentialsFlow;
pub use rotator::CredentialRotator;
pub use types::AccessToken;
