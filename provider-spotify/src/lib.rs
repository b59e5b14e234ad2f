//! # Catalog Provider
//!
//! [`CatalogClient`](bridge_traits::catalog::CatalogClient) for the Spotify
//! Web API: batched artist lookups with per-client token caching.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{SpotifyCatalogClient, API_BASE, MAX_IDS_PER_REQUEST, TOKEN_URL};
pub use error::{Result, SpotifyError};
