//! Catalog API Abstraction
//!
//! The external music catalog that supplies artist follower and popularity
//! figures. Authentication is per call: the caller picks a credential pair and
//! the client exchanges it for an access token on its own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// One `(client_id, client_secret)` tuple from the deployment's pool.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CredentialPair {
    pub client_id: String,
    pub client_secret: String,
}

impl CredentialPair {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Both halves present and non-blank.
    pub fn is_complete(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Current metrics for one artist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistMetric {
    pub id: String,
    pub followers: i64,
    pub popularity: i64,
}

/// Catalog client trait
///
/// Implementations must report throttling as
/// [`BridgeError::RateLimited`](crate::error::BridgeError::RateLimited) so the
/// collector can tell it apart from other failures.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Maximum number of ids accepted by one `get_artists` call.
    fn max_ids_per_request(&self) -> usize {
        50
    }

    /// Fetch metrics for `ids`. Unknown ids are omitted from the result.
    async fn get_artists(
        &self,
        credentials: &CredentialPair,
        ids: &[String],
    ) -> Result<Vec<ArtistMetric>>;
}
