//! Catalog Web API connector
//!
//! Implements [`CatalogClient`] over `GET /v1/artists?ids=...`.
//!
//! # Authentication
//!
//! Every call names the credential pair to use. Access tokens are obtained
//! through the client-credentials grant and cached per client id until shortly
//! before they expire. A 401 drops the cached token so the next call for that
//! pair fetches a fresh one.
//!
//! # Errors
//!
//! HTTP 429 is reported as [`BridgeError::RateLimited`], carrying the
//! `Retry-After` value when the API sends one. The connector never retries on
//! its own; the collector owns the retry policy.

use async_trait::async_trait;
use bridge_traits::catalog::{ArtistMetric, CatalogClient, CredentialPair};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use chrono::Utc;
use core_auth::{AccessToken, ClientCredentialsFlow};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::error::{Result, SpotifyError};
use crate::types::{ArtistsResponse, ErrorResponse};

pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const API_BASE: &str = "https://api.spotify.com/v1";

/// The API rejects more ids than this in one call.
pub const MAX_IDS_PER_REQUEST: usize = 50;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SpotifyCatalogClient {
    http_client: Arc<dyn HttpClient>,
    token_flow: ClientCredentialsFlow,
    api_base: String,
    tokens: Mutex<HashMap<String, AccessToken>>,
}

impl SpotifyCatalogClient {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self::with_endpoints(http_client, TOKEN_URL, API_BASE)
    }

    pub fn with_endpoints(
        http_client: Arc<dyn HttpClient>,
        token_url: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            token_flow: ClientCredentialsFlow::new(token_url, http_client.clone()),
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    pub fn artists_url(&self, ids: &[String]) -> String {
        format!(
            "{}/artists?ids={}",
            self.api_base,
            urlencoding::encode(&ids.join(","))
        )
    }

    /// Cached token for the pair, refreshed when missing or about to expire.
    async fn access_token(&self, credentials: &CredentialPair) -> Result<String> {
        let mut tokens = self.tokens.lock().await;
        if let Some(token) = tokens.get(&credentials.client_id) {
            if !token.is_expired(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        debug!(client_id = %credentials.client_id, "Requesting access token");
        let token = self.token_flow.request_token(credentials).await?;
        let value = token.value.clone();
        tokens.insert(credentials.client_id.clone(), token);
        Ok(value)
    }

    async fn evict_token(&self, client_id: &str) {
        self.tokens.lock().await.remove(client_id);
    }

    pub async fn cached_tokens(&self) -> usize {
        self.tokens.lock().await.len()
    }

    async fn fetch_artists(
        &self,
        credentials: &CredentialPair,
        ids: &[String],
    ) -> Result<Vec<ArtistMetric>> {
        if ids.len() > MAX_IDS_PER_REQUEST {
            return Err(SpotifyError::TooManyIds {
                count: ids.len(),
                max: MAX_IDS_PER_REQUEST,
            });
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let token = self.access_token(credentials).await?;
        let request = HttpRequest::get(self.artists_url(ids))
            .bearer_token(token)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);

        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::no_retry())
            .await?;

        self.check_status(credentials, &response).await?;

        let parsed: ArtistsResponse = response
            .json()
            .map_err(|e| SpotifyError::ParseError(e.to_string()))?;

        Ok(parsed
            .artists
            .into_iter()
            .flatten()
            .map(ArtistMetric::from)
            .collect())
    }

    async fn check_status(&self, credentials: &CredentialPair, response: &HttpResponse) -> Result<()> {
        if response.is_success() {
            return Ok(());
        }

        if response.is_rate_limited() {
            let retry_after_seconds = response
                .header("Retry-After")
                .and_then(|v| v.trim().parse().ok());
            warn!(
                client_id = %credentials.client_id,
                ?retry_after_seconds,
                "Catalog API rate limited the request"
            );
            return Err(SpotifyError::RateLimited {
                retry_after_seconds,
            });
        }

        if response.status == 401 {
            warn!(client_id = %credentials.client_id, "Access token rejected, evicting");
            self.evict_token(&credentials.client_id).await;
            return Err(SpotifyError::Unauthorized {
                client_id: credentials.client_id.clone(),
            });
        }

        let message = match response.json::<ErrorResponse>() {
            Ok(envelope) => envelope.error.message,
            Err(_) => response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string()),
        };
        warn!(status = response.status, error = %message, "Catalog API request failed");
        Err(SpotifyError::ApiError {
            status_code: response.status,
            message,
        })
    }
}

#[async_trait]
impl CatalogClient for SpotifyCatalogClient {
    fn max_ids_per_request(&self) -> usize {
        MAX_IDS_PER_REQUEST
    }

    #[instrument(skip(self, credentials, ids), fields(client_id = %credentials.client_id, ids = ids.len()))]
    async fn get_artists(
        &self,
        credentials: &CredentialPair,
        ids: &[String],
    ) -> BridgeResult<Vec<ArtistMetric>> {
        self.fetch_artists(credentials, ids)
            .await
            .map_err(BridgeError::from)
    }
}
