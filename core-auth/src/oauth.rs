//! OAuth 2.0 Client-Credentials Grant
//!
//! Exchanges a `(client_id, client_secret)` pair for a short-lived access
//! token (RFC 6749 §4.4). The client authenticates with HTTP Basic auth and
//! posts `grant_type=client_credentials` as a form body.
//!
//! # Security
//!
//! Client secrets and issued tokens never appear in log lines; only the
//! client id is recorded.
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::ClientCredentialsFlow;
//! use bridge_traits::catalog::CredentialPair;
//! use std::sync::Arc;
//!
//! # async fn example() -> core_auth::Result<()> {
//! # use bridge_traits::http::HttpClient;
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let flow = ClientCredentialsFlow::new("https://accounts.spotify.com/api/token", http_client);
//! let token = flow.request_token(&CredentialPair::new("id", "secret")).await?;
//! println!("expires at {}", token.expires_at);
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::AccessToken;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bridge_traits::catalog::CredentialPair;
use bridge_traits::http::{HttpClient, HttpRequest, RetryPolicy};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Client-credentials token exchange against one token endpoint.
pub struct ClientCredentialsFlow {
    token_url: String,
    http_client: Arc<dyn HttpClient>,
}

impl ClientCredentialsFlow {
    pub fn new(token_url: impl Into<String>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            token_url: token_url.into(),
            http_client,
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Request a fresh token for `credentials`.
    ///
    /// One attempt only; retrying is the caller's decision.
    ///
    /// # Errors
    ///
    /// - `Configuration` when the pair is incomplete
    /// - `RateLimited` on HTTP 429
    /// - `AuthenticationFailed` on any other non-2xx status
    /// - `NetworkError` when the request cannot be sent
    #[instrument(skip(self, credentials), fields(client_id = %credentials.client_id))]
    pub async fn request_token(&self, credentials: &CredentialPair) -> Result<AccessToken> {
        if !credentials.is_complete() {
            return Err(AuthError::Configuration(format!(
                "credential pair for client {} is incomplete",
                credentials.client_id
            )));
        }

        let body = serde_urlencoded::to_string([("grant_type", "client_credentials")])
            .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))?;

        let request = HttpRequest::post(self.token_url.clone())
            .header("Authorization", basic_auth_header(credentials))
            .form_body(body)
            .timeout(Duration::from_secs(30));

        let issued_at = Utc::now();
        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::no_retry())
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if response.is_rate_limited() {
            let retry_after_seconds = response
                .header("Retry-After")
                .and_then(|v| v.trim().parse().ok());
            warn!(?retry_after_seconds, "Token endpoint rate limited the request");
            return Err(AuthError::RateLimited {
                retry_after_seconds,
            });
        }

        if !response.is_success() {
            let status = response.status;
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            warn!(status, error = %error_body, "Token request rejected");

            return Err(AuthError::AuthenticationFailed {
                client_id: credentials.client_id.clone(),
                reason: format!("Token endpoint returned {}: {}", status, error_body),
            });
        }

        let token_response: TokenResponse = response
            .json()
            .map_err(|e| AuthError::Other(format!("Failed to parse token response: {}", e)))?;

        debug!(
            expires_in = token_response.expires_in,
            "Obtained access token"
        );

        Ok(AccessToken::new(
            token_response.access_token,
            token_response.expires_in,
            issued_at,
        ))
    }
}

fn basic_auth_header(credentials: &CredentialPair) -> String {
    let raw = format!("{}:{}", credentials.client_id, credentials.client_secret);
    format!("Basic {}", STANDARD.encode(raw))
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::HttpResponse;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn execute_with_retry(&self, request: HttpRequest, policy: RetryPolicy) -> BridgeResult<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str, headers: &[(&str, &str)]) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[tokio::test]
    async fn test_request_token_success() {
        let mut http = MockHttpClient::new();
        http.expect_execute_with_retry()
            .times(1)
            .withf(|request, policy| {
                policy.max_attempts == 1
                    && request.url == "https://auth.example.com/token"
                    && request.headers.get("Authorization").map(String::as_str)
                        == Some("Basic aWQ6c2VjcmV0")
                    && request.body == Some(Bytes::from("grant_type=client_credentials"))
            })
            .returning(|_, _| {
                Ok(response(
                    200,
                    r#"{"access_token":"tok","token_type":"Bearer","expires_in":3600}"#,
                    &[],
                ))
            });

        let flow = ClientCredentialsFlow::new("https://auth.example.com/token", Arc::new(http));
        let token = flow
            .request_token(&CredentialPair::new("id", "secret"))
            .await
            .unwrap();

        assert_eq!(token.value, "tok");
        assert!(!token.is_expired(Utc::now()));
    }

    #[tokio::test]
    async fn test_request_token_rate_limited() {
        let mut http = MockHttpClient::new();
        http.expect_execute_with_retry()
            .returning(|_, _| Ok(response(429, "", &[("retry-after", "4")])));

        let flow = ClientCredentialsFlow::new("https://auth.example.com/token", Arc::new(http));
        let result = flow.request_token(&CredentialPair::new("id", "secret")).await;

        assert!(matches!(
            result,
            Err(AuthError::RateLimited {
                retry_after_seconds: Some(4)
            })
        ));
    }

    #[tokio::test]
    async fn test_request_token_rejected() {
        let mut http = MockHttpClient::new();
        http.expect_execute_with_retry()
            .returning(|_, _| Ok(response(400, r#"{"error":"invalid_client"}"#, &[])));

        let flow = ClientCredentialsFlow::new("https://auth.example.com/token", Arc::new(http));
        let result = flow.request_token(&CredentialPair::new("id", "secret")).await;

        assert!(matches!(
            result,
            Err(AuthError::AuthenticationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_incomplete_pair_skips_network() {
        let http = MockHttpClient::new();
        let flow = ClientCredentialsFlow::new("https://auth.example.com/token", Arc::new(http));
        let result = flow.request_token(&CredentialPair::new("id", "")).await;

        assert!(matches!(result, Err(AuthError::Configuration(_))));
    }

    #[test]
    fn test_token_response_defaults_expiry() {
        let parsed: TokenResponse = serde_json::from_str(r#"{"access_token":"t"}"#).unwrap();
        assert_eq!(parsed.expires_in, 3600);
    }
}
