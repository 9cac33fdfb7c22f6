//! Refresh-token provider.
//!
//! Exchanges a long-lived refresh token plus app credentials for
//! short-lived access tokens via the oauth2/token endpoint. Tokens are
//! cached and refreshed with a safety buffer before expiry.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::time::Instant;
use tracing::debug;

use super::TokenProvider;
use crate::client::models::TokenResponse;
use crate::error::{ConnectorError, Result};

/// Default token endpoint on the api host
pub const DEFAULT_TOKEN_URL: &str = "https://api.dropboxapi.com/oauth2/token";

/// Buffer time before token expiry to trigger refresh (60 seconds).
const EXPIRY_BUFFER_SECS: u64 = 60;

/// Fallback lifetime when the endpoint omits expires_in.
const DEFAULT_EXPIRES_IN_SECS: u64 = 4 * 60 * 60;

/// Cached access token with expiry tracking.
struct CachedToken {
    token: String,
    fetched_at: Instant,
    expires_in_secs: u64,
}

impl CachedToken {
    /// Check if the token is still valid (with buffer).
    fn is_valid(&self) -> bool {
        let elapsed = self.fetched_at.elapsed().as_secs();
        let effective_expiry = self.expires_in_secs.saturating_sub(EXPIRY_BUFFER_SECS);
        elapsed < effective_expiry
    }
}

/// A token provider backed by the refresh-token OAuth2 grant.
pub struct RefreshTokenProvider {
    http: reqwest::Client,
    token_url: String,
    refresh_token: String,
    app_key: String,
    app_secret: String,
    cached: RwLock<Option<CachedToken>>,
}

impl RefreshTokenProvider {
    pub fn new(
        refresh_token: impl Into<String>,
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        token_url: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: token_url.unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            refresh_token: refresh_token.into(),
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            cached: RwLock::new(None),
        }
    }

    /// Exchange the refresh token for a fresh access token.
    async fn fetch_token(&self) -> Result<(String, u64)> {
        debug!("refreshing access token");

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.as_str()),
            ("client_id", self.app_key.as_str()),
            ("client_secret", self.app_secret.as_str()),
        ];

        let response = self.http.post(&self.token_url).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Auth(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await?;
        let expires_in = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);

        Ok((token.access_token, expires_in))
    }
}

#[async_trait]
impl TokenProvider for RefreshTokenProvider {
    async fn access_token(&self) -> Result<String> {
        {
            let cache = self.cached.read();
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
            }
        }

        let (token, expires_in) = self.fetch_token().await?;

        {
            let mut cache = self.cached.write();
            *cache = Some(CachedToken {
                token: token.clone(),
                fetched_at: Instant::now(),
                expires_in_secs: expires_in,
            });
        }

        Ok(token)
    }
}
