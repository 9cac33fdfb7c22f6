//! Static token provider for long-lived access tokens.
//!
//! Returns a fixed token string with no refresh logic. Suitable for
//! pre-obtained tokens and for tests.

use async_trait::async_trait;

use super::TokenProvider;
use crate::error::Result;

/// A token provider that returns a fixed access token.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}
