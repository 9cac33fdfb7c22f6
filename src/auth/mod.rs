//! Token providers for Dropbox authentication
//!
//! Two token sources are supported, matching the two connector
//! construction modes:
//! - a long-lived access token used as-is
//! - a refresh token plus app credentials, exchanged for short-lived
//!   access tokens that are cached and refreshed before expiry

pub mod refresh;
pub mod static_token;

use async_trait::async_trait;

use crate::error::Result;

pub use refresh::RefreshTokenProvider;
pub use static_token::StaticTokenProvider;

/// Source of bearer tokens for provider calls.
///
/// Implementations are object-safe and shared across concurrent
/// operations; any internal caching must be its own concern.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Get a currently valid access token.
    async fn access_token(&self) -> Result<String>;
}
