use std::io;
use thiserror::Error;

/// Main error type for connector operations
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("provider error ({status}): {summary}")]
    Api { status: u16, summary: String },

    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("operation not supported: {0}")]
    NotSupported(String),
}

impl ConnectorError {
    /// True for the "entry does not exist" class of provider errors.
    ///
    /// Link resolution downgrades these to an absent result rather than
    /// propagating them.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConnectorError::NotFound(_))
    }

    /// True for the "entry already exists" class of provider errors.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ConnectorError::AlreadyExists(_))
    }
}

/// Result type alias for connector operations
pub type Result<T> = std::result::Result<T, ConnectorError>;
