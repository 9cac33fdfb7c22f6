//! dropbox-connector: a Dropbox backend for a generic file-system contract
//!
//! This library adapts the Dropbox remote API to a neutral file-system
//! abstraction so callers can treat the object store as a navigable file
//! system.
//!
//! # Architecture
//!
//! - **Contract**: the `StorageConnector` trait plus the `LinkInfo`
//!   snapshot model; this crate is one pluggable backend behind it.
//! - **Connector**: `DropboxConnector` translates each operation into one
//!   provider call (two for guarded deletes) and normalizes responses and
//!   error conditions.
//! - **Client**: a thin typed wrapper over the Dropbox HTTP API v2.
//! - **Auth**: token providers for long-lived access tokens and the
//!   refresh-token flow.
//!
//! # Example
//!
//! ```no_run
//! use dropbox_connector::connector::dropbox::DropboxConnector;
//! use dropbox_connector::connector::StorageConnector;
//!
//! # async fn example() -> dropbox_connector::Result<()> {
//! let connector = DropboxConnector::with_access_token("sl.example")?;
//!
//! // Absence is data, not an error
//! if connector.resolve_link_info("/docs/a.txt").await?.is_none() {
//!     println!("no such entry");
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod connector;
pub mod env;
pub mod error;
pub mod tls;

pub use connector::dropbox::DropboxConnector;
pub use connector::{
    byte_stream, normalize_path, ContentHash, HashAlgorithm, Link, LinkInfo, LinkKind,
    LinkKindFilter, ListChildren, ListOptions, MetadataCapabilities, MetadataUpdate,
    StorageConnector,
};
pub use error::{ConnectorError, Result};
