pub mod dropbox;

use std::io;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use tokio::io::AsyncWrite;

use crate::client::models::{FileEntry, FolderEntry};
use crate::error::Result;

/// Link kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    File,
    Directory,
}

/// A named file-system entry at the provider, tagged by kind.
///
/// Each variant carries the provider metadata payload for that kind, so
/// call sites match on the variant instead of type-testing a flat record.
#[derive(Debug, Clone)]
pub enum Link {
    File(FileEntry),
    Directory(FolderEntry),
}

impl Link {
    pub fn kind(&self) -> LinkKind {
        match self {
            Link::File(_) => LinkKind::File,
            Link::Directory(_) => LinkKind::Directory,
        }
    }

    /// Absolute slash-rooted path of the entry.
    pub fn path(&self) -> &str {
        match self {
            Link::File(f) => f.path(),
            Link::Directory(d) => d.path(),
        }
    }

    /// Build the immutable snapshot for this link.
    ///
    /// The provider-native content hash is reported as MD5-compatible at
    /// the interface; hidden and read-only have no provider channel and
    /// stay at their fixed defaults.
    pub fn info(&self) -> LinkInfo {
        match self {
            Link::File(file) => {
                let hash = file.content_hash.as_ref().map(|value| ContentHash {
                    algorithm: HashAlgorithm::Md5,
                    value: value.clone(),
                });
                LinkInfo::file(
                    normalize_path(file.path()),
                    file.size,
                    file.server_modified,
                    hash,
                )
            }
            Link::Directory(folder) => {
                LinkInfo::directory(normalize_path(folder.path()), None)
            }
        }
    }
}

/// Algorithm tag for a content hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// Provider-native hash reported as MD5-compatible at the interface
    Md5,
    Sha1,
    Sha256,
}

/// A content hash together with the algorithm that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHash {
    pub algorithm: HashAlgorithm,
    pub value: String,
}

/// Immutable snapshot of a link's observable state at query time.
///
/// Instances are constructed fresh per call and never cached or mutated.
/// Fields the provider cannot report resolve to `None` (timestamps) or a
/// fixed `false` (hidden, read-only); see [`MetadataCapabilities`].
#[derive(Debug, Clone)]
pub struct LinkInfo {
    /// Absolute slash-rooted path
    pub path: String,
    pub exists: bool,
    pub is_directory: bool,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    /// Always false for this provider
    pub is_hidden: bool,
    /// Always false for this provider
    pub is_read_only: bool,
    /// Content length in bytes; files only
    pub length: Option<u64>,
    /// Content hash; files only
    pub content_hash: Option<ContentHash>,
}

impl LinkInfo {
    /// The synthetic root entry: always exists, always a directory,
    /// never queried from the provider.
    pub fn root() -> Self {
        Self::directory("/".to_string(), None)
    }

    pub fn file(
        path: String,
        length: u64,
        modified: Option<DateTime<Utc>>,
        content_hash: Option<ContentHash>,
    ) -> Self {
        Self {
            path,
            exists: true,
            is_directory: false,
            created: None,
            modified,
            is_hidden: false,
            is_read_only: false,
            length: Some(length),
            content_hash,
        }
    }

    pub fn directory(path: String, modified: Option<DateTime<Utc>>) -> Self {
        Self {
            path,
            exists: true,
            is_directory: true,
            created: None,
            modified,
            is_hidden: false,
            is_read_only: false,
            length: None,
            content_hash: None,
        }
    }

    pub fn is_file(&self) -> bool {
        !self.is_directory
    }
}

/// Kind filter for directory listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkKindFilter {
    Files,
    Directories,
    #[default]
    All,
}

impl LinkKindFilter {
    pub fn matches(self, kind: LinkKind) -> bool {
        match self {
            LinkKindFilter::Files => kind == LinkKind::File,
            LinkKindFilter::Directories => kind == LinkKind::Directory,
            LinkKindFilter::All => true,
        }
    }
}

/// Options for [`StorageConnector::list_children`]
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Enumerate all descendants, not just immediate children
    pub recursive: bool,
    /// Restrict results to one entry kind
    pub kind: LinkKindFilter,
    /// Optional glob pattern matched against entry names
    pub pattern: Option<String>,
}

/// Result of a directory listing.
///
/// `recursive_applied` and `pattern_applied` report whether the requested
/// recursion and pattern filtering were actually honored, so callers never
/// have to guess.
#[derive(Debug, Clone)]
pub struct ListChildren {
    pub entries: Vec<LinkInfo>,
    pub recursive_applied: bool,
    pub pattern_applied: bool,
}

/// Metadata fields a caller may ask the connector to change
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataUpdate {
    pub is_hidden: Option<bool>,
    pub is_read_only: Option<bool>,
    pub last_write_time: Option<DateTime<Utc>>,
}

/// Which metadata fields the connector can faithfully report.
///
/// A `false` flag means the corresponding `LinkInfo` field is a fixed
/// default, not real provider state.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataCapabilities {
    pub hidden: bool,
    pub read_only: bool,
    pub last_write_time: bool,
}

/// Stream type for file content supplied to write operations
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync + 'static>>;

/// Build a one-chunk content stream from an in-memory buffer.
pub fn byte_stream(content: impl Into<Bytes>) -> ByteStream {
    let bytes = content.into();
    Box::pin(futures::stream::once(async move {
        Ok::<_, io::Error>(bytes)
    }))
}

/// Normalize a path to the absolute slash-rooted form the contract requires.
///
/// Already-rooted paths pass through unchanged; anything else gets a "/"
/// prefix. The root "/" normalizes to itself.
pub fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Option-aware variant of [`normalize_path`]: absent stays absent.
pub fn normalize_path_opt(path: Option<&str>) -> Option<String> {
    path.map(normalize_path)
}

/// Map a contract path to the form the Dropbox API expects.
///
/// The provider addresses its root as the empty string, not "/".
pub(crate) fn to_api_path(path: &str) -> &str {
    if path == "/" {
        ""
    } else {
        path
    }
}

/// Core contract for a remote storage backend exposed as a file system.
///
/// Every operation re-fetches state from the provider; nothing here has
/// multi-call lifetime. Operations may be issued concurrently and race at
/// the provider level without any connector-side serialization. Dropping
/// the connector releases the underlying HTTP client exactly once.
#[async_trait]
pub trait StorageConnector: Send + Sync {
    /// Which metadata fields this backend can faithfully report
    fn metadata_capabilities(&self) -> MetadataCapabilities;

    /// Get a snapshot of the entry at `path`.
    ///
    /// Returns `Ok(None)` when no entry exists; absence is a first-class
    /// non-error outcome. The root "/" is answered synthetically with no
    /// provider call.
    async fn resolve_link_info(&self, path: &str) -> Result<Option<LinkInfo>>;

    /// Download the file at `path`, streaming its content into `sink`.
    ///
    /// Content is copied chunk by chunk and never fully materialized in
    /// memory. Returns the number of bytes written to the sink.
    async fn read_file(
        &self,
        path: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64>;

    /// Upload `content` to `path`.
    ///
    /// Write mode is "add" (fails if the entry exists) unless the target
    /// already exists and `overwrite` is set, in which case the mode is
    /// "overwrite". Returns the post-write metadata snapshot.
    async fn write_file(
        &self,
        path: &str,
        content: ByteStream,
        overwrite: bool,
    ) -> Result<LinkInfo>;

    /// Relocate a file at the provider.
    async fn move_file(&self, from: &str, to: &str, overwrite: bool) -> Result<LinkInfo>;

    /// Delete a file unconditionally; no existence pre-check is made.
    async fn delete_file(&self, path: &str) -> Result<()>;

    /// Create a directory.
    ///
    /// Returns `Ok(None)` when the provider reports the folder already
    /// exists or the creation cannot proceed; creation races are a
    /// non-fatal no-op outcome.
    async fn create_directory(&self, path: &str) -> Result<Option<LinkInfo>>;

    /// Relocate a directory at the provider.
    async fn move_directory(&self, from: &str, to: &str) -> Result<LinkInfo>;

    /// Delete a directory.
    ///
    /// When `recursive` is false the connector lists immediate children
    /// first and fails with `DirectoryNotEmpty` before any deletion is
    /// attempted. Otherwise a single provider call removes the subtree.
    async fn delete_directory(&self, path: &str, recursive: bool) -> Result<()>;

    /// List entries under a directory.
    ///
    /// The directory's own echoed entry is excluded from results. Listing
    /// follows provider continuation cursors until exhaustion.
    async fn list_children(&self, path: &str, options: &ListOptions) -> Result<ListChildren>;

    /// Apply a metadata update to the entry at `path`.
    ///
    /// This provider has no mutable metadata channel; the call re-resolves
    /// and returns the current snapshot unchanged.
    async fn update_metadata(
        &self,
        path: &str,
        update: &MetadataUpdate,
    ) -> Result<Option<LinkInfo>>;
}
