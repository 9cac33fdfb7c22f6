//! Typed request and response models for the Dropbox HTTP API v2.
//!
//! Only the fields this connector consumes are modeled; unknown fields are
//! ignored on deserialization so additive provider changes stay harmless.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata entry returned by the files endpoints, tagged by kind
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
pub enum EntryMetadata {
    File(FileEntry),
    Folder(FolderEntry),
    /// Tombstone returned by listings that include deleted entries
    Deleted(DeletedEntry),
}

impl EntryMetadata {
    pub fn path(&self) -> &str {
        match self {
            EntryMetadata::File(f) => f.path(),
            EntryMetadata::Folder(d) => d.path(),
            EntryMetadata::Deleted(d) => d.path(),
        }
    }
}

/// File metadata payload
#[derive(Debug, Clone, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub id: Option<String>,
    pub path_lower: Option<String>,
    pub path_display: Option<String>,
    pub client_modified: Option<DateTime<Utc>>,
    pub server_modified: Option<DateTime<Utc>>,
    pub rev: Option<String>,
    pub size: u64,
    pub content_hash: Option<String>,
}

impl FileEntry {
    /// Display path when present, falling back to the lowercased form.
    pub fn path(&self) -> &str {
        self.path_display
            .as_deref()
            .or(self.path_lower.as_deref())
            .unwrap_or(&self.name)
    }
}

/// Folder metadata payload
#[derive(Debug, Clone, Deserialize)]
pub struct FolderEntry {
    pub name: String,
    pub id: Option<String>,
    pub path_lower: Option<String>,
    pub path_display: Option<String>,
}

impl FolderEntry {
    pub fn path(&self) -> &str {
        self.path_display
            .as_deref()
            .or(self.path_lower.as_deref())
            .unwrap_or(&self.name)
    }
}

/// Deleted-entry tombstone
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedEntry {
    pub name: String,
    pub path_lower: Option<String>,
    pub path_display: Option<String>,
}

impl DeletedEntry {
    pub fn path(&self) -> &str {
        self.path_display
            .as_deref()
            .or(self.path_lower.as_deref())
            .unwrap_or(&self.name)
    }
}

/// One page of a folder listing
#[derive(Debug, Clone, Deserialize)]
pub struct ListFolderPage {
    pub entries: Vec<EntryMetadata>,
    pub cursor: String,
    pub has_more: bool,
}

/// Upload write mode: "add" fails on an existing entry, "overwrite"
/// replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    Add,
    Overwrite,
}

#[derive(Debug, Serialize)]
pub struct GetMetadataArg<'a> {
    pub path: &'a str,
}

#[derive(Debug, Serialize)]
pub struct DownloadArg<'a> {
    pub path: &'a str,
}

#[derive(Debug, Serialize)]
pub struct UploadArg<'a> {
    pub path: &'a str,
    pub mode: WriteMode,
    pub autorename: bool,
    pub mute: bool,
}

#[derive(Debug, Serialize)]
pub struct RelocationArg<'a> {
    pub from_path: &'a str,
    pub to_path: &'a str,
    pub autorename: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteArg<'a> {
    pub path: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateFolderArg<'a> {
    pub path: &'a str,
    pub autorename: bool,
}

#[derive(Debug, Serialize)]
pub struct ListFolderArg<'a> {
    pub path: &'a str,
    pub recursive: bool,
    pub include_deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct ListFolderContinueArg<'a> {
    pub cursor: &'a str,
}

/// Wrapper shape shared by move_v2 and delete_v2 responses
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataResult {
    pub metadata: EntryMetadata,
}

/// create_folder_v2 response
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFolderResult {
    pub metadata: FolderEntry,
}

/// Error body the API returns with non-success statuses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error_summary: String,
}

/// oauth2/token response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Token lifetime in seconds from now
    pub expires_in: Option<u64>,
}
