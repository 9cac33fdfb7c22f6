//! Thin typed client for the Dropbox HTTP API v2.
//!
//! RPC endpoints live on the api host and exchange JSON bodies; content
//! endpoints live on the content host and carry their argument in the
//! `Dropbox-API-Arg` header with raw bytes in the body. Retry, backoff and
//! deadline policy are left to the HTTP client defaults.

pub mod models;

use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Body, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::auth::TokenProvider;
use crate::error::{ConnectorError, Result};
use models::{
    ApiErrorBody, CreateFolderArg, CreateFolderResult, DeleteArg, DownloadArg, EntryMetadata,
    FileEntry, FolderEntry, GetMetadataArg, ListFolderArg, ListFolderContinueArg, ListFolderPage,
    MetadataResult, RelocationArg, UploadArg, WriteMode,
};

/// Default host for RPC endpoints
pub const DEFAULT_API_BASE: &str = "https://api.dropboxapi.com";
/// Default host for upload/download endpoints
pub const DEFAULT_CONTENT_BASE: &str = "https://content.dropboxapi.com";

/// Stream type for downloaded file content
pub type BodyStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Typed Dropbox API client.
///
/// Dropping the client releases the underlying HTTP connection pool; it is
/// the only resource this crate holds open.
pub struct DropboxClient {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    api_base: String,
    content_base: String,
}

impl DropboxClient {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        api_base: Option<String>,
        content_base: Option<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            tokens,
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            content_base: content_base.unwrap_or_else(|| DEFAULT_CONTENT_BASE.to_string()),
        })
    }

    /// Fetch entry metadata for a path.
    pub async fn get_metadata(&self, path: &str) -> Result<EntryMetadata> {
        self.rpc("get_metadata", &GetMetadataArg { path }).await
    }

    /// Download a file, returning its metadata and a body stream.
    pub async fn download(&self, path: &str) -> Result<(FileEntry, BodyStream)> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/2/files/download", self.content_base);
        let arg = escape_api_arg(&serde_json::to_string(&DownloadArg { path })?);
        trace!(path, "download");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .header("Dropbox-API-Arg", arg)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::api_error(status, response).await);
        }

        let metadata: FileEntry = response
            .headers()
            .get("Dropbox-API-Result")
            .and_then(|v| v.to_str().ok())
            .map(serde_json::from_str)
            .transpose()?
            .ok_or_else(|| ConnectorError::Api {
                status: status.as_u16(),
                summary: "download response missing Dropbox-API-Result header".to_string(),
            })?;

        Ok((metadata, Box::pin(response.bytes_stream())))
    }

    /// Upload a body to a path with the given write mode.
    pub async fn upload(&self, path: &str, mode: WriteMode, body: Body) -> Result<FileEntry> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/2/files/upload", self.content_base);
        let arg = UploadArg {
            path,
            mode,
            autorename: false,
            mute: false,
        };
        let arg = escape_api_arg(&serde_json::to_string(&arg)?);
        trace!(path, ?mode, "upload");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .header("Dropbox-API-Arg", arg)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await?;

        Self::decode_json(response).await
    }

    /// Relocate an entry; the provider moves files and folders atomically.
    pub async fn move_entry(&self, from_path: &str, to_path: &str) -> Result<EntryMetadata> {
        let arg = RelocationArg {
            from_path,
            to_path,
            autorename: false,
        };
        let result: MetadataResult = self.rpc("move_v2", &arg).await?;
        Ok(result.metadata)
    }

    /// Delete an entry; for folders the provider removes the whole subtree.
    pub async fn delete(&self, path: &str) -> Result<EntryMetadata> {
        let result: MetadataResult = self.rpc("delete_v2", &DeleteArg { path }).await?;
        Ok(result.metadata)
    }

    /// Create a folder.
    pub async fn create_folder(&self, path: &str) -> Result<FolderEntry> {
        let arg = CreateFolderArg {
            path,
            autorename: false,
        };
        let result: CreateFolderResult = self.rpc("create_folder_v2", &arg).await?;
        Ok(result.metadata)
    }

    /// Fetch the first page of a folder listing.
    pub async fn list_folder(&self, path: &str, recursive: bool) -> Result<ListFolderPage> {
        let arg = ListFolderArg {
            path,
            recursive,
            include_deleted: false,
        };
        self.rpc("list_folder", &arg).await
    }

    /// Fetch the next page for a continuation cursor.
    pub async fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderPage> {
        self.rpc("list_folder/continue", &ListFolderContinueArg { cursor })
            .await
    }

    async fn rpc<A, T>(&self, endpoint: &str, arg: &A) -> Result<T>
    where
        A: Serialize,
        T: DeserializeOwned,
    {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/2/files/{}", self.api_base, endpoint);
        trace!(endpoint, "rpc");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(arg)
            .send()
            .await?;

        Self::decode_json(response).await
    }

    async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::api_error(status, response).await)
        }
    }

    /// Map a non-success response to the error taxonomy.
    async fn api_error(status: StatusCode, response: Response) -> ConnectorError {
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::UNAUTHORIZED {
            return ConnectorError::Auth(format!("provider rejected credentials: {}", body));
        }

        let summary = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.error_summary)
            .unwrap_or(body);

        classify(status.as_u16(), summary)
    }
}

/// Classify a provider error summary into the taxonomy.
///
/// Summaries are slash-delimited tag paths, e.g. "path/not_found/.." or
/// "path/conflict/folder/". Anything unrecognized passes through untouched
/// as an API fault.
fn classify(status: u16, summary: String) -> ConnectorError {
    if summary.contains("not_found") {
        ConnectorError::NotFound(summary)
    } else if summary.contains("conflict") {
        ConnectorError::AlreadyExists(summary)
    } else {
        ConnectorError::Api { status, summary }
    }
}

/// Escape a JSON string for use in the `Dropbox-API-Arg` header.
///
/// Header values must be visible ASCII; non-ASCII characters are emitted
/// as \uXXXX escapes (surrogate pairs for astral code points), which the
/// provider decodes as JSON.
fn escape_api_arg(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut buf = [0u16; 2];
    for c in raw.chars() {
        if c.is_ascii() && !c.is_ascii_control() {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut buf) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}
