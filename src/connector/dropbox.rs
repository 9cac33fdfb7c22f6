//! Dropbox connector implementation
//!
//! Translates each file-system operation into one provider call (two for
//! guarded deletes) and normalizes Dropbox metadata and error conditions
//! into the neutral contract. All heavy lifting — transport, pagination
//! mechanics, token refresh — lives in the client and auth layers.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use globset::{Glob, GlobMatcher};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::auth::{RefreshTokenProvider, StaticTokenProvider, TokenProvider};
use crate::client::models::{EntryMetadata, WriteMode};
use crate::client::DropboxClient;
use crate::config::{AuthConfig, DropboxConnectorConfig};
use crate::connector::{
    normalize_path, to_api_path, ByteStream, Link, LinkInfo, LinkKind, ListChildren, ListOptions,
    MetadataCapabilities, MetadataUpdate, StorageConnector,
};
use crate::error::{ConnectorError, Result};
use crate::tls;

/// Dropbox storage connector
pub struct DropboxConnector {
    client: DropboxClient,
}

impl DropboxConnector {
    /// Create a connector from configuration.
    ///
    /// Installs the process-wide transport security hardening before the
    /// client is built, so it precedes the first network call.
    pub fn new(config: DropboxConnectorConfig) -> Result<Self> {
        tls::init_transport_security();

        let tokens: Arc<dyn TokenProvider> = match config.auth {
            AuthConfig::AccessToken { access_token } => {
                Arc::new(StaticTokenProvider::new(access_token))
            }
            AuthConfig::RefreshToken {
                refresh_token,
                app_key,
                app_secret,
            } => Arc::new(RefreshTokenProvider::new(
                refresh_token,
                app_key,
                app_secret,
                config.token_endpoint,
            )),
        };

        let client = DropboxClient::new(tokens, config.api_endpoint, config.content_endpoint)?;
        Ok(Self { client })
    }

    /// Create a connector from a long-lived access token.
    pub fn with_access_token(access_token: impl Into<String>) -> Result<Self> {
        Self::new(DropboxConnectorConfig {
            auth: AuthConfig::AccessToken {
                access_token: access_token.into(),
            },
            api_endpoint: None,
            content_endpoint: None,
            token_endpoint: None,
        })
    }

    /// Create a connector from a refresh token plus app credentials.
    pub fn with_refresh_token(
        refresh_token: impl Into<String>,
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Result<Self> {
        Self::new(DropboxConnectorConfig {
            auth: AuthConfig::RefreshToken {
                refresh_token: refresh_token.into(),
                app_key: app_key.into(),
                app_secret: app_secret.into(),
            },
            api_endpoint: None,
            content_endpoint: None,
            token_endpoint: None,
        })
    }

    /// Tag a live metadata entry by link kind; deleted tombstones have no
    /// link.
    fn link_from(entry: &EntryMetadata) -> Option<Link> {
        match entry {
            EntryMetadata::File(file) => Some(Link::File(file.clone())),
            EntryMetadata::Folder(folder) => Some(Link::Directory(folder.clone())),
            EntryMetadata::Deleted(_) => None,
        }
    }

    fn entry_info(entry: &EntryMetadata) -> Option<LinkInfo> {
        Self::link_from(entry).map(|link| link.info())
    }

    /// Check whether an entry exists at `path` (provider metadata query).
    async fn exists(&self, path: &str) -> Result<bool> {
        match self.client.get_metadata(to_api_path(path)).await {
            Ok(EntryMetadata::Deleted(_)) => Ok(false),
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Collect a folder listing, following continuation cursors until the
    /// provider reports no more pages. Partial listings are a correctness
    /// bug, not an optimization.
    async fn collect_entries(&self, path: &str, recursive: bool) -> Result<Vec<EntryMetadata>> {
        let mut page = self.client.list_folder(to_api_path(path), recursive).await?;
        let mut entries = page.entries;

        while page.has_more {
            page = self.client.list_folder_continue(&page.cursor).await?;
            entries.append(&mut page.entries);
        }

        Ok(entries)
    }

    /// True when the listed entry is the directory's own echo. Dropbox
    /// paths compare case-insensitively.
    fn is_self_entry(dir: &str, entry_path: &str) -> bool {
        dir.eq_ignore_ascii_case(entry_path)
    }

    fn build_matcher(pattern: &str) -> Result<GlobMatcher> {
        Glob::new(pattern)
            .map(|g| g.compile_matcher())
            .map_err(|e| ConnectorError::InvalidPattern(format!("{}: {}", pattern, e)))
    }
}

#[async_trait]
impl StorageConnector for DropboxConnector {
    fn metadata_capabilities(&self) -> MetadataCapabilities {
        // Dropbox has no hidden/read-only flags and no mutable mtime;
        // the corresponding LinkInfo fields are fixed defaults.
        MetadataCapabilities {
            hidden: false,
            read_only: false,
            last_write_time: false,
        }
    }

    async fn resolve_link_info(&self, path: &str) -> Result<Option<LinkInfo>> {
        let path = normalize_path(path);
        trace!(%path, "resolve_link_info");

        if path == "/" {
            return Ok(Some(LinkInfo::root()));
        }

        match self.client.get_metadata(to_api_path(&path)).await {
            Ok(entry) => Ok(Self::entry_info(&entry)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn read_file(
        &self,
        path: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64> {
        let path = normalize_path(path);
        trace!(%path, "read_file");

        let (metadata, mut body) = self.client.download(to_api_path(&path)).await?;
        trace!(size = metadata.size, "download started");

        // Chunk-by-chunk copy; the whole file is never held in memory.
        // The response stream is dropped on any failure, closing the
        // network connection.
        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            sink.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        sink.flush().await?;

        Ok(written)
    }

    async fn write_file(
        &self,
        path: &str,
        content: ByteStream,
        overwrite: bool,
    ) -> Result<LinkInfo> {
        let path = normalize_path(path);
        debug!(%path, overwrite, "write_file");

        // Add semantics unless the target already exists and the caller
        // asked to overwrite it.
        let mode = if overwrite && self.exists(&path).await? {
            WriteMode::Overwrite
        } else {
            WriteMode::Add
        };

        let body = reqwest::Body::wrap_stream(content);
        let file = self.client.upload(to_api_path(&path), mode, body).await?;
        Ok(Link::File(file).info())
    }

    async fn move_file(&self, from: &str, to: &str, overwrite: bool) -> Result<LinkInfo> {
        let from = normalize_path(from);
        let to = normalize_path(to);
        debug!(%from, %to, overwrite, "move_file");

        // The relocation call has no overwrite argument and errors on
        // conflict, so the overwrite intent is honored by clearing the
        // destination first.
        if overwrite && self.exists(&to).await? {
            self.client.delete(to_api_path(&to)).await?;
        }

        let entry = self.client.move_entry(to_api_path(&from), to_api_path(&to)).await?;
        Self::entry_info(&entry)
            .ok_or_else(|| ConnectorError::NotFound(format!("moved entry vanished: {}", to)))
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let path = normalize_path(path);
        debug!(%path, "delete_file");

        // Unconditional: no existence pre-check, provider errors surface
        // as-is.
        self.client.delete(to_api_path(&path)).await?;
        Ok(())
    }

    async fn create_directory(&self, path: &str) -> Result<Option<LinkInfo>> {
        let path = normalize_path(path);
        debug!(%path, "create_directory");

        match self.client.create_folder(to_api_path(&path)).await {
            Ok(folder) => Ok(Some(Link::Directory(folder).info())),
            // Creation racing an existing entry is a non-fatal no-op
            Err(e) if e.is_conflict() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn move_directory(&self, from: &str, to: &str) -> Result<LinkInfo> {
        let from = normalize_path(from);
        let to = normalize_path(to);
        debug!(%from, %to, "move_directory");

        let entry = self.client.move_entry(to_api_path(&from), to_api_path(&to)).await?;
        Self::entry_info(&entry)
            .ok_or_else(|| ConnectorError::NotFound(format!("moved entry vanished: {}", to)))
    }

    async fn delete_directory(&self, path: &str, recursive: bool) -> Result<()> {
        let path = normalize_path(path);
        debug!(%path, recursive, "delete_directory");

        if !recursive {
            // The provider deletes subtrees unconditionally, so POSIX-like
            // emptiness is enforced here, before any deletion call.
            let children = self.collect_entries(&path, false).await?;
            let occupied = children.iter().any(|entry| {
                !matches!(entry, EntryMetadata::Deleted(_))
                    && !Self::is_self_entry(&path, &normalize_path(entry.path()))
            });
            if occupied {
                return Err(ConnectorError::DirectoryNotEmpty(path));
            }
        }

        self.client.delete(to_api_path(&path)).await?;
        Ok(())
    }

    async fn list_children(&self, path: &str, options: &ListOptions) -> Result<ListChildren> {
        let dir = normalize_path(path);
        trace!(%dir, recursive = options.recursive, "list_children");

        let matcher = options
            .pattern
            .as_deref()
            .map(Self::build_matcher)
            .transpose()?;

        let raw = self.collect_entries(&dir, options.recursive).await?;
        let mut entries = Vec::with_capacity(raw.len());

        for entry in &raw {
            let kind = match entry {
                EntryMetadata::File(_) => LinkKind::File,
                EntryMetadata::Folder(_) => LinkKind::Directory,
                EntryMetadata::Deleted(_) => continue,
            };

            let info = match Self::entry_info(entry) {
                Some(info) => info,
                None => continue,
            };

            // Recursive listings echo the base folder itself
            if Self::is_self_entry(&dir, &info.path) {
                continue;
            }

            if !options.kind.matches(kind) {
                continue;
            }

            if let Some(matcher) = &matcher {
                let name = info.path.rsplit('/').next().unwrap_or(&info.path);
                if !matcher.is_match(name) {
                    continue;
                }
            }

            entries.push(info);
        }

        Ok(ListChildren {
            entries,
            recursive_applied: options.recursive,
            pattern_applied: options.pattern.is_some(),
        })
    }

    async fn update_metadata(
        &self,
        path: &str,
        update: &MetadataUpdate,
    ) -> Result<Option<LinkInfo>> {
        // No mutable metadata channel at this provider; re-resolve and
        // return the current snapshot.
        trace!(?update, "update_metadata is a no-op for this provider");
        self.resolve_link_info(path).await
    }
}
