//! Google Drive API surface used by the storage layer.
//!
//! [`DriveApi`] is the seam between the versioned save protocol and the
//! transport. [`DriveClient`](super::client::DriveClient) implements it over
//! HTTP; [`MemoryDrive`](crate::memory::MemoryDrive) implements it in memory.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use vaultdrive_common::{Entity, EntityKind, Error, RemoteFileMetadata, Result};

use super::query::Term;

/// MIME type Drive uses to mark folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Alias Drive accepts for the user's root folder.
pub const ROOT_ID: &str = "root";

/// Content stream returned by downloads.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Google Drive file metadata from API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: String,
    /// File name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// File size in bytes (only for files, not folders).
    #[serde(default)]
    pub size: Option<String>,
    /// Created time.
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    /// Modified time.
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
    /// Parent folder IDs.
    #[serde(default)]
    pub parents: Vec<String>,
    /// MD5 checksum (only for files).
    #[serde(default)]
    pub md5_checksum: Option<String>,
    /// Monotonic version number, bumped on every change to the file.
    #[serde(default)]
    pub version: Option<String>,
    /// Trashed status.
    #[serde(default)]
    pub trashed: bool,
}

impl DriveFile {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Get size as u64.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_ref().and_then(|s| s.parse().ok())
    }

    /// Addressing handle for this file.
    pub fn to_entity(&self) -> Entity {
        Entity {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: if self.is_folder() {
                EntityKind::Directory
            } else {
                EntityKind::File
            },
        }
    }

    /// Narrow the API response to the metadata snapshot callers keep.
    ///
    /// # Errors
    /// - `Network` if the response carries no version token
    pub fn to_metadata(&self) -> Result<RemoteFileMetadata> {
        let version = self.version.clone().ok_or_else(|| {
            Error::Network(format!("Drive response for '{}' has no version", self.id))
        })?;

        Ok(RemoteFileMetadata {
            id: self.id.clone(),
            name: self.name.clone(),
            version,
            mime_type: self.mime_type.clone(),
            modified_time: self.modified_time,
            size: self.size_bytes(),
            md5_checksum: self.md5_checksum.clone(),
            parents: self.parents.clone(),
        })
    }
}

/// One page of a `files.list` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Metadata sent when creating a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFile {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

impl NewFile {
    /// Metadata for a file named `name`, optionally inside `parent_id`.
    pub fn new(name: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            name: name.into(),
            parents: parent_id.map(|p| vec![p.to_string()]).unwrap_or_default(),
        }
    }
}

/// Google Drive operations needed by the storage layer.
///
/// Every call is an independent request; implementations hold no state that
/// one call waits on another for.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Get file metadata by ID.
    async fn get_file(&self, file_id: &str) -> Result<DriveFile>;

    /// Run a search and return a single page of results.
    async fn list_files(&self, query: &Term) -> Result<FileList>;

    /// Download file content as a stream of chunks.
    async fn download_stream(&self, file_id: &str) -> Result<ByteStream>;

    /// Create a file with the given metadata and content.
    async fn create_file(&self, file: &NewFile, data: Vec<u8>) -> Result<DriveFile>;

    /// Replace the full content of an existing file.
    async fn update_file(&self, file_id: &str, data: Vec<u8>) -> Result<DriveFile>;
}
