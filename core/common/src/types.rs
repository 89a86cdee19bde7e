//! Common types used throughout VaultDrive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a remote entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    File,
    Directory,
}

/// An addressable remote object.
///
/// Entities are snapshots produced by listing or search and are used as
/// handles for load, save and create. They carry no mutable state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    /// Provider-assigned identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// File or directory.
    pub kind: EntityKind,
}

impl Entity {
    /// Create a file entity.
    pub fn file(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: EntityKind::File,
        }
    }

    /// Create a directory entity.
    pub fn directory(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: EntityKind::Directory,
        }
    }

    /// Check if this is a directory.
    pub fn is_directory(&self) -> bool {
        self.kind == EntityKind::Directory
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Snapshot of a remote file's identity-relevant fields.
///
/// Created on every successful load, save or create and kept by the caller
/// next to its local copy. The `version` token is what the save protocol
/// compares; the remaining fields are for identity and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileMetadata {
    /// Provider file ID.
    pub id: String,
    /// File name.
    pub name: String,
    /// Provider version token. Opaque; compared by value only.
    pub version: String,
    /// MIME type.
    pub mime_type: String,
    /// Last modification time reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,
    /// Size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// MD5 checksum of the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5_checksum: Option<String>,
    /// Parent folder IDs.
    #[serde(default)]
    pub parents: Vec<String>,
}

impl RemoteFileMetadata {
    /// Whether `other` describes the same remote version.
    pub fn same_version(&self, other: &RemoteFileMetadata) -> bool {
        self.version == other.version
    }
}

/// Both sides of a detected lost-update conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionConflict {
    /// What the caller last read.
    pub expected: RemoteFileMetadata,
    /// What the remote holds now.
    pub remote: RemoteFileMetadata,
}

impl fmt::Display for VersionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Remote file '{}' changed: expected version {}, found version {}",
            self.remote.name, self.expected.version, self.remote.version
        )?;
        if let Some(modified) = self.remote.modified_time {
            write!(f, " (modified {})", modified.to_rfc3339())?;
        }
        Ok(())
    }
}
