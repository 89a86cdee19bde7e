//! Common error types for VaultDrive.

use thiserror::Error;

use crate::types::VersionConflict;

/// Top-level error type for VaultDrive operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote service could not be reached or returned an unusable response.
    #[error("Network error: {0}")]
    Network(String),

    /// The remote service rejected our credentials.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The remote service refused access to the resource.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote file changed since the caller last read it.
    #[error("{0}")]
    Conflict(Box<VersionConflict>),

    /// A query literal was built from a value kind the query language cannot express.
    #[error("Unsupported query value kind: {0}")]
    UnsupportedValueKind(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Whether this is a failure talking to the remote service.
    ///
    /// Transport failures are never retried internally; the caller decides
    /// whether to try again. Conflicts are not transport errors.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Network(_)
                | Error::Authentication(_)
                | Error::PermissionDenied(_)
                | Error::NotFound(_)
        )
    }

    /// Conflict details, if this error is a version conflict.
    pub fn as_conflict(&self) -> Option<&VersionConflict> {
        match self {
            Error::Conflict(conflict) => Some(conflict),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
