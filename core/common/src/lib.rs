//! Common utilities and types shared across VaultDrive modules.
//!
//! This module provides the error taxonomy and the remote-entity types that
//! the storage layer and the CLI exchange.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Entity, EntityKind, RemoteFileMetadata, VersionConflict};
