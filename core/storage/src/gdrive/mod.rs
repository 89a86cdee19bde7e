//! Google Drive storage provider for VaultDrive.
//!
//! This module provides a storage backend using Google Drive with:
//! - OAuth2 authentication with automatic token refresh
//! - A structured query builder for Drive searches
//! - Version-checked saves that refuse to overwrite remote edits

pub mod api;
pub mod auth;
pub mod client;
pub mod metadata;
pub mod provider;
pub mod query;
pub mod versioned;

pub use api::{DriveApi, DriveFile};
pub use auth::{AuthConfig, AuthManager, RefreshCallback, TokenManager, Tokens};
pub use client::DriveClient;
pub use metadata::METADATA_KEY;
pub use provider::{create_gdrive_provider, GDriveConfig, GDriveProvider};
pub use query::{LiteralValue, Operator, QueryAtom, Term};
pub use versioned::VersionedStore;
