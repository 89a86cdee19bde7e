//! Cloud storage for VaultDrive.
//!
//! This module lets an application keep its encrypted database on a cloud
//! drive: list and search remote files, load them, and save them back without
//! clobbering edits made elsewhere.
//!
//! # Design Principles
//! - One contract: the application talks to [`CloudProvider`] only
//! - Async operations: All I/O operations are async
//! - Conflict detection, not resolution: a stale save fails and the caller decides
//! - Typed inside, untyped at the edge: the persisted [`MetadataMap`] is
//!   narrowed to a typed snapshot as soon as it enters the provider

pub mod gdrive;
pub mod memory;
pub mod provider;

pub use memory::{DriveCall, MemoryDrive};
pub use provider::{CloudProvider, CreateTarget, FileSource, ListResponse, LoadedFile, MetadataMap};
