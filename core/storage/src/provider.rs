//! Cloud provider trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use vaultdrive_common::{Entity, Result};

/// Persisted per-file metadata, keyed by provider name.
///
/// Each provider owns one key; the rest must be left untouched.
pub type MetadataMap = serde_json::Map<String, serde_json::Value>;

/// Result of a search or listing. Always a single page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    pub entities: Vec<Entity>,
    /// The provider has more results than this page holds.
    pub has_more: bool,
}

/// Content and metadata returned by a load.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub content: Vec<u8>,
    /// Baseline to pass back on the next save.
    pub metadata: MetadataMap,
}

/// Where to create a new file.
#[derive(Debug, Clone)]
pub struct CreateTarget {
    pub name: String,
    /// Folder to create in; the drive root when `None`.
    pub parent: Option<Entity>,
}

/// A newly created file: its handle plus the baseline for the next save.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub entity: Entity,
    pub metadata: MetadataMap,
}

/// Operations the application performs against a cloud drive.
///
/// Every call is an independent request. Any of them may fail with a
/// transport error; `save_entity` may also fail with a version conflict.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Get the provider name, which is also its key in [`MetadataMap`].
    fn name(&self) -> &str;

    /// Find files whose name contains `name`.
    async fn search(&self, name: &str) -> Result<ListResponse>;

    /// List the children of `parent`, or of the drive root.
    async fn list(&self, parent: Option<&Entity>) -> Result<ListResponse>;

    /// Fetch a file's full content and its metadata baseline.
    async fn load_entity(&self, entity: &Entity) -> Result<LoadedFile>;

    /// Replace a file's content.
    ///
    /// # Preconditions
    /// - `previous` is the map returned by the last load or save of this file,
    ///   or `None` to skip the version check
    ///
    /// # Postconditions
    /// - Returns `previous` with this provider's entry replaced
    ///
    /// # Errors
    /// - `Conflict` if the file changed remotely since `previous`
    async fn save_entity(
        &self,
        entity: &Entity,
        data: Vec<u8>,
        previous: Option<&MetadataMap>,
    ) -> Result<MetadataMap>;

    /// Create a new file.
    async fn create_entity(&self, target: &CreateTarget, data: Vec<u8>) -> Result<FileSource>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_response_serialization() {
        let response = ListResponse {
            entities: vec![Entity::file("1", "pwsafe.kdbx")],
            has_more: true,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["has_more"], true);
        assert_eq!(json["entities"][0]["kind"], "file");

        let deserialized: ListResponse = serde_json::from_value(json).unwrap();
        assert_eq!(deserialized, response);
    }
}
