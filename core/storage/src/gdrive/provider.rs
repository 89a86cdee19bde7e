//! Google Drive provider implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use vaultdrive_common::{Entity, Error, Result};

use crate::provider::{
    CloudProvider, CreateTarget, FileSource, ListResponse, LoadedFile, MetadataMap,
};

use super::api::{DriveApi, ROOT_ID};
use super::auth::{AuthConfig, AuthManager, RefreshCallback, TokenManager, Tokens};
use super::client::DriveClient;
use super::metadata::{read_metadata, write_metadata, METADATA_KEY};
use super::query::Term;
use super::versioned::VersionedStore;

/// Google Drive provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GDriveConfig {
    /// OAuth2 tokens.
    pub tokens: Tokens,
    /// Optional custom OAuth2 configuration.
    #[serde(default)]
    pub auth_config: Option<AuthConfig>,
}

/// Google Drive provider.
///
/// Callers deal in [`MetadataMap`]s; inside, only the typed snapshot is used.
pub struct GDriveProvider<A = DriveClient> {
    store: VersionedStore<A>,
}

impl GDriveProvider<DriveClient> {
    /// Create a provider talking to Google Drive over HTTP.
    ///
    /// `on_refresh` receives the new credential JSON whenever the access
    /// token is refreshed.
    ///
    /// # Errors
    /// - Invalid OAuth configuration
    pub fn new(config: GDriveConfig, on_refresh: Option<RefreshCallback>) -> Result<Self> {
        let auth_config = config.auth_config.clone().unwrap_or_default();
        let auth_manager = AuthManager::new(auth_config)?;

        let mut token_manager = TokenManager::new(auth_manager, config.tokens.clone());
        if let Some(callback) = on_refresh {
            token_manager = token_manager.with_refresh_callback(callback);
        }

        let client = DriveClient::new(Arc::new(token_manager))?;
        Ok(Self::with_api(client))
    }
}

impl<A: DriveApi> GDriveProvider<A> {
    /// Create a provider over any Drive API implementation.
    pub fn with_api(api: A) -> Self {
        Self {
            store: VersionedStore::new(api),
        }
    }

    /// The versioned store doing the actual work.
    pub fn store(&self) -> &VersionedStore<A> {
        &self.store
    }

    async fn query(&self, term: &Term) -> Result<ListResponse> {
        let list = self.store.api().list_files(term).await?;

        Ok(ListResponse {
            entities: list.files.iter().map(|f| f.to_entity()).collect(),
            has_more: list.next_page_token.is_some(),
        })
    }
}

#[async_trait]
impl<A: DriveApi> CloudProvider for GDriveProvider<A> {
    fn name(&self) -> &str {
        METADATA_KEY
    }

    async fn search(&self, name: &str) -> Result<ListResponse> {
        self.query(&Term::name_contains(name)).await
    }

    async fn list(&self, parent: Option<&Entity>) -> Result<ListResponse> {
        let parent_id = parent.map(|p| p.id.as_str()).unwrap_or(ROOT_ID);
        self.query(&Term::children_of(parent_id)).await
    }

    async fn load_entity(&self, entity: &Entity) -> Result<LoadedFile> {
        let (content, metadata) = self.store.load(&entity.id).await?;

        Ok(LoadedFile {
            content,
            metadata: write_metadata(None, &metadata)?,
        })
    }

    async fn save_entity(
        &self,
        entity: &Entity,
        data: Vec<u8>,
        previous: Option<&MetadataMap>,
    ) -> Result<MetadataMap> {
        let expected = match previous {
            Some(map) => read_metadata(map)?,
            None => None,
        };

        let metadata = self.store.save(&entity.id, data, expected.as_ref()).await?;
        write_metadata(previous, &metadata)
    }

    async fn create_entity(&self, target: &CreateTarget, data: Vec<u8>) -> Result<FileSource> {
        let parent_id = target.parent.as_ref().map(|p| p.id.as_str());
        let metadata = self.store.create(&target.name, parent_id, data).await?;

        Ok(FileSource {
            entity: Entity::file(metadata.id.clone(), metadata.name.clone()),
            metadata: write_metadata(None, &metadata)?,
        })
    }
}

/// Create a Google Drive provider from JSON configuration.
pub fn create_gdrive_provider(
    config: serde_json::Value,
    on_refresh: Option<RefreshCallback>,
) -> Result<GDriveProvider> {
    let gdrive_config: GDriveConfig = serde_json::from_value(config)
        .map_err(|e| Error::InvalidInput(format!("Invalid GDrive config: {}", e)))?;

    GDriveProvider::new(gdrive_config, on_refresh)
}
