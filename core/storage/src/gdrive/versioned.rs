//! Optimistic-concurrency load/save for Drive files.
//!
//! A save either lands on the version the caller last read or fails with
//! [`Error::Conflict`]; it never silently overwrites somebody else's edit.
//! The check is detect-after-the-fact: a write that reaches Drive between our
//! metadata fetch and our upload is not caught.

use futures::StreamExt;
use tracing::{debug, info, warn};

use vaultdrive_common::{Error, RemoteFileMetadata, Result, VersionConflict};

use super::api::{ByteStream, DriveApi, NewFile};

/// Versioned file operations on top of a [`DriveApi`].
pub struct VersionedStore<A> {
    api: A,
}

impl<A: DriveApi> VersionedStore<A> {
    /// Wrap a Drive API implementation.
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// The underlying API.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Fetch a file's content and current metadata.
    ///
    /// The returned metadata is the baseline to pass to the next [`save`](Self::save).
    pub async fn load(&self, file_id: &str) -> Result<(Vec<u8>, RemoteFileMetadata)> {
        debug!(file_id, "Loading file");

        let metadata = self.api.get_file(file_id).await?.to_metadata()?;
        let stream = self.api.download_stream(file_id).await?;
        let content = collect_stream(stream).await?;

        debug!(file_id, version = %metadata.version, bytes = content.len(), "Loaded file");
        Ok((content, metadata))
    }

    /// Replace a file's content, guarded by the caller's last-read version.
    ///
    /// # Preconditions
    /// - `previous`, when given, is the snapshot from the caller's last load or save
    ///
    /// # Postconditions
    /// - On success, returns the metadata of the version just written
    /// - On conflict, nothing was uploaded
    ///
    /// # Errors
    /// - `Conflict` if the remote version differs from `previous`
    /// - Transport errors from the metadata fetch or the upload
    pub async fn save(
        &self,
        file_id: &str,
        data: Vec<u8>,
        previous: Option<&RemoteFileMetadata>,
    ) -> Result<RemoteFileMetadata> {
        match previous {
            None => debug!(file_id, "No previous metadata, uploading without version check"),
            Some(expected) => {
                let remote = self.api.get_file(file_id).await?.to_metadata()?;

                if !expected.same_version(&remote) {
                    warn!(
                        file_id,
                        expected = %expected.version,
                        remote = %remote.version,
                        "Remote file changed since last read"
                    );
                    return Err(Error::Conflict(Box::new(VersionConflict {
                        expected: expected.clone(),
                        remote,
                    })));
                }

                debug!(file_id, version = %remote.version, "Remote version matches");
            }
        }

        let metadata = self.api.update_file(file_id, data).await?.to_metadata()?;

        info!(file_id, version = %metadata.version, "Saved file");
        Ok(metadata)
    }

    /// Create a new file. There is nothing to compare against, so no version check.
    pub async fn create(
        &self,
        name: &str,
        parent_id: Option<&str>,
        data: Vec<u8>,
    ) -> Result<RemoteFileMetadata> {
        let new_file = NewFile::new(name, parent_id);
        let metadata = self.api.create_file(&new_file, data).await?.to_metadata()?;

        info!(file_id = %metadata.id, name, "Created file");
        Ok(metadata)
    }
}

/// Drain a download stream into one buffer, keeping chunk order.
pub async fn collect_stream(mut stream: ByteStream) -> Result<Vec<u8>> {
    let mut content = Vec::new();
    while let Some(chunk) = stream.next().await {
        content.extend_from_slice(&chunk?);
    }
    Ok(content)
}
