//! Google Drive API client.

use async_trait::async_trait;
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{header, Client, StatusCode};
use std::sync::Arc;

use vaultdrive_common::{Error, Result};

use super::api::{ByteStream, DriveApi, DriveFile, FileList, NewFile};
use super::auth::TokenManager;
use super::query::Term;

/// Google Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Google Drive upload API base URL.
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Fields requested for single-file responses.
const FILE_FIELDS: &str =
    "id,name,mimeType,size,createdTime,modifiedTime,parents,md5Checksum,version,trashed";
/// Fields requested for search responses.
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType)";

/// Multipart boundary for create uploads.
const BOUNDARY: &str = "VaultDriveBoundary";

/// Characters escaped when a file ID is placed in a URL path.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Google Drive API client.
pub struct DriveClient {
    http: Client,
    token_manager: Arc<TokenManager>,
}

impl DriveClient {
    /// Create a new Drive client.
    ///
    /// # Errors
    /// - `Network` if the HTTP client cannot be built
    pub fn new(token_manager: Arc<TokenManager>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("VaultDrive/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            token_manager,
        })
    }

    /// Get authorization header.
    async fn auth_header(&self) -> Result<String> {
        let token = self.token_manager.get_access_token().await?;
        Ok(format!("Bearer {}", token))
    }

    /// Handle API response with error checking.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(status_error(status, &body))
        }
    }
}

/// Build the URL for one file resource.
fn file_url(base: &str, file_id: &str) -> String {
    format!(
        "{}/files/{}",
        base,
        utf8_percent_encode(file_id, PATH_SEGMENT)
    )
}

/// Map a non-success status to an error.
fn status_error(status: StatusCode, body: &str) -> Error {
    match status {
        StatusCode::NOT_FOUND => Error::NotFound("Resource not found".to_string()),
        StatusCode::UNAUTHORIZED => Error::Authentication("Invalid or expired token".to_string()),
        StatusCode::FORBIDDEN => Error::PermissionDenied("Access denied".to_string()),
        _ => Error::Network(format!("API error: {} - {}", status, body)),
    }
}

/// Assemble a `multipart/related` body: JSON metadata part, then content.
fn multipart_body(metadata_json: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata_json.len() + data.len() + 256);

    // Metadata part
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json.as_bytes());
    body.extend_from_slice(b"\r\n");

    // Data part
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{}--", BOUNDARY).as_bytes());
    body
}

#[async_trait]
impl DriveApi for DriveClient {
    async fn get_file(&self, file_id: &str) -> Result<DriveFile> {
        let url = file_url(DRIVE_API_BASE, file_id);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("fields", FILE_FIELDS)])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to get file: {}", e)))?;

        self.handle_response(response).await
    }

    async fn list_files(&self, query: &Term) -> Result<FileList> {
        let url = format!("{}/files", DRIVE_API_BASE);
        let auth = self.auth_header().await?;
        let q = query.to_query();

        tracing::debug!(query = %q, "Listing Drive files");

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("q", q.as_str()), ("fields", LIST_FIELDS)])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to list files: {}", e)))?;

        self.handle_response(response).await
    }

    async fn download_stream(&self, file_id: &str) -> Result<ByteStream> {
        let url = file_url(DRIVE_API_BASE, file_id);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to start download: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let stream = response
            .bytes_stream()
            .map(|result| result.map_err(|e| Error::Network(format!("Stream read error: {}", e))));

        Ok(Box::pin(stream))
    }

    async fn create_file(&self, file: &NewFile, data: Vec<u8>) -> Result<DriveFile> {
        let url = format!("{}/files", DRIVE_UPLOAD_BASE);
        let auth = self.auth_header().await?;

        let metadata_json = serde_json::to_string(file)
            .map_err(|e| Error::Serialization(format!("Failed to serialize metadata: {}", e)))?;

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", BOUNDARY),
            )
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .body(multipart_body(&metadata_json, &data))
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to create file: {}", e)))?;

        self.handle_response(response).await
    }

    async fn update_file(&self, file_id: &str, data: Vec<u8>) -> Result<DriveFile> {
        let url = file_url(DRIVE_UPLOAD_BASE, file_id);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .patch(&url)
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .query(&[("uploadType", "media"), ("fields", FILE_FIELDS)])
            .body(data)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to update file: {}", e)))?;

        self.handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url_encodes_id() {
        assert_eq!(
            file_url(DRIVE_API_BASE, "1AbC-d_e"),
            "https://www.googleapis.com/drive/v3/files/1AbC-d_e"
        );
        assert_eq!(
            file_url(DRIVE_API_BASE, "a/b?c"),
            "https://www.googleapis.com/drive/v3/files/a%2Fb%3Fc"
        );
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, ""),
            Error::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, ""),
            Error::Authentication(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, ""),
            Error::PermissionDenied(_)
        ));

        match status_error(StatusCode::INTERNAL_SERVER_ERROR, "backend error") {
            Error::Network(message) => assert!(message.contains("backend error")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_body(r#"{"name":"a.kdbx"}"#, b"DATA");
        let text = String::from_utf8(body).unwrap();

        let metadata_at = text.find(r#"{"name":"a.kdbx"}"#).unwrap();
        let data_at = text.find("DATA").unwrap();
        assert!(metadata_at < data_at);
        assert!(text.starts_with("--VaultDriveBoundary\r\n"));
        assert!(text.ends_with("--VaultDriveBoundary--"));
    }
}
