//! Minimal Google Drive v3 client for the upload leg of the pipeline.
//!
//! Only the three calls the service needs exist: multipart file creation,
//! anyone-reader permission grant, and delete (used to roll back a file
//! whose permission grant failed). Endpoints default to production and are
//! overridable for tests.

mod files;
mod permissions;

pub use files::{FilesService, UploadedFile, MAX_MULTIPART_BYTES};
pub use permissions::PermissionsService;

use serde::Deserialize;

use crate::auth::{AccessToken, TOKEN_URL};
use crate::errors::UploadError;

/// Default Drive API base URL.
pub const BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Default Drive upload base URL.
pub const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";

/// MIME type of every uploaded snippet.
pub const SNIPPET_MIME_TYPE: &str = "audio/mpeg";

/// Drive endpoints and destination folder.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// API base URL.
    pub base_url: String,
    /// Upload base URL.
    pub upload_url: String,
    /// OAuth2 token endpoint.
    pub token_url: String,
    /// Destination folder for uploaded snippets.
    pub folder_id: String,
}

impl DriveConfig {
    /// Production endpoints with the given destination folder.
    pub fn new(folder_id: impl Into<String>) -> Self {
        DriveConfig {
            base_url: BASE_URL.to_string(),
            upload_url: UPLOAD_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            folder_id: folder_id.into(),
        }
    }

    /// Overrides the API base URL (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the upload base URL (tests).
    pub fn with_upload_url(mut self, upload_url: impl Into<String>) -> Self {
        self.upload_url = upload_url.into();
        self
    }

    /// Overrides the token endpoint (tests).
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }
}

/// Drive client bound to a shared HTTP connection pool.
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    config: DriveConfig,
}

impl DriveClient {
    /// Creates a client over an existing connection pool.
    pub fn new(http: reqwest::Client, config: DriveConfig) -> Self {
        DriveClient { http, config }
    }

    /// The configured token endpoint.
    pub fn token_url(&self) -> &str {
        &self.config.token_url
    }

    /// File operations.
    pub fn files(&self) -> FilesService<'_> {
        FilesService::new(self)
    }

    /// Permission operations.
    pub fn permissions(&self) -> PermissionsService<'_> {
        PermissionsService::new(self)
    }

    /// Uploads `content` as a publicly readable file and returns its
    /// public content link.
    ///
    /// Creation and the permission grant are two provider calls; if the
    /// second fails (or the create response lacks a link), the file is
    /// rolled back by deletion so no private orphan is left behind. A
    /// failed rollback is logged and never masks the original error.
    pub async fn upload_public(
        &self,
        token: &AccessToken,
        name: &str,
        content: bytes::Bytes,
    ) -> Result<String, UploadError> {
        let file = self.files().create(token, name, content).await?;
        tracing::info!(file_id = %file.id, name, "file created");

        let link = match file.web_content_link {
            Some(link) => link,
            None => {
                self.roll_back(token, &file.id).await;
                return Err(UploadError::MissingLink);
            }
        };

        if let Err(err) = self.permissions().make_public(token, &file.id).await {
            tracing::warn!(file_id = %file.id, %err, "permission grant failed, rolling back");
            self.roll_back(token, &file.id).await;
            return Err(err);
        }

        Ok(link)
    }

    async fn roll_back(&self, token: &AccessToken, file_id: &str) {
        if let Err(err) = self.files().delete(token, file_id).await {
            tracing::warn!(file_id, %err, "rollback delete failed; private file left behind");
        }
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn config(&self) -> &DriveConfig {
        &self.config
    }
}

/// Error document returned by the provider on failed calls.
#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    message: String,
}

/// Extracts the provider's error message from a failed response body,
/// falling back to the raw text.
pub(crate) async fn provider_message(response: reqwest::Response) -> String {
    let raw = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ProviderError>(&raw) {
        Ok(parsed) => parsed.error.message,
        Err(_) => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_production_endpoints() {
        let config = DriveConfig::new("folder-1");
        assert_eq!(config.base_url, BASE_URL);
        assert_eq!(config.upload_url, UPLOAD_URL);
        assert_eq!(config.token_url, TOKEN_URL);
        assert_eq!(config.folder_id, "folder-1");
    }

    #[test]
    fn config_overrides_apply() {
        let config = DriveConfig::new("folder-1")
            .with_base_url("http://localhost:1/drive/v3")
            .with_upload_url("http://localhost:1/upload/drive/v3")
            .with_token_url("http://localhost:1/token");
        assert_eq!(config.base_url, "http://localhost:1/drive/v3");
        assert_eq!(config.upload_url, "http://localhost:1/upload/drive/v3");
        assert_eq!(config.token_url, "http://localhost:1/token");
    }

    #[test]
    fn provider_message_parses_the_error_document() {
        let parsed: ProviderError = serde_json::from_str(
            r#"{"error":{"code":404,"message":"File not found","errors":[]}}"#,
        )
        .unwrap();
        assert_eq!(parsed.error.message, "File not found");
    }
}
