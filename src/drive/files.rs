//! File creation and deletion against the Drive v3 API.

use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Deserialize;

use super::{provider_message, DriveClient, SNIPPET_MIME_TYPE};
use crate::auth::AccessToken;
use crate::errors::UploadError;

/// Multipart upload ceiling imposed by the provider.
pub const MAX_MULTIPART_BYTES: usize = 5 * 1024 * 1024;

/// Characters escaped when a file ID is embedded in a URL path segment.
pub(crate) const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'%');

/// File resource fields returned by the create call.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    /// Provider-assigned file ID.
    pub id: String,
    /// Public content link; present once the projection includes it.
    #[serde(rename = "webContentLink")]
    pub web_content_link: Option<String>,
}

/// File operations scoped to a [`DriveClient`].
pub struct FilesService<'a> {
    client: &'a DriveClient,
}

impl<'a> FilesService<'a> {
    pub(crate) fn new(client: &'a DriveClient) -> Self {
        FilesService { client }
    }

    /// Creates `name` in the configured folder via a multipart upload,
    /// projecting only the ID and the public content link.
    pub async fn create(
        &self,
        token: &AccessToken,
        name: &str,
        content: Bytes,
    ) -> Result<UploadedFile, UploadError> {
        if content.len() > MAX_MULTIPART_BYTES {
            return Err(UploadError::TooLarge {
                size: content.len(),
                limit: MAX_MULTIPART_BYTES,
            });
        }

        let metadata = serde_json::json!({
            "name": name,
            "parents": [self.client.config().folder_id],
        });
        let body = MultipartBody::new(
            Bytes::from(metadata.to_string()),
            content,
            SNIPPET_MIME_TYPE,
        );

        let url = format!(
            "{}/files?uploadType=multipart&fields=id,webContentLink",
            self.client.config().upload_url
        );
        let response = self
            .client
            .http()
            .post(&url)
            .header("Authorization", token.authorization_header())
            .header("Content-Type", body.content_type_header())
            .body(body.to_bytes())
            .send()
            .await
            .map_err(UploadError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Create {
                status: status.as_u16(),
                message: provider_message(response).await,
            });
        }

        response.json().await.map_err(UploadError::Malformed)
    }

    /// Deletes a file (rollback path).
    pub async fn delete(&self, token: &AccessToken, file_id: &str) -> Result<(), UploadError> {
        let url = format!(
            "{}/files/{}",
            self.client.config().base_url,
            utf8_percent_encode(file_id, PATH_SEGMENT)
        );
        let response = self
            .client
            .http()
            .delete(&url)
            .header("Authorization", token.authorization_header())
            .send()
            .await
            .map_err(UploadError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Delete {
                status: status.as_u16(),
                message: provider_message(response).await,
            });
        }

        Ok(())
    }
}

/// `multipart/related` body: JSON metadata part plus media part.
pub(crate) struct MultipartBody {
    metadata: Bytes,
    content: Bytes,
    content_type: String,
    boundary: String,
}

impl MultipartBody {
    pub(crate) fn new(metadata: Bytes, content: Bytes, content_type: impl Into<String>) -> Self {
        MultipartBody {
            metadata,
            content,
            content_type: content_type.into(),
            boundary: Self::generate_boundary(),
        }
    }

    fn generate_boundary() -> String {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        format!("==============={nanos}")
    }

    /// Frames both parts with the boundary.
    pub(crate) fn to_bytes(&self) -> Bytes {
        let mut result = Vec::with_capacity(self.metadata.len() + self.content.len() + 256);
        result.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        result.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        result.extend_from_slice(&self.metadata);
        result.extend_from_slice(b"\r\n");
        result.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        result.extend_from_slice(format!("Content-Type: {}\r\n\r\n", self.content_type).as_bytes());
        result.extend_from_slice(&self.content);
        result.extend_from_slice(format!("\r\n--{}--", self.boundary).as_bytes());
        Bytes::from(result)
    }

    /// `Content-Type` header value carrying the boundary.
    pub(crate) fn content_type_header(&self) -> String {
        format!("multipart/related; boundary={}", self.boundary)
    }
}
