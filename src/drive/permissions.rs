//! Permission grants against the Drive v3 API.

use percent_encoding::utf8_percent_encode;
use serde::Serialize;

use super::{provider_message, DriveClient};
use crate::auth::AccessToken;
use crate::errors::UploadError;

/// Permission creation payload.
#[derive(Debug, Serialize)]
struct CreatePermissionRequest {
    role: &'static str,
    #[serde(rename = "type")]
    permission_type: &'static str,
}

/// Anyone on the internet may read the file. This is what turns the
/// content link into a public download.
const ANYONE_READER: CreatePermissionRequest = CreatePermissionRequest {
    role: "reader",
    permission_type: "anyone",
};

/// Permission operations scoped to a [`DriveClient`].
pub struct PermissionsService<'a> {
    client: &'a DriveClient,
}

impl<'a> PermissionsService<'a> {
    pub(crate) fn new(client: &'a DriveClient) -> Self {
        PermissionsService { client }
    }

    /// Grants anyone-reader access to `file_id`.
    pub async fn make_public(
        &self,
        token: &AccessToken,
        file_id: &str,
    ) -> Result<(), UploadError> {
        let url = format!(
            "{}/files/{}/permissions",
            self.client.config().base_url,
            utf8_percent_encode(file_id, super::files::PATH_SEGMENT)
        );
        let response = self
            .client
            .http()
            .post(&url)
            .header("Authorization", token.authorization_header())
            .json(&ANYONE_READER)
            .send()
            .await
            .map_err(UploadError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Permission {
                status: status.as_u16(),
                message: provider_message(response).await,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anyone_reader_serializes_to_the_wire_shape() {
        let json = serde_json::to_string(&ANYONE_READER).unwrap();
        assert_eq!(json, r#"{"role":"reader","type":"anyone"}"#);
    }
}
