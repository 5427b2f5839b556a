//! Signed-assertion (JWT bearer) authentication for the storage provider.
//!
//! Each upload performs a fresh handshake: an RS256-signed assertion built
//! from the service-account credentials is exchanged at the token endpoint
//! for a short-lived access token. Tokens are never cached or reused across
//! requests; a session lives exactly as long as one upload sequence.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::credentials::ServiceAccountCredentials;
use crate::errors::AuthenticationError;

/// Default Google OAuth2 token URL.
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scope granting access to files created by this service, and nothing else.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Assertion lifetime in seconds (1 hour, the provider maximum).
pub const JWT_LIFETIME_SECONDS: i64 = 3600;

/// Claims carried by the signed assertion.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

impl Claims {
    fn new(credentials: &ServiceAccountCredentials, token_url: &str, now: i64) -> Self {
        Claims {
            iss: credentials.client_email.clone(),
            scope: DRIVE_FILE_SCOPE.to_string(),
            aud: token_url.to_string(),
            iat: now,
            exp: now + JWT_LIFETIME_SECONDS,
        }
    }
}

/// Short-lived access token returned by the token endpoint.
#[derive(Debug)]
pub struct AccessToken {
    token: SecretString,
    token_type: String,
}

impl AccessToken {
    /// Returns the `Authorization` header value for this token.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.token.expose_secret())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    #[allow(dead_code)]
    expires_in: Option<i64>,
}

/// Signs an assertion for `credentials` addressed to `token_url`.
fn create_assertion(
    credentials: &ServiceAccountCredentials,
    token_url: &str,
) -> Result<String, AuthenticationError> {
    let claims = Claims::new(credentials, token_url, Utc::now().timestamp());
    let header = Header::new(Algorithm::RS256);
    let key = EncodingKey::from_rsa_pem(credentials.private_key.expose_secret().as_bytes())?;
    Ok(encode(&header, &claims, &key)?)
}

/// Performs the one-time handshake: sign an assertion, exchange it for a
/// token. A fresh token is obtained on every call.
pub async fn authenticate(
    http: &reqwest::Client,
    credentials: &ServiceAccountCredentials,
    token_url: &str,
) -> Result<AccessToken, AuthenticationError> {
    let assertion = create_assertion(credentials, token_url)?;

    #[derive(Serialize)]
    struct TokenRequest<'a> {
        grant_type: &'a str,
        assertion: &'a str,
    }

    let response = http
        .post(token_url)
        .form(&TokenRequest {
            grant_type: "urn:ietf:params:oauth:grant-type:jwt-bearer",
            assertion: &assertion,
        })
        .send()
        .await
        .map_err(AuthenticationError::Network)?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        return Err(AuthenticationError::Rejected { status, message });
    }

    let token: TokenResponse = response.json().await.map_err(AuthenticationError::Malformed)?;

    Ok(AccessToken {
        token: SecretString::new(token.access_token),
        token_type: token.token_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(key: &str) -> ServiceAccountCredentials {
        ServiceAccountCredentials {
            client_email: "svc@example.iam.gserviceaccount.com".to_string(),
            private_key: SecretString::new(key.to_string()),
        }
    }

    #[test]
    fn claims_bind_issuer_scope_and_audience() {
        let claims = Claims::new(&credentials("k"), TOKEN_URL, 1_700_000_000);
        assert_eq!(claims.iss, "svc@example.iam.gserviceaccount.com");
        assert_eq!(claims.scope, DRIVE_FILE_SCOPE);
        assert_eq!(claims.aud, TOKEN_URL);
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.exp, 1_700_000_000 + JWT_LIFETIME_SECONDS);
    }

    #[test]
    fn invalid_private_key_is_a_signing_error() {
        let err = create_assertion(&credentials("not a pem key"), TOKEN_URL).unwrap_err();
        assert!(matches!(err, AuthenticationError::Signing(_)));
    }

    #[test]
    fn authorization_header_joins_type_and_token() {
        let token = AccessToken {
            token: SecretString::new("abc123".to_string()),
            token_type: "Bearer".to_string(),
        };
        assert_eq!(token.authorization_header(), "Bearer abc123");
    }

    #[test]
    fn debug_output_redacts_the_token() {
        let token = AccessToken {
            token: SecretString::new("abc123".to_string()),
            token_type: "Bearer".to_string(),
        };
        assert!(!format!("{token:?}").contains("abc123"));
    }
}
