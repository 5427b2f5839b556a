//! Error types for the snippet pipeline.
//!
//! Each pipeline stage owns a dedicated error enum; [`PipelineError`]
//! aggregates them for the request handler, which is the sole point where
//! failures become HTTP responses. Every error family carries a stable
//! machine-readable `kind` and maps to a distinct status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Top-level error for a processing request.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed request: missing or out-of-range parameter.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Credential configuration error.
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Signed-assertion handshake error.
    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthenticationError),

    /// Source fetch error.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Transcoder error.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Storage provider error.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),
}

impl PipelineError {
    /// Creates a validation error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        PipelineError::InvalidRequest(msg.into())
    }

    /// Returns the stable error family reported in response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest(_) => "invalid_request",
            PipelineError::Credential(_) => "credential",
            PipelineError::Authentication(_) => "authentication",
            PipelineError::Fetch(_) => "fetch",
            PipelineError::Transform(_) => "transform",
            PipelineError::Upload(_) => "upload",
        }
    }

    /// Returns the HTTP status code this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PipelineError::Credential(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Authentication(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::Fetch(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Transform(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Upload(UploadError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            PipelineError::Upload(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// JSON body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable description of the failure.
    pub error: String,
    /// Stable machine-readable error family.
    pub kind: &'static str,
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}

/// Errors loading service-account credentials from the environment.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The credential variable is not set.
    #[error("Environment variable `{0}` is not set")]
    Missing(&'static str),

    /// The credential blob is not valid base64.
    #[error("Credential blob is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The decoded blob is not the expected JSON document.
    #[error("Credential JSON is invalid: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors from the signed-assertion token handshake.
#[derive(Debug, Error)]
pub enum AuthenticationError {
    /// The assertion could not be signed with the provided private key.
    #[error("Failed to sign assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// The token endpoint could not be reached.
    #[error("Token endpoint unreachable: {0}")]
    Network(#[source] reqwest::Error),

    /// The token endpoint rejected the assertion.
    #[error("Token endpoint rejected the assertion (HTTP {status}): {message}")]
    Rejected {
        /// Status code returned by the token endpoint.
        status: u16,
        /// Provider-supplied error description.
        message: String,
    },

    /// The token response could not be parsed.
    #[error("Token response is malformed: {0}")]
    Malformed(#[source] reqwest::Error),
}

/// Errors fetching the source audio.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source returned a non-success status.
    #[error("Source returned HTTP {status}")]
    Status {
        /// Status code returned by the source.
        status: u16,
    },

    /// The fetch timed out.
    #[error("Source fetch timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    /// DNS, connect, or mid-stream transfer failure.
    #[error("Source fetch failed: {0}")]
    Network(#[source] reqwest::Error),
}

impl FetchError {
    /// Classifies a reqwest failure into timeout vs network.
    pub(crate) fn from_request(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err)
        } else {
            FetchError::Network(err)
        }
    }
}

/// Errors from the transcoder child process.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The transcoder binary could not be spawned.
    #[error("Failed to spawn transcoder `{command}`: {source}")]
    Spawn {
        /// Binary the spawn was attempted with.
        command: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The transcoder exited with a failure status.
    #[error("Transcoder exited with {status}: {diagnostic}")]
    Failed {
        /// Exit status reported by the OS.
        status: std::process::ExitStatus,
        /// Tail of the transcoder's stderr output.
        diagnostic: String,
    },

    /// A transcoder stdio pipe could not be driven.
    #[error("Transcoder pipe failure: {0}")]
    Pipe(#[from] std::io::Error),
}

/// Errors from the storage provider.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The payload exceeds the multipart upload ceiling.
    #[error("Transformed audio is {size} bytes, over the {limit}-byte upload limit")]
    TooLarge {
        /// Payload size in bytes.
        size: usize,
        /// Provider multipart limit in bytes.
        limit: usize,
    },

    /// The provider could not be reached.
    #[error("Storage provider unreachable: {0}")]
    Network(#[source] reqwest::Error),

    /// The provider rejected the file creation.
    #[error("File creation rejected (HTTP {status}): {message}")]
    Create {
        /// Status code returned by the provider.
        status: u16,
        /// Provider-supplied error description.
        message: String,
    },

    /// The provider rejected the permission change; the file was rolled back.
    #[error("Permission update rejected (HTTP {status}): {message}")]
    Permission {
        /// Status code returned by the provider.
        status: u16,
        /// Provider-supplied error description.
        message: String,
    },

    /// A rollback delete was rejected by the provider.
    #[error("Rollback delete rejected (HTTP {status}): {message}")]
    Delete {
        /// Status code returned by the provider.
        status: u16,
        /// Provider-supplied error description.
        message: String,
    },

    /// The provider response did not include the public content link.
    #[error("Provider response did not include a public content link")]
    MissingLink,

    /// The provider response could not be parsed.
    #[error("Provider response is malformed: {0}")]
    Malformed(#[source] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        let cases: Vec<(PipelineError, &str)> = vec![
            (PipelineError::invalid_request("x"), "invalid_request"),
            (
                PipelineError::Credential(CredentialError::Missing("VAR")),
                "credential",
            ),
            (
                PipelineError::Authentication(AuthenticationError::Rejected {
                    status: 400,
                    message: "invalid_grant".into(),
                }),
                "authentication",
            ),
            (
                PipelineError::Fetch(FetchError::Status { status: 404 }),
                "fetch",
            ),
            (
                PipelineError::Transform(TransformError::Pipe(std::io::Error::other("x"))),
                "transform",
            ),
            (PipelineError::Upload(UploadError::MissingLink), "upload"),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind);
        }
    }

    #[test]
    fn status_codes_are_distinct_per_family() {
        assert_eq!(
            PipelineError::invalid_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PipelineError::Credential(CredentialError::Missing("VAR")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PipelineError::Authentication(AuthenticationError::Rejected {
                status: 401,
                message: String::new(),
            })
            .status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            PipelineError::Fetch(FetchError::Status { status: 404 }).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            PipelineError::Transform(TransformError::Pipe(std::io::Error::other("x")))
                .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            PipelineError::Upload(UploadError::MissingLink).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn oversized_payload_maps_to_payload_too_large() {
        let err = PipelineError::Upload(UploadError::TooLarge {
            size: 6 * 1024 * 1024,
            limit: 5 * 1024 * 1024,
        });
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.kind(), "upload");
    }

    #[test]
    fn messages_carry_family_context() {
        let err = PipelineError::Fetch(FetchError::Status { status: 404 });
        assert_eq!(err.to_string(), "Fetch error: Source returned HTTP 404");
    }

    #[cfg(unix)]
    #[test]
    fn transform_failure_message_carries_diagnostic() {
        use std::os::unix::process::ExitStatusExt;

        let err = PipelineError::Transform(TransformError::Failed {
            status: std::process::ExitStatus::from_raw(256),
            diagnostic: "Invalid data found".into(),
        });
        assert!(err.to_string().contains("Invalid data found"));
    }
}
