//! Audio snippet service.
//!
//! Accepts an HTTP request carrying a remote audio URL and processing
//! parameters (tempo factor, start offset, duration), pipes the audio
//! through an ffmpeg child process that trims and tempo-scales it into an
//! MP3 snippet, uploads the result to a Google Drive folder via the
//! service-account signed-assertion flow, and returns a public download
//! link.
//!
//! The pipeline per request is strictly sequential: fetch → transform →
//! credential load → token handshake → upload. Nothing is retried and no
//! state outlives the request; the only cross-request resources are the
//! HTTP connection pool and the admission semaphore bounding concurrent
//! pipelines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod config;
pub mod credentials;
pub mod drive;
pub mod errors;
pub mod fetch;
pub mod pipeline;
pub mod server;
pub mod transcode;

pub use config::{Config, ConfigError};
pub use drive::{DriveClient, DriveConfig};
pub use errors::{
    AuthenticationError, CredentialError, FetchError, PipelineError, PipelineResult,
    TransformError, UploadError,
};
pub use server::{router, AppState};
