//! Service configuration loaded from the environment.
//!
//! Everything except the credential blob is read once at startup;
//! credentials stay in the environment and are re-read per upload attempt
//! (see [`crate::credentials`]).

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default transcoder binary, resolved through `PATH`.
pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

/// Default bound on concurrently running pipelines.
pub const DEFAULT_MAX_CONCURRENT_PIPELINES: usize = 8;

/// Default source-fetch timeout in seconds. Covers the full transfer.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is absent.
    #[error("Environment variable `{0}` is required")]
    Missing(&'static str),

    /// A variable is present but unusable.
    #[error("Environment variable `{name}` is invalid ({value:?}): {reason}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Raw value found in the environment.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Runtime configuration for the service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Destination Drive folder for uploaded snippets.
    pub folder_id: String,
    /// Path to the transcoder binary.
    pub ffmpeg_path: String,
    /// Maximum number of concurrently running pipelines.
    pub max_concurrent_pipelines: usize,
    /// Request timeout for fetching source audio.
    pub fetch_timeout: Duration,
}

impl Config {
    /// Reads configuration from the environment, applying defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = parse_var("PORT", DEFAULT_PORT)?;

        let folder_id =
            env::var("DRIVE_FOLDER_ID").map_err(|_| ConfigError::Missing("DRIVE_FOLDER_ID"))?;
        if folder_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "DRIVE_FOLDER_ID",
                value: folder_id,
                reason: "must not be empty".into(),
            });
        }

        let ffmpeg_path =
            env::var("FFMPEG_PATH").unwrap_or_else(|_| DEFAULT_FFMPEG_PATH.to_string());

        let max_concurrent_pipelines =
            parse_var("MAX_CONCURRENT_PIPELINES", DEFAULT_MAX_CONCURRENT_PIPELINES)?;
        if max_concurrent_pipelines == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_CONCURRENT_PIPELINES",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let fetch_timeout_secs = parse_var("FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS)?;

        Ok(Config {
            port,
            folder_id,
            ffmpeg_path,
            max_concurrent_pipelines,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
        })
    }
}

/// Parses an optional environment variable, falling back to `default`.
fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: err.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
