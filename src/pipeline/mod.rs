//! Per-request orchestration: fetch, transform, authenticate, upload.
//!
//! Stages run strictly in sequence inside the handler future. The transform
//! consumes the fetch stream incrementally, but the upload only starts after
//! the transform has fully succeeded, so a failed transform never leaves a
//! partial file at the provider.

use chrono::{DateTime, SecondsFormat, Utc};
use url::Url;

use crate::errors::{PipelineError, PipelineResult};
use crate::server::AppState;
use crate::transcode::TranscodeParams;
use crate::{auth, credentials, fetch, transcode};

/// Default tempo factor.
pub const DEFAULT_SPEED: f64 = 1.5;

/// Default seek offset in seconds.
pub const DEFAULT_START_TIME: f64 = 0.0;

/// Default output window in seconds.
pub const DEFAULT_DURATION: f64 = 5.0;

/// Accepted tempo factor range, matching the transcoder's `atempo` filter.
pub const SPEED_RANGE: std::ops::RangeInclusive<f64> = 0.5..=100.0;

/// Largest accepted seek offset in seconds (24 hours).
pub const MAX_START_TIME: f64 = 86_400.0;

/// Largest accepted output window in seconds. Keeps the worst-case output
/// (slowest tempo) under the provider's multipart upload ceiling at typical
/// MP3 bitrates.
pub const MAX_DURATION: f64 = 150.0;

/// A validated processing request.
///
/// Construction is the only validation point; a value of this type is safe
/// to turn into transcoder arguments.
#[derive(Debug, Clone)]
pub struct ProcessingRequest {
    /// Source audio URL.
    pub url: Url,
    /// Tempo factor.
    pub speed: f64,
    /// Seek offset in seconds.
    pub start_time: f64,
    /// Output window in seconds.
    pub duration: f64,
}

impl ProcessingRequest {
    /// Validates raw parameters into a request.
    pub fn new(
        url: &str,
        speed: f64,
        start_time: f64,
        duration: f64,
    ) -> Result<Self, PipelineError> {
        let url: Url = url
            .parse()
            .map_err(|err| PipelineError::invalid_request(format!("`url` is not a valid URL: {err}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(PipelineError::invalid_request(format!(
                "`url` must be http or https, got `{}`",
                url.scheme()
            )));
        }

        if !speed.is_finite() || !SPEED_RANGE.contains(&speed) {
            return Err(PipelineError::invalid_request(format!(
                "`speed` must be between {} and {}, got {speed}",
                SPEED_RANGE.start(),
                SPEED_RANGE.end()
            )));
        }

        if !start_time.is_finite() || !(0.0..=MAX_START_TIME).contains(&start_time) {
            return Err(PipelineError::invalid_request(format!(
                "`startTime` must be between 0 and {MAX_START_TIME}, got {start_time}"
            )));
        }

        if !duration.is_finite() || duration <= 0.0 || duration > MAX_DURATION {
            return Err(PipelineError::invalid_request(format!(
                "`duration` must be positive and at most {MAX_DURATION}, got {duration}"
            )));
        }

        Ok(ProcessingRequest {
            url,
            speed,
            start_time,
            duration,
        })
    }
}

/// Derives the upload filename from the request-handling time.
///
/// Colons are replaced for URL and filesystem safety. Uniqueness is only as
/// strong as millisecond granularity; two requests within the same instant
/// collide.
pub fn generate_filename(now: DateTime<Utc>) -> String {
    let timestamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(':', "-");
    format!("snippet-{timestamp}.mp3")
}

/// Runs one request through the pipeline and returns the public link.
pub async fn process(state: &AppState, request: &ProcessingRequest) -> PipelineResult<String> {
    let filename = generate_filename(Utc::now());
    tracing::info!(url = %request.url, %filename, "processing snippet");

    let media = fetch::fetch(&state.http, &request.url, state.config.fetch_timeout).await?;
    tracing::debug!(
        status = %media.status,
        content_type = ?media.content_type,
        "source open"
    );

    let params = TranscodeParams {
        start_time: request.start_time,
        duration: request.duration,
        speed: request.speed,
    };
    let audio = transcode::run(&state.config.ffmpeg_path, &params, media.stream).await?;
    tracing::info!(bytes = audio.len(), "transform complete");

    let credentials = credentials::load()?;
    let token = auth::authenticate(&state.http, &credentials, state.drive.token_url()).await?;
    let link = state.drive.upload_public(&token, &filename, audio).await?;
    tracing::info!(%link, "snippet uploaded");

    Ok(link)
}
