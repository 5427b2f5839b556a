//! Streaming fetch of the source audio.
//!
//! The body is exposed as a byte stream and never buffered here; the
//! transform pipeline consumes it incrementally. A non-success status is
//! reported without reading the body.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use mime::Mime;
use reqwest::StatusCode;
use url::Url;

use crate::errors::FetchError;

/// Incremental source-audio byte stream.
pub type SourceStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// A successfully opened source response.
pub struct FetchedMedia {
    /// Body bytes, produced incrementally.
    pub stream: SourceStream,
    /// Status returned by the source.
    pub status: StatusCode,
    /// Parsed `Content-Type`, when the source sent a valid one.
    pub content_type: Option<Mime>,
}

impl std::fmt::Debug for FetchedMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedMedia")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Opens a streaming GET against `url`.
///
/// `timeout` covers the whole transfer, not just connection establishment.
pub async fn fetch(
    http: &reqwest::Client,
    url: &Url,
    timeout: Duration,
) -> Result<FetchedMedia, FetchError> {
    let response = http
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(FetchError::from_request)?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Mime>().ok());

    Ok(FetchedMedia {
        stream: Box::pin(response.bytes_stream().map_err(FetchError::from_request)),
        status,
        content_type,
    })
}
