//! HTTP surface: router, shared state, and the request handler.
//!
//! The handler is the sole point where pipeline errors become HTTP
//! responses; every failure maps to a distinct status with a structured
//! `{"error", "kind"}` body (see [`crate::errors`]).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::drive::{DriveClient, DriveConfig};
use crate::errors::PipelineError;
use crate::pipeline::{
    self, ProcessingRequest, DEFAULT_DURATION, DEFAULT_SPEED, DEFAULT_START_TIME,
};

/// State shared across requests: the connection pool, the Drive client,
/// configuration, and the admission semaphore. Everything else is owned by
/// the individual request.
pub struct AppState {
    /// Shared HTTP connection pool (source fetches, token exchange, Drive).
    pub http: reqwest::Client,
    /// Drive client bound to the same pool.
    pub drive: DriveClient,
    /// Service configuration.
    pub config: Config,
    /// Bounds concurrently running pipelines; excess requests wait.
    pub semaphore: Arc<Semaphore>,
}

impl AppState {
    /// Builds the shared state. `drive_config` is separate from `config` so
    /// tests can point the client at mock endpoints.
    pub fn new(config: Config, drive_config: DriveConfig) -> Self {
        let http = reqwest::Client::new();
        let drive = DriveClient::new(http.clone(), drive_config);
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_pipelines));
        AppState {
            http,
            drive,
            config,
            semaphore,
        }
    }
}

/// Raw query parameters of `GET /process-audio`.
#[derive(Debug, Deserialize)]
struct ProcessQuery {
    url: Option<String>,
    speed: Option<f64>,
    #[serde(rename = "startTime")]
    start_time: Option<f64>,
    duration: Option<f64>,
}

impl ProcessQuery {
    /// Default-fills optional parameters and validates the result.
    fn into_request(self) -> Result<ProcessingRequest, PipelineError> {
        let url = self
            .url
            .ok_or_else(|| PipelineError::invalid_request("query parameter `url` is required"))?;
        ProcessingRequest::new(
            &url,
            self.speed.unwrap_or(DEFAULT_SPEED),
            self.start_time.unwrap_or(DEFAULT_START_TIME),
            self.duration.unwrap_or(DEFAULT_DURATION),
        )
    }
}

#[derive(Debug, Serialize)]
struct LinkBody {
    link: String,
}

/// Builds the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/process-audio", get(process_audio))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn process_audio(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProcessQuery>,
) -> Result<Json<LinkBody>, PipelineError> {
    let request = query.into_request()?;

    // The semaphore lives as long as the state and is never closed.
    let _permit = state
        .semaphore
        .clone()
        .acquire_owned()
        .await
        .expect("admission semaphore closed");

    match pipeline::process(&state, &request).await {
        Ok(link) => Ok(Json(LinkBody { link })),
        Err(err) => {
            tracing::error!(kind = err.kind(), error = ?err, "processing failed");
            Err(err)
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
