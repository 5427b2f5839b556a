//! Service binary: configuration, tracing, server startup, graceful
//! shutdown.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use audio_snippet_service::{router, AppState, Config, DriveConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("audio_snippet_service=info,tower_http=info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(err) = serve(config).await {
        tracing::error!(%err, "server error");
        std::process::exit(1);
    }
}

async fn serve(config: Config) -> std::io::Result<()> {
    let drive_config = DriveConfig::new(config.folder_id.clone());
    let addr = format!("0.0.0.0:{}", config.port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        %addr,
        ffmpeg_path = %config.ffmpeg_path,
        max_concurrent_pipelines = config.max_concurrent_pipelines,
        "listening"
    );

    let state = Arc::new(AppState::new(config, drive_config));
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
