//! Drowsiness Monitor API Server
//!
//! Serves the annotated live view, the latest driver analysis and the alert
//! history, while the frame pipeline runs on its own blocking thread.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod pipeline;
mod routes;

pub use config::{AppConfig, LoggingConfig, ServerConfig};
pub use pipeline::{FrameFeed, FramePipeline, PipelineHandles};

use alerting::AlertManager;
use camera_capture::CameraError;
use dms::{DmsError, DmsModule};

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("DMS error: {0}")]
    Dms(#[from] DmsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Metrics exporter error: {0}")]
    Metrics(String),

    #[error("Background task failed: {0}")]
    Pipeline(String),
}

/// Application state shared across handlers
pub struct AppState {
    /// Pipeline outputs
    pub handles: PipelineHandles,
    /// Flips to `true` once the server starts shutting down
    pub shutdown: watch::Receiver<bool>,
    /// Open `/video_feed` responses
    pub streaming_clients: Arc<AtomicUsize>,
    /// Prometheus exporter handle, when installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(
        handles: PipelineHandles,
        shutdown: watch::Receiver<bool>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            handles,
            shutdown,
            streaming_clients: Arc::new(AtomicUsize::new(0)),
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub frames_processed: u64,
    pub streaming_clients: usize,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::stream::index))
        .route("/video_feed", get(routes::stream::video_feed))
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/status", get(routes::status::get_status))
        .route("/api/v1/alerts", get(routes::alerts::get_alerts))
        .route("/api/v1/session/reset", post(routes::session::reset_session))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        frames_processed: *state.handles.frames_processed.borrow(),
        streaming_clients: state.streaming_clients.load(Ordering::SeqCst),
    })
}

/// Prometheus scrape endpoint
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics exporter not installed".to_string()),
    }
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> Result<(), ServerError> {
    let level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let result = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.map_err(|e| ServerError::Logging(e.to_string()))
}

/// Run the pipeline and the server until Ctrl-C or the pipeline stops
pub async fn run_server(config: AppConfig) -> Result<(), ServerError> {
    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;

    let source = camera_capture::open_source(&config.camera)?;
    let dms = DmsModule::new(config.dms.clone())?;
    let alerts = AlertManager::new(config.audio.clone());
    let (pipeline, handles) = FramePipeline::new(
        source,
        dms,
        alerts,
        config.camera.mirror,
        config.camera.jpeg_quality,
        config.server.stream_buffer,
    );

    info!("Starting API server on {}", config.server.bind);
    let listener = TcpListener::bind(&config.server.bind).await?;
    let frames = serve(listener, pipeline, handles, Some(metrics), shutdown_signal()).await?;
    info!("Frame pipeline processed {} frames", frames);
    Ok(())
}

/// Serve HTTP while the pipeline runs on a blocking thread.
///
/// Stops when `signal` resolves or the pipeline ends, whichever comes first.
/// Streaming responses are ended before the server drains, and the pipeline
/// error, if any, is returned.
pub async fn serve(
    listener: TcpListener,
    pipeline: FramePipeline,
    handles: PipelineHandles,
    metrics: Option<PrometheusHandle>,
    signal: impl Future<Output = ()> + Send + 'static,
) -> Result<u64, ServerError> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let stop_pipeline = pipeline.shutdown_flag();
    let mut worker = tokio::task::spawn_blocking(move || pipeline.run());

    let state = Arc::new(AppState::new(handles, shutdown_rx.clone(), metrics));
    let mut server_shutdown = shutdown_rx;
    let server = axum::serve(listener, create_router(state)).with_graceful_shutdown(async move {
        let _ = server_shutdown.wait_for(|stop| *stop).await;
    });
    let mut server = tokio::spawn(async move { server.await });

    let finished = tokio::select! {
        _ = signal => None,
        result = &mut worker => Some(result),
        result = &mut server => {
            // Server failed before any shutdown was requested
            stop_pipeline.store(true, Ordering::Relaxed);
            let _ = worker.await;
            return match result {
                Ok(Ok(())) => Err(ServerError::Pipeline("server exited unexpectedly".into())),
                Ok(Err(e)) => Err(e.into()),
                Err(e) => Err(ServerError::Pipeline(e.to_string())),
            };
        }
    };

    info!("Shutting down");
    stop_pipeline.store(true, Ordering::Relaxed);
    shutdown_tx.send_replace(true);

    let pipeline_result = match finished {
        Some(result) => result,
        None => worker.await,
    };
    match server.await {
        Ok(Ok(())) => info!("Server stopped"),
        Ok(Err(e)) => error!("Server error during shutdown: {}", e),
        Err(e) => error!("Server task failed: {}", e),
    }

    match pipeline_result {
        Ok(Ok(frames)) => Ok(frames),
        Ok(Err(e)) => {
            error!("Frame pipeline failed: {}", e);
            Err(e)
        }
        Err(e) => Err(ServerError::Pipeline(e.to_string())),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
