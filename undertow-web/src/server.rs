//! Axum server wiring for the streaming delivery surface.
//!
//! Four anonymous endpoints: ranged media delivery, cache warm-up,
//! subtitle conversion, and a health probe. All shared state lives in
//! [`AppState`] and is constructed once by the caller.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use undertow_core::config::UndertowConfig;
use undertow_core::streaming::MediaPipeline;
use undertow_core::swarm::SwarmCache;
use undertow_resolve::ResolverChain;

use crate::handlers::{prepare_stream, stream_media, stream_subtitle};

/// Shared state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Index resolution chain with its LRU cache
    pub resolver: Arc<ResolverChain>,
    /// Descriptor-keyed session cache
    pub swarms: Arc<SwarmCache>,
    /// Passthrough/remux delivery pipeline
    pub pipeline: Arc<MediaPipeline>,
    /// Full runtime configuration
    pub config: UndertowConfig,
    /// Server start time, reported by the health probe
    pub started_at: Instant,
}

impl AppState {
    /// Assembles state from already-constructed components.
    pub fn new(
        resolver: Arc<ResolverChain>,
        swarms: Arc<SwarmCache>,
        pipeline: Arc<MediaPipeline>,
        config: UndertowConfig,
    ) -> Self {
        Self {
            resolver,
            swarms,
            pipeline,
            config,
            started_at: Instant::now(),
        }
    }
}

/// Builds the delivery router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/stream", get(stream_media))
        .route("/stream/prepare", post(prepare_stream))
        .route("/stream/subtitle", get(stream_subtitle))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the delivery server until Ctrl-C / SIGINT.
///
/// Every live swarm session is torn down on the way out, regardless of
/// how recently it was used.
///
/// # Errors
/// Returns the bind or accept-loop error.
pub async fn run_server(
    addr: SocketAddr,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Undertow streaming server listening on http://{addr}");
    serve_until(listener, state, shutdown_signal()).await
}

/// Serves on `listener` until `shutdown` resolves, then tears down the
/// session cache.
///
/// Split out from [`run_server`] so tests can drive the shutdown path
/// without sending a real signal.
///
/// # Errors
/// Returns the accept-loop error.
pub async fn serve_until(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let sweeper = state.swarms.spawn_sweeper();

    let app = router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Shutting down, tearing down swarm sessions");
    sweeper.abort();
    state.swarms.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "shutdown signal listener failed");
        std::future::pending::<()>().await;
    }
}

/// Health probe: status, live session count, uptime.
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "active_sessions": state.swarms.active_sessions().await,
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}
