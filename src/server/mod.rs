//! HTTP / WebSocket front door.
//!
//! | Path | Description |
//! |------|-------------|
//! | `GET /health` | Liveness of the process itself |
//! | `GET /status` | Aggregate and per-room pipeline liveness |
//! | `GET /subtitles/{room}` | Latest subtitle (polling transport) |
//! | `GET /ws/{room}?after=<seq>` | WebSocket subtitle feed, one JSON message per event |
//! | `GET /ingest` | WebSocket accepting binary audio frames from the broadcaster |
//! | `POST /ingest` | One audio frame as the request body |
//!
//! Handlers only talk to the [`Orchestrator`]; they never touch a pipeline.

mod handlers;

pub use handlers::{HealthResponse, IngestReceipt};

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::orchestrator::Orchestrator;

/// Shared state passed to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the router with every endpoint.
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route("/subtitles/:room", get(handlers::latest_subtitle))
        .route("/ws/:room", get(handlers::subtitle_socket))
        .route(
            "/ingest",
            get(handlers::ingest_socket).post(handlers::ingest_chunk),
        )
        .with_state(AppState { orchestrator })
}

/// Bind `config.bind_addr` and serve until `shutdown` resolves.
pub async fn serve<F>(config: &ServerConfig, orchestrator: Arc<Orchestrator>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    serve_on(listener, orchestrator, shutdown).await
}

/// Serve on an already bound listener.
pub async fn serve_on<F>(listener: TcpListener, orchestrator: Arc<Orchestrator>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("Listener has no local address")?;
    log::info!("server: listening on http://{addr}");

    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server terminated unexpectedly")?;

    log::info!("server: stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
