//! Application entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] (`--config <path>` or the platform default), then
//!    apply environment overrides.
//! 3. Build the HTTP collaborators and the per-room output tracks.
//! 4. Start a pipeline for every room.
//! 5. Serve HTTP / WebSocket until Ctrl-C.
//! 6. Stop every pipeline and close the subtitle bus.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use roomcast::{
    clock::SystemClock,
    collab::{BroadcastTracks, Collaborators},
    config::AppConfig,
    orchestrator::Orchestrator,
    server,
};

/// `roomcast [--config <path>]`
fn config_path_from_args() -> Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    let mut path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => match args.next() {
                Some(p) => path = Some(PathBuf::from(p)),
                None => bail!("--config needs a path"),
            },
            other => bail!("unexpected argument: {other}\nusage: roomcast [--config <path>]"),
        }
    }
    Ok(path)
}

fn load_config(path: Option<PathBuf>) -> AppConfig {
    let loaded = match &path {
        Some(p) => AppConfig::load_from(p),
        None => AppConfig::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e:#}); using defaults");
        AppConfig::default()
    });
    config.apply_env_overrides();
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("roomcast starting up");

    // 2. Configuration
    let config = load_config(config_path_from_args()?);

    // 3. Collaborators and output tracks
    let collaborators = Collaborators::from_config(&config);
    let tracks = Arc::new(BroadcastTracks::new(config.fanout.track_capacity));

    // 4. Pipelines
    let orchestrator = Arc::new(Orchestrator::new(
        &config,
        collaborators,
        tracks,
        Arc::new(SystemClock),
    ));
    let started = orchestrator.start_all();
    log::info!("Started {} room pipelines: {started:?}", started.len());

    // 5. Serve until Ctrl-C
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
        log::info!("Ctrl-C received, shutting down");
    };
    let served = server::serve(&config.server, Arc::clone(&orchestrator), shutdown).await;

    // 6. Teardown
    orchestrator.shutdown().await;
    served
}
