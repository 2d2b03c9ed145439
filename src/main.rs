//! Pipecache engine process
//!
//! Reads request frames from stdin and writes response frames to stdout.
//! Logs go to stderr only, since stdout carries the protocol.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::sync::RwLock;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipecache::{cache::CacheStore, spawn_cleanup_task, Config, Dispatcher};

/// Main entry point for the cache engine.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber on stderr
/// 2. Load configuration from environment variables
/// 3. Create the cache store
/// 4. Start background TTL cleanup task, unless disabled
/// 5. Serve frames from stdin until EOF or a shutdown signal
///
/// Requests are handled on a single thread, strictly one after another.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pipecache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting pipecache engine");

    let config = Config::from_env();
    info!(
        cleanup_interval = config.cleanup_interval,
        log_frames = config.log_frames,
        "Configuration loaded"
    );

    let store = Arc::new(RwLock::new(CacheStore::new()));
    let dispatcher = Dispatcher::new(store.clone()).with_frame_logging(config.log_frames);

    let cleanup_handle = config
        .cleanup_period()
        .map(|period| spawn_cleanup_task(store.clone(), period));

    let served = tokio::select! {
        result = dispatcher.serve(tokio::io::stdin(), tokio::io::stdout()) => Some(result),
        _ = shutdown_signal() => None,
    };

    if let Some(handle) = cleanup_handle {
        handle.abort();
    }

    let stats = store.read().await.stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        expirations = stats.expirations,
        inserts = stats.inserts,
        removals = stats.removals,
        entries = stats.total_entries,
        hit_rate = stats.hit_rate(),
        "Engine shutdown complete"
    );

    match served {
        Some(result) => result.map(|_| ()).context("request loop failed"),
        // A pending blocking stdin read would otherwise hold the runtime open
        None => std::process::exit(0),
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(%err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(%err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
