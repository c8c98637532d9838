//! Mini Memo admin server
//!
//! Hosts one memoization cache configured from the environment, restores it
//! from disk, sweeps stale entries in the background and exposes the admin API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_memo::{
    create_router, spawn_cleanup_task, AppState, CacheInstance, CacheRegistry, Config, LoadOutcome,
};

/// Main entry point for the admin server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create and register the cache, then restore it from disk
/// 4. Start background TTL cleanup task
/// 5. Serve the admin API until Ctrl+C/SIGTERM
/// 6. Save every file-backed cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_memo=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mini Memo admin server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache={}, strategy={}, capacity={:?}, ttl={:?}s, file={:?}, port={}, cleanup_interval={}s",
        config.cache_name,
        config.cache_eviction,
        config.cache_capacity,
        config.cache_ttl,
        config.cache_file,
        config.server_port,
        config.cleanup_interval
    );

    let cache: CacheInstance<String, serde_json::Value> =
        CacheInstance::new(config.cache_config().with_shape_id("json"))
            .context("invalid cache configuration")?;

    let registry = Arc::new(CacheRegistry::new());
    registry.register(config.cache_name.clone(), cache)?;

    for (name, result) in registry.load_all() {
        match result {
            Ok(LoadOutcome::Loaded { entries, .. }) => {
                info!("Restored {} entries into '{}'", entries, name)
            }
            Ok(LoadOutcome::Rejected { reason }) => {
                warn!("Starting '{}' empty: {}", name, reason)
            }
            Ok(_) => info!("Starting '{}' empty", name),
            Err(e) => warn!("Starting '{}' empty: {}", name, e),
        }
    }

    let cleanup_handle = spawn_cleanup_task(registry.clone(), config.cleanup_interval);
    info!("Background cleanup task started");

    let app = create_router(AppState::new(registry.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    let saved = tokio::task::spawn_blocking(move || registry.save_all())
        .await
        .context("save task failed")?;
    for (name, result) in saved {
        if result.is_ok() {
            info!("Saved cache '{}'", name);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the cleanup task.
async fn shutdown_signal(cleanup_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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

    cleanup_handle.abort();
    warn!("Cleanup task aborted");
}
