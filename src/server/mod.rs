// src/server/mod.rs

//! Server assembly: state initialization, snapshot loading, background task
//! spawning, and the proxy listener with graceful shutdown.

use crate::config::Config;
use crate::core::persistence::SnapshotLoader;
use crate::core::state::ServerState;
use crate::core::tasks::lease_cleaner::LeaseCleanerTask;
use crate::core::tasks::snapshot::SnapshotSaverTask;
use crate::core::tasks::sweeper::SweeperTask;
use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

mod http;

pub use http::proxy_router;

/// The main server startup function, orchestrating all setup phases.
pub async fn run(config: Config) -> Result<()> {
    // 1. Initialize shared state and warm the store from the last snapshot.
    let state = ServerState::initialize(config)?;
    info!("Server state initialized.");
    load_snapshot_data(&state).await?;

    let listener = TcpListener::bind((state.config.host.as_str(), state.config.port)).await?;
    info!(
        "pullcdn listening on {}:{}, pulling from origin {}",
        state.config.host, state.config.port, state.config.origin.url
    );

    // 2. Spawn all background tasks.
    let (shutdown_tx, _) = broadcast::channel(1);
    let mut background_tasks = spawn_all(&state, &shutdown_tx);

    // 3. Serve until SIGINT or SIGTERM arrives.
    let app = proxy_router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Proxy listener terminated with an error")?;

    info!("Shutting down. Sending signal to all tasks.");
    if shutdown_tx.send(()).is_err() {
        error!("Failed to send shutdown signal. Some tasks may not terminate gracefully.");
    }

    info!("Waiting for background tasks to finish...");
    if tokio::time::timeout(Duration::from_secs(10), async {
        while background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
    }

    log_final_stats(&state).await;
    info!("Server shutdown complete.");
    Ok(())
}

/// Resolves once SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let mut sigint = signal(SignalKind::interrupt()).expect("Failed to create SIGINT stream");
    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to create SIGTERM stream");

    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
        _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
    }
}

/// Loads the snapshot file into the store when persistence is enabled.
async fn load_snapshot_data(state: &Arc<ServerState>) -> Result<()> {
    if !state.config.persistence.enabled {
        info!("Snapshot persistence is disabled. Starting with an empty cache.");
        return Ok(());
    }

    let path = std::path::Path::new(&state.config.persistence.snapshot_path);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            anyhow!(
                "Failed to create snapshot directory '{}': {}",
                parent.display(),
                e
            )
        })?;
        info!("Created snapshot directory: {}", parent.display());
    }

    let loader = SnapshotLoader::new(state.config.persistence.clone());
    loader.load_into(state).await?;
    Ok(())
}

/// Spawns all of the proxy's long-running background tasks.
fn spawn_all(state: &Arc<ServerState>, shutdown_tx: &broadcast::Sender<()>) -> JoinSet<Result<()>> {
    let mut background_tasks = JoinSet::new();

    if state.config.stats.enabled {
        let stats_state = state.clone();
        let shutdown_rx_stats = shutdown_tx.subscribe();
        background_tasks.spawn(async move {
            http::run_stats_server(stats_state, shutdown_rx_stats).await;
            Ok(())
        });
    } else {
        info!("Stats server is disabled in the configuration.");
    }

    if state.config.persistence.enabled {
        let saver = SnapshotSaverTask::new(state.clone());
        let shutdown_rx_save = shutdown_tx.subscribe();
        background_tasks.spawn(async move {
            saver.run(shutdown_rx_save).await;
            Ok(())
        });
    }

    let sweeper = SweeperTask::new(state.clone());
    let shutdown_rx_sweep = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        sweeper.run(shutdown_rx_sweep).await;
        Ok(())
    });

    let lease_cleaner = LeaseCleanerTask::new(state.clone());
    let shutdown_rx_leases = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        lease_cleaner.run(shutdown_rx_leases).await;
        Ok(())
    });

    info!("All background tasks have been spawned.");
    background_tasks
}

/// Logs the terminal counter values after the listener has drained.
async fn log_final_stats(state: &Arc<ServerState>) {
    let stats = state
        .stats
        .snapshot(state.store.len().await, state.store.memory_usage().await);
    info!(
        "Final stats: {} hits, {} conditional hits, {} stale serves, {} misses cached, {} misses passed through, {} revalidations, {} evictions, {} entities resident.",
        stats.hits,
        stats.conditional_hits,
        stats.stale_serves,
        stats.misses_cached,
        stats.misses_uncacheable,
        stats.revalidations,
        stats.evictions,
        stats.entities,
    );
}
