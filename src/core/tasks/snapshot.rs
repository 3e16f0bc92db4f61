// src/core/tasks/snapshot.rs

//! Implements the snapshot auto-saver background task.
//! The task periodically writes the full cache to the snapshot file and
//! performs one final save during graceful shutdown.

use crate::core::persistence::snapshot;
use crate::core::state::ServerState;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// The background task struct for the snapshot auto-saver.
pub struct SnapshotSaverTask {
    state: Arc<ServerState>,
}

impl SnapshotSaverTask {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    /// The main run loop for the snapshot auto-saver.
    ///
    /// A failed save logs the error and retries on the next tick; the cache
    /// keeps serving either way.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let interval = self.state.config.persistence.save_interval;
        info!("Snapshot auto-saver task started. Save interval: {interval:?}");
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so the initial save
        // happens one full interval after startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let path = &self.state.config.persistence.snapshot_path;
                    if let Err(e) = snapshot::save(&self.state.store, path).await {
                        error!("Background snapshot save failed: {e}");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Snapshot auto-saver received shutdown signal. Performing final save...");
                    let path = &self.state.config.persistence.snapshot_path;
                    if let Err(e) = snapshot::save(&self.state.store, path).await {
                        error!("Final snapshot save on shutdown failed: {e}");
                    }
                    info!("Snapshot auto-saver task finished.");
                    return;
                }
            }
        }
    }
}
