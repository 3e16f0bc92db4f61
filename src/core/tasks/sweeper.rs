// src/core/tasks/sweeper.rs

//! A task that periodically evicts long-stale entities from the store.
//!
//! Stale entities stay useful for a while (revalidation can confirm them
//! with a cheap 304), so only entities stale for longer than the configured
//! grace are removed. A swept entity is indistinguishable from a miss on
//! the serving path.

use crate::core::state::ServerState;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// The background task struct for the expired-entity sweeper.
pub struct SweeperTask {
    state: Arc<ServerState>,
}

impl SweeperTask {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    /// Runs the main loop for the sweeper task.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let interval = self.state.config.cache.sweep_interval;
        let grace = self.state.config.cache.sweep_grace;
        info!("Cache sweeper task started. Sweep interval: {interval:?}, grace: {grace:?}");
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let cutoff = SystemTime::now() - grace;
                    let swept = self.state.store.evict_expired_before(cutoff).await;
                    if swept > 0 {
                        self.state.stats.evictions.fetch_add(swept as u64, Ordering::Relaxed);
                        debug!("Cache sweeper evicted {swept} long-stale entities.");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Cache sweeper task shutting down.");
                    return;
                }
            }
        }
    }
}
