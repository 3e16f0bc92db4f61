// src/core/tasks/lease_cleaner.rs

//! A task that periodically removes idle entries from the per-key lease map
//! to prevent slow memory leaks over time.

use crate::core::state::ServerState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// The interval at which the lease cleaner task runs.
const CLEANER_INTERVAL: Duration = Duration::from_secs(600); // 10 minutes

/// The background task struct for the lease-map cleaner.
pub struct LeaseCleanerTask {
    state: Arc<ServerState>,
}

impl LeaseCleanerTask {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    /// Runs the main loop for the lease cleaner task.
    /// It periodically wakes up and drops lease entries that no request
    /// currently holds or waits on.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "Lease cleaner task started. Check interval: {:?}",
            CLEANER_INTERVAL
        );
        let mut interval = tokio::time::interval(CLEANER_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let cleaned = self.state.leases.remove_idle();
                    if cleaned > 0 {
                        debug!("Lease cleaner removed {cleaned} idle key leases.");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Lease cleaner task shutting down.");
                    return;
                }
            }
        }
    }
}
