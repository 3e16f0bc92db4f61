// src/core/singleflight.rs

//! Per-key leases that serialize stale/miss resolution against the origin.
//!
//! Concurrent requests for the same stale or missing key take the same
//! lease; whoever holds it performs the origin call, and every waiter
//! re-checks the store after acquisition, observing the leader's result
//! instead of issuing a second fetch. Requests for distinct keys never
//! contend.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Hands out one async mutex per cache key.
///
/// Entries are created on first use and reaped by the lease cleaner task
/// once nobody holds or waits on them, so the map tracks the set of keys
/// under active resolution rather than every key ever requested.
#[derive(Debug, Default)]
pub struct KeyLeases {
    leases: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lease for `uri`, creating it on first use.
    ///
    /// The caller locks the returned mutex for the duration of one
    /// resolution cycle. If the holder is cancelled mid-fetch, the guard
    /// drops and the next waiter runs its own cycle; nobody is stranded.
    pub fn lease(&self, uri: &str) -> Arc<Mutex<()>> {
        self.leases
            .entry(uri.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops lease entries that nobody holds or waits on, returning how many
    /// were removed. The map itself accounts for one strong reference; any
    /// holder or waiter accounts for more.
    pub fn remove_idle(&self) -> usize {
        let before = self.leases.len();
        if before == 0 {
            return 0;
        }
        self.leases.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - self.leases.len()
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }
}
