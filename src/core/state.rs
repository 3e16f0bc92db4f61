// src/core/state.rs

//! Defines the central `ServerState` struct, holding all shared proxy-wide state.

use crate::config::Config;
use crate::core::errors::CdnError;
use crate::core::origin::{HttpOriginClient, OriginClient};
use crate::core::singleflight::KeyLeases;
use crate::core::storage::CacheStore;
use crate::core::storage::memory::MemoryStore;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// The central struct holding all shared, proxy-wide state.
///
/// Wrapped in an `Arc` and passed to every request handler and background
/// task. The configuration is immutable after startup; all mutable state
/// lives behind the store, the lease map, and the atomic counters.
pub struct ServerState {
    pub config: Config,
    pub store: Arc<dyn CacheStore>,
    pub origin: Arc<dyn OriginClient>,
    /// Per-key single-flight leases for stale/miss resolution.
    pub leases: KeyLeases,
    pub stats: StatsState,
}

impl ServerState {
    /// Assembles a state from its parts. Tests use this to wire a scripted
    /// origin client against a fresh store.
    pub fn new(config: Config, store: Arc<dyn CacheStore>, origin: Arc<dyn OriginClient>) -> Self {
        Self {
            config,
            store,
            origin,
            leases: KeyLeases::new(),
            stats: StatsState::new(),
        }
    }

    /// Initializes the production state from the given configuration: an
    /// in-memory store and a `reqwest` origin client.
    pub fn initialize(config: Config) -> Result<Arc<Self>, CdnError> {
        let origin = HttpOriginClient::new(config.origin.url.clone(), config.origin.timeout)?;
        Ok(Arc::new(Self::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(origin),
        )))
    }
}

/// Proxy-wide counters, one per terminal branch of the request state
/// machine plus the revalidation and eviction paths.
#[derive(Debug)]
pub struct StatsState {
    start_time: Instant,
    /// Full cache hits (`Hit[200]`).
    pub hits: AtomicU64,
    /// Client-conditional hits answered with 304 (`Hit[304]`).
    pub conditional_hits: AtomicU64,
    /// Stale entities served once after a failed revalidation (`Hit[EVALIDFAIL]`).
    pub stale_serves: AtomicU64,
    /// Misses that stored a new entity (`Miss[Cached]`).
    pub misses_cached: AtomicU64,
    /// Misses passed through unstored (`Miss[NoCtrl]` and `Miss[NoCode]`).
    pub misses_uncacheable: AtomicU64,
    /// Revalidations that confirmed or replaced an entity.
    pub revalidations: AtomicU64,
    /// Entities removed by failed revalidation or the sweeper.
    pub evictions: AtomicU64,
}

impl StatsState {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            hits: AtomicU64::new(0),
            conditional_hits: AtomicU64::new(0),
            stale_serves: AtomicU64::new(0),
            misses_cached: AtomicU64::new(0),
            misses_uncacheable: AtomicU64::new(0),
            revalidations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Atomically increments the counter for full cache hits.
    pub fn increment_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Atomically increments the counter for 304 client-conditional hits.
    pub fn increment_conditional_hits(&self) {
        self.conditional_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Atomically increments the counter for stale serves.
    pub fn increment_stale_serves(&self) {
        self.stale_serves.fetch_add(1, Ordering::Relaxed);
    }

    /// Atomically increments the counter for misses that stored an entity.
    pub fn increment_misses_cached(&self) {
        self.misses_cached.fetch_add(1, Ordering::Relaxed);
    }

    /// Atomically increments the counter for pass-through misses.
    pub fn increment_misses_uncacheable(&self) {
        self.misses_uncacheable.fetch_add(1, Ordering::Relaxed);
    }

    /// Atomically increments the counter for completed revalidations.
    pub fn increment_revalidations(&self) {
        self.revalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Atomically increments the counter for evicted entities.
    pub fn increment_evictions(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Captures a point-in-time view for the stats endpoint. Store-derived
    /// figures are supplied by the caller.
    pub fn snapshot(&self, entities: usize, memory_bytes: usize) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            entities,
            memory_bytes,
            hits: self.hits.load(Ordering::Relaxed),
            conditional_hits: self.conditional_hits.load(Ordering::Relaxed),
            stale_serves: self.stale_serves.load(Ordering::Relaxed),
            misses_cached: self.misses_cached.load(Ordering::Relaxed),
            misses_uncacheable: self.misses_uncacheable.load(Ordering::Relaxed),
            revalidations: self.revalidations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for StatsState {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time view of the counters, serialized as the stats endpoint body.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub entities: usize,
    pub memory_bytes: usize,
    pub hits: u64,
    pub conditional_hits: u64,
    pub stale_serves: u64,
    pub misses_cached: u64,
    pub misses_uncacheable: u64,
    pub revalidations: u64,
    pub evictions: u64,
}
