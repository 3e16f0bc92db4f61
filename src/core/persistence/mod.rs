// src/core/persistence/mod.rs

//! Snapshot-based persistence for the cache store.
//!
//! The cache is best-effort state, so persistence is deliberately simple:
//! one snapshot file, loaded at startup and rewritten atomically by the
//! background saver task.

pub mod snapshot;

pub use snapshot::SnapshotLoader;
