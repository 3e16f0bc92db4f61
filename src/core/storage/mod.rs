// src/core/storage/mod.rs

//! The cache store capability and its in-memory implementation.

pub mod codec;
pub mod entity;
pub mod memory;

use crate::core::errors::CdnError;
use async_trait::async_trait;
use entity::CacheEntity;
use std::time::SystemTime;

/// Key-value persistence for cache entities, keyed by request path.
///
/// Operations on a single key are atomic with respect to each other; no
/// ordering is guaranteed across keys.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the live entity stored under `uri`, if any.
    async fn get(&self, uri: &str) -> Result<Option<CacheEntity>, CdnError>;

    /// Stores `entity`, replacing any previous entity under the same uri.
    async fn put(&self, entity: CacheEntity) -> Result<(), CdnError>;

    /// Removes the entity under `uri`. Returns `true` if one was present.
    async fn delete(&self, uri: &str) -> Result<bool, CdnError>;

    /// Number of live entities.
    async fn len(&self) -> usize;

    /// Approximate heap footprint of all live entities.
    async fn memory_usage(&self) -> usize;

    /// Clones all live entities, for snapshotting.
    async fn dump(&self) -> Vec<CacheEntity>;

    /// Evicts entities whose expiry lies before `cutoff`, returning how many
    /// were removed.
    async fn evict_expired_before(&self, cutoff: SystemTime) -> usize;
}
