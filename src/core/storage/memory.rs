// src/core/storage/memory.rs

//! The default in-process cache store, backed by a concurrent hash map.

use crate::core::errors::CdnError;
use crate::core::storage::CacheStore;
use crate::core::storage::entity::CacheEntity;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::SystemTime;

/// In-memory `CacheStore`. Entry operations on the underlying `DashMap` give
/// per-key atomicity; entity bodies are `Bytes`, so clones on the read path
/// share the underlying buffer.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: DashMap<String, CacheEntity>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, uri: &str) -> Result<Option<CacheEntity>, CdnError> {
        Ok(self.entities.get(uri).map(|entry| entry.value().clone()))
    }

    async fn put(&self, entity: CacheEntity) -> Result<(), CdnError> {
        self.entities.insert(entity.uri.clone(), entity);
        Ok(())
    }

    async fn delete(&self, uri: &str) -> Result<bool, CdnError> {
        Ok(self.entities.remove(uri).is_some())
    }

    async fn len(&self) -> usize {
        self.entities.len()
    }

    async fn memory_usage(&self) -> usize {
        self.entities
            .iter()
            .map(|entry| entry.value().memory_usage())
            .sum()
    }

    async fn dump(&self) -> Vec<CacheEntity> {
        self.entities
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    async fn evict_expired_before(&self, cutoff: SystemTime) -> usize {
        let before = self.entities.len();
        self.entities.retain(|_, entity| entity.expires >= cutoff);
        before.saturating_sub(self.entities.len())
    }
}
