// src/core/revalidation.rs

//! Revalidates a stale entity against the origin and applies the outcome.
//!
//! One conditional GET per invocation, carrying the stored `Last-Modified`
//! validator. A 304 confirms the stored content; a 200 replaces it; anything
//! else (including transport failure) serves the stale entity one final time
//! and evicts it.

use crate::core::errors::CdnError;
use crate::core::freshness::{expiry_or_default, header_value};
use crate::core::state::ServerState;
use crate::core::storage::entity::CacheEntity;
use std::time::SystemTime;
use tracing::{debug, warn};

/// What became of a stale entity after one revalidation cycle.
#[derive(Debug, Clone)]
pub enum RevalidationOutcome {
    /// The entity was confirmed (304) or replaced (200) and is fresh again.
    Revalidated(CacheEntity),
    /// Revalidation failed. The carried entity has already been evicted from
    /// the store and gets exactly one more stale serve.
    StaleServed(CacheEntity),
}

/// Runs one revalidation cycle for `entity` and persists the result.
pub async fn revalidate(
    state: &ServerState,
    mut entity: CacheEntity,
    now: SystemTime,
) -> Result<RevalidationOutcome, CdnError> {
    let res = match state
        .origin
        .fetch(&entity.uri, entity.last_modified.as_deref())
        .await
    {
        Ok(res) => res,
        Err(e) => {
            warn!("Origin fetch failed during revalidation for '{}': {e}", entity.uri);
            return serve_stale_and_evict(state, entity).await;
        }
    };

    let default_ttl = state.config.cache.default_ttl;
    match res.status {
        304 => {
            debug!("Origin confirmed '{}' unchanged; refreshing metadata.", entity.uri);
            entity.expires = expiry_or_default(&res.headers, now, default_ttl);
            entity.last_modified = header_value(&res.headers, "last-modified").map(String::from);
            entity.headers = res.headers;
            state.store.put(entity.clone()).await?;
            state.stats.increment_revalidations();
            Ok(RevalidationOutcome::Revalidated(entity))
        }
        200 => {
            debug!("Origin replaced '{}' during revalidation.", entity.uri);
            entity.expires = expiry_or_default(&res.headers, now, default_ttl);
            entity.last_modified = header_value(&res.headers, "last-modified").map(String::from);
            entity.headers = res.headers;
            entity.status = res.status;
            entity.content = res.body;
            state.store.put(entity.clone()).await?;
            state.stats.increment_revalidations();
            Ok(RevalidationOutcome::Revalidated(entity))
        }
        status => {
            warn!(
                "Origin responded with unexpected status {status} while revalidating '{}'",
                entity.uri
            );
            serve_stale_and_evict(state, entity).await
        }
    }
}

/// The failure arm: evict the entity, then hand it back for its last serve.
async fn serve_stale_and_evict(
    state: &ServerState,
    entity: CacheEntity,
) -> Result<RevalidationOutcome, CdnError> {
    state.store.delete(&entity.uri).await?;
    state.stats.increment_stale_serves();
    state.stats.increment_evictions();
    Ok(RevalidationOutcome::StaleServed(entity))
}
