// src/core/handler.rs

//! The per-request state machine: Lookup -> {Fresh, Stale, Miss}.
//!
//! Fresh entities are served directly. Stale and missing keys resolve under
//! the key's single-flight lease: the store is re-checked after acquisition
//! so waiters observe the leader's result instead of hitting the origin a
//! second time.

use crate::core::cacheability::{Cacheability, classify};
use crate::core::errors::CdnError;
use crate::core::freshness::{expiry_or_default, header_value};
use crate::core::revalidation::{RevalidationOutcome, revalidate};
use crate::core::state::ServerState;
use crate::core::storage::entity::CacheEntity;
use bytes::Bytes;
use std::time::SystemTime;
use tracing::debug;

/// The diagnostic header attached to every proxied response.
pub const CDN_STATUS_HEADER: &str = "X-CDN-Status";

/// Which terminal branch of the state machine produced a response.
///
/// The wire values are a fixed vocabulary; tests and downstream tooling
/// match on them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdnStatus {
    /// Fresh entity served with its stored status and content.
    Hit,
    /// Client validator matched the stored one; answered 304, empty body.
    ConditionalHit,
    /// Stale entity served once after failed revalidation, then evicted.
    StaleServed,
    /// Passed through unstored: origin denied caching via `Cache-Control`.
    MissNoControl,
    /// Passed through unstored: origin status outside the cacheable set.
    MissNoCode,
    /// Fetched, stored, and served fresh.
    MissCached,
}

impl CdnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CdnStatus::Hit => "Hit[200]",
            CdnStatus::ConditionalHit => "Hit[304]",
            CdnStatus::StaleServed => "Hit[EVALIDFAIL]",
            CdnStatus::MissNoControl => "Miss[NoCtrl]",
            CdnStatus::MissNoCode => "Miss[NoCode]",
            CdnStatus::MissCached => "Miss[Cached]",
        }
    }
}

impl std::fmt::Display for CdnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The assembled outbound response for one request.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub cdn_status: CdnStatus,
}

/// Resolves one inbound request to a response.
///
/// `path` is the request path plus query, which doubles as the cache key.
/// Errors map to client-facing 5xx responses at the HTTP layer; every `Ok`
/// carries exactly one diagnostic tag.
pub async fn handle_request(
    state: &ServerState,
    path: &str,
    if_modified_since: Option<&str>,
) -> Result<ProxyResponse, CdnError> {
    let now = SystemTime::now();

    // Fast path: a fresh entity needs no coordination.
    if let Some(entity) = state.store.get(path).await?
        && entity.is_fresh(now)
    {
        return Ok(serve_fresh(state, entity, if_modified_since));
    }

    // Stale or missing. Resolve under the key's lease, re-checking the
    // store after acquisition: a concurrent holder may have already
    // revalidated or stored this key while we waited.
    let lease = state.leases.lease(path);
    let _guard = lease.lock().await;

    let now = SystemTime::now();
    match state.store.get(path).await? {
        Some(entity) if entity.is_fresh(now) => Ok(serve_fresh(state, entity, if_modified_since)),
        Some(entity) => match revalidate(state, entity, now).await? {
            RevalidationOutcome::Revalidated(entity) => {
                Ok(serve_fresh(state, entity, if_modified_since))
            }
            RevalidationOutcome::StaleServed(entity) => Ok(serve_stale(entity)),
        },
        None => resolve_miss(state, path, now).await,
    }
}

/// Serves a fresh (or just revalidated) entity, answering 304 when the
/// client's `If-Modified-Since` is exactly the stored validator.
fn serve_fresh(
    state: &ServerState,
    entity: CacheEntity,
    if_modified_since: Option<&str>,
) -> ProxyResponse {
    if let (Some(inbound), Some(validator)) = (if_modified_since, entity.last_modified.as_deref())
        && inbound == validator
    {
        state.stats.increment_conditional_hits();
        return ProxyResponse {
            status: 304,
            headers: entity.headers,
            body: Bytes::new(),
            cdn_status: CdnStatus::ConditionalHit,
        };
    }
    state.stats.increment_hits();
    ProxyResponse {
        status: entity.status,
        headers: entity.headers,
        body: entity.content,
        cdn_status: CdnStatus::Hit,
    }
}

/// The one-last-serve of an entity that just failed revalidation.
fn serve_stale(entity: CacheEntity) -> ProxyResponse {
    ProxyResponse {
        status: entity.status,
        headers: entity.headers,
        body: entity.content,
        cdn_status: CdnStatus::StaleServed,
    }
}

/// The miss path: one unconditional origin fetch, then store or pass through.
async fn resolve_miss(
    state: &ServerState,
    path: &str,
    now: SystemTime,
) -> Result<ProxyResponse, CdnError> {
    debug!("Cache miss for '{path}': fetching from origin.");
    let res = state.origin.fetch(path, None).await?;

    match classify(
        res.status,
        &res.headers,
        &state.config.origin.cacheable_status_codes,
    ) {
        Cacheability::DeniedByControl => {
            state.stats.increment_misses_uncacheable();
            Ok(ProxyResponse {
                status: res.status,
                headers: res.headers,
                body: res.body,
                cdn_status: CdnStatus::MissNoControl,
            })
        }
        Cacheability::DeniedByStatus => {
            state.stats.increment_misses_uncacheable();
            Ok(ProxyResponse {
                status: res.status,
                headers: res.headers,
                body: res.body,
                cdn_status: CdnStatus::MissNoCode,
            })
        }
        Cacheability::Store => {
            let entity = CacheEntity {
                uri: path.to_string(),
                headers: res.headers.clone(),
                expires: expiry_or_default(&res.headers, now, state.config.cache.default_ttl),
                last_modified: header_value(&res.headers, "last-modified").map(String::from),
                status: res.status,
                content: res.body.clone(),
            };
            state.store.put(entity).await?;
            state.stats.increment_misses_cached();
            Ok(ProxyResponse {
                status: res.status,
                headers: res.headers,
                body: res.body,
                cdn_status: CdnStatus::MissCached,
            })
        }
    }
}
