// src/core/storage/entity.rs

//! Defines the cache entity, the unit of storage for proxied responses.

use bytes::Bytes;
use std::time::SystemTime;

/// A single cached origin response, keyed by request URI.
///
/// Headers keep their origin order and are replayed verbatim on every hit,
/// so a client sees the same header set whether the response came from the
/// origin or from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntity {
    /// The request URI (path plus query) this entity was stored under.
    pub uri: String,
    /// Response headers captured from the origin, in origin order.
    pub headers: Vec<(String, String)>,
    /// The instant this entity stops being fresh.
    pub expires: SystemTime,
    /// The origin's `Last-Modified` value, used as the revalidation validator.
    pub last_modified: Option<String>,
    /// The origin status code replayed on cache hits.
    pub status: u16,
    /// The full response body.
    pub content: Bytes,
}

impl CacheEntity {
    /// Returns `true` if the entity is still fresh at `now`.
    pub fn is_fresh(&self, now: SystemTime) -> bool {
        now < self.expires
    }

    /// Returns the first header value whose name matches `name` case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Approximate memory footprint, used by the stats endpoint.
    pub fn memory_usage(&self) -> usize {
        let headers_size: usize = self
            .headers
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum();
        let lm_size = self.last_modified.as_ref().map_or(0, |s| s.len());
        self.uri.len() + headers_size + lm_size + self.content.len()
    }
}
