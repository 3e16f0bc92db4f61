// src/core/cacheability.rs

//! Decides whether a fresh origin response may be stored.
//!
//! Evaluated only on the miss path, against the origin's response, before
//! anything is written to the store.

use crate::core::freshness::header_value;
use std::collections::HashSet;

/// Directives that deny storage when they lead the `Cache-Control` value.
const DENY_DIRECTIVES: [&str; 3] = ["no-cache", "no-store", "private"];

/// The storage decision for a fresh origin response.
///
/// The two denial reasons are distinct because each maps to its own
/// diagnostic tag on the outbound response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cacheability {
    /// The response may be stored.
    Store,
    /// `Cache-Control` leads with `no-cache`, `no-store` or `private`.
    DeniedByControl,
    /// The status code is outside the configured cacheable set.
    DeniedByStatus,
}

/// Classifies an origin response for storage.
///
/// The control check runs before the status check, so a `private` response
/// with a disallowed status reports `DeniedByControl`.
pub fn classify(status: u16, headers: &[(String, String)], allowed: &HashSet<u16>) -> Cacheability {
    if let Some(control) = header_value(headers, "cache-control")
        && DENY_DIRECTIVES.iter().any(|d| leads_with(control, d))
    {
        return Cacheability::DeniedByControl;
    }
    if !allowed.contains(&status) {
        return Cacheability::DeniedByStatus;
    }
    Cacheability::Store
}

/// ASCII case-insensitive prefix match, anchored at the start of the value.
/// `private, max-age=60` leads with `private`; `public, no-cache` does not
/// lead with `no-cache`.
fn leads_with(value: &str, directive: &str) -> bool {
    value
        .get(..directive.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(directive))
}
