// src/core/freshness.rs

//! Computes the freshness deadline of an origin response from its headers.
//!
//! Precedence, first match wins:
//! 1. `Cache-Control: s-maxage=<N>` (leading directive) -> now + N seconds.
//! 2. `Cache-Control: max-age=<N>` (leading directive) -> now + N seconds.
//! 3. `Expires` and `Date` both present -> now + (Expires - Date).
//! 4. Otherwise -> now + the configured default TTL.
//!
//! Directive matching is anchored at the start of the header value and is
//! ASCII case-insensitive, so `public, max-age=60` does NOT match tier 2.
//! A malformed value fails its tier and falls through to the next one.

use crate::core::errors::CdnError;
use chrono::{DateTime, Utc};
use std::time::{Duration, SystemTime};

/// The wire format of `Expires` and `Date` header values.
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Computes the instant after which a response must be revalidated.
///
/// `headers` are the origin response headers with transport-canonical
/// (lowercase) names. Returns `CdnError::MissingDateHeader` when `Expires`
/// is present without a companion `Date`; callers fall back to the default
/// TTL in that case.
pub fn compute_expiry(
    headers: &[(String, String)],
    now: SystemTime,
    default_ttl: Duration,
) -> Result<SystemTime, CdnError> {
    if let Some(control) = header_value(headers, "cache-control") {
        if let Some(secs) = leading_directive_seconds(control, "s-maxage=") {
            return Ok(now + Duration::from_secs(secs));
        }
        if let Some(secs) = leading_directive_seconds(control, "max-age=") {
            return Ok(now + Duration::from_secs(secs));
        }
    }

    if let Some(expires) = header_value(headers, "expires") {
        let Some(date) = header_value(headers, "date") else {
            return Err(CdnError::MissingDateHeader);
        };
        if let Some(expires_at) = parse_http_date(expires)
            && let Some(date_at) = parse_http_date(date)
        {
            // The delta may be negative, yielding an expiry already in the
            // past; such an entity is stale on its first lookup.
            let anchored = DateTime::<Utc>::from(now) + expires_at.signed_duration_since(date_at);
            return Ok(anchored.into());
        }
        // Unparseable dates fall through to the default TTL.
    }

    Ok(now + default_ttl)
}

/// Applies `compute_expiry`, falling back to the default TTL when the
/// policy reports a missing `Date` header.
pub fn expiry_or_default(
    headers: &[(String, String)],
    now: SystemTime,
    default_ttl: Duration,
) -> SystemTime {
    compute_expiry(headers, now, default_ttl).unwrap_or(now + default_ttl)
}

/// Parses `<directive><digits>` anchored at the start of a `Cache-Control`
/// value, e.g. `max-age=60, public` with directive `max-age=` yields 60.
///
/// The directive name is matched ASCII case-insensitively. Returns `None`
/// when the value does not start with the directive or no digits follow it.
fn leading_directive_seconds(value: &str, directive: &str) -> Option<u64> {
    let head = value.get(..directive.len())?;
    if !head.eq_ignore_ascii_case(directive) {
        return None;
    }
    let rest = &value[directive.len()..];
    let digits: &str = {
        let end = rest
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        &rest[..end]
    };
    digits.parse::<u64>().ok()
}

/// Parses an HTTP wire date (`Sun, 06 Nov 1994 08:49:37 GMT`) as UTC.
fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    chrono::NaiveDateTime::parse_from_str(value, HTTP_DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
}

/// Returns the first value of the header with exactly the given name.
///
/// Lookup is case-sensitive on purpose: the transport layer canonicalizes
/// header names to lowercase before they reach any policy code.
pub fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}
