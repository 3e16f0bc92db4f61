// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the proxy.
/// Using `thiserror` allows for clean error definitions and automatic `From` trait implementations.
#[derive(Error, Debug, Clone)]
pub enum CdnError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// `Expires` was present without a companion `Date` header during freshness
    /// computation. Callers fall back to the default TTL instead of failing the request.
    #[error("Expires header present without a Date header")]
    MissingDateHeader,

    /// The origin could not be reached, timed out, or answered in a way the
    /// conditional-request handling does not model.
    #[error("Origin unavailable: {0}")]
    OriginUnavailable(String),

    /// A cache store read or write failed. The previously stored entity, if
    /// any, is left untouched.
    #[error("Cache store failure: {0}")]
    StoreFailure(String),

    /// A persisted snapshot could not be decoded.
    #[error("Corrupt snapshot: {0}")]
    Corrupt(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl PartialEq for CdnError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CdnError::Io(e1), CdnError::Io(e2)) => e1.to_string() == e2.to_string(),
            (CdnError::OriginUnavailable(s1), CdnError::OriginUnavailable(s2)) => s1 == s2,
            (CdnError::StoreFailure(s1), CdnError::StoreFailure(s2)) => s1 == s2,
            (CdnError::Corrupt(s1), CdnError::Corrupt(s2)) => s1 == s2,
            (CdnError::InvalidConfig(s1), CdnError::InvalidConfig(s2)) => s1 == s2,
            (CdnError::Internal(s1), CdnError::Internal(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for CdnError {
    fn from(e: std::io::Error) -> Self {
        CdnError::Io(Arc::new(e))
    }
}

impl From<reqwest::Error> for CdnError {
    fn from(e: reqwest::Error) -> Self {
        CdnError::OriginUnavailable(e.to_string())
    }
}
