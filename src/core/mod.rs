// src/core/mod.rs

//! The central module containing the caching engine of pullcdn.

pub mod cacheability;
pub mod errors;
pub mod freshness;
pub mod handler;
pub mod origin;
pub mod persistence;
pub mod revalidation;
pub mod singleflight;
pub mod state;
pub mod storage;
pub mod tasks;

pub use errors::CdnError;
pub use handler::CdnStatus;
