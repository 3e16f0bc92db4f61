// src/core/tasks/mod.rs

//! This module contains all long-running background tasks that support the
//! proxy's core functionality: snapshot saving, expired-entity sweeping,
//! and lease-map hygiene.

pub mod lease_cleaner;
pub mod snapshot;
pub mod sweeper;
