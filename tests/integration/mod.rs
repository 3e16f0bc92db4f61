// tests/integration/mod.rs

//! Integration tests for pullcdn
//!
//! These tests drive the request state machine end-to-end against a
//! scripted origin, verifying miss classification, revalidation behavior,
//! and snapshot persistence.

pub mod persistence_test;
