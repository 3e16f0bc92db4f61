// tests/integration/persistence_test.rs

//! Integration tests for snapshot persistence: saving, loading, and how
//! stale entities are treated across a restart.

use super::test_helpers::{TestContext, entity_expiring, fresh_entity, stale_entity};
use pullcdn::config::PersistenceConfig;
use pullcdn::core::persistence::snapshot::{self, SnapshotLoader};
use std::time::{Duration, SystemTime};

const VALIDATOR: &str = "Mon, 01 Jan 2024 00:00:00 GMT";

fn snapshot_config(path: &str) -> PersistenceConfig {
    PersistenceConfig {
        enabled: true,
        snapshot_path: path.to_string(),
        save_interval: Duration::from_secs(60),
    }
}

// ===== Snapshot Save/Load Tests =====

#[tokio::test]
async fn test_snapshot_save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.snapshot");
    let path = path.to_str().unwrap();

    let ctx = TestContext::new();
    ctx.seed(fresh_entity("/a", "body a", Some(VALIDATOR))).await;
    ctx.seed(fresh_entity("/b", "body b", None)).await;
    snapshot::save(&ctx.state.store, path).await.unwrap();

    let restarted = TestContext::new();
    SnapshotLoader::new(snapshot_config(path))
        .load_into(&restarted.state)
        .await
        .unwrap();

    assert_eq!(restarted.state.store.len().await, 2);
    let a = restarted.stored("/a").await.expect("/a was not restored");
    assert_eq!(&a.content[..], b"body a");
    assert_eq!(a.last_modified.as_deref(), Some(VALIDATOR));
    let b = restarted.stored("/b").await.expect("/b was not restored");
    assert_eq!(&b.content[..], b"body b");
    assert_eq!(b.last_modified, None);
}

#[tokio::test]
async fn test_load_missing_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist.snapshot");

    let ctx = TestContext::new();
    SnapshotLoader::new(snapshot_config(path.to_str().unwrap()))
        .load_into(&ctx.state)
        .await
        .unwrap();
    assert_eq!(ctx.state.store.len().await, 0);
}

#[tokio::test]
async fn test_load_empty_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.snapshot");
    std::fs::write(&path, b"").unwrap();

    let ctx = TestContext::new();
    SnapshotLoader::new(snapshot_config(path.to_str().unwrap()))
        .load_into(&ctx.state)
        .await
        .unwrap();
    assert_eq!(ctx.state.store.len().await, 0);
}

#[tokio::test]
async fn test_load_corrupt_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.snapshot");
    std::fs::write(&path, b"this is not a snapshot").unwrap();

    // A bad snapshot is never fatal; the cache refills from the origin.
    let ctx = TestContext::new();
    SnapshotLoader::new(snapshot_config(path.to_str().unwrap()))
        .load_into(&ctx.state)
        .await
        .unwrap();
    assert_eq!(ctx.state.store.len().await, 0);
}

#[tokio::test]
async fn test_load_skips_entities_stale_past_grace() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.snapshot");
    let path = path.to_str().unwrap();

    let ctx = TestContext::new();
    ctx.seed(fresh_entity("/fresh", "fresh body", None)).await;
    // Stale for ten seconds: still within the default one-hour grace.
    ctx.seed(stale_entity("/recent", "recent body", None)).await;
    // Stale for two hours: past the grace, not worth restoring.
    ctx.seed(entity_expiring(
        "/ancient",
        "ancient body",
        SystemTime::now() - Duration::from_secs(2 * 3600),
        None,
    ))
    .await;
    snapshot::save(&ctx.state.store, path).await.unwrap();

    let restarted = TestContext::new();
    SnapshotLoader::new(snapshot_config(path))
        .load_into(&restarted.state)
        .await
        .unwrap();

    assert_eq!(restarted.state.store.len().await, 2);
    assert!(restarted.stored("/fresh").await.is_some());
    assert!(restarted.stored("/recent").await.is_some());
    assert!(restarted.stored("/ancient").await.is_none());
}

#[tokio::test]
async fn test_save_replaces_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.snapshot");
    let path = path.to_str().unwrap();

    let ctx = TestContext::new();
    ctx.seed(fresh_entity("/a", "body a", None)).await;
    snapshot::save(&ctx.state.store, path).await.unwrap();

    ctx.seed(fresh_entity("/b", "body b", None)).await;
    snapshot::save(&ctx.state.store, path).await.unwrap();

    let restarted = TestContext::new();
    SnapshotLoader::new(snapshot_config(path))
        .load_into(&restarted.state)
        .await
        .unwrap();
    assert_eq!(restarted.state.store.len().await, 2);
}

// ===== Sweep Eviction Tests =====

#[tokio::test]
async fn test_evict_expired_before_respects_grace() {
    let ctx = TestContext::new();
    ctx.seed(fresh_entity("/fresh", "fresh body", None)).await;
    ctx.seed(stale_entity("/recent", "recent body", None)).await;
    ctx.seed(entity_expiring(
        "/ancient",
        "ancient body",
        SystemTime::now() - Duration::from_secs(2 * 3600),
        None,
    ))
    .await;

    let cutoff = SystemTime::now() - Duration::from_secs(3600);
    let swept = ctx.state.store.evict_expired_before(cutoff).await;

    assert_eq!(swept, 1);
    assert_eq!(ctx.state.store.len().await, 2);
    assert!(ctx.stored("/ancient").await.is_none());
    assert!(ctx.stored("/recent").await.is_some());
}
