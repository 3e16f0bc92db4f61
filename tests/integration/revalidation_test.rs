// tests/integration/revalidation_test.rs

//! Integration tests for stale-entity revalidation and the single-flight
//! behavior of concurrent requests.

use super::test_helpers::{TestContext, origin_response, stale_entity};
use pullcdn::core::CdnError;
use pullcdn::core::CdnStatus;
use std::sync::atomic::Ordering;
use std::time::SystemTime;

const VALIDATOR: &str = "Mon, 01 Jan 2024 00:00:00 GMT";

// ===== Revalidation Tests =====

#[tokio::test]
async fn test_stale_entity_confirmed_by_304() {
    let ctx = TestContext::new();
    ctx.seed(stale_entity("/doc", "stored body", Some(VALIDATOR)))
        .await;
    ctx.origin.push(origin_response(
        304,
        &[("cache-control", "max-age=120"), ("last-modified", VALIDATOR)],
        "",
    ));

    let res = ctx.request("/doc").await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.cdn_status, CdnStatus::Hit);
    assert_eq!(&res.body[..], b"stored body");

    // The conditional fetch carried the stored validator.
    assert_eq!(
        ctx.origin.requests(),
        vec![("/doc".to_string(), Some(VALIDATOR.to_string()))]
    );
    assert_eq!(ctx.state.stats.revalidations.load(Ordering::Relaxed), 1);

    let stored = ctx.stored("/doc").await.expect("entity was evicted");
    assert!(stored.is_fresh(SystemTime::now()));
    assert_eq!(&stored.content[..], b"stored body");
}

#[tokio::test]
async fn test_stale_entity_replaced_by_200() {
    let new_validator = "Tue, 02 Jan 2024 00:00:00 GMT";
    let ctx = TestContext::new();
    ctx.seed(stale_entity("/doc", "old body", Some(VALIDATOR)))
        .await;
    ctx.origin.push(origin_response(
        200,
        &[
            ("cache-control", "max-age=120"),
            ("last-modified", new_validator),
        ],
        "new body",
    ));

    let res = ctx.request("/doc").await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.cdn_status, CdnStatus::Hit);
    assert_eq!(&res.body[..], b"new body");

    let stored = ctx.stored("/doc").await.expect("entity was evicted");
    assert_eq!(&stored.content[..], b"new body");
    assert_eq!(stored.last_modified.as_deref(), Some(new_validator));
    assert!(stored.is_fresh(SystemTime::now()));
    assert_eq!(ctx.state.stats.revalidations.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_304_metadata_replaces_stored_metadata() {
    // The 304's headers are authoritative: a confirmation without a
    // Last-Modified clears the stored validator.
    let ctx = TestContext::new();
    ctx.seed(stale_entity("/doc", "stored body", Some(VALIDATOR)))
        .await;
    ctx.origin
        .push(origin_response(304, &[("cache-control", "max-age=120")], ""));

    let res = ctx.request("/doc").await.unwrap();
    assert_eq!(res.cdn_status, CdnStatus::Hit);

    let stored = ctx.stored("/doc").await.expect("entity was evicted");
    assert_eq!(stored.last_modified, None);
}

#[tokio::test]
async fn test_failed_revalidation_serves_stale_once() {
    let ctx = TestContext::new();
    ctx.seed(stale_entity("/doc", "stale body", Some(VALIDATOR)))
        .await;
    ctx.origin
        .push_error(CdnError::OriginUnavailable("connection refused".into()));

    // One final serve from the stale copy, then the entity is gone.
    let res = ctx.request("/doc").await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.cdn_status, CdnStatus::StaleServed);
    assert_eq!(&res.body[..], b"stale body");
    assert!(ctx.stored("/doc").await.is_none());
    assert_eq!(ctx.state.stats.stale_serves.load(Ordering::Relaxed), 1);
    assert_eq!(ctx.state.stats.evictions.load(Ordering::Relaxed), 1);

    // The next request is an ordinary miss against a recovered origin.
    ctx.origin.push(origin_response(
        200,
        &[("cache-control", "max-age=300")],
        "rebuilt body",
    ));
    let res = ctx.request("/doc").await.unwrap();
    assert_eq!(res.cdn_status, CdnStatus::MissCached);
    assert_eq!(&res.body[..], b"rebuilt body");
    assert_eq!(ctx.origin.calls(), 2);
}

#[tokio::test]
async fn test_unexpected_status_counts_as_failed_revalidation() {
    let ctx = TestContext::new();
    ctx.seed(stale_entity("/doc", "stale body", Some(VALIDATOR)))
        .await;
    ctx.origin.push(origin_response(500, &[], "origin error page"));

    // The 500 body is not what gets served; the stale copy is.
    let res = ctx.request("/doc").await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.cdn_status, CdnStatus::StaleServed);
    assert_eq!(&res.body[..], b"stale body");
    assert!(ctx.stored("/doc").await.is_none());
}

#[tokio::test]
async fn test_revalidation_without_validator_is_unconditional() {
    let ctx = TestContext::new();
    ctx.seed(stale_entity("/doc", "old body", None)).await;
    ctx.origin.push(origin_response(
        200,
        &[("cache-control", "max-age=120")],
        "new body",
    ));

    let res = ctx.request("/doc").await.unwrap();
    assert_eq!(res.cdn_status, CdnStatus::Hit);
    assert_eq!(&res.body[..], b"new body");
    assert_eq!(ctx.origin.requests(), vec![("/doc".to_string(), None)]);
}

// ===== Single-Flight Tests =====

#[tokio::test]
async fn test_concurrent_stale_requests_fetch_once() {
    let ctx = TestContext::new();
    ctx.seed(stale_entity("/doc", "stored body", Some(VALIDATOR)))
        .await;
    // Exactly one scripted response: a second fetch would fail the test.
    ctx.origin.push(origin_response(
        304,
        &[("cache-control", "max-age=120"), ("last-modified", VALIDATOR)],
        "",
    ));

    let (a, b) = tokio::join!(ctx.request("/doc"), ctx.request("/doc"));
    let a = a.unwrap();
    let b = b.unwrap();

    assert_eq!(a.cdn_status, CdnStatus::Hit);
    assert_eq!(b.cdn_status, CdnStatus::Hit);
    assert_eq!(&a.body[..], b"stored body");
    assert_eq!(&b.body[..], b"stored body");
    assert_eq!(ctx.origin.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_misses_fetch_once() {
    let ctx = TestContext::new();
    ctx.origin.push(origin_response(
        200,
        &[("cache-control", "max-age=300")],
        "shared body",
    ));

    let (a, b) = tokio::join!(ctx.request("/page"), ctx.request("/page"));
    let a = a.unwrap();
    let b = b.unwrap();

    // Whoever won the lease did the fetch; the other observed the stored
    // result.
    assert!(
        matches!(
            (a.cdn_status, b.cdn_status),
            (CdnStatus::MissCached, CdnStatus::Hit) | (CdnStatus::Hit, CdnStatus::MissCached)
        ),
        "expected one miss and one hit, got {:?} and {:?}",
        a.cdn_status,
        b.cdn_status
    );
    assert_eq!(&a.body[..], b"shared body");
    assert_eq!(&b.body[..], b"shared body");
    assert_eq!(ctx.origin.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_distinct_keys_fetch_independently() {
    let ctx = TestContext::new();
    for _ in 0..2 {
        ctx.origin.push(origin_response(
            200,
            &[("cache-control", "max-age=300")],
            "shared body",
        ));
    }

    let (a, b) = tokio::join!(ctx.request("/a"), ctx.request("/b"));
    assert_eq!(a.unwrap().cdn_status, CdnStatus::MissCached);
    assert_eq!(b.unwrap().cdn_status, CdnStatus::MissCached);
    assert_eq!(ctx.origin.calls(), 2);
}
