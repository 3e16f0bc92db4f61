// src/server/http.rs

//! The axum front end: a fallback route that funnels every path into the
//! cache handler, plus the optional JSON stats server on its own port.

use crate::core::errors::CdnError;
use crate::core::handler::{CDN_STATUS_HEADER, ProxyResponse, handle_request};
use crate::core::state::ServerState;
use axum::body::Body;
use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Hop-by-hop headers the proxy never forwards; the transport layer
/// recomputes them for each response.
const SKIPPED_HEADERS: [&str; 3] = ["connection", "transfer-encoding", "content-length"];

/// Builds the proxy router. Every path (and query) is a cache key, so the
/// whole surface hangs off the fallback rather than a route table.
pub fn proxy_router(state: Arc<ServerState>) -> Router {
    Router::new().fallback(proxy_handler).with_state(state)
}

/// Resolves one inbound request through the cache handler.
///
/// HEAD is served like GET; hyper elides the body on the wire. Any other
/// method gets a 405.
async fn proxy_handler(
    State(state): State<Arc<ServerState>>,
    OriginalUri(uri): OriginalUri,
    method: Method,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, HEAD")],
            "Method Not Allowed",
        )
            .into_response();
    }

    // The path plus query string is the cache key, verbatim.
    let key = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    let if_modified_since = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok());

    match handle_request(&state, key, if_modified_since).await {
        Ok(proxied) => render_response(proxied),
        Err(e) => {
            warn!("Request for '{key}' failed: {e}");
            error_response(&e)
        }
    }
}

/// Assembles the outbound response: stored headers minus hop-by-hop ones,
/// the diagnostic tag, then the body.
fn render_response(proxied: ProxyResponse) -> Response {
    let status = StatusCode::from_u16(proxied.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);

    for (name, value) in &proxied.headers {
        if SKIPPED_HEADERS.contains(&name.as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            builder = builder.header(name, value);
        }
    }
    builder = builder.header(CDN_STATUS_HEADER, proxied.cdn_status.as_str());

    builder
        .body(Body::from(proxied.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Maps a terminal handler error to the 5xx the client sees.
fn error_response(err: &CdnError) -> Response {
    let status = match err {
        CdnError::OriginUnavailable(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string()).into_response()
}

/// Handles HTTP requests to the /stats endpoint.
async fn stats_handler(state: Arc<ServerState>) -> impl IntoResponse {
    let snapshot = state
        .stats
        .snapshot(state.store.len().await, state.store.memory_usage().await);

    match serde_json::to_string(&snapshot) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Runs a simple HTTP server to expose the proxy counters as JSON on /stats.
pub async fn run_stats_server(state: Arc<ServerState>, mut shutdown_rx: broadcast::Receiver<()>) {
    let port = state.config.stats.port;

    let app = Router::new().route("/stats", get(move || stats_handler(state.clone())));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Stats server listening on http://{}/stats", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind stats server on port {}: {}", port, e);
            return;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_rx.recv().await.ok();
            info!("Stats server shutting down.");
        })
        .await
        .unwrap();
}
