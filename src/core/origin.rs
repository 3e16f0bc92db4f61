// src/core/origin.rs

//! The upstream HTTP client capability.
//!
//! The proxy core only ever issues GETs against a single configured origin,
//! optionally carrying an `If-Modified-Since` validator. The trait keeps the
//! transport swappable; production uses the `reqwest`-backed implementation,
//! tests script their own.

use crate::core::errors::CdnError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderValue, IF_MODIFIED_SINCE};
use std::time::Duration;
use url::Url;

/// An origin response, decoupled from the transport crate's types.
///
/// Header names are transport-canonical (lowercase); pairs keep the wire
/// order, with repeated names appearing once per value.
#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Performs HTTP GETs against the configured origin.
#[async_trait]
pub trait OriginClient: Send + Sync {
    /// Fetches `path` (path plus query, as received from the client) from the
    /// origin. `if_modified_since` carries the stored validator verbatim for
    /// conditional revalidation requests.
    async fn fetch(
        &self,
        path: &str,
        if_modified_since: Option<&str>,
    ) -> Result<OriginResponse, CdnError>;
}

/// `OriginClient` backed by `reqwest`, bounded by a per-request timeout.
pub struct HttpOriginClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpOriginClient {
    /// Builds the client. `base_url` must carry a trailing slash; the config
    /// layer enforces that before this runs.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, CdnError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CdnError::InvalidConfig(format!("origin client: {e}")))?;
        Ok(Self { client, base_url })
    }

    /// Joins the request path onto the base URL, collapsing the doubled
    /// slash between the base's trailing `/` and the path's leading `/`.
    fn origin_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.strip_prefix('/').unwrap_or(path))
    }
}

#[async_trait]
impl OriginClient for HttpOriginClient {
    async fn fetch(
        &self,
        path: &str,
        if_modified_since: Option<&str>,
    ) -> Result<OriginResponse, CdnError> {
        let mut request = self.client.get(self.origin_url(path));
        if let Some(validator) = if_modified_since
            && let Ok(value) = HeaderValue::from_str(validator)
        {
            request = request.header(IF_MODIFIED_SINCE, value);
        }

        let res = request.send().await?;
        let status = res.status().as_u16();
        let headers = res
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = res.bytes().await?;

        Ok(OriginResponse {
            status,
            headers,
            body,
        })
    }
}
