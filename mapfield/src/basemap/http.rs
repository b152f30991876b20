//! HTTP client abstraction for basemap fetching.
//!
//! The trait exists for dependency injection: the engine is exercised in
//! tests with a mock client instead of a live tile or raster server.

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, warn};

use super::types::BasemapError;

/// Boxed future so the trait stays object-safe; basemap resolution holds
/// clients as `Arc<dyn AsyncHttpClient>`.
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, BasemapError>> + Send + 'a>>;

/// Async HTTP GET, the only operation basemap resolution needs.
pub trait AsyncHttpClient: Send + Sync {
    /// Fetches the response body for `url`.
    fn get<'a>(&'a self, url: &'a str) -> FetchFuture<'a>;
}

/// Real HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

const DEFAULT_TIMEOUT_SECS: u64 = 30;

impl ReqwestClient {
    /// Creates a client with the default 30s timeout.
    pub fn new() -> Result<Self, BasemapError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, BasemapError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| BasemapError::Fetch(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl AsyncHttpClient for ReqwestClient {
    fn get<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            let response = match self.client.get(url).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(url = url, error = %e, "basemap request failed");
                    return Err(BasemapError::Fetch(format!("request failed: {}", e)));
                }
            };

            if !response.status().is_success() {
                warn!(
                    url = url,
                    status = response.status().as_u16(),
                    "basemap request returned error status"
                );
                return Err(BasemapError::Fetch(format!(
                    "HTTP {} from {}",
                    response.status(),
                    url
                )));
            }

            match response.bytes().await {
                Ok(bytes) => {
                    debug!(url = url, bytes = bytes.len(), "basemap fetched");
                    Ok(bytes.to_vec())
                }
                Err(e) => Err(BasemapError::Fetch(format!(
                    "failed to read response: {}",
                    e
                ))),
            }
        })
    }
}
