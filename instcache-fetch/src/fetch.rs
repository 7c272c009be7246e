//! HTTP fetcher implementation.
//!
//! Plain GET requests: no body, no custom headers, no credentials. The
//! status is handed back untouched; deciding what to accept is up to the
//! caller.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use instcache_core::constants::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_FETCH_TIMEOUT_SECS};
use instcache_core::error::{InstanceCacheError, Result};
use instcache_core::traits::{FetchResponse, Fetcher, ResponseBody};

/// Fetcher configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Overall request timeout in seconds, body included
    pub timeout_seconds: u64,
    /// TCP connect timeout in seconds
    pub connect_timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_FETCH_TIMEOUT_SECS,
            connect_timeout_seconds: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl FetchConfig {
    /// Creates a config with the given overall timeout.
    pub fn with_timeout(timeout_seconds: u64) -> Self {
        Self {
            timeout_seconds,
            ..Default::default()
        }
    }
}

/// HTTP fetcher backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    config: FetchConfig,
    http_client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(FetchConfig::default())
    }

    /// Creates a fetcher with custom configuration.
    pub fn with_config(config: FetchConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .map_err(|e| InstanceCacheError::ConfigError(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Returns the configuration in use.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn get(&self, url: &str) -> Result<FetchResponse> {
        let parsed = url::Url::parse(url).map_err(|e| InstanceCacheError::MalformedSource {
            uri: url.to_string(),
            reason: e.to_string(),
        })?;

        let response = self
            .http_client
            .get(parsed)
            .send()
            .await
            .map_err(|e| InstanceCacheError::transport(url, describe(&e)))?;

        let status = response.status().as_u16();
        let resource_uri = response.url().to_string();
        debug!(url, status, "Received response");

        Ok(FetchResponse {
            status,
            resource_uri: resource_uri.clone(),
            body: Box::new(HttpBody {
                uri: resource_uri,
                response: Some(response),
            }),
        })
    }
}

/// Body of an HTTP response. The connection is returned to the pool or
/// closed when this is dropped.
struct HttpBody {
    uri: String,
    response: Option<reqwest::Response>,
}

#[async_trait]
impl ResponseBody for HttpBody {
    async fn read_all(&mut self) -> Result<Bytes> {
        let response = self
            .response
            .take()
            .ok_or_else(|| InstanceCacheError::transport(&self.uri, "response body already consumed"))?;

        response
            .bytes()
            .await
            .map_err(|e| InstanceCacheError::transport(&self.uri, describe(&e)))
    }
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}
