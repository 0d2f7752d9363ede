use std::time::Duration;

use async_trait::async_trait;

use super::http_client::{HttpClient, HttpResponse};
use crate::error::IoError;

/// Default request timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// User-Agent sent with every request.
///
/// The tile endpoint rejects requests that carry no User-Agent.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// [`HttpClient`] backed by a pooled `reqwest` client.
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Create a client with the default timeout.
    pub fn new() -> Result<Self, IoError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, IoError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| IoError::Connection(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, IoError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| IoError::Body(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}
