use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Status code the upstream services use to signal success.
pub const STATUS_OK: u16 = 200;

/// A fully-read HTTP response.
///
/// Non-success statuses are not errors at this layer; callers decide what a
/// status means (the tile fetcher retries them, the metadata client rejects
/// them).
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,

    /// Response body
    pub body: Bytes,
}

impl HttpResponse {
    /// Create a response from a status and body.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is `200 OK`.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// The body as lossy UTF-8, for error messages.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Trait for issuing GET requests to an upstream service.
///
/// Implementations must be thread-safe: a single client is shared by every
/// worker in a pool.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform a GET request and read the whole body.
    ///
    /// Returns `Err` only for transport failures. Any status code the server
    /// answered with is returned as `Ok`.
    async fn get(&self, url: &str) -> Result<HttpResponse, IoError>;
}
