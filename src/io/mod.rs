//! Network I/O layer.
//!
//! Everything that talks to the upstream imagery services goes through the
//! [`HttpClient`] trait so the fetch and metadata logic can be exercised
//! against in-memory mocks.

mod http_client;
mod reqwest_client;

pub use http_client::{HttpClient, HttpResponse};
pub use reqwest_client::{ReqwestClient, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_USER_AGENT};
