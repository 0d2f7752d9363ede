//! HTTP request handlers for the mosaic API.
//!
//! # Endpoints
//!
//! - `GET /mosaic?lat={lat}&lng={lng}` - Build and return one mosaic
//! - `GET /health` - Health check endpoint
//!
//! The streaming endpoint lives in [`super::ws`].

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{MetadataError, SessionError};
use crate::io::HttpClient;
use crate::metadata::{Location, MetadataResolver};
use crate::session::{MosaicImage, MosaicService};

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the mosaic service.
pub struct AppState<C: HttpClient + 'static, M: MetadataResolver> {
    pub service: Arc<MosaicService<C, M>>,
}

impl<C, M> AppState<C, M>
where
    C: HttpClient + 'static,
    M: MetadataResolver,
{
    pub fn new(service: MosaicService<C, M>) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

impl<C, M> Clone for AppState<C, M>
where
    C: HttpClient + 'static,
    M: MetadataResolver,
{
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for mosaic requests.
#[derive(Debug, Deserialize)]
pub struct MosaicQueryParams {
    /// Latitude in decimal degrees
    pub lat: f64,

    /// Longitude in decimal degrees
    pub lng: f64,
}

impl MosaicQueryParams {
    pub fn location(&self) -> Location {
        Location::new(self.lat, self.lng)
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "invalid_location", "no_panorama")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// HTTP status and error identifier for a session error.
pub fn error_status(err: &SessionError) -> (StatusCode, &'static str) {
    match err {
        SessionError::InvalidLocation { .. } => (StatusCode::BAD_REQUEST, "invalid_location"),
        SessionError::Metadata(MetadataError::NotOk { .. }) => {
            (StatusCode::NOT_FOUND, "no_panorama")
        }
        SessionError::Metadata(_) => (StatusCode::BAD_GATEWAY, "metadata_error"),
        SessionError::TileServiceUnreachable { .. } => {
            (StatusCode::BAD_GATEWAY, "tile_service_unreachable")
        }
        SessionError::Pool(_) | SessionError::Assemble(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "pool_error")
        }
        SessionError::Encode { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "encode_error"),
    }
}

/// Convert SessionError to HTTP response.
///
/// - 5xx errors are logged at ERROR level
/// - 404 (no panorama at the location) at DEBUG level
/// - other 4xx errors at WARN level
impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let (status, error_type) = error_status(&self);
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "No panorama: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle one-shot mosaic requests.
///
/// # Endpoint
///
/// `GET /mosaic?lat={lat}&lng={lng}`
///
/// # Response
///
/// `200 OK` with the encoded mosaic as the body and:
/// - `Content-Type`: `image/png` or `image/jpeg`
/// - `X-Mosaic-Width`, `X-Mosaic-Height`: canvas size in pixels
/// - `X-Mosaic-Failed-Tiles`: number of tiles left blank
/// - `X-Pano-Id`: panorama the mosaic was built from
///
/// A fresh worker pool is created for the request and stopped afterwards.
pub async fn mosaic_handler<C, M>(
    State(state): State<AppState<C, M>>,
    Query(query): Query<MosaicQueryParams>,
) -> Result<Response, SessionError>
where
    C: HttpClient + 'static,
    M: MetadataResolver + 'static,
{
    let image = state.service.fetch_mosaic(&query.location()).await?;
    Ok(mosaic_response(image))
}

fn mosaic_response(image: MosaicImage) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(image.encoding.content_type()),
    );
    headers.insert("x-mosaic-width", HeaderValue::from(image.width));
    headers.insert("x-mosaic-height", HeaderValue::from(image.height));
    headers.insert(
        "x-mosaic-failed-tiles",
        HeaderValue::from(image.failed_tiles),
    );
    // Panorama ids are URL-safe, but never fail the response over a header
    if let Ok(pano_id) = HeaderValue::from_str(&image.pano_id) {
        headers.insert("x-pano-id", pano_id);
    }

    (StatusCode::OK, headers, Body::from(image.data)).into_response()
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
