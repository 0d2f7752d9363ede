//! API integration tests for the HTTP endpoints.
//!
//! Tests verify:
//! - Health check
//! - Mosaic retrieval with headers and body
//! - Error cases mapped to status codes and JSON bodies

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use pano_mosaic::error::MetadataError;
use pano_mosaic::{create_router, RouterConfig};

use super::test_utils::{
    build_service, decode, test_config, FailMode, MockMetadataResolver, MockTileServer, PANO_ID,
};

fn router(server: MockTileServer, resolver: MockMetadataResolver) -> Router {
    let service = build_service(test_config(), Arc::new(server), resolver);
    create_router(service, RouterConfig::new().with_tracing(false))
}

async fn get(router: Router, uri: &str) -> axum::response::Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router.oneshot(request).await.unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let response = get(
        router(MockTileServer::new(), MockMetadataResolver::ok()),
        "/health",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// Mosaic
// =============================================================================

#[tokio::test]
async fn test_mosaic_success() {
    let response = get(
        router(MockTileServer::new(), MockMetadataResolver::ok()),
        "/mosaic?lat=45.389661&lng=-75.693499",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers.get("content-type").unwrap(), "image/png");
    assert_eq!(headers.get("x-mosaic-width").unwrap(), "96");
    assert_eq!(headers.get("x-mosaic-height").unwrap(), "64");
    assert_eq!(headers.get("x-mosaic-failed-tiles").unwrap(), "0");
    assert_eq!(headers.get("x-pano-id").unwrap(), PANO_ID);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(decode(&body).dimensions(), (96, 64));
}

#[tokio::test]
async fn test_mosaic_reports_failed_tiles() {
    let server = MockTileServer::new().failing(&[(14, 7), (17, 9)], FailMode::Status(404));
    let response = get(
        router(server, MockMetadataResolver::ok()),
        "/mosaic?lat=1&lng=2",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-mosaic-failed-tiles").unwrap(), "2");
}

#[tokio::test]
async fn test_mosaic_invalid_location() {
    let response = get(
        router(MockTileServer::new(), MockMetadataResolver::ok()),
        "/mosaic?lat=100&lng=0",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_location");
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_mosaic_missing_parameters() {
    let response = get(
        router(MockTileServer::new(), MockMetadataResolver::ok()),
        "/mosaic?lat=1",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_mosaic_no_panorama() {
    let response = get(
        router(
            MockTileServer::new(),
            MockMetadataResolver::with_status("ZERO_RESULTS"),
        ),
        "/mosaic?lat=1&lng=2",
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = json_body(response).await;
    assert_eq!(json["error"], "no_panorama");
    assert_eq!(json["message"], "ZERO_RESULTS");
}

#[tokio::test]
async fn test_mosaic_metadata_failure() {
    let resolver = MockMetadataResolver::failing(MetadataError::BadStatus { status: 500 });
    let response = get(
        router(MockTileServer::new(), resolver),
        "/mosaic?lat=1&lng=2",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["error"], "metadata_error");
}

#[tokio::test]
async fn test_mosaic_tile_service_unreachable() {
    let response = get(
        router(MockTileServer::new().unreachable(), MockMetadataResolver::ok()),
        "/mosaic?lat=1&lng=2",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        json_body(response).await["error"],
        "tile_service_unreachable"
    );
}

// =============================================================================
// Session
// =============================================================================

#[tokio::test]
async fn test_session_requires_websocket_upgrade() {
    let response = get(
        router(MockTileServer::new(), MockMetadataResolver::ok()),
        "/session",
    )
    .await;

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_unknown_route() {
    let response = get(
        router(MockTileServer::new(), MockMetadataResolver::ok()),
        "/tiles/0/0",
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
