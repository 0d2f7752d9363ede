//! Session lifecycle tests.
//!
//! Tests verify:
//! - One session serves several mosaics on the same pool
//! - Non-terminal errors leave the session usable
//! - An interrupted request never leaks results into the next mosaic
//! - Cancelling the session stops in-flight work promptly

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use pano_mosaic::error::SessionError;
use pano_mosaic::metadata::Location;
use pano_mosaic::session::MosaicSession;

use super::test_utils::{
    assert_tile_region, build_service, decode, test_config, test_grid, test_location, tile_color,
    MockMetadataResolver, MockTileServer,
};

#[tokio::test]
async fn test_session_serves_sequential_requests() {
    let server = Arc::new(MockTileServer::new());
    let service = Arc::new(build_service(
        test_config(),
        server.clone(),
        MockMetadataResolver::ok(),
    ));
    let mut session = MosaicSession::new(service, CancellationToken::new());
    let workers = session.pool().worker_count();

    for round in 1..=3 {
        let image = session.handle(&test_location()).await.unwrap();
        assert_eq!(image.failed_tiles, 0);
        assert_eq!(server.total_attempts(), 24 * round);
    }

    // Same pool throughout
    assert_eq!(session.pool().worker_count(), workers);
    assert_eq!(session.pool().active_workers(), workers);

    session.close().await;
}

#[tokio::test]
async fn test_session_continues_after_invalid_location() {
    let server = Arc::new(MockTileServer::new());
    let service = Arc::new(build_service(
        test_config(),
        server.clone(),
        MockMetadataResolver::ok(),
    ));
    let mut session = MosaicSession::new(service, CancellationToken::new());

    let err = session
        .handle(&Location::new(-91.0, 0.0))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidLocation { .. }));
    assert!(!err.is_terminal());

    let image = session.handle(&test_location()).await.unwrap();
    assert_eq!(image.failed_tiles, 0);

    session.close().await;
}

#[tokio::test]
async fn test_interrupted_request_does_not_leak_into_next() {
    let server = Arc::new(MockTileServer::new().with_delay(Duration::from_millis(20)));
    let service = Arc::new(build_service(
        test_config(),
        server.clone(),
        MockMetadataResolver::ok(),
    ));
    let mut session = MosaicSession::new(service, CancellationToken::new());

    // Abandon the first request mid-flight
    let interrupted =
        tokio::time::timeout(Duration::from_millis(5), session.handle(&test_location())).await;
    assert!(interrupted.is_err());

    let image = session.handle(&test_location()).await.unwrap();
    assert_eq!(image.failed_tiles, 0);

    let grid = test_grid();
    let canvas = decode(&image.data);
    for coordinate in grid.coordinates() {
        assert_tile_region(
            &canvas,
            &grid,
            coordinate.x,
            coordinate.y,
            tile_color(coordinate.x, coordinate.y),
        );
    }

    session.close().await;
}

#[tokio::test]
async fn test_cancel_stops_in_flight_request() {
    let server = Arc::new(MockTileServer::new().with_delay(Duration::from_secs(60)));
    let service = Arc::new(build_service(
        test_config(),
        server.clone(),
        MockMetadataResolver::ok(),
    ));
    let cancel = CancellationToken::new();
    let mut session = MosaicSession::new(service, cancel.clone());

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        })
    };

    let result = tokio::time::timeout(Duration::from_secs(5), session.handle(&test_location()))
        .await
        .expect("cancellation did not stop the request");
    assert!(matches!(result, Err(SessionError::Assemble(_))));

    canceller.await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), session.close())
        .await
        .expect("close did not finish");
}

#[tokio::test]
async fn test_close_cancels_session_token() {
    let service = Arc::new(build_service(
        test_config(),
        Arc::new(MockTileServer::new()),
        MockMetadataResolver::ok(),
    ));
    let cancel = CancellationToken::new();
    let session = MosaicSession::new(service, cancel.clone());

    assert!(!session.pool().is_stopped());
    session.close().await;
    assert!(cancel.is_cancelled());
}
