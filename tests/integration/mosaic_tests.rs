//! End-to-end mosaic tests against the mock tile service.
//!
//! Tests verify:
//! - Every tile of the grid lands at its coordinate-derived region
//! - Failed tiles leave blank regions and are not reported as errors
//! - Metadata failures abort before any tile request
//! - An unreachable tile service is reported as a session error

use std::sync::Arc;
use std::time::Duration;

use pano_mosaic::error::{MetadataError, SessionError};
use pano_mosaic::metadata::{LatLng, Location};
use pano_mosaic::mosaic::{mosaic_file_name, ImageEncoding};
use pano_mosaic::session::MosaicConfig;

use super::test_utils::{
    assert_tile_region, build_service, decode, test_config, test_grid, test_location, tile_color,
    FailMode, MockMetadataResolver, MockTileServer, BLANK, PANO_ID, TILE_SIZE,
};

// =============================================================================
// Full Grid
// =============================================================================

#[tokio::test]
async fn test_full_grid_assembles_every_tile() {
    let server = Arc::new(MockTileServer::new());
    let service = build_service(test_config(), server.clone(), MockMetadataResolver::ok());

    let image = service.fetch_mosaic(&test_location()).await.unwrap();

    assert_eq!(image.width, 6 * TILE_SIZE);
    assert_eq!(image.height, 4 * TILE_SIZE);
    assert_eq!(image.failed_tiles, 0);
    assert_eq!(image.pano_id, PANO_ID);
    assert_eq!(server.total_attempts(), 24);

    let grid = test_grid();
    let canvas = decode(&image.data);
    assert_eq!(canvas.dimensions(), (image.width, image.height));
    for coordinate in grid.coordinates() {
        assert_eq!(server.attempts_for(coordinate.x, coordinate.y), 1);
        assert_tile_region(
            &canvas,
            &grid,
            coordinate.x,
            coordinate.y,
            tile_color(coordinate.x, coordinate.y),
        );
    }
}

#[tokio::test]
async fn test_failed_tiles_leave_blank_regions() {
    let failing = [(13, 6), (16, 8), (18, 9)];
    let server = Arc::new(MockTileServer::new().failing(&failing, FailMode::Status(503)));
    let service = build_service(test_config(), server.clone(), MockMetadataResolver::ok());

    let image = service.fetch_mosaic(&test_location()).await.unwrap();

    assert_eq!(image.failed_tiles, 3);

    let grid = test_grid();
    let canvas = decode(&image.data);
    for coordinate in grid.coordinates() {
        let (x, y) = (coordinate.x, coordinate.y);
        if failing.contains(&(x, y)) {
            // Every attempt was used on the failing tiles
            assert_eq!(server.attempts_for(x, y), 3);
            assert_tile_region(&canvas, &grid, x, y, BLANK);
        } else {
            assert_eq!(server.attempts_for(x, y), 1);
            assert_tile_region(&canvas, &grid, x, y, tile_color(x, y));
        }
    }
}

#[tokio::test]
async fn test_single_transport_failure_is_not_fatal() {
    let server = Arc::new(MockTileServer::new().failing(&[(15, 7)], FailMode::Transport));
    let service = build_service(test_config(), server.clone(), MockMetadataResolver::ok());

    let image = service.fetch_mosaic(&test_location()).await.unwrap();

    assert_eq!(image.failed_tiles, 1);
    // Transport errors are not retried
    assert_eq!(server.attempts_for(15, 7), 1);
    assert_tile_region(&decode(&image.data), &test_grid(), 15, 7, BLANK);
}

#[tokio::test]
async fn test_jpeg_encoding() {
    let config = MosaicConfig {
        encoding: ImageEncoding::Jpeg,
        jpeg_quality: 95,
        ..test_config()
    };
    let service = build_service(
        config,
        Arc::new(MockTileServer::new()),
        MockMetadataResolver::ok(),
    );

    let image = service.fetch_mosaic(&test_location()).await.unwrap();

    assert_eq!(image.encoding, ImageEncoding::Jpeg);
    assert_eq!(&image.data[..2], &[0xFF, 0xD8]);
    assert_eq!(decode(&image.data).dimensions(), (96, 64));
}

// =============================================================================
// Session-Level Errors
// =============================================================================

#[tokio::test]
async fn test_not_ok_metadata_makes_no_tile_requests() {
    let server = Arc::new(MockTileServer::new());
    let resolver = MockMetadataResolver::with_status("ZERO_RESULTS");
    let service = build_service(test_config(), server.clone(), resolver.clone());

    let result = service.fetch_mosaic(&test_location()).await;

    match result {
        Err(SessionError::Metadata(MetadataError::NotOk { status })) => {
            assert_eq!(status, "ZERO_RESULTS")
        }
        other => panic!("Expected NotOk, got {:?}", other),
    }
    assert_eq!(resolver.calls(), 1);
    assert_eq!(server.total_attempts(), 0);
}

#[tokio::test]
async fn test_metadata_transport_error_makes_no_tile_requests() {
    let server = Arc::new(MockTileServer::new());
    let resolver = MockMetadataResolver::failing(MetadataError::BadStatus { status: 403 });
    let service = build_service(test_config(), server.clone(), resolver);

    let result = service.fetch_mosaic(&test_location()).await;

    assert!(matches!(
        result,
        Err(SessionError::Metadata(MetadataError::BadStatus { status: 403 }))
    ));
    assert_eq!(server.total_attempts(), 0);
}

#[tokio::test]
async fn test_unreachable_tile_service() {
    let server = Arc::new(MockTileServer::new().unreachable());
    let service = build_service(test_config(), server.clone(), MockMetadataResolver::ok());

    let result = service.fetch_mosaic(&test_location()).await;

    assert!(matches!(
        result,
        Err(SessionError::TileServiceUnreachable { failed: 24 })
    ));
    assert_eq!(server.total_attempts(), 24);
}

#[tokio::test]
async fn test_invalid_location_is_rejected_before_lookup() {
    let server = Arc::new(MockTileServer::new());
    let resolver = MockMetadataResolver::ok();
    let service = build_service(test_config(), server.clone(), resolver.clone());

    let result = service.fetch_mosaic(&Location::new(0.0, 200.0)).await;

    assert!(matches!(result, Err(SessionError::InvalidLocation { .. })));
    assert_eq!(resolver.calls(), 0);
    assert_eq!(server.total_attempts(), 0);
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_save_images_writes_jpeg() {
    let output_dir = std::env::temp_dir()
        .join("pano-mosaic-integration")
        .join(format!("save-{}", std::process::id()));
    let config = MosaicConfig {
        save_images: true,
        output_dir: output_dir.clone(),
        ..test_config()
    };
    let service = build_service(
        config,
        Arc::new(MockTileServer::new()),
        MockMetadataResolver::ok(),
    );

    let location = test_location();
    service.fetch_mosaic(&location).await.unwrap();

    let expected = output_dir.join(mosaic_file_name(
        &LatLng {
            lat: location.latitude,
            lng: location.longitude,
        },
        &test_grid(),
    ));
    assert_eq!(
        expected.file_name().unwrap().to_string_lossy(),
        "45.389661,-75.693499_x:13-19_y:6-10_5.jpeg"
    );

    // The write is detached from the response
    let mut saved = None;
    for _ in 0..100 {
        if let Ok(data) = std::fs::read(&expected) {
            // Skip partially written files
            if image::load_from_memory(&data).is_ok() {
                saved = Some(data);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let data = saved.expect("mosaic was not saved");
    assert_eq!(&data[..2], &[0xFF, 0xD8]);
    assert_eq!(decode(&data).dimensions(), (96, 64));

    std::fs::remove_dir_all(&output_dir).ok();
}
