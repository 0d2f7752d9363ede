//! Streaming session tests over a real WebSocket.
//!
//! Tests verify:
//! - Every mosaic is a header text frame followed by one binary frame
//! - Requests sent during a mosaic are queued and served in turn
//! - The queue is bounded and the excess is answered with error frames
//! - Non-terminal errors keep the session open
//! - Terminal errors answer queued requests and close with code 1011
//! - A client disconnect cancels in-flight tile fetches

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use image::RgbaImage;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use pano_mosaic::metadata::Location;
use pano_mosaic::{create_router, RouterConfig, MAX_PENDING_REQUESTS};

use super::test_utils::{
    build_service, decode, test_config, test_location, MockMetadataResolver, MockTileServer,
    PANO_ID, TILE_SIZE,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const FRAME_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Helpers
// =============================================================================

async fn start_server(server: Arc<MockTileServer>, resolver: MockMetadataResolver) -> SocketAddr {
    let service = build_service(test_config(), server, resolver);
    let router = create_router(service, RouterConfig::new().with_tracing(false));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}/session", addr))
        .await
        .unwrap();
    client
}

async fn send_location(client: &mut Client, location: &Location) {
    let frame = json!({ "location": location }).to_string();
    client.send(Message::text(frame)).await.unwrap();
}

async fn next_frame(client: &mut Client) -> Message {
    tokio::time::timeout(FRAME_TIMEOUT, client.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("session ended early")
        .expect("WebSocket error")
}

async fn next_json(client: &mut Client) -> Value {
    match next_frame(client).await {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("Expected text frame, got {:?}", other),
    }
}

/// Read one image header and the binary frame it announces.
async fn next_image(client: &mut Client) -> (Value, RgbaImage) {
    let header = next_json(client).await;
    assert!(header.get("image").is_some(), "Expected image, got {}", header);

    match next_frame(client).await {
        Message::Binary(data) => {
            assert_eq!(data.len() as u64, header["image"]["size"].as_u64().unwrap());
            (header, decode(&data))
        }
        other => panic!("Expected binary frame, got {:?}", other),
    }
}

fn error_description(frame: &Value) -> &str {
    frame["error"]["description"]
        .as_str()
        .unwrap_or_else(|| panic!("Expected error, got {}", frame))
}

async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

// =============================================================================
// Images
// =============================================================================

#[tokio::test]
async fn test_session_sends_header_then_image() {
    let addr = start_server(Arc::new(MockTileServer::new()), MockMetadataResolver::ok()).await;
    let mut client = connect(addr).await;

    send_location(&mut client, &test_location()).await;
    let (header, image) = next_image(&mut client).await;

    assert_eq!(header["image"]["width"], 6 * TILE_SIZE);
    assert_eq!(header["image"]["height"], 4 * TILE_SIZE);
    assert_eq!(header["image"]["format"], "png");
    assert_eq!(header["image"]["pano_id"], PANO_ID);
    assert_eq!(header["image"]["failed_tiles"], 0);
    assert_eq!(image.dimensions(), (6 * TILE_SIZE, 4 * TILE_SIZE));

    client.close(None).await.unwrap();
}

#[tokio::test]
async fn test_requests_during_mosaic_are_queued() {
    let server = Arc::new(MockTileServer::new().with_delay(Duration::from_millis(20)));
    let resolver = MockMetadataResolver::ok();
    let addr = start_server(server.clone(), resolver.clone()).await;
    let mut client = connect(addr).await;

    for _ in 0..3 {
        send_location(&mut client, &test_location()).await;
    }
    for _ in 0..3 {
        let (header, _) = next_image(&mut client).await;
        assert_eq!(header["image"]["failed_tiles"], 0);
    }

    assert_eq!(resolver.calls(), 3);
    assert_eq!(server.total_attempts(), 3 * 24);

    client.close(None).await.unwrap();
}

#[tokio::test]
async fn test_pending_queue_is_bounded() {
    let server = Arc::new(MockTileServer::new().with_delay(Duration::from_millis(50)));
    let addr = start_server(server, MockMetadataResolver::ok()).await;
    let mut client = connect(addr).await;

    let overflow = 2;
    let total = 1 + MAX_PENDING_REQUESTS + overflow;
    for _ in 0..total {
        send_location(&mut client, &test_location()).await;
    }

    let mut images = 0;
    let mut rejected = 0;
    while images < 1 + MAX_PENDING_REQUESTS {
        let frame = next_json(&mut client).await;
        if frame.get("image").is_some() {
            match next_frame(&mut client).await {
                Message::Binary(_) => images += 1,
                other => panic!("Expected binary frame, got {:?}", other),
            }
        } else {
            assert!(error_description(&frame).contains("too many pending requests"));
            rejected += 1;
        }
    }

    assert_eq!(rejected, overflow);

    client.close(None).await.unwrap();
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_non_terminal_errors_keep_session_open() {
    let addr = start_server(Arc::new(MockTileServer::new()), MockMetadataResolver::ok()).await;
    let mut client = connect(addr).await;

    client.send(Message::text("not json")).await.unwrap();
    let frame = next_json(&mut client).await;
    assert!(error_description(&frame).starts_with("malformed request"));

    send_location(&mut client, &Location::new(100.0, 0.0)).await;
    let frame = next_json(&mut client).await;
    assert!(error_description(&frame).starts_with("invalid location"));

    send_location(&mut client, &test_location()).await;
    let (header, _) = next_image(&mut client).await;
    assert_eq!(header["image"]["pano_id"], PANO_ID);

    client.close(None).await.unwrap();
}

#[tokio::test]
async fn test_terminal_error_closes_session() {
    let server = Arc::new(MockTileServer::new());
    let resolver =
        MockMetadataResolver::with_status("ZERO_RESULTS").with_delay(Duration::from_millis(100));
    let addr = start_server(server.clone(), resolver.clone()).await;
    let mut client = connect(addr).await;

    // The second request is queued behind the failing one
    send_location(&mut client, &test_location()).await;
    send_location(&mut client, &test_location()).await;

    let frame = next_json(&mut client).await;
    assert_eq!(error_description(&frame), "ZERO_RESULTS");

    let frame = next_json(&mut client).await;
    assert_eq!(
        error_description(&frame),
        "request not served: session closed"
    );

    match next_frame(&mut client).await {
        Message::Close(Some(close)) => assert_eq!(close.code, CloseCode::Error),
        other => panic!("Expected close frame, got {:?}", other),
    }

    assert_eq!(resolver.calls(), 1);
    assert_eq!(server.total_attempts(), 0);
}

// =============================================================================
// Disconnect
// =============================================================================

#[tokio::test]
async fn test_disconnect_cancels_in_flight_fetches() {
    let server = Arc::new(MockTileServer::new().with_delay(Duration::from_secs(60)));
    let addr = start_server(server.clone(), MockMetadataResolver::ok()).await;
    let mut client = connect(addr).await;

    send_location(&mut client, &test_location()).await;
    assert!(
        wait_until(|| server.in_flight() > 0).await,
        "no tile fetch started"
    );

    drop(client);

    assert!(
        wait_until(|| server.in_flight() == 0).await,
        "{} tile fetches still running after disconnect",
        server.in_flight()
    );
}
