//! Streaming mosaic sessions over WebSocket.
//!
//! # Protocol
//!
//! The client sends text frames of the form
//!
//! ```json
//! {"location": {"latitude": 45.389661, "longitude": -75.693499}}
//! ```
//!
//! For every location the server answers with either a text frame
//!
//! ```json
//! {"image": {"width": 3072, "height": 2048, "format": "png", "size": 1234567,
//!            "pano_id": "NByXiiB08r9stAGnKIAe2w", "failed_tiles": 0}}
//! ```
//!
//! followed by one binary frame holding `size` bytes of image data, or a
//! text frame
//!
//! ```json
//! {"error": {"description": "ZERO_RESULTS"}}
//! ```
//!
//! Requests are served one at a time, in order. Up to
//! [`MAX_PENDING_REQUESTS`] requests may queue behind the mosaic in
//! progress; further ones are answered with an error frame. Frames without
//! a location are ignored. A malformed request or an invalid location only
//! produces an error frame. After an upstream failure the error frame is
//! sent, each queued request gets a `request not served` error, and the
//! server closes the session with code 1011. Closing the socket cancels
//! any mosaic in progress.

use std::collections::VecDeque;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::io::HttpClient;
use crate::metadata::{Location, MetadataResolver};
use crate::mosaic::ImageEncoding;
use crate::session::{MosaicImage, MosaicService, MosaicSession};

use super::handlers::AppState;

/// Requests a client may queue while a mosaic is being built.
pub const MAX_PENDING_REQUESTS: usize = 8;

/// Close reason sent after a terminal error.
const TERMINAL_CLOSE_REASON: &str = "mosaic request failed";

/// Error description for queued requests dropped when the session ends.
const NOT_SERVED_DESCRIPTION: &str = "request not served: session closed";

// =============================================================================
// Wire Types
// =============================================================================

/// A client request frame.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionRequest {
    #[serde(default)]
    pub location: Option<Location>,
}

/// Describes the binary frame that follows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
    pub format: ImageEncoding,
    pub size: usize,
    pub pano_id: String,
    pub failed_tiles: usize,
}

impl From<&MosaicImage> for ImageHeader {
    fn from(image: &MosaicImage) -> Self {
        Self {
            width: image.width,
            height: image.height,
            format: image.encoding,
            size: image.data.len(),
            pano_id: image.pano_id.clone(),
            failed_tiles: image.failed_tiles,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDescription {
    pub description: String,
}

/// A server text frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionResponse {
    Image(ImageHeader),
    Error(ErrorDescription),
}

impl SessionResponse {
    pub fn error(description: impl Into<String>) -> Self {
        SessionResponse::Error(ErrorDescription {
            description: description.into(),
        })
    }
}

/// What a client frame means to the session loop.
#[derive(Debug, PartialEq)]
enum Incoming {
    Location(Location),
    Ignored,
    Invalid(String),
    Closed,
}

fn parse_request(payload: &[u8]) -> Incoming {
    match serde_json::from_slice::<SessionRequest>(payload) {
        Ok(SessionRequest {
            location: Some(location),
        }) => Incoming::Location(location),
        Ok(SessionRequest { location: None }) => Incoming::Ignored,
        Err(e) => Incoming::Invalid(format!("malformed request: {}", e)),
    }
}

fn classify(frame: Option<Result<Message, axum::Error>>) -> Incoming {
    match frame {
        Some(Ok(Message::Text(text))) => parse_request(text.as_str().as_bytes()),
        Some(Ok(Message::Binary(data))) => parse_request(&data),
        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => Incoming::Ignored,
        Some(Ok(Message::Close(_))) | None => Incoming::Closed,
        Some(Err(e)) => {
            debug!(error = %e, "WebSocket receive failed");
            Incoming::Closed
        }
    }
}

// =============================================================================
// Handler
// =============================================================================

/// Upgrade to a streaming mosaic session.
///
/// # Endpoint
///
/// `GET /session` (WebSocket)
pub async fn session_handler<C, M>(
    State(state): State<AppState<C, M>>,
    ws: WebSocketUpgrade,
) -> Response
where
    C: HttpClient + 'static,
    M: MetadataResolver + 'static,
{
    let service = Arc::clone(&state.service);
    ws.on_upgrade(move |socket| run_session(socket, service))
}

/// Serve mosaic requests on `socket` until the client leaves or a terminal
/// error is reported.
pub async fn run_session<C, M>(mut socket: WebSocket, service: Arc<MosaicService<C, M>>)
where
    C: HttpClient + 'static,
    M: MetadataResolver + 'static,
{
    let mut session = MosaicSession::new(service, CancellationToken::new());
    let mut pending: VecDeque<Location> = VecDeque::new();
    let mut served = 0usize;

    info!("Session opened");

    // `None` when the client went away, otherwise the frame closing the session
    let close = loop {
        let location = match pending.pop_front() {
            Some(location) => location,
            None => match classify(socket.recv().await) {
                Incoming::Location(location) => location,
                Incoming::Ignored => continue,
                Incoming::Invalid(message) => {
                    if send_json(&mut socket, &SessionResponse::error(message))
                        .await
                        .is_err()
                    {
                        break None;
                    }
                    continue;
                }
                Incoming::Closed => break None,
            },
        };

        debug!(
            latitude = location.latitude,
            longitude = location.longitude,
            "Mosaic requested"
        );

        // Keep reading while the mosaic is built so a disconnect cancels it
        let outcome = {
            let work = session.handle(&location);
            tokio::pin!(work);

            loop {
                let incoming = tokio::select! {
                    result = &mut work => break Some(result),
                    frame = socket.recv() => classify(frame),
                };

                let rejection = match incoming {
                    Incoming::Location(next) if pending.len() < MAX_PENDING_REQUESTS => {
                        pending.push_back(next);
                        None
                    }
                    Incoming::Location(_) => Some(format!(
                        "too many pending requests (limit {})",
                        MAX_PENDING_REQUESTS
                    )),
                    Incoming::Ignored => None,
                    Incoming::Invalid(message) => Some(message),
                    Incoming::Closed => break None,
                };

                if let Some(message) = rejection {
                    if send_json(&mut socket, &SessionResponse::error(message))
                        .await
                        .is_err()
                    {
                        break None;
                    }
                }
            }
        };

        let Some(result) = outcome else {
            info!(served, "Client disconnected during request");
            break None;
        };

        match result {
            Ok(image) => {
                if send_image(&mut socket, image).await.is_err() {
                    break None;
                }
                served += 1;
            }
            Err(e) => {
                let terminal = e.is_terminal();
                log_session_error(&e, terminal);
                let sent = send_json(&mut socket, &SessionResponse::error(e.to_string())).await;
                if sent.is_err() {
                    break None;
                }
                if terminal {
                    break Some(CloseFrame {
                        code: close_code::ERROR,
                        reason: Utf8Bytes::from_static(TERMINAL_CLOSE_REASON),
                    });
                }
            }
        }
    };

    session.close().await;

    match close {
        Some(frame) => {
            reject_pending(&mut socket, &mut pending).await;
            // The client may already be gone
            let _ = socket.send(Message::Close(Some(frame))).await;
        }
        None => {
            // Completes the closing handshake if the client started one
            let _ = socket.send(Message::Close(None)).await;
        }
    }

    info!(served, "Session closed");
}

/// Answer every queued request with an error frame.
async fn reject_pending(socket: &mut WebSocket, pending: &mut VecDeque<Location>) {
    for _ in pending.drain(..) {
        let response = SessionResponse::error(NOT_SERVED_DESCRIPTION);
        if send_json(socket, &response).await.is_err() {
            break;
        }
    }
}

async fn send_image(socket: &mut WebSocket, image: MosaicImage) -> Result<(), axum::Error> {
    send_json(socket, &SessionResponse::Image(ImageHeader::from(&image))).await?;
    socket.send(Message::Binary(image.data)).await
}

async fn send_json(socket: &mut WebSocket, response: &SessionResponse) -> Result<(), axum::Error> {
    let text = serde_json::to_string(response).map_err(axum::Error::new)?;
    socket.send(Message::Text(text.into())).await
}

fn log_session_error(err: &SessionError, terminal: bool) {
    if terminal {
        warn!(error = %err, "Session request failed, closing session");
    } else {
        debug!(error = %err, "Session request rejected");
    }
}

// =============================================================================
// Tests
// =============================================================================
