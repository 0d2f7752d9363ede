//! Single-tile fetcher with bounded retry.
//!
//! # Retry Policy
//!
//! - An attempt succeeds only on `200 OK`; the first success is decoded and
//!   no further attempts are made.
//! - Any other status is retried, up to `num_retries` attempts in total.
//! - A transport failure ends the fetch immediately with
//!   [`FetchError::Transport`]. It is never fatal to the process.
//! - Attempts run one after another; a tile never has concurrent attempts.

use std::sync::Arc;

use image::RgbaImage;
use tracing::{debug, trace};
use url::Url;

use crate::error::FetchError;
use crate::io::HttpClient;

use super::grid::TileRequest;

/// Default tile endpoint.
pub const DEFAULT_TILE_URL: &str = "https://streetviewpixels-pa.googleapis.com/v1/tile";

/// Default number of attempts per tile.
pub const DEFAULT_NUM_RETRIES: u32 = 10;

/// Client identifier the tile endpoint expects.
const CB_CLIENT: &str = "maps_sv.tactile";

/// Fetches and decodes individual tiles from the tile service.
///
/// # Example
///
/// ```ignore
/// use pano_mosaic::io::ReqwestClient;
/// use pano_mosaic::tile::{TileCoordinate, TileFetcher, TileRequest};
///
/// let fetcher = TileFetcher::new(Arc::new(ReqwestClient::new()?), base_url, 10);
/// let request = TileRequest::new(TileCoordinate::new(16, 8, 5), "NByXiiB08r9stAGnKIAe2w");
/// let tile = fetcher.fetch(&request).await?;
/// ```
pub struct TileFetcher<C: HttpClient> {
    client: Arc<C>,
    base_url: Url,
    num_retries: u32,
}

impl<C: HttpClient> TileFetcher<C> {
    /// Create a fetcher. `num_retries` is the total number of attempts and
    /// is raised to 1 if zero.
    pub fn new(client: Arc<C>, base_url: Url, num_retries: u32) -> Self {
        Self {
            client,
            base_url,
            num_retries: num_retries.max(1),
        }
    }

    /// Maximum number of attempts per tile.
    pub fn num_retries(&self) -> u32 {
        self.num_retries
    }

    /// The shared HTTP client.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Build the tile URL for a request.
    pub fn tile_url(&self, request: &TileRequest) -> String {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("cb_client", CB_CLIENT)
            .append_pair("panoid", &request.pano_id)
            .append_pair("x", &request.coordinate.x.to_string())
            .append_pair("y", &request.coordinate.y.to_string())
            .append_pair("zoom", &request.coordinate.zoom.to_string())
            .append_pair("nbt", "1")
            .append_pair("fover", "2");
        url.into()
    }

    /// Fetch one tile and decode it into an RGBA image.
    ///
    /// # Errors
    ///
    /// - [`FetchError::BadStatus`] if every attempt returned a non-success
    ///   status; carries the URL, the last status and the last body
    /// - [`FetchError::Transport`] if the service could not be reached
    /// - [`FetchError::Decode`] if the body is not a decodable image
    pub async fn fetch(&self, request: &TileRequest) -> Result<RgbaImage, FetchError> {
        let url = self.tile_url(request);
        let mut last_response = None;

        for attempt in 1..=self.num_retries {
            let response =
                self.client
                    .get(&url)
                    .await
                    .map_err(|e| FetchError::Transport {
                        url: url.clone(),
                        message: e.to_string(),
                    })?;

            if response.is_ok() {
                trace!(
                    x = request.coordinate.x,
                    y = request.coordinate.y,
                    attempt,
                    bytes = response.body.len(),
                    "Tile fetched"
                );
                return decode_tile(&url, &response.body);
            }

            debug!(
                x = request.coordinate.x,
                y = request.coordinate.y,
                attempt,
                status = response.status,
                "Tile request returned non-success status"
            );
            last_response = Some(response);
        }

        // num_retries >= 1, so at least one response was recorded
        let (status, body) = last_response
            .map(|r| (r.status, r.body_text()))
            .unwrap_or_default();

        Err(FetchError::BadStatus { url, status, body })
    }
}

/// Decode tile bytes in whatever raster format the service returned.
fn decode_tile(url: &str, data: &[u8]) -> Result<RgbaImage, FetchError> {
    image::load_from_memory(data)
        .map(|img| img.to_rgba8())
        .map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
}

// =============================================================================
// Tests
// =============================================================================
