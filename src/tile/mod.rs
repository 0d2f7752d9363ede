//! Tile layer.
//!
//! This module defines what a tile is and how a single tile is fetched.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               WorkerPool                │
//! └────────────────────┬────────────────────┘
//!                      │ TileRequest
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              TileFetcher                │
//! │  (build URL → GET with retry → decode)  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           HttpClient Trait              │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileCoordinate`]: `(x, y, zoom)` position in the tile pyramid
//! - [`TileRequest`]: a coordinate plus the panorama it belongs to
//! - [`TileResult`]: decoded image or error, always tagged with its coordinate
//! - [`Grid`]: the window of coordinates that makes up one mosaic
//! - [`TileFetcher`]: fetch with bounded retry and decode

mod fetcher;
mod grid;

pub use fetcher::{TileFetcher, DEFAULT_NUM_RETRIES, DEFAULT_TILE_URL};
pub use grid::{
    Grid, GridError, PixelRect, TileCoordinate, TileRequest, TileResult, DEFAULT_MAX_X,
    DEFAULT_MAX_Y, DEFAULT_MIN_X, DEFAULT_MIN_Y, DEFAULT_TILE_SIZE, DEFAULT_ZOOM,
    MAX_CANVAS_BYTES, MAX_TILE_COUNT,
};
