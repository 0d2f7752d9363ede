//! Tile coordinates, requests, results and the grid window.
//!
//! # Pixel Layout
//!
//! A [`Grid`] covers the half-open tile window `[min_x, max_x) × [min_y, max_y)`.
//! The tile at `(x, y)` lands on the canvas at
//!
//! ```text
//! ((x - min_x) * tile_width, (y - min_y) * tile_height)
//!     ..
//! ((x + 1 - min_x) * tile_width, (y + 1 - min_y) * tile_height)
//! ```

use image::RgbaImage;
use thiserror::Error;

use crate::error::FetchError;

// =============================================================================
// Defaults
// =============================================================================

/// Default leftmost tile column (inclusive).
pub const DEFAULT_MIN_X: u32 = 13;

/// Default rightmost tile column (exclusive).
pub const DEFAULT_MAX_X: u32 = 19;

/// Default topmost tile row (inclusive).
pub const DEFAULT_MIN_Y: u32 = 6;

/// Default bottom tile row (exclusive).
pub const DEFAULT_MAX_Y: u32 = 10;

/// Default zoom level of the tile pyramid.
pub const DEFAULT_ZOOM: u32 = 5;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Largest RGBA canvas a grid may describe, in bytes (1 GiB).
pub const MAX_CANVAS_BYTES: u64 = 1 << 30;

/// Largest number of tiles, and therefore of jobs, a grid may describe.
pub const MAX_TILE_COUNT: u64 = 1 << 16;

/// Bytes per canvas pixel.
const BYTES_PER_PIXEL: u64 = 4;

// =============================================================================
// Tile Coordinate
// =============================================================================

/// Position of one tile within a panorama's tile pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoordinate {
    pub x: u32,
    pub y: u32,
    pub zoom: u32,
}

impl TileCoordinate {
    pub fn new(x: u32, y: u32, zoom: u32) -> Self {
        Self { x, y, zoom }
    }
}

// =============================================================================
// Tile Request / Result
// =============================================================================

/// One unit of fetch work: a coordinate within a specific panorama.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    pub coordinate: TileCoordinate,
    pub pano_id: String,
}

impl TileRequest {
    pub fn new(coordinate: TileCoordinate, pano_id: impl Into<String>) -> Self {
        Self {
            coordinate,
            pano_id: pano_id.into(),
        }
    }
}

/// Outcome of one [`TileRequest`].
///
/// The originating coordinate is attached on both the success and the error
/// path, so a failed tile can always be attributed to its canvas region.
#[derive(Debug, Clone)]
pub struct TileResult {
    pub coordinate: TileCoordinate,
    pub outcome: Result<RgbaImage, FetchError>,
}

impl TileResult {
    pub fn success(coordinate: TileCoordinate, image: RgbaImage) -> Self {
        Self {
            coordinate,
            outcome: Ok(image),
        }
    }

    pub fn failure(coordinate: TileCoordinate, error: FetchError) -> Self {
        Self {
            coordinate,
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

// =============================================================================
// Grid
// =============================================================================

/// Reasons a grid definition is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid x range is empty: min_x ({min}) must be less than max_x ({max})")]
    EmptyX { min: u32, max: u32 },

    #[error("grid y range is empty: min_y ({min}) must be less than max_y ({max})")]
    EmptyY { min: u32, max: u32 },

    #[error("tile size must be non-zero, got {width}x{height}")]
    ZeroTileSize { width: u32, height: u32 },

    #[error("mosaic of {width}x{height} pixels is too large")]
    TooLarge { width: u64, height: u64 },

    #[error("grid of {count} tiles exceeds the limit of {max}")]
    TooManyTiles { count: u64, max: u64 },
}

/// Axis-aligned pixel rectangle on the mosaic canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The fixed window of tile coordinates fetched for every panorama.
///
/// The grid defines both how many jobs are dispatched and the size of the
/// output canvas. It is an explicit value rather than a process-wide
/// constant so small grids can be used in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    min_x: u32,
    max_x: u32,
    min_y: u32,
    max_y: u32,
    zoom: u32,
    tile_width: u32,
    tile_height: u32,
}

impl Grid {
    /// Create a grid covering `[min_x, max_x) × [min_y, max_y)` at `zoom`.
    pub fn new(
        min_x: u32,
        max_x: u32,
        min_y: u32,
        max_y: u32,
        zoom: u32,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self, GridError> {
        if min_x >= max_x {
            return Err(GridError::EmptyX {
                min: min_x,
                max: max_x,
            });
        }
        if min_y >= max_y {
            return Err(GridError::EmptyY {
                min: min_y,
                max: max_y,
            });
        }
        if tile_width == 0 || tile_height == 0 {
            return Err(GridError::ZeroTileSize {
                width: tile_width,
                height: tile_height,
            });
        }

        let count = u64::from(max_x - min_x) * u64::from(max_y - min_y);
        if count > MAX_TILE_COUNT {
            return Err(GridError::TooManyTiles {
                count,
                max: MAX_TILE_COUNT,
            });
        }

        let width = u64::from(max_x - min_x) * u64::from(tile_width);
        let height = u64::from(max_y - min_y) * u64::from(tile_height);
        let canvas_bytes = width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL));
        match canvas_bytes {
            Some(bytes) if bytes <= MAX_CANVAS_BYTES && usize::try_from(bytes).is_ok() => {}
            _ => return Err(GridError::TooLarge { width, height }),
        }

        Ok(Self {
            min_x,
            max_x,
            min_y,
            max_y,
            zoom,
            tile_width,
            tile_height,
        })
    }

    pub fn min_x(&self) -> u32 {
        self.min_x
    }

    pub fn max_x(&self) -> u32 {
        self.max_x
    }

    pub fn min_y(&self) -> u32 {
        self.min_y
    }

    pub fn max_y(&self) -> u32 {
        self.max_y
    }

    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Number of tile columns.
    pub fn columns(&self) -> u32 {
        self.max_x - self.min_x
    }

    /// Number of tile rows.
    pub fn rows(&self) -> u32 {
        self.max_y - self.min_y
    }

    /// Total number of tiles, and therefore of jobs and results per mosaic.
    pub fn tile_count(&self) -> usize {
        self.columns() as usize * self.rows() as usize
    }

    /// Canvas width in pixels.
    pub fn pixel_width(&self) -> u32 {
        self.columns() * self.tile_width
    }

    /// Canvas height in pixels.
    pub fn pixel_height(&self) -> u32 {
        self.rows() * self.tile_height
    }

    /// Whether `coordinate` falls inside this grid at this grid's zoom.
    pub fn contains(&self, coordinate: &TileCoordinate) -> bool {
        coordinate.zoom == self.zoom
            && (self.min_x..self.max_x).contains(&coordinate.x)
            && (self.min_y..self.max_y).contains(&coordinate.y)
    }

    /// Canvas region for `coordinate`, or `None` if it lies outside the grid.
    pub fn pixel_rect(&self, coordinate: &TileCoordinate) -> Option<PixelRect> {
        if !self.contains(coordinate) {
            return None;
        }

        Some(PixelRect {
            x: (coordinate.x - self.min_x) * self.tile_width,
            y: (coordinate.y - self.min_y) * self.tile_height,
            width: self.tile_width,
            height: self.tile_height,
        })
    }

    /// Every coordinate in the grid, column by column.
    pub fn coordinates(&self) -> impl Iterator<Item = TileCoordinate> + '_ {
        (self.min_x..self.max_x).flat_map(move |x| {
            (self.min_y..self.max_y).map(move |y| TileCoordinate::new(x, y, self.zoom))
        })
    }

    /// One [`TileRequest`] per grid coordinate for the given panorama.
    pub fn requests(&self, pano_id: &str) -> Vec<TileRequest> {
        self.coordinates()
            .map(|coordinate| TileRequest::new(coordinate, pano_id))
            .collect()
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            min_x: DEFAULT_MIN_X,
            max_x: DEFAULT_MAX_X,
            min_y: DEFAULT_MIN_Y,
            max_y: DEFAULT_MAX_Y,
            zoom: DEFAULT_ZOOM,
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
