//! Mosaic assembler.
//!
//! The assembler owns the canvas for one mosaic. It receives exactly
//! `grid.tile_count()` results, in whatever order they arrive, and places
//! each successful tile at the region its coordinate maps to. A failed tile
//! is logged and its region is left at the zero pixel (transparent black);
//! assembly is never aborted by an individual tile.

use image::{imageops, RgbaImage};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{AssembleError, FetchError};
use crate::pool::WorkerPool;
use crate::tile::{Grid, TileCoordinate, TileResult};

/// A tile that could not be placed.
#[derive(Debug, Clone)]
pub struct TileFailure {
    pub coordinate: TileCoordinate,
    pub error: FetchError,
}

/// A completed mosaic and its per-tile accounting.
#[derive(Debug, Clone)]
pub struct Mosaic {
    /// The canvas, sized exactly to the grid
    pub image: RgbaImage,

    /// Number of tiles drawn into the canvas
    pub placed: usize,

    /// Tiles whose regions were left blank
    pub failures: Vec<TileFailure>,
}

impl Mosaic {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    /// Whether no tile was placed and every failure was a transport error.
    ///
    /// This means the tile service itself was unreachable, as opposed to
    /// individual tiles being missing.
    pub fn all_failed_in_transport(&self) -> bool {
        self.placed == 0
            && !self.failures.is_empty()
            && self.failures.iter().all(|f| f.error.is_transport())
    }
}

/// Assembles tile results for one [`Grid`] into a [`Mosaic`].
#[derive(Debug, Clone, Copy)]
pub struct MosaicAssembler {
    grid: Grid,
}

impl MosaicAssembler {
    pub fn new(grid: Grid) -> Self {
        Self { grid }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Drain exactly one grid's worth of results from `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError::ResultsClosed`] if the pool stops before every
    /// result has arrived. There is no partial mosaic.
    pub async fn assemble(&self, pool: &mut WorkerPool) -> Result<Mosaic, AssembleError> {
        let mut canvas = Canvas::new(self.grid);
        let expected = self.grid.tile_count();

        for received in 0..expected {
            match pool.next_result().await {
                Some(result) => canvas.accept(result),
                None => return Err(AssembleError::ResultsClosed { received, expected }),
            }
        }

        Ok(canvas.finish())
    }

    /// Drain exactly one grid's worth of results from a raw channel.
    ///
    /// Anything beyond the expected count is left in the channel.
    pub async fn assemble_from(
        &self,
        results: &mut mpsc::Receiver<TileResult>,
    ) -> Result<Mosaic, AssembleError> {
        let mut canvas = Canvas::new(self.grid);
        let expected = self.grid.tile_count();

        for received in 0..expected {
            match results.recv().await {
                Some(result) => canvas.accept(result),
                None => return Err(AssembleError::ResultsClosed { received, expected }),
            }
        }

        Ok(canvas.finish())
    }
}

/// In-progress mosaic.
struct Canvas {
    grid: Grid,
    image: RgbaImage,
    placed: usize,
    failures: Vec<TileFailure>,
}

impl Canvas {
    fn new(grid: Grid) -> Self {
        Self {
            grid,
            image: RgbaImage::new(grid.pixel_width(), grid.pixel_height()),
            placed: 0,
            failures: Vec::new(),
        }
    }

    fn accept(&mut self, result: TileResult) {
        let coordinate = result.coordinate;
        match result.outcome {
            Ok(tile) => {
                if place_tile(&mut self.image, &self.grid, &coordinate, &tile) {
                    self.placed += 1;
                } else {
                    warn!(
                        x = coordinate.x,
                        y = coordinate.y,
                        zoom = coordinate.zoom,
                        "Tile outside the grid, discarding"
                    );
                }
            }
            Err(error) => {
                warn!(
                    x = coordinate.x,
                    y = coordinate.y,
                    zoom = coordinate.zoom,
                    error = %error,
                    "Tile failed, leaving region blank"
                );
                self.failures.push(TileFailure { coordinate, error });
            }
        }
    }

    fn finish(self) -> Mosaic {
        debug!(
            placed = self.placed,
            failed = self.failures.len(),
            width = self.image.width(),
            height = self.image.height(),
            "Mosaic assembled"
        );

        Mosaic {
            image: self.image,
            placed: self.placed,
            failures: self.failures,
        }
    }
}

/// Draw `tile` into the region of `canvas` that `coordinate` maps to.
///
/// Tiles larger than the grid's tile size are clipped to their region so
/// they never bleed into a neighbor; smaller tiles leave the remainder of
/// the region blank. Returns `false` if the coordinate lies outside the grid.
pub fn place_tile(
    canvas: &mut RgbaImage,
    grid: &Grid,
    coordinate: &TileCoordinate,
    tile: &RgbaImage,
) -> bool {
    let Some(rect) = grid.pixel_rect(coordinate) else {
        return false;
    };

    let width = tile.width().min(rect.width);
    let height = tile.height().min(rect.height);
    if tile.dimensions() != (rect.width, rect.height) {
        debug!(
            x = coordinate.x,
            y = coordinate.y,
            tile_width = tile.width(),
            tile_height = tile.height(),
            "Tile size differs from grid tile size"
        );
    }

    let region = imageops::crop_imm(tile, 0, 0, width, height).to_image();
    imageops::replace(canvas, &region, i64::from(rect.x), i64::from(rect.y));
    true
}

// =============================================================================
// Tests
// =============================================================================
