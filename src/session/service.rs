use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use image::RgbaImage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::SessionError;
use crate::io::HttpClient;
use crate::metadata::{Location, Metadata, MetadataResolver};
use crate::mosaic::{
    mosaic_file_name, save_mosaic, ImageEncoding, MosaicAssembler, MosaicEncoder,
    DEFAULT_JPEG_QUALITY,
};
use crate::pool::{default_worker_count, WorkerPool, DEFAULT_WORKER_MULTIPLIER};
use crate::tile::{Grid, TileFetcher, DEFAULT_NUM_RETRIES};

// =============================================================================
// Configuration
// =============================================================================

/// Everything that shapes a mosaic, passed explicitly to the service.
#[derive(Debug, Clone)]
pub struct MosaicConfig {
    /// Tile window fetched for every panorama
    pub grid: Grid,

    /// Workers per available CPU
    pub worker_multiplier: usize,

    /// Attempts per tile
    pub num_retries: u32,

    /// Wire encoding of the assembled mosaic
    pub encoding: ImageEncoding,

    /// JPEG quality when `encoding` is JPEG
    pub jpeg_quality: u8,

    /// Also write each mosaic to `output_dir`
    pub save_images: bool,

    /// Directory for saved mosaics
    pub output_dir: PathBuf,
}

impl MosaicConfig {
    /// Number of workers each pool spawns.
    pub fn worker_count(&self) -> usize {
        default_worker_count(self.worker_multiplier)
    }
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            grid: Grid::default(),
            worker_multiplier: DEFAULT_WORKER_MULTIPLIER,
            num_retries: DEFAULT_NUM_RETRIES,
            encoding: ImageEncoding::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            save_images: false,
            output_dir: PathBuf::from("."),
        }
    }
}

/// An encoded mosaic ready to send.
#[derive(Debug, Clone)]
pub struct MosaicImage {
    pub width: u32,
    pub height: u32,
    pub encoding: ImageEncoding,
    pub data: Bytes,
    pub pano_id: String,
    /// Tiles left blank in the image
    pub failed_tiles: usize,
}

// =============================================================================
// Mosaic Service
// =============================================================================

/// Builds mosaics for locations.
///
/// # Type Parameters
///
/// * `C` - HTTP client used for tile requests
/// * `M` - Metadata resolver
pub struct MosaicService<C: HttpClient, M: MetadataResolver> {
    config: MosaicConfig,
    fetcher: Arc<TileFetcher<C>>,
    resolver: M,
    encoder: MosaicEncoder,
}

impl<C, M> MosaicService<C, M>
where
    C: HttpClient + 'static,
    M: MetadataResolver,
{
    /// Create a service fetching tiles from `tile_url` through `client`.
    pub fn new(config: MosaicConfig, client: Arc<C>, tile_url: Url, resolver: M) -> Self {
        let fetcher = Arc::new(TileFetcher::new(client, tile_url, config.num_retries));
        let encoder = MosaicEncoder::new(config.encoding, config.jpeg_quality);

        Self {
            config,
            fetcher,
            resolver,
            encoder,
        }
    }

    pub fn config(&self) -> &MosaicConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &Arc<TileFetcher<C>> {
        &self.fetcher
    }

    /// Create a pool sized for this service's grid.
    pub fn create_pool(&self) -> WorkerPool {
        self.create_pool_with_cancellation(CancellationToken::new())
    }

    /// Create a pool that also stops when `cancel` fires.
    pub fn create_pool_with_cancellation(&self, cancel: CancellationToken) -> WorkerPool {
        WorkerPool::with_cancellation(
            Arc::clone(&self.fetcher),
            self.config.worker_count(),
            self.config.grid.tile_count(),
            cancel,
        )
    }

    /// Build one mosaic on an existing pool.
    ///
    /// The pool must be idle: no jobs queued and no results pending.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidLocation`] before any network traffic
    /// - [`SessionError::Metadata`] if the lookup fails or its status is not
    ///   `"OK"`; no tile is requested
    /// - [`SessionError::TileServiceUnreachable`] if every tile failed to
    ///   connect
    /// - [`SessionError::Pool`], [`SessionError::Assemble`] if the pool was
    ///   stopped underneath the request
    pub async fn get_mosaic(
        &self,
        pool: &mut WorkerPool,
        location: &Location,
    ) -> Result<MosaicImage, SessionError> {
        location.validate()?;

        let metadata = self.resolver.resolve(location).await?;
        metadata.ensure_ok()?;
        debug!(pano_id = %metadata.pano_id, date = %metadata.date, "Got metadata");

        let grid = self.config.grid;
        pool.submit_grid(&grid, &metadata.pano_id)?;
        info!(
            pano_id = %metadata.pano_id,
            tiles = grid.tile_count(),
            "Downloading mosaic"
        );

        let mosaic = MosaicAssembler::new(grid).assemble(pool).await?;
        if mosaic.all_failed_in_transport() {
            return Err(SessionError::TileServiceUnreachable {
                failed: mosaic.failed_count(),
            });
        }

        let (width, height) = (mosaic.width(), mosaic.height());
        let failed_tiles = mosaic.failed_count();
        let image = Arc::new(mosaic.image);

        let encoder = self.encoder;
        let to_encode = Arc::clone(&image);
        let data = tokio::task::spawn_blocking(move || encoder.encode(&to_encode))
            .await
            .map_err(|e| SessionError::Encode {
                message: e.to_string(),
            })??;

        if self.config.save_images {
            self.persist(image, &metadata);
        }

        info!(
            pano_id = %metadata.pano_id,
            width,
            height,
            failed_tiles,
            bytes = data.len(),
            "Mosaic ready"
        );

        Ok(MosaicImage {
            width,
            height,
            encoding: encoder.encoding(),
            data,
            pano_id: metadata.pano_id,
            failed_tiles,
        })
    }

    /// Build one mosaic on a pool created and stopped for this call.
    pub async fn fetch_mosaic(&self, location: &Location) -> Result<MosaicImage, SessionError> {
        let mut pool = self.create_pool();
        let result = self.get_mosaic(&mut pool, location).await;
        pool.stop().await;
        result
    }

    /// Write the mosaic in the background. Failures are logged only.
    fn persist(&self, image: Arc<RgbaImage>, metadata: &Metadata) {
        let path = self
            .config
            .output_dir
            .join(mosaic_file_name(&metadata.location, &self.config.grid));

        tokio::task::spawn_blocking(move || match save_mosaic(&image, &path) {
            Ok(()) => debug!(path = %path.display(), "Saved mosaic"),
            Err(e) => warn!(error = %e, "Failed to save mosaic"),
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
