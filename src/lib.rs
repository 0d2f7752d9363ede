//! # pano-mosaic
//!
//! Builds a single large mosaic from the tiles of one street-level panorama.
//!
//! A caller supplies a geographic location. The library resolves it to a
//! panorama through the metadata service, fetches every tile of a fixed grid
//! window in parallel, and stitches the tiles into one image.
//!
//! ## Features
//!
//! - **Bounded worker pool**: fixed worker count, queues sized to the grid,
//!   broadcast cancellation that stops every worker
//! - **Per-tile retry**: non-success responses are retried; a failed tile
//!   leaves a blank region instead of failing the mosaic
//! - **Streaming sessions**: a WebSocket endpoint serves many mosaics on one
//!   session-scoped pool
//!
//! ## Architecture
//!
//! - [`io`] - HTTP client seam
//! - [`tile`] - Tile coordinates, grid and single-tile fetcher
//! - [`pool`] - Concurrent worker pool
//! - [`mosaic`] - Assembly, encoding and persistence
//! - [`metadata`] - Location to panorama resolution
//! - [`session`] - Mosaic orchestration
//! - [`server`] - Axum-based HTTP and WebSocket server
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pano_mosaic::{
//!     Location, MosaicConfig, MosaicService, ReqwestClient, StreetViewMetadataClient,
//!     DEFAULT_METADATA_URL, DEFAULT_TILE_URL,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(ReqwestClient::new()?);
//!     let resolver = StreetViewMetadataClient::new(
//!         Arc::clone(&client),
//!         DEFAULT_METADATA_URL.parse()?,
//!         std::env::var("API_KEY")?,
//!     );
//!     let service = MosaicService::new(
//!         MosaicConfig::default(),
//!         client,
//!         DEFAULT_TILE_URL.parse()?,
//!         resolver,
//!     );
//!
//!     let image = service
//!         .fetch_mosaic(&Location::new(45.389661, -75.693499))
//!         .await?;
//!     println!("{}x{} ({} tiles missing)", image.width, image.height, image.failed_tiles);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod metadata;
pub mod mosaic;
pub mod pool;
pub mod server;
pub mod session;
pub mod tile;

// Re-export commonly used types
pub use config::{Cli, Command, FetchConfig, MosaicArgs, ServeConfig};
pub use error::{
    AssembleError, FetchError, IoError, MetadataError, PersistError, PoolError, SessionError,
};
pub use io::{HttpClient, HttpResponse, ReqwestClient};
pub use metadata::{
    LatLng, Location, Metadata, MetadataResolver, StreetViewMetadataClient, DEFAULT_METADATA_URL,
};
pub use mosaic::{
    mosaic_file_name, place_tile, save_mosaic, ImageEncoding, Mosaic, MosaicAssembler,
    MosaicEncoder, TileFailure,
};
pub use pool::{default_worker_count, WorkerPool};
pub use server::{
    create_router, health_handler, mosaic_handler, session_handler, AppState, ErrorResponse,
    HealthResponse, RouterConfig, MAX_PENDING_REQUESTS,
};
pub use session::{MosaicConfig, MosaicImage, MosaicService, MosaicSession};
pub use tile::{
    Grid, GridError, TileCoordinate, TileFetcher, TileRequest, TileResult, DEFAULT_TILE_URL,
};
