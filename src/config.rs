//! Configuration management for pano-mosaic.
//!
//! This module provides the CLI and configuration system:
//! - Command-line arguments via clap with subcommands (`serve`, `fetch`)
//! - Environment variables with `PANO_` prefix
//! - Defaults matching the public Street View endpoints and tile window
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use pano_mosaic::config::{Cli, Command};
//!
//! let cli = Cli::parse();
//! match cli.command {
//!     Command::Serve(config) => println!("Listening on {}", config.bind_address()),
//!     Command::Fetch(config) => println!("Writing {}", config.output.display()),
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `API_KEY` - Metadata API key (required)
//! - `PANO_HOST` - Server bind address (default: 0.0.0.0)
//! - `PANO_PORT` - Server port (default: 8080)
//! - `PANO_MIN_X`, `PANO_MAX_X`, `PANO_MIN_Y`, `PANO_MAX_Y` - Tile window (default: x 13..19, y 6..10)
//! - `PANO_ZOOM` - Zoom level (default: 5)
//! - `PANO_TILE_SIZE` - Tile edge in pixels (default: 512)
//! - `PANO_WORKER_MULTIPLIER` - Workers per CPU (default: 10)
//! - `PANO_NUM_RETRIES` - Attempts per tile (default: 10)
//! - `PANO_TILE_URL`, `PANO_METADATA_URL` - Upstream endpoints
//! - `PANO_HTTP_TIMEOUT` - Upstream request timeout in seconds (default: 30)
//! - `PANO_ENCODING` - Wire encoding, `png` or `jpeg` (default: png)
//! - `PANO_JPEG_QUALITY` - JPEG wire quality (default: 90)
//! - `PANO_SAVE_IMAGES` - Also write each mosaic to disk (default: false)
//! - `PANO_OUTPUT_DIR` - Directory for saved mosaics (default: .)
//! - `PANO_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::io::DEFAULT_HTTP_TIMEOUT_SECS;
use crate::metadata::{Location, DEFAULT_METADATA_URL};
use crate::mosaic::{ImageEncoding, DEFAULT_JPEG_QUALITY};
use crate::pool::DEFAULT_WORKER_MULTIPLIER;
use crate::session::MosaicConfig;
use crate::tile::{
    Grid, DEFAULT_MAX_X, DEFAULT_MAX_Y, DEFAULT_MIN_X, DEFAULT_MIN_Y, DEFAULT_NUM_RETRIES,
    DEFAULT_TILE_SIZE, DEFAULT_TILE_URL, DEFAULT_ZOOM,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

// =============================================================================
// CLI Arguments
// =============================================================================

/// pano-mosaic - Street-level panorama mosaics from tiled imagery.
#[derive(Parser, Debug, Clone)]
#[command(name = "pano-mosaic")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve mosaics over HTTP and WebSocket.
    Serve(ServeConfig),

    /// Build one mosaic and write it to a file.
    Fetch(FetchConfig),
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct MosaicArgs {
    // =========================================================================
    // Upstream
    // =========================================================================
    /// API key for the metadata service.
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Tile service endpoint.
    #[arg(long, default_value = DEFAULT_TILE_URL, env = "PANO_TILE_URL")]
    pub tile_url: String,

    /// Metadata service endpoint.
    #[arg(long, default_value = DEFAULT_METADATA_URL, env = "PANO_METADATA_URL")]
    pub metadata_url: String,

    /// Timeout for each upstream request, in seconds.
    #[arg(long, default_value_t = DEFAULT_HTTP_TIMEOUT_SECS, env = "PANO_HTTP_TIMEOUT")]
    pub http_timeout: u64,

    // =========================================================================
    // Grid
    // =========================================================================
    /// First tile column (inclusive).
    #[arg(long, default_value_t = DEFAULT_MIN_X, env = "PANO_MIN_X")]
    pub min_x: u32,

    /// Last tile column (exclusive).
    #[arg(long, default_value_t = DEFAULT_MAX_X, env = "PANO_MAX_X")]
    pub max_x: u32,

    /// First tile row (inclusive).
    #[arg(long, default_value_t = DEFAULT_MIN_Y, env = "PANO_MIN_Y")]
    pub min_y: u32,

    /// Last tile row (exclusive).
    #[arg(long, default_value_t = DEFAULT_MAX_Y, env = "PANO_MAX_Y")]
    pub max_y: u32,

    /// Zoom level of the tile pyramid.
    #[arg(long, default_value_t = DEFAULT_ZOOM, env = "PANO_ZOOM")]
    pub zoom: u32,

    /// Tile width and height in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "PANO_TILE_SIZE")]
    pub tile_size: u32,

    // =========================================================================
    // Fetching
    // =========================================================================
    /// Workers per available CPU.
    #[arg(long, default_value_t = DEFAULT_WORKER_MULTIPLIER, env = "PANO_WORKER_MULTIPLIER")]
    pub worker_multiplier: usize,

    /// Attempts per tile before giving up on it.
    #[arg(long, default_value_t = DEFAULT_NUM_RETRIES, env = "PANO_NUM_RETRIES")]
    pub num_retries: u32,

    // =========================================================================
    // Output
    // =========================================================================
    /// Encoding of the returned mosaic.
    #[arg(long, value_enum, default_value_t = ImageEncoding::Png, env = "PANO_ENCODING")]
    pub encoding: ImageEncoding,

    /// JPEG quality when `--encoding jpeg` (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "PANO_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Also save every mosaic as a JPEG in `--output-dir`.
    #[arg(long, default_value_t = false, env = "PANO_SAVE_IMAGES")]
    pub save_images: bool,

    /// Directory for saved mosaics.
    #[arg(long, default_value = ".", env = "PANO_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    // =========================================================================
    // Logging
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl MosaicArgs {
    /// Validate the options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.as_deref().map_or(true, str::is_empty) {
            return Err("API key is required. Set --api-key or API_KEY".to_string());
        }

        self.grid()?;
        self.tile_url()?;
        self.metadata_url()?;

        if self.worker_multiplier == 0 {
            return Err("worker_multiplier must be greater than 0".to_string());
        }
        if self.num_retries == 0 {
            return Err("num_retries must be greater than 0".to_string());
        }
        if self.http_timeout == 0 {
            return Err("http_timeout must be greater than 0".to_string());
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        Ok(())
    }

    /// The API key, or an empty string if unset (call `validate()` first).
    pub fn api_key_or_empty(&self) -> &str {
        self.api_key.as_deref().unwrap_or("")
    }

    /// The configured tile window.
    pub fn grid(&self) -> Result<Grid, String> {
        Grid::new(
            self.min_x,
            self.max_x,
            self.min_y,
            self.max_y,
            self.zoom,
            self.tile_size,
            self.tile_size,
        )
        .map_err(|e| e.to_string())
    }

    pub fn tile_url(&self) -> Result<Url, String> {
        Url::parse(&self.tile_url).map_err(|e| format!("invalid tile_url: {}", e))
    }

    pub fn metadata_url(&self) -> Result<Url, String> {
        Url::parse(&self.metadata_url).map_err(|e| format!("invalid metadata_url: {}", e))
    }

    /// Everything the mosaic service needs.
    pub fn mosaic_config(&self) -> Result<MosaicConfig, String> {
        Ok(MosaicConfig {
            grid: self.grid()?,
            worker_multiplier: self.worker_multiplier,
            num_retries: self.num_retries,
            encoding: self.encoding,
            jpeg_quality: self.jpeg_quality,
            save_images: self.save_images,
            output_dir: self.output_dir.clone(),
        })
    }
}

/// Options for the `serve` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "PANO_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PANO_PORT")]
    pub port: u16,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "PANO_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,

    #[command(flatten)]
    pub mosaic: MosaicArgs,
}

impl ServeConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.mosaic.validate()
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Options for the `fetch` subcommand.
#[derive(Args, Debug, Clone)]
pub struct FetchConfig {
    /// Latitude in decimal degrees.
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude in decimal degrees.
    #[arg(long, allow_negative_numbers = true)]
    pub lng: f64,

    /// File to write the encoded mosaic to.
    #[arg(short, long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub mosaic: MosaicArgs,
}

impl FetchConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.location()
            .validate()
            .map_err(|e| e.to_string())?;
        self.mosaic.validate()
    }

    pub fn location(&self) -> Location {
        Location::new(self.lat, self.lng)
    }
}

// =============================================================================
// Tests
// =============================================================================
