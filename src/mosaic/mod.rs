//! Mosaic assembly, encoding and persistence.
//!
//! # Components
//!
//! - [`MosaicAssembler`]: drains one grid's worth of [`TileResult`]s and draws
//!   each decoded tile into its region of the canvas
//! - [`MosaicEncoder`]: encodes the canvas for the wire (PNG or JPEG)
//! - [`save_mosaic`]: writes a maximum-quality JPEG copy to local storage
//!
//! [`TileResult`]: crate::tile::TileResult

mod assembler;
mod encoder;
mod persist;

pub use assembler::{place_tile, Mosaic, MosaicAssembler, TileFailure};
pub use encoder::{
    clamp_quality, ImageEncoding, MosaicEncoder, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY,
    MIN_JPEG_QUALITY,
};
pub use persist::{mosaic_file_name, save_mosaic, SAVE_JPEG_QUALITY};
