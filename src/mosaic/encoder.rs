//! Mosaic encoder.
//!
//! Encodes an assembled canvas for transmission to the caller.
//!
//! # Design Decisions
//!
//! - **PNG by default**: tiles are already lossy JPEGs upstream, so the wire
//!   copy is lossless with fast compression to keep encode time low on large
//!   canvases.
//! - **JPEG on request**: trades fidelity for a much smaller payload. JPEG has
//!   no alpha channel, so blank regions of failed tiles become black.

use bytes::Bytes;
use clap::ValueEnum;
use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};
use serde::Serialize;

use crate::error::SessionError;

/// Default JPEG quality for the wire encoding (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Image format of the encoded mosaic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    /// Lossless PNG with RGBA pixels
    #[default]
    Png,
    /// Lossy JPEG with RGB pixels
    Jpeg,
}

impl ImageEncoding {
    /// MIME type for HTTP responses.
    pub fn content_type(&self) -> &'static str {
        match self {
            ImageEncoding::Png => "image/png",
            ImageEncoding::Jpeg => "image/jpeg",
        }
    }

    /// Short lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageEncoding::Png => "png",
            ImageEncoding::Jpeg => "jpeg",
        }
    }
}

// =============================================================================
// Mosaic Encoder
// =============================================================================

/// Encodes mosaics in a fixed format.
#[derive(Debug, Clone, Copy)]
pub struct MosaicEncoder {
    encoding: ImageEncoding,
    jpeg_quality: u8,
}

impl MosaicEncoder {
    /// Create an encoder. `jpeg_quality` is clamped to 1-100 and only used
    /// for [`ImageEncoding::Jpeg`].
    pub fn new(encoding: ImageEncoding, jpeg_quality: u8) -> Self {
        Self {
            encoding,
            jpeg_quality: clamp_quality(jpeg_quality),
        }
    }

    /// PNG encoder.
    pub fn png() -> Self {
        Self::new(ImageEncoding::Png, DEFAULT_JPEG_QUALITY)
    }

    /// JPEG encoder at the given quality.
    pub fn jpeg(quality: u8) -> Self {
        Self::new(ImageEncoding::Jpeg, quality)
    }

    pub fn encoding(&self) -> ImageEncoding {
        self.encoding
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Encode the canvas.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Encode`] if the underlying codec fails.
    pub fn encode(&self, image: &RgbaImage) -> Result<Bytes, SessionError> {
        let encoded = match self.encoding {
            ImageEncoding::Png => encode_png(image),
            ImageEncoding::Jpeg => encode_jpeg(image, self.jpeg_quality),
        };

        encoded
            .map(Bytes::from)
            .map_err(|e| SessionError::Encode {
                message: e.to_string(),
            })
    }
}

impl Default for MosaicEncoder {
    fn default() -> Self {
        Self::png()
    }
}

/// Encode as PNG with fast compression.
pub(crate) fn encode_png(image: &RgbaImage) -> image::ImageResult<Vec<u8>> {
    let mut output = Vec::new();
    PngEncoder::new_with_quality(&mut output, CompressionType::Fast, FilterType::Adaptive)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )?;
    Ok(output)
}

/// Encode as JPEG, dropping the alpha channel.
pub(crate) fn encode_jpeg(image: &RgbaImage, quality: u8) -> image::ImageResult<Vec<u8>> {
    let rgb: RgbImage = image.convert();
    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, clamp_quality(quality)).encode_image(&rgb)?;
    Ok(output)
}

/// Clamp quality to the valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
