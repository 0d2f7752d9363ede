//! Local persistence of assembled mosaics.

use std::fs;
use std::path::Path;

use image::RgbaImage;

use crate::error::PersistError;
use crate::metadata::LatLng;
use crate::tile::Grid;

use super::encoder::encode_jpeg;

/// JPEG quality used for stored copies.
pub const SAVE_JPEG_QUALITY: u8 = 100;

/// File name for a stored mosaic.
///
/// The name encodes the panorama location and the grid window, e.g.
/// `48.858400,2.294500_x:13-19_y:6-10_5.jpeg`.
pub fn mosaic_file_name(location: &LatLng, grid: &Grid) -> String {
    format!(
        "{:.6},{:.6}_x:{}-{}_y:{}-{}_{}.jpeg",
        location.lat,
        location.lng,
        grid.min_x(),
        grid.max_x(),
        grid.min_y(),
        grid.max_y(),
        grid.zoom()
    )
}

/// Write `image` to `path` as a maximum-quality JPEG, creating parent
/// directories as needed.
pub fn save_mosaic(image: &RgbaImage, path: &Path) -> Result<(), PersistError> {
    let data =
        encode_jpeg(image, SAVE_JPEG_QUALITY).map_err(|e| PersistError::Encode(e.to_string()))?;

    let write_err = |e: std::io::Error| PersistError::Write {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, data).map_err(write_err)
}
