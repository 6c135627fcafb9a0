//! Map image I/O in the map_server trinary convention.
//!
//! Image row 0 is the top of the map while grid row 0 is the bottom, so rows
//! are flipped in both directions.

use crate::io::MapImageParams;
use map_merge_core::{GrayImageView, GridError, OccupancyGrid, FREE, OCCUPIED_MAX, UNKNOWN};
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Pixel written for free cells.
pub const FREE_PIXEL: u8 = 254;
/// Pixel written for occupied cells.
pub const OCCUPIED_PIXEL: u8 = 0;
/// Pixel written for unknown and low-confidence cells.
pub const UNKNOWN_PIXEL: u8 = 205;

/// Confidence from which a cell is saved as occupied.
const OCCUPIED_SAVE_THRESHOLD: i8 = 65;

#[derive(thiserror::Error, Debug)]
pub enum MapIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] ::image::ImageError),
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Borrow an `image::GrayImage` as the lightweight core view type.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

fn classify(v: u8, params: &MapImageParams) -> i8 {
    let v = f64::from(v) / 255.0;
    let p = if params.negate { v } else { 1.0 - v };
    if p > params.occupied_thresh {
        OCCUPIED_MAX
    } else if p < params.free_thresh {
        FREE
    } else {
        UNKNOWN
    }
}

/// Threshold a decoded grayscale map image into a grid.
pub fn grid_from_luma(
    img: &::image::GrayImage,
    params: &MapImageParams,
) -> Result<OccupancyGrid, GridError> {
    let (w, h) = img.dimensions();
    let mut data = Vec::with_capacity(img.as_raw().len());
    for row in img.as_raw().chunks_exact(w.max(1) as usize).rev() {
        data.extend(row.iter().map(|&v| classify(v, params)));
    }
    OccupancyGrid::new(w, h, params.resolution, params.origin, data)
}

/// Render a grid as a trinary map image.
pub fn luma_from_grid(grid: &OccupancyGrid) -> ::image::GrayImage {
    let w = grid.width();
    let pixels = grid
        .data()
        .chunks_exact(w.max(1) as usize)
        .rev()
        .flat_map(|row| {
            row.iter().map(|&v| match v {
                FREE => FREE_PIXEL,
                v if v >= OCCUPIED_SAVE_THRESHOLD => OCCUPIED_PIXEL,
                _ => UNKNOWN_PIXEL,
            })
        })
        .collect();
    ::image::GrayImage::from_vec(w, grid.height(), pixels)
        .unwrap_or_else(|| ::image::GrayImage::new(w, grid.height()))
}

/// Load a PGM/PNG map image as an occupancy grid.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(path, params), fields(path = %path.as_ref().display()))
)]
pub fn load_map_image(
    path: impl AsRef<Path>,
    params: &MapImageParams,
) -> Result<OccupancyGrid, MapIoError> {
    let path = path.as_ref();
    let img = ::image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_luma8();
    log::debug!(
        "loaded {} ({}x{})",
        path.display(),
        img.width(),
        img.height()
    );
    Ok(grid_from_luma(&img, params)?)
}

/// Save a grid as a map image; the format follows the file extension.
pub fn save_map_image(grid: &OccupancyGrid, path: impl AsRef<Path>) -> Result<(), MapIoError> {
    let path = path.as_ref();
    luma_from_grid(grid).save(path)?;
    log::debug!(
        "saved {}x{} map to {}",
        grid.width(),
        grid.height(),
        path.display()
    );
    Ok(())
}
