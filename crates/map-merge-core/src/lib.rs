//! Core types for occupancy grid merging.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any alignment estimator, image codec or transport layer.
//!
//! - [`OccupancyGrid`]: tri-state occupancy grid in the usual robotics
//!   convention (`-1` unknown, `0` free, `1..=100` occupied).
//! - [`Transform`]: planar rigid/similarity placement stored as a 3×3
//!   homogeneous matrix, with lossless conversion to and from [`Pose`].
//! - [`raster_from_grid`]: dense 8-bit rendering of a grid for estimators.

mod grid;
mod logger;
mod pose;
mod raster;
mod transform;

pub use grid::{CellState, GridError, OccupancyGrid, FREE, OCCUPIED_MAX, UNKNOWN};
pub use pose::{Pose, Quaternion, Translation};
pub use raster::{raster_from_grid, GrayImage, GrayImageView, UNKNOWN_INTENSITY};
pub use transform::{Transform, TransformError};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
