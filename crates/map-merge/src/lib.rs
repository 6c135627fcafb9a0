//! Merge independently built occupancy grids into one globally consistent map.
//!
//! This crate provides:
//! - [`MergingPipeline`]: feed grids, estimate or set their placements, read
//!   them back as poses, and compose the merged grid.
//! - [`AlignmentEstimator`]: the seam for a pluggable pairwise alignment
//!   backend (feature matching, correlation, ...). No backend ships here.
//! - [`placements_from_origins`]: placement for robots that share a world
//!   frame.
//! - (feature `image`) map image I/O in the map_server convention.
//!
//! ## Quickstart
//!
//! ```no_run
//! use map_merge::{placements_from_origins, MergingPipeline};
//! use map_merge::map_image::{load_map_image, save_map_image};
//! use map_merge::io::MapImageParams;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let params = MapImageParams::new(0.05);
//! let a = load_map_image("robot_a.pgm", &params)?;
//! let b = load_map_image("robot_b.pgm", &params)?;
//!
//! let mut merger = MergingPipeline::without_estimator();
//! merger.feed([&a, &b]);
//! merger.set_transforms(&placements_from_origins(&[&a, &b])?)?;
//! if let Some(merged) = merger.compose_grids() {
//!     save_map_image(&merged, "merged.pgm")?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `map_merge::core`: grid, pose, transform and raster types.
//! - `map_merge::io`: JSON config and report files.
//! - `map_merge::map_image` (feature `image`): PGM/PNG map images.

pub use map_merge_core as core;

mod compositor;
mod estimator;
pub mod io;
mod merger;
mod placement;

#[cfg(feature = "image")]
pub mod map_image;

pub use compositor::{compose_grids, CanvasBounds, MAX_CANVAS_CELLS};
pub use estimator::{AlignmentError, AlignmentEstimator, NoEstimator, Placement};
pub use merger::{MergeError, MergingPipeline};
pub use placement::placements_from_origins;

pub use map_merge_core::{CellState, OccupancyGrid, Pose, Transform, TransformError};
