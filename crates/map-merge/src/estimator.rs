//! Pluggable pairwise alignment estimator.

use map_merge_core::{GrayImageView, TransformError};
use nalgebra::Matrix3;

/// Placement of one raster: a 3×3 planar similarity mapping that raster's
/// pixel coordinates into the pixel frame of the estimator's reference
/// raster. Pixel `(x, y)` covers `[x, x+1) × [y, y+1)`.
pub type Placement = Matrix3<f64>;

/// Errors reported by (or about) an alignment estimator.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AlignmentError {
    #[error("not enough correspondences between rasters")]
    InsufficientCorrespondences,
    #[error("no alignment estimator configured")]
    Unavailable,
    #[error("estimator failed: {0}")]
    Backend(String),
    #[error("estimator returned {got} placements for {expected} rasters")]
    PlacementCount { expected: usize, got: usize },
    #[error("placement for raster {index} is unusable: {source}")]
    InvalidPlacement {
        index: usize,
        #[source]
        source: TransformError,
    },
    #[error("estimator placed no raster")]
    NothingPlaced,
}

/// Computes relative placements among several rasters.
///
/// Called only with two or more rasters. The returned vector is aligned with
/// the input: `None` marks a raster that could not be connected to the rest.
pub trait AlignmentEstimator {
    fn align(&self, rasters: &[GrayImageView<'_>]) -> Result<Vec<Option<Placement>>, AlignmentError>;
}

impl<E: AlignmentEstimator + ?Sized> AlignmentEstimator for &E {
    fn align(&self, rasters: &[GrayImageView<'_>]) -> Result<Vec<Option<Placement>>, AlignmentError> {
        (**self).align(rasters)
    }
}

impl<E: AlignmentEstimator + ?Sized> AlignmentEstimator for Box<E> {
    fn align(&self, rasters: &[GrayImageView<'_>]) -> Result<Vec<Option<Placement>>, AlignmentError> {
        (**self).align(rasters)
    }
}

/// Estimator for sessions whose transforms are always supplied by the
/// caller (known initial poses). Every estimation attempt fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoEstimator;

impl AlignmentEstimator for NoEstimator {
    fn align(&self, _rasters: &[GrayImageView<'_>]) -> Result<Vec<Option<Placement>>, AlignmentError> {
        Err(AlignmentError::Unavailable)
    }
}
