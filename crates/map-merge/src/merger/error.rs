use crate::estimator::AlignmentError;
use map_merge_core::TransformError;

/// Errors returned by the merging pipeline.
///
/// A missing merged grid (no transforms available) is not an error:
/// `compose_grids` returns `None` for it.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    #[error("transform estimation failed: {0}")]
    EstimationFailed(#[from] AlignmentError),
    #[error("pose {index} is not a planar transform: {source}")]
    InvalidPose {
        index: usize,
        #[source]
        source: TransformError,
    },
    #[error("got {got} transforms for {expected} grids")]
    ArityMismatch { expected: usize, got: usize },
}
