//! Merging pipeline.
//!
//! This module wires together rasterization, the pluggable alignment
//! estimator, the transform store and grid composition.

mod error;
mod pipeline;

pub use error::MergeError;
pub use pipeline::MergingPipeline;
