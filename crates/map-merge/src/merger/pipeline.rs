use super::MergeError;
use crate::compositor::compose_grids;
use crate::estimator::{AlignmentError, AlignmentEstimator, NoEstimator, Placement};
use map_merge_core::{raster_from_grid, GrayImageView, OccupancyGrid, Pose, Transform};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Batch merging session over borrowed grids.
///
/// Typical use: [`feed`](Self::feed) the grids, then either
/// [`estimate_transforms`](Self::estimate_transforms) or
/// [`set_transforms`](Self::set_transforms), then
/// [`compose_grids`](Self::compose_grids) as often as needed.
///
/// Transforms map each grid's local metric frame (origin at the outer corner
/// of cell `(0, 0)`) into the common frame. Mutating operations take
/// `&mut self`; callers sharing a pipeline across threads must serialize
/// access themselves.
pub struct MergingPipeline<'a, E> {
    estimator: E,
    grids: Vec<&'a OccupancyGrid>,
    // index-aligned with `grids` once estimated or set; empty otherwise
    transforms: Vec<Option<Transform>>,
}

impl<'a> MergingPipeline<'a, NoEstimator> {
    /// Pipeline whose transforms are always supplied by the caller.
    pub fn without_estimator() -> Self {
        Self::new(NoEstimator)
    }
}

impl<'a, E: AlignmentEstimator> MergingPipeline<'a, E> {
    pub fn new(estimator: E) -> Self {
        Self {
            estimator,
            grids: Vec::new(),
            transforms: Vec::new(),
        }
    }

    #[inline]
    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    /// Number of grids in the current session.
    #[inline]
    pub fn grid_count(&self) -> usize {
        self.grids.len()
    }

    /// Start a new session with `grids`, dropping any previous transforms.
    pub fn feed<I>(&mut self, grids: I)
    where
        I: IntoIterator<Item = &'a OccupancyGrid>,
    {
        self.grids = grids.into_iter().collect();
        self.transforms.clear();
        log::debug!("fed {} grids", self.grids.len());
    }

    /// Estimate a transform for every grid the estimator can place.
    ///
    /// With zero grids nothing is estimated; a single grid gets the identity.
    /// On failure the transform store is left empty.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self), fields(grids = self.grids.len()))
    )]
    pub fn estimate_transforms(&mut self) -> Result<(), MergeError> {
        self.transforms.clear();
        match self.grids.len() {
            0 => return Ok(()),
            1 => {
                self.transforms.push(Some(Transform::identity()));
                return Ok(());
            }
            _ => {}
        }

        log::debug!("building rasters");
        let rasters: Vec<_> = self.grids.iter().map(|g| raster_from_grid(g)).collect();
        let views: Vec<GrayImageView<'_>> = rasters.iter().map(|r| r.view()).collect();

        log::debug!("estimating transforms");
        let placements = self.estimator.align(&views).inspect_err(|err| {
            log::warn!("alignment estimator failed: {err}");
        })?;
        let transforms = self.metric_transforms(placements)?;

        let placed = transforms.iter().filter(|t| t.is_some()).count();
        log::info!("placed {placed} of {} grids", self.grids.len());
        self.transforms = transforms;
        Ok(())
    }

    /// Current transforms as poses, in feed order, skipping unplaced grids.
    pub fn transforms(&self) -> Vec<Pose> {
        self.transforms
            .iter()
            .flatten()
            .map(Transform::to_pose)
            .collect()
    }

    /// Overwrite the transform store with one planar pose per grid.
    ///
    /// The store is left untouched when validation fails.
    pub fn set_transforms(&mut self, poses: &[Pose]) -> Result<(), MergeError> {
        if poses.len() != self.grids.len() {
            return Err(MergeError::ArityMismatch {
                expected: self.grids.len(),
                got: poses.len(),
            });
        }
        let transforms = poses
            .iter()
            .enumerate()
            .map(|(index, pose)| {
                Transform::from_pose(pose)
                    .map(Some)
                    .map_err(|source| MergeError::InvalidPose { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.transforms = transforms;
        Ok(())
    }

    /// Compose every grid that has a transform into one merged grid.
    ///
    /// `None` when no grid has a transform (no grids fed, estimation failed
    /// or not yet run).
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn compose_grids(&self) -> Option<OccupancyGrid> {
        let inputs: Vec<(&OccupancyGrid, Transform)> = self
            .grids
            .iter()
            .zip(&self.transforms)
            .filter_map(|(grid, t)| t.map(|t| (*grid, t)))
            .collect();
        if inputs.is_empty() {
            log::debug!("no transforms available, nothing to compose");
            return None;
        }
        compose_grids(&inputs)
    }

    /// Raw transform store, index-aligned with the fed grids.
    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) fn transform_store(&self) -> &[Option<Transform>] {
        &self.transforms
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) fn transform_store_mut(&mut self) -> &mut Vec<Option<Transform>> {
        &mut self.transforms
    }

    /// Convert pixel-space placements into metric transforms anchored at the
    /// first placed grid: `T_i = M_ref⁻¹ · S(res_ref) · P_i · S(1/res_i)`.
    fn metric_transforms(
        &self,
        placements: Vec<Option<Placement>>,
    ) -> Result<Vec<Option<Transform>>, AlignmentError> {
        if placements.len() != self.grids.len() {
            return Err(AlignmentError::PlacementCount {
                expected: self.grids.len(),
                got: placements.len(),
            });
        }

        let pixel = placements
            .into_iter()
            .enumerate()
            .map(|(index, p)| {
                p.map(Transform::from_matrix)
                    .transpose()
                    .map_err(|source| AlignmentError::InvalidPlacement { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (ref_idx, ref_pixel) = pixel
            .iter()
            .enumerate()
            .find_map(|(i, p)| p.map(|p| (i, p)))
            .ok_or(AlignmentError::NothingPlaced)?;
        let ref_res = self.grids[ref_idx].resolution();
        let to_common = Transform::scaling(ref_res);
        let anchor = (to_common * ref_pixel * Transform::scaling(1.0 / ref_res))
            .inverse()
            .ok_or(AlignmentError::InvalidPlacement {
                index: ref_idx,
                source: map_merge_core::TransformError::NotSimilarity,
            })?;

        Ok(pixel
            .into_iter()
            .zip(&self.grids)
            .enumerate()
            .map(|(i, (p, grid))| {
                let p = p?;
                if i == ref_idx {
                    return Some(Transform::identity());
                }
                Some(anchor * to_common * p * Transform::scaling(1.0 / grid.resolution()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Point2, Point3};
    use std::cell::Cell;

    struct FixedEstimator {
        result: Result<Vec<Option<Placement>>, AlignmentError>,
        calls: Cell<usize>,
    }

    impl FixedEstimator {
        fn new(result: Result<Vec<Option<Placement>>, AlignmentError>) -> Self {
            Self {
                result,
                calls: Cell::new(0),
            }
        }
    }

    impl AlignmentEstimator for FixedEstimator {
        fn align(
            &self,
            rasters: &[GrayImageView<'_>],
        ) -> Result<Vec<Option<Placement>>, AlignmentError> {
            assert!(rasters.len() >= 2);
            self.calls.set(self.calls.get() + 1);
            self.result.clone()
        }
    }

    fn grid(width: u32, height: u32, resolution: f64) -> OccupancyGrid {
        let data = (0..width * height).map(|i| (i % 3) as i8 - 1).collect();
        OccupancyGrid::new(width, height, resolution, Pose::IDENTITY, data).expect("grid")
    }

    fn pixel_shift(dx: f64, dy: f64) -> Placement {
        *Transform::planar(0.0, dx, dy).matrix()
    }

    // maps (1, 0) and (0, 1) both ways
    fn assert_pose_matches_matrix(pose: &Pose, t: &Transform) {
        let iso = pose.to_isometry();
        for (x, y) in [(1.0, 0.0), (0.0, 1.0)] {
            let p1 = iso * Point3::new(x, y, 0.0);
            let p2 = t.apply(Point2::new(x, y));
            assert_relative_eq!(p1.x, p2.x, epsilon = 1e-9);
            assert_relative_eq!(p1.y, p2.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn feed_clears_previous_transforms() {
        let a = grid(4, 4, 0.1);
        let mut merger = MergingPipeline::without_estimator();
        merger.feed([&a]);
        merger.estimate_transforms().expect("single grid");
        assert_eq!(merger.transform_store().len(), 1);
        merger.feed([&a]);
        assert!(merger.transform_store().is_empty());
        assert!(merger.compose_grids().is_none());
    }

    #[test]
    fn estimator_not_called_below_two_grids() {
        let a = grid(4, 4, 0.1);
        let mut merger = MergingPipeline::new(FixedEstimator::new(Err(AlignmentError::Unavailable)));
        merger.feed(std::iter::empty());
        merger.estimate_transforms().expect("zero grids");
        merger.feed([&a]);
        merger.estimate_transforms().expect("one grid");
        assert_eq!(merger.estimator().calls.get(), 0);
        assert_eq!(merger.transform_store(), &[Some(Transform::identity())]);
    }

    #[test]
    fn set_transforms_stores_matching_matrices() {
        let a = grid(4, 4, 0.1);
        let mut merger = MergingPipeline::without_estimator();
        merger.feed([&a]);

        for k in 0..100 {
            let pose = Pose::planar(0.37 * k as f64 - 15.0, 9.0 - 0.21 * k as f64, -3.0 + 0.06 * k as f64);
            merger.set_transforms(&[pose]).expect("planar pose");
            assert_eq!(merger.transform_store().len(), 1);
            let internal = merger.transform_store()[0].expect("transform");
            assert_pose_matches_matrix(&pose, &internal);
        }
    }

    #[test]
    fn get_transforms_decomposes_internal_matrices() {
        let a = grid(4, 4, 0.1);
        let mut merger = MergingPipeline::without_estimator();
        merger.feed([&a]);
        merger.transform_store_mut().resize(1, None);

        for k in 0..100 {
            let internal = Transform::planar(-2.9 + 0.058 * k as f64, 0.5 * k as f64, -0.25 * k as f64);
            merger.transform_store_mut()[0] = Some(internal);
            let poses = merger.transforms();
            assert_eq!(poses.len(), 1);
            let q = poses[0].rotation;
            assert_relative_eq!(
                q.x * q.x + q.y * q.y + q.z * q.z + q.w * q.w,
                1.0,
                epsilon = 1e-15
            );
            assert_pose_matches_matrix(&poses[0], &internal);
        }
    }

    #[test]
    fn quaternion_is_unit_for_scaled_internal_transform() {
        let a = grid(4, 4, 0.1);
        let mut merger = MergingPipeline::without_estimator();
        merger.feed([&a]);
        for scale in [1e-3, 0.5, 3.0, 250.0] {
            merger.transform_store_mut().clear();
            merger
                .transform_store_mut()
                .push(Some(Transform::scaling(scale) * Transform::planar(0.8, 1.0, 1.0)));
            let q = merger.transforms()[0].rotation;
            assert_relative_eq!(q.norm_squared(), 1.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn placements_are_converted_to_metric_and_anchored() {
        let a = grid(10, 10, 0.05);
        let b = grid(10, 10, 0.05);
        // reference raster itself shifted by (2, 0) px; b sits 6 px right of a
        let est = FixedEstimator::new(Ok(vec![Some(pixel_shift(2.0, 0.0)), Some(pixel_shift(8.0, 0.0))]));
        let mut merger = MergingPipeline::new(est);
        merger.feed([&a, &b]);
        merger.estimate_transforms().expect("estimate");

        let store = merger.transform_store();
        assert_eq!(store[0], Some(Transform::identity()));
        let t = store[1].expect("placed");
        assert_relative_eq!(t.translation().x, 0.3, epsilon = 1e-12);
        assert_relative_eq!(t.translation().y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn placements_account_for_resolution() {
        let fine = grid(10, 10, 0.05);
        let coarse = grid(5, 5, 0.1);
        // coarse raster is half-size in pixels: scale 2 into the fine pixel frame
        let scaled = *(Transform::planar(0.0, 4.0, 0.0) * Transform::scaling(2.0)).matrix();
        let est = FixedEstimator::new(Ok(vec![Some(Matrix3::identity()), Some(scaled)]));
        let mut merger = MergingPipeline::new(est);
        merger.feed([&fine, &coarse]);
        merger.estimate_transforms().expect("estimate");

        let t = merger.transform_store()[1].expect("placed");
        // coarse cell (1, 1) corner -> coarse px (1, 1) -> fine px (6, 2)
        let p = t.apply(Point2::new(0.1, 0.1));
        assert_relative_eq!(p.x, 0.3, epsilon = 1e-12);
        assert_relative_eq!(p.y, 0.1, epsilon = 1e-12);
        assert_relative_eq!(t.scale(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn homogeneous_multiple_of_placement_is_accepted() {
        let a = grid(10, 10, 0.05);
        let est = FixedEstimator::new(Ok(vec![
            Some(Matrix3::identity() * 3.0),
            Some(pixel_shift(8.0, 0.0) * 2.0),
        ]));
        let mut merger = MergingPipeline::new(est);
        merger.feed([&a, &a]);
        merger.estimate_transforms().expect("estimate");

        let t = merger.transform_store()[1].expect("placed");
        assert_relative_eq!(t.translation().x, 0.4, epsilon = 1e-12);
        assert_relative_eq!(t.scale(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn unplaced_grids_get_no_transform() {
        let a = grid(4, 4, 0.1);
        let est = FixedEstimator::new(Ok(vec![None, Some(Matrix3::identity()), None]));
        let mut merger = MergingPipeline::new(est);
        merger.feed([&a, &a, &a]);
        merger.estimate_transforms().expect("estimate");
        assert_eq!(merger.transform_store(), &[None, Some(Transform::identity()), None]);
        assert_eq!(merger.transforms(), vec![Pose::IDENTITY]);
    }

    #[test]
    fn bad_estimator_output_counts_as_failure() {
        let a = grid(4, 4, 0.1);
        let shear = Matrix3::new(1.0, 0.5, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        for (result, expected) in [
            (
                Ok(vec![Some(Matrix3::identity())]),
                AlignmentError::PlacementCount {
                    expected: 2,
                    got: 1,
                },
            ),
            (Ok(vec![None, None]), AlignmentError::NothingPlaced),
            (
                Ok(vec![Some(Matrix3::identity()), Some(shear)]),
                AlignmentError::InvalidPlacement {
                    index: 1,
                    source: map_merge_core::TransformError::NotSimilarity,
                },
            ),
        ] {
            let mut merger = MergingPipeline::new(FixedEstimator::new(result));
            merger.feed([&a, &a]);
            assert_eq!(
                merger.estimate_transforms(),
                Err(MergeError::EstimationFailed(expected))
            );
            assert!(merger.transform_store().is_empty());
        }
    }

    #[test]
    fn failed_estimate_discards_previous_transforms() {
        let a = grid(4, 4, 0.1);
        let mut merger = MergingPipeline::new(FixedEstimator::new(Err(
            AlignmentError::InsufficientCorrespondences,
        )));
        merger.feed([&a, &a]);
        merger
            .set_transforms(&[Pose::IDENTITY, Pose::IDENTITY])
            .expect("set");
        assert!(merger.estimate_transforms().is_err());
        assert!(merger.transform_store().is_empty());
        assert!(merger.compose_grids().is_none());
    }

    #[test]
    fn rejected_poses_leave_store_untouched() {
        let a = grid(4, 4, 0.1);
        let mut merger = MergingPipeline::without_estimator();
        merger.feed([&a, &a]);
        let good = [Pose::planar(1.0, 0.0, 0.0), Pose::IDENTITY];
        merger.set_transforms(&good).expect("set");

        let mut tilted = Pose::IDENTITY;
        tilted.rotation.y = 0.2;
        assert!(matches!(
            merger.set_transforms(&[Pose::IDENTITY, tilted]),
            Err(MergeError::InvalidPose { index: 1, .. })
        ));
        assert_eq!(
            merger.set_transforms(&[Pose::IDENTITY]),
            Err(MergeError::ArityMismatch {
                expected: 2,
                got: 1
            })
        );
        assert_eq!(merger.transforms().len(), 2);
        assert_relative_eq!(merger.transforms()[0].translation.x, 1.0);
    }
}
