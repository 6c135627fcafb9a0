//! Placement from known origins.
//!
//! When every robot already reports its map in one shared world frame, the
//! grids' origin poses are enough to place them: no estimator is needed.

use map_merge_core::{OccupancyGrid, Pose, Transform, TransformError};

fn planar_origin(grid: &OccupancyGrid) -> Transform {
    let o = grid.origin();
    Transform::planar(o.yaw(), o.translation.x, o.translation.y)
}

fn finite(t: Transform) -> Result<Transform, TransformError> {
    if t.matrix().iter().all(|v| v.is_finite()) {
        Ok(t)
    } else {
        Err(TransformError::NonFinite)
    }
}

/// One pose per grid, relative to the first grid's origin.
///
/// Grid `i` is placed at `origin_0⁻¹ · origin_i`, restricted to the plane
/// (yaw and x/y), so grid 0 always gets the identity. Feed the result to
/// [`MergingPipeline::set_transforms`](crate::MergingPipeline::set_transforms).
pub fn placements_from_origins(grids: &[&OccupancyGrid]) -> Result<Vec<Pose>, TransformError> {
    let Some(first) = grids.first() else {
        return Ok(Vec::new());
    };
    let anchor = finite(planar_origin(first))?
        .inverse()
        .ok_or(TransformError::NonFinite)?;

    grids
        .iter()
        .enumerate()
        .map(|(i, grid)| {
            if i == 0 {
                return Ok(Pose::IDENTITY);
            }
            Ok(finite(anchor * planar_origin(grid))?.to_pose())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    fn grid_at(origin: Pose) -> OccupancyGrid {
        OccupancyGrid::new(2, 2, 0.5, origin, vec![0; 4]).expect("grid")
    }

    #[test]
    fn no_grids_no_poses() {
        assert!(placements_from_origins(&[]).expect("empty").is_empty());
    }

    #[test]
    fn first_grid_is_identity() {
        let a = grid_at(Pose::planar(4.0, -1.0, 0.7));
        let poses = placements_from_origins(&[&a]).expect("poses");
        assert_eq!(poses, vec![Pose::IDENTITY]);
    }

    #[test]
    fn relative_placement_matches_world_geometry() {
        let a = grid_at(Pose::planar(1.0, 2.0, 0.5));
        let b = grid_at(Pose::planar(-3.0, 0.5, -1.1));
        let poses = placements_from_origins(&[&a, &b]).expect("poses");
        assert_eq!(poses.len(), 2);

        // a local point of b must land on the same world point either way
        let t_b = Transform::from_pose(&poses[1]).expect("planar");
        let world_a = planar_origin(&a);
        let world_b = planar_origin(&b);
        for p in [Point2::new(0.0, 0.0), Point2::new(0.3, -1.2)] {
            let direct = world_b.apply(p);
            let via_a = world_a.apply(t_b.apply(p));
            assert_relative_eq!(direct.x, via_a.x, epsilon = 1e-12);
            assert_relative_eq!(direct.y, via_a.y, epsilon = 1e-12);
        }
    }

    #[test]
    fn shared_origin_gives_identity_everywhere() {
        let origin = Pose::planar(-10.0, -10.0, 0.0);
        let a = grid_at(origin);
        let b = grid_at(origin);
        let poses = placements_from_origins(&[&a, &b]).expect("poses");
        assert_relative_eq!(poses[1].translation.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(poses[1].translation.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(poses[1].yaw(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn non_finite_origin_is_rejected() {
        let a = grid_at(Pose::IDENTITY);
        let b = grid_at(Pose::planar(f64::NAN, 0.0, 0.0));
        assert_eq!(
            placements_from_origins(&[&a, &b]),
            Err(TransformError::NonFinite)
        );
    }
}
