use crate::{Pose, Quaternion, Translation};
use nalgebra::{Matrix3, Point2, UnitQuaternion, Vector2, Vector3};
use std::ops::Mul;

/// Relative tolerance for off-axis quaternion components.
const PLANAR_QUAT_EPS: f64 = 1e-9;
/// Absolute tolerance for out-of-plane translation.
const PLANAR_Z_EPS: f64 = 1e-9;
/// Relative tolerance when checking that a matrix is a planar similarity.
const SIMILARITY_EPS: f64 = 1e-6;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum TransformError {
    #[error("non-finite value in transform")]
    NonFinite,
    #[error("quaternion has zero norm")]
    DegenerateQuaternion,
    #[error("rotation is not about the z axis (qx={x}, qy={y})")]
    NonPlanarRotation { x: f64, y: f64 },
    #[error("translation leaves the plane (z={z})")]
    NonPlanarTranslation { z: f64 },
    #[error("matrix is not a planar rigid/similarity transform")]
    NotSimilarity,
}

/// Planar rigid/similarity placement as a 3×3 homogeneous matrix:
///
/// ```text
/// [ s·cosθ  -s·sinθ  tx ]
/// [ s·sinθ   s·cosθ  ty ]
/// [   0        0      1 ]
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    m: Matrix3<f64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            m: Matrix3::identity(),
        }
    }

    /// Rotation by `angle` (radians) followed by translation `(tx, ty)`.
    pub fn planar(angle: f64, tx: f64, ty: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            m: Matrix3::new(
                c, -s, tx, //
                s, c, ty, //
                0.0, 0.0, 1.0,
            ),
        }
    }

    /// Uniform scaling about the origin.
    pub fn scaling(s: f64) -> Self {
        Self {
            m: Matrix3::new(
                s, 0.0, 0.0, //
                0.0, s, 0.0, //
                0.0, 0.0, 1.0,
            ),
        }
    }

    /// Validate that `m` is a finite planar similarity (no shear, no
    /// reflection, no projective part).
    ///
    /// `m` is homogeneous: it is divided by `m22` first, so any non-zero
    /// multiple of a similarity is accepted as that similarity.
    pub fn from_matrix(m: Matrix3<f64>) -> Result<Self, TransformError> {
        if m.iter().any(|v| !v.is_finite()) {
            return Err(TransformError::NonFinite);
        }
        let w = m[(2, 2)];
        if w.abs() <= f64::EPSILON {
            return Err(TransformError::NotSimilarity);
        }
        let m = m / w;
        if m.iter().any(|v| !v.is_finite()) {
            return Err(TransformError::NonFinite);
        }
        let scale = m[(0, 0)].hypot(m[(1, 0)]);
        if scale <= f64::EPSILON {
            return Err(TransformError::NotSimilarity);
        }
        let tol = SIMILARITY_EPS * scale.max(1.0);
        let affine = m[(2, 0)].abs() <= tol
            && m[(2, 1)].abs() <= tol
            && (m[(2, 2)] - 1.0).abs() <= SIMILARITY_EPS;
        let conformal = (m[(0, 0)] - m[(1, 1)]).abs() <= tol && (m[(0, 1)] + m[(1, 0)]).abs() <= tol;
        if !(affine && conformal) {
            return Err(TransformError::NotSimilarity);
        }
        Ok(Self { m })
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Result<Self, TransformError> {
        Self::from_matrix(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.m[(0, 0)], self.m[(0, 1)], self.m[(0, 2)]],
            [self.m[(1, 0)], self.m[(1, 1)], self.m[(1, 2)]],
            [self.m[(2, 0)], self.m[(2, 1)], self.m[(2, 2)]],
        ]
    }

    #[inline]
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.m * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0], v[1])
    }

    pub fn inverse(&self) -> Option<Self> {
        self.m.try_inverse().map(|m| Self { m })
    }

    /// Rotation angle θ in `(-π, π]`.
    #[inline]
    pub fn rotation_angle(&self) -> f64 {
        self.m[(1, 0)].atan2(self.m[(0, 0)])
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.m[(0, 0)].hypot(self.m[(1, 0)])
    }

    #[inline]
    pub fn translation(&self) -> Vector2<f64> {
        Vector2::new(self.m[(0, 2)], self.m[(1, 2)])
    }

    /// True when the rotation is a multiple of 90°.
    pub fn is_axis_aligned(&self) -> bool {
        let (a, b) = (self.m[(0, 0)].abs(), self.m[(1, 0)].abs());
        a.min(b) <= 1e-12 * a.max(b)
    }

    /// Decompose into an external pose.
    ///
    /// The pose carries rotation and translation only; a non-unit scale is
    /// not representable and is dropped.
    pub fn to_pose(&self) -> Pose {
        let theta = self.rotation_angle();
        let q = UnitQuaternion::new_normalize(nalgebra::Quaternion::new(
            (0.5 * theta).cos(),
            0.0,
            0.0,
            (0.5 * theta).sin(),
        ));
        let t = self.translation();
        Pose {
            translation: Translation {
                x: t.x,
                y: t.y,
                z: 0.0,
            },
            rotation: Quaternion {
                x: q.i,
                y: q.j,
                z: q.k,
                w: q.w,
            },
        }
    }

    /// Compose a planar pose into a transform.
    ///
    /// Rejects poses rotating about any axis other than z or translating out
    /// of the plane.
    pub fn from_pose(pose: &Pose) -> Result<Self, TransformError> {
        let q = pose.rotation;
        let t = pose.translation;
        if ![q.x, q.y, q.z, q.w, t.x, t.y, t.z]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(TransformError::NonFinite);
        }
        let norm = q.norm_squared().sqrt();
        if norm <= f64::EPSILON {
            return Err(TransformError::DegenerateQuaternion);
        }
        if q.x.abs() > PLANAR_QUAT_EPS * norm || q.y.abs() > PLANAR_QUAT_EPS * norm {
            return Err(TransformError::NonPlanarRotation { x: q.x, y: q.y });
        }
        if t.z.abs() > PLANAR_Z_EPS {
            return Err(TransformError::NonPlanarTranslation { z: t.z });
        }
        let theta = 2.0 * (q.z / norm).atan2(q.w / norm);
        Ok(Self::planar(theta, t.x, t.y))
    }
}

impl Mul for Transform {
    type Output = Transform;

    /// `a * b` applies `b` first, then `a`.
    fn mul(self, rhs: Transform) -> Transform {
        Transform { m: self.m * rhs.m }
    }
}
