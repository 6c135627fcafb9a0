//! External rigid-transform representation.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector2};
use serde::{Deserialize, Serialize};

/// Translation part of a [`Pose`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Rotation part of a [`Pose`], stored as `(x, y, z, w)`.
///
/// Quaternions produced by this workspace are unit-norm; quaternions supplied
/// by callers are normalized when converted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    #[inline]
    pub fn norm_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w
    }

    /// Same rotation with the sign chosen so that `w >= 0`.
    pub fn canonical(self) -> Self {
        if self.w < 0.0 {
            Self {
                x: -self.x,
                y: -self.y,
                z: -self.z,
                w: -self.w,
            }
        } else {
            self
        }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Rigid placement: translation plus rotation quaternion.
///
/// A plain value type, independent of any transport or message framework.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub translation: Translation,
    pub rotation: Quaternion,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        translation: Translation {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        },
        rotation: Quaternion::IDENTITY,
    };

    /// Planar pose: position `(x, y)` and heading `yaw` about the z axis.
    pub fn planar(x: f64, y: f64, yaw: f64) -> Self {
        let half = 0.5 * yaw;
        Self {
            translation: Translation { x, y, z: 0.0 },
            rotation: Quaternion {
                x: 0.0,
                y: 0.0,
                z: half.sin(),
                w: half.cos(),
            },
        }
    }

    /// Heading about the z axis.
    ///
    /// For non-planar rotations this is the yaw of the ZYX Euler decomposition.
    pub fn yaw(&self) -> f64 {
        let q = self.rotation;
        let siny = 2.0 * (q.w * q.z + q.x * q.y);
        let cosy = q.w * q.w + q.x * q.x - q.y * q.y - q.z * q.z;
        siny.atan2(cosy)
    }

    /// Pose displaced by `(dx, dy)` expressed in this pose's own frame.
    ///
    /// The rotation is kept unchanged.
    pub fn displaced(&self, dx: f64, dy: f64) -> Self {
        let yaw = self.yaw();
        let (s, c) = yaw.sin_cos();
        let d = Vector2::new(c * dx - s * dy, s * dx + c * dy);
        Self {
            translation: Translation {
                x: self.translation.x + d.x,
                y: self.translation.y + d.y,
                z: self.translation.z,
            },
            rotation: self.rotation,
        }
    }

    /// Convert into a `nalgebra` isometry (standard rigid-transform math).
    pub fn to_isometry(&self) -> Isometry3<f64> {
        let t = self.translation;
        let q = self.rotation;
        let rotation =
            UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(q.w, q.x, q.y, q.z));
        Isometry3::from_parts(Translation3::new(t.x, t.y, t.z), rotation)
    }
}
