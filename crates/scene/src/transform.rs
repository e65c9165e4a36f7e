//! Translate / rotate / scale transform for scene objects.
//!
//! # Example
//!
//! ```
//! use batcher_scene::Transform;
//! use glam::Vec3;
//!
//! let t = Transform::new()
//!     .with_translate(Vec3::new(1.0, 0.0, 0.0))
//!     .with_scale(Vec3::splat(2.0));
//!
//! let p = t.to_mat4().transform_point3(Vec3::new(1.0, 0.0, 0.0));
//! assert!((p - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-6);
//! ```

use glam::{EulerRot, Mat4, Quat, Vec3};

/// An object transform.
///
/// Rotation is stored as Euler angles in radians. The angles are applied
/// about X first, then Y, then Z.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Translation in world space
    pub translate: Vec3,
    /// Euler rotation in radians (x = pitch, y = yaw, z = roll)
    pub rotate: Vec3,
    /// Per-axis scale factor
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translate: Vec3::ZERO,
            rotate: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create an identity transform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transform with the given translation.
    pub fn with_translate(mut self, translate: Vec3) -> Self {
        self.translate = translate;
        self
    }

    /// Create a transform with the given Euler rotation (radians).
    pub fn with_rotate(mut self, rotate: Vec3) -> Self {
        self.rotate = rotate;
        self
    }

    /// Create a transform with the given scale.
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Rotation as a quaternion.
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::ZYX, self.rotate.z, self.rotate.y, self.rotate.x)
    }

    /// Model matrix, composed as `T * R * S`.
    ///
    /// Column-major, right-handed, matching the layout the vertex shader
    /// reads from the object metadata buffer.
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_translation(self.translate)
            * Mat4::from_quat(self.rotation())
            * Mat4::from_scale(self.scale)
    }
}
