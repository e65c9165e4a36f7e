//! Perspective camera.

use glam::{Mat4, Vec3};

/// A perspective camera looking from `eye` toward `target`.
#[derive(Clone, Debug)]
pub struct Camera {
    /// Camera position in world space
    pub eye: Vec3,
    /// Point the camera looks at
    pub target: Vec3,
    /// World up direction
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Width / height
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 45.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the aspect ratio from a framebuffer size.
    ///
    /// Zero-sized framebuffers (minimized windows) leave the aspect unchanged.
    pub fn set_viewport_size(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Place the camera on a horizontal circle around `target`.
    pub fn orbit(&mut self, angle: f32, radius: f32, height: f32) {
        self.eye = self.target + Vec3::new(radius * angle.sin(), height, radius * angle.cos());
    }

    /// Get the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Get the projection matrix (with Vulkan Y-flip).
    ///
    /// Depth maps to `[0, 1]` and clip-space Y points down, so no further
    /// correction is needed in the shader.
    pub fn projection_matrix(&self) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj
    }

    /// View and projection matrices, in that order.
    pub fn view_data(&self) -> (Mat4, Mat4) {
        (self.view_matrix(), self.projection_matrix())
    }
}
