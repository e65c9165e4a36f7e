//! Shader-visible data blocks.
//!
//! These structures must match the GLSL layouts in `shaders/batch.vert`
//! exactly. All of them are `#[repr(C)]` and `Pod` so they can be copied into
//! mapped memory with `bytemuck`.

use batcher_scene::Camera;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Per-frame camera block (set 0, binding 0).
///
/// # Memory Layout
///
/// - Offset 0: view matrix (64 bytes)
/// - Offset 64: projection matrix (64 bytes)
/// - Total size: 128 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CameraViewData {
    pub view: Mat4,
    pub projection: Mat4,
}

impl CameraViewData {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self { view, projection }
    }

    pub fn from_camera(camera: &Camera) -> Self {
        let (view, projection) = camera.view_data();
        Self { view, projection }
    }
}

impl Default for CameraViewData {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY)
    }
}

/// One entry of the per-object storage buffer (set 0, binding 1).
///
/// Vertices select their entry through the object tag written next to them.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ObjectMetadata {
    /// Object to world.
    pub model: Mat4,
}

impl ObjectMetadata {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(model: Mat4) -> Self {
        Self { model }
    }
}

impl Default for ObjectMetadata {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_camera_view_data_size() {
        assert_eq!(CameraViewData::SIZE, 128);
        assert_eq!(std::mem::align_of::<CameraViewData>(), 16);
    }

    #[test]
    fn test_object_metadata_size() {
        assert_eq!(ObjectMetadata::SIZE, 64);
    }

    #[test]
    fn test_from_camera_matches_camera_matrices() {
        let mut camera = Camera::new();
        camera.set_viewport_size(800, 600);
        let data = CameraViewData::from_camera(&camera);
        assert_eq!(data.view, camera.view_matrix());
        assert_eq!(data.projection, camera.projection_matrix());
    }

    #[test]
    fn test_metadata_bytes_are_column_major() {
        let metadata = ObjectMetadata::new(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        let floats: [f32; 16] = bytemuck::cast(metadata);
        assert_eq!(&floats[12..15], &[1.0, 2.0, 3.0]);
    }
}
