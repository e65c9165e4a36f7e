//! Triangle-list meshes.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::transform::Transform;

/// Position-only vertex.
///
/// The layout matches vertex binding 0 of the batch pipeline
/// (`R32G32B32_SFLOAT` at location 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
}

impl Vertex {
    /// Size of one vertex in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Vec3::new(x, y, z),
        }
    }
}

/// An indexed triangle list.
///
/// Indices are local to the mesh; the engine rebases them when the mesh is
/// appended to a batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Unit cube centered on the origin.
    ///
    /// Eight shared corners and twelve counter-clockwise, outward-facing
    /// triangles.
    pub fn cube() -> Self {
        let vertices = vec![
            Vertex::new(-0.5, -0.5, -0.5),
            Vertex::new(0.5, -0.5, -0.5),
            Vertex::new(0.5, 0.5, -0.5),
            Vertex::new(-0.5, 0.5, -0.5),
            Vertex::new(-0.5, -0.5, 0.5),
            Vertex::new(0.5, -0.5, 0.5),
            Vertex::new(0.5, 0.5, 0.5),
            Vertex::new(-0.5, 0.5, 0.5),
        ];
        #[rustfmt::skip]
        let indices = vec![
            4, 5, 6, 4, 6, 7, // +Z
            0, 3, 2, 0, 2, 1, // -Z
            5, 1, 2, 5, 2, 6, // +X
            0, 4, 7, 0, 7, 3, // -X
            7, 6, 2, 7, 2, 3, // +Y
            0, 1, 5, 0, 5, 4, // -Y
        ];
        Self { vertices, indices }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Number of triangles (faces).
    pub fn face_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertices_size_in_bytes(&self) -> usize {
        self.vertices.len() * Vertex::SIZE
    }

    pub fn indices_size_in_bytes(&self) -> usize {
        self.indices.len() * std::mem::size_of::<u32>()
    }

    /// Bakes `transform` into the vertex positions.
    pub fn apply_transform(&mut self, transform: &Transform) {
        let model = transform.to_mat4();
        for vertex in &mut self.vertices {
            vertex.position = model.transform_point3(vertex.position);
        }
    }

    /// Returns a copy with `transform` baked in.
    pub fn transformed(&self, transform: &Transform) -> Self {
        let mut mesh = self.clone();
        mesh.apply_transform(transform);
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        assert_eq!(Vertex::SIZE, 12);
    }

    #[test]
    fn test_cube_counts() {
        let cube = Mesh::cube();
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.index_count(), 36);
        assert_eq!(cube.face_count(), 12);
        assert_eq!(cube.vertices_size_in_bytes(), 96);
        assert_eq!(cube.indices_size_in_bytes(), 144);
    }

    #[test]
    fn test_cube_indices_in_range() {
        let cube = Mesh::cube();
        assert!(cube.indices.iter().all(|&i| (i as usize) < cube.vertex_count()));
    }

    #[test]
    fn test_cube_faces_point_outward() {
        let cube = Mesh::cube();
        for tri in cube.indices.chunks_exact(3) {
            let a = cube.vertices[tri[0] as usize].position;
            let b = cube.vertices[tri[1] as usize].position;
            let c = cube.vertices[tri[2] as usize].position;
            let normal = (b - a).cross(c - a);
            let center = (a + b + c) / 3.0;
            assert!(normal.dot(center) > 0.0, "inward face {:?}", tri);
        }
    }

    #[test]
    fn test_apply_transform() {
        let mut mesh = Mesh::new(vec![Vertex::new(1.0, 0.0, 0.0)], vec![]);
        mesh.apply_transform(&Transform::new().with_translate(Vec3::new(0.0, 2.0, 0.0)));
        assert_eq!(mesh.vertices[0].position, Vec3::new(1.0, 2.0, 0.0));
    }
}
