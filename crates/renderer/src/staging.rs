//! CPU-side accumulation of one batch.
//!
//! Meshes are appended whole: their vertices are copied unchanged, their
//! indices are rebased onto the batch, and every vertex is tagged with the
//! slot of its object's transform in the metadata array. The vertex shader
//! resolves world position through that tag, so transforms never have to be
//! baked on the CPU.

use batcher_scene::{Mesh, Transform, Vertex};

use crate::batch_policy::BatchPolicy;
use crate::error::{RendererError, RendererResult};
use crate::ubo::ObjectMetadata;

/// Borrowed view of the populated prefix of every staging array.
#[derive(Clone, Copy, Debug)]
pub struct BatchUpload<'a> {
    pub vertices: &'a [Vertex],
    pub indices: &'a [u32],
    pub metadata: &'a [ObjectMetadata],
    pub tags: &'a [i32],
}

impl BatchUpload<'_> {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Fixed-capacity staging arrays sized by a [`BatchPolicy`].
///
/// Capacity is allocated up front and kept across [`reset`](Self::reset), so
/// appending never reallocates.
#[derive(Debug)]
pub struct StagingBuffer {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    metadata: Vec<ObjectMetadata>,
    tags: Vec<i32>,
    vertex_capacity: usize,
    index_capacity: usize,
    object_capacity: usize,
}

impl StagingBuffer {
    pub fn new(policy: &BatchPolicy) -> Self {
        Self {
            vertices: Vec::with_capacity(policy.vertex_capacity()),
            indices: Vec::with_capacity(policy.index_capacity()),
            metadata: Vec::with_capacity(policy.max_objects()),
            tags: Vec::with_capacity(policy.vertex_capacity()),
            vertex_capacity: policy.vertex_capacity(),
            index_capacity: policy.index_capacity(),
            object_capacity: policy.max_objects(),
        }
    }

    /// Whether `mesh` can be appended without exceeding any capacity.
    pub fn fits(&self, mesh: &Mesh) -> bool {
        self.vertices.len() + mesh.vertex_count() <= self.vertex_capacity
            && self.indices.len() + mesh.index_count() <= self.index_capacity
            && self.metadata.len() < self.object_capacity
    }

    /// Appends `mesh` as one object drawn with `transform`.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::Capacity`] if any array would overflow. The
    /// staging contents are left untouched in that case.
    pub fn append(&mut self, mesh: &Mesh, transform: &Transform) -> RendererResult<()> {
        let checks = [
            ("vertices", self.vertices.len() + mesh.vertex_count(), self.vertex_capacity),
            ("indices", self.indices.len() + mesh.index_count(), self.index_capacity),
            ("objects", self.metadata.len() + 1, self.object_capacity),
        ];
        for (resource, requested, capacity) in checks {
            if requested > capacity {
                return Err(RendererError::Capacity {
                    resource,
                    requested,
                    capacity,
                });
            }
        }

        let base = self.vertices.len() as u32;
        let tag = self.metadata.len() as i32;

        self.vertices.extend_from_slice(&mesh.vertices);
        self.indices.extend(mesh.indices.iter().map(|&index| base + index));
        self.tags
            .extend(std::iter::repeat_n(tag, mesh.vertex_count()));
        self.metadata.push(ObjectMetadata::new(transform.to_mat4()));

        Ok(())
    }

    /// Forgets all staged data. Capacity is kept.
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.metadata.clear();
        self.tags.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn object_count(&self) -> usize {
        self.metadata.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_capacity(&self) -> usize {
        self.vertex_capacity
    }

    pub fn index_capacity(&self) -> usize {
        self.index_capacity
    }

    pub fn object_capacity(&self) -> usize {
        self.object_capacity
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn metadata(&self) -> &[ObjectMetadata] {
        &self.metadata
    }

    pub fn tags(&self) -> &[i32] {
        &self.tags
    }

    pub fn upload(&self) -> BatchUpload<'_> {
        BatchUpload {
            vertices: &self.vertices,
            indices: &self.indices,
            metadata: &self.metadata,
            tags: &self.tags,
        }
    }
}
