//! Batch sizing.
//!
//! A [`BatchPolicy`] fixes how many triangles and distinct object transforms
//! one batch may hold, and derives the capacity and byte size of every
//! staging array and GPU mirror buffer from those two numbers. Policies are
//! immutable; changing the batch size builds a new one and recreates all
//! dependent buffers.

use batcher_scene::{Mesh, Vertex};

use crate::error::{RendererError, RendererResult};
use crate::ubo::ObjectMetadata;

/// Size of one index (`u32`).
pub const INDEX_SIZE: usize = std::mem::size_of::<u32>();
/// Size of one per-vertex object tag (`i32`).
pub const TAG_SIZE: usize = std::mem::size_of::<i32>();

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchPolicy {
    max_triangles: u32,
    max_objects: u32,
}

impl BatchPolicy {
    pub const DEFAULT_MAX_TRIANGLES: u32 = batcher_core::config::DEFAULT_MAX_TRIANGLES;
    pub const DEFAULT_MAX_OBJECTS: u32 = batcher_core::config::DEFAULT_MAX_OBJECTS;

    /// Validates and builds a policy.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::Config`] if either limit is zero. Values are
    /// never clamped.
    pub fn new(max_triangles: u32, max_objects: u32) -> RendererResult<Self> {
        if max_triangles == 0 {
            return Err(RendererError::Config(
                "max triangles per batch must be greater than 0".to_string(),
            ));
        }
        if max_objects == 0 {
            return Err(RendererError::Config(
                "max objects per batch must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            max_triangles,
            max_objects,
        })
    }

    #[inline]
    pub fn max_triangles(&self) -> usize {
        self.max_triangles as usize
    }

    #[inline]
    pub fn max_objects(&self) -> usize {
        self.max_objects as usize
    }

    #[inline]
    pub fn vertex_capacity(&self) -> usize {
        3 * self.max_triangles()
    }

    #[inline]
    pub fn index_capacity(&self) -> usize {
        3 * self.max_triangles()
    }

    pub fn vertex_bytes(&self) -> u64 {
        (self.vertex_capacity() * Vertex::SIZE) as u64
    }

    pub fn index_bytes(&self) -> u64 {
        (self.index_capacity() * INDEX_SIZE) as u64
    }

    pub fn metadata_bytes(&self) -> u64 {
        (self.max_objects() * ObjectMetadata::SIZE) as u64
    }

    pub fn tag_bytes(&self) -> u64 {
        (self.vertex_capacity() * TAG_SIZE) as u64
    }

    /// Fails if `mesh` could not fit even into an empty batch.
    ///
    /// Meshes are never split across batches.
    pub fn check_mesh(&self, mesh: &Mesh) -> RendererResult<()> {
        let checks = [
            ("triangles", mesh.face_count(), self.max_triangles()),
            ("vertices", mesh.vertex_count(), self.vertex_capacity()),
            ("indices", mesh.index_count(), self.index_capacity()),
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
        Ok(())
    }
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            max_triangles: Self::DEFAULT_MAX_TRIANGLES,
            max_objects: Self::DEFAULT_MAX_OBJECTS,
        }
    }
}
