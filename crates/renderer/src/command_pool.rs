//! Per-frame command buffer pool.
//!
//! Each frame slot owns one native pool. Command buffers are handed out in
//! order through a cursor and the list grows when a frame needs more batches
//! than any frame before it. Resetting the pool recycles all of them at once,
//! so buffers are never freed individually.

use tracing::debug;

use crate::backend::{CommandBufferLevel, GpuBackend};
use crate::error::RendererResult;

pub struct FrameCommandPool<B: GpuBackend> {
    pool: B::CommandPool,
    primaries: Vec<B::CommandBuffer>,
    secondaries: Vec<B::CommandBuffer>,
    next_primary: usize,
    next_secondary: usize,
}

impl<B: GpuBackend> FrameCommandPool<B> {
    pub fn new(backend: &B) -> RendererResult<Self> {
        Ok(Self {
            pool: backend.create_command_pool()?,
            primaries: Vec::new(),
            secondaries: Vec::new(),
            next_primary: 0,
            next_secondary: 0,
        })
    }

    /// Hands out the next unused primary buffer, allocating one if every
    /// buffer has already been used this frame.
    pub fn next_primary(&mut self, backend: &B) -> RendererResult<B::CommandBuffer> {
        if self.next_primary == self.primaries.len() {
            let buffer = backend.allocate_command_buffer(&self.pool, CommandBufferLevel::Primary)?;
            self.primaries.push(buffer);
            debug!("Grew frame command pool to {} primary buffer(s)", self.primaries.len());
        }
        let buffer = self.primaries[self.next_primary].clone();
        self.next_primary += 1;
        Ok(buffer)
    }

    pub fn next_secondary(&mut self, backend: &B) -> RendererResult<B::CommandBuffer> {
        if self.next_secondary == self.secondaries.len() {
            let buffer =
                backend.allocate_command_buffer(&self.pool, CommandBufferLevel::Secondary)?;
            self.secondaries.push(buffer);
        }
        let buffer = self.secondaries[self.next_secondary].clone();
        self.next_secondary += 1;
        Ok(buffer)
    }

    pub fn primary(&self, index: usize) -> Option<&B::CommandBuffer> {
        self.primaries.get(index)
    }

    pub fn secondary(&self, index: usize) -> Option<&B::CommandBuffer> {
        self.secondaries.get(index)
    }

    /// Rewinds both cursors and resets the native pool.
    ///
    /// Only call once the fence covering the last submission from this pool
    /// has signaled.
    pub fn reset(&mut self, backend: &B) -> RendererResult<()> {
        backend.reset_command_pool(&self.pool)?;
        self.next_primary = 0;
        self.next_secondary = 0;
        Ok(())
    }

    /// Primary buffers handed out since the last reset.
    pub fn primaries_in_use(&self) -> usize {
        self.next_primary
    }

    pub fn secondaries_in_use(&self) -> usize {
        self.next_secondary
    }

    pub fn allocated_primaries(&self) -> usize {
        self.primaries.len()
    }

    pub fn allocated_secondaries(&self) -> usize {
        self.secondaries.len()
    }
}
