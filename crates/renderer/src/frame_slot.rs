//! Frame slots and their synchronization objects.
//!
//! There is one [`FrameSlot`] per swapchain image. A slot owns everything a
//! frame needs while it is being recorded and executed: the acquire and
//! present semaphores, a chain of batch semaphores, the in-flight and upload
//! fences, and a command pool.
//!
//! # Synchronization Flow
//!
//! ```text
//! batch 0      waits image_acquired   signals batch[0]        fence upload
//! batch 1      waits batch[0]         signals batch[1]        fence upload
//! ...
//! final batch  waits batch[k-1]       signals render_finished fence in_flight
//! present      waits render_finished
//! ```
//!
//! A frame with a single batch waits on `image_acquired` and signals
//! `render_finished` directly.

use tracing::{debug, info};

use crate::backend::GpuBackend;
use crate::command_pool::FrameCommandPool;
use crate::error::{RendererError, RendererResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Acquiring,
    Recording,
    Presenting,
}

impl SlotState {
    fn can_transition_to(self, to: SlotState) -> bool {
        matches!(
            (self, to),
            (SlotState::Idle, SlotState::Acquiring)
                | (SlotState::Acquiring, SlotState::Recording)
                | (SlotState::Recording, SlotState::Presenting)
                | (SlotState::Presenting, SlotState::Idle)
        )
    }
}

/// Which of the slot's fences a submission signals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FenceKind {
    InFlight,
    Upload,
}

/// Semaphores and fence for the next batch of a slot.
pub struct SubmitPlan<'a, B: GpuBackend> {
    pub wait: &'a B::Semaphore,
    pub signal: &'a B::Semaphore,
    pub fence: &'a B::Fence,
    pub fence_kind: FenceKind,
}

pub struct FrameSlot<B: GpuBackend> {
    image_acquired: B::Semaphore,
    render_finished: B::Semaphore,
    in_flight: B::Fence,
    upload: B::Fence,
    batch_semaphores: Vec<B::Semaphore>,
    batch_count: usize,
    is_final_batch: bool,
    image_index: u32,
    state: SlotState,
    commands: FrameCommandPool<B>,
}

impl<B: GpuBackend> FrameSlot<B> {
    pub fn new(backend: &B) -> RendererResult<Self> {
        Ok(Self {
            image_acquired: backend.create_semaphore("image-acquired")?,
            render_finished: backend.create_semaphore("render-finished")?,
            // Signaled so the first wait on a fresh slot returns immediately.
            in_flight: backend.create_fence(true, "in-flight")?,
            upload: backend.create_fence(false, "upload")?,
            batch_semaphores: Vec::new(),
            batch_count: 0,
            is_final_batch: false,
            image_index: 0,
            state: SlotState::Idle,
            commands: FrameCommandPool::new(backend)?,
        })
    }

    /// Moves to `to`, rejecting anything outside the frame lifecycle.
    pub fn transition(&mut self, to: SlotState) -> RendererResult<()> {
        if !self.state.can_transition_to(to) {
            return Err(RendererError::FrameState(format!(
                "cannot go from {:?} to {:?}",
                self.state, to
            )));
        }
        self.state = to;
        Ok(())
    }

    /// Drops back to `Idle` after a frame could not be completed.
    pub fn abort(&mut self) {
        self.state = SlotState::Idle;
        self.is_final_batch = false;
    }

    /// Replaces every semaphore and fence of the slot and drops it back to
    /// `Idle`.
    ///
    /// After a frame fails midway its acquire semaphore may still be pending
    /// and its fences may never signal again. The GPU must be idle.
    pub fn rebuild_sync(&mut self, backend: &B) -> RendererResult<()> {
        self.abort();
        self.batch_semaphores.clear();
        self.image_acquired = backend.create_semaphore("image-acquired")?;
        self.render_finished = backend.create_semaphore("render-finished")?;
        self.in_flight = backend.create_fence(true, "in-flight")?;
        self.upload = backend.create_fence(false, "upload")?;
        Ok(())
    }

    /// Clears the per-frame batch counters.
    pub fn reset_batches(&mut self) {
        self.batch_count = 0;
        self.is_final_batch = false;
    }

    pub fn mark_final(&mut self) {
        self.is_final_batch = true;
    }

    /// Picks the semaphores and fence for batch `batch_count`, creating the
    /// batch semaphore it signals if this frame is the first to need it.
    pub fn submit_plan(&mut self, backend: &B) -> RendererResult<SubmitPlan<'_, B>> {
        let k = self.batch_count;

        if !self.is_final_batch && self.batch_semaphores.len() <= k {
            self.batch_semaphores
                .push(backend.create_semaphore("batch")?);
            debug!("Frame slot now holds {} batch semaphore(s)", self.batch_semaphores.len());
        }

        let wait = if k == 0 {
            &self.image_acquired
        } else {
            &self.batch_semaphores[k - 1]
        };

        Ok(if self.is_final_batch {
            SubmitPlan {
                wait,
                signal: &self.render_finished,
                fence: &self.in_flight,
                fence_kind: FenceKind::InFlight,
            }
        } else {
            SubmitPlan {
                wait,
                signal: &self.batch_semaphores[k],
                fence: &self.upload,
                fence_kind: FenceKind::Upload,
            }
        })
    }

    /// Counts a submitted batch; the final one moves the slot to `Presenting`.
    pub fn finish_batch(&mut self) -> RendererResult<()> {
        self.batch_count += 1;
        if self.is_final_batch {
            self.transition(SlotState::Presenting)?;
        }
        Ok(())
    }

    #[inline]
    pub fn state(&self) -> SlotState {
        self.state
    }

    #[inline]
    pub fn batch_count(&self) -> usize {
        self.batch_count
    }

    #[inline]
    pub fn is_final_batch(&self) -> bool {
        self.is_final_batch
    }

    #[inline]
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    pub fn set_image_index(&mut self, image_index: u32) {
        self.image_index = image_index;
    }

    pub fn image_acquired(&self) -> &B::Semaphore {
        &self.image_acquired
    }

    pub fn render_finished(&self) -> &B::Semaphore {
        &self.render_finished
    }

    pub fn in_flight(&self) -> &B::Fence {
        &self.in_flight
    }

    pub fn upload(&self) -> &B::Fence {
        &self.upload
    }

    pub fn batch_semaphores(&self) -> &[B::Semaphore] {
        &self.batch_semaphores
    }

    pub fn commands(&self) -> &FrameCommandPool<B> {
        &self.commands
    }

    pub fn commands_mut(&mut self) -> &mut FrameCommandPool<B> {
        &mut self.commands
    }
}

/// Round-robin ring of frame slots.
pub struct FrameSlotManager<B: GpuBackend> {
    slots: Vec<FrameSlot<B>>,
    current: usize,
}

impl<B: GpuBackend> FrameSlotManager<B> {
    /// Creates one slot per swapchain image.
    pub fn new(backend: &B) -> RendererResult<Self> {
        let count = backend.image_count().max(1);
        let slots = (0..count)
            .map(|_| FrameSlot::new(backend))
            .collect::<RendererResult<Vec<_>>>()?;

        info!("Frame slot manager created with {} slot(s)", count);

        Ok(Self { slots, current: 0 })
    }

    #[inline]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn current(&self) -> &FrameSlot<B> {
        &self.slots[self.current]
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut FrameSlot<B> {
        &mut self.slots[self.current]
    }

    pub fn get(&self, index: usize) -> Option<&FrameSlot<B>> {
        self.slots.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut FrameSlot<B>> {
        self.slots.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        use SlotState::*;
        assert!(Idle.can_transition_to(Acquiring));
        assert!(Acquiring.can_transition_to(Recording));
        assert!(Recording.can_transition_to(Presenting));
        assert!(Presenting.can_transition_to(Idle));
    }

    #[test]
    fn test_invalid_transitions() {
        use SlotState::*;
        assert!(!Idle.can_transition_to(Recording));
        assert!(!Idle.can_transition_to(Idle));
        assert!(!Recording.can_transition_to(Idle));
        assert!(!Presenting.can_transition_to(Acquiring));
        assert!(!Acquiring.can_transition_to(Presenting));
    }
}
