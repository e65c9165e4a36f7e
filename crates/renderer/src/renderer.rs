//! Batched draw submission.
//!
//! [`Renderer`] accumulates meshes into a staging batch, flushes the batch to
//! the GPU whenever the next mesh would overflow it, and chains the batches
//! of one frame together with semaphores so they execute in order and the
//! last one hands the image to presentation.
//!
//! # Example
//!
//! ```no_run
//! use batcher_renderer::{GpuBackend, Renderer, RendererResult};
//! use batcher_renderer::ubo::CameraViewData;
//! use batcher_scene::{Camera, Mesh, Transform};
//!
//! # fn example<B: GpuBackend>(renderer: &mut Renderer<B>, camera: &Camera) -> RendererResult<()> {
//! let cube = Mesh::cube();
//! renderer.begin_frame(&CameraViewData::from_camera(camera))?;
//! for i in 0..100 {
//!     let transform = Transform::new().with_translate(glam::Vec3::new(i as f32, 0.0, 0.0));
//!     renderer.draw_mesh(&cube, &transform)?;
//! }
//! renderer.end_frame()?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use batcher_core::EngineConfig;
use batcher_scene::{Mesh, Transform};
use tracing::{debug, error, info, warn};

use crate::backend::{
    AcquireOutcome, AttachmentLoad, BatchPass, ClearValues, FenceWait, GpuBackend, PresentOutcome,
    Submission,
};
use crate::batch_policy::BatchPolicy;
use crate::error::{RendererError, RendererResult};
use crate::frame_slot::{FenceKind, FrameSlotManager, SlotState};
use crate::render_target::{RenderTargetId, RenderTargets};
use crate::staging::StagingBuffer;
use crate::stats::RendererStats;
use crate::ubo::CameraViewData;

/// Settings the engine is created with.
#[derive(Clone, Debug, PartialEq)]
pub struct RendererConfig {
    pub max_triangles_per_batch: u32,
    pub max_objects_per_batch: u32,
    /// Upper bound for every fence wait.
    pub fence_timeout: Duration,
    pub enable_validation: bool,
    /// Directory holding `batch.vert.spv` and `batch.frag.spv`.
    pub shader_dir: PathBuf,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for RendererConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_triangles_per_batch: config.max_triangles_per_batch,
            max_objects_per_batch: config.max_objects_per_batch,
            fence_timeout: config.fence_timeout,
            enable_validation: config.enable_validation,
            shader_dir: PathBuf::from("shaders/spirv"),
        }
    }
}

/// The fence protecting the last submission that read the mirror buffers.
///
/// The mirrors are single-buffered, so every flush waits on it before
/// overwriting them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MirrorGuard {
    None,
    /// Upload fence of a slot; waited on and reset.
    Upload(usize),
    /// In-flight fence of a slot; waited on but left for that slot's final
    /// flush to reset.
    InFlight(usize),
}

/// Batched draw submission engine.
///
/// # Frame Protocol
///
/// ```text
/// begin_frame(camera)  wait slot fence, upload camera, acquire image
/// draw_mesh(..) * n    append to staging, flushing full batches
/// end_frame()          flush the final batch, present, advance slot
/// ```
///
/// A frame that fails after its image was acquired leaves GPU work and
/// semaphores behind. The renderer then waits for the device, rebuilds the
/// slot's synchronization objects and moves on, so the slot stays usable.
///
/// Resources are released in field order, so the backend (and with it the
/// device) goes last.
pub struct Renderer<B: GpuBackend> {
    staging: StagingBuffer,
    policy: BatchPolicy,
    slots: FrameSlotManager<B>,
    targets: RenderTargets<B>,
    frame_target: RenderTargetId,
    stats: RendererStats,
    mirror_guard: MirrorGuard,
    fence_timeout: Duration,
    requested_extent: (u32, u32),
    backend: B,
}

impl<B: GpuBackend> Renderer<B> {
    /// Sizes the mirror buffers for the configured policy and creates one
    /// frame slot per swapchain image.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::Config`] for a zero batch size, or whatever
    /// the backend reports while creating resources.
    pub fn new(mut backend: B, config: &RendererConfig) -> RendererResult<Self> {
        let policy = BatchPolicy::new(config.max_triangles_per_batch, config.max_objects_per_batch)?;
        if config.fence_timeout.is_zero() {
            return Err(RendererError::Config(
                "fence timeout must be greater than 0".to_string(),
            ));
        }

        backend.recreate_batch_buffers(&policy)?;
        let slots = FrameSlotManager::new(&backend)?;
        let targets = RenderTargets::new(&backend, ClearValues::default())?;
        let requested_extent = backend.extent();

        info!(
            "Renderer created: {} triangles / {} objects per batch, {} frame slot(s)",
            policy.max_triangles(),
            policy.max_objects(),
            slots.len()
        );

        Ok(Self {
            staging: StagingBuffer::new(&policy),
            policy,
            slots,
            targets,
            frame_target: RenderTargetId::DEFAULT,
            stats: RendererStats::default(),
            mirror_guard: MirrorGuard::None,
            fence_timeout: config.fence_timeout,
            requested_extent,
            backend,
        })
    }

    /// Starts a frame on the current slot, rendering into the default
    /// target.
    ///
    /// Blocks until the slot's previous frame has finished on the GPU, then
    /// uploads `camera` and acquires a swapchain image.
    ///
    /// # Errors
    ///
    /// - [`RendererError::FrameState`] if a frame is already in progress.
    /// - [`RendererError::Sync`] if the fence wait times out or acquisition
    ///   fails.
    ///
    /// On error the slot is back to idle and no frame is in progress.
    pub fn begin_frame(&mut self, camera: &CameraViewData) -> RendererResult<()> {
        self.begin_frame_with_target(RenderTargetId::DEFAULT, camera)
    }

    /// Like [`Renderer::begin_frame`], rendering into `target`.
    ///
    /// # Errors
    ///
    /// Additionally [`RendererError::Config`] if `target` does not exist.
    pub fn begin_frame_with_target(
        &mut self,
        target: RenderTargetId,
        camera: &CameraViewData,
    ) -> RendererResult<()> {
        if !self.targets.contains(target) {
            return Err(RendererError::Config(format!("{} does not exist", target)));
        }
        self.slots.current_mut().transition(SlotState::Acquiring)?;

        if let Err(e) = self.begin_frame_inner(camera) {
            self.slots.current_mut().abort();
            return Err(e);
        }
        self.frame_target = target;
        Ok(())
    }

    fn begin_frame_inner(&mut self, camera: &CameraViewData) -> RendererResult<()> {
        let slot_index = self.slots.current_index();
        let slot = self.slots.current_mut();

        match self.backend.wait_for_fence(slot.in_flight(), self.fence_timeout)? {
            FenceWait::Signaled => {}
            FenceWait::TimedOut => {
                return Err(RendererError::Sync(format!(
                    "frame slot {} fence did not signal within {:?}",
                    slot_index, self.fence_timeout
                )));
            }
        }
        if self.mirror_guard == MirrorGuard::InFlight(slot_index) {
            self.mirror_guard = MirrorGuard::None;
        }

        slot.reset_batches();
        slot.commands_mut().reset(&self.backend)?;
        self.stats.reset();
        self.staging.reset();
        self.backend.upload_camera(slot_index, camera)?;

        // Nothing after a successful acquire may fail, or the acquire
        // semaphore would be left pending with no batch waiting on it.
        let image_index = match self.backend.acquire_next_image(slot.image_acquired()) {
            AcquireOutcome::Success(index) => index,
            AcquireOutcome::Suboptimal(index) => {
                warn!("Swapchain is suboptimal for the surface (image {})", index);
                index
            }
            AcquireOutcome::Failed(reason) => {
                return Err(RendererError::Sync(format!(
                    "failed to acquire swapchain image: {}",
                    reason
                )));
            }
        };

        slot.set_image_index(image_index);
        slot.transition(SlotState::Recording)?;
        Ok(())
    }

    /// Queues `mesh` drawn with `transform`, flushing the current batch
    /// first if the mesh would not fit.
    ///
    /// # Errors
    ///
    /// - [`RendererError::FrameState`] outside `begin_frame`/`end_frame`.
    /// - [`RendererError::Capacity`] if the mesh is larger than a whole
    ///   batch. Nothing is queued or flushed in that case.
    pub fn draw_mesh(&mut self, mesh: &Mesh, transform: &Transform) -> RendererResult<()> {
        self.require_recording("draw_mesh")?;
        self.policy.check_mesh(mesh)?;

        let overflows_triangles =
            self.staging.triangle_count() + mesh.face_count() > self.policy.max_triangles();
        let overflows_objects = self.staging.object_count() >= self.policy.max_objects();

        if overflows_triangles || overflows_objects || !self.staging.fits(mesh) {
            self.flush()?;
        }

        self.staging.append(mesh, transform)
    }

    /// Submits the final batch and presents.
    ///
    /// The final batch is submitted even when nothing was drawn so the
    /// image is cleared and transitioned for presentation. The slot advances
    /// whether or not presentation succeeds.
    ///
    /// # Errors
    ///
    /// - [`RendererError::FrameState`] if no frame is being recorded.
    /// - [`RendererError::Sync`] if presentation fails, or if the final
    ///   batch could not be submitted. In the latter case the slot is
    ///   rebuilt before the error is returned.
    pub fn end_frame(&mut self) -> RendererResult<()> {
        self.require_recording("end_frame")?;

        self.slots.current_mut().mark_final();
        if let Err(e) = self.flush() {
            error!(
                "Final batch of slot {} failed: {}",
                self.slots.current_index(),
                e
            );
            self.recover_current_slot();
            self.slots.advance();
            return Err(e);
        }

        let slot = self.slots.current();
        let outcome = self
            .backend
            .present(slot.image_index(), slot.render_finished());

        self.slots.current_mut().transition(SlotState::Idle)?;
        self.slots.advance();

        match outcome {
            PresentOutcome::Success => Ok(()),
            PresentOutcome::Suboptimal => {
                warn!("Swapchain is suboptimal for the surface after present");
                Ok(())
            }
            PresentOutcome::Failed(reason) => Err(RendererError::Sync(format!(
                "failed to present swapchain image: {}",
                reason
            ))),
        }
    }

    /// Resizes the swapchain and every render target.
    ///
    /// Zero extents (a minimized window) are ignored and so is a repeat of
    /// the last requested extent. Staging is not affected.
    pub fn resize(&mut self, width: u32, height: u32) -> RendererResult<()> {
        if width == 0 || height == 0 {
            debug!("Ignoring resize to zero dimensions");
            return Ok(());
        }
        self.require_idle("resize")?;

        if (width, height) == self.requested_extent {
            return Ok(());
        }

        debug!(
            "Resize: {}x{} -> {}x{}",
            self.requested_extent.0, self.requested_extent.1, width, height
        );
        self.backend.resize(width, height)?;
        self.targets.resize_all(&self.backend)?;
        self.requested_extent = (width, height);
        Ok(())
    }

    /// Creates a render target with its own depth attachment, cleared to
    /// `clear` at the start of every frame that renders into it.
    pub fn create_render_target(&mut self, clear: ClearValues) -> RendererResult<RenderTargetId> {
        self.targets.create(&self.backend, clear)
    }

    /// Destroys `target` once the GPU is done with it.
    ///
    /// # Errors
    ///
    /// - [`RendererError::FrameState`] inside a frame.
    /// - [`RendererError::Config`] for the default target or an unknown id.
    pub fn destroy_render_target(&mut self, target: RenderTargetId) -> RendererResult<()> {
        self.require_idle("destroy_render_target")?;
        self.backend.wait_idle()?;
        drop(self.targets.remove(target)?);
        debug!("Destroyed {}", target);
        Ok(())
    }

    /// Changes what `target` is cleared to. Takes effect with the next
    /// frame's first batch.
    pub fn set_clear_values(&mut self, target: RenderTargetId, clear: ClearValues) -> RendererResult<()> {
        self.targets.set_clear_values(target, clear)
    }

    pub fn clear_values(&self, target: RenderTargetId) -> RendererResult<ClearValues> {
        self.targets.clear_values(target)
    }

    /// Number of live render targets, the default included.
    pub fn render_target_count(&self) -> usize {
        self.targets.len()
    }

    /// Replaces the batch policy.
    ///
    /// Waits for the device to go idle, then reallocates staging and the
    /// mirror buffers. Must be called between frames.
    ///
    /// # Errors
    ///
    /// - [`RendererError::Config`] for a zero value. Nothing changes.
    /// - [`RendererError::FrameState`] inside a frame.
    pub fn set_batch_size(&mut self, max_triangles: u32, max_objects: u32) -> RendererResult<()> {
        let policy = BatchPolicy::new(max_triangles, max_objects)?;
        self.require_idle("set_batch_size")?;

        self.backend.wait_idle()?;
        self.staging = StagingBuffer::new(&policy);
        self.backend.recreate_batch_buffers(&policy)?;
        self.policy = policy;
        self.settle_mirror_guard()?;

        info!(
            "Batch size set to {} triangles / {} objects",
            max_triangles, max_objects
        );
        Ok(())
    }

    /// Counters accumulated since the last `begin_frame`.
    ///
    /// A batch submitted with no indices, such as the final batch of a frame
    /// that drew nothing, is not counted as a draw call.
    #[inline]
    pub fn stats(&self) -> &RendererStats {
        &self.stats
    }

    #[inline]
    pub fn batch_policy(&self) -> &BatchPolicy {
        &self.policy
    }

    #[inline]
    pub fn staging(&self) -> &StagingBuffer {
        &self.staging
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn frame_slots(&self) -> &FrameSlotManager<B> {
        &self.slots
    }

    #[inline]
    pub fn extent(&self) -> (u32, u32) {
        self.backend.extent()
    }

    /// Whether a frame is between `begin_frame` and `end_frame`.
    pub fn is_recording(&self) -> bool {
        self.slots.current().state() == SlotState::Recording
    }

    fn require_recording(&self, operation: &str) -> RendererResult<()> {
        let state = self.slots.current().state();
        if state != SlotState::Recording {
            return Err(RendererError::FrameState(format!(
                "{} requires a frame in progress (slot is {:?})",
                operation, state
            )));
        }
        Ok(())
    }

    fn require_idle(&self, operation: &str) -> RendererResult<()> {
        let state = self.slots.current().state();
        if state != SlotState::Idle {
            return Err(RendererError::FrameState(format!(
                "{} cannot run inside a frame (slot is {:?})",
                operation, state
            )));
        }
        Ok(())
    }

    /// Waits for the last submission that read the mirrors.
    fn settle_mirror_guard(&mut self) -> RendererResult<()> {
        let (slot_index, reset) = match self.mirror_guard {
            MirrorGuard::None => return Ok(()),
            MirrorGuard::Upload(slot_index) => (slot_index, true),
            MirrorGuard::InFlight(slot_index) => (slot_index, false),
        };

        let slot = self.slots.get(slot_index).ok_or_else(|| {
            RendererError::FrameState(format!("mirror guard names unknown slot {}", slot_index))
        })?;
        let fence = if reset { slot.upload() } else { slot.in_flight() };

        if self.backend.wait_for_fence(fence, self.fence_timeout)? == FenceWait::TimedOut {
            return Err(RendererError::Sync(format!(
                "mirror buffers still in use by slot {} after {:?}",
                slot_index, self.fence_timeout
            )));
        }
        if reset {
            self.backend.reset_fence(fence)?;
        }

        self.mirror_guard = MirrorGuard::None;
        Ok(())
    }

    /// Returns the current slot to a usable `Idle` after its frame failed
    /// with GPU work or an acquired image depending on it.
    fn recover_current_slot(&mut self) {
        let slot_index = self.slots.current_index();

        if let Err(e) = self.backend.wait_idle() {
            error!("Could not wait for device idle to recover slot {}: {}", slot_index, e);
            self.slots.current_mut().abort();
            return;
        }
        // Every fence the guard could name has either signaled or is about
        // to be replaced.
        self.mirror_guard = MirrorGuard::None;
        self.staging.reset();

        match self.slots.current_mut().rebuild_sync(&self.backend) {
            Ok(()) => warn!("Frame slot {} rebuilt after a failed frame", slot_index),
            Err(e) => error!("Could not rebuild frame slot {}: {}", slot_index, e),
        }
    }

    /// Uploads, records and submits the staged batch.
    fn flush(&mut self) -> RendererResult<()> {
        self.settle_mirror_guard()?;

        let upload = self.staging.upload();
        self.backend.write_batch(&upload)?;

        let slot_index = self.slots.current_index();
        let slot = self.slots.current_mut();
        let command_buffer = slot.commands_mut().next_primary(&self.backend)?;

        let (target, clear) = self.targets.get(self.frame_target)?;
        let pass = BatchPass {
            slot: slot_index,
            image_index: slot.image_index(),
            load: if slot.batch_count() == 0 {
                AttachmentLoad::Clear
            } else {
                AttachmentLoad::Load
            },
            clear,
            present: slot.is_final_batch(),
            index_count: upload.index_count(),
        };
        self.backend.record_batch(&command_buffer, target, &pass)?;

        let plan = slot.submit_plan(&self.backend)?;
        if plan.fence_kind == FenceKind::InFlight {
            // Signaled since begin_frame, and the guard no longer names it.
            self.backend.reset_fence(plan.fence)?;
        }
        self.backend.submit(Submission {
            command_buffer: &command_buffer,
            wait: plan.wait,
            signal: plan.signal,
            fence: plan.fence,
        })?;
        self.mirror_guard = match plan.fence_kind {
            FenceKind::Upload => MirrorGuard::Upload(slot_index),
            FenceKind::InFlight => MirrorGuard::InFlight(slot_index),
        };

        debug!(
            "Flushed batch {} of slot {}: {} objects, {} vertices, {} indices{}",
            slot.batch_count(),
            slot_index,
            self.staging.object_count(),
            self.staging.vertex_count(),
            self.staging.index_count(),
            if pass.present { " (final)" } else { "" }
        );

        slot.finish_batch()?;
        self.stats
            .record(self.staging.vertex_count(), self.staging.index_count());
        self.staging.reset();
        Ok(())
    }
}

impl<B: GpuBackend> Drop for Renderer<B> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.wait_idle() {
            error!("Failed to wait for device idle during renderer drop: {}", e);
        }
        info!("Renderer destroyed");
    }
}
