//! GPU backend seam.
//!
//! The submission engine drives the GPU only through [`GpuBackend`]. The
//! Vulkan implementation lives in [`crate::vulkan_backend`]; tests plug in a
//! recording mock so batching and synchronization can be checked without a
//! device.
//!
//! Handles are owned values. Dropping one releases the underlying object, so
//! the engine must keep them alive until the GPU is done with them.

use std::time::Duration;

use crate::batch_policy::BatchPolicy;
use crate::error::RendererResult;
use crate::staging::BatchUpload;
use crate::ubo::CameraViewData;

/// Result of a bounded fence wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FenceWait {
    Signaled,
    TimedOut,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    Success(u32),
    /// The image is usable but the swapchain no longer matches the surface.
    Suboptimal(u32),
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Success,
    Suboptimal,
    Failed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandBufferLevel {
    Primary,
    Secondary,
}

/// What happens to the color and depth attachments when a batch begins
/// rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentLoad {
    /// First batch of the frame.
    Clear,
    /// Keep what earlier batches of the frame drew.
    Load,
}

/// Values a render target's attachments are cleared to by the first batch
/// of a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearValues {
    pub color: [f32; 4],
    pub depth: f32,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: [0.1, 0.1, 0.15, 1.0],
            depth: 1.0,
        }
    }
}

/// Everything needed to record one batch into a command buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatchPass {
    /// Frame slot, selects the camera block and descriptor set.
    pub slot: usize,
    /// Swapchain image to render into.
    pub image_index: u32,
    pub load: AttachmentLoad,
    /// Used when `load` is [`AttachmentLoad::Clear`].
    pub clear: ClearValues,
    /// Transition the image for presentation after rendering.
    pub present: bool,
    /// Zero records the render pass without a draw.
    pub index_count: u32,
}

/// One queue submission.
pub struct Submission<'a, B: GpuBackend> {
    pub command_buffer: &'a B::CommandBuffer,
    pub wait: &'a B::Semaphore,
    pub signal: &'a B::Semaphore,
    pub fence: &'a B::Fence,
}

pub trait GpuBackend: Sized {
    type Semaphore;
    type Fence;
    type CommandPool;
    type CommandBuffer: Clone;
    /// Depth attachment and anything else a frame renders into besides the
    /// swapchain image.
    type RenderTarget;

    fn create_semaphore(&self, label: &'static str) -> RendererResult<Self::Semaphore>;

    fn create_fence(&self, signaled: bool, label: &'static str) -> RendererResult<Self::Fence>;

    /// Waits at most `timeout`. A timeout is reported, not treated as an error.
    fn wait_for_fence(&self, fence: &Self::Fence, timeout: Duration) -> RendererResult<FenceWait>;

    fn reset_fence(&self, fence: &Self::Fence) -> RendererResult<()>;

    fn create_command_pool(&self) -> RendererResult<Self::CommandPool>;

    fn allocate_command_buffer(
        &self,
        pool: &Self::CommandPool,
        level: CommandBufferLevel,
    ) -> RendererResult<Self::CommandBuffer>;

    /// Returns every command buffer of `pool` to the initial state.
    fn reset_command_pool(&self, pool: &Self::CommandPool) -> RendererResult<()>;

    fn acquire_next_image(&self, signal: &Self::Semaphore) -> AcquireOutcome;

    fn present(&self, image_index: u32, wait: &Self::Semaphore) -> PresentOutcome;

    /// Writes the camera block of frame slot `slot`.
    fn upload_camera(&self, slot: usize, camera: &CameraViewData) -> RendererResult<()>;

    /// Copies a staged batch into the GPU mirror buffers.
    fn write_batch(&self, batch: &BatchUpload<'_>) -> RendererResult<()>;

    /// Creates a target sized to the current swapchain extent.
    fn create_render_target(&self) -> RendererResult<Self::RenderTarget>;

    /// Matches `target` to the current swapchain extent. The GPU must be idle.
    fn resize_render_target(&self, target: &mut Self::RenderTarget) -> RendererResult<()>;

    fn record_batch(
        &self,
        command_buffer: &Self::CommandBuffer,
        target: &Self::RenderTarget,
        pass: &BatchPass,
    ) -> RendererResult<()>;

    fn submit(&self, submission: Submission<'_, Self>) -> RendererResult<()>;

    /// Reallocates the mirror buffers for `policy` and repoints every
    /// descriptor that references them. The GPU must be idle.
    fn recreate_batch_buffers(&mut self, policy: &BatchPolicy) -> RendererResult<()>;

    fn wait_idle(&self) -> RendererResult<()>;

    /// Recreates the swapchain. Render targets are resized separately. The
    /// GPU must be idle.
    fn resize(&mut self, width: u32, height: u32) -> RendererResult<()>;

    fn extent(&self) -> (u32, u32);

    /// Number of swapchain images, which is also the number of frame slots.
    fn image_count(&self) -> usize;
}
