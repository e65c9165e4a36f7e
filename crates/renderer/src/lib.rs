//! Batched, frame-pipelined draw submission.
//!
//! Meshes are accumulated into fixed-size CPU batches and flushed to the
//! GPU as one indexed draw each. The batches of a frame are chained with
//! semaphores so they run in submission order, and every swapchain image
//! gets its own frame slot of synchronization objects and command buffers.
//!
//! - [`BatchPolicy`] sizes the batches.
//! - [`StagingBuffer`] accumulates one batch on the CPU.
//! - [`Renderer`] drives the frame protocol over a [`GpuBackend`], into one
//!   of its render targets.
//! - [`VulkanBackend`] is the Vulkan implementation of that seam.

pub mod backend;
pub mod batch_policy;
pub mod command_pool;
pub mod depth_buffer;
mod error;
pub mod frame_slot;
pub mod render_target;
pub mod renderer;
pub mod staging;
pub mod stats;
pub mod ubo;
pub mod vulkan_backend;

pub use backend::{
    AcquireOutcome, AttachmentLoad, BatchPass, ClearValues, CommandBufferLevel, FenceWait,
    GpuBackend, PresentOutcome, Submission,
};
pub use batch_policy::BatchPolicy;
pub use error::{RendererError, RendererResult};
pub use frame_slot::{FrameSlot, FrameSlotManager, SlotState};
pub use render_target::RenderTargetId;
pub use renderer::{Renderer, RendererConfig};
pub use staging::{BatchUpload, StagingBuffer};
pub use stats::RendererStats;
pub use ubo::{CameraViewData, ObjectMetadata};
pub use vulkan_backend::VulkanBackend;
