//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Thin, RAII-owning wrappers over `ash` used by the batch submission
//! engine. Every native object is created by a constructor and released
//! by `Drop`; nothing here knows about batching or frames.
//!
//! It handles:
//! - Instance, physical device and logical device creation
//! - Swapchain management
//! - Synchronization primitives and command recording
//! - Host-visible buffers backed by `gpu-allocator`
//! - Descriptor sets, shaders and the graphics pipeline

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
