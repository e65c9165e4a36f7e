//! Synchronization primitives for Vulkan.
//!
//! - [`Semaphore`] orders work between queue submissions (GPU to GPU)
//! - [`Fence`] lets the host wait for submitted work (GPU to CPU)
//!
//! Both are created by their constructor and destroyed on drop. Each
//! carries a static label so resource lifetimes can be followed in the
//! debug log.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use batcher_rhi::device::Device;
//! use batcher_rhi::sync::{Fence, Semaphore};
//!
//! # fn example(device: Arc<Device>) -> Result<(), batcher_rhi::RhiError> {
//! let image_acquired = Semaphore::new(device.clone(), "image-acquired")?;
//! let in_flight = Fence::new(device, true, "in-flight")?;
//!
//! if !in_flight.wait(Duration::from_secs(1))? {
//!     // still running after one second
//! }
//! in_flight.reset()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Vulkan semaphore wrapper.
///
/// Created unsignaled. Used for image acquisition, render completion and
/// ordering between successive submissions of the same frame.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
    label: &'static str,
}

impl Semaphore {
    /// Creates a new binary semaphore.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>, label: &'static str) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        debug!("Created semaphore '{}'", label);

        Ok(Self {
            device,
            semaphore,
            label,
        })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }

    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        debug!("Destroyed semaphore '{}'", self.label);
    }
}

impl std::fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Semaphore")
            .field("label", &self.label)
            .field("handle", &self.semaphore)
            .finish()
    }
}

/// Vulkan fence wrapper.
///
/// The host waits on a fence to learn that every command buffer of a
/// submission has finished executing.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
    label: &'static str,
}

impl Fence {
    /// Creates a new fence.
    ///
    /// Frame fences are created signaled so the very first wait returns
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if fence creation fails.
    pub fn new(device: Arc<Device>, signaled: bool, label: &'static str) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);

        let fence = unsafe { device.handle().create_fence(&create_info, None)? };

        debug!("Created fence '{}' (signaled: {})", label, signaled);

        Ok(Self {
            device,
            fence,
            label,
        })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Blocks until the fence is signaled or `timeout` elapses.
    ///
    /// Returns `Ok(true)` when signaled and `Ok(false)` on timeout. The
    /// timeout is saturated to `u64::MAX` nanoseconds.
    ///
    /// # Errors
    ///
    /// Returns an error for any result other than success or timeout,
    /// such as device loss.
    pub fn wait(&self, timeout: Duration) -> RhiResult<bool> {
        let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        let fences = [self.fence];
        let result = unsafe {
            self.device
                .handle()
                .wait_for_fences(&fences, true, timeout_ns)
        };
        match result {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Resets the fence to the unsignaled state.
    ///
    /// The fence must not be attached to a pending submission.
    pub fn reset(&self) -> RhiResult<()> {
        let fences = [self.fence];
        unsafe { self.device.handle().reset_fences(&fences)? };
        Ok(())
    }

    /// Non-blocking status query.
    pub fn is_signaled(&self) -> bool {
        let result = unsafe { self.device.handle().get_fence_status(self.fence) };
        matches!(result, Ok(true))
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
        debug!("Destroyed fence '{}'", self.label);
    }
}

impl std::fmt::Debug for Fence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fence")
            .field("label", &self.label)
            .field("handle", &self.fence)
            .finish()
    }
}
