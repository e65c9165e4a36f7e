//! Depth image of a render target, shared by every batch of a frame.
//!
//! Frames never overlap on the GPU because the first flush of a frame waits
//! on the previous frame's final batch, so one image per target is enough.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error, info};

use batcher_rhi::device::Device;
use batcher_rhi::{RhiError, RhiResult};

pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

const DEPTH_RANGE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::DEPTH,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

pub struct DepthBuffer {
    device: Arc<Device>,
    image: vk::Image,
    image_view: vk::ImageView,
    allocation: Option<Allocation>,
    extent: vk::Extent2D,
}

impl DepthBuffer {
    /// Creates a depth image matching `extent` in device-local memory.
    ///
    /// # Errors
    ///
    /// [`RhiError::InvalidHandle`] for a zero extent. Anything created before
    /// a later step fails is released again.
    pub fn new(device: Arc<Device>, extent: vk::Extent2D) -> RhiResult<Self> {
        if extent.width == 0 || extent.height == 0 {
            return Err(RhiError::InvalidHandle(format!(
                "depth target {}x{} has no area",
                extent.width, extent.height
            )));
        }

        let vk_device = device.handle();
        let image = unsafe { vk_device.create_image(&image_create_info(extent), None)? };

        let mut target = Self {
            device: device.clone(),
            image,
            image_view: vk::ImageView::null(),
            allocation: None,
            extent,
        };
        // From here on, dropping `target` undoes whatever has been created.
        target.bind_memory()?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(target.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .subresource_range(DEPTH_RANGE);
        target.image_view = unsafe { vk_device.create_image_view(&view_info, None)? };

        info!("Depth target {}x{} ({:?})", extent.width, extent.height, DEPTH_FORMAT);
        Ok(target)
    }

    fn bind_memory(&mut self) -> RhiResult<()> {
        let requirements = unsafe { self.device.handle().get_image_memory_requirements(self.image) };
        let allocation = self.device.allocator().lock().unwrap().allocate(&AllocationCreateDesc {
            name: "depth-target",
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;

        let offset = allocation.offset();
        let memory = unsafe { allocation.memory() };
        self.allocation = Some(allocation);
        unsafe { self.device.handle().bind_image_memory(self.image, memory, offset)? };
        Ok(())
    }

    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

fn image_create_info(extent: vk::Extent2D) -> vk::ImageCreateInfo<'static> {
    vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(DEPTH_FORMAT)
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        let device = self.device.handle();
        unsafe {
            if self.image_view != vk::ImageView::null() {
                device.destroy_image_view(self.image_view, None);
            }
            device.destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take()
            && let Err(e) = self.device.allocator().lock().unwrap().free(allocation)
        {
            error!("Depth target memory leaked: {:?}", e);
        }

        debug!("Depth target {}x{} released", self.extent.width, self.extent.height);
    }
}
