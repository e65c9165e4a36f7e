//! Vulkan implementation of [`GpuBackend`].
//!
//! Owns the device-level objects of the engine: instance, surface, device,
//! swapchain, the batch pipeline and its descriptor sets, the per-slot
//! camera buffers, and the four mirror buffers every batch is copied into
//! before it is drawn. Depth images belong to the render targets the
//! renderer creates through [`GpuBackend::create_render_target`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use tracing::{debug, info};

use batcher_platform::{Surface, Window};
use batcher_rhi::buffer::{Buffer, BufferUsage};
use batcher_rhi::command::{CommandBuffer, CommandPool};
use batcher_rhi::descriptor::{self, BufferBinding, BufferKind, DescriptorPool, DescriptorSetLayout};
use batcher_rhi::device::Device;
use batcher_rhi::instance::{Instance, surface_extensions};
use batcher_rhi::physical_device::select_physical_device;
use batcher_rhi::pipeline::{BatchPipelineDesc, Pipeline, PipelineLayout};
use batcher_rhi::shader::{Shader, ShaderStage};
use batcher_rhi::swapchain::Swapchain;
use batcher_rhi::sync::{Fence, Semaphore};
use batcher_rhi::{RhiError, vertex};

use crate::backend::{
    AcquireOutcome, AttachmentLoad, BatchPass, CommandBufferLevel, FenceWait, GpuBackend,
    PresentOutcome, Submission,
};
use crate::batch_policy::BatchPolicy;
use crate::depth_buffer::{DEPTH_FORMAT, DepthBuffer};
use crate::error::{RendererError, RendererResult};
use crate::renderer::RendererConfig;
use crate::staging::BatchUpload;
use crate::ubo::CameraViewData;

const CAMERA_BINDING: BufferBinding =
    BufferBinding::new(0, BufferKind::Uniform, vk::ShaderStageFlags::VERTEX);
const METADATA_BINDING: BufferBinding = BufferBinding::new(
    1,
    BufferKind::Storage,
    vk::ShaderStageFlags::from_raw(
        vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
    ),
);

/// Stages a batch waits in for the previous batch (or the acquired image).
const BATCH_WAIT_STAGES: vk::PipelineStageFlags = vk::PipelineStageFlags::from_raw(
    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT.as_raw()
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS.as_raw()
        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS.as_raw(),
);

/// Host-visible copies of the staging arrays, sized by the batch policy.
struct MirrorBuffers {
    vertex: Buffer,
    index: Buffer,
    metadata: Buffer,
    tag: Buffer,
}

impl MirrorBuffers {
    fn new(device: &Arc<Device>, policy: &BatchPolicy) -> RendererResult<Self> {
        Ok(Self {
            vertex: Buffer::new(
                device.clone(),
                BufferUsage::Vertex,
                policy.vertex_bytes(),
                "vertex-mirror",
            )?,
            index: Buffer::new(
                device.clone(),
                BufferUsage::Index,
                policy.index_bytes(),
                "index-mirror",
            )?,
            metadata: Buffer::new(
                device.clone(),
                BufferUsage::Storage,
                policy.metadata_bytes(),
                "metadata-mirror",
            )?,
            tag: Buffer::new(
                device.clone(),
                BufferUsage::Vertex,
                policy.tag_bytes(),
                "tag-mirror",
            )?,
        })
    }
}

/// Vulkan backend.
///
/// Fields are dropped in declaration order: everything created from the
/// device goes first, then the device, the surface and the instance.
pub struct VulkanBackend {
    mirrors: Option<MirrorBuffers>,
    camera_buffers: Vec<Buffer>,
    descriptor_pool: DescriptorPool,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    descriptor_set_layout: DescriptorSetLayout,
    swapchain: Swapchain,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,
    acquire_timeout: Duration,
}

impl VulkanBackend {
    /// Creates every device-level object for `window`.
    ///
    /// Mirror buffers are not allocated here; the renderer sizes them with
    /// [`GpuBackend::recreate_batch_buffers`].
    ///
    /// # Errors
    ///
    /// Returns an error if Vulkan cannot be loaded, no GPU can present to
    /// the window, the shaders cannot be read, or any object fails to be
    /// created.
    pub fn new(window: &Window, config: &RendererConfig) -> RendererResult<Self> {
        let (width, height) = (window.width(), window.height());
        info!("Initializing Vulkan backend ({}x{})", width, height);

        let extensions = surface_extensions(window.raw_display_handle()?)?;
        let instance = Instance::new(config.enable_validation, &extensions)?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device_info)?;

        let swapchain = Swapchain::new(&instance, device.clone(), surface.handle(), width, height)?;

        let descriptor_set_layout =
            DescriptorSetLayout::new(device.clone(), &[CAMERA_BINDING, METADATA_BINDING])?;
        let pipeline_layout =
            PipelineLayout::new(device.clone(), &[descriptor_set_layout.handle()])?;
        let pipeline = Self::create_pipeline(
            &device,
            &pipeline_layout,
            swapchain.format(),
            &config.shader_dir,
        )?;

        let slot_count = swapchain.image_count();
        let descriptor_pool =
            DescriptorPool::with_sets(device.clone(), &descriptor_set_layout, slot_count)?;

        let camera_buffers = descriptor_pool
            .sets()
            .iter()
            .map(|&set| {
                let buffer = Buffer::new(
                    device.clone(),
                    BufferUsage::Uniform,
                    CameraViewData::SIZE as u64,
                    "camera",
                )?;
                descriptor::write_buffer(&device, set, &CAMERA_BINDING, buffer.handle());
                Ok(buffer)
            })
            .collect::<RendererResult<Vec<_>>>()?;

        info!(
            "Vulkan backend ready on '{}': {} swapchain image(s), {:?}",
            physical_device_info.device_name(),
            slot_count,
            swapchain.format()
        );

        Ok(Self {
            mirrors: None,
            camera_buffers,
            descriptor_pool,
            pipeline,
            pipeline_layout,
            descriptor_set_layout,
            swapchain,
            device,
            surface,
            instance,
            acquire_timeout: config.fence_timeout,
        })
    }

    fn create_pipeline(
        device: &Arc<Device>,
        layout: &PipelineLayout,
        color_format: vk::Format,
        shader_dir: &Path,
    ) -> RendererResult<Pipeline> {
        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("batch.vert.spv"),
            ShaderStage::Vertex,
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("batch.frag.spv"),
            ShaderStage::Fragment,
        )?;

        let desc = BatchPipelineDesc {
            vertex_shader: &vertex_shader,
            fragment_shader: &fragment_shader,
            color_format,
            depth_format: DEPTH_FORMAT,
        };
        let pipeline = Pipeline::new(device.clone(), layout, &desc)?;

        debug!("Batch pipeline created");
        Ok(pipeline)
    }

    fn mirrors(&self) -> RendererResult<&MirrorBuffers> {
        self.mirrors.as_ref().ok_or_else(|| {
            RendererError::Rhi(RhiError::InvalidHandle(
                "batch buffers have not been created".to_string(),
            ))
        })
    }

    fn descriptor_set(&self, slot: usize) -> RendererResult<vk::DescriptorSet> {
        self.descriptor_pool.sets().get(slot).copied().ok_or_else(|| {
            RendererError::Rhi(RhiError::InvalidHandle(format!(
                "no descriptor set for frame slot {}",
                slot
            )))
        })
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn descriptor_set_layout(&self) -> &DescriptorSetLayout {
        &self.descriptor_set_layout
    }

    pub fn descriptor_pool(&self) -> &DescriptorPool {
        &self.descriptor_pool
    }

    pub fn has_validation(&self) -> bool {
        self.instance.has_validation()
    }
}

impl GpuBackend for VulkanBackend {
    type Semaphore = Semaphore;
    type Fence = Fence;
    type CommandPool = CommandPool;
    type CommandBuffer = CommandBuffer;
    /// The swapchain image is shared; a target only adds its depth image.
    type RenderTarget = DepthBuffer;

    fn create_semaphore(&self, label: &'static str) -> RendererResult<Semaphore> {
        Ok(Semaphore::new(self.device.clone(), label)?)
    }

    fn create_fence(&self, signaled: bool, label: &'static str) -> RendererResult<Fence> {
        Ok(Fence::new(self.device.clone(), signaled, label)?)
    }

    fn wait_for_fence(&self, fence: &Fence, timeout: Duration) -> RendererResult<FenceWait> {
        Ok(if fence.wait(timeout)? {
            FenceWait::Signaled
        } else {
            FenceWait::TimedOut
        })
    }

    fn reset_fence(&self, fence: &Fence) -> RendererResult<()> {
        Ok(fence.reset()?)
    }

    fn create_command_pool(&self) -> RendererResult<CommandPool> {
        Ok(CommandPool::new(
            self.device.clone(),
            self.device.queue_families().graphics,
        )?)
    }

    fn allocate_command_buffer(
        &self,
        pool: &CommandPool,
        level: CommandBufferLevel,
    ) -> RendererResult<CommandBuffer> {
        let level = match level {
            CommandBufferLevel::Primary => vk::CommandBufferLevel::PRIMARY,
            CommandBufferLevel::Secondary => vk::CommandBufferLevel::SECONDARY,
        };
        Ok(pool.allocate(level)?)
    }

    fn reset_command_pool(&self, pool: &CommandPool) -> RendererResult<()> {
        Ok(pool.reset()?)
    }

    fn acquire_next_image(&self, signal: &Semaphore) -> AcquireOutcome {
        match self
            .swapchain
            .acquire_next_image(signal.handle(), self.acquire_timeout)
        {
            Ok((index, false)) => AcquireOutcome::Success(index),
            Ok((index, true)) => AcquireOutcome::Suboptimal(index),
            Err(e) => AcquireOutcome::Failed(format!("{:?}", e)),
        }
    }

    fn present(&self, image_index: u32, wait: &Semaphore) -> PresentOutcome {
        match self
            .swapchain
            .present(self.device.present_queue(), image_index, wait.handle())
        {
            Ok(false) => PresentOutcome::Success,
            Ok(true) => PresentOutcome::Suboptimal,
            Err(e) => PresentOutcome::Failed(format!("{:?}", e)),
        }
    }

    fn upload_camera(&self, slot: usize, camera: &CameraViewData) -> RendererResult<()> {
        let buffer = self.camera_buffers.get(slot).ok_or_else(|| {
            RendererError::Rhi(RhiError::InvalidHandle(format!(
                "no camera buffer for frame slot {}",
                slot
            )))
        })?;
        Ok(buffer.write(0, bytemuck::bytes_of(camera))?)
    }

    fn write_batch(&self, batch: &BatchUpload<'_>) -> RendererResult<()> {
        let mirrors = self.mirrors()?;
        mirrors.vertex.write(0, bytemuck::cast_slice(batch.vertices))?;
        mirrors.index.write(0, bytemuck::cast_slice(batch.indices))?;
        mirrors
            .metadata
            .write(0, bytemuck::cast_slice(batch.metadata))?;
        mirrors.tag.write(0, bytemuck::cast_slice(batch.tags))?;
        Ok(())
    }

    fn create_render_target(&self) -> RendererResult<DepthBuffer> {
        Ok(DepthBuffer::new(self.device.clone(), self.swapchain.extent())?)
    }

    fn resize_render_target(&self, target: &mut DepthBuffer) -> RendererResult<()> {
        let extent = self.swapchain.extent();
        if target.extent() != extent {
            *target = DepthBuffer::new(self.device.clone(), extent)?;
        }
        Ok(())
    }

    fn record_batch(
        &self,
        cmd: &CommandBuffer,
        depth: &DepthBuffer,
        pass: &BatchPass,
    ) -> RendererResult<()> {
        let mirrors = self.mirrors()?;
        let descriptor_set = self.descriptor_set(pass.slot)?;
        let image_index = pass.image_index as usize;
        let color_image = self.swapchain.image(image_index);
        let extent = self.swapchain.extent();

        cmd.begin()?;

        let load_op = match pass.load {
            AttachmentLoad::Clear => {
                cmd.transition_image_layout(
                    color_image,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                    vk::ImageAspectFlags::COLOR,
                );
                cmd.transition_image_layout(
                    depth.image(),
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
                    vk::ImageAspectFlags::DEPTH,
                );
                vk::AttachmentLoadOp::CLEAR
            }
            AttachmentLoad::Load => vk::AttachmentLoadOp::LOAD,
        };

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.swapchain.image_view(image_index))
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(load_op)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: pass.clear.color,
                },
            });

        // Later batches of the frame depth-test against what earlier ones wrote.
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(depth.image_view())
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(load_op)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: pass.clear.depth,
                    stencil: 0,
                },
            });

        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment))
            .depth_attachment(&depth_attachment);

        cmd.begin_rendering(&rendering_info);
        cmd.set_full_viewport(extent);

        if pass.index_count > 0 {
            cmd.bind_graphics_pipeline(self.pipeline.handle());
            cmd.bind_vertex_buffers(
                vertex::POSITION_BINDING,
                &[mirrors.vertex.handle(), mirrors.tag.handle()],
                &[0, 0],
            );
            cmd.bind_index_buffer(mirrors.index.handle(), vk::IndexType::UINT32);
            cmd.bind_graphics_descriptor_sets(self.pipeline_layout.handle(), &[descriptor_set]);
            cmd.draw_indexed(pass.index_count);
        }

        cmd.end_rendering();

        if pass.present {
            cmd.transition_image_layout(
                color_image,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::PRESENT_SRC_KHR,
                vk::ImageAspectFlags::COLOR,
            );
        }

        cmd.end()?;
        Ok(())
    }

    fn submit(&self, submission: Submission<'_, Self>) -> RendererResult<()> {
        let wait_semaphores = [submission.wait.handle()];
        let wait_stages = [BATCH_WAIT_STAGES];
        let command_buffers = [submission.command_buffer.handle()];
        let signal_semaphores = [submission.signal.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the command buffer was recorded by record_batch and the
        // engine only submits with a fence it has waited on and reset.
        unsafe {
            self.device
                .submit_graphics(&submit_info, submission.fence.handle())?
        };
        Ok(())
    }

    fn recreate_batch_buffers(&mut self, policy: &BatchPolicy) -> RendererResult<()> {
        // Release the old allocations before making new ones.
        self.mirrors = None;
        let mirrors = MirrorBuffers::new(&self.device, policy)?;

        self.descriptor_pool
            .write_all(&METADATA_BINDING, mirrors.metadata.handle());

        debug!(
            "Batch buffers sized for {} triangles / {} objects ({} + {} + {} + {} bytes)",
            policy.max_triangles(),
            policy.max_objects(),
            policy.vertex_bytes(),
            policy.index_bytes(),
            policy.metadata_bytes(),
            policy.tag_bytes()
        );

        self.mirrors = Some(mirrors);
        Ok(())
    }

    fn wait_idle(&self) -> RendererResult<()> {
        Ok(self.device.wait_idle()?)
    }

    fn resize(&mut self, width: u32, height: u32) -> RendererResult<()> {
        self.device.wait_idle()?;
        self.swapchain.recreate(width, height)?;

        let extent = self.swapchain.extent();
        info!("Resized to {}x{}", extent.width, extent.height);
        Ok(())
    }

    fn extent(&self) -> (u32, u32) {
        let extent = self.swapchain.extent();
        (extent.width, extent.height)
    }

    fn image_count(&self) -> usize {
        self.swapchain.image_count() as usize
    }
}
