//! The batch graphics pipeline.
//!
//! The engine draws everything with one pipeline, so the fixed-function
//! state is not configurable: indexed triangle lists from the two vertex
//! streams in [`crate::vertex`], back faces culled (front faces wind
//! counter-clockwise), depth tested and written with `LESS`, and opaque
//! color output. Viewport and scissor are dynamic so the pipeline survives
//! swapchain recreation. Rendering goes through dynamic rendering, so only
//! the attachment formats are baked in.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use batcher_rhi::device::Device;
//! use batcher_rhi::pipeline::{BatchPipelineDesc, Pipeline, PipelineLayout};
//! use batcher_rhi::shader::Shader;
//! use batcher_rhi::vk;
//!
//! # fn example(
//! #     device: Arc<Device>,
//! #     vs: &Shader,
//! #     fs: &Shader,
//! #     set_layout: vk::DescriptorSetLayout,
//! # ) -> Result<(), batcher_rhi::RhiError> {
//! let layout = PipelineLayout::new(device.clone(), &[set_layout])?;
//! let desc = BatchPipelineDesc {
//!     vertex_shader: vs,
//!     fragment_shader: fs,
//!     color_format: vk::Format::B8G8R8A8_SRGB,
//!     depth_format: vk::Format::D32_SFLOAT,
//! };
//! let pipeline = Pipeline::new(device, &layout, &desc)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::{Shader, ShaderStage};
use crate::vertex;

const TOPOLOGY: vk::PrimitiveTopology = vk::PrimitiveTopology::TRIANGLE_LIST;
const CULL_MODE: vk::CullModeFlags = vk::CullModeFlags::BACK;
const FRONT_FACE: vk::FrontFace = vk::FrontFace::COUNTER_CLOCKWISE;
const DEPTH_COMPARE: vk::CompareOp = vk::CompareOp::LESS;
const DYNAMIC_STATES: [vk::DynamicState; 2] =
    [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];

/// Layout with descriptor sets only; the batch shaders use no push constants.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    pub fn new(device: Arc<Device>, set_layouts: &[vk::DescriptorSetLayout]) -> RhiResult<Self> {
        let info = vk::PipelineLayoutCreateInfo::default().set_layouts(set_layouts);
        let layout = unsafe { device.handle().create_pipeline_layout(&info, None)? };

        debug!("Pipeline layout with {} set(s)", set_layouts.len());
        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_pipeline_layout(self.layout, None) };
    }
}

/// What varies between batch pipeline instances.
#[derive(Clone, Copy)]
pub struct BatchPipelineDesc<'a> {
    pub vertex_shader: &'a Shader,
    pub fragment_shader: &'a Shader,
    /// Swapchain image format.
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
}

impl BatchPipelineDesc<'_> {
    fn validate(&self) -> RhiResult<()> {
        for (shader, expected) in [
            (self.vertex_shader, ShaderStage::Vertex),
            (self.fragment_shader, ShaderStage::Fragment),
        ] {
            if shader.stage() != expected {
                return Err(RhiError::PipelineError(format!(
                    "{} shader slot holds a {} shader",
                    expected,
                    shader.stage()
                )));
            }
        }
        if self.color_format == vk::Format::UNDEFINED || self.depth_format == vk::Format::UNDEFINED {
            return Err(RhiError::PipelineError(
                "attachment formats must be defined".to_string(),
            ));
        }
        Ok(())
    }
}

/// Graphics pipeline handle.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    /// Creates the batch pipeline.
    ///
    /// # Errors
    ///
    /// [`RhiError::PipelineError`] if the shaders are in the wrong slots or a
    /// format is undefined; otherwise the Vulkan error from creation.
    pub fn new(
        device: Arc<Device>,
        layout: &PipelineLayout,
        desc: &BatchPipelineDesc<'_>,
    ) -> RhiResult<Self> {
        desc.validate()?;

        let stages = [
            desc.vertex_shader.stage_create_info(),
            desc.fragment_shader.stage_create_info(),
        ];

        let bindings = vertex::binding_descriptions();
        let attributes = vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default().topology(TOPOLOGY);

        // Counts only; the rectangles are set per pass.
        let viewport = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let raster = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(CULL_MODE)
            .front_face(FRONT_FACE)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(DEPTH_COMPARE)
            .max_depth_bounds(1.0);

        let blend_attachment = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA)];
        let blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachment);

        let dynamic = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&DYNAMIC_STATES);

        let color_formats = [desc.color_format];
        let mut attachments = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(desc.depth_format);

        let info = vk::GraphicsPipelineCreateInfo::default()
            .push_next(&mut attachments)
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport)
            .rasterization_state(&raster)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth)
            .color_blend_state(&blend)
            .dynamic_state(&dynamic)
            .layout(layout.handle());

        let created = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&info), None)
        };
        let pipeline = match created {
            Ok(pipelines) => pipelines[0],
            Err((_, result)) => return Err(result.into()),
        };

        info!(
            "Batch pipeline ready: color {:?}, depth {:?}",
            desc.color_format, desc.depth_format
        );
        Ok(Self { device, pipeline })
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_pipeline(self.pipeline, None) };
        debug!("Batch pipeline destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_state() {
        assert_eq!(TOPOLOGY, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(CULL_MODE, vk::CullModeFlags::BACK);
        assert_eq!(FRONT_FACE, vk::FrontFace::COUNTER_CLOCKWISE);
        assert_eq!(DEPTH_COMPARE, vk::CompareOp::LESS);
        assert!(DYNAMIC_STATES.contains(&vk::DynamicState::VIEWPORT));
        assert!(DYNAMIC_STATES.contains(&vk::DynamicState::SCISSOR));
    }
}
