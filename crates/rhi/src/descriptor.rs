//! Descriptor sets made only of whole-buffer bindings.
//!
//! A [`BufferBinding`] list describes one set layout. The same list sizes the
//! pool and addresses the writes, so the three can not drift apart.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    Uniform,
    /// Read-only SSBO.
    Storage,
}

impl BufferKind {
    pub fn descriptor_type(self) -> vk::DescriptorType {
        match self {
            BufferKind::Uniform => vk::DescriptorType::UNIFORM_BUFFER,
            BufferKind::Storage => vk::DescriptorType::STORAGE_BUFFER,
        }
    }
}

/// One buffer slot of a set layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferBinding {
    pub binding: u32,
    pub kind: BufferKind,
    pub stages: vk::ShaderStageFlags,
}

impl BufferBinding {
    pub const fn new(binding: u32, kind: BufferKind, stages: vk::ShaderStageFlags) -> Self {
        Self { binding, kind, stages }
    }

    fn layout_binding(&self) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(self.binding)
            .descriptor_type(self.kind.descriptor_type())
            .descriptor_count(1)
            .stage_flags(self.stages)
    }
}

/// Pool sizes for `sets` copies of a layout made of `bindings`.
fn pool_sizes(bindings: &[BufferBinding], sets: u32) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for b in bindings {
        let ty = b.kind.descriptor_type();
        match sizes.iter_mut().find(|size| size.ty == ty) {
            Some(size) => size.descriptor_count += sets,
            None => sizes.push(vk::DescriptorPoolSize { ty, descriptor_count: sets }),
        }
    }
    sizes
}

pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
    bindings: Vec<BufferBinding>,
}

impl DescriptorSetLayout {
    pub fn new(device: Arc<Device>, bindings: &[BufferBinding]) -> RhiResult<Self> {
        let vk_bindings: Vec<_> = bindings.iter().map(BufferBinding::layout_binding).collect();
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);
        let layout = unsafe { device.handle().create_descriptor_set_layout(&info, None)? };

        debug!("Descriptor set layout: {:?}", bindings);
        Ok(Self {
            device,
            layout,
            bindings: bindings.to_vec(),
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    pub fn bindings(&self) -> &[BufferBinding] {
        &self.bindings
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_descriptor_set_layout(self.layout, None) };
    }
}

/// Pool holding a fixed number of sets of one layout. The sets are freed
/// together with the pool.
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
}

impl DescriptorPool {
    /// Creates the pool and allocates all `count` sets from it up front.
    pub fn with_sets(device: Arc<Device>, layout: &DescriptorSetLayout, count: u32) -> RhiResult<Self> {
        let sizes = pool_sizes(layout.bindings(), count);
        let info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(count)
            .pool_sizes(&sizes);
        let pool = unsafe { device.handle().create_descriptor_pool(&info, None)? };

        let layouts = vec![layout.handle(); count as usize];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = match unsafe { device.handle().allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets,
            Err(e) => {
                unsafe { device.handle().destroy_descriptor_pool(pool, None) };
                return Err(e.into());
            }
        };

        debug!("Descriptor pool with {} set(s)", count);
        Ok(Self { device, pool, sets })
    }

    pub fn sets(&self) -> &[vk::DescriptorSet] {
        &self.sets
    }

    /// Points `binding` of every set at the whole of `buffer`.
    pub fn write_all(&self, binding: &BufferBinding, buffer: vk::Buffer) {
        for &set in &self.sets {
            write_buffer(&self.device, set, binding, buffer);
        }
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_descriptor_pool(self.pool, None) };
    }
}

/// Points `binding` of `set` at the whole of `buffer`.
pub fn write_buffer(device: &Device, set: vk::DescriptorSet, binding: &BufferBinding, buffer: vk::Buffer) {
    let info = [vk::DescriptorBufferInfo {
        buffer,
        offset: 0,
        range: vk::WHOLE_SIZE,
    }];
    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding.binding)
        .descriptor_type(binding.kind.descriptor_type())
        .buffer_info(&info);

    unsafe { device.handle().update_descriptor_sets(std::slice::from_ref(&write), &[]) };
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAMERA: BufferBinding =
        BufferBinding::new(0, BufferKind::Uniform, vk::ShaderStageFlags::VERTEX);
    const MODELS: BufferBinding =
        BufferBinding::new(1, BufferKind::Storage, vk::ShaderStageFlags::VERTEX);

    #[test]
    fn test_layout_binding() {
        let b = MODELS.layout_binding();
        assert_eq!(b.binding, 1);
        assert_eq!(b.descriptor_type, vk::DescriptorType::STORAGE_BUFFER);
        assert_eq!(b.descriptor_count, 1);
        assert_eq!(b.stage_flags, vk::ShaderStageFlags::VERTEX);
    }

    #[test]
    fn test_pool_sizes_scale_with_set_count() {
        let sizes = pool_sizes(&[CAMERA, MODELS], 3);
        assert_eq!(sizes.len(), 2);
        assert!(sizes.iter().all(|s| s.descriptor_count == 3));
    }

    #[test]
    fn test_pool_sizes_merge_same_kind() {
        let second_ubo = BufferBinding::new(2, BufferKind::Uniform, vk::ShaderStageFlags::FRAGMENT);
        let sizes = pool_sizes(&[CAMERA, second_ubo], 2);
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 4);
    }
}
