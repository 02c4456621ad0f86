/// DescriptorSetBuilder - accumulates layout bindings and resource writes,
/// then materializes layout, pool and set in one step.
///
/// Each shader program owns one builder; the effect's shader setup adds the
/// camera uniform, the bucket instance buffer and (for scene shaders) the
/// texture pack before the pipeline is built.

use ash::vk;

use nova_batch_engine::error::{Error, Result};
use nova_batch_engine::engine_err;

/// A pending buffer write
struct BufferWrite {
    binding: u32,
    buffer: vk::Buffer,
    range: u64,
}

/// A pending combined image sampler write
struct ImageWrite {
    binding: u32,
    view: vk::ImageView,
    sampler: vk::Sampler,
}

/// Materialized descriptor objects
pub struct DescriptorBundle {
    pub layout: vk::DescriptorSetLayout,
    pub pool: vk::DescriptorPool,
    pub set: vk::DescriptorSet,
}

impl DescriptorBundle {
    /// Destroy pool and layout (the set dies with the pool)
    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_descriptor_pool(self.pool, None);
            device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Builder for one shader's descriptor set
#[derive(Default)]
pub struct DescriptorSetBuilder {
    bindings: Vec<(u32, vk::DescriptorType, vk::ShaderStageFlags)>,
    buffer_writes: Vec<BufferWrite>,
    image_writes: Vec<ImageWrite>,
}

impl DescriptorSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a binding in the set layout
    pub fn add_to_layout(
        &mut self,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
        binding: u32,
    ) -> &mut Self {
        self.bindings.push((binding, descriptor_type, stage_flags));
        self
    }

    /// Queue a uniform-buffer write for `binding`
    pub fn write_buffer(&mut self, binding: u32, buffer: vk::Buffer, range: u64) -> &mut Self {
        self.buffer_writes.push(BufferWrite {
            binding,
            buffer,
            range,
        });
        self
    }

    /// Queue a combined-image-sampler write for `binding`
    pub fn write_image(
        &mut self,
        binding: u32,
        view: vk::ImageView,
        sampler: vk::Sampler,
    ) -> &mut Self {
        self.image_writes.push(ImageWrite {
            binding,
            view,
            sampler,
        });
        self
    }

    /// Create layout, pool and set, and flush all queued writes
    pub fn build(&self, device: &ash::Device) -> Result<DescriptorBundle> {
        if self.bindings.is_empty() {
            return Err(Error::InvalidResource(
                "descriptor set builder has no bindings".to_string(),
            ));
        }

        unsafe {
            let layout_bindings: Vec<vk::DescriptorSetLayoutBinding> = self
                .bindings
                .iter()
                .map(|&(binding, descriptor_type, stage_flags)| {
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(binding)
                        .descriptor_type(descriptor_type)
                        .descriptor_count(1)
                        .stage_flags(stage_flags)
                })
                .collect();

            let layout_info =
                vk::DescriptorSetLayoutCreateInfo::default().bindings(&layout_bindings);

            let layout = device
                .create_descriptor_set_layout(&layout_info, None)
                .map_err(|e| {
                    engine_err!("nova::vulkan", "Failed to create descriptor layout: {:?}", e)
                })?;

            // one pool sized exactly for this set
            let pool_sizes: Vec<vk::DescriptorPoolSize> = self
                .bindings
                .iter()
                .map(|&(_, descriptor_type, _)| vk::DescriptorPoolSize {
                    ty: descriptor_type,
                    descriptor_count: 1,
                })
                .collect();

            let pool_info = vk::DescriptorPoolCreateInfo::default()
                .max_sets(1)
                .pool_sizes(&pool_sizes);

            let pool = device.create_descriptor_pool(&pool_info, None).map_err(|e| {
                unsafe { device.destroy_descriptor_set_layout(layout, None) };
                engine_err!("nova::vulkan", "Failed to create descriptor pool: {:?}", e)
            })?;

            let layouts = [layout];
            let allocate_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&layouts);

            let sets = device.allocate_descriptor_sets(&allocate_info).map_err(|e| {
                unsafe {
                    device.destroy_descriptor_pool(pool, None);
                    device.destroy_descriptor_set_layout(layout, None);
                }
                engine_err!("nova::vulkan", "Failed to allocate descriptor set: {:?}", e)
            })?;
            let set = sets[0];

            // flush queued writes
            let buffer_infos: Vec<vk::DescriptorBufferInfo> = self
                .buffer_writes
                .iter()
                .map(|write| vk::DescriptorBufferInfo {
                    buffer: write.buffer,
                    offset: 0,
                    range: write.range,
                })
                .collect();

            let image_infos: Vec<vk::DescriptorImageInfo> = self
                .image_writes
                .iter()
                .map(|write| vk::DescriptorImageInfo {
                    sampler: write.sampler,
                    image_view: write.view,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                })
                .collect();

            let mut writes: Vec<vk::WriteDescriptorSet> = Vec::new();
            for (index, write) in self.buffer_writes.iter().enumerate() {
                writes.push(
                    vk::WriteDescriptorSet::default()
                        .dst_set(set)
                        .dst_binding(write.binding)
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .buffer_info(std::slice::from_ref(&buffer_infos[index])),
                );
            }
            for (index, write) in self.image_writes.iter().enumerate() {
                writes.push(
                    vk::WriteDescriptorSet::default()
                        .dst_set(set)
                        .dst_binding(write.binding)
                        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(std::slice::from_ref(&image_infos[index])),
                );
            }

            device.update_descriptor_sets(&writes, &[]);

            Ok(DescriptorBundle { layout, pool, set })
        }
    }
}
