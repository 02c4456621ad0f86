/// VulkanTexturePack - array texture storage implementing the core
/// TexturePack trait
///
/// One 2D array image in the shared pack format; layer indices are handed
/// out per source texture and memoized. Pixel upload is the texture
/// streamer's job, not this subsystem's.

use ash::vk;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};

use nova_batch_engine::error::{Error, Result};
use nova_batch_engine::renderer::TexturePack;
use nova_batch_engine::engine_err;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::PACK_TEXTURE_FORMAT;

/// Array texture pack backing the batch aggregators
pub struct VulkanTexturePack {
    ctx: Arc<GpuContext>,
    image: vk::Image,
    view: vk::ImageView,
    sampler: vk::Sampler,
    memory: Option<gpu_allocator::vulkan::Allocation>,
    max_layers: u32,
    layers: Mutex<FxHashMap<u64, u32>>,
}

impl VulkanTexturePack {
    /// Create the array image, view and sampler
    ///
    /// # Arguments
    ///
    /// * `ctx` - Shared GPU context
    /// * `width` - Layer width
    /// * `height` - Layer height
    /// * `mip_levels` - Mip chain length
    /// * `max_layers` - Array layer count
    pub fn create(
        ctx: Arc<GpuContext>,
        width: u32,
        height: u32,
        mip_levels: u32,
        max_layers: u32,
    ) -> Result<Self> {
        unsafe {
            let image_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(PACK_TEXTURE_FORMAT)
                .extent(vk::Extent3D {
                    width,
                    height,
                    depth: 1,
                })
                .mip_levels(mip_levels)
                .array_layers(max_layers)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx
                .device
                .create_image(&image_info, None)
                .map_err(|e| engine_err!("nova::vulkan", "Failed to create pack image: {:?}", e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);

            let allocation = {
                let mut allocator = ctx
                    .allocator
                    .lock()
                    .map_err(|_| Error::BackendError("allocator lock poisoned".to_string()))?;
                allocator
                    .allocate(&gpu_allocator::vulkan::AllocationCreateDesc {
                        name: "texture_pack",
                        requirements,
                        location: gpu_allocator::MemoryLocation::GpuOnly,
                        linear: false,
                        allocation_scheme:
                            gpu_allocator::vulkan::AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|e| {
                        unsafe { ctx.device.destroy_image(image, None) };
                        engine_err!("nova::vulkan", "Failed to allocate pack memory: {:?}", e)
                    })?
            };

            ctx.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
                .map_err(|e| engine_err!("nova::vulkan", "Failed to bind pack memory: {:?}", e))?;

            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D_ARRAY)
                .format(PACK_TEXTURE_FORMAT)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: mip_levels,
                    base_array_layer: 0,
                    layer_count: max_layers,
                });

            let view = ctx
                .device
                .create_image_view(&view_info, None)
                .map_err(|e| engine_err!("nova::vulkan", "Failed to create pack view: {:?}", e))?;

            let sampler_info = vk::SamplerCreateInfo::default()
                .mag_filter(vk::Filter::LINEAR)
                .min_filter(vk::Filter::LINEAR)
                .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
                .address_mode_u(vk::SamplerAddressMode::REPEAT)
                .address_mode_v(vk::SamplerAddressMode::REPEAT)
                .address_mode_w(vk::SamplerAddressMode::REPEAT)
                .min_lod(0.0)
                .max_lod(mip_levels as f32);

            let sampler = ctx
                .device
                .create_sampler(&sampler_info, None)
                .map_err(|e| engine_err!("nova::vulkan", "Failed to create pack sampler: {:?}", e))?;

            Ok(Self {
                ctx,
                image,
                view,
                sampler,
                memory: Some(allocation),
                max_layers,
                layers: Mutex::new(FxHashMap::default()),
            })
        }
    }

    /// Image view for descriptor writes
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Sampler for descriptor writes
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    /// Array image handle (for the texture streamer)
    pub fn image(&self) -> vk::Image {
        self.image
    }
}

impl TexturePack for VulkanTexturePack {
    fn acquire_layer(&self, texture_key: u64) -> Result<u32> {
        let mut layers = self
            .layers
            .lock()
            .map_err(|_| Error::BackendError("layer map lock poisoned".to_string()))?;
        if let Some(&layer) = layers.get(&texture_key) {
            return Ok(layer);
        }
        let layer = layers.len() as u32;
        if layer >= self.max_layers {
            return Err(Error::OutOfMemory);
        }
        layers.insert(texture_key, layer);
        Ok(layer)
    }

    fn layer_count(&self) -> u32 {
        self.layers.lock().map(|l| l.len() as u32).unwrap_or(0)
    }

    fn max_layers(&self) -> u32 {
        self.max_layers
    }
}

impl Drop for VulkanTexturePack {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_sampler(self.sampler, None);
            self.ctx.device.destroy_image_view(self.view, None);
            if let Some(allocation) = self.memory.take() {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}
