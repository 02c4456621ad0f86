/// WgpuTexturePack - array texture storage implementing the core
/// TexturePack trait
///
/// One 2D array texture per material class; the immediate backend keeps a
/// separate pack for opaque and alpha materials. wgpu exposes no 3-channel
/// color format, so both packs use Rgba8Unorm. Layer indices are handed out
/// per source texture and memoized; pixel upload is the texture streamer's
/// job.

use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};

use nova_batch_engine::error::{Error, Result};
use nova_batch_engine::renderer::TexturePack;

use crate::wgpu_context::MultiDrawContext;

/// Array texture pack backing the batch aggregators
pub struct WgpuTexturePack {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    max_layers: u32,
    layers: Mutex<FxHashMap<u64, u32>>,
}

impl WgpuTexturePack {
    /// Create the array texture, view and sampler
    ///
    /// # Arguments
    ///
    /// * `ctx` - Shared context
    /// * `label` - Debug label ("opaque" / "alpha")
    /// * `width` - Layer width
    /// * `height` - Layer height
    /// * `mip_levels` - Mip chain length
    /// * `max_layers` - Array layer count
    pub fn create(
        ctx: &Arc<MultiDrawContext>,
        label: &str,
        width: u32,
        height: u32,
        mip_levels: u32,
        max_layers: u32,
    ) -> Self {
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: max_layers,
            },
            mip_level_count: mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });

        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            max_layers,
            layers: Mutex::new(FxHashMap::default()),
        }
    }

    /// Texture view for bind groups
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Sampler for bind groups
    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    /// Array texture handle (for the texture streamer)
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }
}

impl TexturePack for WgpuTexturePack {
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
