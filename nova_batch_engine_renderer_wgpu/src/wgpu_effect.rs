/// WgpuEffectBackend - immediate-mode realization of the core
/// EffectBackend capability trait
///
/// Owns the two texture packs (opaque and alpha material classes), the
/// camera uniform buffer and the four per-bucket instance buffers, and
/// wires up each program's group-0 bind group at shader setup. The
/// immediate backend needs no frame targets and no teardown wait: pass
/// setup is the state machine's job and buffer destruction is deferred by
/// wgpu internally.

use bytemuck::{Pod, Zeroable};
use std::sync::Arc;

use nova_batch_engine::effect::{
    BatchAggregator, BucketKind, Buckets, EffectBackend, EffectState, ShaderSlot, TexturePackSet,
};
use nova_batch_engine::error::Result;
use nova_batch_engine::renderer::{
    CameraDrawInfo, PassHint, ShaderProgram, TexturePack, DEFAULT_TEXTURE_HEIGHT,
    DEFAULT_TEXTURE_WIDTH, MAX_PACK_TEXTURES, TEXTURE_MIP_LEVELS,
};
use nova_batch_engine::engine_bail;

use crate::wgpu_aggregator::MultiDrawAggregator;
use crate::wgpu_context::MultiDrawContext;
use crate::wgpu_instance::{InstanceRaw, MAX_INSTANCES};
use crate::wgpu_shader::WgpuShaderProgram;
use crate::wgpu_texture_pack::WgpuTexturePack;

const SOURCE: &str = "nova::wgpu::EffectBackend";

/// Camera matrices as the shaders see them
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CameraUniform {
    view: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
}

/// Immediate-mode effect backend
pub struct WgpuEffectBackend {
    ctx: Arc<MultiDrawContext>,
    opaque_pack: Option<Arc<WgpuTexturePack>>,
    alpha_pack: Option<Arc<WgpuTexturePack>>,
    camera_buffer: Option<Arc<wgpu::Buffer>>,
    instance_buffers: Buckets<Option<Arc<wgpu::Buffer>>>,
}

impl WgpuEffectBackend {
    /// Create a backend around an externally created context
    pub fn new(ctx: Arc<MultiDrawContext>) -> Self {
        Self {
            ctx,
            opaque_pack: None,
            alpha_pack: None,
            camera_buffer: None,
            instance_buffers: Buckets::from_fn(|_| None),
        }
    }

    /// The bucket whose instance buffer a shader slot reads
    fn bucket_for_slot(slot: ShaderSlot) -> BucketKind {
        match (slot.is_dynamic(), slot.has_alpha()) {
            (false, false) => BucketKind::StaticOpaque,
            (false, true) => BucketKind::StaticAlpha,
            (true, false) => BucketKind::DynamicOpaque,
            (true, true) => BucketKind::DynamicAlpha,
        }
    }
}

impl EffectBackend for WgpuEffectBackend {
    fn create_texture_packs(&mut self) -> Result<TexturePackSet> {
        // separate packs per material class, unlike the explicit backend's
        // single shared pack
        let opaque = Arc::new(WgpuTexturePack::create(
            &self.ctx,
            "batch_pack_opaque",
            DEFAULT_TEXTURE_WIDTH,
            DEFAULT_TEXTURE_HEIGHT,
            TEXTURE_MIP_LEVELS,
            MAX_PACK_TEXTURES,
        ));
        let alpha = Arc::new(WgpuTexturePack::create(
            &self.ctx,
            "batch_pack_alpha",
            DEFAULT_TEXTURE_WIDTH,
            DEFAULT_TEXTURE_HEIGHT,
            TEXTURE_MIP_LEVELS,
            MAX_PACK_TEXTURES,
        ));

        self.opaque_pack = Some(opaque.clone());
        self.alpha_pack = Some(alpha.clone());

        self.camera_buffer = Some(Arc::new(self.ctx.device.create_buffer(
            &wgpu::BufferDescriptor {
                label: Some("batch_effect_camera"),
                size: std::mem::size_of::<CameraUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            },
        )));

        Ok(TexturePackSet {
            opaque,
            alpha,
        })
    }

    fn create_aggregator(
        &mut self,
        bucket: BucketKind,
        _pack: &Arc<dyn TexturePack>,
    ) -> Result<Box<dyn BatchAggregator>> {
        let buffer = Arc::new(self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("batch_effect_instances"),
            size: (MAX_INSTANCES * std::mem::size_of::<InstanceRaw>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));

        // kept for bind group wiring of the shaders serving this bucket
        *self.instance_buffers.get_mut(bucket) = Some(buffer.clone());

        Ok(Box::new(MultiDrawAggregator::new(self.ctx.clone(), buffer)))
    }

    fn setup_shader(
        &mut self,
        slot: ShaderSlot,
        shader: &Arc<dyn ShaderProgram>,
        _state: &EffectState,
    ) -> Result<()> {
        let Some(wgpu_shader) = shader.as_any().downcast_ref::<WgpuShaderProgram>() else {
            engine_bail!(SOURCE, "shader '{}' is not a wgpu program", shader.name());
        };

        // bind groups are wired up once per shader
        if wgpu_shader.has_bind_group() {
            return Ok(());
        }

        let Some(camera_buffer) = &self.camera_buffer else {
            engine_bail!(SOURCE, "shader setup before init");
        };

        let pack = if slot.has_alpha() {
            &self.alpha_pack
        } else {
            &self.opaque_pack
        };
        let Some(pack) = pack else {
            engine_bail!(SOURCE, "shader setup without texture packs");
        };

        let bucket = Self::bucket_for_slot(slot);
        let Some(instance_buffer) = self.instance_buffers.get(bucket).as_ref() else {
            engine_bail!(SOURCE, "no instance buffer for bucket {:?}", bucket);
        };

        // all six batch programs share the same group-0 interface
        let bind_group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("batch_effect_group0"),
            layout: &wgpu_shader.pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(pack.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(pack.sampler()),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: instance_buffer.as_entire_binding(),
                },
            ],
        });

        if let Ok(mut group_slot) = wgpu_shader.bind_group.lock() {
            *group_slot = Some(bind_group);
        }

        Ok(())
    }

    fn handles_pass_hint(&self, hint: PassHint) -> bool {
        // not designed for postprocessing; translucent and skybox passes
        // are not served yet either
        matches!(hint, PassHint::Shadows | PassHint::Opaque)
    }

    fn update_camera(&mut self, camera: &CameraDrawInfo) -> Result<()> {
        let Some(buffer) = &self.camera_buffer else {
            engine_bail!(SOURCE, "camera update before init");
        };
        let uniform = CameraUniform {
            view: camera.view.to_cols_array_2d(),
            proj: camera.proj.to_cols_array_2d(),
        };
        self.ctx
            .queue
            .write_buffer(buffer, 0, bytemuck::bytes_of(&uniform));
        Ok(())
    }

    fn release_shader(&mut self, shader: &Arc<dyn ShaderProgram>) -> Result<()> {
        if let Some(wgpu_shader) = shader.as_any().downcast_ref::<WgpuShaderProgram>() {
            wgpu_shader.release_bind_group();
        }
        Ok(())
    }

    fn wait_for_gpu(&mut self) -> Result<()> {
        // wgpu defers resource destruction internally; no explicit wait
        Ok(())
    }
}
