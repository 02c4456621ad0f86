/// VulkanEffectBackend - explicit-pipeline realization of the core
/// EffectBackend capability trait
///
/// Owns the shared texture pack, the camera uniform buffer and the four
/// per-bucket instance buffers, builds each shader slot's descriptor set
/// and pipeline from the effect state's frame targets, and synchronizes the
/// device before teardown.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;
use std::sync::Arc;

use nova_batch_engine::effect::{
    BatchAggregator, BucketKind, Buckets, EffectBackend, FrameTargetId, ShaderSlot,
    TexturePackSet,
};
use nova_batch_engine::effect::EffectState;
use nova_batch_engine::error::Result;
use nova_batch_engine::renderer::{
    CameraDrawInfo, PassHint, ShaderProgram, TexturePack, DEFAULT_TEXTURE_HEIGHT,
    DEFAULT_TEXTURE_WIDTH, MAX_PACK_TEXTURES, TEXTURE_MIP_LEVELS,
};
use nova_batch_engine::{engine_bail, engine_config_err};

use crate::vulkan_aggregator::{InstanceData, InstancedAggregator, MAX_INSTANCES};
use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor::DescriptorSetBuilder;
use crate::vulkan_pipeline::{build_pipeline, pipeline_spec, TargetKind};
use crate::vulkan_shader::VulkanShaderProgram;
use crate::vulkan_texture_pack::VulkanTexturePack;

const SOURCE: &str = "nova::vulkan::EffectBackend";

/// A frame target as the render driver registered it: the render pass the
/// pipeline targets plus its color attachment count (0 for depth-only).
#[derive(Debug, Clone, Copy)]
pub struct VulkanFrameTarget {
    pub render_pass: vk::RenderPass,
    pub color_attachment_count: u32,
}

/// Camera matrices as the shaders see them (std140 layout)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CameraUniform {
    view: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
}

/// Explicit-pipeline effect backend
pub struct VulkanEffectBackend {
    ctx: Arc<GpuContext>,
    frame_targets: FxHashMap<FrameTargetId, VulkanFrameTarget>,
    texture_pack: Option<Arc<VulkanTexturePack>>,
    camera_buffer: Option<Arc<Buffer>>,
    instance_buffers: Buckets<Option<Arc<Buffer>>>,
}

impl VulkanEffectBackend {
    /// Create a backend around an externally created GPU context
    pub fn new(ctx: Arc<GpuContext>) -> Self {
        Self {
            ctx,
            frame_targets: FxHashMap::default(),
            texture_pack: None,
            camera_buffer: None,
            instance_buffers: Buckets::from_fn(|_| None),
        }
    }

    /// Register a frame target the render driver owns. Targets referenced
    /// by the effect state must be registered before the first PrePass.
    pub fn register_frame_target(&mut self, id: FrameTargetId, target: VulkanFrameTarget) {
        self.frame_targets.insert(id, target);
    }

    /// The bucket whose instance buffer a shader slot reads. Shadow slots
    /// reuse the world matrices collected for the scene pass of the same
    /// mobility class.
    fn bucket_for_slot(slot: ShaderSlot) -> BucketKind {
        match (slot.is_dynamic(), slot.has_alpha()) {
            (false, false) => BucketKind::StaticOpaque,
            (false, true) => BucketKind::StaticAlpha,
            (true, false) => BucketKind::DynamicOpaque,
            (true, true) => BucketKind::DynamicAlpha,
        }
    }
}

impl EffectBackend for VulkanEffectBackend {
    fn create_texture_packs(&mut self) -> Result<TexturePackSet> {
        // one shared pack in a single format, regardless of alpha use
        let pack = Arc::new(VulkanTexturePack::create(
            self.ctx.clone(),
            DEFAULT_TEXTURE_WIDTH,
            DEFAULT_TEXTURE_HEIGHT,
            TEXTURE_MIP_LEVELS,
            MAX_PACK_TEXTURES,
        )?);
        self.texture_pack = Some(pack.clone());

        self.camera_buffer = Some(Arc::new(Buffer::create(
            self.ctx.clone(),
            std::mem::size_of::<CameraUniform>() as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            "batch_effect_camera",
        )?));

        let shared: Arc<dyn TexturePack> = pack;
        Ok(TexturePackSet {
            opaque: shared.clone(),
            alpha: shared,
        })
    }

    fn create_aggregator(
        &mut self,
        bucket: BucketKind,
        _pack: &Arc<dyn TexturePack>,
    ) -> Result<Box<dyn BatchAggregator>> {
        let buffer = Arc::new(Buffer::create(
            self.ctx.clone(),
            (MAX_INSTANCES * std::mem::size_of::<InstanceData>()) as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            "batch_effect_instances",
        )?);

        // kept for descriptor writes of the shaders serving this bucket
        *self.instance_buffers.get_mut(bucket) = Some(buffer.clone());

        Ok(Box::new(InstancedAggregator::new(self.ctx.clone(), buffer)))
    }

    fn setup_shader(
        &mut self,
        slot: ShaderSlot,
        shader: &Arc<dyn ShaderProgram>,
        state: &EffectState,
    ) -> Result<()> {
        let Some(vk_shader) = shader.as_any().downcast_ref::<VulkanShaderProgram>() else {
            engine_bail!(SOURCE, "shader '{}' is not a Vulkan program", shader.name());
        };

        // pipelines are built once per shader, the first time needed
        if vk_shader.has_pipeline() {
            return Ok(());
        }

        let Some(targets) = state.frame_targets() else {
            return Err(engine_config_err!(
                SOURCE,
                "no frame targets supplied for slot {:?}",
                slot
            ));
        };

        let spec = pipeline_spec(slot);

        let target_id = match spec.target {
            TargetKind::DepthOnly => targets.shadow_target(),
            TargetKind::Scene => targets.scene_target(),
            TargetKind::Final => targets.final_target,
        }
        .ok_or_else(|| {
            engine_config_err!(
                SOURCE,
                "missing {:?} frame target for slot {:?}",
                spec.target,
                slot
            )
        })?;

        let target = self.frame_targets.get(&target_id).copied().ok_or_else(|| {
            engine_config_err!(
                SOURCE,
                "frame target {:?} for slot {:?} was never registered",
                target_id,
                slot
            )
        })?;

        let Some(camera_buffer) = &self.camera_buffer else {
            engine_bail!(SOURCE, "shader setup before init");
        };

        let bucket = Self::bucket_for_slot(slot);
        let Some(instance_buffer) = self.instance_buffers.get(bucket).as_ref() else {
            engine_bail!(SOURCE, "no instance buffer for bucket {:?}", bucket);
        };

        let Some(pack) = &self.texture_pack else {
            engine_bail!(SOURCE, "shader setup without a texture pack");
        };

        let mut builder = DescriptorSetBuilder::new();

        // layout(std140, binding = 0) uniform Camera
        builder.add_to_layout(
            vk::DescriptorType::UNIFORM_BUFFER,
            vk::ShaderStageFlags::VERTEX,
            0,
        );
        builder.write_buffer(
            0,
            camera_buffer.handle(),
            std::mem::size_of::<CameraUniform>() as u64,
        );

        if spec.target == TargetKind::DepthOnly {
            // layout(std140, binding = 1) uniform Instances
            builder.add_to_layout(
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX,
                1,
            );
            builder.write_buffer(1, instance_buffer.handle(), instance_buffer.size());
        } else {
            // layout(binding = 1) uniform sampler2DArray textureMaps
            builder.add_to_layout(
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                1,
            );
            builder.write_image(1, pack.view(), pack.sampler());

            // layout(std140, binding = 2) uniform Instances
            builder.add_to_layout(
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX,
                2,
            );
            builder.write_buffer(2, instance_buffer.handle(), instance_buffer.size());
        }

        let bundle = builder.build(&self.ctx.device)?;

        let built = build_pipeline(
            &self.ctx.device,
            vk_shader,
            spec,
            bundle.layout,
            target.render_pass,
            target.color_attachment_count,
        );

        let built = match built {
            Ok(built) => built,
            Err(e) => {
                bundle.destroy(&self.ctx.device);
                return Err(e);
            }
        };

        if let Ok(mut descriptors) = vk_shader.descriptors.lock() {
            *descriptors = Some(bundle);
        }
        if let Ok(mut pipeline) = vk_shader.pipeline.lock() {
            *pipeline = Some(built);
        }

        Ok(())
    }

    fn handles_pass_hint(&self, hint: PassHint) -> bool {
        // not designed for postprocessing; everything else is served
        hint != PassHint::PostProcess
    }

    fn update_camera(&mut self, camera: &CameraDrawInfo) -> Result<()> {
        let Some(buffer) = &self.camera_buffer else {
            engine_bail!(SOURCE, "camera update before init");
        };
        let uniform = CameraUniform {
            view: camera.view.to_cols_array_2d(),
            proj: camera.proj.to_cols_array_2d(),
        };
        buffer.update(0, bytemuck::bytes_of(&uniform))
    }

    fn release_shader(&mut self, shader: &Arc<dyn ShaderProgram>) -> Result<()> {
        if let Some(vk_shader) = shader.as_any().downcast_ref::<VulkanShaderProgram>() {
            vk_shader.release_gpu_state(&self.ctx.device);
        }
        Ok(())
    }

    fn wait_for_gpu(&mut self) -> Result<()> {
        // recorded command buffers must be reset before releasing objects
        // previously recorded within them
        self.ctx.wait_idle_and_reset_recordings()
    }
}
