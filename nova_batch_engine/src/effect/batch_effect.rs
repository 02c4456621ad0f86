/// BatchDrawEffect - the single-sourced effect lifecycle state machine.
///
/// Using texture arrays and large shared vertex stores, this effect renders
/// many animated, textured mesh instances in a small number of GPU
/// submissions. The state machine is backend-agnostic: everything the two
/// backends do differently (texture pack creation, aggregator realization,
/// per-shader pipeline setup, pass-hint participation, GPU teardown
/// synchronization) is reached through the [`EffectBackend`] capability
/// trait.

use std::sync::{Arc, Mutex};
use crate::error::{Error, Result};
use crate::renderer::{
    CameraDrawInfo, EffectId, EffectType, MaterialHandle, PassHint, Renderer,
    RenderStateInfo, ShaderProgram, TexturePack,
};
use super::aggregator::{BatchAggregator, BucketKind, Buckets};
use super::draw_package::{DrawPackageData, RenderObject};
use super::effect::{Effect, LightNode};
use super::effect_state::EffectState;
use super::package_builder::DrawPackageBuilder;
use super::shader_slots::{
    select_bucket, select_shader_slot, MaterialSlots, PassIndex, ShaderSlot, PASS_COUNT,
    SHADER_SLOT_COUNT,
};

const SOURCE: &str = "nova::BatchDrawEffect";

/// The texture packs an effect renders from.
///
/// The immediate backend keeps separate opaque and alpha packs; the explicit
/// backend returns the same pack in both slots.
pub struct TexturePackSet {
    /// Pack backing the opaque aggregators
    pub opaque: Arc<dyn TexturePack>,
    /// Pack backing the alpha aggregators
    pub alpha: Arc<dyn TexturePack>,
}

/// Backend capability trait: the divergent half of the effect.
///
/// One realization per graphics backend. The lifecycle driver never touches
/// GPU APIs directly; it drives these hooks plus the [`BatchAggregator`]
/// protocol.
pub trait EffectBackend: Send + Sync {
    /// Create the texture pack(s) for this effect
    fn create_texture_packs(&mut self) -> Result<TexturePackSet>;

    /// Create the aggregator realization for one bucket
    fn create_aggregator(
        &mut self,
        bucket: BucketKind,
        pack: &Arc<dyn TexturePack>,
    ) -> Result<Box<dyn BatchAggregator>>;

    /// Backend shader setup, run once per slot on the effect's first
    /// PrePass. The explicit backend builds the pipeline state object for
    /// the slot from the EffectState frame targets; the immediate backend
    /// has nothing to do here.
    fn setup_shader(
        &mut self,
        slot: ShaderSlot,
        shader: &Arc<dyn ShaderProgram>,
        state: &EffectState,
    ) -> Result<()>;

    /// Whether this backend participates in a pass with the given hint
    fn handles_pass_hint(&self, hint: PassHint) -> bool;

    /// Upload the camera matrices used by the next submission
    fn update_camera(&mut self, camera: &CameraDrawInfo) -> Result<()>;

    /// Release backend state built for a shader during setup (pipelines,
    /// descriptor sets). Called from `free()` after the GPU drain; backends
    /// without per-shader state keep the default no-op.
    fn release_shader(&mut self, _shader: &Arc<dyn ShaderProgram>) -> Result<()> {
        Ok(())
    }

    /// Block until in-flight GPU work referencing this effect's resources
    /// has completed (explicit backend); no-op for immediate backends.
    fn wait_for_gpu(&mut self) -> Result<()>;
}

/// Construction parameters for a [`BatchDrawEffect`].
pub struct EffectDesc {
    /// Renderer collaborator (shader cache, active-effect set)
    pub renderer: Arc<Mutex<dyn Renderer>>,
    /// Backend realization
    pub backend: Box<dyn EffectBackend>,
    /// Effect instance id
    pub id: EffectId,
    /// Effect manager type tag
    pub effect_type: EffectType,
    /// Material list; must hold exactly one entry per shader slot, in
    /// [`ShaderSlot`] order
    pub materials: Vec<MaterialHandle>,
}

/// Backend-agnostic batch draw effect.
pub struct BatchDrawEffect {
    renderer: Arc<Mutex<dyn Renderer>>,
    backend: Box<dyn EffectBackend>,
    id: EffectId,
    effect_type: EffectType,
    material_slots: MaterialSlots,
    cached_shaders: [Option<Arc<dyn ShaderProgram>>; SHADER_SLOT_COUNT],
    texture_packs: Option<TexturePackSet>,
    aggregators: Option<Buckets<Box<dyn BatchAggregator>>>,
    pending: Buckets<Vec<Arc<DrawPackageData>>>,
    committed: Buckets<bool>,
    current_pass: Option<PassIndex>,
    draw_active: bool,
    initialized: bool,
}

impl BatchDrawEffect {
    /// Create an effect. The material list is validated here: a list that
    /// is not exactly one entry per shader slot is a configuration error.
    pub fn new(desc: EffectDesc) -> Result<Self> {
        let material_slots = MaterialSlots::from_list(&desc.materials).map_err(|e| {
            crate::engine_error!(SOURCE, "rejecting effect construction: {}", e);
            e
        })?;

        Ok(Self {
            renderer: desc.renderer,
            backend: desc.backend,
            id: desc.id,
            effect_type: desc.effect_type,
            material_slots,
            cached_shaders: std::array::from_fn(|_| None),
            texture_packs: None,
            aggregators: None,
            pending: Buckets::default(),
            committed: Buckets::from_fn(|_| false),
            current_pass: None,
            draw_active: false,
            initialized: false,
        })
    }

    /// Number of records pending for a bucket (not yet committed)
    pub fn pending_count(&self, bucket: BucketKind) -> usize {
        self.pending.get(bucket).len()
    }

    /// Number of records committed for a bucket this frame
    pub fn committed_count(&self, bucket: BucketKind) -> usize {
        self.aggregators
            .as_ref()
            .map(|aggregators| aggregators.get(bucket).committed_count())
            .unwrap_or(0)
    }

    /// The texture packs created at init, if the effect is initialized
    pub fn texture_pack_set(&self) -> Option<&TexturePackSet> {
        self.texture_packs.as_ref()
    }

    fn lock_renderer(&self) -> Result<std::sync::MutexGuard<'_, dyn Renderer + 'static>> {
        self.renderer
            .lock()
            .map_err(|_| Error::BackendError("renderer lock poisoned".to_string()))
    }

    /// Resolve all shader slots and run backend shader setup. Invoked once
    /// per lifetime, from the first pre_pass.
    fn resolve_shaders(&mut self, state: &EffectState) -> Result<()> {
        let renderer = Arc::clone(&self.renderer);
        {
            let mut renderer = renderer
                .lock()
                .map_err(|_| Error::BackendError("renderer lock poisoned".to_string()))?;
            for slot in ShaderSlot::ALL {
                let material = self.material_slots.material(slot);
                let shader = renderer.shader_program(material).ok_or_else(|| {
                    crate::engine_config_err!(
                        SOURCE,
                        "material '{}' for slot {:?} did not resolve to a shader program",
                        material.name(),
                        slot
                    )
                })?;
                self.cached_shaders[slot.index()] = Some(shader);
            }
        }

        for slot in ShaderSlot::ALL {
            if let Some(shader) = self.cached_shaders[slot.index()].clone() {
                self.backend.setup_shader(slot, &shader, state)?;
            }
        }

        Ok(())
    }
}

impl Effect for BatchDrawEffect {
    fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let packs = self.backend.create_texture_packs()?;

        let backend = &mut self.backend;
        let aggregators = Buckets::try_from_fn(|bucket| {
            let pack = if bucket.has_alpha() {
                &packs.alpha
            } else {
                &packs.opaque
            };
            let mut aggregator = backend.create_aggregator(bucket, pack)?;
            aggregator.set_texture_pack(pack.clone());
            aggregator.set_alpha_blending(bucket.has_alpha());
            aggregator.initialize()?;
            aggregator.begin_frame();
            Ok(aggregator)
        })?;

        self.aggregators = Some(aggregators);
        self.texture_packs = Some(packs);
        self.initialized = true;

        crate::engine_debug!(SOURCE, "effect {:?} initialized", self.id);

        Ok(())
    }

    fn num_passes(&self) -> u32 {
        // for each kind of draw pass (shadows, opaque geometry, translucent
        // geometry) there is static and dynamic data: one pass for each
        PASS_COUNT
    }

    fn pre_pass(&mut self, pass: u32, state: &EffectState) -> Result<()> {
        if !self.draw_active {
            return Ok(());
        }

        if !self.initialized {
            return Err(Error::InitializationFailed(
                "pre_pass on uninitialized effect".to_string(),
            ));
        }

        self.current_pass = Some(PassIndex::from_u32(pass).ok_or_else(|| {
            crate::engine_config_err!(SOURCE, "pass index {} out of range (0..{})", pass, PASS_COUNT)
        })?);

        if self.cached_shaders[0].is_none() {
            self.resolve_shaders(state)?;
        }

        Ok(())
    }

    fn collect(&mut self, object: Option<&Arc<dyn RenderObject>>) -> bool {
        let Some(object) = object else {
            return false;
        };

        let Some(aggregators) = self.aggregators.as_ref() else {
            // failed or missing init: refuse the operation
            crate::engine_warn!(SOURCE, "collect on uninitialized effect {:?}", self.id);
            return false;
        };

        let package = match object.draw_package() {
            Some(package) => package,
            None => {
                // alpha-capable aggregators go earlier on the consultation
                // lists than default ones
                let dynamic_list: Vec<&dyn BatchAggregator> = vec![
                    aggregators.get(BucketKind::DynamicAlpha).as_ref(),
                    aggregators.get(BucketKind::DynamicOpaque).as_ref(),
                ];
                let static_list: Vec<&dyn BatchAggregator> = vec![
                    aggregators.get(BucketKind::StaticAlpha).as_ref(),
                    aggregators.get(BucketKind::StaticOpaque).as_ref(),
                ];

                let builder = DrawPackageBuilder::new(dynamic_list, static_list);
                match builder.create(object.as_ref()) {
                    Ok(package) => {
                        object.set_draw_package(package.clone());
                        package
                    }
                    Err(e) => {
                        crate::engine_error!(SOURCE, "classification failed: {}", e);
                        // the object itself was valid; it contributed nothing
                        return true;
                    }
                }
            }
        };

        for record in package.iter() {
            let bucket = BucketKind::from_flags(record.flags());
            self.pending.get_mut(bucket).push(record.clone());
        }

        if let Ok(mut renderer) = self.renderer.lock() {
            renderer.add_effect(self.id);
        }
        self.draw_active = true;

        true
    }

    fn collect_list(&mut self, objects: &[Arc<dyn RenderObject>]) -> bool {
        for object in objects {
            if !self.collect(Some(object)) {
                return false;
            }
        }
        true
    }

    fn collect_light(&mut self, _light: &LightNode) -> bool {
        // lights are gathered by the light collection elsewhere; this is a
        // plain geometry effect
        false
    }

    fn post_scene_graph(&mut self) -> Result<()> {
        let Some(aggregators) = self.aggregators.as_mut() else {
            return Err(Error::InitializationFailed(
                "post_scene_graph on uninitialized effect".to_string(),
            ));
        };

        for bucket in BucketKind::ALL {
            if *self.committed.get(bucket) {
                continue;
            }
            *self.committed.get_mut(bucket) = true;

            let records = std::mem::take(self.pending.get_mut(bucket));
            let aggregator = aggregators.get_mut(bucket);
            for record in &records {
                aggregator.add(record)?;
            }
            aggregator.commit()?;
        }

        Ok(())
    }

    fn draw(
        &mut self,
        camera: &CameraDrawInfo,
        info: &RenderStateInfo,
        _state: &EffectState,
    ) -> Result<()> {
        if !self.draw_active {
            return Ok(());
        }

        if !self.backend.handles_pass_hint(info.hint()) {
            return Ok(());
        }

        let Some(pass) = self.current_pass else {
            return Ok(());
        };

        let slot = select_shader_slot(pass, info.hint());

        // a caller-supplied override takes precedence unconditionally
        let shader = match info.shader_override() {
            Some(shader) => shader.clone(),
            None => match &self.cached_shaders[slot.index()] {
                Some(shader) => shader.clone(),
                None => {
                    crate::engine_warn!(SOURCE, "draw before shader resolution; skipping");
                    return Ok(());
                }
            },
        };

        {
            let mut renderer = self.lock_renderer()?;
            renderer.set_active_shader_program(&shader);
        }

        self.backend.update_camera(camera)?;

        let Some(aggregators) = self.aggregators.as_mut() else {
            return Ok(());
        };
        let aggregator = aggregators.get_mut(select_bucket(pass, info.hint()));
        aggregator.set_shader(shader);
        aggregator.render()?;

        Ok(())
    }

    fn post_pass(&mut self, _state: &EffectState) -> bool {
        if !self.draw_active {
            return true;
        }

        self.current_pass.is_some()
    }

    fn clear_for_next_frame(&mut self) {
        self.committed = Buckets::from_fn(|_| false);
        for (_, list) in self.pending.iter_mut() {
            list.clear();
        }
        if let Some(aggregators) = self.aggregators.as_mut() {
            for (_, aggregator) in aggregators.iter_mut() {
                aggregator.begin_frame();
            }
        }
        self.draw_active = false;
    }

    fn free(&mut self) -> Result<()> {
        self.backend.wait_for_gpu()?;

        if let Some(mut aggregators) = self.aggregators.take() {
            for (_, aggregator) in aggregators.iter_mut() {
                aggregator.shutdown();
            }
        }

        for slot in ShaderSlot::ALL {
            if let Some(shader) = self.cached_shaders[slot.index()].clone() {
                self.backend.release_shader(&shader)?;
            }
        }

        self.cached_shaders = std::array::from_fn(|_| None);
        self.texture_packs = None;
        self.current_pass = None;
        self.draw_active = false;
        self.initialized = false;

        Ok(())
    }

    fn id(&self) -> EffectId {
        self.id
    }

    fn effect_type(&self) -> EffectType {
        self.effect_type
    }

    fn is_draw_active(&self) -> bool {
        self.draw_active
    }

    fn set_draw_active(&mut self, active: bool) {
        self.draw_active = active;
    }
}

#[cfg(test)]
#[path = "batch_effect_tests.rs"]
mod tests;
