/// Mock effect backend for unit tests (no GPU required)
///
/// The mock aggregator records the observable protocol events (first adds,
/// commits, renders, actual submissions) behind shared stats handles, so
/// lifecycle tests can assert the batching invariants after handing
/// ownership to the effect.

#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
#[cfg(test)]
use std::sync::{Arc, Mutex};

#[cfg(test)]
use rustc_hash::FxHashMap;

#[cfg(test)]
use crate::error::{Error, Result};
#[cfg(test)]
use crate::renderer::{CameraDrawInfo, PassHint, ShaderProgram, TexturePack};
#[cfg(test)]
use super::aggregator::{BatchAggregator, BucketKind, Buckets, FrameCursor};
#[cfg(test)]
use super::batch_effect::{EffectBackend, TexturePackSet};
#[cfg(test)]
use super::draw_package::{DrawPackage, DrawPackageData, RenderObject, SubMeshData};
#[cfg(test)]
use super::effect_state::EffectState;
#[cfg(test)]
use super::shader_slots::ShaderSlot;

// ============================================================================
// Mock TexturePack
// ============================================================================

#[cfg(test)]
pub struct MockTexturePack {
    layers: Mutex<FxHashMap<u64, u32>>,
    max_layers: u32,
}

#[cfg(test)]
impl MockTexturePack {
    pub fn new(max_layers: u32) -> Self {
        Self {
            layers: Mutex::new(FxHashMap::default()),
            max_layers,
        }
    }
}

#[cfg(test)]
impl TexturePack for MockTexturePack {
    fn acquire_layer(&self, texture_key: u64) -> Result<u32> {
        let mut layers = self.layers.lock().unwrap();
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
        self.layers.lock().unwrap().len() as u32
    }

    fn max_layers(&self) -> u32 {
        self.max_layers
    }
}

// ============================================================================
// Mock Aggregator
// ============================================================================

/// Observable protocol counters of one mock aggregator.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct AggregatorStats {
    /// Total add() calls
    pub adds: usize,
    /// add() calls that were the first of their frame cycle
    pub first_adds: usize,
    /// commit() calls
    pub commits: usize,
    /// render() calls
    pub renders: usize,
    /// render() calls that actually submitted (non-empty batch)
    pub submissions: usize,
    /// shutdown() calls
    pub shutdowns: usize,
}

#[cfg(test)]
pub struct MockAggregator {
    cursor: FrameCursor,
    records: Vec<Arc<DrawPackageData>>,
    committed: usize,
    pack: Option<Arc<dyn TexturePack>>,
    alpha_blending: bool,
    shader: Option<Arc<dyn ShaderProgram>>,
    fail_initialize: bool,
    pub stats: Arc<Mutex<AggregatorStats>>,
}

#[cfg(test)]
impl MockAggregator {
    pub fn new(stats: Arc<Mutex<AggregatorStats>>, fail_initialize: bool) -> Self {
        Self {
            cursor: FrameCursor::new(),
            records: Vec::new(),
            committed: 0,
            pack: None,
            alpha_blending: false,
            shader: None,
            fail_initialize,
            stats,
        }
    }
}

#[cfg(test)]
impl BatchAggregator for MockAggregator {
    fn initialize(&mut self) -> Result<()> {
        if self.fail_initialize {
            return Err(Error::InitializationFailed("mock aggregator".to_string()));
        }
        Ok(())
    }

    fn set_texture_pack(&mut self, pack: Arc<dyn TexturePack>) {
        self.pack = Some(pack);
    }

    fn texture_pack(&self) -> Option<&Arc<dyn TexturePack>> {
        self.pack.as_ref()
    }

    fn set_alpha_blending(&mut self, enabled: bool) {
        self.alpha_blending = enabled;
    }

    fn alpha_blending(&self) -> bool {
        self.alpha_blending
    }

    fn begin_frame(&mut self) {
        self.cursor.begin_frame();
    }

    fn add(&mut self, record: &Arc<DrawPackageData>) -> Result<()> {
        let first = self.cursor.note_add()?;
        if first {
            self.records.clear();
            self.committed = 0;
            self.stats.lock().unwrap().first_adds += 1;
        }
        self.records.push(record.clone());
        self.stats.lock().unwrap().adds += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.cursor.mark_committed();
        self.committed = self.records.len();
        self.stats.lock().unwrap().commits += 1;
        Ok(())
    }

    fn committed_count(&self) -> usize {
        self.committed
    }

    fn set_shader(&mut self, shader: Arc<dyn ShaderProgram>) {
        self.shader = Some(shader);
    }

    fn render(&mut self) -> Result<()> {
        let mut stats = self.stats.lock().unwrap();
        stats.renders += 1;
        if self.committed > 0 {
            stats.submissions += 1;
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.records.clear();
        self.committed = 0;
        self.stats.lock().unwrap().shutdowns += 1;
    }
}

// ============================================================================
// Mock Backend
// ============================================================================

/// Which of the two backend gating profiles the mock emulates.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendProfile {
    /// Indirect-multidraw backend: skips post-process, translucent, skybox
    Immediate,
    /// Explicit-pipeline backend: skips post-process only; requires frame
    /// targets at shader setup
    Explicit,
}

#[cfg(test)]
pub struct MockEffectBackend {
    pub profile: BackendProfile,
    /// Stats handle per bucket, filled as aggregators are created
    pub aggregator_stats: Arc<Mutex<Buckets<Arc<Mutex<AggregatorStats>>>>>,
    /// Bucket whose aggregator fails initialize(), if any
    pub fail_bucket: Option<BucketKind>,
    /// Shader slots set up so far
    pub setup_slots: Arc<Mutex<Vec<ShaderSlot>>>,
    /// update_camera() invocations
    pub camera_updates: Arc<AtomicUsize>,
    /// wait_for_gpu() invocations
    pub gpu_waits: Arc<AtomicUsize>,
}

#[cfg(test)]
impl MockEffectBackend {
    pub fn new(profile: BackendProfile) -> Self {
        Self {
            profile,
            aggregator_stats: Arc::new(Mutex::new(Buckets::from_fn(|_| {
                Arc::new(Mutex::new(AggregatorStats::default()))
            }))),
            fail_bucket: None,
            setup_slots: Arc::new(Mutex::new(Vec::new())),
            camera_updates: Arc::new(AtomicUsize::new(0)),
            gpu_waits: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn stats(&self, bucket: BucketKind) -> Arc<Mutex<AggregatorStats>> {
        self.aggregator_stats.lock().unwrap().get(bucket).clone()
    }
}

#[cfg(test)]
impl EffectBackend for MockEffectBackend {
    fn create_texture_packs(&mut self) -> Result<TexturePackSet> {
        match self.profile {
            // two separate packs, like the indirect-multidraw backend
            BackendProfile::Immediate => Ok(TexturePackSet {
                opaque: Arc::new(MockTexturePack::new(16)),
                alpha: Arc::new(MockTexturePack::new(16)),
            }),
            // one shared pack, like the explicit backend
            BackendProfile::Explicit => {
                let pack: Arc<dyn TexturePack> = Arc::new(MockTexturePack::new(16));
                Ok(TexturePackSet {
                    opaque: pack.clone(),
                    alpha: pack,
                })
            }
        }
    }

    fn create_aggregator(
        &mut self,
        bucket: BucketKind,
        _pack: &Arc<dyn TexturePack>,
    ) -> Result<Box<dyn BatchAggregator>> {
        let stats = self.stats(bucket);
        Ok(Box::new(MockAggregator::new(
            stats,
            self.fail_bucket == Some(bucket),
        )))
    }

    fn setup_shader(
        &mut self,
        slot: ShaderSlot,
        _shader: &Arc<dyn ShaderProgram>,
        state: &EffectState,
    ) -> Result<()> {
        if self.profile == BackendProfile::Explicit && state.frame_targets().is_none() {
            return Err(Error::Configuration(format!(
                "no frame targets supplied for slot {:?}",
                slot
            )));
        }
        self.setup_slots.lock().unwrap().push(slot);
        Ok(())
    }

    fn handles_pass_hint(&self, hint: PassHint) -> bool {
        match self.profile {
            BackendProfile::Immediate => {
                matches!(hint, PassHint::Shadows | PassHint::Opaque)
            }
            BackendProfile::Explicit => hint != PassHint::PostProcess,
        }
    }

    fn update_camera(&mut self, _camera: &CameraDrawInfo) -> Result<()> {
        self.camera_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn wait_for_gpu(&mut self) -> Result<()> {
        self.gpu_waits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Mock RenderObject
// ============================================================================

#[cfg(test)]
pub struct MockRenderObject {
    sub_meshes: Vec<SubMeshData>,
    package: Mutex<Option<Arc<DrawPackage>>>,
    /// Times classification ran (sub_meshes() invocations)
    pub classify_count: AtomicUsize,
}

#[cfg(test)]
impl MockRenderObject {
    pub fn new(sub_meshes: Vec<SubMeshData>) -> Self {
        Self {
            sub_meshes,
            package: Mutex::new(None),
            classify_count: AtomicUsize::new(0),
        }
    }

    pub fn classifications(&self) -> usize {
        self.classify_count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
impl RenderObject for MockRenderObject {
    fn draw_package(&self) -> Option<Arc<DrawPackage>> {
        self.package.lock().unwrap().clone()
    }

    fn set_draw_package(&self, package: Arc<DrawPackage>) {
        *self.package.lock().unwrap() = Some(package);
    }

    fn sub_meshes(&self) -> Vec<SubMeshData> {
        self.classify_count.fetch_add(1, Ordering::SeqCst);
        self.sub_meshes.clone()
    }
}

/// Helper: build a sub-mesh with the given classification bits.
#[cfg(test)]
pub fn sub_mesh(geometry: u64, animated: bool, alpha: bool, texture_key: u64) -> SubMeshData {
    SubMeshData {
        geometry: super::draw_package::GeometryHandle(geometry),
        first_vertex: 0,
        vertex_count: 36,
        animated,
        alpha_blended: alpha,
        texture_key,
        transform: glam::Mat4::IDENTITY,
        material_index: 0,
    }
}
