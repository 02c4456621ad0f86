/// Effect lifecycle trait - the contract the render driver invokes once per
/// frame, per effect.
///
/// Per-frame order: collect* (during scene traversal) -> post_scene_graph
/// (once, after traversal) -> for each pass 0..num_passes():
/// pre_pass -> draw -> post_pass -> clear_for_next_frame (once, between
/// frames).

use std::sync::Arc;
use crate::error::Result;
use crate::renderer::{CameraDrawInfo, EffectId, EffectType, RenderStateInfo};
use super::draw_package::RenderObject;
use super::effect_state::EffectState;

/// Opaque scene-graph light node reference.
///
/// Light collection is handled elsewhere; batch draw effects always decline
/// light nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightNode(pub u64);

/// Lifecycle contract exposed to the render driver.
pub trait Effect: Send + Sync {
    /// Allocate texture packs and aggregators. Idempotent: safe to call
    /// multiple times, only the first has effect. Failure leaves the effect
    /// uninitialized and refusing further operations.
    fn init(&mut self) -> Result<()>;

    /// Number of passes the driver must run (pre_pass/draw/post_pass per
    /// pass index)
    fn num_passes(&self) -> u32;

    /// Record the current pass. The first invocation of the effect's
    /// lifetime resolves and caches all shader slots and performs backend
    /// shader/pipeline setup from `state`.
    fn pre_pass(&mut self, pass: u32, state: &EffectState) -> Result<()>;

    /// Classify an object (memoized) and disperse its records into the
    /// pending buckets. Returns false only for `None`; true otherwise, even
    /// when the object contributed zero drawable entries.
    fn collect(&mut self, object: Option<&Arc<dyn RenderObject>>) -> bool;

    /// Sequential [`Effect::collect`]; short-circuits on first failure.
    fn collect_list(&mut self, objects: &[Arc<dyn RenderObject>]) -> bool;

    /// Always false: lighting is out of scope for this effect.
    fn collect_light(&mut self, light: &LightNode) -> bool;

    /// Commit all four aggregators, exactly once per frame (idempotent).
    /// Must run after all collect calls and before any draw call.
    fn post_scene_graph(&mut self) -> Result<()>;

    /// Issue the submissions for the recorded pass and the given hint.
    /// No-op Ok when draw-inactive or when the backend does not participate
    /// in the hinted pass.
    fn draw(
        &mut self,
        camera: &CameraDrawInfo,
        info: &RenderStateInfo,
        state: &EffectState,
    ) -> Result<()>;

    /// True iff a pass has been recorded since lifecycle start; false
    /// signals an out-of-sequence call.
    fn post_pass(&mut self, state: &EffectState) -> bool;

    /// Reset pending lists, commit flags and frame cursors. Must run
    /// exactly once between frames, before the next collect cycle.
    fn clear_for_next_frame(&mut self);

    /// Tear down all GPU resources. Explicit backends drain in-flight GPU
    /// work first.
    fn free(&mut self) -> Result<()>;

    /// Effect instance id
    fn id(&self) -> EffectId;

    /// Effect manager type tag
    fn effect_type(&self) -> EffectType;

    /// Whether draw calls currently submit anything
    fn is_draw_active(&self) -> bool;

    /// Toggle draw activity (set when an object is collected; the render
    /// driver may force it)
    fn set_draw_active(&mut self, active: bool);
}
