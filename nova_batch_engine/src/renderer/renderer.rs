/// Renderer trait - the scene/renderer collaborator consumed by effects
///
/// The renderer owns the shader cache, the active-effect set and the active
/// program state. Effects hold it as `Arc<Mutex<dyn Renderer>>` and call into
/// it during collect and draw. Backend contexts (device, queue, command
/// recording) are injected into backend objects at construction and are not
/// reachable through this trait.

use std::sync::Arc;
use crate::renderer::{MaterialHandle, ShaderProgram};

/// Identifier of an effect instance within the renderer's effect manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EffectId(pub u32);

/// Opaque effect-type tag assigned by the effect manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EffectType(pub u32);

/// Renderer collaborator trait
///
/// Implemented by the engine's renderer front-end. This subsystem depends on
/// these operations but does not define their behavior.
pub trait Renderer: Send + Sync {
    /// Resolve a material handle to a cached shader program.
    ///
    /// Returns `None` when the material cannot be resolved; the effect
    /// treats this as a fatal configuration error during PrePass.
    fn shader_program(&mut self, material: &MaterialHandle) -> Option<Arc<dyn ShaderProgram>>;

    /// Register an effect in the renderer's active-effect set for this frame.
    ///
    /// Called from `collect()` whenever an object contributed draw records.
    fn add_effect(&mut self, effect: EffectId);

    /// Make a shader program the active one for subsequent submissions.
    fn set_active_shader_program(&mut self, shader: &Arc<dyn ShaderProgram>);
}
