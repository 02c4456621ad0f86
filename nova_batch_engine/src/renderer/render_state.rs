/// Render-state value types handed to effects during the render loop

use std::sync::Arc;
use glam::Mat4;
use crate::renderer::ShaderProgram;

/// Camera matrices for one draw invocation.
///
/// Camera/transform math is external; effects only upload these into their
/// uniform storage.
#[derive(Debug, Clone, Copy)]
pub struct CameraDrawInfo {
    /// View matrix
    pub view: Mat4,
    /// Projection matrix
    pub proj: Mat4,
}

impl Default for CameraDrawInfo {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        }
    }
}

/// Classification of the current render pass.
///
/// Used by the pass/shader selector and by backends to decide whether an
/// effect participates in the pass at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassHint {
    /// Shadow map rendering (depth only)
    Shadows,
    /// Opaque geometry / G-buffer pass
    Opaque,
    /// Alpha-blended geometry pass
    Translucent,
    /// Post-processing pass (not handled by this effect)
    PostProcess,
    /// Skybox pass (not handled by this effect)
    Skybox,
}

/// Per-draw render state: the pass hint plus an optional shader override.
///
/// The override is supplied by effect-chaining scenarios and takes
/// precedence unconditionally over the effect's own slot selection.
#[derive(Clone)]
pub struct RenderStateInfo {
    hint: PassHint,
    shader_override: Option<Arc<dyn ShaderProgram>>,
}

impl RenderStateInfo {
    /// Create a render state for a pass hint, with no override
    pub fn new(hint: PassHint) -> Self {
        Self {
            hint,
            shader_override: None,
        }
    }

    /// Get the pass hint
    pub fn hint(&self) -> PassHint {
        self.hint
    }

    /// Get the shader override, if any
    pub fn shader_override(&self) -> Option<&Arc<dyn ShaderProgram>> {
        self.shader_override.as_ref()
    }

    /// Set a shader override (takes precedence over slot selection)
    pub fn set_shader_override(&mut self, shader: Arc<dyn ShaderProgram>) {
        self.shader_override = Some(shader);
    }

    /// Remove the shader override
    pub fn clear_shader_override(&mut self) {
        self.shader_override = None;
    }
}

#[cfg(test)]
#[path = "render_state_tests.rs"]
mod tests;
