/// ShaderProgram trait and material handles
///
/// Shader/material compilation and the renderer's shader cache are external
/// collaborators: the effect only ever sees opaque program handles resolved
/// from material handles.

use std::any::Any;

/// Opaque handle to a material owned by the renderer's material system.
///
/// The effect's material list is a fixed sequence of these, resolved to
/// shader programs through [`Renderer::shader_program`].
///
/// [`Renderer::shader_program`]: crate::renderer::Renderer::shader_program
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub String);

impl MaterialHandle {
    /// Create a handle from a material name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the material name
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Shader program resource trait
///
/// Implemented by backend-specific program types (wgpu pipeline wrapper,
/// Vulkan module pair). Programs are created and cached by the renderer's
/// shader system; the effect resolves them once per lifetime and holds them
/// until `free()`.
pub trait ShaderProgram: Send + Sync {
    /// Stable identifier, unique within the renderer's shader cache.
    fn id(&self) -> u64;

    /// Human-readable name (for logs)
    fn name(&self) -> &str;

    /// Backend downcast access
    fn as_any(&self) -> &dyn Any;
}
