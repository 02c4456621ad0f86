/// Mock Renderer for unit tests (no GPU required)
///
/// Tracks shader resolution, active-effect registration and active-program
/// changes so lifecycle tests can assert against the collaborator contract.

#[cfg(test)]
use std::any::Any;
#[cfg(test)]
use std::sync::{Arc, Mutex};

#[cfg(test)]
use crate::renderer::{EffectId, MaterialHandle, Renderer, ShaderProgram};
#[cfg(test)]
use rustc_hash::FxHashSet;

// ============================================================================
// Mock ShaderProgram
// ============================================================================

#[cfg(test)]
#[derive(Debug)]
pub struct MockShaderProgram {
    pub id: u64,
    pub name: String,
}

#[cfg(test)]
impl MockShaderProgram {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

#[cfg(test)]
impl ShaderProgram for MockShaderProgram {
    fn id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Renderer
// ============================================================================

/// Mock Renderer that resolves every material to a fresh program unless the
/// material name was marked as failing.
#[cfg(test)]
pub struct MockRenderer {
    /// Materials that fail resolution (for configuration-error tests)
    pub failing_materials: FxHashSet<String>,
    /// Names of materials resolved so far
    pub resolved: Arc<Mutex<Vec<String>>>,
    /// Effects registered via add_effect
    pub active_effects: Arc<Mutex<Vec<EffectId>>>,
    /// Ids of programs made active
    pub activated_shaders: Arc<Mutex<Vec<u64>>>,
    next_shader_id: u64,
}

#[cfg(test)]
impl MockRenderer {
    pub fn new() -> Self {
        Self {
            failing_materials: FxHashSet::default(),
            resolved: Arc::new(Mutex::new(Vec::new())),
            active_effects: Arc::new(Mutex::new(Vec::new())),
            activated_shaders: Arc::new(Mutex::new(Vec::new())),
            next_shader_id: 1,
        }
    }

    /// Mark a material as unresolvable
    pub fn fail_material(&mut self, name: &str) {
        self.failing_materials.insert(name.to_string());
    }

    pub fn resolved_materials(&self) -> Vec<String> {
        self.resolved.lock().unwrap().clone()
    }

    pub fn registered_effects(&self) -> Vec<EffectId> {
        self.active_effects.lock().unwrap().clone()
    }

    pub fn activated_shader_ids(&self) -> Vec<u64> {
        self.activated_shaders.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Renderer for MockRenderer {
    fn shader_program(&mut self, material: &MaterialHandle) -> Option<Arc<dyn ShaderProgram>> {
        if self.failing_materials.contains(material.name()) {
            return None;
        }
        self.resolved.lock().unwrap().push(material.name().to_string());
        let id = self.next_shader_id;
        self.next_shader_id += 1;
        Some(Arc::new(MockShaderProgram::new(id, material.name())))
    }

    fn add_effect(&mut self, effect: EffectId) {
        self.active_effects.lock().unwrap().push(effect);
    }

    fn set_active_shader_program(&mut self, shader: &Arc<dyn ShaderProgram>) {
        self.activated_shaders.lock().unwrap().push(shader.id());
    }
}

#[cfg(test)]
#[path = "mock_renderer_tests.rs"]
mod tests;
