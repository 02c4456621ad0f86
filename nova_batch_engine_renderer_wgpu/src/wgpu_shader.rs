/// WgpuShaderProgram - wgpu realization of the core ShaderProgram trait
///
/// Wraps the render pipeline the external shader cache built for one of the
/// six batch programs, plus the bind group the effect wires up at shader
/// setup. All batch programs share the same group-0 interface (camera
/// uniform, texture array, sampler, instance storage), so one bind group
/// per program is enough.

use std::any::Any;
use std::sync::Mutex;

use nova_batch_engine::renderer::ShaderProgram;

/// wgpu shader program
pub struct WgpuShaderProgram {
    id: u64,
    name: String,
    /// Pipeline built by the shader cache
    pub pipeline: wgpu::RenderPipeline,
    /// Group-0 bind group, wired up during effect shader setup
    pub(crate) bind_group: Mutex<Option<wgpu::BindGroup>>,
}

impl WgpuShaderProgram {
    /// Wrap a cached pipeline
    pub fn new(id: u64, name: impl Into<String>, pipeline: wgpu::RenderPipeline) -> Self {
        Self {
            id,
            name: name.into(),
            pipeline,
            bind_group: Mutex::new(None),
        }
    }

    /// Whether the bind group has been wired up
    pub fn has_bind_group(&self) -> bool {
        self.bind_group.lock().map(|b| b.is_some()).unwrap_or(false)
    }

    /// Drop the bind group (effect teardown)
    pub fn release_bind_group(&self) {
        if let Ok(mut bind_group) = self.bind_group.lock() {
            *bind_group = None;
        }
    }
}

impl ShaderProgram for WgpuShaderProgram {
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
