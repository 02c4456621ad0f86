/// VulkanShaderProgram - Vulkan realization of the core ShaderProgram trait
///
/// Wraps the vertex/fragment modules the external shader cache compiled,
/// plus the descriptor set and pipeline the effect builds for the slot this
/// program serves. Modules are non-owning handles; the cache destroys them.

use ash::vk;
use std::any::Any;
use std::sync::Mutex;

use nova_batch_engine::renderer::ShaderProgram;

use crate::vulkan_descriptor::DescriptorBundle;
use crate::vulkan_pipeline::BuiltPipeline;

/// Vulkan shader program
pub struct VulkanShaderProgram {
    id: u64,
    name: String,
    /// Vertex shader module (owned by the shader cache)
    pub vertex_module: vk::ShaderModule,
    /// Fragment shader module; depth-only programs have none
    pub fragment_module: Option<vk::ShaderModule>,
    /// Descriptor objects, built during effect shader setup
    pub(crate) descriptors: Mutex<Option<DescriptorBundle>>,
    /// Pipeline state object, built once the first time the slot is needed
    pub(crate) pipeline: Mutex<Option<BuiltPipeline>>,
}

impl VulkanShaderProgram {
    /// Wrap cached shader modules
    pub fn new(
        id: u64,
        name: impl Into<String>,
        vertex_module: vk::ShaderModule,
        fragment_module: Option<vk::ShaderModule>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            vertex_module,
            fragment_module,
            descriptors: Mutex::new(None),
            pipeline: Mutex::new(None),
        }
    }

    /// Whether the pipeline state object has been built
    pub fn has_pipeline(&self) -> bool {
        self.pipeline.lock().map(|p| p.is_some()).unwrap_or(false)
    }

    /// Destroy the descriptor objects and pipeline (effect teardown)
    pub fn release_gpu_state(&self, device: &ash::Device) {
        if let Ok(mut pipeline) = self.pipeline.lock() {
            if let Some(built) = pipeline.take() {
                built.destroy(device);
            }
        }
        if let Ok(mut descriptors) = self.descriptors.lock() {
            if let Some(bundle) = descriptors.take() {
                bundle.destroy(device);
            }
        }
    }
}

impl ShaderProgram for VulkanShaderProgram {
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
