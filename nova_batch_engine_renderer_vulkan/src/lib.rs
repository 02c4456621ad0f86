/*!
# Nova Batch Engine - Vulkan Renderer Backend

Explicit-pipeline realization of the Nova batch draw effect.

This crate implements the core crate's backend traits using the Ash library
for Vulkan bindings and gpu-allocator for memory management. Draw records
accumulate into an instance buffer bound through a descriptor set; pipeline
state objects are built once per shader slot from the effect state's frame
targets, and each committed bucket renders as one instanced draw per
distinct mesh geometry.

Device, queue and swapchain creation live with the application; this crate
receives an already-created [`GpuContext`] and records only its own draws
into the externally managed command recording.
*/

// Vulkan implementation modules
mod vulkan_context;
mod vulkan_format;
mod vulkan_buffer;
mod vulkan_texture_pack;
mod vulkan_shader;
mod vulkan_descriptor;
mod vulkan_pipeline;
mod vulkan_aggregator;
mod vulkan_effect;

pub use vulkan_context::GpuContext;
pub use vulkan_buffer::Buffer;
pub use vulkan_texture_pack::VulkanTexturePack;
pub use vulkan_shader::VulkanShaderProgram;
pub use vulkan_descriptor::{DescriptorBundle, DescriptorSetBuilder};
pub use vulkan_pipeline::{pipeline_spec, PipelineSpec, TargetKind};
pub use vulkan_aggregator::InstancedAggregator;
pub use vulkan_effect::{VulkanEffectBackend, VulkanFrameTarget};
