/// Fixed vertex layout and format constants for the batched vertex store
///
/// Every batched mesh lives in one shared vertex store with this layout, so
/// the binding/attribute descriptions are process-wide constants rather
/// than per-pipeline state.

use ash::vk;
use bytemuck::{Pod, Zeroable};

/// Texture pack format shared by all four aggregators.
///
/// Unlike a GL implementation with separate RGB/RGBA packs, the explicit
/// backend keeps one pack in a single format regardless of whether meshes
/// use the alpha channel.
pub const PACK_TEXTURE_FORMAT: vk::Format = vk::Format::B8G8R8A8_UNORM;

/// One vertex of the shared store: position, normal, texture coordinates.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinates (layer comes from the instance data)
    pub uv: [f32; 2],
}

/// Stride of one vertex in bytes
pub const VERTEX_STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;

/// Binding id of the shared vertex store
pub const VERTEX_BUFFER_BIND_ID: u32 = 0;

/// Vertex binding description of the shared store
pub fn vertex_binding() -> vk::VertexInputBindingDescription {
    vk::VertexInputBindingDescription {
        binding: VERTEX_BUFFER_BIND_ID,
        stride: VERTEX_STRIDE,
        input_rate: vk::VertexInputRate::VERTEX,
    }
}

/// Vertex attribute descriptions of the shared store
pub fn vertex_attributes() -> [vk::VertexInputAttributeDescription; 3] {
    [
        // layout(location = 0) in vec3 inPosition
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: VERTEX_BUFFER_BIND_ID,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        },
        // layout(location = 1) in vec3 inNormal
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: VERTEX_BUFFER_BIND_ID,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 12,
        },
        // layout(location = 2) in vec2 inUV
        vk::VertexInputAttributeDescription {
            location: 2,
            binding: VERTEX_BUFFER_BIND_ID,
            format: vk::Format::R32G32_SFLOAT,
            offset: 24,
        },
    ]
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
