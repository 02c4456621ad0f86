/*!
# Nova Batch Engine - wgpu Renderer Backend

Immediate-mode realization of the Nova batch draw effect using indirect
multidraw.

Draw records accumulate in CPU-side staging tables; commit uploads the
per-instance and indirect-argument buffers in one `Queue::write_buffer`
each, and render issues a single `multi_draw_indirect` per aggregator
referencing the texture array and instance buffer (falling back to a
`draw_indirect` loop on devices without the multidraw feature).

Device, queue and surface creation live with the application; this crate
receives an already-created [`MultiDrawContext`] and records only its own
draws into the render pass the driver installs each frame.
*/

// wgpu implementation modules
mod wgpu_context;
mod wgpu_instance;
mod wgpu_texture_pack;
mod wgpu_shader;
mod wgpu_aggregator;
mod wgpu_effect;

pub use wgpu_context::MultiDrawContext;
pub use wgpu_instance::{indirect_bytes, BatchTable, InstanceRaw, MAX_DRAWS, MAX_INSTANCES};
pub use wgpu_texture_pack::WgpuTexturePack;
pub use wgpu_shader::WgpuShaderProgram;
pub use wgpu_aggregator::MultiDrawAggregator;
pub use wgpu_effect::WgpuEffectBackend;
