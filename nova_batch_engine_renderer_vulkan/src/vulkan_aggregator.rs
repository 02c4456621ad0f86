/// InstancedAggregator - explicit-pipeline realization of the core
/// BatchAggregator trait
///
/// Records accumulate in a CPU-side table grouped by geometry; commit lays
/// the per-instance data out group-contiguously and writes it through the
/// mapped instance buffer in one copy; render binds the slot's pipeline and
/// descriptor set and issues one instanced draw per distinct geometry.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;
use std::sync::Arc;

use nova_batch_engine::effect::{BatchAggregator, FrameCursor, GeometryHandle};
use nova_batch_engine::effect::DrawPackageData;
use nova_batch_engine::error::Result;
use nova_batch_engine::renderer::{ShaderProgram, TexturePack};
use nova_batch_engine::engine_bail;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::VERTEX_BUFFER_BIND_ID;
use crate::vulkan_shader::VulkanShaderProgram;

/// Instance capacity of one aggregator's uniform-backed instance buffer.
///
/// 512 instances at 80 bytes stays inside the 64 KiB uniform range every
/// Vulkan implementation guarantees.
pub const MAX_INSTANCES: usize = 512;

/// Per-instance data as the shaders see it (std140 layout)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct InstanceData {
    /// World matrix, column major
    pub world: [[f32; 4]; 4],
    /// Texture pack array layer
    pub texture_layer: u32,
    /// Material parameter index
    pub material_index: u32,
    /// std140 pad to a 16-byte boundary
    pub _pad: [u32; 2],
}

impl InstanceData {
    fn from_record(record: &DrawPackageData) -> Self {
        Self {
            world: record.transform().to_cols_array_2d(),
            texture_layer: record.texture_layer(),
            material_index: record.material_index(),
            _pad: [0; 2],
        }
    }
}

/// One instanced draw: a geometry's vertex range plus its instance span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawGroup {
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub first_instance: u32,
    pub instance_count: u32,
}

/// CPU-side accumulation table, grouped by geometry in first-seen order
#[derive(Default)]
pub struct InstanceTable {
    order: Vec<GeometryHandle>,
    groups: FxHashMap<GeometryHandle, GroupAccum>,
}

struct GroupAccum {
    first_vertex: u32,
    vertex_count: u32,
    instances: Vec<InstanceData>,
}

impl InstanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record to its geometry group
    pub fn push(&mut self, record: &DrawPackageData) {
        let geometry = record.geometry();
        let group = self.groups.entry(geometry).or_insert_with(|| {
            self.order.push(geometry);
            GroupAccum {
                first_vertex: record.first_vertex(),
                vertex_count: record.vertex_count(),
                instances: Vec::new(),
            }
        });
        group.instances.push(InstanceData::from_record(record));
    }

    /// Total instances across all groups
    pub fn instance_count(&self) -> usize {
        self.groups.values().map(|g| g.instances.len()).sum()
    }

    /// Drop all records
    pub fn clear(&mut self) {
        self.order.clear();
        self.groups.clear();
    }

    /// Flatten into the group-contiguous instance array and the draw list
    pub fn build(&self) -> (Vec<InstanceData>, Vec<DrawGroup>) {
        let mut instances = Vec::with_capacity(self.instance_count());
        let mut draws = Vec::with_capacity(self.order.len());

        for geometry in &self.order {
            let group = &self.groups[geometry];
            draws.push(DrawGroup {
                first_vertex: group.first_vertex,
                vertex_count: group.vertex_count,
                first_instance: instances.len() as u32,
                instance_count: group.instances.len() as u32,
            });
            instances.extend_from_slice(&group.instances);
        }

        (instances, draws)
    }
}

/// Explicit-pipeline batch aggregator
pub struct InstancedAggregator {
    ctx: Arc<GpuContext>,
    cursor: FrameCursor,
    table: InstanceTable,
    draws: Vec<DrawGroup>,
    committed: usize,
    instance_buffer: Option<Arc<Buffer>>,
    pack: Option<Arc<dyn TexturePack>>,
    alpha_blending: bool,
    shader: Option<Arc<dyn ShaderProgram>>,
}

impl InstancedAggregator {
    /// Create an aggregator around a pre-created instance buffer.
    ///
    /// The buffer is shared with the effect backend, which also binds it
    /// into the descriptor sets of the shaders serving this bucket.
    pub fn new(ctx: Arc<GpuContext>, instance_buffer: Arc<Buffer>) -> Self {
        Self {
            ctx,
            cursor: FrameCursor::new(),
            table: InstanceTable::new(),
            draws: Vec::new(),
            committed: 0,
            instance_buffer: Some(instance_buffer),
            pack: None,
            alpha_blending: false,
            shader: None,
        }
    }
}

impl BatchAggregator for InstancedAggregator {
    fn initialize(&mut self) -> Result<()> {
        if self.instance_buffer.is_none() {
            engine_bail!("nova::vulkan", "aggregator has no instance buffer");
        }
        Ok(())
    }

    fn set_texture_pack(&mut self, pack: Arc<dyn TexturePack>) {
        self.pack = Some(pack);
    }

    fn texture_pack(&self) -> Option<&Arc<dyn TexturePack>> {
        self.pack.as_ref()
    }

    fn set_alpha_blending(&mut self, enabled: bool) {
        self.alpha_blending = enabled;
    }

    fn alpha_blending(&self) -> bool {
        self.alpha_blending
    }

    fn begin_frame(&mut self) {
        self.cursor.begin_frame();
    }

    fn add(&mut self, record: &Arc<DrawPackageData>) -> Result<()> {
        let first = self.cursor.note_add()?;
        if first {
            // first add of the cycle resets the write cursors
            self.table.clear();
            self.draws.clear();
            self.committed = 0;
        }
        if self.table.instance_count() >= MAX_INSTANCES {
            engine_bail!(
                "nova::vulkan",
                "instance buffer overflow: more than {} records in one bucket",
                MAX_INSTANCES
            );
        }
        self.table.push(record);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let (instances, draws) = self.table.build();

        if !instances.is_empty() {
            let Some(buffer) = &self.instance_buffer else {
                engine_bail!("nova::vulkan", "commit without instance buffer");
            };
            buffer.update(0, bytemuck::cast_slice(&instances))?;
        }

        self.committed = instances.len();
        self.draws = draws;
        self.cursor.mark_committed();
        Ok(())
    }

    fn committed_count(&self) -> usize {
        self.committed
    }

    fn set_shader(&mut self, shader: Arc<dyn ShaderProgram>) {
        self.shader = Some(shader);
    }

    fn render(&mut self) -> Result<()> {
        if self.committed == 0 {
            // nothing committed: no GPU submission
            return Ok(());
        }

        let Some(shader) = &self.shader else {
            engine_bail!("nova::vulkan", "render without a shader set");
        };
        let Some(shader) = shader.as_any().downcast_ref::<VulkanShaderProgram>() else {
            engine_bail!("nova::vulkan", "render with a non-Vulkan shader program");
        };

        let Some(command_buffer) = self.ctx.current_recording() else {
            engine_bail!("nova::vulkan", "render outside a command recording");
        };

        let Some(vertex_store) = self.ctx.vertex_store() else {
            engine_bail!("nova::vulkan", "render without a vertex store installed");
        };

        let pipeline = shader
            .pipeline
            .lock()
            .map_err(|_| {
                nova_batch_engine::error::Error::BackendError("pipeline lock poisoned".to_string())
            })?
            .as_ref()
            .map(|built| (built.pipeline, built.layout))
            .ok_or_else(|| {
                nova_batch_engine::error::Error::InvalidResource(format!(
                    "shader '{}' has no pipeline built",
                    shader.name()
                ))
            })?;

        let descriptor_set = shader
            .descriptors
            .lock()
            .map_err(|_| {
                nova_batch_engine::error::Error::BackendError(
                    "descriptor lock poisoned".to_string(),
                )
            })?
            .as_ref()
            .map(|bundle| bundle.set)
            .ok_or_else(|| {
                nova_batch_engine::error::Error::InvalidResource(format!(
                    "shader '{}' has no descriptor set built",
                    shader.name()
                ))
            })?;

        unsafe {
            let device = &self.ctx.device;
            let (pipeline_handle, pipeline_layout) = pipeline;

            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline_handle,
            );
            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline_layout,
                0,
                &[descriptor_set],
                &[],
            );
            device.cmd_bind_vertex_buffers(
                command_buffer,
                VERTEX_BUFFER_BIND_ID,
                &[vertex_store.handle()],
                &[0],
            );

            // one instanced draw per distinct geometry
            for draw in &self.draws {
                device.cmd_draw(
                    command_buffer,
                    draw.vertex_count,
                    draw.instance_count,
                    draw.first_vertex,
                    draw.first_instance,
                );
            }
        }

        Ok(())
    }

    fn shutdown(&mut self) {
        self.table.clear();
        self.draws.clear();
        self.committed = 0;
        self.shader = None;
        self.pack = None;
        self.instance_buffer = None;
    }
}

#[cfg(test)]
#[path = "vulkan_aggregator_tests.rs"]
mod tests;
