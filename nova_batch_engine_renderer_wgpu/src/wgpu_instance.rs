/// CPU-side staging for the indirect multidraw path
///
/// Records group by geometry in first-seen order; the build step lays the
/// instance data out group-contiguously and emits one DrawIndirectArgs per
/// group, so a single multi_draw_indirect covers the whole aggregator.

use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;
use wgpu::util::DrawIndirectArgs;

use nova_batch_engine::effect::{DrawPackageData, GeometryHandle};

/// Instance capacity of one aggregator's storage buffer
pub const MAX_INSTANCES: usize = 2048;

/// Maximum distinct geometries (indirect draws) per aggregator
pub const MAX_DRAWS: usize = 256;

/// Per-instance data as the shaders see it
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct InstanceRaw {
    /// World matrix, column major
    pub world: [[f32; 4]; 4],
    /// Texture pack array layer
    pub texture_layer: u32,
    /// Material parameter index
    pub material_index: u32,
    /// pad to a 16-byte boundary
    pub _pad: [u32; 2],
}

impl InstanceRaw {
    fn from_record(record: &DrawPackageData) -> Self {
        Self {
            world: record.transform().to_cols_array_2d(),
            texture_layer: record.texture_layer(),
            material_index: record.material_index(),
            _pad: [0; 2],
        }
    }
}

/// Serialize indirect arguments for one buffer upload
pub fn indirect_bytes(args: &[DrawIndirectArgs]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(args.len() * std::mem::size_of::<DrawIndirectArgs>());
    for arg in args {
        bytes.extend_from_slice(arg.as_bytes());
    }
    bytes
}

/// CPU-side accumulation table, grouped by geometry in first-seen order
#[derive(Default)]
pub struct BatchTable {
    order: Vec<GeometryHandle>,
    groups: FxHashMap<GeometryHandle, GroupAccum>,
}

struct GroupAccum {
    first_vertex: u32,
    vertex_count: u32,
    instances: Vec<InstanceRaw>,
}

impl BatchTable {
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
        group.instances.push(InstanceRaw::from_record(record));
    }

    /// Total instances across all groups
    pub fn instance_count(&self) -> usize {
        self.groups.values().map(|g| g.instances.len()).sum()
    }

    /// Number of distinct geometries
    pub fn draw_count(&self) -> usize {
        self.order.len()
    }

    /// Drop all records
    pub fn clear(&mut self) {
        self.order.clear();
        self.groups.clear();
    }

    /// Flatten into the instance array and the indirect argument list
    pub fn build(&self) -> (Vec<InstanceRaw>, Vec<DrawIndirectArgs>) {
        let mut instances = Vec::with_capacity(self.instance_count());
        let mut args = Vec::with_capacity(self.order.len());

        for geometry in &self.order {
            let group = &self.groups[geometry];
            args.push(DrawIndirectArgs {
                vertex_count: group.vertex_count,
                instance_count: group.instances.len() as u32,
                first_vertex: group.first_vertex,
                first_instance: instances.len() as u32,
            });
            instances.extend_from_slice(&group.instances);
        }

        (instances, args)
    }
}

#[cfg(test)]
#[path = "wgpu_instance_tests.rs"]
mod tests;
