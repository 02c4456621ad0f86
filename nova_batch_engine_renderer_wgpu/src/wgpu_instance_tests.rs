//! Unit tests for the indirect multidraw staging table
//!
//! Pure grouping/serialization checks without requiring a GPU.

use super::*;
use glam::Mat4;
use nova_batch_engine::effect::SubMeshData;

// ============================================================================
// Helpers
// ============================================================================

fn record(geometry: u64, first_vertex: u32, vertex_count: u32, layer: u32) -> DrawPackageData {
    let sub_mesh = SubMeshData {
        geometry: GeometryHandle(geometry),
        first_vertex,
        vertex_count,
        animated: true,
        alpha_blended: false,
        texture_key: layer as u64,
        transform: Mat4::IDENTITY,
        material_index: 3,
    };
    DrawPackageData::new(&sub_mesh, layer)
}

// ============================================================================
// Grouping and indirect argument layout
// ============================================================================

#[test]
fn test_one_indirect_arg_per_distinct_geometry() {
    let mut table = BatchTable::new();
    table.push(&record(1, 0, 36, 0));
    table.push(&record(2, 36, 12, 1));
    table.push(&record(1, 0, 36, 2));

    let (instances, args) = table.build();

    assert_eq!(instances.len(), 3);
    assert_eq!(args.len(), 2);
    assert_eq!(table.draw_count(), 2);

    assert_eq!(args[0].vertex_count, 36);
    assert_eq!(args[0].instance_count, 2);
    assert_eq!(args[0].first_vertex, 0);
    assert_eq!(args[0].first_instance, 0);

    assert_eq!(args[1].vertex_count, 12);
    assert_eq!(args[1].instance_count, 1);
    assert_eq!(args[1].first_vertex, 36);
    assert_eq!(args[1].first_instance, 2);
}

#[test]
fn test_instances_follow_group_order() {
    let mut table = BatchTable::new();
    table.push(&record(5, 0, 3, 50));
    table.push(&record(6, 3, 3, 60));
    table.push(&record(5, 0, 3, 51));

    let (instances, _) = table.build();

    assert_eq!(instances[0].texture_layer, 50);
    assert_eq!(instances[1].texture_layer, 51);
    assert_eq!(instances[2].texture_layer, 60);
    assert_eq!(instances[0].material_index, 3);
}

#[test]
fn test_clear_resets_table() {
    let mut table = BatchTable::new();
    table.push(&record(1, 0, 3, 0));
    table.clear();

    assert_eq!(table.instance_count(), 0);
    assert_eq!(table.draw_count(), 0);
}

// ============================================================================
// Buffer layouts
// ============================================================================

#[test]
fn test_instance_raw_is_16_byte_aligned() {
    assert_eq!(std::mem::size_of::<InstanceRaw>(), 80);
    assert_eq!(std::mem::size_of::<InstanceRaw>() % 16, 0);
}

#[test]
fn test_indirect_bytes_serializes_all_args() {
    let mut table = BatchTable::new();
    table.push(&record(1, 0, 3, 0));
    table.push(&record(2, 3, 3, 1));

    let (_, args) = table.build();
    let bytes = indirect_bytes(&args);

    assert_eq!(bytes.len(), 2 * std::mem::size_of::<DrawIndirectArgs>());
    // DrawIndirectArgs is four u32s
    assert_eq!(std::mem::size_of::<DrawIndirectArgs>(), 16);
}
