/// Draw package types - the backend-agnostic draw records produced by
/// classification.
///
/// A RenderObject is classified at most once: the resulting DrawPackage is
/// memoized on the object and its entries are dispersed into the four
/// pending buckets every frame without re-running classification.

use std::sync::Arc;
use bitflags::bitflags;
use glam::Mat4;

bitflags! {
    /// Classification flags of one draw record.
    ///
    /// The two bits form a mutually exclusive, collectively exhaustive
    /// partition into the four aggregation buckets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PackageFlags: u8 {
        /// Geometry is skinned/animated and re-uploaded per frame
        const DYNAMIC = 1 << 0;
        /// Material requires alpha blending
        const ALPHA   = 1 << 1;
    }
}

/// Identity of a mesh in the backend's shared vertex store.
///
/// Mesh/vertex-buffer construction is an external collaborator: records only
/// carry the identity plus the vertex range the builder produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryHandle(pub u64);

/// One sub-mesh of a render object, as supplied by the external mesh builder.
///
/// Inputs to classification: `animated` decides dynamic vs static,
/// `alpha_blended` decides which aggregator (and texture pack) accepts it.
#[derive(Debug, Clone)]
pub struct SubMeshData {
    /// Mesh identity in the shared vertex store
    pub geometry: GeometryHandle,
    /// First vertex of this sub-mesh in the shared vertex store
    pub first_vertex: u32,
    /// Number of vertices
    pub vertex_count: u32,
    /// Skinning/animation state (dynamic bucket when true)
    pub animated: bool,
    /// Material blend state (alpha bucket when true)
    pub alpha_blended: bool,
    /// Source texture identity, resolved to a pack layer during the build
    pub texture_key: u64,
    /// World transform of this sub-mesh
    pub transform: Mat4,
    /// Index into the material parameter storage
    pub material_index: u32,
}

/// One backend-agnostic draw record.
///
/// Immutable once built; consumed read-only by exactly one aggregator per
/// frame.
#[derive(Debug, Clone)]
pub struct DrawPackageData {
    flags: PackageFlags,
    geometry: GeometryHandle,
    first_vertex: u32,
    vertex_count: u32,
    transform: Mat4,
    texture_layer: u32,
    material_index: u32,
}

impl DrawPackageData {
    /// Build a record from a sub-mesh and its resolved texture layer
    pub fn new(sub_mesh: &SubMeshData, texture_layer: u32) -> Self {
        let mut flags = PackageFlags::empty();
        if sub_mesh.animated {
            flags |= PackageFlags::DYNAMIC;
        }
        if sub_mesh.alpha_blended {
            flags |= PackageFlags::ALPHA;
        }
        Self {
            flags,
            geometry: sub_mesh.geometry,
            first_vertex: sub_mesh.first_vertex,
            vertex_count: sub_mesh.vertex_count,
            transform: sub_mesh.transform,
            texture_layer,
            material_index: sub_mesh.material_index,
        }
    }

    /// Classification flags
    pub fn flags(&self) -> PackageFlags {
        self.flags
    }

    /// Whether this record belongs to a dynamic bucket
    pub fn is_dynamic(&self) -> bool {
        self.flags.contains(PackageFlags::DYNAMIC)
    }

    /// Whether this record belongs to an alpha bucket
    pub fn has_alpha(&self) -> bool {
        self.flags.contains(PackageFlags::ALPHA)
    }

    /// Mesh identity in the shared vertex store
    pub fn geometry(&self) -> GeometryHandle {
        self.geometry
    }

    /// First vertex in the shared vertex store
    pub fn first_vertex(&self) -> u32 {
        self.first_vertex
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// World transform
    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    /// Resolved texture pack layer
    pub fn texture_layer(&self) -> u32 {
        self.texture_layer
    }

    /// Material parameter index
    pub fn material_index(&self) -> u32 {
        self.material_index
    }
}

/// Ordered collection of draw records for one render object.
///
/// Owned by the RenderObject, immutable once built.
pub struct DrawPackage {
    entries: Vec<Arc<DrawPackageData>>,
}

impl DrawPackage {
    /// Create a package from its records
    pub(crate) fn new(entries: Vec<Arc<DrawPackageData>>) -> Self {
        Self { entries }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the package has no records
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get a record by index
    pub fn entry(&self, index: usize) -> Option<&Arc<DrawPackageData>> {
        self.entries.get(index)
    }

    /// Iterate over records
    pub fn iter(&self) -> impl Iterator<Item = &Arc<DrawPackageData>> {
        self.entries.iter()
    }
}

/// Render object collaborator trait.
///
/// Owned by the scene layer; exposes the sub-meshes its external mesh
/// builder produced plus a memoized draw package slot. Implementations use
/// interior mutability for the package slot, since objects are shared
/// (`Arc`) across the scene graph.
pub trait RenderObject: Send + Sync {
    /// Get the cached draw package, if classification has already run
    fn draw_package(&self) -> Option<Arc<DrawPackage>>;

    /// Store the classification result
    fn set_draw_package(&self, package: Arc<DrawPackage>);

    /// Sub-meshes to classify (invoked at most once per object lifetime)
    fn sub_meshes(&self) -> Vec<SubMeshData>;
}

#[cfg(test)]
#[path = "draw_package_tests.rs"]
mod tests;
