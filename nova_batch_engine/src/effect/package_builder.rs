/// DrawPackageBuilder - classifies a render object into draw records by
/// consulting the effect's aggregators in draw-list order.
///
/// Alpha-capable aggregators are consulted before opaque ones: a default
/// aggregator accepts any sub-mesh, so a mixed-material object would lose
/// its alpha entries to the opaque bucket if the order were reversed.

use std::sync::Arc;
use crate::error::Result;
use super::aggregator::BatchAggregator;
use super::draw_package::{DrawPackage, DrawPackageData, RenderObject, SubMeshData};

/// Builds the cached [`DrawPackage`] for one render object.
///
/// Holds two consultation lists (dynamic and static), each ordered
/// alpha-first. The chosen aggregator's texture pack resolves the sub-mesh
/// texture to an array layer, which is baked into the record.
pub struct DrawPackageBuilder<'a> {
    dynamic_list: Vec<&'a dyn BatchAggregator>,
    static_list: Vec<&'a dyn BatchAggregator>,
}

impl<'a> DrawPackageBuilder<'a> {
    /// Create a builder from the two consultation lists.
    ///
    /// Callers must place alpha-capable aggregators before default ones.
    pub fn new(
        dynamic_list: Vec<&'a dyn BatchAggregator>,
        static_list: Vec<&'a dyn BatchAggregator>,
    ) -> Self {
        Self {
            dynamic_list,
            static_list,
        }
    }

    /// Classify every sub-mesh of `object` into a draw record.
    pub fn create(&self, object: &dyn RenderObject) -> Result<Arc<DrawPackage>> {
        let sub_meshes = object.sub_meshes();
        let mut entries = Vec::with_capacity(sub_meshes.len());

        for sub_mesh in &sub_meshes {
            let list = if sub_mesh.animated {
                &self.dynamic_list
            } else {
                &self.static_list
            };

            let aggregator = Self::resolve(list, sub_mesh)?;

            let pack = aggregator.texture_pack().ok_or_else(|| {
                crate::error::Error::InvalidResource(
                    "aggregator has no texture pack attached".to_string(),
                )
            })?;
            let texture_layer = pack.acquire_layer(sub_mesh.texture_key)?;

            entries.push(Arc::new(DrawPackageData::new(sub_mesh, texture_layer)));
        }

        Ok(Arc::new(DrawPackage::new(entries)))
    }

    /// First aggregator in list order that accepts the sub-mesh.
    fn resolve<'b>(
        list: &[&'b dyn BatchAggregator],
        sub_mesh: &SubMeshData,
    ) -> Result<&'b dyn BatchAggregator> {
        list.iter()
            .copied()
            .find(|aggregator| aggregator.accepts(sub_mesh))
            .ok_or_else(|| {
                crate::error::Error::InvalidResource(format!(
                    "no aggregator accepts sub-mesh (geometry {:?})",
                    sub_mesh.geometry
                ))
            })
    }
}

#[cfg(test)]
#[path = "package_builder_tests.rs"]
mod tests;
