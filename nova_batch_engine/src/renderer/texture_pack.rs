/// TexturePack trait - bindless/array texture storage for batched draws
///
/// Atlas packing internals are an external collaborator; this subsystem only
/// needs layer acquisition (memoized per source texture) so draw records can
/// carry a resolved layer index into the shaders.

use crate::error::Result;

/// Default texture pack layer width
pub const DEFAULT_TEXTURE_WIDTH: u32 = 1024;

/// Default texture pack layer height
pub const DEFAULT_TEXTURE_HEIGHT: u32 = 1024;

/// Default mip chain length for pack layers
pub const TEXTURE_MIP_LEVELS: u32 = 4;

/// Maximum number of textures one pack can hold
pub const MAX_PACK_TEXTURES: u32 = 64;

/// Array texture pack trait
///
/// One pack backs one or more aggregators. Packs are shared via
/// `Arc<dyn TexturePack>` and use interior mutability for layer bookkeeping,
/// since layer acquisition happens while the aggregators are borrowed for
/// package building.
pub trait TexturePack: Send + Sync {
    /// Acquire the array layer for a source texture.
    ///
    /// The same `texture_key` always resolves to the same layer. Fails with
    /// [`Error::OutOfMemory`] when the pack is full.
    ///
    /// [`Error::OutOfMemory`]: crate::error::Error::OutOfMemory
    fn acquire_layer(&self, texture_key: u64) -> Result<u32>;

    /// Number of layers currently in use
    fn layer_count(&self) -> u32;

    /// Maximum number of layers this pack can hold
    fn max_layers(&self) -> u32;
}
