/// Pass/shader selection - the closed mapping from pass and hint to one of
/// the six shader slots, plus the validated material-slot table.

use crate::error::Result;
use crate::renderer::{MaterialHandle, PassHint};

/// Number of shader slots an effect carries
pub const SHADER_SLOT_COUNT: usize = 6;

/// The fixed shader slots of a batch draw effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderSlot {
    /// Static geometry, shadow pass
    StaticShadow,
    /// Static geometry, opaque pass
    Static,
    /// Dynamic geometry, shadow pass
    DynamicShadow,
    /// Dynamic geometry, opaque pass
    Dynamic,
    /// Static geometry, alpha-blended pass
    StaticAlpha,
    /// Dynamic geometry, alpha-blended pass
    DynamicAlpha,
}

impl ShaderSlot {
    /// All slots in material-list order
    pub const ALL: [ShaderSlot; SHADER_SLOT_COUNT] = [
        ShaderSlot::StaticShadow,
        ShaderSlot::Static,
        ShaderSlot::DynamicShadow,
        ShaderSlot::Dynamic,
        ShaderSlot::StaticAlpha,
        ShaderSlot::DynamicAlpha,
    ];

    /// Position of this slot in the effect's material list
    pub fn index(self) -> usize {
        match self {
            ShaderSlot::StaticShadow => 0,
            ShaderSlot::Static => 1,
            ShaderSlot::DynamicShadow => 2,
            ShaderSlot::Dynamic => 3,
            ShaderSlot::StaticAlpha => 4,
            ShaderSlot::DynamicAlpha => 5,
        }
    }

    /// Whether this slot serves a dynamic-pass draw
    pub fn is_dynamic(self) -> bool {
        matches!(
            self,
            ShaderSlot::DynamicShadow | ShaderSlot::Dynamic | ShaderSlot::DynamicAlpha
        )
    }

    /// Whether this slot submits with alpha blending
    pub fn has_alpha(self) -> bool {
        matches!(self, ShaderSlot::StaticAlpha | ShaderSlot::DynamicAlpha)
    }

    /// Whether this slot serves a shadow (depth-only) draw
    pub fn is_shadow(self) -> bool {
        matches!(self, ShaderSlot::StaticShadow | ShaderSlot::DynamicShadow)
    }
}

/// The effect's two passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassIndex {
    /// Pass 0: static geometry
    Static,
    /// Pass 1: dynamic geometry
    Dynamic,
}

/// Number of passes the effect renders
pub const PASS_COUNT: u32 = 2;

impl PassIndex {
    /// Convert a driver-supplied pass number
    pub fn from_u32(pass: u32) -> Option<Self> {
        match pass {
            0 => Some(PassIndex::Static),
            1 => Some(PassIndex::Dynamic),
            _ => None,
        }
    }
}

/// Pure pass/shader selection: `(pass, hint) -> slot`.
///
/// Non-geometry hints (post-process, skybox) fall back to the pass's opaque
/// slot; callers gate those hints out before selection.
pub fn select_shader_slot(pass: PassIndex, hint: PassHint) -> ShaderSlot {
    match (pass, hint) {
        (PassIndex::Static, PassHint::Shadows) => ShaderSlot::StaticShadow,
        (PassIndex::Static, PassHint::Translucent) => ShaderSlot::StaticAlpha,
        (PassIndex::Static, _) => ShaderSlot::Static,
        (PassIndex::Dynamic, PassHint::Shadows) => ShaderSlot::DynamicShadow,
        (PassIndex::Dynamic, PassHint::Translucent) => ShaderSlot::DynamicAlpha,
        (PassIndex::Dynamic, _) => ShaderSlot::Dynamic,
    }
}

/// Aggregation bucket serving a `(pass, hint)` draw: the pass picks the
/// mobility class, a translucent hint picks the alpha bucket, everything
/// else (opaque, shadows) renders the opaque bucket.
pub fn select_bucket(pass: PassIndex, hint: PassHint) -> crate::effect::BucketKind {
    use crate::effect::BucketKind;
    match (pass, hint) {
        (PassIndex::Static, PassHint::Translucent) => BucketKind::StaticAlpha,
        (PassIndex::Static, _) => BucketKind::StaticOpaque,
        (PassIndex::Dynamic, PassHint::Translucent) => BucketKind::DynamicAlpha,
        (PassIndex::Dynamic, _) => BucketKind::DynamicOpaque,
    }
}

/// Validated mapping from shader slots to the effect's material list.
///
/// Constructed from the material list supplied at effect creation; a list
/// that is not exactly six entries is a configuration error there, not a
/// lazy assertion inside PrePass.
pub struct MaterialSlots {
    materials: [MaterialHandle; SHADER_SLOT_COUNT],
}

impl MaterialSlots {
    /// Validate and build the slot table from a material list
    pub fn from_list(list: &[MaterialHandle]) -> Result<Self> {
        if list.len() != SHADER_SLOT_COUNT {
            return Err(crate::error::Error::Configuration(format!(
                "material list must have exactly {} entries, got {}",
                SHADER_SLOT_COUNT,
                list.len()
            )));
        }
        Ok(Self {
            materials: [
                list[0].clone(),
                list[1].clone(),
                list[2].clone(),
                list[3].clone(),
                list[4].clone(),
                list[5].clone(),
            ],
        })
    }

    /// Material handle for a shader slot
    pub fn material(&self, slot: ShaderSlot) -> &MaterialHandle {
        &self.materials[slot.index()]
    }
}

#[cfg(test)]
#[path = "shader_slots_tests.rs"]
mod tests;
