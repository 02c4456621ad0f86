/// EffectState - transient cross-effect context passed down an effect chain
/// for one frame.
///
/// Not owned by any single effect; shared read-only along the chain and
/// cleared explicitly by its producer between uses. The explicit backend's
/// frame-target sets ride along as an optional payload inspected by pattern
/// match. There is no derived-state downcast and no silently substituted
/// default: a backend that needs targets fails configuration when they are
/// absent.

use std::sync::Arc;
use crate::renderer::{EffectId, TexturePack};

/// Identifies a framebuffer-style render target owned by the render driver.
///
/// Backends resolve ids against their own target registries; the id itself
/// carries no backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameTargetId(pub u64);

/// Render-target sets for explicit backends, keyed by pass role.
#[derive(Debug, Clone, Default)]
pub struct FrameTargets {
    /// Depth-only targets (shadow maps)
    pub depth_only: Vec<FrameTargetId>,
    /// G-buffer targets (deferred opaque pass)
    pub g_buffer: Vec<FrameTargetId>,
    /// Default (forward) targets
    pub default_targets: Vec<FrameTargetId>,
    /// Preserved-attachment target for alpha blending
    pub final_target: Option<FrameTargetId>,
}

impl FrameTargets {
    /// Target for opaque scene rendering: the G-buffer set when present,
    /// the default set otherwise.
    pub fn scene_target(&self) -> Option<FrameTargetId> {
        self.g_buffer
            .first()
            .or_else(|| self.default_targets.first())
            .copied()
    }

    /// Target for shadow (depth-only) rendering
    pub fn shadow_target(&self) -> Option<FrameTargetId> {
        self.depth_only.first().copied()
    }
}

/// Transient per-frame context handed down a chain of effects.
#[derive(Default)]
pub struct EffectState {
    /// Effect this state was produced for, if part of a chain
    parent: Option<EffectId>,
    /// Previous effect in the chain
    previous: Option<EffectId>,
    /// Texture packs shared along the chain
    texture_packs: Vec<Arc<dyn TexturePack>>,
    /// Explicit-backend frame targets; None for immediate backends
    frame_targets: Option<FrameTargets>,
}

impl EffectState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state carrying explicit-backend frame targets
    pub fn with_frame_targets(targets: FrameTargets) -> Self {
        Self {
            frame_targets: Some(targets),
            ..Self::default()
        }
    }

    /// Parent effect in the chain
    pub fn parent(&self) -> Option<EffectId> {
        self.parent
    }

    /// Set the parent effect
    pub fn set_parent(&mut self, parent: EffectId) {
        self.parent = Some(parent);
    }

    /// Previous effect in the chain
    pub fn previous(&self) -> Option<EffectId> {
        self.previous
    }

    /// Set the previous effect
    pub fn set_previous(&mut self, previous: EffectId) {
        self.previous = Some(previous);
    }

    /// Texture packs shared along the chain
    pub fn texture_packs(&self) -> &[Arc<dyn TexturePack>] {
        &self.texture_packs
    }

    /// Share a texture pack along the chain
    pub fn push_texture_pack(&mut self, pack: Arc<dyn TexturePack>) {
        self.texture_packs.push(pack);
    }

    /// Frame targets, when an explicit backend drives the chain
    pub fn frame_targets(&self) -> Option<&FrameTargets> {
        self.frame_targets.as_ref()
    }

    /// Attach frame targets
    pub fn set_frame_targets(&mut self, targets: FrameTargets) {
        self.frame_targets = Some(targets);
    }

    /// Reset to the empty state. Must be called by the state's producer
    /// between uses.
    pub fn clear(&mut self) {
        self.parent = None;
        self.previous = None;
        self.texture_packs.clear();
        self.frame_targets = None;
    }
}

#[cfg(test)]
#[path = "effect_state_tests.rs"]
mod tests;
