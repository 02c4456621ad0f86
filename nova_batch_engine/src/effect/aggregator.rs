/// Batch aggregator abstraction - turns many draw records into one or few
/// GPU submissions.
///
/// Each effect owns four aggregator instances, one per classification
/// bucket. Backends realize the trait sharply differently (indirect
/// multidraw vs explicit pipeline + descriptor-set instance buffer), but
/// the add/commit/render protocol and the per-frame cursor are shared.

use std::sync::Arc;
use crate::error::Result;
use crate::renderer::{ShaderProgram, TexturePack};
use super::draw_package::{DrawPackageData, PackageFlags, SubMeshData};

// ===== BUCKETS =====

/// The four aggregation buckets: {static|dynamic} x {opaque|alpha}.
///
/// Every draw record belongs to exactly one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketKind {
    /// Non-animated, opaque geometry
    StaticOpaque,
    /// Non-animated, alpha-blended geometry
    StaticAlpha,
    /// Animated, opaque geometry
    DynamicOpaque,
    /// Animated, alpha-blended geometry
    DynamicAlpha,
}

impl BucketKind {
    /// All buckets, in stable order
    pub const ALL: [BucketKind; 4] = [
        BucketKind::StaticOpaque,
        BucketKind::StaticAlpha,
        BucketKind::DynamicOpaque,
        BucketKind::DynamicAlpha,
    ];

    /// Classify a record's flags into its bucket
    pub fn from_flags(flags: PackageFlags) -> Self {
        match (
            flags.contains(PackageFlags::DYNAMIC),
            flags.contains(PackageFlags::ALPHA),
        ) {
            (false, false) => BucketKind::StaticOpaque,
            (false, true) => BucketKind::StaticAlpha,
            (true, false) => BucketKind::DynamicOpaque,
            (true, true) => BucketKind::DynamicAlpha,
        }
    }

    /// Stable array index of this bucket
    pub fn index(self) -> usize {
        match self {
            BucketKind::StaticOpaque => 0,
            BucketKind::StaticAlpha => 1,
            BucketKind::DynamicOpaque => 2,
            BucketKind::DynamicAlpha => 3,
        }
    }

    /// Whether this bucket holds animated geometry
    pub fn is_dynamic(self) -> bool {
        matches!(self, BucketKind::DynamicOpaque | BucketKind::DynamicAlpha)
    }

    /// Whether this bucket holds alpha-blended geometry
    pub fn has_alpha(self) -> bool {
        matches!(self, BucketKind::StaticAlpha | BucketKind::DynamicAlpha)
    }
}

/// Fixed storage with one slot per bucket.
pub struct Buckets<T> {
    slots: [T; 4],
}

impl<T> Buckets<T> {
    /// Build by invoking `f` for each bucket in stable order
    pub fn from_fn(mut f: impl FnMut(BucketKind) -> T) -> Self {
        Self {
            slots: [
                f(BucketKind::StaticOpaque),
                f(BucketKind::StaticAlpha),
                f(BucketKind::DynamicOpaque),
                f(BucketKind::DynamicAlpha),
            ],
        }
    }

    /// Fallible version of [`Buckets::from_fn`]
    pub fn try_from_fn(mut f: impl FnMut(BucketKind) -> Result<T>) -> Result<Self> {
        Ok(Self {
            slots: [
                f(BucketKind::StaticOpaque)?,
                f(BucketKind::StaticAlpha)?,
                f(BucketKind::DynamicOpaque)?,
                f(BucketKind::DynamicAlpha)?,
            ],
        })
    }

    /// Get the slot for a bucket
    pub fn get(&self, bucket: BucketKind) -> &T {
        &self.slots[bucket.index()]
    }

    /// Get the slot for a bucket, mutably
    pub fn get_mut(&mut self, bucket: BucketKind) -> &mut T {
        &mut self.slots[bucket.index()]
    }

    /// Iterate `(bucket, slot)` pairs in stable order
    pub fn iter(&self) -> impl Iterator<Item = (BucketKind, &T)> {
        BucketKind::ALL.iter().map(move |&k| (k, &self.slots[k.index()]))
    }

    /// Iterate `(bucket, slot)` pairs in stable order, mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BucketKind, &mut T)> {
        BucketKind::ALL.iter().zip(self.slots.iter_mut()).map(|(&k, s)| (k, s))
    }
}

impl<T: Default> Default for Buckets<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

// ===== FRAME CURSOR =====

/// Per-aggregator frame cycle state.
///
/// Replaces the external "first token" convention: `begin_frame()` arms the
/// cursor, the first `note_add()` of the cycle reports `first = true` exactly
/// once, and adding after `mark_committed()` is rejected until the next
/// `begin_frame()`, so a missed reset cannot leak stale data into the batch.
#[derive(Debug)]
pub struct FrameCursor {
    started: bool,
    committed: bool,
    adds: usize,
}

impl FrameCursor {
    /// Create a cursor armed for its first frame
    pub fn new() -> Self {
        Self {
            started: false,
            committed: false,
            adds: 0,
        }
    }

    /// Arm the cursor for a new frame cycle
    pub fn begin_frame(&mut self) {
        self.started = false;
        self.committed = false;
        self.adds = 0;
    }

    /// Record one add; returns `true` for the first add of the cycle.
    ///
    /// Fails once the cycle has been committed.
    pub fn note_add(&mut self) -> Result<bool> {
        if self.committed {
            return Err(crate::error::Error::InvalidResource(
                "add() after commit(); begin_frame() required first".to_string(),
            ));
        }
        let first = !self.started;
        self.started = true;
        self.adds += 1;
        Ok(first)
    }

    /// Seal the cycle: no further adds until the next `begin_frame()`
    pub fn mark_committed(&mut self) {
        self.committed = true;
    }

    /// Whether the cycle has been committed
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Number of adds recorded this cycle
    pub fn adds(&self) -> usize {
        self.adds
    }
}

impl Default for FrameCursor {
    fn default() -> Self {
        Self::new()
    }
}

// ===== AGGREGATOR TRAIT =====

/// Backend-owned accumulator that turns draw records into one or few GPU
/// submissions.
///
/// Protocol per frame: `begin_frame()` (from the effect's clear step), then
/// any number of `add()` calls, one `commit()` making the records visible to
/// `render()`, then `render()` once per pass that selects this bucket.
/// `render()` with zero committed records performs no GPU submission and
/// returns Ok.
pub trait BatchAggregator: Send + Sync {
    /// Allocate GPU-resident storage. Called once from effect init.
    fn initialize(&mut self) -> Result<()>;

    /// Attach the texture pack backing this aggregator's records
    fn set_texture_pack(&mut self, pack: Arc<dyn TexturePack>);

    /// Get the attached texture pack
    fn texture_pack(&self) -> Option<&Arc<dyn TexturePack>>;

    /// Configure alpha blending for this aggregator's submissions
    fn set_alpha_blending(&mut self, enabled: bool);

    /// Whether this aggregator submits with alpha blending
    fn alpha_blending(&self) -> bool;

    /// Whether this aggregator can take a sub-mesh during package building.
    ///
    /// An alpha-blending aggregator only takes alpha sub-meshes; a default
    /// aggregator takes anything. Builders must therefore consult
    /// alpha-capable aggregators first.
    fn accepts(&self, sub_mesh: &SubMeshData) -> bool {
        if self.alpha_blending() {
            sub_mesh.alpha_blended
        } else {
            true
        }
    }

    /// Arm the frame cursor for a new frame cycle
    fn begin_frame(&mut self);

    /// Append one draw record. The first add after `begin_frame()` resets
    /// the internal write cursors; adding after `commit()` is an error.
    fn add(&mut self, record: &Arc<DrawPackageData>) -> Result<()>;

    /// Flush added records into GPU-resident form, making them visible to
    /// subsequent `render()` calls.
    fn commit(&mut self) -> Result<()>;

    /// Number of records committed for the current frame
    fn committed_count(&self) -> usize;

    /// Set the shader program the next `render()` submits with
    fn set_shader(&mut self, shader: Arc<dyn ShaderProgram>);

    /// Issue the GPU submission(s) for all committed records
    fn render(&mut self) -> Result<()>;

    /// Release GPU resources
    fn shutdown(&mut self);
}

#[cfg(test)]
#[path = "aggregator_tests.rs"]
mod tests;
