/*!
# Nova Batch Engine

Core traits and types for the Nova batched draw engine.

This crate provides the platform-agnostic half of a draw-batching system:
render objects are classified once into draw records tagged
{dynamic|static} x {opaque|alpha}, dispersed into four batch aggregators,
committed once per frame and rendered in a small number of GPU submissions
per pass. Backend crates realize the aggregators for concrete graphics
APIs (indirect multidraw on wgpu, explicit pipelines on Vulkan).

## Architecture

- **Effect**: per-frame lifecycle contract driven by the renderer
- **BatchDrawEffect**: the single-sourced lifecycle state machine
- **EffectBackend**: capability trait isolating backend divergence
- **BatchAggregator**: record accumulator, one instance per bucket
- **TexturePack**: array texture collaborator interface

Backend implementations provide concrete types that implement these traits.
*/

// Internal modules
pub mod error;
pub mod log;
pub mod engine;
pub mod renderer;
pub mod effect;

// Main nova namespace module
pub mod nova {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton
    pub use crate::engine::Engine;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
        // Note: engine_* macros are NOT re-exported here - they are internal only
    }

    // Render sub-module with renderer collaborator types
    pub mod render {
        pub use crate::renderer::*;
    }

    // Effect sub-module with the batching core
    pub mod effect {
        pub use crate::effect::*;
    }
}

// Re-export math library at crate root
pub use glam;
