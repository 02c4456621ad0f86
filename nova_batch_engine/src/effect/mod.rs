/// Effect module - draw-record classification, batch aggregation and the
/// per-frame effect lifecycle

// Module declarations
pub mod effect;
pub mod effect_state;
pub mod draw_package;
pub mod aggregator;
pub mod package_builder;
pub mod shader_slots;
pub mod batch_effect;

// Re-export everything
pub use effect::*;
pub use effect_state::*;
pub use draw_package::*;
pub use aggregator::*;
pub use package_builder::*;
pub use shader_slots::*;
pub use batch_effect::*;

// Mock backend for tests (no GPU required)
#[cfg(test)]
pub mod mock_backend;
