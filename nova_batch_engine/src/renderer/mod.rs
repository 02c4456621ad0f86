/// Renderer module - collaborator traits and render-state value types

// Module declarations
pub mod renderer;
pub mod shader;
pub mod texture_pack;
pub mod render_state;

// Re-export everything from renderer.rs
pub use renderer::*;

// Re-export from other modules
pub use shader::*;
pub use texture_pack::*;
pub use render_state::*;

// Mock renderer for tests (no GPU required)
#[cfg(test)]
pub mod mock_renderer;
