/// MultiDrawContext - shared GPU state for the immediate backend
///
/// Holds the device/queue pair, the shared vertex store the external mesh
/// builder fills, and the render pass the driver installs for the current
/// frame. Aggregators record their submissions into that pass; pass
/// begin/end and command submission stay with the driver.

use std::sync::{Arc, Mutex};

/// Shared context for all wgpu batch objects
pub struct MultiDrawContext {
    /// wgpu device
    pub device: wgpu::Device,
    /// Submission queue (used for buffer uploads at commit)
    pub queue: wgpu::Queue,
    /// Whether the device supports MULTI_DRAW_INDIRECT
    supports_multi_draw: bool,
    /// Render pass of the current frame, installed by the driver
    current_pass: Mutex<Option<wgpu::RenderPass<'static>>>,
    /// Shared vertex store holding every batched mesh
    vertex_store: Mutex<Option<Arc<wgpu::Buffer>>>,
}

impl MultiDrawContext {
    /// Create a context around an externally created device/queue pair
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let supports_multi_draw = device
            .features()
            .contains(wgpu::Features::MULTI_DRAW_INDIRECT);
        Self {
            device,
            queue,
            supports_multi_draw,
            current_pass: Mutex::new(None),
            vertex_store: Mutex::new(None),
        }
    }

    /// Whether one multi_draw_indirect can cover a whole aggregator
    pub fn supports_multi_draw(&self) -> bool {
        self.supports_multi_draw
    }

    /// Install the pass effects render into this frame.
    ///
    /// The driver detaches the pass from its encoder lifetime
    /// (`RenderPass::forget_lifetime`) before handing it over, and takes it
    /// back before finishing the encoder.
    pub fn set_current_pass(&self, pass: wgpu::RenderPass<'static>) {
        *self.current_pass.lock().unwrap() = Some(pass);
    }

    /// Remove and return the current pass (driver side, before submit)
    pub fn take_current_pass(&self) -> Option<wgpu::RenderPass<'static>> {
        self.current_pass.lock().unwrap().take()
    }

    /// Run `f` against the current pass; None when no pass is installed
    pub fn with_current_pass<R>(
        &self,
        f: impl FnOnce(&mut wgpu::RenderPass<'static>) -> R,
    ) -> Option<R> {
        let mut slot = self.current_pass.lock().unwrap();
        slot.as_mut().map(f)
    }

    /// Install the shared vertex store
    pub fn set_vertex_store(&self, buffer: Arc<wgpu::Buffer>) {
        *self.vertex_store.lock().unwrap() = Some(buffer);
    }

    /// The shared vertex store, if installed
    pub fn vertex_store(&self) -> Option<Arc<wgpu::Buffer>> {
        self.vertex_store.lock().unwrap().clone()
    }
}
