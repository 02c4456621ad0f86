/// GpuContext - Shared GPU resources for all Vulkan objects
///
/// Contains everything the batch effect needs for GPU operations:
/// - Device for Vulkan API calls
/// - Allocator for memory management
/// - Queue for teardown synchronization
/// - The current command recording and the shared vertex store, both
///   installed by the render driver (command-buffer begin/end/submit and
///   mesh construction are external collaborators)

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use nova_batch_engine::error::Result;
use nova_batch_engine::engine_err;

use crate::vulkan_buffer::Buffer;

/// Shared GPU context for all Vulkan resources.
///
/// This struct is shared (via `Arc`) by all GPU resources (texture packs,
/// buffers, aggregators) to avoid duplicating device/allocator/queue
/// references in each resource.
///
/// Note: device and instance destruction is handled by the owning renderer
/// to avoid drop-ordering issues. This context never destroys the device.
pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator (shared, requires mutex for thread safety)
    /// Wrapped in ManuallyDrop so the owning renderer controls when it is
    /// dropped relative to device destruction
    pub allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,

    /// Graphics queue for teardown synchronization
    pub graphics_queue: vk::Queue,

    /// Graphics queue family index
    pub graphics_queue_family: u32,

    /// Command buffer currently recording the frame, installed by the
    /// render driver before any effect draw
    current_recording: Mutex<Option<vk::CommandBuffer>>,

    /// All command buffers the driver records into; reset during effect
    /// teardown so released resources are not referenced by stale
    /// recordings
    recordings: Mutex<Vec<vk::CommandBuffer>>,

    /// Shared vertex store holding every batched mesh, filled by the
    /// external mesh builder
    vertex_store: Mutex<Option<Arc<Buffer>>>,
}

impl GpuContext {
    /// Create a new GPU context around an externally created device.
    ///
    /// # Arguments
    ///
    /// * `device` - Vulkan logical device
    /// * `allocator` - GPU memory allocator
    /// * `graphics_queue` - Graphics queue used for submissions
    /// * `graphics_queue_family` - Graphics queue family index
    pub fn new(
        device: ash::Device,
        allocator: Arc<Mutex<Allocator>>,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
    ) -> Self {
        Self {
            device,
            allocator: ManuallyDrop::new(allocator),
            graphics_queue,
            graphics_queue_family,
            current_recording: Mutex::new(None),
            recordings: Mutex::new(Vec::new()),
            vertex_store: Mutex::new(None),
        }
    }

    /// Install the command buffer effects record into this frame.
    ///
    /// Also registers it for reset at effect teardown.
    pub fn set_current_recording(&self, command_buffer: vk::CommandBuffer) {
        let mut recordings = self.recordings.lock().unwrap();
        if !recordings.contains(&command_buffer) {
            recordings.push(command_buffer);
        }
        *self.current_recording.lock().unwrap() = Some(command_buffer);
    }

    /// The command buffer currently recording, if any
    pub fn current_recording(&self) -> Option<vk::CommandBuffer> {
        *self.current_recording.lock().unwrap()
    }

    /// Install the shared vertex store
    pub fn set_vertex_store(&self, buffer: Arc<Buffer>) {
        *self.vertex_store.lock().unwrap() = Some(buffer);
    }

    /// The shared vertex store, if installed
    pub fn vertex_store(&self) -> Option<Arc<Buffer>> {
        self.vertex_store.lock().unwrap().clone()
    }

    /// Drain the queue and device, then reset all registered command
    /// recordings so previously recorded references to effect resources
    /// are released.
    ///
    /// A stalled GPU wait here is fatal to the frame; there is no timeout.
    pub fn wait_idle_and_reset_recordings(&self) -> Result<()> {
        unsafe {
            self.device
                .queue_wait_idle(self.graphics_queue)
                .map_err(|e| engine_err!("nova::vulkan", "queue_wait_idle failed: {:?}", e))?;
            self.device
                .device_wait_idle()
                .map_err(|e| engine_err!("nova::vulkan", "device_wait_idle failed: {:?}", e))?;

            let mut recordings = self.recordings.lock().unwrap();
            for &command_buffer in recordings.iter() {
                self.device
                    .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                    .map_err(|e| {
                        engine_err!("nova::vulkan", "reset_command_buffer failed: {:?}", e)
                    })?;
            }
            recordings.clear();
        }
        *self.current_recording.lock().unwrap() = None;

        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        // NOTE: device and instance destruction is handled by the owning
        // renderer to avoid drop-ordering issues. This Drop intentionally
        // does nothing.
    }
}
