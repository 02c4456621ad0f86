/// Buffer - CPU-visible Vulkan buffer with mapped updates
///
/// Backs the per-effect instance and uniform buffers. Allocated CpuToGpu so
/// commits are a single mapped copy; freed through the shared allocator on
/// drop.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use nova_batch_engine::error::{Error, Result};
use nova_batch_engine::engine_err;

use crate::vulkan_context::GpuContext;

/// Vulkan buffer with a CPU-visible allocation
pub struct Buffer {
    /// Shared GPU context (device, allocator, queue)
    ctx: Arc<GpuContext>,
    /// Vulkan buffer
    pub(crate) buffer: vk::Buffer,
    /// GPU memory allocation
    pub(crate) allocation: Option<Allocation>,
    /// Buffer size in bytes
    pub(crate) size: u64,
}

impl Buffer {
    /// Create a CPU-visible buffer of `size` bytes
    ///
    /// # Arguments
    ///
    /// * `ctx` - Shared GPU context
    /// * `size` - Size in bytes
    /// * `usage` - Buffer usage flags
    /// * `name` - Allocation name (for allocator reports)
    pub fn create(
        ctx: Arc<GpuContext>,
        size: u64,
        usage: vk::BufferUsageFlags,
        name: &str,
    ) -> Result<Self> {
        unsafe {
            let buffer_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx
                .device
                .create_buffer(&buffer_info, None)
                .map_err(|e| engine_err!("nova::vulkan", "Failed to create buffer '{}': {:?}", name, e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);

            let allocation = {
                let mut allocator = ctx
                    .allocator
                    .lock()
                    .map_err(|_| Error::BackendError("allocator lock poisoned".to_string()))?;
                allocator
                    .allocate(&AllocationCreateDesc {
                        name,
                        requirements,
                        location: MemoryLocation::CpuToGpu,
                        linear: true,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|e| {
                        unsafe { ctx.device.destroy_buffer(buffer, None) };
                        engine_err!("nova::vulkan", "Failed to allocate '{}': {:?}", name, e)
                    })?
            };

            ctx.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                .map_err(|e| engine_err!("nova::vulkan", "Failed to bind buffer memory: {:?}", e))?;

            Ok(Self {
                ctx,
                buffer,
                allocation: Some(allocation),
                size,
            })
        }
    }

    /// Underlying Vulkan buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Buffer size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Copy `data` into the buffer at `offset` through the mapped pointer
    pub fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if offset + data.len() as u64 > self.size {
            return Err(Error::InvalidResource(format!(
                "buffer update out of range: offset {} + len {} > size {}",
                offset,
                data.len(),
                self.size
            )));
        }

        let Some(allocation) = &self.allocation else {
            return Err(Error::BackendError("buffer has no allocation".to_string()));
        };

        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| Error::BackendError("buffer is not CPU-accessible".to_string()))?
            .as_ptr() as *mut u8;

        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                mapped_ptr.offset(offset as isize),
                data.len(),
            );
        }

        Ok(())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                // don't panic if the lock fails - the buffer still needs
                // destroying
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
