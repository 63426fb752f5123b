/// Buffer - persistently mapped Vulkan buffer

use ash::vk;
use ember_gpu::ember::render::{Buffer, BufferDesc, BufferUsage, ResourceId};
use ember_gpu::ember::{Error, Result};
use ember_gpu::{engine_err, engine_error};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::buffer_usage_to_vk;

/// Vulkan buffer in host-visible memory, mapped for its whole lifetime
pub struct VulkanBuffer {
    ctx: Arc<GpuContext>,
    id: ResourceId,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
    usage: BufferUsage,
    mapped: NonNull<u8>,
}

// SAFETY: `mapped` points into an allocation owned by this buffer; writes through it
// are the caller's responsibility (see `Buffer::write`).
unsafe impl Send for VulkanBuffer {}
unsafe impl Sync for VulkanBuffer {}

impl VulkanBuffer {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &BufferDesc) -> Result<Self> {
        if desc.size == 0 {
            engine_error!("ember::vulkan", "Refusing to create a zero-sized buffer");
            return Err(Error::InvalidResource("buffer size must be non-zero".to_string()));
        }

        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            let buffer = ctx
                .device
                .create_buffer(&create_info, None)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to create buffer: {:?}", e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let allocation = {
                let mut allocator = ctx
                    .allocator
                    .lock()
                    .map_err(|_| Error::BackendError("allocator lock poisoned".to_string()))?;
                allocator.allocate(&AllocationCreateDesc {
                    name: "ember buffer",
                    requirements,
                    location: MemoryLocation::CpuToGpu,
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
            };
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    engine_error!("ember::vulkan", "Buffer allocation of {} bytes failed: {:?}", desc.size, e);
                    return Err(match e {
                        gpu_allocator::AllocationError::OutOfMemory => Error::OutOfMemory,
                        other => Error::BackendError(format!("buffer allocation failed: {:?}", other)),
                    });
                }
            };

            let Some(mapped) = allocation.mapped_ptr().map(|p| p.cast::<u8>()) else {
                Self::release(&ctx, buffer, allocation);
                engine_error!("ember::vulkan", "Buffer memory is not host-visible");
                return Err(Error::BackendError("buffer memory is not host-visible".to_string()));
            };

            if let Err(e) = ctx
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
            {
                Self::release(&ctx, buffer, allocation);
                engine_error!("ember::vulkan", "Failed to bind buffer memory: {:?}", e);
                return Err(Error::BackendError(format!("failed to bind buffer memory: {:?}", e)));
            }

            Ok(Self {
                ctx,
                id: ResourceId::new(),
                buffer,
                allocation: Some(allocation),
                size: desc.size,
                usage: desc.usage,
                mapped,
            })
        }
    }

    unsafe fn release(ctx: &GpuContext, buffer: vk::Buffer, allocation: Allocation) {
        if let Ok(mut allocator) = ctx.allocator.lock() {
            allocator.free(allocation).ok();
        }
        unsafe { ctx.device.destroy_buffer(buffer, None) };
    }
}

impl Buffer for VulkanBuffer {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn mapped_ptr(&self) -> Result<NonNull<u8>> {
        Ok(self.mapped)
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            unsafe { Self::release(&self.ctx, self.buffer, allocation) };
        }
    }
}
