/// GpuContext - Vulkan objects shared by every resource of a device
///
/// Every buffer, texture, view table, command list, swapchain and fence holds an
/// `Arc<GpuContext>`, so the context is dropped after the last of them and can
/// tear down the allocator, device, surface and instance in the right order.

use ash::vk;
use ember_gpu::ember::{Error, Result};
use ember_gpu::engine_err;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::Mutex;

/// Upper bound of the view table, fixed in the shared descriptor set layout
pub(crate) const MAX_VIEW_SLOTS: u32 = 4096;

/// Push constant block shared by every pipeline (bytes)
pub(crate) const PUSH_CONSTANT_SIZE: u32 = 128;

/// Shared Vulkan context
pub struct GpuContext {
    pub(crate) _entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,

    pub(crate) surface_loader: ash::khr::surface::Instance,
    pub(crate) surface: vk::SurfaceKHR,

    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) limits: vk::PhysicalDeviceLimits,
    pub(crate) adapter_name: String,
    pub(crate) device: ash::Device,

    /// Graphics + present queue; submissions need external synchronization
    pub(crate) queue: Mutex<vk::Queue>,
    pub(crate) queue_family: u32,

    /// Dropped before the device is destroyed
    pub(crate) allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Pool for blocking one-shot submissions (initial layout transitions)
    pub(crate) one_shot_pool: Mutex<vk::CommandPool>,

    /// Layout of the single shader-visible view table
    pub(crate) view_set_layout: vk::DescriptorSetLayout,
    /// Layout shared by every pipeline: the view table plus the push constant block
    pub(crate) pipeline_layout: vk::PipelineLayout,
}

impl GpuContext {
    /// Record commands with `record` and run them to completion on the queue
    pub(crate) fn one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let pool = self
            .one_shot_pool
            .lock()
            .map_err(|_| Error::BackendError("one-shot pool lock poisoned".to_string()))?;

        unsafe {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = self
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to allocate one-shot command buffer: {:?}", e))?[0];

            let result = self.submit_one_shot(command_buffer, record);
            self.device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }

    unsafe fn submit_one_shot<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        unsafe {
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to begin one-shot command buffer: {:?}", e))?;

            record(&self.device, command_buffer);

            self.device
                .end_command_buffer(command_buffer)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to end one-shot command buffer: {:?}", e))?;

            let fence = self
                .device
                .create_fence(&vk::FenceCreateInfo::default(), None)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to create one-shot fence: {:?}", e))?;

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            let submitted = match self.queue.lock() {
                Ok(queue) => self.device.queue_submit(*queue, &[submit_info], fence),
                Err(_) => Err(vk::Result::ERROR_UNKNOWN),
            };
            let waited = submitted.and_then(|_| {
                self.device.wait_for_fences(&[fence], true, u64::MAX)
            });
            self.device.destroy_fence(fence, None);

            waited.map_err(|e| engine_err!("ember::vulkan", "One-shot submission failed: {:?}", e))
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            if let Ok(pool) = self.one_shot_pool.get_mut() {
                self.device.destroy_command_pool(*pool, None);
            }
            self.device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.device.destroy_descriptor_set_layout(self.view_set_layout, None);

            // Frees every memory block while the device is still alive
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);

            if let Some((loader, messenger)) = self.debug_utils.take() {
                crate::vulkan_debug::disable_debug_messages();
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}
