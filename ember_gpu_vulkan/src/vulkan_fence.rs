/// Fence - timeline semaphore

use ash::vk;
use ember_gpu::ember::render::Fence;
use ember_gpu::ember::{Error, Result};
use ember_gpu::{engine_err, engine_error};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Longest a CPU wait may block before the device is considered lost (ns)
const FENCE_WAIT_TIMEOUT_NS: u64 = 10_000_000_000;

/// Completion fence backed by a Vulkan timeline semaphore
pub struct VulkanFence {
    ctx: Arc<GpuContext>,
    pub(crate) semaphore: vk::Semaphore,
}

impl VulkanFence {
    pub(crate) fn new(ctx: Arc<GpuContext>, initial_value: u64) -> Result<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);

        let semaphore = unsafe {
            ctx.device.create_semaphore(&create_info, None).map_err(|e| {
                engine_error!("ember::vulkan", "Failed to create timeline semaphore: {:?}", e);
                Error::InitializationFailed(format!("timeline semaphore: {:?}", e))
            })?
        };
        Ok(Self { ctx, semaphore })
    }
}

impl Fence for VulkanFence {
    fn completed_value(&self) -> Result<u64> {
        unsafe {
            self.ctx
                .device
                .get_semaphore_counter_value(self.semaphore)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to read fence value: {:?}", e))
        }
    }

    fn wait(&self, value: u64) -> Result<()> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);

        match unsafe { self.ctx.device.wait_semaphores(&wait_info, FENCE_WAIT_TIMEOUT_NS) } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(engine_err!(
                "ember::vulkan",
                "Fence did not reach {} within {} ms",
                value,
                FENCE_WAIT_TIMEOUT_NS / 1_000_000
            )),
            Err(e) => Err(engine_err!("ember::vulkan", "Fence wait for {} failed: {:?}", value, e)),
        }
    }
}

impl Drop for VulkanFence {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_semaphore(self.semaphore, None);
        }
    }
}
