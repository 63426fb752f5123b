/*!
# Ember GPU - Vulkan Backend

Vulkan implementation of the `ember_gpu` device traits, built on `ash` and
`gpu-allocator`.

- Single graphics/present queue, Vulkan 1.3 dynamic rendering
- Persistently mapped host-visible buffers, device-local textures
- Timeline semaphores as completion fences
- The view table is one update-after-bind descriptor set; view handles are slot indices

Validation layers are only requested when the `vulkan-validation` feature is
enabled and `Config::enable_validation` is set; their messages go to the engine logger.

```no_run
use std::sync::Arc;
use ember_gpu::ember::Config;
use ember_gpu::ember::frame::FrameCore;
use ember_gpu_vulkan::ember::VulkanGraphicsDevice;

# fn run(window: &winit::window::Window) -> ember_gpu::ember::Result<()> {
let config = Config::default();
let device = Arc::new(VulkanGraphicsDevice::new(window, &config)?);
let mut frame = FrameCore::new(device, &config)?;
frame.pre_draw()?;
frame.post_draw()?;
# Ok(())
# }
```
*/

mod vulkan_context;
mod vulkan_debug;
mod vulkan_format;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_fence;
mod vulkan_descriptor_heap;
mod vulkan_pipeline;
mod vulkan_command_list;
mod vulkan_swapchain;
mod vulkan_graphics_device;

pub mod ember {
    pub use crate::vulkan_graphics_device::VulkanGraphicsDevice;
    pub use crate::vulkan_buffer::VulkanBuffer;
    pub use crate::vulkan_texture::VulkanTexture;
    pub use crate::vulkan_fence::VulkanFence;
    pub use crate::vulkan_descriptor_heap::VulkanDescriptorHeap;
    pub use crate::vulkan_pipeline::VulkanPipeline;
    pub use crate::vulkan_command_list::VulkanCommandList;
    pub use crate::vulkan_swapchain::VulkanSwapchain;
}
