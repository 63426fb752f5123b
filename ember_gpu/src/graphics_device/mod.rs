/// Graphics device module - device traits and the resource types every backend implements

pub mod graphics_device;
pub mod texture;
pub mod buffer;
pub mod descriptor_heap;
pub mod command_list;
pub mod swapchain;
pub mod fence;
pub mod pipeline;
pub mod footprint;

pub use graphics_device::*;
pub use texture::*;
pub use buffer::*;
pub use descriptor_heap::*;
pub use command_list::*;
pub use swapchain::*;
pub use fence::*;
pub use pipeline::*;
pub use footprint::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
