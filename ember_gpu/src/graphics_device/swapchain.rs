/// Swapchain trait for presentation

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{Texture, TextureFormat};

/// Descriptor for creating the swapchain
#[derive(Debug, Clone)]
pub struct SwapchainDesc {
    pub width: u32,
    pub height: u32,
    /// Number of back buffers (double buffering = 2)
    pub buffer_count: u32,
    pub format: TextureFormat,
}

/// Ring of back buffers presented to the window
pub trait Swapchain: Send + Sync {
    /// Index of the back buffer to render into this frame
    ///
    /// The first call of a frame acquires the image; later calls before
    /// `present` return the same index.
    fn current_back_buffer_index(&mut self) -> Result<u32>;

    /// Back buffer texture at `index`
    fn back_buffer(&self, index: u32) -> Result<Arc<dyn Texture>>;

    /// Present the current back buffer
    fn present(&mut self) -> Result<()>;

    fn buffer_count(&self) -> u32;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn format(&self) -> TextureFormat;
}
