/// GraphicsDevice trait - factory and queue of a single-adapter, single-queue backend

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use crate::error::Result;
use crate::graphics_device::{
    Buffer, BufferDesc, BufferViewDesc, CommandList, CopyAlignment, CpuDescriptorHandle,
    DescriptorHeap, Fence, Pipeline, PipelineDesc, Swapchain, SwapchainDesc, Texture,
    TextureDesc, TextureViewDesc,
};

/// Process-unique identity of a GPU resource
///
/// Used to key per-resource bookkeeping (barrier state, mock storage)
/// without holding on to the resource itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Allocate a fresh id
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

/// Viewport rectangle (depth range in [0, 1])
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-surface viewport covering `width` x `height`
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Scissor rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    /// Full-surface scissor covering `width` x `height`
    pub fn full(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

/// Graphics device: resource factory plus the single command queue
///
/// Implementations are expected to be shared (`Arc<dyn GraphicsDevice>`) between the
/// frame core, the view table and the texture manager, so every method takes `&self`.
pub trait GraphicsDevice: Send + Sync {
    /// Create a persistently mapped, CPU-writable linear buffer
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Create a device-local 2D texture in `desc.initial_state`
    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>>;

    /// Row-pitch and placement alignment required for buffer-to-texture copies
    fn copy_alignment(&self) -> CopyAlignment;

    /// Create the shader-visible view table backing store
    fn create_descriptor_heap(&self, capacity: u32) -> Result<Arc<dyn DescriptorHeap>>;

    /// Write a shader-readable texture view at `handle`
    fn create_texture_view(
        &self,
        heap: &dyn DescriptorHeap,
        handle: CpuDescriptorHandle,
        texture: &dyn Texture,
        desc: &TextureViewDesc,
    ) -> Result<()>;

    /// Write a shader-readable structured buffer view at `handle`
    fn create_buffer_view(
        &self,
        heap: &dyn DescriptorHeap,
        handle: CpuDescriptorHandle,
        buffer: &dyn Buffer,
        desc: &BufferViewDesc,
    ) -> Result<()>;

    /// Build a graphics pipeline from precompiled shader code
    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>>;

    /// Create a command list (closed; call `begin` before recording)
    fn create_command_list(&self) -> Result<Box<dyn CommandList>>;

    /// Create the presentation surface
    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<Box<dyn Swapchain>>;

    /// Create a completion fence starting at `initial_value`
    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn Fence>>;

    /// Submit a closed command list
    ///
    /// When `swapchain` is given, execution waits for its acquired back buffer
    /// and the following `present` waits for this submission.
    fn execute(&self, commands: &dyn CommandList, swapchain: Option<&dyn Swapchain>) -> Result<()>;

    /// Ask the queue to set `fence` to `value` once all prior work has completed
    fn signal(&self, fence: &dyn Fence, value: u64) -> Result<()>;

    /// Block until the queue is idle
    fn wait_idle(&self) -> Result<()>;

    /// Human-readable adapter name
    fn adapter_name(&self) -> String;
}
