/// CommandList trait - for recording rendering commands

use crate::error::Result;
use crate::graphics_device::{
    Buffer, DescriptorHeap, GpuDescriptorHandle, Pipeline, Rect2D, ResourceState,
    SubresourceFootprint, Texture, Viewport,
};

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

/// State transition of a single texture
#[derive(Clone, Copy)]
pub struct ResourceBarrier<'a> {
    pub resource: &'a dyn Texture,
    pub before: ResourceState,
    pub after: ResourceState,
}

impl<'a> ResourceBarrier<'a> {
    pub fn transition(resource: &'a dyn Texture, before: ResourceState, after: ResourceState) -> Self {
        Self { resource, before, after }
    }
}

/// Attachments bound for drawing
///
/// `clear_color` / `clear_depth` clear the attachment when rendering starts;
/// `None` keeps its contents.
pub struct RenderingDesc<'a> {
    pub color: &'a dyn Texture,
    pub depth: Option<&'a dyn Texture>,
    pub clear_color: Option<[f32; 4]>,
    pub clear_depth: Option<f32>,
}

/// Command list for recording GPU work
///
/// A list is either closed (fresh, or after `end`) or recording (after `begin`).
/// `begin` resets the backing allocator, so it must only be called once the
/// GPU has finished the previous submission of this list.
pub trait CommandList: Send + Sync {
    /// Reset and reopen for recording
    fn begin(&mut self) -> Result<()>;

    /// Close recording
    fn end(&mut self) -> Result<()>;

    /// Whether the list is open
    fn is_recording(&self) -> bool;

    /// Record a texture state transition
    fn resource_barrier(&mut self, barrier: &ResourceBarrier) -> Result<()>;

    /// Bind color/depth attachments, clearing them as requested
    fn begin_rendering(&mut self, desc: &RenderingDesc) -> Result<()>;

    /// Unbind the attachments bound by `begin_rendering`
    fn end_rendering(&mut self) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    /// Copy every mip described by `footprints` from `src` into `dst`
    ///
    /// `dst` must be in `ResourceState::CopyDest`.
    fn copy_buffer_to_texture(
        &mut self,
        src: &dyn Buffer,
        dst: &dyn Texture,
        footprints: &[SubresourceFootprint],
    ) -> Result<()>;

    /// Make `heap` the active shader-visible view table
    fn set_descriptor_heap(&mut self, heap: &dyn DescriptorHeap) -> Result<()>;

    /// Point root parameter `root_index` at the table starting at `handle`
    fn set_descriptor_table(&mut self, root_index: u32, handle: GpuDescriptorHandle) -> Result<()>;

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()>;

    /// Write inline constants at byte `offset`
    fn set_root_constants(&mut self, offset: u32, data: &[u8]) -> Result<()>;

    fn set_vertex_buffer(&mut self, buffer: &dyn Buffer, offset: u64) -> Result<()>;

    fn set_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64, index_type: IndexType) -> Result<()>;

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()>;

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()>;
}
