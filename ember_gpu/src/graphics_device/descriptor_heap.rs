/// Descriptor heap trait and view descriptors

use crate::graphics_device::TextureFormat;

/// CPU-side address of a view slot, used when writing a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CpuDescriptorHandle {
    pub ptr: u64,
}

/// GPU-side address of a view slot, used when binding a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuDescriptorHandle {
    pub ptr: u64,
}

/// Fixed-capacity, shader-visible array of view slots
///
/// Slot `i` lives at `cpu_start + i * stride` (CPU side) and
/// `gpu_start + i * stride` (GPU side).
pub trait DescriptorHeap: Send + Sync {
    /// Number of slots
    fn capacity(&self) -> u32;

    /// Distance between two consecutive slot handles
    fn stride(&self) -> u64;

    /// CPU handle of slot 0
    fn cpu_start(&self) -> CpuDescriptorHandle;

    /// GPU handle of slot 0
    fn gpu_start(&self) -> GpuDescriptorHandle;
}

/// Shader-readable 2D texture view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureViewDesc {
    pub format: TextureFormat,
    /// Mips visible through the view, starting at mip 0
    pub mip_levels: u32,
}

/// Shader-readable structured buffer view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferViewDesc {
    pub first_element: u64,
    pub num_elements: u32,
    /// Element size in bytes
    pub stride: u32,
}
