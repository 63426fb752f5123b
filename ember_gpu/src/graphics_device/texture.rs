/// Texture trait, texture descriptor, and texture info

use crate::graphics_device::ResourceId;

/// Texture pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    D32_FLOAT,
    D24_UNORM_S8_UINT,
}

impl TextureFormat {
    /// Size of one texel in bytes
    pub fn bytes_per_pixel(self) -> u32 {
        4
    }

    /// Whether this is a depth(/stencil) format
    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::D32_FLOAT | TextureFormat::D24_UNORM_S8_UINT)
    }

    /// Whether shaders see this format through an sRGB decode
    pub fn is_srgb(self) -> bool {
        matches!(self, TextureFormat::R8G8B8A8_SRGB | TextureFormat::B8G8R8A8_SRGB)
    }
}

/// Texture usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureUsage {
    /// Sampled in shaders, filled by copy
    Sampled,
    /// Color render target (back buffers)
    RenderTarget,
    /// Depth/stencil attachment
    DepthStencil,
}

/// Usage state a texture is in between barriers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Owned by the presentation engine
    Present,
    /// Bound as color render target
    RenderTarget,
    /// Destination of a buffer-to-texture copy
    CopyDest,
    /// Read by shaders
    ShaderResource,
    /// Bound as depth attachment with writes enabled
    DepthWrite,
}

/// Descriptor for creating a texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Number of mip levels (>= 1)
    pub mip_levels: u32,
    /// Pixel format
    pub format: TextureFormat,
    /// Usage
    pub usage: TextureUsage,
    /// State the texture is created in
    pub initial_state: ResourceState,
}

/// Read-only properties of a created texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureInfo {
    /// Build the info record matching a creation descriptor
    pub fn from_desc(desc: &TextureDesc) -> Self {
        Self {
            width: desc.width,
            height: desc.height,
            mip_levels: desc.mip_levels,
            format: desc.format,
            usage: desc.usage,
        }
    }
}

/// Device-local 2D texture
pub trait Texture: Send + Sync {
    /// Identity used for state tracking
    fn id(&self) -> ResourceId;

    /// Creation properties
    fn info(&self) -> &TextureInfo;
}

/// Dimensions, mip count and format of a decoded image
///
/// Passed to the resource factory to size a texture and to the footprint
/// computation to lay out its upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureMetadata {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
}

impl TextureMetadata {
    /// Extent of `mip` (each level halves, clamped to 1)
    pub fn mip_extent(&self, mip: u32) -> (u32, u32) {
        ((self.width >> mip).max(1), (self.height >> mip).max(1))
    }
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
