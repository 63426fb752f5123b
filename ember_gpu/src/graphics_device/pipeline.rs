/// Pipeline trait and pipeline descriptor

use crate::graphics_device::TextureFormat;

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    /// Size in bytes
    pub fn size(self) -> u32 {
        match self {
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

/// One vertex attribute inside the interleaved vertex
#[derive(Debug, Clone, Copy)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    /// Byte offset inside the vertex
    pub offset: u32,
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Color blending mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// No blending
    Opaque,
    /// Standard alpha blending (src_alpha, one_minus_src_alpha)
    Alpha,
}

/// Descriptor for creating a graphics pipeline
///
/// Shader code is precompiled SPIR-V; the view table is bound as the pipeline's
/// single shader-visible table, and root constants select slots inside it.
#[derive(Debug, Clone)]
pub struct PipelineDesc {
    pub vertex_shader: Vec<u32>,
    pub fragment_shader: Vec<u32>,
    /// Interleaved vertex size in bytes (0 = no vertex input)
    pub vertex_stride: u32,
    pub attributes: Vec<VertexAttribute>,
    pub topology: PrimitiveTopology,
    pub cull_mode: CullMode,
    pub depth_test: bool,
    pub depth_write: bool,
    pub blend: BlendMode,
    pub color_format: TextureFormat,
    pub depth_format: Option<TextureFormat>,
}

/// Compiled graphics pipeline
pub trait Pipeline: Send + Sync {}
