/// Buffer trait and buffer descriptor

use std::ptr::NonNull;
use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::graphics_device::ResourceId;

bitflags! {
    /// How a buffer may be bound
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Vertex buffer
        const VERTEX = 1 << 0;
        /// Index buffer
        const INDEX = 1 << 1;
        /// Constant (uniform) buffer
        const CONSTANT = 1 << 2;
        /// Structured buffer readable through a view slot
        const STRUCTURED = 1 << 3;
        /// Copy source for texture uploads
        const STAGING = 1 << 4;
    }
}

impl BufferUsage {
    /// Usage of buffers handed to collaborators: any of vertex/index/constant/structured
    pub const GENERAL: BufferUsage = BufferUsage::VERTEX
        .union(BufferUsage::INDEX)
        .union(BufferUsage::CONSTANT)
        .union(BufferUsage::STRUCTURED);
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
}

/// Linear GPU buffer, persistently mapped into CPU address space
///
/// The mapping is established at creation and stays valid, at the same
/// address, for the whole lifetime of the buffer.
pub trait Buffer: Send + Sync {
    /// Identity used for state tracking
    fn id(&self) -> ResourceId;

    /// Size in bytes
    fn size(&self) -> u64;

    /// Declared usage
    fn usage(&self) -> BufferUsage;

    /// Persistent CPU mapping of the whole buffer
    fn mapped_ptr(&self) -> Result<NonNull<u8>>;

    /// Copy `data` into the mapping at `offset`
    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        check_range(self.size(), offset, data.len() as u64)?;
        let base = self.mapped_ptr()?;
        // SAFETY: the range was checked against the buffer size and the mapping
        // covers the whole buffer for its lifetime.
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                base.as_ptr().add(offset as usize),
                data.len(),
            );
        }
        Ok(())
    }

    /// Copy `len` bytes out of the mapping starting at `offset`
    fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        check_range(self.size(), offset, len as u64)?;
        let base = self.mapped_ptr()?;
        let mut out = vec![0u8; len];
        // SAFETY: see `write`.
        unsafe {
            std::ptr::copy_nonoverlapping(
                base.as_ptr().add(offset as usize),
                out.as_mut_ptr(),
                len,
            );
        }
        Ok(out)
    }
}

impl dyn Buffer {
    /// Write a slice of plain-old-data values (vertices, constants) at `offset`
    pub fn write_pod<T: bytemuck::Pod>(&self, offset: u64, values: &[T]) -> Result<()> {
        self.write(offset, bytemuck::cast_slice(values))
    }
}

fn check_range(size: u64, offset: u64, len: u64) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(Error::InvalidResource(format!(
            "buffer access [{}, {}+{}) out of bounds (size {})",
            offset, offset, len, size
        ))),
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
