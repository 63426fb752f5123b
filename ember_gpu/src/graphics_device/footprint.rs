/// Upload footprints: where each mip of a texture lives inside a staging buffer

use crate::graphics_device::TextureMetadata;

/// Alignment rules the device imposes on buffer-to-texture copies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyAlignment {
    /// Row pitch must be a multiple of this (bytes)
    pub row_pitch: u64,
    /// Each subresource must start at a multiple of this (bytes)
    pub placement: u64,
}

/// Placement of one mip level inside the staging buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubresourceFootprint {
    pub mip: u32,
    /// Byte offset of the first row
    pub offset: u64,
    pub width: u32,
    pub height: u32,
    /// Byte distance between two rows (>= row_bytes)
    pub row_pitch: u64,
    /// Bytes of pixel data per row
    pub row_bytes: u64,
}

/// Layout of a full mip chain inside one staging buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFootprints {
    pub layouts: Vec<SubresourceFootprint>,
    /// Minimum staging buffer size holding every layout
    pub total_bytes: u64,
}

impl CopyFootprints {
    /// Lay out every mip of `metadata` back to back, honoring `alignment`
    pub fn compute(metadata: &TextureMetadata, alignment: CopyAlignment) -> Self {
        let bpp = metadata.format.bytes_per_pixel() as u64;
        let mut layouts = Vec::with_capacity(metadata.mip_levels as usize);
        let mut cursor = 0u64;

        for mip in 0..metadata.mip_levels {
            let (width, height) = metadata.mip_extent(mip);
            let row_bytes = width as u64 * bpp;
            let row_pitch = align_up(row_bytes, alignment.row_pitch);
            let offset = align_up(cursor, alignment.placement);

            layouts.push(SubresourceFootprint {
                mip,
                offset,
                width,
                height,
                row_pitch,
                row_bytes,
            });

            // The last row is not padded
            cursor = offset + row_pitch * (height as u64 - 1) + row_bytes;
        }

        Self { layouts, total_bytes: cursor }
    }
}

/// Round `value` up to a multiple of `alignment` (alignment 0 or 1 = no-op)
pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
#[path = "footprint_tests.rs"]
mod tests;
