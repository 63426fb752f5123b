/// Image decoding and mip chain generation for texture uploads.
///
/// Sources are decoded to RGBA8 and treated as sRGB. Each mip level is
/// filtered from the previous one in linear space and re-encoded to sRGB
/// so that downsampling does not darken the image.

use std::path::Path;
use image::{imageops, DynamicImage, Rgba, Rgba32FImage, RgbaImage};
use crate::error::{Error, Result};
use crate::graphics_device::{TextureFormat, TextureMetadata};
use crate::engine_error;

/// One level of a decoded mip chain
#[derive(Debug, Clone)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows
    pub pixels: Vec<u8>,
}

/// Decoded image with its full mip chain, ready for upload
#[derive(Debug, Clone)]
pub struct ScratchImage {
    pub metadata: TextureMetadata,
    pub mips: Vec<MipLevel>,
}

impl ScratchImage {
    /// Decode an image file and build its mip chain
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            let message = format!("cannot read texture '{}': {}", path.display(), e);
            engine_error!("ember::TextureManager", "{}", message);
            Error::InvalidResource(message)
        })?;
        Self::from_memory(&bytes)
    }

    /// Decode an encoded image (PNG, JPEG, BMP) and build its mip chain
    pub fn from_memory(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).map_err(|e| {
            let message = format!("cannot decode texture: {}", e);
            engine_error!("ember::TextureManager", "{}", message);
            Error::InvalidResource(message)
        })?;
        Ok(Self::from_image(image))
    }

    /// Build the mip chain of an already decoded image
    pub fn from_image(image: DynamicImage) -> Self {
        Self::from_rgba8(image.to_rgba8())
    }

    pub fn from_rgba8(base: RgbaImage) -> Self {
        let (width, height) = base.dimensions();
        let mip_levels = mip_count(width, height);

        let mut mips = Vec::with_capacity(mip_levels as usize);
        let mut linear = to_linear(&base);
        mips.push(MipLevel { width, height, pixels: base.into_raw() });

        for mip in 1..mip_levels {
            let w = (width >> mip).max(1);
            let h = (height >> mip).max(1);
            linear = imageops::resize(&linear, w, h, imageops::FilterType::Triangle);
            mips.push(MipLevel { width: w, height: h, pixels: to_srgb8(&linear) });
        }

        Self {
            metadata: TextureMetadata {
                width,
                height,
                mip_levels,
                format: TextureFormat::R8G8B8A8_SRGB,
            },
            mips,
        }
    }
}

/// Number of levels in a full chain down to 1x1
pub fn mip_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn to_linear(image: &RgbaImage) -> Rgba32FImage {
    let table: Vec<f32> = (0..=255u8).map(|v| srgb_to_linear(v as f32 / 255.0)).collect();
    let mut out = Rgba32FImage::new(image.width(), image.height());
    for (dst, src) in out.pixels_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = Rgba([
            table[r as usize],
            table[g as usize],
            table[b as usize],
            a as f32 / 255.0,
        ]);
    }
    out
}

fn to_srgb8(image: &Rgba32FImage) -> Vec<u8> {
    let quantize = |v: f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
    let mut out = Vec::with_capacity((image.width() * image.height() * 4) as usize);
    for px in image.pixels() {
        let [r, g, b, a] = px.0;
        out.extend_from_slice(&[
            quantize(linear_to_srgb(r)),
            quantize(linear_to_srgb(g)),
            quantize(linear_to_srgb(b)),
            quantize(a),
        ]);
    }
    out
}

#[cfg(test)]
#[path = "image_loader_tests.rs"]
mod tests;
