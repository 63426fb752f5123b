//! Texture module
//!
//! Image decoding with mip generation, and the keyed texture registry.

mod image_loader;
mod texture_manager;

pub use image_loader::{mip_count, MipLevel, ScratchImage};
pub use texture_manager::{TextureEntry, TextureManager};
