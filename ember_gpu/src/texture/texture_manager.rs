/// Texture residency manager.
///
/// Keyed registry of loaded textures. A load decodes the source, uploads
/// the full mip chain through a staging buffer recorded on the frame's open
/// command list, and publishes a shader-readable view in its own view table
/// slot. Staging buffers are kept alive until `release_intermediate_resources`
/// is called after the submission that carried the copy.

use std::path::Path;
use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::descriptor::ViewTable;
use crate::error::{Error, Result};
use crate::frame::FrameCore;
use crate::graphics_device::{
    Buffer, CopyFootprints, CpuDescriptorHandle, GpuDescriptorHandle, Texture, TextureMetadata,
};
use crate::texture::ScratchImage;
use crate::{engine_debug, engine_error, engine_info, engine_trace};

/// Registry entry of one loaded texture
pub struct TextureEntry {
    pub metadata: TextureMetadata,
    pub texture: Arc<dyn Texture>,
    pub view_index: u32,
    pub cpu_handle: CpuDescriptorHandle,
    pub gpu_handle: GpuDescriptorHandle,
    /// Upload source, held until the copy has been submitted
    staging: Option<Arc<dyn Buffer>>,
}

impl TextureEntry {
    /// Whether the upload staging buffer is still held
    pub fn is_uploading(&self) -> bool {
        self.staging.is_some()
    }
}

#[derive(Default)]
pub struct TextureManager {
    entries: FxHashMap<String, TextureEntry>,
    /// Resources of uploads that failed after recording started
    orphaned: Vec<(Arc<dyn Texture>, Arc<dyn Buffer>)>,
}

impl TextureManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the image at `path` unless it is already registered
    pub fn load_texture(
        &mut self,
        frame: &mut FrameCore,
        views: &mut ViewTable,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let path = path.as_ref();
        let key = path.to_string_lossy().into_owned();
        if self.entries.contains_key(&key) {
            engine_trace!("ember::TextureManager", "'{}' already loaded", key);
            return Ok(());
        }

        let image = ScratchImage::from_file(path)?;
        self.upload(frame, views, key, image)
    }

    /// Load an encoded image from memory under `key` unless `key` is already registered
    pub fn load_texture_from_memory(
        &mut self,
        frame: &mut FrameCore,
        views: &mut ViewTable,
        key: &str,
        bytes: &[u8],
    ) -> Result<()> {
        if self.entries.contains_key(key) {
            engine_trace!("ember::TextureManager", "'{}' already loaded", key);
            return Ok(());
        }

        let image = ScratchImage::from_memory(bytes)?;
        self.upload(frame, views, key.to_string(), image)
    }

    /// Drop every staging buffer still held
    ///
    /// Call once per frame, after `post_draw` has submitted the list carrying
    /// the uploads.
    pub fn release_intermediate_resources(&mut self) {
        let released = self
            .entries
            .values_mut()
            .filter_map(|entry| entry.staging.take())
            .count()
            + self.orphaned.len();
        self.orphaned.clear();
        if released > 0 {
            engine_debug!("ember::TextureManager", "Released {} staging buffer(s)", released);
        }
    }

    /// View table slot of `key`
    pub fn view_index(&self, key: &str) -> Result<u32> {
        Ok(self.entry(key)?.view_index)
    }

    /// GPU handle of the view of `key`
    pub fn gpu_handle(&self, key: &str) -> Result<GpuDescriptorHandle> {
        Ok(self.entry(key)?.gpu_handle)
    }

    /// CPU handle of the view of `key`
    pub fn cpu_handle(&self, key: &str) -> Result<CpuDescriptorHandle> {
        Ok(self.entry(key)?.cpu_handle)
    }

    pub fn metadata(&self, key: &str) -> Result<&TextureMetadata> {
        Ok(&self.entry(key)?.metadata)
    }

    pub fn texture(&self, key: &str) -> Result<&Arc<dyn Texture>> {
        Ok(&self.entry(key)?.texture)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of uploads whose staging buffer has not been released yet
    pub fn pending_uploads(&self) -> usize {
        self.entries.values().filter(|e| e.is_uploading()).count() + self.orphaned.len()
    }

    /// Drop every texture and stop tracking its state in `frame`
    ///
    /// The GPU must be done with them (after `FrameCore::flush` or at teardown).
    pub fn finalize(&mut self, frame: &mut FrameCore) {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain() {
            frame.forget(entry.texture.as_ref());
        }
        for (texture, _) in self.orphaned.drain(..) {
            frame.forget(texture.as_ref());
        }
        engine_info!("ember::TextureManager", "Finalized, {} texture(s) dropped", count);
    }

    pub fn entry(&self, key: &str) -> Result<&TextureEntry> {
        self.entries.get(key).ok_or_else(|| {
            let message = format!("texture '{}' was never loaded", key);
            engine_error!("ember::TextureManager", "{}", message);
            Error::InvalidResource(message)
        })
    }

    fn upload(
        &mut self,
        frame: &mut FrameCore,
        views: &mut ViewTable,
        key: String,
        image: ScratchImage,
    ) -> Result<()> {
        let metadata = image.metadata;
        let texture = frame.factory().create_texture(&metadata)?;

        let footprints = CopyFootprints::compute(&metadata, frame.device().copy_alignment());
        let staging = frame.factory().create_staging_buffer(footprints.total_bytes)?;
        for (layout, mip) in footprints.layouts.iter().zip(&image.mips) {
            let row_bytes = layout.row_bytes as usize;
            for (row, pixels) in mip.pixels.chunks_exact(row_bytes).enumerate() {
                staging.write(layout.offset + row as u64 * layout.row_pitch, pixels)?;
            }
        }

        // Slot and view go first, nothing fallible may follow the recording
        let view_index = views.allocate()?;
        views.create_texture_view(view_index, texture.as_ref(), metadata.mip_levels)?;

        if let Err(e) =
            frame.record_texture_upload(staging.as_ref(), texture.as_ref(), &footprints.layouts)
        {
            // The copy may be partially recorded, keep its resources until the next release
            self.orphaned.push((texture, staging));
            return Err(e);
        }

        engine_info!(
            "ember::TextureManager",
            "Loaded '{}': {}x{}, {} mips, slot {}",
            key, metadata.width, metadata.height, metadata.mip_levels, view_index
        );

        self.entries.insert(
            key,
            TextureEntry {
                metadata,
                texture,
                view_index,
                cpu_handle: views.cpu_handle(view_index),
                gpu_handle: views.gpu_handle(view_index),
                staging: Some(staging),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "texture_manager_tests.rs"]
mod tests;
