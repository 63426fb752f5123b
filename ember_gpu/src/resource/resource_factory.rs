/// Buffer/texture factory.
///
/// Pure allocation against the device: every created resource is owned by
/// whoever asked for it (`Arc`), and nothing here tracks lifetimes.
/// Allocation failures are logged and returned; callers treat them as fatal.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{
    Buffer, BufferDesc, BufferUsage, GraphicsDevice, ResourceState, Texture, TextureDesc,
    TextureFormat, TextureMetadata, TextureUsage,
};
use crate::{engine_debug, engine_error};

pub struct ResourceFactory {
    device: Arc<dyn GraphicsDevice>,
}

impl ResourceFactory {
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self { device }
    }

    /// Persistently mapped buffer usable as vertex, index, constant or structured data
    pub fn create_buffer(&self, size: u64) -> Result<Arc<dyn Buffer>> {
        self.buffer(size, BufferUsage::GENERAL)
    }

    /// Persistently mapped copy source for texture uploads
    pub fn create_staging_buffer(&self, size: u64) -> Result<Arc<dyn Buffer>> {
        self.buffer(size, BufferUsage::STAGING)
    }

    /// Device-local sampled texture sized by `metadata`, created in `CopyDest`
    pub fn create_texture(&self, metadata: &TextureMetadata) -> Result<Arc<dyn Texture>> {
        if metadata.format.is_depth() {
            let message = format!("sampled texture cannot use depth format {:?}", metadata.format);
            engine_error!("ember::ResourceFactory", "{}", message);
            return Err(Error::InvalidResource(message));
        }
        self.texture(&TextureDesc {
            width: metadata.width,
            height: metadata.height,
            mip_levels: metadata.mip_levels,
            format: metadata.format,
            usage: TextureUsage::Sampled,
            initial_state: ResourceState::CopyDest,
        })
    }

    /// Depth attachment covering `width` x `height`, created in `DepthWrite`
    pub fn create_depth_stencil(&self, width: u32, height: u32, format: TextureFormat) -> Result<Arc<dyn Texture>> {
        if !format.is_depth() {
            let message = format!("{:?} is not a depth format", format);
            engine_error!("ember::ResourceFactory", "{}", message);
            return Err(Error::InvalidResource(message));
        }
        self.texture(&TextureDesc {
            width,
            height,
            mip_levels: 1,
            format,
            usage: TextureUsage::DepthStencil,
            initial_state: ResourceState::DepthWrite,
        })
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    fn buffer(&self, size: u64, usage: BufferUsage) -> Result<Arc<dyn Buffer>> {
        if size == 0 {
            let message = "buffer size must be non-zero".to_string();
            engine_error!("ember::ResourceFactory", "{}", message);
            return Err(Error::InvalidResource(message));
        }
        match self.device.create_buffer(&BufferDesc { size, usage }) {
            Ok(buffer) => {
                engine_debug!("ember::ResourceFactory", "Buffer created: {} bytes ({:?})", size, usage);
                Ok(buffer)
            }
            Err(e) => {
                engine_error!("ember::ResourceFactory", "Buffer allocation of {} bytes failed: {}", size, e);
                Err(e)
            }
        }
    }

    fn texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>> {
        match self.device.create_texture(desc) {
            Ok(texture) => {
                engine_debug!(
                    "ember::ResourceFactory",
                    "Texture created: {}x{}, {} mips, {:?}",
                    desc.width, desc.height, desc.mip_levels, desc.format
                );
                Ok(texture)
            }
            Err(e) => {
                engine_error!(
                    "ember::ResourceFactory",
                    "Texture allocation {}x{} ({:?}) failed: {}",
                    desc.width, desc.height, desc.format, e
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "resource_factory_tests.rs"]
mod tests;
