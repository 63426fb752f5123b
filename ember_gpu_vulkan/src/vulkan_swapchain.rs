/// Swapchain - Vulkan implementation of the Swapchain trait

use ash::vk;
use ember_gpu::ember::render::{Swapchain, SwapchainDesc, Texture, TextureFormat, TextureInfo, TextureUsage};
use ember_gpu::ember::{Error, Result};
use ember_gpu::{engine_err, engine_error, engine_warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{texture_format_from_vk, texture_format_to_vk};
use crate::vulkan_texture::VulkanTexture;

/// Semaphores a submission must wait on and signal to feed presentation
#[derive(Clone, Copy)]
pub(crate) struct PresentSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
}

/// Vulkan swapchain
///
/// The image is acquired lazily by the first `current_back_buffer_index` of a
/// frame and released by `present`.
pub struct VulkanSwapchain {
    ctx: Arc<GpuContext>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<Arc<VulkanTexture>>,
    format: TextureFormat,
    extent: vk::Extent2D,

    /// One per acquire slot, rotated every present
    image_available: Vec<vk::Semaphore>,
    /// One per swapchain image
    render_finished: Vec<vk::Semaphore>,
    acquire_slot: usize,

    /// Image acquired for the current frame
    current: Option<u32>,
    /// Set once a submission has consumed the acquire semaphore
    submitted: AtomicBool,
}

impl VulkanSwapchain {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &SwapchainDesc) -> Result<Self> {
        unsafe {
            let capabilities = ctx
                .surface_loader
                .get_physical_device_surface_capabilities(ctx.physical_device, ctx.surface)
                .map_err(|e| {
                    engine_error!("ember::vulkan", "Failed to get surface capabilities: {:?}", e);
                    Error::InitializationFailed(format!("surface capabilities: {:?}", e))
                })?;

            let surface_formats = ctx
                .surface_loader
                .get_physical_device_surface_formats(ctx.physical_device, ctx.surface)
                .map_err(|e| {
                    engine_error!("ember::vulkan", "Failed to query surface formats: {:?}", e);
                    Error::InitializationFailed(format!("surface formats: {:?}", e))
                })?;

            let wanted = texture_format_to_vk(desc.format);
            let surface_format = surface_formats
                .iter()
                .find(|f| f.format == wanted)
                .or_else(|| surface_formats.iter().find(|f| texture_format_from_vk(f.format).is_some()))
                .copied()
                .ok_or_else(|| {
                    engine_error!("ember::vulkan", "Surface supports no 8-bit RGBA/BGRA format");
                    Error::InitializationFailed("no usable surface format".to_string())
                })?;
            let format = texture_format_from_vk(surface_format.format).unwrap_or(desc.format);
            if format != desc.format {
                engine_warn!(
                    "ember::vulkan",
                    "Back buffer format {:?} unsupported, using {:?}",
                    desc.format, format
                );
            }

            let extent = if capabilities.current_extent.width != u32::MAX {
                capabilities.current_extent
            } else {
                vk::Extent2D {
                    width: desc.width.clamp(
                        capabilities.min_image_extent.width,
                        capabilities.max_image_extent.width,
                    ),
                    height: desc.height.clamp(
                        capabilities.min_image_extent.height,
                        capabilities.max_image_extent.height,
                    ),
                }
            };

            let mut image_count = desc.buffer_count.max(capabilities.min_image_count);
            if capabilities.max_image_count > 0 {
                image_count = image_count.min(capabilities.max_image_count);
            }

            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(ctx.surface)
                .min_image_count(image_count)
                .image_format(surface_format.format)
                .image_color_space(surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(vk::PresentModeKHR::FIFO)
                .clipped(true);

            let loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);
            let swapchain = loader.create_swapchain(&create_info, None).map_err(|e| {
                engine_error!("ember::vulkan", "Failed to create swapchain: {:?}", e);
                Error::InitializationFailed(format!("swapchain: {:?}", e))
            })?;

            // From here on Drop releases everything created so far
            let mut this = Self {
                ctx: ctx.clone(),
                loader,
                swapchain,
                images: Vec::new(),
                format,
                extent,
                image_available: Vec::new(),
                render_finished: Vec::new(),
                acquire_slot: 0,
                current: None,
                submitted: AtomicBool::new(false),
            };

            let raw_images = this.loader.get_swapchain_images(swapchain).map_err(|e| {
                engine_error!("ember::vulkan", "Failed to get swapchain images: {:?}", e);
                Error::InitializationFailed(format!("swapchain images: {:?}", e))
            })?;

            for image in raw_images {
                let info = TextureInfo {
                    width: extent.width,
                    height: extent.height,
                    mip_levels: 1,
                    format,
                    usage: TextureUsage::RenderTarget,
                };
                this.images
                    .push(Arc::new(VulkanTexture::from_swapchain_image(ctx.clone(), image, info)?));
            }

            let semaphore_info = vk::SemaphoreCreateInfo::default();
            for _ in 0..this.images.len() {
                let available = ctx.device.create_semaphore(&semaphore_info, None);
                let finished = ctx.device.create_semaphore(&semaphore_info, None);
                match (available, finished) {
                    (Ok(available), Ok(finished)) => {
                        this.image_available.push(available);
                        this.render_finished.push(finished);
                    }
                    (available, finished) => {
                        for semaphore in [available, finished].into_iter().flatten() {
                            ctx.device.destroy_semaphore(semaphore, None);
                        }
                        engine_error!("ember::vulkan", "Failed to create swapchain semaphores");
                        return Err(Error::InitializationFailed("swapchain semaphores".to_string()));
                    }
                }
            }

            Ok(this)
        }
    }

    /// Semaphores for the submission rendering into the acquired image
    ///
    /// Returns `None` when no image is acquired or a submission already consumed it.
    pub(crate) fn take_present_sync(&self) -> Option<PresentSync> {
        let index = self.current? as usize;
        if self.submitted.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(PresentSync {
            image_available: self.image_available[self.acquire_slot],
            render_finished: self.render_finished[index],
        })
    }
}

impl Swapchain for VulkanSwapchain {
    fn current_back_buffer_index(&mut self) -> Result<u32> {
        if let Some(index) = self.current {
            return Ok(index);
        }

        let (index, suboptimal) = unsafe {
            self.loader
                .acquire_next_image(
                    self.swapchain,
                    u64::MAX,
                    self.image_available[self.acquire_slot],
                    vk::Fence::null(),
                )
                .map_err(|e| engine_err!("ember::vulkan", "Failed to acquire swapchain image: {:?}", e))?
        };
        if suboptimal {
            engine_warn!("ember::vulkan", "Swapchain is suboptimal for the surface");
        }

        self.current = Some(index);
        self.submitted.store(false, Ordering::Release);
        Ok(index)
    }

    fn back_buffer(&self, index: u32) -> Result<Arc<dyn Texture>> {
        self.images
            .get(index as usize)
            .map(|image| image.clone() as Arc<dyn Texture>)
            .ok_or_else(|| {
                engine_err!("ember::vulkan", "Back buffer {} out of {}", index, self.images.len())
            })
    }

    fn present(&mut self) -> Result<()> {
        let Some(index) = self.current.take() else {
            return Err(engine_err!("ember::vulkan", "present without an acquired back buffer"));
        };
        if !self.submitted.load(Ordering::Acquire) {
            return Err(engine_err!(
                "ember::vulkan",
                "present of back buffer {} that no submission rendered",
                index
            ));
        }

        let wait_semaphores = [self.render_finished[index as usize]];
        let swapchains = [self.swapchain];
        let indices = [index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);

        let result = {
            let queue = self
                .ctx
                .queue
                .lock()
                .map_err(|_| Error::BackendError("queue lock poisoned".to_string()))?;
            unsafe { self.loader.queue_present(*queue, &present_info) }
        };
        self.acquire_slot = (self.acquire_slot + 1) % self.image_available.len();

        match result {
            Ok(false) => Ok(()),
            Ok(true) => {
                engine_warn!("ember::vulkan", "Presented to a suboptimal swapchain");
                Ok(())
            }
            Err(e) => Err(engine_err!("ember::vulkan", "Failed to present: {:?}", e)),
        }
    }

    fn buffer_count(&self) -> u32 {
        self.images.len() as u32
    }

    fn width(&self) -> u32 {
        self.extent.width
    }

    fn height(&self) -> u32 {
        self.extent.height
    }

    fn format(&self) -> TextureFormat {
        self.format
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            if let Ok(queue) = self.ctx.queue.lock() {
                self.ctx.device.queue_wait_idle(*queue).ok();
            }
            for &semaphore in self.image_available.iter().chain(self.render_finished.iter()) {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
            // Views go before the images they look at
            self.images.clear();
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}
