/// Texture - Vulkan image with a full-range view

use ash::vk;
use ember_gpu::ember::render::{ResourceId, Texture, TextureDesc, TextureInfo};
use ember_gpu::ember::{Error, Result};
use ember_gpu::{engine_err, engine_error};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{aspect_mask, state_sync, texture_format_to_vk, texture_usage_to_vk};

/// Vulkan texture
///
/// Swapchain images are wrapped without an allocation; only their view is owned.
pub struct VulkanTexture {
    ctx: Arc<GpuContext>,
    id: ResourceId,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    allocation: Option<Allocation>,
    owns_image: bool,
    info: TextureInfo,
}

impl VulkanTexture {
    /// Create a device-local image and move it to `desc.initial_state`
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &TextureDesc) -> Result<Self> {
        let format = texture_format_to_vk(desc.format);
        let aspect = aspect_mask(desc.format);

        unsafe {
            let create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
                .mip_levels(desc.mip_levels)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(texture_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx
                .device
                .create_image(&create_info, None)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to create image: {:?}", e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = {
                let mut allocator = ctx
                    .allocator
                    .lock()
                    .map_err(|_| Error::BackendError("allocator lock poisoned".to_string()))?;
                allocator.allocate(&AllocationCreateDesc {
                    name: "ember texture",
                    requirements,
                    location: MemoryLocation::GpuOnly,
                    linear: false,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
            };
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    engine_error!(
                        "ember::vulkan",
                        "Texture allocation {}x{} failed: {:?}",
                        desc.width, desc.height, e
                    );
                    return Err(match e {
                        gpu_allocator::AllocationError::OutOfMemory => Error::OutOfMemory,
                        other => Error::BackendError(format!("texture allocation failed: {:?}", other)),
                    });
                }
            };

            // From here on Drop cleans up after any failure
            let mut texture = Self {
                ctx: ctx.clone(),
                id: ResourceId::new(),
                image,
                view: vk::ImageView::null(),
                allocation: Some(allocation),
                owns_image: true,
                info: TextureInfo::from_desc(desc),
            };

            if let Some(allocation) = texture.allocation.as_ref() {
                ctx.device
                    .bind_image_memory(image, allocation.memory(), allocation.offset())
                    .map_err(|e| engine_err!("ember::vulkan", "Failed to bind image memory: {:?}", e))?;
            }

            texture.view = create_view(&ctx.device, image, format, aspect, desc.mip_levels)?;

            let target = state_sync(desc.initial_state);
            ctx.one_shot(|device, cmd| {
                let barrier = vk::ImageMemoryBarrier::default()
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(target.layout)
                    .src_access_mask(vk::AccessFlags::empty())
                    .dst_access_mask(target.access)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(image)
                    .subresource_range(full_range(aspect, desc.mip_levels));
                device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    target.stage,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                );
            })?;

            Ok(texture)
        }
    }

    /// Wrap a swapchain-owned image
    pub(crate) fn from_swapchain_image(
        ctx: Arc<GpuContext>,
        image: vk::Image,
        info: TextureInfo,
    ) -> Result<Self> {
        let view = unsafe {
            create_view(
                &ctx.device,
                image,
                texture_format_to_vk(info.format),
                vk::ImageAspectFlags::COLOR,
                1,
            )?
        };
        Ok(Self {
            ctx,
            id: ResourceId::new(),
            image,
            view,
            allocation: None,
            owns_image: false,
            info,
        })
    }

    pub(crate) fn aspect(&self) -> vk::ImageAspectFlags {
        aspect_mask(self.info.format)
    }
}

pub(crate) fn full_range(aspect: vk::ImageAspectFlags, mip_levels: u32) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect,
        base_mip_level: 0,
        level_count: mip_levels,
        base_array_layer: 0,
        layer_count: 1,
    }
}

pub(crate) unsafe fn create_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
    mip_levels: u32,
) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping::default())
        .subresource_range(full_range(aspect, mip_levels));
    unsafe {
        device
            .create_image_view(&create_info, None)
            .map_err(|e| engine_err!("ember::vulkan", "Failed to create image view: {:?}", e))
    }
}

impl Texture for VulkanTexture {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.view, None);
            }
            if self.owns_image {
                if let Some(allocation) = self.allocation.take() {
                    if let Ok(mut allocator) = self.ctx.allocator.lock() {
                        allocator.free(allocation).ok();
                    }
                }
                self.ctx.device.destroy_image(self.image, None);
            }
        }
    }
}
