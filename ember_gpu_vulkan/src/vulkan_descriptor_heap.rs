/// Descriptor heap - the shader-visible view table as one bindless descriptor set
///
/// Binding 0 holds combined image samplers, binding 1 storage buffers; both are
/// arrays of `MAX_VIEW_SLOTS` indexed by view slot. Handles are slot indices
/// (start 0, stride 1), so a GPU handle is exactly the index a shader uses.

use ash::vk;
use ember_gpu::ember::render::{
    Buffer, BufferViewDesc, CpuDescriptorHandle, DescriptorHeap, GpuDescriptorHandle, Texture,
    TextureViewDesc,
};
use ember_gpu::ember::{Error, Result};
use ember_gpu::{engine_err, engine_error};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};

use crate::vulkan_context::{GpuContext, MAX_VIEW_SLOTS, PUSH_CONSTANT_SIZE};
use crate::vulkan_format::{aspect_mask, texture_format_to_vk};
use crate::vulkan_texture::create_view;

pub(crate) const TEXTURE_BINDING: u32 = 0;
pub(crate) const BUFFER_BINDING: u32 = 1;

/// Create the view table set layout and the pipeline layout every pipeline shares
pub(crate) unsafe fn create_view_layouts(
    device: &ash::Device,
) -> Result<(vk::DescriptorSetLayout, vk::PipelineLayout)> {
    let bindings = [
        vk::DescriptorSetLayoutBinding::default()
            .binding(TEXTURE_BINDING)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(MAX_VIEW_SLOTS)
            .stage_flags(vk::ShaderStageFlags::ALL_GRAPHICS),
        vk::DescriptorSetLayoutBinding::default()
            .binding(BUFFER_BINDING)
            .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
            .descriptor_count(MAX_VIEW_SLOTS)
            .stage_flags(vk::ShaderStageFlags::ALL_GRAPHICS),
    ];
    let binding_flags = [
        vk::DescriptorBindingFlags::PARTIALLY_BOUND | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND,
        vk::DescriptorBindingFlags::PARTIALLY_BOUND | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND,
    ];
    let mut flags_info =
        vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);
    let layout_info = vk::DescriptorSetLayoutCreateInfo::default()
        .flags(vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
        .bindings(&bindings)
        .push_next(&mut flags_info);

    unsafe {
        let set_layout = device
            .create_descriptor_set_layout(&layout_info, None)
            .map_err(|e| {
                engine_error!("ember::vulkan", "Failed to create view table layout: {:?}", e);
                Error::InitializationFailed(format!("view table layout: {:?}", e))
            })?;

        let set_layouts = [set_layout];
        let push_constant_ranges = [vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::ALL_GRAPHICS,
            offset: 0,
            size: PUSH_CONSTANT_SIZE,
        }];
        let pipeline_layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        let pipeline_layout = match device.create_pipeline_layout(&pipeline_layout_info, None) {
            Ok(layout) => layout,
            Err(e) => {
                device.destroy_descriptor_set_layout(set_layout, None);
                engine_error!("ember::vulkan", "Failed to create pipeline layout: {:?}", e);
                return Err(Error::InitializationFailed(format!("pipeline layout: {:?}", e)));
            }
        };

        Ok((set_layout, pipeline_layout))
    }
}

/// Shader-visible view table
pub struct VulkanDescriptorHeap {
    ctx: Arc<GpuContext>,
    capacity: u32,
    pool: vk::DescriptorPool,
    pub(crate) set: vk::DescriptorSet,
    sampler: vk::Sampler,
    /// Image views owned by texture slots, destroyed on overwrite
    views: Mutex<FxHashMap<u32, vk::ImageView>>,
}

impl VulkanDescriptorHeap {
    pub(crate) fn new(ctx: Arc<GpuContext>, capacity: u32) -> Result<Self> {
        if capacity == 0 || capacity > MAX_VIEW_SLOTS {
            engine_error!(
                "ember::vulkan",
                "View table capacity {} outside 1..={}",
                capacity, MAX_VIEW_SLOTS
            );
            return Err(Error::InitializationFailed(format!(
                "view table capacity {} outside 1..={}",
                capacity, MAX_VIEW_SLOTS
            )));
        }

        unsafe {
            let pool_sizes = [
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    descriptor_count: MAX_VIEW_SLOTS,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::STORAGE_BUFFER,
                    descriptor_count: MAX_VIEW_SLOTS,
                },
            ];
            let pool_info = vk::DescriptorPoolCreateInfo::default()
                .flags(vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND)
                .pool_sizes(&pool_sizes)
                .max_sets(1);
            let pool = ctx.device.create_descriptor_pool(&pool_info, None).map_err(|e| {
                engine_error!("ember::vulkan", "Failed to create view table pool: {:?}", e);
                Error::InitializationFailed(format!("view table pool: {:?}", e))
            })?;

            let set_layouts = [ctx.view_set_layout];
            let alloc_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&set_layouts);
            let set = match ctx.device.allocate_descriptor_sets(&alloc_info) {
                Ok(sets) => sets[0],
                Err(e) => {
                    ctx.device.destroy_descriptor_pool(pool, None);
                    engine_error!("ember::vulkan", "Failed to allocate view table: {:?}", e);
                    return Err(Error::InitializationFailed(format!("view table set: {:?}", e)));
                }
            };

            let sampler_info = vk::SamplerCreateInfo::default()
                .mag_filter(vk::Filter::LINEAR)
                .min_filter(vk::Filter::LINEAR)
                .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
                .address_mode_u(vk::SamplerAddressMode::REPEAT)
                .address_mode_v(vk::SamplerAddressMode::REPEAT)
                .address_mode_w(vk::SamplerAddressMode::REPEAT)
                .max_lod(vk::LOD_CLAMP_NONE);
            let sampler = match ctx.device.create_sampler(&sampler_info, None) {
                Ok(sampler) => sampler,
                Err(e) => {
                    ctx.device.destroy_descriptor_pool(pool, None);
                    engine_error!("ember::vulkan", "Failed to create view table sampler: {:?}", e);
                    return Err(Error::InitializationFailed(format!("sampler: {:?}", e)));
                }
            };

            Ok(Self {
                ctx,
                capacity,
                pool,
                set,
                sampler,
                views: Mutex::new(FxHashMap::default()),
            })
        }
    }

    fn slot(&self, handle: CpuDescriptorHandle) -> Result<u32> {
        if handle.ptr >= self.capacity as u64 {
            return Err(engine_err!(
                "ember::vulkan",
                "View handle {} outside table of {}",
                handle.ptr, self.capacity
            ));
        }
        Ok(handle.ptr as u32)
    }

    pub(crate) fn write_texture_view(
        &self,
        handle: CpuDescriptorHandle,
        image: vk::Image,
        texture: &dyn Texture,
        desc: &TextureViewDesc,
    ) -> Result<()> {
        let slot = self.slot(handle)?;
        let info = texture.info();
        if desc.mip_levels == 0 || desc.mip_levels > info.mip_levels {
            return Err(engine_err!(
                "ember::vulkan",
                "View of {} mips requested on a texture with {}",
                desc.mip_levels, info.mip_levels
            ));
        }

        let view = unsafe {
            create_view(
                &self.ctx.device,
                image,
                texture_format_to_vk(desc.format),
                aspect_mask(desc.format),
                desc.mip_levels,
            )?
        };

        let image_infos = [vk::DescriptorImageInfo {
            sampler: self.sampler,
            image_view: view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.set)
            .dst_binding(TEXTURE_BINDING)
            .dst_array_element(slot)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_infos);
        unsafe { self.ctx.device.update_descriptor_sets(&[write], &[]) };

        let previous = self
            .views
            .lock()
            .map_err(|_| Error::BackendError("view table lock poisoned".to_string()))?
            .insert(slot, view);
        if let Some(previous) = previous {
            unsafe { self.ctx.device.destroy_image_view(previous, None) };
        }
        Ok(())
    }

    pub(crate) fn write_buffer_view(
        &self,
        handle: CpuDescriptorHandle,
        buffer: vk::Buffer,
        source: &dyn Buffer,
        desc: &BufferViewDesc,
    ) -> Result<()> {
        let slot = self.slot(handle)?;
        let offset = desc.first_element * desc.stride as u64;
        let range = desc.num_elements as u64 * desc.stride as u64;
        if range == 0 || offset + range > source.size() {
            return Err(engine_err!(
                "ember::vulkan",
                "Structured view [{}, {}) outside buffer of {} bytes",
                offset,
                offset + range,
                source.size()
            ));
        }

        let buffer_infos = [vk::DescriptorBufferInfo { buffer, offset, range }];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.set)
            .dst_binding(BUFFER_BINDING)
            .dst_array_element(slot)
            .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
            .buffer_info(&buffer_infos);
        unsafe { self.ctx.device.update_descriptor_sets(&[write], &[]) };
        Ok(())
    }
}

impl DescriptorHeap for VulkanDescriptorHeap {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn stride(&self) -> u64 {
        1
    }

    fn cpu_start(&self) -> CpuDescriptorHandle {
        CpuDescriptorHandle { ptr: 0 }
    }

    fn gpu_start(&self) -> GpuDescriptorHandle {
        GpuDescriptorHandle { ptr: 0 }
    }
}

impl Drop for VulkanDescriptorHeap {
    fn drop(&mut self) {
        unsafe {
            if let Ok(views) = self.views.get_mut() {
                for (_, view) in views.drain() {
                    self.ctx.device.destroy_image_view(view, None);
                }
            }
            self.ctx.device.destroy_sampler(self.sampler, None);
            // Frees the set with it
            self.ctx.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}
