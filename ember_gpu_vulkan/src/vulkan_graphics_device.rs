/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait

use ash::vk;
use ember_gpu::ember::render::{
    Buffer, BufferDesc, BufferViewDesc, CommandList, CopyAlignment, CpuDescriptorHandle,
    DescriptorHeap, Fence, GraphicsDevice, Pipeline, PipelineDesc, Swapchain, SwapchainDesc,
    Texture, TextureDesc, TextureViewDesc,
};
use ember_gpu::ember::{Config, Error, Result};
use ember_gpu::{engine_err, engine_error, engine_info, engine_warn};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CStr;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_command_list::{vk_buffer, vk_texture, VulkanCommandList};
use crate::vulkan_context::GpuContext;
use crate::vulkan_debug::{enable_debug_messages, severity_flags, vulkan_debug_callback};
use crate::vulkan_descriptor_heap::{create_view_layouts, VulkanDescriptorHeap};
use crate::vulkan_fence::VulkanFence;
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_swapchain::VulkanSwapchain;
use crate::vulkan_texture::VulkanTexture;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan graphics device
///
/// Owns nothing but a handle on the shared [`GpuContext`]; the context lives as
/// long as the last resource created from this device.
pub struct VulkanGraphicsDevice {
    ctx: Arc<GpuContext>,
}

fn init_err(what: &str, e: impl std::fmt::Debug) -> Error {
    engine_error!("ember::vulkan", "Failed to {}: {:?}", what, e);
    Error::InitializationFailed(format!("failed to {}: {:?}", what, e))
}

impl VulkanGraphicsDevice {
    /// Create the instance, surface, device, queue and allocator for `window`
    ///
    /// The window must outlive the device.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &Config) -> Result<Self> {
        config.validate()?;

        unsafe {
            let entry = ash::Entry::load().map_err(|e| init_err("load the Vulkan library", e))?;

            let app_name = std::ffi::CString::new(config.app_name.clone())
                .map_err(|e| init_err("encode the application name", e))?;
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Ember")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window
                .display_handle()
                .map_err(|e| init_err("get the display handle", e))?;
            let mut extension_names =
                ash_window::enumerate_required_extensions(display_handle.as_raw())
                    .map_err(|e| init_err("enumerate surface extensions", e))?
                    .to_vec();

            let validation = config.enable_validation
                && cfg!(feature = "vulkan-validation")
                && Self::validation_layer_available(&entry);
            if config.enable_validation && !validation {
                engine_warn!("ember::vulkan", "Validation requested but not available, continuing without it");
            }
            let layer_names = if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                vec![VALIDATION_LAYER.as_ptr()]
            } else {
                Vec::new()
            };

            let instance_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);
            let instance = entry
                .create_instance(&instance_info, None)
                .map_err(|e| init_err("create the instance", e))?;

            let debug_utils = if validation {
                let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
                enable_debug_messages(config.debug_severity);
                let messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                    .message_severity(severity_flags(config.debug_severity))
                    .message_type(
                        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                    )
                    .pfn_user_callback(Some(vulkan_debug_callback));
                match loader.create_debug_utils_messenger(&messenger_info, None) {
                    Ok(messenger) => Some((loader, messenger)),
                    Err(e) => {
                        engine_warn!("ember::vulkan", "Debug messenger unavailable: {:?}", e);
                        None
                    }
                }
            } else {
                None
            };

            let window_handle = window
                .window_handle()
                .map_err(|e| init_err("get the window handle", e))?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| init_err("create the surface", e))?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let (physical_device, queue_family) =
                Self::pick_adapter(&instance, &surface_loader, surface)?;
            let properties = instance.get_physical_device_properties(physical_device);
            let adapter_name = CStr::from_ptr(properties.device_name.as_ptr())
                .to_string_lossy()
                .into_owned();

            let priorities = [1.0];
            let queue_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_family)
                .queue_priorities(&priorities)];
            let device_extensions = [ash::khr::swapchain::NAME.as_ptr()];
            let mut features12 = vk::PhysicalDeviceVulkan12Features::default()
                .timeline_semaphore(true)
                .descriptor_indexing(true)
                .runtime_descriptor_array(true)
                .descriptor_binding_partially_bound(true)
                .descriptor_binding_sampled_image_update_after_bind(true)
                .descriptor_binding_storage_buffer_update_after_bind(true)
                .shader_sampled_image_array_non_uniform_indexing(true);
            let mut features13 = vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true);
            let device_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_infos)
                .enabled_extension_names(&device_extensions)
                .push_next(&mut features12)
                .push_next(&mut features13);
            let device = instance
                .create_device(physical_device, &device_info, None)
                .map_err(|e| init_err("create the logical device", e))?;
            let queue = device.get_device_queue(queue_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_err("create the GPU allocator", e))?;

            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT);
            let one_shot_pool = device
                .create_command_pool(&pool_info, None)
                .map_err(|e| init_err("create the one-shot command pool", e))?;

            let (view_set_layout, pipeline_layout) = create_view_layouts(&device)?;

            let ctx = Arc::new(GpuContext {
                _entry: entry,
                instance,
                debug_utils,
                surface_loader,
                surface,
                physical_device,
                limits: properties.limits,
                adapter_name,
                device,
                queue: Mutex::new(queue),
                queue_family,
                allocator: ManuallyDrop::new(Mutex::new(allocator)),
                one_shot_pool: Mutex::new(one_shot_pool),
                view_set_layout,
                pipeline_layout,
            });

            engine_info!(
                "ember::vulkan",
                "Vulkan device ready on {} (queue family {}, validation {})",
                ctx.adapter_name,
                queue_family,
                validation
            );

            Ok(Self { ctx })
        }
    }

    fn validation_layer_available(entry: &ash::Entry) -> bool {
        unsafe { entry.enumerate_instance_layer_properties() }
            .map(|layers| {
                layers.iter().any(|layer| {
                    layer.layer_name_as_c_str().map(|name| name == VALIDATION_LAYER).unwrap_or(false)
                })
            })
            .unwrap_or(false)
    }

    /// First Vulkan 1.3 adapter with a queue family doing both graphics and present,
    /// discrete GPUs first
    unsafe fn pick_adapter(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<(vk::PhysicalDevice, u32)> {
        unsafe {
            let mut candidates = instance
                .enumerate_physical_devices()
                .map_err(|e| init_err("enumerate adapters", e))?
                .into_iter()
                .filter_map(|physical_device| {
                    let properties = instance.get_physical_device_properties(physical_device);
                    if properties.api_version < vk::API_VERSION_1_3 {
                        return None;
                    }
                    let families =
                        instance.get_physical_device_queue_family_properties(physical_device);
                    let family = families.iter().enumerate().find_map(|(index, family)| {
                        let index = index as u32;
                        let present = surface_loader
                            .get_physical_device_surface_support(physical_device, index, surface)
                            .unwrap_or(false);
                        (family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && present)
                            .then_some(index)
                    })?;
                    let rank = match properties.device_type {
                        vk::PhysicalDeviceType::DISCRETE_GPU => 0,
                        vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
                        _ => 2,
                    };
                    Some((rank, physical_device, family))
                })
                .collect::<Vec<_>>();

            candidates.sort_by_key(|(rank, _, _)| *rank);
            candidates
                .first()
                .map(|&(_, physical_device, family)| (physical_device, family))
                .ok_or_else(|| {
                    engine_error!("ember::vulkan", "No Vulkan 1.3 adapter can render and present to this window");
                    Error::InitializationFailed("no suitable Vulkan adapter".to_string())
                })
        }
    }

    fn queue_submit(&self, submit: vk::SubmitInfo) -> Result<()> {
        let queue = self
            .ctx
            .queue
            .lock()
            .map_err(|_| Error::BackendError("queue lock poisoned".to_string()))?;
        unsafe {
            self.ctx
                .device
                .queue_submit(*queue, &[submit], vk::Fence::null())
                .map_err(|e| engine_err!("ember::vulkan", "Queue submission failed: {:?}", e))
        }
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(VulkanBuffer::new(self.ctx.clone(), desc)?))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>> {
        if desc.width == 0 || desc.height == 0 || desc.mip_levels == 0 {
            engine_error!(
                "ember::vulkan",
                "Invalid texture {}x{} with {} mips",
                desc.width, desc.height, desc.mip_levels
            );
            return Err(Error::InvalidResource("texture extent and mip count must be non-zero".to_string()));
        }
        Ok(Arc::new(VulkanTexture::new(self.ctx.clone(), desc)?))
    }

    fn copy_alignment(&self) -> CopyAlignment {
        // Rows are addressed in texels, so pitch and offsets stay texel-aligned
        CopyAlignment {
            row_pitch: self.ctx.limits.optimal_buffer_copy_row_pitch_alignment.max(4),
            placement: self.ctx.limits.optimal_buffer_copy_offset_alignment.max(4),
        }
    }

    fn create_descriptor_heap(&self, capacity: u32) -> Result<Arc<dyn DescriptorHeap>> {
        Ok(Arc::new(VulkanDescriptorHeap::new(self.ctx.clone(), capacity)?))
    }

    fn create_texture_view(
        &self,
        heap: &dyn DescriptorHeap,
        handle: CpuDescriptorHandle,
        texture: &dyn Texture,
        desc: &TextureViewDesc,
    ) -> Result<()> {
        let heap = unsafe { &*(heap as *const dyn DescriptorHeap as *const VulkanDescriptorHeap) };
        heap.write_texture_view(handle, vk_texture(texture).image, texture, desc)
    }

    fn create_buffer_view(
        &self,
        heap: &dyn DescriptorHeap,
        handle: CpuDescriptorHandle,
        buffer: &dyn Buffer,
        desc: &BufferViewDesc,
    ) -> Result<()> {
        let heap = unsafe { &*(heap as *const dyn DescriptorHeap as *const VulkanDescriptorHeap) };
        heap.write_buffer_view(handle, vk_buffer(buffer).buffer, buffer, desc)
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        Ok(Arc::new(VulkanPipeline::new(self.ctx.clone(), desc)?))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(VulkanCommandList::new(self.ctx.clone())?))
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<Box<dyn Swapchain>> {
        Ok(Box::new(VulkanSwapchain::new(self.ctx.clone(), desc)?))
    }

    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn Fence>> {
        Ok(Arc::new(VulkanFence::new(self.ctx.clone(), initial_value)?))
    }

    fn execute(&self, commands: &dyn CommandList, swapchain: Option<&dyn Swapchain>) -> Result<()> {
        if commands.is_recording() {
            return Err(engine_err!("ember::vulkan", "execute of a command list still recording"));
        }
        let commands = unsafe { &*(commands as *const dyn CommandList as *const VulkanCommandList) };
        let sync = swapchain.and_then(|swapchain| {
            let swapchain = unsafe { &*(swapchain as *const dyn Swapchain as *const VulkanSwapchain) };
            swapchain.take_present_sync()
        });

        let command_buffers = [commands.command_buffer];
        let wait_semaphores: Vec<vk::Semaphore> = sync.iter().map(|s| s.image_available).collect();
        let wait_stages: Vec<vk::PipelineStageFlags> = sync
            .iter()
            .map(|_| vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .collect();
        let signal_semaphores: Vec<vk::Semaphore> = sync.iter().map(|s| s.render_finished).collect();

        let submit = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        self.queue_submit(submit)
    }

    fn signal(&self, fence: &dyn Fence, value: u64) -> Result<()> {
        let fence = unsafe { &*(fence as *const dyn Fence as *const VulkanFence) };
        let semaphores = [fence.semaphore];
        let values = [value];
        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::default().signal_semaphore_values(&values);
        let submit = vk::SubmitInfo::default()
            .signal_semaphores(&semaphores)
            .push_next(&mut timeline_info);
        self.queue_submit(submit)
    }

    fn wait_idle(&self) -> Result<()> {
        let queue = self
            .ctx
            .queue
            .lock()
            .map_err(|_| Error::BackendError("queue lock poisoned".to_string()))?;
        unsafe {
            self.ctx
                .device
                .queue_wait_idle(*queue)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to wait for the queue: {:?}", e))
        }
    }

    fn adapter_name(&self) -> String {
        self.ctx.adapter_name.clone()
    }
}
