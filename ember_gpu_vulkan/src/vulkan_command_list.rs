/// CommandList - Vulkan command buffer with its own pool

use ash::vk;
use ember_gpu::ember::render::{
    Buffer, CommandList, DescriptorHeap, GpuDescriptorHandle, IndexType, Pipeline, Rect2D,
    RenderingDesc, ResourceBarrier, SubresourceFootprint, Texture, Viewport,
};
use ember_gpu::ember::{Error, Result};
use ember_gpu::{engine_err, engine_error};
use std::sync::Arc;

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::{GpuContext, PUSH_CONSTANT_SIZE};
use crate::vulkan_descriptor_heap::VulkanDescriptorHeap;
use crate::vulkan_format::{index_type_to_vk, source_layout, state_sync};
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_texture::{full_range, VulkanTexture};

/// Attachments of the rendering scope currently open
#[derive(Clone, Copy)]
struct ActiveRendering {
    color_view: vk::ImageView,
    depth_view: Option<vk::ImageView>,
    extent: vk::Extent2D,
}

/// Vulkan command list
///
/// Push constants form one `PUSH_CONSTANT_SIZE`-byte block: descriptor tables
/// occupy one `u32` slot index each at `root_index * 4`, and root constants
/// are written at their own byte offset inside the same block.
///
/// Copies and barriers are not allowed inside dynamic rendering, so they
/// suspend the open rendering scope and resume it afterwards with its
/// attachments loaded.
pub struct VulkanCommandList {
    ctx: Arc<GpuContext>,
    pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
    recording: bool,
    rendering: Option<ActiveRendering>,
}

// Every resource reaching this backend was created by `VulkanGraphicsDevice`
pub(crate) fn vk_texture(texture: &dyn Texture) -> &VulkanTexture {
    unsafe { &*(texture as *const dyn Texture as *const VulkanTexture) }
}

pub(crate) fn vk_buffer(buffer: &dyn Buffer) -> &VulkanBuffer {
    unsafe { &*(buffer as *const dyn Buffer as *const VulkanBuffer) }
}

impl VulkanCommandList {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let pool = ctx.device.create_command_pool(&pool_info, None).map_err(|e| {
                engine_error!("ember::vulkan", "Failed to create command pool: {:?}", e);
                Error::BackendError(format!("command pool: {:?}", e))
            })?;

            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = match ctx.device.allocate_command_buffers(&alloc_info) {
                Ok(buffers) => buffers[0],
                Err(e) => {
                    ctx.device.destroy_command_pool(pool, None);
                    engine_error!("ember::vulkan", "Failed to allocate command buffer: {:?}", e);
                    return Err(Error::BackendError(format!("command buffer: {:?}", e)));
                }
            };

            Ok(Self {
                ctx,
                pool,
                command_buffer,
                recording: false,
                rendering: None,
            })
        }
    }

    fn ensure_recording(&self, what: &str) -> Result<()> {
        if self.recording {
            Ok(())
        } else {
            Err(engine_err!("ember::vulkan", "{} recorded on a closed command list", what))
        }
    }

    fn start_rendering(&self, active: &ActiveRendering, clear_color: Option<[f32; 4]>, clear_depth: Option<f32>) {
        let color_attachments = [vk::RenderingAttachmentInfo::default()
            .image_view(active.color_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(if clear_color.is_some() {
                vk::AttachmentLoadOp::CLEAR
            } else {
                vk::AttachmentLoadOp::LOAD
            })
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue { float32: clear_color.unwrap_or([0.0; 4]) },
            })];

        let depth_attachment = active.depth_view.map(|view| {
            vk::RenderingAttachmentInfo::default()
                .image_view(view)
                .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .load_op(if clear_depth.is_some() {
                    vk::AttachmentLoadOp::CLEAR
                } else {
                    vk::AttachmentLoadOp::LOAD
                })
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: clear_depth.unwrap_or(1.0),
                        stencil: 0,
                    },
                })
        });

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: active.extent })
            .layer_count(1)
            .color_attachments(&color_attachments);
        if let Some(depth) = depth_attachment.as_ref() {
            rendering_info = rendering_info.depth_attachment(depth);
        }

        unsafe {
            self.ctx.device.cmd_begin_rendering(self.command_buffer, &rendering_info);
        }
    }

    /// Close the open rendering scope, if any, and return it for `resume_rendering`
    fn suspend_rendering(&mut self) -> Option<ActiveRendering> {
        let active = self.rendering.take()?;
        unsafe { self.ctx.device.cmd_end_rendering(self.command_buffer) };
        Some(active)
    }

    fn resume_rendering(&mut self, active: Option<ActiveRendering>) {
        if let Some(active) = active {
            self.start_rendering(&active, None, None);
            self.rendering = Some(active);
        }
    }

    fn barrier(&self, barrier: &ResourceBarrier) {
        let texture = vk_texture(barrier.resource);
        let src = state_sync(barrier.before);
        let dst = state_sync(barrier.after);
        let image_barrier = vk::ImageMemoryBarrier::default()
            .old_layout(source_layout(barrier.before))
            .new_layout(dst.layout)
            .src_access_mask(src.access)
            .dst_access_mask(dst.access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(texture.image)
            .subresource_range(full_range(texture.aspect(), texture.info().mip_levels));

        // Presenting has no later stage on this queue
        let dst_stage = if dst.access.is_empty() {
            vk::PipelineStageFlags::BOTTOM_OF_PIPE
        } else {
            dst.stage
        };

        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                self.command_buffer,
                src.stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[image_barrier],
            );
        }
    }
}

impl CommandList for VulkanCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.recording {
            return Err(engine_err!("ember::vulkan", "Command list already recording"));
        }

        unsafe {
            self.ctx
                .device
                .reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())
                .map_err(|e| engine_err!("ember::vulkan", "Failed to reset command pool: {:?}", e))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.ctx
                .device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to begin command buffer: {:?}", e))?;
        }

        self.recording = true;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.ensure_recording("end")?;
        if self.rendering.is_some() {
            return Err(engine_err!("ember::vulkan", "Command list closed inside a rendering scope"));
        }

        unsafe {
            self.ctx
                .device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to end command buffer: {:?}", e))?;
        }

        self.recording = false;
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn resource_barrier(&mut self, barrier: &ResourceBarrier) -> Result<()> {
        self.ensure_recording("barrier")?;
        let suspended = self.suspend_rendering();
        self.barrier(barrier);
        self.resume_rendering(suspended);
        Ok(())
    }

    fn begin_rendering(&mut self, desc: &RenderingDesc) -> Result<()> {
        self.ensure_recording("begin_rendering")?;
        if self.rendering.is_some() {
            return Err(engine_err!("ember::vulkan", "Rendering scope already open"));
        }

        let color = vk_texture(desc.color);
        let info = color.info();
        let active = ActiveRendering {
            color_view: color.view,
            depth_view: desc.depth.map(|depth| vk_texture(depth).view),
            extent: vk::Extent2D { width: info.width, height: info.height },
        };
        self.start_rendering(&active, desc.clear_color, desc.clear_depth);
        self.rendering = Some(active);
        Ok(())
    }

    fn end_rendering(&mut self) -> Result<()> {
        self.ensure_recording("end_rendering")?;
        if self.suspend_rendering().is_none() {
            return Err(engine_err!("ember::vulkan", "end_rendering without an open rendering scope"));
        }
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.ensure_recording("set_viewport")?;
        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.ensure_recording("set_scissor")?;
        let rect = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe {
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[rect]);
        }
        Ok(())
    }

    fn copy_buffer_to_texture(
        &mut self,
        src: &dyn Buffer,
        dst: &dyn Texture,
        footprints: &[SubresourceFootprint],
    ) -> Result<()> {
        self.ensure_recording("copy_buffer_to_texture")?;
        let bpp = dst.info().format.bytes_per_pixel() as u64;
        let regions: Vec<vk::BufferImageCopy> = footprints
            .iter()
            .map(|fp| vk::BufferImageCopy {
                buffer_offset: fp.offset,
                buffer_row_length: (fp.row_pitch / bpp) as u32,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: fp.mip,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
                image_extent: vk::Extent3D { width: fp.width, height: fp.height, depth: 1 },
            })
            .collect();

        let suspended = self.suspend_rendering();
        unsafe {
            self.ctx.device.cmd_copy_buffer_to_image(
                self.command_buffer,
                vk_buffer(src).buffer,
                vk_texture(dst).image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            );
        }
        self.resume_rendering(suspended);
        Ok(())
    }

    fn set_descriptor_heap(&mut self, heap: &dyn DescriptorHeap) -> Result<()> {
        self.ensure_recording("set_descriptor_heap")?;
        let heap = unsafe { &*(heap as *const dyn DescriptorHeap as *const VulkanDescriptorHeap) };
        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.ctx.pipeline_layout,
                0,
                &[heap.set],
                &[],
            );
        }
        Ok(())
    }

    fn set_descriptor_table(&mut self, root_index: u32, handle: GpuDescriptorHandle) -> Result<()> {
        let slot = u32::try_from(handle.ptr)
            .map_err(|_| engine_err!("ember::vulkan", "GPU handle {:#x} is not a slot index", handle.ptr))?;
        self.set_root_constants(root_index * 4, &slot.to_ne_bytes())
    }

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()> {
        self.ensure_recording("bind_pipeline")?;
        let pipeline = unsafe { &*(pipeline as *const dyn Pipeline as *const VulkanPipeline) };
        unsafe {
            self.ctx.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.pipeline,
            );
        }
        Ok(())
    }

    fn set_root_constants(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        self.ensure_recording("set_root_constants")?;
        if offset % 4 != 0 || data.len() % 4 != 0 || offset as usize + data.len() > PUSH_CONSTANT_SIZE as usize {
            return Err(engine_err!(
                "ember::vulkan",
                "Root constants [{}, {}) outside the {}-byte block or unaligned",
                offset,
                offset as usize + data.len(),
                PUSH_CONSTANT_SIZE
            ));
        }
        unsafe {
            self.ctx.device.cmd_push_constants(
                self.command_buffer,
                self.ctx.pipeline_layout,
                vk::ShaderStageFlags::ALL_GRAPHICS,
                offset,
                data,
            );
        }
        Ok(())
    }

    fn set_vertex_buffer(&mut self, buffer: &dyn Buffer, offset: u64) -> Result<()> {
        self.ensure_recording("set_vertex_buffer")?;
        unsafe {
            self.ctx.device.cmd_bind_vertex_buffers(
                self.command_buffer,
                0,
                &[vk_buffer(buffer).buffer],
                &[offset],
            );
        }
        Ok(())
    }

    fn set_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64, index_type: IndexType) -> Result<()> {
        self.ensure_recording("set_index_buffer")?;
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(
                self.command_buffer,
                vk_buffer(buffer).buffer,
                offset,
                index_type_to_vk(index_type),
            );
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.ensure_recording("draw")?;
        unsafe {
            self.ctx.device.cmd_draw(self.command_buffer, vertex_count, 1, first_vertex, 0);
        }
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.ensure_recording("draw_indexed")?;
        unsafe {
            self.ctx.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                1,
                first_index,
                vertex_offset,
                0,
            );
        }
        Ok(())
    }
}

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        unsafe {
            // Frees the command buffer with it
            self.ctx.device.destroy_command_pool(self.pool, None);
        }
    }
}
