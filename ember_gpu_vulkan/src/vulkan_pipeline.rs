/// Pipeline - graphics pipeline built for dynamic rendering

use ash::vk;
use ember_gpu::ember::render::{Pipeline, PipelineDesc};
use ember_gpu::ember::{Error, Result};
use ember_gpu::{engine_err, engine_error};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    blend_attachment, cull_mode_to_vk, texture_format_to_vk, topology_to_vk, vertex_format_to_vk,
};

/// Vulkan graphics pipeline
///
/// Uses the context's shared pipeline layout, so the view table and push
/// constants stay bound across pipeline changes.
pub struct VulkanPipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
}

impl Pipeline for VulkanPipeline {}

impl VulkanPipeline {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &PipelineDesc) -> Result<Self> {
        if desc.vertex_shader.is_empty() || desc.fragment_shader.is_empty() {
            engine_error!("ember::vulkan", "Pipeline needs both a vertex and a fragment shader");
            return Err(Error::InvalidResource("missing shader code".to_string()));
        }

        unsafe {
            let vertex_module = create_shader_module(&ctx.device, &desc.vertex_shader)?;
            let fragment_module = match create_shader_module(&ctx.device, &desc.fragment_shader) {
                Ok(module) => module,
                Err(e) => {
                    ctx.device.destroy_shader_module(vertex_module, None);
                    return Err(e);
                }
            };

            let result = Self::build(&ctx, desc, vertex_module, fragment_module);

            ctx.device.destroy_shader_module(vertex_module, None);
            ctx.device.destroy_shader_module(fragment_module, None);

            let pipeline = result?;
            Ok(Self { ctx, pipeline })
        }
    }

    unsafe fn build(
        ctx: &GpuContext,
        desc: &PipelineDesc,
        vertex_module: vk::ShaderModule,
        fragment_module: vk::ShaderModule,
    ) -> Result<vk::Pipeline> {
        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_module)
                .name(c"main"),
        ];

        let bindings: Vec<vk::VertexInputBindingDescription> = if desc.vertex_stride > 0 {
            vec![vk::VertexInputBindingDescription {
                binding: 0,
                stride: desc.vertex_stride,
                input_rate: vk::VertexInputRate::VERTEX,
            }]
        } else {
            Vec::new()
        };
        let attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .attributes
            .iter()
            .map(|attr| vk::VertexInputAttributeDescription {
                location: attr.location,
                binding: 0,
                format: vertex_format_to_vk(attr.format),
                offset: attr.offset,
            })
            .collect();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology));

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(cull_mode_to_vk(desc.cull_mode))
            .front_face(vk::FrontFace::CLOCKWISE)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_write)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL);

        let blend_attachments = [blend_attachment(desc.blend)];
        let color_blend =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = [texture_format_to_vk(desc.color_format)];
        let depth_format = desc
            .depth_format
            .map(texture_format_to_vk)
            .unwrap_or(vk::Format::UNDEFINED);
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(depth_format);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(ctx.pipeline_layout)
            .push_next(&mut rendering_info);

        unsafe {
            ctx.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map(|pipelines| pipelines[0])
                .map_err(|(_, e)| engine_err!("ember::vulkan", "Failed to create graphics pipeline: {:?}", e))
        }
    }
}

unsafe fn create_shader_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::default().code(code);
    unsafe {
        device
            .create_shader_module(&create_info, None)
            .map_err(|e| engine_err!("ember::vulkan", "Failed to create shader module: {:?}", e))
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
        }
    }
}
