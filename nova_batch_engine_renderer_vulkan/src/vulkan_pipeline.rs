/// Pipeline state construction for the six shader slots
///
/// Pipeline state is a function of {pass type, alpha flag, target kind}:
/// shadow slots render depth-only with dynamic depth bias, alpha slots
/// blend into the preserved final target, everything else fills the scene
/// target. Each pipeline is built once per shader, the first time its slot
/// is needed.

use ash::vk;
use std::ffi::CStr;

use nova_batch_engine::effect::ShaderSlot;
use nova_batch_engine::error::Result;
use nova_batch_engine::engine_err;

use crate::vulkan_format::{vertex_attributes, vertex_binding};
use crate::vulkan_shader::VulkanShaderProgram;

/// Which frame target a pipeline renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Depth-only target (shadow maps)
    DepthOnly,
    /// Scene target (G-buffer when present, default otherwise)
    Scene,
    /// Preserved-attachment final target (alpha blending)
    Final,
}

/// Fixed-function profile of one shader slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSpec {
    /// Target the pipeline renders into
    pub target: TargetKind,
    /// Whether color blending is enabled
    pub blend: bool,
    /// Whether depth bias is enabled (with dynamic bias values)
    pub depth_bias: bool,
}

/// Fixed-function profile for a shader slot
pub fn pipeline_spec(slot: ShaderSlot) -> PipelineSpec {
    if slot.is_shadow() {
        PipelineSpec {
            target: TargetKind::DepthOnly,
            blend: false,
            depth_bias: true,
        }
    } else if slot.has_alpha() {
        PipelineSpec {
            target: TargetKind::Final,
            blend: true,
            depth_bias: false,
        }
    } else {
        PipelineSpec {
            target: TargetKind::Scene,
            blend: false,
            depth_bias: false,
        }
    }
}

/// A built pipeline state object with its layout
pub struct BuiltPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

impl BuiltPipeline {
    /// Destroy pipeline and layout
    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Build the pipeline state object for one shader slot.
///
/// # Arguments
///
/// * `device` - Vulkan logical device
/// * `shader` - Program whose modules the pipeline uses
/// * `spec` - Fixed-function profile of the slot
/// * `descriptor_layout` - The program's descriptor set layout
/// * `render_pass` - Render pass of the resolved frame target
/// * `color_attachment_count` - Color attachments of that target (0 for
///   depth-only)
pub fn build_pipeline(
    device: &ash::Device,
    shader: &VulkanShaderProgram,
    spec: PipelineSpec,
    descriptor_layout: vk::DescriptorSetLayout,
    render_pass: vk::RenderPass,
    color_attachment_count: u32,
) -> Result<BuiltPipeline> {
    unsafe {
        let entry_point = CStr::from_bytes_with_nul(b"main\0")
            .map_err(|_| engine_err!("nova::vulkan", "invalid shader entry point"))?;

        let mut shader_stages = vec![vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(shader.vertex_module)
            .name(entry_point)];
        if let Some(fragment_module) = shader.fragment_module {
            shader_stages.push(
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(vk::ShaderStageFlags::FRAGMENT)
                    .module(fragment_module)
                    .name(entry_point),
            );
        }

        // Vertex input state (shared vertex store layout)
        let bindings = [vertex_binding()];
        let attributes = vertex_attributes();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        // Input assembly state
        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport state (dynamic)
        let viewports = [vk::Viewport::default()];
        let scissors = [vk::Rect2D::default()];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        // Rasterization state
        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            // shadow pipelines use vkCmdSetDepthBias, so only the enable
            // bit is baked in
            .depth_bias_enable(spec.depth_bias);

        // Depth/stencil state
        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        // Multisample state
        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        // Color blend state: one attachment state per target attachment,
        // none at all for depth-only targets
        let blend_attachment = {
            let mut attachment = vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(spec.blend);
            if spec.blend {
                attachment = attachment
                    .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                    .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                    .color_blend_op(vk::BlendOp::ADD)
                    .src_alpha_blend_factor(vk::BlendFactor::ONE)
                    .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                    .alpha_blend_op(vk::BlendOp::ADD);
            }
            attachment
        };
        let blend_attachments =
            vec![blend_attachment; color_attachment_count as usize];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        // Dynamic state: viewport/scissor always; depth bias for shadows
        let mut dynamic_states = vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        if spec.depth_bias {
            dynamic_states.push(vk::DynamicState::DEPTH_BIAS);
        }
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        // Pipeline layout: the program's single descriptor set
        let set_layouts = [descriptor_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);

        let layout = device
            .create_pipeline_layout(&layout_info, None)
            .map_err(|e| engine_err!("nova::vulkan", "Failed to create pipeline layout: {:?}", e))?;

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
            .map_err(|e| {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                engine_err!("nova::vulkan", "Failed to create graphics pipeline: {:?}", e.1)
            })?;

        Ok(BuiltPipeline {
            pipeline: pipelines[0],
            layout,
        })
    }
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
