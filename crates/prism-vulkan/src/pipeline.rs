//! Pipeline creation and management.

use std::ffi::CString;

use ash::vk;
use prism_core::desc::{
    ColorTargetState, DepthStencilState, PrimitiveState, VertexBufferLayout,
};
use prism_core::error::{GfxError, Result};
use prism_core::types::SampleCount;

use crate::bind::BindGroupLayout;
use crate::convert::{
    blend_component_to_vk, color_write_mask_to_vk, compare_to_vk, cull_mode_to_vk,
    format_to_vk, front_face_to_vk, map_vk_result, polygon_mode_to_vk, sample_count_to_vk,
    stencil_face_to_vk, step_mode_to_vk, topology_to_vk,
};
use crate::device::Device;
use crate::renderpass::RenderPass;
use crate::shader::Shader;

/// Vertex stage configuration.
#[derive(Clone, Copy)]
pub struct VertexState<'a> {
    pub module: &'a Shader,
    /// Overrides the shader's own entry point when set.
    pub entry_point: Option<&'a str>,
    pub buffers: &'a [VertexBufferLayout<'a>],
}

/// Fragment stage configuration.
#[derive(Clone, Copy)]
pub struct FragmentState<'a> {
    pub module: &'a Shader,
    pub entry_point: Option<&'a str>,
    pub targets: &'a [ColorTargetState],
}

/// Render pipeline creation parameters.
#[derive(Clone, Copy)]
pub struct RenderPipelineDescriptor<'a> {
    pub label: Option<&'a str>,
    /// The render pass this pipeline will draw inside (subpass 0).
    pub render_pass: &'a RenderPass,
    pub vertex: VertexState<'a>,
    /// `None` for depth-only pipelines.
    pub fragment: Option<FragmentState<'a>>,
    pub primitive: PrimitiveState,
    pub depth_stencil: Option<DepthStencilState>,
    pub sample_count: SampleCount,
    pub bind_group_layouts: &'a [&'a BindGroupLayout],
}

/// Compute pipeline creation parameters.
#[derive(Clone, Copy)]
pub struct ComputePipelineDescriptor<'a> {
    pub label: Option<&'a str>,
    pub module: &'a Shader,
    pub entry_point: Option<&'a str>,
    pub bind_group_layouts: &'a [&'a BindGroupLayout],
}

fn entry_point_cstring(override_name: Option<&str>, shader: &Shader) -> Result<CString> {
    let name = override_name.unwrap_or_else(|| shader.entry_point());
    CString::new(name)
        .map_err(|_| GfxError::InvalidArgument("entry point contains NUL".into()))
}

fn create_pipeline_layout(
    device: &Device,
    bind_group_layouts: &[&BindGroupLayout],
) -> Result<vk::PipelineLayout> {
    let set_layouts: Vec<vk::DescriptorSetLayout> = bind_group_layouts
        .iter()
        .map(|layout| layout.raw())
        .collect();
    let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
    unsafe { device.raw.create_pipeline_layout(&layout_info, None) }.map_err(map_vk_result)
}

/// Graphics pipeline bound to exactly one render pass.
pub struct RenderPipeline {
    raw: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl RenderPipeline {
    /// Compile fixed-function and shader-stage state into a native pipeline.
    pub fn new(device: &Device, descriptor: &RenderPipelineDescriptor) -> Result<Self> {
        if let Some(fragment) = &descriptor.fragment {
            if fragment.targets.len() != descriptor.render_pass.color_attachment_count() {
                return Err(GfxError::InvalidArgument(format!(
                    "{} color targets declared, render pass has {} color attachments",
                    fragment.targets.len(),
                    descriptor.render_pass.color_attachment_count()
                )));
            }
        }

        let vertex_entry = entry_point_cstring(descriptor.vertex.entry_point, descriptor.vertex.module)?;
        let fragment_entry = descriptor
            .fragment
            .as_ref()
            .map(|fragment| entry_point_cstring(fragment.entry_point, fragment.module))
            .transpose()?;

        let mut stages = vec![vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(descriptor.vertex.module.raw())
            .name(&vertex_entry)];
        if let (Some(fragment), Some(entry)) = (&descriptor.fragment, &fragment_entry) {
            stages.push(
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(vk::ShaderStageFlags::FRAGMENT)
                    .module(fragment.module.raw())
                    .name(entry),
            );
        }

        // Vertex input
        let mut bindings = Vec::new();
        let mut attributes = Vec::new();
        for (slot, buffer) in descriptor.vertex.buffers.iter().enumerate() {
            bindings.push(
                vk::VertexInputBindingDescription::default()
                    .binding(slot as u32)
                    .stride(buffer.array_stride as u32)
                    .input_rate(step_mode_to_vk(buffer.step_mode)),
            );
            for attribute in buffer.attributes {
                attributes.push(
                    vk::VertexInputAttributeDescription::default()
                        .binding(slot as u32)
                        .location(attribute.shader_location)
                        .format(format_to_vk(attribute.format))
                        .offset(attribute.offset as u32),
                );
            }
        }
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(descriptor.primitive.topology))
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode_to_vk(descriptor.primitive.polygon_mode))
            .cull_mode(cull_mode_to_vk(descriptor.primitive.cull_mode))
            .front_face(front_face_to_vk(descriptor.primitive.front_face))
            .depth_bias_enable(
                descriptor
                    .depth_stencil
                    .is_some_and(|state| state.depth_bias != 0),
            )
            .depth_bias_constant_factor(
                descriptor
                    .depth_stencil
                    .map_or(0.0, |state| state.depth_bias as f32),
            )
            .depth_bias_slope_factor(
                descriptor
                    .depth_stencil
                    .map_or(0.0, |state| state.depth_bias_slope_scale),
            )
            .depth_bias_clamp(
                descriptor
                    .depth_stencil
                    .map_or(0.0, |state| state.depth_bias_clamp),
            )
            .line_width(1.0);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(sample_count_to_vk(descriptor.sample_count))
            .sample_shading_enable(false);

        let depth_stencil_state = descriptor.depth_stencil.map_or_else(
            vk::PipelineDepthStencilStateCreateInfo::default,
            |state| {
                vk::PipelineDepthStencilStateCreateInfo::default()
                    .depth_test_enable(true)
                    .depth_write_enable(state.depth_write_enabled)
                    .depth_compare_op(compare_to_vk(state.depth_compare))
                    .depth_bounds_test_enable(false)
                    .stencil_test_enable(
                        state.format.has_stencil()
                            && (state.stencil_read_mask != 0 || state.stencil_write_mask != 0),
                    )
                    .front(stencil_face_to_vk(
                        state.stencil_front,
                        state.stencil_read_mask,
                        state.stencil_write_mask,
                    ))
                    .back(stencil_face_to_vk(
                        state.stencil_back,
                        state.stencil_read_mask,
                        state.stencil_write_mask,
                    ))
            },
        );

        let color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = descriptor
            .fragment
            .as_ref()
            .map(|fragment| {
                fragment
                    .targets
                    .iter()
                    .map(|target| {
                        let mut attachment = vk::PipelineColorBlendAttachmentState::default()
                            .color_write_mask(color_write_mask_to_vk(target.write_mask));
                        if let Some(blend) = target.blend {
                            let (src_color, dst_color, color_op) =
                                blend_component_to_vk(blend.color);
                            let (src_alpha, dst_alpha, alpha_op) =
                                blend_component_to_vk(blend.alpha);
                            attachment = attachment
                                .blend_enable(true)
                                .src_color_blend_factor(src_color)
                                .dst_color_blend_factor(dst_color)
                                .color_blend_op(color_op)
                                .src_alpha_blend_factor(src_alpha)
                                .dst_alpha_blend_factor(dst_alpha)
                                .alpha_blend_op(alpha_op);
                        }
                        attachment
                    })
                    .collect()
            })
            .unwrap_or_default();

        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let layout = create_pipeline_layout(device, descriptor.bind_group_layouts)?;

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(descriptor.render_pass.raw())
            .subpass(0);

        let pipelines = unsafe {
            device.raw.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_info],
                None,
            )
        };

        match pipelines {
            Ok(pipelines) => {
                if let Some(label) = descriptor.label {
                    tracing::trace!(label, "created render pipeline");
                }
                Ok(Self {
                    raw: pipelines[0],
                    layout,
                })
            }
            Err((_, e)) => {
                // No leaked layout on the failure path
                unsafe { device.raw.destroy_pipeline_layout(layout, None) };
                Err(map_vk_result(e))
            }
        }
    }

    /// Get the raw pipeline handle.
    #[must_use]
    pub fn raw(&self) -> vk::Pipeline {
        self.raw
    }

    pub(crate) fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Destroy the pipeline and its layout.
    ///
    /// # Safety
    /// No pending command buffer may reference this pipeline.
    pub unsafe fn destroy(&self, device: &Device) {
        unsafe {
            device.raw.destroy_pipeline(self.raw, None);
            device.raw.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Compute pipeline; needs only bind group layouts, no render pass.
pub struct ComputePipeline {
    raw: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl ComputePipeline {
    /// Create a compute pipeline from a shader module.
    pub fn new(device: &Device, descriptor: &ComputePipelineDescriptor) -> Result<Self> {
        let entry = entry_point_cstring(descriptor.entry_point, descriptor.module)?;

        let layout = create_pipeline_layout(device, descriptor.bind_group_layouts)?;

        let stage_info = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(descriptor.module.raw())
            .name(&entry);

        let pipeline_info = vk::ComputePipelineCreateInfo::default()
            .stage(stage_info)
            .layout(layout);

        let pipelines = unsafe {
            device.raw.create_compute_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_info],
                None,
            )
        };

        match pipelines {
            Ok(pipelines) => {
                if let Some(label) = descriptor.label {
                    tracing::trace!(label, "created compute pipeline");
                }
                Ok(Self {
                    raw: pipelines[0],
                    layout,
                })
            }
            Err((_, e)) => {
                unsafe { device.raw.destroy_pipeline_layout(layout, None) };
                Err(map_vk_result(e))
            }
        }
    }

    /// Get the raw pipeline handle.
    #[must_use]
    pub fn raw(&self) -> vk::Pipeline {
        self.raw
    }

    pub(crate) fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Destroy the pipeline and its layout.
    ///
    /// # Safety
    /// No pending command buffer may reference this pipeline.
    pub unsafe fn destroy(&self, device: &Device) {
        unsafe {
            device.raw.destroy_pipeline(self.raw, None);
            device.raw.destroy_pipeline_layout(self.layout, None);
        }
    }
}
