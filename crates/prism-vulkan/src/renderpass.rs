//! Render pass and framebuffer objects.
//!
//! A render pass declares attachment formats, sample counts, load/store ops
//! and final layouts; framebuffers and render pipelines must match that
//! declaration. Mismatches fail at framebuffer creation, not at draw time.

use ash::vk;
use prism_core::desc::RenderPassDescriptor;
use prism_core::error::{GfxError, Result};
use prism_core::types::SampleCount;
use prism_core::TextureFormat;

use crate::convert::{format_to_vk, layout_to_vk, load_store_to_vk, map_vk_result, sample_count_to_vk};
use crate::device::Device;
use crate::texture::TextureView;

/// Declared shape of one color attachment slot.
#[derive(Debug, Clone, Copy)]
struct ColorTargetMeta {
    format: TextureFormat,
    sample_count: SampleCount,
    resolve_format: Option<TextureFormat>,
}

/// Declared shape of the depth/stencil attachment.
#[derive(Debug, Clone, Copy)]
struct DepthTargetMeta {
    format: TextureFormat,
    sample_count: SampleCount,
}

/// Owns a native render pass plus the attachment metadata that drives
/// clear-value ordering and framebuffer validation.
pub struct RenderPass {
    raw: vk::RenderPass,
    color_targets: Vec<ColorTargetMeta>,
    color_has_resolve: Vec<bool>,
    depth_stencil: Option<DepthTargetMeta>,
}

impl RenderPass {
    /// Create a render pass from attachment declarations.
    pub fn new(device: &Device, descriptor: &RenderPassDescriptor) -> Result<Self> {
        if descriptor.color_attachments.is_empty()
            && descriptor.depth_stencil_attachment.is_none()
        {
            return Err(GfxError::InvalidArgument(
                "render pass needs at least one attachment".into(),
            ));
        }

        let mut attachments = Vec::new();
        let mut color_refs = Vec::new();
        let mut resolve_refs = Vec::new();
        let mut color_targets = Vec::new();
        let mut color_has_resolve = Vec::new();

        let mut attachment_index = 0u32;

        for color in descriptor.color_attachments {
            let target = color.target;
            if !target.format.is_color() {
                return Err(GfxError::InvalidArgument(format!(
                    "{:?} is not a color format",
                    target.format
                )));
            }

            let (load_op, store_op) = load_store_to_vk(target.ops);
            let is_msaa = target.sample_count.is_multisampled();

            attachments.push(
                vk::AttachmentDescription::default()
                    .format(format_to_vk(target.format))
                    .samples(sample_count_to_vk(target.sample_count))
                    .load_op(load_op)
                    .store_op(store_op)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(if target.ops.load == prism_core::types::LoadOp::Load {
                        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
                    } else {
                        vk::ImageLayout::UNDEFINED
                    })
                    .final_layout(layout_to_vk(target.final_layout)),
            );
            color_refs.push(
                vk::AttachmentReference::default()
                    .attachment(attachment_index)
                    .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            );
            attachment_index += 1;

            if let Some(resolve) = color.resolve_target {
                if !is_msaa {
                    return Err(GfxError::InvalidArgument(
                        "resolve target declared on a single-sampled attachment".into(),
                    ));
                }
                let (resolve_load, resolve_store) = load_store_to_vk(resolve.ops);
                attachments.push(
                    vk::AttachmentDescription::default()
                        .format(format_to_vk(resolve.format))
                        .samples(vk::SampleCountFlags::TYPE_1)
                        .load_op(resolve_load)
                        .store_op(resolve_store)
                        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                        .initial_layout(if resolve.ops.load == prism_core::types::LoadOp::Load {
                            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
                        } else {
                            vk::ImageLayout::UNDEFINED
                        })
                        .final_layout(layout_to_vk(resolve.final_layout)),
                );
                resolve_refs.push(
                    vk::AttachmentReference::default()
                        .attachment(attachment_index)
                        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
                );
                attachment_index += 1;
                color_has_resolve.push(true);
                color_targets.push(ColorTargetMeta {
                    format: target.format,
                    sample_count: target.sample_count,
                    resolve_format: Some(resolve.format),
                });
            } else {
                if is_msaa {
                    // MSAA without resolve still needs a placeholder slot
                    resolve_refs.push(
                        vk::AttachmentReference::default()
                            .attachment(vk::ATTACHMENT_UNUSED)
                            .layout(vk::ImageLayout::UNDEFINED),
                    );
                }
                color_has_resolve.push(false);
                color_targets.push(ColorTargetMeta {
                    format: target.format,
                    sample_count: target.sample_count,
                    resolve_format: None,
                });
            }
        }

        let mut depth_ref = vk::AttachmentReference::default();
        let mut depth_stencil = None;

        if let Some(depth) = descriptor.depth_stencil_attachment {
            if !depth.format.is_depth() && !depth.format.has_stencil() {
                return Err(GfxError::InvalidArgument(format!(
                    "{:?} is not a depth/stencil format",
                    depth.format
                )));
            }

            let (depth_load, depth_store) = load_store_to_vk(depth.depth_ops);
            let (stencil_load, stencil_store) = load_store_to_vk(depth.stencil_ops);
            let loads_previous = depth.depth_ops.load == prism_core::types::LoadOp::Load
                || depth.stencil_ops.load == prism_core::types::LoadOp::Load;

            attachments.push(
                vk::AttachmentDescription::default()
                    .format(format_to_vk(depth.format))
                    .samples(sample_count_to_vk(depth.sample_count))
                    .load_op(depth_load)
                    .store_op(depth_store)
                    .stencil_load_op(stencil_load)
                    .stencil_store_op(stencil_store)
                    .initial_layout(if loads_previous {
                        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
                    } else {
                        vk::ImageLayout::UNDEFINED
                    })
                    .final_layout(layout_to_vk(depth.final_layout)),
            );
            depth_ref = vk::AttachmentReference::default()
                .attachment(attachment_index)
                .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
            depth_stencil = Some(DepthTargetMeta {
                format: depth.format,
                sample_count: depth.sample_count,
            });
        }

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if !resolve_refs.is_empty() {
            subpass = subpass.resolve_attachments(&resolve_refs);
        }
        if depth_stencil.is_some() {
            subpass = subpass.depth_stencil_attachment(&depth_ref);
        }
        let subpasses = [subpass];

        // External dependency covering whichever attachment kinds exist
        let mut dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .dependency_flags(vk::DependencyFlags::BY_REGION);
        if !color_refs.is_empty() {
            dependency.src_stage_mask |= vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
            dependency.dst_stage_mask |= vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
            dependency.src_access_mask |= vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
            dependency.dst_access_mask |= vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
        }
        if depth_stencil.is_some() {
            dependency.src_stage_mask |= vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
            dependency.dst_stage_mask |= vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
            dependency.src_access_mask |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
            dependency.dst_access_mask |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
        }
        let dependencies = [dependency];

        let mut create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let view_masks;
        let mut multiview_info;
        if let Some(view_mask) = descriptor.view_mask {
            view_masks = [view_mask];
            multiview_info = vk::RenderPassMultiviewCreateInfo::default()
                .view_masks(&view_masks)
                .correlation_masks(descriptor.correlation_masks);
            create_info = create_info.push_next(&mut multiview_info);
        }

        let raw = unsafe { device.raw.create_render_pass(&create_info, None) }
            .map_err(map_vk_result)?;

        Ok(Self {
            raw,
            color_targets,
            color_has_resolve,
            depth_stencil,
        })
    }

    /// Get the raw render pass handle.
    #[must_use]
    pub fn raw(&self) -> vk::RenderPass {
        self.raw
    }

    /// Number of declared color attachments (not counting resolve targets).
    #[must_use]
    pub fn color_attachment_count(&self) -> usize {
        self.color_targets.len()
    }

    /// Which color attachment slots carry a resolve target.
    #[must_use]
    pub fn color_has_resolve(&self) -> &[bool] {
        &self.color_has_resolve
    }

    /// Whether a depth/stencil attachment is declared.
    #[must_use]
    pub fn has_depth_stencil(&self) -> bool {
        self.depth_stencil.is_some()
    }

    /// Destroy the render pass. Framebuffers and pipelines created against
    /// it become invalid.
    ///
    /// # Safety
    /// No pending command buffer may reference this render pass.
    pub unsafe fn destroy(&self, device: &Device) {
        unsafe {
            device.raw.destroy_render_pass(self.raw, None);
        }
    }
}

/// One framebuffer color slot: the view to render into plus the resolve
/// destination when the render pass declares one.
#[derive(Clone, Copy)]
pub struct FramebufferAttachment<'a> {
    pub view: &'a TextureView,
    pub resolve_target: Option<&'a TextureView>,
}

/// Framebuffer creation parameters.
#[derive(Clone, Copy)]
pub struct FramebufferDescriptor<'a> {
    pub label: Option<&'a str>,
    pub render_pass: &'a RenderPass,
    pub color_attachments: &'a [FramebufferAttachment<'a>],
    pub depth_stencil_attachment: Option<&'a TextureView>,
    pub width: u32,
    pub height: u32,
}

/// Owns a native framebuffer bound to one render pass's layout.
///
/// Invalid once its render pass is destroyed. The referenced views are
/// borrowed; they must outlive the framebuffer.
pub struct Framebuffer {
    raw: vk::Framebuffer,
    render_pass: vk::RenderPass,
    width: u32,
    height: u32,
}

impl Framebuffer {
    /// Create a framebuffer, validating every attachment against the render
    /// pass declaration. Shape mismatches fail here, not at draw time.
    pub fn new(device: &Device, descriptor: &FramebufferDescriptor) -> Result<Self> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(GfxError::InvalidArgument("framebuffer extent is zero".into()));
        }

        let pass = descriptor.render_pass;
        if descriptor.color_attachments.len() != pass.color_targets.len() {
            return Err(GfxError::InvalidArgument(format!(
                "{} color attachments supplied, render pass declares {}",
                descriptor.color_attachments.len(),
                pass.color_targets.len()
            )));
        }

        // Views in attachment-description order: color, its resolve, depth
        let mut views = Vec::new();

        for (slot, (attachment, meta)) in descriptor
            .color_attachments
            .iter()
            .zip(&pass.color_targets)
            .enumerate()
        {
            check_attachment_shape(
                slot,
                "color",
                meta.format,
                meta.sample_count,
                attachment.view.format(),
                attachment.view.sample_count(),
            )?;
            views.push(attachment.view.raw());

            match (attachment.resolve_target, meta.resolve_format) {
                (Some(resolve), Some(expected_format)) => {
                    check_attachment_shape(
                        slot,
                        "resolve",
                        expected_format,
                        SampleCount::X1,
                        resolve.format(),
                        resolve.sample_count(),
                    )?;
                    views.push(resolve.raw());
                }
                (None, Some(_)) => {
                    return Err(GfxError::InvalidArgument(format!(
                        "color attachment {slot} declares a resolve target but none was supplied"
                    )));
                }
                (Some(_), None) => {
                    return Err(GfxError::InvalidArgument(format!(
                        "color attachment {slot} does not declare a resolve target"
                    )));
                }
                (None, None) => {}
            }
        }

        match (descriptor.depth_stencil_attachment, &pass.depth_stencil) {
            (Some(view), Some(meta)) => {
                check_attachment_shape(
                    0,
                    "depth/stencil",
                    meta.format,
                    meta.sample_count,
                    view.format(),
                    view.sample_count(),
                )?;
                views.push(view.raw());
            }
            (None, Some(_)) => {
                return Err(GfxError::InvalidArgument(
                    "render pass declares a depth/stencil attachment but none was supplied"
                        .into(),
                ));
            }
            (Some(_), None) => {
                return Err(GfxError::InvalidArgument(
                    "render pass declares no depth/stencil attachment".into(),
                ));
            }
            (None, None) => {}
        }

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(pass.raw)
            .attachments(&views)
            .width(descriptor.width)
            .height(descriptor.height)
            .layers(1);

        let raw = unsafe { device.raw.create_framebuffer(&create_info, None) }
            .map_err(map_vk_result)?;

        if let Some(label) = descriptor.label {
            tracing::trace!(label, "created framebuffer");
        }

        Ok(Self {
            raw,
            render_pass: pass.raw,
            width: descriptor.width,
            height: descriptor.height,
        })
    }

    /// Get the raw framebuffer handle.
    #[must_use]
    pub fn raw(&self) -> vk::Framebuffer {
        self.raw
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether this framebuffer was created against `render_pass`.
    #[must_use]
    pub fn is_compatible_with(&self, render_pass: &RenderPass) -> bool {
        self.render_pass == render_pass.raw
    }

    /// Destroy the framebuffer.
    ///
    /// # Safety
    /// No pending command buffer may reference this framebuffer.
    pub unsafe fn destroy(&self, device: &Device) {
        unsafe {
            device.raw.destroy_framebuffer(self.raw, None);
        }
    }
}

fn check_attachment_shape(
    slot: usize,
    kind: &str,
    expected_format: TextureFormat,
    expected_samples: SampleCount,
    actual_format: TextureFormat,
    actual_samples: SampleCount,
) -> Result<()> {
    if expected_format != actual_format {
        return Err(GfxError::InvalidArgument(format!(
            "{kind} attachment {slot}: view format {actual_format:?} does not match declared {expected_format:?}"
        )));
    }
    if expected_samples != actual_samples {
        return Err(GfxError::InvalidArgument(format!(
            "{kind} attachment {slot}: view sample count {actual_samples:?} does not match declared {expected_samples:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_check_accepts_match() {
        assert!(check_attachment_shape(
            0,
            "color",
            TextureFormat::Bgra8UnormSrgb,
            SampleCount::X4,
            TextureFormat::Bgra8UnormSrgb,
            SampleCount::X4,
        )
        .is_ok());
    }

    #[test]
    fn shape_check_rejects_format_mismatch() {
        let err = check_attachment_shape(
            1,
            "color",
            TextureFormat::Bgra8UnormSrgb,
            SampleCount::X1,
            TextureFormat::Rgba8Unorm,
            SampleCount::X1,
        )
        .unwrap_err();
        assert!(matches!(err, GfxError::InvalidArgument(_)));
    }

    #[test]
    fn shape_check_rejects_sample_mismatch() {
        let err = check_attachment_shape(
            0,
            "depth/stencil",
            TextureFormat::Depth32Float,
            SampleCount::X4,
            TextureFormat::Depth32Float,
            SampleCount::X1,
        )
        .unwrap_err();
        assert!(matches!(err, GfxError::InvalidArgument(_)));
    }
}
