//! The fixed lookup table behind texture layout transitions.
//!
//! A texture's layout is host-tracked state; every transition derives its
//! pipeline-stage and access masks from the (old, new) layout pair here
//! rather than from per-call-site reasoning.

use ash::vk;
use prism_core::flags::AccessFlags;
use prism_core::types::TextureLayout;

use crate::convert::access_flags_to_vk;

/// Pipeline stage that must complete before leaving `layout`.
pub(crate) fn src_stage_for_layout(layout: TextureLayout) -> vk::PipelineStageFlags {
    match layout {
        TextureLayout::Undefined => vk::PipelineStageFlags::TOP_OF_PIPE,
        TextureLayout::TransferSrc | TextureLayout::TransferDst => {
            vk::PipelineStageFlags::TRANSFER
        }
        TextureLayout::ColorAttachment => vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        TextureLayout::DepthStencilAttachment | TextureLayout::DepthStencilReadOnly => {
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
        }
        TextureLayout::ShaderReadOnly => vk::PipelineStageFlags::FRAGMENT_SHADER,
        TextureLayout::PresentSrc => vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        TextureLayout::General => vk::PipelineStageFlags::ALL_COMMANDS,
    }
}

/// Pipeline stage that must wait before entering `layout`.
pub(crate) fn dst_stage_for_layout(layout: TextureLayout) -> vk::PipelineStageFlags {
    match layout {
        TextureLayout::TransferSrc | TextureLayout::TransferDst => {
            vk::PipelineStageFlags::TRANSFER
        }
        TextureLayout::ColorAttachment => vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        TextureLayout::DepthStencilAttachment | TextureLayout::DepthStencilReadOnly => {
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
        }
        TextureLayout::ShaderReadOnly => vk::PipelineStageFlags::FRAGMENT_SHADER,
        TextureLayout::PresentSrc => vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        TextureLayout::Undefined | TextureLayout::General => vk::PipelineStageFlags::ALL_COMMANDS,
    }
}

/// Stage and access masks for an (old, new) layout transition.
pub(crate) fn transition_masks(
    old: TextureLayout,
    new: TextureLayout,
) -> (
    vk::PipelineStageFlags,
    vk::PipelineStageFlags,
    vk::AccessFlags,
    vk::AccessFlags,
) {
    (
        src_stage_for_layout(old),
        dst_stage_for_layout(new),
        access_flags_to_vk(AccessFlags::for_layout(old)),
        access_flags_to_vk(AccessFlags::for_layout(new)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_to_transfer_dst() {
        let (src_stage, dst_stage, src_access, dst_access) =
            transition_masks(TextureLayout::Undefined, TextureLayout::TransferDst);
        assert_eq!(src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(dst_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(src_access, vk::AccessFlags::empty());
        assert_eq!(dst_access, vk::AccessFlags::TRANSFER_WRITE);
    }

    #[test]
    fn color_attachment_to_transfer_src() {
        let (src_stage, dst_stage, src_access, dst_access) =
            transition_masks(TextureLayout::ColorAttachment, TextureLayout::TransferSrc);
        assert_eq!(src_stage, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(dst_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(
            src_access,
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
        );
        assert_eq!(dst_access, vk::AccessFlags::TRANSFER_READ);
    }

    #[test]
    fn transfer_dst_to_shader_read() {
        let (src_stage, dst_stage, src_access, dst_access) =
            transition_masks(TextureLayout::TransferDst, TextureLayout::ShaderReadOnly);
        assert_eq!(src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
        assert_eq!(src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(dst_access, vk::AccessFlags::SHADER_READ);
    }

    #[test]
    fn present_transitions_use_pipe_extremes() {
        let (src_stage, _, _, _) =
            transition_masks(TextureLayout::PresentSrc, TextureLayout::ColorAttachment);
        assert_eq!(src_stage, vk::PipelineStageFlags::BOTTOM_OF_PIPE);
        let (_, dst_stage, _, _) =
            transition_masks(TextureLayout::ColorAttachment, TextureLayout::PresentSrc);
        assert_eq!(dst_stage, vk::PipelineStageFlags::BOTTOM_OF_PIPE);
    }
}
