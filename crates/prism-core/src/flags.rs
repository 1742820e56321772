//! Usage, stage, and access flags.

use bitflags::bitflags;

use crate::types::TextureLayout;

bitflags! {
    /// Allowed uses of a buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsages: u32 {
        const MAP_READ = 1 << 0;
        const MAP_WRITE = 1 << 1;
        const COPY_SRC = 1 << 2;
        const COPY_DST = 1 << 3;
        const INDEX = 1 << 4;
        const VERTEX = 1 << 5;
        const UNIFORM = 1 << 6;
        const STORAGE = 1 << 7;
        const INDIRECT = 1 << 8;
    }
}

bitflags! {
    /// Allowed uses of a texture.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsages: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const TEXTURE_BINDING = 1 << 2;
        const STORAGE_BINDING = 1 << 3;
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

bitflags! {
    /// Requested properties of a resource's backing memory.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemoryProperties: u32 {
        const DEVICE_LOCAL = 1 << 0;
        const HOST_VISIBLE = 1 << 1;
        const HOST_COHERENT = 1 << 2;
        const HOST_CACHED = 1 << 3;
    }
}

bitflags! {
    /// Shader stages a binding is visible to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
    }
}

bitflags! {
    /// Capabilities of a queue family.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct QueueFlags: u32 {
        const GRAPHICS = 1 << 0;
        const COMPUTE = 1 << 1;
        const TRANSFER = 1 << 2;
        const SPARSE_BINDING = 1 << 3;
    }
}

bitflags! {
    /// Pipeline stages for barrier scoping.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE = 0x0000_0001;
        const DRAW_INDIRECT = 0x0000_0002;
        const VERTEX_INPUT = 0x0000_0004;
        const VERTEX_SHADER = 0x0000_0008;
        const TESSELLATION_CONTROL_SHADER = 0x0000_0010;
        const TESSELLATION_EVALUATION_SHADER = 0x0000_0020;
        const GEOMETRY_SHADER = 0x0000_0040;
        const FRAGMENT_SHADER = 0x0000_0080;
        const EARLY_FRAGMENT_TESTS = 0x0000_0100;
        const LATE_FRAGMENT_TESTS = 0x0000_0200;
        const COLOR_ATTACHMENT_OUTPUT = 0x0000_0400;
        const COMPUTE_SHADER = 0x0000_0800;
        const TRANSFER = 0x0000_1000;
        const BOTTOM_OF_PIPE = 0x0000_2000;
        const ALL_GRAPHICS = 0x0000_FFFF;
        const ALL_COMMANDS = 0x0001_0000;
    }
}

bitflags! {
    /// Memory access kinds for barrier scoping.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u32 {
        const INDIRECT_COMMAND_READ = 1 << 0;
        const INDEX_READ = 1 << 1;
        const VERTEX_ATTRIBUTE_READ = 1 << 2;
        const UNIFORM_READ = 1 << 3;
        const INPUT_ATTACHMENT_READ = 1 << 4;
        const SHADER_READ = 1 << 5;
        const SHADER_WRITE = 1 << 6;
        const COLOR_ATTACHMENT_READ = 1 << 7;
        const COLOR_ATTACHMENT_WRITE = 1 << 8;
        const DEPTH_STENCIL_ATTACHMENT_READ = 1 << 9;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 10;
        const TRANSFER_READ = 1 << 11;
        const TRANSFER_WRITE = 1 << 12;
        const MEMORY_READ = 1 << 14;
        const MEMORY_WRITE = 1 << 15;
    }
}

impl AccessFlags {
    /// The deterministic access mask implied by a texture layout.
    ///
    /// Used when building layout-transition barriers; both sides of a
    /// transition derive their access mask from their layout.
    #[must_use]
    pub const fn for_layout(layout: TextureLayout) -> Self {
        match layout {
            TextureLayout::Undefined => Self::empty(),
            TextureLayout::General => Self::MEMORY_READ.union(Self::MEMORY_WRITE),
            TextureLayout::ColorAttachment => {
                Self::COLOR_ATTACHMENT_READ.union(Self::COLOR_ATTACHMENT_WRITE)
            }
            TextureLayout::DepthStencilAttachment => Self::DEPTH_STENCIL_ATTACHMENT_READ
                .union(Self::DEPTH_STENCIL_ATTACHMENT_WRITE),
            TextureLayout::DepthStencilReadOnly => Self::DEPTH_STENCIL_ATTACHMENT_READ,
            TextureLayout::ShaderReadOnly => Self::SHADER_READ,
            TextureLayout::TransferSrc => Self::TRANSFER_READ,
            TextureLayout::TransferDst => Self::TRANSFER_WRITE,
            TextureLayout::PresentSrc => Self::MEMORY_READ,
        }
    }
}

bitflags! {
    /// Which color channels a pipeline writes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWriteMask: u32 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
    }
}

impl ColorWriteMask {
    pub const ALL: Self = Self::all();
}

impl Default for ColorWriteMask {
    fn default() -> Self {
        Self::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_for_layout_table() {
        assert_eq!(
            AccessFlags::for_layout(TextureLayout::Undefined),
            AccessFlags::empty()
        );
        assert_eq!(
            AccessFlags::for_layout(TextureLayout::TransferSrc),
            AccessFlags::TRANSFER_READ
        );
        assert_eq!(
            AccessFlags::for_layout(TextureLayout::TransferDst),
            AccessFlags::TRANSFER_WRITE
        );
        assert_eq!(
            AccessFlags::for_layout(TextureLayout::ColorAttachment),
            AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE
        );
        assert_eq!(
            AccessFlags::for_layout(TextureLayout::ShaderReadOnly),
            AccessFlags::SHADER_READ
        );
    }

    #[test]
    fn write_mask_default_is_all_channels() {
        let mask = ColorWriteMask::default();
        assert!(mask.contains(ColorWriteMask::RED | ColorWriteMask::ALPHA));
    }
}
