//! Backend-agnostic types for the Prism GPU abstraction.
//!
//! This crate provides the data model shared by every backend:
//! - The closed result/error taxonomy
//! - Texture formats and layout states
//! - Usage, stage, and access flags
//! - Plain-data descriptors for resource creation
//!
//! No native API types appear in this crate's public surface; backends
//! translate these types into their own representations.

pub mod desc;
pub mod error;
pub mod flags;
pub mod format;
pub mod info;
pub mod types;

pub use error::{GfxError, Result};
pub use flags::{
    AccessFlags, BufferUsages, ColorWriteMask, MemoryProperties, PipelineStages, QueueFlags,
    ShaderStages, TextureUsages,
};
pub use format::TextureFormat;
pub use types::{
    Color, Extent3d, Origin3d, SampleCount, TextureLayout, TIMEOUT_INFINITE, WHOLE_SIZE,
};

/// Align `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
#[must_use]
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

/// Align `value` down to the previous multiple of `alignment`.
///
/// `alignment` must be a power of two.
#[must_use]
pub const fn align_down(value: u64, alignment: u64) -> u64 {
    value & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_basic() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }

    #[test]
    fn align_down_basic() {
        assert_eq!(align_down(0, 256), 0);
        assert_eq!(align_down(255, 256), 0);
        assert_eq!(align_down(256, 256), 256);
        assert_eq!(align_down(511, 256), 256);
    }
}
