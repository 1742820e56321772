//! Metadata returned by query operations on live objects.

use crate::flags::{BufferUsages, MemoryProperties, QueueFlags, TextureUsages};
use crate::format::TextureFormat;
use crate::types::{AdapterKind, Extent3d, PresentMode, SampleCount, TextureDimension};

/// Identity and classification of an adapter.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub kind: AdapterKind,
    pub driver_version: u32,
}

/// Alignment and dimension limits of a device.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceLimits {
    pub min_uniform_buffer_offset_alignment: u32,
    pub min_storage_buffer_offset_alignment: u32,
    pub max_uniform_buffer_binding_size: u32,
    pub max_storage_buffer_binding_size: u32,
    pub max_buffer_size: u64,
    pub max_texture_dimension_1d: u32,
    pub max_texture_dimension_2d: u32,
    pub max_texture_dimension_3d: u32,
    pub max_texture_array_layers: u32,
}

/// Capabilities of one queue family.
#[derive(Debug, Clone, Copy)]
pub struct QueueFamilyInfo {
    pub flags: QueueFlags,
    pub queue_count: u32,
}

/// Configuration a buffer was created with.
#[derive(Debug, Clone, Copy)]
pub struct BufferInfo {
    pub size: u64,
    pub usage: BufferUsages,
    pub memory: MemoryProperties,
}

/// Configuration a texture was created with.
#[derive(Debug, Clone, Copy)]
pub struct TextureInfo {
    pub dimension: TextureDimension,
    pub size: Extent3d,
    pub array_layers: u32,
    pub mip_level_count: u32,
    pub sample_count: SampleCount,
    pub format: TextureFormat,
    pub usage: TextureUsages,
}

/// Configuration a swapchain resolved to after capability clamping.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainInfo {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub image_count: u32,
    pub present_mode: PresentMode,
}
