//! Plain-data descriptors for resource creation.
//!
//! A descriptor here is a configuration struct handed to a backend at
//! creation time (distinct from a GPU "descriptor set"). Descriptors borrow
//! their arrays; backends copy whatever they need to retain.

use crate::flags::{
    AccessFlags, BufferUsages, ColorWriteMask, MemoryProperties, PipelineStages, ShaderStages,
    TextureUsages,
};
use crate::format::TextureFormat;
use crate::types::{
    AdapterPreference, AddressMode, BlendFactor, BlendOperation, CompareFunction, CullMode,
    Extent3d, FilterMode, FrontFace, LoadOp, PolygonMode, PresentMode, PrimitiveTopology,
    QueryKind, SampleCount, SemaphoreKind, StencilOperation, StoreOp, TextureDimension,
    TextureLayout, TextureViewDimension, VertexStepMode,
};

/// Adapter-selection options.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdapterOptions {
    /// Explicit adapter index from enumeration; `None` selects by preference.
    pub index: Option<u32>,
    pub preference: AdapterPreference,
}

/// An explicit queue request for device creation.
#[derive(Debug, Clone, Copy)]
pub struct QueueRequest {
    pub family: u32,
    pub index: u32,
    pub priority: f32,
}

/// Device creation parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceDescriptor<'a> {
    pub label: Option<&'a str>,
    /// Explicit queue requests; empty requests a single default graphics
    /// queue.
    pub queue_requests: &'a [QueueRequest],
}

/// Buffer creation parameters.
#[derive(Debug, Clone, Copy)]
pub struct BufferDescriptor<'a> {
    pub label: Option<&'a str>,
    pub size: u64,
    pub usage: BufferUsages,
    pub memory: MemoryProperties,
}

/// Texture creation parameters.
#[derive(Debug, Clone, Copy)]
pub struct TextureDescriptor<'a> {
    pub label: Option<&'a str>,
    pub dimension: TextureDimension,
    pub size: Extent3d,
    pub array_layers: u32,
    pub mip_level_count: u32,
    pub sample_count: SampleCount,
    pub format: TextureFormat,
    pub usage: TextureUsages,
}

impl Default for TextureDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            dimension: TextureDimension::D2,
            size: Extent3d::new(1, 1, 1),
            array_layers: 1,
            mip_level_count: 1,
            sample_count: SampleCount::X1,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::empty(),
        }
    }
}

/// Texture view creation parameters.
#[derive(Debug, Clone, Copy)]
pub struct TextureViewDescriptor<'a> {
    pub label: Option<&'a str>,
    pub dimension: TextureViewDimension,
    /// `TextureFormat::Undefined` reuses the parent texture's format.
    pub format: TextureFormat,
    pub base_mip_level: u32,
    pub mip_level_count: u32,
    pub base_array_layer: u32,
    pub array_layer_count: u32,
}

impl Default for TextureViewDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            dimension: TextureViewDimension::D2,
            format: TextureFormat::Undefined,
            base_mip_level: 0,
            mip_level_count: 1,
            base_array_layer: 0,
            array_layer_count: 1,
        }
    }
}

/// Sampler creation parameters.
#[derive(Debug, Clone, Copy)]
pub struct SamplerDescriptor<'a> {
    pub label: Option<&'a str>,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    /// `Some` creates a comparison sampler.
    pub compare: Option<CompareFunction>,
    pub max_anisotropy: u16,
}

impl Default for SamplerDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            lod_min_clamp: 0.0,
            lod_max_clamp: f32::MAX,
            compare: None,
            max_anisotropy: 1,
        }
    }
}

/// Shader module creation parameters. The explicit-sync backend consumes
/// SPIR-V words only.
#[derive(Debug, Clone, Copy)]
pub struct ShaderDescriptor<'a> {
    pub label: Option<&'a str>,
    pub spirv: &'a [u32],
    pub entry_point: &'a str,
}

/// Fence creation parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct FenceDescriptor<'a> {
    pub label: Option<&'a str>,
    /// Initial state.
    pub signaled: bool,
}

/// Semaphore creation parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemaphoreDescriptor<'a> {
    pub label: Option<&'a str>,
    pub kind: SemaphoreKind,
    /// Initial counter value for timeline semaphores; ignored for binary.
    pub initial_value: u64,
}

/// Query set creation parameters.
#[derive(Debug, Clone, Copy)]
pub struct QuerySetDescriptor<'a> {
    pub label: Option<&'a str>,
    pub kind: QueryKind,
    pub count: u32,
}

/// Swapchain creation parameters.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainDescriptor<'a> {
    pub label: Option<&'a str>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsages,
    pub present_mode: PresentMode,
    /// Requested image count, clamped to surface capabilities.
    pub image_count: u32,
}

// ---------------------------------------------------------------------------
// Bind group layouts
// ---------------------------------------------------------------------------

/// The resource class a layout binding accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingType {
    UniformBuffer {
        dynamic_offset: bool,
        min_binding_size: u64,
    },
    StorageBuffer {
        dynamic_offset: bool,
        min_binding_size: u64,
    },
    Sampler {
        comparison: bool,
    },
    SampledTexture {
        view_dimension: TextureViewDimension,
        multisampled: bool,
    },
    StorageTexture {
        format: TextureFormat,
        view_dimension: TextureViewDimension,
    },
}

/// One binding slot in a bind group layout.
#[derive(Debug, Clone, Copy)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub visibility: ShaderStages,
    pub ty: BindingType,
}

/// Bind group layout creation parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct BindGroupLayoutDescriptor<'a> {
    pub label: Option<&'a str>,
    pub entries: &'a [BindGroupLayoutEntry],
}

// ---------------------------------------------------------------------------
// Render pass attachments
// ---------------------------------------------------------------------------

/// Load/store pair for one attachment aspect.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadStoreOps {
    pub load: LoadOp,
    pub store: StoreOp,
}

/// One color attachment target (main or resolve) of a render pass.
#[derive(Debug, Clone, Copy)]
pub struct ColorAttachmentTarget {
    pub format: TextureFormat,
    pub sample_count: SampleCount,
    pub ops: LoadStoreOps,
    /// Layout the attachment is transitioned to when the pass ends.
    pub final_layout: TextureLayout,
}

/// A color attachment with an optional multisample-resolve target.
#[derive(Debug, Clone, Copy)]
pub struct ColorAttachment {
    pub target: ColorAttachmentTarget,
    pub resolve_target: Option<ColorAttachmentTarget>,
}

/// The depth/stencil attachment target of a render pass.
#[derive(Debug, Clone, Copy)]
pub struct DepthStencilAttachmentTarget {
    pub format: TextureFormat,
    pub sample_count: SampleCount,
    pub depth_ops: LoadStoreOps,
    pub stencil_ops: LoadStoreOps,
    pub final_layout: TextureLayout,
}

/// Render pass creation parameters: attachment formats and load/store/layout
/// contracts. Cached and reusable across frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderPassDescriptor<'a> {
    pub label: Option<&'a str>,
    pub color_attachments: &'a [ColorAttachment],
    pub depth_stencil_attachment: Option<DepthStencilAttachmentTarget>,
    /// Bit N set renders to view N; `None` disables multiview.
    pub view_mask: Option<u32>,
    pub correlation_masks: &'a [u32],
}

// ---------------------------------------------------------------------------
// Pipeline state
// ---------------------------------------------------------------------------

/// One vertex attribute within a vertex buffer layout.
#[derive(Debug, Clone, Copy)]
pub struct VertexAttribute {
    pub format: TextureFormat,
    pub offset: u64,
    pub shader_location: u32,
}

/// Layout of one bound vertex buffer.
#[derive(Debug, Clone, Copy)]
pub struct VertexBufferLayout<'a> {
    pub array_stride: u64,
    pub step_mode: VertexStepMode,
    pub attributes: &'a [VertexAttribute],
}

/// Primitive assembly and rasterization state.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveState {
    pub topology: PrimitiveTopology,
    pub front_face: FrontFace,
    pub cull_mode: CullMode,
    pub polygon_mode: PolygonMode,
}

/// Per-face stencil state.
#[derive(Debug, Clone, Copy)]
pub struct StencilFaceState {
    pub compare: CompareFunction,
    pub fail_op: StencilOperation,
    pub depth_fail_op: StencilOperation,
    pub pass_op: StencilOperation,
}

impl Default for StencilFaceState {
    fn default() -> Self {
        Self {
            compare: CompareFunction::Always,
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::Keep,
            pass_op: StencilOperation::Keep,
        }
    }
}

/// Depth/stencil pipeline state.
#[derive(Debug, Clone, Copy)]
pub struct DepthStencilState {
    pub format: TextureFormat,
    pub depth_write_enabled: bool,
    pub depth_compare: CompareFunction,
    pub stencil_front: StencilFaceState,
    pub stencil_back: StencilFaceState,
    pub stencil_read_mask: u32,
    pub stencil_write_mask: u32,
    pub depth_bias: i32,
    pub depth_bias_slope_scale: f32,
    pub depth_bias_clamp: f32,
}

impl DepthStencilState {
    /// Depth-test-and-write state with no stencil, the common case.
    #[must_use]
    pub fn depth_only(format: TextureFormat) -> Self {
        Self {
            format,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil_front: StencilFaceState::default(),
            stencil_back: StencilFaceState::default(),
            stencil_read_mask: !0,
            stencil_write_mask: !0,
            depth_bias: 0,
            depth_bias_slope_scale: 0.0,
            depth_bias_clamp: 0.0,
        }
    }
}

/// One blend equation component.
#[derive(Debug, Clone, Copy)]
pub struct BlendComponent {
    pub operation: BlendOperation,
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
}

impl BlendComponent {
    pub const REPLACE: Self = Self {
        operation: BlendOperation::Add,
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::Zero,
    };
}

/// Color/alpha blend state for one target.
#[derive(Debug, Clone, Copy)]
pub struct BlendState {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

impl BlendState {
    pub const ALPHA_BLENDING: Self = Self {
        color: BlendComponent {
            operation: BlendOperation::Add,
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
        },
        alpha: BlendComponent {
            operation: BlendOperation::Add,
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
        },
    };
}

/// One color target of a render pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ColorTargetState {
    pub format: TextureFormat,
    pub blend: Option<BlendState>,
    pub write_mask: ColorWriteMask,
}

// ---------------------------------------------------------------------------
// Barriers
// ---------------------------------------------------------------------------

/// A global execution/memory dependency.
#[derive(Debug, Clone, Copy)]
pub struct MemoryBarrier {
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_descriptor_defaults() {
        let desc = TextureDescriptor::default();
        assert_eq!(desc.mip_level_count, 1);
        assert_eq!(desc.sample_count, SampleCount::X1);
        assert!(desc.usage.is_empty());
    }

    #[test]
    fn depth_only_state_has_inert_stencil() {
        let state = DepthStencilState::depth_only(TextureFormat::Depth32Float);
        assert!(state.depth_write_enabled);
        assert_eq!(state.stencil_front.pass_op, StencilOperation::Keep);
        assert_eq!(state.stencil_back.compare, CompareFunction::Always);
    }
}
