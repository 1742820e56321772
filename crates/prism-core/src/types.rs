//! Common value types and small enums shared by every backend.

/// Infinite timeout for fence and semaphore waits.
pub const TIMEOUT_INFINITE: u64 = u64::MAX;

/// Special size meaning "to the end of the buffer" in map and barrier ranges.
pub const WHOLE_SIZE: u64 = 0;

/// A 3D extent in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3d {
    #[must_use]
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Extent of mip level `level`, clamped to a minimum of 1 per axis.
    #[must_use]
    pub const fn mip_level(self, level: u32) -> Self {
        Self {
            width: max_u32(self.width >> level, 1),
            height: max_u32(self.height >> level, 1),
            depth: max_u32(self.depth >> level, 1),
        }
    }
}

const fn max_u32(a: u32, b: u32) -> u32 {
    if a > b {
        a
    } else {
        b
    }
}

/// A 3D offset in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Origin3d {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Origin3d {
    pub const ZERO: Self = Self { x: 0, y: 0, z: 0 };
}

/// An RGBA color used for clear values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
}

/// Viewport rectangle with depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

/// Scissor rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Multisample counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SampleCount {
    #[default]
    X1,
    X2,
    X4,
    X8,
    X16,
    X32,
    X64,
}

impl SampleCount {
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
            Self::X16 => 16,
            Self::X32 => 32,
            Self::X64 => 64,
        }
    }

    #[must_use]
    pub const fn is_multisampled(self) -> bool {
        !matches!(self, Self::X1)
    }
}

/// The GPU-visible access/optimization state of an image.
///
/// Host-tracked per texture; it must match the operation about to be
/// performed. Changed only by explicit transitions recorded through a
/// command encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureLayout {
    /// Initial layout; contents undefined.
    #[default]
    Undefined,
    /// Any use, potentially slow.
    General,
    /// Optimal as a color render target.
    ColorAttachment,
    /// Optimal as a depth/stencil render target.
    DepthStencilAttachment,
    /// Optimal for depth/stencil reads.
    DepthStencilReadOnly,
    /// Optimal for sampling in shaders.
    ShaderReadOnly,
    /// Optimal as a copy source.
    TransferSrc,
    /// Optimal as a copy destination.
    TransferDst,
    /// Optimal for presentation.
    PresentSrc,
}

/// Base dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    D1,
    #[default]
    D2,
    D3,
    Cube,
}

/// Dimensionality of a texture view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureViewDimension {
    D1,
    #[default]
    D2,
    D3,
    Cube,
    D1Array,
    D2Array,
    CubeArray,
}

/// Presentation modes for a swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PresentMode {
    Immediate,
    #[default]
    Fifo,
    FifoRelaxed,
    Mailbox,
}

/// Index buffer element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

/// Texel filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

/// Sampler addressing outside [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    Repeat,
    MirrorRepeat,
    ClampToEdge,
}

/// Comparison functions for depth tests and comparison samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Primitive assembly topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

/// Winding order considered front-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

/// Face culling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

/// Polygon rasterization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
    Point,
}

/// What happens to an attachment's contents at the start of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadOp {
    /// Preserve the existing contents.
    Load,
    /// Clear to the clear value supplied at pass begin.
    #[default]
    Clear,
    /// Contents are undefined; cheapest on tiled GPUs.
    DontCare,
}

/// What happens to an attachment's contents at the end of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    #[default]
    Store,
    DontCare,
}

/// Blend inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    Src,
    OneMinusSrc,
    SrcAlpha,
    OneMinusSrcAlpha,
    Dst,
    OneMinusDst,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturated,
    Constant,
    OneMinusConstant,
}

/// Blend combiner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOperation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Stencil operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOperation {
    #[default]
    Keep,
    Zero,
    Replace,
    IncrementClamp,
    DecrementClamp,
    Invert,
    IncrementWrap,
    DecrementWrap,
}

/// Per-vertex vs per-instance stepping for a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStepMode {
    #[default]
    Vertex,
    Instance,
}

/// The broad class of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdapterKind {
    DiscreteGpu,
    IntegratedGpu,
    Cpu,
    #[default]
    Unknown,
}

/// Adapter-selection preference when no explicit index is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdapterPreference {
    #[default]
    Undefined,
    LowPower,
    HighPerformance,
}

/// Variants of a semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SemaphoreKind {
    /// GPU-signaled once, consumed once; submission-only.
    #[default]
    Binary,
    /// Monotonically non-decreasing counter, host- or GPU-signalable.
    Timeline,
}

/// Kinds of GPU queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Occlusion,
    Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_count_values() {
        assert_eq!(SampleCount::X1.as_u32(), 1);
        assert_eq!(SampleCount::X4.as_u32(), 4);
        assert!(!SampleCount::X1.is_multisampled());
        assert!(SampleCount::X4.is_multisampled());
    }

    #[test]
    fn mip_extent_clamps_to_one() {
        let base = Extent3d::new(256, 256, 1);
        assert_eq!(base.mip_level(0), Extent3d::new(256, 256, 1));
        assert_eq!(base.mip_level(3), Extent3d::new(32, 32, 1));
        assert_eq!(base.mip_level(9), Extent3d::new(1, 1, 1));
    }
}
