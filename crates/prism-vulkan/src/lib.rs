//! Explicit-synchronization Vulkan backend for the Prism GPU abstraction.
//!
//! This crate provides:
//! - Instance, adapter, and logical device management
//! - Memory allocation via gpu-allocator
//! - Buffers, textures, samplers, shaders, and bind groups
//! - Render pass, framebuffer, and pipeline objects
//! - Command recording with scoped render/compute passes
//! - Explicit fences and binary/timeline semaphores
//! - Surface and swapchain presentation
//!
//! Synchronization is entirely explicit: layout transitions, pipeline
//! barriers, and semaphore/fence chains are the caller's responsibility,
//! expressed through the types in this crate.

pub mod adapter;
pub mod bind;
pub mod buffer;
pub mod command;
mod convert;
pub mod deferred;
pub mod device;
pub mod instance;
mod layout;
mod memory;
pub mod pipeline;
pub mod query;
pub mod queue;
pub mod renderpass;
pub mod sampler;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod texture;

pub use adapter::Adapter;
pub use bind::{BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindingResource};
pub use buffer::Buffer;
pub use command::{
    BarrierSet, BufferBarrier, CommandEncoder, ComputePassEncoder, EncoderState,
    RenderPassBegin, RenderPassEncoder, TextureBarrier, TextureBlit, TextureCopy,
};
pub use deferred::{RetiredFrame, RetiredQueue};
pub use device::Device;
pub use instance::{Instance, InstanceBuilder};
pub use pipeline::{
    ComputePipeline, ComputePipelineDescriptor, FragmentState, RenderPipeline,
    RenderPipelineDescriptor, VertexState,
};
pub use query::QuerySet;
pub use queue::{Queue, SemaphoreSignal, SemaphoreWait, Submit};
pub use renderpass::{Framebuffer, FramebufferAttachment, FramebufferDescriptor, RenderPass};
pub use sampler::Sampler;
pub use shader::Shader;
pub use surface::{Surface, SurfaceCapabilities};
pub use swapchain::{Swapchain, SwapchainState};
pub use sync::{Fence, Semaphore};
pub use texture::{Texture, TextureView};

// The shared data model is re-exported so applications need only this crate.
pub use prism_core as core;
