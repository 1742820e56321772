//! Command recording.
//!
//! A [`CommandEncoder`] owns one native command buffer and walks the
//! `Initial -> Recording -> Ended` state machine. Render and compute passes
//! are scoped sub-encoders that borrow the parent mutably, so a pass must be
//! ended (or dropped) before the encoder can be ended or submitted.

use std::sync::Arc;

use ash::vk;
use prism_core::desc::MemoryBarrier;
use prism_core::error::{GfxError, Result};
use prism_core::flags::{AccessFlags, PipelineStages};
use prism_core::types::{
    Color, Extent3d, FilterMode, IndexFormat, Origin3d, ScissorRect, TextureDimension,
    TextureLayout, Viewport,
};

use crate::bind::BindGroup;
use crate::buffer::Buffer;
use crate::convert::{
    access_flags_to_vk, aspect_mask, extent_to_vk, filter_to_vk, index_format_to_vk,
    map_vk_result, origin_to_vk, pipeline_stages_to_vk,
};
use crate::device::Device;
use crate::pipeline::{ComputePipeline, RenderPipeline};
use crate::query::QuerySet;
use crate::renderpass::{Framebuffer, RenderPass};
use crate::texture::Texture;

/// Lifecycle state of a command encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    /// Allocated, native buffer not yet begun.
    Initial,
    /// Accepting commands.
    Recording,
    /// Finalized; submittable until reset via [`CommandEncoder::begin`].
    Ended,
}

/// A buffer-to-buffer dependency for [`CommandEncoder::pipeline_barrier`].
#[derive(Clone, Copy)]
pub struct BufferBarrier<'a> {
    pub buffer: &'a Buffer,
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub offset: u64,
    /// `WHOLE_SIZE` (0) covers to the end of the buffer.
    pub size: u64,
}

/// A texture layout/memory dependency for
/// [`CommandEncoder::pipeline_barrier`].
#[derive(Clone, Copy)]
pub struct TextureBarrier<'a> {
    pub texture: &'a Texture,
    pub old_layout: TextureLayout,
    pub new_layout: TextureLayout,
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub base_mip_level: u32,
    pub mip_level_count: u32,
    pub base_array_layer: u32,
    pub array_layer_count: u32,
}

/// A batch of barriers recorded as one native call.
#[derive(Clone, Copy, Default)]
pub struct BarrierSet<'a> {
    pub memory: &'a [MemoryBarrier],
    pub buffers: &'a [BufferBarrier<'a>],
    pub textures: &'a [TextureBarrier<'a>],
}

/// Parameters for a texture-to-texture copy.
#[derive(Clone, Copy)]
pub struct TextureCopy<'a> {
    pub source: &'a Texture,
    pub source_origin: Origin3d,
    pub source_mip_level: u32,
    pub source_final_layout: TextureLayout,
    pub destination: &'a Texture,
    pub destination_origin: Origin3d,
    pub destination_mip_level: u32,
    pub destination_final_layout: TextureLayout,
    pub extent: Extent3d,
}

/// Parameters for a scaled, filtered texture-to-texture blit.
#[derive(Clone, Copy)]
pub struct TextureBlit<'a> {
    pub source: &'a Texture,
    pub source_origin: Origin3d,
    pub source_extent: Extent3d,
    pub source_mip_level: u32,
    pub source_final_layout: TextureLayout,
    pub destination: &'a Texture,
    pub destination_origin: Origin3d,
    pub destination_extent: Extent3d,
    pub destination_mip_level: u32,
    pub destination_final_layout: TextureLayout,
    pub filter: FilterMode,
}

/// Parameters for beginning a render pass.
#[derive(Clone, Copy)]
pub struct RenderPassBegin<'a> {
    pub render_pass: &'a RenderPass,
    pub framebuffer: &'a Framebuffer,
    /// One clear color per declared color attachment (resolve slots are
    /// synthesized internally).
    pub color_clear_values: &'a [Color],
    pub depth_clear_value: f32,
    pub stencil_clear_value: u32,
}

/// Records commands into one native command buffer.
///
/// Dropping an encoder frees its pool; destruction must be deferred until a
/// fence proves the GPU is done with the buffer (see
/// [`crate::deferred::RetiredQueue`]).
pub struct CommandEncoder {
    device: Arc<ash::Device>,
    pool: vk::CommandPool,
    cmd: vk::CommandBuffer,
    state: EncoderState,
    current_pipeline_layout: vk::PipelineLayout,
}

impl CommandEncoder {
    /// Create an encoder on the default queue's family and begin recording.
    pub fn new(device: &Device, label: Option<&str>) -> Result<Self> {
        let raw_device = Arc::clone(&device.raw);

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(device.default_queue().family());
        let pool = unsafe { raw_device.create_command_pool(&pool_info, None) }
            .map_err(map_vk_result)?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let cmd = match unsafe { raw_device.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) => buffers[0],
            Err(e) => {
                unsafe { raw_device.destroy_command_pool(pool, None) };
                return Err(map_vk_result(e));
            }
        };

        let mut encoder = Self {
            device: raw_device,
            pool,
            cmd,
            state: EncoderState::Initial,
            current_pipeline_layout: vk::PipelineLayout::null(),
        };
        encoder.begin()?;

        if let Some(label) = label {
            tracing::trace!(label, "created command encoder");
        }
        Ok(encoder)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EncoderState {
        self.state
    }

    /// Get the raw command buffer handle.
    #[must_use]
    pub fn raw(&self) -> vk::CommandBuffer {
        self.cmd
    }

    pub(crate) fn device_raw(&self) -> &ash::Device {
        &self.device
    }

    pub(crate) fn device_raw_arc(&self) -> Arc<ash::Device> {
        Arc::clone(&self.device)
    }

    pub(crate) fn check_recording(&self) -> Result<()> {
        if self.state == EncoderState::Recording {
            Ok(())
        } else {
            Err(GfxError::InvalidArgument(format!(
                "encoder is {:?}, expected Recording",
                self.state
            )))
        }
    }

    pub(crate) fn current_pipeline_layout(&self) -> vk::PipelineLayout {
        self.current_pipeline_layout
    }

    pub(crate) fn set_current_pipeline_layout(&mut self, layout: vk::PipelineLayout) {
        self.current_pipeline_layout = layout;
    }

    /// Reset the native command buffer and re-enter `Recording`.
    ///
    /// Valid only once the GPU has finished with the previous contents; the
    /// caller proves that with a fence before reusing per-frame encoders.
    pub fn begin(&mut self) -> Result<()> {
        if self.state != EncoderState::Initial {
            unsafe {
                self.device
                    .reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())
            }
            .map_err(map_vk_result)?;
            self.current_pipeline_layout = vk::PipelineLayout::null();
        }

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.begin_command_buffer(self.cmd, &begin_info) }
            .map_err(map_vk_result)?;
        self.state = EncoderState::Recording;
        Ok(())
    }

    /// Finalize recording. The encoder can then be submitted.
    pub fn end(&mut self) -> Result<()> {
        self.check_recording()?;
        unsafe { self.device.end_command_buffer(self.cmd) }.map_err(map_vk_result)?;
        self.state = EncoderState::Ended;
        Ok(())
    }

    /// Record a buffer-to-buffer copy.
    pub fn copy_buffer_to_buffer(
        &mut self,
        source: &Buffer,
        source_offset: u64,
        destination: &Buffer,
        destination_offset: u64,
        size: u64,
    ) -> Result<()> {
        self.check_recording()?;
        if size == 0 {
            return Err(GfxError::InvalidArgument("copy of zero bytes".into()));
        }
        if source_offset + size > source.info().size
            || destination_offset + size > destination.info().size
        {
            return Err(GfxError::InvalidArgument("copy range out of bounds".into()));
        }

        let region = vk::BufferCopy::default()
            .src_offset(source_offset)
            .dst_offset(destination_offset)
            .size(size);
        unsafe {
            self.device
                .cmd_copy_buffer(self.cmd, source.raw(), destination.raw(), &[region]);
        }
        Ok(())
    }

    /// Record a buffer-to-texture copy, wrapped in transitions to
    /// `TransferDst` and then to `final_layout`.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_buffer_to_texture(
        &mut self,
        source: &Buffer,
        source_offset: u64,
        destination: &Texture,
        origin: Origin3d,
        extent: Extent3d,
        mip_level: u32,
        final_layout: TextureLayout,
    ) -> Result<()> {
        self.check_recording()?;
        if mip_level >= destination.info().mip_level_count {
            return Err(GfxError::InvalidArgument("mip level out of range".into()));
        }

        destination.record_transition(
            &self.device,
            self.cmd,
            TextureLayout::TransferDst,
            mip_level,
            1,
            0,
            1,
        );

        let region = vk::BufferImageCopy::default()
            .buffer_offset(source_offset)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(aspect_mask(destination.info().format))
                    .mip_level(mip_level)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .image_offset(origin_to_vk(origin))
            .image_extent(extent_to_vk(extent));
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                self.cmd,
                source.raw(),
                destination.raw(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }

        destination.record_transition(&self.device, self.cmd, final_layout, mip_level, 1, 0, 1);
        Ok(())
    }

    /// Record a texture-to-buffer copy, wrapped in transitions to
    /// `TransferSrc` and then to `final_layout`.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_texture_to_buffer(
        &mut self,
        source: &Texture,
        origin: Origin3d,
        mip_level: u32,
        destination: &Buffer,
        destination_offset: u64,
        extent: Extent3d,
        final_layout: TextureLayout,
    ) -> Result<()> {
        self.check_recording()?;
        if mip_level >= source.info().mip_level_count {
            return Err(GfxError::InvalidArgument("mip level out of range".into()));
        }

        source.record_transition(
            &self.device,
            self.cmd,
            TextureLayout::TransferSrc,
            mip_level,
            1,
            0,
            1,
        );

        let region = vk::BufferImageCopy::default()
            .buffer_offset(destination_offset)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(aspect_mask(source.info().format))
                    .mip_level(mip_level)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .image_offset(origin_to_vk(origin))
            .image_extent(extent_to_vk(extent));
        unsafe {
            self.device.cmd_copy_image_to_buffer(
                self.cmd,
                source.raw(),
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                destination.raw(),
                &[region],
            );
        }

        source.record_transition(&self.device, self.cmd, final_layout, mip_level, 1, 0, 1);
        Ok(())
    }

    /// Record a texture-to-texture copy with per-side final layouts.
    pub fn copy_texture_to_texture(&mut self, copy: &TextureCopy) -> Result<()> {
        self.check_recording()?;

        // For 2D textures extent.depth selects array layers; for 3D it is
        // real depth.
        let is_3d = copy.source.info().dimension == TextureDimension::D3;
        let (layer_count, copy_depth) = if is_3d {
            (1, copy.extent.depth)
        } else {
            (copy.extent.depth.max(1), 1)
        };
        let src_base_layer = if is_3d { 0 } else { copy.source_origin.z as u32 };
        let dst_base_layer = if is_3d {
            0
        } else {
            copy.destination_origin.z as u32
        };

        copy.source.record_transition(
            &self.device,
            self.cmd,
            TextureLayout::TransferSrc,
            copy.source_mip_level,
            1,
            src_base_layer,
            layer_count,
        );
        copy.destination.record_transition(
            &self.device,
            self.cmd,
            TextureLayout::TransferDst,
            copy.destination_mip_level,
            1,
            dst_base_layer,
            layer_count,
        );

        let region = vk::ImageCopy::default()
            .src_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(aspect_mask(copy.source.info().format))
                    .mip_level(copy.source_mip_level)
                    .base_array_layer(src_base_layer)
                    .layer_count(layer_count),
            )
            .src_offset(vk::Offset3D {
                x: copy.source_origin.x,
                y: copy.source_origin.y,
                z: if is_3d { copy.source_origin.z } else { 0 },
            })
            .dst_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(aspect_mask(copy.destination.info().format))
                    .mip_level(copy.destination_mip_level)
                    .base_array_layer(dst_base_layer)
                    .layer_count(layer_count),
            )
            .dst_offset(vk::Offset3D {
                x: copy.destination_origin.x,
                y: copy.destination_origin.y,
                z: if is_3d { copy.destination_origin.z } else { 0 },
            })
            .extent(vk::Extent3D {
                width: copy.extent.width,
                height: copy.extent.height,
                depth: copy_depth,
            });
        unsafe {
            self.device.cmd_copy_image(
                self.cmd,
                copy.source.raw(),
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                copy.destination.raw(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }

        copy.source.record_transition(
            &self.device,
            self.cmd,
            copy.source_final_layout,
            copy.source_mip_level,
            1,
            src_base_layer,
            layer_count,
        );
        copy.destination.record_transition(
            &self.device,
            self.cmd,
            copy.destination_final_layout,
            copy.destination_mip_level,
            1,
            dst_base_layer,
            layer_count,
        );
        Ok(())
    }

    /// Record a scaled, filtered blit with per-side final layouts.
    pub fn blit_texture_to_texture(&mut self, blit: &TextureBlit) -> Result<()> {
        self.check_recording()?;

        let is_3d = blit.source.info().dimension == TextureDimension::D3;
        let (layer_count, src_depth, dst_depth) = if is_3d {
            (1, blit.source_extent.depth, blit.destination_extent.depth)
        } else {
            (blit.source_extent.depth.max(1), 1, 1)
        };
        let src_base_layer = if is_3d { 0 } else { blit.source_origin.z as u32 };
        let dst_base_layer = if is_3d {
            0
        } else {
            blit.destination_origin.z as u32
        };

        blit.source.record_transition(
            &self.device,
            self.cmd,
            TextureLayout::TransferSrc,
            blit.source_mip_level,
            1,
            src_base_layer,
            layer_count,
        );
        blit.destination.record_transition(
            &self.device,
            self.cmd,
            TextureLayout::TransferDst,
            blit.destination_mip_level,
            1,
            dst_base_layer,
            layer_count,
        );

        let region = vk::ImageBlit::default()
            .src_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(aspect_mask(blit.source.info().format))
                    .mip_level(blit.source_mip_level)
                    .base_array_layer(src_base_layer)
                    .layer_count(layer_count),
            )
            .src_offsets([
                vk::Offset3D {
                    x: blit.source_origin.x,
                    y: blit.source_origin.y,
                    z: if is_3d { blit.source_origin.z } else { 0 },
                },
                vk::Offset3D {
                    x: blit.source_origin.x + blit.source_extent.width as i32,
                    y: blit.source_origin.y + blit.source_extent.height as i32,
                    z: if is_3d {
                        blit.source_origin.z + src_depth as i32
                    } else {
                        1
                    },
                },
            ])
            .dst_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(aspect_mask(blit.destination.info().format))
                    .mip_level(blit.destination_mip_level)
                    .base_array_layer(dst_base_layer)
                    .layer_count(layer_count),
            )
            .dst_offsets([
                vk::Offset3D {
                    x: blit.destination_origin.x,
                    y: blit.destination_origin.y,
                    z: if is_3d { blit.destination_origin.z } else { 0 },
                },
                vk::Offset3D {
                    x: blit.destination_origin.x + blit.destination_extent.width as i32,
                    y: blit.destination_origin.y + blit.destination_extent.height as i32,
                    z: if is_3d {
                        blit.destination_origin.z + dst_depth as i32
                    } else {
                        1
                    },
                },
            ]);
        unsafe {
            self.device.cmd_blit_image(
                self.cmd,
                blit.source.raw(),
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                blit.destination.raw(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
                filter_to_vk(blit.filter),
            );
        }

        blit.source.record_transition(
            &self.device,
            self.cmd,
            blit.source_final_layout,
            blit.source_mip_level,
            1,
            src_base_layer,
            layer_count,
        );
        blit.destination.record_transition(
            &self.device,
            self.cmd,
            blit.destination_final_layout,
            blit.destination_mip_level,
            1,
            dst_base_layer,
            layer_count,
        );
        Ok(())
    }

    /// Record a batch of barriers as one native call with OR-combined stage
    /// masks. Texture barriers update the tracked layouts. Must be issued
    /// between passes, never inside one.
    pub fn pipeline_barrier(&mut self, barriers: &BarrierSet) -> Result<()> {
        self.check_recording()?;
        if barriers.memory.is_empty() && barriers.buffers.is_empty() && barriers.textures.is_empty()
        {
            return Ok(());
        }

        let mut src_stages = vk::PipelineStageFlags::empty();
        let mut dst_stages = vk::PipelineStageFlags::empty();

        let memory_barriers: Vec<vk::MemoryBarrier> = barriers
            .memory
            .iter()
            .map(|barrier| {
                src_stages |= pipeline_stages_to_vk(barrier.src_stages);
                dst_stages |= pipeline_stages_to_vk(barrier.dst_stages);
                vk::MemoryBarrier::default()
                    .src_access_mask(access_flags_to_vk(barrier.src_access))
                    .dst_access_mask(access_flags_to_vk(barrier.dst_access))
            })
            .collect();

        let buffer_barriers: Vec<vk::BufferMemoryBarrier> = barriers
            .buffers
            .iter()
            .map(|barrier| {
                src_stages |= pipeline_stages_to_vk(barrier.src_stages);
                dst_stages |= pipeline_stages_to_vk(barrier.dst_stages);
                vk::BufferMemoryBarrier::default()
                    .buffer(barrier.buffer.raw())
                    .offset(barrier.offset)
                    .size(if barrier.size == 0 {
                        vk::WHOLE_SIZE
                    } else {
                        barrier.size
                    })
                    .src_access_mask(access_flags_to_vk(barrier.src_access))
                    .dst_access_mask(access_flags_to_vk(barrier.dst_access))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            })
            .collect();

        let texture_barriers: Vec<vk::ImageMemoryBarrier> = barriers
            .textures
            .iter()
            .map(|barrier| {
                src_stages |= pipeline_stages_to_vk(barrier.src_stages);
                dst_stages |= pipeline_stages_to_vk(barrier.dst_stages);
                vk::ImageMemoryBarrier::default()
                    .image(barrier.texture.raw())
                    .old_layout(crate::convert::layout_to_vk(barrier.old_layout))
                    .new_layout(crate::convert::layout_to_vk(barrier.new_layout))
                    .src_access_mask(access_flags_to_vk(barrier.src_access))
                    .dst_access_mask(access_flags_to_vk(barrier.dst_access))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .subresource_range(
                        vk::ImageSubresourceRange::default()
                            .aspect_mask(aspect_mask(barrier.texture.info().format))
                            .base_mip_level(barrier.base_mip_level)
                            .level_count(barrier.mip_level_count)
                            .base_array_layer(barrier.base_array_layer)
                            .layer_count(barrier.array_layer_count),
                    )
            })
            .collect();

        unsafe {
            self.device.cmd_pipeline_barrier(
                self.cmd,
                src_stages,
                dst_stages,
                vk::DependencyFlags::empty(),
                &memory_barriers,
                &buffer_barriers,
                &texture_barriers,
            );
        }

        for barrier in barriers.textures {
            barrier.texture.set_layout(barrier.new_layout);
        }
        Ok(())
    }

    /// Record a timestamp write into `query_set` at `index`.
    pub fn write_timestamp(&mut self, query_set: &QuerySet, index: u32) -> Result<()> {
        self.check_recording()?;
        query_set.check_index(index)?;
        unsafe {
            self.device.cmd_write_timestamp(
                self.cmd,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                query_set.raw(),
                index,
            );
        }
        Ok(())
    }

    /// Reset a range of queries before reuse.
    pub fn reset_query_set(&mut self, query_set: &QuerySet, first: u32, count: u32) -> Result<()> {
        self.check_recording()?;
        query_set.check_range(first, count)?;
        unsafe {
            self.device
                .cmd_reset_query_pool(self.cmd, query_set.raw(), first, count);
        }
        Ok(())
    }

    /// Copy query results as 64-bit values into `destination`.
    pub fn resolve_query_set(
        &mut self,
        query_set: &QuerySet,
        first: u32,
        count: u32,
        destination: &Buffer,
        destination_offset: u64,
    ) -> Result<()> {
        self.check_recording()?;
        query_set.check_range(first, count)?;
        unsafe {
            self.device.cmd_copy_query_pool_results(
                self.cmd,
                query_set.raw(),
                first,
                count,
                destination.raw(),
                destination_offset,
                std::mem::size_of::<u64>() as u64,
                vk::QueryResultFlags::TYPE_64 | vk::QueryResultFlags::WAIT,
            );
        }
        Ok(())
    }

    /// Begin a render pass. The returned encoder borrows `self`; end (or
    /// drop) it before ending the command encoder.
    pub fn begin_render_pass(&mut self, begin: &RenderPassBegin) -> Result<RenderPassEncoder<'_>> {
        self.check_recording()?;
        if !begin.framebuffer.is_compatible_with(begin.render_pass) {
            return Err(GfxError::InvalidArgument(
                "framebuffer was created for a different render pass".into(),
            ));
        }
        if begin.color_clear_values.len() != begin.render_pass.color_attachment_count() {
            return Err(GfxError::InvalidArgument(format!(
                "{} clear colors supplied, render pass declares {} color attachments",
                begin.color_clear_values.len(),
                begin.render_pass.color_attachment_count()
            )));
        }

        let clear_values = build_clear_values(
            begin.color_clear_values,
            begin.render_pass.color_has_resolve(),
            begin.render_pass.has_depth_stencil(),
            begin.depth_clear_value,
            begin.stencil_clear_value,
        );

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(begin.render_pass.raw())
            .framebuffer(begin.framebuffer.raw())
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D {
                    width: begin.framebuffer.width(),
                    height: begin.framebuffer.height(),
                },
            })
            .clear_values(&clear_values);

        unsafe {
            self.device
                .cmd_begin_render_pass(self.cmd, &begin_info, vk::SubpassContents::INLINE);
        }

        Ok(RenderPassEncoder {
            encoder: self,
            ended: false,
        })
    }

    /// Begin a compute pass. No native scope is required on this backend;
    /// the sub-encoder exists for bind/dispatch sequencing.
    pub fn begin_compute_pass(&mut self) -> Result<ComputePassEncoder<'_>> {
        self.check_recording()?;
        Ok(ComputePassEncoder { encoder: self })
    }
}

impl Drop for CommandEncoder {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}

/// Clear values ordered to match the render pass attachment list: each color
/// clear, a synthetic entry after any attachment with a resolve target
/// (resolve slots load `DontCare`), then the depth/stencil clear.
fn build_clear_values(
    color_clears: &[Color],
    color_has_resolve: &[bool],
    has_depth_stencil: bool,
    depth_clear: f32,
    stencil_clear: u32,
) -> Vec<vk::ClearValue> {
    let mut clear_values = Vec::with_capacity(color_clears.len() * 2 + 1);

    for (i, color) in color_clears.iter().enumerate() {
        clear_values.push(vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [color.r, color.g, color.b, color.a],
            },
        });
        if color_has_resolve.get(i).copied().unwrap_or(false) {
            clear_values.push(vk::ClearValue {
                color: vk::ClearColorValue { float32: [0.0; 4] },
            });
        }
    }

    if has_depth_stencil {
        clear_values.push(vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: depth_clear,
                stencil: stencil_clear,
            },
        });
    }

    clear_values
}

/// Records draw commands inside one render pass scope.
pub struct RenderPassEncoder<'a> {
    encoder: &'a mut CommandEncoder,
    ended: bool,
}

impl RenderPassEncoder<'_> {
    fn device(&self) -> &ash::Device {
        &self.encoder.device
    }

    fn cmd(&self) -> vk::CommandBuffer {
        self.encoder.cmd
    }

    /// Bind a render pipeline and remember its layout for subsequent
    /// bind-group calls.
    pub fn set_pipeline(&mut self, pipeline: &RenderPipeline) {
        unsafe {
            self.device().cmd_bind_pipeline(
                self.cmd(),
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.raw(),
            );
        }
        self.encoder.set_current_pipeline_layout(pipeline.layout());
    }

    /// Bind a descriptor set at `index` against the current pipeline layout.
    pub fn set_bind_group(
        &mut self,
        index: u32,
        bind_group: &BindGroup,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        let layout = self.encoder.current_pipeline_layout();
        if layout == vk::PipelineLayout::null() {
            return Err(GfxError::InvalidArgument(
                "no pipeline bound before set_bind_group".into(),
            ));
        }
        let sets = [bind_group.raw()];
        unsafe {
            self.device().cmd_bind_descriptor_sets(
                self.cmd(),
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                index,
                &sets,
                dynamic_offsets,
            );
        }
        Ok(())
    }

    /// Bind a vertex buffer to `slot`.
    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: &Buffer, offset: u64) {
        let buffers = [buffer.raw()];
        let offsets = [offset];
        unsafe {
            self.device()
                .cmd_bind_vertex_buffers(self.cmd(), slot, &buffers, &offsets);
        }
    }

    /// Bind the index buffer.
    pub fn set_index_buffer(&mut self, buffer: &Buffer, format: IndexFormat, offset: u64) {
        unsafe {
            self.device().cmd_bind_index_buffer(
                self.cmd(),
                buffer.raw(),
                offset,
                index_format_to_vk(format),
            );
        }
    }

    /// Set the dynamic viewport.
    pub fn set_viewport(&mut self, viewport: &Viewport) {
        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe {
            self.device().cmd_set_viewport(self.cmd(), 0, &[vk_viewport]);
        }
    }

    /// Set the dynamic scissor rectangle.
    pub fn set_scissor_rect(&mut self, scissor: &ScissorRect) {
        let rect = vk::Rect2D {
            offset: vk::Offset2D {
                x: scissor.x,
                y: scissor.y,
            },
            extent: vk::Extent2D {
                width: scissor.width,
                height: scissor.height,
            },
        };
        unsafe {
            self.device().cmd_set_scissor(self.cmd(), 0, &[rect]);
        }
    }

    pub fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe {
            self.device().cmd_draw(
                self.cmd(),
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device().cmd_draw_indexed(
                self.cmd(),
                index_count,
                instance_count,
                first_index,
                base_vertex,
                first_instance,
            );
        }
    }

    pub fn draw_indirect(&mut self, indirect_buffer: &Buffer, indirect_offset: u64) {
        unsafe {
            self.device()
                .cmd_draw_indirect(self.cmd(), indirect_buffer.raw(), indirect_offset, 1, 0);
        }
    }

    pub fn draw_indexed_indirect(&mut self, indirect_buffer: &Buffer, indirect_offset: u64) {
        unsafe {
            self.device().cmd_draw_indexed_indirect(
                self.cmd(),
                indirect_buffer.raw(),
                indirect_offset,
                1,
                0,
            );
        }
    }

    /// Begin an occlusion query at `index`.
    pub fn begin_occlusion_query(&mut self, query_set: &QuerySet, index: u32) -> Result<()> {
        query_set.check_index(index)?;
        unsafe {
            self.device()
                .cmd_begin_query(self.cmd(), query_set.raw(), index, vk::QueryControlFlags::empty());
        }
        Ok(())
    }

    /// End the active occlusion query.
    pub fn end_occlusion_query(&mut self, query_set: &QuerySet, index: u32) -> Result<()> {
        query_set.check_index(index)?;
        unsafe {
            self.device().cmd_end_query(self.cmd(), query_set.raw(), index);
        }
        Ok(())
    }

    /// Record the end of the render pass.
    pub fn end(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if !self.ended {
            unsafe {
                self.device().cmd_end_render_pass(self.cmd());
            }
            self.ended = true;
        }
    }
}

impl Drop for RenderPassEncoder<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Records dispatch commands inside one compute pass scope.
pub struct ComputePassEncoder<'a> {
    encoder: &'a mut CommandEncoder,
}

impl ComputePassEncoder<'_> {
    fn device(&self) -> &ash::Device {
        &self.encoder.device
    }

    fn cmd(&self) -> vk::CommandBuffer {
        self.encoder.cmd
    }

    /// Bind a compute pipeline and remember its layout.
    pub fn set_pipeline(&mut self, pipeline: &ComputePipeline) {
        unsafe {
            self.device().cmd_bind_pipeline(
                self.cmd(),
                vk::PipelineBindPoint::COMPUTE,
                pipeline.raw(),
            );
        }
        self.encoder.set_current_pipeline_layout(pipeline.layout());
    }

    /// Bind a descriptor set at `index` against the current pipeline layout.
    pub fn set_bind_group(
        &mut self,
        index: u32,
        bind_group: &BindGroup,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        let layout = self.encoder.current_pipeline_layout();
        if layout == vk::PipelineLayout::null() {
            return Err(GfxError::InvalidArgument(
                "no pipeline bound before set_bind_group".into(),
            ));
        }
        let sets = [bind_group.raw()];
        unsafe {
            self.device().cmd_bind_descriptor_sets(
                self.cmd(),
                vk::PipelineBindPoint::COMPUTE,
                layout,
                index,
                &sets,
                dynamic_offsets,
            );
        }
        Ok(())
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        unsafe {
            self.device().cmd_dispatch(self.cmd(), x, y, z);
        }
    }

    pub fn dispatch_indirect(&mut self, indirect_buffer: &Buffer, indirect_offset: u64) {
        unsafe {
            self.device()
                .cmd_dispatch_indirect(self.cmd(), indirect_buffer.raw(), indirect_offset);
        }
    }

    /// End the compute pass.
    pub fn end(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_values_without_resolve() {
        let clears = [Color::BLACK, Color::TRANSPARENT];
        let values = build_clear_values(&clears, &[false, false], false, 1.0, 0);
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn clear_values_insert_resolve_slots() {
        // One MSAA attachment with a resolve target, one without
        let clears = [Color::BLACK, Color::TRANSPARENT];
        let values = build_clear_values(&clears, &[true, false], false, 1.0, 0);
        assert_eq!(values.len(), 3);
        // The synthetic resolve entry sits right after its color attachment
        unsafe {
            assert_eq!(values[1].color.float32, [0.0; 4]);
        }
    }

    #[test]
    fn clear_values_append_depth_last() {
        let clears = [Color::BLACK];
        let values = build_clear_values(&clears, &[true], true, 0.5, 7);
        assert_eq!(values.len(), 3);
        unsafe {
            assert_eq!(values[2].depth_stencil.depth, 0.5);
            assert_eq!(values[2].depth_stencil.stencil, 7);
        }
    }
}
