//! Queue submission and host-to-device data upload.

use ash::vk;
use gpu_allocator::MemoryLocation;
use prism_core::error::{GfxError, Result};
use prism_core::types::{Extent3d, Origin3d, SemaphoreKind, TextureLayout};

use crate::buffer::Buffer;
use crate::command::{CommandEncoder, EncoderState};
use crate::convert::{aspect_mask, extent_to_vk, map_vk_result, origin_to_vk};
use crate::device::Device;
use crate::sync::{Fence, Semaphore};
use crate::texture::Texture;

/// A wait performed by a submission before it executes.
#[derive(Clone, Copy)]
pub struct SemaphoreWait<'a> {
    pub semaphore: &'a Semaphore,
    /// Counter value for timeline semaphores; ignored for binary.
    pub value: u64,
}

/// A signal performed by a submission after it executes.
#[derive(Clone, Copy)]
pub struct SemaphoreSignal<'a> {
    pub semaphore: &'a Semaphore,
    /// Counter value for timeline semaphores; ignored for binary.
    pub value: u64,
}

/// One batch of work for [`Queue::submit`].
#[derive(Clone, Copy, Default)]
pub struct Submit<'a> {
    pub command_encoders: &'a [&'a CommandEncoder],
    pub waits: &'a [SemaphoreWait<'a>],
    pub signals: &'a [SemaphoreSignal<'a>],
    /// Signaled by the device once every command buffer completes.
    pub fence: Option<&'a Fence>,
}

/// A non-owning reference to one of the device's queues.
///
/// Copyable; all operations borrow the owning [`Device`]. A single queue must
/// not be submitted to from multiple threads concurrently.
#[derive(Clone, Copy)]
pub struct Queue {
    raw: vk::Queue,
    family: u32,
    index: u32,
}

impl Queue {
    pub(crate) fn new(raw: vk::Queue, family: u32, index: u32) -> Self {
        Self { raw, family, index }
    }

    /// Get the raw queue handle.
    #[must_use]
    pub fn raw(&self) -> vk::Queue {
        self.raw
    }

    /// Queue family this queue belongs to.
    #[must_use]
    pub fn family(&self) -> u32 {
        self.family
    }

    /// Index within the family.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Submit ended command encoders with explicit synchronization.
    ///
    /// Builds one native submission. If any wait or signal semaphore is a
    /// timeline semaphore, the timeline-submit extension struct is chained
    /// with the matching per-semaphore values. The optional fence is signaled
    /// once all command buffers complete.
    pub fn submit(&self, device: &Device, submit: &Submit) -> Result<()> {
        let mut command_buffers = Vec::with_capacity(submit.command_encoders.len());
        for encoder in submit.command_encoders {
            if encoder.state() != EncoderState::Ended {
                return Err(GfxError::InvalidArgument(
                    "submitted encoder has not been ended".into(),
                ));
            }
            command_buffers.push(encoder.raw());
        }

        let mut wait_semaphores = Vec::with_capacity(submit.waits.len());
        let mut wait_stages = Vec::with_capacity(submit.waits.len());
        let mut wait_values = Vec::with_capacity(submit.waits.len());
        let mut has_timeline = false;

        for wait in submit.waits {
            wait_semaphores.push(wait.semaphore.raw());
            wait_stages.push(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
            if wait.semaphore.kind() == SemaphoreKind::Timeline {
                has_timeline = true;
                wait_values.push(wait.value);
            } else {
                wait_values.push(0);
            }
        }

        let mut signal_semaphores = Vec::with_capacity(submit.signals.len());
        let mut signal_values = Vec::with_capacity(submit.signals.len());

        for signal in submit.signals {
            signal_semaphores.push(signal.semaphore.raw());
            if signal.semaphore.kind() == SemaphoreKind::Timeline {
                has_timeline = true;
                signal_values.push(signal.value);
            } else {
                signal_values.push(0);
            }
        }

        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::default()
            .wait_semaphore_values(&wait_values)
            .signal_semaphore_values(&signal_values);

        let mut submit_info = vk::SubmitInfo::default()
            .command_buffers(&command_buffers)
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .signal_semaphores(&signal_semaphores);
        if has_timeline {
            submit_info = submit_info.push_next(&mut timeline_info);
        }

        let fence = submit.fence.map_or(vk::Fence::null(), Fence::raw);

        unsafe { device.raw.queue_submit(self.raw, &[submit_info], fence) }
            .map_err(map_vk_result)
    }

    /// Block the host until this queue is idle.
    pub fn wait_idle(&self, device: &Device) -> Result<()> {
        unsafe { device.raw.queue_wait_idle(self.raw) }.map_err(map_vk_result)
    }

    /// Write bytes into a buffer at `offset`.
    ///
    /// Host-visible destinations are written through the mapping directly.
    /// Device-local destinations go through a transient staging buffer and a
    /// one-shot copy that BLOCKS until the GPU finishes; convenient for
    /// setup work, too slow for per-frame streaming.
    pub fn write_buffer(
        &self,
        device: &Device,
        buffer: &Buffer,
        offset: u64,
        data: &[u8],
    ) -> Result<()> {
        if data.is_empty() {
            return Err(GfxError::InvalidArgument("write of zero bytes".into()));
        }
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or_else(|| GfxError::InvalidArgument("write range overflows".into()))?;
        if end > buffer.info().size {
            return Err(GfxError::InvalidArgument(format!(
                "write of {} bytes at offset {offset} exceeds buffer size {}",
                data.len(),
                buffer.info().size
            )));
        }

        if buffer.is_host_visible() {
            return buffer.write_direct(offset, data);
        }

        // Staging path: device-local memory the host cannot map
        let mut staging = device.allocator.lock().create_buffer(
            data.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
            "prism staging (buffer write)",
        )?;
        staging.write_bytes(0, data)?;

        let result = self.execute_one_shot(device, |raw_device, cmd| {
            let region = vk::BufferCopy::default()
                .src_offset(0)
                .dst_offset(offset)
                .size(data.len() as u64);
            unsafe {
                raw_device.cmd_copy_buffer(cmd, staging.buffer, buffer.raw(), &[region]);
            }
            Ok(())
        });

        let free_result = device.allocator.lock().free_buffer(&mut staging);
        result.and(free_result)
    }

    /// Write a slice of plain-old-data values through
    /// [`Queue::write_buffer`].
    pub fn write_buffer_typed<T: bytemuck::Pod>(
        &self,
        device: &Device,
        buffer: &Buffer,
        offset: u64,
        data: &[T],
    ) -> Result<()> {
        self.write_buffer(device, buffer, offset, bytemuck::cast_slice(data))
    }

    /// Write texels into one mip level of a texture.
    ///
    /// Always staged: the data is copied into a transient host-visible
    /// buffer, then a one-shot command buffer transitions the level to
    /// `TransferDst`, copies, and transitions to `final_layout`. Blocks until
    /// the copy completes.
    #[allow(clippy::too_many_arguments)]
    pub fn write_texture(
        &self,
        device: &Device,
        texture: &Texture,
        origin: Origin3d,
        mip_level: u32,
        data: &[u8],
        extent: Extent3d,
        final_layout: TextureLayout,
    ) -> Result<()> {
        if data.is_empty() {
            return Err(GfxError::InvalidArgument("write of zero bytes".into()));
        }
        let info = texture.info();
        if mip_level >= info.mip_level_count {
            return Err(GfxError::InvalidArgument(format!(
                "mip level {mip_level} out of range ({} levels)",
                info.mip_level_count
            )));
        }
        let required = u64::from(extent.width)
            * u64::from(extent.height)
            * u64::from(extent.depth)
            * u64::from(info.format.bytes_per_pixel());
        if (data.len() as u64) < required {
            return Err(GfxError::InvalidArgument(format!(
                "{} bytes supplied, extent requires {required}",
                data.len()
            )));
        }

        let mut staging = device.allocator.lock().create_buffer(
            data.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
            "prism staging (texture write)",
        )?;
        staging.write_bytes(0, data)?;

        let result = self.execute_one_shot(device, |raw_device, cmd| {
            texture.record_transition(
                raw_device,
                cmd,
                TextureLayout::TransferDst,
                mip_level,
                1,
                0,
                1,
            );

            let region = vk::BufferImageCopy::default()
                .buffer_offset(0)
                .buffer_row_length(0) // tightly packed
                .buffer_image_height(0)
                .image_subresource(
                    vk::ImageSubresourceLayers::default()
                        .aspect_mask(aspect_mask(info.format))
                        .mip_level(mip_level)
                        .base_array_layer(0)
                        .layer_count(1),
                )
                .image_offset(origin_to_vk(origin))
                .image_extent(extent_to_vk(extent));
            unsafe {
                raw_device.cmd_copy_buffer_to_image(
                    cmd,
                    staging.buffer,
                    texture.raw(),
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            }

            texture.record_transition(raw_device, cmd, final_layout, mip_level, 1, 0, 1);
            Ok(())
        });

        let free_result = device.allocator.lock().free_buffer(&mut staging);
        result.and(free_result)
    }

    /// Record, submit and synchronously wait for a single command buffer on a
    /// transient pool. The fence wait is what makes the upload paths safe to
    /// tear down immediately afterwards.
    pub(crate) fn execute_one_shot<F>(&self, device: &Device, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer) -> Result<()>,
    {
        let raw_device = &*device.raw;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(self.family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let pool = unsafe { raw_device.create_command_pool(&pool_info, None) }
            .map_err(map_vk_result)?;

        // Everything below must destroy the pool on the way out.
        let result = (|| {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let cmd = unsafe { raw_device.allocate_command_buffers(&alloc_info) }
                .map_err(map_vk_result)?[0];

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            unsafe { raw_device.begin_command_buffer(cmd, &begin_info) }
                .map_err(map_vk_result)?;

            record(raw_device, cmd)?;

            unsafe { raw_device.end_command_buffer(cmd) }.map_err(map_vk_result)?;

            let fence_info = vk::FenceCreateInfo::default();
            let fence = unsafe { raw_device.create_fence(&fence_info, None) }
                .map_err(map_vk_result)?;

            let buffers = [cmd];
            let submit_info = vk::SubmitInfo::default().command_buffers(&buffers);
            let submit_result = unsafe {
                raw_device
                    .queue_submit(self.raw, &[submit_info], fence)
                    .map_err(map_vk_result)
                    .and_then(|()| {
                        raw_device
                            .wait_for_fences(&[fence], true, u64::MAX)
                            .map_err(map_vk_result)
                    })
            };
            unsafe { raw_device.destroy_fence(fence, None) };
            submit_result
        })();

        unsafe { raw_device.destroy_command_pool(pool, None) };
        result
    }
}
