//! Buffer objects.

use std::ptr::NonNull;

use ash::vk;
use parking_lot::Mutex;
use prism_core::desc::BufferDescriptor;
use prism_core::error::{GfxError, Result};
use prism_core::flags::{BufferUsages, MemoryProperties};
use prism_core::info::BufferInfo;
use prism_core::types::WHOLE_SIZE;

use crate::convert::{buffer_usage_to_vk, map_vk_result};
use crate::device::Device;
use crate::memory::{memory_location, GpuBuffer};

/// A GPU buffer and, when created rather than imported, its memory.
///
/// The mapped pointer returned by [`Buffer::map`] is valid only until
/// [`Buffer::unmap`]; unmapping invalidates it.
pub struct Buffer {
    inner: GpuBuffer,
    info: BufferInfo,
    owned: bool,
    mapped: Mutex<bool>,
}

impl Buffer {
    /// Create a buffer with freshly allocated memory.
    ///
    /// Host-visible requests select persistently mappable memory; all other
    /// buffers are device-local and reachable only through transfer
    /// commands. Fails with `OutOfMemory` when no compatible memory exists.
    pub fn new(device: &Device, descriptor: &BufferDescriptor) -> Result<Self> {
        if descriptor.size == 0 {
            return Err(GfxError::InvalidArgument("buffer size is zero".into()));
        }
        if descriptor.usage.is_empty() {
            return Err(GfxError::InvalidArgument("buffer usage is empty".into()));
        }

        let location = memory_location(descriptor.memory, descriptor.usage);
        let inner = device.allocator.lock().create_buffer(
            descriptor.size,
            buffer_usage_to_vk(descriptor.usage),
            location,
            descriptor.label.unwrap_or("prism buffer"),
        )?;

        let mut memory = descriptor.memory;
        if inner.mapped_ptr().is_some() {
            memory |= MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT;
        } else {
            memory |= MemoryProperties::DEVICE_LOCAL;
        }

        Ok(Self {
            inner,
            info: BufferInfo {
                size: descriptor.size,
                usage: descriptor.usage,
                memory,
            },
            owned: true,
            mapped: Mutex::new(false),
        })
    }

    /// Wrap an externally created buffer without taking ownership of its
    /// memory. The caller keeps the native handle alive and destroys it.
    pub fn import(
        _device: &Device,
        raw: vk::Buffer,
        size: u64,
        usage: BufferUsages,
    ) -> Result<Self> {
        if raw == vk::Buffer::null() {
            return Err(GfxError::InvalidArgument("imported buffer is null".into()));
        }
        if size == 0 {
            return Err(GfxError::InvalidArgument("buffer size is zero".into()));
        }

        Ok(Self {
            inner: GpuBuffer {
                buffer: raw,
                allocation: None,
                size,
            },
            info: BufferInfo {
                size,
                usage,
                memory: MemoryProperties::DEVICE_LOCAL,
            },
            owned: false,
            mapped: Mutex::new(false),
        })
    }

    /// Get the raw buffer handle.
    #[must_use]
    pub fn raw(&self) -> vk::Buffer {
        self.inner.buffer
    }

    /// Size, usage and resolved memory properties.
    #[must_use]
    pub fn info(&self) -> BufferInfo {
        self.info
    }

    /// Whether the backing memory can be written through a host mapping.
    #[must_use]
    pub fn is_host_visible(&self) -> bool {
        self.inner.mapped_ptr().is_some()
    }

    /// Map `size` bytes starting at `offset` ([`WHOLE_SIZE`] maps to the
    /// end). The pointer is invalidated by [`Buffer::unmap`].
    pub fn map(&self, offset: u64, size: u64) -> Result<NonNull<u8>> {
        let ptr = self.inner.mapped_ptr().ok_or_else(|| {
            GfxError::InvalidArgument("buffer memory is not host-visible".into())
        })?;

        let size = if size == WHOLE_SIZE {
            self.info.size.checked_sub(offset).ok_or_else(|| {
                GfxError::InvalidArgument("map offset exceeds buffer size".into())
            })?
        } else {
            size
        };
        let end = offset
            .checked_add(size)
            .ok_or_else(|| GfxError::InvalidArgument("map range overflows".into()))?;
        if end > self.info.size {
            return Err(GfxError::InvalidArgument(format!(
                "map range {offset}..{end} exceeds buffer size {}",
                self.info.size
            )));
        }

        let mut mapped = self.mapped.lock();
        if *mapped {
            return Err(GfxError::InvalidArgument("buffer is already mapped".into()));
        }
        *mapped = true;

        // Safety: offset is within the allocation, checked above
        NonNull::new(unsafe { ptr.add(offset as usize) })
            .ok_or_else(|| GfxError::Unknown("mapping produced a null pointer".into()))
    }

    /// Invalidate the pointer handed out by [`Buffer::map`].
    pub fn unmap(&self) -> Result<()> {
        let mut mapped = self.mapped.lock();
        if !*mapped {
            return Err(GfxError::InvalidArgument("buffer is not mapped".into()));
        }
        *mapped = false;
        Ok(())
    }

    /// Flush host writes in a mapped range to the device.
    ///
    /// A no-op in effect on coherent upload memory; required for cached
    /// readback heaps.
    pub fn flush_mapped_range(&self, device: &Device, _offset: u64, _size: u64) -> Result<()> {
        self.sync_mapped_range(device, true)
    }

    /// Make device writes in a mapped range visible to the host.
    pub fn invalidate_mapped_range(&self, device: &Device, _offset: u64, _size: u64) -> Result<()> {
        self.sync_mapped_range(device, false)
    }

    fn sync_mapped_range(&self, device: &Device, flush: bool) -> Result<()> {
        let Some(allocation) = self.inner.allocation.as_ref() else {
            return Err(GfxError::InvalidArgument(
                "imported buffers have no mappable memory".into(),
            ));
        };
        if allocation.mapped_ptr().is_none() {
            return Err(GfxError::InvalidArgument(
                "buffer memory is not host-visible".into(),
            ));
        }

        // Ranges must be aligned to nonCoherentAtomSize; cover the whole
        // memory block instead of tracking the limit per device.
        let range = vk::MappedMemoryRange::default()
            .memory(unsafe { allocation.memory() })
            .offset(0)
            .size(vk::WHOLE_SIZE);

        let result = if flush {
            unsafe { device.raw.flush_mapped_memory_ranges(&[range]) }
        } else {
            unsafe { device.raw.invalidate_mapped_memory_ranges(&[range]) }
        };
        result.map_err(map_vk_result)
    }

    /// Internal direct write used by the upload paths; bypasses the
    /// map/unmap bookkeeping.
    pub(crate) fn write_direct(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.inner.write_bytes(offset, data)
    }

    /// Destroy the buffer, returning owned memory to the allocator.
    ///
    /// # Safety
    /// The buffer must not be referenced by any command buffer still
    /// pending on the GPU.
    pub unsafe fn destroy(&mut self, device: &Device) -> Result<()> {
        if self.owned {
            device.allocator.lock().free_buffer(&mut self.inner)
        } else {
            // Imported: the caller owns the native handle
            self.inner.buffer = vk::Buffer::null();
            Ok(())
        }
    }
}
