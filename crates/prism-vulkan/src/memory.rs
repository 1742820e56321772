//! GPU memory management.

use ash::vk;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation;
use prism_core::error::{GfxError, Result};
use prism_core::flags::{BufferUsages, MemoryProperties};

use crate::convert::map_vk_result;

/// Pick the allocator location satisfying the requested memory properties.
///
/// Host-visible requests get persistently mapped upload memory; map-read
/// buffers get readback memory; everything else is device-local.
pub(crate) fn memory_location(memory: MemoryProperties, usage: BufferUsages) -> MemoryLocation {
    if usage.contains(BufferUsages::MAP_READ) {
        MemoryLocation::GpuToCpu
    } else if memory.contains(MemoryProperties::HOST_VISIBLE)
        || usage.contains(BufferUsages::MAP_WRITE)
    {
        MemoryLocation::CpuToGpu
    } else {
        MemoryLocation::GpuOnly
    }
}

/// GPU memory allocator wrapper.
pub(crate) struct GpuAllocator {
    allocator: Option<Allocator>,
    device: ash::Device,
}

impl GpuAllocator {
    /// Create a new allocator.
    ///
    /// # Safety
    /// The instance, device, and physical device must be valid.
    pub(crate) unsafe fn new(
        instance: &ash::Instance,
        device: ash::Device,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: gpu_allocator::AllocatorDebugSettings {
                log_memory_information: cfg!(debug_assertions),
                log_leaks_on_shutdown: true,
                store_stack_traces: cfg!(debug_assertions),
                log_allocations: false,
                log_frees: false,
                log_stack_traces: false,
            },
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|_| GfxError::OutOfMemory)?;

        Ok(Self {
            allocator: Some(allocator),
            device,
        })
    }

    fn inner(&mut self) -> Result<&mut Allocator> {
        self.allocator
            .as_mut()
            .ok_or_else(|| GfxError::Unknown("allocator already shut down".into()))
    }

    /// Allocate a buffer with backing memory.
    pub(crate) fn create_buffer(
        &mut self,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
        name: &str,
    ) -> Result<GpuBuffer> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None) }
            .map_err(map_vk_result)?;

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let allocation = match self.inner().and_then(|allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name,
                    requirements,
                    location,
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|_| GfxError::OutOfMemory)
        }) {
            Ok(allocation) => allocation,
            Err(e) => {
                // Tear down the partially constructed buffer before surfacing
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        } {
            let _ = self.inner().map(|a| a.free(allocation));
            unsafe { self.device.destroy_buffer(buffer, None) };
            return Err(map_vk_result(e));
        }

        Ok(GpuBuffer {
            buffer,
            allocation: Some(allocation),
            size,
        })
    }

    /// Free a buffer allocation.
    pub(crate) fn free_buffer(&mut self, buffer: &mut GpuBuffer) -> Result<()> {
        if let Some(allocation) = buffer.allocation.take() {
            self.inner()?
                .free(allocation)
                .map_err(|e| GfxError::Unknown(e.to_string()))?;
        }

        unsafe {
            self.device.destroy_buffer(buffer.buffer, None);
        }
        buffer.buffer = vk::Buffer::null();

        Ok(())
    }

    /// Allocate an image with backing memory.
    pub(crate) fn create_image(
        &mut self,
        create_info: &vk::ImageCreateInfo,
        location: MemoryLocation,
        name: &str,
    ) -> Result<GpuImage> {
        let image = unsafe { self.device.create_image(create_info, None) }
            .map_err(map_vk_result)?;

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };

        let allocation = match self.inner().and_then(|allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name,
                    requirements,
                    location,
                    linear: false,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|_| GfxError::OutOfMemory)
        }) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe {
            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        } {
            let _ = self.inner().map(|a| a.free(allocation));
            unsafe { self.device.destroy_image(image, None) };
            return Err(map_vk_result(e));
        }

        Ok(GpuImage {
            image,
            allocation: Some(allocation),
        })
    }

    /// Free an image allocation.
    pub(crate) fn free_image(&mut self, image: &mut GpuImage) -> Result<()> {
        if let Some(allocation) = image.allocation.take() {
            self.inner()?
                .free(allocation)
                .map_err(|e| GfxError::Unknown(e.to_string()))?;
        }

        unsafe {
            self.device.destroy_image(image.image, None);
        }
        image.image = vk::Image::null();

        Ok(())
    }

    /// Shutdown the allocator, freeing all GPU memory.
    ///
    /// This must be called before the Vulkan device is destroyed. Any
    /// remaining allocations are freed and logged as leaks.
    pub(crate) fn shutdown(&mut self) {
        if let Some(allocator) = self.allocator.take() {
            drop(allocator);
        }
    }
}

impl Drop for GpuAllocator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A raw buffer with its allocation.
pub(crate) struct GpuBuffer {
    pub(crate) buffer: vk::Buffer,
    pub(crate) allocation: Option<Allocation>,
    pub(crate) size: u64,
}

impl GpuBuffer {
    /// Persistently mapped pointer, present for host-visible locations.
    pub(crate) fn mapped_ptr(&self) -> Option<*mut u8> {
        self.allocation
            .as_ref()
            .and_then(gpu_allocator::vulkan::Allocation::mapped_ptr)
            .map(|p| p.as_ptr().cast::<u8>())
    }

    /// Write raw bytes at the given offset (must be host-visible).
    pub(crate) fn write_bytes(&self, offset: u64, data: &[u8]) -> Result<()> {
        let ptr = self
            .mapped_ptr()
            .ok_or_else(|| GfxError::InvalidArgument("buffer memory is not mapped".into()))?;

        let end = offset
            .checked_add(data.len() as u64)
            .ok_or_else(|| GfxError::InvalidArgument("write range overflows".into()))?;
        if end > self.size {
            return Err(GfxError::InvalidArgument(format!(
                "write of {} bytes at offset {offset} exceeds buffer size {}",
                data.len(),
                self.size
            )));
        }

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(offset as usize), data.len());
        }

        Ok(())
    }

}

/// A raw image with its allocation.
pub(crate) struct GpuImage {
    pub(crate) image: vk::Image,
    pub(crate) allocation: Option<Allocation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_selection() {
        assert_eq!(
            memory_location(MemoryProperties::DEVICE_LOCAL, BufferUsages::VERTEX),
            MemoryLocation::GpuOnly
        );
        assert_eq!(
            memory_location(MemoryProperties::HOST_VISIBLE, BufferUsages::UNIFORM),
            MemoryLocation::CpuToGpu
        );
        assert_eq!(
            memory_location(MemoryProperties::empty(), BufferUsages::MAP_WRITE),
            MemoryLocation::CpuToGpu
        );
        assert_eq!(
            memory_location(MemoryProperties::HOST_VISIBLE, BufferUsages::MAP_READ),
            MemoryLocation::GpuToCpu
        );
    }
}
