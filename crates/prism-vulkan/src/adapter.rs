//! Physical adapter queries.

use std::ffi::CStr;

use ash::vk;
use prism_core::error::{GfxError, Result};
use prism_core::info::{AdapterInfo, DeviceLimits, QueueFamilyInfo};
use prism_core::types::{AdapterKind, AdapterPreference};

use crate::convert::{map_vk_result, queue_flags_from_vk};
use crate::surface::Surface;

/// A physical GPU, queried up front so metadata reads never touch the driver.
pub struct Adapter {
    pub(crate) physical_device: vk::PhysicalDevice,
    info: AdapterInfo,
    limits: DeviceLimits,
    queue_families: Vec<QueueFamilyInfo>,
    api_version: u32,
    vram_mb: u64,
}

impl Adapter {
    /// Snapshot the adapter's properties.
    ///
    /// # Safety
    /// The instance and physical device must be valid.
    pub(crate) unsafe fn query(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
    ) -> Self {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let families =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        let kind = match properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => AdapterKind::DiscreteGpu,
            vk::PhysicalDeviceType::INTEGRATED_GPU => AdapterKind::IntegratedGpu,
            vk::PhysicalDeviceType::CPU => AdapterKind::Cpu,
            _ => AdapterKind::Unknown,
        };

        let limits = DeviceLimits {
            min_uniform_buffer_offset_alignment: properties
                .limits
                .min_uniform_buffer_offset_alignment
                as u32,
            min_storage_buffer_offset_alignment: properties
                .limits
                .min_storage_buffer_offset_alignment
                as u32,
            max_uniform_buffer_binding_size: properties.limits.max_uniform_buffer_range,
            max_storage_buffer_binding_size: properties.limits.max_storage_buffer_range,
            max_buffer_size: u64::from(properties.limits.max_storage_buffer_range),
            max_texture_dimension_1d: properties.limits.max_image_dimension1_d,
            max_texture_dimension_2d: properties.limits.max_image_dimension2_d,
            max_texture_dimension_3d: properties.limits.max_image_dimension3_d,
            max_texture_array_layers: properties.limits.max_image_array_layers,
        };

        let queue_families = families
            .iter()
            .map(|family| QueueFamilyInfo {
                flags: queue_flags_from_vk(family.queue_flags),
                queue_count: family.queue_count,
            })
            .collect();

        let vram_mb: u64 = memory_properties
            .memory_heaps
            .iter()
            .take(memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size / (1024 * 1024))
            .sum();

        Self {
            physical_device,
            info: AdapterInfo {
                name,
                vendor_id: properties.vendor_id,
                device_id: properties.device_id,
                kind,
                driver_version: properties.driver_version,
            },
            limits,
            queue_families,
            api_version: properties.api_version,
            vram_mb,
        }
    }

    /// Get the raw physical device handle.
    #[must_use]
    pub fn raw(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Identity and classification of this adapter.
    #[must_use]
    pub fn info(&self) -> &AdapterInfo {
        &self.info
    }

    /// Alignment and dimension limits.
    #[must_use]
    pub fn limits(&self) -> DeviceLimits {
        self.limits
    }

    /// Queue family capabilities, indexed by family.
    #[must_use]
    pub fn queue_families(&self) -> &[QueueFamilyInfo] {
        &self.queue_families
    }

    /// Whether the given queue family can present to `surface`.
    pub fn supports_surface(&self, queue_family: u32, surface: &Surface) -> Result<bool> {
        if queue_family as usize >= self.queue_families.len() {
            return Err(GfxError::InvalidArgument(format!(
                "queue family {queue_family} out of range"
            )));
        }
        let supported = unsafe {
            surface.loader().get_physical_device_surface_support(
                self.physical_device,
                queue_family,
                surface.raw(),
            )
        }
        .map_err(map_vk_result)?;
        Ok(supported)
    }

    /// Score this adapter for automatic selection. Negative means unusable.
    pub(crate) fn score(&self, preference: AdapterPreference) -> i64 {
        // Timeline semaphores require Vulkan 1.2
        if vk::api_version_major(self.api_version) < 1
            || (vk::api_version_major(self.api_version) == 1
                && vk::api_version_minor(self.api_version) < 2)
        {
            return -1;
        }

        let kind_score = match (preference, self.info.kind) {
            (AdapterPreference::LowPower, AdapterKind::IntegratedGpu) => 1000,
            (AdapterPreference::LowPower, AdapterKind::DiscreteGpu) => 100,
            (_, AdapterKind::DiscreteGpu) => 1000,
            (_, AdapterKind::IntegratedGpu) => 100,
            (_, AdapterKind::Cpu) => 10,
            (_, AdapterKind::Unknown) => 0,
        };

        // +1 per GiB of device-local memory
        kind_score + (self.vram_mb / 1024) as i64
    }
}
