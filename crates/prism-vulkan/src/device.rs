//! Logical device creation and lifetime.

use std::collections::BTreeMap;
use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;
use prism_core::desc::{DeviceDescriptor, QueueRequest};
use prism_core::error::{GfxError, Result};
use prism_core::flags::QueueFlags;
use prism_core::info::DeviceLimits;

use crate::adapter::Adapter;
use crate::convert::map_vk_result;
use crate::instance::Instance;
use crate::memory::GpuAllocator;
use crate::queue::Queue;

/// Required device extensions.
fn required_device_extensions() -> Vec<&'static std::ffi::CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// The logical GPU context.
///
/// Exclusively owns the native device and the queues created against it.
/// Resources hold no back-reference; every operation that needs the device
/// takes `&Device`. Destroy (drop) only after all submitted work is idle and
/// all resources created from it have been destroyed.
pub struct Device {
    pub(crate) raw: Arc<ash::Device>,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) allocator: Mutex<GpuAllocator>,
    limits: DeviceLimits,
    queues: Vec<Queue>,
}

impl Adapter {
    /// Create a logical device with the requested queues.
    ///
    /// An empty request list creates one queue on the first graphics-capable
    /// family; that queue is always the default. Timeline semaphores
    /// (Vulkan 1.2) are enabled unconditionally.
    pub fn create_device(
        &self,
        instance: &Instance,
        descriptor: &DeviceDescriptor,
    ) -> Result<Device> {
        let requests = if descriptor.queue_requests.is_empty() {
            vec![QueueRequest {
                family: self.default_graphics_family()?,
                index: 0,
                priority: 1.0,
            }]
        } else {
            descriptor.queue_requests.to_vec()
        };

        // Group priorities per family; queue indices must be dense from 0.
        let mut per_family: BTreeMap<u32, Vec<f32>> = BTreeMap::new();
        for request in &requests {
            if request.family as usize >= self.queue_families().len() {
                return Err(GfxError::InvalidArgument(format!(
                    "queue family {} out of range",
                    request.family
                )));
            }
            let priorities = per_family.entry(request.family).or_default();
            if request.index as usize != priorities.len() {
                return Err(GfxError::InvalidArgument(format!(
                    "queue indices for family {} must be contiguous from 0",
                    request.family
                )));
            }
            priorities.push(request.priority);
        }

        for (family, priorities) in &per_family {
            let available = self.queue_families()[*family as usize].queue_count;
            if priorities.len() as u32 > available {
                return Err(GfxError::InvalidArgument(format!(
                    "family {family} provides {available} queues, {} requested",
                    priorities.len()
                )));
            }
        }

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = per_family
            .iter()
            .map(|(family, priorities)| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(*family)
                    .queue_priorities(priorities)
            })
            .collect();

        let extensions = required_device_extensions();
        let extension_names: Vec<*const i8> = extensions.iter().map(|ext| ext.as_ptr()).collect();

        let mut vulkan_1_2_features =
            vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true);

        let features = vk::PhysicalDeviceFeatures::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::default()
            .features(features)
            .push_next(&mut vulkan_1_2_features);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .push_next(&mut features2);

        let raw = unsafe {
            instance
                .raw
                .create_device(self.physical_device, &device_create_info, None)
        }
        .map_err(map_vk_result)?;

        let allocator = match unsafe {
            GpuAllocator::new(&instance.raw, raw.clone(), self.physical_device)
        } {
            Ok(allocator) => allocator,
            Err(e) => {
                // Tear down the device before surfacing the failure
                unsafe { raw.destroy_device(None) };
                return Err(e);
            }
        };

        let queues = requests
            .iter()
            .map(|request| {
                let handle = unsafe { raw.get_device_queue(request.family, request.index) };
                Queue::new(handle, request.family, request.index)
            })
            .collect();

        tracing::info!(
            adapter = %self.info().name,
            queues = requests.len(),
            "created device"
        );

        Ok(Device {
            raw: Arc::new(raw),
            instance: instance.raw.clone(),
            physical_device: self.physical_device,
            allocator: Mutex::new(allocator),
            limits: self.limits(),
            queues,
        })
    }

    /// First queue family advertising graphics support.
    fn default_graphics_family(&self) -> Result<u32> {
        self.queue_families()
            .iter()
            .position(|family| family.flags.contains(QueueFlags::GRAPHICS))
            .map(|index| index as u32)
            .ok_or_else(|| GfxError::NotFound("no graphics-capable queue family".into()))
    }
}

impl Device {
    /// Get the raw `ash` device handle.
    #[must_use]
    pub fn raw(&self) -> &ash::Device {
        &self.raw
    }

    /// Get the physical device this device was created from.
    #[must_use]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// The default queue. One always exists.
    #[must_use]
    pub fn default_queue(&self) -> Queue {
        self.queues[0]
    }

    /// Look up a queue by family and index.
    pub fn queue(&self, family: u32, index: u32) -> Result<Queue> {
        self.queues
            .iter()
            .copied()
            .find(|queue| queue.family() == family && queue.index() == index)
            .ok_or_else(|| {
                GfxError::NotFound(format!("no queue created for family {family} index {index}"))
            })
    }

    /// Alignment and dimension limits of the underlying adapter.
    #[must_use]
    pub fn limits(&self) -> DeviceLimits {
        self.limits
    }

    /// Block the host until all submitted work on every queue completes.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.raw.device_wait_idle() }.map_err(map_vk_result)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            let _ = self.raw.device_wait_idle();

            // Shutdown allocator BEFORE destroying the device; this frees all
            // remaining VkDeviceMemory allocations.
            self.allocator.lock().shutdown();

            self.raw.destroy_device(None);
        }
    }
}
