//! Fences and semaphores.

use ash::vk;
use prism_core::desc::{FenceDescriptor, SemaphoreDescriptor};
use prism_core::error::{GfxError, Result};
use prism_core::types::SemaphoreKind;

use crate::convert::map_vk_result;
use crate::device::Device;

/// A binary host-device fence. Signaled by the device at submit completion,
/// observed and reset by the host.
pub struct Fence {
    raw: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled.
    pub fn new(device: &Device, descriptor: &FenceDescriptor) -> Result<Self> {
        let flags = if descriptor.signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let raw = unsafe { device.raw.create_fence(&create_info, None) }
            .map_err(map_vk_result)?;
        Ok(Self { raw })
    }

    /// Get the raw fence handle.
    #[must_use]
    pub fn raw(&self) -> vk::Fence {
        self.raw
    }

    /// Whether the fence is currently signaled.
    pub fn status(&self, device: &Device) -> Result<bool> {
        match unsafe { device.raw.get_fence_status(self.raw) } {
            Ok(signaled) => Ok(signaled),
            Err(e) => Err(map_vk_result(e)),
        }
    }

    /// Block the host until the fence signals or `timeout_ns` elapses.
    ///
    /// A zero timeout polls: it returns immediately, with `Timeout` if the
    /// fence is unsignaled.
    pub fn wait(&self, device: &Device, timeout_ns: u64) -> Result<()> {
        unsafe { device.raw.wait_for_fences(&[self.raw], true, timeout_ns) }
            .map_err(map_vk_result)
    }

    /// Return the fence to the unsignaled state.
    ///
    /// Only call after observing the signal; resetting a fence that is still
    /// pending on a queue is undefined.
    pub fn reset(&self, device: &Device) -> Result<()> {
        unsafe { device.raw.reset_fences(&[self.raw]) }.map_err(map_vk_result)
    }

    /// Destroy the fence.
    ///
    /// # Safety
    /// The fence must not be pending on any queue.
    pub unsafe fn destroy(&self, device: &Device) {
        unsafe {
            device.raw.destroy_fence(self.raw, None);
        }
    }
}

/// A device synchronization primitive: binary (submission-only signal/wait
/// pairs) or timeline (monotonic counter, host- and device-signalable).
pub struct Semaphore {
    raw: vk::Semaphore,
    kind: SemaphoreKind,
}

impl Semaphore {
    /// Create a semaphore of the requested kind.
    pub fn new(device: &Device, descriptor: &SemaphoreDescriptor) -> Result<Self> {
        let raw = match descriptor.kind {
            SemaphoreKind::Timeline => {
                let mut timeline_info = vk::SemaphoreTypeCreateInfo::default()
                    .semaphore_type(vk::SemaphoreType::TIMELINE)
                    .initial_value(descriptor.initial_value);
                let create_info =
                    vk::SemaphoreCreateInfo::default().push_next(&mut timeline_info);
                unsafe { device.raw.create_semaphore(&create_info, None) }
            }
            SemaphoreKind::Binary => {
                let create_info = vk::SemaphoreCreateInfo::default();
                unsafe { device.raw.create_semaphore(&create_info, None) }
            }
        }
        .map_err(map_vk_result)?;

        Ok(Self {
            raw,
            kind: descriptor.kind,
        })
    }

    /// Get the raw semaphore handle.
    #[must_use]
    pub fn raw(&self) -> vk::Semaphore {
        self.raw
    }

    /// Which variant this semaphore is.
    #[must_use]
    pub fn kind(&self) -> SemaphoreKind {
        self.kind
    }

    /// Host-side signal of a timeline semaphore to `value`.
    ///
    /// Signals never move the counter backward: a value at or below the
    /// current counter is a successful no-op. Binary semaphores can only be
    /// signaled through submission and reject this call.
    pub fn signal(&self, device: &Device, value: u64) -> Result<()> {
        if self.kind != SemaphoreKind::Timeline {
            return Err(GfxError::InvalidArgument(
                "binary semaphores cannot be signaled from the host".into(),
            ));
        }

        if value <= self.value(device)? {
            return Ok(());
        }

        let signal_info = vk::SemaphoreSignalInfo::default()
            .semaphore(self.raw)
            .value(value);
        unsafe { device.raw.signal_semaphore(&signal_info) }.map_err(map_vk_result)
    }

    /// Block the host until the counter reaches `value` or `timeout_ns`
    /// elapses (`Timeout`). Timeline semaphores only.
    pub fn wait(&self, device: &Device, value: u64, timeout_ns: u64) -> Result<()> {
        if self.kind != SemaphoreKind::Timeline {
            return Err(GfxError::InvalidArgument(
                "binary semaphores cannot be waited from the host".into(),
            ));
        }

        let semaphores = [self.raw];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        unsafe { device.raw.wait_semaphores(&wait_info, timeout_ns) }.map_err(map_vk_result)
    }

    /// Read the current counter. Timeline semaphores only.
    pub fn value(&self, device: &Device) -> Result<u64> {
        if self.kind != SemaphoreKind::Timeline {
            return Err(GfxError::InvalidArgument(
                "binary semaphores have no counter".into(),
            ));
        }
        unsafe { device.raw.get_semaphore_counter_value(self.raw) }.map_err(map_vk_result)
    }

    /// Destroy the semaphore.
    ///
    /// # Safety
    /// The semaphore must not be referenced by any pending submission.
    pub unsafe fn destroy(&self, device: &Device) {
        unsafe {
            device.raw.destroy_semaphore(self.raw, None);
        }
    }
}
