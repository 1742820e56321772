//! Deferred reclamation of retired command encoders.
//!
//! Resources referenced by a pending command buffer are still in use by the
//! GPU, so an encoder (and any transient buffers tied to its submission)
//! cannot be destroyed at submit time. Ownership is instead transferred into
//! a [`RetiredQueue`] together with the fence of the submission; draining
//! the queue destroys every entry whose fence has been observed signaled.

use std::collections::VecDeque;

use prism_core::error::Result;

use crate::buffer::Buffer;
use crate::command::CommandEncoder;
use crate::device::Device;
use crate::sync::Fence;

/// Resources retired by one submission.
#[derive(Default)]
pub struct RetiredFrame {
    pub encoders: Vec<CommandEncoder>,
    pub buffers: Vec<Buffer>,
}

struct Retired {
    fence: Fence,
    frame: RetiredFrame,
}

/// FIFO of retired submissions awaiting their fences.
///
/// Retirement order must follow submission order on a queue; only the front
/// entry's fence is polled, matching the in-order completion guarantee of a
/// single queue.
#[derive(Default)]
pub struct RetiredQueue {
    pending: VecDeque<Retired>,
}

impl RetiredQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transfer ownership of a submission's resources and the fence that
    /// proves their completion.
    pub fn retire(&mut self, fence: Fence, frame: RetiredFrame) {
        self.pending.push_back(Retired { fence, frame });
    }

    /// Destroy every entry whose fence is observed signaled. Returns the
    /// number of reclaimed submissions.
    pub fn drain(&mut self, device: &Device) -> Result<usize> {
        let mut reclaimed = 0;

        while let Some(front) = self.pending.front() {
            if !front.fence.status(device)? {
                break;
            }
            let retired = self.pending.pop_front().expect("front just checked");
            // Safety: the fence signaled, the GPU is done with these
            unsafe {
                destroy_retired(device, retired)?;
            }
            reclaimed += 1;
        }

        Ok(reclaimed)
    }

    /// Destroy every entry unconditionally.
    ///
    /// Call during shutdown after `Device::wait_idle` so nothing is pending.
    pub fn flush(&mut self, device: &Device) -> Result<()> {
        while let Some(retired) = self.pending.pop_front() {
            // Safety: the caller waited the device idle
            unsafe {
                destroy_retired(device, retired)?;
            }
        }
        Ok(())
    }

    /// Number of submissions still awaiting their fence.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// # Safety
/// The GPU must be done with every resource in the entry.
unsafe fn destroy_retired(device: &Device, retired: Retired) -> Result<()> {
    let Retired { fence, mut frame } = retired;
    unsafe {
        fence.destroy(device);
        for buffer in &mut frame.buffers {
            buffer.destroy(device)?;
        }
    }
    // Encoders free their pools on drop
    drop(frame.encoders);
    Ok(())
}
