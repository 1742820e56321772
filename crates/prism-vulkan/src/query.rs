//! Query set objects.

use ash::vk;
use prism_core::desc::QuerySetDescriptor;
use prism_core::error::{GfxError, Result};
use prism_core::types::QueryKind;

use crate::convert::map_vk_result;
use crate::device::Device;

/// A fixed-size pool of occlusion or timestamp queries.
///
/// Queries must be reset (via
/// [`crate::command::CommandEncoder::reset_query_set`]) before first use and
/// between reuses.
pub struct QuerySet {
    raw: vk::QueryPool,
    kind: QueryKind,
    count: u32,
}

impl QuerySet {
    /// Create a query pool.
    pub fn new(device: &Device, descriptor: &QuerySetDescriptor) -> Result<Self> {
        if descriptor.count == 0 {
            return Err(GfxError::InvalidArgument("query count is zero".into()));
        }

        let query_type = match descriptor.kind {
            QueryKind::Occlusion => vk::QueryType::OCCLUSION,
            QueryKind::Timestamp => vk::QueryType::TIMESTAMP,
        };

        let create_info = vk::QueryPoolCreateInfo::default()
            .query_type(query_type)
            .query_count(descriptor.count);

        let raw = unsafe { device.raw.create_query_pool(&create_info, None) }
            .map_err(map_vk_result)?;

        Ok(Self {
            raw,
            kind: descriptor.kind,
            count: descriptor.count,
        })
    }

    /// Get the raw query pool handle.
    #[must_use]
    pub fn raw(&self) -> vk::QueryPool {
        self.raw
    }

    /// The kind of queries in this set.
    #[must_use]
    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    /// Number of queries in this set.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    pub(crate) fn check_index(&self, index: u32) -> Result<()> {
        if index < self.count {
            Ok(())
        } else {
            Err(GfxError::InvalidArgument(format!(
                "query index {index} out of range ({} queries)",
                self.count
            )))
        }
    }

    pub(crate) fn check_range(&self, first: u32, count: u32) -> Result<()> {
        if count == 0 {
            return Err(GfxError::InvalidArgument("query range is empty".into()));
        }
        if first.checked_add(count).map_or(true, |end| end > self.count) {
            return Err(GfxError::InvalidArgument(format!(
                "query range {first}..{} out of range ({} queries)",
                u64::from(first) + u64::from(count),
                self.count
            )));
        }
        Ok(())
    }

    /// Destroy the query pool.
    ///
    /// # Safety
    /// No pending command buffer may reference this query set.
    pub unsafe fn destroy(&self, device: &Device) {
        unsafe {
            device.raw.destroy_query_pool(self.raw, None);
        }
    }
}
