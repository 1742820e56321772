//! Shader module objects.

use ash::vk;
use prism_core::desc::ShaderDescriptor;
use prism_core::error::{GfxError, Result};

use crate::convert::map_vk_result;
use crate::device::Device;

/// A compiled SPIR-V shader module.
///
/// This backend consumes SPIR-V words only; textual shader sources belong to
/// the implicit-sync backend.
pub struct Shader {
    raw: vk::ShaderModule,
    entry_point: String,
}

impl Shader {
    /// Create a shader module from SPIR-V words.
    pub fn new(device: &Device, descriptor: &ShaderDescriptor) -> Result<Self> {
        if descriptor.spirv.is_empty() {
            return Err(GfxError::InvalidArgument("shader code is empty".into()));
        }
        if descriptor.entry_point.is_empty() {
            return Err(GfxError::InvalidArgument("entry point is empty".into()));
        }

        let create_info = vk::ShaderModuleCreateInfo::default().code(descriptor.spirv);
        let raw = unsafe { device.raw.create_shader_module(&create_info, None) }
            .map_err(map_vk_result)?;

        if let Some(label) = descriptor.label {
            tracing::trace!(label, words = descriptor.spirv.len(), "created shader");
        }

        Ok(Self {
            raw,
            entry_point: descriptor.entry_point.to_owned(),
        })
    }

    /// Get the raw shader module handle.
    #[must_use]
    pub fn raw(&self) -> vk::ShaderModule {
        self.raw
    }

    /// The entry point this module was created with.
    #[must_use]
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Destroy the module. Pipelines created from it stay valid.
    ///
    /// # Safety
    /// No pipeline creation call may be using this module concurrently.
    pub unsafe fn destroy(&self, device: &Device) {
        unsafe {
            device.raw.destroy_shader_module(self.raw, None);
        }
    }
}
