//! Vulkan instance creation and adapter enumeration.

use std::ffi::{CStr, CString};

use ash::vk;
use prism_core::desc::AdapterOptions;
use prism_core::error::{GfxError, Result};

use crate::adapter::Adapter;
use crate::convert::map_vk_result;

/// Required instance extensions for windowed rendering.
fn required_instance_extensions() -> Vec<&'static CStr> {
    vec![
        ash::khr::surface::NAME,
        #[cfg(target_os = "windows")]
        ash::khr::win32_surface::NAME,
        #[cfg(target_os = "linux")]
        ash::khr::xlib_surface::NAME,
        #[cfg(target_os = "linux")]
        ash::khr::wayland_surface::NAME,
        #[cfg(target_os = "macos")]
        ash::ext::metal_surface::NAME,
        #[cfg(target_os = "macos")]
        ash::khr::portability_enumeration::NAME,
    ]
}

/// Validation layers to enable in debug builds.
fn validation_layers() -> Vec<&'static CStr> {
    vec![c"VK_LAYER_KHRONOS_validation"]
}

/// The entry point of the explicit-sync backend.
///
/// Owns the loaded Vulkan library and the native instance. All adapters and
/// devices derive from an `Instance`; drop every [`crate::Device`] before
/// dropping the `Instance` that created it.
pub struct Instance {
    pub(crate) entry: ash::Entry,
    pub(crate) raw: ash::Instance,
}

/// Builder for creating an [`Instance`].
pub struct InstanceBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for InstanceBuilder {
    fn default() -> Self {
        Self {
            app_name: "Prism".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl InstanceBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name reported to the driver.
    #[must_use]
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Build the instance.
    pub fn build(self) -> Result<Instance> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GfxError::Unknown(format!("failed to load Vulkan: {e}")))?;

        let raw = unsafe { create_instance(&entry, &self.app_name, self.enable_validation) }?;

        Ok(Instance { entry, raw })
    }
}

impl Instance {
    /// Get the raw `ash` instance handle.
    #[must_use]
    pub fn raw(&self) -> &ash::Instance {
        &self.raw
    }

    /// Enumerate all physical adapters, in driver order.
    pub fn enumerate_adapters(&self) -> Result<Vec<Adapter>> {
        let devices = unsafe { self.raw.enumerate_physical_devices() }.map_err(map_vk_result)?;

        Ok(devices
            .into_iter()
            .map(|device| unsafe { Adapter::query(&self.raw, device) })
            .collect())
    }

    /// Select an adapter by explicit index or preference.
    ///
    /// With no index, picks the highest-scoring adapter: discrete GPUs beat
    /// integrated ones (reversed for `LowPower`), more VRAM breaks ties.
    pub fn request_adapter(&self, options: &AdapterOptions) -> Result<Adapter> {
        let mut adapters = self.enumerate_adapters()?;
        if adapters.is_empty() {
            return Err(GfxError::NotFound("no Vulkan adapters present".into()));
        }

        if let Some(index) = options.index {
            let index = index as usize;
            if index >= adapters.len() {
                return Err(GfxError::InvalidArgument(format!(
                    "adapter index {index} out of range ({} adapters)",
                    adapters.len()
                )));
            }
            return Ok(adapters.swap_remove(index));
        }

        let (best, score) = adapters
            .into_iter()
            .map(|adapter| {
                let score = adapter.score(options.preference);
                (adapter, score)
            })
            .max_by_key(|(_, score)| *score)
            .expect("adapter list checked non-empty");

        if score < 0 {
            return Err(GfxError::NotFound("no suitable adapter".into()));
        }

        tracing::info!(name = %best.info().name, "selected adapter");
        Ok(best)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            self.raw.destroy_instance(None);
        }
    }
}

/// Create a Vulkan instance.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    enable_validation: bool,
) -> Result<ash::Instance> {
    let app_name = CString::new(app_name)
        .map_err(|_| GfxError::InvalidArgument("app name contains NUL".into()))?;
    let engine_name = CString::new("Prism").expect("static name");

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(&engine_name)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_2);

    let extension_names: Vec<*const i8> = required_instance_extensions()
        .iter()
        .map(|ext| ext.as_ptr())
        .collect();

    let layers = if enable_validation {
        validation_layers()
    } else {
        vec![]
    };

    // Warn rather than fail when the validation layer is missing; the SDK is
    // not always installed on end-user machines.
    let available_layers = entry
        .enumerate_instance_layer_properties()
        .map_err(map_vk_result)?;
    let layers: Vec<&CStr> = layers
        .into_iter()
        .filter(|layer| {
            let found = available_layers.iter().any(|props| {
                let name = unsafe { CStr::from_ptr(props.layer_name.as_ptr()) };
                name == *layer
            });
            if !found {
                tracing::warn!("validation layer {:?} not available", layer);
            }
            found
        })
        .collect();

    let layer_names: Vec<*const i8> = layers.iter().map(|l| l.as_ptr()).collect();

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(create_flags);

    let instance =
        unsafe { entry.create_instance(&create_info, None) }.map_err(map_vk_result)?;

    Ok(instance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_extension_always_requested() {
        let extensions = required_instance_extensions();
        assert!(extensions.contains(&ash::khr::surface::NAME));
    }
}
