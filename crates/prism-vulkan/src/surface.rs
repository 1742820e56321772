//! Presentation surfaces.
//!
//! Hides the raw-window-handle plumbing behind one constructor and keeps the
//! surface and swapchain extension loaders together with the surface they
//! serve.

use ash::vk;
use prism_core::error::{GfxError, Result};
use prism_core::types::PresentMode;
use prism_core::TextureFormat;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::convert::{format_from_vk, map_vk_result, present_mode_from_vk};
use crate::device::Device;

/// A native presentation surface tied to a platform window.
pub struct Surface {
    raw: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    pub(crate) swapchain_loader: ash::khr::swapchain::Device,
    // Kept alive for the loaders' lifetime
    #[allow(dead_code)]
    entry: ash::Entry,
}

impl Surface {
    /// Create a surface from a window.
    ///
    /// # Safety
    /// The window must outlive the surface and carry valid platform handles.
    pub unsafe fn from_window<W>(device: &Device, window: &W) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GfxError::Unknown(format!("failed to load Vulkan entry: {e}")))?;

        let display = window
            .display_handle()
            .map_err(|e| GfxError::Unknown(format!("failed to get display handle: {e}")))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| GfxError::Unknown(format!("failed to get window handle: {e}")))?;

        let raw = unsafe {
            ash_window::create_surface(
                &entry,
                &device.instance,
                display.as_raw(),
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(map_vk_result)?;

        let surface_loader = ash::khr::surface::Instance::new(&entry, &device.instance);
        let swapchain_loader = ash::khr::swapchain::Device::new(&device.instance, &device.raw);

        Ok(Self {
            raw,
            surface_loader,
            swapchain_loader,
            entry,
        })
    }

    /// Get the raw surface handle.
    #[must_use]
    pub fn raw(&self) -> vk::SurfaceKHR {
        self.raw
    }

    pub(crate) fn loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }

    /// Query the surface's current capabilities.
    pub fn capabilities(&self, device: &Device) -> Result<SurfaceCapabilities> {
        unsafe {
            let capabilities = self
                .surface_loader
                .get_physical_device_surface_capabilities(device.physical_device, self.raw)
                .map_err(map_vk_result)?;

            let formats = self
                .surface_loader
                .get_physical_device_surface_formats(device.physical_device, self.raw)
                .map_err(map_vk_result)?;

            let present_modes = self
                .surface_loader
                .get_physical_device_surface_present_modes(device.physical_device, self.raw)
                .map_err(map_vk_result)?;

            Ok(SurfaceCapabilities {
                capabilities,
                formats,
                present_modes,
            })
        }
    }

    /// Formats the surface can present, mapped into the shared format set.
    pub fn supported_formats(&self, device: &Device) -> Result<Vec<TextureFormat>> {
        let caps = self.capabilities(device)?;
        Ok(caps
            .formats
            .iter()
            .map(|format| format_from_vk(format.format))
            .filter(|format| *format != TextureFormat::Undefined)
            .collect())
    }

    /// Present modes the surface supports.
    pub fn supported_present_modes(&self, device: &Device) -> Result<Vec<PresentMode>> {
        let caps = self.capabilities(device)?;
        Ok(caps
            .present_modes
            .iter()
            .filter_map(|mode| present_mode_from_vk(*mode))
            .collect())
    }

    /// Destroy the surface.
    ///
    /// # Safety
    /// Every swapchain created against this surface must be destroyed first.
    pub unsafe fn destroy(&self) {
        unsafe {
            self.surface_loader.destroy_surface(self.raw, None);
        }
    }
}

/// Raw surface capability query results.
pub struct SurfaceCapabilities {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}
