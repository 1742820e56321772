//! Swapchain management and presentation.

use ash::vk;
use prism_core::desc::{SwapchainDescriptor, TextureViewDescriptor};
use prism_core::error::{GfxError, Result};
use prism_core::flags::TextureUsages;
use prism_core::info::{SwapchainInfo, TextureInfo};
use prism_core::types::{
    Extent3d, PresentMode, SampleCount, SemaphoreKind, TextureDimension,
};
use prism_core::TextureFormat;

use crate::convert::{
    format_from_vk, format_to_vk, map_vk_result, present_mode_from_vk, present_mode_to_vk,
    texture_usage_to_vk,
};
use crate::device::Device;
use crate::queue::Queue;
use crate::surface::Surface;
use crate::sync::{Fence, Semaphore};
use crate::texture::{Texture, TextureView};

/// Host-tracked presentation state.
///
/// `OutOfDate` and `Lost` are sticky: once entered, every acquire fails with
/// the same error until the swapchain is recreated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    /// No image is held; acquire is legal.
    Ready,
    /// An image is held; present is legal.
    Acquired,
    /// The surface changed; recreate the swapchain.
    OutOfDate,
    /// The surface is gone; recreate surface and swapchain.
    Lost,
}

/// A ring of presentable images tied to one surface and one device.
pub struct Swapchain {
    raw: vk::SwapchainKHR,
    loader: ash::khr::swapchain::Device,
    textures: Vec<Texture>,
    views: Vec<TextureView>,
    info: SwapchainInfo,
    state: SwapchainState,
    current_image_index: u32,
}

impl Swapchain {
    /// Create a swapchain, clamping the request to surface capabilities.
    ///
    /// Pass the outgoing swapchain as `old_swapchain` during recreation so
    /// the driver can recycle its images.
    pub fn new(
        device: &Device,
        surface: &Surface,
        descriptor: &SwapchainDescriptor,
        old_swapchain: Option<&Self>,
    ) -> Result<Self> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(GfxError::InvalidArgument("swapchain extent is zero".into()));
        }

        let caps = surface.capabilities(device)?;
        if caps.formats.is_empty() {
            return Err(GfxError::Unknown("surface reports no formats".into()));
        }

        let surface_format = choose_format(&caps.formats, descriptor.format);
        let present_mode = choose_present_mode(&caps.present_modes, descriptor.present_mode);
        let extent = clamp_extent(&caps.capabilities, descriptor.width, descriptor.height);
        let image_count = clamp_image_count(&caps.capabilities, descriptor.image_count);

        let usage = descriptor.usage | TextureUsages::RENDER_ATTACHMENT;
        let format = format_from_vk(surface_format.format);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.raw())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(texture_usage_to_vk(usage, format))
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain.map_or(vk::SwapchainKHR::null(), |old| old.raw));

        let loader = surface.swapchain_loader.clone();
        let raw = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(map_vk_result)?;

        let images = match unsafe { loader.get_swapchain_images(raw) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { loader.destroy_swapchain(raw, None) };
                return Err(map_vk_result(e));
            }
        };

        let texture_info = TextureInfo {
            dimension: TextureDimension::D2,
            size: Extent3d::new(extent.width, extent.height, 1),
            array_layers: 1,
            mip_level_count: 1,
            sample_count: SampleCount::X1,
            format,
            usage,
        };

        let textures: Vec<Texture> = images
            .iter()
            .map(|&image| Texture::wrap(image, texture_info))
            .collect();

        let mut views = Vec::with_capacity(textures.len());
        for texture in &textures {
            match texture.create_view(device, &TextureViewDescriptor::default()) {
                Ok(view) => views.push(view),
                Err(e) => {
                    for view in &views {
                        unsafe { view.destroy(device) };
                    }
                    unsafe { loader.destroy_swapchain(raw, None) };
                    return Err(e);
                }
            }
        }

        tracing::debug!(
            width = extent.width,
            height = extent.height,
            images = textures.len(),
            ?format,
            "created swapchain"
        );

        Ok(Self {
            raw,
            loader,
            textures,
            views,
            info: SwapchainInfo {
                width: extent.width,
                height: extent.height,
                format,
                image_count: images.len() as u32,
                present_mode: present_mode_from_vk(present_mode)
                    .unwrap_or(PresentMode::Fifo),
            },
            state: SwapchainState::Ready,
            current_image_index: 0,
        })
    }

    /// Get the raw swapchain handle.
    #[must_use]
    pub fn raw(&self) -> vk::SwapchainKHR {
        self.raw
    }

    /// The configuration the swapchain resolved to.
    #[must_use]
    pub fn info(&self) -> SwapchainInfo {
        self.info
    }

    /// Current host-tracked state.
    #[must_use]
    pub fn state(&self) -> SwapchainState {
        self.state
    }

    /// The texture wrapping image `index`.
    pub fn texture(&self, index: u32) -> Result<&Texture> {
        self.textures.get(index as usize).ok_or_else(|| {
            GfxError::InvalidArgument(format!(
                "image index {index} out of range ({} images)",
                self.textures.len()
            ))
        })
    }

    /// The view of image `index`.
    pub fn texture_view(&self, index: u32) -> Result<&TextureView> {
        self.views.get(index as usize).ok_or_else(|| {
            GfxError::InvalidArgument(format!(
                "image index {index} out of range ({} images)",
                self.views.len()
            ))
        })
    }

    /// The view of the most recently acquired image.
    pub fn current_texture_view(&self) -> Result<&TextureView> {
        if self.state != SwapchainState::Acquired {
            return Err(GfxError::NotReady);
        }
        self.texture_view(self.current_image_index)
    }

    /// Ask the surface for the next presentable image.
    ///
    /// `signal_semaphore` (binary) and/or `fence` are signaled when the
    /// image is actually ready to be written. On `OutOfDate`/`SurfaceLost`
    /// the swapchain latches into the matching sticky state and must be
    /// recreated, not retried.
    pub fn acquire_next_image(
        &mut self,
        timeout_ns: u64,
        signal_semaphore: Option<&Semaphore>,
        fence: Option<&Fence>,
    ) -> Result<u32> {
        match self.state {
            SwapchainState::Ready => {}
            SwapchainState::Acquired => {
                return Err(GfxError::InvalidArgument(
                    "an image is already acquired and not yet presented".into(),
                ));
            }
            SwapchainState::OutOfDate => return Err(GfxError::OutOfDate),
            SwapchainState::Lost => return Err(GfxError::SurfaceLost),
        }

        if let Some(semaphore) = signal_semaphore {
            if semaphore.kind() != SemaphoreKind::Binary {
                return Err(GfxError::InvalidArgument(
                    "acquire signals a binary semaphore, a timeline was supplied".into(),
                ));
            }
        }
        if signal_semaphore.is_none() && fence.is_none() {
            return Err(GfxError::InvalidArgument(
                "acquire needs a semaphore or fence to signal".into(),
            ));
        }

        let result = unsafe {
            self.loader.acquire_next_image(
                self.raw,
                timeout_ns,
                signal_semaphore.map_or(vk::Semaphore::null(), Semaphore::raw),
                fence.map_or(vk::Fence::null(), Fence::raw),
            )
        };

        match result {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    tracing::debug!("acquired suboptimal swapchain image");
                }
                self.current_image_index = index;
                self.state = SwapchainState::Acquired;
                Ok(index)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.state = SwapchainState::OutOfDate;
                Err(GfxError::OutOfDate)
            }
            Err(vk::Result::ERROR_SURFACE_LOST_KHR) => {
                self.state = SwapchainState::Lost;
                Err(GfxError::SurfaceLost)
            }
            Err(e) => Err(map_vk_result(e)),
        }
    }

    /// Present the acquired image.
    ///
    /// Does not block on `wait_semaphores` itself; the device waits on them
    /// before scanning out. Suboptimal presents count as success to avoid
    /// recreation churn.
    pub fn present(&mut self, queue: Queue, wait_semaphores: &[&Semaphore]) -> Result<()> {
        match self.state {
            SwapchainState::Acquired => {}
            SwapchainState::Ready => {
                return Err(GfxError::InvalidArgument(
                    "no image acquired to present".into(),
                ));
            }
            SwapchainState::OutOfDate => return Err(GfxError::OutOfDate),
            SwapchainState::Lost => return Err(GfxError::SurfaceLost),
        }

        let semaphores: Vec<vk::Semaphore> = wait_semaphores
            .iter()
            .map(|semaphore| semaphore.raw())
            .collect();
        let swapchains = [self.raw];
        let image_indices = [self.current_image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.loader.queue_present(queue.raw(), &present_info) };

        match result {
            Ok(suboptimal) => {
                if suboptimal {
                    tracing::debug!("presented to a suboptimal swapchain");
                }
                self.state = SwapchainState::Ready;
                Ok(())
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.state = SwapchainState::OutOfDate;
                Err(GfxError::OutOfDate)
            }
            Err(vk::Result::ERROR_SURFACE_LOST_KHR) => {
                self.state = SwapchainState::Lost;
                Err(GfxError::SurfaceLost)
            }
            Err(e) => Err(map_vk_result(e)),
        }
    }

    /// Destroy the swapchain and its image views.
    ///
    /// # Safety
    /// All rendering to and presentation of this swapchain's images must be
    /// complete.
    pub unsafe fn destroy(&mut self, device: &Device) {
        unsafe {
            for view in &self.views {
                view.destroy(device);
            }
            self.loader.destroy_swapchain(self.raw, None);
        }
        self.views.clear();
        self.textures.clear();
        self.raw = vk::SwapchainKHR::null();
    }
}

/// Prefer the requested format, then sRGB BGRA, then whatever is first.
fn choose_format(
    available: &[vk::SurfaceFormatKHR],
    requested: TextureFormat,
) -> vk::SurfaceFormatKHR {
    let requested_vk = format_to_vk(requested);
    for format in available {
        if format.format == requested_vk {
            return *format;
        }
    }
    for format in available {
        if format.format == vk::Format::B8G8R8A8_SRGB
            && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        {
            return *format;
        }
    }
    available[0]
}

/// Use the requested mode when available; FIFO is always supported.
fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    requested: PresentMode,
) -> vk::PresentModeKHR {
    let requested_vk = present_mode_to_vk(requested);
    if available.contains(&requested_vk) {
        requested_vk
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Clamp the desired extent to what the surface allows. A defined
/// `current_extent` must be used as-is.
fn clamp_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired_width: u32,
    desired_height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: desired_width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: desired_height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// Clamp the requested image count to the surface's bounds (a zero
/// `max_image_count` means unbounded).
fn clamp_image_count(capabilities: &vk::SurfaceCapabilitiesKHR, requested: u32) -> u32 {
    let mut count = requested.max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 {
        count = count.min(capabilities.max_image_count);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min_count: u32, max_count: u32, current: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_count,
            max_image_count: max_count,
            current_extent: vk::Extent2D {
                width: current,
                height: current,
            },
            min_image_extent: vk::Extent2D {
                width: 64,
                height: 64,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn extent_uses_current_when_defined() {
        let extent = clamp_extent(&caps(2, 8, 800), 1024, 1024);
        assert_eq!(extent.width, 800);
        assert_eq!(extent.height, 800);
    }

    #[test]
    fn extent_clamps_when_window_manager_leaves_choice() {
        let extent = clamp_extent(&caps(2, 8, u32::MAX), 8192, 16);
        assert_eq!(extent.width, 4096);
        assert_eq!(extent.height, 64);
    }

    #[test]
    fn image_count_clamps_to_bounds() {
        assert_eq!(clamp_image_count(&caps(2, 8, 0), 1), 2);
        assert_eq!(clamp_image_count(&caps(2, 8, 0), 16), 8);
        assert_eq!(clamp_image_count(&caps(2, 0, 0), 16), 16);
    }

    #[test]
    fn format_selection_prefers_request_then_srgb() {
        let available = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(
            choose_format(&available, TextureFormat::Rgba8Unorm).format,
            vk::Format::R8G8B8A8_UNORM
        );
        assert_eq!(
            choose_format(&available, TextureFormat::Rgba16Float).format,
            vk::Format::B8G8R8A8_SRGB
        );
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&available, PresentMode::Mailbox),
            vk::PresentModeKHR::MAILBOX
        );
        let only_fifo = [vk::PresentModeKHR::FIFO];
        assert_eq!(
            choose_present_mode(&only_fifo, PresentMode::Immediate),
            vk::PresentModeKHR::FIFO
        );
    }
}
