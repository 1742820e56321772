//! Texture and texture view objects.
//!
//! A texture's layout is host-tracked state, not queried from the driver.
//! Every transition goes through the fixed lookup table in [`crate::layout`]
//! and updates the cached value, so `layout()` always reflects the last
//! recorded transition.

use ash::vk;
use parking_lot::Mutex;
use prism_core::desc::{TextureDescriptor, TextureViewDescriptor};
use prism_core::error::{GfxError, Result};
use prism_core::flags::TextureUsages;
use prism_core::info::TextureInfo;
use prism_core::types::{Extent3d, SampleCount, TextureDimension, TextureLayout};
use prism_core::TextureFormat;

use crate::command::CommandEncoder;
use crate::convert::{
    aspect_mask, extent_to_vk, format_to_vk, map_vk_result, sample_count_to_vk,
    texture_dimension_to_vk, texture_usage_to_vk, view_dimension_to_vk,
};
use crate::device::Device;
use crate::layout::transition_masks;
use crate::memory::GpuImage;

/// A GPU image, its memory (unless imported), and its tracked layout.
pub struct Texture {
    inner: GpuImage,
    info: TextureInfo,
    layout: Mutex<TextureLayout>,
    owned: bool,
}

impl Texture {
    /// Create a texture in device-local memory, in `Undefined` layout.
    pub fn new(device: &Device, descriptor: &TextureDescriptor) -> Result<Self> {
        let info = Self::validate(descriptor)?;

        let mut flags = vk::ImageCreateFlags::empty();
        if descriptor.dimension == TextureDimension::Cube {
            if descriptor.array_layers % 6 != 0 {
                return Err(GfxError::InvalidArgument(
                    "cube textures need a multiple of 6 array layers".into(),
                ));
            }
            flags |= vk::ImageCreateFlags::CUBE_COMPATIBLE;
        }

        let create_info = vk::ImageCreateInfo::default()
            .image_type(texture_dimension_to_vk(descriptor.dimension))
            .extent(extent_to_vk(descriptor.size))
            .mip_levels(descriptor.mip_level_count)
            .array_layers(descriptor.array_layers)
            .flags(flags)
            .format(format_to_vk(descriptor.format))
            .tiling(vk::ImageTiling::OPTIMAL)
            // Always created UNDEFINED; callers transition explicitly
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(texture_usage_to_vk(descriptor.usage, descriptor.format))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(sample_count_to_vk(descriptor.sample_count));

        let inner = device.allocator.lock().create_image(
            &create_info,
            gpu_allocator::MemoryLocation::GpuOnly,
            descriptor.label.unwrap_or("prism texture"),
        )?;

        Ok(Self {
            inner,
            info,
            layout: Mutex::new(TextureLayout::Undefined),
            owned: true,
        })
    }

    /// Wrap an externally created image. The caller keeps the native handle
    /// and its memory alive; `current_layout` seeds layout tracking.
    pub fn import(
        _device: &Device,
        raw: vk::Image,
        descriptor: &TextureDescriptor,
        current_layout: TextureLayout,
    ) -> Result<Self> {
        if raw == vk::Image::null() {
            return Err(GfxError::InvalidArgument("imported image is null".into()));
        }
        let info = Self::validate(descriptor)?;

        Ok(Self {
            inner: GpuImage {
                image: raw,
                allocation: None,
            },
            info,
            layout: Mutex::new(current_layout),
            owned: false,
        })
    }

    /// Non-owning wrapper for swapchain images.
    pub(crate) fn wrap(raw: vk::Image, info: TextureInfo) -> Self {
        Self {
            inner: GpuImage {
                image: raw,
                allocation: None,
            },
            info,
            layout: Mutex::new(TextureLayout::Undefined),
            owned: false,
        }
    }

    fn validate(descriptor: &TextureDescriptor) -> Result<TextureInfo> {
        if descriptor.size.width == 0 || descriptor.size.height == 0 || descriptor.size.depth == 0
        {
            return Err(GfxError::InvalidArgument("texture extent is zero".into()));
        }
        if descriptor.usage.is_empty() {
            return Err(GfxError::InvalidArgument("texture usage is empty".into()));
        }
        if descriptor.mip_level_count == 0 || descriptor.array_layers == 0 {
            return Err(GfxError::InvalidArgument(
                "mip level and array layer counts must be at least 1".into(),
            ));
        }
        if descriptor.format == TextureFormat::Undefined {
            return Err(GfxError::InvalidArgument("texture format is undefined".into()));
        }

        Ok(TextureInfo {
            dimension: descriptor.dimension,
            size: descriptor.size,
            array_layers: descriptor.array_layers,
            mip_level_count: descriptor.mip_level_count,
            sample_count: descriptor.sample_count,
            format: descriptor.format,
            usage: descriptor.usage,
        })
    }

    /// Get the raw image handle.
    #[must_use]
    pub fn raw(&self) -> vk::Image {
        self.inner.image
    }

    /// Creation-time metadata.
    #[must_use]
    pub fn info(&self) -> TextureInfo {
        self.info
    }

    /// The current host-tracked layout.
    #[must_use]
    pub fn layout(&self) -> TextureLayout {
        *self.layout.lock()
    }

    pub(crate) fn set_layout(&self, layout: TextureLayout) {
        *self.layout.lock() = layout;
    }

    /// Create a typed/sliced view of this texture.
    ///
    /// The view borrows nothing at the type level but must not outlive the
    /// texture; using a view after destroying its texture is undefined.
    pub fn create_view(
        &self,
        device: &Device,
        descriptor: &TextureViewDescriptor,
    ) -> Result<TextureView> {
        if descriptor.base_mip_level + descriptor.mip_level_count > self.info.mip_level_count {
            return Err(GfxError::InvalidArgument(format!(
                "view mip range {}..{} exceeds {} levels",
                descriptor.base_mip_level,
                descriptor.base_mip_level + descriptor.mip_level_count,
                self.info.mip_level_count
            )));
        }
        if descriptor.base_array_layer + descriptor.array_layer_count > self.info.array_layers {
            return Err(GfxError::InvalidArgument(format!(
                "view layer range {}..{} exceeds {} layers",
                descriptor.base_array_layer,
                descriptor.base_array_layer + descriptor.array_layer_count,
                self.info.array_layers
            )));
        }
        if descriptor.mip_level_count == 0 || descriptor.array_layer_count == 0 {
            return Err(GfxError::InvalidArgument("view subresource range is empty".into()));
        }

        let format = if descriptor.format == TextureFormat::Undefined {
            self.info.format
        } else {
            descriptor.format
        };

        let create_info = vk::ImageViewCreateInfo::default()
            .image(self.inner.image)
            .view_type(view_dimension_to_vk(descriptor.dimension))
            .format(format_to_vk(format))
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect_mask(format))
                    .base_mip_level(descriptor.base_mip_level)
                    .level_count(descriptor.mip_level_count)
                    .base_array_layer(descriptor.base_array_layer)
                    .layer_count(descriptor.array_layer_count),
            );

        let raw = unsafe { device.raw.create_image_view(&create_info, None) }
            .map_err(map_vk_result)?;

        Ok(TextureView {
            raw,
            image: self.inner.image,
            format,
            sample_count: self.info.sample_count,
            extent: self.info.size.mip_level(descriptor.base_mip_level),
            base_mip_level: descriptor.base_mip_level,
            mip_level_count: descriptor.mip_level_count,
            base_array_layer: descriptor.base_array_layer,
            array_layer_count: descriptor.array_layer_count,
        })
    }

    /// Record a layout transition into `encoder` and update the tracked
    /// layout. Must be issued between passes, never inside one.
    pub fn transition_layout(
        &self,
        encoder: &mut CommandEncoder,
        new_layout: TextureLayout,
        base_mip_level: u32,
        mip_level_count: u32,
        base_array_layer: u32,
        array_layer_count: u32,
    ) -> Result<()> {
        encoder.check_recording()?;
        if base_mip_level + mip_level_count > self.info.mip_level_count {
            return Err(GfxError::InvalidArgument("transition mip range out of bounds".into()));
        }
        if base_array_layer + array_layer_count > self.info.array_layers {
            return Err(GfxError::InvalidArgument(
                "transition layer range out of bounds".into(),
            ));
        }

        self.record_transition(
            encoder.device_raw(),
            encoder.raw(),
            new_layout,
            base_mip_level,
            mip_level_count,
            base_array_layer,
            array_layer_count,
        );
        Ok(())
    }

    /// Record a transition from the tracked layout, then update it.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn record_transition(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        new_layout: TextureLayout,
        base_mip_level: u32,
        mip_level_count: u32,
        base_array_layer: u32,
        array_layer_count: u32,
    ) {
        let old_layout = self.layout();
        self.record_transition_explicit(
            device,
            cmd,
            old_layout,
            new_layout,
            base_mip_level,
            mip_level_count,
            base_array_layer,
            array_layer_count,
        );
        self.set_layout(new_layout);
    }

    /// Record a transition between explicit layouts without consulting or
    /// updating tracked state. Mipmap generation drives subresources through
    /// mixed layouts and reconciles tracking itself.
    #[allow(clippy::too_many_arguments)]
    fn record_transition_explicit(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        old_layout: TextureLayout,
        new_layout: TextureLayout,
        base_mip_level: u32,
        mip_level_count: u32,
        base_array_layer: u32,
        array_layer_count: u32,
    ) {
        let (src_stage, dst_stage, src_access, dst_access) =
            transition_masks(old_layout, new_layout);

        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(crate::convert::layout_to_vk(old_layout))
            .new_layout(crate::convert::layout_to_vk(new_layout))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.inner.image)
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect_mask(self.info.format))
                    .base_mip_level(base_mip_level)
                    .level_count(mip_level_count)
                    .base_array_layer(base_array_layer)
                    .layer_count(array_layer_count),
            );

        unsafe {
            device.cmd_pipeline_barrier(
                cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }

    /// Generate the full mip chain by repeated downscaling blits.
    ///
    /// Every touched level ends in `final_layout`.
    pub fn generate_mipmaps(
        &self,
        encoder: &mut CommandEncoder,
        final_layout: TextureLayout,
    ) -> Result<()> {
        if self.info.mip_level_count <= 1 {
            return Ok(());
        }
        self.generate_mipmaps_range(encoder, 0, self.info.mip_level_count, final_layout)
    }

    /// Generate `level_count` mip levels starting at `base_mip_level`, each
    /// blitted from the previous level with linear filtering.
    pub fn generate_mipmaps_range(
        &self,
        encoder: &mut CommandEncoder,
        base_mip_level: u32,
        level_count: u32,
        final_layout: TextureLayout,
    ) -> Result<()> {
        encoder.check_recording()?;
        if base_mip_level >= self.info.mip_level_count || level_count == 0 {
            return Err(GfxError::InvalidArgument("mip range out of bounds".into()));
        }
        if self.info.sample_count != SampleCount::X1 {
            return Err(GfxError::InvalidArgument(
                "cannot generate mipmaps for a multisampled texture".into(),
            ));
        }
        if !self
            .info
            .usage
            .contains(TextureUsages::COPY_SRC | TextureUsages::COPY_DST)
        {
            return Err(GfxError::InvalidArgument(
                "mipmap generation needs COPY_SRC and COPY_DST usage".into(),
            ));
        }

        let level_count = level_count.min(self.info.mip_level_count - base_mip_level);
        let initial_layout = self.layout();
        let device = encoder.device_raw_arc();
        let cmd = encoder.raw();
        let aspect = aspect_mask(self.info.format);

        for i in 0..level_count.saturating_sub(1) {
            let src_mip = base_mip_level + i;
            let dst_mip = src_mip + 1;

            // The source level holds blit results from the previous round
            // (or the original contents on the first one).
            let src_old = if i == 0 {
                initial_layout
            } else {
                TextureLayout::TransferDst
            };
            self.record_transition_explicit(
                &device,
                cmd,
                src_old,
                TextureLayout::TransferSrc,
                src_mip,
                1,
                0,
                self.info.array_layers,
            );
            self.record_transition_explicit(
                &device,
                cmd,
                initial_layout,
                TextureLayout::TransferDst,
                dst_mip,
                1,
                0,
                self.info.array_layers,
            );

            let src_extent = self.info.size.mip_level(src_mip);
            let dst_extent = self.info.size.mip_level(dst_mip);

            let blit = vk::ImageBlit::default()
                .src_subresource(
                    vk::ImageSubresourceLayers::default()
                        .aspect_mask(aspect)
                        .mip_level(src_mip)
                        .base_array_layer(0)
                        .layer_count(self.info.array_layers),
                )
                .src_offsets([
                    vk::Offset3D::default(),
                    vk::Offset3D {
                        x: src_extent.width as i32,
                        y: src_extent.height as i32,
                        z: src_extent.depth as i32,
                    },
                ])
                .dst_subresource(
                    vk::ImageSubresourceLayers::default()
                        .aspect_mask(aspect)
                        .mip_level(dst_mip)
                        .base_array_layer(0)
                        .layer_count(self.info.array_layers),
                )
                .dst_offsets([
                    vk::Offset3D::default(),
                    vk::Offset3D {
                        x: dst_extent.width as i32,
                        y: dst_extent.height as i32,
                        z: dst_extent.depth as i32,
                    },
                ]);

            unsafe {
                device.cmd_blit_image(
                    cmd,
                    self.inner.image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    self.inner.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[blit],
                    vk::Filter::LINEAR,
                );
            }
        }

        // Normalize every touched level to the requested final layout.
        if level_count > 1 {
            self.record_transition_explicit(
                &device,
                cmd,
                TextureLayout::TransferSrc,
                final_layout,
                base_mip_level,
                level_count - 1,
                0,
                self.info.array_layers,
            );
            self.record_transition_explicit(
                &device,
                cmd,
                TextureLayout::TransferDst,
                final_layout,
                base_mip_level + level_count - 1,
                1,
                0,
                self.info.array_layers,
            );
        } else {
            self.record_transition_explicit(
                &device,
                cmd,
                initial_layout,
                final_layout,
                base_mip_level,
                1,
                0,
                self.info.array_layers,
            );
        }
        self.set_layout(final_layout);

        Ok(())
    }

    /// Destroy the image, returning owned memory to the allocator.
    ///
    /// # Safety
    /// The texture and every view of it must not be referenced by any
    /// command buffer still pending on the GPU.
    pub unsafe fn destroy(&mut self, device: &Device) -> Result<()> {
        if self.owned {
            device.allocator.lock().free_image(&mut self.inner)
        } else {
            self.inner.image = vk::Image::null();
            Ok(())
        }
    }
}

/// A non-owning typed/sliced view of a texture.
pub struct TextureView {
    raw: vk::ImageView,
    image: vk::Image,
    format: TextureFormat,
    sample_count: SampleCount,
    extent: Extent3d,
    base_mip_level: u32,
    mip_level_count: u32,
    base_array_layer: u32,
    array_layer_count: u32,
}

impl TextureView {
    /// Get the raw image view handle.
    #[must_use]
    pub fn raw(&self) -> vk::ImageView {
        self.raw
    }

    /// The parent image handle.
    #[must_use]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// The view's format (the parent's unless overridden at creation).
    #[must_use]
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Sample count inherited from the parent texture.
    #[must_use]
    pub fn sample_count(&self) -> SampleCount {
        self.sample_count
    }

    /// Extent of the view's base mip level.
    #[must_use]
    pub fn extent(&self) -> Extent3d {
        self.extent
    }

    /// Viewed mip range.
    #[must_use]
    pub fn mip_range(&self) -> (u32, u32) {
        (self.base_mip_level, self.mip_level_count)
    }

    /// Viewed layer range.
    #[must_use]
    pub fn layer_range(&self) -> (u32, u32) {
        (self.base_array_layer, self.array_layer_count)
    }

    /// Destroy the view.
    ///
    /// # Safety
    /// The view must not be referenced by any pending command buffer or
    /// live framebuffer.
    pub unsafe fn destroy(&self, device: &Device) {
        unsafe {
            device.raw.destroy_image_view(self.raw, None);
        }
    }
}
