//! Sampler objects.

use ash::vk;
use prism_core::desc::SamplerDescriptor;
use prism_core::error::Result;

use crate::convert::{
    address_mode_to_vk, compare_to_vk, filter_to_vk, map_vk_result, mipmap_filter_to_vk,
};
use crate::device::Device;

/// An immutable sampler.
pub struct Sampler {
    raw: vk::Sampler,
}

impl Sampler {
    /// Create a sampler. Anisotropy above 1 enables anisotropic filtering.
    pub fn new(device: &Device, descriptor: &SamplerDescriptor) -> Result<Self> {
        let anisotropy_enabled = descriptor.max_anisotropy > 1;

        let mut create_info = vk::SamplerCreateInfo::default()
            .address_mode_u(address_mode_to_vk(descriptor.address_mode_u))
            .address_mode_v(address_mode_to_vk(descriptor.address_mode_v))
            .address_mode_w(address_mode_to_vk(descriptor.address_mode_w))
            .mag_filter(filter_to_vk(descriptor.mag_filter))
            .min_filter(filter_to_vk(descriptor.min_filter))
            .mipmap_mode(mipmap_filter_to_vk(descriptor.mipmap_filter))
            .min_lod(descriptor.lod_min_clamp)
            .max_lod(descriptor.lod_max_clamp)
            .anisotropy_enable(anisotropy_enabled)
            .max_anisotropy(f32::from(descriptor.max_anisotropy))
            .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
            .unnormalized_coordinates(false);

        if let Some(compare) = descriptor.compare {
            create_info = create_info
                .compare_enable(true)
                .compare_op(compare_to_vk(compare));
        }

        let raw = unsafe { device.raw.create_sampler(&create_info, None) }
            .map_err(map_vk_result)?;

        Ok(Self { raw })
    }

    /// Get the raw sampler handle.
    #[must_use]
    pub fn raw(&self) -> vk::Sampler {
        self.raw
    }

    /// Destroy the sampler.
    ///
    /// # Safety
    /// No pending command buffer or live bind group may reference it.
    pub unsafe fn destroy(&self, device: &Device) {
        unsafe {
            device.raw.destroy_sampler(self.raw, None);
        }
    }
}
