//! Bind group layouts and bind groups.
//!
//! A bind group owns a private single-use descriptor pool sized exactly for
//! its entries, plus the one descriptor set allocated from it. The set is
//! written once at creation and immutable afterwards; the bound resources
//! are referenced, never owned.

use std::collections::HashMap;

use ash::vk;
use prism_core::desc::{BindGroupLayoutDescriptor, BindingType};
use prism_core::error::{GfxError, Result};
use prism_core::types::WHOLE_SIZE;

use crate::buffer::Buffer;
use crate::convert::{map_vk_result, shader_stages_to_vk};
use crate::device::Device;
use crate::sampler::Sampler;
use crate::texture::TextureView;

/// Native descriptor type for a binding declaration.
fn descriptor_type_for(ty: &BindingType) -> vk::DescriptorType {
    match ty {
        BindingType::UniformBuffer { dynamic_offset, .. } => {
            if *dynamic_offset {
                vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
            } else {
                vk::DescriptorType::UNIFORM_BUFFER
            }
        }
        BindingType::StorageBuffer { dynamic_offset, .. } => {
            if *dynamic_offset {
                vk::DescriptorType::STORAGE_BUFFER_DYNAMIC
            } else {
                vk::DescriptorType::STORAGE_BUFFER
            }
        }
        BindingType::Sampler { .. } => vk::DescriptorType::SAMPLER,
        BindingType::SampledTexture { .. } => vk::DescriptorType::SAMPLED_IMAGE,
        BindingType::StorageTexture { .. } => vk::DescriptorType::STORAGE_IMAGE,
    }
}

const fn is_buffer_type(ty: vk::DescriptorType) -> bool {
    matches!(
        ty,
        vk::DescriptorType::UNIFORM_BUFFER
            | vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
            | vk::DescriptorType::STORAGE_BUFFER
            | vk::DescriptorType::STORAGE_BUFFER_DYNAMIC
    )
}

/// Owns a native descriptor set layout and the binding-type table used to
/// validate bind groups created against it.
pub struct BindGroupLayout {
    raw: vk::DescriptorSetLayout,
    binding_types: HashMap<u32, vk::DescriptorType>,
}

impl BindGroupLayout {
    /// Create a layout from binding declarations.
    pub fn new(device: &Device, descriptor: &BindGroupLayoutDescriptor) -> Result<Self> {
        let mut binding_types = HashMap::new();
        let mut bindings = Vec::with_capacity(descriptor.entries.len());

        for entry in descriptor.entries {
            let descriptor_type = descriptor_type_for(&entry.ty);
            if binding_types.insert(entry.binding, descriptor_type).is_some() {
                return Err(GfxError::InvalidArgument(format!(
                    "binding {} declared twice",
                    entry.binding
                )));
            }
            bindings.push(
                vk::DescriptorSetLayoutBinding::default()
                    .binding(entry.binding)
                    .descriptor_type(descriptor_type)
                    .descriptor_count(1)
                    .stage_flags(shader_stages_to_vk(entry.visibility)),
            );
        }

        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let raw = unsafe { device.raw.create_descriptor_set_layout(&layout_info, None) }
            .map_err(map_vk_result)?;

        Ok(Self { raw, binding_types })
    }

    /// Get the raw layout handle.
    #[must_use]
    pub fn raw(&self) -> vk::DescriptorSetLayout {
        self.raw
    }

    /// Declared descriptor type of `binding`, if any.
    #[must_use]
    pub fn binding_type(&self, binding: u32) -> Option<vk::DescriptorType> {
        self.binding_types.get(&binding).copied()
    }

    /// Destroy the layout.
    ///
    /// # Safety
    /// No live bind group or pipeline may reference this layout.
    pub unsafe fn destroy(&self, device: &Device) {
        unsafe {
            device.raw.destroy_descriptor_set_layout(self.raw, None);
        }
    }
}

/// One resource bound into a bind group slot.
#[derive(Clone, Copy)]
pub enum BindingResource<'a> {
    Buffer {
        buffer: &'a Buffer,
        offset: u64,
        /// `WHOLE_SIZE` (0) binds to the end of the buffer.
        size: u64,
    },
    Sampler(&'a Sampler),
    TextureView(&'a TextureView),
    StorageTextureView(&'a TextureView),
}

/// One entry of a bind group.
#[derive(Clone, Copy)]
pub struct BindGroupEntry<'a> {
    pub binding: u32,
    pub resource: BindingResource<'a>,
}

/// Bind group creation parameters.
#[derive(Clone, Copy)]
pub struct BindGroupDescriptor<'a> {
    pub label: Option<&'a str>,
    pub layout: &'a BindGroupLayout,
    pub entries: &'a [BindGroupEntry<'a>],
}

/// A descriptor set bound once at creation.
pub struct BindGroup {
    pool: vk::DescriptorPool,
    set: vk::DescriptorSet,
}

impl BindGroup {
    /// Allocate and write a descriptor set matching `descriptor.layout`.
    ///
    /// Entries are validated against the layout's binding table; an unknown
    /// binding or a resource of the wrong class is `InvalidArgument`.
    pub fn new(device: &Device, descriptor: &BindGroupDescriptor) -> Result<Self> {
        // Exact pool sizes from the entry histogram, one set only
        let mut counts: HashMap<vk::DescriptorType, u32> = HashMap::new();
        for entry in descriptor.entries {
            let declared = descriptor.layout.binding_type(entry.binding).ok_or_else(|| {
                GfxError::InvalidArgument(format!(
                    "binding {} is not declared in the layout",
                    entry.binding
                ))
            })?;
            check_resource_class(declared, &entry.resource, entry.binding)?;
            *counts.entry(declared).or_insert(0) += 1;
        }
        if counts.is_empty() {
            return Err(GfxError::InvalidArgument("bind group has no entries".into()));
        }

        let pool_sizes: Vec<vk::DescriptorPoolSize> = counts
            .iter()
            .map(|(ty, count)| {
                vk::DescriptorPoolSize::default()
                    .ty(*ty)
                    .descriptor_count(*count)
            })
            .collect();

        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(1)
            .pool_sizes(&pool_sizes);
        let pool = unsafe { device.raw.create_descriptor_pool(&pool_info, None) }
            .map_err(map_vk_result)?;

        let set_layouts = [descriptor.layout.raw()];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&set_layouts);
        let set = match unsafe { device.raw.allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets[0],
            Err(e) => {
                unsafe { device.raw.destroy_descriptor_pool(pool, None) };
                return Err(map_vk_result(e));
            }
        };

        // Info arrays are fully built first so the writes can point into them
        let mut buffer_infos = Vec::with_capacity(descriptor.entries.len());
        let mut image_infos = Vec::with_capacity(descriptor.entries.len());

        for entry in descriptor.entries {
            match entry.resource {
                BindingResource::Buffer {
                    buffer,
                    offset,
                    size,
                } => {
                    let range = if size == WHOLE_SIZE {
                        vk::WHOLE_SIZE
                    } else {
                        size
                    };
                    buffer_infos.push(
                        vk::DescriptorBufferInfo::default()
                            .buffer(buffer.raw())
                            .offset(offset)
                            .range(range),
                    );
                }
                BindingResource::Sampler(sampler) => {
                    image_infos.push(
                        vk::DescriptorImageInfo::default().sampler(sampler.raw()),
                    );
                }
                BindingResource::TextureView(view) => {
                    image_infos.push(
                        vk::DescriptorImageInfo::default()
                            .image_view(view.raw())
                            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                    );
                }
                BindingResource::StorageTextureView(view) => {
                    image_infos.push(
                        vk::DescriptorImageInfo::default()
                            .image_view(view.raw())
                            .image_layout(vk::ImageLayout::GENERAL),
                    );
                }
            }
        }

        let mut writes = Vec::with_capacity(descriptor.entries.len());
        let mut buffer_index = 0;
        let mut image_index = 0;

        for entry in descriptor.entries {
            let declared = descriptor
                .layout
                .binding_type(entry.binding)
                .expect("validated above");
            let write = vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(entry.binding)
                .descriptor_type(declared);

            let write = if is_buffer_type(declared) {
                let info = std::slice::from_ref(&buffer_infos[buffer_index]);
                buffer_index += 1;
                write.buffer_info(info)
            } else {
                let info = std::slice::from_ref(&image_infos[image_index]);
                image_index += 1;
                write.image_info(info)
            };
            writes.push(write);
        }

        unsafe {
            device.raw.update_descriptor_sets(&writes, &[]);
        }

        if let Some(label) = descriptor.label {
            tracing::trace!(label, "created bind group");
        }

        Ok(Self { pool, set })
    }

    /// Get the raw descriptor set handle.
    #[must_use]
    pub fn raw(&self) -> vk::DescriptorSet {
        self.set
    }

    /// Destroy the pool (and with it the set).
    ///
    /// # Safety
    /// No pending command buffer may reference this bind group.
    pub unsafe fn destroy(&self, device: &Device) {
        unsafe {
            device.raw.destroy_descriptor_pool(self.pool, None);
        }
    }
}

fn check_resource_class(
    declared: vk::DescriptorType,
    resource: &BindingResource,
    binding: u32,
) -> Result<()> {
    let ok = match resource {
        BindingResource::Buffer { .. } => is_buffer_type(declared),
        BindingResource::Sampler(_) => declared == vk::DescriptorType::SAMPLER,
        BindingResource::TextureView(_) => declared == vk::DescriptorType::SAMPLED_IMAGE,
        BindingResource::StorageTextureView(_) => declared == vk::DescriptorType::STORAGE_IMAGE,
    };
    if ok {
        Ok(())
    } else {
        Err(GfxError::InvalidArgument(format!(
            "binding {binding}: resource does not match declared type {declared:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::types::TextureViewDimension;

    #[test]
    fn descriptor_types_for_bindings() {
        assert_eq!(
            descriptor_type_for(&BindingType::UniformBuffer {
                dynamic_offset: false,
                min_binding_size: 0
            }),
            vk::DescriptorType::UNIFORM_BUFFER
        );
        assert_eq!(
            descriptor_type_for(&BindingType::UniformBuffer {
                dynamic_offset: true,
                min_binding_size: 0
            }),
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
        );
        assert_eq!(
            descriptor_type_for(&BindingType::Sampler { comparison: false }),
            vk::DescriptorType::SAMPLER
        );
        assert_eq!(
            descriptor_type_for(&BindingType::SampledTexture {
                view_dimension: TextureViewDimension::D2,
                multisampled: false
            }),
            vk::DescriptorType::SAMPLED_IMAGE
        );
    }

    #[test]
    fn buffer_type_classification() {
        assert!(is_buffer_type(vk::DescriptorType::STORAGE_BUFFER));
        assert!(is_buffer_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC));
        assert!(!is_buffer_type(vk::DescriptorType::SAMPLED_IMAGE));
        assert!(!is_buffer_type(vk::DescriptorType::SAMPLER));
    }
}
