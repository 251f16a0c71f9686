//! Bind group layout vocabulary.
//!
//! A bind group layout declares the shape of a resource set: which binding
//! indices exist, what kind of resource each one accepts, and the shader-side
//! `name` the backend uses to locate the uniform or uniform block.

use crate::error::{Error, Result};
use crate::format::TextureFormat;
use crate::image::TextureDimension;
use bitflags::bitflags;

bitflags! {
    #[derive(Default)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX   = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE  = 1 << 2;
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BufferBindingKind {
    Uniform,
    Storage,
    ReadOnlyStorage,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TextureSampleKind {
    Float,
    UnfilterableFloat,
    Depth,
    Sint,
    Uint,
}

impl Default for TextureSampleKind {
    fn default() -> Self {
        TextureSampleKind::Float
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SamplerBindingKind {
    Filtering,
    NonFiltering,
    Comparison,
}

impl Default for SamplerBindingKind {
    fn default() -> Self {
        SamplerBindingKind::Filtering
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StorageTextureAccess {
    WriteOnly,
    ReadOnly,
    ReadWrite,
}

/// The resource kind declared by one layout entry. Exactly one kind per
/// entry.
#[derive(Clone, Debug, PartialEq)]
pub enum BindingResourceKind {
    Buffer {
        kind: BufferBindingKind,
        /// Dynamic offsets are supplied at `set_bind_group` time.
        has_dynamic_offset: bool,
        min_binding_size: Option<usize>,
    },
    Texture {
        sample_kind: TextureSampleKind,
        view_dimension: TextureDimension,
        multisampled: bool,
    },
    Sampler {
        kind: SamplerBindingKind,
    },
    StorageTexture {
        access: StorageTextureAccess,
        format: TextureFormat,
        view_dimension: TextureDimension,
    },
}

impl BindingResourceKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            BindingResourceKind::Buffer { .. } => "buffer",
            BindingResourceKind::Texture { .. } => "texture",
            BindingResourceKind::Sampler { .. } => "sampler",
            BindingResourceKind::StorageTexture { .. } => "storage texture",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BindGroupLayoutEntry {
    /// Numeric slot, unique within the layout.
    pub binding: u32,
    pub visibility: ShaderStageFlags,
    /// Shader-side uniform / uniform block / sampler name.
    pub name: String,
    pub resource: BindingResourceKind,
    /// For sampler entries: the binding index of the texture this sampler
    /// parameterizes. When absent the backend falls back to the nearest
    /// preceding texture entry.
    pub associated_texture: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct BindGroupLayoutDescriptor {
    pub label: Option<String>,
    pub entries: Vec<BindGroupLayoutEntry>,
}

impl BindGroupLayoutDescriptor {
    pub fn label_or_unnamed(&self) -> &str {
        self.label.as_deref().unwrap_or("<unnamed bind group layout>")
    }

    /// Shape validation shared by every backend: binding indices unique,
    /// names non-empty.
    pub fn validate(&self) -> Result<()> {
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.name.is_empty() {
                return Err(Error::Configuration(format!(
                    "{}: entry {} has an empty name",
                    self.label_or_unnamed(),
                    i
                )));
            }
            for other in &self.entries[..i] {
                if other.binding == entry.binding {
                    return Err(Error::Configuration(format!(
                        "{}: duplicate binding index {}",
                        self.label_or_unnamed(),
                        entry.binding
                    )));
                }
            }
        }
        Ok(())
    }
}
