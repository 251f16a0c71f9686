//! Texture, texture view and sampler descriptors.

use crate::format::TextureFormat;
use crate::pipeline::CompareFunction;
use bitflags::bitflags;
use ordered_float::NotNan;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TextureDimension {
    D1,
    D2,
    D3,
    Cube,
}

impl Default for TextureDimension {
    fn default() -> Self {
        TextureDimension::D2
    }
}

bitflags! {
    #[derive(Default)]
    pub struct TextureUsage: u32 {
        const RENDER_TARGET = 1 << 0;
        const SAMPLED       = 1 << 1;
        const STORAGE       = 1 << 2;
        const COPY_SRC      = 1 << 3;
        const COPY_DST      = 1 << 4;
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
    MirrorRepeat,
    /// Requires a backend extension; degrades to `ClampToEdge` without it.
    ClampToBorder,
}

impl Default for AddressMode {
    fn default() -> Self {
        AddressMode::ClampToEdge
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

impl Default for FilterMode {
    fn default() -> Self {
        FilterMode::Nearest
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BorderColor {
    TransparentBlack,
    OpaqueBlack,
    OpaqueWhite,
}

/// Sampler state. `Eq + Hash` so identical descriptors can share one native
/// sampler object.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SamplerDescriptor {
    pub label: Option<String>,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub lod_min_clamp: NotNan<f32>,
    pub lod_max_clamp: NotNan<f32>,
    /// When set, the sampler performs a depth comparison (shadow sampling).
    pub compare: Option<CompareFunction>,
    pub max_anisotropy: u16,
    pub border_color: Option<BorderColor>,
    /// Whether the min filter is combined with the mipmap filter. When false
    /// the non-mipmapped min filter variant is used.
    pub use_mipmap: bool,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        SamplerDescriptor {
            label: None,
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: FilterMode::Nearest,
            lod_min_clamp: NotNan::from(0.0f32),
            lod_max_clamp: NotNan::from(32.0f32),
            compare: None,
            max_anisotropy: 1,
            border_color: None,
            use_mipmap: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Depth for 3D textures, array layer count otherwise. Cube textures
    /// must declare 6.
    pub depth_or_array_layers: u32,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    /// Pre-compressed initial data, one entry per mip level. Compressed
    /// textures are immutable after creation.
    pub compressed_data: Option<Vec<Vec<u8>>>,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        TextureDescriptor {
            label: None,
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::SAMPLED | TextureUsage::COPY_DST,
            compressed_data: None,
        }
    }
}

impl TextureDescriptor {
    pub fn label_or_unnamed(&self) -> &str {
        self.label.as_deref().unwrap_or("<unnamed texture>")
    }
}

/// A logical sub-range over a texture. All ranges must be contained within
/// the source texture.
#[derive(Clone, Debug, Default)]
pub struct TextureViewDescriptor {
    pub label: Option<String>,
    /// Reinterpretation format; `None` inherits the source format.
    pub format: Option<TextureFormat>,
    /// View dimension; `None` inherits the source dimension.
    pub dimension: Option<TextureDimension>,
    pub base_mip_level: u32,
    /// `None` extends to the last mip of the source.
    pub mip_level_count: Option<u32>,
    pub base_array_layer: u32,
    /// `None` extends to the last layer of the source.
    pub array_layer_count: Option<u32>,
}

/// numLevels = 1 + floor(log2(max(w, h)))
pub fn max_mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    32 - largest.leading_zeros()
}
