//! Device options and the negotiated capability record.

use bitflags::bitflags;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PowerPreference {
    Default,
    HighPerformance,
    LowPower,
}

impl Default for PowerPreference {
    fn default() -> Self {
        PowerPreference::Default
    }
}

/// Context creation options, recognized by the backend when it acquires the
/// rendering surface.
#[derive(Clone, Debug)]
pub struct DeviceDescriptor {
    pub label: Option<String>,
    pub alpha: bool,
    pub antialias: bool,
    pub depth: bool,
    pub stencil: bool,
    pub premultiplied_alpha: bool,
    pub preserve_drawing_buffer: bool,
    pub power_preference: PowerPreference,
    pub fail_if_major_performance_caveat: bool,
    pub desynchronized: bool,
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        DeviceDescriptor {
            label: None,
            alpha: true,
            antialias: true,
            depth: true,
            stencil: true,
            premultiplied_alpha: true,
            preserve_drawing_buffer: false,
            power_preference: PowerPreference::Default,
            fail_if_major_performance_caveat: false,
            desynchronized: false,
        }
    }
}

/// Which generation of the legacy graphics backend the context speaks.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum BackendGeneration {
    Gl1,
    Gl2,
}

bitflags! {
    /// Optional capabilities negotiated at device creation. On the 2.x
    /// generation most of these are core; on 1.x each one maps to an
    /// extension probe.
    #[derive(Default)]
    pub struct Features: u32 {
        const DEPTH_TEXTURE            = 1 << 0;
        const VERTEX_ARRAY_OBJECT      = 1 << 1;
        const INSTANCING               = 1 << 2;
        const MULTIPLE_RENDER_TARGETS  = 1 << 3;
        const FLOAT_TEXTURE            = 1 << 4;
        const HALF_FLOAT_TEXTURE       = 1 << 5;
        const UNIFORM_BUFFER           = 1 << 6;
        const OCCLUSION_QUERY          = 1 << 7;
        const BLEND_MINMAX             = 1 << 8;
        const ANISOTROPIC_FILTERING    = 1 << 9;
        const FLOAT_LINEAR_FILTERING   = 1 << 10;
        const COMPRESSED_BC            = 1 << 11;
        const COMPRESSED_ETC2          = 1 << 12;
        const COMPRESSED_ASTC          = 1 << 13;
        const COMPRESSED_PVRTC         = 1 << 14;
        const MULTI_DRAW               = 1 << 15;
        const BORDER_CLAMP             = 1 << 16;
    }
}

/// Immutable per (device, context generation) capability record.
#[derive(Clone, Debug)]
pub struct DeviceCapabilities {
    pub generation: BackendGeneration,
    pub device_name: String,
    pub vendor: String,
    pub max_texture_size: u32,
    pub max_combined_texture_units: u32,
    pub max_vertex_attribs: u32,
    pub max_color_attachments: u32,
    pub max_uniform_buffer_bindings: u32,
    pub max_samples: u32,
    pub max_anisotropy: u32,
    pub features: Features,
    /// Shader language version tag reported by the backend, e.g.
    /// "GLSL ES 3.00".
    pub shader_language_version: String,
}

impl DeviceCapabilities {
    pub fn supports(&self, features: Features) -> bool {
        self.features.contains(features)
    }
}
