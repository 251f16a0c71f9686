//! Capability negotiation.
//!
//! Queries the context once at device creation (and again after a context
//! restore) and folds generation, limits and extension probes into the
//! immutable capability record.

use crate::api::{glenum as gl, GlContext};
use log::debug;
use prism_render::{BackendGeneration, DeviceCapabilities, Features};

/// Extension names probed on the 1.x generation. On 2.x most of these are
/// core and the probe is skipped.
const VERTEX_ARRAY_OBJECT_EXT: &str = "OES_vertex_array_object";
const INSTANCING_EXT: &str = "ANGLE_instanced_arrays";
const DEPTH_TEXTURE_EXT: &str = "WEBGL_depth_texture";
const DRAW_BUFFERS_EXT: &str = "WEBGL_draw_buffers";
const FLOAT_TEXTURE_EXT: &str = "OES_texture_float";
const HALF_FLOAT_TEXTURE_EXT: &str = "OES_texture_half_float";
const FLOAT_LINEAR_EXT: &str = "OES_texture_float_linear";
const BLEND_MINMAX_EXT: &str = "EXT_blend_minmax";
const ANISOTROPY_EXT: &str = "EXT_texture_filter_anisotropic";
const BC_EXT: &str = "WEBGL_compressed_texture_s3tc";
const ETC2_EXT: &str = "WEBGL_compressed_texture_etc";
const ETC1_EXT: &str = "WEBGL_compressed_texture_etc1";
const ASTC_EXT: &str = "WEBGL_compressed_texture_astc";
const PVRTC_EXT: &str = "WEBGL_compressed_texture_pvrtc";
const MULTI_DRAW_EXT: &str = "WEBGL_multi_draw";
const BORDER_CLAMP_EXT: &str = "EXT_texture_border_clamp";

pub fn negotiate(gl: &dyn GlContext) -> DeviceCapabilities {
    let generation = gl.generation();
    let mut features = Features::empty();

    match generation {
        BackendGeneration::Gl2 => {
            features |= Features::DEPTH_TEXTURE
                | Features::VERTEX_ARRAY_OBJECT
                | Features::INSTANCING
                | Features::MULTIPLE_RENDER_TARGETS
                | Features::UNIFORM_BUFFER
                | Features::OCCLUSION_QUERY
                | Features::BLEND_MINMAX
                | Features::HALF_FLOAT_TEXTURE
                | Features::FLOAT_TEXTURE;
            if gl.supports_extension(FLOAT_LINEAR_EXT) {
                features |= Features::FLOAT_LINEAR_FILTERING;
            }
        }
        BackendGeneration::Gl1 => {
            let probes: &[(&str, Features)] = &[
                (VERTEX_ARRAY_OBJECT_EXT, Features::VERTEX_ARRAY_OBJECT),
                (INSTANCING_EXT, Features::INSTANCING),
                (DEPTH_TEXTURE_EXT, Features::DEPTH_TEXTURE),
                (DRAW_BUFFERS_EXT, Features::MULTIPLE_RENDER_TARGETS),
                (FLOAT_TEXTURE_EXT, Features::FLOAT_TEXTURE),
                (HALF_FLOAT_TEXTURE_EXT, Features::HALF_FLOAT_TEXTURE),
                (FLOAT_LINEAR_EXT, Features::FLOAT_LINEAR_FILTERING),
                (BLEND_MINMAX_EXT, Features::BLEND_MINMAX),
            ];
            for &(name, bit) in probes {
                if gl.supports_extension(name) {
                    features |= bit;
                }
            }
        }
    }

    // generation-independent extension probes
    let probes: &[(&str, Features)] = &[
        (ANISOTROPY_EXT, Features::ANISOTROPIC_FILTERING),
        (BC_EXT, Features::COMPRESSED_BC),
        (ETC2_EXT, Features::COMPRESSED_ETC2),
        (ASTC_EXT, Features::COMPRESSED_ASTC),
        (PVRTC_EXT, Features::COMPRESSED_PVRTC),
        (MULTI_DRAW_EXT, Features::MULTI_DRAW),
        (BORDER_CLAMP_EXT, Features::BORDER_CLAMP),
    ];
    for &(name, bit) in probes {
        if gl.supports_extension(name) {
            features |= bit;
        }
    }
    if gl.supports_extension(ETC1_EXT) {
        features |= Features::COMPRESSED_ETC2;
    }

    let max_anisotropy = if features.contains(Features::ANISOTROPIC_FILTERING) {
        gl.get_float(gl::MAX_TEXTURE_MAX_ANISOTROPY).max(1.0) as u32
    } else {
        1
    };

    let caps = DeviceCapabilities {
        generation,
        device_name: gl.get_string(gl::RENDERER),
        vendor: gl.get_string(gl::VENDOR),
        max_texture_size: gl.get_integer(gl::MAX_TEXTURE_SIZE).max(1) as u32,
        max_combined_texture_units: gl.get_integer(gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS).max(1)
            as u32,
        max_vertex_attribs: gl.get_integer(gl::MAX_VERTEX_ATTRIBS).max(1) as u32,
        max_color_attachments: if features.contains(Features::MULTIPLE_RENDER_TARGETS) {
            gl.get_integer(gl::MAX_COLOR_ATTACHMENTS).max(1) as u32
        } else {
            1
        },
        max_uniform_buffer_bindings: if features.contains(Features::UNIFORM_BUFFER) {
            gl.get_integer(gl::MAX_UNIFORM_BUFFER_BINDINGS).max(0) as u32
        } else {
            0
        },
        max_samples: gl.get_integer(gl::MAX_SAMPLES).max(0) as u32,
        max_anisotropy,
        features,
        shader_language_version: gl.get_string(gl::SHADING_LANGUAGE_VERSION),
    };

    debug!(
        "negotiated {:?} device \"{}\" ({}): features {:?}, max texture size {}",
        caps.generation, caps.device_name, caps.vendor, caps.features, caps.max_texture_size
    );

    caps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HeadlessContext;

    #[test]
    fn gl2_negotiation_enables_core_features() {
        let ctx = HeadlessContext::gl2();
        let caps = negotiate(&ctx);
        assert_eq!(caps.generation, BackendGeneration::Gl2);
        assert!(caps.supports(Features::UNIFORM_BUFFER));
        assert!(caps.supports(Features::INSTANCING));
        assert!(caps.supports(Features::MULTIPLE_RENDER_TARGETS));
        assert!(caps.supports(Features::ANISOTROPIC_FILTERING));
        assert_eq!(caps.max_color_attachments, 8);
    }

    #[test]
    fn gl1_negotiation_is_extension_driven() {
        let ctx = HeadlessContext::gl1();
        let caps = negotiate(&ctx);
        assert_eq!(caps.generation, BackendGeneration::Gl1);
        assert!(!caps.supports(Features::UNIFORM_BUFFER));
        assert!(caps.supports(Features::INSTANCING));
        assert!(caps.supports(Features::VERTEX_ARRAY_OBJECT));
        assert!(!caps.supports(Features::MULTIPLE_RENDER_TARGETS));
        assert_eq!(caps.max_color_attachments, 1);
    }
}
