//! Format and enum translation.
//!
//! Pure mappings from the abstract vocabulary to backend constants. Formats
//! with no direct equivalent pick the closest compatible mapping and report
//! through the warning channel; formats that require a missing extension and
//! have no fallback fail with `UnsupportedFormat`.

use crate::api::glenum as gl;
use log::warn;
use prism_render::{
    AddressMode, BackendGeneration, BlendFactor, BlendOperation, CompareFunction, CullMode,
    Error, Features, FilterMode, FrontFace, IndexFormat, PrimitiveTopology, Result,
    StencilOperation, TextureFormat, VertexFormat,
};

/// Backend triple for one texture format: (internal format, format, type).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TexFormatInfo {
    pub internal_format: u32,
    pub format: u32,
    pub ty: u32,
}

impl TexFormatInfo {
    const fn new(internal_format: u32, format: u32, ty: u32) -> TexFormatInfo {
        TexFormatInfo {
            internal_format,
            format,
            ty,
        }
    }
}

/// Backend triple for one vertex format: (component type, component count,
/// normalized).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VertexFormatInfo {
    pub ty: u32,
    pub components: u32,
    pub normalized: bool,
}

/// Resolve a texture format against the backend generation and negotiated
/// features.
///
/// On the 1.x generation sized internal formats do not exist; the legacy
/// unsized equivalents (`LUMINANCE`, `LUMINANCE_ALPHA`, `RGBA`, ...) are
/// selected instead. Compressed formats fail when the extension is absent;
/// the caller decides whether to fall back to an uncompressed format.
pub fn texture_format_info(
    format: TextureFormat,
    generation: BackendGeneration,
    features: Features,
) -> Result<TexFormatInfo> {
    use TextureFormat::*;

    if format.is_compressed() {
        return compressed_format_info(format, features);
    }

    if generation == BackendGeneration::Gl1 {
        return legacy_format_info(format, features);
    }

    let info = match format {
        R8Unorm => TexFormatInfo::new(gl::R8, gl::RED, gl::UNSIGNED_BYTE),
        R8Snorm => TexFormatInfo::new(gl::R8_SNORM, gl::RED, gl::BYTE),
        R8Uint => TexFormatInfo::new(gl::R8UI, gl::RED_INTEGER, gl::UNSIGNED_BYTE),
        R8Sint => TexFormatInfo::new(gl::R8I, gl::RED_INTEGER, gl::BYTE),
        R16Uint => TexFormatInfo::new(gl::R16UI, gl::RED_INTEGER, gl::UNSIGNED_SHORT),
        R16Sint => TexFormatInfo::new(gl::R16I, gl::RED_INTEGER, gl::SHORT),
        R16Float => TexFormatInfo::new(gl::R16F, gl::RED, gl::HALF_FLOAT),
        Rg8Unorm => TexFormatInfo::new(gl::RG8, gl::RG, gl::UNSIGNED_BYTE),
        Rg8Snorm => TexFormatInfo::new(gl::RG8_SNORM, gl::RG, gl::BYTE),
        Rg8Uint => TexFormatInfo::new(gl::RG8UI, gl::RG_INTEGER, gl::UNSIGNED_BYTE),
        Rg8Sint => TexFormatInfo::new(gl::RG8I, gl::RG_INTEGER, gl::BYTE),
        R32Uint => TexFormatInfo::new(gl::R32UI, gl::RED_INTEGER, gl::UNSIGNED_INT),
        R32Sint => TexFormatInfo::new(gl::R32I, gl::RED_INTEGER, gl::INT),
        R32Float => TexFormatInfo::new(gl::R32F, gl::RED, gl::FLOAT),
        Rg16Uint => TexFormatInfo::new(gl::RG16UI, gl::RG_INTEGER, gl::UNSIGNED_SHORT),
        Rg16Sint => TexFormatInfo::new(gl::RG16I, gl::RG_INTEGER, gl::SHORT),
        Rg16Float => TexFormatInfo::new(gl::RG16F, gl::RG, gl::HALF_FLOAT),
        Rgba8Unorm => TexFormatInfo::new(gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE),
        Rgba8UnormSrgb => TexFormatInfo::new(gl::SRGB8_ALPHA8, gl::RGBA, gl::UNSIGNED_BYTE),
        Rgba8Snorm => TexFormatInfo::new(gl::RGBA8_SNORM, gl::RGBA, gl::BYTE),
        Rgba8Uint => TexFormatInfo::new(gl::RGBA8UI, gl::RGBA_INTEGER, gl::UNSIGNED_BYTE),
        Rgba8Sint => TexFormatInfo::new(gl::RGBA8I, gl::RGBA_INTEGER, gl::BYTE),
        Bgra8Unorm | Bgra8UnormSrgb => {
            // no BGRA on this backend; closest compatible ordering
            warn!("BGRA storage is unavailable, substituting RGBA component order");
            TexFormatInfo::new(gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE)
        }
        Rgb10a2Unorm => TexFormatInfo::new(gl::RGB10_A2, gl::RGBA, gl::UNSIGNED_INT_2_10_10_10_REV),
        Rg11b10Float => {
            TexFormatInfo::new(gl::R11F_G11F_B10F, gl::RGB, gl::UNSIGNED_INT_10F_11F_11F_REV)
        }
        Rg32Uint => TexFormatInfo::new(gl::RG32UI, gl::RG_INTEGER, gl::UNSIGNED_INT),
        Rg32Sint => TexFormatInfo::new(gl::RG32I, gl::RG_INTEGER, gl::INT),
        Rg32Float => TexFormatInfo::new(gl::RG32F, gl::RG, gl::FLOAT),
        Rgba16Uint => TexFormatInfo::new(gl::RGBA16UI, gl::RGBA_INTEGER, gl::UNSIGNED_SHORT),
        Rgba16Sint => TexFormatInfo::new(gl::RGBA16I, gl::RGBA_INTEGER, gl::SHORT),
        Rgba16Float => TexFormatInfo::new(gl::RGBA16F, gl::RGBA, gl::HALF_FLOAT),
        Rgba32Uint => TexFormatInfo::new(gl::RGBA32UI, gl::RGBA_INTEGER, gl::UNSIGNED_INT),
        Rgba32Sint => TexFormatInfo::new(gl::RGBA32I, gl::RGBA_INTEGER, gl::INT),
        Rgba32Float => TexFormatInfo::new(gl::RGBA32F, gl::RGBA, gl::FLOAT),
        Rgba4Unorm => TexFormatInfo::new(gl::RGBA4, gl::RGBA, gl::UNSIGNED_SHORT_4_4_4_4),
        Rgb5a1Unorm => TexFormatInfo::new(gl::RGB5_A1, gl::RGBA, gl::UNSIGNED_SHORT_5_5_5_1),
        Rgb565Unorm => TexFormatInfo::new(gl::RGB565, gl::RGB, gl::UNSIGNED_SHORT_5_6_5),
        Depth16Unorm => {
            TexFormatInfo::new(gl::DEPTH_COMPONENT16, gl::DEPTH_COMPONENT, gl::UNSIGNED_SHORT)
        }
        Depth24Plus => {
            TexFormatInfo::new(gl::DEPTH_COMPONENT24, gl::DEPTH_COMPONENT, gl::UNSIGNED_INT)
        }
        Depth24PlusStencil8 => {
            TexFormatInfo::new(gl::DEPTH24_STENCIL8, gl::DEPTH_STENCIL, gl::UNSIGNED_INT_24_8)
        }
        Depth32Float => TexFormatInfo::new(gl::DEPTH_COMPONENT32F, gl::DEPTH_COMPONENT, gl::FLOAT),
        Stencil8 => TexFormatInfo::new(gl::STENCIL_INDEX8, gl::DEPTH_STENCIL, gl::UNSIGNED_BYTE),
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    };
    Ok(info)
}

/// Legacy 1.x selection: unsized formats where the internal format must
/// equal the client format.
fn legacy_format_info(format: TextureFormat, features: Features) -> Result<TexFormatInfo> {
    use TextureFormat::*;
    let info = match format {
        R8Unorm | R8Snorm => TexFormatInfo::new(gl::LUMINANCE, gl::LUMINANCE, gl::UNSIGNED_BYTE),
        Rg8Unorm | Rg8Snorm => {
            TexFormatInfo::new(gl::LUMINANCE_ALPHA, gl::LUMINANCE_ALPHA, gl::UNSIGNED_BYTE)
        }
        Rgba8Unorm | Rgba8Snorm | Bgra8Unorm | Rgba8UnormSrgb | Bgra8UnormSrgb => {
            TexFormatInfo::new(gl::RGBA, gl::RGBA, gl::UNSIGNED_BYTE)
        }
        Rgba4Unorm => TexFormatInfo::new(gl::RGBA, gl::RGBA, gl::UNSIGNED_SHORT_4_4_4_4),
        Rgb5a1Unorm => TexFormatInfo::new(gl::RGBA, gl::RGBA, gl::UNSIGNED_SHORT_5_5_5_1),
        Rgb565Unorm => TexFormatInfo::new(gl::RGB, gl::RGB, gl::UNSIGNED_SHORT_5_6_5),
        R16Float | Rg16Float | Rgba16Float => {
            if !features.contains(Features::HALF_FLOAT_TEXTURE) {
                return Err(Error::UnsupportedFormat(format!(
                    "{format:?} requires the half-float texture extension"
                )));
            }
            TexFormatInfo::new(gl::RGBA, gl::RGBA, gl::HALF_FLOAT_OES)
        }
        R32Float | Rg32Float | Rgba32Float => {
            if !features.contains(Features::FLOAT_TEXTURE) {
                return Err(Error::UnsupportedFormat(format!(
                    "{format:?} requires the float texture extension"
                )));
            }
            TexFormatInfo::new(gl::RGBA, gl::RGBA, gl::FLOAT)
        }
        Depth16Unorm | Depth24Plus | Depth32Float => {
            if !features.contains(Features::DEPTH_TEXTURE) {
                return Err(Error::UnsupportedFormat(format!(
                    "{format:?} requires the depth texture extension"
                )));
            }
            TexFormatInfo::new(gl::DEPTH_COMPONENT, gl::DEPTH_COMPONENT, gl::UNSIGNED_INT)
        }
        Depth24PlusStencil8 | Stencil8 => {
            if !features.contains(Features::DEPTH_TEXTURE) {
                return Err(Error::UnsupportedFormat(format!(
                    "{format:?} requires the depth texture extension"
                )));
            }
            TexFormatInfo::new(gl::DEPTH_STENCIL, gl::DEPTH_STENCIL, gl::UNSIGNED_INT_24_8)
        }
        _ => {
            warn!("{format:?} has no 1.x equivalent, substituting RGBA8");
            TexFormatInfo::new(gl::RGBA, gl::RGBA, gl::UNSIGNED_BYTE)
        }
    };
    Ok(info)
}

fn compressed_format_info(format: TextureFormat, features: Features) -> Result<TexFormatInfo> {
    use TextureFormat::*;
    let (required, internal) = match format {
        Bc1RgbaUnorm => (Features::COMPRESSED_BC, gl::COMPRESSED_RGBA_S3TC_DXT1),
        Bc1RgbaUnormSrgb => (Features::COMPRESSED_BC, gl::COMPRESSED_SRGB_ALPHA_S3TC_DXT1),
        Bc2RgbaUnorm => (Features::COMPRESSED_BC, gl::COMPRESSED_RGBA_S3TC_DXT3),
        Bc2RgbaUnormSrgb => (Features::COMPRESSED_BC, gl::COMPRESSED_SRGB_ALPHA_S3TC_DXT3),
        Bc3RgbaUnorm => (Features::COMPRESSED_BC, gl::COMPRESSED_RGBA_S3TC_DXT5),
        Bc3RgbaUnormSrgb => (Features::COMPRESSED_BC, gl::COMPRESSED_SRGB_ALPHA_S3TC_DXT5),
        Etc1Rgb8Unorm => (Features::COMPRESSED_ETC2, gl::ETC1_RGB8),
        Etc2Rgb8Unorm => (Features::COMPRESSED_ETC2, gl::COMPRESSED_RGB8_ETC2),
        Etc2Rgb8UnormSrgb => (Features::COMPRESSED_ETC2, gl::COMPRESSED_SRGB8_ETC2),
        Etc2Rgb8A1Unorm => (
            Features::COMPRESSED_ETC2,
            gl::COMPRESSED_RGB8_PUNCHTHROUGH_ALPHA1_ETC2,
        ),
        Etc2Rgba8Unorm => (Features::COMPRESSED_ETC2, gl::COMPRESSED_RGBA8_ETC2_EAC),
        Astc4x4Unorm => (Features::COMPRESSED_ASTC, gl::COMPRESSED_RGBA_ASTC_4X4),
        Astc4x4UnormSrgb => (
            Features::COMPRESSED_ASTC,
            gl::COMPRESSED_SRGB8_ALPHA8_ASTC_4X4,
        ),
        Astc8x8Unorm => (Features::COMPRESSED_ASTC, gl::COMPRESSED_RGBA_ASTC_8X8),
        PvrtcRgb4bppUnorm => (Features::COMPRESSED_PVRTC, gl::COMPRESSED_RGB_PVRTC_4BPPV1),
        PvrtcRgb2bppUnorm => (Features::COMPRESSED_PVRTC, gl::COMPRESSED_RGB_PVRTC_2BPPV1),
        PvrtcRgba4bppUnorm => (Features::COMPRESSED_PVRTC, gl::COMPRESSED_RGBA_PVRTC_4BPPV1),
        PvrtcRgba2bppUnorm => (Features::COMPRESSED_PVRTC, gl::COMPRESSED_RGBA_PVRTC_2BPPV1),
        _ => return Err(Error::UnsupportedFormat(format!("{format:?}"))),
    };
    if !features.contains(required) {
        return Err(Error::UnsupportedFormat(format!(
            "{format:?} requires a compressed texture extension that is not present"
        )));
    }
    // compressed uploads ignore format/type
    Ok(TexFormatInfo::new(internal, gl::RGBA, gl::UNSIGNED_BYTE))
}

pub fn vertex_format_info(format: VertexFormat) -> VertexFormatInfo {
    use VertexFormat::*;
    let ty = match format {
        Uint8x2 | Uint8x4 | Unorm8x2 | Unorm8x4 => gl::UNSIGNED_BYTE,
        Sint8x2 | Sint8x4 | Snorm8x2 | Snorm8x4 => gl::BYTE,
        Uint16x2 | Uint16x4 | Unorm16x2 | Unorm16x4 => gl::UNSIGNED_SHORT,
        Sint16x2 | Sint16x4 | Snorm16x2 | Snorm16x4 => gl::SHORT,
        Float32 | Float32x2 | Float32x3 | Float32x4 => gl::FLOAT,
        Uint32 | Uint32x2 | Uint32x3 | Uint32x4 => gl::UNSIGNED_INT,
        Sint32 | Sint32x2 | Sint32x3 | Sint32x4 => gl::INT,
    };
    VertexFormatInfo {
        ty,
        components: format.component_count(),
        normalized: format.is_normalized(),
    }
}

pub fn index_format_type(format: IndexFormat) -> u32 {
    match format {
        IndexFormat::Uint16 => gl::UNSIGNED_SHORT,
        IndexFormat::Uint32 => gl::UNSIGNED_INT,
    }
}

pub fn topology_to_gl(topology: PrimitiveTopology) -> u32 {
    match topology {
        PrimitiveTopology::PointList => gl::POINTS,
        PrimitiveTopology::LineList => gl::LINES,
        PrimitiveTopology::LineStrip => gl::LINE_STRIP,
        PrimitiveTopology::TriangleList => gl::TRIANGLES,
        PrimitiveTopology::TriangleStrip => gl::TRIANGLE_STRIP,
    }
}

pub fn compare_func_to_gl(func: CompareFunction) -> u32 {
    match func {
        CompareFunction::Never => gl::NEVER,
        CompareFunction::Less => gl::LESS,
        CompareFunction::Equal => gl::EQUAL,
        CompareFunction::LessEqual => gl::LEQUAL,
        CompareFunction::Greater => gl::GREATER,
        CompareFunction::NotEqual => gl::NOTEQUAL,
        CompareFunction::GreaterEqual => gl::GEQUAL,
        CompareFunction::Always => gl::ALWAYS,
    }
}

pub fn stencil_op_to_gl(op: StencilOperation) -> u32 {
    match op {
        StencilOperation::Keep => gl::KEEP,
        StencilOperation::Zero => gl::ZERO,
        StencilOperation::Replace => gl::REPLACE,
        StencilOperation::Invert => gl::INVERT,
        StencilOperation::IncrementClamp => gl::INCR,
        StencilOperation::DecrementClamp => gl::DECR,
        StencilOperation::IncrementWrap => gl::INCR_WRAP,
        StencilOperation::DecrementWrap => gl::DECR_WRAP,
    }
}

pub fn blend_factor_to_gl(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => gl::ZERO,
        BlendFactor::One => gl::ONE,
        BlendFactor::Src => gl::SRC_COLOR,
        BlendFactor::OneMinusSrc => gl::ONE_MINUS_SRC_COLOR,
        BlendFactor::SrcAlpha => gl::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => gl::ONE_MINUS_SRC_ALPHA,
        BlendFactor::Dst => gl::DST_COLOR,
        BlendFactor::OneMinusDst => gl::ONE_MINUS_DST_COLOR,
        BlendFactor::DstAlpha => gl::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => gl::ONE_MINUS_DST_ALPHA,
        BlendFactor::SrcAlphaSaturated => gl::SRC_ALPHA_SATURATE,
        BlendFactor::Constant => gl::CONSTANT_COLOR,
        BlendFactor::OneMinusConstant => gl::ONE_MINUS_CONSTANT_COLOR,
        BlendFactor::ConstantAlpha => gl::CONSTANT_ALPHA,
        BlendFactor::OneMinusConstantAlpha => gl::ONE_MINUS_CONSTANT_ALPHA,
    }
}

/// Min/max equations exist on 1.x only through the blend-minmax extension;
/// without it the equation degrades to add.
pub fn blend_op_to_gl(op: BlendOperation, features: Features) -> u32 {
    match op {
        BlendOperation::Add => gl::FUNC_ADD,
        BlendOperation::Subtract => gl::FUNC_SUBTRACT,
        BlendOperation::ReverseSubtract => gl::FUNC_REVERSE_SUBTRACT,
        BlendOperation::Min | BlendOperation::Max => {
            if features.contains(Features::BLEND_MINMAX) {
                if op == BlendOperation::Min {
                    gl::MIN
                } else {
                    gl::MAX
                }
            } else {
                warn!("min/max blend equation unavailable, degrading to add");
                gl::FUNC_ADD
            }
        }
    }
}

pub fn cull_mode_to_gl(mode: CullMode) -> Option<u32> {
    match mode {
        CullMode::None => None,
        CullMode::Front => Some(gl::FRONT),
        CullMode::Back => Some(gl::BACK),
    }
}

pub fn front_face_to_gl(face: FrontFace) -> u32 {
    match face {
        FrontFace::Ccw => gl::CCW,
        FrontFace::Cw => gl::CW,
    }
}

/// Border clamp needs an extension; degrade per-axis to edge clamp without
/// it. The caller logs the degradation once per sampler.
pub fn address_mode_to_gl(mode: AddressMode, features: Features) -> (u32, bool) {
    match mode {
        AddressMode::ClampToEdge => (gl::CLAMP_TO_EDGE, false),
        AddressMode::Repeat => (gl::REPEAT, false),
        AddressMode::MirrorRepeat => (gl::MIRRORED_REPEAT, false),
        AddressMode::ClampToBorder => {
            if features.contains(Features::BORDER_CLAMP) {
                (gl::CLAMP_TO_BORDER, false)
            } else {
                (gl::CLAMP_TO_EDGE, true)
            }
        }
    }
}

pub fn mag_filter_to_gl(filter: FilterMode) -> u32 {
    match filter {
        FilterMode::Nearest => gl::NEAREST,
        FilterMode::Linear => gl::LINEAR,
    }
}

/// Combine the min filter with the mipmap filter. With `use_mipmap` false
/// the plain variant is selected so incomplete mip chains stay samplable.
pub fn min_filter_to_gl(min: FilterMode, mipmap: FilterMode, use_mipmap: bool) -> u32 {
    match (use_mipmap, min, mipmap) {
        (false, FilterMode::Nearest, _) => gl::NEAREST,
        (false, FilterMode::Linear, _) => gl::LINEAR,
        (true, FilterMode::Nearest, FilterMode::Nearest) => gl::NEAREST_MIPMAP_NEAREST,
        (true, FilterMode::Nearest, FilterMode::Linear) => gl::NEAREST_MIPMAP_LINEAR,
        (true, FilterMode::Linear, FilterMode::Nearest) => gl::LINEAR_MIPMAP_NEAREST,
        (true, FilterMode::Linear, FilterMode::Linear) => gl::LINEAR_MIPMAP_LINEAR,
    }
}
