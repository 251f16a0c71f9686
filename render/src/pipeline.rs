//! Pipeline state vocabulary: rasterization, depth/stencil, blending and
//! vertex layout descriptors.

use crate::format::VertexFormat;
use bitflags::bitflags;
use ordered_float::NotNan;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

impl Default for PrimitiveTopology {
    fn default() -> Self {
        PrimitiveTopology::TriangleList
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

impl Default for CullMode {
    fn default() -> Self {
        CullMode::None
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FrontFace {
    Ccw,
    Cw,
}

impl Default for FrontFace {
    fn default() -> Self {
        FrontFace::Ccw
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StencilOperation {
    Keep,
    Zero,
    Replace,
    Invert,
    IncrementClamp,
    DecrementClamp,
    IncrementWrap,
    DecrementWrap,
}

impl Default for StencilOperation {
    fn default() -> Self {
        StencilOperation::Keep
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    Src,
    OneMinusSrc,
    SrcAlpha,
    OneMinusSrcAlpha,
    Dst,
    OneMinusDst,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturated,
    Constant,
    OneMinusConstant,
    ConstantAlpha,
    OneMinusConstantAlpha,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BlendOperation {
    Add,
    Subtract,
    ReverseSubtract,
    /// Requires the advanced-blend extension on the 1.x backend generation.
    Min,
    /// Requires the advanced-blend extension on the 1.x backend generation.
    Max,
}

impl Default for BlendOperation {
    fn default() -> Self {
        BlendOperation::Add
    }
}

/// One half (color or alpha) of a blend equation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub operation: BlendOperation,
}

impl BlendComponent {
    pub const REPLACE: BlendComponent = BlendComponent {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::Zero,
        operation: BlendOperation::Add,
    };

    pub const OVER: BlendComponent = BlendComponent {
        src_factor: BlendFactor::SrcAlpha,
        dst_factor: BlendFactor::OneMinusSrcAlpha,
        operation: BlendOperation::Add,
    };

    pub const ADDITIVE: BlendComponent = BlendComponent {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::One,
        operation: BlendOperation::Add,
    };
}

impl Default for BlendComponent {
    fn default() -> Self {
        Self::REPLACE
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct BlendState {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

impl BlendState {
    pub const ALPHA_BLENDING: BlendState = BlendState {
        color: BlendComponent::OVER,
        alpha: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOperation::Add,
        },
    };

    pub const PREMULTIPLIED_ALPHA_BLENDING: BlendState = BlendState {
        color: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOperation::Add,
        },
        alpha: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOperation::Add,
        },
    };

    pub const ADDITIVE: BlendState = BlendState {
        color: BlendComponent::ADDITIVE,
        alpha: BlendComponent::ADDITIVE,
    };
}

bitflags! {
    pub struct ColorWriteMask: u32 {
        const RED   = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE  = 1 << 2;
        const ALPHA = 1 << 3;
        const COLOR = Self::RED.bits | Self::GREEN.bits | Self::BLUE.bits;
        const ALL   = Self::RED.bits | Self::GREEN.bits | Self::BLUE.bits | Self::ALPHA.bits;
    }
}

impl Default for ColorWriteMask {
    fn default() -> Self {
        ColorWriteMask::ALL
    }
}

/// Blend and write-mask state of one color target. A `blend` of `None`
/// leaves blending disabled.
#[derive(Clone, Debug, Default)]
pub struct ColorTargetState {
    pub blend: Option<BlendState>,
    pub write_mask: ColorWriteMask,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct StencilFaceState {
    pub compare: CompareFunction,
    pub fail_op: StencilOperation,
    pub depth_fail_op: StencilOperation,
    pub pass_op: StencilOperation,
}

impl Default for StencilFaceState {
    fn default() -> Self {
        StencilFaceState {
            compare: CompareFunction::Always,
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::Keep,
            pass_op: StencilOperation::Keep,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DepthBiasState {
    pub constant: i32,
    pub slope_scale: NotNan<f32>,
}

impl Default for DepthBiasState {
    fn default() -> Self {
        DepthBiasState {
            constant: 0,
            slope_scale: NotNan::from(0.0f32),
        }
    }
}

impl DepthBiasState {
    pub fn is_enabled(&self) -> bool {
        self.constant != 0 || self.slope_scale.into_inner() != 0.0
    }
}

#[derive(Clone, Debug)]
pub struct DepthStencilState {
    pub depth_write_enabled: bool,
    pub depth_compare: CompareFunction,
    pub stencil_front: StencilFaceState,
    pub stencil_back: StencilFaceState,
    pub stencil_read_mask: u32,
    pub stencil_write_mask: u32,
    pub bias: DepthBiasState,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        DepthStencilState {
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil_front: StencilFaceState::default(),
            stencil_back: StencilFaceState::default(),
            stencil_read_mask: !0,
            stencil_write_mask: !0,
            bias: DepthBiasState::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RasterizationState {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub line_width: NotNan<f32>,
}

impl Default for RasterizationState {
    fn default() -> Self {
        RasterizationState {
            cull_mode: CullMode::None,
            front_face: FrontFace::Ccw,
            line_width: NotNan::from(1.0f32),
        }
    }
}

/// How a vertex buffer slot steps through its data.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum VertexStepMode {
    Vertex,
    Instance,
}

impl Default for VertexStepMode {
    fn default() -> Self {
        VertexStepMode::Vertex
    }
}

/// One attribute within a vertex buffer slot.
///
/// `name` is the shader-side attribute name used for reflection lookup;
/// `shader_location` is the declared fallback location when the reflected
/// name is absent from the linked program.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexAttribute {
    pub name: String,
    pub format: VertexFormat,
    pub offset: u32,
    pub shader_location: u32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexBufferLayout {
    pub stride: u32,
    pub step_mode: VertexStepMode,
    pub attributes: Vec<VertexAttribute>,
}
