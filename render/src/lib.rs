//! Backend-agnostic vocabulary for the prism rendering hardware interface.
//!
//! This crate defines the declarative side of the RHI: formats, usage flags,
//! pipeline state, bind group layouts, device options and capabilities, and
//! the shared error type. It contains no backend handles and performs no I/O;
//! a backend crate (such as `prism-render-gl`) consumes these descriptors and
//! turns them into live resources.

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod format;
pub mod image;
pub mod pipeline;

pub use self::buffer::{
    BufferDescriptor, BufferFieldInfo, BufferHint, BufferTypeInfo, BufferUsage, MapMode,
    UniformType,
};
pub use self::command::{Color, LoadOp, ShaderLanguage, ShaderStage, StoreOp};
pub use self::descriptor::{
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResourceKind, BufferBindingKind,
    SamplerBindingKind, ShaderStageFlags, StorageTextureAccess, TextureSampleKind,
};
pub use self::device::{
    BackendGeneration, DeviceCapabilities, DeviceDescriptor, Features, PowerPreference,
};
pub use self::error::{Error, Result};
pub use self::format::{IndexFormat, TextureFormat, VertexFormat};
pub use self::image::{
    AddressMode, BorderColor, FilterMode, SamplerDescriptor, TextureDescriptor, TextureDimension,
    TextureUsage, TextureViewDescriptor,
};
pub use self::pipeline::{
    BlendComponent, BlendFactor, BlendOperation, BlendState, ColorTargetState, ColorWriteMask,
    CompareFunction, CullMode, DepthBiasState, DepthStencilState, FrontFace, PrimitiveTopology,
    RasterizationState, StencilFaceState, StencilOperation, VertexAttribute, VertexBufferLayout,
    VertexStepMode,
};
