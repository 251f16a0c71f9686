//! WebGL-family backend for the prism rendering hardware interface.
//!
//! A thin, explicit, stateless-at-the-surface translation layer: the
//! application describes resources and records commands with the vocabulary
//! of `prism-render`; this crate turns them into calls against a
//! [`api::GlContext`], the trait mirroring the 1.x and 2.x generations of
//! the legacy browser graphics API. The host supplies the context; the
//! bundled [`api::HeadlessContext`] serves hosts without a surface and the
//! test suite.

pub mod api;
mod buffer;
mod caps;
mod command;
mod descriptor;
mod device;
mod pipeline;
mod query;
mod sampler;
mod shader;
mod state;
mod texture;
mod tracker;
pub mod translate;

pub use self::buffer::{Buffer, MappedRange};
pub use self::command::{
    ColorAttachment, CommandBuffer, CommandEncoder, DepthStencilAttachment, RenderPass,
    RenderPassDescriptor,
};
pub use self::descriptor::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindingResource,
    PipelineLayout, PipelineLayoutDescriptor,
};
pub use self::device::{Device, DeviceState};
pub use self::pipeline::{
    RenderPipeline, RenderPipelineDescriptor, PUSH_CONSTANT_BINDING, PUSH_CONSTANT_BLOCK,
};
pub use self::query::{QueryKind, QuerySet, QuerySetDescriptor};
pub use self::sampler::Sampler;
pub use self::shader::{ShaderModule, ShaderModuleDescriptor, SourceScan};
pub use self::texture::{Texture, TextureView};
pub use self::tracker::ResourceCategory;

pub use prism_render as render;
