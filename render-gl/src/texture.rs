//! Texture and texture view resources.
//!
//! The backend has no real views; a [`TextureView`] is a client-side record
//! over the source texture, resolved into a (target, handle, mip, layer)
//! tuple at framebuffer-attach and texture-bind time.

use crate::api::{glenum as gl, GlContext};
use crate::device::DeviceShared;
use crate::tracker::{ResourceCategory, ResourceKey, Tracked};
use crate::translate::{self, TexFormatInfo};
use log::warn;
use prism_render::{
    BackendGeneration, Error, Result, TextureDescriptor, TextureDimension, TextureFormat,
    TextureUsage, TextureViewDescriptor,
};
use std::cell::Cell;
use std::rc::Rc;

fn mip_extent(base: u32, level: u32) -> u32 {
    (base >> level).max(1)
}

pub struct Texture {
    device: Rc<DeviceShared>,
    raw: Cell<u32>,
    width: u32,
    height: u32,
    depth_or_array_layers: u32,
    mip_level_count: u32,
    sample_count: u32,
    /// Effective dimension after any backend downgrade.
    dimension: TextureDimension,
    format: TextureFormat,
    usage: TextureUsage,
    target: u32,
    format_info: TexFormatInfo,
    /// A 3D texture the 1.x generation could not express; created as 2D and
    /// z-coordinates of updates are ignored.
    downgraded_3d: bool,
    compressed: bool,
    label: String,
    downgrade_warned: Cell<bool>,
    key: Cell<Option<ResourceKey>>,
}

impl Texture {
    pub(crate) fn new(device: Rc<DeviceShared>, desc: &TextureDescriptor) -> Result<Rc<Texture>> {
        let label = desc.label_or_unnamed().to_owned();
        if desc.width == 0 || desc.height == 0 || desc.depth_or_array_layers == 0 {
            return Err(Error::Configuration(format!(
                "{label}: texture extents must be non-zero"
            )));
        }
        if desc.dimension == TextureDimension::Cube && desc.depth_or_array_layers != 6 {
            return Err(Error::Configuration(format!(
                "{label}: cube textures require exactly 6 layers, got {}",
                desc.depth_or_array_layers
            )));
        }
        let max_size = device.max_texture_size();
        if desc.width > max_size || desc.height > max_size {
            return Err(Error::OutOfRange(format!(
                "{label}: {}x{} exceeds the device maximum of {max_size}",
                desc.width, desc.height
            )));
        }
        if desc.mip_level_count == 0 {
            return Err(Error::Configuration(format!(
                "{label}: mip_level_count must be at least 1"
            )));
        }

        let generation = device.generation();
        let features = device.features();

        // fail-open on missing compression support
        let mut format = desc.format;
        let mut compressed = desc.format.is_compressed();
        let format_info = match translate::texture_format_info(format, generation, features) {
            Ok(info) => info,
            Err(err) if compressed => {
                warn!(
                    "{label}: {err}; falling back to {:?}",
                    desc.format.uncompressed_fallback()
                );
                format = desc.format.uncompressed_fallback();
                compressed = false;
                translate::texture_format_info(format, generation, features)?
            }
            Err(err) => return Err(err),
        };

        let mut dimension = desc.dimension;
        let mut downgraded_3d = false;
        if dimension == TextureDimension::D3 && generation == BackendGeneration::Gl1 {
            warn!("{label}: 3D textures are unavailable on the 1.x backend, downgrading to 2D");
            dimension = TextureDimension::D2;
            downgraded_3d = true;
        }

        let is_array = dimension == TextureDimension::D2 && desc.depth_or_array_layers > 1;
        let target = match dimension {
            TextureDimension::Cube => gl::TEXTURE_CUBE_MAP,
            TextureDimension::D3 => gl::TEXTURE_3D,
            _ if is_array && generation == BackendGeneration::Gl2 => gl::TEXTURE_2D_ARRAY,
            _ => {
                if is_array {
                    warn!("{label}: texture arrays are unavailable on the 1.x backend");
                }
                gl::TEXTURE_2D
            }
        };

        let raw = device.gl().create_texture();
        if raw == 0 {
            return Err(Error::ContextLost);
        }

        let gl_ctx = device.gl();
        gl_ctx.bind_texture(target, raw);
        gl_ctx.pixel_store_i(gl::UNPACK_ALIGNMENT, 1);

        // default sampler parameters
        let filter = if format.is_depth_or_stencil() {
            gl::NEAREST
        } else {
            gl::LINEAR
        };
        let min_filter = if desc.mip_level_count > 1 && !format.is_depth_or_stencil() {
            gl::LINEAR_MIPMAP_LINEAR
        } else {
            filter
        };
        gl_ctx.tex_parameter_i(target, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as i32);
        gl_ctx.tex_parameter_i(target, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as i32);
        gl_ctx.tex_parameter_i(target, gl::TEXTURE_MIN_FILTER, min_filter as i32);
        gl_ctx.tex_parameter_i(target, gl::TEXTURE_MAG_FILTER, filter as i32);
        if generation == BackendGeneration::Gl2 {
            gl_ctx.tex_parameter_i(target, gl::TEXTURE_BASE_LEVEL, 0);
            gl_ctx.tex_parameter_i(
                target,
                gl::TEXTURE_MAX_LEVEL,
                desc.mip_level_count as i32 - 1,
            );
        }

        // storage allocation
        if compressed {
            let data = desc.compressed_data.as_deref().unwrap_or(&[]);
            for (level, bytes) in data.iter().enumerate() {
                let level = level as u32;
                gl_ctx.compressed_tex_image_2d(
                    target,
                    level,
                    format_info.internal_format,
                    mip_extent(desc.width, level),
                    mip_extent(desc.height, level),
                    bytes,
                );
            }
        } else {
            match target {
                gl::TEXTURE_CUBE_MAP => {
                    // all six faces as blank storage at mip 0
                    for face in 0..6 {
                        gl_ctx.tex_image_2d(
                            gl::TEXTURE_CUBE_MAP_POSITIVE_X + face,
                            0,
                            format_info.internal_format,
                            desc.width,
                            desc.height,
                            format_info.format,
                            format_info.ty,
                            None,
                        );
                    }
                }
                gl::TEXTURE_3D | gl::TEXTURE_2D_ARRAY => {
                    gl_ctx.tex_image_3d(
                        target,
                        0,
                        format_info.internal_format,
                        desc.width,
                        desc.height,
                        desc.depth_or_array_layers,
                        format_info.format,
                        format_info.ty,
                        None,
                    );
                }
                _ => {
                    gl_ctx.tex_image_2d(
                        target,
                        0,
                        format_info.internal_format,
                        desc.width,
                        desc.height,
                        format_info.format,
                        format_info.ty,
                        None,
                    );
                }
            }
        }

        let texture = Rc::new(Texture {
            device: device.clone(),
            raw: Cell::new(raw),
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: desc.depth_or_array_layers,
            mip_level_count: desc.mip_level_count,
            sample_count: desc.sample_count.max(1),
            dimension,
            format,
            usage: desc.usage,
            target,
            format_info,
            downgraded_3d,
            compressed,
            label: label.clone(),
            downgrade_warned: Cell::new(false),
            key: Cell::new(None),
        });
        let key = device.register(
            ResourceCategory::Texture,
            label,
            Rc::downgrade(&texture) as _,
        );
        texture.key.set(Some(key));
        Ok(texture)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth_or_array_layers(&self) -> u32 {
        self.depth_or_array_layers
    }

    pub fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn dimension(&self) -> TextureDimension {
        self.dimension
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn usage(&self) -> TextureUsage {
        self.usage
    }

    pub fn is_downgraded_3d(&self) -> bool {
        self.downgraded_3d
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn is_destroyed(&self) -> bool {
        self.raw.get() == 0
    }

    pub(crate) fn raw(&self) -> u32 {
        self.raw.get()
    }

    pub(crate) fn gl_target(&self) -> u32 {
        self.target
    }

    pub(crate) fn format_info(&self) -> TexFormatInfo {
        self.format_info
    }

    /// Upload a sub-region of one mip level.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &self,
        data: &[u8],
        x: u32,
        y: u32,
        z: u32,
        width: u32,
        height: u32,
        depth: u32,
        mip_level: u32,
        array_layer: u32,
    ) -> Result<()> {
        if self.is_destroyed() {
            warn!("update on destroyed texture \"{}\" ignored", self.label);
            return Ok(());
        }
        if self.compressed {
            warn!(
                "texture \"{}\" holds compressed data and is read-only",
                self.label
            );
            return Ok(());
        }
        if mip_level >= self.mip_level_count {
            return Err(Error::OutOfRange(format!(
                "{}: mip level {mip_level} out of {}",
                self.label, self.mip_level_count
            )));
        }
        if array_layer >= self.depth_or_array_layers {
            return Err(Error::OutOfRange(format!(
                "{}: array layer {array_layer} out of {}",
                self.label, self.depth_or_array_layers
            )));
        }
        let (mw, mh) = (
            mip_extent(self.width, mip_level),
            mip_extent(self.height, mip_level),
        );
        if x + width > mw || y + height > mh {
            return Err(Error::OutOfRange(format!(
                "{}: region {x},{y} {width}x{height} exceeds mip {mip_level} ({mw}x{mh})",
                self.label
            )));
        }

        let gl_ctx = self.device.gl();
        gl_ctx.bind_texture(self.target, self.raw.get());
        gl_ctx.pixel_store_i(gl::UNPACK_ALIGNMENT, 1);

        match self.target {
            gl::TEXTURE_CUBE_MAP => {
                gl_ctx.tex_sub_image_2d(
                    gl::TEXTURE_CUBE_MAP_POSITIVE_X + array_layer,
                    mip_level,
                    x,
                    y,
                    width,
                    height,
                    self.format_info.format,
                    self.format_info.ty,
                    data,
                );
            }
            gl::TEXTURE_3D | gl::TEXTURE_2D_ARRAY => {
                let layer = if self.target == gl::TEXTURE_3D { z } else { array_layer };
                gl_ctx.tex_sub_image_3d(
                    self.target,
                    mip_level,
                    x,
                    y,
                    layer,
                    width,
                    height,
                    depth.max(1),
                    self.format_info.format,
                    self.format_info.ty,
                    data,
                );
            }
            _ => {
                if self.downgraded_3d && (z != 0 || depth > 1) && !self.downgrade_warned.replace(true)
                {
                    warn!(
                        "texture \"{}\" was downgraded from 3D; depth coordinates are ignored",
                        self.label
                    );
                }
                gl_ctx.tex_sub_image_2d(
                    self.target,
                    mip_level,
                    x,
                    y,
                    width,
                    height,
                    self.format_info.format,
                    self.format_info.ty,
                    data,
                );
            }
        }
        Ok(())
    }

    /// Regenerate the mip chain from level 0.
    pub fn generate_mipmaps(&self) {
        if self.is_destroyed() || self.mip_level_count < 2 {
            return;
        }
        let gl_ctx = self.device.gl();
        gl_ctx.bind_texture(self.target, self.raw.get());
        gl_ctx.generate_mipmap(self.target);
    }

    /// Create a validated view over a sub-range of this texture.
    pub fn create_view(self: &Rc<Self>, desc: &TextureViewDescriptor) -> Result<Rc<TextureView>> {
        let mip_count = desc
            .mip_level_count
            .unwrap_or(self.mip_level_count.saturating_sub(desc.base_mip_level));
        let layer_count = desc.array_layer_count.unwrap_or(
            self.depth_or_array_layers
                .saturating_sub(desc.base_array_layer),
        );

        if mip_count == 0 || desc.base_mip_level + mip_count > self.mip_level_count {
            return Err(Error::OutOfRange(format!(
                "{}: view mips {}..{} exceed texture mips {}",
                self.label,
                desc.base_mip_level,
                desc.base_mip_level + mip_count,
                self.mip_level_count
            )));
        }
        if layer_count == 0 || desc.base_array_layer + layer_count > self.depth_or_array_layers {
            return Err(Error::OutOfRange(format!(
                "{}: view layers {}..{} exceed texture layers {}",
                self.label,
                desc.base_array_layer,
                desc.base_array_layer + layer_count,
                self.depth_or_array_layers
            )));
        }

        let dimension = desc.dimension.unwrap_or(self.dimension);
        if dimension == TextureDimension::Cube && self.dimension != TextureDimension::Cube {
            return Err(Error::Configuration(format!(
                "{}: cube view over a non-cube texture",
                self.label
            )));
        }
        if dimension == TextureDimension::D3 && self.dimension != TextureDimension::D3 {
            return Err(Error::Configuration(format!(
                "{}: 3D view over a non-3D texture",
                self.label
            )));
        }

        Ok(Rc::new(TextureView {
            texture: self.clone(),
            format: desc.format.unwrap_or(self.format),
            dimension,
            base_mip_level: desc.base_mip_level,
            mip_level_count: mip_count,
            base_array_layer: desc.base_array_layer,
            array_layer_count: layer_count,
            label: desc
                .label
                .as_deref()
                .unwrap_or("<unnamed texture view>")
                .to_owned(),
        }))
    }

    /// Release the backend texture. Idempotent.
    pub fn destroy(&self) {
        if let Some(key) = self.key.take() {
            self.device.unregister(key);
        }
        let raw = self.raw.replace(0);
        if raw != 0 {
            self.device.gl().delete_texture(raw);
        }
    }
}

impl Tracked for Texture {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn destroy_now(&self) {
        self.destroy();
    }

    fn invalidate(&self) {
        self.key.take();
        self.raw.set(0);
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("label", &self.label)
            .field("size", &(self.width, self.height, self.depth_or_array_layers))
            .field("format", &self.format)
            .field("dimension", &self.dimension)
            .finish()
    }
}

/// A non-owning sub-range over a texture.
pub struct TextureView {
    texture: Rc<Texture>,
    format: TextureFormat,
    dimension: TextureDimension,
    base_mip_level: u32,
    mip_level_count: u32,
    base_array_layer: u32,
    array_layer_count: u32,
    label: String,
}

impl TextureView {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn texture(&self) -> &Rc<Texture> {
        &self.texture
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn dimension(&self) -> TextureDimension {
        self.dimension
    }

    pub fn base_mip_level(&self) -> u32 {
        self.base_mip_level
    }

    pub fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }

    pub fn base_array_layer(&self) -> u32 {
        self.base_array_layer
    }

    pub fn array_layer_count(&self) -> u32 {
        self.array_layer_count
    }

    pub fn width(&self) -> u32 {
        mip_extent(self.texture.width(), self.base_mip_level)
    }

    pub fn height(&self) -> u32 {
        mip_extent(self.texture.height(), self.base_mip_level)
    }

    pub(crate) fn raw(&self) -> u32 {
        self.texture.raw()
    }

    /// Target used when binding for sampling.
    pub(crate) fn bind_target(&self) -> u32 {
        self.texture.gl_target()
    }

    /// Target used when attaching to a framebuffer. A 2D view over a cube
    /// source selects a single face.
    pub(crate) fn attach_target(&self) -> u32 {
        if self.texture.gl_target() == gl::TEXTURE_CUBE_MAP {
            gl::TEXTURE_CUBE_MAP_POSITIVE_X + self.base_array_layer
        } else {
            gl::TEXTURE_2D
        }
    }

    /// Attach this view to the bound framebuffer.
    pub(crate) fn attach_to_framebuffer(&self, gl_ctx: &dyn GlContext, attachment: u32) {
        match self.texture.gl_target() {
            gl::TEXTURE_3D | gl::TEXTURE_2D_ARRAY => {
                gl_ctx.framebuffer_texture_layer(
                    gl::FRAMEBUFFER,
                    attachment,
                    self.raw(),
                    self.base_mip_level,
                    self.base_array_layer,
                );
            }
            _ => {
                gl_ctx.framebuffer_texture_2d(
                    gl::FRAMEBUFFER,
                    attachment,
                    self.attach_target(),
                    self.raw(),
                    self.base_mip_level,
                );
            }
        }
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.texture.is_destroyed()
    }

    pub(crate) fn device(&self) -> &Rc<DeviceShared> {
        &self.texture.device
    }

    pub(crate) fn sampling_error(&self) -> Option<String> {
        if self.is_destroyed() {
            Some(format!(
                "view \"{}\" references destroyed texture \"{}\"",
                self.label,
                self.texture.label()
            ))
        } else {
            None
        }
    }
}

impl std::fmt::Debug for TextureView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureView")
            .field("label", &self.label)
            .field("texture", &self.texture.label())
            .field("mips", &(self.base_mip_level..self.base_mip_level + self.mip_level_count))
            .field(
                "layers",
                &(self.base_array_layer..self.base_array_layer + self.array_layer_count),
            )
            .finish()
    }
}
