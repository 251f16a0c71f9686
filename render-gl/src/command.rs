//! Command recording and replay.
//!
//! The encoder records tagged commands; `finish()` freezes them into an
//! immutable command buffer; the device replays each buffer in submission
//! order. Replay is strictly ordered and synchronous against the backend.
//! An individual command that fails is logged with the buffer's label and
//! replay continues with the next command.

use crate::api::glenum as gl;
use crate::buffer::Buffer;
use crate::descriptor::BindGroup;
use crate::device::DeviceShared;
use crate::pipeline::RenderPipeline;
use crate::state::StateCache;
use crate::texture::{Texture, TextureView};
use crate::tracker::{ResourceCategory, ResourceKey, Tracked};
use log::{error, warn};
use prism_render::{Color, Error, Features, IndexFormat, LoadOp, Result, StoreOp};
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Clone)]
pub struct ColorAttachment {
    pub view: Rc<TextureView>,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear_value: Color,
}

#[derive(Clone)]
pub struct DepthStencilAttachment {
    pub view: Rc<TextureView>,
    pub depth_load_op: LoadOp,
    pub depth_store_op: StoreOp,
    pub clear_depth: f32,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub clear_stencil: u32,
}

#[derive(Clone, Default)]
pub struct RenderPassDescriptor {
    pub label: Option<String>,
    pub color_attachments: Vec<ColorAttachment>,
    pub depth_stencil_attachment: Option<DepthStencilAttachment>,
}

/// One recorded operation. Replay dispatches on the tag.
pub(crate) enum Command {
    BeginPass(RenderPassDescriptor),
    SetPipeline(Rc<RenderPipeline>),
    SetBindGroup {
        slot: u32,
        group: Rc<BindGroup>,
        dynamic_offsets: Vec<u32>,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: Rc<Buffer>,
        offset: usize,
    },
    SetIndexBuffer {
        buffer: Rc<Buffer>,
        format: IndexFormat,
        offset: usize,
    },
    SetViewport {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    SetScissor {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    SetBlendConstant(Color),
    SetStencilReference(u32),
    SetPushConstants {
        offset: usize,
        data: Vec<u8>,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    },
    EndPass,
    CopyBufferToBuffer {
        src: Rc<Buffer>,
        src_offset: usize,
        dst: Rc<Buffer>,
        dst_offset: usize,
        size: usize,
    },
    CopyBufferToTexture {
        src: Rc<Buffer>,
        src_offset: usize,
        dst: Rc<Texture>,
        mip_level: u32,
        origin: (u32, u32, u32),
        size: (u32, u32, u32),
    },
    CopyTextureToBuffer {
        src: Rc<Texture>,
        mip_level: u32,
        origin: (u32, u32, u32),
        size: (u32, u32),
        dst: Rc<Buffer>,
        dst_offset: usize,
    },
    CopyTextureToTexture {
        src: Rc<Texture>,
        src_origin: (u32, u32),
        dst: Rc<Texture>,
        dst_mip_level: u32,
        dst_origin: (u32, u32),
        size: (u32, u32),
    },
    CopyTextureToCanvas {
        src: Rc<TextureView>,
    },
}

pub(crate) struct EncoderInner {
    device: Rc<DeviceShared>,
    label: String,
    commands: RefCell<Vec<Command>>,
    finished: Cell<bool>,
    pass_open: Cell<bool>,
    key: Cell<Option<ResourceKey>>,
}

impl EncoderInner {
    fn record(&self, command: Command) -> Result<()> {
        if self.finished.get() {
            return Err(Error::EncoderFinished);
        }
        self.commands.borrow_mut().push(command);
        Ok(())
    }
}

impl Tracked for EncoderInner {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn destroy_now(&self) {
        self.finished.set(true);
        self.commands.borrow_mut().clear();
    }

    fn invalidate(&self) {
        self.key.take();
        self.finished.set(true);
        self.commands.borrow_mut().clear();
    }
}

impl Drop for EncoderInner {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.device.unregister(key);
        }
    }
}

/// Records commands. Becomes inert after `finish()`.
pub struct CommandEncoder {
    inner: Rc<EncoderInner>,
}

impl CommandEncoder {
    pub(crate) fn new(device: Rc<DeviceShared>, label: Option<&str>) -> Rc<CommandEncoder> {
        let label = label.unwrap_or("<unnamed command encoder>").to_owned();
        let inner = Rc::new(EncoderInner {
            device: device.clone(),
            label: label.clone(),
            commands: RefCell::new(Vec::new()),
            finished: Cell::new(false),
            pass_open: Cell::new(false),
            key: Cell::new(None),
        });
        let key = device.register(ResourceCategory::Encoder, label, Rc::downgrade(&inner) as _);
        inner.key.set(Some(key));
        Rc::new(CommandEncoder { inner })
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Open a render pass. Commands issued through the returned pass are
    /// recorded onto this encoder.
    pub fn begin_render_pass(&self, desc: RenderPassDescriptor) -> Result<RenderPass> {
        if self.inner.finished.get() {
            return Err(Error::EncoderFinished);
        }
        if self.inner.pass_open.get() {
            return Err(Error::Configuration(format!(
                "{}: a render pass is already open",
                self.inner.label
            )));
        }
        if desc.color_attachments.is_empty() && desc.depth_stencil_attachment.is_none() {
            return Err(Error::Configuration(format!(
                "{}: render pass needs at least one attachment",
                self.inner.label
            )));
        }
        self.inner.record(Command::BeginPass(desc))?;
        self.inner.pass_open.set(true);
        Ok(RenderPass {
            encoder: self.inner.clone(),
            ended: Cell::new(false),
        })
    }

    pub fn copy_buffer_to_buffer(
        &self,
        src: &Rc<Buffer>,
        src_offset: usize,
        dst: &Rc<Buffer>,
        dst_offset: usize,
        size: usize,
    ) -> Result<()> {
        if src_offset + size > src.size() || dst_offset + size > dst.size() {
            return Err(Error::OutOfRange(format!(
                "{}: copy of {size} bytes exceeds \"{}\" or \"{}\"",
                self.inner.label,
                src.label(),
                dst.label()
            )));
        }
        self.inner.record(Command::CopyBufferToBuffer {
            src: src.clone(),
            src_offset,
            dst: dst.clone(),
            dst_offset,
            size,
        })
    }

    pub fn copy_buffer_to_texture(
        &self,
        src: &Rc<Buffer>,
        src_offset: usize,
        dst: &Rc<Texture>,
        mip_level: u32,
        origin: (u32, u32, u32),
        size: (u32, u32, u32),
    ) -> Result<()> {
        self.inner.record(Command::CopyBufferToTexture {
            src: src.clone(),
            src_offset,
            dst: dst.clone(),
            mip_level,
            origin,
            size,
        })
    }

    pub fn copy_texture_to_buffer(
        &self,
        src: &Rc<Texture>,
        mip_level: u32,
        origin: (u32, u32, u32),
        size: (u32, u32),
        dst: &Rc<Buffer>,
        dst_offset: usize,
    ) -> Result<()> {
        self.inner.record(Command::CopyTextureToBuffer {
            src: src.clone(),
            mip_level,
            origin,
            size,
            dst: dst.clone(),
            dst_offset,
        })
    }

    pub fn copy_texture_to_texture(
        &self,
        src: &Rc<Texture>,
        src_origin: (u32, u32),
        dst: &Rc<Texture>,
        dst_mip_level: u32,
        dst_origin: (u32, u32),
        size: (u32, u32),
    ) -> Result<()> {
        self.inner.record(Command::CopyTextureToTexture {
            src: src.clone(),
            src_origin,
            dst: dst.clone(),
            dst_mip_level,
            dst_origin,
            size,
        })
    }

    /// Blit a texture view onto the default drawing buffer.
    pub fn copy_texture_to_canvas(&self, src: &Rc<TextureView>) -> Result<()> {
        self.inner
            .record(Command::CopyTextureToCanvas { src: src.clone() })
    }

    /// Freeze the recording. The encoder is inert afterwards; a second
    /// `finish()` raises.
    pub fn finish(&self) -> Result<CommandBuffer> {
        if self.inner.finished.get() {
            return Err(Error::EncoderFinished);
        }
        if self.inner.pass_open.get() {
            return Err(Error::Configuration(format!(
                "{}: finish() with an open render pass",
                self.inner.label
            )));
        }
        self.inner.finished.set(true);
        let commands = self.inner.commands.borrow_mut().drain(..).collect();
        Ok(CommandBuffer {
            label: self.inner.label.clone(),
            commands,
        })
    }
}

/// A recording scope over the attachments of one pass.
pub struct RenderPass {
    encoder: Rc<EncoderInner>,
    ended: Cell<bool>,
}

impl RenderPass {
    fn record(&self, command: Command) -> Result<()> {
        if self.ended.get() {
            return Err(Error::PassEnded);
        }
        self.encoder.record(command)
    }

    pub fn set_pipeline(&self, pipeline: &Rc<RenderPipeline>) -> Result<()> {
        self.record(Command::SetPipeline(pipeline.clone()))
    }

    pub fn set_bind_group(
        &self,
        slot: u32,
        group: &Rc<BindGroup>,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        self.record(Command::SetBindGroup {
            slot,
            group: group.clone(),
            dynamic_offsets: dynamic_offsets.to_vec(),
        })
    }

    pub fn set_vertex_buffer(&self, slot: u32, buffer: &Rc<Buffer>, offset: usize) -> Result<()> {
        self.record(Command::SetVertexBuffer {
            slot,
            buffer: buffer.clone(),
            offset,
        })
    }

    /// Plural form: consecutive slots starting at `first_slot`.
    pub fn set_vertex_buffers(
        &self,
        first_slot: u32,
        buffers: &[(&Rc<Buffer>, usize)],
    ) -> Result<()> {
        for (i, (buffer, offset)) in buffers.iter().enumerate() {
            self.set_vertex_buffer(first_slot + i as u32, buffer, *offset)?;
        }
        Ok(())
    }

    pub fn set_index_buffer(
        &self,
        buffer: &Rc<Buffer>,
        format: IndexFormat,
        offset: usize,
    ) -> Result<()> {
        self.record(Command::SetIndexBuffer {
            buffer: buffer.clone(),
            format,
            offset,
        })
    }

    pub fn set_viewport(&self, x: i32, y: i32, width: u32, height: u32) -> Result<()> {
        self.record(Command::SetViewport {
            x,
            y,
            width,
            height,
        })
    }

    pub fn set_scissor(&self, x: i32, y: i32, width: u32, height: u32) -> Result<()> {
        self.record(Command::SetScissor {
            x,
            y,
            width,
            height,
        })
    }

    pub fn set_blend_constant(&self, color: Color) -> Result<()> {
        self.record(Command::SetBlendConstant(color))
    }

    pub fn set_stencil_reference(&self, reference: u32) -> Result<()> {
        self.record(Command::SetStencilReference(reference))
    }

    /// Push-constant writes are recorded and take effect in pass order.
    pub fn set_push_constants(&self, offset: usize, data: &[u8]) -> Result<()> {
        if self.encoder.device.generation() == prism_render::BackendGeneration::Gl1 {
            return Err(Error::UnsupportedFeature(
                "push constants are unavailable on the 1.x backend".into(),
            ));
        }
        self.record(Command::SetPushConstants {
            offset,
            data: data.to_vec(),
        })
    }

    pub fn draw(
        &self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.record(Command::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        })
    }

    pub fn draw_indexed(
        &self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.record(Command::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            base_vertex,
            first_instance,
        })
    }

    /// Indirect draws have no backend expression.
    pub fn draw_indirect(&self, _buffer: &Rc<Buffer>, _offset: usize) -> Result<()> {
        Err(Error::UnsupportedFeature(
            "indirect draws are unavailable on this backend".into(),
        ))
    }

    /// Close the pass. Must be called exactly once.
    pub fn end(&self) -> Result<()> {
        if self.ended.replace(true) {
            return Err(Error::PassEnded);
        }
        self.encoder.record(Command::EndPass)?;
        self.encoder.pass_open.set(false);
        Ok(())
    }
}

/// An immutable recorded sequence, replayable against the device.
pub struct CommandBuffer {
    label: String,
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Replay every command in recording order. Individual command failures
    /// are logged and skipped.
    pub(crate) fn execute(&self, device: &Rc<DeviceShared>, cache: &mut StateCache) {
        let mut replay = ReplayState {
            device: device.clone(),
            cache,
            pass: None,
            pipeline: None,
            index_buffer: None,
            blend_constant: None,
            stencil_reference: 0,
            vertex_buffers_bound: 0,
        };
        let mut pass_abandoned = false;
        for command in &self.commands {
            if pass_abandoned {
                // skip the abandoned pass's contents, resume after it closes
                if matches!(command, Command::EndPass) {
                    pass_abandoned = false;
                    replay.end_pass();
                }
                continue;
            }
            if let Err(err) = replay.run(command) {
                error!("replay failure in \"{}\": {err}", self.label);
                if matches!(command, Command::BeginPass(_)) {
                    pass_abandoned = true;
                }
            }
        }
        if replay.pass.is_some() {
            error!(
                "\"{}\": command stream ended inside a render pass",
                self.label
            );
            replay.end_pass();
        }
    }
}

struct PassState {
    framebuffer: u32,
    recovery_renderbuffer: Option<u32>,
    /// Attachments whose store op is discard; invalidated at end of pass
    /// on the 2.x generation.
    discarded_attachments: Vec<u32>,
}

struct ReplayState<'a> {
    device: Rc<DeviceShared>,
    cache: &'a mut StateCache,
    pass: Option<PassState>,
    pipeline: Option<Rc<RenderPipeline>>,
    index_buffer: Option<(Rc<Buffer>, IndexFormat, usize)>,
    blend_constant: Option<[f32; 4]>,
    stencil_reference: i32,
    vertex_buffers_bound: u32,
}

impl<'a> ReplayState<'a> {
    fn run(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::BeginPass(desc) => self.begin_pass(desc),
            Command::EndPass => {
                self.end_pass();
                Ok(())
            }
            Command::SetPipeline(pipeline) => {
                pipeline.apply(self.cache, self.stencil_reference);
                // a pipeline switch must not revert the recorded constant
                if let Some(constant) = self.blend_constant {
                    self.cache.set_blend_constant(self.device.gl(), constant);
                }
                self.pipeline = Some(pipeline.clone());
                Ok(())
            }
            Command::SetBindGroup {
                slot,
                group,
                dynamic_offsets,
            } => {
                let Some(pipeline) = &self.pipeline else {
                    return Err(Error::Replay(format!(
                        "bind group \"{}\" set at slot {slot} with no active pipeline",
                        group.label()
                    )));
                };
                group.apply_bindings(pipeline, dynamic_offsets);
                Ok(())
            }
            Command::SetVertexBuffer {
                slot,
                buffer,
                offset,
            } => {
                let Some(pipeline) = &self.pipeline else {
                    return Err(Error::Replay(format!(
                        "vertex buffer \"{}\" set at slot {slot} with no active pipeline",
                        buffer.label()
                    )));
                };
                if buffer.is_destroyed() {
                    return Err(Error::Replay(format!(
                        "vertex buffer \"{}\" was destroyed",
                        buffer.label()
                    )));
                }
                pipeline.apply_vertex_buffer_layout(*slot as usize, buffer, *offset);
                self.vertex_buffers_bound += 1;
                Ok(())
            }
            Command::SetIndexBuffer {
                buffer,
                format,
                offset,
            } => {
                if buffer.is_destroyed() {
                    return Err(Error::Replay(format!(
                        "index buffer \"{}\" was destroyed",
                        buffer.label()
                    )));
                }
                self.device.gl().bind_buffer(gl::ELEMENT_ARRAY_BUFFER, buffer.raw());
                self.index_buffer = Some((buffer.clone(), *format, *offset));
                Ok(())
            }
            Command::SetViewport {
                x,
                y,
                width,
                height,
            } => {
                self.device.gl().viewport(*x, *y, *width as i32, *height as i32);
                Ok(())
            }
            Command::SetScissor {
                x,
                y,
                width,
                height,
            } => {
                let gl_ctx = self.device.gl();
                gl_ctx.scissor(*x, *y, *width as i32, *height as i32);
                self.cache.set_scissor_test(gl_ctx, true);
                Ok(())
            }
            Command::SetBlendConstant(color) => {
                let constant = [
                    color.r as f32,
                    color.g as f32,
                    color.b as f32,
                    color.a as f32,
                ];
                self.blend_constant = Some(constant);
                self.cache.set_blend_constant(self.device.gl(), constant);
                Ok(())
            }
            Command::SetStencilReference(reference) => {
                self.stencil_reference = *reference as i32;
                if let Some(pipeline) = self.pipeline.clone() {
                    pipeline.apply(self.cache, self.stencil_reference);
                }
                Ok(())
            }
            Command::SetPushConstants { offset, data } => {
                let Some(pipeline) = &self.pipeline else {
                    return Err(Error::Replay(
                        "push constants written with no active pipeline".into(),
                    ));
                };
                pipeline.update_push_constants(*offset, data);
                Ok(())
            }
            Command::Draw {
                vertex_count,
                instance_count,
                first_vertex,
                ..
            } => self.draw(*vertex_count, *instance_count, *first_vertex),
            Command::DrawIndexed {
                index_count,
                instance_count,
                first_index,
                ..
            } => self.draw_indexed(*index_count, *instance_count, *first_index),
            Command::CopyBufferToBuffer {
                src,
                src_offset,
                dst,
                dst_offset,
                size,
            } => self.copy_buffer_to_buffer(src, *src_offset, dst, *dst_offset, *size),
            Command::CopyBufferToTexture {
                src,
                src_offset,
                dst,
                mip_level,
                origin,
                size,
            } => self.copy_buffer_to_texture(src, *src_offset, dst, *mip_level, *origin, *size),
            Command::CopyTextureToBuffer {
                src,
                mip_level,
                origin,
                size,
                dst,
                dst_offset,
            } => self.copy_texture_to_buffer(src, *mip_level, *origin, *size, dst, *dst_offset),
            Command::CopyTextureToTexture {
                src,
                src_origin,
                dst,
                dst_mip_level,
                dst_origin,
                size,
            } => self.copy_texture_to_texture(src, *src_origin, dst, *dst_mip_level, *dst_origin, *size),
            Command::CopyTextureToCanvas { src } => self.copy_texture_to_canvas(src),
        }
    }

    // pass lifecycle ------------------------------------------------------

    fn begin_pass(&mut self, desc: &RenderPassDescriptor) -> Result<()> {
        let gl_ctx = self.device.gl();
        let framebuffer = gl_ctx.create_framebuffer();
        self.cache.bind_framebuffer(gl_ctx, framebuffer);

        for (index, attachment) in desc.color_attachments.iter().enumerate() {
            if let Some(reason) = attachment.view.sampling_error() {
                self.cache.bind_framebuffer(gl_ctx, 0);
                gl_ctx.delete_framebuffer(framebuffer);
                return Err(Error::Replay(reason));
            }
            attachment
                .view
                .attach_to_framebuffer(gl_ctx, gl::COLOR_ATTACHMENT0 + index as u32);
        }

        if let Some(ds) = &desc.depth_stencil_attachment {
            if let Some(reason) = ds.view.sampling_error() {
                self.cache.bind_framebuffer(gl_ctx, 0);
                gl_ctx.delete_framebuffer(framebuffer);
                return Err(Error::Replay(reason));
            }
            let format = ds.view.format();
            let attachment = if format.has_depth() && format.has_stencil() {
                gl::DEPTH_STENCIL_ATTACHMENT
            } else if format.has_stencil() {
                gl::STENCIL_ATTACHMENT
            } else {
                gl::DEPTH_ATTACHMENT
            };
            ds.view.attach_to_framebuffer(gl_ctx, attachment);
        }

        if desc.color_attachments.len() > 1 {
            if self
                .device
                .features()
                .contains(Features::MULTIPLE_RENDER_TARGETS)
            {
                let buffers: SmallVec<[u32; 8]> = (0..desc.color_attachments.len())
                    .map(|i| gl::COLOR_ATTACHMENT0 + i as u32)
                    .collect();
                gl_ctx.draw_buffers(&buffers);
            } else {
                warn!(
                    "pass \"{}\": multiple color attachments without MRT support; \
                     only attachment 0 receives output",
                    desc.label.as_deref().unwrap_or("<unnamed>")
                );
            }
        }

        // completeness, with the renderbuffer recovery path
        let mut recovery_renderbuffer = None;
        let mut status = gl_ctx.check_framebuffer_status(gl::FRAMEBUFFER);
        if status != gl::FRAMEBUFFER_COMPLETE {
            if let Some(first) = desc.color_attachments.first() {
                warn!(
                    "pass framebuffer incomplete ({status:#x}); retrying with a depth renderbuffer"
                );
                let rb = gl_ctx.create_renderbuffer();
                gl_ctx.bind_renderbuffer(rb);
                gl_ctx.renderbuffer_storage(
                    gl::DEPTH_COMPONENT16,
                    first.view.width(),
                    first.view.height(),
                );
                gl_ctx.framebuffer_renderbuffer(gl::FRAMEBUFFER, gl::DEPTH_ATTACHMENT, rb);
                recovery_renderbuffer = Some(rb);
                status = gl_ctx.check_framebuffer_status(gl::FRAMEBUFFER);
            }
        }
        if status != gl::FRAMEBUFFER_COMPLETE {
            warn!("pass framebuffer still incomplete ({status:#x}); retrying color-only");
            gl_ctx.framebuffer_renderbuffer(gl::FRAMEBUFFER, gl::DEPTH_ATTACHMENT, 0);
            if let Some(rb) = recovery_renderbuffer.take() {
                gl_ctx.delete_renderbuffer(rb);
            }
            status = gl_ctx.check_framebuffer_status(gl::FRAMEBUFFER);
        }
        if status != gl::FRAMEBUFFER_COMPLETE {
            self.cache.bind_framebuffer(gl_ctx, 0);
            gl_ctx.delete_framebuffer(framebuffer);
            return Err(Error::Replay(format!(
                "pass abandoned: framebuffer incomplete ({status:#x})"
            )));
        }

        // clears per load ops
        let mut clear_mask = 0u32;
        if let Some(first) = desc.color_attachments.first() {
            if desc.color_attachments.iter().any(|a| a.load_op == LoadOp::Clear) {
                let c = first.clear_value;
                self.cache.set_color_mask(gl_ctx, [true, true, true, true]);
                gl_ctx.clear_color(c.r as f32, c.g as f32, c.b as f32, c.a as f32);
                clear_mask |= gl::COLOR_BUFFER_BIT;
            }
        }
        if let Some(ds) = &desc.depth_stencil_attachment {
            if ds.depth_load_op == LoadOp::Clear {
                self.cache.set_depth_write(gl_ctx, true);
                gl_ctx.clear_depth(ds.clear_depth);
                clear_mask |= gl::DEPTH_BUFFER_BIT;
            }
            if ds.stencil_load_op == LoadOp::Clear && ds.view.format().has_stencil() {
                self.cache.set_stencil_write_mask(gl_ctx, gl::FRONT, !0);
                self.cache.set_stencil_write_mask(gl_ctx, gl::BACK, !0);
                gl_ctx.clear_stencil(ds.clear_stencil as i32);
                clear_mask |= gl::STENCIL_BUFFER_BIT;
            }
        }
        if clear_mask != 0 {
            self.cache.set_scissor_test(gl_ctx, false);
            gl_ctx.clear(clear_mask);
        }

        // viewport and scissor defaults track the first attachment
        let (width, height) = desc
            .color_attachments
            .first()
            .map(|a| (a.view.width(), a.view.height()))
            .or_else(|| {
                desc.depth_stencil_attachment
                    .as_ref()
                    .map(|ds| (ds.view.width(), ds.view.height()))
            })
            .unwrap_or_else(|| gl_ctx.drawing_buffer_size());
        gl_ctx.viewport(0, 0, width as i32, height as i32);
        gl_ctx.scissor(0, 0, width as i32, height as i32);
        self.cache.set_scissor_test(gl_ctx, false);

        let mut discarded_attachments = Vec::new();
        for (index, attachment) in desc.color_attachments.iter().enumerate() {
            if attachment.store_op == StoreOp::Discard {
                discarded_attachments.push(gl::COLOR_ATTACHMENT0 + index as u32);
            }
        }
        if let Some(ds) = &desc.depth_stencil_attachment {
            if ds.depth_store_op == StoreOp::Discard {
                discarded_attachments.push(gl::DEPTH_ATTACHMENT);
            }
            if ds.stencil_store_op == StoreOp::Discard && ds.view.format().has_stencil() {
                discarded_attachments.push(gl::STENCIL_ATTACHMENT);
            }
        }

        self.pass = Some(PassState {
            framebuffer,
            recovery_renderbuffer,
            discarded_attachments,
        });
        self.vertex_buffers_bound = 0;
        Ok(())
    }

    fn end_pass(&mut self) {
        let gl_ctx = self.device.gl();
        if let Some(pass) = self.pass.take() {
            if !pass.discarded_attachments.is_empty()
                && self.device.generation() == prism_render::BackendGeneration::Gl2
            {
                gl_ctx.invalidate_framebuffer(gl::FRAMEBUFFER, &pass.discarded_attachments);
            }
            self.cache.set_program(gl_ctx, 0);
            self.cache.bind_framebuffer(gl_ctx, 0);
            gl_ctx.delete_framebuffer(pass.framebuffer);
            if let Some(rb) = pass.recovery_renderbuffer {
                gl_ctx.delete_renderbuffer(rb);
            }
        }
        // reset attribute state so the next pass starts clean
        self.cache.bind_vertex_array(gl_ctx, 0);
        for location in 0..self.device.max_vertex_attribs() {
            gl_ctx.disable_vertex_attrib_array(location);
        }
        self.pipeline = None;
        self.index_buffer = None;
        self.vertex_buffers_bound = 0;
    }

    // draws ---------------------------------------------------------------

    fn pre_draw_checks(&mut self) -> Result<Rc<RenderPipeline>> {
        let Some(pipeline) = self.pipeline.clone() else {
            return Err(Error::Replay("draw with no active pipeline".into()));
        };
        if pipeline.is_destroyed() {
            return Err(Error::Replay(format!(
                "draw with destroyed pipeline \"{}\"",
                pipeline.label()
            )));
        }
        if pipeline.vertex_slot_count() > 0 && self.vertex_buffers_bound == 0 {
            return Err(Error::Replay(format!(
                "draw with pipeline \"{}\" but no vertex buffer bound",
                pipeline.label()
            )));
        }
        if self.pass.is_some() {
            let status = self.device.gl().check_framebuffer_status(gl::FRAMEBUFFER);
            if status != gl::FRAMEBUFFER_COMPLETE {
                return Err(Error::Replay(format!(
                    "draw skipped: framebuffer incomplete ({status:#x})"
                )));
            }
        }
        pipeline.rebind_push_constants();
        Ok(pipeline)
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32) -> Result<()> {
        let pipeline = self.pre_draw_checks()?;
        let mode = crate::translate::topology_to_gl(pipeline.topology());
        let gl_ctx = self.device.gl();
        if instance_count > 1 {
            if self.device.features().contains(Features::INSTANCING) {
                gl_ctx.draw_arrays_instanced(mode, first_vertex, vertex_count, instance_count);
            } else {
                warn!("instanced draw without instancing support; drawing one instance");
                gl_ctx.draw_arrays(mode, first_vertex, vertex_count);
            }
        } else {
            gl_ctx.draw_arrays(mode, first_vertex, vertex_count);
        }
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
    ) -> Result<()> {
        let pipeline = self.pre_draw_checks()?;
        let Some((_, format, base_offset)) = self.index_buffer.clone() else {
            return Err(Error::Replay("indexed draw with no index buffer".into()));
        };
        let mode = crate::translate::topology_to_gl(pipeline.topology());
        let ty = crate::translate::index_format_type(format);
        let offset = base_offset + first_index as usize * format.byte_size() as usize;
        let gl_ctx = self.device.gl();
        if instance_count > 1 {
            if self.device.features().contains(Features::INSTANCING) {
                gl_ctx.draw_elements_instanced(mode, index_count, ty, offset, instance_count);
            } else {
                warn!("instanced indexed draw without instancing support; drawing one instance");
                gl_ctx.draw_elements(mode, index_count, ty, offset);
            }
        } else {
            gl_ctx.draw_elements(mode, index_count, ty, offset);
        }
        Ok(())
    }

    // copies --------------------------------------------------------------

    fn copy_buffer_to_buffer(
        &mut self,
        src: &Rc<Buffer>,
        src_offset: usize,
        dst: &Rc<Buffer>,
        dst_offset: usize,
        size: usize,
    ) -> Result<()> {
        if src.is_destroyed() || dst.is_destroyed() {
            return Err(Error::Replay("buffer copy with destroyed buffer".into()));
        }
        let gl_ctx = self.device.gl();
        match self.device.generation() {
            prism_render::BackendGeneration::Gl2 => {
                gl_ctx.bind_buffer(gl::COPY_READ_BUFFER, src.raw());
                gl_ctx.bind_buffer(gl::COPY_WRITE_BUFFER, dst.raw());
                gl_ctx.copy_buffer_sub_data(
                    gl::COPY_READ_BUFFER,
                    gl::COPY_WRITE_BUFFER,
                    src_offset,
                    dst_offset,
                    size,
                );
                Ok(())
            }
            prism_render::BackendGeneration::Gl1 => Err(Error::Replay(format!(
                "buffer-to-buffer copy \"{}\" -> \"{}\" is unavailable on the 1.x backend",
                src.label(),
                dst.label()
            ))),
        }
    }

    fn copy_buffer_to_texture(
        &mut self,
        src: &Rc<Buffer>,
        src_offset: usize,
        dst: &Rc<Texture>,
        mip_level: u32,
        origin: (u32, u32, u32),
        size: (u32, u32, u32),
    ) -> Result<()> {
        let byte_len = (size.0 * size.1 * size.2.max(1)) as usize * dst.format().block_size() as usize;
        let Some(bytes) = src.read_back(src_offset, byte_len) else {
            return Err(Error::Replay(format!(
                "cannot read \"{}\" for buffer-to-texture copy on this backend",
                src.label()
            )));
        };
        dst.update(
            &bytes,
            origin.0,
            origin.1,
            origin.2,
            size.0,
            size.1,
            size.2,
            mip_level,
            origin.2,
        )
    }

    fn copy_texture_to_buffer(
        &mut self,
        src: &Rc<Texture>,
        mip_level: u32,
        origin: (u32, u32, u32),
        size: (u32, u32),
        dst: &Rc<Buffer>,
        dst_offset: usize,
    ) -> Result<()> {
        if src.is_destroyed() || dst.is_destroyed() {
            return Err(Error::Replay("texture copy with destroyed resource".into()));
        }
        let gl_ctx = self.device.gl();
        let info = src.format_info();
        let byte_len = (size.0 * size.1) as usize * src.format().block_size() as usize;
        let mut staging = vec![0u8; byte_len];

        let framebuffer = gl_ctx.create_framebuffer();
        gl_ctx.bind_framebuffer(gl::FRAMEBUFFER, framebuffer);
        gl_ctx.framebuffer_texture_2d(
            gl::FRAMEBUFFER,
            gl::COLOR_ATTACHMENT0,
            if src.gl_target() == gl::TEXTURE_CUBE_MAP {
                gl::TEXTURE_CUBE_MAP_POSITIVE_X + origin.2
            } else {
                gl::TEXTURE_2D
            },
            src.raw(),
            mip_level,
        );
        let status = gl_ctx.check_framebuffer_status(gl::FRAMEBUFFER);
        let result = if status == gl::FRAMEBUFFER_COMPLETE {
            gl_ctx.read_pixels(
                origin.0,
                origin.1,
                size.0,
                size.1,
                info.format,
                info.ty,
                &mut staging,
            );
            gl_ctx.bind_buffer(dst.gl_target(), dst.raw());
            gl_ctx.buffer_sub_data(dst.gl_target(), dst_offset, &staging);
            Ok(())
        } else {
            Err(Error::Replay(format!(
                "texture \"{}\" is not readable as a framebuffer source ({status:#x})",
                src.label()
            )))
        };
        gl_ctx.bind_framebuffer(gl::FRAMEBUFFER, 0);
        gl_ctx.delete_framebuffer(framebuffer);
        self.cache.invalidate();
        result
    }

    fn copy_texture_to_texture(
        &mut self,
        src: &Rc<Texture>,
        src_origin: (u32, u32),
        dst: &Rc<Texture>,
        dst_mip_level: u32,
        dst_origin: (u32, u32),
        size: (u32, u32),
    ) -> Result<()> {
        if src.is_destroyed() || dst.is_destroyed() {
            return Err(Error::Replay("texture copy with destroyed resource".into()));
        }
        let gl_ctx = self.device.gl();
        match self.device.generation() {
            prism_render::BackendGeneration::Gl2 => {
                let read_fb = gl_ctx.create_framebuffer();
                let draw_fb = gl_ctx.create_framebuffer();
                gl_ctx.bind_framebuffer(gl::READ_FRAMEBUFFER, read_fb);
                gl_ctx.framebuffer_texture_2d(
                    gl::READ_FRAMEBUFFER,
                    gl::COLOR_ATTACHMENT0,
                    gl::TEXTURE_2D,
                    src.raw(),
                    0,
                );
                gl_ctx.bind_framebuffer(gl::DRAW_FRAMEBUFFER, draw_fb);
                gl_ctx.framebuffer_texture_2d(
                    gl::DRAW_FRAMEBUFFER,
                    gl::COLOR_ATTACHMENT0,
                    gl::TEXTURE_2D,
                    dst.raw(),
                    dst_mip_level,
                );
                gl_ctx.blit_framebuffer(
                    [
                        src_origin.0 as i32,
                        src_origin.1 as i32,
                        (src_origin.0 + size.0) as i32,
                        (src_origin.1 + size.1) as i32,
                    ],
                    [
                        dst_origin.0 as i32,
                        dst_origin.1 as i32,
                        (dst_origin.0 + size.0) as i32,
                        (dst_origin.1 + size.1) as i32,
                    ],
                    gl::COLOR_BUFFER_BIT,
                    gl::NEAREST,
                );
                gl_ctx.bind_framebuffer(gl::FRAMEBUFFER, 0);
                gl_ctx.delete_framebuffer(read_fb);
                gl_ctx.delete_framebuffer(draw_fb);
                self.cache.invalidate();
                Ok(())
            }
            prism_render::BackendGeneration::Gl1 => {
                // CPU round-trip: read the source region, upload to the
                // destination
                let info = src.format_info();
                let byte_len = (size.0 * size.1) as usize * src.format().block_size() as usize;
                let mut staging = vec![0u8; byte_len];
                let framebuffer = gl_ctx.create_framebuffer();
                gl_ctx.bind_framebuffer(gl::FRAMEBUFFER, framebuffer);
                gl_ctx.framebuffer_texture_2d(
                    gl::FRAMEBUFFER,
                    gl::COLOR_ATTACHMENT0,
                    gl::TEXTURE_2D,
                    src.raw(),
                    0,
                );
                let status = gl_ctx.check_framebuffer_status(gl::FRAMEBUFFER);
                let result = if status == gl::FRAMEBUFFER_COMPLETE {
                    gl_ctx.read_pixels(
                        src_origin.0,
                        src_origin.1,
                        size.0,
                        size.1,
                        info.format,
                        info.ty,
                        &mut staging,
                    );
                    gl_ctx.bind_framebuffer(gl::FRAMEBUFFER, 0);
                    dst.update(
                        &staging,
                        dst_origin.0,
                        dst_origin.1,
                        0,
                        size.0,
                        size.1,
                        1,
                        dst_mip_level,
                        0,
                    )
                } else {
                    Err(Error::Replay(format!(
                        "texture \"{}\" is not readable for the copy round-trip ({status:#x})",
                        src.label()
                    )))
                };
                gl_ctx.bind_framebuffer(gl::FRAMEBUFFER, 0);
                gl_ctx.delete_framebuffer(framebuffer);
                self.cache.invalidate();
                result
            }
        }
    }

    /// Composite out-of-band operation: draw the source view over the whole
    /// drawing buffer with a transient fullscreen-quad program, then restore
    /// every piece of state it touched.
    fn copy_texture_to_canvas(&mut self, src: &Rc<TextureView>) -> Result<()> {
        if let Some(reason) = src.sampling_error() {
            return Err(Error::Replay(reason));
        }
        let gl_ctx = self.device.gl();
        let gl2 = self.device.generation() == prism_render::BackendGeneration::Gl2;

        // save
        let saved_program = gl_ctx.get_integer(gl::CURRENT_PROGRAM) as u32;
        let saved_array_buffer = gl_ctx.get_integer(gl::ARRAY_BUFFER_BINDING) as u32;
        let saved_vao = gl_ctx.get_integer(gl::VERTEX_ARRAY_BINDING) as u32;
        let saved_framebuffer = gl_ctx.get_integer(gl::FRAMEBUFFER_BINDING) as u32;
        let saved_active_texture = gl_ctx.get_integer(gl::ACTIVE_TEXTURE) as u32;
        let saved_viewport = gl_ctx.get_viewport();
        let saved_blend = gl_ctx.is_enabled(gl::BLEND);
        let saved_depth = gl_ctx.is_enabled(gl::DEPTH_TEST);
        let saved_cull = gl_ctx.is_enabled(gl::CULL_FACE);
        let saved_scissor = gl_ctx.is_enabled(gl::SCISSOR_TEST);
        gl_ctx.active_texture(0);
        let saved_unit0_texture = gl_ctx.get_integer(gl::TEXTURE_BINDING_2D) as u32;

        // transient program
        let (vs_source, fs_source) = if gl2 {
            (BLIT_VS_300, BLIT_FS_300)
        } else {
            (BLIT_VS_100, BLIT_FS_100)
        };
        let vs = gl_ctx.create_shader(gl::VERTEX_SHADER);
        gl_ctx.shader_source(vs, vs_source);
        gl_ctx.compile_shader(vs);
        let fs = gl_ctx.create_shader(gl::FRAGMENT_SHADER);
        gl_ctx.shader_source(fs, fs_source);
        gl_ctx.compile_shader(fs);
        let program = gl_ctx.create_program();
        gl_ctx.attach_shader(program, vs);
        gl_ctx.attach_shader(program, fs);
        gl_ctx.link_program(program);
        if !gl_ctx.program_link_status(program) {
            let log = gl_ctx.program_info_log(program);
            gl_ctx.delete_program(program);
            gl_ctx.delete_shader(vs);
            gl_ctx.delete_shader(fs);
            return Err(Error::Replay(format!("canvas blit program failed: {log}")));
        }

        let vao = gl_ctx.create_vertex_array();
        gl_ctx.bind_vertex_array(vao);
        let quad = gl_ctx.create_buffer();
        gl_ctx.bind_buffer(gl::ARRAY_BUFFER, quad);
        gl_ctx.buffer_data(gl::ARRAY_BUFFER, &quad_vertices(), gl::STATIC_DRAW);

        let position = gl_ctx.attrib_location(program, "a_position");
        let uv = gl_ctx.attrib_location(program, "a_uv");
        if position >= 0 {
            gl_ctx.enable_vertex_attrib_array(position as u32);
            gl_ctx.vertex_attrib_pointer(position as u32, 2, gl::FLOAT, false, 16, 0);
        }
        if uv >= 0 {
            gl_ctx.enable_vertex_attrib_array(uv as u32);
            gl_ctx.vertex_attrib_pointer(uv as u32, 2, gl::FLOAT, false, 16, 8);
        }

        // draw over the whole canvas
        gl_ctx.bind_framebuffer(gl::FRAMEBUFFER, 0);
        let (width, height) = gl_ctx.drawing_buffer_size();
        gl_ctx.viewport(0, 0, width as i32, height as i32);
        gl_ctx.disable(gl::BLEND);
        gl_ctx.disable(gl::DEPTH_TEST);
        gl_ctx.disable(gl::CULL_FACE);
        gl_ctx.disable(gl::SCISSOR_TEST);
        gl_ctx.use_program(program);
        gl_ctx.active_texture(0);
        gl_ctx.bind_texture(src.bind_target(), src.raw());
        let sampler_location = gl_ctx.uniform_location(program, "u_source");
        if sampler_location >= 0 {
            gl_ctx.uniform_1i(sampler_location, 0);
        }
        gl_ctx.draw_arrays(gl::TRIANGLE_STRIP, 0, 4);

        // tear down transients
        gl_ctx.delete_buffer(quad);
        gl_ctx.delete_vertex_array(vao);
        gl_ctx.delete_program(program);
        gl_ctx.delete_shader(vs);
        gl_ctx.delete_shader(fs);

        // restore
        gl_ctx.bind_texture(gl::TEXTURE_2D, saved_unit0_texture);
        gl_ctx.active_texture(saved_active_texture.saturating_sub(gl::TEXTURE0));
        gl_ctx.bind_vertex_array(saved_vao);
        gl_ctx.bind_buffer(gl::ARRAY_BUFFER, saved_array_buffer);
        gl_ctx.bind_framebuffer(gl::FRAMEBUFFER, saved_framebuffer);
        gl_ctx.use_program(saved_program);
        gl_ctx.viewport(
            saved_viewport[0],
            saved_viewport[1],
            saved_viewport[2],
            saved_viewport[3],
        );
        for (cap, was_enabled) in [
            (gl::BLEND, saved_blend),
            (gl::DEPTH_TEST, saved_depth),
            (gl::CULL_FACE, saved_cull),
            (gl::SCISSOR_TEST, saved_scissor),
        ] {
            if was_enabled {
                gl_ctx.enable(cap);
            } else {
                gl_ctx.disable(cap);
            }
        }
        // the cache no longer reflects reality
        self.cache.invalidate();
        Ok(())
    }
}

const BLIT_VS_300: &str = "#version 300 es\n\
in vec2 a_position;\n\
in vec2 a_uv;\n\
out vec2 v_uv;\n\
void main() {\n\
    v_uv = a_uv;\n\
    gl_Position = vec4(a_position, 0.0, 1.0);\n\
}\n";

const BLIT_FS_300: &str = "#version 300 es\n\
precision mediump float;\n\
in vec2 v_uv;\n\
uniform sampler2D u_source;\n\
out vec4 o_color;\n\
void main() {\n\
    o_color = texture(u_source, v_uv);\n\
}\n";

const BLIT_VS_100: &str = "attribute vec2 a_position;\n\
attribute vec2 a_uv;\n\
varying vec2 v_uv;\n\
void main() {\n\
    v_uv = a_uv;\n\
    gl_Position = vec4(a_position, 0.0, 1.0);\n\
}\n";

const BLIT_FS_100: &str = "precision mediump float;\n\
varying vec2 v_uv;\n\
uniform sampler2D u_source;\n\
void main() {\n\
    gl_FragColor = texture2D(u_source, v_uv);\n\
}\n";

/// Fullscreen triangle-strip quad, interleaved position/uv.
fn quad_vertices() -> Vec<u8> {
    let vertices: [f32; 16] = [
        -1.0, -1.0, 0.0, 0.0, //
        1.0, -1.0, 1.0, 0.0, //
        -1.0, 1.0, 0.0, 1.0, //
        1.0, 1.0, 1.0, 1.0, //
    ];
    vertices.iter().flat_map(|v| v.to_le_bytes()).collect()
}
