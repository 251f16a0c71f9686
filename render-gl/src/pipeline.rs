//! Render pipeline.
//!
//! Links the two shader stages, reflects attribute locations, pre-processes
//! the vertex layout per buffer slot, owns the vertex array object, and
//! applies the fixed-function state blocks on `apply()`. A uniform block
//! named `_PushConstants` in the linked program is backed by a hidden buffer
//! at a reserved binding point.

use crate::api::{glenum as gl, GlContext};
use crate::buffer::Buffer;
use crate::descriptor::PipelineLayout;
use crate::device::DeviceShared;
use crate::shader::ShaderModule;
use crate::state::StateCache;
use crate::tracker::{ResourceCategory, ResourceKey, Tracked};
use crate::translate::{self, VertexFormatInfo};
use fxhash::FxHashMap;
use log::warn;
use prism_render::{
    BackendGeneration, ColorTargetState, DepthStencilState, Error, Features, PrimitiveTopology,
    RasterizationState, Result, VertexBufferLayout, VertexStepMode,
};
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Binding point reserved for the push-constants buffer. Application bind
/// groups on the same pipeline must stay below it.
pub const PUSH_CONSTANT_BINDING: u32 = 15;

/// Uniform block name that opts a program into push constants.
pub const PUSH_CONSTANT_BLOCK: &str = "_PushConstants";

#[derive(Clone, Debug)]
pub struct RenderPipelineDescriptor {
    pub label: Option<String>,
    pub vertex: Rc<ShaderModule>,
    pub fragment: Rc<ShaderModule>,
    pub vertex_buffers: Vec<VertexBufferLayout>,
    pub topology: PrimitiveTopology,
    pub rasterization: RasterizationState,
    pub depth_stencil: Option<DepthStencilState>,
    pub color_targets: Vec<ColorTargetState>,
    pub layout: Option<Rc<PipelineLayout>>,
}

struct PreparedAttribute {
    name: String,
    /// Resolved location; `None` when neither reflection nor the declared
    /// shader location produced a usable slot.
    location: Option<u32>,
    format: VertexFormatInfo,
    offset: u32,
}

struct PreparedSlot {
    stride: u32,
    step_mode: VertexStepMode,
    attributes: SmallVec<[PreparedAttribute; 8]>,
}

struct PushConstants {
    ubo: Cell<u32>,
    size: usize,
    shadow: RefCell<Vec<u8>>,
}

pub struct RenderPipeline {
    device: Rc<DeviceShared>,
    label: String,
    program: Cell<u32>,
    vao: Cell<u32>,
    topology: PrimitiveTopology,
    rasterization: RasterizationState,
    depth_stencil: Option<DepthStencilState>,
    color_targets: Vec<ColorTargetState>,
    layout: Option<Rc<PipelineLayout>>,
    slots: Vec<PreparedSlot>,
    push_constants: Option<PushConstants>,
    instancing_warned: Cell<bool>,
    key: Cell<Option<ResourceKey>>,
}

impl RenderPipeline {
    pub(crate) fn new(
        device: Rc<DeviceShared>,
        desc: &RenderPipelineDescriptor,
    ) -> Result<Rc<RenderPipeline>> {
        let label = desc
            .label
            .as_deref()
            .unwrap_or("<unnamed render pipeline>")
            .to_owned();
        let gl_ctx = device.gl();

        // 1. program link
        let program = gl_ctx.create_program();
        if program == 0 {
            return Err(Error::ContextLost);
        }
        gl_ctx.attach_shader(program, desc.vertex.raw());
        gl_ctx.attach_shader(program, desc.fragment.raw());
        gl_ctx.link_program(program);
        if !gl_ctx.program_link_status(program) {
            let log = gl_ctx.program_info_log(program);
            gl_ctx.delete_program(program);
            return Err(Error::Link { log });
        }

        // 2. attribute reflection
        let mut reflected: FxHashMap<String, u32> = FxHashMap::default();
        let count = gl_ctx.active_attribute_count(program);
        for index in 0..count {
            if let Some(info) = gl_ctx.active_attribute(program, index) {
                let location = gl_ctx.attrib_location(program, &info.name);
                if location >= 0 {
                    reflected.insert(info.name, location as u32);
                }
            }
        }

        // 3. push-constants probe
        let push_constants = if device.generation() == BackendGeneration::Gl2 {
            let block_index = gl_ctx.uniform_block_index(program, PUSH_CONSTANT_BLOCK);
            if block_index != gl::INVALID_INDEX {
                let size = gl_ctx.uniform_block_data_size(program, block_index);
                let ubo = gl_ctx.create_buffer();
                gl_ctx.bind_buffer(gl::UNIFORM_BUFFER, ubo);
                gl_ctx.buffer_data_size(gl::UNIFORM_BUFFER, size, gl::DYNAMIC_DRAW);
                gl_ctx.uniform_block_binding(program, block_index, PUSH_CONSTANT_BINDING);
                Some(PushConstants {
                    ubo: Cell::new(ubo),
                    size,
                    shadow: RefCell::new(vec![0; size]),
                })
            } else {
                None
            }
        } else {
            None
        };

        // 4. vertex layout preparation
        let max_attribs = device.max_vertex_attribs();
        let mut slots = Vec::with_capacity(desc.vertex_buffers.len());
        for layout in &desc.vertex_buffers {
            let mut attributes = SmallVec::new();
            for attr in &layout.attributes {
                let location = match reflected.get(&attr.name) {
                    Some(&loc) => Some(loc),
                    None if attr.shader_location < max_attribs => {
                        desc.vertex.note_reflection_miss(&attr.name);
                        Some(attr.shader_location)
                    }
                    None => {
                        warn!(
                            "{label}: attribute \"{}\" is unresolvable (no reflection, \
                             declared location {} out of range); skipped",
                            attr.name, attr.shader_location
                        );
                        None
                    }
                };
                attributes.push(PreparedAttribute {
                    name: attr.name.clone(),
                    location,
                    format: translate::vertex_format_info(attr.format),
                    offset: attr.offset,
                });
            }
            slots.push(PreparedSlot {
                stride: layout.stride,
                step_mode: layout.step_mode,
                attributes,
            });
        }

        // 5. vertex array object; stays unbound until a layout is applied
        let vao = if device.features().contains(Features::VERTEX_ARRAY_OBJECT) {
            gl_ctx.create_vertex_array()
        } else {
            0
        };

        let pipeline = Rc::new(RenderPipeline {
            device: device.clone(),
            label: label.clone(),
            program: Cell::new(program),
            vao: Cell::new(vao),
            topology: desc.topology,
            rasterization: desc.rasterization.clone(),
            depth_stencil: desc.depth_stencil.clone(),
            color_targets: desc.color_targets.clone(),
            layout: desc.layout.clone(),
            slots,
            push_constants,
            instancing_warned: Cell::new(false),
            key: Cell::new(None),
        });
        let key = device.register(
            ResourceCategory::RenderPipeline,
            label,
            Rc::downgrade(&pipeline) as _,
        );
        pipeline.key.set(Some(key));
        Ok(pipeline)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    pub fn layout(&self) -> Option<&Rc<PipelineLayout>> {
        self.layout.as_ref()
    }

    pub(crate) fn program(&self) -> u32 {
        self.program.get()
    }

    pub fn has_push_constants(&self) -> bool {
        self.push_constants.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.program.get() == 0
    }

    /// Number of vertex buffer slots the pipeline was built with.
    pub fn vertex_slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Apply program, rasterization, depth/stencil and blend state.
    pub(crate) fn apply(&self, state: &mut StateCache, stencil_reference: i32) {
        if self.is_destroyed() {
            warn!("apply of destroyed pipeline \"{}\" ignored", self.label);
            return;
        }
        let gl_ctx = self.device.gl();
        let features = self.device.features();

        state.set_program(gl_ctx, self.program.get());
        if self.vao.get() != 0 {
            state.bind_vertex_array(gl_ctx, self.vao.get());
        }

        // rasterization
        state.set_cull(gl_ctx, translate::cull_mode_to_gl(self.rasterization.cull_mode));
        state.set_front_face(
            gl_ctx,
            translate::front_face_to_gl(self.rasterization.front_face),
        );
        state.set_line_width(gl_ctx, self.rasterization.line_width.into_inner());

        // depth / stencil
        match &self.depth_stencil {
            Some(ds) => {
                state.set_depth_test(gl_ctx, true);
                state.set_depth_write(gl_ctx, ds.depth_write_enabled);
                state.set_depth_func(gl_ctx, translate::compare_func_to_gl(ds.depth_compare));

                if ds.bias.is_enabled() {
                    state.set_polygon_offset_enable(gl_ctx, true);
                    state.set_polygon_offset(
                        gl_ctx,
                        ds.bias.slope_scale.into_inner(),
                        ds.bias.constant as f32,
                    );
                } else {
                    state.set_polygon_offset_enable(gl_ctx, false);
                }

                let default_face = prism_render::StencilFaceState::default();
                let stencil_used = ds.stencil_front != default_face
                    || ds.stencil_back != default_face
                    || ds.stencil_read_mask != !0
                    || ds.stencil_write_mask != !0;
                state.set_stencil_test(gl_ctx, stencil_used);
                if stencil_used {
                    for (face, face_state) in [
                        (gl::FRONT, &ds.stencil_front),
                        (gl::BACK, &ds.stencil_back),
                    ] {
                        state.set_stencil_func(
                            gl_ctx,
                            face,
                            translate::compare_func_to_gl(face_state.compare),
                            stencil_reference,
                            ds.stencil_read_mask,
                        );
                        state.set_stencil_ops(
                            gl_ctx,
                            face,
                            translate::stencil_op_to_gl(face_state.fail_op),
                            translate::stencil_op_to_gl(face_state.depth_fail_op),
                            translate::stencil_op_to_gl(face_state.pass_op),
                        );
                        state.set_stencil_write_mask(gl_ctx, face, ds.stencil_write_mask);
                    }
                }
            }
            None => {
                state.set_depth_test(gl_ctx, false);
                state.set_depth_write(gl_ctx, true);
                state.set_stencil_test(gl_ctx, false);
                state.set_polygon_offset_enable(gl_ctx, false);
            }
        }

        // color / blend; the backend blends all targets uniformly
        match self.color_targets.first() {
            Some(target) => {
                match &target.blend {
                    Some(blend) => {
                        state.set_blend_enable(gl_ctx, true);
                        state.set_blend_equation(
                            gl_ctx,
                            translate::blend_op_to_gl(blend.color.operation, features),
                            translate::blend_op_to_gl(blend.alpha.operation, features),
                        );
                        state.set_blend_func(
                            gl_ctx,
                            translate::blend_factor_to_gl(blend.color.src_factor),
                            translate::blend_factor_to_gl(blend.color.dst_factor),
                            translate::blend_factor_to_gl(blend.alpha.src_factor),
                            translate::blend_factor_to_gl(blend.alpha.dst_factor),
                        );
                    }
                    None => state.set_blend_enable(gl_ctx, false),
                }
                let mask = target.write_mask;
                state.set_color_mask(
                    gl_ctx,
                    [
                        mask.contains(prism_render::ColorWriteMask::RED),
                        mask.contains(prism_render::ColorWriteMask::GREEN),
                        mask.contains(prism_render::ColorWriteMask::BLUE),
                        mask.contains(prism_render::ColorWriteMask::ALPHA),
                    ],
                );
            }
            None => {
                state.set_blend_enable(gl_ctx, false);
                state.set_color_mask(gl_ctx, [true, true, true, true]);
            }
        }

        self.rebind_push_constants();
    }

    /// Bind `buffer` to a vertex slot and point its attributes at the data.
    ///
    /// Additive: attributes enabled by other slots stay enabled, so binding
    /// several buffers across successive calls composes.
    pub(crate) fn apply_vertex_buffer_layout(&self, slot: usize, buffer: &Buffer, offset: usize) {
        let Some(prepared) = self.slots.get(slot) else {
            warn!(
                "{}: vertex buffer slot {slot} was not declared at pipeline creation",
                self.label
            );
            return;
        };
        let gl_ctx = self.device.gl();
        gl_ctx.bind_buffer(gl::ARRAY_BUFFER, buffer.raw());

        let instancing = self.device.features().contains(Features::INSTANCING);
        for attr in &prepared.attributes {
            let Some(location) = attr.location else {
                continue;
            };
            gl_ctx.enable_vertex_attrib_array(location);
            gl_ctx.vertex_attrib_pointer(
                location,
                attr.format.components,
                attr.format.ty,
                attr.format.normalized,
                prepared.stride,
                attr.offset as usize + offset,
            );
            match prepared.step_mode {
                VertexStepMode::Instance => {
                    if instancing {
                        gl_ctx.vertex_attrib_divisor(location, 1);
                    } else if !self.instancing_warned.replace(true) {
                        warn!(
                            "{}: attribute \"{}\" steps per instance but the backend has \
                             no instancing support",
                            self.label, attr.name
                        );
                    }
                }
                VertexStepMode::Vertex => {
                    if instancing {
                        gl_ctx.vertex_attrib_divisor(location, 0);
                    }
                }
            }
        }
    }

    /// Write into the push-constants buffer. No-op (with a warning) when
    /// the program has no `_PushConstants` block or the backend cannot
    /// express one.
    pub fn update_push_constants(&self, offset: usize, data: &[u8]) {
        let Some(push) = &self.push_constants else {
            if self.device.generation() == BackendGeneration::Gl1 {
                warn!(
                    "{}: push constants are unavailable on the 1.x backend",
                    self.label
                );
            } else {
                warn!(
                    "{}: program declares no {} block",
                    self.label, PUSH_CONSTANT_BLOCK
                );
            }
            return;
        };
        if offset + data.len() > push.size {
            warn!(
                "{}: push constant write of {} bytes at {} exceeds block size {}",
                self.label,
                data.len(),
                offset,
                push.size
            );
            return;
        }
        push.shadow.borrow_mut()[offset..offset + data.len()].copy_from_slice(data);
        let gl_ctx = self.device.gl();
        gl_ctx.bind_buffer(gl::UNIFORM_BUFFER, push.ubo.get());
        gl_ctx.buffer_sub_data(gl::UNIFORM_BUFFER, offset, data);
    }

    /// The push-constants buffer must be on its reserved binding point
    /// before every draw while this pipeline is active.
    pub(crate) fn rebind_push_constants(&self) {
        if let Some(push) = &self.push_constants {
            self.device.gl().bind_buffer_base(
                gl::UNIFORM_BUFFER,
                PUSH_CONSTANT_BINDING,
                push.ubo.get(),
            );
        }
    }

    pub fn destroy(&self) {
        if let Some(key) = self.key.take() {
            self.device.unregister(key);
        }
        let program = self.program.replace(0);
        if program != 0 {
            let gl_ctx = self.device.gl();
            gl_ctx.delete_program(program);
            let vao = self.vao.replace(0);
            if vao != 0 {
                gl_ctx.delete_vertex_array(vao);
            }
            if let Some(push) = &self.push_constants {
                let ubo = push.ubo.replace(0);
                if ubo != 0 {
                    gl_ctx.delete_buffer(ubo);
                }
            }
        }
    }
}

impl Tracked for RenderPipeline {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn destroy_now(&self) {
        self.destroy();
    }

    fn invalidate(&self) {
        self.key.take();
        self.program.set(0);
        self.vao.set(0);
        if let Some(push) = &self.push_constants {
            push.ubo.set(0);
        }
    }
}

impl Drop for RenderPipeline {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("label", &self.label)
            .field("topology", &self.topology)
            .field("push_constants", &self.has_push_constants())
            .finish()
    }
}
