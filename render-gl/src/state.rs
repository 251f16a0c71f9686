//! Redundant-state elimination.
//!
//! Replay routes frequently toggled backend state through this cache so a
//! pipeline switch that re-states the same values costs nothing. The cache
//! is invalidated at every submit boundary: resource teardown between
//! submissions can unbind objects behind its back.

use crate::api::{glenum as gl, GlContext};

trait CacheOptionExt<T: Eq> {
    fn update_cached<F: FnOnce()>(&mut self, new: T, f: F);
}

impl<T: Eq> CacheOptionExt<T> for Option<T> {
    fn update_cached<F: FnOnce()>(&mut self, new: T, f: F) {
        if self.as_ref().map_or(true, |v| *v != new) {
            self.replace(new);
            f();
        }
    }
}

#[derive(Default)]
pub(crate) struct StateCache {
    program: Option<u32>,
    vertex_array: Option<u32>,
    framebuffer: Option<u32>,
    depth_test: Option<bool>,
    depth_write: Option<bool>,
    depth_func: Option<u32>,
    stencil_test: Option<bool>,
    cull_enable: Option<bool>,
    cull_face: Option<u32>,
    front_face: Option<u32>,
    blend_enable: Option<bool>,
    blend_equation: Option<(u32, u32)>,
    blend_func: Option<[u32; 4]>,
    // f32 bit patterns, so the cache stays Eq
    blend_constant: Option<[u32; 4]>,
    color_mask: Option<[bool; 4]>,
    stencil_func: [Option<(u32, i32, u32)>; 2],
    stencil_ops: [Option<(u32, u32, u32)>; 2],
    stencil_write_mask: [Option<u32>; 2],
    line_width: Option<u32>,
    polygon_offset_values: Option<[u32; 2]>,
    scissor_test: Option<bool>,
    polygon_offset_fill: Option<bool>,
}

fn face_slot(face: u32) -> usize {
    if face == gl::FRONT {
        0
    } else {
        1
    }
}

impl StateCache {
    pub fn new() -> StateCache {
        StateCache::default()
    }

    pub fn invalidate(&mut self) {
        *self = StateCache::default();
    }

    pub fn set_program(&mut self, gl: &dyn GlContext, program: u32) {
        self.program.update_cached(program, || gl.use_program(program));
    }

    pub fn bind_vertex_array(&mut self, gl: &dyn GlContext, vao: u32) {
        self.vertex_array
            .update_cached(vao, || gl.bind_vertex_array(vao));
    }

    pub fn bind_framebuffer(&mut self, gl: &dyn GlContext, framebuffer: u32) {
        self.framebuffer
            .update_cached(framebuffer, || gl.bind_framebuffer(gl::FRAMEBUFFER, framebuffer));
    }

    pub fn set_depth_test(&mut self, gl: &dyn GlContext, enabled: bool) {
        self.depth_test.update_cached(enabled, || {
            if enabled {
                gl.enable(gl::DEPTH_TEST);
            } else {
                gl.disable(gl::DEPTH_TEST);
            }
        });
    }

    pub fn set_depth_write(&mut self, gl: &dyn GlContext, enabled: bool) {
        self.depth_write
            .update_cached(enabled, || gl.depth_mask(enabled));
    }

    pub fn set_depth_func(&mut self, gl: &dyn GlContext, func: u32) {
        self.depth_func.update_cached(func, || gl.depth_func(func));
    }

    pub fn set_stencil_test(&mut self, gl: &dyn GlContext, enabled: bool) {
        self.stencil_test.update_cached(enabled, || {
            if enabled {
                gl.enable(gl::STENCIL_TEST);
            } else {
                gl.disable(gl::STENCIL_TEST);
            }
        });
    }

    /// `None` disables culling.
    pub fn set_cull(&mut self, gl: &dyn GlContext, face: Option<u32>) {
        match face {
            None => {
                self.cull_enable.update_cached(false, || gl.disable(gl::CULL_FACE));
            }
            Some(face) => {
                self.cull_enable.update_cached(true, || gl.enable(gl::CULL_FACE));
                self.cull_face.update_cached(face, || gl.cull_face(face));
            }
        }
    }

    pub fn set_front_face(&mut self, gl: &dyn GlContext, winding: u32) {
        self.front_face
            .update_cached(winding, || gl.front_face(winding));
    }

    pub fn set_blend_enable(&mut self, gl: &dyn GlContext, enabled: bool) {
        self.blend_enable.update_cached(enabled, || {
            if enabled {
                gl.enable(gl::BLEND);
            } else {
                gl.disable(gl::BLEND);
            }
        });
    }

    pub fn set_blend_equation(&mut self, gl: &dyn GlContext, color: u32, alpha: u32) {
        self.blend_equation.update_cached((color, alpha), || {
            gl.blend_equation_separate(color, alpha)
        });
    }

    pub fn set_blend_func(
        &mut self,
        gl: &dyn GlContext,
        src_color: u32,
        dst_color: u32,
        src_alpha: u32,
        dst_alpha: u32,
    ) {
        self.blend_func
            .update_cached([src_color, dst_color, src_alpha, dst_alpha], || {
                gl.blend_func_separate(src_color, dst_color, src_alpha, dst_alpha)
            });
    }

    pub fn set_color_mask(&mut self, gl: &dyn GlContext, mask: [bool; 4]) {
        self.color_mask
            .update_cached(mask, || gl.color_mask(mask[0], mask[1], mask[2], mask[3]));
    }

    /// `face` is `FRONT` or `BACK`.
    pub fn set_stencil_func(
        &mut self,
        gl: &dyn GlContext,
        face: u32,
        func: u32,
        reference: i32,
        read_mask: u32,
    ) {
        self.stencil_func[face_slot(face)].update_cached((func, reference, read_mask), || {
            gl.stencil_func_separate(face, func, reference, read_mask)
        });
    }

    pub fn set_stencil_ops(
        &mut self,
        gl: &dyn GlContext,
        face: u32,
        fail: u32,
        depth_fail: u32,
        pass: u32,
    ) {
        self.stencil_ops[face_slot(face)].update_cached((fail, depth_fail, pass), || {
            gl.stencil_op_separate(face, fail, depth_fail, pass)
        });
    }

    pub fn set_stencil_write_mask(&mut self, gl: &dyn GlContext, face: u32, mask: u32) {
        self.stencil_write_mask[face_slot(face)]
            .update_cached(mask, || gl.stencil_mask_separate(face, mask));
    }

    pub fn set_line_width(&mut self, gl: &dyn GlContext, width: f32) {
        self.line_width
            .update_cached(width.to_bits(), || gl.line_width(width));
    }

    pub fn set_polygon_offset(&mut self, gl: &dyn GlContext, factor: f32, units: f32) {
        self.polygon_offset_values
            .update_cached([factor.to_bits(), units.to_bits()], || {
                gl.polygon_offset(factor, units)
            });
    }

    pub fn set_blend_constant(&mut self, gl: &dyn GlContext, color: [f32; 4]) {
        let bits = [
            color[0].to_bits(),
            color[1].to_bits(),
            color[2].to_bits(),
            color[3].to_bits(),
        ];
        self.blend_constant.update_cached(bits, || {
            gl.blend_color(color[0], color[1], color[2], color[3])
        });
    }

    pub fn set_scissor_test(&mut self, gl: &dyn GlContext, enabled: bool) {
        self.scissor_test.update_cached(enabled, || {
            if enabled {
                gl.enable(gl::SCISSOR_TEST);
            } else {
                gl.disable(gl::SCISSOR_TEST);
            }
        });
    }

    pub fn set_polygon_offset_enable(&mut self, gl: &dyn GlContext, enabled: bool) {
        self.polygon_offset_fill.update_cached(enabled, || {
            if enabled {
                gl.enable(gl::POLYGON_OFFSET_FILL);
            } else {
                gl.disable(gl::POLYGON_OFFSET_FILL);
            }
        });
    }
}
