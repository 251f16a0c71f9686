//! The backend seam.
//!
//! `GlContext` mirrors the call surface of the two legacy browser graphics
//! backend generations (1.x and 2.x). The host supplies an implementation
//! wrapping its real context; [`HeadlessContext`] is a recording
//! implementation for hosts without a surface and for the test suite.
//!
//! Object names are plain `u32` (0 is the null object, as in the backend
//! itself) and uniform locations are `i32` (-1 when absent). Calls that only
//! exist on one generation are documented as such; implementations for the
//! other generation must treat them as no-ops.

pub mod glenum;
mod headless;

pub use self::headless::{HeadlessConfig, HeadlessContext};

use prism_render::BackendGeneration;

/// Reflection record for one active attribute or uniform.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActiveInfo {
    pub name: String,
    /// Array size; 1 for non-arrays.
    pub size: u32,
    /// GL type constant, e.g. `glenum::FLOAT_VEC3`.
    pub ty: u32,
}

/// The WebGL-family context surface consumed by the translation layer.
///
/// All calls take `&self`: the backing context is a single-threaded foreign
/// object with its own interior state.
pub trait GlContext {
    fn generation(&self) -> BackendGeneration;
    fn is_context_lost(&self) -> bool;
    /// Size of the default drawing buffer (the canvas).
    fn drawing_buffer_size(&self) -> (u32, u32);
    fn supports_extension(&self, name: &str) -> bool;
    fn get_string(&self, pname: u32) -> String;
    fn get_integer(&self, pname: u32) -> i32;
    fn get_float(&self, pname: u32) -> f32;
    fn get_error(&self) -> u32;
    fn is_enabled(&self, cap: u32) -> bool;
    /// Current viewport rectangle (x, y, width, height).
    fn get_viewport(&self) -> [i32; 4];
    /// The lose-context extension: drop the underlying context.
    fn lose_context(&self);
    /// The lose-context extension: restore a previously lost context.
    fn restore_context(&self);

    // buffers -------------------------------------------------------------
    fn create_buffer(&self) -> u32;
    fn delete_buffer(&self, buffer: u32);
    fn bind_buffer(&self, target: u32, buffer: u32);
    fn buffer_data_size(&self, target: u32, size: usize, usage: u32);
    fn buffer_data(&self, target: u32, data: &[u8], usage: u32);
    fn buffer_sub_data(&self, target: u32, offset: usize, data: &[u8]);
    /// 2.x only. Synchronous read-back of the bound buffer.
    fn get_buffer_sub_data(&self, target: u32, offset: usize, out: &mut [u8]);
    /// 2.x only.
    fn bind_buffer_base(&self, target: u32, index: u32, buffer: u32);
    /// 2.x only.
    fn bind_buffer_range(&self, target: u32, index: u32, buffer: u32, offset: usize, size: usize);
    /// 2.x only.
    fn copy_buffer_sub_data(
        &self,
        read_target: u32,
        write_target: u32,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    );

    // textures ------------------------------------------------------------
    fn create_texture(&self) -> u32;
    fn delete_texture(&self, texture: u32);
    /// `unit` is an index, not `TEXTURE0 + index`.
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, target: u32, texture: u32);
    fn tex_parameter_i(&self, target: u32, pname: u32, value: i32);
    fn tex_parameter_f(&self, target: u32, pname: u32, value: f32);
    fn pixel_store_i(&self, pname: u32, value: i32);
    #[allow(clippy::too_many_arguments)]
    fn tex_image_2d(
        &self,
        target: u32,
        level: u32,
        internal_format: u32,
        width: u32,
        height: u32,
        format: u32,
        ty: u32,
        data: Option<&[u8]>,
    );
    #[allow(clippy::too_many_arguments)]
    fn tex_sub_image_2d(
        &self,
        target: u32,
        level: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: u32,
        ty: u32,
        data: &[u8],
    );
    /// 2.x only.
    #[allow(clippy::too_many_arguments)]
    fn tex_image_3d(
        &self,
        target: u32,
        level: u32,
        internal_format: u32,
        width: u32,
        height: u32,
        depth: u32,
        format: u32,
        ty: u32,
        data: Option<&[u8]>,
    );
    /// 2.x only.
    #[allow(clippy::too_many_arguments)]
    fn tex_sub_image_3d(
        &self,
        target: u32,
        level: u32,
        x: u32,
        y: u32,
        z: u32,
        width: u32,
        height: u32,
        depth: u32,
        format: u32,
        ty: u32,
        data: &[u8],
    );
    fn compressed_tex_image_2d(
        &self,
        target: u32,
        level: u32,
        internal_format: u32,
        width: u32,
        height: u32,
        data: &[u8],
    );
    fn generate_mipmap(&self, target: u32);
    #[allow(clippy::too_many_arguments)]
    fn read_pixels(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: u32,
        ty: u32,
        out: &mut [u8],
    );

    // samplers (2.x) ------------------------------------------------------
    fn create_sampler(&self) -> u32;
    fn delete_sampler(&self, sampler: u32);
    fn bind_sampler(&self, unit: u32, sampler: u32);
    fn sampler_parameter_i(&self, sampler: u32, pname: u32, value: i32);
    fn sampler_parameter_f(&self, sampler: u32, pname: u32, value: f32);

    // shaders / programs --------------------------------------------------
    fn create_shader(&self, ty: u32) -> u32;
    fn delete_shader(&self, shader: u32);
    fn shader_source(&self, shader: u32, source: &str);
    fn compile_shader(&self, shader: u32);
    fn shader_compile_status(&self, shader: u32) -> bool;
    fn shader_info_log(&self, shader: u32) -> String;
    fn create_program(&self) -> u32;
    fn delete_program(&self, program: u32);
    fn attach_shader(&self, program: u32, shader: u32);
    fn link_program(&self, program: u32);
    fn program_link_status(&self, program: u32) -> bool;
    fn program_info_log(&self, program: u32) -> String;
    fn use_program(&self, program: u32);
    fn active_attribute_count(&self, program: u32) -> u32;
    fn active_attribute(&self, program: u32, index: u32) -> Option<ActiveInfo>;
    fn active_uniform_count(&self, program: u32) -> u32;
    fn active_uniform(&self, program: u32, index: u32) -> Option<ActiveInfo>;
    fn attrib_location(&self, program: u32, name: &str) -> i32;
    fn uniform_location(&self, program: u32, name: &str) -> i32;
    fn uniform_1i(&self, location: i32, v: i32);
    fn uniform_1f(&self, location: i32, v: f32);
    fn uniform_2f(&self, location: i32, v: [f32; 2]);
    fn uniform_3f(&self, location: i32, v: [f32; 3]);
    fn uniform_4f(&self, location: i32, v: [f32; 4]);
    fn uniform_2i(&self, location: i32, v: [i32; 2]);
    fn uniform_3i(&self, location: i32, v: [i32; 3]);
    fn uniform_4i(&self, location: i32, v: [i32; 4]);
    fn uniform_matrix_2fv(&self, location: i32, v: &[f32]);
    fn uniform_matrix_3fv(&self, location: i32, v: &[f32]);
    fn uniform_matrix_4fv(&self, location: i32, v: &[f32]);
    /// 2.x only. Returns `glenum::INVALID_INDEX` when the block is absent.
    fn uniform_block_index(&self, program: u32, name: &str) -> u32;
    /// 2.x only.
    fn uniform_block_binding(&self, program: u32, block_index: u32, binding: u32);
    /// 2.x only. `UNIFORM_BLOCK_DATA_SIZE` of the block.
    fn uniform_block_data_size(&self, program: u32, block_index: u32) -> usize;

    // vertex state --------------------------------------------------------
    /// Native on 2.x, via the vertex-array-object extension on 1.x. Returns
    /// 0 when neither is available.
    fn create_vertex_array(&self) -> u32;
    fn delete_vertex_array(&self, vao: u32);
    fn bind_vertex_array(&self, vao: u32);
    fn enable_vertex_attrib_array(&self, location: u32);
    fn disable_vertex_attrib_array(&self, location: u32);
    fn vertex_attrib_pointer(
        &self,
        location: u32,
        size: u32,
        ty: u32,
        normalized: bool,
        stride: u32,
        offset: usize,
    );
    /// Native on 2.x, via the instancing extension on 1.x.
    fn vertex_attrib_divisor(&self, location: u32, divisor: u32);

    // draws ---------------------------------------------------------------
    fn draw_arrays(&self, mode: u32, first: u32, count: u32);
    fn draw_elements(&self, mode: u32, count: u32, ty: u32, offset: usize);
    fn draw_arrays_instanced(&self, mode: u32, first: u32, count: u32, instances: u32);
    fn draw_elements_instanced(&self, mode: u32, count: u32, ty: u32, offset: usize, instances: u32);

    // framebuffers / renderbuffers ----------------------------------------
    fn create_framebuffer(&self) -> u32;
    fn delete_framebuffer(&self, framebuffer: u32);
    fn bind_framebuffer(&self, target: u32, framebuffer: u32);
    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        tex_target: u32,
        texture: u32,
        level: u32,
    );
    /// 2.x only.
    fn framebuffer_texture_layer(
        &self,
        target: u32,
        attachment: u32,
        texture: u32,
        level: u32,
        layer: u32,
    );
    fn framebuffer_renderbuffer(&self, target: u32, attachment: u32, renderbuffer: u32);
    fn check_framebuffer_status(&self, target: u32) -> u32;
    /// 2.x only. Marks attachment contents as undefined so the driver can
    /// skip the store.
    fn invalidate_framebuffer(&self, target: u32, attachments: &[u32]);
    /// 2.x or the draw-buffers extension.
    fn draw_buffers(&self, buffers: &[u32]);
    /// 2.x only. `src`/`dst` are (x0, y0, x1, y1).
    fn blit_framebuffer(&self, src: [i32; 4], dst: [i32; 4], mask: u32, filter: u32);
    fn create_renderbuffer(&self) -> u32;
    fn delete_renderbuffer(&self, renderbuffer: u32);
    fn bind_renderbuffer(&self, renderbuffer: u32);
    fn renderbuffer_storage(&self, internal_format: u32, width: u32, height: u32);

    // queries (2.x) -------------------------------------------------------
    fn create_query(&self) -> u32;
    fn delete_query(&self, query: u32);
    fn begin_query(&self, target: u32, query: u32);
    fn end_query(&self, target: u32);
    fn query_result_available(&self, query: u32) -> bool;
    fn query_result(&self, query: u32) -> u64;

    // fixed-function state ------------------------------------------------
    fn enable(&self, cap: u32);
    fn disable(&self, cap: u32);
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn scissor(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn clear_depth(&self, depth: f32);
    fn clear_stencil(&self, stencil: i32);
    fn clear(&self, mask: u32);
    fn color_mask(&self, r: bool, g: bool, b: bool, a: bool);
    fn depth_mask(&self, enabled: bool);
    fn depth_func(&self, func: u32);
    fn stencil_func_separate(&self, face: u32, func: u32, reference: i32, mask: u32);
    fn stencil_op_separate(&self, face: u32, fail: u32, depth_fail: u32, pass: u32);
    fn stencil_mask_separate(&self, face: u32, mask: u32);
    fn blend_equation_separate(&self, color: u32, alpha: u32);
    fn blend_func_separate(&self, src_color: u32, dst_color: u32, src_alpha: u32, dst_alpha: u32);
    fn blend_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn cull_face(&self, mode: u32);
    fn front_face(&self, mode: u32);
    fn line_width(&self, width: f32);
    fn polygon_offset(&self, factor: f32, units: f32);
    fn flush(&self);
    fn finish(&self);
}
