//! A headless, recording implementation of [`GlContext`].
//!
//! Used by hosts that want the full device/resource/command machinery
//! without a real surface, and by the test suite. Object ids are allocated
//! from one counter, buffer contents are retained so synchronous read-back
//! round-trips, and every mutating call is recorded as a formatted line for
//! assertions. Shader "compilation" keeps the source and derives reflection
//! info from the declarations in it, so program reflection behaves like a
//! real driver for well-formed GLSL-ES.

use super::glenum as gl;
use super::{ActiveInfo, GlContext};
use fxhash::{FxHashMap, FxHashSet};
use prism_render::BackendGeneration;
use std::cell::{Cell, RefCell};

#[derive(Clone, Debug)]
pub struct HeadlessConfig {
    pub generation: BackendGeneration,
    pub extensions: Vec<String>,
    pub width: u32,
    pub height: u32,
    pub vendor: String,
    pub renderer: String,
}

impl HeadlessConfig {
    pub fn gl2() -> HeadlessConfig {
        HeadlessConfig {
            generation: BackendGeneration::Gl2,
            extensions: vec![
                "EXT_texture_filter_anisotropic".into(),
                "OES_texture_float_linear".into(),
                "WEBGL_lose_context".into(),
            ],
            width: 640,
            height: 480,
            vendor: "prism".into(),
            renderer: "prism headless".into(),
        }
    }

    pub fn gl1() -> HeadlessConfig {
        HeadlessConfig {
            generation: BackendGeneration::Gl1,
            extensions: vec![
                "OES_vertex_array_object".into(),
                "ANGLE_instanced_arrays".into(),
                "WEBGL_depth_texture".into(),
                "OES_texture_float".into(),
                "OES_texture_half_float".into(),
                "EXT_blend_minmax".into(),
                "EXT_texture_filter_anisotropic".into(),
                "WEBGL_lose_context".into(),
            ],
            width: 640,
            height: 480,
            vendor: "prism".into(),
            renderer: "prism headless (legacy)".into(),
        }
    }
}

#[derive(Clone, Debug)]
struct ShaderRec {
    ty: u32,
    source: String,
}

#[derive(Clone, Debug, Default)]
struct ProgramRec {
    shaders: Vec<u32>,
    linked: bool,
    attributes: Vec<ActiveInfo>,
    uniforms: Vec<ActiveInfo>,
    blocks: Vec<String>,
}

pub struct HeadlessContext {
    config: HeadlessConfig,
    lost: Cell<bool>,
    next_id: Cell<u32>,
    error: Cell<u32>,
    forced_framebuffer_status: Cell<Option<u32>>,
    calls: RefCell<Vec<String>>,

    buffers: RefCell<FxHashMap<u32, Vec<u8>>>,
    bound_buffers: RefCell<FxHashMap<u32, u32>>,
    textures: RefCell<FxHashSet<u32>>,
    active_unit: Cell<u32>,
    bound_textures: RefCell<FxHashMap<(u32, u32), u32>>,
    shaders: RefCell<FxHashMap<u32, ShaderRec>>,
    programs: RefCell<FxHashMap<u32, ProgramRec>>,
    current_program: Cell<u32>,
    bound_vao: Cell<u32>,
    bound_framebuffer: Cell<u32>,
    enabled_caps: RefCell<FxHashSet<u32>>,
    viewport: Cell<[i32; 4]>,
}

impl HeadlessContext {
    pub fn new(config: HeadlessConfig) -> HeadlessContext {
        let initial_viewport = [0, 0, config.width as i32, config.height as i32];
        HeadlessContext {
            config,
            lost: Cell::new(false),
            next_id: Cell::new(1),
            error: Cell::new(gl::NO_ERROR),
            forced_framebuffer_status: Cell::new(None),
            calls: RefCell::new(Vec::new()),
            buffers: RefCell::new(FxHashMap::default()),
            bound_buffers: RefCell::new(FxHashMap::default()),
            textures: RefCell::new(FxHashSet::default()),
            active_unit: Cell::new(0),
            bound_textures: RefCell::new(FxHashMap::default()),
            shaders: RefCell::new(FxHashMap::default()),
            programs: RefCell::new(FxHashMap::default()),
            current_program: Cell::new(0),
            bound_vao: Cell::new(0),
            bound_framebuffer: Cell::new(0),
            enabled_caps: RefCell::new(FxHashSet::default()),
            viewport: Cell::new(initial_viewport),
        }
    }

    pub fn gl2() -> HeadlessContext {
        HeadlessContext::new(HeadlessConfig::gl2())
    }

    pub fn gl1() -> HeadlessContext {
        HeadlessContext::new(HeadlessConfig::gl1())
    }

    // test hooks ----------------------------------------------------------

    /// Recorded mutating calls, in issue order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn has_call(&self, exact: &str) -> bool {
        self.calls.borrow().iter().any(|c| c == exact)
    }

    /// Force `check_framebuffer_status` to report `status` until cleared.
    pub fn force_framebuffer_status(&self, status: Option<u32>) {
        self.forced_framebuffer_status.set(status);
    }

    pub fn inject_error(&self, error: u32) {
        self.error.set(error);
    }

    /// Bytes currently stored for a buffer object, if it exists.
    pub fn buffer_contents(&self, buffer: u32) -> Option<Vec<u8>> {
        self.buffers.borrow().get(&buffer).cloned()
    }

    // internals -----------------------------------------------------------

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn alloc_id(&self) -> u32 {
        if self.lost.get() {
            return 0;
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn bound_buffer(&self, target: u32) -> u32 {
        self.bound_buffers.borrow().get(&target).copied().unwrap_or(0)
    }

    fn relink(&self, program: u32) {
        let mut programs = self.programs.borrow_mut();
        let Some(rec) = programs.get_mut(&program) else {
            return;
        };
        rec.attributes.clear();
        rec.uniforms.clear();
        rec.blocks.clear();
        let shaders = self.shaders.borrow();
        let attached: Vec<u32> = rec.shaders.clone();
        for shader in attached {
            let Some(sh) = shaders.get(&shader) else {
                continue;
            };
            scan_declarations(sh, rec);
        }
        rec.linked = true;
    }
}

/// One declaration scan pass over a shader's source. Good enough for the
/// well-formed GLSL-ES the headless context is fed.
fn scan_declarations(shader: &ShaderRec, rec: &mut ProgramRec) {
    for raw_line in shader.source.lines() {
        let line = raw_line.split("//").next().unwrap_or("").trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("layout") && !line.contains("uniform") {
            continue;
        }
        let line = line.strip_prefix("layout(std140)").unwrap_or(line).trim();

        if let Some(rest) = line.strip_prefix("uniform ") {
            if line.contains('{') || !line.contains(';') {
                // uniform block declaration
                if let Some(name) = rest.split_whitespace().next() {
                    let name = name.trim_end_matches('{').to_owned();
                    if !name.is_empty() && !rec.blocks.contains(&name) {
                        rec.blocks.push(name);
                    }
                }
                continue;
            }
            let mut tokens = rest.trim_end_matches(';').split_whitespace();
            let (Some(ty), Some(name)) = (tokens.next(), tokens.next()) else {
                continue;
            };
            let (name, size) = split_array_suffix(name);
            if rec.uniforms.iter().all(|u| u.name != name) {
                rec.uniforms.push(ActiveInfo {
                    name,
                    size,
                    ty: glsl_type_to_enum(ty),
                });
            }
            continue;
        }

        let attr_rest = if shader.ty == gl::VERTEX_SHADER {
            line.strip_prefix("attribute ")
                .or_else(|| line.strip_prefix("in "))
        } else {
            None
        };
        if let Some(rest) = attr_rest {
            let mut tokens = rest.trim_end_matches(';').split_whitespace();
            let (Some(ty), Some(name)) = (tokens.next(), tokens.next()) else {
                continue;
            };
            let (name, size) = split_array_suffix(name);
            if rec.attributes.iter().all(|a| a.name != name) {
                rec.attributes.push(ActiveInfo {
                    name,
                    size,
                    ty: glsl_type_to_enum(ty),
                });
            }
        }
    }
}

fn split_array_suffix(name: &str) -> (String, u32) {
    match name.find('[') {
        Some(idx) => {
            let size = name[idx + 1..]
                .trim_end_matches(']')
                .parse::<u32>()
                .unwrap_or(1);
            (name[..idx].to_owned(), size)
        }
        None => (name.to_owned(), 1),
    }
}

fn glsl_type_to_enum(ty: &str) -> u32 {
    match ty {
        "float" => gl::FLOAT,
        "vec2" => gl::FLOAT_VEC2,
        "vec3" => gl::FLOAT_VEC3,
        "vec4" => gl::FLOAT_VEC4,
        "int" | "bool" => gl::INT,
        "ivec2" => gl::INT_VEC2,
        "ivec3" => gl::INT_VEC3,
        "ivec4" => gl::INT_VEC4,
        "mat2" => gl::FLOAT_MAT2,
        "mat3" => gl::FLOAT_MAT3,
        "mat4" => gl::FLOAT_MAT4,
        "sampler2D" => gl::SAMPLER_2D,
        "sampler3D" => gl::SAMPLER_3D,
        "samplerCube" => gl::SAMPLER_CUBE,
        "sampler2DShadow" => gl::SAMPLER_2D_SHADOW,
        _ => gl::FLOAT,
    }
}

impl GlContext for HeadlessContext {
    fn generation(&self) -> BackendGeneration {
        self.config.generation
    }

    fn is_context_lost(&self) -> bool {
        self.lost.get()
    }

    fn drawing_buffer_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn supports_extension(&self, name: &str) -> bool {
        self.config.extensions.iter().any(|e| e == name)
    }

    fn get_string(&self, pname: u32) -> String {
        match pname {
            gl::VENDOR => self.config.vendor.clone(),
            gl::RENDERER => self.config.renderer.clone(),
            gl::VERSION => match self.config.generation {
                BackendGeneration::Gl2 => "WebGL 2.0 (prism headless)".into(),
                BackendGeneration::Gl1 => "WebGL 1.0 (prism headless)".into(),
            },
            gl::SHADING_LANGUAGE_VERSION => match self.config.generation {
                BackendGeneration::Gl2 => "WebGL GLSL ES 3.00".into(),
                BackendGeneration::Gl1 => "WebGL GLSL ES 1.0".into(),
            },
            _ => String::new(),
        }
    }

    fn get_integer(&self, pname: u32) -> i32 {
        let gl2 = self.config.generation == BackendGeneration::Gl2;
        match pname {
            gl::MAX_TEXTURE_SIZE | gl::MAX_CUBE_MAP_TEXTURE_SIZE => {
                if gl2 {
                    16384
                } else {
                    4096
                }
            }
            gl::MAX_3D_TEXTURE_SIZE => 2048,
            gl::MAX_ARRAY_TEXTURE_LAYERS => 256,
            gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS => if gl2 { 32 } else { 8 },
            gl::MAX_TEXTURE_IMAGE_UNITS => if gl2 { 16 } else { 8 },
            gl::MAX_VERTEX_ATTRIBS => 16,
            gl::MAX_COLOR_ATTACHMENTS | gl::MAX_DRAW_BUFFERS => {
                if gl2 {
                    8
                } else if self.supports_extension("WEBGL_draw_buffers") {
                    4
                } else {
                    1
                }
            }
            gl::MAX_SAMPLES => if gl2 { 4 } else { 0 },
            gl::MAX_UNIFORM_BUFFER_BINDINGS => if gl2 { 24 } else { 0 },
            gl::UNIFORM_BUFFER_OFFSET_ALIGNMENT => 256,
            gl::MAX_RENDERBUFFER_SIZE => 16384,
            gl::FRAMEBUFFER_BINDING => self.bound_framebuffer.get() as i32,
            gl::CURRENT_PROGRAM => self.current_program.get() as i32,
            gl::ARRAY_BUFFER_BINDING => self.bound_buffer(gl::ARRAY_BUFFER) as i32,
            gl::ELEMENT_ARRAY_BUFFER_BINDING => {
                self.bound_buffer(gl::ELEMENT_ARRAY_BUFFER) as i32
            }
            gl::VERTEX_ARRAY_BINDING => self.bound_vao.get() as i32,
            gl::ACTIVE_TEXTURE => (gl::TEXTURE0 + self.active_unit.get()) as i32,
            gl::TEXTURE_BINDING_2D => self
                .bound_textures
                .borrow()
                .get(&(self.active_unit.get(), gl::TEXTURE_2D))
                .copied()
                .unwrap_or(0) as i32,
            _ => 0,
        }
    }

    fn get_float(&self, pname: u32) -> f32 {
        match pname {
            gl::MAX_TEXTURE_MAX_ANISOTROPY => 16.0,
            _ => 0.0,
        }
    }

    fn get_error(&self) -> u32 {
        self.error.replace(gl::NO_ERROR)
    }

    fn is_enabled(&self, cap: u32) -> bool {
        self.enabled_caps.borrow().contains(&cap)
    }

    fn get_viewport(&self) -> [i32; 4] {
        self.viewport.get()
    }

    fn lose_context(&self) {
        self.lost.set(true);
        self.record("lose_context()".into());
    }

    fn restore_context(&self) {
        self.lost.set(false);
        self.record("restore_context()".into());
    }

    // buffers -------------------------------------------------------------

    fn create_buffer(&self) -> u32 {
        let id = self.alloc_id();
        if id != 0 {
            self.buffers.borrow_mut().insert(id, Vec::new());
        }
        id
    }

    fn delete_buffer(&self, buffer: u32) {
        self.buffers.borrow_mut().remove(&buffer);
        self.record(format!("delete_buffer({buffer})"));
    }

    fn bind_buffer(&self, target: u32, buffer: u32) {
        self.bound_buffers.borrow_mut().insert(target, buffer);
        self.record(format!("bind_buffer({target:#x}, {buffer})"));
    }

    fn buffer_data_size(&self, target: u32, size: usize, usage: u32) {
        let bound = self.bound_buffer(target);
        if let Some(store) = self.buffers.borrow_mut().get_mut(&bound) {
            *store = vec![0; size];
        }
        self.record(format!("buffer_data_size({target:#x}, {size}, {usage:#x})"));
    }

    fn buffer_data(&self, target: u32, data: &[u8], usage: u32) {
        let bound = self.bound_buffer(target);
        if let Some(store) = self.buffers.borrow_mut().get_mut(&bound) {
            *store = data.to_vec();
        }
        self.record(format!(
            "buffer_data({target:#x}, {len}, {usage:#x})",
            len = data.len()
        ));
    }

    fn buffer_sub_data(&self, target: u32, offset: usize, data: &[u8]) {
        let bound = self.bound_buffer(target);
        if let Some(store) = self.buffers.borrow_mut().get_mut(&bound) {
            if offset + data.len() <= store.len() {
                store[offset..offset + data.len()].copy_from_slice(data);
            }
        }
        self.record(format!(
            "buffer_sub_data({target:#x}, {offset}, {len})",
            len = data.len()
        ));
    }

    fn get_buffer_sub_data(&self, target: u32, offset: usize, out: &mut [u8]) {
        let bound = self.bound_buffer(target);
        if let Some(store) = self.buffers.borrow().get(&bound) {
            let end = (offset + out.len()).min(store.len());
            if end > offset {
                out[..end - offset].copy_from_slice(&store[offset..end]);
            }
        }
    }

    fn bind_buffer_base(&self, target: u32, index: u32, buffer: u32) {
        self.record(format!("bind_buffer_base({target:#x}, {index}, {buffer})"));
    }

    fn bind_buffer_range(&self, target: u32, index: u32, buffer: u32, offset: usize, size: usize) {
        self.record(format!(
            "bind_buffer_range({target:#x}, {index}, {buffer}, {offset}, {size})"
        ));
    }

    fn copy_buffer_sub_data(
        &self,
        read_target: u32,
        write_target: u32,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    ) {
        let src = self.bound_buffer(read_target);
        let dst = self.bound_buffer(write_target);
        let data = self.buffers.borrow().get(&src).map(|s| {
            let end = (read_offset + size).min(s.len());
            s[read_offset.min(end)..end].to_vec()
        });
        if let Some(data) = data {
            if let Some(store) = self.buffers.borrow_mut().get_mut(&dst) {
                let end = (write_offset + data.len()).min(store.len());
                if end > write_offset {
                    store[write_offset..end].copy_from_slice(&data[..end - write_offset]);
                }
            }
        }
        self.record(format!(
            "copy_buffer_sub_data({read_target:#x}, {write_target:#x}, {read_offset}, {write_offset}, {size})"
        ));
    }

    // textures ------------------------------------------------------------

    fn create_texture(&self) -> u32 {
        let id = self.alloc_id();
        if id != 0 {
            self.textures.borrow_mut().insert(id);
        }
        id
    }

    fn delete_texture(&self, texture: u32) {
        self.textures.borrow_mut().remove(&texture);
        self.record(format!("delete_texture({texture})"));
    }

    fn active_texture(&self, unit: u32) {
        self.active_unit.set(unit);
        self.record(format!("active_texture({unit})"));
    }

    fn bind_texture(&self, target: u32, texture: u32) {
        self.bound_textures
            .borrow_mut()
            .insert((self.active_unit.get(), target), texture);
        self.record(format!("bind_texture({target:#x}, {texture})"));
    }

    fn tex_parameter_i(&self, target: u32, pname: u32, value: i32) {
        self.record(format!("tex_parameter_i({target:#x}, {pname:#x}, {value})"));
    }

    fn tex_parameter_f(&self, target: u32, pname: u32, value: f32) {
        self.record(format!("tex_parameter_f({target:#x}, {pname:#x}, {value})"));
    }

    fn pixel_store_i(&self, pname: u32, value: i32) {
        self.record(format!("pixel_store_i({pname:#x}, {value})"));
    }

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
    ) {
        self.record(format!(
            "tex_image_2d({target:#x}, {level}, {internal_format:#x}, {width}, {height}, {format:#x}, {ty:#x}, {data})",
            data = data.map(|d| d.len()).unwrap_or(0)
        ));
    }

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
    ) {
        self.record(format!(
            "tex_sub_image_2d({target:#x}, {level}, {x}, {y}, {width}, {height}, {format:#x}, {ty:#x}, {len})",
            len = data.len()
        ));
    }

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
    ) {
        self.record(format!(
            "tex_image_3d({target:#x}, {level}, {internal_format:#x}, {width}, {height}, {depth}, {format:#x}, {ty:#x}, {data})",
            data = data.map(|d| d.len()).unwrap_or(0)
        ));
    }

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
    ) {
        self.record(format!(
            "tex_sub_image_3d({target:#x}, {level}, {x}, {y}, {z}, {width}, {height}, {depth}, {format:#x}, {ty:#x}, {len})",
            len = data.len()
        ));
    }

    fn compressed_tex_image_2d(
        &self,
        target: u32,
        level: u32,
        internal_format: u32,
        width: u32,
        height: u32,
        data: &[u8],
    ) {
        self.record(format!(
            "compressed_tex_image_2d({target:#x}, {level}, {internal_format:#x}, {width}, {height}, {len})",
            len = data.len()
        ));
    }

    fn generate_mipmap(&self, target: u32) {
        self.record(format!("generate_mipmap({target:#x})"));
    }

    fn read_pixels(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: u32,
        ty: u32,
        out: &mut [u8],
    ) {
        out.fill(0);
        self.record(format!(
            "read_pixels({x}, {y}, {width}, {height}, {format:#x}, {ty:#x})"
        ));
    }

    // samplers ------------------------------------------------------------

    fn create_sampler(&self) -> u32 {
        self.alloc_id()
    }

    fn delete_sampler(&self, sampler: u32) {
        self.record(format!("delete_sampler({sampler})"));
    }

    fn bind_sampler(&self, unit: u32, sampler: u32) {
        self.record(format!("bind_sampler({unit}, {sampler})"));
    }

    fn sampler_parameter_i(&self, sampler: u32, pname: u32, value: i32) {
        self.record(format!("sampler_parameter_i({sampler}, {pname:#x}, {value})"));
    }

    fn sampler_parameter_f(&self, sampler: u32, pname: u32, value: f32) {
        self.record(format!("sampler_parameter_f({sampler}, {pname:#x}, {value})"));
    }

    // shaders / programs --------------------------------------------------

    fn create_shader(&self, ty: u32) -> u32 {
        let id = self.alloc_id();
        if id != 0 {
            self.shaders.borrow_mut().insert(
                id,
                ShaderRec {
                    ty,
                    source: String::new(),
                },
            );
        }
        id
    }

    fn delete_shader(&self, shader: u32) {
        self.shaders.borrow_mut().remove(&shader);
        self.record(format!("delete_shader({shader})"));
    }

    fn shader_source(&self, shader: u32, source: &str) {
        if let Some(rec) = self.shaders.borrow_mut().get_mut(&shader) {
            rec.source = source.to_owned();
        }
    }

    fn compile_shader(&self, shader: u32) {
        self.record(format!("compile_shader({shader})"));
    }

    fn shader_compile_status(&self, shader: u32) -> bool {
        self.shaders
            .borrow()
            .get(&shader)
            .map(|rec| !rec.source.trim().is_empty() && !rec.source.contains("#error"))
            .unwrap_or(false)
    }

    fn shader_info_log(&self, shader: u32) -> String {
        if self.shader_compile_status(shader) {
            String::new()
        } else {
            "ERROR: 0:1: compilation failed".into()
        }
    }

    fn create_program(&self) -> u32 {
        let id = self.alloc_id();
        if id != 0 {
            self.programs.borrow_mut().insert(id, ProgramRec::default());
        }
        id
    }

    fn delete_program(&self, program: u32) {
        self.programs.borrow_mut().remove(&program);
        self.record(format!("delete_program({program})"));
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        if let Some(rec) = self.programs.borrow_mut().get_mut(&program) {
            rec.shaders.push(shader);
        }
    }

    fn link_program(&self, program: u32) {
        self.relink(program);
        self.record(format!("link_program({program})"));
    }

    fn program_link_status(&self, program: u32) -> bool {
        let programs = self.programs.borrow();
        let Some(rec) = programs.get(&program) else {
            return false;
        };
        let shaders = self.shaders.borrow();
        rec.linked
            && !rec.shaders.is_empty()
            && rec.shaders.iter().all(|s| {
                shaders
                    .get(s)
                    .map(|sh| !sh.source.trim().is_empty() && !sh.source.contains("#error"))
                    .unwrap_or(false)
            })
    }

    fn program_info_log(&self, program: u32) -> String {
        if self.program_link_status(program) {
            String::new()
        } else {
            "ERROR: link failed".into()
        }
    }

    fn use_program(&self, program: u32) {
        self.current_program.set(program);
        self.record(format!("use_program({program})"));
    }

    fn active_attribute_count(&self, program: u32) -> u32 {
        self.programs
            .borrow()
            .get(&program)
            .map(|r| r.attributes.len() as u32)
            .unwrap_or(0)
    }

    fn active_attribute(&self, program: u32, index: u32) -> Option<ActiveInfo> {
        self.programs
            .borrow()
            .get(&program)
            .and_then(|r| r.attributes.get(index as usize).cloned())
    }

    fn active_uniform_count(&self, program: u32) -> u32 {
        self.programs
            .borrow()
            .get(&program)
            .map(|r| r.uniforms.len() as u32)
            .unwrap_or(0)
    }

    fn active_uniform(&self, program: u32, index: u32) -> Option<ActiveInfo> {
        self.programs
            .borrow()
            .get(&program)
            .and_then(|r| r.uniforms.get(index as usize).cloned())
    }

    fn attrib_location(&self, program: u32, name: &str) -> i32 {
        self.programs
            .borrow()
            .get(&program)
            .and_then(|r| r.attributes.iter().position(|a| a.name == name))
            .map(|i| i as i32)
            .unwrap_or(-1)
    }

    fn uniform_location(&self, program: u32, name: &str) -> i32 {
        self.programs
            .borrow()
            .get(&program)
            .and_then(|r| r.uniforms.iter().position(|u| u.name == name))
            .map(|i| i as i32)
            .unwrap_or(-1)
    }

    fn uniform_1i(&self, location: i32, v: i32) {
        self.record(format!("uniform_1i({location}, {v})"));
    }

    fn uniform_1f(&self, location: i32, v: f32) {
        self.record(format!("uniform_1f({location}, {v})"));
    }

    fn uniform_2f(&self, location: i32, v: [f32; 2]) {
        self.record(format!("uniform_2f({location}, {v:?})"));
    }

    fn uniform_3f(&self, location: i32, v: [f32; 3]) {
        self.record(format!("uniform_3f({location}, {v:?})"));
    }

    fn uniform_4f(&self, location: i32, v: [f32; 4]) {
        self.record(format!("uniform_4f({location}, {v:?})"));
    }

    fn uniform_2i(&self, location: i32, v: [i32; 2]) {
        self.record(format!("uniform_2i({location}, {v:?})"));
    }

    fn uniform_3i(&self, location: i32, v: [i32; 3]) {
        self.record(format!("uniform_3i({location}, {v:?})"));
    }

    fn uniform_4i(&self, location: i32, v: [i32; 4]) {
        self.record(format!("uniform_4i({location}, {v:?})"));
    }

    fn uniform_matrix_2fv(&self, location: i32, v: &[f32]) {
        self.record(format!("uniform_matrix_2fv({location}, {len})", len = v.len()));
    }

    fn uniform_matrix_3fv(&self, location: i32, v: &[f32]) {
        self.record(format!("uniform_matrix_3fv({location}, {len})", len = v.len()));
    }

    fn uniform_matrix_4fv(&self, location: i32, v: &[f32]) {
        self.record(format!("uniform_matrix_4fv({location}, {len})", len = v.len()));
    }

    fn uniform_block_index(&self, program: u32, name: &str) -> u32 {
        self.programs
            .borrow()
            .get(&program)
            .and_then(|r| r.blocks.iter().position(|b| b == name))
            .map(|i| i as u32)
            .unwrap_or(gl::INVALID_INDEX)
    }

    fn uniform_block_binding(&self, program: u32, block_index: u32, binding: u32) {
        self.record(format!(
            "uniform_block_binding({program}, {block_index}, {binding})"
        ));
    }

    fn uniform_block_data_size(&self, _program: u32, _block_index: u32) -> usize {
        256
    }

    // vertex state --------------------------------------------------------

    fn create_vertex_array(&self) -> u32 {
        if self.config.generation == BackendGeneration::Gl1
            && !self.supports_extension("OES_vertex_array_object")
        {
            return 0;
        }
        self.alloc_id()
    }

    fn delete_vertex_array(&self, vao: u32) {
        self.record(format!("delete_vertex_array({vao})"));
    }

    fn bind_vertex_array(&self, vao: u32) {
        self.bound_vao.set(vao);
        self.record(format!("bind_vertex_array({vao})"));
    }

    fn enable_vertex_attrib_array(&self, location: u32) {
        self.record(format!("enable_vertex_attrib_array({location})"));
    }

    fn disable_vertex_attrib_array(&self, location: u32) {
        self.record(format!("disable_vertex_attrib_array({location})"));
    }

    fn vertex_attrib_pointer(
        &self,
        location: u32,
        size: u32,
        ty: u32,
        normalized: bool,
        stride: u32,
        offset: usize,
    ) {
        self.record(format!(
            "vertex_attrib_pointer({location}, {size}, {ty:#x}, {normalized}, {stride}, {offset})"
        ));
    }

    fn vertex_attrib_divisor(&self, location: u32, divisor: u32) {
        self.record(format!("vertex_attrib_divisor({location}, {divisor})"));
    }

    // draws ---------------------------------------------------------------

    fn draw_arrays(&self, mode: u32, first: u32, count: u32) {
        self.record(format!("draw_arrays({mode:#x}, {first}, {count})"));
    }

    fn draw_elements(&self, mode: u32, count: u32, ty: u32, offset: usize) {
        self.record(format!("draw_elements({mode:#x}, {count}, {ty:#x}, {offset})"));
    }

    fn draw_arrays_instanced(&self, mode: u32, first: u32, count: u32, instances: u32) {
        self.record(format!(
            "draw_arrays_instanced({mode:#x}, {first}, {count}, {instances})"
        ));
    }

    fn draw_elements_instanced(&self, mode: u32, count: u32, ty: u32, offset: usize, instances: u32) {
        self.record(format!(
            "draw_elements_instanced({mode:#x}, {count}, {ty:#x}, {offset}, {instances})"
        ));
    }

    // framebuffers --------------------------------------------------------

    fn create_framebuffer(&self) -> u32 {
        self.alloc_id()
    }

    fn delete_framebuffer(&self, framebuffer: u32) {
        if self.bound_framebuffer.get() == framebuffer {
            self.bound_framebuffer.set(0);
        }
        self.record(format!("delete_framebuffer({framebuffer})"));
    }

    fn bind_framebuffer(&self, target: u32, framebuffer: u32) {
        self.bound_framebuffer.set(framebuffer);
        self.record(format!("bind_framebuffer({target:#x}, {framebuffer})"));
    }

    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        tex_target: u32,
        texture: u32,
        level: u32,
    ) {
        self.record(format!(
            "framebuffer_texture_2d({target:#x}, {attachment:#x}, {tex_target:#x}, {texture}, {level})"
        ));
    }

    fn framebuffer_texture_layer(
        &self,
        target: u32,
        attachment: u32,
        texture: u32,
        level: u32,
        layer: u32,
    ) {
        self.record(format!(
            "framebuffer_texture_layer({target:#x}, {attachment:#x}, {texture}, {level}, {layer})"
        ));
    }

    fn framebuffer_renderbuffer(&self, target: u32, attachment: u32, renderbuffer: u32) {
        self.record(format!(
            "framebuffer_renderbuffer({target:#x}, {attachment:#x}, {renderbuffer})"
        ));
    }

    fn check_framebuffer_status(&self, _target: u32) -> u32 {
        self.forced_framebuffer_status
            .get()
            .unwrap_or(gl::FRAMEBUFFER_COMPLETE)
    }

    fn invalidate_framebuffer(&self, target: u32, attachments: &[u32]) {
        self.record(format!(
            "invalidate_framebuffer({target:#x}, {attachments:#x?})"
        ));
    }

    fn draw_buffers(&self, buffers: &[u32]) {
        self.record(format!("draw_buffers({buffers:#x?})"));
    }

    fn blit_framebuffer(&self, src: [i32; 4], dst: [i32; 4], mask: u32, filter: u32) {
        self.record(format!(
            "blit_framebuffer({src:?}, {dst:?}, {mask:#x}, {filter:#x})"
        ));
    }

    fn create_renderbuffer(&self) -> u32 {
        self.alloc_id()
    }

    fn delete_renderbuffer(&self, renderbuffer: u32) {
        self.record(format!("delete_renderbuffer({renderbuffer})"));
    }

    fn bind_renderbuffer(&self, renderbuffer: u32) {
        self.record(format!("bind_renderbuffer({renderbuffer})"));
    }

    fn renderbuffer_storage(&self, internal_format: u32, width: u32, height: u32) {
        self.record(format!(
            "renderbuffer_storage({internal_format:#x}, {width}, {height})"
        ));
    }

    // queries -------------------------------------------------------------

    fn create_query(&self) -> u32 {
        self.alloc_id()
    }

    fn delete_query(&self, query: u32) {
        self.record(format!("delete_query({query})"));
    }

    fn begin_query(&self, target: u32, query: u32) {
        self.record(format!("begin_query({target:#x}, {query})"));
    }

    fn end_query(&self, target: u32) {
        self.record(format!("end_query({target:#x})"));
    }

    fn query_result_available(&self, _query: u32) -> bool {
        true
    }

    fn query_result(&self, _query: u32) -> u64 {
        0
    }

    // fixed-function state ------------------------------------------------

    fn enable(&self, cap: u32) {
        self.enabled_caps.borrow_mut().insert(cap);
        self.record(format!("enable({cap:#x})"));
    }

    fn disable(&self, cap: u32) {
        self.enabled_caps.borrow_mut().remove(&cap);
        self.record(format!("disable({cap:#x})"));
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.viewport.set([x, y, width, height]);
        self.record(format!("viewport({x}, {y}, {width}, {height})"));
    }

    fn scissor(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(format!("scissor({x}, {y}, {width}, {height})"));
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.record(format!("clear_color({r}, {g}, {b}, {a})"));
    }

    fn clear_depth(&self, depth: f32) {
        self.record(format!("clear_depth({depth})"));
    }

    fn clear_stencil(&self, stencil: i32) {
        self.record(format!("clear_stencil({stencil})"));
    }

    fn clear(&self, mask: u32) {
        self.record(format!("clear({mask:#x})"));
    }

    fn color_mask(&self, r: bool, g: bool, b: bool, a: bool) {
        self.record(format!("color_mask({r}, {g}, {b}, {a})"));
    }

    fn depth_mask(&self, enabled: bool) {
        self.record(format!("depth_mask({enabled})"));
    }

    fn depth_func(&self, func: u32) {
        self.record(format!("depth_func({func:#x})"));
    }

    fn stencil_func_separate(&self, face: u32, func: u32, reference: i32, mask: u32) {
        self.record(format!(
            "stencil_func_separate({face:#x}, {func:#x}, {reference}, {mask:#x})"
        ));
    }

    fn stencil_op_separate(&self, face: u32, fail: u32, depth_fail: u32, pass: u32) {
        self.record(format!(
            "stencil_op_separate({face:#x}, {fail:#x}, {depth_fail:#x}, {pass:#x})"
        ));
    }

    fn stencil_mask_separate(&self, face: u32, mask: u32) {
        self.record(format!("stencil_mask_separate({face:#x}, {mask:#x})"));
    }

    fn blend_equation_separate(&self, color: u32, alpha: u32) {
        self.record(format!("blend_equation_separate({color:#x}, {alpha:#x})"));
    }

    fn blend_func_separate(&self, src_color: u32, dst_color: u32, src_alpha: u32, dst_alpha: u32) {
        self.record(format!(
            "blend_func_separate({src_color:#x}, {dst_color:#x}, {src_alpha:#x}, {dst_alpha:#x})"
        ));
    }

    fn blend_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.record(format!("blend_color({r}, {g}, {b}, {a})"));
    }

    fn cull_face(&self, mode: u32) {
        self.record(format!("cull_face({mode:#x})"));
    }

    fn front_face(&self, mode: u32) {
        self.record(format!("front_face({mode:#x})"));
    }

    fn line_width(&self, width: f32) {
        self.record(format!("line_width({width})"));
    }

    fn polygon_offset(&self, factor: f32, units: f32) {
        self.record(format!("polygon_offset({factor}, {units})"));
    }

    fn flush(&self) {}

    fn finish(&self) {}
}
