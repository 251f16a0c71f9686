//! Shared fixtures for the integration suites: headless devices with an
//! inspectable context, and the shader sources the scenarios draw with.

// not every suite uses every fixture
#![allow(dead_code)]

use prism_render::DeviceDescriptor;
use prism_render_gl::api::{HeadlessConfig, HeadlessContext};
use prism_render_gl::Device;
use std::rc::Rc;

pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

/// A device over a 2.x headless context, returned alongside the context so
/// tests can assert on the recorded call stream.
pub fn gl2_device() -> (Rc<HeadlessContext>, Device) {
    init_logging();
    let ctx = Rc::new(HeadlessContext::gl2());
    let device = Device::new(ctx.clone(), &DeviceDescriptor::default()).unwrap();
    (ctx, device)
}

pub fn gl1_device() -> (Rc<HeadlessContext>, Device) {
    init_logging();
    let ctx = Rc::new(HeadlessContext::gl1());
    let device = Device::new(ctx.clone(), &DeviceDescriptor::default()).unwrap();
    (ctx, device)
}

pub fn device_with(config: HeadlessConfig) -> (Rc<HeadlessContext>, Device) {
    init_logging();
    let ctx = Rc::new(HeadlessContext::new(config));
    let device = Device::new(ctx.clone(), &DeviceDescriptor::default()).unwrap();
    (ctx, device)
}

pub const TRIANGLE_VS: &str = "attribute vec3 a_position;\n\
attribute vec3 a_color;\n\
varying vec3 v_color;\n\
void main() {\n\
    v_color = a_color;\n\
    gl_Position = vec4(a_position, 1.0);\n\
}\n";

pub const TRIANGLE_FS: &str = "precision mediump float;\n\
varying vec3 v_color;\n\
void main() {\n\
    gl_FragColor = vec4(v_color, 1.0);\n\
}\n";

pub const TEXTURED_VS: &str = "attribute vec3 a_position;\n\
attribute vec2 a_uv;\n\
uniform mat4 u_mvp;\n\
varying vec2 v_uv;\n\
void main() {\n\
    v_uv = a_uv;\n\
    gl_Position = u_mvp * vec4(a_position, 1.0);\n\
}\n";

pub const TEXTURED_FS: &str = "precision mediump float;\n\
varying vec2 v_uv;\n\
uniform sampler2D u_checker;\n\
uniform sampler2D u_gradient;\n\
uniform float u_time;\n\
uniform float u_mix;\n\
void main() {\n\
    gl_FragColor = mix(texture2D(u_checker, v_uv), texture2D(u_gradient, v_uv), u_mix);\n\
}\n";

pub const PUSH_CONSTANT_VS: &str = "in vec3 a_position;\n\
uniform _PushConstants { vec4 u_tint; };\n\
void main() {\n\
    gl_Position = vec4(a_position, 1.0);\n\
}\n";

pub const PLAIN_FS: &str = "precision mediump float;\n\
void main() {\n\
    gl_FragColor = vec4(1.0);\n\
}\n";
