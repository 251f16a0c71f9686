//! Minimal frame: clear, one triangle, submit.
//!
//! Runs against the headless context so it works anywhere; a host with a
//! real surface passes its own `GlContext` to `Device::new` instead. The
//! recorded backend calls are printed at the end.

use prism_render::{
    BufferDescriptor, BufferUsage, Color, ColorTargetState, DeviceDescriptor, LoadOp,
    PrimitiveTopology, RasterizationState, ShaderLanguage, ShaderStage, StoreOp,
    TextureDescriptor, TextureUsage, TextureViewDescriptor, VertexAttribute, VertexBufferLayout,
    VertexFormat, VertexStepMode,
};
use prism_render_gl::api::HeadlessContext;
use prism_render_gl::{
    ColorAttachment, Device, RenderPassDescriptor, RenderPipelineDescriptor,
    ShaderModuleDescriptor,
};
use std::rc::Rc;

const VS: &str = "attribute vec3 a_position;\n\
attribute vec3 a_color;\n\
varying vec3 v_color;\n\
void main() {\n\
    v_color = a_color;\n\
    gl_Position = vec4(a_position, 1.0);\n\
}\n";

const FS: &str = "precision mediump float;\n\
varying vec3 v_color;\n\
void main() {\n\
    gl_FragColor = vec4(v_color, 1.0);\n\
}\n";

fn main() {
    pretty_env_logger::init();

    let ctx = Rc::new(HeadlessContext::gl2());
    let device = Device::new(ctx.clone(), &DeviceDescriptor::default()).unwrap();
    println!("device: {:?}", device.capabilities().generation);

    let vertex = device
        .create_shader_module(&ShaderModuleDescriptor {
            label: Some("triangle-vs".into()),
            source: VS.into(),
            stage: ShaderStage::Vertex,
            language: ShaderLanguage::Glsl,
        })
        .unwrap();
    let fragment = device
        .create_shader_module(&ShaderModuleDescriptor {
            label: Some("triangle-fs".into()),
            source: FS.into(),
            stage: ShaderStage::Fragment,
            language: ShaderLanguage::Glsl,
        })
        .unwrap();

    let pipeline = device
        .create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("triangle".into()),
            vertex,
            fragment,
            vertex_buffers: vec![VertexBufferLayout {
                stride: 24,
                step_mode: VertexStepMode::Vertex,
                attributes: vec![
                    VertexAttribute {
                        name: "a_position".into(),
                        format: VertexFormat::Float32x3,
                        offset: 0,
                        shader_location: 0,
                    },
                    VertexAttribute {
                        name: "a_color".into(),
                        format: VertexFormat::Float32x3,
                        offset: 12,
                        shader_location: 1,
                    },
                ],
            }],
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth_stencil: None,
            color_targets: vec![ColorTargetState::default()],
            layout: None,
        })
        .unwrap();

    // position + color, interleaved
    #[rustfmt::skip]
    let vertex_data: [f32; 18] = [
         0.0,  0.5, 0.0,   1.0, 0.0, 0.0,
        -0.5, -0.5, 0.0,   0.0, 1.0, 0.0,
         0.5, -0.5, 0.0,   0.0, 0.0, 1.0,
    ];
    let bytes: Vec<u8> = vertex_data.iter().flat_map(|v| v.to_le_bytes()).collect();
    let vertices = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: Some("triangle-vertices".into()),
                size: bytes.len(),
                usage: BufferUsage::VERTEX,
                ..Default::default()
            },
            &bytes,
        )
        .unwrap();

    let texture = device
        .create_texture(&TextureDescriptor {
            label: Some("offscreen".into()),
            width: 640,
            height: 480,
            usage: TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
            ..Default::default()
        })
        .unwrap();
    let color_view = texture.create_view(&TextureViewDescriptor::default()).unwrap();

    let encoder = device.create_command_encoder(Some("frame")).unwrap();
    let pass = encoder
        .begin_render_pass(RenderPassDescriptor {
            label: Some("main".into()),
            color_attachments: vec![ColorAttachment {
                view: color_view.clone(),
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                clear_value: Color {
                    r: 0.1,
                    g: 0.1,
                    b: 0.1,
                    a: 1.0,
                },
            }],
            depth_stencil_attachment: None,
        })
        .unwrap();
    pass.set_pipeline(&pipeline).unwrap();
    pass.set_vertex_buffer(0, &vertices, 0).unwrap();
    pass.draw(3, 1, 0, 0).unwrap();
    pass.end().unwrap();

    // show the frame on the canvas
    encoder.copy_texture_to_canvas(&color_view).unwrap();
    let frame = encoder.finish().unwrap();
    device.submit(&[frame]);

    println!("backend calls:");
    for call in ctx.calls() {
        println!("  {call}");
    }

    device.destroy();
}
