//! Two-pass shadow setup: render depth into a shadow map, then sample it
//! with a comparison sampler in the main pass.

use prism_render::{
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResourceKind, BufferBindingKind,
    BufferDescriptor, BufferTypeInfo, BufferUsage, Color, CompareFunction, DepthStencilState,
    DeviceDescriptor, FilterMode, LoadOp, PrimitiveTopology, RasterizationState,
    SamplerBindingKind, SamplerDescriptor, ShaderLanguage, ShaderStage, ShaderStageFlags,
    StoreOp, TextureDescriptor, TextureDimension, TextureFormat, TextureSampleKind, TextureUsage,
    TextureViewDescriptor, UniformType, VertexAttribute, VertexBufferLayout, VertexFormat,
    VertexStepMode,
};
use prism_render_gl::api::HeadlessContext;
use prism_render_gl::{
    BindGroupDescriptor, BindGroupEntry, BindingResource, ColorAttachment, DepthStencilAttachment,
    Device, RenderPassDescriptor, RenderPipelineDescriptor, ShaderModuleDescriptor,
};
use std::rc::Rc;

const DEPTH_VS: &str = "attribute vec3 a_position;\n\
uniform mat4 u_light_mvp;\n\
void main() {\n\
    gl_Position = u_light_mvp * vec4(a_position, 1.0);\n\
}\n";

const DEPTH_FS: &str = "precision mediump float;\n\
void main() {\n\
}\n";

const MAIN_VS: &str = "attribute vec3 a_position;\n\
uniform mat4 u_mvp;\n\
uniform mat4 u_light_mvp;\n\
varying vec4 v_shadow_coord;\n\
void main() {\n\
    v_shadow_coord = u_light_mvp * vec4(a_position, 1.0);\n\
    gl_Position = u_mvp * vec4(a_position, 1.0);\n\
}\n";

const MAIN_FS: &str = "precision mediump float;\n\
varying vec4 v_shadow_coord;\n\
uniform sampler2D u_shadow_map;\n\
void main() {\n\
    vec3 coord = v_shadow_coord.xyz / v_shadow_coord.w;\n\
    float lit = texture2D(u_shadow_map, coord.xy).r < coord.z ? 0.2 : 1.0;\n\
    gl_FragColor = vec4(vec3(lit), 1.0);\n\
}\n";

fn main() {
    pretty_env_logger::init();

    let ctx = Rc::new(HeadlessContext::gl2());
    let device = Device::new(ctx.clone(), &DeviceDescriptor::default()).unwrap();

    let shadow_map = device
        .create_texture(&TextureDescriptor {
            label: Some("shadow-map".into()),
            width: 1024,
            height: 1024,
            format: TextureFormat::Depth32Float,
            usage: TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
            ..Default::default()
        })
        .unwrap();
    let shadow_view = shadow_map.create_view(&TextureViewDescriptor::default()).unwrap();

    let light_mvp = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: Some("light-mvp".into()),
                size: 64,
                usage: BufferUsage::UNIFORM,
                ..Default::default()
            },
            &identity_matrix_bytes(),
        )
        .unwrap();
    light_mvp.set_type_info(BufferTypeInfo::single("u_light_mvp", UniformType::Mat4));
    let mvp = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: Some("mvp".into()),
                size: 64,
                usage: BufferUsage::UNIFORM,
                ..Default::default()
            },
            &identity_matrix_bytes(),
        )
        .unwrap();
    mvp.set_type_info(BufferTypeInfo::single("u_mvp", UniformType::Mat4));

    let comparison_sampler = device
        .create_sampler(&SamplerDescriptor {
            label: Some("shadow-sampler".into()),
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            compare: Some(CompareFunction::LessEqual),
            use_mipmap: false,
            ..Default::default()
        })
        .unwrap();

    let layout = device
        .create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("shadow-bindings".into()),
            entries: vec![
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStageFlags::VERTEX,
                    name: "u_mvp".into(),
                    resource: BindingResourceKind::Buffer {
                        kind: BufferBindingKind::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    associated_texture: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStageFlags::VERTEX,
                    name: "u_light_mvp".into(),
                    resource: BindingResourceKind::Buffer {
                        kind: BufferBindingKind::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    associated_texture: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStageFlags::FRAGMENT,
                    name: "u_shadow_map".into(),
                    resource: BindingResourceKind::Texture {
                        sample_kind: TextureSampleKind::Depth,
                        view_dimension: TextureDimension::D2,
                        multisampled: false,
                    },
                    associated_texture: None,
                },
                BindGroupLayoutEntry {
                    binding: 3,
                    visibility: ShaderStageFlags::FRAGMENT,
                    name: "u_shadow_sampler".into(),
                    resource: BindingResourceKind::Sampler {
                        kind: SamplerBindingKind::Comparison,
                    },
                    associated_texture: Some(2),
                },
            ],
        })
        .unwrap();

    let scene_vertices = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: Some("scene".into()),
                size: 3 * 12,
                usage: BufferUsage::VERTEX,
                ..Default::default()
            },
            &[0u8; 36],
        )
        .unwrap();

    let position_layout = vec![VertexBufferLayout {
        stride: 12,
        step_mode: VertexStepMode::Vertex,
        attributes: vec![VertexAttribute {
            name: "a_position".into(),
            format: VertexFormat::Float32x3,
            offset: 0,
            shader_location: 0,
        }],
    }];

    let depth_pipeline = device
        .create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("depth-only".into()),
            vertex: device
                .create_shader_module(&ShaderModuleDescriptor {
                    label: Some("depth-vs".into()),
                    source: DEPTH_VS.into(),
                    stage: ShaderStage::Vertex,
                    language: ShaderLanguage::Glsl,
                })
                .unwrap(),
            fragment: device
                .create_shader_module(&ShaderModuleDescriptor {
                    label: Some("depth-fs".into()),
                    source: DEPTH_FS.into(),
                    stage: ShaderStage::Fragment,
                    language: ShaderLanguage::Glsl,
                })
                .unwrap(),
            vertex_buffers: position_layout.clone(),
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth_stencil: Some(DepthStencilState {
                depth_write_enabled: true,
                depth_compare: CompareFunction::LessEqual,
                ..Default::default()
            }),
            color_targets: vec![],
            layout: None,
        })
        .unwrap();

    let main_pipeline = device
        .create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("main".into()),
            vertex: device
                .create_shader_module(&ShaderModuleDescriptor {
                    label: Some("main-vs".into()),
                    source: MAIN_VS.into(),
                    stage: ShaderStage::Vertex,
                    language: ShaderLanguage::Glsl,
                })
                .unwrap(),
            fragment: device
                .create_shader_module(&ShaderModuleDescriptor {
                    label: Some("main-fs".into()),
                    source: MAIN_FS.into(),
                    stage: ShaderStage::Fragment,
                    language: ShaderLanguage::Glsl,
                })
                .unwrap(),
            vertex_buffers: position_layout,
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth_stencil: None,
            color_targets: vec![Default::default()],
            layout: None,
        })
        .unwrap();

    let group = device
        .create_bind_group(
            &layout,
            &BindGroupDescriptor {
                label: Some("shadow-group".into()),
                entries: vec![
                    BindGroupEntry {
                        binding: 0,
                        resource: BindingResource::Buffer(mvp),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: BindingResource::Buffer(light_mvp),
                    },
                    BindGroupEntry {
                        binding: 2,
                        resource: BindingResource::TextureView(shadow_view.clone()),
                    },
                    BindGroupEntry {
                        binding: 3,
                        resource: BindingResource::Sampler(comparison_sampler),
                    },
                ],
            },
        )
        .unwrap();

    let color = device
        .create_texture(&TextureDescriptor {
            label: Some("backbuffer".into()),
            width: 640,
            height: 480,
            usage: TextureUsage::RENDER_TARGET,
            ..Default::default()
        })
        .unwrap();
    let color_view = color.create_view(&TextureViewDescriptor::default()).unwrap();

    let encoder = device.create_command_encoder(Some("shadow-frame")).unwrap();

    // pass 1: scene depth from the light
    let depth_pass = encoder
        .begin_render_pass(RenderPassDescriptor {
            label: Some("shadow-pass".into()),
            color_attachments: vec![],
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: shadow_view,
                depth_load_op: LoadOp::Clear,
                depth_store_op: StoreOp::Store,
                clear_depth: 1.0,
                stencil_load_op: LoadOp::None,
                stencil_store_op: StoreOp::Discard,
                clear_stencil: 0,
            }),
        })
        .unwrap();
    depth_pass.set_pipeline(&depth_pipeline).unwrap();
    depth_pass.set_bind_group(0, &group, &[]).unwrap();
    depth_pass.set_vertex_buffer(0, &scene_vertices, 0).unwrap();
    depth_pass.draw(3, 1, 0, 0).unwrap();
    depth_pass.end().unwrap();

    // pass 2: main view, sampling the shadow map
    let main_pass = encoder
        .begin_render_pass(RenderPassDescriptor {
            label: Some("main-pass".into()),
            color_attachments: vec![ColorAttachment {
                view: color_view,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                clear_value: Color::BLACK,
            }],
            depth_stencil_attachment: None,
        })
        .unwrap();
    main_pass.set_pipeline(&main_pipeline).unwrap();
    main_pass.set_bind_group(0, &group, &[]).unwrap();
    main_pass.set_vertex_buffer(0, &scene_vertices, 0).unwrap();
    main_pass.draw(3, 1, 0, 0).unwrap();
    main_pass.end().unwrap();

    device.submit(&[encoder.finish().unwrap()]);

    println!("{} backend calls recorded", ctx.calls().len());
    device.destroy();
}

fn identity_matrix_bytes() -> Vec<u8> {
    let mut m = [0.0f32; 16];
    m[0] = 1.0;
    m[5] = 1.0;
    m[10] = 1.0;
    m[15] = 1.0;
    m.iter().flat_map(|v| v.to_le_bytes()).collect()
}
