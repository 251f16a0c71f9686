//! Composite scenarios: the textured quad, multiple render targets,
//! dynamic offsets, instancing, struct-typed uniforms and texture copies.

mod common;

use common::{device_with, gl1_device, gl2_device, TEXTURED_FS, TEXTURED_VS};
use prism_render::{
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResourceKind, BufferBindingKind,
    BufferDescriptor, BufferFieldInfo, BufferTypeInfo, BufferUsage, Color, CompareFunction,
    DepthStencilState, IndexFormat, LoadOp, PrimitiveTopology, RasterizationState,
    SamplerBindingKind, SamplerDescriptor, ShaderLanguage, ShaderStage, ShaderStageFlags,
    StencilFaceState, StencilOperation, StoreOp, TextureDescriptor, TextureDimension,
    TextureSampleKind, TextureUsage, TextureViewDescriptor, UniformType, VertexAttribute,
    VertexBufferLayout, VertexFormat, VertexStepMode,
};
use prism_render_gl::api::HeadlessConfig;
use prism_render_gl::{
    BindGroupDescriptor, BindGroupEntry, BindingResource, ColorAttachment, Device,
    RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor, ShaderModuleDescriptor,
};
use std::rc::Rc;

fn shader(device: &Device, source: &str, stage: ShaderStage) -> Rc<prism_render_gl::ShaderModule> {
    device
        .create_shader_module(&ShaderModuleDescriptor {
            label: None,
            source: source.into(),
            stage,
            language: ShaderLanguage::Glsl,
        })
        .unwrap()
}

fn quad_pipeline(device: &Device) -> Rc<RenderPipeline> {
    let vs = shader(device, TEXTURED_VS, ShaderStage::Vertex);
    let fs = shader(device, TEXTURED_FS, ShaderStage::Fragment);
    device
        .create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("quad".into()),
            vertex: vs,
            fragment: fs,
            vertex_buffers: vec![VertexBufferLayout {
                stride: 20,
                step_mode: VertexStepMode::Vertex,
                attributes: vec![
                    VertexAttribute {
                        name: "a_position".into(),
                        format: VertexFormat::Float32x3,
                        offset: 0,
                        shader_location: 0,
                    },
                    VertexAttribute {
                        name: "a_uv".into(),
                        format: VertexFormat::Float32x2,
                        offset: 12,
                        shader_location: 1,
                    },
                ],
            }],
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth_stencil: None,
            color_targets: vec![Default::default()],
            layout: None,
        })
        .unwrap()
}

fn target(device: &Device, label: &str) -> ColorAttachment {
    let texture = device
        .create_texture(&TextureDescriptor {
            label: Some(label.into()),
            width: 256,
            height: 256,
            usage: TextureUsage::RENDER_TARGET,
            ..Default::default()
        })
        .unwrap();
    let view = texture.create_view(&TextureViewDescriptor::default()).unwrap();
    ColorAttachment {
        view,
        load_op: LoadOp::Clear,
        store_op: StoreOp::Store,
        clear_value: Color::BLACK,
    }
}

fn uniform_entry(binding: u32, name: &str) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT,
        name: name.to_owned(),
        resource: BindingResourceKind::Buffer {
            kind: BufferBindingKind::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        associated_texture: None,
    }
}

fn texture_entry(binding: u32, name: &str) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStageFlags::FRAGMENT,
        name: name.to_owned(),
        resource: BindingResourceKind::Texture {
            sample_kind: TextureSampleKind::Float,
            view_dimension: TextureDimension::D2,
            multisampled: false,
        },
        associated_texture: None,
    }
}

fn sampler_entry(binding: u32, name: &str, associated: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStageFlags::FRAGMENT,
        name: name.to_owned(),
        resource: BindingResourceKind::Sampler {
            kind: SamplerBindingKind::Filtering,
        },
        associated_texture: Some(associated),
    }
}

#[test]
fn textured_quad_renders_with_two_textures_and_three_uniforms() {
    let (ctx, device) = gl1_device();
    let pipeline = quad_pipeline(&device);

    let vertices = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: Some("quad-vertices".into()),
                size: 4 * 20,
                usage: BufferUsage::VERTEX,
                ..Default::default()
            },
            &[0u8; 4 * 20],
        )
        .unwrap();
    let indices = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: Some("quad-indices".into()),
                size: 6 * 2,
                usage: BufferUsage::INDEX,
                ..Default::default()
            },
            &[0u8; 12],
        )
        .unwrap();

    let checker = device
        .create_texture(&TextureDescriptor {
            label: Some("checker".into()),
            width: 256,
            height: 256,
            usage: TextureUsage::SAMPLED | TextureUsage::COPY_DST,
            ..Default::default()
        })
        .unwrap();
    let gradient = device
        .create_texture(&TextureDescriptor {
            label: Some("gradient".into()),
            width: 256,
            height: 256,
            usage: TextureUsage::SAMPLED | TextureUsage::COPY_DST,
            ..Default::default()
        })
        .unwrap();

    let layout = device
        .create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("quad-bindings".into()),
            entries: vec![
                uniform_entry(0, "u_mvp"),
                uniform_entry(1, "u_time"),
                uniform_entry(2, "u_mix"),
                texture_entry(3, "u_checker"),
                sampler_entry(4, "u_checker_sampler", 3),
                texture_entry(5, "u_gradient"),
                sampler_entry(6, "u_gradient_sampler", 5),
            ],
        })
        .unwrap();

    let mvp = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: Some("mvp".into()),
                size: 64,
                usage: BufferUsage::UNIFORM,
                ..Default::default()
            },
            &[0u8; 64],
        )
        .unwrap();
    mvp.set_type_info(BufferTypeInfo::single("u_mvp", UniformType::Mat4));
    let time = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: Some("time".into()),
                size: 4,
                usage: BufferUsage::UNIFORM,
                ..Default::default()
            },
            &0.5f32.to_le_bytes(),
        )
        .unwrap();
    let mix = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: Some("mix".into()),
                size: 4,
                usage: BufferUsage::UNIFORM,
                ..Default::default()
            },
            &0.25f32.to_le_bytes(),
        )
        .unwrap();

    let sampler = device.create_sampler(&SamplerDescriptor::default()).unwrap();
    let group = device
        .create_bind_group(
            &layout,
            &BindGroupDescriptor {
                label: Some("quad-group".into()),
                entries: vec![
                    BindGroupEntry {
                        binding: 0,
                        resource: BindingResource::Buffer(mvp),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: BindingResource::Buffer(time),
                    },
                    BindGroupEntry {
                        binding: 2,
                        resource: BindingResource::Buffer(mix),
                    },
                    BindGroupEntry {
                        binding: 3,
                        resource: BindingResource::TextureView(
                            checker.create_view(&TextureViewDescriptor::default()).unwrap(),
                        ),
                    },
                    BindGroupEntry {
                        binding: 4,
                        resource: BindingResource::Sampler(sampler.clone()),
                    },
                    BindGroupEntry {
                        binding: 5,
                        resource: BindingResource::TextureView(
                            gradient.create_view(&TextureViewDescriptor::default()).unwrap(),
                        ),
                    },
                    BindGroupEntry {
                        binding: 6,
                        resource: BindingResource::Sampler(sampler),
                    },
                ],
            },
        )
        .unwrap();

    let encoder = device.create_command_encoder(Some("quad-frame")).unwrap();
    let pass = encoder
        .begin_render_pass(RenderPassDescriptor {
            label: Some("quad-pass".into()),
            color_attachments: vec![target(&device, "quad-target")],
            depth_stencil_attachment: None,
        })
        .unwrap();
    pass.set_pipeline(&pipeline).unwrap();
    pass.set_bind_group(0, &group, &[]).unwrap();
    pass.set_vertex_buffer(0, &vertices, 0).unwrap();
    pass.set_index_buffer(&indices, IndexFormat::Uint16, 0).unwrap();
    pass.draw_indexed(6, 1, 0, 0, 0).unwrap();
    pass.end().unwrap();
    let buffer = encoder.finish().unwrap();

    ctx.clear_calls();
    device.submit(&[buffer]);

    // three uniforms through the typed fallback
    assert_eq!(ctx.count_calls("uniform_matrix_4fv"), 1);
    assert_eq!(ctx.count_calls("uniform_1f"), 2);
    // two textures on their own units
    assert!(ctx.has_call("active_texture(0)"));
    assert!(ctx.has_call("active_texture(1)"));
    // indexed draw of the two quad triangles
    assert!(ctx.has_call("draw_elements(0x4, 6, 0x1403, 0)"));
}

#[test]
fn multiple_render_targets_enable_draw_buffers() {
    let (ctx, device) = gl2_device();
    let pipeline = quad_pipeline(&device);
    let vertices = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: None,
                size: 4 * 20,
                usage: BufferUsage::VERTEX,
                ..Default::default()
            },
            &[0u8; 80],
        )
        .unwrap();

    let encoder = device.create_command_encoder(None).unwrap();
    let pass = encoder
        .begin_render_pass(RenderPassDescriptor {
            label: Some("mrt".into()),
            color_attachments: vec![target(&device, "rt0"), target(&device, "rt1")],
            depth_stencil_attachment: None,
        })
        .unwrap();
    pass.set_pipeline(&pipeline).unwrap();
    pass.set_vertex_buffer(0, &vertices, 0).unwrap();
    pass.draw(3, 1, 0, 0).unwrap();
    pass.end().unwrap();
    let buffer = encoder.finish().unwrap();

    ctx.clear_calls();
    device.submit(&[buffer]);
    assert!(ctx
        .calls()
        .iter()
        .any(|c| c.starts_with("draw_buffers") && c.contains("0x8ce0") && c.contains("0x8ce1")));
    // both attachments landed on their slots
    assert!(ctx
        .calls()
        .iter()
        .any(|c| c.starts_with("framebuffer_texture_2d(0x8d40, 0x8ce1")));
}

#[test]
fn dynamic_offsets_shift_the_bound_range() {
    let (ctx, device) = gl2_device();
    let vs = shader(
        &device,
        "in vec3 a_position;\nuniform Globals { mat4 mvp; };\nvoid main() {}\n",
        ShaderStage::Vertex,
    );
    let fs = shader(&device, common::PLAIN_FS, ShaderStage::Fragment);
    let pipeline = device
        .create_render_pipeline(&RenderPipelineDescriptor {
            label: None,
            vertex: vs,
            fragment: fs,
            vertex_buffers: vec![],
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth_stencil: None,
            color_targets: vec![Default::default()],
            layout: None,
        })
        .unwrap();

    let layout = device
        .create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: None,
            entries: vec![BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::VERTEX,
                name: "Globals".into(),
                resource: BindingResourceKind::Buffer {
                    kind: BufferBindingKind::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: Some(64),
                },
                associated_texture: None,
            }],
        })
        .unwrap();
    let buffer = device
        .create_buffer(&BufferDescriptor {
            label: None,
            size: 512,
            usage: BufferUsage::UNIFORM,
            ..Default::default()
        })
        .unwrap();
    let group = device
        .create_bind_group(
            &layout,
            &BindGroupDescriptor {
                label: None,
                entries: vec![BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::BufferRange {
                        buffer,
                        offset: 0,
                        size: 64,
                    },
                }],
            },
        )
        .unwrap();

    ctx.clear_calls();
    group.apply_bindings(&pipeline, &[256]);
    assert!(ctx
        .calls()
        .iter()
        .any(|c| c.starts_with("bind_buffer_range(0x8a11, 0, ") && c.ends_with(", 256, 64)")));
}

#[test]
fn plural_vertex_buffers_bind_additively() {
    let (ctx, device) = gl2_device();
    let vs = shader(
        &device,
        "in vec3 a_position;\nin vec2 a_uv;\nvoid main() {}\n",
        ShaderStage::Vertex,
    );
    let fs = shader(&device, common::PLAIN_FS, ShaderStage::Fragment);
    let pipeline = device
        .create_render_pipeline(&RenderPipelineDescriptor {
            label: None,
            vertex: vs,
            fragment: fs,
            vertex_buffers: vec![
                VertexBufferLayout {
                    stride: 12,
                    step_mode: VertexStepMode::Vertex,
                    attributes: vec![VertexAttribute {
                        name: "a_position".into(),
                        format: VertexFormat::Float32x3,
                        offset: 0,
                        shader_location: 0,
                    }],
                },
                VertexBufferLayout {
                    stride: 8,
                    step_mode: VertexStepMode::Vertex,
                    attributes: vec![VertexAttribute {
                        name: "a_uv".into(),
                        format: VertexFormat::Float32x2,
                        offset: 0,
                        shader_location: 1,
                    }],
                },
            ],
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth_stencil: None,
            color_targets: vec![Default::default()],
            layout: None,
        })
        .unwrap();

    let positions = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: None,
                size: 36,
                usage: BufferUsage::VERTEX,
                ..Default::default()
            },
            &[0u8; 36],
        )
        .unwrap();
    let uvs = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: None,
                size: 24,
                usage: BufferUsage::VERTEX,
                ..Default::default()
            },
            &[0u8; 24],
        )
        .unwrap();

    let encoder = device.create_command_encoder(None).unwrap();
    let pass = encoder
        .begin_render_pass(RenderPassDescriptor {
            label: None,
            color_attachments: vec![target(&device, "rt")],
            depth_stencil_attachment: None,
        })
        .unwrap();
    pass.set_pipeline(&pipeline).unwrap();
    pass.set_vertex_buffers(0, &[(&positions, 0), (&uvs, 0)]).unwrap();
    pass.draw(3, 1, 0, 0).unwrap();
    pass.end().unwrap();
    let buffer = encoder.finish().unwrap();

    ctx.clear_calls();
    device.submit(&[buffer]);
    // both attributes enabled, neither disabled before the draw
    let calls = ctx.calls();
    let draw = calls
        .iter()
        .position(|c| c.starts_with("draw_arrays"))
        .unwrap();
    assert!(calls[..draw]
        .iter()
        .any(|c| c == "enable_vertex_attrib_array(0)"));
    assert!(calls[..draw]
        .iter()
        .any(|c| c == "enable_vertex_attrib_array(1)"));
    assert!(!calls[..draw]
        .iter()
        .any(|c| c.starts_with("disable_vertex_attrib_array")));
}

#[test]
fn viewport_and_scissor_commands_reach_the_backend() {
    let (ctx, device) = gl2_device();
    let pipeline = quad_pipeline(&device);
    let vertices = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: None,
                size: 80,
                usage: BufferUsage::VERTEX,
                ..Default::default()
            },
            &[0u8; 80],
        )
        .unwrap();

    let encoder = device.create_command_encoder(None).unwrap();
    let pass = encoder
        .begin_render_pass(RenderPassDescriptor {
            label: None,
            color_attachments: vec![target(&device, "rt")],
            depth_stencil_attachment: None,
        })
        .unwrap();
    pass.set_pipeline(&pipeline).unwrap();
    pass.set_vertex_buffer(0, &vertices, 0).unwrap();
    pass.set_viewport(8, 16, 128, 64).unwrap();
    pass.set_scissor(4, 4, 32, 32).unwrap();
    pass.draw(3, 1, 0, 0).unwrap();
    pass.end().unwrap();
    let buffer = encoder.finish().unwrap();

    ctx.clear_calls();
    device.submit(&[buffer]);
    assert!(ctx.has_call("viewport(8, 16, 128, 64)"));
    assert!(ctx.has_call("scissor(4, 4, 32, 32)"));
    assert!(ctx.has_call("enable(0xc11)"));
}

#[test]
fn stencil_reference_is_applied_to_the_active_pipeline() {
    let (ctx, device) = gl2_device();
    let vs = shader(&device, TEXTURED_VS, ShaderStage::Vertex);
    let fs = shader(&device, TEXTURED_FS, ShaderStage::Fragment);
    let pipeline = device
        .create_render_pipeline(&RenderPipelineDescriptor {
            label: None,
            vertex: vs,
            fragment: fs,
            vertex_buffers: vec![VertexBufferLayout {
                stride: 20,
                step_mode: VertexStepMode::Vertex,
                attributes: vec![VertexAttribute {
                    name: "a_position".into(),
                    format: VertexFormat::Float32x3,
                    offset: 0,
                    shader_location: 0,
                }],
            }],
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth_stencil: Some(DepthStencilState {
                stencil_front: StencilFaceState {
                    compare: CompareFunction::Equal,
                    pass_op: StencilOperation::Replace,
                    ..Default::default()
                },
                ..Default::default()
            }),
            color_targets: vec![Default::default()],
            layout: None,
        })
        .unwrap();

    let vertices = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: None,
                size: 60,
                usage: BufferUsage::VERTEX,
                ..Default::default()
            },
            &[0u8; 60],
        )
        .unwrap();

    let encoder = device.create_command_encoder(None).unwrap();
    let pass = encoder
        .begin_render_pass(RenderPassDescriptor {
            label: None,
            color_attachments: vec![target(&device, "rt")],
            depth_stencil_attachment: None,
        })
        .unwrap();
    pass.set_pipeline(&pipeline).unwrap();
    pass.set_vertex_buffer(0, &vertices, 0).unwrap();
    pass.set_stencil_reference(7).unwrap();
    pass.draw(3, 1, 0, 0).unwrap();
    pass.end().unwrap();
    let buffer = encoder.finish().unwrap();

    ctx.clear_calls();
    device.submit(&[buffer]);
    assert!(ctx
        .calls()
        .iter()
        .any(|c| c.starts_with("stencil_func_separate(0x404") && c.contains(", 7,")));
}

#[test]
fn instanced_draws_use_the_native_call_on_gl2() {
    let (ctx, device) = gl2_device();
    let pipeline = quad_pipeline(&device);
    let vertices = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: None,
                size: 80,
                usage: BufferUsage::VERTEX,
                ..Default::default()
            },
            &[0u8; 80],
        )
        .unwrap();

    let encoder = device.create_command_encoder(None).unwrap();
    let pass = encoder
        .begin_render_pass(RenderPassDescriptor {
            label: None,
            color_attachments: vec![target(&device, "rt")],
            depth_stencil_attachment: None,
        })
        .unwrap();
    pass.set_pipeline(&pipeline).unwrap();
    pass.set_vertex_buffer(0, &vertices, 0).unwrap();
    pass.draw(3, 4, 0, 0).unwrap();
    pass.end().unwrap();
    let buffer = encoder.finish().unwrap();

    ctx.clear_calls();
    device.submit(&[buffer]);
    assert!(ctx.has_call("draw_arrays_instanced(0x4, 0, 3, 4)"));
}

#[test]
fn instanced_draws_degrade_without_the_extension() {
    let mut config = HeadlessConfig::gl1();
    config.extensions.retain(|e| e != "ANGLE_instanced_arrays");
    let (ctx, device) = device_with(config);

    let pipeline = quad_pipeline(&device);
    let vertices = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: None,
                size: 80,
                usage: BufferUsage::VERTEX,
                ..Default::default()
            },
            &[0u8; 80],
        )
        .unwrap();

    let encoder = device.create_command_encoder(None).unwrap();
    let pass = encoder
        .begin_render_pass(RenderPassDescriptor {
            label: None,
            color_attachments: vec![target(&device, "rt")],
            depth_stencil_attachment: None,
        })
        .unwrap();
    pass.set_pipeline(&pipeline).unwrap();
    pass.set_vertex_buffer(0, &vertices, 0).unwrap();
    pass.draw(3, 4, 0, 0).unwrap();
    pass.end().unwrap();
    let buffer = encoder.finish().unwrap();

    ctx.clear_calls();
    device.submit(&[buffer]);
    assert_eq!(ctx.count_calls("draw_arrays_instanced"), 0);
    assert!(ctx.has_call("draw_arrays(0x4, 0, 3)"));
}

#[test]
fn struct_typed_buffers_dispatch_each_field() {
    let (ctx, device) = gl1_device();
    let vs = shader(&device, TEXTURED_VS, ShaderStage::Vertex);
    let fs = shader(&device, TEXTURED_FS, ShaderStage::Fragment);
    let pipeline = device
        .create_render_pipeline(&RenderPipelineDescriptor {
            label: None,
            vertex: vs,
            fragment: fs,
            vertex_buffers: vec![],
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth_stencil: None,
            color_targets: vec![Default::default()],
            layout: None,
        })
        .unwrap();

    let layout = device
        .create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: None,
            entries: vec![uniform_entry(0, "u_params")],
        })
        .unwrap();
    let params = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: Some("params".into()),
                size: 8,
                usage: BufferUsage::UNIFORM,
                ..Default::default()
            },
            &[0u8; 8],
        )
        .unwrap();
    params.set_type_info(BufferTypeInfo::Struct {
        fields: vec![
            BufferFieldInfo {
                uniform_name: "u_time".into(),
                ty: UniformType::F32,
                offset: 0,
            },
            BufferFieldInfo {
                uniform_name: "u_mix".into(),
                ty: UniformType::F32,
                offset: 4,
            },
        ],
    });
    let group = device
        .create_bind_group(
            &layout,
            &BindGroupDescriptor {
                label: None,
                entries: vec![BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::Buffer(params),
                }],
            },
        )
        .unwrap();

    ctx.clear_calls();
    group.apply_bindings(&pipeline, &[]);
    assert_eq!(ctx.count_calls("uniform_1f"), 2);
}

#[test]
fn texture_copies_blit_on_gl2_and_round_trip_on_gl1() {
    let (ctx, device) = gl2_device();
    let src = device
        .create_texture(&TextureDescriptor {
            width: 64,
            height: 64,
            usage: TextureUsage::COPY_SRC | TextureUsage::RENDER_TARGET,
            ..Default::default()
        })
        .unwrap();
    let dst = device
        .create_texture(&TextureDescriptor {
            width: 64,
            height: 64,
            usage: TextureUsage::COPY_DST,
            ..Default::default()
        })
        .unwrap();
    let encoder = device.create_command_encoder(None).unwrap();
    encoder
        .copy_texture_to_texture(&src, (0, 0), &dst, 0, (0, 0), (32, 32))
        .unwrap();
    ctx.clear_calls();
    device.submit(&[encoder.finish().unwrap()]);
    assert_eq!(ctx.count_calls("blit_framebuffer"), 1);

    let (ctx, device) = gl1_device();
    let src = device
        .create_texture(&TextureDescriptor {
            width: 64,
            height: 64,
            usage: TextureUsage::COPY_SRC | TextureUsage::RENDER_TARGET,
            ..Default::default()
        })
        .unwrap();
    let dst = device
        .create_texture(&TextureDescriptor {
            width: 64,
            height: 64,
            usage: TextureUsage::COPY_DST,
            ..Default::default()
        })
        .unwrap();
    let encoder = device.create_command_encoder(None).unwrap();
    encoder
        .copy_texture_to_texture(&src, (0, 0), &dst, 0, (0, 0), (32, 32))
        .unwrap();
    ctx.clear_calls();
    device.submit(&[encoder.finish().unwrap()]);
    assert_eq!(ctx.count_calls("blit_framebuffer"), 0);
    assert_eq!(ctx.count_calls("read_pixels"), 1);
    assert!(ctx.count_calls("tex_sub_image_2d") >= 1);
}

#[test]
fn buffer_to_texture_copies_upload_the_read_back() {
    let (ctx, device) = gl2_device();
    let src = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: None,
                size: 16 * 16 * 4,
                usage: BufferUsage::COPY_SRC,
                ..Default::default()
            },
            &[9u8; 16 * 16 * 4],
        )
        .unwrap();
    let dst = device
        .create_texture(&TextureDescriptor {
            width: 16,
            height: 16,
            usage: TextureUsage::COPY_DST,
            ..Default::default()
        })
        .unwrap();
    let encoder = device.create_command_encoder(None).unwrap();
    encoder
        .copy_buffer_to_texture(&src, 0, &dst, 0, (0, 0, 0), (16, 16, 1))
        .unwrap();
    ctx.clear_calls();
    device.submit(&[encoder.finish().unwrap()]);
    assert!(ctx.has_call("tex_sub_image_2d(0xde1, 0, 0, 0, 16, 16, 0x1908, 0x1401, 1024)"));
}
