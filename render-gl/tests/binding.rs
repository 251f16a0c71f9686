//! Bind group layout compilation and bind group application: texture unit
//! assignment, sampler association, the UBO path and the typed-uniform
//! fallback.

mod common;

use common::{gl1_device, gl2_device, TEXTURED_FS, TEXTURED_VS};
use prism_render::{
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResourceKind, BufferBindingKind,
    BufferDescriptor, BufferTypeInfo, BufferUsage, Error, SamplerBindingKind, SamplerDescriptor,
    ShaderStageFlags, TextureDescriptor, TextureDimension, TextureSampleKind,
    TextureViewDescriptor, UniformType,
};
use prism_render::{
    PrimitiveTopology, RasterizationState, ShaderLanguage, ShaderStage,
};
use prism_render_gl::{
    BindGroupDescriptor, BindGroupEntry, BindingResource, RenderPipelineDescriptor,
    ShaderModuleDescriptor,
};

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

fn sampler_entry(binding: u32, name: &str, associated: Option<u32>) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStageFlags::FRAGMENT,
        name: name.to_owned(),
        resource: BindingResourceKind::Sampler {
            kind: SamplerBindingKind::Filtering,
        },
        associated_texture: associated,
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

#[test]
fn texture_units_are_assigned_in_declaration_order() {
    let (_ctx, device) = gl2_device();
    let desc = BindGroupLayoutDescriptor {
        label: None,
        entries: vec![
            uniform_entry(0, "u_mvp"),
            texture_entry(1, "u_checker"),
            sampler_entry(2, "u_checker_sampler", Some(1)),
            texture_entry(3, "u_gradient"),
            sampler_entry(4, "u_gradient_sampler", Some(3)),
        ],
    };
    let layout = device.create_bind_group_layout(&desc).unwrap();
    assert_eq!(layout.texture_unit(1), Some(0));
    assert_eq!(layout.texture_unit(3), Some(1));
    assert_eq!(layout.texture_unit(0), None);
    assert_eq!(layout.associated_texture_binding(2), Some(1));
    assert_eq!(layout.associated_texture_binding(4), Some(3));

    // determinism: an identical layout compiles to identical assignments
    let again = device.create_bind_group_layout(&desc).unwrap();
    for binding in [0, 1, 2, 3, 4] {
        assert_eq!(layout.texture_unit(binding), again.texture_unit(binding));
    }
}

#[test]
fn sampler_association_falls_back_to_preceding_texture() {
    let (_ctx, device) = gl2_device();
    let layout = device
        .create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: None,
            entries: vec![
                texture_entry(0, "u_checker"),
                sampler_entry(1, "u_checker_sampler", None),
            ],
        })
        .unwrap();
    assert_eq!(layout.associated_texture_binding(1), Some(0));
}

#[test]
fn explicit_association_must_reference_a_texture() {
    let (_ctx, device) = gl2_device();
    let err = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: None,
        entries: vec![
            uniform_entry(0, "u_mvp"),
            sampler_entry(1, "u_sampler", Some(0)),
        ],
    });
    assert!(matches!(err, Err(Error::Configuration(_))));
}

#[test]
fn bind_group_kinds_must_match_the_layout() {
    let (_ctx, device) = gl2_device();
    let layout = device
        .create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: None,
            entries: vec![texture_entry(0, "u_checker")],
        })
        .unwrap();
    let buffer = device
        .create_buffer(&BufferDescriptor {
            label: None,
            size: 64,
            usage: BufferUsage::UNIFORM,
            ..Default::default()
        })
        .unwrap();
    let err = device.create_bind_group(
        &layout,
        &BindGroupDescriptor {
            label: None,
            entries: vec![BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer(buffer),
            }],
        },
    );
    assert!(matches!(err, Err(Error::Configuration(_))));
}

#[test]
fn undeclared_bindings_are_rejected() {
    let (_ctx, device) = gl2_device();
    let layout = device
        .create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: None,
            entries: vec![uniform_entry(0, "u_mvp")],
        })
        .unwrap();
    let buffer = device
        .create_buffer(&BufferDescriptor {
            label: None,
            size: 64,
            usage: BufferUsage::UNIFORM,
            ..Default::default()
        })
        .unwrap();
    let err = device.create_bind_group(
        &layout,
        &BindGroupDescriptor {
            label: None,
            entries: vec![BindGroupEntry {
                binding: 7,
                resource: BindingResource::Buffer(buffer),
            }],
        },
    );
    assert!(matches!(err, Err(Error::Configuration(_))));
}

#[test]
fn gl2_uniform_buffers_bind_through_block_bindings() {
    let (ctx, device) = gl2_device();

    // a shader with a real uniform block
    let vs = device
        .create_shader_module(&ShaderModuleDescriptor {
            label: None,
            source: "in vec3 a_position;\nuniform Globals { mat4 mvp; };\nvoid main() {}\n".into(),
            stage: ShaderStage::Vertex,
            language: ShaderLanguage::Glsl,
        })
        .unwrap();
    let fs = device
        .create_shader_module(&ShaderModuleDescriptor {
            label: None,
            source: common::PLAIN_FS.into(),
            stage: ShaderStage::Fragment,
            language: ShaderLanguage::Glsl,
        })
        .unwrap();
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
            entries: vec![uniform_entry(0, "Globals")],
        })
        .unwrap();
    let buffer = device
        .create_buffer(&BufferDescriptor {
            label: None,
            size: 64,
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
                    resource: BindingResource::Buffer(buffer),
                }],
            },
        )
        .unwrap();

    ctx.clear_calls();
    group.apply_bindings(&pipeline, &[]);
    assert!(ctx.count_calls("uniform_block_binding") == 1);
    assert!(ctx.count_calls("bind_buffer_base(0x8a11") == 1);
}

#[test]
fn gl1_uniform_buffers_fall_back_to_typed_uniforms() {
    let (ctx, device) = gl1_device();
    let vs = device
        .create_shader_module(&ShaderModuleDescriptor {
            label: None,
            source: TEXTURED_VS.into(),
            stage: ShaderStage::Vertex,
            language: ShaderLanguage::Glsl,
        })
        .unwrap();
    let fs = device
        .create_shader_module(&ShaderModuleDescriptor {
            label: None,
            source: TEXTURED_FS.into(),
            stage: ShaderStage::Fragment,
            language: ShaderLanguage::Glsl,
        })
        .unwrap();
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
            entries: vec![uniform_entry(0, "u_mvp"), uniform_entry(1, "u_time")],
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
            &1.5f32.to_le_bytes(),
        )
        .unwrap();

    let group = device
        .create_bind_group(
            &layout,
            &BindGroupDescriptor {
                label: None,
                entries: vec![
                    BindGroupEntry {
                        binding: 0,
                        resource: BindingResource::Buffer(mvp),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: BindingResource::Buffer(time),
                    },
                ],
            },
        )
        .unwrap();

    ctx.clear_calls();
    group.apply_bindings(&pipeline, &[]);
    assert_eq!(ctx.count_calls("uniform_matrix_4fv"), 1);
    assert_eq!(ctx.count_calls("uniform_1f"), 1);
    assert_eq!(ctx.count_calls("uniform_block_binding"), 0);
}

#[test]
fn texture_bindings_select_their_assigned_unit() {
    let (ctx, device) = gl2_device();
    let vs = device
        .create_shader_module(&ShaderModuleDescriptor {
            label: None,
            source: TEXTURED_VS.into(),
            stage: ShaderStage::Vertex,
            language: ShaderLanguage::Glsl,
        })
        .unwrap();
    let fs = device
        .create_shader_module(&ShaderModuleDescriptor {
            label: None,
            source: TEXTURED_FS.into(),
            stage: ShaderStage::Fragment,
            language: ShaderLanguage::Glsl,
        })
        .unwrap();
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
            entries: vec![
                texture_entry(0, "u_checker"),
                texture_entry(1, "u_gradient"),
            ],
        })
        .unwrap();

    let texture = device
        .create_texture(&TextureDescriptor {
            width: 16,
            height: 16,
            ..Default::default()
        })
        .unwrap();
    let checker = texture.create_view(&TextureViewDescriptor::default()).unwrap();
    let gradient = texture.create_view(&TextureViewDescriptor::default()).unwrap();

    let group = device
        .create_bind_group(
            &layout,
            &BindGroupDescriptor {
                label: None,
                entries: vec![
                    BindGroupEntry {
                        binding: 0,
                        resource: BindingResource::TextureView(checker),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: BindingResource::TextureView(gradient),
                    },
                ],
            },
        )
        .unwrap();

    ctx.clear_calls();
    group.apply_bindings(&pipeline, &[]);
    assert!(ctx.has_call("active_texture(0)"));
    assert!(ctx.has_call("active_texture(1)"));
    assert_eq!(ctx.count_calls("uniform_1i"), 2);
}

#[test]
fn gl1_samplers_parameterize_the_bound_texture() {
    let (ctx, device) = gl1_device();
    let vs = device
        .create_shader_module(&ShaderModuleDescriptor {
            label: None,
            source: TEXTURED_VS.into(),
            stage: ShaderStage::Vertex,
            language: ShaderLanguage::Glsl,
        })
        .unwrap();
    let fs = device
        .create_shader_module(&ShaderModuleDescriptor {
            label: None,
            source: TEXTURED_FS.into(),
            stage: ShaderStage::Fragment,
            language: ShaderLanguage::Glsl,
        })
        .unwrap();
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
            entries: vec![
                texture_entry(0, "u_checker"),
                sampler_entry(1, "u_checker_sampler", Some(0)),
            ],
        })
        .unwrap();
    let texture = device
        .create_texture(&TextureDescriptor {
            width: 16,
            height: 16,
            ..Default::default()
        })
        .unwrap();
    let view = texture.create_view(&TextureViewDescriptor::default()).unwrap();
    let sampler = device.create_sampler(&SamplerDescriptor::default()).unwrap();

    let group = device
        .create_bind_group(
            &layout,
            &BindGroupDescriptor {
                label: None,
                entries: vec![
                    BindGroupEntry {
                        binding: 0,
                        resource: BindingResource::TextureView(view),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: BindingResource::Sampler(sampler),
                    },
                ],
            },
        )
        .unwrap();

    ctx.clear_calls();
    group.apply_bindings(&pipeline, &[]);
    // 1.x path: tex_parameter calls against the bound texture, no native
    // sampler binds
    assert!(ctx.count_calls("tex_parameter_i") >= 4);
    assert_eq!(ctx.count_calls("bind_sampler"), 0);
}
