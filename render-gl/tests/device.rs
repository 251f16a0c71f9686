//! Device lifecycle: tracker accounting, context loss and restore, leak
//! reporting, terminal teardown.

mod common;

use common::{gl1_device, gl2_device};
use prism_render::{BufferDescriptor, BufferUsage, Error, TextureDescriptor};
use prism_render_gl::api::GlContext;
use prism_render_gl::{DeviceState, ResourceCategory};
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn tracker_counts_creates_minus_destroys() {
    let (_ctx, device) = gl2_device();

    let buffers: Vec<_> = (0..4)
        .map(|i| {
            device
                .create_buffer(&BufferDescriptor {
                    label: Some(format!("buf-{i}")),
                    size: 64,
                    usage: BufferUsage::VERTEX,
                    ..Default::default()
                })
                .unwrap()
        })
        .collect();
    let texture = device.create_texture(&TextureDescriptor::default()).unwrap();

    assert_eq!(device.live_resource_count(), 5);
    assert_eq!(
        device.live_resource_count_of(ResourceCategory::Buffer),
        4
    );
    assert_eq!(
        device.live_resource_count_of(ResourceCategory::Texture),
        1
    );

    buffers[0].destroy();
    buffers[1].destroy();
    texture.destroy();
    assert_eq!(device.live_resource_count(), 2);
    assert_eq!(
        device.live_resource_count_of(ResourceCategory::Buffer),
        2
    );
    assert_eq!(
        device.live_resource_count_of(ResourceCategory::Texture),
        0
    );
}

#[test]
fn dropping_a_resource_unregisters_it() {
    let (_ctx, device) = gl2_device();
    {
        let _buffer = device
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 16,
                usage: BufferUsage::UNIFORM,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(device.live_resource_count(), 1);
    }
    assert_eq!(device.live_resource_count(), 0);
}

#[test]
fn context_loss_and_restore_cycle() {
    let (ctx, device) = gl2_device();
    let _buffer = device
        .create_buffer(&BufferDescriptor {
            label: None,
            size: 16,
            usage: BufferUsage::VERTEX,
            ..Default::default()
        })
        .unwrap();

    let lost_seen = Rc::new(Cell::new(false));
    let restored_seen = Rc::new(Cell::new(false));
    {
        let flag = lost_seen.clone();
        device.set_on_context_lost(move || flag.set(true));
        let flag = restored_seen.clone();
        device.set_on_context_restored(move || flag.set(true));
    }

    ctx.lose_context();
    device.handle_context_lost();
    assert_eq!(device.state(), DeviceState::Lost);
    assert!(lost_seen.get());

    // creation refuses while lost
    let err = device.create_buffer(&BufferDescriptor {
        label: None,
        size: 16,
        usage: BufferUsage::VERTEX,
        ..Default::default()
    });
    assert!(matches!(err, Err(Error::ContextLost)));

    ctx.restore_context();
    device.handle_context_restored();
    assert_eq!(device.state(), DeviceState::Active);
    assert!(restored_seen.get());
    // all previously registered resources are stale handles now
    assert!(device.is_tracker_empty());
    assert!(_buffer.is_destroyed());
}

#[test]
fn leak_report_partitions_by_category() {
    let (_ctx, device) = gl1_device();
    let buffers: Vec<_> = (0..3)
        .map(|_| {
            device
                .create_buffer(&BufferDescriptor {
                    label: None,
                    size: 32,
                    usage: BufferUsage::VERTEX,
                    ..Default::default()
                })
                .unwrap()
        })
        .collect();
    let _texture = device.create_texture(&TextureDescriptor::default()).unwrap();

    let report = device.leak_report();
    let buffer_leaks = report
        .iter()
        .find(|(category, ..)| *category == ResourceCategory::Buffer)
        .expect("buffer leaks reported");
    assert_eq!(buffer_leaks.1, 3);
    let texture_leaks = report
        .iter()
        .find(|(category, ..)| *category == ResourceCategory::Texture)
        .expect("texture leaks reported");
    assert_eq!(texture_leaks.1, 1);

    // the terminal sweep destroys everything that leaked
    device.destroy();
    assert_eq!(device.state(), DeviceState::Destroyed);
    assert!(buffers.iter().all(|b| b.is_destroyed()));
    assert!(_texture.is_destroyed());
}

#[test]
fn destroy_is_idempotent_and_releases_the_context() {
    let (ctx, device) = gl2_device();
    device.destroy();
    assert!(ctx.has_call("lose_context()"));
    assert_eq!(device.state(), DeviceState::Destroyed);
    device.destroy();
    assert_eq!(device.state(), DeviceState::Destroyed);

    let destroyed_seen = Rc::new(Cell::new(0u32));
    let flag = destroyed_seen.clone();
    device.set_on_destroyed(move || flag.set(flag.get() + 1));
    device.destroy();
    assert_eq!(destroyed_seen.get(), 0, "no callback after the fact");
}

#[test]
fn creation_fails_on_destroyed_device() {
    let (_ctx, device) = gl2_device();
    device.destroy();
    let err = device.create_buffer(&BufferDescriptor {
        label: None,
        size: 16,
        usage: BufferUsage::VERTEX,
        ..Default::default()
    });
    assert!(matches!(err, Err(Error::Lifecycle(_))));
}

#[test]
fn acquisition_prefers_the_2x_generation() {
    common::init_logging();
    use prism_render::{BackendGeneration, DeviceDescriptor};
    use prism_render_gl::api::HeadlessContext;
    use prism_render_gl::Device;

    let provider = |generation: BackendGeneration| -> Option<Rc<dyn GlContext>> {
        Some(match generation {
            BackendGeneration::Gl2 => Rc::new(HeadlessContext::gl2()) as Rc<dyn GlContext>,
            BackendGeneration::Gl1 => Rc::new(HeadlessContext::gl1()) as Rc<dyn GlContext>,
        })
    };
    let device = Device::acquire(&provider, &DeviceDescriptor::default()).unwrap();
    assert_eq!(device.generation(), BackendGeneration::Gl2);

    // a host that can only produce the legacy generation
    let legacy_only = |generation: BackendGeneration| -> Option<Rc<dyn GlContext>> {
        match generation {
            BackendGeneration::Gl2 => None,
            BackendGeneration::Gl1 => Some(Rc::new(HeadlessContext::gl1()) as Rc<dyn GlContext>),
        }
    };
    let device = Device::acquire(&legacy_only, &DeviceDescriptor::default()).unwrap();
    assert_eq!(device.generation(), BackendGeneration::Gl1);

    let none = |_: BackendGeneration| -> Option<Rc<dyn GlContext>> { None };
    assert!(matches!(
        Device::acquire(&none, &DeviceDescriptor::default()),
        Err(Error::UnsupportedFeature(_))
    ));
}

#[test]
fn compute_pipelines_are_rejected() {
    let (_ctx, device) = gl2_device();
    assert!(matches!(
        device.create_compute_pipeline(),
        Err(Error::UnsupportedFeature(_))
    ));
}

#[test]
fn query_sets_require_the_2x_generation() {
    let (_ctx, device) = gl1_device();
    let err = device.create_query_set(&prism_render_gl::QuerySetDescriptor {
        label: None,
        kind: prism_render_gl::QueryKind::Occlusion,
        count: 4,
    });
    assert!(matches!(err, Err(Error::UnsupportedFeature(_))));

    let (_ctx, device) = gl2_device();
    let set = device
        .create_query_set(&prism_render_gl::QuerySetDescriptor {
            label: None,
            kind: prism_render_gl::QueryKind::Occlusion,
            count: 4,
        })
        .unwrap();
    assert_eq!(set.count(), 4);
}
