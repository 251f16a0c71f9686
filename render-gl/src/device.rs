//! The device: root object of the backend.
//!
//! Owns the context, the negotiated capability record and the resource
//! tracker; creates every resource; replays submitted command buffers;
//! drives the context-loss state machine; tears everything down in a fixed
//! order on `destroy()`.

use crate::api::{glenum as gl, GlContext, HeadlessContext};
use crate::buffer::Buffer;
use crate::caps;
use crate::command::{CommandBuffer, CommandEncoder};
use crate::descriptor::{
    BindGroup, BindGroupDescriptor, BindGroupLayout, PipelineLayout, PipelineLayoutDescriptor,
};
use crate::pipeline::{RenderPipeline, RenderPipelineDescriptor};
use crate::query::{QuerySet, QuerySetDescriptor};
use crate::sampler::{self, Sampler};
use crate::shader::{ShaderModule, ShaderModuleDescriptor};
use crate::state::StateCache;
use crate::texture::Texture;
use crate::tracker::{ResourceCategory, ResourceKey, ResourceTracker, Tracked};
use fxhash::FxHashMap;
use log::{debug, error, info, warn};
use prism_render::{
    BackendGeneration, BufferDescriptor, BindGroupLayoutDescriptor, DeviceCapabilities,
    DeviceDescriptor, Error, Features, Result, SamplerDescriptor, TextureDescriptor,
};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeviceState {
    Active,
    Lost,
    Destroyed,
}

/// State shared between the device and every resource it created.
pub(crate) struct DeviceShared {
    gl: Rc<dyn GlContext>,
    caps: RefCell<DeviceCapabilities>,
    state: Cell<DeviceState>,
    tracker: RefCell<ResourceTracker>,
    /// Identical sampler descriptors share one native object (2.x).
    sampler_cache: RefCell<FxHashMap<SamplerDescriptor, u32>>,
    /// (program, uniform name) -> location, so the typed-uniform fallback
    /// does not re-query every draw.
    uniform_locations: RefCell<FxHashMap<(u32, String), i32>>,
}

impl DeviceShared {
    pub(crate) fn gl(&self) -> &dyn GlContext {
        self.gl.as_ref()
    }

    pub(crate) fn generation(&self) -> BackendGeneration {
        self.caps.borrow().generation
    }

    pub(crate) fn features(&self) -> Features {
        self.caps.borrow().features
    }

    pub(crate) fn max_texture_size(&self) -> u32 {
        self.caps.borrow().max_texture_size
    }

    pub(crate) fn max_combined_texture_units(&self) -> u32 {
        self.caps.borrow().max_combined_texture_units
    }

    pub(crate) fn max_vertex_attribs(&self) -> u32 {
        self.caps.borrow().max_vertex_attribs
    }

    pub(crate) fn max_anisotropy(&self) -> u32 {
        self.caps.borrow().max_anisotropy
    }

    pub(crate) fn register(
        &self,
        category: ResourceCategory,
        label: String,
        resource: Weak<dyn Tracked>,
    ) -> ResourceKey {
        self.tracker.borrow_mut().register(category, label, resource)
    }

    pub(crate) fn unregister(&self, key: ResourceKey) {
        self.tracker.borrow_mut().unregister(key);
    }

    /// Dedup-cached native sampler for `desc`. 2.x only.
    pub(crate) fn native_sampler(&self, desc: &SamplerDescriptor) -> u32 {
        if let Some(&raw) = self.sampler_cache.borrow().get(desc) {
            return raw;
        }
        let raw = sampler::create_native_sampler(
            self.gl(),
            self.features(),
            self.max_anisotropy(),
            desc,
        );
        self.sampler_cache.borrow_mut().insert(desc.clone(), raw);
        raw
    }

    pub(crate) fn uniform_location_cached(&self, program: u32, name: &str) -> i32 {
        if let Some(&location) = self
            .uniform_locations
            .borrow()
            .get(&(program, name.to_owned()))
        {
            return location;
        }
        let location = self.gl().uniform_location(program, name);
        self.uniform_locations
            .borrow_mut()
            .insert((program, name.to_owned()), location);
        location
    }
}

type Callback = Box<dyn Fn()>;

#[derive(Default)]
struct DeviceCallbacks {
    context_lost: Option<Callback>,
    context_restored: Option<Callback>,
    destroyed: Option<Callback>,
}

pub struct Device {
    shared: Rc<DeviceShared>,
    descriptor: DeviceDescriptor,
    state_cache: RefCell<StateCache>,
    callbacks: RefCell<DeviceCallbacks>,
}

impl Device {
    /// Build a device over a context the host already acquired.
    pub fn new(gl: Rc<dyn GlContext>, descriptor: &DeviceDescriptor) -> Result<Device> {
        if gl.is_context_lost() {
            return Err(Error::ContextLost);
        }
        let capabilities = caps::negotiate(gl.as_ref());
        info!(
            "device \"{}\" ready: {:?}, \"{}\"",
            descriptor.label.as_deref().unwrap_or("<unnamed device>"),
            capabilities.generation,
            capabilities.device_name
        );
        Ok(Device {
            shared: Rc::new(DeviceShared {
                gl,
                caps: RefCell::new(capabilities),
                state: Cell::new(DeviceState::Active),
                tracker: RefCell::new(ResourceTracker::new()),
                sampler_cache: RefCell::new(FxHashMap::default()),
                uniform_locations: RefCell::new(FxHashMap::default()),
            }),
            descriptor: descriptor.clone(),
            state_cache: RefCell::new(StateCache::new()),
            callbacks: RefCell::new(DeviceCallbacks::default()),
        })
    }

    /// Acquire a context through `provider`, requesting the 2.x generation
    /// first and falling back to 1.x.
    pub fn acquire(
        provider: &dyn Fn(BackendGeneration) -> Option<Rc<dyn GlContext>>,
        descriptor: &DeviceDescriptor,
    ) -> Result<Device> {
        let gl = provider(BackendGeneration::Gl2)
            .or_else(|| {
                debug!("2.x context unavailable, falling back to 1.x");
                provider(BackendGeneration::Gl1)
            })
            .ok_or_else(|| {
                Error::UnsupportedFeature("no graphics context could be acquired".into())
            })?;
        Device::new(gl, descriptor)
    }

    /// Convenience for hosts and tests without a surface.
    pub fn headless(descriptor: &DeviceDescriptor) -> Result<Device> {
        Device::new(Rc::new(HeadlessContext::gl2()), descriptor)
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> DeviceState {
        self.shared.state.get()
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.shared.caps.borrow().clone()
    }

    pub fn generation(&self) -> BackendGeneration {
        self.shared.generation()
    }

    fn ensure_active(&self) -> Result<()> {
        match self.shared.state.get() {
            DeviceState::Active => Ok(()),
            DeviceState::Lost => Err(Error::ContextLost),
            DeviceState::Destroyed => {
                Err(Error::Lifecycle("device was destroyed".into()))
            }
        }
    }

    // resource creation ---------------------------------------------------

    pub fn create_buffer(&self, desc: &BufferDescriptor) -> Result<Rc<Buffer>> {
        self.ensure_active()?;
        Buffer::new(self.shared.clone(), desc, None)
    }

    pub fn create_buffer_with_data(
        &self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> Result<Rc<Buffer>> {
        self.ensure_active()?;
        Buffer::new(self.shared.clone(), desc, Some(data))
    }

    pub fn create_texture(&self, desc: &TextureDescriptor) -> Result<Rc<Texture>> {
        self.ensure_active()?;
        Texture::new(self.shared.clone(), desc)
    }

    pub fn create_sampler(&self, desc: &SamplerDescriptor) -> Result<Rc<Sampler>> {
        self.ensure_active()?;
        Sampler::new(self.shared.clone(), desc)
    }

    pub fn create_shader_module(&self, desc: &ShaderModuleDescriptor) -> Result<Rc<ShaderModule>> {
        self.ensure_active()?;
        ShaderModule::new(self.shared.clone(), desc)
    }

    pub fn create_bind_group_layout(
        &self,
        desc: &BindGroupLayoutDescriptor,
    ) -> Result<Rc<BindGroupLayout>> {
        self.ensure_active()?;
        BindGroupLayout::new(self.shared.clone(), desc)
    }

    pub fn create_bind_group(
        &self,
        layout: &Rc<BindGroupLayout>,
        desc: &BindGroupDescriptor,
    ) -> Result<Rc<BindGroup>> {
        self.ensure_active()?;
        BindGroup::new(self.shared.clone(), layout, desc)
    }

    pub fn create_pipeline_layout(
        &self,
        desc: &PipelineLayoutDescriptor,
    ) -> Result<Rc<PipelineLayout>> {
        self.ensure_active()?;
        PipelineLayout::new(self.shared.clone(), desc)
    }

    pub fn create_render_pipeline(
        &self,
        desc: &RenderPipelineDescriptor,
    ) -> Result<Rc<RenderPipeline>> {
        self.ensure_active()?;
        RenderPipeline::new(self.shared.clone(), desc)
    }

    /// The backend has no compute stage.
    pub fn create_compute_pipeline(&self) -> Result<()> {
        Err(Error::UnsupportedFeature(
            "compute pipelines are unavailable on this backend".into(),
        ))
    }

    pub fn create_query_set(&self, desc: &QuerySetDescriptor) -> Result<Rc<QuerySet>> {
        self.ensure_active()?;
        if !self.shared.features().contains(Features::OCCLUSION_QUERY) {
            return Err(Error::UnsupportedFeature(
                "occlusion queries are unavailable on the 1.x backend".into(),
            ));
        }
        QuerySet::new(self.shared.clone(), desc)
    }

    pub fn create_command_encoder(&self, label: Option<&str>) -> Result<Rc<CommandEncoder>> {
        self.ensure_active()?;
        Ok(CommandEncoder::new(self.shared.clone(), label))
    }

    // submission ----------------------------------------------------------

    /// Replay `buffers` in order. Per-buffer failures are logged; the batch
    /// always runs to completion and the previously bound framebuffer is
    /// restored afterwards.
    pub fn submit(&self, buffers: &[CommandBuffer]) {
        if self.shared.state.get() != DeviceState::Active {
            warn!("submit on a non-active device ignored");
            return;
        }
        let gl_ctx = self.shared.gl();
        let saved_framebuffer = gl_ctx.get_integer(gl::FRAMEBUFFER_BINDING) as u32;

        let mut cache = self.state_cache.borrow_mut();
        // teardown between submissions may have unbound objects silently
        cache.invalidate();
        for buffer in buffers {
            buffer.execute(&self.shared, &mut cache);
            let status = gl_ctx.check_framebuffer_status(gl::FRAMEBUFFER);
            if status != gl::FRAMEBUFFER_COMPLETE && status != 0 {
                error!(
                    "\"{}\": framebuffer incomplete after replay ({status:#x})",
                    buffer.label()
                );
            }
            let gl_error = gl_ctx.get_error();
            if gl_error != gl::NO_ERROR {
                error!("\"{}\": backend error {gl_error:#x} after replay", buffer.label());
            }
        }
        cache.bind_framebuffer(gl_ctx, saved_framebuffer);
    }

    // context loss --------------------------------------------------------

    pub fn set_on_context_lost(&self, callback: impl Fn() + 'static) {
        self.callbacks.borrow_mut().context_lost = Some(Box::new(callback));
    }

    pub fn set_on_context_restored(&self, callback: impl Fn() + 'static) {
        self.callbacks.borrow_mut().context_restored = Some(Box::new(callback));
    }

    pub fn set_on_destroyed(&self, callback: impl Fn() + 'static) {
        self.callbacks.borrow_mut().destroyed = Some(Box::new(callback));
    }

    /// Entry point for the host's context-lost event. All live resources
    /// become invalid; the application recreates them after restore.
    pub fn handle_context_lost(&self) {
        if self.shared.state.get() != DeviceState::Active {
            return;
        }
        warn!("rendering context lost");
        self.shared.state.set(DeviceState::Lost);
        if let Some(callback) = &self.callbacks.borrow().context_lost {
            callback();
        }
    }

    /// Entry point for the host's context-restored event. Rebuilds the
    /// capability record and clears the tracker: every previously created
    /// resource holds a stale handle.
    pub fn handle_context_restored(&self) {
        if self.shared.state.get() != DeviceState::Lost {
            return;
        }
        info!("rendering context restored, renegotiating capabilities");
        let capabilities = caps::negotiate(self.shared.gl());
        *self.shared.caps.borrow_mut() = capabilities;
        self.shared.tracker.borrow_mut().invalidate_all();
        self.shared.sampler_cache.borrow_mut().clear();
        self.shared.uniform_locations.borrow_mut().clear();
        self.state_cache.borrow_mut().invalidate();
        self.shared.state.set(DeviceState::Active);
        if let Some(callback) = &self.callbacks.borrow().context_restored {
            callback();
        }
    }

    // introspection (used by hosts and the test suite) --------------------

    pub fn live_resource_count(&self) -> usize {
        self.shared.tracker.borrow().live_count()
    }

    pub fn live_resource_count_of(&self, category: ResourceCategory) -> usize {
        self.shared.tracker.borrow().live_count_of(category)
    }

    pub fn leak_report(&self) -> Vec<(ResourceCategory, usize, Vec<String>)> {
        self.shared.tracker.borrow().leak_report()
    }

    pub fn is_tracker_empty(&self) -> bool {
        self.shared.tracker.borrow().is_empty()
    }

    // teardown ------------------------------------------------------------

    /// Report leaks, sweep every live resource in teardown order, release
    /// the context. Idempotent.
    pub fn destroy(&self) {
        if self.shared.state.get() == DeviceState::Destroyed {
            return;
        }
        self.shared.tracker.borrow().log_leaks();

        let resources = self.shared.tracker.borrow_mut().drain_in_teardown_order();
        for resource in &resources {
            resource.destroy_now();
        }
        drop(resources);

        let gl_ctx = self.shared.gl();
        let samplers: Vec<u32> = self.shared.sampler_cache.borrow_mut().drain().map(|(_, s)| s).collect();
        for raw in samplers {
            if raw != 0 {
                gl_ctx.delete_sampler(raw);
            }
        }
        self.shared.uniform_locations.borrow_mut().clear();

        // hand the backend its resources back
        gl_ctx.lose_context();
        self.shared.state.set(DeviceState::Destroyed);
        debug!("device destroyed");
        if let Some(callback) = &self.callbacks.borrow().destroyed {
            callback();
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("state", &self.state())
            .field("generation", &self.shared.generation())
            .finish()
    }
}
