//! Sampler resource.
//!
//! On the 2.x generation a sampler owns (a cache slot of) a native sampler
//! object. On 1.x no such object exists; the sampler is a passive parameter
//! block applied to whatever texture is bound when the bind group is
//! applied. Sampler state on 1.x is therefore per-texture and
//! last-writer-wins within a pass.

use crate::api::{glenum as gl, GlContext};
use crate::device::DeviceShared;
use crate::tracker::{ResourceCategory, ResourceKey, Tracked};
use crate::translate;
use log::warn;
use prism_render::{
    BackendGeneration, CompareFunction, Error, Features, Result, SamplerDescriptor,
};
use std::cell::Cell;
use std::rc::Rc;

pub struct Sampler {
    device: Rc<DeviceShared>,
    desc: SamplerDescriptor,
    /// Native sampler object on 2.x, shared through the device cache. 0 on
    /// the 1.x generation.
    raw: Cell<u32>,
    label: String,
    destroyed: Cell<bool>,
    border_warned: Cell<bool>,
    key: Cell<Option<ResourceKey>>,
}

/// Build a native sampler object for `desc`. 2.x only.
pub(crate) fn create_native_sampler(
    gl_ctx: &dyn GlContext,
    features: Features,
    max_anisotropy: u32,
    desc: &SamplerDescriptor,
) -> u32 {
    let raw = gl_ctx.create_sampler();
    if raw == 0 {
        return 0;
    }
    let (wrap_u, _) = translate::address_mode_to_gl(desc.address_mode_u, features);
    let (wrap_v, _) = translate::address_mode_to_gl(desc.address_mode_v, features);
    let (wrap_w, _) = translate::address_mode_to_gl(desc.address_mode_w, features);
    gl_ctx.sampler_parameter_i(raw, gl::TEXTURE_WRAP_S, wrap_u as i32);
    gl_ctx.sampler_parameter_i(raw, gl::TEXTURE_WRAP_T, wrap_v as i32);
    gl_ctx.sampler_parameter_i(raw, gl::TEXTURE_WRAP_R, wrap_w as i32);
    gl_ctx.sampler_parameter_i(
        raw,
        gl::TEXTURE_MIN_FILTER,
        translate::min_filter_to_gl(desc.min_filter, desc.mipmap_filter, desc.use_mipmap) as i32,
    );
    gl_ctx.sampler_parameter_i(
        raw,
        gl::TEXTURE_MAG_FILTER,
        translate::mag_filter_to_gl(desc.mag_filter) as i32,
    );
    gl_ctx.sampler_parameter_f(raw, gl::TEXTURE_MIN_LOD, desc.lod_min_clamp.into_inner());
    gl_ctx.sampler_parameter_f(raw, gl::TEXTURE_MAX_LOD, desc.lod_max_clamp.into_inner());
    if let Some(compare) = desc.compare {
        gl_ctx.sampler_parameter_i(
            raw,
            gl::TEXTURE_COMPARE_MODE,
            gl::COMPARE_REF_TO_TEXTURE as i32,
        );
        gl_ctx.sampler_parameter_i(
            raw,
            gl::TEXTURE_COMPARE_FUNC,
            translate::compare_func_to_gl(compare) as i32,
        );
    }
    if desc.max_anisotropy > 1 && features.contains(Features::ANISOTROPIC_FILTERING) {
        let clamped = (desc.max_anisotropy as u32).min(max_anisotropy.max(1));
        gl_ctx.sampler_parameter_f(raw, gl::TEXTURE_MAX_ANISOTROPY, clamped as f32);
    }
    raw
}

impl Sampler {
    pub(crate) fn new(device: Rc<DeviceShared>, desc: &SamplerDescriptor) -> Result<Rc<Sampler>> {
        if desc.max_anisotropy == 0 {
            return Err(Error::Configuration(
                "sampler max_anisotropy must be at least 1".into(),
            ));
        }

        let raw = match device.generation() {
            BackendGeneration::Gl2 => device.native_sampler(desc),
            BackendGeneration::Gl1 => 0,
        };

        let label = desc
            .label
            .as_deref()
            .unwrap_or("<unnamed sampler>")
            .to_owned();
        let sampler = Rc::new(Sampler {
            device: device.clone(),
            desc: desc.clone(),
            raw: Cell::new(raw),
            label: label.clone(),
            destroyed: Cell::new(false),
            border_warned: Cell::new(false),
            key: Cell::new(None),
        });
        let key = device.register(
            ResourceCategory::Sampler,
            label,
            Rc::downgrade(&sampler) as _,
        );
        sampler.key.set(Some(key));
        Ok(sampler)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn descriptor(&self) -> &SamplerDescriptor {
        &self.desc
    }

    pub fn is_comparison(&self) -> bool {
        self.desc.compare.is_some()
    }

    pub fn compare(&self) -> Option<CompareFunction> {
        self.desc.compare
    }

    pub(crate) fn raw(&self) -> u32 {
        self.raw.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Bind the native sampler object to a texture unit. 2.x path.
    pub(crate) fn bind(&self, unit: u32) {
        if self.destroyed.get() {
            warn!("bind of destroyed sampler \"{}\" ignored", self.label);
            return;
        }
        self.device.gl().bind_sampler(unit, self.raw.get());
    }

    /// Apply the parameter block to the texture currently bound to
    /// `target`. 1.x path.
    pub(crate) fn apply_to_texture(&self, target: u32) {
        if self.destroyed.get() {
            warn!(
                "apply of destroyed sampler \"{}\" to texture ignored",
                self.label
            );
            return;
        }
        let features = self.device.features();
        let gl_ctx = self.device.gl();

        let (wrap_u, deg_u) = translate::address_mode_to_gl(self.desc.address_mode_u, features);
        let (wrap_v, deg_v) = translate::address_mode_to_gl(self.desc.address_mode_v, features);
        if (deg_u || deg_v) && !self.border_warned.replace(true) {
            warn!(
                "sampler \"{}\": border clamp unavailable, degraded to edge clamp",
                self.label
            );
        }
        gl_ctx.tex_parameter_i(target, gl::TEXTURE_WRAP_S, wrap_u as i32);
        gl_ctx.tex_parameter_i(target, gl::TEXTURE_WRAP_T, wrap_v as i32);
        gl_ctx.tex_parameter_i(
            target,
            gl::TEXTURE_MIN_FILTER,
            translate::min_filter_to_gl(
                self.desc.min_filter,
                self.desc.mipmap_filter,
                self.desc.use_mipmap,
            ) as i32,
        );
        gl_ctx.tex_parameter_i(
            target,
            gl::TEXTURE_MAG_FILTER,
            translate::mag_filter_to_gl(self.desc.mag_filter) as i32,
        );
        if self.desc.max_anisotropy > 1 && features.contains(Features::ANISOTROPIC_FILTERING) {
            let clamped = (self.desc.max_anisotropy as u32).min(self.device.max_anisotropy());
            gl_ctx.tex_parameter_f(target, gl::TEXTURE_MAX_ANISOTROPY, clamped as f32);
        }
        if self.device.generation() == BackendGeneration::Gl2 {
            if let Some(compare) = self.desc.compare {
                gl_ctx.tex_parameter_i(
                    target,
                    gl::TEXTURE_COMPARE_MODE,
                    gl::COMPARE_REF_TO_TEXTURE as i32,
                );
                gl_ctx.tex_parameter_i(
                    target,
                    gl::TEXTURE_COMPARE_FUNC,
                    translate::compare_func_to_gl(compare) as i32,
                );
            }
        }
    }

    /// Release the sampler. The native object is cache-owned and survives
    /// until device teardown.
    pub fn destroy(&self) {
        if let Some(key) = self.key.take() {
            self.device.unregister(key);
        }
        self.destroyed.set(true);
    }
}

impl Tracked for Sampler {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn destroy_now(&self) {
        self.destroy();
    }

    fn invalidate(&self) {
        self.key.take();
        self.raw.set(0);
        self.destroyed.set(true);
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("label", &self.label)
            .field("comparison", &self.is_comparison())
            .finish()
    }
}
