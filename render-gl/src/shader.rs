//! Shader module resource.
//!
//! Compiles a single GLSL-ES stage and keeps a lightweight scan of the
//! source: declared attribute and uniform names, the `#version` directive,
//! and a rejection check for WGSL input. The scan backs diagnostics when a
//! reflection lookup later misses a name the source clearly declares.

use crate::api::{glenum as gl, GlContext};
use crate::device::DeviceShared;
use crate::tracker::{ResourceCategory, ResourceKey, Tracked};
use lazy_static::lazy_static;
use log::warn;
use prism_render::{Error, Result, ShaderLanguage, ShaderStage};
use regex::Regex;
use std::cell::Cell;
use std::rc::Rc;

lazy_static! {
    static ref RE_VERSION: Regex = Regex::new(r"(?m)^\s*#version\s+(?P<version>\d+)").unwrap();
    static ref RE_ATTRIBUTE: Regex =
        Regex::new(r"(?m)^\s*(?:attribute|in)\s+\w+\s+(?P<name>\w+)\s*;").unwrap();
    static ref RE_UNIFORM: Regex =
        Regex::new(r"(?m)^\s*uniform\s+(?P<ty>\w+)\s+(?P<name>\w+)\s*(?:\[\d+\])?\s*;").unwrap();
    static ref RE_BLOCK: Regex =
        Regex::new(r"(?m)^\s*(?:layout\s*\([^)]*\)\s*)?uniform\s+(?P<name>\w+)\s*\{").unwrap();
    static ref RE_WGSL: Regex =
        Regex::new(r"@(?:vertex|fragment|compute)\b|\bfn\s+\w+\s*\([^)]*\)\s*->").unwrap();
}

/// What a source scan found. Purely informational; the linked program is
/// the authority.
#[derive(Clone, Debug, Default)]
pub struct SourceScan {
    pub version: Option<u32>,
    pub attributes: Vec<String>,
    pub uniforms: Vec<String>,
    pub uniform_blocks: Vec<String>,
}

pub(crate) fn scan_source(source: &str) -> SourceScan {
    let version = RE_VERSION
        .captures(source)
        .and_then(|c| c.name("version"))
        .and_then(|m| m.as_str().parse().ok());
    let attributes = RE_ATTRIBUTE
        .captures_iter(source)
        .map(|c| c["name"].to_owned())
        .collect();
    let uniforms = RE_UNIFORM
        .captures_iter(source)
        .map(|c| c["name"].to_owned())
        .collect();
    let uniform_blocks = RE_BLOCK
        .captures_iter(source)
        .map(|c| c["name"].to_owned())
        .collect();
    SourceScan {
        version,
        attributes,
        uniforms,
        uniform_blocks,
    }
}

pub(crate) fn looks_like_wgsl(source: &str) -> bool {
    RE_WGSL.is_match(source)
}

#[derive(Clone, Debug)]
pub struct ShaderModuleDescriptor {
    pub label: Option<String>,
    pub source: String,
    pub stage: ShaderStage,
    pub language: ShaderLanguage,
}

pub struct ShaderModule {
    device: Rc<DeviceShared>,
    raw: Cell<u32>,
    stage: ShaderStage,
    scan: SourceScan,
    label: String,
    key: Cell<Option<ResourceKey>>,
}

fn stage_to_gl(stage: ShaderStage) -> Result<u32> {
    match stage {
        ShaderStage::Vertex => Ok(gl::VERTEX_SHADER),
        ShaderStage::Fragment => Ok(gl::FRAGMENT_SHADER),
        ShaderStage::Compute => Err(Error::UnsupportedFeature(
            "compute shaders are unavailable on this backend".into(),
        )),
    }
}

impl ShaderModule {
    pub(crate) fn new(
        device: Rc<DeviceShared>,
        desc: &ShaderModuleDescriptor,
    ) -> Result<Rc<ShaderModule>> {
        let label = desc
            .label
            .as_deref()
            .unwrap_or("<unnamed shader module>")
            .to_owned();

        if desc.language == ShaderLanguage::Wgsl {
            return Err(Error::UnsupportedLanguage(format!(
                "{label}: WGSL input cannot be consumed by this backend"
            )));
        }
        if looks_like_wgsl(&desc.source) {
            return Err(Error::UnsupportedLanguage(format!(
                "{label}: source is tagged GLSL but reads as WGSL"
            )));
        }

        let gl_stage = stage_to_gl(desc.stage)?;
        let gl_ctx = device.gl();
        let raw = gl_ctx.create_shader(gl_stage);
        if raw == 0 {
            return Err(Error::ContextLost);
        }
        gl_ctx.shader_source(raw, &desc.source);
        gl_ctx.compile_shader(raw);
        if !gl_ctx.shader_compile_status(raw) {
            let log = gl_ctx.shader_info_log(raw);
            gl_ctx.delete_shader(raw);
            return Err(Error::Compile { log });
        }

        let scan = scan_source(&desc.source);
        let module = Rc::new(ShaderModule {
            device: device.clone(),
            raw: Cell::new(raw),
            stage: desc.stage,
            scan,
            label: label.clone(),
            key: Cell::new(None),
        });
        let key = device.register(
            ResourceCategory::ShaderModule,
            label,
            Rc::downgrade(&module) as _,
        );
        module.key.set(Some(key));
        Ok(module)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Declarations found by the source scan.
    pub fn scan(&self) -> &SourceScan {
        &self.scan
    }

    pub(crate) fn raw(&self) -> u32 {
        self.raw.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.raw.get() == 0
    }

    /// Warn when a name the source declares failed to reflect from the
    /// linked program. Drivers prune unreferenced declarations; anything
    /// else deserves a look.
    pub(crate) fn note_reflection_miss(&self, name: &str) {
        if self.scan.uniforms.iter().any(|u| u == name)
            || self.scan.attributes.iter().any(|a| a == name)
        {
            warn!(
                "\"{}\" declares \"{name}\" but the linked program does not expose it \
                 (likely pruned as unused)",
                self.label
            );
        }
    }

    pub fn destroy(&self) {
        if let Some(key) = self.key.take() {
            self.device.unregister(key);
        }
        let raw = self.raw.replace(0);
        if raw != 0 {
            self.device.gl().delete_shader(raw);
        }
    }
}

impl Tracked for ShaderModule {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn destroy_now(&self) {
        self.destroy();
    }

    fn invalidate(&self) {
        self.key.take();
        self.raw.set(0);
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for ShaderModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderModule")
            .field("label", &self.label)
            .field("stage", &self.stage)
            .finish()
    }
}
