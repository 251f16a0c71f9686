//! Bind group layouts, bind groups and pipeline layouts.
//!
//! The layout compiles a declarative resource set into concrete texture-unit
//! assignments and sampler-texture associations. The bind group validates
//! its resources against the layout at construction and knows how to apply
//! itself to a linked program: through uniform block bindings where the
//! backend has them, through typed uniform calls where it does not.

use crate::api::glenum as gl;
use crate::buffer::Buffer;
use crate::device::DeviceShared;
use crate::sampler::Sampler;
use crate::texture::TextureView;
use crate::tracker::{ResourceCategory, ResourceKey, Tracked};
use fxhash::FxHashMap;
use log::warn;
use prism_render::{
    BackendGeneration, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResourceKind,
    BufferBindingKind, BufferTypeInfo, Error, Features, Result, UniformType,
};
use std::cell::Cell;
use std::rc::Rc;

pub struct BindGroupLayout {
    device: Rc<DeviceShared>,
    label: String,
    entries: Vec<BindGroupLayoutEntry>,
    /// binding index -> texture unit, assigned in declaration order from 0.
    texture_units: FxHashMap<u32, u32>,
    /// sampler binding -> associated texture binding.
    sampler_textures: FxHashMap<u32, u32>,
    destroyed: Cell<bool>,
    key: Cell<Option<ResourceKey>>,
}

impl BindGroupLayout {
    pub(crate) fn new(
        device: Rc<DeviceShared>,
        desc: &BindGroupLayoutDescriptor,
    ) -> Result<Rc<BindGroupLayout>> {
        desc.validate()?;
        let label = desc.label_or_unnamed().to_owned();

        // deterministic texture unit assignment in declaration order
        let max_units = device.max_combined_texture_units();
        let mut texture_units = FxHashMap::default();
        let mut next_unit = 0u32;
        for entry in &desc.entries {
            if matches!(
                entry.resource,
                BindingResourceKind::Texture { .. } | BindingResourceKind::StorageTexture { .. }
            ) {
                if next_unit >= max_units {
                    warn!(
                        "{label}: texture units exhausted ({max_units} available) at binding {}",
                        entry.binding
                    );
                }
                texture_units.insert(entry.binding, next_unit);
                next_unit += 1;
            }
        }

        // sampler-texture association: explicit declaration, else the
        // nearest preceding texture entry
        let mut sampler_textures = FxHashMap::default();
        let mut heuristic_used = false;
        for (index, entry) in desc.entries.iter().enumerate() {
            if !matches!(entry.resource, BindingResourceKind::Sampler { .. }) {
                continue;
            }
            if let Some(texture_binding) = entry.associated_texture {
                if !texture_units.contains_key(&texture_binding) {
                    return Err(Error::Configuration(format!(
                        "{label}: sampler binding {} references binding {} which is not a texture",
                        entry.binding, texture_binding
                    )));
                }
                sampler_textures.insert(entry.binding, texture_binding);
            } else {
                let preceding = desc.entries[..index]
                    .iter()
                    .rev()
                    .find(|e| matches!(e.resource, BindingResourceKind::Texture { .. }));
                if let Some(texture) = preceding {
                    heuristic_used = true;
                    sampler_textures.insert(entry.binding, texture.binding);
                }
            }
        }
        if heuristic_used {
            warn!(
                "{label}: sampler entries rely on the preceding-texture heuristic; \
                 declare associated_texture explicitly"
            );
        }

        let layout = Rc::new(BindGroupLayout {
            device: device.clone(),
            label: label.clone(),
            entries: desc.entries.clone(),
            texture_units,
            sampler_textures,
            destroyed: Cell::new(false),
            key: Cell::new(None),
        });
        let key = device.register(
            ResourceCategory::BindGroupLayout,
            label,
            Rc::downgrade(&layout) as _,
        );
        layout.key.set(Some(key));
        Ok(layout)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The declared entries, without internal annotations.
    pub fn entries(&self) -> &[BindGroupLayoutEntry] {
        &self.entries
    }

    /// Full entry record for the bind group applier.
    pub fn detailed_entry(&self, binding: u32) -> Option<&BindGroupLayoutEntry> {
        self.entries.iter().find(|e| e.binding == binding)
    }

    pub fn texture_unit(&self, binding: u32) -> Option<u32> {
        self.texture_units.get(&binding).copied()
    }

    pub fn associated_texture_binding(&self, sampler_binding: u32) -> Option<u32> {
        self.sampler_textures.get(&sampler_binding).copied()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn destroy(&self) {
        if let Some(key) = self.key.take() {
            self.device.unregister(key);
        }
        self.destroyed.set(true);
    }
}

impl Tracked for BindGroupLayout {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn destroy_now(&self) {
        self.destroy();
    }

    fn invalidate(&self) {
        self.key.take();
        self.destroyed.set(true);
    }
}

impl Drop for BindGroupLayout {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for BindGroupLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindGroupLayout")
            .field("label", &self.label)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// A concrete resource bound at one binding index.
#[derive(Clone)]
pub enum BindingResource {
    Buffer(Rc<Buffer>),
    BufferRange {
        buffer: Rc<Buffer>,
        offset: usize,
        size: usize,
    },
    TextureView(Rc<TextureView>),
    Sampler(Rc<Sampler>),
}

impl BindingResource {
    fn kind_name(&self) -> &'static str {
        match self {
            BindingResource::Buffer(_) | BindingResource::BufferRange { .. } => "buffer",
            BindingResource::TextureView(_) => "texture view",
            BindingResource::Sampler(_) => "sampler",
        }
    }

    /// Does the runtime kind satisfy the layout predicate?
    fn matches(&self, declared: &BindingResourceKind) -> bool {
        match declared {
            BindingResourceKind::Buffer { .. } => matches!(
                self,
                BindingResource::Buffer(_) | BindingResource::BufferRange { .. }
            ),
            BindingResourceKind::Texture { .. } | BindingResourceKind::StorageTexture { .. } => {
                matches!(self, BindingResource::TextureView(_))
            }
            BindingResourceKind::Sampler { .. } => matches!(self, BindingResource::Sampler(_)),
        }
    }
}

#[derive(Clone)]
pub struct BindGroupEntry {
    pub binding: u32,
    pub resource: BindingResource,
}

#[derive(Clone, Default)]
pub struct BindGroupDescriptor {
    pub label: Option<String>,
    pub entries: Vec<BindGroupEntry>,
}

pub struct BindGroup {
    device: Rc<DeviceShared>,
    label: String,
    layout: Rc<BindGroupLayout>,
    entries: Vec<BindGroupEntry>,
    inference_warned: Cell<bool>,
    destroyed: Cell<bool>,
    key: Cell<Option<ResourceKey>>,
}

impl BindGroup {
    pub(crate) fn new(
        device: Rc<DeviceShared>,
        layout: &Rc<BindGroupLayout>,
        desc: &BindGroupDescriptor,
    ) -> Result<Rc<BindGroup>> {
        let label = desc
            .label
            .as_deref()
            .unwrap_or("<unnamed bind group>")
            .to_owned();

        for entry in &desc.entries {
            let Some(declared) = layout.detailed_entry(entry.binding) else {
                return Err(Error::Configuration(format!(
                    "{label}: binding {} is not declared by layout \"{}\"",
                    entry.binding,
                    layout.label()
                )));
            };
            if !entry.resource.matches(&declared.resource) {
                return Err(Error::Configuration(format!(
                    "{label}: binding {} expects a {} but got a {}",
                    entry.binding,
                    declared.resource.kind_name(),
                    entry.resource.kind_name()
                )));
            }
            if matches!(declared.resource, BindingResourceKind::StorageTexture { .. }) {
                warn!(
                    "{label}: binding {} is a storage texture, which this backend cannot write; \
                     it will be ignored at bind time",
                    entry.binding
                );
            }
        }

        let group = Rc::new(BindGroup {
            device: device.clone(),
            label: label.clone(),
            layout: layout.clone(),
            entries: desc.entries.clone(),
            inference_warned: Cell::new(false),
            destroyed: Cell::new(false),
            key: Cell::new(None),
        });
        let key = device.register(
            ResourceCategory::BindGroup,
            label,
            Rc::downgrade(&group) as _,
        );
        group.key.set(Some(key));
        Ok(group)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn layout(&self) -> &Rc<BindGroupLayout> {
        &self.layout
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    fn entry(&self, binding: u32) -> Option<&BindGroupEntry> {
        self.entries.iter().find(|e| e.binding == binding)
    }

    /// Apply every binding to the pipeline's linked program.
    ///
    /// Dynamic offsets are consumed in declaration order by the layout
    /// entries that declared `has_dynamic_offset`.
    pub fn apply_bindings(&self, pipeline: &crate::pipeline::RenderPipeline, dynamic_offsets: &[u32]) {
        if self.destroyed.get() {
            warn!("apply of destroyed bind group \"{}\" ignored", self.label);
            return;
        }
        let program = pipeline.program();

        let mut dynamic = dynamic_offsets.iter().copied();

        // textures and buffers first: the 1.x sampler path parameterizes
        // whatever texture is bound on the associated unit
        for entry in &self.entries {
            let Some(declared) = self.layout.detailed_entry(entry.binding) else {
                continue;
            };
            match (&entry.resource, &declared.resource) {
                (_, BindingResourceKind::Sampler { .. }) => {}
                (
                    BindingResource::TextureView(_),
                    BindingResourceKind::StorageTexture { .. },
                ) => {
                    warn!(
                        "{}: storage texture at binding {} ignored (unsupported)",
                        self.label, entry.binding
                    );
                }
                (BindingResource::TextureView(view), _) => {
                    self.apply_texture(program, declared, view);
                }
                (BindingResource::Buffer(buffer), BindingResourceKind::Buffer { kind, has_dynamic_offset, .. }) => {
                    let offset = if *has_dynamic_offset {
                        dynamic.next().unwrap_or(0) as usize
                    } else {
                        0
                    };
                    self.apply_buffer(program, declared, *kind, buffer, offset, None);
                }
                (
                    BindingResource::BufferRange { buffer, offset, size },
                    BindingResourceKind::Buffer { kind, has_dynamic_offset, .. },
                ) => {
                    let extra = if *has_dynamic_offset {
                        dynamic.next().unwrap_or(0) as usize
                    } else {
                        0
                    };
                    self.apply_buffer(program, declared, *kind, buffer, offset + extra, Some(*size));
                }
                _ => {}
            }
        }

        for entry in &self.entries {
            let Some(declared) = self.layout.detailed_entry(entry.binding) else {
                continue;
            };
            if let (BindingResource::Sampler(sampler), BindingResourceKind::Sampler { .. }) =
                (&entry.resource, &declared.resource)
            {
                self.apply_sampler(entry.binding, sampler);
            }
        }
    }

    fn apply_texture(&self, program: u32, declared: &BindGroupLayoutEntry, view: &Rc<TextureView>) {
        if let Some(reason) = view.sampling_error() {
            warn!("{}: {reason}", self.label);
            return;
        }
        let Some(unit) = self.layout.texture_unit(declared.binding) else {
            warn!(
                "{}: no texture unit assigned for binding {}",
                self.label, declared.binding
            );
            return;
        };
        let gl_ctx = self.device.gl();
        gl_ctx.active_texture(unit);
        gl_ctx.bind_texture(view.bind_target(), view.raw());
        let location = self.device.uniform_location_cached(program, &declared.name);
        if location >= 0 {
            gl_ctx.uniform_1i(location, unit as i32);
        } else {
            warn!(
                "{}: sampler uniform \"{}\" not found in program",
                self.label, declared.name
            );
        }
    }

    fn apply_sampler(&self, binding: u32, sampler: &Rc<Sampler>) {
        let Some(texture_binding) = self.layout.associated_texture_binding(binding) else {
            warn!(
                "{}: sampler at binding {binding} has no associated texture",
                self.label
            );
            return;
        };
        let Some(unit) = self.layout.texture_unit(texture_binding) else {
            warn!(
                "{}: sampler at binding {binding} references binding {texture_binding} \
                 with no texture unit",
                self.label
            );
            return;
        };
        match self.device.generation() {
            BackendGeneration::Gl2 => sampler.bind(unit),
            BackendGeneration::Gl1 => {
                // parameterize the texture bound on the associated unit
                let Some(BindingResource::TextureView(view)) =
                    self.entry(texture_binding).map(|e| &e.resource)
                else {
                    warn!(
                        "{}: sampler at binding {binding} has no texture bound at binding \
                         {texture_binding}",
                        self.label
                    );
                    return;
                };
                self.device.gl().active_texture(unit);
                sampler.apply_to_texture(view.bind_target());
            }
        }
    }

    fn apply_buffer(
        &self,
        program: u32,
        declared: &BindGroupLayoutEntry,
        kind: BufferBindingKind,
        buffer: &Rc<Buffer>,
        offset: usize,
        size: Option<usize>,
    ) {
        if buffer.is_destroyed() {
            warn!(
                "{}: binding {} references destroyed buffer \"{}\"",
                self.label,
                declared.binding,
                buffer.label()
            );
            return;
        }
        if kind != BufferBindingKind::Uniform {
            warn!(
                "{}: storage buffer at binding {} is unsupported on this backend",
                self.label, declared.binding
            );
            return;
        }

        let gl_ctx = self.device.gl();
        let ubo_capable = self.device.generation() == BackendGeneration::Gl2
            && self.device.features().contains(Features::UNIFORM_BUFFER);

        if ubo_capable {
            let block_index = gl_ctx.uniform_block_index(program, &declared.name);
            if block_index != gl::INVALID_INDEX {
                gl_ctx.uniform_block_binding(program, block_index, declared.binding);
                match (offset, size) {
                    (0, None) => {
                        gl_ctx.bind_buffer_base(gl::UNIFORM_BUFFER, declared.binding, buffer.raw());
                    }
                    (offset, size) => {
                        let size = size.unwrap_or_else(|| buffer.size().saturating_sub(offset));
                        gl_ctx.bind_buffer_range(
                            gl::UNIFORM_BUFFER,
                            declared.binding,
                            buffer.raw(),
                            offset,
                            size,
                        );
                    }
                }
                return;
            }
        }

        // typed-uniform fallback
        let Some(bytes) = buffer.uniform_bytes() else {
            warn!(
                "{}: no readable contents for buffer \"{}\"",
                self.label,
                buffer.label()
            );
            return;
        };
        let end = size.map(|s| offset + s).unwrap_or(bytes.len()).min(bytes.len());
        let bytes = &bytes[offset.min(end)..end];

        match buffer.type_info() {
            Some(BufferTypeInfo::Single { uniform_name, ty }) => {
                let location = self.device.uniform_location_cached(program, &uniform_name);
                if location < 0 {
                    warn!(
                        "{}: uniform \"{uniform_name}\" not found in program for binding {}",
                        self.label, declared.binding
                    );
                    return;
                }
                dispatch_typed_uniform(self.device.as_ref(), location, ty, bytes);
            }
            Some(BufferTypeInfo::Struct { fields }) => {
                for field in &fields {
                    let location = self
                        .device
                        .uniform_location_cached(program, &field.uniform_name);
                    if location < 0 {
                        warn!(
                            "{}: struct field \"{}\" not found in program",
                            self.label, field.uniform_name
                        );
                        continue;
                    }
                    let field_end = field.offset + field.ty.byte_size();
                    if field_end > bytes.len() {
                        warn!(
                            "{}: struct field \"{}\" at {}..{field_end} exceeds the \
                             buffer contents ({} bytes)",
                            self.label,
                            field.uniform_name,
                            field.offset,
                            bytes.len()
                        );
                        continue;
                    }
                    dispatch_typed_uniform(
                        self.device.as_ref(),
                        location,
                        field.ty,
                        &bytes[field.offset..field_end],
                    );
                }
            }
            None => {
                let location = self.device.uniform_location_cached(program, &declared.name);
                if location < 0 {
                    warn!(
                        "{}: uniform \"{}\" not found in program for binding {}",
                        self.label, declared.name, declared.binding
                    );
                    return;
                }
                if UniformType::inference_is_ambiguous(bytes.len())
                    && !self.inference_warned.replace(true)
                {
                    warn!(
                        "{}: inferring a uniform type from {} bytes is ambiguous; \
                         attach type info to buffer \"{}\"",
                        self.label,
                        bytes.len(),
                        buffer.label()
                    );
                }
                match UniformType::infer_from_len(bytes.len()) {
                    Some(ty) => {
                        dispatch_typed_uniform(self.device.as_ref(), location, ty, bytes)
                    }
                    None => {
                        if !self.inference_warned.replace(true) {
                            warn!(
                                "{}: cannot infer a uniform type from {} bytes for \"{}\"; \
                                 attach type info",
                                self.label,
                                bytes.len(),
                                buffer.label()
                            );
                        }
                    }
                }
            }
        }
    }

    pub fn destroy(&self) {
        if let Some(key) = self.key.take() {
            self.device.unregister(key);
        }
        self.destroyed.set(true);
    }
}

fn bytes_to_f32(bytes: &[u8], count: usize) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .take(count)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn bytes_to_i32(bytes: &[u8], count: usize) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .take(count)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn dispatch_typed_uniform(device: &DeviceShared, location: i32, ty: UniformType, bytes: &[u8]) {
    let gl_ctx = device.gl();
    match ty {
        UniformType::F32 => {
            let v = bytes_to_f32(bytes, 1);
            if v.len() == 1 {
                gl_ctx.uniform_1f(location, v[0]);
            }
        }
        UniformType::Vec2 => {
            let v = bytes_to_f32(bytes, 2);
            if v.len() == 2 {
                gl_ctx.uniform_2f(location, [v[0], v[1]]);
            }
        }
        UniformType::Vec3 => {
            let v = bytes_to_f32(bytes, 3);
            if v.len() == 3 {
                gl_ctx.uniform_3f(location, [v[0], v[1], v[2]]);
            }
        }
        UniformType::Vec4 => {
            let v = bytes_to_f32(bytes, 4);
            if v.len() == 4 {
                gl_ctx.uniform_4f(location, [v[0], v[1], v[2], v[3]]);
            }
        }
        UniformType::I32 => {
            let v = bytes_to_i32(bytes, 1);
            if v.len() == 1 {
                gl_ctx.uniform_1i(location, v[0]);
            }
        }
        UniformType::IVec2 => {
            let v = bytes_to_i32(bytes, 2);
            if v.len() == 2 {
                gl_ctx.uniform_2i(location, [v[0], v[1]]);
            }
        }
        UniformType::IVec3 => {
            let v = bytes_to_i32(bytes, 3);
            if v.len() == 3 {
                gl_ctx.uniform_3i(location, [v[0], v[1], v[2]]);
            }
        }
        UniformType::IVec4 => {
            let v = bytes_to_i32(bytes, 4);
            if v.len() == 4 {
                gl_ctx.uniform_4i(location, [v[0], v[1], v[2], v[3]]);
            }
        }
        UniformType::Mat2 => {
            let v = bytes_to_f32(bytes, 4);
            if v.len() == 4 {
                gl_ctx.uniform_matrix_2fv(location, &v);
            }
        }
        UniformType::Mat3 => {
            let v = bytes_to_f32(bytes, 9);
            if v.len() == 9 {
                gl_ctx.uniform_matrix_3fv(location, &v);
            }
        }
        UniformType::Mat4 => {
            let v = bytes_to_f32(bytes, 16);
            if v.len() == 16 {
                gl_ctx.uniform_matrix_4fv(location, &v);
            }
        }
    }
}

impl Tracked for BindGroup {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn destroy_now(&self) {
        self.destroy();
    }

    fn invalidate(&self) {
        self.key.take();
        self.destroyed.set(true);
    }
}

impl Drop for BindGroup {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for BindGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindGroup")
            .field("label", &self.label)
            .field("layout", &self.layout.label())
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// An ordered list of bind group layouts.
pub struct PipelineLayout {
    device: Rc<DeviceShared>,
    label: String,
    layouts: Vec<Rc<BindGroupLayout>>,
    destroyed: Cell<bool>,
    key: Cell<Option<ResourceKey>>,
}

#[derive(Clone, Default)]
pub struct PipelineLayoutDescriptor {
    pub label: Option<String>,
    pub bind_group_layouts: Vec<Rc<BindGroupLayout>>,
}

impl PipelineLayout {
    pub(crate) fn new(
        device: Rc<DeviceShared>,
        desc: &PipelineLayoutDescriptor,
    ) -> Result<Rc<PipelineLayout>> {
        let label = desc
            .label
            .as_deref()
            .unwrap_or("<unnamed pipeline layout>")
            .to_owned();
        let layout = Rc::new(PipelineLayout {
            device: device.clone(),
            label: label.clone(),
            layouts: desc.bind_group_layouts.clone(),
            destroyed: Cell::new(false),
            key: Cell::new(None),
        });
        let key = device.register(
            ResourceCategory::PipelineLayout,
            label,
            Rc::downgrade(&layout) as _,
        );
        layout.key.set(Some(key));
        Ok(layout)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bind_group_layouts(&self) -> &[Rc<BindGroupLayout>] {
        &self.layouts
    }

    pub fn destroy(&self) {
        if let Some(key) = self.key.take() {
            self.device.unregister(key);
        }
        self.destroyed.set(true);
    }
}

impl Tracked for PipelineLayout {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn destroy_now(&self) {
        self.destroy();
    }

    fn invalidate(&self) {
        self.key.take();
        self.destroyed.set(true);
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for PipelineLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineLayout")
            .field("label", &self.label)
            .field("layouts", &self.layouts.len())
            .finish()
    }
}
