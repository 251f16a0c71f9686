//! Buffer resource.

use crate::api::{glenum as gl, GlContext};
use crate::device::DeviceShared;
use crate::tracker::{ResourceCategory, ResourceKey, Tracked};
use log::{error, warn};
use prism_render::{
    BackendGeneration, BufferDescriptor, BufferHint, BufferTypeInfo, BufferUsage, Error, MapMode,
    Result,
};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

struct ActiveMapping {
    mode: MapMode,
    offset: usize,
    data: Rc<RefCell<Vec<u8>>>,
}

/// A CPU-side view over a mapped byte region. The region is written back to
/// the buffer on `unmap()` when the mapping is writable.
pub struct MappedRange {
    mode: MapMode,
    offset: usize,
    data: Rc<RefCell<Vec<u8>>>,
}

impl MappedRange {
    pub fn mode(&self) -> MapMode {
        self.mode
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> Ref<'_, Vec<u8>> {
        self.data.borrow()
    }

    pub fn bytes_mut(&self) -> RefMut<'_, Vec<u8>> {
        self.data.borrow_mut()
    }
}

pub struct Buffer {
    device: Rc<DeviceShared>,
    raw: Cell<u32>,
    size: usize,
    usage: BufferUsage,
    hint: BufferHint,
    target: u32,
    label: String,
    type_info: RefCell<Option<BufferTypeInfo>>,
    mapping: RefCell<Option<ActiveMapping>>,
    /// CPU shadow of uniform contents, kept so the typed-uniform fallback
    /// path can bind without a backend read-back.
    shadow: RefCell<Option<Vec<u8>>>,
    key: Cell<Option<ResourceKey>>,
}

fn hint_to_gl(hint: BufferHint) -> u32 {
    match hint {
        BufferHint::Static => gl::STATIC_DRAW,
        BufferHint::Dynamic => gl::DYNAMIC_DRAW,
        BufferHint::Stream => gl::STREAM_DRAW,
    }
}

/// Target selection: index wins, then uniform (2.x only), then the array
/// target.
fn target_for(usage: BufferUsage, generation: BackendGeneration) -> u32 {
    if usage.contains(BufferUsage::INDEX) {
        gl::ELEMENT_ARRAY_BUFFER
    } else if usage.contains(BufferUsage::UNIFORM) && generation == BackendGeneration::Gl2 {
        gl::UNIFORM_BUFFER
    } else {
        gl::ARRAY_BUFFER
    }
}

impl Buffer {
    pub(crate) fn new(
        device: Rc<DeviceShared>,
        desc: &BufferDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<Rc<Buffer>> {
        if desc.size == 0 {
            return Err(Error::Configuration(format!(
                "{}: buffer size must be non-zero",
                desc.label_or_unnamed()
            )));
        }
        if let Some(data) = initial_data {
            if data.len() > desc.size {
                return Err(Error::OutOfRange(format!(
                    "{}: initial data ({} bytes) exceeds buffer size ({} bytes)",
                    desc.label_or_unnamed(),
                    data.len(),
                    desc.size
                )));
            }
        }

        let raw = device.gl().create_buffer();
        if raw == 0 {
            return Err(Error::ContextLost);
        }

        let target = target_for(desc.usage, device.generation());
        let gl_ctx = device.gl();
        gl_ctx.bind_buffer(target, raw);
        match initial_data {
            Some(data) if data.len() == desc.size => {
                gl_ctx.buffer_data(target, data, hint_to_gl(desc.hint));
            }
            Some(data) => {
                gl_ctx.buffer_data_size(target, desc.size, hint_to_gl(desc.hint));
                gl_ctx.buffer_sub_data(target, 0, data);
            }
            None => {
                gl_ctx.buffer_data_size(target, desc.size, hint_to_gl(desc.hint));
            }
        }

        let shadow = if desc.usage.contains(BufferUsage::UNIFORM) {
            let mut bytes = vec![0; desc.size];
            if let Some(data) = initial_data {
                bytes[..data.len()].copy_from_slice(data);
            }
            Some(bytes)
        } else {
            None
        };

        let buffer = Rc::new(Buffer {
            device: device.clone(),
            raw: Cell::new(raw),
            size: desc.size,
            usage: desc.usage,
            hint: desc.hint,
            target,
            label: desc.label_or_unnamed().to_owned(),
            type_info: RefCell::new(None),
            mapping: RefCell::new(None),
            shadow: RefCell::new(shadow),
            key: Cell::new(None),
        });
        let key = device.register(
            ResourceCategory::Buffer,
            buffer.label.clone(),
            Rc::downgrade(&buffer) as _,
        );
        buffer.key.set(Some(key));
        Ok(buffer)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn hint(&self) -> BufferHint {
        self.hint
    }

    pub(crate) fn raw(&self) -> u32 {
        self.raw.get()
    }

    pub(crate) fn gl_target(&self) -> u32 {
        self.target
    }

    pub fn is_destroyed(&self) -> bool {
        self.raw.get() == 0
    }

    /// Attach typed metadata used by the binding fallback path.
    pub fn set_type_info(&self, info: BufferTypeInfo) {
        *self.type_info.borrow_mut() = Some(info);
    }

    pub fn type_info(&self) -> Option<BufferTypeInfo> {
        self.type_info.borrow().clone()
    }

    /// Write `data` at `offset`. Out-of-bounds writes log and leave the
    /// buffer untouched.
    pub fn update(&self, data: &[u8], offset: usize) {
        if self.is_destroyed() {
            warn!("update on destroyed buffer \"{}\" ignored", self.label);
            return;
        }
        if offset + data.len() > self.size {
            error!(
                "update on \"{}\" out of bounds: offset {} + {} bytes > size {}",
                self.label,
                offset,
                data.len(),
                self.size
            );
            return;
        }
        let gl_ctx = self.device.gl();
        gl_ctx.bind_buffer(self.target, self.raw.get());
        gl_ctx.buffer_sub_data(self.target, offset, data);
        if let Some(shadow) = self.shadow.borrow_mut().as_mut() {
            shadow[offset..offset + data.len()].copy_from_slice(data);
        }
    }

    /// Map a byte region. Read modes on the 1.x generation yield a
    /// zero-filled region: the backend has no read-back there.
    pub fn map(&self, mode: MapMode, offset: usize, size: usize) -> Result<MappedRange> {
        if self.is_destroyed() {
            return Err(Error::Lifecycle(format!(
                "map on destroyed buffer \"{}\"",
                self.label
            )));
        }
        if offset + size > self.size {
            return Err(Error::OutOfRange(format!(
                "map on \"{}\": offset {} + size {} > buffer size {}",
                self.label, offset, size, self.size
            )));
        }
        if self.mapping.borrow().is_some() {
            return Err(Error::Lifecycle(format!(
                "buffer \"{}\" is already mapped",
                self.label
            )));
        }

        let mut bytes = vec![0u8; size];
        if mode.reads() {
            match self.device.generation() {
                BackendGeneration::Gl2 => {
                    let gl_ctx = self.device.gl();
                    gl_ctx.bind_buffer(self.target, self.raw.get());
                    gl_ctx.get_buffer_sub_data(self.target, offset, &mut bytes);
                }
                BackendGeneration::Gl1 => {
                    warn!(
                        "mapping \"{}\" for read on the 1.x backend returns zeroes",
                        self.label
                    );
                }
            }
        }

        let data = Rc::new(RefCell::new(bytes));
        *self.mapping.borrow_mut() = Some(ActiveMapping {
            mode,
            offset,
            data: data.clone(),
        });
        Ok(MappedRange { mode, offset, data })
    }

    /// Write a writable mapping back and release the staging region.
    /// Idempotent when nothing is mapped.
    pub fn unmap(&self) {
        let Some(mapping) = self.mapping.borrow_mut().take() else {
            return;
        };
        if mapping.mode.writes() && !self.is_destroyed() {
            let data = mapping.data.borrow();
            let gl_ctx = self.device.gl();
            gl_ctx.bind_buffer(self.target, self.raw.get());
            gl_ctx.buffer_sub_data(self.target, mapping.offset, &data);
            if let Some(shadow) = self.shadow.borrow_mut().as_mut() {
                shadow[mapping.offset..mapping.offset + data.len()].copy_from_slice(&data);
            }
        }
    }

    /// Synchronous read-back. 2.x only; the 1.x generation returns `None`.
    pub fn read_back(&self, offset: usize, size: usize) -> Option<Vec<u8>> {
        if self.is_destroyed() || offset + size > self.size {
            return None;
        }
        match self.device.generation() {
            BackendGeneration::Gl2 => {
                let mut out = vec![0u8; size];
                let gl_ctx = self.device.gl();
                gl_ctx.bind_buffer(self.target, self.raw.get());
                gl_ctx.get_buffer_sub_data(self.target, offset, &mut out);
                Some(out)
            }
            BackendGeneration::Gl1 => None,
        }
    }

    /// Bytes used by the typed-uniform fallback: the sync read-back where
    /// available, the CPU shadow otherwise.
    pub(crate) fn uniform_bytes(&self) -> Option<Vec<u8>> {
        if let Some(bytes) = self.read_back(0, self.size) {
            return Some(bytes);
        }
        self.shadow.borrow().clone()
    }

    /// Release the backend buffer. Idempotent.
    pub fn destroy(&self) {
        if let Some(key) = self.key.take() {
            self.device.unregister(key);
        }
        let raw = self.raw.replace(0);
        if raw != 0 {
            self.mapping.borrow_mut().take();
            self.device.gl().delete_buffer(raw);
        }
    }
}

impl Tracked for Buffer {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn destroy_now(&self) {
        self.destroy();
    }

    fn invalidate(&self) {
        self.key.take();
        self.raw.set(0);
        self.mapping.borrow_mut().take();
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("label", &self.label)
            .field("size", &self.size)
            .field("usage", &self.usage)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
