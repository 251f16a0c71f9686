//! Occlusion query sets. 2.x only; the 1.x generation rejects creation.

use crate::api::glenum as gl;
use crate::device::DeviceShared;
use crate::tracker::{ResourceCategory, ResourceKey, Tracked};
use log::warn;
use prism_render::{Error, Result};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum QueryKind {
    Occlusion,
    /// Cheaper variant that may stop counting after the first passing
    /// sample.
    OcclusionConservative,
}

#[derive(Clone, Debug)]
pub struct QuerySetDescriptor {
    pub label: Option<String>,
    pub kind: QueryKind,
    pub count: u32,
}

pub struct QuerySet {
    device: Rc<DeviceShared>,
    label: String,
    kind: QueryKind,
    queries: RefCell<Vec<u32>>,
    active: Cell<Option<u32>>,
    key: Cell<Option<ResourceKey>>,
}

impl QuerySet {
    pub(crate) fn new(device: Rc<DeviceShared>, desc: &QuerySetDescriptor) -> Result<Rc<QuerySet>> {
        if desc.count == 0 {
            return Err(Error::Configuration(
                "query set count must be non-zero".into(),
            ));
        }
        let label = desc
            .label
            .as_deref()
            .unwrap_or("<unnamed query set>")
            .to_owned();
        let gl_ctx = device.gl();
        let queries: Vec<u32> = (0..desc.count).map(|_| gl_ctx.create_query()).collect();

        let set = Rc::new(QuerySet {
            device: device.clone(),
            label: label.clone(),
            kind: desc.kind,
            queries: RefCell::new(queries),
            active: Cell::new(None),
            key: Cell::new(None),
        });
        let key = device.register(ResourceCategory::QuerySet, label, Rc::downgrade(&set) as _);
        set.key.set(Some(key));
        Ok(set)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn count(&self) -> u32 {
        self.queries.borrow().len() as u32
    }

    fn target(&self) -> u32 {
        match self.kind {
            QueryKind::Occlusion => gl::ANY_SAMPLES_PASSED,
            QueryKind::OcclusionConservative => gl::ANY_SAMPLES_PASSED_CONSERVATIVE,
        }
    }

    pub fn begin(&self, index: u32) -> Result<()> {
        let queries = self.queries.borrow();
        let Some(&query) = queries.get(index as usize) else {
            return Err(Error::OutOfRange(format!(
                "{}: query index {index} out of {}",
                self.label,
                queries.len()
            )));
        };
        if self.active.get().is_some() {
            return Err(Error::Configuration(format!(
                "{}: a query is already active",
                self.label
            )));
        }
        self.device.gl().begin_query(self.target(), query);
        self.active.set(Some(index));
        Ok(())
    }

    pub fn end(&self) -> Result<()> {
        if self.active.take().is_none() {
            return Err(Error::Configuration(format!(
                "{}: no query is active",
                self.label
            )));
        }
        self.device.gl().end_query(self.target());
        Ok(())
    }

    /// `None` while the result is still pending.
    pub fn result(&self, index: u32) -> Option<u64> {
        let queries = self.queries.borrow();
        let &query = queries.get(index as usize)?;
        let gl_ctx = self.device.gl();
        if gl_ctx.query_result_available(query) {
            Some(gl_ctx.query_result(query))
        } else {
            None
        }
    }

    pub fn destroy(&self) {
        if let Some(key) = self.key.take() {
            self.device.unregister(key);
        }
        let queries: Vec<u32> = self.queries.borrow_mut().drain(..).collect();
        if !queries.is_empty() {
            let gl_ctx = self.device.gl();
            for query in queries {
                gl_ctx.delete_query(query);
            }
        }
        if self.active.take().is_some() {
            warn!("{}: destroyed with an active query", self.label);
        }
    }
}

impl Tracked for QuerySet {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn destroy_now(&self) {
        self.destroy();
    }

    fn invalidate(&self) {
        self.key.take();
        self.queries.borrow_mut().clear();
        self.active.take();
    }
}

impl Drop for QuerySet {
    fn drop(&mut self) {
        self.destroy();
    }
}
