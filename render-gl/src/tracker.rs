//! Resource tracking.
//!
//! Every first-class resource registers here at creation and unregisters on
//! destruction. The tracker reports leaks at device teardown and performs
//! the terminal sweep in a fixed category order so no resource outlives one
//! it references.

use log::{debug, warn};
use slotmap::{new_key_type, SlotMap};
use std::rc::{Rc, Weak};

new_key_type! {
    pub struct ResourceKey;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum ResourceCategory {
    Encoder,
    BindGroup,
    RenderPipeline,
    BindGroupLayout,
    PipelineLayout,
    QuerySet,
    ShaderModule,
    Sampler,
    Texture,
    Buffer,
    Other,
}

/// Teardown order. Consumers before their referents.
pub const TEARDOWN_ORDER: [ResourceCategory; 11] = [
    ResourceCategory::Encoder,
    ResourceCategory::BindGroup,
    ResourceCategory::RenderPipeline,
    ResourceCategory::BindGroupLayout,
    ResourceCategory::PipelineLayout,
    ResourceCategory::QuerySet,
    ResourceCategory::ShaderModule,
    ResourceCategory::Sampler,
    ResourceCategory::Texture,
    ResourceCategory::Buffer,
    ResourceCategory::Other,
];

/// Implemented by every tracked resource.
pub(crate) trait Tracked {
    fn label(&self) -> String;
    /// Release backend objects. Must be idempotent.
    fn destroy_now(&self);
    /// Forget backend handles without touching the backend (the context they
    /// belonged to is gone).
    fn invalidate(&self);
}

struct Entry {
    category: ResourceCategory,
    label: String,
    resource: Weak<dyn Tracked>,
}

#[derive(Default)]
pub(crate) struct ResourceTracker {
    entries: SlotMap<ResourceKey, Entry>,
}

impl ResourceTracker {
    pub fn new() -> ResourceTracker {
        ResourceTracker {
            entries: SlotMap::with_key(),
        }
    }

    pub fn register(
        &mut self,
        category: ResourceCategory,
        label: String,
        resource: Weak<dyn Tracked>,
    ) -> ResourceKey {
        self.entries.insert(Entry {
            category,
            label,
            resource,
        })
    }

    /// Tolerates already-removed keys: the terminal sweep drains entries
    /// before the resources get a chance to unregister themselves.
    pub fn unregister(&mut self, key: ResourceKey) {
        self.entries.remove(key);
    }

    pub fn live_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.resource.strong_count() > 0)
            .count()
    }

    pub fn live_count_of(&self, category: ResourceCategory) -> usize {
        self.entries
            .values()
            .filter(|e| e.category == category && e.resource.strong_count() > 0)
            .count()
    }

    /// (category, count, labels) for every category with live entries.
    pub fn leak_report(&self) -> Vec<(ResourceCategory, usize, Vec<String>)> {
        let mut report = Vec::new();
        for category in TEARDOWN_ORDER {
            let labels: Vec<String> = self
                .entries
                .values()
                .filter(|e| e.category == category && e.resource.strong_count() > 0)
                .map(|e| e.label.clone())
                .collect();
            if !labels.is_empty() {
                report.push((category, labels.len(), labels));
            }
        }
        report
    }

    pub fn log_leaks(&self) {
        let report = self.leak_report();
        if report.is_empty() {
            debug!("no leaked resources at device teardown");
            return;
        }
        for (category, count, labels) in &report {
            warn!(
                "leaked {} {:?} resource(s) at device teardown: {}",
                count,
                category,
                labels.join(", ")
            );
        }
    }

    /// Drain every live entry in teardown order. The borrow on the tracker
    /// is released before the returned resources are destroyed, so their
    /// own unregister calls do not re-enter.
    pub fn drain_in_teardown_order(&mut self) -> Vec<Rc<dyn Tracked>> {
        let mut entries: Vec<Entry> = self.entries.drain().map(|(_, e)| e).collect();
        entries.sort_by_key(|e| {
            TEARDOWN_ORDER
                .iter()
                .position(|c| *c == e.category)
                .unwrap_or(TEARDOWN_ORDER.len())
        });
        entries
            .into_iter()
            .filter_map(|e| e.resource.upgrade())
            .collect()
    }

    /// Forget every entry after marking the resources invalid. Used on
    /// context restore, when all registered handles are stale.
    pub fn invalidate_all(&mut self) {
        for (_, entry) in self.entries.drain() {
            if let Some(resource) = entry.resource.upgrade() {
                resource.invalidate();
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
