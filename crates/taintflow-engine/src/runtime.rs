//! The owning per-worker context.
//!
//! One `Runtime` per execution thread/worker bundles the heap, the label
//! intern table, and the label-object cache.  Everything inside is
//! single-threaded by construction: labels are `Rc`-backed, so a
//! `Runtime` cannot be sent across threads.

use crate::heap::Heap;
use crate::intern::{InternConfig, InternTable};
use crate::label_object::LabelObjectCache;

/// Per-worker execution context owning all label state.
#[derive(Debug, Default)]
pub struct Runtime {
    pub heap: Heap,
    pub labels: InternTable,
    pub(crate) label_objects: LabelObjectCache,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: InternConfig) -> Self {
        Self {
            heap: Heap::new(),
            labels: InternTable::with_config(config),
            label_objects: LabelObjectCache::new(),
        }
    }
}
