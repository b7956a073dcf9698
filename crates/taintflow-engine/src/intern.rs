//! Per-runtime weak intern table for labels.
//!
//! One table per execution thread/worker, owned by its [`Runtime`] and
//! passed explicitly, never reached through a process-wide singleton.
//! The table maps a canonical descriptor to a weak handle on the single
//! live node for that tag-set shape.  It never owns a label: when the
//! last strong handle
//! drops, the entry goes stale and is replaced in place on the next
//! lookup of that descriptor (or reaped by [`InternTable::sweep`]).
//!
//! All operations are total.  Amortized O(1) on a transition-cache hit or
//! table hit; O(k log k) on a miss that rebuilds and re-canonicalizes a
//! k-tag union.
//!
//! [`Runtime`]: crate::runtime::Runtime

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::label::{Label, LabelDescriptor, LabelNode};
use crate::tag::Tag;

// ---------------------------------------------------------------------------
// InternConfig
// ---------------------------------------------------------------------------

/// Configuration for one intern table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternConfig {
    /// Memoize add/merge transitions on label nodes.  Disabling forces
    /// every combination onto the recompute path; results are identical.
    pub transition_cache: bool,
    /// Initial bucket capacity of the descriptor map.
    pub initial_capacity: usize,
}

impl Default for InternConfig {
    fn default() -> Self {
        Self {
            transition_cache: true,
            initial_capacity: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// InternStats
// ---------------------------------------------------------------------------

/// Counters for table traffic.  Purely observational.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternStats {
    /// Lookups that found a live node.
    pub hits: u64,
    /// Lookups that built a new node (including replacing a stale entry).
    pub misses: u64,
    /// Add/merge calls answered from a node's transition cache.
    pub transition_hits: u64,
}

// ---------------------------------------------------------------------------
// InternTable
// ---------------------------------------------------------------------------

/// Weak registry mapping canonical descriptors to live label nodes.
#[derive(Debug)]
pub struct InternTable {
    entries: HashMap<LabelDescriptor, Weak<LabelNode>>,
    config: InternConfig,
    stats: InternStats,
}

impl InternTable {
    pub fn new() -> Self {
        Self::with_config(InternConfig::default())
    }

    pub fn with_config(config: InternConfig) -> Self {
        Self {
            entries: HashMap::with_capacity(config.initial_capacity),
            config,
            stats: InternStats::default(),
        }
    }

    /// The untainted label.  Never touches the table.
    pub fn empty(&self) -> Label {
        Label::none()
    }

    /// Lookup-or-create for the one-tag set `{tag}`.
    pub fn singleton(&mut self, tag: Tag) -> Label {
        self.lookup_or_create(LabelDescriptor::singleton(tag))
    }

    /// `label ∪ {tag}`.
    ///
    /// Idempotent: when the tag is already present the exact same handle
    /// comes back.  On a cache miss the union is rebuilt, interned, and
    /// the transition memoized on `label`'s node.
    pub fn add(&mut self, label: &Label, tag: Tag) -> Label {
        let Some(node) = label.node() else {
            return self.singleton(tag);
        };
        if label.has_tag(tag) {
            return label.clone();
        }
        if self.config.transition_cache {
            if let Some(target) = node.cached_tag_transition(tag) {
                self.stats.transition_hits += 1;
                return self.lookup_or_create(target);
            }
        }

        let mut tags: Vec<Tag> = node.descriptor().tags().to_vec();
        tags.push(tag);
        tags.sort_unstable();
        let target = LabelDescriptor::from_sorted(tags);
        if self.config.transition_cache {
            node.cache_tag_transition(tag, target.clone());
        }
        self.lookup_or_create(target)
    }

    /// `a ∪ b`.  Commutative and associative up to interning; merging a
    /// label with itself (or any label it already contains) returns `a`
    /// unchanged.
    pub fn merge(&mut self, a: &Label, b: &Label) -> Label {
        let Some(node) = a.node() else {
            return b.clone();
        };
        let Some(other) = b.node() else {
            return a.clone();
        };
        // Short-circuit when b contributes nothing; the union below would
        // reproduce a exactly.
        if a.has_label(b) {
            return a.clone();
        }
        if self.config.transition_cache {
            if let Some(target) = node.cached_merge_transition(other.descriptor()) {
                self.stats.transition_hits += 1;
                return self.lookup_or_create(target);
            }
        }

        let mut tags: Vec<Tag> = node.descriptor().tags().to_vec();
        tags.extend_from_slice(other.descriptor().tags());
        tags.sort_unstable();
        tags.dedup();
        let target = LabelDescriptor::from_sorted(tags);
        if self.config.transition_cache {
            node.cache_merge_transition(other.descriptor().clone(), target.clone());
        }
        self.lookup_or_create(target)
    }

    /// Intern a descriptor produced by another thread's table.
    ///
    /// Tags are thread-agnostic, so a label crossing a worker boundary is
    /// deep-copied by rebuilding its tag set here.
    pub fn adopt(&mut self, descriptor: &LabelDescriptor) -> Label {
        self.lookup_or_create(LabelDescriptor::from_tags(descriptor.tags().to_vec()))
    }

    /// Table hit returns the existing node through a transiently upgraded
    /// weak handle; a miss (or a stale entry left by a dead node) installs
    /// a fresh node under the descriptor.
    pub fn lookup_or_create(&mut self, descriptor: LabelDescriptor) -> Label {
        match self.entries.entry(descriptor) {
            Entry::Occupied(mut occupied) => {
                if let Some(node) = occupied.get().upgrade() {
                    self.stats.hits += 1;
                    return Label::from_node(node);
                }
                // The node died with its last strong handle; the entry is
                // stale and must not be returned.
                let node = Rc::new(LabelNode::new(occupied.key().clone()));
                occupied.insert(Rc::downgrade(&node));
                self.stats.misses += 1;
                tracing::trace!(descriptor = %node.descriptor(), "reinterned label over stale entry");
                Label::from_node(node)
            }
            Entry::Vacant(vacant) => {
                let node = Rc::new(LabelNode::new(vacant.key().clone()));
                vacant.insert(Rc::downgrade(&node));
                self.stats.misses += 1;
                tracing::trace!(descriptor = %node.descriptor(), "interned new label");
                Label::from_node(node)
            }
        }
    }

    /// Whether a live node exists for `descriptor`.
    pub fn contains(&self, descriptor: &LabelDescriptor) -> bool {
        self.entries
            .get(descriptor)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop stale entries left behind by dead nodes.
    pub fn sweep(&mut self) {
        self.entries.retain(|_, weak| weak.strong_count() > 0);
    }

    pub fn stats(&self) -> InternStats {
        self.stats
    }
}

impl Default for InternTable {
    fn default() -> Self {
        Self::new()
    }
}
