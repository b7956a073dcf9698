//! Immutable, interned tag-set labels.
//!
//! A [`Label`] is a nullable handle on an interned tag set.  The null
//! label is the untainted case and is a sentinel, never an intern-table
//! entry.  Non-null labels share one node per tag-set shape within a
//! table's lifetime, so structural equality implies identity there.
//!
//! Each node keeps:
//!
//! - the canonical **descriptor** (sorted, deduplicated tag list) that
//!   keys the intern table,
//! - a lazily realized `BTreeSet` for membership tests, built on first
//!   query,
//! - **transition caches** memoizing `add(self, tag)` and
//!   `merge(self, other)` by target descriptor.  The caches are pure
//!   optimization: a cached target must equal a fresh recompute.

use std::cell::{OnceCell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::tag::Tag;

// ---------------------------------------------------------------------------
// LabelDescriptor — canonical serialization of a tag set
// ---------------------------------------------------------------------------

/// Canonical form of a non-empty tag set: sorted ascending, deduplicated.
///
/// Cheap to clone (shared slice); keys the intern table and both
/// transition caches.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelDescriptor(Rc<[Tag]>);

impl LabelDescriptor {
    /// Build a descriptor from an arbitrary tag list, canonicalizing it.
    ///
    /// The list must be non-empty; the empty set is the null label and has
    /// no descriptor.
    pub fn from_tags(mut tags: Vec<Tag>) -> Self {
        assert!(!tags.is_empty(), "the empty tag set has no descriptor");
        tags.sort_unstable();
        tags.dedup();
        Self(tags.into())
    }

    /// Build a descriptor from a list already sorted and deduplicated.
    pub(crate) fn from_sorted(tags: Vec<Tag>) -> Self {
        debug_assert!(tags.windows(2).all(|w| w[0] < w[1]));
        assert!(!tags.is_empty(), "the empty tag set has no descriptor");
        Self(tags.into())
    }

    pub fn singleton(tag: Tag) -> Self {
        Self(Rc::from([tag]))
    }

    pub fn tags(&self) -> &[Tag] {
        &self.0
    }

    /// Number of tags.  Always at least one.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Membership test on the canonical (sorted) form.
    pub fn contains(&self, tag: Tag) -> bool {
        self.0.binary_search(&tag).is_ok()
    }
}

impl fmt::Display for LabelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, tag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{tag}")?;
        }
        f.write_str("}")
    }
}

impl Serialize for LabelDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LabelDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tags = Vec::<Tag>::deserialize(deserializer)?;
        if tags.is_empty() {
            return Err(serde::de::Error::custom(
                "label descriptor must contain at least one tag",
            ));
        }
        Ok(Self::from_tags(tags))
    }
}

// ---------------------------------------------------------------------------
// LabelNode — the shared interned node behind a non-null label
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct LabelNode {
    descriptor: LabelDescriptor,
    /// Realized on first membership query.
    realized: OnceCell<BTreeSet<Tag>>,
    /// `add(self, tag)` → target descriptor.
    tag_transitions: RefCell<BTreeMap<Tag, LabelDescriptor>>,
    /// `merge(self, other)` → target descriptor, keyed by `other`'s
    /// descriptor so a cache entry never keeps a dead label alive.
    merge_transitions: RefCell<BTreeMap<LabelDescriptor, LabelDescriptor>>,
}

impl LabelNode {
    pub(crate) fn new(descriptor: LabelDescriptor) -> Self {
        Self {
            descriptor,
            realized: OnceCell::new(),
            tag_transitions: RefCell::new(BTreeMap::new()),
            merge_transitions: RefCell::new(BTreeMap::new()),
        }
    }

    pub(crate) fn descriptor(&self) -> &LabelDescriptor {
        &self.descriptor
    }

    pub(crate) fn realized(&self) -> &BTreeSet<Tag> {
        self.realized
            .get_or_init(|| self.descriptor.tags().iter().copied().collect())
    }

    pub(crate) fn cached_tag_transition(&self, tag: Tag) -> Option<LabelDescriptor> {
        self.tag_transitions.borrow().get(&tag).cloned()
    }

    pub(crate) fn cache_tag_transition(&self, tag: Tag, target: LabelDescriptor) {
        self.tag_transitions.borrow_mut().insert(tag, target);
    }

    pub(crate) fn cached_merge_transition(&self, other: &LabelDescriptor) -> Option<LabelDescriptor> {
        self.merge_transitions.borrow().get(other).cloned()
    }

    pub(crate) fn cache_merge_transition(&self, other: LabelDescriptor, target: LabelDescriptor) {
        self.merge_transitions.borrow_mut().insert(other, target);
    }
}

// ---------------------------------------------------------------------------
// Label — nullable owning handle
// ---------------------------------------------------------------------------

/// Owning handle on an interned tag set; the null handle is the untainted
/// label.
///
/// Labels are produced only by [`InternTable::singleton`],
/// [`InternTable::add`], and [`InternTable::merge`]; there is no public
/// mutator.  Holders share the node by reference count; when the last
/// handle drops, the node dies and its intern-table entry goes stale (the
/// table holds weak entries only and replaces stale ones on lookup).
///
/// `Label` is intentionally `!Send`: a label belongs to the intern table
/// of the thread that created it, and handing one to another thread is a
/// compile error rather than the undefined behavior of the original
/// design.
///
/// [`InternTable::singleton`]: crate::intern::InternTable::singleton
/// [`InternTable::add`]: crate::intern::InternTable::add
/// [`InternTable::merge`]: crate::intern::InternTable::merge
#[derive(Debug, Clone)]
pub struct Label(Option<Rc<LabelNode>>);

impl Label {
    /// The untainted label.  Not interned; `is_null` is true.
    pub fn none() -> Self {
        Self(None)
    }

    pub(crate) fn from_node(node: Rc<LabelNode>) -> Self {
        Self(Some(node))
    }

    pub(crate) fn node(&self) -> Option<&Rc<LabelNode>> {
        self.0.as_ref()
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Canonical descriptor, or `None` for the null label.
    pub fn descriptor(&self) -> Option<&LabelDescriptor> {
        self.0.as_deref().map(LabelNode::descriptor)
    }

    /// Tags in canonical order; empty for the null label.
    pub fn tags(&self) -> &[Tag] {
        self.0
            .as_deref()
            .map_or(&[], |node| node.descriptor().tags())
    }

    pub fn tag_count(&self) -> usize {
        self.tags().len()
    }

    /// Whether `tag` is in this label.  Realizes the membership set on
    /// first query; the null label contains nothing.
    pub fn has_tag(&self, tag: Tag) -> bool {
        match &self.0 {
            Some(node) => node.realized().contains(&tag),
            None => false,
        }
    }

    /// Whether every tag of `other` is in `self`.  The null label is
    /// contained in everything; nothing non-null is contained in the null
    /// label.
    pub fn has_label(&self, other: &Label) -> bool {
        let Some(other_node) = &other.0 else {
            return true;
        };
        let Some(node) = &self.0 else {
            return false;
        };
        let realized = node.realized();
        other_node
            .descriptor()
            .tags()
            .iter()
            .all(|tag| realized.contains(tag))
    }

    /// Identity comparison: same interned node (or both null).  Within one
    /// intern table this coincides with [`PartialEq`].
    pub fn ptr_eq(&self, other: &Label) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => a.descriptor() == b.descriptor(),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for Label {}

impl Default for Label {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(node) => write!(f, "{}", node.descriptor()),
            None => f.write_str("{}"),
        }
    }
}
