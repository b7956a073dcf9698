//! Opaque provenance tags.
//!
//! A [`Tag`] is an atomic, process-unique token minted on demand.  Tags
//! carry no payload and are never compared for anything but identity; the
//! total order on tags exists only so tag sets have one canonical
//! serialization order.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Next tag value.  Strictly increasing for the process lifetime, so two
/// tags are never equal even when minted on different threads.
static NEXT_TAG: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique provenance marker.
///
/// Minted once via [`Tag::mint`], never mutated, referenced by arbitrarily
/// many labels.  Tags are plain `u64`s underneath and are thread-agnostic;
/// only labels are bound to one intern table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag(u64);

impl Tag {
    /// Mint a fresh tag, strictly distinct from every tag minted before it
    /// in this process.  Total; cannot fail.
    pub fn mint() -> Self {
        Self(NEXT_TAG.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag-{}", self.0)
    }
}
