use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

// Single static counter for all elements, nodes and edges share the id space
static NEXT_ELEMENT_ID: AtomicUsize = AtomicUsize::new(1);

/// Stable identifier of a node or an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub usize);

impl ElementId {
    /// Allocates a fresh id
    pub fn generate() -> Self {
        Self(NEXT_ELEMENT_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Makes sure ids generated later never collide with `id`.
    /// Used when entities are rebuilt from serialized data.
    pub fn reserve(id: ElementId) {
        NEXT_ELEMENT_ID.fetch_max(id.0 + 1, Ordering::SeqCst);
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
