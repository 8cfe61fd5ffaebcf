//! Atomic topology swap for hot reload.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::Topology;

/// Shared handle to the currently deployed [`Topology`].
///
/// The topology itself is immutable, so concurrent readers need no
/// coordination beyond cloning the `Arc`. A reload swaps the whole
/// reference: requests that already resolved a snapshot keep it until they
/// finish, and nobody ever observes a partially updated graph.
pub struct LiveTopology {
    inner: RwLock<Arc<Topology>>,
}

impl LiveTopology {
    /// Wrap an initial topology.
    #[must_use]
    pub fn new(initial: Topology) -> Self {
        Self {
            inner: RwLock::new(Arc::new(initial)),
        }
    }

    /// The current snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<Topology> {
        self.inner.read().clone()
    }

    /// Swap in `next` wholesale, returning the replaced snapshot.
    pub fn replace(&self, next: Topology) -> Arc<Topology> {
        let next = Arc::new(next);
        info!(name = %next.name(), "Replacing live topology");
        let mut guard = self.inner.write();
        std::mem::replace(&mut *guard, next)
    }
}
