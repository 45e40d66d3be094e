//! Registry of outstanding remote operations.
//!
//! Bookkeeping only: entries are removed by an RAII guard when the
//! operation settles or its task is torn down. Nothing here cancels work.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use uuid::Uuid;

/// One outstanding remote operation.
#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub id: Uuid,
    pub method: &'static str,
    pub url: String,
    pub started_at: Instant,
}

/// Outstanding operations keyed by a generated id.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    pending: DashMap<Uuid, PendingOperation>,
}

impl InFlightRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new pending operation. The entry lives as long as the
    /// returned guard.
    #[must_use]
    pub fn track(self: &Arc<Self>, method: &'static str, url: &str) -> InFlightGuard {
        let id = Uuid::new_v4();
        self.pending.insert(
            id,
            PendingOperation {
                id,
                method,
                url: url.to_string(),
                started_at: Instant::now(),
            },
        );
        InFlightGuard {
            id,
            registry: Arc::clone(self),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &Uuid) -> bool {
        self.pending.contains_key(id)
    }

    /// Copy of the current entries, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PendingOperation> {
        let mut ops: Vec<_> = self.pending.iter().map(|e| e.value().clone()).collect();
        ops.sort_by_key(|op| op.started_at);
        ops
    }
}

/// RAII guard that removes its pending operation when dropped.
///
/// Removal happens on success, on failure, and when the owning task is
/// dropped mid-flight.
#[derive(Debug)]
pub struct InFlightGuard {
    id: Uuid,
    registry: Arc<InFlightRegistry>,
}

impl InFlightGuard {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.pending.remove(&self.id);
    }
}
