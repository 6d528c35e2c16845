//! Atomically swapped configuration snapshots.
//!
//! Registries and tenant policies are never mutated once published. A reload
//! builds a complete replacement and swaps the `Arc`; compilations already in
//! flight keep the snapshot they started with.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

/// Notification sent after a new snapshot is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotUpdate {
    /// Generation of the published snapshot; the initial snapshot is 0.
    pub generation: u64,
}

/// Holds the current snapshot of `T`.
pub struct SnapshotStore<T> {
    current: RwLock<Arc<T>>,
    generation: AtomicU64,
    update_tx: broadcast::Sender<SnapshotUpdate>,
}

impl<T> SnapshotStore<T> {
    /// Creates a store publishing `initial` as generation 0.
    pub fn new(initial: T) -> Self {
        let (update_tx, _) = broadcast::channel(16);
        Self {
            current: RwLock::new(Arc::new(initial)),
            generation: AtomicU64::new(0),
            update_tx,
        }
    }

    /// Returns the current snapshot.
    pub fn load(&self) -> Arc<T> {
        Arc::clone(&self.current.read())
    }

    /// Replaces the current snapshot and notifies subscribers.
    ///
    /// Returns the new generation.
    pub fn publish(&self, next: T) -> u64 {
        let next = Arc::new(next);
        let generation = {
            let mut current = self.current.write();
            *current = next;
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        debug!(generation, "Published configuration snapshot");

        // No subscribers is not an error.
        let _ = self.update_tx.send(SnapshotUpdate { generation });
        generation
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Subscribes to publish notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotUpdate> {
        self.update_tx.subscribe()
    }
}

impl<T> std::fmt::Debug for SnapshotStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("generation", &self.generation())
            .finish()
    }
}
