use super::snapshot::{SnapshotStore, StoreError, TermSnapshot};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Ephemeral snapshot store: keeps the last persisted snapshot in memory.
///
/// Cloned handles share the same slot, which lets a test "restart" a
/// repository against whatever the previous instance persisted.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotStore {
    slot: Arc<Mutex<Option<TermSnapshot>>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: TermSnapshot) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(snapshot))),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<TermSnapshot>> {
        // The slot only ever holds a complete snapshot, so a poisoned lock is still consistent
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self) -> Result<Option<TermSnapshot>, StoreError> {
        Ok(self.lock().clone())
    }

    fn persist(&self, snapshot: &TermSnapshot) -> Result<(), StoreError> {
        debug!(rows = snapshot.terms.len(), "Saving glossary snapshot to in-memory store");
        *self.lock() = Some(snapshot.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}
