use super::bus::{Snapshot, StoreBus};
use super::{BackendKind, SessionStore, Subscription};
use crate::data::SessionData;
use crate::errors::StoreError;
use std::sync::atomic::{AtomicBool, Ordering};

/// Keeps session data in memory only. Nothing is shared or persisted.
#[derive(Debug)]
pub struct EphemeralStore {
    snapshot: Snapshot,
    destroyed: AtomicBool,
}

impl Default for EphemeralStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EphemeralStore {
    pub fn new() -> Self {
        Self::with_bus(StoreBus::default())
    }

    pub(crate) fn with_bus(bus: StoreBus) -> Self {
        Self {
            snapshot: Snapshot::new(SessionData::new(), bus),
            destroyed: AtomicBool::new(false),
        }
    }

    fn ensure_alive(&self) -> Result<(), StoreError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(StoreError::Destroyed);
        }
        Ok(())
    }
}

impl SessionStore for EphemeralStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Ephemeral
    }

    fn persist(&self, data: &SessionData) -> Result<(), StoreError> {
        self.ensure_alive()?;
        self.snapshot.persist_with(data, || Ok(()))
    }

    fn restore(&self) -> SessionData {
        self.snapshot.current()
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.ensure_alive()?;
        self.snapshot.clear_with(|| Ok(()))
    }

    fn subscribe(&self) -> Subscription {
        self.snapshot.bus().subscribe()
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::testing::{assert_behaves_like_a_store, data};
    use serde_json::json;

    #[test]
    fn behaves_like_a_store() {
        assert_behaves_like_a_store(&EphemeralStore::new());
    }

    #[test]
    fn instances_share_nothing() {
        let a = EphemeralStore::new();
        let b = EphemeralStore::new();
        a.persist(&data(json!({ "a": 1 }))).unwrap();
        assert!(b.restore().is_empty());
    }

    #[test]
    fn destroyed_store_rejects_writes() {
        let store = EphemeralStore::new();
        store.destroy();
        assert!(matches!(store.persist(&SessionData::new()), Err(StoreError::Destroyed)));
        assert!(matches!(store.clear(), Err(StoreError::Destroyed)));
    }
}
