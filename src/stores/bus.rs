use super::{lock, StoreEvent, Subscription};
use crate::data::SessionData;
use crate::DEFAULT_CHANNEL_CAPACITY;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Broadcast bus for [`StoreEvent`]s. Clones publish to the same subscribers.
#[derive(Debug, Clone)]
pub(crate) struct StoreBus {
    tx: broadcast::Sender<StoreEvent>,
}

impl Default for StoreBus {
    fn default() -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self { tx }
    }
}

impl StoreBus {
    pub(crate) fn subscribe(&self) -> Subscription {
        self.tx.subscribe()
    }

    pub(crate) fn publish(&self, ev: StoreEvent) {
        // Fails only without receivers, which is fine.
        let _ = self.tx.send(ev);
    }
}

/// Last data a store wrote or observed, plus the bus its changes go to.
///
/// All medium access that can change what the store believes is routed
/// through here, under one lock, so a refresh can never observe a write that
/// has not been recorded yet.
#[derive(Debug)]
pub(crate) struct Snapshot {
    last: Mutex<SessionData>,
    bus: StoreBus,
}

impl Snapshot {
    pub(crate) fn new(initial: SessionData, bus: StoreBus) -> Self {
        Self {
            last: Mutex::new(initial),
            bus,
        }
    }

    pub(crate) fn bus(&self) -> &StoreBus {
        &self.bus
    }

    pub(crate) fn current(&self) -> SessionData {
        lock(&self.last).clone()
    }

    /// Runs an own write; on success `data` becomes the snapshot. Never emits.
    pub(crate) fn persist_with<E>(
        &self,
        data: &SessionData,
        write: impl FnOnce() -> Result<(), E>,
    ) -> Result<(), E> {
        let mut last = lock(&self.last);
        write()?;
        *last = data.clone();
        Ok(())
    }

    /// Runs an own clear; on success the snapshot is emptied and an empty update emitted.
    pub(crate) fn clear_with<E>(&self, clear: impl FnOnce() -> Result<(), E>) -> Result<(), E> {
        let mut last = lock(&self.last);
        clear()?;
        *last = SessionData::new();
        self.bus.publish(StoreEvent::SessionDataUpdated(SessionData::new()));
        Ok(())
    }

    /// Re-reads the medium and emits if the data differs from the snapshot.
    pub(crate) fn refresh_with(&self, read: impl FnOnce() -> SessionData) -> bool {
        let mut last = lock(&self.last);
        let data = read();
        if data == *last {
            return false;
        }
        *last = data.clone();
        self.bus.publish(StoreEvent::SessionDataUpdated(data));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::testing::{assert_no_events, data};
    use serde_json::json;

    #[test]
    fn own_writes_are_silent() {
        let snapshot = Snapshot::new(SessionData::new(), StoreBus::default());
        let mut rx = snapshot.bus().subscribe();

        let d = data(json!({ "a": 1 }));
        snapshot.persist_with(&d, || Ok::<(), ()>(())).unwrap();
        assert_eq!(snapshot.current(), d);

        // the medium now holds what we wrote; a refresh finds nothing new
        assert!(!snapshot.refresh_with(|| d.clone()));
        assert_no_events(&mut rx);
    }

    #[test]
    fn failed_writes_leave_the_snapshot() {
        let before = data(json!({ "a": 1 }));
        let snapshot = Snapshot::new(before.clone(), StoreBus::default());

        let res = snapshot.persist_with(&data(json!({ "b": 2 })), || Err("quota"));
        assert_eq!(res, Err("quota"));
        assert_eq!(snapshot.current(), before);
    }

    #[test]
    fn refresh_emits_once_per_change() {
        let snapshot = Snapshot::new(SessionData::new(), StoreBus::default());
        let mut rx = snapshot.bus().subscribe();

        let d = data(json!({ "a": 1 }));
        assert!(snapshot.refresh_with(|| d.clone()));
        assert!(!snapshot.refresh_with(|| d.clone()));

        assert_eq!(rx.try_recv().unwrap(), StoreEvent::SessionDataUpdated(d));
        assert_no_events(&mut rx);
    }

    #[test]
    fn clear_emits_empty_data() {
        let snapshot = Snapshot::new(data(json!({ "a": 1 })), StoreBus::default());
        let mut rx = snapshot.bus().subscribe();

        snapshot.clear_with(|| Ok::<(), ()>(())).unwrap();
        assert!(snapshot.current().is_empty());
        assert_eq!(rx.try_recv().unwrap(), StoreEvent::SessionDataUpdated(SessionData::new()));
        assert_no_events(&mut rx);
    }
}
