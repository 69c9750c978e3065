use super::area::{self, StorageArea};
use super::event::StorageEvent;
use super::in_memory::InMemoryArea;
use crate::context::ContextId;
use crate::DEFAULT_CHANNEL_CAPACITY;
use anyhow::Result;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::broadcast;

/// A handle for receiving storage change notifications.
pub type StorageSubscription = broadcast::Receiver<StorageEvent>;

#[derive(Debug)]
struct StorageBus {
    tx: broadcast::Sender<StorageEvent>,
}

impl Default for StorageBus {
    fn default() -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self { tx }
    }
}

impl StorageBus {
    fn subscribe(&self) -> StorageSubscription {
        self.tx.subscribe()
    }
    fn publish(&self, ev: StorageEvent) {
        // broadcast::Sender::send() fails only when there are 0 receivers.
        // That's fine: if nobody listens, we can ignore the error.
        let _ = self.tx.send(ev);
    }
}

/// The origin's local storage, shared by all browsing contexts.
///
/// Cloning is cheap; clones share the same area and event bus.
#[derive(Clone)]
pub struct LocalStorage {
    area: Arc<dyn StorageArea>,
    bus: Arc<StorageBus>,
}

impl Debug for LocalStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStorage").finish_non_exhaustive()
    }
}

impl LocalStorage {
    pub fn new(area: Arc<dyn StorageArea>) -> Self {
        Self {
            area,
            bus: Arc::new(StorageBus::default()),
        }
    }

    /// Local storage without persistence and without a quota.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryArea::new()))
    }

    pub fn subscribe(&self) -> StorageSubscription {
        self.bus.subscribe()
    }

    /// Runs the availability probe against the underlying area.
    pub fn probe(&self) -> bool {
        area::probe(self.area.as_ref())
    }

    /// Returns the view of the area used by `context`. Writes through it are
    /// published as storage events tagged with `context`.
    pub fn area_for(&self, context: ContextId) -> Arc<dyn StorageArea> {
        Arc::new(NotifyingArea {
            inner: self.area.clone(),
            source: context,
            bus: self.bus.clone(),
        })
    }
}

struct NotifyingArea {
    inner: Arc<dyn StorageArea>,
    source: ContextId,
    bus: Arc<StorageBus>,
}

impl StorageArea for NotifyingArea {
    fn get_item(&self, key: &str) -> Option<String> {
        self.inner.get_item(key)
    }
    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let old = self.inner.get_item(key);
        self.inner.set_item(key, value)?;
        if old.as_deref() != Some(value) {
            self.bus.publish(StorageEvent {
                key: Some(key.to_string()),
                old_value: old,
                new_value: Some(value.to_string()),
                source: self.source,
            });
        }
        Ok(())
    }
    fn remove_item(&self, key: &str) -> Result<()> {
        let old = self.inner.get_item(key);
        self.inner.remove_item(key)?;
        if old.is_some() {
            self.bus.publish(StorageEvent {
                key: Some(key.to_string()),
                old_value: old,
                new_value: None,
                source: self.source,
            });
        }
        Ok(())
    }
    fn clear(&self) -> Result<()> {
        self.inner.clear()?;
        self.bus.publish(StorageEvent {
            key: None,
            old_value: None,
            new_value: None,
            source: self.source,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn views_share_the_same_area() {
        let storage = LocalStorage::in_memory();
        let a = storage.area_for(ContextId::new());
        let b = storage.area_for(ContextId::new());

        a.set_item("k", "v").unwrap();
        assert_eq!(b.get_item("k").as_deref(), Some("v"));

        b.remove_item("k").unwrap();
        assert!(a.get_item("k").is_none());
    }

    #[test]
    fn writes_publish_events_tagged_with_the_writer() {
        let storage = LocalStorage::in_memory();
        let ctx = ContextId::new();
        let area = storage.area_for(ctx);
        let mut rx = storage.subscribe();

        area.set_item("k", "1").unwrap();
        area.set_item("k", "2").unwrap();
        area.remove_item("k").unwrap();
        area.clear().unwrap();

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.key.as_deref(), Some("k"));
        assert_eq!(ev.old_value, None);
        assert_eq!(ev.new_value.as_deref(), Some("1"));
        assert_eq!(ev.source, ctx);

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.old_value.as_deref(), Some("1"));
        assert_eq!(ev.new_value.as_deref(), Some("2"));

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.old_value.as_deref(), Some("2"));
        assert_eq!(ev.new_value, None);

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.key, None);

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn unchanged_writes_and_missing_removals_are_silent() {
        let storage = LocalStorage::in_memory();
        let area = storage.area_for(ContextId::new());
        area.set_item("k", "v").unwrap();

        let mut rx = storage.subscribe();
        area.set_item("k", "v").unwrap();
        area.remove_item("missing").unwrap();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn failed_writes_publish_nothing() {
        let storage = LocalStorage::new(Arc::new(InMemoryArea::with_quota(4)));
        let area = storage.area_for(ContextId::new());
        let mut rx = storage.subscribe();

        assert!(area.set_item("key", "too long").is_err());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn probe_reflects_the_area() {
        assert!(LocalStorage::in_memory().probe());
        assert!(!LocalStorage::new(Arc::new(InMemoryArea::with_quota(0))).probe());
    }
}
