use super::bus::{Snapshot, StoreBus};
use super::worker::{drain, spawn_listener};
use super::{lock, read_lock, write_lock, BackendKind, SessionStore, Subscription};
use crate::context::ContextId;
use crate::data::SessionData;
use crate::environment::Environment;
use crate::errors::StoreError;
use crate::storage::{StorageArea, StorageEvent, StorageSubscription};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Persists session data as JSON under one local storage key.
///
/// Writes by other browsing contexts arrive as storage events; writes by this
/// context (including other stores sharing its [`Environment`]) are ignored.
pub struct LocalStorageStore {
    inner: Arc<LocalInner>,
    cancel: CancellationToken,
}

struct LocalInner {
    key: RwLock<String>,
    area: Arc<dyn StorageArea>,
    context: ContextId,
    /// Storage events waiting for `sync()` when no runtime listens for them.
    pending: Mutex<Option<StorageSubscription>>,
    snapshot: Snapshot,
    destroyed: AtomicBool,
}

impl LocalStorageStore {
    /// Fails with [`StoreError::LocalStorageUnavailable`] when the environment has no local storage.
    pub fn new(key: impl Into<String>, env: &Environment) -> Result<Self, StoreError> {
        Self::with_bus(key.into(), env, StoreBus::default())
    }

    pub(crate) fn with_bus(key: String, env: &Environment, bus: StoreBus) -> Result<Self, StoreError> {
        let (Some(area), Some(events)) = (env.local_storage_area(), env.local_storage_events()) else {
            return Err(StoreError::LocalStorageUnavailable);
        };

        let initial = read_key(area.as_ref(), &key);
        let inner = Arc::new(LocalInner {
            key: RwLock::new(key),
            area,
            context: env.context(),
            pending: Mutex::new(None),
            snapshot: Snapshot::new(initial, bus),
            destroyed: AtomicBool::new(false),
        });

        let cancel = CancellationToken::new();
        match env.timers() {
            Some(handle) => {
                let listener = inner.clone();
                spawn_listener(handle, cancel.clone(), events, "local storage listener", move |ev| {
                    listener.on_storage_event(ev.as_ref())
                });
            }
            None => *lock(&inner.pending) = Some(events),
        }

        log::debug!("Local storage session store created for context {}", inner.context);
        Ok(Self { inner, cancel })
    }

    pub fn key(&self) -> String {
        read_lock(&self.inner.key).clone()
    }

    /// Moves the persisted data to `key` and removes the old entry.
    ///
    /// If the old entry cannot be removed, `key` gets its previous value back
    /// and the store keeps using the old key. When there is nothing to move,
    /// whatever `key` already holds becomes the session and subscribers hear
    /// about it.
    pub fn set_key(&self, key: impl Into<String>) -> Result<(), StoreError> {
        self.ensure_alive()?;
        let key = key.into();
        let mut current = write_lock(&self.inner.key);
        if *current == key {
            return Ok(());
        }

        let area = self.inner.area.as_ref();
        if let Some(raw) = area.get_item(&current) {
            let previous = area.get_item(&key);
            area.set_item(&key, &raw)?;
            if let Err(e) = area.remove_item(&current) {
                let restored = match previous {
                    Some(value) => area.set_item(&key, &value),
                    None => area.remove_item(&key),
                };
                if let Err(re) = restored {
                    log::error!("Could not restore local storage key {key:?} after a failed move: {re}");
                }
                return Err(e.into());
            }
        }
        log::debug!("Local storage session key changed from {:?} to {:?}", *current, key);
        *current = key;
        drop(current);

        self.inner.refresh();
        Ok(())
    }

    fn ensure_alive(&self) -> Result<(), StoreError> {
        if self.inner.destroyed.load(Ordering::Acquire) {
            return Err(StoreError::Destroyed);
        }
        Ok(())
    }
}

impl Drop for LocalStorageStore {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn read_key(area: &dyn StorageArea, key: &str) -> SessionData {
    SessionData::parse_stored(area.get_item(key).as_deref(), "local storage")
}

impl LocalInner {
    fn read(&self) -> SessionData {
        read_key(self.area.as_ref(), &read_lock(&self.key))
    }

    /// `None` means events were lost; always re-read then.
    fn on_storage_event(&self, ev: Option<&StorageEvent>) {
        if let Some(ev) = ev {
            if ev.source == self.context || !ev.concerns(&read_lock(&self.key)) {
                return;
            }
        }
        self.refresh();
    }

    fn refresh(&self) {
        if self.destroyed.load(Ordering::Acquire) {
            return;
        }
        self.snapshot.refresh_with(|| self.read());
    }
}

impl SessionStore for LocalStorageStore {
    fn kind(&self) -> BackendKind {
        BackendKind::LocalStorage
    }

    fn persist(&self, data: &SessionData) -> Result<(), StoreError> {
        self.ensure_alive()?;
        let json = data.to_json()?;
        self.inner.snapshot.persist_with(data, || {
            let key = read_lock(&self.inner.key);
            self.inner.area.set_item(&key, &json).map_err(StoreError::from)
        })
    }

    fn restore(&self) -> SessionData {
        if self.inner.destroyed.load(Ordering::Acquire) {
            return SessionData::new();
        }
        self.inner.read()
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.ensure_alive()?;
        self.inner.snapshot.clear_with(|| {
            let key = read_lock(&self.inner.key);
            self.inner.area.remove_item(&key).map_err(StoreError::from)
        })
    }

    fn subscribe(&self) -> Subscription {
        self.inner.snapshot.bus().subscribe()
    }

    fn sync(&self) {
        if let Some(rx) = lock(&self.inner.pending).as_mut() {
            drain(rx);
        }
        self.inner.refresh();
    }

    fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::Release);
        self.cancel.cancel();
        lock(&self.inner.pending).take();
        log::debug!("Local storage session store destroyed for context {}", self.inner.context);
    }
}
