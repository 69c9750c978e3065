//! Store that picks its medium at runtime.
//!
//! Local storage is used when it is usable and the code is not server
//! rendering; cookies otherwise. The active backend publishes straight into
//! the adaptive store's bus, so subscribers see its events unchanged and
//! keep their subscription across switches.

use super::bus::StoreBus;
use super::{read_lock, write_lock, BackendKind, CookieStore, EphemeralStore, LocalStorageStore};
use super::{SessionStore, StoreEvent, Subscription};
use crate::config::{self, StoreConfig};
use crate::data::SessionData;
use crate::environment::Environment;
use crate::errors::StoreError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

enum Backend {
    LocalStorage(LocalStorageStore),
    Cookie(CookieStore),
    Ephemeral(EphemeralStore),
}

impl Backend {
    /// `local_storage_available` comes from the caller; building never checks availability itself.
    fn build(
        kind: BackendKind,
        config: &StoreConfig,
        env: &Environment,
        bus: StoreBus,
        local_storage_available: bool,
    ) -> Result<Self, StoreError> {
        Ok(match kind {
            BackendKind::LocalStorage => {
                if !local_storage_available {
                    return Err(StoreError::LocalStorageUnavailable);
                }
                Backend::LocalStorage(LocalStorageStore::with_bus(config.local_storage_key.clone(), env, bus)?)
            }
            BackendKind::Cookie => Backend::Cookie(CookieStore::with_bus(config, env, bus)),
            BackendKind::Ephemeral => Backend::Ephemeral(EphemeralStore::with_bus(bus)),
        })
    }

    fn store(&self) -> &dyn SessionStore {
        match self {
            Backend::LocalStorage(s) => s,
            Backend::Cookie(s) => s,
            Backend::Ephemeral(s) => s,
        }
    }
}

/// Session store delegating to local storage or cookies, whichever the environment supports.
pub struct AdaptiveStore {
    config: RwLock<StoreConfig>,
    env: Environment,
    backend: RwLock<Backend>,
    bus: StoreBus,
    destroyed: AtomicBool,
}

impl AdaptiveStore {
    pub fn new(config: StoreConfig, env: Environment) -> Result<Self, StoreError> {
        config::validate(&config)?;
        let usable = local_storage_usable(&env);
        let kind = choose(usable);
        let bus = StoreBus::default();
        let backend = Backend::build(kind, &config, &env, bus.clone(), usable)?;
        log::debug!("Adaptive session store using the {kind} backend");

        Ok(Self {
            config: RwLock::new(config),
            env,
            backend: RwLock::new(backend),
            bus,
            destroyed: AtomicBool::new(false),
        })
    }

    /// Local storage if it is available and the environment is not server rendering, else cookies.
    pub fn select_backend(env: &Environment) -> BackendKind {
        choose(local_storage_usable(env))
    }

    pub fn active_kind(&self) -> BackendKind {
        read_lock(&self.backend).store().kind()
    }

    pub fn config(&self) -> StoreConfig {
        read_lock(&self.config).clone()
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Applies `f` to the configuration and passes the change on to the active backend.
    ///
    /// A changed cookie setting moves the session cookie (see
    /// [`CookieStore::reconfigure`]); a changed local storage key moves the
    /// stored entry. Settings of the inactive backend are only recorded.
    pub fn reconfigure(&self, f: impl FnOnce(&mut StoreConfig)) -> Result<(), StoreError> {
        self.ensure_alive()?;
        let mut current = write_lock(&self.config);
        let mut updated = current.clone();
        f(&mut updated);
        config::validate(&updated)?;

        match &*read_lock(&self.backend) {
            Backend::Cookie(store) if updated.cookie != current.cookie => {
                store.reconfigure(|c| c.apply_changes(&current.cookie, &updated.cookie))?
            }
            Backend::LocalStorage(store) if updated.local_storage_key != current.local_storage_key => {
                store.set_key(updated.local_storage_key.clone())?
            }
            _ => {}
        }

        *current = updated;
        Ok(())
    }

    /// Moves the session to a `kind` backend.
    ///
    /// The current data is copied into the new backend before anything else
    /// changes; if that fails the current backend stays active. The old
    /// medium keeps its copy.
    pub fn switch_to(&self, kind: BackendKind) -> Result<(), StoreError> {
        self.switch(kind, || self.env.is_local_storage_available())
    }

    /// Calls `local_storage_available` only when a local storage backend gets built.
    fn switch(&self, kind: BackendKind, local_storage_available: impl FnOnce() -> bool) -> Result<(), StoreError> {
        self.ensure_alive()?;
        let config = self.config();
        let mut backend = write_lock(&self.backend);
        let from = backend.store().kind();
        if from == kind {
            return Ok(());
        }

        let failed = |source: StoreError| StoreError::SwitchFailed {
            from,
            to: kind,
            source: Box::new(source),
        };

        let data = backend.store().restore();
        let available = kind == BackendKind::LocalStorage && local_storage_available();
        let next = match Backend::build(kind, &config, &self.env, self.bus.clone(), available) {
            Ok(next) => next,
            Err(StoreError::LocalStorageUnavailable) => return Err(StoreError::LocalStorageUnavailable),
            Err(e) => return Err(failed(e)),
        };
        if let Err(e) = next.store().persist(&data) {
            next.store().destroy();
            log::warn!("Switching the session store from {from} to {kind} failed: {e}");
            return Err(failed(e));
        }

        let old = std::mem::replace(&mut *backend, next);
        old.store().destroy();
        drop(backend);

        log::info!("Session store switched from {from} to {kind}");
        self.bus.publish(StoreEvent::BackendChanged { old: from, new: kind });
        Ok(())
    }

    /// Re-runs backend selection and switches if the answer changed.
    pub fn reassess(&self) -> Result<BackendKind, StoreError> {
        let usable = local_storage_usable(&self.env);
        let wanted = choose(usable);
        if wanted != self.active_kind() {
            self.switch(wanted, || usable)?;
        }
        Ok(wanted)
    }

    /// Extends the session cookie's expiration. No-op for other backends.
    pub fn renew(&self) -> Result<(), StoreError> {
        self.ensure_alive()?;
        match &*read_lock(&self.backend) {
            Backend::Cookie(store) => store.renew(),
            _ => Ok(()),
        }
    }

    fn ensure_alive(&self) -> Result<(), StoreError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(StoreError::Destroyed);
        }
        Ok(())
    }
}

/// Checks local storage availability, skipped entirely while server rendering.
fn local_storage_usable(env: &Environment) -> bool {
    !env.is_server_rendering() && env.is_local_storage_available()
}

fn choose(local_storage_usable: bool) -> BackendKind {
    if local_storage_usable {
        BackendKind::LocalStorage
    } else {
        BackendKind::Cookie
    }
}

impl SessionStore for AdaptiveStore {
    fn kind(&self) -> BackendKind {
        self.active_kind()
    }

    fn persist(&self, data: &SessionData) -> Result<(), StoreError> {
        self.ensure_alive()?;
        read_lock(&self.backend).store().persist(data)
    }

    fn restore(&self) -> SessionData {
        read_lock(&self.backend).store().restore()
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.ensure_alive()?;
        read_lock(&self.backend).store().clear()
    }

    fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    fn sync(&self) {
        read_lock(&self.backend).store().sync()
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        read_lock(&self.backend).store().destroy();
    }
}
