//! Session stores.
//!
//! Every store implements [`SessionStore`]: `persist`, `restore`, `clear`, and
//! a [`StoreEvent`] subscription that reports changes made by *someone else*
//! (another tab, another process, the user deleting a cookie).
//!
//! # Available stores
//!
//! - [`LocalStorageStore`]: one key in the origin's local storage; changes
//!   from other contexts arrive as storage events.
//! - [`CookieStore`]: one cookie (plus an `-expiration_time` companion);
//!   sliding expiration via renew; changes picked up through the jar's change
//!   events or by polling.
//! - [`EphemeralStore`]: in-memory only, nothing survives the process.
//! - [`AdaptiveStore`]: picks local storage when it is usable and the code
//!   is not server rendering, cookies otherwise, and can switch at runtime
//!   without losing data.
//!
//! # Events
//!
//! A store emits `SessionDataUpdated` at most once per actual change: it keeps
//! a snapshot of the last data it wrote or saw, re-reads the medium whenever
//! something may have changed, and only emits when the re-read data differs
//! structurally from the snapshot. Its own `persist` calls update the snapshot
//! first, so they never echo back. `clear` is the one self-originated write
//! that notifies, with empty data.
//!
//! # Example
//!
//! ```rust
//! use gosub_session_store::{AdaptiveStore, BackendKind, Environment, SessionData, SessionStore, StoreConfig};
//! use gosub_session_store::storage::LocalStorage;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let env = Environment::builder().local_storage(LocalStorage::in_memory()).build();
//! let store = AdaptiveStore::new(StoreConfig::default(), env)?;
//! assert_eq!(store.active_kind(), BackendKind::LocalStorage);
//!
//! let mut data = SessionData::new();
//! data.insert("authenticated", serde_json::json!({ "token": "secret" }));
//! store.persist(&data)?;
//! assert_eq!(store.restore(), data);
//! # Ok(()) }
//! ```

mod adaptive;
mod bus;
mod cookie;
mod ephemeral;
mod local_storage;
mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use adaptive::AdaptiveStore;
pub use cookie::CookieStore;
pub use ephemeral::EphemeralStore;
pub use local_storage::LocalStorageStore;

use crate::data::SessionData;
use crate::errors::StoreError;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// A handle for receiving store events.
pub type Subscription = broadcast::Receiver<StoreEvent>;

/// Events emitted by session stores.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// The persisted session data was changed from outside this store (or cleared).
    SessionDataUpdated(SessionData),
    /// The adaptive store moved to another backend.
    BackendChanged { old: BackendKind, new: BackendKind },
}

/// The medium a store persists to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    LocalStorage,
    Cookie,
    Ephemeral,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::LocalStorage => write!(f, "local storage"),
            BackendKind::Cookie => write!(f, "cookie"),
            BackendKind::Ephemeral => write!(f, "ephemeral"),
        }
    }
}

/// Contract shared by all session stores.
pub trait SessionStore: Send + Sync {
    /// The medium this store currently writes to.
    fn kind(&self) -> BackendKind;

    /// Replaces the persisted data with `data`.
    ///
    /// On failure the previously persisted data is left untouched.
    fn persist(&self, data: &SessionData) -> Result<(), StoreError>;

    /// Returns the persisted data; empty if there is none or it is unreadable.
    fn restore(&self) -> SessionData;

    /// Removes the persisted data and emits `SessionDataUpdated` with empty data.
    fn clear(&self) -> Result<(), StoreError>;

    fn subscribe(&self) -> Subscription;

    /// Processes external changes now instead of waiting for the background tasks.
    fn sync(&self) {}

    /// Stops background tasks and detaches listeners. Writes fail afterwards.
    fn destroy(&self);
}

pub(crate) fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read_lock<T: ?Sized>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T: ?Sized>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(PoisonError::into_inner)
}
