//! Local storage medium.
//!
//! This module models the browser's **localStorage**: a durable, origin-scoped
//! key/value area shared by every browsing context of the origin, plus the
//! storage events a context receives when *another* context changes it.
//!
//! # Concepts
//!
//! - [`StorageArea`]: the key/value interface (`get_item`, `set_item`,
//!   `remove_item`, `clear`).
//! - [`LocalStorage`]: the shared service. It owns one area and a broadcast
//!   bus; each browsing context asks it for its own *notifying view* via
//!   [`LocalStorage::area_for`]. Writes through that view publish a
//!   [`StorageEvent`] tagged with the writing context.
//! - [`LocalStorage::probe`]: the availability check the adaptive store runs
//!   before selecting the local storage backend.
//!
//! # Available areas
//!
//! - [`InMemoryArea`]: no persistence, optional byte quota. A zero quota
//!   behaves like a private-browsing localStorage that refuses every write.
//! - [`SqliteArea`]: SQLite-backed persistent storage (feature
//!   `sqlite_local_storage`).
//!
//! # Example
//!
//! ```rust
//! use gosub_session_store::storage::LocalStorage;
//! use gosub_session_store::ContextId;
//!
//! let storage = LocalStorage::in_memory();
//! assert!(storage.probe());
//!
//! let tab_a = storage.area_for(ContextId::new());
//! let tab_b = storage.area_for(ContextId::new());
//! let mut events = storage.subscribe();
//!
//! tab_a.set_item("greeting", "hello").unwrap();
//! assert_eq!(tab_b.get_item("greeting").as_deref(), Some("hello"));
//! assert_eq!(events.try_recv().unwrap().key.as_deref(), Some("greeting"));
//! ```

/// Storage area module, defining the key/value storage interface.
pub mod area;
/// Event module, providing storage change events.
pub mod event;
/// In-memory storage area.
pub mod in_memory;
/// Service module, providing the shared local storage with change notifications.
pub mod service;
/// SQLite-backed storage area.
#[cfg(feature = "sqlite_local_storage")]
pub mod sqlite_store;

pub use area::{probe, StorageArea, PROBE_KEY};
pub use event::StorageEvent;
pub use in_memory::InMemoryArea;
pub use service::{LocalStorage, StorageSubscription};
#[cfg(feature = "sqlite_local_storage")]
pub use sqlite_store::SqliteArea;
