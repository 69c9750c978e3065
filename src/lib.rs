//! Session persistence for browser-hosted applications.
//!
//! Stores keep authenticated session data in local storage or cookies, keep
//! browsing contexts of the same origin in sync, and fall back to cookies when
//! local storage is unusable or the page is server rendered. See [`stores`].

pub mod config;
pub mod context;
pub mod cookies;
pub mod data;
pub mod environment;
pub mod errors;
pub mod storage;
pub mod stores;

/// Capacity of the broadcast channels used for storage, cookie and store events.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;

pub use config::{CookieConfig, SameSite, StoreConfig, StoreConfigBuilder};
pub use context::ContextId;
pub use data::SessionData;
pub use environment::{Environment, EnvironmentBuilder};
pub use errors::StoreError;
pub use stores::{
    AdaptiveStore, BackendKind, CookieStore, EphemeralStore, LocalStorageStore, SessionStore, StoreEvent,
    Subscription,
};
