//! Environment capabilities handed to the stores.
//!
//! An [`Environment`] describes one browsing context: which media it can
//! reach (local storage, a cookie jar), whether it runs in server-rendering
//! mode, whether the page is a secure context, and which tokio runtime (if
//! any) may run background timers. It is built once at process start and
//! passed to store constructors; nothing in the stores reaches for globals.
//!
//! # Example: two tabs of the same origin
//!
//! ```rust
//! use gosub_session_store::Environment;
//! use gosub_session_store::cookies::DefaultCookieJar;
//! use gosub_session_store::storage::LocalStorage;
//!
//! let tab_a = Environment::builder()
//!     .local_storage(LocalStorage::in_memory())
//!     .cookie_jar(DefaultCookieJar::shared())
//!     .build();
//! let tab_b = tab_a.for_new_context();
//!
//! assert_ne!(tab_a.context(), tab_b.context());
//! assert!(tab_b.is_local_storage_available());
//! ```

use crate::context::ContextId;
use crate::cookies::{CookieJarHandle, DefaultCookieJar};
use crate::storage::{LocalStorage, StorageArea, StorageSubscription};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Capabilities of a browsing context.
#[derive(Clone)]
pub struct Environment {
    context: ContextId,
    local_storage: Option<LocalStorage>,
    cookies: CookieJarHandle,
    server_rendering: bool,
    secure_context: bool,
    runtime: Option<Handle>,
}

impl Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("context", &self.context)
            .field("local_storage", &self.local_storage.is_some())
            .field("server_rendering", &self.server_rendering)
            .field("secure_context", &self.secure_context)
            .field("timers", &self.runtime.is_some())
            .finish_non_exhaustive()
    }
}

impl Environment {
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::default()
    }

    /// A server-rendering environment reading and writing cookies through `cookies`.
    pub fn server(cookies: CookieJarHandle) -> Self {
        Self::builder().cookie_jar(cookies).server_rendering(true).build()
    }

    /// Another browsing context sharing this one's media (a new tab of the same origin).
    pub fn for_new_context(&self) -> Self {
        Self {
            context: ContextId::new(),
            ..self.clone()
        }
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn is_server_rendering(&self) -> bool {
        self.server_rendering
    }

    pub fn is_secure_context(&self) -> bool {
        self.secure_context
    }

    pub fn cookie_jar(&self) -> CookieJarHandle {
        self.cookies.clone()
    }

    pub fn local_storage(&self) -> Option<&LocalStorage> {
        self.local_storage.as_ref()
    }

    /// Runs the local storage probe. No local storage at all counts as unavailable.
    pub fn is_local_storage_available(&self) -> bool {
        self.local_storage.as_ref().is_some_and(LocalStorage::probe)
    }

    /// This context's notifying view of local storage.
    pub(crate) fn local_storage_area(&self) -> Option<Arc<dyn StorageArea>> {
        self.local_storage.as_ref().map(|ls| ls.area_for(self.context))
    }

    pub(crate) fn local_storage_events(&self) -> Option<StorageSubscription> {
        self.local_storage.as_ref().map(LocalStorage::subscribe)
    }

    /// Runtime for background timers. Never available while server rendering.
    pub(crate) fn timers(&self) -> Option<&Handle> {
        if self.server_rendering {
            None
        } else {
            self.runtime.as_ref()
        }
    }
}

/// Builder for [`Environment`].
///
/// Defaults: a fresh context id, no local storage, a private
/// [`DefaultCookieJar`], browser mode, insecure context, and the current tokio
/// runtime if `build()` is called from inside one.
#[derive(Default)]
pub struct EnvironmentBuilder {
    context: Option<ContextId>,
    local_storage: Option<LocalStorage>,
    cookies: Option<CookieJarHandle>,
    server_rendering: bool,
    secure_context: bool,
    runtime: Option<Option<Handle>>,
}

impl EnvironmentBuilder {
    pub fn context(mut self, context: ContextId) -> Self {
        self.context = Some(context);
        self
    }

    pub fn local_storage(mut self, local_storage: LocalStorage) -> Self {
        self.local_storage = Some(local_storage);
        self
    }

    pub fn cookie_jar(mut self, cookies: CookieJarHandle) -> Self {
        self.cookies = Some(cookies);
        self
    }

    pub fn server_rendering(mut self, on: bool) -> Self {
        self.server_rendering = on;
        self
    }

    pub fn secure_context(mut self, on: bool) -> Self {
        self.secure_context = on;
        self
    }

    /// Runtime used for timers and listeners.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(Some(handle));
        self
    }

    /// Disables background tasks; changes are then only picked up by `sync()`.
    pub fn without_timers(mut self) -> Self {
        self.runtime = Some(None);
        self
    }

    pub fn build(self) -> Environment {
        Environment {
            context: self.context.unwrap_or_default(),
            local_storage: self.local_storage,
            cookies: self.cookies.unwrap_or_else(DefaultCookieJar::shared),
            server_rendering: self.server_rendering,
            secure_context: self.secure_context,
            runtime: self.runtime.unwrap_or_else(|| Handle::try_current().ok()),
        }
    }
}
