//! Cookie jar abstraction and the browser-side implementation.
//!
//! A **cookie jar** is the cookie service the stores talk to: read a cookie
//! by name, write one with attributes, clear one. It mirrors what a page can
//! do through `document.cookie`, nothing more.
//!
//! [`DefaultCookieJar`] is the in-process stand-in for the browser's jar. One
//! instance is shared (via [`CookieJarHandle`]) by all browsing contexts of an
//! origin, which is what makes cross-context sync observable.
//!
//! ## Notes & limitations
//! - Cookies are keyed by **name** only. Domain and path are stored but not
//!   used for matching, since every reader is the same page origin.
//! - Expiration is enforced on read: an expired cookie is invisible, and a
//!   write with a past `expires` deletes the cookie.
//! - This type is **not** internally synchronized. Use it via a
//!   `CookieJarHandle = Arc<RwLock<dyn CookieJar + Send + Sync>>`.

use crate::cookies::cookies::{check_size, Cookie, CookieChange, CookieChanges, CookieJarHandle, CookieOptions};
use crate::DEFAULT_CHANNEL_CAPACITY;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use time::OffsetDateTime;
use tokio::sync::broadcast;

/// The cookie service used by the cookie session store.
pub trait CookieJar: Send + Sync {
    /// Returns the (decoded) value of the cookie `name`, or `None` if it is
    /// absent or expired.
    fn read(&self, name: &str) -> Option<String>;

    /// Writes cookie `name`, replacing any previous value.
    ///
    /// Fails with [`QuotaExceeded`](crate::errors::QuotaExceeded) when the
    /// cookie is too large; the previous value is kept in that case.
    fn write(&mut self, name: &str, value: &str, options: &CookieOptions) -> Result<()>;

    /// Deletes cookie `name`. `options` carries the domain/path it was written with.
    fn clear(&mut self, name: &str, options: &CookieOptions);

    /// Native change notifications, if the jar can provide them.
    ///
    /// Jars returning `None` are polled by the stores instead.
    fn subscribe(&self) -> Option<CookieChanges> {
        None
    }
}

/// Browser cookie jar shared by all browsing contexts of an origin.
#[derive(Debug)]
pub struct DefaultCookieJar {
    cookies: HashMap<String, Cookie>,
    tx: broadcast::Sender<CookieChange>,
}

impl Default for DefaultCookieJar {
    fn default() -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            cookies: HashMap::new(),
            tx,
        }
    }
}

impl DefaultCookieJar {
    /// Creates an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty jar behind a shareable handle.
    pub fn shared() -> CookieJarHandle {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Returns the full cookie record (with attributes) if present and not expired.
    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        let now = OffsetDateTime::now_utc();
        self.cookies
            .get(name)
            .filter(|c| !c.options.is_expired_at(now))
    }

    fn publish(&self, name: &str, value: Option<String>) {
        // No receivers is fine: nobody is listening for changes.
        let _ = self.tx.send(CookieChange {
            name: name.to_string(),
            value,
        });
    }

    fn remove(&mut self, name: &str) {
        if self.cookies.remove(name).is_some() {
            self.publish(name, None);
        }
    }
}

impl CookieJar for DefaultCookieJar {
    fn read(&self, name: &str) -> Option<String> {
        self.cookie(name).map(|c| c.value.clone())
    }

    fn write(&mut self, name: &str, value: &str, options: &CookieOptions) -> Result<()> {
        check_size(name, value)?;

        if options.is_expired_at(OffsetDateTime::now_utc()) {
            self.remove(name);
            return Ok(());
        }

        let cookie = Cookie {
            name: name.to_string(),
            value: value.to_string(),
            options: options.clone(),
        };
        let changed = self.read(name).as_deref() != Some(value);
        self.cookies.insert(name.to_string(), cookie);
        if changed {
            self.publish(name, Some(value.to_string()));
        }
        Ok(())
    }

    fn clear(&mut self, name: &str, _options: &CookieOptions) {
        self.remove(name);
    }

    fn subscribe(&self) -> Option<CookieChanges> {
        Some(self.tx.subscribe())
    }
}
