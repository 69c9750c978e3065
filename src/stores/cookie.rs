//! Cookie-backed session store.
//!
//! The session is written as JSON into one cookie. When an expiration time
//! applies, a companion cookie `<name>-expiration_time` stores it in seconds,
//! so a later page load that was configured without one still keeps the
//! sliding lifetime. The lifetime slides forward on every write, on restore,
//! on explicit [`CookieStore::renew`], and from a background task.
//!
//! Lock order is config, then jar. The snapshot lock, when taken, comes first.

use super::bus::{Snapshot, StoreBus};
use super::worker::{drain, spawn_listener, spawn_ticker};
use super::{lock, read_lock, write_lock, BackendKind, SessionStore, Subscription};
use crate::config::{self, CookieConfig, StoreConfig};
use crate::cookies::{check_size, CookieChanges, CookieJar, CookieJarHandle, CookieOptions};
use crate::data::SessionData;
use crate::environment::Environment;
use crate::errors::StoreError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

type Jar = dyn CookieJar + Send + Sync;

/// Persists session data in a cookie.
pub struct CookieStore {
    inner: Arc<CookieInner>,
    cancel: CancellationToken,
}

struct CookieInner {
    config: RwLock<CookieConfig>,
    jar: CookieJarHandle,
    secure_context: bool,
    /// Jar changes waiting for `sync()` when no runtime listens for them.
    pending: Mutex<Option<CookieChanges>>,
    snapshot: Snapshot,
    destroyed: AtomicBool,
}

impl CookieStore {
    pub fn new(config: &StoreConfig, env: &Environment) -> Self {
        Self::with_bus(config, env, StoreBus::default())
    }

    pub(crate) fn with_bus(config: &StoreConfig, env: &Environment, bus: StoreBus) -> Self {
        let jar = env.cookie_jar();
        let mut cookie = config.cookie.clone();
        let (initial, changes) = {
            let jar = read_lock(&jar);
            if cookie.expiration_time.is_none() {
                cookie.expiration_time = cached_expiration_time(&*jar, &cookie);
            }
            let initial = SessionData::parse_stored(jar.read(&cookie.name).as_deref(), "cookie");
            (initial, jar.subscribe())
        };

        let inner = Arc::new(CookieInner {
            config: RwLock::new(cookie),
            jar,
            secure_context: env.is_secure_context(),
            pending: Mutex::new(None),
            snapshot: Snapshot::new(initial, bus),
            destroyed: AtomicBool::new(false),
        });

        let cancel = CancellationToken::new();
        match env.timers() {
            Some(handle) => {
                let watcher = inner.clone();
                match changes {
                    Some(rx) => spawn_listener(handle, cancel.clone(), rx, "cookie change listener", move |_| {
                        watcher.refresh()
                    }),
                    None => spawn_ticker(handle, cancel.clone(), config.sync_interval, "cookie sync", move || {
                        watcher.refresh()
                    }),
                }

                let renewer = inner.clone();
                spawn_ticker(handle, cancel.clone(), config.renew_interval, "cookie renew", move || {
                    if let Err(e) = renewer.renew() {
                        log::warn!("Periodic session cookie renew failed: {e}");
                    }
                });
            }
            None => *lock(&inner.pending) = changes,
        }

        if let Err(e) = inner.renew() {
            log::warn!("Initial session cookie renew failed: {e}");
        }

        Self { inner, cancel }
    }

    /// The effective cookie settings, including an adopted cached expiration time.
    pub fn config(&self) -> CookieConfig {
        read_lock(&self.inner.config).clone()
    }

    /// Re-writes the session cookie with a fresh expiration.
    ///
    /// Does nothing when there is no session data or no expiration time applies.
    pub fn renew(&self) -> Result<(), StoreError> {
        self.ensure_alive()?;
        self.inner.renew()
    }

    /// Changes the cookie settings and moves the existing session along.
    ///
    /// If name, domain or path change, the cookies written under the old
    /// settings are deleted. Dropping the expiration time deletes the
    /// companion cookie and turns the session cookie into a browser-session
    /// cookie. Existing data is re-written with the new attributes.
    pub fn reconfigure(&self, f: impl FnOnce(&mut CookieConfig)) -> Result<(), StoreError> {
        self.ensure_alive()?;
        let mut current = write_lock(&self.inner.config);
        let mut updated = current.clone();
        f(&mut updated);
        config::validate_cookie(&updated)?;
        if updated == *current {
            return Ok(());
        }

        let secure_context = self.inner.secure_context;
        let mut jar = write_lock(&self.inner.jar);
        let raw = jar
            .read(&current.name)
            .filter(|raw| !SessionData::parse_stored(Some(raw.as_str()), "cookie").is_empty());

        if current.identity_differs(&updated) {
            delete_cookies(&mut *jar, &current, secure_context);
        } else if current.expiration_time.is_some() && updated.expiration_time.is_none() {
            let options = cookie_options(&current, secure_context, None);
            jar.clear(&current.expiration_cookie_name(), &options);
        }

        if let Some(raw) = raw {
            let expires = expiration(&*jar, &updated);
            if let Err(e) = write_session(&mut *jar, &updated, secure_context, &raw, expires) {
                // put the session back where it was
                let expires = expiration(&*jar, &current);
                if let Err(restore_err) = write_session(&mut *jar, &current, secure_context, &raw, expires) {
                    log::error!("Could not restore session cookie after failed reconfigure: {restore_err}");
                }
                return Err(e.into());
            }
        }

        log::debug!("Session cookie reconfigured: {:?} -> {:?}", current.name, updated.name);
        *current = updated;
        Ok(())
    }

    fn ensure_alive(&self) -> Result<(), StoreError> {
        if self.inner.destroyed.load(Ordering::Acquire) {
            return Err(StoreError::Destroyed);
        }
        Ok(())
    }
}

impl Drop for CookieStore {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl CookieInner {
    fn read(&self) -> SessionData {
        let config = read_lock(&self.config);
        let jar = read_lock(&self.jar);
        SessionData::parse_stored(jar.read(&config.name).as_deref(), "cookie")
    }

    fn refresh(&self) {
        if self.destroyed.load(Ordering::Acquire) {
            return;
        }
        self.snapshot.refresh_with(|| self.read());
    }

    fn renew(&self) -> Result<(), StoreError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Ok(());
        }
        let config = read_lock(&self.config);
        let mut jar = write_lock(&self.jar);

        let Some(raw) = jar.read(&config.name) else {
            return Ok(());
        };
        if SessionData::parse_stored(Some(raw.as_str()), "cookie").is_empty() {
            return Ok(());
        }
        let Some(expires) = expiration(&*jar, &config) else {
            return Ok(());
        };
        write_session(&mut *jar, &config, self.secure_context, &raw, Some(expires))?;
        log::trace!("Session cookie {:?} renewed until {expires}", config.name);
        Ok(())
    }
}

/// The companion cookie's value, if it holds a number of seconds.
fn cached_expiration_time(jar: &Jar, config: &CookieConfig) -> Option<u64> {
    let raw = jar.read(&config.expiration_cookie_name())?;
    match raw.trim().parse() {
        Ok(secs) => Some(secs),
        Err(_) => {
            log::warn!("Ignoring unparsable session cookie expiration time {raw:?}");
            None
        }
    }
}

/// Configured expiration time, else the cached one, as an absolute instant from now.
fn expiration(jar: &Jar, config: &CookieConfig) -> Option<OffsetDateTime> {
    let secs = config
        .expiration_time
        .or_else(|| cached_expiration_time(jar, config))?;
    let secs = i64::try_from(secs).unwrap_or(i64::MAX);
    OffsetDateTime::now_utc().checked_add(time::Duration::seconds(secs))
}

fn cookie_options(config: &CookieConfig, secure_context: bool, expires: Option<OffsetDateTime>) -> CookieOptions {
    CookieOptions {
        domain: config.domain.clone(),
        path: Some(config.path.clone()),
        secure: config.secure.unwrap_or(secure_context),
        same_site: config.same_site,
        expires,
    }
}

/// Writes the session cookie and, when it expires, the companion cookie with the same attributes.
///
/// Both cookies are size-checked before either is written, so an oversized
/// pair leaves the jar untouched.
fn write_session(
    jar: &mut Jar,
    config: &CookieConfig,
    secure_context: bool,
    raw: &str,
    expires: Option<OffsetDateTime>,
) -> anyhow::Result<()> {
    let companion = match expires {
        Some(_) => config
            .expiration_time
            .or_else(|| cached_expiration_time(&*jar, config))
            .map(|secs| (config.expiration_cookie_name(), secs.to_string())),
        None => None,
    };

    check_size(&config.name, raw)?;
    if let Some((name, secs)) = &companion {
        check_size(name, secs)?;
    }

    let options = cookie_options(config, secure_context, expires);
    jar.write(&config.name, raw, &options)?;
    if let Some((name, secs)) = &companion {
        jar.write(name, secs, &options)?;
    }
    Ok(())
}

fn delete_cookies(jar: &mut Jar, config: &CookieConfig, secure_context: bool) {
    let options = cookie_options(config, secure_context, None);
    jar.clear(&config.name, &options);
    jar.clear(&config.expiration_cookie_name(), &options);
}

impl SessionStore for CookieStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Cookie
    }

    fn persist(&self, data: &SessionData) -> Result<(), StoreError> {
        self.ensure_alive()?;
        let raw = data.to_json()?;
        self.inner.snapshot.persist_with(data, || {
            let config = read_lock(&self.inner.config);
            let mut jar = write_lock(&self.inner.jar);
            let expires = expiration(&*jar, &config);
            write_session(&mut *jar, &config, self.inner.secure_context, &raw, expires).map_err(StoreError::from)
        })
    }

    fn restore(&self) -> SessionData {
        if self.inner.destroyed.load(Ordering::Acquire) {
            return SessionData::new();
        }
        let data = self.inner.read();
        if !data.is_empty() {
            if let Err(e) = self.inner.renew() {
                log::warn!("Session cookie renew on restore failed: {e}");
            }
        }
        data
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.ensure_alive()?;
        self.inner.snapshot.clear_with(|| {
            let config = read_lock(&self.inner.config);
            let mut jar = write_lock(&self.inner.jar);
            delete_cookies(&mut *jar, &config, self.inner.secure_context);
            Ok(())
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
        log::debug!("Cookie session store destroyed");
    }
}
