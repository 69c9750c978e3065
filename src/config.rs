//! Store configuration.
//!
//! [`StoreConfig`] holds every option the session stores understand: the key
//! used by the local storage backend, the cookie settings used by the cookie
//! backend, and the intervals of the background tasks. The adaptive store
//! accepts the union of both backends' options, so a single config serves all
//! of them.
//!
//! `StoreConfig` provides defaults via [`Default`] and a fluent
//! [`StoreConfig::builder()`] with validation.
//!
//! # Examples
//!
//! ## Use defaults
//! ```rust
//! use gosub_session_store::config::StoreConfig;
//! let cfg = StoreConfig::default();
//! assert_eq!(cfg.cookie.name, "session");
//! assert_eq!(cfg.cookie.path, "/");
//! ```
//!
//! ## Customize with the builder
//! ```rust
//! use gosub_session_store::config::{SameSite, StoreConfig};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = StoreConfig::builder()
//!     .cookie_name("app:session")
//!     .cookie_expiration_time(3600)
//!     .cookie_domain("example.com")
//!     .same_site(SameSite::Lax)
//!     .build()?; // returns Result<StoreConfig, ConfigError>
//! # Ok(()) }
//! ```
//!
//! # Fields (summary)
//! - `local_storage_key`: key of the local storage entry (default `simple_auth-session`).
//! - `cookie.name`: session cookie name (default `session`).
//! - `cookie.expiration_time`: lifetime in seconds; `None` means a session cookie.
//! - `cookie.domain`: optional `Domain` attribute.
//! - `cookie.path`: `Path` attribute (default `/`).
//! - `cookie.same_site`: optional `SameSite` attribute.
//! - `cookie.secure`: force the `Secure` flag; `None` follows the environment.
//! - `sync_interval`: how often the cookie backend polls for changes (default 500ms).
//! - `renew_interval`: how often the cookie backend extends its expiration (default 60s).
//!
//! # Errors
//!
//! Builder validation returns [`ConfigError`] for unusable values (empty or
//! malformed cookie names, relative paths, zero intervals, empty keys).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_LOCAL_STORAGE_KEY: &str = "simple_auth-session";
pub const DEFAULT_COOKIE_NAME: &str = "session";
pub const DEFAULT_COOKIE_PATH: &str = "/";
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_RENEW_INTERVAL: Duration = Duration::from_secs(60);

/// Expiration times below this can lapse before the periodic renew extends them.
pub const RECOMMENDED_MIN_EXPIRATION_TIME: u64 = 90;

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => write!(f, "Strict"),
            SameSite::Lax => write!(f, "Lax"),
            SameSite::None => write!(f, "None"),
        }
    }
}

/// Settings of the session cookie (and its `-expiration_time` companion).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    /// Lifetime in seconds. `None` writes session cookies.
    pub expiration_time: Option<u64>,
    pub domain: Option<String>,
    pub path: String,
    pub same_site: Option<SameSite>,
    /// `None` derives the flag from the environment's secure context.
    pub secure: Option<bool>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            expiration_time: None,
            domain: None,
            path: DEFAULT_COOKIE_PATH.to_string(),
            same_site: None,
            secure: None,
        }
    }
}

impl CookieConfig {
    /// Name of the companion cookie that caches the expiration time.
    pub fn expiration_cookie_name(&self) -> String {
        expiration_cookie_name(&self.name)
    }

    /// True when name, domain or path differ, i.e. the cookie lives somewhere else.
    pub(crate) fn identity_differs(&self, other: &CookieConfig) -> bool {
        self.name != other.name || self.domain != other.domain || self.path != other.path
    }

    /// Copies into `self` only the fields that differ between `from` and `to`.
    ///
    /// Fields a store resolved on its own (an adopted cached expiration time)
    /// survive unrelated edits.
    pub(crate) fn apply_changes(&mut self, from: &CookieConfig, to: &CookieConfig) {
        if from.name != to.name {
            self.name = to.name.clone();
        }
        if from.expiration_time != to.expiration_time {
            self.expiration_time = to.expiration_time;
        }
        if from.domain != to.domain {
            self.domain = to.domain.clone();
        }
        if from.path != to.path {
            self.path = to.path.clone();
        }
        if from.same_site != to.same_site {
            self.same_site = to.same_site;
        }
        if from.secure != to.secure {
            self.secure = to.secure;
        }
    }
}

pub(crate) fn expiration_cookie_name(name: &str) -> String {
    format!("{name}-expiration_time")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub local_storage_key: String,
    pub cookie: CookieConfig,
    pub sync_interval: Duration,
    pub renew_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            local_storage_key: DEFAULT_LOCAL_STORAGE_KEY.to_string(),
            cookie: CookieConfig::default(),
            sync_interval: DEFAULT_SYNC_INTERVAL,
            renew_interval: DEFAULT_RENEW_INTERVAL,
        }
    }
}

impl StoreConfig {
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }
}

/// Builder for [`StoreConfig`].
#[derive(Debug, Clone, Default)]
pub struct StoreConfigBuilder {
    inner: StoreConfig,
}

impl StoreConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut StoreConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn local_storage_key<S: Into<String>>(self, key: S) -> Self { self.map(|c| c.local_storage_key = key.into()) }
    pub fn cookie_name<S: Into<String>>(self, name: S) -> Self { self.map(|c| c.cookie.name = name.into()) }
    pub fn cookie_expiration_time(self, secs: u64) -> Self { self.map(|c| c.cookie.expiration_time = Some(secs)) }
    pub fn cookie_domain<S: Into<String>>(self, domain: S) -> Self { self.map(|c| c.cookie.domain = Some(domain.into())) }
    pub fn cookie_path<S: Into<String>>(self, path: S) -> Self { self.map(|c| c.cookie.path = path.into()) }
    pub fn same_site(self, same_site: SameSite) -> Self { self.map(|c| c.cookie.same_site = Some(same_site)) }
    pub fn secure(self, on: bool) -> Self { self.map(|c| c.cookie.secure = Some(on)) }
    pub fn sync_interval(self, interval: Duration) -> Self { self.map(|c| c.sync_interval = interval) }
    pub fn renew_interval(self, interval: Duration) -> Self { self.map(|c| c.renew_interval = interval) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut StoreConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<StoreConfig, ConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyCookieName,
    InvalidCookieName(String),
    RelativeCookiePath(String),
    EmptyLocalStorageKey,
    ZeroInterval(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyCookieName =>
                write!(f, "cookie name must not be empty"),
            ConfigError::InvalidCookieName(name) =>
                write!(f, "cookie name {name:?} contains separators, whitespace or control characters"),
            ConfigError::RelativeCookiePath(path) =>
                write!(f, "cookie path {path:?} must start with '/'"),
            ConfigError::EmptyLocalStorageKey =>
                write!(f, "local storage key must not be empty"),
            ConfigError::ZeroInterval(which) =>
                write!(f, "{which} must be greater than zero"),
        }
    }
}
impl std::error::Error for ConfigError {}

pub(crate) fn validate(c: &StoreConfig) -> Result<(), ConfigError> {
    if c.local_storage_key.is_empty() {
        return Err(ConfigError::EmptyLocalStorageKey);
    }
    if c.sync_interval.is_zero() {
        return Err(ConfigError::ZeroInterval("sync_interval"));
    }
    if c.renew_interval.is_zero() {
        return Err(ConfigError::ZeroInterval("renew_interval"));
    }
    validate_cookie(&c.cookie)
}

pub(crate) fn validate_cookie(c: &CookieConfig) -> Result<(), ConfigError> {
    if c.name.is_empty() {
        return Err(ConfigError::EmptyCookieName);
    }
    let bad = |ch: char| ch.is_whitespace() || ch.is_control() || matches!(ch, ';' | ',' | '=');
    if c.name.chars().any(bad) {
        return Err(ConfigError::InvalidCookieName(c.name.clone()));
    }
    if !c.path.starts_with('/') {
        return Err(ConfigError::RelativeCookiePath(c.path.clone()));
    }
    if let Some(secs) = c.expiration_time {
        if secs < RECOMMENDED_MIN_EXPIRATION_TIME {
            log::warn!(
                "cookie expiration time of {secs}s is below the recommended minimum of {RECOMMENDED_MIN_EXPIRATION_TIME}s; \
                 the cookie may expire before it is renewed"
            );
        }
    }
    Ok(())
}
