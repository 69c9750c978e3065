//! Cookie core types.
//!
//! This module defines the **type-erased handle** used by the stores, the
//! [`Cookie`] record, the [`CookieOptions`] passed on every write, and the
//! wire helpers (value encoding, `Set-Cookie` rendering, size limit).
//!
//! # Concurrency model
//! - [`CookieJarHandle`] is `Arc<RwLock<dyn CookieJar + Send + Sync>>`.
//!   Callers take a **read lock** for `read` and a **write lock** for `write`
//!   and `clear`.
//!
//! ```rust
//! use gosub_session_store::cookies::{CookieJarHandle, CookieOptions, DefaultCookieJar};
//!
//! let jar: CookieJarHandle = DefaultCookieJar::shared();
//! jar.write().unwrap().write("session", r#"{"a":1}"#, &CookieOptions::default()).unwrap();
//! assert_eq!(jar.read().unwrap().read("session").as_deref(), Some(r#"{"a":1}"#));
//! ```

use crate::config::SameSite;
use crate::cookies::CookieJar;
use crate::errors::QuotaExceeded;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::sync::{Arc, RwLock};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tokio::sync::broadcast;

/// A handle to a cookie jar trait.
///
/// This is a reference-counted, read/write-locked pointer to a type-erased
/// [`CookieJar`]. Obtain a **read lock** for queries and a **write lock** for
/// mutations.
pub type CookieJarHandle = Arc<RwLock<dyn CookieJar + Send + Sync>>;

/// Receiver for native cookie change notifications.
pub type CookieChanges = broadcast::Receiver<CookieChange>;

/// Browsers drop cookies whose name plus value exceed this many bytes.
pub const MAX_COOKIE_SIZE: usize = 4096;

/// Characters that cannot appear raw in a cookie value.
const COOKIE_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b',')
    .add(b';')
    .add(b'\\')
    .add(b'%');

/// Attributes of a cookie write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    /// `Domain` attribute; host-only if `None`.
    pub domain: Option<String>,
    /// `Path` attribute.
    pub path: Option<String>,
    pub secure: bool,
    pub same_site: Option<SameSite>,
    /// Absolute expiration; `None` is a session cookie. A past instant deletes the cookie.
    pub expires: Option<OffsetDateTime>,
}

impl CookieOptions {
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }
}

/// A cookie as held by a jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name (case-sensitive).
    pub name: String,
    /// Decoded value.
    pub value: String,
    pub options: CookieOptions,
}

impl Cookie {
    /// Renders the cookie as a `Set-Cookie` header value.
    pub fn to_set_cookie(&self) -> String {
        let mut header = format!("{}={}", self.name, encode_value(&self.value));
        if let Some(domain) = &self.options.domain {
            header.push_str(&format!("; Domain={domain}"));
        }
        if let Some(path) = &self.options.path {
            header.push_str(&format!("; Path={path}"));
        }
        if let Some(expires) = self.options.expires.and_then(format_expires) {
            header.push_str(&format!("; Expires={expires}"));
        }
        if self.options.secure {
            header.push_str("; Secure");
        }
        if let Some(same_site) = self.options.same_site {
            header.push_str(&format!("; SameSite={same_site}"));
        }
        header
    }
}

/// Notification that a cookie changed. `value` is `None` when it was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieChange {
    pub name: String,
    pub value: Option<String>,
}

/// Percent-encodes the characters not allowed in a cookie value.
pub fn encode_value(value: &str) -> String {
    utf8_percent_encode(value, COOKIE_VALUE).to_string()
}

pub fn decode_value(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// IMF-fixdate, e.g. `Wed, 21 Oct 2015 07:28:00 GMT`.
fn format_expires(at: OffsetDateTime) -> Option<String> {
    at.to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
        ))
        .ok()
}

pub(crate) fn check_size(name: &str, value: &str) -> anyhow::Result<()> {
    let bytes = name.len() + encode_value(value).len();
    if bytes > MAX_COOKIE_SIZE {
        return Err(QuotaExceeded {
            bytes,
            limit: MAX_COOKIE_SIZE,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn encoding_roundtrip_of_json() {
        let raw = r#"{"authenticated":{"token":"a b;c,d"}}"#;
        let encoded = encode_value(raw);
        assert!(!encoded.contains(';'));
        assert!(!encoded.contains(' '));
        assert!(!encoded.contains('"'));
        assert!(!encoded.contains(','));
        assert_eq!(decode_value(&encoded), raw);
    }

    #[test]
    fn set_cookie_with_all_attributes() {
        let cookie = Cookie {
            name: "session".into(),
            value: "{\"a\":1}".into(),
            options: CookieOptions {
                domain: Some("example.com".into()),
                path: Some("/".into()),
                secure: true,
                same_site: Some(SameSite::Lax),
                expires: Some(datetime!(2015-10-21 07:28:00 UTC)),
            },
        };
        assert_eq!(
            cookie.to_set_cookie(),
            "session={%22a%22:1}; Domain=example.com; Path=/; \
             Expires=Wed, 21 Oct 2015 07:28:00 GMT; Secure; SameSite=Lax"
        );
    }

    #[test]
    fn set_cookie_minimal() {
        let cookie = Cookie {
            name: "session".into(),
            value: "abc".into(),
            options: CookieOptions::default(),
        };
        assert_eq!(cookie.to_set_cookie(), "session=abc");
    }

    #[test]
    fn expires_is_rendered_in_gmt() {
        let at = datetime!(2030-01-01 02:00:00 +02:00);
        assert_eq!(format_expires(at).as_deref(), Some("Tue, 01 Jan 2030 00:00:00 GMT"));
    }

    #[test]
    fn expiry_check() {
        let now = datetime!(2030-01-01 00:00:00 UTC);
        let mut opts = CookieOptions::default();
        assert!(!opts.is_expired_at(now));
        opts.expires = Some(datetime!(2029-12-31 23:59:59 UTC));
        assert!(opts.is_expired_at(now));
        opts.expires = Some(datetime!(2030-01-01 00:00:01 UTC));
        assert!(!opts.is_expired_at(now));
    }

    #[test]
    fn size_limit() {
        assert!(check_size("session", "small").is_ok());
        let err = check_size("session", &"x".repeat(MAX_COOKIE_SIZE)).unwrap_err();
        let quota = err.downcast_ref::<QuotaExceeded>().unwrap();
        assert_eq!(quota.limit, MAX_COOKIE_SIZE);
        assert_eq!(quota.bytes, "session".len() + MAX_COOKIE_SIZE);
    }
}
