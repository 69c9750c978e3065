//! Cookies: the [`CookieJar`] service and its implementations.
//!
//! The cookie session store never touches cookies directly; it goes through a
//! [`CookieJarHandle`] taken from the [`Environment`](crate::Environment).
//! Which jar sits behind the handle depends on where the code runs:
//!
//! - [`DefaultCookieJar`]: the browser's cookie jar (`document.cookie`),
//!   shared by every browsing context. Expiry aware, and publishes a
//!   [`CookieChange`] for every mutation so stores can skip polling.
//! - [`RequestCookieJar`]: server rendering. Seeded from the incoming
//!   request's `Cookie` header; writes are collected and rendered as
//!   `Set-Cookie` headers for the response.

mod cookies;
mod cookie_jar;
mod request_jar;

pub use cookies::{Cookie, CookieChange, CookieChanges, CookieJarHandle, CookieOptions, MAX_COOKIE_SIZE};
pub use cookies::{decode_value, encode_value};
pub(crate) use cookies::check_size;

pub use cookie_jar::{CookieJar, DefaultCookieJar};
pub use request_jar::RequestCookieJar;
