//! Cookie jar bound to a single server-rendered request.
//!
//! During server rendering there is no browser jar. The incoming request's
//! `Cookie` header is the only source for reads, and anything the page
//! writes has to travel back as `Set-Cookie` headers on the response.
//! [`RequestCookieJar`] covers both directions.
//!
//! ```rust
//! use gosub_session_store::cookies::{CookieJar, CookieOptions, RequestCookieJar};
//! use http::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
//!
//! let mut request = HeaderMap::new();
//! request.insert(COOKIE, HeaderValue::from_static("session=%7B%22a%22%3A1%7D; theme=dark"));
//!
//! let mut jar = RequestCookieJar::from_request_headers(&request);
//! assert_eq!(jar.read("session").as_deref(), Some(r#"{"a":1}"#));
//!
//! jar.write("theme", "light", &CookieOptions::default()).unwrap();
//! let response = jar.response_headers();
//! assert_eq!(response.get(SET_COOKIE).unwrap(), "theme=light");
//! ```

use crate::cookies::cookies::{check_size, decode_value, Cookie, CookieOptions};
use crate::cookies::CookieJar;
use anyhow::Result;
use http::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use std::collections::HashMap;
use time::OffsetDateTime;

/// Request/response cookie jar for server rendering.
#[derive(Debug, Clone, Default)]
pub struct RequestCookieJar {
    /// Cookies sent by the client, decoded.
    incoming: HashMap<String, String>,
    /// Cookies written while handling the request, in write order. One entry
    /// per (name, domain, path), the way a browser stores them.
    outgoing: Vec<Cookie>,
}

impl RequestCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the jar from every `Cookie` header of the request.
    pub fn from_request_headers(headers: &HeaderMap) -> Self {
        let mut incoming = HashMap::new();
        for header in headers.get_all(COOKIE) {
            let Ok(header_str) = header.to_str() else {
                log::warn!("Skipping non-ASCII Cookie header");
                continue;
            };
            for pair in header_str.split(';') {
                if let Some((name, value)) = pair.split_once('=') {
                    let name = name.trim();
                    if !name.is_empty() {
                        incoming.insert(name.to_string(), decode_value(value.trim()));
                    }
                }
            }
        }
        Self {
            incoming,
            outgoing: Vec::new(),
        }
    }

    /// Cookies written so far, last write per name, domain and path.
    pub fn outgoing(&self) -> &[Cookie] {
        &self.outgoing
    }

    /// Renders the written cookies as `Set-Cookie` response headers.
    pub fn response_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for cookie in &self.outgoing {
            match HeaderValue::from_str(&cookie.to_set_cookie()) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(e) => log::error!("Cannot render Set-Cookie for {:?}: {}", cookie.name, e),
            }
        }
        headers
    }
}

impl CookieJar for RequestCookieJar {
    fn read(&self, name: &str) -> Option<String> {
        let mut written = self.outgoing.iter().filter(|c| c.name == name).peekable();
        if written.peek().is_none() {
            return self.incoming.get(name).cloned();
        }
        // Latest live write wins; if every write was a deletion the cookie is gone.
        let now = OffsetDateTime::now_utc();
        written
            .filter(|c| !c.options.is_expired_at(now))
            .last()
            .map(|c| c.value.clone())
    }

    fn write(&mut self, name: &str, value: &str, options: &CookieOptions) -> Result<()> {
        check_size(name, value)?;

        let cookie = Cookie {
            name: name.to_string(),
            value: value.to_string(),
            options: options.clone(),
        };
        self.outgoing.retain(|c| !same_cookie(c, &cookie));
        self.outgoing.push(cookie);
        Ok(())
    }

    fn clear(&mut self, name: &str, options: &CookieOptions) {
        let expired = CookieOptions {
            expires: Some(OffsetDateTime::UNIX_EPOCH),
            ..options.clone()
        };
        // An empty value always fits.
        let _ = self.write(name, "", &expired);
    }
}

fn same_cookie(a: &Cookie, b: &Cookie) -> bool {
    a.name == b.name && a.options.domain == b.options.domain && a.options.path == b.options.path
}
