//! Serializable cookie store for the portal session.
//!
//! `reqwest`'s built-in jar can neither be enumerated nor swapped out,
//! but the session needs both for persistence and for cookie assignment
//! with rollback. This store keeps the cookies in plain data behind an
//! `RwLock` and plugs into the client through
//! [`reqwest::cookie::CookieStore`].

use std::fmt;
use std::sync::RwLock;

use cookie::Cookie;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

/// One cookie held by the session.
///
/// The value is intentionally private and redacted in Debug output; portal
/// session cookies are credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    /// Host the cookie belongs to, without a leading dot.
    pub domain: String,
    /// URL path scope.
    pub path: String,
    /// Cookie name.
    pub name: String,
    /// Whether the cookie is only sent over HTTPS.
    pub secure: bool,
    value: String,
}

impl StoredCookie {
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        path: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            path: path.into(),
            name: name.into(),
            secure: false,
            value: value.into(),
        }
    }

    /// Returns the cookie value. Sensitive; avoid logging it.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    fn key(&self) -> (String, String, String) {
        (self.domain.clone(), self.path.clone(), self.name.clone())
    }

    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let domain_ok = host == self.domain || host.ends_with(&format!(".{}", self.domain));
        let path_ok = self.path == "/" || url.path().starts_with(&self.path);
        let scheme_ok = !self.secure || url.scheme() == "https";
        domain_ok && path_ok && scheme_ok
    }
}

impl fmt::Debug for StoredCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCookie")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("name", &self.name)
            .field("secure", &self.secure)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// The session's cookie jar.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: RwLock<Vec<StoredCookie>>,
}

impl CookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies out the current cookies, e.g. for persistence or a rollback
    /// point before a risky operation.
    #[must_use]
    pub fn snapshot(&self) -> Vec<StoredCookie> {
        self.cookies.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replaces the jar contents wholesale.
    pub fn replace(&self, cookies: Vec<StoredCookie>) {
        *self.cookies.write().unwrap_or_else(|e| e.into_inner()) = cookies;
    }

    pub fn clear(&self) {
        self.cookies.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.read().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    fn upsert(&self, cookie: StoredCookie) {
        let mut cookies = self.cookies.write().unwrap_or_else(|e| e.into_inner());
        let key = cookie.key();
        if let Some(existing) = cookies.iter_mut().find(|c| c.key() == key) {
            *existing = cookie;
        } else {
            cookies.push(cookie);
        }
    }

    fn remove(&self, domain: &str, path: &str, name: &str) {
        self.cookies
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|c| !(c.domain == domain && c.path == path && c.name == name));
    }

    fn store_header(&self, header: &HeaderValue, url: &Url) {
        let Ok(raw) = header.to_str() else {
            warn!("skipping Set-Cookie header with non-ASCII bytes");
            return;
        };
        let parsed = match Cookie::parse(raw.to_owned()) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "skipping malformed Set-Cookie header");
                return;
            }
        };

        let domain = parsed
            .domain()
            .map(|d| d.trim_start_matches('.').to_owned())
            .or_else(|| url.host_str().map(str::to_owned));
        let Some(domain) = domain else { return };

        let path = parsed
            .path()
            .map(str::to_owned)
            .unwrap_or_else(|| default_path(url));

        // Max-Age=0 (or negative) is the portal's way of deleting a cookie.
        if parsed.max_age().is_some_and(|age| age.whole_seconds() <= 0) {
            debug!(name = parsed.name(), "removing cookie per Max-Age");
            self.remove(&domain, &path, parsed.name());
            return;
        }

        let stored = StoredCookie {
            domain,
            path,
            name: parsed.name().to_owned(),
            secure: parsed.secure().unwrap_or(false),
            value: parsed.value().to_owned(),
        };
        debug!(domain = %stored.domain, name = %stored.name, "stored cookie");
        self.upsert(stored);
    }
}

/// Default path per RFC 6265: the request path up to its last slash.
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_owned(),
        Some(idx) => path[..idx].to_owned(),
    }
}

impl reqwest::cookie::CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            self.store_header(header, url);
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let cookies = self.cookies.read().unwrap_or_else(|e| e.into_inner());
        let header = cookies
            .iter()
            .filter(|c| c.matches(url))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");
        if header.is_empty() {
            None
        } else {
            HeaderValue::from_str(&header).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::cookie::CookieStore;

    fn url(s: &str) -> Url {
        s.parse().unwrap()
    }

    fn set(jar: &CookieJar, header: &str, origin: &str) {
        let value = HeaderValue::from_str(header).unwrap();
        jar.set_cookies(&mut [&value].into_iter(), &url(origin));
    }

    #[test]
    fn stores_and_returns_cookie_for_matching_host() {
        let jar = CookieJar::new();
        set(&jar, "JSESSIONID=abc123; Path=/", "https://i.sjtu.edu.cn/login");

        let header = jar.cookies(&url("https://i.sjtu.edu.cn/xtgl/index.html")).unwrap();
        assert_eq!(header.to_str().unwrap(), "JSESSIONID=abc123");
    }

    #[test]
    fn does_not_leak_across_hosts() {
        let jar = CookieJar::new();
        set(&jar, "JSESSIONID=abc123; Path=/", "https://i.sjtu.edu.cn/");

        assert!(jar.cookies(&url("https://example.com/")).is_none());
    }

    #[test]
    fn subdomain_matches_parent_domain_cookie() {
        let jar = CookieJar::new();
        set(
            &jar,
            "token=t1; Domain=.sjtu.edu.cn; Path=/",
            "https://jaccount.sjtu.edu.cn/jaccount/ulogin",
        );

        assert!(jar.cookies(&url("https://i.sjtu.edu.cn/")).is_some());
    }

    #[test]
    fn secure_cookie_not_sent_over_http() {
        let jar = CookieJar::new();
        set(&jar, "sid=s; Path=/; Secure", "https://i.sjtu.edu.cn/");

        assert!(jar.cookies(&url("http://i.sjtu.edu.cn/")).is_none());
        assert!(jar.cookies(&url("https://i.sjtu.edu.cn/")).is_some());
    }

    #[test]
    fn set_cookie_overwrites_same_name() {
        let jar = CookieJar::new();
        set(&jar, "sid=old; Path=/", "https://i.sjtu.edu.cn/");
        set(&jar, "sid=new; Path=/", "https://i.sjtu.edu.cn/");

        let header = jar.cookies(&url("https://i.sjtu.edu.cn/")).unwrap();
        assert_eq!(header.to_str().unwrap(), "sid=new");
    }

    #[test]
    fn max_age_zero_deletes_cookie() {
        let jar = CookieJar::new();
        set(&jar, "sid=s; Path=/", "https://i.sjtu.edu.cn/");
        set(&jar, "sid=s; Path=/; Max-Age=0", "https://i.sjtu.edu.cn/");

        assert!(jar.is_empty());
    }

    #[test]
    fn snapshot_and_replace_round_trip() {
        let jar = CookieJar::new();
        set(&jar, "sid=s1; Path=/", "https://i.sjtu.edu.cn/");
        let backup = jar.snapshot();

        set(&jar, "sid=s2; Path=/", "https://i.sjtu.edu.cn/");
        jar.replace(backup);

        let header = jar.cookies(&url("https://i.sjtu.edu.cn/")).unwrap();
        assert_eq!(header.to_str().unwrap(), "sid=s1");
    }

    #[test]
    fn path_scoping_is_honored() {
        let jar = CookieJar::new();
        set(&jar, "scoped=v; Path=/xsxk", "https://i.sjtu.edu.cn/");

        assert!(jar.cookies(&url("https://i.sjtu.edu.cn/xsxk/page.html")).is_some());
        assert!(jar.cookies(&url("https://i.sjtu.edu.cn/kbcx/page.html")).is_none());
    }

    #[test]
    fn debug_output_redacts_value() {
        let cookie = StoredCookie::new("i.sjtu.edu.cn", "/", "sid", "super_secret");
        let debug = format!("{cookie:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super_secret"));
    }

    #[test]
    fn serde_round_trip_preserves_value() {
        let cookie = StoredCookie::new("i.sjtu.edu.cn", "/", "sid", "v");
        let json = serde_json::to_string(&cookie).unwrap();
        let back: StoredCookie = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cookie);
        assert_eq!(back.value(), "v");
    }
}
