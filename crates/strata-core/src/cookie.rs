//! Request cookies and `Set-Cookie` construction.
//!
//! ```
//! use strata_core::cookie::{SameSite, SetCookie};
//!
//! let cookie = SetCookie::new("session", "abc123")
//!     .http_only(true)
//!     .same_site(SameSite::Strict)
//!     .path("/");
//!
//! assert_eq!(
//!     cookie.to_string(),
//!     "session=abc123; Path=/; HttpOnly; SameSite=Strict"
//! );
//! ```

use http::header::COOKIE;
use http::HeaderMap;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime};

/// Cookies sent by the client.
#[derive(Debug, Clone, Default)]
pub struct Cookies {
    values: HashMap<String, String>,
}

impl Cookies {
    /// Parses every `Cookie` header in `headers`.
    ///
    /// The first occurrence of a name wins.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut values = HashMap::new();
        for header in headers.get_all(COOKIE) {
            let Ok(header) = header.to_str() else {
                continue;
            };
            for pair in header.split(';') {
                if let Some((name, value)) = pair.trim().split_once('=') {
                    let value = value.trim().trim_matches('"');
                    let value = urlencoding::decode(value)
                        .map_or_else(|_| value.to_string(), |decoded| decoded.into_owned());
                    values.entry(name.trim().to_string()).or_insert(value);
                }
            }
        }
        Self { values }
    }

    /// Value of the named cookie.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Whether the named cookie was sent.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iterate over all cookies.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no cookies were sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    /// Sent with cross-site requests.
    None,
    /// Sent with same-site requests and top-level navigations.
    #[default]
    Lax,
    /// Sent with same-site requests only.
    Strict,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Lax => f.write_str("Lax"),
            Self::Strict => f.write_str("Strict"),
        }
    }
}

/// Builder for a `Set-Cookie` header value.
#[derive(Debug, Clone)]
pub struct SetCookie {
    name: String,
    value: String,
    domain: Option<String>,
    path: Option<String>,
    max_age: Option<Duration>,
    expires: Option<SystemTime>,
    secure: bool,
    http_only: bool,
    same_site: Option<SameSite>,
}

impl SetCookie {
    /// Creates a cookie; the value is percent-encoded on output.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            max_age: None,
            expires: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    /// A cookie that clears `name` on the client.
    #[must_use]
    pub fn remove(name: impl Into<String>) -> Self {
        Self::new(name, "")
            .max_age(Duration::ZERO)
            .expires(SystemTime::UNIX_EPOCH)
    }

    /// Sets `Domain`.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets `Path`.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets `Max-Age`.
    #[must_use]
    pub fn max_age(mut self, duration: Duration) -> Self {
        self.max_age = Some(duration);
        self
    }

    /// Sets `Expires`.
    #[must_use]
    pub fn expires(mut self, at: SystemTime) -> Self {
        self.expires = Some(at);
        self
    }

    /// Sets `Secure`.
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets `HttpOnly`.
    #[must_use]
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Sets `SameSite`.
    #[must_use]
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, urlencoding::encode(&self.value))?;
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={}", max_age.as_secs())?;
        }
        if let Some(expires) = self.expires {
            write!(f, "; Expires={}", httpdate::fmt_http_date(expires))?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if let Some(same_site) = self.same_site {
            write!(f, "; SameSite={same_site}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_parse_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("session=abc; theme=\"dark\""));
        headers.append(COOKIE, HeaderValue::from_static("session=later; name=a%20b"));

        let cookies = Cookies::from_headers(&headers);
        assert_eq!(cookies.get("session"), Some("abc"));
        assert_eq!(cookies.get("theme"), Some("dark"));
        assert_eq!(cookies.get("name"), Some("a b"));
        assert_eq!(cookies.len(), 3);
    }

    #[test]
    fn test_no_cookie_header() {
        let cookies = Cookies::from_headers(&HeaderMap::new());
        assert!(cookies.is_empty());
        assert!(!cookies.contains("session"));
    }

    #[test]
    fn test_remove_cookie() {
        let header = SetCookie::remove("session").path("/").to_string();
        assert_eq!(
            header,
            "session=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT"
        );
    }

    #[test]
    fn test_value_is_encoded() {
        let header = SetCookie::new("greeting", "hi there").secure(true).to_string();
        assert_eq!(header, "greeting=hi%20there; Secure");
    }
}
