//! Read-mostly request facts derived once per request.

use crate::accepts::Accepts;
use crate::error::HttpError;
use crate::headers;
use crate::media_type;
use crate::settings::AppSettings;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method, Uri, Version};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

/// Request facts computed at context construction.
///
/// Only the URL may be rewritten afterwards; `original_url` and the client
/// address stay frozen.
#[derive(Debug)]
pub struct RequestFacets {
    method: Method,
    uri: Uri,
    original_url: String,
    version: Version,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    ips: Vec<String>,
    ip: String,
    host: Option<String>,
    subdomain_offset: usize,
    accepts: Accepts,
}

impl RequestFacets {
    pub(crate) fn new(
        method: Method,
        uri: Uri,
        version: Version,
        headers: HeaderMap,
        remote_addr: Option<SocketAddr>,
        settings: &AppSettings,
    ) -> Self {
        let original_url = target(&uri).to_string();
        let ips = settings.trust.client_chain(&headers);
        let ip = ips
            .first()
            .cloned()
            .or_else(|| remote_addr.map(|addr| addr.ip().to_string()))
            .unwrap_or_default();
        let host = settings
            .trust
            .host(&headers)
            .or_else(|| uri.authority().map(|authority| authority.to_string()));
        let accepts = Accepts::from_headers(&headers);
        Self {
            method,
            uri,
            original_url,
            version,
            headers,
            remote_addr,
            ips,
            ip,
            host,
            subdomain_offset: settings.subdomain_offset,
            accepts,
        }
    }

    /// Request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request target (path and query).
    #[must_use]
    pub fn url(&self) -> &str {
        target(&self.uri)
    }

    /// The request target as first received, unaffected by [`set_url`](Self::set_url).
    #[must_use]
    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    /// Rewrites the request target.
    pub fn set_url(&mut self, url: &str) -> Result<(), HttpError> {
        self.uri = url.parse::<Uri>().map_err(HttpError::internal)?;
        Ok(())
    }

    /// The parsed URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Path component of the URL.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Query string without the leading `?`.
    #[must_use]
    pub fn querystring(&self) -> &str {
        self.uri.query().unwrap_or("")
    }

    /// Protocol version.
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// A request header. `Referer` and `Referrer` are interchangeable.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        let lookup = |key: &str| self.headers.get(key).and_then(|value| value.to_str().ok());
        if name.eq_ignore_ascii_case("referer") || name.eq_ignore_ascii_case("referrer") {
            return lookup("referer").or_else(|| lookup("referrer"));
        }
        lookup(name)
    }

    /// All request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Client address: first trusted forwarded entry, else the peer address,
    /// else empty.
    #[must_use]
    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// Forwarded client chain; empty unless proxies are trusted.
    #[must_use]
    pub fn ips(&self) -> &[String] {
        &self.ips
    }

    /// Peer address of the connection.
    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Host including port.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Host without port.
    #[must_use]
    pub fn hostname(&self) -> Option<&str> {
        let host = self.host.as_deref()?;
        if let Some(rest) = host.strip_prefix('[') {
            return rest.split_once(']').map(|(addr, _)| addr);
        }
        Some(host.split_once(':').map_or(host, |(name, _)| name))
    }

    /// Subdomains, most specific last, ignoring the root labels.
    ///
    /// `tobi.ferrets.example.com` with an offset of 2 yields
    /// `["ferrets", "tobi"]`. IP hosts have no subdomains.
    #[must_use]
    pub fn subdomains(&self) -> Vec<&str> {
        let Some(hostname) = self.hostname() else {
            return Vec::new();
        };
        if hostname.parse::<IpAddr>().is_ok() {
            return Vec::new();
        }
        hostname
            .split('.')
            .rev()
            .skip(self.subdomain_offset)
            .collect()
    }

    /// Accept negotiation for this request.
    #[must_use]
    pub fn accepts(&self) -> &Accepts {
        &self.accepts
    }

    /// Request `Content-Type` without parameters.
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(media_type::essence)
    }

    /// Checks the request `Content-Type` against `types`.
    #[must_use]
    pub fn is(&self, types: &[&str]) -> Option<String> {
        media_type::type_is(&self.content_type()?, types)
    }

    /// Serializable view of the request.
    #[must_use]
    pub fn snapshot(&self) -> RequestSnapshot {
        RequestSnapshot {
            method: self.method.to_string(),
            url: self.url().to_string(),
            header: headers::snapshot(&self.headers),
        }
    }
}

fn target(uri: &Uri) -> &str {
    uri.path_and_query().map_or("/", |target| target.as_str())
}

/// Serializable request summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestSnapshot {
    /// Request method.
    pub method: String,
    /// Current URL.
    pub url: String,
    /// Request headers.
    pub header: BTreeMap<String, String>,
}
