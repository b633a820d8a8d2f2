//! Trusted-proxy handling for client address resolution.
//!
//! When proxy trust is enabled, the client chain is read from a forwarding
//! header (`X-Forwarded-For` by default). Otherwise the chain is empty and
//! the client address falls back to the peer address of the connection.

use http::header::HOST;
use http::{HeaderMap, HeaderName};
use std::fmt;

/// Default header carrying the forwarded client chain.
pub const DEFAULT_IP_HEADER: &str = "x-forwarded-for";

/// Header carrying the original host when behind a proxy.
pub const FORWARDED_HOST_HEADER: &str = "x-forwarded-host";

/// Decides which forwarded headers are believed.
pub trait TrustPolicy: Send + Sync + fmt::Debug {
    /// Whether forwarded headers are honoured at all.
    fn trusts_proxy(&self) -> bool;

    /// The client address chain, nearest client first.
    fn client_chain(&self, headers: &HeaderMap) -> Vec<String>;

    /// The host the client asked for.
    fn host(&self, headers: &HeaderMap) -> Option<String> {
        let forwarded = self
            .trusts_proxy()
            .then(|| headers.get(FORWARDED_HOST_HEADER))
            .flatten()
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        forwarded
            .or_else(|| headers.get(HOST).and_then(|value| value.to_str().ok()))
            .map(ToString::to_string)
    }
}

/// Header-based proxy trust, configured per application.
#[derive(Debug, Clone)]
pub struct ProxyTrust {
    enabled: bool,
    ip_header: HeaderName,
    max_ips_count: usize,
}

impl Default for ProxyTrust {
    fn default() -> Self {
        Self {
            enabled: false,
            ip_header: HeaderName::from_static(DEFAULT_IP_HEADER),
            max_ips_count: 0,
        }
    }
}

impl ProxyTrust {
    /// Proxy trust disabled.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Proxy trust enabled with the default header.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Reads the chain from another header.
    #[must_use]
    pub fn with_ip_header(mut self, header: HeaderName) -> Self {
        self.ip_header = header;
        self
    }

    /// Keeps only the last `count` entries of the chain; `0` keeps all.
    #[must_use]
    pub fn with_max_ips_count(mut self, count: usize) -> Self {
        self.max_ips_count = count;
        self
    }

    /// The header the chain is read from.
    #[must_use]
    pub fn ip_header(&self) -> &HeaderName {
        &self.ip_header
    }

    /// The configured chain limit.
    #[must_use]
    pub fn max_ips_count(&self) -> usize {
        self.max_ips_count
    }
}

impl TrustPolicy for ProxyTrust {
    fn trusts_proxy(&self) -> bool {
        self.enabled
    }

    fn client_chain(&self, headers: &HeaderMap) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }
        let mut chain: Vec<String> = headers
            .get(&self.ip_header)
            .and_then(|value| value.to_str().ok())
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|ip| !ip.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if self.max_ips_count > 0 && chain.len() > self.max_ips_count {
            chain.drain(..chain.len() - self.max_ips_count);
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, value.parse().unwrap());
        }
        map
    }

    #[test]
    fn test_disabled_ignores_forwarded_headers() {
        let map = headers(&[("x-forwarded-for", "1.1.1.1"), ("host", "app.local")]);
        let trust = ProxyTrust::disabled();
        assert!(trust.client_chain(&map).is_empty());
        assert_eq!(trust.host(&map).as_deref(), Some("app.local"));
    }

    #[test]
    fn test_enabled_reads_chain() {
        let map = headers(&[("x-forwarded-for", "1.1.1.1, 2.2.2.2 ,3.3.3.3")]);
        let chain = ProxyTrust::enabled().client_chain(&map);
        assert_eq!(chain, vec!["1.1.1.1", "2.2.2.2", "3.3.3.3"]);
    }

    #[test]
    fn test_max_ips_keeps_nearest_entries() {
        let map = headers(&[("x-forwarded-for", "1.1.1.1, 2.2.2.2, 3.3.3.3")]);
        let chain = ProxyTrust::enabled()
            .with_max_ips_count(2)
            .client_chain(&map);
        assert_eq!(chain, vec!["2.2.2.2", "3.3.3.3"]);
    }

    #[test]
    fn test_custom_header_and_forwarded_host() {
        let map = headers(&[
            ("x-real-ip", "9.9.9.9"),
            ("x-forwarded-host", "public.example, internal"),
            ("host", "internal"),
        ]);
        let trust = ProxyTrust::enabled().with_ip_header(HeaderName::from_static("x-real-ip"));
        assert_eq!(trust.client_chain(&map), vec!["9.9.9.9"]);
        assert_eq!(trust.host(&map).as_deref(), Some("public.example"));
    }
}
