//! Configuration schema types.
//!
//! One struct per section. Every field has a default, so a partial file is
//! always valid; unknown fields are rejected.

use std::env;
use std::time::Duration;

use http::HeaderName;
use serde::{Deserialize, Serialize};
use strata_core::{AppSettings, ProxyTrust, DEFAULT_IP_HEADER, DEFAULT_SUBDOMAIN_OFFSET};
use strata_server::ServerConfig;
use strata_telemetry::{LogConfig, LogFormat};

/// Environment variable that supplies the default `app.env`.
pub const ENV_VAR: &str = "STRATA_ENV";

/// Server section.
///
/// # Example
///
/// ```
/// use strata_config::ServerSection;
///
/// let section = ServerSection {
///     http_addr: "127.0.0.1:3000".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(section.shutdown_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// HTTP server bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// HTTP/1.1 keep-alive.
    #[serde(default = "default_true")]
    pub keep_alive: bool,

    /// Maximum concurrent connections. Unset means unlimited.
    #[serde(default)]
    pub max_connections: Option<usize>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            keep_alive: true,
            max_connections: None,
        }
    }
}

impl From<&ServerSection> for ServerConfig {
    fn from(section: &ServerSection) -> Self {
        ServerConfig::builder()
            .http_addr(section.http_addr.clone())
            .shutdown_timeout(Duration::from_secs(section.shutdown_timeout_secs))
            .keep_alive(section.keep_alive)
            .max_connections(section.max_connections)
            .build()
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

/// Application section: the settings every request context inherits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppSection {
    /// Environment name. Defaults to `$STRATA_ENV`, else "development".
    #[serde(default = "default_env")]
    pub env: String,

    /// Trust `X-Forwarded-*` headers.
    #[serde(default)]
    pub proxy: bool,

    /// Header carrying the forwarded client chain.
    #[serde(default = "default_proxy_ip_header")]
    pub proxy_ip_header: String,

    /// Entries kept from the end of the forwarded chain; 0 keeps all.
    #[serde(default)]
    pub max_ips_count: usize,

    /// Host labels that form the root domain.
    #[serde(default = "default_subdomain_offset")]
    pub subdomain_offset: usize,

    /// Suppress default error logging.
    #[serde(default)]
    pub silent: bool,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            env: default_env(),
            proxy: false,
            proxy_ip_header: default_proxy_ip_header(),
            max_ips_count: 0,
            subdomain_offset: DEFAULT_SUBDOMAIN_OFFSET,
            silent: false,
        }
    }
}

impl AppSection {
    /// The proxy header as a `HeaderName`, if it is a valid one.
    #[must_use]
    pub fn proxy_ip_header_name(&self) -> Option<HeaderName> {
        HeaderName::from_bytes(self.proxy_ip_header.as_bytes()).ok()
    }
}

impl From<&AppSection> for AppSettings {
    fn from(section: &AppSection) -> Self {
        let base = if section.proxy {
            ProxyTrust::enabled()
        } else {
            ProxyTrust::disabled()
        };
        let mut trust = base.with_max_ips_count(section.max_ips_count);
        // Rejected by validation; a hand-built section keeps the default header.
        if let Some(header) = section.proxy_ip_header_name() {
            trust = trust.with_ip_header(header);
        }
        AppSettings::default()
            .with_env(section.env.clone())
            .with_trust(trust)
            .with_subdomain_offset(section.subdomain_offset)
            .with_silent(section.silent)
    }
}

fn default_env() -> String {
    env::var(ENV_VAR).unwrap_or_else(|_| "development".to_string())
}

fn default_proxy_ip_header() -> String {
    DEFAULT_IP_HEADER.to_string()
}

fn default_subdomain_offset() -> usize {
    DEFAULT_SUBDOMAIN_OFFSET
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directives (trace, debug, info, warn, error, or per-target).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include ANSI color codes in pretty output.
    #[serde(default)]
    pub ansi_enabled: bool,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            ansi_enabled: false,
            include_location: false,
        }
    }
}

impl From<&LoggingSection> for LogConfig {
    fn from(section: &LoggingSection) -> Self {
        let base = match section.format {
            LogFormat::Json => LogConfig::production(),
            LogFormat::Pretty => LogConfig::development(),
        };
        LogConfig {
            enabled: section.enabled,
            level: section.level.clone(),
            format: section.format,
            file_line_info: section.include_location,
            ansi: section.ansi_enabled,
            ..base
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
