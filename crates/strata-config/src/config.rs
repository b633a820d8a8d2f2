//! Main configuration types.
//!
//! This module provides the top-level [`StrataConfig`] struct and its builder.

use serde::{Deserialize, Serialize};
use strata_core::AppSettings;
use strata_server::ServerConfig;
use strata_telemetry::{create_env_filter, LogConfig, LogFormat};

use crate::{AppSection, ConfigError, LoggingSection, ServerSection};

/// Complete Strata configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use strata_config::StrataConfig;
///
/// let config = StrataConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert_eq!(config.app.subdomain_offset, 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct StrataConfig {
    /// Listener configuration.
    #[serde(default)]
    pub server: ServerSection,

    /// Application settings inherited by every request.
    #[serde(default)]
    pub app: AppSection,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl StrataConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use strata_config::{AppSection, StrataConfig};
    ///
    /// let config = StrataConfig::builder()
    ///     .app(AppSection {
    ///         proxy: true,
    ///         ..Default::default()
    ///     })
    ///     .build();
    ///
    /// assert!(config.app.proxy);
    /// ```
    #[must_use]
    pub fn builder() -> StrataConfigBuilder {
        StrataConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - `server.http_addr` is not a socket address
    /// - `server.max_connections` is zero
    /// - `app.proxy_ip_header` is not a valid header name
    /// - `logging.level` is not a valid filter
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .server
            .http_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.server.max_connections == Some(0) {
            return Err(ConfigError::invalid_value(
                "server.max_connections",
                "must be greater than zero when set",
            ));
        }

        if self.app.proxy_ip_header_name().is_none() {
            return Err(ConfigError::invalid_value(
                "app.proxy_ip_header",
                format!("invalid header name: {}", self.app.proxy_ip_header),
            ));
        }

        if let Err(e) = create_env_filter(&self.logging.level) {
            return Err(ConfigError::invalid_value("logging.level", e.to_string()));
        }

        Ok(())
    }

    /// Development preset: pretty debug logs.
    ///
    /// ```
    /// use strata_config::StrataConfig;
    ///
    /// let config = StrataConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.app.env = "development".to_string();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.ansi_enabled = true;
        config.logging.include_location = true;
        config
    }

    /// Production preset: JSON info logs.
    ///
    /// ```
    /// use strata_config::StrataConfig;
    ///
    /// let config = StrataConfig::production();
    /// assert_eq!(config.logging.format, strata_telemetry::LogFormat::Json);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.app.env = "production".to_string();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config.logging.ansi_enabled = false;
        config
    }

    /// Settings template for an `Application`.
    #[must_use]
    pub fn app_settings(&self) -> AppSettings {
        AppSettings::from(&self.app)
    }

    /// Listener configuration for a `Server`.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::from(&self.server)
    }

    /// Logging configuration for `strata_telemetry::init_logging`.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        LogConfig::from(&self.logging)
    }
}

/// Builder for [`StrataConfig`].
#[derive(Debug, Default)]
pub struct StrataConfigBuilder {
    server: Option<ServerSection>,
    app: Option<AppSection>,
    logging: Option<LoggingSection>,
}

impl StrataConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server section.
    #[must_use]
    pub fn server(mut self, server: ServerSection) -> Self {
        self.server = Some(server);
        self
    }

    /// Set the app section.
    #[must_use]
    pub fn app(mut self, app: AppSection) -> Self {
        self.app = Some(app);
        self
    }

    /// Set the logging section.
    #[must_use]
    pub fn logging(mut self, logging: LoggingSection) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Build the configuration. Unset sections use their defaults.
    #[must_use]
    pub fn build(self) -> StrataConfig {
        StrataConfig {
            server: self.server.unwrap_or_default(),
            app: self.app.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<StrataConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
