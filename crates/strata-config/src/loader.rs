//! Layered configuration loading.
//!
//! Defaults, then a file, then environment variables; each layer overrides
//! the one before it.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::{ConfigError, StrataConfig};

/// Configuration loader.
///
/// # Example
///
/// ```no_run
/// use strata_config::ConfigLoader;
///
/// # fn main() -> Result<(), strata_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_file("strata.toml")?
///     .with_env_prefix("STRATA")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: StrataConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: StrataConfig::default(),
            env_prefix: None,
        }
    }

    /// Start from the development preset.
    ///
    /// ```
    /// use strata_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = StrataConfig::development();
        self
    }

    /// Start from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = StrataConfig::production();
        self
    }

    /// Load a TOML (`.toml`) or JSON (`.json`) file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, malformed,
    /// or contains unknown fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the given format ("toml" or "json").
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// ```
    /// use strata_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [app]
    ///     proxy = true
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(config.app.proxy);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };
        Ok(self)
    }

    /// Apply `PREFIX__SECTION__KEY` environment overrides on load.
    ///
    /// With prefix "STRATA":
    /// - `STRATA__SERVER__HTTP_ADDR=0.0.0.0:9000`
    /// - `STRATA__APP__PROXY=true`
    /// - `STRATA__LOGGING__FORMAT=pretty`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load variables from a `.env` file in the working directory, if any.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Dotenv` if the file exists but is malformed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override cannot be parsed or validation
    /// fails.
    pub fn load(mut self) -> Result<StrataConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: HashMap<String, String> = env::vars()
                .filter(|(key, _)| key.starts_with(&prefix))
                .collect();
            self.apply_env_overrides(&prefix, &vars)?;
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Return the configuration without overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> StrataConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<StrataConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    fn apply_env_overrides(
        &mut self,
        prefix: &str,
        vars: &HashMap<String, String>,
    ) -> Result<(), ConfigError> {
        for (key, value) in vars {
            self.apply_env_var(key, value, prefix)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(path) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            // `STRATA_ENV` and friends share the prefix but are not overrides.
            return Ok(());
        };

        let parts: Vec<&str> = path.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                config.server.shutdown_timeout_secs = parse(key, value, "expected integer")?;
            }
            ["SERVER", "KEEP_ALIVE"] => config.server.keep_alive = parse_bool_var(key, value)?,
            ["SERVER", "MAX_CONNECTIONS"] => {
                let unlimited = value.is_empty() || value.eq_ignore_ascii_case("none");
                config.server.max_connections = if unlimited {
                    None
                } else {
                    Some(parse(key, value, "expected integer or 'none'")?)
                };
            }

            ["APP", "ENV"] => config.app.env = value.to_string(),
            ["APP", "PROXY"] => config.app.proxy = parse_bool_var(key, value)?,
            ["APP", "PROXY_IP_HEADER"] => config.app.proxy_ip_header = value.to_string(),
            ["APP", "MAX_IPS_COUNT"] => {
                config.app.max_ips_count = parse(key, value, "expected integer")?;
            }
            ["APP", "SUBDOMAIN_OFFSET"] => {
                config.app.subdomain_offset = parse(key, value, "expected integer")?;
            }
            ["APP", "SILENT"] => config.app.silent = parse_bool_var(key, value)?,

            ["LOGGING", "ENABLED"] => config.logging.enabled = parse_bool_var(key, value)?,
            ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                config.logging.format = parse(key, value, "expected 'json' or 'pretty'")?;
            }
            ["LOGGING", "ANSI_ENABLED"] => {
                config.logging.ansi_enabled = parse_bool_var(key, value)?;
            }
            ["LOGGING", "INCLUDE_LOCATION"] => {
                config.logging.include_location = parse_bool_var(key, value)?;
            }

            _ => {}
        }

        Ok(())
    }
}

fn parse<T: FromStr>(key: &str, value: &str, expected: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, expected))
}

fn parse_bool_var(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use strata_telemetry::LogFormat;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.server.http_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_loader_presets() {
        let dev = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(dev.logging.format, LogFormat::Pretty);

        let prod = ConfigLoader::new().with_production().load().unwrap();
        assert_eq!(prod.logging.format, LogFormat::Json);
        assert_eq!(prod.app.env, "production");
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"app": {"subdomain_offset": 3, "silent": true}}"#;
        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.app.subdomain_offset, 3);
        assert!(config.app.silent);
    }

    #[test]
    fn test_loader_rejects_unknown_section() {
        let toml = r#"
            [telemetry]
            service_name = "svc"
        "#;
        assert!(ConfigLoader::new().with_string(toml, "toml").is_err());
    }

    #[test]
    fn test_loader_rejects_unknown_format() {
        assert!(ConfigLoader::new().with_string("", "yaml").is_err());
    }

    #[test]
    fn test_loader_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [server]
            http_addr = "127.0.0.1:4000"
            max_connections = 128

            [app]
            env = "staging"
            proxy = true
            proxy_ip_header = "x-real-ip"
            max_ips_count = 2

            [logging]
            level = "warn"
            format = "pretty"
            "#
        )
        .unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert_eq!(config.server.http_addr, "127.0.0.1:4000");
        assert_eq!(config.server.max_connections, Some(128));
        assert_eq!(config.app.env, "staging");
        assert_eq!(config.app.proxy_ip_header, "x-real-ip");
        assert_eq!(config.app.max_ips_count, 2);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_loader_with_file_bad_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = ConfigLoader::new().with_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let err = ConfigLoader::new()
            .with_file("/nonexistent/strata.toml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/strata.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.server.http_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_env_overrides() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_overrides(
                "TEST",
                &vars(&[
                    ("TEST__SERVER__HTTP_ADDR", "192.168.1.1:9000"),
                    ("TEST__SERVER__MAX_CONNECTIONS", "none"),
                    ("TEST__APP__PROXY", "yes"),
                    ("TEST__APP__MAX_IPS_COUNT", "3"),
                    ("TEST__LOGGING__FORMAT", "pretty"),
                    ("TEST__UNKNOWN__KEY", "ignored"),
                    ("TEST_ENV", "not an override"),
                ]),
            )
            .unwrap();

        let config = loader.load_unvalidated();
        assert_eq!(config.server.http_addr, "192.168.1.1:9000");
        assert_eq!(config.server.max_connections, None);
        assert!(config.app.proxy);
        assert_eq!(config.app.max_ips_count, 3);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_env_override_invalid_values() {
        let mut loader = ConfigLoader::new();
        let err = loader
            .apply_env_var("TEST__APP__SUBDOMAIN_OFFSET", "two", "TEST")
            .unwrap_err();
        assert!(err.to_string().contains("TEST__APP__SUBDOMAIN_OFFSET"));

        assert!(loader
            .apply_env_var("TEST__APP__SILENT", "maybe", "TEST")
            .is_err());
        assert!(loader
            .apply_env_var("TEST__LOGGING__FORMAT", "xml", "TEST")
            .is_err());
    }

    #[test]
    fn test_parse_bool() {
        for truthy in ["true", "True", "1", "yes", "on"] {
            assert_eq!(parse_bool(truthy), Some(true));
        }
        for falsy in ["false", "FALSE", "0", "no", "off"] {
            assert_eq!(parse_bool(falsy), Some(false));
        }
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }
}
