//! Typed configuration for Strata.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict parsing (unknown fields are errors)
//! - Layered loading (defaults → file → env)
//!
//! The root [`StrataConfig`] has three sections:
//!
//! - [`ServerSection`] - listener address, shutdown timeout, connection limits
//! - [`AppSection`] - environment name, proxy trust, subdomain offset, silence
//! - [`LoggingSection`] - filter directives and output format
//!
//! # Example
//!
//! ```no_run
//! use strata_config::ConfigLoader;
//!
//! # fn main() -> Result<(), strata_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()?
//!     .with_optional_file("strata.toml")?
//!     .with_env_prefix("STRATA")
//!     .load()?;
//!
//! let settings = config.app_settings();
//! println!("serving {} on {}", settings.env, config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! shutdown_timeout_secs = 30
//! keep_alive = true
//! max_connections = 10000
//!
//! [app]
//! env = "production"
//! proxy = true
//! proxy_ip_header = "x-forwarded-for"
//! max_ips_count = 0
//! subdomain_offset = 2
//! silent = false
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Any value can be overridden with `PREFIX__SECTION__KEY`:
//!
//! - `STRATA__SERVER__HTTP_ADDR=0.0.0.0:9000`
//! - `STRATA__APP__PROXY=true`
//! - `STRATA__LOGGING__LEVEL=debug`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{StrataConfig, StrataConfigBuilder};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{AppSection, LoggingSection, ServerSection, ENV_VAR};
