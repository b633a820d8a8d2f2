//! Structured logging for Strata services.
//!
//! Every Strata crate logs through [`tracing`]. This crate installs the
//! subscriber that turns those events into output:
//!
//! - **JSON** lines for production, one object per event
//! - **Pretty** multi-line output for development
//!
//! The level filter follows `EnvFilter` syntax, so per-crate directives such
//! as `info,strata_middleware=debug` work.
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_telemetry::{init_logging, LogConfig};
//!
//! fn main() {
//!     init_logging(&LogConfig::production()).expect("logging already initialized");
//!     tracing::info!("service starting");
//! }
//! ```
//!
//! # Standard Fields
//!
//! | Field | Emitted by |
//! |-------|------------|
//! | `http.method` | request log, error reporter |
//! | `http.url` | request log, error reporter |
//! | `http.status_code` | request log, error reporter |
//! | `duration_ms` | request log |
//! | `request_id` | request log |
//! | `error` | error reporter |

#![warn(missing_docs)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
