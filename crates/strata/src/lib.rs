//! # Strata
//!
//! **Onion-style async HTTP middleware for Rust**
//!
//! Strata composes an ordered list of middleware into one asynchronous
//! pipeline, runs it once per request against a mutable [`Context`], and
//! turns whatever the pipeline left behind into a wire-correct response.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use strata::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging(&LogConfig::development())?;
//!
//!     let mut app = Application::new();
//!     app.use_middleware(stages::RequestId::new())
//!         .use_middleware(stages::RequestLog::new());
//!     app.use_fn("hello", |ctx, _next| {
//!         Box::pin(async move {
//!             ctx.set_body("Hello, World!");
//!             Ok(())
//!         })
//!     });
//!
//!     app.listen("127.0.0.1:3000").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Every stage wraps the ones registered after it:
//!
//! ```text
//! Request → RequestId → RequestLog → ... → handler
//!                                             ↓
//! Response ← ResponseFinalizer ←──────────────┘
//! ```
//!
//! Errors unwind through the outer stages and end in the context's error
//! handler, which reports once and writes a plain-text error response if
//! the head is still unsent.
//!
//! [`Context`]: strata_core::Context

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use strata_core as core;

// Re-export middleware composition
pub use strata_middleware as middleware;

// Re-export server types
pub use strata_server as server;

// Re-export logging setup
pub use strata_telemetry as telemetry;

// Re-export configuration loading
pub use strata_config as config;

/// Prelude module for convenient imports.
///
/// ```
/// use strata::prelude::*;
///
/// let mut app = Application::new();
/// app.use_middleware(stages::NotFound::new());
/// assert_eq!(app.middleware_names(), vec!["not_found"]);
/// ```
pub mod prelude {
    pub use strata_core::{
        AppSettings, Body, Context, ErrorReporter, HttpError, ProxyTrust, StrataError,
        StrataResult,
    };

    pub use strata_middleware::{
        stages, BoxFuture, FnMiddleware, Middleware, MiddlewareChain, Next,
    };

    pub use strata_server::{Application, ServerConfig, ShutdownSignal};

    pub use strata_telemetry::{init_logging, LogConfig};

    pub use strata_config::{ConfigLoader, StrataConfig};
}
