//! # Strata Server
//!
//! Runs a Strata middleware chain against real HTTP connections.
//!
//! - [`Application`] - middleware registration and settings; [`Application::callback()`]
//!   freezes them into a [`Dispatcher`]
//! - [`Dispatcher`] - per-request context creation, chain execution and error handling
//! - [`ResponseFinalizer`] - writes the terminal context state to the transport
//! - [`TracingReporter`] - default error reporter
//! - [`Server`] - HTTP/1.1 accept loop on hyper with graceful shutdown
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_server::Application;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut app = Application::new();
//!     app.use_fn("hello", |ctx, _next| {
//!         Box::pin(async move {
//!             ctx.set_body(serde_json::json!({ "hello": "world" }));
//!             Ok(())
//!         })
//!     });
//!
//!     app.listen("0.0.0.0:8080").await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/strata-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod application;
pub mod config;
mod dispatcher;
mod error;
mod reporter;
mod respond;
pub mod server;
pub mod shutdown;
pub mod transport;

pub use application::Application;
pub use config::{ServerConfig, ServerConfigBuilder};
pub use dispatcher::Dispatcher;
pub use error::ServerError;
pub use reporter::TracingReporter;
pub use respond::ResponseFinalizer;
pub use server::Server;
pub use shutdown::{ConnectionTracker, ShutdownSignal};
pub use transport::{HttpResponse, HyperTransport, ResponseBody};
