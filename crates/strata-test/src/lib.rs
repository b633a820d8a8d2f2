//! # Strata Test
//!
//! In-memory testing for Strata applications. Requests run through the
//! complete middleware chain and response finalizer, but no socket is bound.
//!
//! ## Key Features
//!
//! - **In-Memory Testing**: every request gets its own [`MemoryTransport`]
//! - **Request Builder**: fluent API for headers, JSON and form bodies
//! - **Response Assertions**: chainable `assert_*` helpers
//! - **Streaming**: piped bodies are collected before the response returns
//!
//! ## Example
//!
//! ```
//! use http::StatusCode;
//! use serde_json::json;
//! use strata_server::Application;
//! use strata_test::TestClient;
//!
//! # tokio_test::block_on(async {
//! let mut app = Application::new();
//! app.use_fn("users", |ctx, _next| {
//!     Box::pin(async move {
//!         ctx.set_status(StatusCode::CREATED);
//!         ctx.set_body(json!({ "id": 1 }));
//!         Ok(())
//!     })
//! });
//!
//! let client = TestClient::new(&app).unwrap();
//! client
//!     .post("/users")
//!     .json(&json!({ "name": "Alice" }))
//!     .send()
//!     .await
//!     .assert_status(StatusCode::CREATED)
//!     .assert_content_type("application/json")
//!     .assert_json_field("id", &json!(1));
//! # });
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest, DEFAULT_FINISH_TIMEOUT};
pub use error::TestError;
pub use request::{TestRequest, TestRequestBuilder, DEFAULT_REMOTE_ADDR};
pub use response::TestResponse;
pub use strata_core::fixtures::{MemoryHandle, MemoryTransport, RecordingReporter};
