//! # Strata Middleware
//!
//! Onion-model middleware composition for the Strata framework.
//!
//! A chain is an ordered list of [`Middleware`] stages. Each stage receives
//! the request [`Context`](strata_core::Context) and a [`Next`] continuation.
//! Code before `next.run(ctx).await` runs on the way in; code after it runs
//! on the way out, in reverse order:
//!
//! ```text
//! Request → stage 0 → stage 1 → ... → stage N-1 → (terminal)
//!                                                     ↓
//! Response ← stage 0 ← stage 1 ← ... ← stage N-1 ←────┘
//! ```
//!
//! ## Key Features
//!
//! - **One-shot continuations**: calling `next.run()` twice fails with
//!   `DoubleProceed` instead of re-running downstream stages
//! - **Short-circuiting**: a stage that never calls `next` ends the chain
//! - **Error propagation**: the first error unwinds through every upstream
//!   stage, each of which may handle or re-throw it
//! - **Reusable**: a [`ComposedHandler`] is compiled once and shared by every
//!   request
//!
//! ## Example
//!
//! ```
//! use strata_middleware::{FnMiddleware, MiddlewareChain};
//!
//! let handler = MiddlewareChain::new()
//!     .with(FnMiddleware::new("greet", |ctx, next| {
//!         Box::pin(async move {
//!             ctx.set_body("hello");
//!             next.run(ctx).await
//!         })
//!     }))
//!     .compile()
//!     .unwrap();
//!
//! assert_eq!(handler.stage_names(), vec!["greet"]);
//! ```

#![doc(html_root_url = "https://docs.rs/strata-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod compose;
pub mod middleware;
pub mod stages;

// Re-export main types at crate root
pub use compose::{compose, BoxedMiddleware, ComposedHandler, MiddlewareChain};
pub use middleware::{BoxFuture, FnMiddleware, Middleware, Next};
