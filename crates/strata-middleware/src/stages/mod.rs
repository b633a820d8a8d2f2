//! Bundled middleware stages.
//!
//! None of these are installed by default; add them with
//! [`MiddlewareChain::with`](crate::MiddlewareChain::with) or
//! `Application::use_middleware`.
//!
//! - [`not_found`] - Turns an unhandled 404 into an error
//! - [`request_id`] - Generate/propagate request ID (UUID v7)
//! - [`request_log`] - One structured log event per request

pub mod not_found;
pub mod request_id;
pub mod request_log;

pub use not_found::NotFound;
pub use request_id::{request_id, RequestId, REQUEST_ID_HEADER, REQUEST_ID_STATE_KEY};
pub use request_log::{AccessRecord, RequestLog, ACCESS_RECORD_STATE_KEY};
