//! # Strata Core
//!
//! Core types for the Strata middleware framework.
//!
//! This crate provides the per-request object model the middleware chain
//! works against:
//!
//! - [`Context`] - Per-request aggregate of request facts, response state and a state bag
//! - [`Body`] - Response body shapes (empty, text, binary, JSON, stream)
//! - [`HeaderStore`] - Response headers that freeze once sent
//! - [`Transport`] - Seam to the underlying connection
//! - [`ErrorReporter`] / [`ErrorSink`] - Once-per-request error reporting
//! - [`StrataError`] / [`HttpError`] - Standard error types
//! - [`AppSettings`] / [`ProxyTrust`] - Per-application template

#![doc(html_root_url = "https://docs.rs/strata-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod accepts;
mod body;
mod context;
pub mod cookie;
mod error;
pub mod fixtures;
mod headers;
pub mod media_type;
mod proxy;
mod report;
mod settings;
pub mod status;
mod transport;

pub use accepts::Accepts;
pub use body::{Body, BodyStream};
pub use context::{
    Context, ContextSnapshot, RequestFacets, RequestSnapshot, ResponseSnapshot, ResponseState,
    State,
};
pub use error::{HttpError, InvalidHeader, StrataError, StrataResult};
pub use headers::HeaderStore;
pub use proxy::{ProxyTrust, TrustPolicy, DEFAULT_IP_HEADER, FORWARDED_HOST_HEADER};
pub use report::{ErrorReporter, ErrorSink, RequestSummary};
pub use settings::{AppSettings, DEFAULT_SUBDOMAIN_OFFSET};
pub use transport::{
    FinishHook, FinishSlot, HeadersSent, ResponseHead, Transport, TransportError,
    TransportRequest,
};
