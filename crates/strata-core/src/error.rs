//! Error types for Strata.
//!
//! Every failure that travels through the middleware chain is a
//! [`StrataError`]. Handler code usually produces an [`HttpError`], which
//! carries the status, the client-facing message, an `expose` flag and any
//! headers that should survive into the fallback error response.
//!
//! # Example
//!
//! ```
//! use http::StatusCode;
//! use strata_core::{HttpError, StrataError};
//!
//! fn load(id: &str) -> Result<(), StrataError> {
//!     if id.is_empty() {
//!         return Err(HttpError::new(StatusCode::BAD_REQUEST, "id is required").into());
//!     }
//!     Ok(())
//! }
//!
//! let err = load("").unwrap_err();
//! assert_eq!(err.status(), StatusCode::BAD_REQUEST);
//! assert!(err.expose());
//! ```

use crate::transport::TransportError;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use std::io;
use thiserror::Error;

/// Result type alias using [`StrataError`].
pub type StrataResult<T> = Result<T, StrataError>;

/// Standard error type for Strata.
#[derive(Error, Debug)]
pub enum StrataError {
    /// The middleware sequence could not be composed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A middleware invoked its continuation more than once.
    #[error("next() called multiple times (stage {stage})")]
    DoubleProceed {
        /// Position of the middleware that proceeded twice.
        stage: usize,
    },

    /// A middleware or handler failed.
    #[error(transparent)]
    Handler(#[from] HttpError),

    /// Writing to the client connection failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl StrataError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns the HTTP status this error maps to.
    ///
    /// Only handler errors carry their own status; everything else is a 500.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Handler(err) => err.status(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` if the message may be shown to the client.
    #[must_use]
    pub fn expose(&self) -> bool {
        matches!(self, Self::Handler(err) if err.expose())
    }

    /// Headers to apply to the fallback error response.
    #[must_use]
    pub fn headers(&self) -> Option<&HeaderMap> {
        match self {
            Self::Handler(err) if !err.headers().is_empty() => Some(err.headers()),
            _ => None,
        }
    }

    /// The text written to the client in the fallback error response.
    ///
    /// Exposed errors show their own message, all others only the canonical
    /// reason phrase of their status.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Handler(err) if err.expose() => err.message().to_string(),
            _ => crate::status::reason(self.status()).to_string(),
        }
    }
}

impl From<anyhow::Error> for StrataError {
    fn from(err: anyhow::Error) -> Self {
        Self::Handler(HttpError::from(err))
    }
}

impl From<io::Error> for StrataError {
    fn from(err: io::Error) -> Self {
        Self::Handler(HttpError::from(err))
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Handler(HttpError::internal(err))
    }
}

impl From<InvalidHeader> for StrataError {
    fn from(err: InvalidHeader) -> Self {
        Self::Handler(HttpError::internal(err))
    }
}

/// An error with an HTTP status attached.
///
/// `expose` defaults to `true` for client errors (status below 500) and
/// `false` for server errors.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
    expose: bool,
    headers: HeaderMap,
    #[source]
    source: Option<anyhow::Error>,
}

impl HttpError {
    /// Creates an error with the given status and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            expose: status.as_u16() < 500,
            headers: HeaderMap::new(),
            source: None,
        }
    }

    /// Creates an error using the canonical reason phrase as message.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        Self::new(status, crate::status::reason(status))
    }

    /// Wraps an arbitrary error as an unexposed 500.
    pub fn internal(source: impl Into<anyhow::Error>) -> Self {
        let source = source.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: source.to_string(),
            expose: false,
            headers: HeaderMap::new(),
            source: Some(source),
        }
    }

    /// Overrides the `expose` flag.
    #[must_use]
    pub fn with_expose(mut self, expose: bool) -> Self {
        self.expose = expose;
        self
    }

    /// Adds a header to the fallback error response.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Attaches an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The HTTP status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the message may be sent to the client.
    #[must_use]
    pub fn expose(&self) -> bool {
        self.expose
    }

    /// Headers carried by this error.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl From<anyhow::Error> for HttpError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err)
    }
}

impl From<io::Error> for HttpError {
    fn from(err: io::Error) -> Self {
        let status = if err.kind() == io::ErrorKind::NotFound {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
            expose: false,
            headers: HeaderMap::new(),
            source: Some(err.into()),
        }
    }
}

/// A header name or value that cannot be sent on the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid header {name:?}: {reason}")]
pub struct InvalidHeader {
    name: String,
    reason: &'static str,
}

impl InvalidHeader {
    pub(crate) fn name(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reason: "not a valid header name",
        }
    }

    pub(crate) fn value(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reason: "value contains characters not allowed in a header",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_exposed() {
        let err = HttpError::new(StatusCode::FORBIDDEN, "nope");
        assert!(err.expose());
        assert_eq!(err.message(), "nope");

        let err = HttpError::new(StatusCode::SERVICE_UNAVAILABLE, "db down");
        assert!(!err.expose());
    }

    #[test]
    fn test_client_message_hides_server_errors() {
        let err: StrataError = HttpError::new(StatusCode::BAD_GATEWAY, "upstream exploded").into();
        assert_eq!(err.client_message(), "Bad Gateway");

        let err: StrataError = HttpError::new(StatusCode::CONFLICT, "version mismatch").into();
        assert_eq!(err.client_message(), "version mismatch");

        let err: StrataError = HttpError::new(StatusCode::BAD_GATEWAY, "upstream")
            .with_expose(true)
            .into();
        assert_eq!(err.client_message(), "upstream");
    }

    #[test]
    fn test_anyhow_maps_to_internal() {
        let err: StrataError = anyhow::anyhow!("boom").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.expose());
        assert_eq!(err.client_message(), "Internal Server Error");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_io_not_found_maps_to_404() {
        let err: StrataError = io::Error::new(io::ErrorKind::NotFound, "no such file").into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.client_message(), "Not Found");

        let err: StrataError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_non_handler_errors_are_500() {
        let err = StrataError::DoubleProceed { stage: 1 };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.expose());
        assert!(err.headers().is_none());
        assert_eq!(err.to_string(), "next() called multiple times (stage 1)");

        let err = StrataError::configuration("empty name");
        assert_eq!(err.to_string(), "Configuration error: empty name");
    }

    #[test]
    fn test_error_headers() {
        let err: StrataError = HttpError::new(StatusCode::UNAUTHORIZED, "login")
            .with_header(
                http::header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic"),
            )
            .into();
        let headers = err.headers().unwrap();
        assert_eq!(headers.get("www-authenticate").unwrap(), "Basic");
    }
}
