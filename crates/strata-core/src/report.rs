//! Application-level error reporting.
//!
//! Every request gets an [`ErrorSink`]. The sink forwards to the
//! application's [`ErrorReporter`] at most once, no matter how many paths
//! (chain failure, stream failure, connection reset) observe an error.

use crate::error::StrataError;
use http::{Method, StatusCode};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// What a reporter learns about the failing request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestSummary {
    /// Request method.
    #[serde(serialize_with = "serialize_method")]
    pub method: Method,
    /// URL as received.
    pub url: String,
    /// Status the error maps to.
    #[serde(serialize_with = "serialize_status")]
    pub status: StatusCode,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_status<S: serde::Serializer>(status: &StatusCode, ser: S) -> Result<S::Ok, S::Error> {
    ser.serialize_u16(status.as_u16())
}

fn serialize_method<S: serde::Serializer>(method: &Method, ser: S) -> Result<S::Ok, S::Error> {
    ser.serialize_str(method.as_str())
}

/// Receives errors that escaped request handling.
pub trait ErrorReporter: Send + Sync {
    /// Called at most once per request.
    fn report(&self, error: &StrataError, request: &RequestSummary);
}

impl<F> ErrorReporter for F
where
    F: Fn(&StrataError, &RequestSummary) + Send + Sync,
{
    fn report(&self, error: &StrataError, request: &RequestSummary) {
        self(error, request);
    }
}

/// Per-request once-guard in front of an [`ErrorReporter`].
///
/// Clones share the guard.
#[derive(Clone)]
pub struct ErrorSink {
    reporter: Arc<dyn ErrorReporter>,
    reported: Arc<AtomicBool>,
}

impl ErrorSink {
    /// Wraps `reporter` with a fresh guard.
    pub fn new(reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            reporter,
            reported: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Forwards `error` unless something was already reported.
    ///
    /// Returns `true` if the reporter was invoked.
    pub fn report(&self, error: &StrataError, request: &RequestSummary) -> bool {
        if self
            .reported
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(error = %error, "error already reported for this request");
            return false;
        }
        self.reporter.report(error, request);
        true
    }

    /// Whether an error has been reported.
    #[must_use]
    pub fn has_reported(&self) -> bool {
        self.reported.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSink")
            .field("reported", &self.has_reported())
            .finish_non_exhaustive()
    }
}
