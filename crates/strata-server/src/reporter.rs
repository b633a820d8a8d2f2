//! Default error reporter.
//!
//! Logs unhandled errors through `tracing`. Not-found errors and errors
//! flagged as client-safe (`expose`) are expected traffic and stay quiet,
//! as does everything when the application is marked silent.

use std::error::Error as _;
use strata_core::{ErrorReporter, RequestSummary, StrataError};
use tracing::error;

/// An [`ErrorReporter`] that writes to the `tracing` error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter {
    silent: bool,
}

impl TracingReporter {
    /// Creates a reporter; `silent` suppresses all output.
    #[must_use]
    pub const fn new(silent: bool) -> Self {
        Self { silent }
    }

    /// Whether `error` would be logged.
    #[must_use]
    pub fn should_log(&self, error: &StrataError) -> bool {
        !(self.silent || error.status() == http::StatusCode::NOT_FOUND || error.expose())
    }
}

impl ErrorReporter for TracingReporter {
    fn report(&self, err: &StrataError, request: &RequestSummary) {
        if !self.should_log(err) {
            return;
        }

        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        error!(
            http.method = %request.method,
            http.url = %request.url,
            http.status_code = request.status.as_u16(),
            error = %err,
            causes = ?causes,
            "unhandled error"
        );
    }
}
