//! Access logging middleware.
//!
//! Emits one structured `tracing` event per request once the rest of the
//! chain has finished. Field names follow the `http.*` convention used by
//! the telemetry crate so JSON logs line up.
//!
//! ```text
//! INFO request completed http.method=GET http.url=/users/1 http.status_code=200 duration_ms=0.42
//! ```

use crate::middleware::{BoxFuture, Middleware, Next};
use crate::stages::request_id::request_id;
use std::time::{Duration, Instant};
use strata_core::{Context, StrataResult};
use tracing::{info, warn};

/// One finished request, as recorded by [`RequestLog`].
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRecord {
    /// Request method.
    pub method: String,
    /// Request URL as received.
    pub url: String,
    /// Final status; 500 when downstream failed without setting one.
    pub status: u16,
    /// Time spent downstream.
    pub duration_ms: f64,
    /// Request ID, when the request ID stage ran first.
    pub request_id: Option<String>,
    /// Whether downstream returned an error.
    pub failed: bool,
}

/// Middleware that logs every request.
#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    record_in_state: bool,
}

/// State bag key holding the [`AccessRecord`] when recording is enabled.
pub const ACCESS_RECORD_STATE_KEY: &str = "access_record";

impl RequestLog {
    /// Creates the logging stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also stores the [`AccessRecord`] in the state bag.
    #[must_use]
    pub fn record_in_state(mut self, enabled: bool) -> Self {
        self.record_in_state = enabled;
        self
    }

    fn record(ctx: &Context, elapsed: Duration, result: &StrataResult<()>) -> AccessRecord {
        let status = match result {
            Ok(()) => ctx.status().as_u16(),
            Err(err) => err.status().as_u16(),
        };
        AccessRecord {
            method: ctx.method().to_string(),
            url: ctx.original_url().to_string(),
            status,
            duration_ms: elapsed.as_secs_f64() * 1000.0,
            request_id: request_id(ctx).map(ToString::to_string),
            failed: result.is_err(),
        }
    }
}

impl Middleware for RequestLog {
    fn name(&self) -> &'static str {
        "request_log"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, StrataResult<()>> {
        Box::pin(async move {
            let start = Instant::now();
            let result = next.run(ctx).await;
            let record = Self::record(ctx, start.elapsed(), &result);

            if record.failed {
                warn!(
                    http.method = %record.method,
                    http.url = %record.url,
                    http.status_code = record.status,
                    duration_ms = record.duration_ms,
                    request_id = record.request_id.as_deref().unwrap_or(""),
                    "request failed"
                );
            } else {
                info!(
                    http.method = %record.method,
                    http.url = %record.url,
                    http.status_code = record.status,
                    duration_ms = record.duration_ms,
                    request_id = record.request_id.as_deref().unwrap_or(""),
                    "request completed"
                );
            }

            if self.record_in_state {
                ctx.state_mut().insert(ACCESS_RECORD_STATE_KEY, record);
            }
            result
        })
    }
}
