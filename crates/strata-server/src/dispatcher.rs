//! Per-request dispatch.
//!
//! The [`Dispatcher`] owns the compiled chain and runs it once per request:
//!
//! ```text
//! TransportRequest → create_context → register finish hook → chain
//!                                                              ↓
//!                       ResponseFinalizer (ok) / ctx.on_error (failure)
//! ```
//!
//! Reporting goes through the context's [`ErrorSink`](strata_core::ErrorSink),
//! so a failure seen by both the chain and the finish hook is reported once.

use crate::respond::ResponseFinalizer;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use strata_core::{
    AppSettings, Context, ErrorReporter, ErrorSink, HttpError, RequestSummary, StrataError,
    Transport, TransportError, TransportRequest,
};
use strata_middleware::ComposedHandler;
use tracing::{debug, trace};

/// Runs a compiled chain against incoming requests.
///
/// Cheap to clone; every clone shares the chain, settings and reporter.
#[derive(Clone)]
pub struct Dispatcher {
    handler: ComposedHandler,
    settings: Arc<AppSettings>,
    reporter: Arc<dyn ErrorReporter>,
}

impl Dispatcher {
    /// Creates a dispatcher.
    pub fn new(
        handler: ComposedHandler,
        settings: Arc<AppSettings>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            handler,
            settings,
            reporter,
        }
    }

    /// Settings shared by every context this dispatcher creates.
    #[must_use]
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// The compiled chain.
    #[must_use]
    pub fn handler(&self) -> &ComposedHandler {
        &self.handler
    }

    /// Builds a fresh context for one exchange.
    pub fn create_context(
        &self,
        request: TransportRequest,
        transport: Box<dyn Transport>,
    ) -> Context {
        Context::new(
            Arc::clone(&self.settings),
            request,
            transport,
            ErrorSink::new(Arc::clone(&self.reporter)),
        )
    }

    /// Creates a context and handles it.
    pub async fn dispatch(&self, request: TransportRequest, transport: Box<dyn Transport>) {
        let ctx = self.create_context(request, transport);
        self.handle_request(ctx).await;
    }

    /// Runs the chain on `ctx`, then finalizes the response or handles the
    /// error that escaped.
    pub async fn handle_request(&self, mut ctx: Context) {
        Self::watch_finish(&mut ctx);

        let outcome = AssertUnwindSafe(self.handler.call(&mut ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(panic_error(panic.as_ref())));

        let result = outcome.and_then(|()| ResponseFinalizer::finalize(&mut ctx));
        match result {
            Ok(()) => trace!(status = ctx.status().as_u16(), "response finalized"),
            Err(err) => ctx.on_error(err),
        }
    }

    /// Routes transport failures observed after the chain into the error sink.
    fn watch_finish(ctx: &mut Context) {
        let sink = ctx.error_sink().clone();
        let method = ctx.method().clone();
        let url = ctx.original_url().to_string();
        ctx.on_finish(Box::new(move |result| match result {
            Ok(()) => {}
            Err(TransportError::ConnectionClosed) => {
                debug!(http.url = %url, "client closed the connection early");
            }
            Err(err) => {
                let err = StrataError::from(err);
                let summary = RequestSummary {
                    method,
                    url,
                    status: err.status(),
                };
                sink.report(&err, &summary);
            }
        }));
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handler", &self.handler)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn panic_error(panic: &(dyn Any + Send)) -> StrataError {
    let message = panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    HttpError::internal(anyhow::anyhow!("middleware panicked: {message}")).into()
}
