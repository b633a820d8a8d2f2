//! Test fixtures for Strata development and testing.
//!
//! This module provides an in-memory [`Transport`], a reporter that records
//! what it receives, and shortcuts for building a [`Context`] without a
//! socket.
//!
//! # Example
//!
//! ```
//! use strata_core::fixtures;
//!
//! let (mut ctx, handle) = fixtures::context(http::Method::GET, "/");
//! ctx.set_status(http::StatusCode::ACCEPTED);
//! ctx.flush_headers().unwrap();
//!
//! assert_eq!(handle.status(), Some(http::StatusCode::ACCEPTED));
//! assert!(!handle.is_ended());
//! ```

use crate::body::BodyStream;
use crate::context::Context;
use crate::error::StrataError;
use crate::report::{ErrorReporter, ErrorSink, RequestSummary};
use crate::settings::AppSettings;
use crate::transport::{
    FinishHook, FinishSlot, HeadersSent, ResponseHead, Transport, TransportError,
    TransportRequest,
};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use http::{HeaderMap, Method, StatusCode, Uri};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Default)]
struct Exchange {
    head: Option<ResponseHead>,
    body: BytesMut,
    ended: bool,
    stream_error: Option<String>,
}

#[derive(Debug)]
struct Shared {
    exchange: Mutex<Exchange>,
    sent: HeadersSent,
    writable: AtomicBool,
    finish: FinishSlot,
    done: watch::Sender<bool>,
}

impl Shared {
    fn commit(&self, head: ResponseHead) {
        let mut exchange = self.exchange.lock();
        if exchange.head.is_none() {
            exchange.head = Some(head);
        }
        self.sent.mark();
    }

    fn complete(&self, result: Result<(), TransportError>) {
        {
            let mut exchange = self.exchange.lock();
            exchange.ended = true;
            if let Err(err) = &result {
                exchange.stream_error = Some(err.to_string());
            }
        }
        self.finish.fire(result);
        self.done.send_replace(true);
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.exchange.lock().ended {
            return Err(TransportError::AlreadyFinished);
        }
        if !self.writable.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed);
        }
        Ok(())
    }
}

/// A [`Transport`] that records the response in memory.
#[derive(Debug)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

/// Observer side of a [`MemoryTransport`].
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    shared: Arc<Shared>,
    done: watch::Receiver<bool>,
}

impl MemoryTransport {
    /// Creates a transport and the handle that observes it.
    #[must_use]
    pub fn new() -> (Self, MemoryHandle) {
        let (done, watcher) = watch::channel(false);
        let shared = Arc::new(Shared {
            exchange: Mutex::new(Exchange::default()),
            sent: HeadersSent::new(),
            writable: AtomicBool::new(true),
            finish: FinishSlot::new(),
            done,
        });
        let handle = MemoryHandle {
            shared: Arc::clone(&shared),
            done: watcher,
        };
        (Self { shared }, handle)
    }
}

impl Transport for MemoryTransport {
    fn headers_sent(&self) -> HeadersSent {
        self.shared.sent.clone()
    }

    fn is_writable(&self) -> bool {
        self.shared.writable.load(Ordering::Acquire) && !self.shared.exchange.lock().ended
    }

    fn send_head(&mut self, head: ResponseHead) -> Result<(), TransportError> {
        self.shared.ensure_open()?;
        self.shared.commit(head);
        Ok(())
    }

    fn end(&mut self, head: ResponseHead, chunk: Option<Bytes>) -> Result<(), TransportError> {
        self.shared.ensure_open()?;
        self.shared.commit(head);
        if let Some(chunk) = chunk {
            self.shared.exchange.lock().body.extend_from_slice(&chunk);
        }
        self.shared.complete(Ok(()));
        Ok(())
    }

    fn pipe(&mut self, head: ResponseHead, mut stream: BodyStream) -> Result<(), TransportError> {
        self.shared.ensure_open()?;
        self.shared.commit(head);
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                if !shared.writable.load(Ordering::Acquire) {
                    shared.complete(Err(TransportError::ConnectionClosed));
                    return;
                }
                match item {
                    Ok(chunk) => shared.exchange.lock().body.extend_from_slice(&chunk),
                    Err(err) => {
                        shared.complete(Err(TransportError::Stream(err)));
                        return;
                    }
                }
            }
            shared.complete(Ok(()));
        });
        Ok(())
    }

    fn on_finish(&mut self, hook: FinishHook) {
        self.shared.finish.register(hook);
    }
}

impl MemoryHandle {
    /// Committed status, if the head was sent.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.shared.exchange.lock().head.as_ref().map(|head| head.status)
    }

    /// Committed reason phrase override.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.shared
            .exchange
            .lock()
            .head
            .as_ref()
            .and_then(|head| head.reason.clone())
    }

    /// Committed headers; empty if nothing was sent.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        self.shared
            .exchange
            .lock()
            .head
            .as_ref()
            .map(|head| head.headers.clone())
            .unwrap_or_default()
    }

    /// A committed header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string)
    }

    /// Body bytes written so far.
    #[must_use]
    pub fn body_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.shared.exchange.lock().body)
    }

    /// Body written so far, lossily decoded.
    #[must_use]
    pub fn body(&self) -> String {
        String::from_utf8_lossy(&self.shared.exchange.lock().body).into_owned()
    }

    /// Whether the response has ended.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.shared.exchange.lock().ended
    }

    /// Error that cut a piped body short.
    #[must_use]
    pub fn stream_error(&self) -> Option<String> {
        self.shared.exchange.lock().stream_error.clone()
    }

    /// Simulates the client going away.
    pub fn close(&self) {
        self.shared.writable.store(false, Ordering::Release);
        self.shared.complete(Err(TransportError::ConnectionClosed));
    }

    /// Waits until the response ends or the connection closes.
    pub async fn finished(&mut self) {
        // The sender lives in `shared`, which this handle keeps alive.
        let _ = self.done.wait_for(|done| *done).await;
    }
}

#[derive(Debug, Clone)]
struct Recorded {
    message: String,
    summary: RequestSummary,
}

/// An [`ErrorReporter`] that keeps everything it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    records: Arc<Mutex<Vec<Recorded>>>,
}

impl RecordingReporter {
    /// Creates an empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reports received.
    #[must_use]
    pub fn count(&self) -> usize {
        self.records.lock().len()
    }

    /// Display strings of the reported errors.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.message.clone()).collect()
    }

    /// Summaries passed with each report.
    #[must_use]
    pub fn summaries(&self) -> Vec<RequestSummary> {
        self.records.lock().iter().map(|r| r.summary.clone()).collect()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, error: &StrataError, request: &RequestSummary) {
        self.records.lock().push(Recorded {
            message: error.to_string(),
            summary: request.clone(),
        });
    }
}

/// A context for `method` and `uri` with default settings.
///
/// Unparseable URIs fall back to `/`.
#[must_use]
pub fn context(method: Method, uri: &str) -> (Context, MemoryHandle) {
    let uri = Uri::try_from(uri).unwrap_or_else(|_| Uri::from_static("/"));
    context_with(TransportRequest::new(method, uri))
}

/// A context for a prepared request with default settings.
#[must_use]
pub fn context_with(request: TransportRequest) -> (Context, MemoryHandle) {
    context_reporting(request, Arc::new(RecordingReporter::new()))
}

/// A context whose errors go to `reporter`.
#[must_use]
pub fn context_reporting(
    request: TransportRequest,
    reporter: Arc<dyn ErrorReporter>,
) -> (Context, MemoryHandle) {
    let (transport, handle) = MemoryTransport::new();
    let ctx = Context::new(
        Arc::new(AppSettings::default()),
        request,
        Box::new(transport),
        ErrorSink::new(reporter),
    );
    (ctx, handle)
}
