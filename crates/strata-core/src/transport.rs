//! The seam between the dispatch core and a concrete connection.
//!
//! A [`Transport`] owns the writable half of one exchange. The core never
//! touches sockets: it hands a [`ResponseHead`] and a body to the transport
//! and observes the shared [`HeadersSent`] flag to know when response headers
//! have been committed.

use crate::body::BodyStream;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri, Version};
use parking_lot::Mutex;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Callback fired exactly once when the exchange finishes.
///
/// Receives `Err` when the connection failed while the response was in flight.
pub type FinishHook = Box<dyn FnOnce(Result<(), TransportError>) + Send>;

/// Errors raised while writing a response.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The peer went away before the response completed.
    #[error("connection closed before the response completed")]
    ConnectionClosed,

    /// The response was already ended.
    #[error("response already finished")]
    AlreadyFinished,

    /// The response head could not be built.
    #[error("invalid response head: {0}")]
    InvalidHead(String),

    /// A piped body stream yielded an error.
    #[error("body stream failed: {0}")]
    Stream(#[source] std::io::Error),

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Monotonic flag shared between a transport and the response header store.
///
/// Once set it never clears.
#[derive(Debug, Clone, Default)]
pub struct HeadersSent(Arc<AtomicBool>);

impl HeadersSent {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once headers have been committed.
    #[must_use]
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Marks headers as committed.
    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Status line and headers of an outgoing response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// Response status.
    pub status: StatusCode,
    /// Reason phrase, when it differs from the canonical one.
    pub reason: Option<String>,
    /// Response headers.
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// Creates a head with no headers.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: None,
            headers: HeaderMap::new(),
        }
    }
}

/// The readable half of an exchange, as handed to the dispatcher.
pub struct TransportRequest {
    /// Request method.
    pub method: Method,
    /// Request target.
    pub uri: Uri,
    /// Protocol version.
    pub version: Version,
    /// Request headers.
    pub headers: HeaderMap,
    /// Address of the peer, when known.
    pub remote_addr: Option<SocketAddr>,
    /// Unread request body.
    pub body: Option<BodyStream>,
}

impl TransportRequest {
    /// Creates a bodiless request.
    #[must_use]
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            remote_addr: None,
            body: None,
        }
    }

    /// Builds a request from parsed `http` parts.
    #[must_use]
    pub fn from_parts(parts: http::request::Parts, remote_addr: Option<SocketAddr>) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            remote_addr,
            body: None,
        }
    }

    /// Attaches a body stream.
    #[must_use]
    pub fn with_body(mut self, body: BodyStream) -> Self {
        self.body = Some(body);
        self
    }
}

impl fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRequest")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("version", &self.version)
            .field("remote_addr", &self.remote_addr)
            .field("has_body", &self.body.is_some())
            .finish_non_exhaustive()
    }
}

/// The writable half of one request/response exchange.
///
/// Implementations must set the [`HeadersSent`] flag returned by
/// [`headers_sent`](Transport::headers_sent) the moment the head is committed,
/// and must fire the registered [`FinishHook`] at most once.
pub trait Transport: Send {
    /// The flag observed by the response header store.
    fn headers_sent(&self) -> HeadersSent;

    /// Whether the connection can still accept response bytes.
    fn is_writable(&self) -> bool;

    /// Commits the response head without ending the response.
    fn send_head(&mut self, head: ResponseHead) -> Result<(), TransportError>;

    /// Ends the response, optionally with a final chunk.
    ///
    /// `head` is ignored when headers were already sent.
    fn end(&mut self, head: ResponseHead, chunk: Option<Bytes>) -> Result<(), TransportError>;

    /// Pipes a stream to the client and ends the response when it is drained.
    fn pipe(&mut self, head: ResponseHead, stream: BodyStream) -> Result<(), TransportError>;

    /// Registers the completion callback.
    fn on_finish(&mut self, hook: FinishHook);
}

/// Holder for a [`FinishHook`] that guarantees a single invocation.
///
/// Transports embed one of these; cloning shares the slot so a background
/// task can fire it.
#[derive(Clone, Default)]
pub struct FinishSlot {
    state: Arc<Mutex<SlotState>>,
}

#[derive(Default)]
struct SlotState {
    hook: Option<FinishHook>,
    failed: Option<bool>,
}

impl FinishSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the hook, firing it immediately if the exchange already finished.
    pub fn register(&self, hook: FinishHook) {
        let mut state = self.state.lock();
        let finished = state.failed;
        match finished {
            Some(failed) => {
                drop(state);
                hook(if failed {
                    Err(TransportError::ConnectionClosed)
                } else {
                    Ok(())
                });
            }
            None => state.hook = Some(hook),
        }
    }

    /// Fires the hook once; later calls are ignored.
    pub fn fire(&self, result: Result<(), TransportError>) {
        let hook = {
            let mut state = self.state.lock();
            if state.failed.is_some() {
                return;
            }
            state.failed = Some(result.is_err());
            state.hook.take()
        };
        if let Some(hook) = hook {
            hook(result);
        }
    }

    /// Returns `true` once [`fire`](Self::fire) has been called.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.lock().failed.is_some()
    }
}

impl fmt::Debug for FinishSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinishSlot")
            .field("finished", &self.is_finished())
            .finish()
    }
}
