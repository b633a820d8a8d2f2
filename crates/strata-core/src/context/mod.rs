//! The per-request context.
//!
//! A [`Context`] is built fresh for every request and owns everything the
//! middleware chain reads and mutates: the derived [`RequestFacets`], the
//! [`ResponseState`], the [`State`] bag, the unread request body and the
//! transport the response is eventually written to.
//!
//! Most handlers only need the delegating helpers on `Context` itself:
//!
//! ```
//! use http::StatusCode;
//! use strata_core::fixtures;
//!
//! let (mut ctx, _handle) = fixtures::context(http::Method::GET, "/hello");
//! assert_eq!(ctx.status(), StatusCode::NOT_FOUND);
//!
//! ctx.set_body("hi");
//! assert_eq!(ctx.status(), StatusCode::OK);
//! assert_eq!(ctx.response_type().as_deref(), Some("text/plain"));
//! ```

mod request;
mod response;
mod state;

pub use request::{RequestFacets, RequestSnapshot};
pub use response::{ResponseSnapshot, ResponseState};
pub use state::State;

use crate::accepts::Accepts;
use crate::body::{Body, BodyStream};
use crate::cookie::{Cookies, SetCookie};
use crate::error::{HttpError, InvalidHeader, StrataError, StrataResult};
use crate::report::{ErrorSink, RequestSummary};
use crate::settings::AppSettings;
use crate::status;
use crate::transport::{FinishHook, Transport, TransportError, TransportRequest};
use bytes::{Bytes, BytesMut};
use futures_util::TryStreamExt;
use http::header::{HeaderName, HeaderValue, LOCATION, SET_COOKIE};
use http::{HeaderMap, Method, StatusCode};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Everything one request owns while it travels through the chain.
pub struct Context {
    settings: Arc<AppSettings>,
    request: RequestFacets,
    response: ResponseState,
    state: State,
    request_body: Option<BodyStream>,
    transport: Box<dyn Transport>,
    errors: ErrorSink,
    respond: bool,
}

impl Context {
    /// Builds a context for one exchange.
    ///
    /// The response starts as a 404 with no explicit status, the original URL
    /// and client address are computed here and then frozen.
    pub fn new(
        settings: Arc<AppSettings>,
        request: TransportRequest,
        transport: Box<dyn Transport>,
        errors: ErrorSink,
    ) -> Self {
        let TransportRequest {
            method,
            uri,
            version,
            headers,
            remote_addr,
            body,
        } = request;
        let facets = RequestFacets::new(method, uri, version, headers, remote_addr, &settings);
        let response = ResponseState::new(transport.headers_sent());
        Self {
            settings,
            request: facets,
            response,
            state: State::new(),
            request_body: body,
            transport,
            errors,
            respond: true,
        }
    }

    /// Application settings this context was built from.
    #[must_use]
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Request facts.
    #[must_use]
    pub fn request(&self) -> &RequestFacets {
        &self.request
    }

    /// Mutable request facts; only the URL is rewritable.
    pub fn request_mut(&mut self) -> &mut RequestFacets {
        &mut self.request
    }

    /// Response state.
    #[must_use]
    pub fn response(&self) -> &ResponseState {
        &self.response
    }

    /// Mutable response state.
    pub fn response_mut(&mut self) -> &mut ResponseState {
        &mut self.response
    }

    /// Inter-middleware state bag.
    #[must_use]
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Mutable state bag.
    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    // Request delegates.

    /// Request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// Current request URL.
    #[must_use]
    pub fn url(&self) -> &str {
        self.request.url()
    }

    /// URL as received.
    #[must_use]
    pub fn original_url(&self) -> &str {
        self.request.original_url()
    }

    /// Request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.request.path()
    }

    /// Client address.
    #[must_use]
    pub fn ip(&self) -> &str {
        self.request.ip()
    }

    /// A request header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    /// All request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// Accept negotiation.
    #[must_use]
    pub fn accepts(&self) -> &Accepts {
        self.request.accepts()
    }

    /// Request cookies.
    #[must_use]
    pub fn cookies(&self) -> Cookies {
        Cookies::from_headers(self.request.headers())
    }

    /// Takes the unread request body. Returns `None` on the second call.
    pub fn take_request_body(&mut self) -> Option<BodyStream> {
        self.request_body.take()
    }

    /// Reads the whole request body into memory.
    ///
    /// A body that was already taken reads as empty.
    pub async fn read_body(&mut self) -> StrataResult<Bytes> {
        let Some(mut stream) = self.request_body.take() else {
            return Ok(Bytes::new());
        };
        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.try_next().await.map_err(|err| {
            HttpError::new(StatusCode::BAD_REQUEST, "failed to read request body").with_source(err)
        })? {
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }

    // Response delegates.

    /// Response status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// Sets the response status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    /// Response status message.
    #[must_use]
    pub fn message(&self) -> &str {
        self.response.message()
    }

    /// Overrides the status message.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.response.set_message(message);
    }

    /// Response body.
    #[must_use]
    pub fn body(&self) -> &Body {
        self.response.body()
    }

    /// Sets the response body.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.response.set_body(body);
    }

    /// Serializes `value` as the JSON response body.
    pub fn set_json<T: Serialize + ?Sized>(&mut self, value: &T) -> StrataResult<()> {
        self.response.set_body(Body::json(value)?);
        Ok(())
    }

    /// Sets the response `Content-Type`.
    pub fn set_type(&mut self, value: &str) {
        self.response.set_type(value);
    }

    /// Response `Content-Type` without parameters.
    #[must_use]
    pub fn response_type(&self) -> Option<String> {
        self.response.response_type()
    }

    /// Checks the request `Content-Type`.
    #[must_use]
    pub fn is(&self, types: &[&str]) -> Option<String> {
        self.request.is(types)
    }

    /// Response content length.
    #[must_use]
    pub fn length(&self) -> Option<u64> {
        self.response.length()
    }

    /// Sets `Content-Length`.
    pub fn set_length(&mut self, length: u64) {
        self.response.set_length(length);
    }

    /// A response header.
    #[must_use]
    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.response.headers().get(name)
    }

    /// Replaces a response header.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), InvalidHeader> {
        self.response.headers_mut().set(name, value)
    }

    /// Appends a response header value.
    pub fn append_header(&mut self, name: &str, value: &str) -> Result<(), InvalidHeader> {
        self.response.headers_mut().append(name, value)
    }

    /// Removes a response header.
    pub fn remove_header(&mut self, name: &str) {
        self.response.headers_mut().remove(name);
    }

    /// Sets `Last-Modified`.
    pub fn set_last_modified(&mut self, at: SystemTime) {
        self.response.set_last_modified(at);
    }

    /// Sets `ETag`.
    pub fn set_etag(&mut self, tag: &str) -> Result<(), InvalidHeader> {
        self.response.set_etag(tag)
    }

    /// Adds a field to `Vary`.
    pub fn vary(&mut self, field: &str) -> Result<(), InvalidHeader> {
        self.response.vary(field)
    }

    /// Marks the response as a download.
    pub fn attachment(&mut self, filename: Option<&str>) -> Result<(), InvalidHeader> {
        self.response.attachment(filename)
    }

    /// Appends a `Set-Cookie` header.
    pub fn set_cookie(&mut self, cookie: &SetCookie) -> Result<(), InvalidHeader> {
        let value = HeaderValue::from_str(&cookie.to_string())
            .map_err(|_| InvalidHeader::value(SET_COOKIE.as_str()))?;
        self.response.headers_mut().append_value(SET_COOKIE, value);
        Ok(())
    }

    /// Redirects the client.
    ///
    /// `"back"` resolves to the `Referrer` header, then `alt`, then `/`.
    /// Non-redirect statuses become 302. The body is a short HTML or text
    /// notice depending on what the client accepts.
    pub fn redirect(&mut self, url: &str, alt: Option<&str>) -> Result<(), InvalidHeader> {
        let target = if url == "back" {
            self.request
                .header("referrer")
                .or(alt)
                .unwrap_or("/")
                .to_string()
        } else {
            url.to_string()
        };
        let location =
            HeaderValue::from_str(&target).map_err(|_| InvalidHeader::value(LOCATION.as_str()))?;
        self.response.headers_mut().insert(LOCATION, location);

        if !status::is_redirect(self.response.status()) {
            self.response.set_status(StatusCode::FOUND);
        }

        if self.request.accepts().accepts("html") {
            let escaped = escape_html(&target);
            self.response.set_type("text/html; charset=utf-8");
            self.response
                .set_body(format!("Redirecting to <a href=\"{escaped}\">{escaped}</a>."));
        } else {
            self.response.set_type("text/plain; charset=utf-8");
            self.response.set_body(format!("Redirecting to {target}."));
        }
        Ok(())
    }

    // Transport access.

    /// Whether the response head has been committed.
    #[must_use]
    pub fn header_sent(&self) -> bool {
        self.response.header_sent()
    }

    /// Whether the connection still accepts response bytes.
    #[must_use]
    pub fn writable(&self) -> bool {
        self.transport.is_writable()
    }

    /// Commits the response head now.
    pub fn flush_headers(&mut self) -> Result<(), TransportError> {
        let head = self.response.head();
        self.transport.send_head(head)
    }

    /// Turns automatic response finalization on or off.
    ///
    /// With `false`, the handler owns the transport and must end the response
    /// itself through [`transport_mut`](Self::transport_mut).
    pub fn set_respond(&mut self, respond: bool) {
        self.respond = respond;
    }

    /// Whether the response will be finalized automatically.
    #[must_use]
    pub fn should_respond(&self) -> bool {
        self.respond
    }

    /// Raw access to the transport.
    pub fn transport_mut(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    /// Registers a completion callback on the transport.
    pub fn on_finish(&mut self, hook: FinishHook) {
        self.transport.on_finish(hook);
    }

    // Errors.

    /// Builds an [`HttpError`] for `status` to return from a handler.
    ///
    /// ```
    /// use http::StatusCode;
    /// use strata_core::fixtures;
    ///
    /// let (ctx, _handle) = fixtures::context(http::Method::GET, "/admin");
    /// let err = ctx.throw(StatusCode::FORBIDDEN, "admins only");
    /// assert_eq!(err.status(), StatusCode::FORBIDDEN);
    /// assert!(err.expose());
    /// ```
    #[must_use]
    pub fn throw(&self, status: StatusCode, message: impl Into<String>) -> StrataError {
        HttpError::new(status, message).into()
    }

    /// Fails with `status` unless `condition` holds.
    pub fn assert(
        &self,
        condition: bool,
        status: StatusCode,
        message: impl Into<String>,
    ) -> StrataResult<()> {
        if condition {
            Ok(())
        } else {
            Err(self.throw(status, message))
        }
    }

    /// The once-only error sink of this request.
    #[must_use]
    pub fn error_sink(&self) -> &ErrorSink {
        &self.errors
    }

    /// What a reporter is told about this request when `error` escapes.
    #[must_use]
    pub fn summary(&self, error: &StrataError) -> RequestSummary {
        RequestSummary {
            method: self.request.method().clone(),
            url: self.request.original_url().to_string(),
            status: error.status(),
        }
    }

    /// Reports `error` unless this request already reported one.
    pub fn report(&self, error: &StrataError) -> bool {
        self.errors.report(error, &self.summary(error))
    }

    /// Handles an error that escaped the chain.
    ///
    /// Reports it, then, if the head is still unsent and the connection
    /// writable, replaces the response with a plain-text error derived from
    /// the error's status. After headers are sent only the report happens.
    /// A connection the client already closed is neither reported nor written.
    pub fn on_error(&mut self, error: StrataError) {
        if matches!(error, StrataError::Transport(TransportError::ConnectionClosed)) {
            debug!(http.url = %self.original_url(), "client closed the connection early");
            return;
        }
        let committed = self.header_sent() || !self.writable();
        self.report(&error);
        if committed {
            debug!(error = %error, "response already committed, error only reported");
            return;
        }

        let headers = self.response.headers_mut();
        headers.clear();
        if let Some(extra) = error.headers() {
            for (name, value) in extra {
                headers.append_value(HeaderName::clone(name), value.clone());
            }
        }

        let message = error.client_message();
        self.response.set_type("text");
        self.response.set_status(error.status());
        self.response.set_length(message.len() as u64);

        let head = self.response.head();
        if let Err(err) = self.transport.end(head, Some(Bytes::from(message))) {
            warn!(error = %err, "failed to write error response");
        }
    }

    /// Serializable view of the whole context.
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            request: self.request.snapshot(),
            response: self.response.snapshot(),
            app: self.settings.as_ref().clone(),
            original_url: self.request.original_url().to_string(),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", self.request.method())
            .field("url", &self.request.url())
            .field("status", &self.response.status())
            .field("body", &self.response.body().kind())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Serializable view of a [`Context`].
#[derive(Debug, Clone, Serialize)]
pub struct ContextSnapshot {
    /// Request view.
    pub request: RequestSnapshot,
    /// Response view.
    pub response: ResponseSnapshot,
    /// Application settings.
    pub app: AppSettings,
    /// URL as received.
    pub original_url: String,
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
