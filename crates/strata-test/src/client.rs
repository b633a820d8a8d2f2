//! Test client for in-memory HTTP testing.

use crate::error::TestError;
use crate::request::{TestRequest, TestRequestBuilder};
use crate::response::TestResponse;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::net::SocketAddr;
use std::time::Duration;
use strata_core::fixtures::{MemoryHandle, MemoryTransport};
use strata_server::{Application, Dispatcher};

/// How long a streamed response may take to end.
pub const DEFAULT_FINISH_TIMEOUT: Duration = Duration::from_secs(5);

/// A test client that dispatches requests without a socket.
///
/// Each request gets a fresh [`MemoryTransport`]; the client waits for the
/// response to end, so streamed bodies are collected in full.
///
/// # Example
///
/// ```
/// use strata_server::Application;
/// use strata_test::TestClient;
///
/// # tokio_test::block_on(async {
/// let mut app = Application::new();
/// app.use_fn("hello", |ctx, _next| {
///     Box::pin(async move {
///         ctx.set_body("Hello, World!");
///         Ok(())
///     })
/// });
///
/// let client = TestClient::new(&app).unwrap();
/// let response = client.get("/").send().await;
/// response.assert_status_code(200).assert_body_eq("Hello, World!");
/// # });
/// ```
#[derive(Clone)]
pub struct TestClient {
    dispatcher: Dispatcher,
    default_headers: HeaderMap,
    finish_timeout: Duration,
}

impl TestClient {
    /// Compiles `app` and creates a client for it.
    pub fn new(app: &Application) -> Result<Self, TestError> {
        Ok(Self::from_dispatcher(app.callback()?))
    }

    /// Creates a client around an existing dispatcher.
    #[must_use]
    pub fn from_dispatcher(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            default_headers: HeaderMap::new(),
            finish_timeout: DEFAULT_FINISH_TIMEOUT,
        }
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn with_default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// Sets how long to wait for a started response to end.
    #[must_use]
    pub fn with_finish_timeout(mut self, timeout: Duration) -> Self {
        self.finish_timeout = timeout;
        self
    }

    /// The dispatcher requests go through.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Creates a GET request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Creates a POST request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Creates a PUT request.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// Creates a PATCH request.
    pub fn patch(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PATCH, uri)
    }

    /// Creates a DELETE request.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Creates an OPTIONS request.
    pub fn options(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::OPTIONS, uri)
    }

    /// Creates a HEAD request.
    pub fn head(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::HEAD, uri)
    }

    /// Creates a request with an arbitrary method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        let mut builder = TestRequestBuilder::new(method, uri);
        for (name, value) in &self.default_headers {
            builder = builder.header_typed(name.clone(), value.clone());
        }
        TestClientRequest {
            client: self,
            builder,
        }
    }

    /// Dispatches a built request and returns the raw exchange.
    ///
    /// Returns once the chain has run and, if a head was committed, the
    /// response has ended.
    pub async fn dispatch(&self, request: TestRequest) -> Result<MemoryHandle, TestError> {
        let (transport, mut handle) = MemoryTransport::new();
        self.dispatcher
            .dispatch(request.into_transport_request(), Box::new(transport))
            .await;

        if handle.status().is_some() && !handle.is_ended() {
            tokio::time::timeout(self.finish_timeout, handle.finished())
                .await
                .map_err(|_| TestError::Timeout(self.finish_timeout))?;
        }
        Ok(handle)
    }

    /// Dispatches a built request and captures the response.
    pub async fn execute(&self, request: TestRequest) -> Result<TestResponse, TestError> {
        let handle = self.dispatch(request).await?;
        TestResponse::from_handle(&handle).ok_or(TestError::NoResponse)
    }
}

impl std::fmt::Debug for TestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient")
            .field("stages", &self.dispatcher.handler().stage_names())
            .field("default_headers", &self.default_headers)
            .field("finish_timeout", &self.finish_timeout)
            .finish()
    }
}

/// A request being built by a [`TestClient`].
#[must_use]
#[derive(Debug)]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl TestClientRequest<'_> {
    /// Sets a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(mut self, content_type: impl AsRef<str>) -> Self {
        self.builder = self.builder.content_type(content_type);
        self
    }

    /// Sets the Referer header.
    pub fn referer(mut self, referer: impl AsRef<str>) -> Self {
        self.builder = self.builder.referer(referer);
        self
    }

    /// Sets a Bearer token.
    pub fn bearer_token(mut self, token: impl AsRef<str>) -> Self {
        self.builder = self.builder.bearer_token(token);
        self
    }

    /// Sets the peer address.
    pub fn remote_addr(mut self, addr: Option<SocketAddr>) -> Self {
        self.builder = self.builder.remote_addr(addr);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets a JSON body.
    pub fn json<T: serde::Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sends the request.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or no response was written.
    pub async fn send(self) -> TestResponse {
        self.try_send().await.expect("Failed to send request")
    }

    /// Sends the request, returning an error on failure.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        self.client.execute(request).await
    }

    /// Sends the request and returns the raw exchange.
    pub async fn dispatch(self) -> Result<MemoryHandle, TestError> {
        let request = self.builder.build()?;
        self.client.dispatch(request).await
    }
}
