//! Test request building.

use crate::error::TestError;
use bytes::Bytes;
use futures_util::stream;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri, Version};
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use strata_core::TransportRequest;

/// Peer address used when a request does not set one.
pub const DEFAULT_REMOTE_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40_000);

/// A request ready to be sent through a [`TestClient`](crate::TestClient).
#[derive(Debug, Clone)]
pub struct TestRequest {
    /// HTTP method
    pub method: Method,
    /// Request URI
    pub uri: Uri,
    /// HTTP version
    pub version: Version,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Bytes,
    /// Peer address of the simulated connection
    pub remote_addr: Option<SocketAddr>,
}

impl TestRequest {
    /// Creates a new GET request.
    pub fn get(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// Creates a new POST request.
    pub fn post(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// Creates a new PUT request.
    pub fn put(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT, uri)
    }

    /// Creates a new PATCH request.
    pub fn patch(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PATCH, uri)
    }

    /// Creates a new DELETE request.
    pub fn delete(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE, uri)
    }

    /// Creates a new OPTIONS request.
    pub fn options(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::OPTIONS, uri)
    }

    /// Creates a new HEAD request.
    pub fn head(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::HEAD, uri)
    }

    /// Converts this request into what a transport hands the dispatcher.
    ///
    /// A non-empty body becomes a single-chunk stream.
    pub fn into_transport_request(self) -> TransportRequest {
        let mut request = TransportRequest::new(self.method, self.uri);
        request.version = self.version;
        request.headers = self.headers;
        request.remote_addr = self.remote_addr;
        if self.body.is_empty() {
            request
        } else {
            let body = self.body;
            request.with_body(Box::pin(stream::once(async move { Ok(body) })))
        }
    }
}

/// Builder for constructing test requests.
///
/// Invalid headers do not panic; the first one is reported by
/// [`build`](Self::build).
#[must_use]
#[derive(Debug)]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    version: Version,
    headers: HeaderMap,
    body: Option<Bytes>,
    remote_addr: Option<SocketAddr>,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Creates a new request builder.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: None,
            remote_addr: Some(DEFAULT_REMOTE_ADDR),
            error: None,
        }
    }

    /// Sets a header, replacing earlier values.
    ///
    /// ```
    /// use strata_test::TestRequest;
    ///
    /// let request = TestRequest::get("/users")
    ///     .header("X-Request-Id", "12345")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(request.headers["x-request-id"], "12345");
    /// ```
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        match (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => {
                self.error.get_or_insert_with(|| {
                    TestError::InvalidHeader(format!("{}: {}", name.as_ref(), value.as_ref()))
                });
            }
        }
        self
    }

    /// Sets a typed header on the request.
    pub fn header_typed(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets the Accept header.
    pub fn accept(self, accept: impl AsRef<str>) -> Self {
        self.header(header::ACCEPT.as_str(), accept)
    }

    /// Sets the Referer header.
    pub fn referer(self, referer: impl AsRef<str>) -> Self {
        self.header(header::REFERER.as_str(), referer)
    }

    /// Sets the Authorization header with a Bearer token.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.header(
            header::AUTHORIZATION.as_str(),
            format!("Bearer {}", token.as_ref()),
        )
    }

    /// Sets the HTTP version.
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Sets the peer address; `None` simulates a transport without one.
    pub fn remote_addr(mut self, addr: Option<SocketAddr>) -> Self {
        self.remote_addr = addr;
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the request body as JSON and the matching Content-Type.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.body = Some(Bytes::from(bytes)),
            Err(e) => {
                self.error.get_or_insert(TestError::Json(e));
            }
        }
        self.content_type("application/json")
    }

    /// Sets the request body as `application/x-www-form-urlencoded`.
    ///
    /// `value` must serialize to a flat JSON object.
    pub fn form<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match form_encode(value) {
            Ok(encoded) => self.body = Some(Bytes::from(encoded)),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self.content_type("application/x-www-form-urlencoded")
    }

    /// Builds the test request.
    pub fn build(self) -> Result<TestRequest, TestError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let uri: Uri = self
            .uri
            .parse()
            .map_err(|e| TestError::RequestBuild(format!("Invalid URI: {e}")))?;

        Ok(TestRequest {
            method: self.method,
            uri,
            version: self.version,
            headers: self.headers,
            body: self.body.unwrap_or_default(),
            remote_addr: self.remote_addr,
        })
    }
}

fn form_encode<T: Serialize + ?Sized>(value: &T) -> Result<String, TestError> {
    let serde_json::Value::Object(map) = serde_json::to_value(value)? else {
        return Err(TestError::RequestBuild(
            "form bodies must serialize to an object".to_string(),
        ));
    };
    let pairs: Vec<String> = map
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            format!(
                "{}={}",
                urlencoding::encode(&key),
                urlencoding::encode(&value)
            )
        })
        .collect();
    Ok(pairs.join("&"))
}
