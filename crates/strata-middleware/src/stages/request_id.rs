//! Request ID middleware.
//!
//! Assigns every request an identifier for log correlation. The identifier
//! is stored in the state bag under [`REQUEST_ID_STATE_KEY`] and echoed on
//! the response in the `X-Request-ID` header.
//!
//! ## Request ID Sources
//!
//! 1. **X-Request-ID header**: used when incoming IDs are trusted and the
//!    value parses as a UUID
//! 2. **Generated UUID v7**: otherwise

use crate::middleware::{BoxFuture, Middleware, Next};
use strata_core::{Context, StrataResult};
use tracing::trace;
use uuid::Uuid;

/// The header name for request ID propagation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// State bag key holding the request ID as a `String`.
pub const REQUEST_ID_STATE_KEY: &str = "request_id";

/// Middleware that generates or propagates request IDs.
///
/// # Example
///
/// ```
/// use strata_middleware::stages::RequestId;
/// use strata_middleware::MiddlewareChain;
///
/// let chain = MiddlewareChain::new().with(RequestId::new());
/// assert_eq!(chain.names(), vec!["request_id"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestId {
    /// Whether to trust incoming request ID headers.
    ///
    /// Typically `false` for external traffic and `true` behind a gateway
    /// that already assigns IDs.
    trust_incoming: bool,
}

impl RequestId {
    /// Creates a middleware that always generates new IDs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a middleware that trusts incoming `X-Request-ID` headers.
    #[must_use]
    pub fn trust_incoming() -> Self {
        Self {
            trust_incoming: true,
        }
    }

    /// Whether incoming IDs are honored.
    #[must_use]
    pub fn trusts_incoming(&self) -> bool {
        self.trust_incoming
    }

    fn extract(&self, ctx: &Context) -> Option<Uuid> {
        if !self.trust_incoming {
            return None;
        }
        ctx.header(REQUEST_ID_HEADER)
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
    }
}

/// Reads the request ID assigned by [`RequestId`], if that stage ran.
#[must_use]
pub fn request_id(ctx: &Context) -> Option<&str> {
    ctx.state()
        .get::<String>(REQUEST_ID_STATE_KEY)
        .map(String::as_str)
}

impl Middleware for RequestId {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, StrataResult<()>> {
        Box::pin(async move {
            let id = self.extract(ctx).unwrap_or_else(Uuid::now_v7).to_string();
            trace!(request_id = %id, "assigned request id");

            ctx.set_header(REQUEST_ID_HEADER, &id)?;
            ctx.state_mut().insert(REQUEST_ID_STATE_KEY, id);

            next.run(ctx).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{compose, BoxedMiddleware};
    use crate::middleware::FnMiddleware;
    use http::{HeaderValue, Method};
    use std::sync::Arc;
    use strata_core::{fixtures, TransportRequest};

    fn request_with_id(id: &str) -> TransportRequest {
        let mut request = TransportRequest::new(Method::GET, "/test".parse().unwrap());
        request
            .headers
            .insert(REQUEST_ID_HEADER, HeaderValue::from_str(id).unwrap());
        request
    }

    async fn run(stage: RequestId, request: TransportRequest) -> Context {
        let handler = compose(vec![
            Arc::new(stage) as BoxedMiddleware,
            Arc::new(FnMiddleware::new("ok", |ctx, _next| {
                Box::pin(async move {
                    ctx.set_body("OK");
                    Ok(())
                })
            })),
        ])
        .unwrap();
        let (mut ctx, _handle) = fixtures::context_with(request);
        handler.call(&mut ctx).await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_generates_request_id_when_missing() {
        let ctx = run(
            RequestId::new(),
            TransportRequest::new(Method::GET, "/test".parse().unwrap()),
        )
        .await;

        let header_id = ctx.response_header(REQUEST_ID_HEADER).unwrap().to_string();
        let parsed = Uuid::parse_str(&header_id).unwrap();
        assert_eq!(parsed.get_version_num(), 7);
        assert_eq!(request_id(&ctx), Some(header_id.as_str()));
    }

    #[tokio::test]
    async fn test_ignores_incoming_id_when_not_trusted() {
        let incoming = "01234567-89ab-7def-8123-456789abcdef";
        let ctx = run(RequestId::new(), request_with_id(incoming)).await;
        assert_ne!(ctx.response_header(REQUEST_ID_HEADER), Some(incoming));
    }

    #[tokio::test]
    async fn test_uses_incoming_id_when_trusted() {
        let incoming = "01234567-89ab-7def-8123-456789abcdef";
        let ctx = run(RequestId::trust_incoming(), request_with_id(incoming)).await;
        assert_eq!(ctx.response_header(REQUEST_ID_HEADER), Some(incoming));
        assert_eq!(request_id(&ctx), Some(incoming));
    }

    #[tokio::test]
    async fn test_ignores_invalid_incoming_id() {
        let ctx = run(RequestId::trust_incoming(), request_with_id("not-a-valid-uuid")).await;
        let header_id = ctx.response_header(REQUEST_ID_HEADER).unwrap();
        assert_ne!(header_id, "not-a-valid-uuid");
        assert!(Uuid::parse_str(header_id).is_ok());
    }

    #[test]
    fn test_trust_incoming_config() {
        assert!(!RequestId::new().trusts_incoming());
        assert!(RequestId::trust_incoming().trusts_incoming());
        assert_eq!(RequestId::new().name(), "request_id");
    }
}
