//! Response finalization.
//!
//! Once the chain completes without an error, [`ResponseFinalizer`] commits
//! whatever the context holds to the transport. The checks run in a fixed
//! order and the first match wins:
//!
//! 1. Finalization bypassed with `ctx.set_respond(false)` → nothing
//! 2. Connection no longer writable → nothing
//! 3. Body-forbidden status (204, 205, 304) → end with no payload
//! 4. `HEAD` → compute a missing Content-Length, end with no payload
//! 5. No body → status message as a `text/plain` body
//! 6. Binary → bytes verbatim
//! 7. Text → verbatim
//! 8. Stream → piped; the transport owns its lifecycle
//! 9. JSON → serialized, with Content-Length

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use http::Method;
use strata_core::{status, Body, Context, StrataResult};
use tracing::trace;

/// Commits the final response of a context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseFinalizer;

impl ResponseFinalizer {
    /// Writes the response held by `ctx`.
    ///
    /// Serialization and transport failures are returned so the caller can
    /// route them through the context's error handling.
    pub fn finalize(ctx: &mut Context) -> StrataResult<()> {
        if !ctx.should_respond() {
            trace!("response finalization bypassed");
            return Ok(());
        }
        if !ctx.writable() {
            trace!("connection no longer writable, skipping response");
            return Ok(());
        }

        let code = ctx.status();
        if status::is_empty(code) {
            let response = ctx.response_mut();
            response.take_body();
            let headers = response.headers_mut();
            headers.remove(CONTENT_TYPE);
            headers.remove(CONTENT_LENGTH);
            headers.remove(TRANSFER_ENCODING);
            return Self::end(ctx, None);
        }

        if *ctx.method() == Method::HEAD {
            let response = ctx.response_mut();
            if !response.header_sent() {
                let has_length = response.headers().contains(CONTENT_LENGTH);
                let is_json = matches!(response.body(), Body::Json(_));
                if is_json || !has_length {
                    if let Some(length) = response.body().known_length() {
                        response.set_length(length);
                    }
                }
            }
            return Self::end(ctx, None);
        }

        match ctx.response_mut().take_body() {
            Body::Empty => {
                let fallback = match ctx.message() {
                    "" => code.as_u16().to_string(),
                    message => message.to_string(),
                };
                if !ctx.header_sent() {
                    ctx.set_type("text");
                    ctx.set_length(fallback.len() as u64);
                }
                Self::end(ctx, Some(Bytes::from(fallback)))
            }
            Body::Binary(bytes) => Self::end(ctx, Some(bytes)),
            Body::Text(text) => Self::end(ctx, Some(Bytes::from(text))),
            Body::Stream(stream) => {
                let head = ctx.response().head();
                ctx.transport_mut().pipe(head, stream)?;
                Ok(())
            }
            Body::Json(value) => {
                let encoded = serde_json::to_vec(&value)?;
                if !ctx.header_sent() {
                    ctx.set_length(encoded.len() as u64);
                }
                Self::end(ctx, Some(Bytes::from(encoded)))
            }
        }
    }

    fn end(ctx: &mut Context, chunk: Option<Bytes>) -> StrataResult<()> {
        let head = ctx.response().head();
        ctx.transport_mut().end(head, chunk)?;
        Ok(())
    }
}
