//! Not-found escalation.
//!
//! Place this stage first in a chain. Once everything downstream has run, a
//! response that is still a 404 becomes an error, so the application's error
//! path renders it instead of the plain default body. Downstream errors pass
//! through untouched.

use crate::middleware::{BoxFuture, Middleware, Next};
use http::StatusCode;
use strata_core::{Context, HttpError, StrataResult};

/// Turns an unhandled 404 into an [`HttpError`].
#[derive(Debug, Clone)]
pub struct NotFound {
    message: String,
}

impl Default for NotFound {
    fn default() -> Self {
        Self {
            message: "Not Found".to_string(),
        }
    }
}

impl NotFound {
    /// Creates the stage with the default message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a custom error message.
    #[must_use]
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Middleware for NotFound {
    fn name(&self) -> &'static str {
        "not_found"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, StrataResult<()>> {
        Box::pin(async move {
            next.run(ctx).await?;
            if ctx.status() == StatusCode::NOT_FOUND {
                return Err(HttpError::new(StatusCode::NOT_FOUND, self.message.as_str()).into());
            }
            Ok(())
        })
    }
}
