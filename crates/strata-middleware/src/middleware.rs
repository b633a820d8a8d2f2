//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait that every stage of a chain
//! implements. A stage receives the request [`Context`] and a [`Next`]
//! continuation; code before `next.run(ctx)` runs on the way in, code after
//! it runs on the way out, once every downstream stage has completed.
//!
//! # Example
//!
//! ```
//! use strata_core::{Context, StrataResult};
//! use strata_middleware::{BoxFuture, Middleware, Next};
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut Context,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, StrataResult<()>> {
//!         Box::pin(async move {
//!             let started = std::time::Instant::now();
//!             next.run(ctx).await?;
//!             let elapsed = format!("{}ms", started.elapsed().as_millis());
//!             ctx.set_header("x-response-time", &elapsed)?;
//!             Ok(())
//!         })
//!     }
//! }
//! ```

use crate::compose::Dispatch;
use std::future::Future;
use std::pin::Pin;
use strata_core::{Context, StrataResult};

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One stage of a middleware chain.
///
/// # Invariants
///
/// - A stage calls `next.run()` at most once; a second call fails with
///   [`StrataError::DoubleProceed`](strata_core::StrataError::DoubleProceed)
/// - A stage that does not call `next.run()` short-circuits everything
///   downstream
/// - Errors from downstream propagate unless the stage handles them
pub trait Middleware: Send + Sync + 'static {
    /// Name of this stage, used in logs and configuration errors.
    fn name(&self) -> &'static str;

    /// Runs this stage.
    fn process<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, StrataResult<()>>;
}

/// Continuation to the rest of the chain.
///
/// Calling [`run`](Next::run) a second time does not re-enter the chain; it
/// resolves to a `DoubleProceed` error instead.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    dispatch: &'a Dispatch,
    index: usize,
}

impl<'a> Next<'a> {
    pub(crate) fn new(dispatch: &'a Dispatch, index: usize) -> Self {
        Self { dispatch, index }
    }

    /// Position of the stage this continuation leads to.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Runs the remaining stages.
    pub fn run<'c>(&self, ctx: &'c mut Context) -> BoxFuture<'c, StrataResult<()>>
    where
        'a: 'c,
    {
        self.dispatch.dispatch(self.index, ctx)
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("index", &self.index).finish()
    }
}

/// A middleware built from a closure.
///
/// The closure returns a boxed future so it may borrow the context:
///
/// ```
/// use strata_middleware::FnMiddleware;
///
/// let hello = FnMiddleware::new("hello", |ctx, next| {
///     Box::pin(async move {
///         ctx.set_body("hello");
///         next.run(ctx).await
///     })
/// });
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, StrataResult<()>>
        + Send
        + Sync
        + 'static,
{
    /// Creates a new function-based middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, StrataResult<()>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, StrataResult<()>> {
        (self.func)(ctx, next)
    }
}

impl<F> std::fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnMiddleware")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::compose;
    use http::{Method, StatusCode};
    use std::sync::Arc;
    use strata_core::fixtures;

    struct Visit {
        name: &'static str,
    }

    impl Middleware for Visit {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut Context,
            next: Next<'a>,
        ) -> BoxFuture<'a, StrataResult<()>> {
            Box::pin(async move {
                ctx.state_mut().insert(format!("visited:{}", self.name), true);
                next.run(ctx).await
            })
        }
    }

    #[test]
    fn test_middleware_name() {
        let mw = Visit { name: "visit" };
        assert_eq!(mw.name(), "visit");
    }

    #[tokio::test]
    async fn test_fn_middleware_borrows_context() {
        let handler = compose(vec![
            Arc::new(Visit { name: "outer" }) as Arc<dyn Middleware>,
            Arc::new(FnMiddleware::new("body", |ctx, next| {
                Box::pin(async move {
                    ctx.set_status(StatusCode::ACCEPTED);
                    next.run(ctx).await
                })
            })),
        ])
        .unwrap();

        let (mut ctx, _handle) = fixtures::context(Method::GET, "/");
        handler.call(&mut ctx).await.unwrap();

        assert_eq!(ctx.status(), StatusCode::ACCEPTED);
        assert_eq!(ctx.state().get::<bool>("visited:outer"), Some(&true));
    }
}
