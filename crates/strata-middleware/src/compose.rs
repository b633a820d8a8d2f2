//! Onion composition of middleware.
//!
//! A [`MiddlewareChain`] is an ordered list of stages. Compiling it yields a
//! [`ComposedHandler`] that runs the stages nested inside each other:
//!
//! ```text
//! ctx → A(before) → B(before) → C → B(after) → A(after)
//! ```
//!
//! Each call gets its own dispatch cursor. Dispatching a position at or
//! below the cursor means a stage proceeded twice, which fails the call with
//! [`StrataError::DoubleProceed`] without re-running anything.

use crate::middleware::{BoxFuture, FnMiddleware, Middleware, Next};
use std::future;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;
use strata_core::{Context, StrataError, StrataResult};
use tracing::{debug, trace};

/// A type-erased middleware that can be stored in a chain.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Per-call dispatch state.
pub(crate) struct Dispatch {
    stages: Arc<[BoxedMiddleware]>,
    terminal: Option<BoxedMiddleware>,
    highest: AtomicIsize,
}

impl Dispatch {
    fn new(stages: Arc<[BoxedMiddleware]>, terminal: Option<BoxedMiddleware>) -> Self {
        Self {
            stages,
            terminal,
            highest: AtomicIsize::new(-1),
        }
    }

    pub(crate) fn dispatch<'c>(
        &'c self,
        index: usize,
        ctx: &'c mut Context,
    ) -> BoxFuture<'c, StrataResult<()>> {
        let position = isize::try_from(index).unwrap_or(isize::MAX);
        if self.highest.fetch_max(position, Ordering::AcqRel) >= position {
            let stage = index.saturating_sub(1);
            debug!(stage, "middleware proceeded more than once");
            return Box::pin(future::ready(Err(StrataError::DoubleProceed { stage })));
        }

        let next = Next::new(self, index + 1);
        if let Some(stage) = self.stages.get(index) {
            trace!(stage = stage.name(), index, "dispatching middleware");
            return stage.process(ctx, next);
        }
        match &self.terminal {
            Some(terminal) if index == self.stages.len() => {
                trace!(stage = terminal.name(), index, "dispatching terminal");
                terminal.process(ctx, next)
            }
            _ => Box::pin(future::ready(Ok(()))),
        }
    }
}

/// The compiled form of a chain. Cheap to clone and share across requests.
#[derive(Clone)]
pub struct ComposedHandler {
    stages: Arc<[BoxedMiddleware]>,
}

impl ComposedHandler {
    /// Runs every stage against `ctx`.
    pub async fn call(&self, ctx: &mut Context) -> StrataResult<()> {
        self.call_with(ctx, None).await
    }

    /// Runs every stage, then `terminal` as the innermost stage.
    pub async fn call_with(
        &self,
        ctx: &mut Context,
        terminal: Option<BoxedMiddleware>,
    ) -> StrataResult<()> {
        let dispatch = Dispatch::new(Arc::clone(&self.stages), terminal);
        dispatch.dispatch(0, ctx).await
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the handler has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl std::fmt::Debug for ComposedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedHandler")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Compiles an ordered sequence of stages.
///
/// Fails with [`StrataError::Configuration`] when a stage has a blank name.
pub fn compose<I>(stages: I) -> StrataResult<ComposedHandler>
where
    I: IntoIterator<Item = BoxedMiddleware>,
{
    let stages: Vec<BoxedMiddleware> = stages.into_iter().collect();
    if let Some(position) = stages.iter().position(|stage| stage.name().trim().is_empty()) {
        return Err(StrataError::configuration(format!(
            "middleware at position {position} has an empty name"
        )));
    }
    Ok(ComposedHandler {
        stages: stages.into(),
    })
}

/// An ordered, growable list of middleware.
///
/// # Example
///
/// ```
/// use strata_middleware::{FnMiddleware, MiddlewareChain};
///
/// let chain = MiddlewareChain::new()
///     .with(FnMiddleware::new("first", |ctx, next| next.run(ctx)))
///     .with(FnMiddleware::new("second", |ctx, next| next.run(ctx)));
///
/// let handler = chain.compile().unwrap();
/// assert_eq!(handler.stage_names(), vec!["first", "second"]);
/// ```
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    stages: Vec<BoxedMiddleware>,
}

impl MiddlewareChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    pub fn push<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.push_boxed(Arc::new(middleware))
    }

    /// Appends an already boxed stage.
    pub fn push_boxed(&mut self, middleware: BoxedMiddleware) -> &mut Self {
        debug!(stage = middleware.name(), position = self.stages.len(), "use middleware");
        self.stages.push(middleware);
        self
    }

    /// Appends a closure stage.
    pub fn push_fn<F>(&mut self, name: &'static str, func: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, StrataResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.push(FnMiddleware::new(name, func))
    }

    /// Builder-style [`push`](Self::push).
    #[must_use]
    pub fn with<M: Middleware>(mut self, middleware: M) -> Self {
        self.push(middleware);
        self
    }

    /// Stage names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Compiles the chain into a [`ComposedHandler`].
    pub fn compile(&self) -> StrataResult<ComposedHandler> {
        compose(self.stages.iter().cloned())
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("stages", &self.names())
            .finish()
    }
}
