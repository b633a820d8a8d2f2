//! The application template.
//!
//! An [`Application`] collects middleware and settings. [`callback()`]
//! freezes both into a [`Dispatcher`]; [`listen()`] and [`serve()`] hand that
//! dispatcher to a hyper [`Server`].
//!
//! [`callback()`]: Application::callback
//! [`listen()`]: Application::listen
//! [`serve()`]: Application::serve

use std::sync::Arc;

use serde::{Serialize, Serializer};
use strata_core::{AppSettings, Context, ErrorReporter, StrataResult};
use strata_middleware::{BoxFuture, Middleware, MiddlewareChain, Next};

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::reporter::TracingReporter;
use crate::server::Server;
use crate::shutdown::ShutdownSignal;

/// Middleware and settings for one server.
///
/// # Example
///
/// ```rust
/// use strata_server::Application;
///
/// let mut app = Application::new();
/// app.use_fn("hello", |ctx, next| {
///     Box::pin(async move {
///         ctx.set_body("hello");
///         next.run(ctx).await
///     })
/// });
///
/// let dispatcher = app.callback().unwrap();
/// assert_eq!(dispatcher.handler().stage_names(), vec!["hello"]);
/// ```
#[derive(Default)]
pub struct Application {
    settings: AppSettings,
    chain: MiddlewareChain,
    reporter: Option<Arc<dyn ErrorReporter>>,
}

impl Application {
    /// Creates an application with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an application with the given settings.
    #[must_use]
    pub fn with_settings(settings: AppSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Appends a middleware to the chain.
    pub fn use_middleware<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.chain.push(middleware);
        self
    }

    /// Appends a closure middleware to the chain.
    pub fn use_fn<F>(&mut self, name: &'static str, func: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, StrataResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.chain.push_fn(name, func);
        self
    }

    /// Replaces the default [`TracingReporter`].
    pub fn reporter(&mut self, reporter: Arc<dyn ErrorReporter>) -> &mut Self {
        self.reporter = Some(reporter);
        self
    }

    /// The settings every context inherits.
    #[must_use]
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Mutable access to the settings, before the application is frozen.
    pub fn settings_mut(&mut self) -> &mut AppSettings {
        &mut self.settings
    }

    /// Names of the registered middleware, in order.
    #[must_use]
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.chain.names()
    }

    /// Compiles the chain into a [`Dispatcher`].
    ///
    /// Later changes to the application do not affect dispatchers already
    /// created.
    pub fn callback(&self) -> StrataResult<Dispatcher> {
        let handler = self.chain.compile()?;
        let reporter = self
            .reporter
            .clone()
            .unwrap_or_else(|| Arc::new(TracingReporter::new(self.settings.silent)));
        Ok(Dispatcher::new(
            handler,
            Arc::new(self.settings.clone()),
            reporter,
        ))
    }

    /// Serves on `addr` until SIGTERM or SIGINT.
    pub async fn listen(&self, addr: impl Into<String>) -> Result<(), ServerError> {
        let config = ServerConfig::builder().http_addr(addr).build();
        Server::new(config, self.callback()?).run().await
    }

    /// Serves with an explicit configuration until `shutdown` fires.
    pub async fn serve(
        &self,
        config: ServerConfig,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        Server::new(config, self.callback()?)
            .run_with_shutdown(shutdown)
            .await
    }
}

impl Serialize for Application {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.settings.serialize(serializer)
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("settings", &self.settings)
            .field("middleware", &self.chain.names())
            .field("custom_reporter", &self.reporter.is_some())
            .finish()
    }
}
