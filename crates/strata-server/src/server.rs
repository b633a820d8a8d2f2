//! HTTP server implementation.
//!
//! Accepts TCP connections, serves HTTP/1.1 on each through hyper and hands
//! every request to a [`Dispatcher`] on its own task.
//!
//! # Architecture
//!
//! - TCP listener bound to the configured address
//! - One task per connection, tracked for graceful shutdown
//! - One task per request running the middleware chain; the connection
//!   task waits on the [`HyperTransport`] for the response head
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_server::{Application, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut app = Application::new();
//!     app.use_fn("hello", |ctx, _next| {
//!         Box::pin(async move {
//!             ctx.set_body("Hello, world!");
//!             Ok(())
//!         })
//!     });
//!
//!     let config = ServerConfig::builder().http_addr("0.0.0.0:8080").build();
//!     Server::new(config, app.callback()?).run().await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::StreamExt;
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use strata_core::{BodyStream, TransportRequest};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};
use crate::transport::{HttpResponse, HyperTransport};

/// The Strata HTTP server.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    dispatcher: Dispatcher,
}

impl Server {
    /// Creates a server that dispatches to `dispatcher`.
    #[must_use]
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        Self { config, dispatcher }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Runs until SIGTERM or SIGINT.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Binds the configured address and runs until `shutdown` fires.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.config.socket_addr().map_err(|e| {
            ServerError::Bind(format!("Invalid address '{}': {}", self.config.http_addr(), e))
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("Failed to bind to {}: {}", addr, e)))?;

        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "server listening");

        let tracker = ConnectionTracker::new();
        let limiter = self
            .config
            .max_connections()
            .map(|max| Arc::new(Semaphore::new(max)));
        let keep_alive = self.config.keep_alive();

        loop {
            let permit = match &limiter {
                Some(limiter) => tokio::select! {
                    permit = Arc::clone(limiter).acquire_owned() => permit.ok(),
                    () = shutdown.recv() => break,
                },
                None => None,
            };

            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let dispatcher = self.dispatcher.clone();
                            let token = tracker.acquire();
                            let shutdown = shutdown.clone();

                            tokio::spawn(async move {
                                let served = handle_connection(
                                    dispatcher,
                                    stream,
                                    remote_addr,
                                    keep_alive,
                                    shutdown,
                                )
                                .await;
                                if let Err(e) = served {
                                    debug!(remote = %remote_addr, error = %e, "connection error");
                                }
                                drop(permit);
                                drop(token);
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }

                () = shutdown.recv() => break,
            }
        }

        info!("shutdown signal received, no longer accepting connections");

        let shutdown_timeout = self.config.shutdown_timeout();
        tokio::select! {
            () = tracker.wait_for_shutdown() => {
                info!("all connections closed");
            }
            () = tokio::time::sleep(shutdown_timeout) => {
                warn!(
                    active = tracker.active_connections(),
                    "shutdown timeout reached with connections still open"
                );
            }
        }

        info!("server stopped");
        Ok(())
    }
}

async fn handle_connection(
    dispatcher: Dispatcher,
    stream: TcpStream,
    remote_addr: SocketAddr,
    keep_alive: bool,
    shutdown: ShutdownSignal,
) -> Result<(), hyper::Error> {
    let io = TokioIo::new(stream);

    let service = service_fn(move |req: Request<Incoming>| {
        let dispatcher = dispatcher.clone();
        async move { Ok::<_, Infallible>(handle_request(dispatcher, req, remote_addr).await) }
    });

    let mut builder = http1::Builder::new();
    builder.keep_alive(keep_alive);
    let conn = builder.serve_connection(io, service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => result,
        () = shutdown.recv() => {
            debug!(remote = %remote_addr, "draining connection for shutdown");
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    }
}

async fn handle_request(
    dispatcher: Dispatcher,
    req: Request<Incoming>,
    remote_addr: SocketAddr,
) -> HttpResponse {
    let (parts, body) = req.into_parts();
    let body: BodyStream = Box::pin(
        body.into_data_stream()
            .map(|chunk| chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e))),
    );
    let request = TransportRequest::from_parts(parts, Some(remote_addr)).with_body(body);

    let (transport, response) = HyperTransport::new();
    tokio::spawn(async move {
        dispatcher.dispatch(request, Box::new(transport)).await;
    });

    match response.await {
        Ok(response) => response,
        Err(_) => {
            warn!("request finished without writing a response");
            let mut response = Response::new(HyperTransport::full(None));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use strata_core::fixtures::RecordingReporter;
    use strata_core::AppSettings;
    use strata_middleware::{FnMiddleware, MiddlewareChain};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn dispatcher(chain: MiddlewareChain) -> Dispatcher {
        Dispatcher::new(
            chain.compile().unwrap(),
            Arc::new(AppSettings::default()),
            Arc::new(RecordingReporter::new()),
        )
    }

    async fn raw_request(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[tokio::test]
    async fn test_run_invalid_address() {
        let config = ServerConfig::builder().http_addr("not-an-address").build();
        let server = Server::new(config, dispatcher(MiddlewareChain::new()));
        let result = server.run_with_shutdown(ShutdownSignal::new()).await;
        assert!(matches!(result, Err(ServerError::Bind(msg)) if msg.contains("not-an-address")));
    }

    #[tokio::test]
    async fn test_serves_chain_and_shuts_down() {
        let chain = MiddlewareChain::new().with(FnMiddleware::new("hello", |ctx, _next| {
            Box::pin(async move {
                let body = format!("hello {}", ctx.ip());
                ctx.set_body(body);
                Ok(())
            })
        }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = ShutdownSignal::new();
        let config = ServerConfig::builder()
            .shutdown_timeout(Duration::from_secs(1))
            .build();
        let server = Server::new(config, dispatcher(chain));
        let handle = tokio::spawn(server.serve(listener, shutdown.clone()));

        let response = raw_request(
            addr,
            "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.contains("content-type: text/plain; charset=utf-8"));
        assert!(response.ends_with("hello 127.0.0.1"));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("server should stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_reads_request_body() {
        let chain = MiddlewareChain::new().with(FnMiddleware::new("echo", |ctx, _next| {
            Box::pin(async move {
                let body = ctx.read_body().await?;
                ctx.set_body(body);
                Ok(())
            })
        }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = ShutdownSignal::new();
        let server = Server::new(ServerConfig::default(), dispatcher(chain));
        tokio::spawn(server.serve(listener, shutdown.clone()));

        let request = concat!(
            "POST /echo HTTP/1.1\r\nHost: localhost\r\n",
            "Content-Length: 5\r\nConnection: close\r\n\r\nabcde",
        );
        let response = raw_request(addr, request).await;
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.contains("content-type: application/octet-stream"));
        assert!(response.ends_with("abcde"));
        shutdown.trigger();
    }

    #[tokio::test]
    async fn test_unanswered_request_gets_500() {
        let chain = MiddlewareChain::new().with(FnMiddleware::new("bypass", |ctx, _next| {
            Box::pin(async move {
                ctx.set_respond(false);
                Ok(())
            })
        }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = ShutdownSignal::new();
        let server = Server::new(ServerConfig::default(), dispatcher(chain));
        tokio::spawn(server.serve(listener, shutdown.clone()));

        let response = raw_request(
            addr,
            "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 500"), "{response}");
        shutdown.trigger();
    }
}
