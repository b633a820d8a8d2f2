//! Server error types.

use std::io;
use strata_core::StrataError;
use thiserror::Error;

/// Errors raised while starting or running the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be parsed or bound.
    #[error("Bind error: {0}")]
    Bind(String),

    /// I/O failure on the listener.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The application could not be compiled into a dispatcher.
    #[error("Application error: {0}")]
    Application(#[from] StrataError),
}
