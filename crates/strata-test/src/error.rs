//! Test error types.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during testing.
#[derive(Debug, Error)]
pub enum TestError {
    /// Request building failed.
    #[error("Request build error: {0}")]
    RequestBuild(String),

    /// Response body was not what the caller asked for.
    #[error("Body read error: {0}")]
    BodyRead(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The application failed to compile its chain.
    #[error("Application error: {0}")]
    Application(#[from] strata_core::StrataError),

    /// A header name or value is invalid.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// The application never committed a response head.
    #[error("No response was written")]
    NoResponse,

    /// A started response did not end in time.
    #[error("Response did not finish within {0:?}")]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TestError::RequestBuild("Invalid URI".to_string());
        assert_eq!(err.to_string(), "Request build error: Invalid URI");

        let err = TestError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "Response did not finish within 5s");
    }

    #[test]
    fn test_json_error_has_source() {
        let err: TestError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(std::error::Error::source(&err).is_some());
    }
}
