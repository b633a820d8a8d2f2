//! Status code classes used by the response model.

use http::StatusCode;

/// Returns `true` for statuses that must never carry a body (204, 205, 304).
#[must_use]
pub const fn is_empty(status: StatusCode) -> bool {
    matches!(status.as_u16(), 204 | 205 | 304)
}

/// Returns `true` for statuses that redirect the client.
#[must_use]
pub const fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 300 | 301 | 302 | 303 | 305 | 307 | 308)
}

/// Canonical reason phrase, or an empty string for unregistered codes.
#[must_use]
pub fn reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("")
}
