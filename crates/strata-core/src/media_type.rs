//! Content-Type resolution.
//!
//! Turns shorthands such as `"json"`, `".html"` or `"png"` into full
//! media types, and adds a UTF-8 charset to textual types that lack one.
//!
//! ```
//! use strata_core::media_type::content_type;
//!
//! assert_eq!(content_type("json").as_deref(), Some("application/json; charset=utf-8"));
//! assert_eq!(content_type(".png").as_deref(), Some("image/png"));
//! assert_eq!(content_type("text/csv").as_deref(), Some("text/csv; charset=utf-8"));
//! assert_eq!(content_type("nope"), None);
//! ```

use mime::Mime;

/// Looks up the media type registered for an extension or shorthand.
///
/// Leading dots and any path before the last dot are ignored.
#[must_use]
pub fn lookup(extension: &str) -> Option<&'static str> {
    let extension = extension.rsplit('.').next()?.to_ascii_lowercase();
    let found = match extension.as_str() {
        "html" | "htm" => "text/html",
        "text" | "txt" => "text/plain",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "xml" => "application/xml",
        "csv" => "text/csv",
        "md" | "markdown" => "text/markdown",
        "form" | "urlencoded" => "application/x-www-form-urlencoded",
        "multipart" => "multipart/form-data",

        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",

        "woff" => "font/woff",
        "woff2" => "font/woff2",

        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "gzip" => "application/gzip",
        "tar" => "application/x-tar",

        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",

        "wasm" => "application/wasm",
        "bin" | "exe" | "dll" | "so" => "application/octet-stream",
        _ => return None,
    };
    Some(found)
}

/// Resolves a shorthand or full media type into a `Content-Type` value.
///
/// Values containing `/` are taken as full types; everything else goes
/// through [`lookup`]. Returns `None` when nothing matches or the value does
/// not parse.
#[must_use]
pub fn content_type(value: &str) -> Option<String> {
    let full = if value.contains('/') {
        value.to_string()
    } else {
        lookup(value)?.to_string()
    };
    let parsed: Mime = full.parse().ok()?;
    if parsed.get_param(mime::CHARSET).is_none() && is_textual(&parsed) {
        Some(format!("{full}; charset=utf-8"))
    } else {
        Some(full)
    }
}

/// The `type/subtype` part of a `Content-Type` value, lowercased.
#[must_use]
pub fn essence(value: &str) -> Option<String> {
    let parsed: Mime = value.trim().parse().ok()?;
    Some(parsed.essence_str().to_ascii_lowercase())
}

fn is_textual(parsed: &Mime) -> bool {
    parsed.type_() == mime::TEXT
        || parsed.subtype() == mime::JSON
        || parsed.suffix().is_some_and(|suffix| suffix == mime::JSON)
        || parsed.subtype() == mime::JAVASCRIPT
}

/// Matches a media type against a pattern such as `text/*`, `*/json`,
/// `+json` or a shorthand like `html`.
#[must_use]
pub fn matches(pattern: &str, actual: &str) -> bool {
    let Some(actual) = essence(actual) else {
        return false;
    };
    let pattern = if let Some(suffix) = pattern.strip_prefix('+') {
        format!("*/*+{suffix}")
    } else if pattern.contains('/') {
        pattern.to_ascii_lowercase()
    } else {
        match lookup(pattern) {
            Some(found) => found.to_string(),
            None => return false,
        }
    };

    let Some((want_type, want_sub)) = pattern.split_once('/') else {
        return false;
    };
    let Some((have_type, have_sub)) = actual.split_once('/') else {
        return false;
    };
    if want_type != "*" && want_type != have_type {
        return false;
    }
    if let Some(want_suffix) = want_sub.strip_prefix("*+") {
        return have_sub
            .rsplit_once('+')
            .is_some_and(|(_, suffix)| suffix == want_suffix);
    }
    want_sub == "*" || want_sub == have_sub
}

/// Checks `actual` against each of `types`, returning the first match.
///
/// Wildcard and suffix patterns return the actual type; shorthands and
/// exact types return the pattern as given. An empty `types` list returns the
/// actual type.
#[must_use]
pub fn type_is(actual: &str, types: &[&str]) -> Option<String> {
    let actual = essence(actual)?;
    if types.is_empty() {
        return Some(actual);
    }
    types
        .iter()
        .find(|pattern| matches(pattern, &actual))
        .map(|pattern| {
            if pattern.starts_with('+') || pattern.contains('*') {
                actual.clone()
            } else {
                (*pattern).to_string()
            }
        })
}
