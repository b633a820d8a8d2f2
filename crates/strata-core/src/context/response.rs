//! Mutable response state and its status/body coupling rules.
//!
//! The rules are enforced at the moment a handler assigns status or body:
//!
//! - assigning a body-forbidden status (204, 205, 304) clears the body;
//! - assigning a non-empty body without an explicit status sets 200;
//! - assigning [`Body::Empty`] sets 204 unless the status already forbids a
//!   body, and strips the entity headers;
//! - each body shape picks a `Content-Type` only when none is set.

use crate::body::Body;
use crate::error::{HttpError, InvalidHeader};
use crate::headers::{self, HeaderStore};
use crate::media_type;
use crate::status;
use crate::transport::{HeadersSent, ResponseHead};
use http::header::{
    CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED, TRANSFER_ENCODING,
    VARY,
};
use http::{HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::SystemTime;

/// Status, message, body and headers of the response being built.
#[derive(Debug)]
pub struct ResponseState {
    status: StatusCode,
    message: Option<String>,
    explicit_status: bool,
    body: Body,
    headers: HeaderStore,
}

impl ResponseState {
    /// A fresh 404 response with no explicit status.
    #[must_use]
    pub fn new(sent: HeadersSent) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: None,
            explicit_status: false,
            body: Body::Empty,
            headers: HeaderStore::new(sent),
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Whether a handler assigned the status.
    #[must_use]
    pub fn has_explicit_status(&self) -> bool {
        self.explicit_status
    }

    /// Assigns the status. Ignored once headers are sent.
    pub fn set_status(&mut self, status: StatusCode) {
        if self.headers.is_sent() {
            return;
        }
        self.explicit_status = true;
        self.status = status;
        self.message = None;
        if status::is_empty(status) && !self.body.is_empty() {
            self.set_body(Body::Empty);
        }
    }

    /// Assigns a numeric status, rejecting codes without a registered reason.
    pub fn set_status_code(&mut self, code: u16) -> Result<(), HttpError> {
        let status = StatusCode::from_u16(code)
            .ok()
            .filter(|status| status.canonical_reason().is_some())
            .ok_or_else(|| {
                HttpError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("invalid status code: {code}"),
                )
                .with_expose(false)
            })?;
        self.set_status(status);
        Ok(())
    }

    /// Status message; defaults to the canonical reason phrase.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or_else(|| status::reason(self.status))
    }

    /// Overrides the status message.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    /// Current body.
    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Moves the body out without touching status or headers.
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    /// Assigns the body, applying the status and content-type rules.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        let body = body.into();
        let replaced_content = !self.body.is_empty();
        self.body = body;

        if self.body.is_empty() {
            if !status::is_empty(self.status) {
                self.set_status(StatusCode::NO_CONTENT);
            }
            self.headers.remove(CONTENT_TYPE);
            self.headers.remove(CONTENT_LENGTH);
            self.headers.remove(TRANSFER_ENCODING);
            return;
        }

        if !self.explicit_status {
            self.set_status(StatusCode::OK);
        }

        let needs_type = !self.headers.contains(CONTENT_TYPE);
        let (shorthand, length) = match &self.body {
            Body::Text(text) => {
                let kind = if self.body.looks_like_html() { "html" } else { "text" };
                (kind, Some(text.len() as u64))
            }
            Body::Binary(bytes) => ("bin", Some(bytes.len() as u64)),
            Body::Stream(_) => {
                if replaced_content {
                    self.headers.remove(CONTENT_LENGTH);
                }
                ("bin", None)
            }
            Body::Json(_) => {
                self.headers.remove(CONTENT_LENGTH);
                ("json", None)
            }
            Body::Empty => return,
        };
        if needs_type {
            self.set_type(shorthand);
        }
        if let Some(length) = length {
            self.set_length(length);
        }
    }

    /// Headers being built.
    #[must_use]
    pub fn headers(&self) -> &HeaderStore {
        &self.headers
    }

    /// Mutable access to the headers being built.
    pub fn headers_mut(&mut self) -> &mut HeaderStore {
        &mut self.headers
    }

    /// Whether the head has been committed.
    #[must_use]
    pub fn header_sent(&self) -> bool {
        self.headers.is_sent()
    }

    /// Sets `Content-Type` from a shorthand or full type.
    ///
    /// Unknown values remove the header.
    pub fn set_type(&mut self, value: &str) {
        match media_type::content_type(value).and_then(|full| HeaderValue::from_str(&full).ok()) {
            Some(full) => self.headers.insert(CONTENT_TYPE, full),
            None => self.headers.remove(CONTENT_TYPE),
        }
    }

    /// `Content-Type` without parameters.
    #[must_use]
    pub fn response_type(&self) -> Option<String> {
        self.headers.get(CONTENT_TYPE).and_then(media_type::essence)
    }

    /// Checks the response type against `types`.
    #[must_use]
    pub fn is(&self, types: &[&str]) -> Option<String> {
        media_type::type_is(self.headers.get(CONTENT_TYPE)?, types)
    }

    /// Content length from the header, else derived from the body.
    #[must_use]
    pub fn length(&self) -> Option<u64> {
        match self.headers.get(CONTENT_LENGTH) {
            Some(value) => value.trim().parse().ok(),
            None => self.body.known_length(),
        }
    }

    /// Sets `Content-Length`.
    pub fn set_length(&mut self, length: u64) {
        self.headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    }

    /// Parsed `Last-Modified`.
    #[must_use]
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.headers
            .get(LAST_MODIFIED)
            .and_then(|value| httpdate::parse_http_date(value).ok())
    }

    /// Sets `Last-Modified`.
    pub fn set_last_modified(&mut self, at: SystemTime) {
        if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(at)) {
            self.headers.insert(LAST_MODIFIED, value);
        }
    }

    /// Current `ETag`.
    #[must_use]
    pub fn etag(&self) -> Option<&str> {
        self.headers.get(ETAG)
    }

    /// Sets `ETag`, quoting the value unless it is already a (weak) tag.
    pub fn set_etag(&mut self, tag: &str) -> Result<(), InvalidHeader> {
        let tag = if tag.starts_with('"') || tag.starts_with("W/\"") {
            tag.to_string()
        } else {
            format!("\"{tag}\"")
        };
        let value = HeaderValue::from_str(&tag).map_err(|_| InvalidHeader::value(ETAG.as_str()))?;
        self.headers.insert(ETAG, value);
        Ok(())
    }

    /// Adds `field` to `Vary` unless already listed.
    pub fn vary(&mut self, field: &str) -> Result<(), InvalidHeader> {
        let field = field.trim();
        if field != "*" {
            HeaderName::from_bytes(field.as_bytes()).map_err(|_| InvalidHeader::name(field))?;
        }
        let current = self.headers.get(VARY).unwrap_or("").to_string();
        let listed: Vec<&str> = current
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .collect();
        if listed.contains(&"*") || listed.iter().any(|entry| entry.eq_ignore_ascii_case(field)) {
            return Ok(());
        }
        let value = if field == "*" || listed.is_empty() {
            field.to_string()
        } else {
            format!("{current}, {field}")
        };
        let value = HeaderValue::from_str(&value).map_err(|_| InvalidHeader::value(VARY.as_str()))?;
        self.headers.insert(VARY, value);
        Ok(())
    }

    /// Marks the response as a download.
    ///
    /// With a filename, the content type is derived from its extension.
    pub fn attachment(&mut self, filename: Option<&str>) -> Result<(), InvalidHeader> {
        if let Some(name) = filename {
            if let Some((_, extension)) = basename(name).rsplit_once('.') {
                self.set_type(extension);
            }
        }
        let value = HeaderValue::from_str(&content_disposition(filename))
            .map_err(|_| InvalidHeader::value(CONTENT_DISPOSITION.as_str()))?;
        self.headers.insert(CONTENT_DISPOSITION, value);
        Ok(())
    }

    /// Status line and headers as they stand.
    #[must_use]
    pub fn head(&self) -> ResponseHead {
        ResponseHead {
            status: self.status,
            reason: self.message.clone(),
            headers: self.headers.map().clone(),
        }
    }

    /// Serializable view of the response.
    #[must_use]
    pub fn snapshot(&self) -> ResponseSnapshot {
        ResponseSnapshot {
            status: self.status.as_u16(),
            message: self.message().to_string(),
            header: headers::snapshot(self.headers.map()),
        }
    }
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn content_disposition(filename: Option<&str>) -> String {
    let Some(name) = filename.map(basename) else {
        return "attachment".to_string();
    };
    let plain = |c: char| c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\';
    if name.chars().all(plain) {
        return format!("attachment; filename=\"{name}\"");
    }
    let fallback: String = name.chars().map(|c| if plain(c) { c } else { '?' }).collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(name)
    )
}

/// Serializable response summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseSnapshot {
    /// Status code.
    pub status: u16,
    /// Status message.
    pub message: String,
    /// Response headers.
    pub header: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;
    use serde_json::json;
    use std::time::Duration;

    fn response() -> ResponseState {
        ResponseState::new(HeadersSent::new())
    }

    #[test]
    fn test_defaults() {
        let res = response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(!res.has_explicit_status());
        assert_eq!(res.message(), "Not Found");
        assert!(res.body().is_empty());
    }

    #[test]
    fn test_text_body_sets_200_and_plain_type() {
        let mut res = response();
        res.set_body("hello");
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().get(CONTENT_TYPE), Some("text/plain; charset=utf-8"));
        assert_eq!(res.length(), Some(5));
    }

    #[test]
    fn test_html_body_sets_html_type() {
        let mut res = response();
        res.set_body("  <h1>hi</h1>");
        assert_eq!(res.headers().get(CONTENT_TYPE), Some("text/html; charset=utf-8"));
    }

    #[test]
    fn test_explicit_type_is_kept() {
        let mut res = response();
        res.set_type("xml");
        res.set_body("<doc/>");
        res.set_body(json!({"a": 1}));
        assert_eq!(res.headers().get(CONTENT_TYPE), Some("application/xml"));
    }

    #[test]
    fn test_explicit_status_survives_body() {
        let mut res = response();
        res.set_status(StatusCode::CREATED);
        res.set_body("made");
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_json_body_drops_length() {
        let mut res = response();
        res.set_body("abc");
        assert_eq!(res.headers().get(CONTENT_LENGTH), Some("3"));
        res.set_body(json!({"a": 1}));
        assert!(!res.headers().contains(CONTENT_LENGTH));
        assert_eq!(res.length(), Some(7));
    }

    #[test]
    fn test_binary_and_stream_types() {
        let mut res = response();
        res.set_body(Bytes::from_static(b"\x00\x01"));
        assert_eq!(res.headers().get(CONTENT_TYPE), Some("application/octet-stream"));
        assert_eq!(res.length(), Some(2));

        res.set_body(Body::stream(stream::iter(vec![Ok(Bytes::from_static(b"x"))])));
        assert!(!res.headers().contains(CONTENT_LENGTH));
        assert_eq!(res.length(), None);
    }

    #[test]
    fn test_empty_body_sets_204_and_strips_headers() {
        let mut res = response();
        res.set_body("text");
        res.headers_mut().set("transfer-encoding", "chunked").unwrap();
        res.set_body(Body::Empty);
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(!res.headers().contains(CONTENT_TYPE));
        assert!(!res.headers().contains(CONTENT_LENGTH));
        assert!(!res.headers().contains(TRANSFER_ENCODING));
    }

    #[test]
    fn test_json_null_body_is_no_content() {
        let mut res = response();
        res.set_body(json!({"a": 1}));
        res.set_body(json!(null));
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(res.body().is_empty());
        assert!(!res.headers().contains(CONTENT_TYPE));
        assert!(!res.headers().contains(CONTENT_LENGTH));
    }

    #[test]
    fn test_empty_body_keeps_304() {
        let mut res = response();
        res.set_status(StatusCode::NOT_MODIFIED);
        res.set_body(Body::Empty);
        assert_eq!(res.status(), StatusCode::NOT_MODIFIED);
    }

    #[test]
    fn test_empty_status_clears_body() {
        let mut res = response();
        res.set_body("something");
        res.set_status(StatusCode::NO_CONTENT);
        assert!(res.body().is_empty());
        assert!(!res.headers().contains(CONTENT_TYPE));
        assert!(!res.headers().contains(CONTENT_LENGTH));
    }

    #[test]
    fn test_status_ignored_after_send() {
        let sent = HeadersSent::new();
        let mut res = ResponseState::new(sent.clone());
        res.set_status(StatusCode::OK);
        sent.mark();
        res.set_status(StatusCode::IM_A_TEAPOT);
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[test]
    fn test_set_status_code_validates() {
        let mut res = response();
        res.set_status_code(418).unwrap();
        assert_eq!(res.message(), "I'm a teapot");
        assert!(res.set_status_code(599).is_err());
        assert!(res.set_status_code(42).is_err());
    }

    #[test]
    fn test_message_override_resets_with_status() {
        let mut res = response();
        res.set_message("Gone Fishing");
        assert_eq!(res.message(), "Gone Fishing");
        res.set_status(StatusCode::OK);
        assert_eq!(res.message(), "OK");
    }

    #[test]
    fn test_etag_quoting() {
        let mut res = response();
        res.set_etag("abc").unwrap();
        assert_eq!(res.etag(), Some("\"abc\""));
        res.set_etag("W/\"weak\"").unwrap();
        assert_eq!(res.etag(), Some("W/\"weak\""));
    }

    #[test]
    fn test_vary_appends_once() {
        let mut res = response();
        res.vary("Accept").unwrap();
        res.vary("Origin").unwrap();
        res.vary("accept").unwrap();
        assert_eq!(res.headers().get(VARY), Some("Accept, Origin"));
        res.vary("*").unwrap();
        assert_eq!(res.headers().get(VARY), Some("*"));
        res.vary("Cookie").unwrap();
        assert_eq!(res.headers().get(VARY), Some("*"));
    }

    #[test]
    fn test_last_modified_round_trip() {
        let mut res = response();
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000);
        res.set_last_modified(at);
        assert_eq!(res.headers().get(LAST_MODIFIED), Some("Sun, 09 Sep 2001 01:46:40 GMT"));
        assert_eq!(res.last_modified(), Some(at));
    }

    #[test]
    fn test_attachment() {
        let mut res = response();
        res.attachment(Some("reports/q1.pdf")).unwrap();
        assert_eq!(res.headers().get(CONTENT_TYPE), Some("application/pdf"));
        assert_eq!(
            res.headers().get(CONTENT_DISPOSITION),
            Some("attachment; filename=\"q1.pdf\"")
        );

        res.attachment(Some("résumé.txt")).unwrap();
        assert_eq!(
            res.headers().get(CONTENT_DISPOSITION),
            Some("attachment; filename=\"r?sum?.txt\"; filename*=UTF-8''r%C3%A9sum%C3%A9.txt")
        );

        res.attachment(None).unwrap();
        assert_eq!(res.headers().get(CONTENT_DISPOSITION), Some("attachment"));
    }

    #[test]
    fn test_is() {
        let mut res = response();
        assert_eq!(res.is(&["json"]), None);
        res.set_body(json!([]));
        assert_eq!(res.is(&["html", "json"]).as_deref(), Some("json"));
        assert_eq!(res.response_type().as_deref(), Some("application/json"));
    }

    #[test]
    fn test_snapshot() {
        let mut res = response();
        res.set_body("ok");
        let snapshot = res.snapshot();
        assert_eq!(snapshot.status, 200);
        assert_eq!(snapshot.message, "OK");
        assert_eq!(snapshot.header.get("content-length").map(String::as_str), Some("2"));
    }
}
