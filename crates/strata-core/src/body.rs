//! Response body model.
//!
//! A [`Body`] is one of a closed set of shapes. The shape decides the default
//! `Content-Type`, whether a `Content-Length` can be known up front, and how
//! the finalizer writes the body to the wire.
//!
//! ```
//! use strata_core::Body;
//!
//! let body = Body::from("<p>hi</p>");
//! assert!(body.looks_like_html());
//! assert_eq!(body.known_length(), Some(9));
//!
//! let body = Body::from(serde_json::json!({ "a": 1 }));
//! assert!(body.is_json());
//! ```

use bytes::Bytes;
use futures_util::Stream;
use serde::Serialize;
use std::fmt;
use std::io;
use std::pin::Pin;

/// A boxed stream of body chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// The body of a response, or of a request still waiting to be read.
#[derive(Default)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Binary(Bytes),
    /// Structured data serialized as JSON on the way out.
    Json(serde_json::Value),
    /// Chunks produced lazily and piped to the client.
    Stream(BodyStream),
}

impl Body {
    /// Wraps a stream of chunks.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self::Stream(Box::pin(stream))
    }

    /// Serializes any value into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::from)
    }

    /// Returns `true` for [`Body::Empty`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns `true` for [`Body::Json`].
    #[must_use]
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }

    /// Returns `true` for [`Body::Stream`].
    #[must_use]
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// Text whose first non-whitespace character opens a tag.
    #[must_use]
    pub fn looks_like_html(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim_start().starts_with('<'))
    }

    /// Byte length when it can be known without consuming the body.
    #[must_use]
    pub fn known_length(&self) -> Option<u64> {
        match self {
            Self::Text(text) => Some(text.len() as u64),
            Self::Binary(bytes) => Some(bytes.len() as u64),
            Self::Json(value) => Some(value.to_string().len() as u64),
            Self::Empty | Self::Stream(_) => None,
        }
    }

    /// Short name of the body shape, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
            Self::Json(_) => "json",
            Self::Stream(_) => "stream",
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Binary(bytes) => f.debug_tuple("Binary").field(bytes).finish(),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::Binary(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Self::Binary(Bytes::from_static(bytes))
    }
}

/// JSON `null` is an absent body.
impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Empty,
            value => Self::Json(value),
        }
    }
}

impl<T: Into<Body>> From<Option<T>> for Body {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use serde_json::json;

    #[test]
    fn test_html_detection() {
        assert!(Body::from("  \n<div>").looks_like_html());
        assert!(!Body::from("plain <b>").looks_like_html());
        assert!(!Body::from(Bytes::from_static(b"<x>")).looks_like_html());
    }

    #[test]
    fn test_known_length() {
        assert_eq!(Body::from("héllo").known_length(), Some(6));
        assert_eq!(Body::from(vec![1u8, 2, 3]).known_length(), Some(3));
        assert_eq!(Body::from(json!({"a": 1})).known_length(), Some(7));
        assert_eq!(Body::Empty.known_length(), None);
        let streamed = Body::stream(stream::iter(vec![Ok(Bytes::from_static(b"x"))]));
        assert_eq!(streamed.known_length(), None);
    }

    #[test]
    fn test_option_conversion() {
        assert!(Body::from(None::<String>).is_empty());
        assert!(matches!(Body::from(Some("x")), Body::Text(ref t) if t == "x"));
    }

    #[test]
    fn test_json_from_serialize() {
        #[derive(Serialize)]
        struct User {
            id: u32,
        }
        let body = Body::json(&User { id: 7 }).unwrap();
        assert!(matches!(body, Body::Json(ref v) if v == &json!({"id": 7})));
    }

    #[test]
    fn test_json_null_is_empty() {
        assert!(Body::from(json!(null)).is_empty());
        assert!(Body::json(&None::<u8>).unwrap().is_empty());
        assert!(Body::from(json!([null])).is_json());
    }

    #[test]
    fn test_debug_hides_stream() {
        let streamed = Body::stream(stream::empty());
        assert_eq!(format!("{streamed:?}"), "Stream(..)");
        assert_eq!(streamed.kind(), "stream");
    }
}
