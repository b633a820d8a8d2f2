//! Response header store.
//!
//! Mutations become silent no-ops once the transport has committed the
//! response head. The store observes that through a shared [`HeadersSent`]
//! flag instead of asking the transport.

use crate::error::InvalidHeader;
use crate::transport::HeadersSent;
use http::header::AsHeaderName;
use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use tracing::trace;

/// Outgoing headers plus the committed flag.
#[derive(Debug, Clone, Default)]
pub struct HeaderStore {
    map: HeaderMap,
    sent: HeadersSent,
}

impl HeaderStore {
    /// Creates an empty store watching `sent`.
    #[must_use]
    pub fn new(sent: HeadersSent) -> Self {
        Self {
            map: HeaderMap::new(),
            sent,
        }
    }

    /// Whether the head has been committed.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.sent.get()
    }

    /// The first value of `name`, if it is valid UTF-8.
    pub fn get<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.map.get(name).and_then(|value| value.to_str().ok())
    }

    /// All values of `name`.
    pub fn get_all<K: AsHeaderName>(&self, name: K) -> Vec<&str> {
        self.map
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect()
    }

    /// Whether `name` is present.
    pub fn contains<K: AsHeaderName>(&self, name: K) -> bool {
        self.map.contains_key(name)
    }

    /// Replaces `name` with a single value.
    pub fn insert(&mut self, name: HeaderName, value: HeaderValue) {
        if self.guard(&name) {
            self.map.insert(name, value);
        }
    }

    /// Adds another value for `name`.
    pub fn append_value(&mut self, name: HeaderName, value: HeaderValue) {
        if self.guard(&name) {
            self.map.append(name, value);
        }
    }

    /// Parses and replaces `name`.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), InvalidHeader> {
        let (name, value) = parse(name, value)?;
        self.insert(name, value);
        Ok(())
    }

    /// Parses and appends to `name`.
    pub fn append(&mut self, name: &str, value: &str) -> Result<(), InvalidHeader> {
        let (name, value) = parse(name, value)?;
        self.append_value(name, value);
        Ok(())
    }

    /// Removes every value of `name`.
    pub fn remove<K: AsHeaderName>(&mut self, name: K) {
        if !self.is_sent() {
            self.map.remove(name);
        }
    }

    /// Removes all headers.
    pub fn clear(&mut self) {
        if !self.is_sent() {
            self.map.clear();
        }
    }

    /// Borrow the underlying map.
    #[must_use]
    pub fn map(&self) -> &HeaderMap {
        &self.map
    }

    fn guard(&self, name: &HeaderName) -> bool {
        if self.is_sent() {
            trace!(header = %name, "headers already sent, ignoring mutation");
            return false;
        }
        true
    }
}

/// Flattens a header map for serialization, joining repeated values.
pub(crate) fn snapshot(map: &HeaderMap) -> BTreeMap<String, String> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in map {
        let value = String::from_utf8_lossy(value.as_bytes());
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    flat
}

fn parse(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), InvalidHeader> {
    let header = HeaderName::from_bytes(name.as_bytes()).map_err(|_| InvalidHeader::name(name))?;
    let value = HeaderValue::from_str(value).map_err(|_| InvalidHeader::value(name))?;
    Ok((header, value))
}
