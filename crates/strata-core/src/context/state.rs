//! Free-form key/value storage shared between middleware of one request.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Typed values keyed by name.
///
/// ```
/// use strata_core::State;
///
/// let mut state = State::new();
/// state.insert("user_id", 42u64);
/// assert_eq!(state.get::<u64>("user_id"), Some(&42));
/// assert_eq!(state.get::<String>("user_id"), None);
/// ```
#[derive(Default)]
pub struct State {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl State {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, returning the previous value if it had the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) -> Option<T> {
        self.values
            .insert(key.into(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    /// Borrows the value under `key` if it has type `T`.
    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|value| value.downcast_ref())
    }

    /// Mutably borrows the value under `key` if it has type `T`.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|value| value.downcast_mut())
    }

    /// Removes and returns the value under `key` if it has type `T`.
    ///
    /// A value of another type is left in place.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.values.get(key).is_some_and(|value| value.is::<T>()) {
            return None;
        }
        self.values
            .remove(key)
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    /// Whether anything is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Stored keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("State").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_value() {
        let mut state = State::new();
        assert_eq!(state.insert("count", 1u32), None);
        assert_eq!(state.insert("count", 2u32), Some(1));
        assert_eq!(state.get::<u32>("count"), Some(&2));
    }

    #[test]
    fn test_get_mut() {
        let mut state = State::new();
        state.insert("names", vec!["a".to_string()]);
        state
            .get_mut::<Vec<String>>("names")
            .unwrap()
            .push("b".to_string());
        assert_eq!(state.get::<Vec<String>>("names").unwrap().len(), 2);
    }

    #[test]
    fn test_remove_wrong_type_keeps_value() {
        let mut state = State::new();
        state.insert("id", "abc".to_string());
        assert_eq!(state.remove::<u64>("id"), None);
        assert!(state.contains("id"));
        assert_eq!(state.remove::<String>("id").as_deref(), Some("abc"));
        assert!(state.is_empty());
    }

    #[test]
    fn test_debug_lists_keys() {
        let mut state = State::new();
        state.insert("b", 1u8);
        state.insert("a", 2u8);
        assert_eq!(format!("{state:?}"), r#"State { keys: ["a", "b"] }"#);
    }
}
