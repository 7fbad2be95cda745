//! Typed key/value container for arbitrary game state payloads.
//!
//! `GameData` is what clients ship to the host and what the host publishes
//! as the authoritative room snapshot. The server never interprets the
//! values; it only stores and forwards them. Lookups are typed: asking for
//! a key with the wrong type behaves like a missing key rather than an
//! error, so client code can evolve its schema without tripping over stale
//! entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single value stored in a [`GameData`] bag.
///
/// The set of kinds is fixed; nested maps are intentionally not supported.
/// Lists may mix kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum GameValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Raw byte array.
    Bytes(Vec<u8>),
    /// Ordered list of values.
    List(Vec<GameValue>),
}

/// Conversion from a stored [`GameValue`] into a concrete type.
///
/// Returns `None` when the stored kind does not match, which is how typed
/// lookups turn type mismatches into "not found".
pub trait FromGameValue: Sized {
    /// Extract `Self` from a value of the matching kind.
    fn from_game_value(value: &GameValue) -> Option<Self>;
}

impl FromGameValue for bool {
    fn from_game_value(value: &GameValue) -> Option<Self> {
        match value {
            GameValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromGameValue for i64 {
    fn from_game_value(value: &GameValue) -> Option<Self> {
        match value {
            GameValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromGameValue for f64 {
    fn from_game_value(value: &GameValue) -> Option<Self> {
        match value {
            GameValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl FromGameValue for String {
    fn from_game_value(value: &GameValue) -> Option<Self> {
        match value {
            GameValue::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromGameValue for Vec<u8> {
    fn from_game_value(value: &GameValue) -> Option<Self> {
        match value {
            GameValue::Bytes(b) => Some(b.clone()),
            _ => None,
        }
    }
}

impl FromGameValue for Vec<GameValue> {
    fn from_game_value(value: &GameValue) -> Option<Self> {
        match value {
            GameValue::List(l) => Some(l.clone()),
            _ => None,
        }
    }
}

/// Heterogeneous key/value bag keyed by string.
///
/// Keys are unique; insertion overwrites. A `BTreeMap` keeps iteration and
/// serialization order deterministic, which matters for snapshot equality
/// checks in tests and for stable persisted representations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameData {
    entries: BTreeMap<String, GameValue>,
}

impl GameData {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, overwriting any previous entry for `key`.
    pub fn put(&mut self, key: impl Into<String>, value: GameValue) {
        self.entries.insert(key.into(), value);
    }

    /// Typed lookup. Returns `None` when the key is absent *or* when the
    /// stored kind does not match `T`.
    pub fn get<T: FromGameValue>(&self, key: &str) -> Option<T> {
        self.entries.get(key).and_then(T::from_game_value)
    }

    /// Typed lookup with a caller-supplied default for the "not found"
    /// case (absent key or kind mismatch).
    pub fn get_or<T: FromGameValue>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Raw lookup without type filtering.
    pub fn get_raw(&self, key: &str) -> Option<&GameValue> {
        self.entries.get(key)
    }

    /// Remove an entry, returning the previous value if any.
    pub fn remove(&mut self, key: &str) -> Option<GameValue> {
        self.entries.remove(key)
    }

    /// Whether `key` has an entry of any kind.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &GameValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup_matches_kind() {
        let mut data = GameData::new();
        data.put("score", GameValue::Int(42));
        data.put("name", GameValue::Str("vatbub".to_string()));

        assert_eq!(data.get::<i64>("score"), Some(42));
        assert_eq!(data.get::<String>("name"), Some("vatbub".to_string()));
    }

    #[test]
    fn kind_mismatch_is_not_found() {
        let mut data = GameData::new();
        data.put("k", GameValue::Str("hello".to_string()));

        // Reading a string entry with an integer type parameter is "not
        // found", never an error.
        assert_eq!(data.get::<i64>("k"), None);
        assert_eq!(data.get_or::<i64>("k", -1), -1);

        // The raw entry is still there.
        assert!(data.contains("k"));
        assert_eq!(data.get::<String>("k"), Some("hello".to_string()));
    }

    #[test]
    fn insertion_overwrites() {
        let mut data = GameData::new();
        data.put("k", GameValue::Int(1));
        data.put("k", GameValue::Int(2));

        assert_eq!(data.len(), 1);
        assert_eq!(data.get::<i64>("k"), Some(2));
    }

    #[test]
    fn remove_clears_contains() {
        let mut data = GameData::new();
        data.put("k", GameValue::Bool(true));
        assert!(data.contains("k"));

        assert_eq!(data.remove("k"), Some(GameValue::Bool(true)));
        assert!(!data.contains("k"));
        assert_eq!(data.remove("k"), None);
    }

    #[test]
    fn list_and_bytes_round_trip_json() {
        let mut data = GameData::new();
        data.put("blob", GameValue::Bytes(vec![1, 2, 3]));
        data.put(
            "mixed",
            GameValue::List(vec![GameValue::Int(1), GameValue::Str("two".to_string())]),
        );

        let json = serde_json::to_string(&data).unwrap();
        let back: GameData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn default_is_returned_only_on_miss() {
        let mut data = GameData::new();
        data.put("present", GameValue::Float(1.5));

        assert_eq!(data.get_or("present", 0.0), 1.5);
        assert_eq!(data.get_or("absent", 0.0), 0.0);
    }
}
