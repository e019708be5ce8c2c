//! Map values, their keys, and the map builder.
//!
//! Maps keep entries in insertion order. Lookups go through an index keyed
//! on a normalized form of the key so that `1`, `1u` and `1.0` all find the
//! same entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::bytes::StringValue;
use super::list::ValueIterator;
use super::{EvalError, Value};

/// A valid map key: bool, int, uint or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    UInt(u64),
    String(StringValue),
}

impl MapKey {
    /// Create a map key from a value, if it is a valid key kind.
    pub fn from_value(value: &Value) -> Option<Self> {
        check_map_key(value).ok()
    }

    /// Convert back to a value.
    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::Int(i) => Value::Int(*i),
            MapKey::UInt(u) => Value::UInt(*u),
            MapKey::String(s) => Value::String(s.clone()),
        }
    }

    fn index(&self) -> KeyIndex {
        match self {
            MapKey::Bool(b) => KeyIndex::Bool(*b),
            MapKey::Int(i) => KeyIndex::Num(*i as i128),
            MapKey::UInt(u) => KeyIndex::Num(*u as i128),
            MapKey::String(s) => KeyIndex::String(s.clone()),
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(b) => write!(f, "{}", b),
            MapKey::Int(i) => write!(f, "{}", i),
            MapKey::UInt(u) => write!(f, "{}", u),
            MapKey::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for MapKey {
    fn from(s: &str) -> Self {
        MapKey::String(s.into())
    }
}

impl From<String> for MapKey {
    fn from(s: String) -> Self {
        MapKey::String(s.into())
    }
}

impl From<i64> for MapKey {
    fn from(i: i64) -> Self {
        MapKey::Int(i)
    }
}

impl From<u64> for MapKey {
    fn from(u: u64) -> Self {
        MapKey::UInt(u)
    }
}

impl From<bool> for MapKey {
    fn from(b: bool) -> Self {
        MapKey::Bool(b)
    }
}

/// Validate that `value` may be used as a map key.
pub fn check_map_key(value: &Value) -> Result<MapKey, EvalError> {
    match value {
        Value::Bool(b) => Ok(MapKey::Bool(*b)),
        Value::Int(i) => Ok(MapKey::Int(*i)),
        Value::UInt(u) => Ok(MapKey::UInt(*u)),
        Value::String(s) => Ok(MapKey::String(s.clone())),
        other => Err(EvalError::invalid_argument(format!(
            "unsupported map key type: {}",
            other.type_name()
        ))),
    }
}

/// Normalized lookup key. Numbers collapse to a single integer domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyIndex {
    Bool(bool),
    Num(i128),
    String(StringValue),
}

impl KeyIndex {
    /// Lookup form of a probe value. `Ok(None)` means it can match nothing.
    fn probe(value: &Value) -> Result<Option<KeyIndex>, EvalError> {
        match value {
            Value::Double(d) => {
                if d.fract() == 0.0 && d.abs() < 1.8446744073709552e19 {
                    Ok(Some(KeyIndex::Num(*d as i128)))
                } else {
                    Ok(None)
                }
            }
            other => check_map_key(other).map(|k| Some(k.index())),
        }
    }
}

/// An immutable CEL map. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MapValue {
    entries: Arc<Vec<(MapKey, Value)>>,
    index: Arc<HashMap<KeyIndex, usize>>,
}

impl MapValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up `key`. Unsupported key kinds are an error; a missing key is `None`.
    pub fn find(&self, key: &Value) -> Result<Option<Value>, EvalError> {
        let Some(probe) = KeyIndex::probe(key)? else {
            return Ok(None);
        };
        Ok(self
            .index
            .get(&probe)
            .map(|&position| self.entries[position].1.clone()))
    }

    /// Value for `key`, or a `NotFound` error value.
    pub fn get(&self, key: &Value) -> Value {
        match self.find(key) {
            Ok(Some(value)) => value,
            Ok(None) => Value::error(EvalError::no_such_key(DisplayKey(key))),
            Err(err) => Value::error(err),
        }
    }

    /// `Bool` presence of `key`. A key kind that can never be stored is
    /// simply absent.
    pub fn has(&self, key: &Value) -> Value {
        Value::Bool(matches!(self.find(key), Ok(Some(_))))
    }

    /// Convenience lookup by an already-valid key.
    pub fn get_key(&self, key: &MapKey) -> Option<&Value> {
        self.index
            .get(&key.index())
            .map(|&position| &self.entries[position].1)
    }

    /// Keys in insertion order.
    pub fn list_keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(k, _)| k.to_value()).collect()
    }

    /// Visit entries until the callback returns `false`.
    pub fn for_each(&self, mut f: impl FnMut(&MapKey, &Value) -> bool) {
        for (key, value) in self.entries.iter() {
            if !f(key, value) {
                break;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MapKey, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Iterates over the keys.
    pub fn new_iterator(&self) -> MapKeyIterator {
        MapKeyIterator {
            map: self.clone(),
            position: 0,
        }
    }
}

impl PartialEq for MapValue {
    fn eq(&self, other: &Self) -> bool {
        self.size() == other.size()
            && self
                .iter()
                .all(|(key, value)| other.get_key(key).is_some_and(|v| v == value))
    }
}

struct DisplayKey<'a>(&'a Value);

impl fmt::Display for DisplayKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match MapKey::from_value(self.0) {
            Some(key) => write!(f, "{}", key),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Cursor over a [`MapValue`]'s keys.
#[derive(Debug, Clone)]
pub struct MapKeyIterator {
    map: MapValue,
    position: usize,
}

impl ValueIterator for MapKeyIterator {
    fn has_next(&self) -> bool {
        self.position < self.map.size()
    }

    fn next(&mut self) -> Result<Value, EvalError> {
        let key = self
            .map
            .entries
            .get(self.position)
            .map(|(k, _)| k.to_value())
            .ok_or_else(|| {
                EvalError::failed_precondition("ValueIterator.Next called after exhaustion")
            })?;
        self.position += 1;
        Ok(key)
    }
}

/// Accumulates entries and produces an immutable [`MapValue`].
#[derive(Debug, Default)]
pub struct MapValueBuilder {
    entries: Vec<(MapKey, Value)>,
    index: HashMap<KeyIndex, usize>,
}

impl MapValueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing map's entries.
    pub fn from_map(map: &MapValue) -> Self {
        Self {
            entries: (*map.entries).clone(),
            index: (*map.index).clone(),
        }
    }

    /// Add an entry. Invalid key kinds and repeated keys are rejected.
    pub fn put(&mut self, key: Value, value: Value) -> Result<(), EvalError> {
        let key = check_map_key(&key)?;
        let index = key.index();
        if self.index.contains_key(&index) {
            return Err(EvalError::invalid_argument(format!(
                "Failed with repeated key: {}",
                key
            )));
        }
        self.index.insert(index, self.entries.len());
        self.entries.push((key, value));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(self) -> MapValue {
        MapValue {
            entries: Arc::new(self.entries),
            index: Arc::new(self.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::EvalErrorKind;

    fn sample() -> MapValue {
        let mut builder = MapValueBuilder::new();
        builder.put(Value::string("b"), Value::Int(2)).unwrap();
        builder.put(Value::Int(1), Value::string("one")).unwrap();
        builder.put(Value::Bool(true), Value::Null).unwrap();
        builder.build()
    }

    #[test]
    fn test_insertion_order() {
        assert_eq!(
            sample().list_keys(),
            vec![Value::string("b"), Value::Int(1), Value::Bool(true)]
        );
    }

    #[test]
    fn test_numeric_keys_are_interchangeable() {
        let map = sample();
        assert_eq!(map.get(&Value::UInt(1)), Value::string("one"));
        assert_eq!(map.get(&Value::Double(1.0)), Value::string("one"));
        assert_eq!(map.find(&Value::Double(1.5)).unwrap(), None);
    }

    #[test]
    fn test_missing_key() {
        match sample().get(&Value::string("zzz")) {
            Value::Error(e) => {
                assert_eq!(e.kind, EvalErrorKind::NotFound);
                assert_eq!(e.message, "no such key: zzz");
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_has() {
        let map = sample();
        assert_eq!(map.has(&Value::string("b")), Value::Bool(true));
        assert_eq!(map.has(&Value::Int(7)), Value::Bool(false));
        assert_eq!(map.has(&Value::list([1])), Value::Bool(false));
        assert_eq!(map.has(&Value::bytes(&b"b"[..])), Value::Bool(false));
    }

    #[test]
    fn test_int_to_double_missing_key() {
        let mut builder = MapValueBuilder::new();
        for (key, value) in [(1, 1.5), (2, 2.5), (3, 3.5)] {
            builder.put(Value::Int(key), Value::Double(value)).unwrap();
        }
        let map = builder.build();
        assert_eq!(map.size(), 3);

        let missing = Value::Int(4);
        match map.get(&missing) {
            Value::Error(e) => assert_eq!(e.kind, EvalErrorKind::NotFound),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(map.find(&missing).unwrap(), None);
        assert_eq!(map.has(&missing), Value::Bool(false));

        assert_eq!(map.get(&Value::Int(2)), Value::Double(2.5));
        assert_eq!(map.find(&Value::Int(3)).unwrap(), Some(Value::Double(3.5)));
        assert_eq!(map.has(&Value::Int(1)), Value::Bool(true));
    }

    #[test]
    fn test_builder_rejects_bad_keys() {
        let mut builder = MapValueBuilder::new();
        let err = builder.put(Value::Double(1.0), Value::Null).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::InvalidArgument);
        builder.put(Value::Int(1), Value::Null).unwrap();
        assert!(builder.put(Value::UInt(1), Value::Null).is_err());
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_equality_ignores_order() {
        let mut builder = MapValueBuilder::new();
        builder.put(Value::Bool(true), Value::Null).unwrap();
        builder.put(Value::UInt(1), Value::string("one")).unwrap();
        builder.put(Value::string("b"), Value::Double(2.0)).unwrap();
        assert_eq!(builder.build(), sample());
    }

    #[test]
    fn test_key_iterator() {
        let map = sample();
        let mut it = map.new_iterator();
        let mut keys = Vec::new();
        while it.has_next() {
            keys.push(it.next().unwrap());
        }
        assert_eq!(keys, map.list_keys());
        assert!(it.next().is_err());
    }
}
