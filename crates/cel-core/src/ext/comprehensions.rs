//! Runtime support for the two-variable comprehension macros.
//!
//! `transformMap` and `transformMapEntry` accumulate into a map through
//! `cel.@mapInsert`, either one key/value pair at a time or by merging a
//! single-entry map.

use cel_core_common::operators;

use crate::eval::{EvalError, Function, Kind, MapValue, MapValueBuilder, Overload, Value};

/// Returns the comprehensions extension library functions.
pub fn comprehensions_functions() -> Vec<Function> {
    vec![Function::new(operators::MAP_INSERT)
        .with_overload(Overload::function(
            "cel_@mapInsert_map_key_value",
            &[Kind::Map, Kind::Dyn, Kind::Dyn],
            |args| match args {
                [Value::Map(map), key, value] => {
                    insert(map, [(key.clone(), value.clone())].into_iter())
                }
                _ => Value::error(EvalError::invalid_argument("expected map, key, value")),
            },
        ))
        .with_overload(Overload::function(
            "cel_@mapInsert_map_map",
            &[Kind::Map, Kind::Map],
            |args| match args {
                [Value::Map(map), Value::Map(entries)] => insert(
                    map,
                    entries.iter().map(|(k, v)| (k.to_value(), v.clone())),
                ),
                _ => Value::error(EvalError::invalid_argument("expected map, map")),
            },
        ))]
}

/// Copies `map` and adds `entries`. A key already present is an error.
fn insert(map: &MapValue, entries: impl Iterator<Item = (Value, Value)>) -> Value {
    let mut builder = MapValueBuilder::from_map(map);
    for (key, value) in entries {
        if let Err(err) = builder.put(key, value) {
            return Value::error(err);
        }
    }
    Value::Map(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::FunctionRegistry;

    fn call(args: &[Value]) -> Value {
        let mut registry = FunctionRegistry::new();
        registry.register_all(comprehensions_functions());
        registry.call(operators::MAP_INSERT, args, false)
    }

    #[test]
    fn test_insert_pair() {
        let map = Value::map([("a", 1)]);
        assert_eq!(
            call(&[map, Value::string("b"), Value::Int(2)]),
            Value::map([("a", 1), ("b", 2)])
        );
    }

    #[test]
    fn test_insert_entry_map() {
        let map = Value::map([("a", 1)]);
        assert_eq!(
            call(&[map, Value::map([("c", 3)])]),
            Value::map([("a", 1), ("c", 3)])
        );
    }

    #[test]
    fn test_insert_existing_key_fails() {
        let map = Value::map([("a", 1)]);
        assert!(call(&[map, Value::string("a"), Value::Int(2)]).is_error());
    }
}
