//! Lists extension library for CEL.
//!
//! # Functions
//!
//! - `lists.range(n)` - `[0, 1, ..., n-1]`
//! - `list.distinct()` - Drop repeated elements, keeping the first occurrence
//! - `list.flatten()` / `list.flatten(depth)` - Flatten nested lists
//! - `list.reverse()` - Reverse element order
//! - `list.slice(start, end)` - Sub-list `[start, end)`
//! - `list.sort()` - Sort comparable elements
//! - `list.first()` / `list.last()` - Optional first or last element
//! - `list.@sortByAssociatedKeys(keys)` - Target of the `sortBy` macro

use std::cmp::Ordering;
use std::collections::HashSet;

use cel_core_common::operators;

use crate::eval::{
    EvalError, Function, Kind, ListValue, ListValueBuilder, MapKey, Overload, Value,
};

/// Returns the lists extension library functions.
pub fn lists_functions() -> Vec<Function> {
    let mut funcs = Vec::new();

    funcs.push(Function::new("lists.range").with_overload(Overload::function(
        "lists_range",
        &[Kind::Int],
        |args| match args {
            [Value::Int(n)] => Value::List((0..(*n).max(0)).map(Value::Int).collect()),
            _ => Value::error(EvalError::invalid_argument("expected int")),
        },
    )));

    funcs.push(Function::new("distinct").with_overload(Overload::method(
        "list_distinct",
        &[Kind::List],
        |args| match args {
            [Value::List(list)] => Value::List(distinct(list)),
            _ => Value::error(EvalError::invalid_argument("expected list")),
        },
    )));

    funcs.push(
        Function::new("flatten")
            .with_overload(Overload::method("list_flatten", &[Kind::List], |args| {
                match args {
                    [Value::List(list)] => flatten(list, 1),
                    _ => Value::error(EvalError::invalid_argument("expected list")),
                }
            }))
            .with_overload(Overload::method(
                "list_flatten_int",
                &[Kind::List, Kind::Int],
                |args| match args {
                    [Value::List(list), Value::Int(depth)] => flatten(list, *depth),
                    _ => Value::error(EvalError::invalid_argument("expected list, int")),
                },
            )),
    );

    funcs.push(Function::new("reverse").with_overload(Overload::method(
        "list_reverse",
        &[Kind::List],
        |args| match args {
            [Value::List(list)] => Value::List(list.iter().rev().cloned().collect()),
            _ => Value::error(EvalError::invalid_argument("expected list")),
        },
    )));

    funcs.push(Function::new("slice").with_overload(Overload::method(
        "list_slice",
        &[Kind::List, Kind::Int, Kind::Int],
        |args| match args {
            [Value::List(list), Value::Int(start), Value::Int(end)] => slice(list, *start, *end),
            _ => Value::error(EvalError::invalid_argument("expected list, int, int")),
        },
    )));

    funcs.push(Function::new("sort").with_overload(Overload::method(
        "list_sort",
        &[Kind::List],
        |args| match args {
            [Value::List(list)] => sort(list),
            _ => Value::error(EvalError::invalid_argument("expected list")),
        },
    )));

    funcs.push(Function::new("first").with_overload(Overload::method(
        "list_first",
        &[Kind::List],
        |args| match args {
            [Value::List(list)] => list.as_slice().first().cloned().into(),
            _ => Value::error(EvalError::invalid_argument("expected list")),
        },
    )));
    funcs.push(Function::new("last").with_overload(Overload::method(
        "list_last",
        &[Kind::List],
        |args| match args {
            [Value::List(list)] => list.as_slice().last().cloned().into(),
            _ => Value::error(EvalError::invalid_argument("expected list")),
        },
    )));

    funcs.push(
        Function::new(operators::SORT_BY_ASSOCIATED_KEYS).with_overload(Overload::method(
            "list_@sortByAssociatedKeys_list",
            &[Kind::List, Kind::List],
            |args| match args {
                [Value::List(values), Value::List(keys)] => sort_by_associated_keys(values, keys),
                _ => Value::error(EvalError::invalid_argument("expected list, list")),
            },
        )),
    );

    funcs
}

/// Removes repeated elements, keeping first occurrences in order.
///
/// Lists whose elements are all valid map keys of one kind are deduplicated
/// through a hash set; anything else falls back to pairwise CEL equality.
fn distinct(list: &ListValue) -> ListValue {
    let elements = list.as_slice();
    let first_kind = elements.first().map(Value::kind);
    let hashable = elements
        .iter()
        .map(|v| (Some(v.kind()) == first_kind).then(|| MapKey::from_value(v)).flatten())
        .collect::<Option<Vec<MapKey>>>();

    let mut builder = ListValueBuilder::with_capacity(elements.len());
    match hashable {
        Some(keys) => {
            let mut seen = HashSet::with_capacity(keys.len());
            for (key, value) in keys.into_iter().zip(elements) {
                if seen.insert(key) {
                    builder.add(value.clone());
                }
            }
        }
        None => {
            let mut kept: Vec<&Value> = Vec::with_capacity(elements.len());
            for value in elements {
                if !kept.iter().any(|k| *k == value) {
                    kept.push(value);
                    builder.add(value.clone());
                }
            }
        }
    }
    builder.build()
}

fn flatten(list: &ListValue, depth: i64) -> Value {
    if depth < 0 {
        return Value::error(EvalError::invalid_argument(
            "level must be non-negative",
        ));
    }
    let mut builder = ListValueBuilder::new();
    flatten_into(&mut builder, list, depth);
    Value::List(builder.build())
}

fn flatten_into(builder: &mut ListValueBuilder, list: &ListValue, depth: i64) {
    for value in list {
        match value {
            Value::List(inner) if depth > 0 => flatten_into(builder, inner, depth - 1),
            other => {
                builder.add(other.clone());
            }
        }
    }
}

fn slice(list: &ListValue, start: i64, end: i64) -> Value {
    let size = list.size() as i64;
    if start < 0 || end < 0 {
        return Value::error(EvalError::invalid_argument(format!(
            "cannot slice({}, {}), negative indexes not supported",
            start, end
        )));
    }
    if start > end {
        return Value::error(EvalError::invalid_argument(format!(
            "cannot slice({}, {}), start index must be less than or equal to end index",
            start, end
        )));
    }
    if end > size {
        return Value::error(EvalError::invalid_argument(format!(
            "cannot slice({}, {}), list is length {}",
            start, end, size
        )));
    }
    Value::List(ListValue::new(
        list.as_slice()[start as usize..end as usize].to_vec(),
    ))
}

/// Elements must be mutually comparable; the first pair that is not
/// fails the whole sort.
fn check_comparable(values: &[Value]) -> Result<(), EvalError> {
    let Some(first) = values.first() else {
        return Ok(());
    };
    let unsupported = |v: &Value| {
        matches!(
            v,
            Value::Null
                | Value::List(_)
                | Value::Map(_)
                | Value::Struct(_)
                | Value::Optional(_)
                | Value::Type(_)
                | Value::Error(_)
                | Value::Unknown(_)
        )
    };
    if unsupported(first) {
        return Err(EvalError::invalid_argument("unsupported sort type"));
    }
    for value in values {
        if value.kind() != first.kind() || first.compare(value).is_none() {
            return Err(EvalError::invalid_argument("unsupported sort type"));
        }
    }
    Ok(())
}

fn sort(list: &ListValue) -> Value {
    if let Err(err) = check_comparable(list.as_slice()) {
        return Value::error(err);
    }
    let mut values = list.as_slice().to_vec();
    values.sort_by(|a, b| a.compare(b).unwrap_or(Ordering::Equal));
    Value::List(ListValue::new(values))
}

/// Stable sort of `values` by the parallel list `keys`.
fn sort_by_associated_keys(values: &ListValue, keys: &ListValue) -> Value {
    if values.size() != keys.size() {
        return Value::error(EvalError::invalid_argument(format!(
            "@sortByAssociatedKeys() expected a list of the same size as the associated keys \
             list, but got {} and {} elements respectively",
            values.size(),
            keys.size()
        )));
    }
    if let Err(err) = check_comparable(keys.as_slice()) {
        return Value::error(err);
    }

    let mut order: Vec<usize> = (0..keys.size()).collect();
    let keys = keys.as_slice();
    order.sort_by(|&a, &b| keys[a].compare(&keys[b]).unwrap_or(Ordering::Equal));

    let values = values.as_slice();
    Value::List(order.into_iter().map(|i| values[i].clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{EvalErrorKind, FunctionRegistry};
    use pretty_assertions::assert_eq;

    fn registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        registry.register_all(lists_functions());
        registry
    }

    fn method(name: &str, args: &[Value]) -> Value {
        registry().call(name, args, true)
    }

    #[test]
    fn test_distinct_homogeneous() {
        assert_eq!(
            method("distinct", &[Value::list([1, 1, 2, 3, 3])]),
            Value::list([1, 2, 3])
        );
        assert_eq!(
            method("distinct", &[Value::list(["b", "a", "b"])]),
            Value::list(["b", "a"])
        );
    }

    #[test]
    fn test_distinct_heterogeneous() {
        let mixed = Value::list([
            Value::Int(1),
            Value::UInt(1),
            Value::Double(1.0),
            Value::string("1"),
            Value::list([1]),
            Value::list([1]),
        ]);
        assert_eq!(
            method("distinct", &[mixed]),
            Value::list([Value::Int(1), Value::string("1"), Value::list([1])])
        );
    }

    #[test]
    fn test_flatten() {
        let nested = Value::list([
            Value::list([1, 2]),
            Value::list([Value::Int(3), Value::list([4, 5])]),
        ]);
        assert_eq!(
            method("flatten", &[nested.clone()]),
            Value::list([Value::Int(1), Value::Int(2), Value::Int(3), Value::list([4, 5])])
        );
        assert_eq!(
            method("flatten", &[nested.clone(), Value::Int(2)]),
            Value::list([1, 2, 3, 4, 5])
        );
        match method("flatten", &[nested, Value::Int(-1)]) {
            Value::Error(e) => assert_eq!(e.kind, EvalErrorKind::InvalidArgument),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_sort_by_associated_keys() {
        let values = Value::list(["foo", "bar", "baz"]);
        assert_eq!(
            method(
                operators::SORT_BY_ASSOCIATED_KEYS,
                &[values.clone(), Value::list([3, 1, 2])]
            ),
            Value::list(["bar", "baz", "foo"])
        );
        match method(operators::SORT_BY_ASSOCIATED_KEYS, &[values, Value::list([1, 2])]) {
            Value::Error(e) => assert_eq!(e.kind, EvalErrorKind::InvalidArgument),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_sort_by_associated_keys_is_stable() {
        assert_eq!(
            method(
                operators::SORT_BY_ASSOCIATED_KEYS,
                &[Value::list(["a", "b", "c", "d"]), Value::list([2, 1, 2, 1])]
            ),
            Value::list(["b", "d", "a", "c"])
        );
    }

    #[test]
    fn test_sort() {
        assert_eq!(method("sort", &[Value::list([3, 1, 2])]), Value::list([1, 2, 3]));
        assert_eq!(
            method("sort", &[Value::list(["b", "c", "a"])]),
            Value::list(["a", "b", "c"])
        );
        match method("sort", &[Value::list([Value::Int(1), Value::string("a")])]) {
            Value::Error(e) => assert_eq!(e.message, "unsupported sort type"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_slice_reverse_first_last() {
        let list = Value::list([1, 2, 3, 4]);
        assert_eq!(
            method("slice", &[list.clone(), Value::Int(1), Value::Int(3)]),
            Value::list([2, 3])
        );
        assert!(method("slice", &[list.clone(), Value::Int(3), Value::Int(1)]).is_error());
        assert!(method("slice", &[list.clone(), Value::Int(0), Value::Int(9)]).is_error());
        assert_eq!(method("reverse", &[list.clone()]), Value::list([4, 3, 2, 1]));
        assert_eq!(method("first", &[list.clone()]), Value::optional_some(Value::Int(1)));
        assert_eq!(method("last", &[list]), Value::optional_some(Value::Int(4)));
        assert_eq!(
            method("first", &[Value::list(Vec::<Value>::new())]),
            Value::optional_none()
        );
    }

    #[test]
    fn test_range() {
        assert_eq!(
            registry().call("lists.range", &[Value::Int(3)], false),
            Value::list([0, 1, 2])
        );
        assert_eq!(
            registry().call("lists.range", &[Value::Int(0)], false),
            Value::list(Vec::<Value>::new())
        );
    }
}
