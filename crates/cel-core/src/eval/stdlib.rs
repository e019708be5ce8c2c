//! The CEL standard library: operators, builtins and type conversions.
//!
//! Overload ids follow the cel-go naming (`add_int64_int64`, ...). Logical
//! operators, the conditional, indexing and `@not_strictly_false` are not
//! here; the evaluator handles them directly because they are non-strict.

use std::cmp::Ordering;
use std::sync::LazyLock;

use cel_core_common::operators;

use super::bytes::StringValue;
use super::functions::{Function, Overload};
use super::time;
use super::value::{format_double, Kind, TypeValue};
use super::{Duration, EvalError, Timestamp, Value};

/// The CEL standard library containing all built-in operators and functions.
pub static STANDARD_LIBRARY: LazyLock<Vec<Function>> = LazyLock::new(build_standard_library);

const NUMERIC: [(Kind, &str); 3] = [
    (Kind::Int, "int64"),
    (Kind::UInt, "uint64"),
    (Kind::Double, "double"),
];

fn build_standard_library() -> Vec<Function> {
    let mut funcs = Vec::new();

    // ==================== Arithmetic ====================

    funcs.push(arithmetic(
        operators::ADD,
        "add",
        &[
            (Kind::Int, Kind::Int),
            (Kind::UInt, Kind::UInt),
            (Kind::Double, Kind::Double),
            (Kind::String, Kind::String),
            (Kind::Bytes, Kind::Bytes),
            (Kind::List, Kind::List),
            (Kind::Timestamp, Kind::Duration),
            (Kind::Duration, Kind::Timestamp),
            (Kind::Duration, Kind::Duration),
        ],
        add,
    ));
    funcs.push(arithmetic(
        operators::SUBTRACT,
        "subtract",
        &[
            (Kind::Int, Kind::Int),
            (Kind::UInt, Kind::UInt),
            (Kind::Double, Kind::Double),
            (Kind::Timestamp, Kind::Timestamp),
            (Kind::Timestamp, Kind::Duration),
            (Kind::Duration, Kind::Duration),
        ],
        subtract,
    ));
    let numeric = [
        (Kind::Int, Kind::Int),
        (Kind::UInt, Kind::UInt),
        (Kind::Double, Kind::Double),
    ];
    funcs.push(arithmetic(operators::MULTIPLY, "multiply", &numeric, multiply));
    funcs.push(arithmetic(operators::DIVIDE, "divide", &numeric, divide));
    funcs.push(arithmetic(operators::MODULO, "modulo", &numeric[..2], modulo));

    funcs.push(
        Function::new(operators::NEGATE)
            .with_overload(Overload::function("negate_int64", &[Kind::Int], negate))
            .with_overload(Overload::function("negate_double", &[Kind::Double], negate)),
    );

    funcs.push(Function::new(operators::LOGICAL_NOT).with_overload(Overload::function(
        "logical_not",
        &[Kind::Bool],
        |args| match args {
            [Value::Bool(b)] => Value::Bool(!b),
            _ => Value::error(EvalError::no_matching_overload(operators::LOGICAL_NOT)),
        },
    )));

    // ==================== Equality and ordering ====================

    funcs.push(Function::new(operators::EQUALS).with_overload(Overload::function(
        "equals",
        &[Kind::Dyn, Kind::Dyn],
        |args| match args {
            [a, b] => Value::Bool(a == b),
            _ => Value::error(EvalError::no_matching_overload(operators::EQUALS)),
        },
    )));
    funcs.push(Function::new(operators::NOT_EQUALS).with_overload(Overload::function(
        "not_equals",
        &[Kind::Dyn, Kind::Dyn],
        |args| match args {
            [a, b] => Value::Bool(a != b),
            _ => Value::error(EvalError::no_matching_overload(operators::NOT_EQUALS)),
        },
    )));

    funcs.push(ordering(operators::LESS, "less", |o| o == Ordering::Less));
    funcs.push(ordering(operators::LESS_EQUALS, "less_equals", |o| o != Ordering::Greater));
    funcs.push(ordering(operators::GREATER, "greater", |o| o == Ordering::Greater));
    funcs.push(ordering(operators::GREATER_EQUALS, "greater_equals", |o| o != Ordering::Less));

    funcs.push(
        Function::new(operators::IN)
            .with_overload(Overload::function("in_list", &[Kind::Dyn, Kind::List], in_impl))
            .with_overload(Overload::function("in_map", &[Kind::Dyn, Kind::Map], in_impl)),
    );

    // ==================== Builtins ====================

    let mut size = Function::new("size");
    for (kind, suffix) in [
        (Kind::String, "string"),
        (Kind::Bytes, "bytes"),
        (Kind::List, "list"),
        (Kind::Map, "map"),
    ] {
        size = size
            .with_overload(Overload::function(format!("size_{}", suffix), &[kind], size_impl))
            .with_overload(Overload::method(format!("{}_size", suffix), &[kind], size_impl));
    }
    funcs.push(size);

    funcs.push(string_predicate("contains", "contains_string", |s, sub| s.contains(sub)));
    funcs.push(string_predicate("startsWith", "starts_with_string", |s, p| s.starts_with(p)));
    funcs.push(string_predicate("endsWith", "ends_with_string", |s, p| s.ends_with(p)));

    funcs.push(
        Function::new("matches")
            .with_overload(Overload::function("matches", &[Kind::String, Kind::String], matches))
            .with_overload(Overload::method(
                "matches_string",
                &[Kind::String, Kind::String],
                matches,
            )),
    );

    // ==================== Type conversions ====================

    funcs.push(conversion(
        "int",
        &[Kind::Int, Kind::UInt, Kind::Double, Kind::String, Kind::Timestamp],
        to_int,
    ));
    funcs.push(conversion("uint", &[Kind::UInt, Kind::Int, Kind::Double, Kind::String], to_uint));
    funcs.push(conversion(
        "double",
        &[Kind::Double, Kind::Int, Kind::UInt, Kind::String],
        to_double,
    ));
    funcs.push(conversion(
        "string",
        &[
            Kind::String,
            Kind::Int,
            Kind::UInt,
            Kind::Double,
            Kind::Bool,
            Kind::Bytes,
            Kind::Timestamp,
            Kind::Duration,
        ],
        to_string,
    ));
    funcs.push(conversion("bytes", &[Kind::Bytes, Kind::String], to_bytes));
    funcs.push(conversion("bool", &[Kind::Bool, Kind::String], to_bool));
    funcs.push(conversion("timestamp", &[Kind::Timestamp, Kind::String, Kind::Int], to_timestamp));
    funcs.push(conversion("duration", &[Kind::Duration, Kind::String, Kind::Int], to_duration));

    funcs.push(Function::new("type").with_overload(Overload::function(
        "type",
        &[Kind::Dyn],
        |args| match args {
            [v] => Value::Type(v.type_value()),
            _ => Value::error(EvalError::no_matching_overload("type")),
        },
    )));
    funcs.push(Function::new("dyn").with_overload(Overload::function(
        "to_dyn",
        &[Kind::Dyn],
        |args| match args {
            [v] => v.clone(),
            _ => Value::error(EvalError::no_matching_overload("dyn")),
        },
    )));

    // ==================== Time accessors ====================

    funcs.extend(time::accessor_functions());

    funcs
}

fn kind_suffix(kind: Kind) -> &'static str {
    match kind {
        Kind::Int => "int64",
        Kind::UInt => "uint64",
        Kind::Double => "double",
        Kind::String => "string",
        Kind::Bytes => "bytes",
        Kind::Bool => "bool",
        Kind::Timestamp => "timestamp",
        Kind::Duration => "duration",
        Kind::List => "list",
        Kind::Map => "map",
        _ => "dyn",
    }
}

/// Builds a binary operator with one overload per `(lhs, rhs)` kind pair.
fn arithmetic(
    name: &'static str,
    id: &str,
    pairs: &[(Kind, Kind)],
    apply: fn(&[Value]) -> Value,
) -> Function {
    pairs.iter().fold(Function::new(name), |function, &(lhs, rhs)| {
        let overload_id = format!("{}_{}_{}", id, kind_suffix(lhs), kind_suffix(rhs));
        function.with_overload(Overload::function(overload_id, &[lhs, rhs], apply))
    })
}

/// Builds a relational operator over same-kind and cross-numeric pairs.
fn ordering(name: &'static str, id: &str, test: fn(Ordering) -> bool) -> Function {
    let mut function = Function::new(name);
    let compare = move |args: &[Value]| match args {
        [a, b] => match a.compare(b) {
            Some(ord) => Value::Bool(test(ord)),
            // NaN is unordered: every comparison with it is false.
            None if is_numeric(a) && is_numeric(b) => Value::Bool(false),
            None => Value::error(EvalError::no_matching_overload(name)),
        },
        _ => Value::error(EvalError::no_matching_overload(name)),
    };
    for kind in [Kind::Bool, Kind::String, Kind::Bytes, Kind::Timestamp, Kind::Duration] {
        let suffix = kind_suffix(kind);
        function = function.with_overload(Overload::function(
            format!("{}_{}", id, suffix),
            &[kind, kind],
            compare,
        ));
    }
    for (left, left_suffix) in NUMERIC {
        for (right, right_suffix) in NUMERIC {
            let overload_id = if left == right {
                format!("{}_{}", id, left_suffix)
            } else {
                format!("{}_{}_{}", id, left_suffix, right_suffix)
            };
            function =
                function.with_overload(Overload::function(overload_id, &[left, right], compare));
        }
    }
    function
}

fn is_numeric(v: &Value) -> bool {
    matches!(v, Value::Int(_) | Value::UInt(_) | Value::Double(_))
}

fn string_predicate(name: &'static str, id: &str, test: fn(&str, &str) -> bool) -> Function {
    Function::new(name).with_overload(Overload::method(
        id,
        &[Kind::String, Kind::String],
        move |args| match args {
            [Value::String(s), Value::String(arg)] => Value::Bool(test(&s.to_cow(), &arg.to_cow())),
            _ => Value::error(EvalError::no_matching_overload(name)),
        },
    ))
}

fn conversion(name: &'static str, kinds: &[Kind], convert: fn(&Value) -> Value) -> Function {
    let mut function = Function::new(name);
    for &kind in kinds {
        function = function.with_overload(Overload::function(
            format!("{}_to_{}", kind_suffix(kind), name),
            &[kind],
            move |args| match args {
                [v] => convert(v),
                _ => Value::error(EvalError::no_matching_overload(name)),
            },
        ));
    }
    function
}

fn overflow(op: &str) -> Value {
    Value::error(EvalError::overflow(format!("integer overflow in {}", op)))
}

fn checked<T: Into<Value>>(result: Option<T>, op: &str) -> Value {
    result.map(Into::into).unwrap_or_else(|| overflow(op))
}

fn time_result<T: Into<Value>>(result: Result<T, EvalError>) -> Value {
    result.map(Into::into).unwrap_or_else(Value::error)
}

fn add(args: &[Value]) -> Value {
    match args {
        [Value::Int(a), Value::Int(b)] => checked(a.checked_add(*b), "addition"),
        [Value::UInt(a), Value::UInt(b)] => checked(a.checked_add(*b), "addition"),
        [Value::Double(a), Value::Double(b)] => Value::Double(a + b),
        [Value::String(a), Value::String(b)] => Value::String(a.concat(b)),
        [Value::Bytes(a), Value::Bytes(b)] => Value::Bytes(a.concat(b)),
        [Value::List(a), Value::List(b)] => Value::List(a.concat(b)),
        [Value::Timestamp(t), Value::Duration(d)] | [Value::Duration(d), Value::Timestamp(t)] => {
            time_result(time::add_timestamp_duration(t, d))
        }
        [Value::Duration(a), Value::Duration(b)] => time_result(time::add_durations(a, b)),
        _ => Value::error(EvalError::no_matching_overload(operators::ADD)),
    }
}

fn subtract(args: &[Value]) -> Value {
    match args {
        [Value::Int(a), Value::Int(b)] => checked(a.checked_sub(*b), "subtraction"),
        [Value::UInt(a), Value::UInt(b)] => checked(a.checked_sub(*b), "subtraction"),
        [Value::Double(a), Value::Double(b)] => Value::Double(a - b),
        [Value::Timestamp(a), Value::Timestamp(b)] => time_result(time::sub_timestamps(a, b)),
        [Value::Timestamp(t), Value::Duration(d)] => {
            time_result(time::sub_timestamp_duration(t, d))
        }
        [Value::Duration(a), Value::Duration(b)] => time_result(time::sub_durations(a, b)),
        _ => Value::error(EvalError::no_matching_overload(operators::SUBTRACT)),
    }
}

fn multiply(args: &[Value]) -> Value {
    match args {
        [Value::Int(a), Value::Int(b)] => checked(a.checked_mul(*b), "multiplication"),
        [Value::UInt(a), Value::UInt(b)] => checked(a.checked_mul(*b), "multiplication"),
        [Value::Double(a), Value::Double(b)] => Value::Double(a * b),
        _ => Value::error(EvalError::no_matching_overload(operators::MULTIPLY)),
    }
}

fn divide(args: &[Value]) -> Value {
    match args {
        [Value::Int(_), Value::Int(0)] | [Value::UInt(_), Value::UInt(0)] => {
            Value::error(EvalError::division_by_zero())
        }
        [Value::Int(a), Value::Int(b)] => checked(a.checked_div(*b), "division"),
        [Value::UInt(a), Value::UInt(b)] => Value::UInt(a / b),
        [Value::Double(a), Value::Double(b)] => Value::Double(a / b),
        _ => Value::error(EvalError::no_matching_overload(operators::DIVIDE)),
    }
}

fn modulo(args: &[Value]) -> Value {
    match args {
        [Value::Int(_), Value::Int(0)] | [Value::UInt(_), Value::UInt(0)] => {
            Value::error(EvalError::modulo_by_zero())
        }
        [Value::Int(a), Value::Int(b)] => checked(a.checked_rem(*b), "modulus"),
        [Value::UInt(a), Value::UInt(b)] => Value::UInt(a % b),
        _ => Value::error(EvalError::no_matching_overload(operators::MODULO)),
    }
}

fn negate(args: &[Value]) -> Value {
    match args {
        [Value::Int(i)] => i.checked_neg().map(Value::Int).unwrap_or_else(|| overflow("negation")),
        [Value::Double(d)] => Value::Double(-d),
        _ => Value::error(EvalError::no_matching_overload(operators::NEGATE)),
    }
}

fn in_impl(args: &[Value]) -> Value {
    match args {
        [elem, Value::List(list)] => Value::Bool(list.contains(elem)),
        [key, Value::Map(map)] => map.has(key),
        _ => Value::error(EvalError::no_matching_overload(operators::IN)),
    }
}

fn size_impl(args: &[Value]) -> Value {
    let size = match args {
        [Value::String(s)] => s.char_count(),
        [Value::Bytes(b)] => b.len(),
        [Value::List(l)] => l.size(),
        [Value::Map(m)] => m.size(),
        _ => return Value::error(EvalError::no_matching_overload("size")),
    };
    Value::Int(size as i64)
}

fn matches(args: &[Value]) -> Value {
    match args {
        [Value::String(s), Value::String(pattern)] => match regex::Regex::new(&pattern.to_cow()) {
            Ok(re) => Value::Bool(re.is_match(&s.to_cow())),
            Err(e) => Value::error(EvalError::invalid_argument(format!("invalid regex: {}", e))),
        },
        _ => Value::error(EvalError::no_matching_overload("matches")),
    }
}

fn to_int(value: &Value) -> Value {
    match value {
        Value::Int(i) => Value::Int(*i),
        Value::UInt(u) => i64::try_from(*u)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::error(EvalError::overflow("uint to int overflow"))),
        Value::Double(d) => {
            if d.is_finite() && *d > -9.223372036854775808e18 && *d < 9.223372036854775807e18 {
                Value::Int(*d as i64)
            } else {
                Value::error(EvalError::overflow("double to int overflow"))
            }
        }
        Value::String(s) => s
            .to_cow()
            .parse::<i64>()
            .map(Value::Int)
            .unwrap_or_else(|_| Value::error(EvalError::invalid_conversion("string", "int"))),
        Value::Timestamp(t) => Value::Int(t.seconds),
        _ => Value::error(EvalError::invalid_conversion(&value.type_name(), "int")),
    }
}

fn to_uint(value: &Value) -> Value {
    match value {
        Value::UInt(u) => Value::UInt(*u),
        Value::Int(i) => u64::try_from(*i)
            .map(Value::UInt)
            .unwrap_or_else(|_| Value::error(EvalError::overflow("int to uint overflow"))),
        Value::Double(d) => {
            if d.is_finite() && *d > -1.0 && *d < 1.8446744073709552e19 {
                Value::UInt(*d as u64)
            } else {
                Value::error(EvalError::overflow("double to uint overflow"))
            }
        }
        Value::String(s) => s
            .to_cow()
            .parse::<u64>()
            .map(Value::UInt)
            .unwrap_or_else(|_| Value::error(EvalError::invalid_conversion("string", "uint"))),
        _ => Value::error(EvalError::invalid_conversion(&value.type_name(), "uint")),
    }
}

fn to_double(value: &Value) -> Value {
    match value {
        Value::Double(d) => Value::Double(*d),
        Value::Int(i) => Value::Double(*i as f64),
        Value::UInt(u) => Value::Double(*u as f64),
        Value::String(s) => s
            .to_cow()
            .parse::<f64>()
            .map(Value::Double)
            .unwrap_or_else(|_| Value::error(EvalError::invalid_conversion("string", "double"))),
        _ => Value::error(EvalError::invalid_conversion(&value.type_name(), "double")),
    }
}

fn to_string(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.clone()),
        Value::Int(i) => Value::string(i.to_string()),
        Value::UInt(u) => Value::string(u.to_string()),
        Value::Double(d) => Value::string(format_double(*d)),
        Value::Bool(b) => Value::string(b.to_string()),
        Value::Bytes(b) => StringValue::from_utf8(b)
            .map(Value::String)
            .unwrap_or_else(|_| Value::error(EvalError::invalid_conversion("bytes", "string"))),
        Value::Timestamp(t) => Value::string(time::format_timestamp(t)),
        Value::Duration(d) => Value::string(time::format_duration(d)),
        _ => Value::error(EvalError::invalid_conversion(&value.type_name(), "string")),
    }
}

fn to_bytes(value: &Value) -> Value {
    match value {
        Value::Bytes(b) => Value::Bytes(b.clone()),
        Value::String(s) => Value::Bytes(s.to_bytes()),
        _ => Value::error(EvalError::invalid_conversion(&value.type_name(), "bytes")),
    }
}

fn to_bool(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(*b),
        Value::String(s) => match s.to_cow().as_ref() {
            "true" | "True" | "TRUE" | "t" | "1" => Value::Bool(true),
            "false" | "False" | "FALSE" | "f" | "0" => Value::Bool(false),
            _ => Value::error(EvalError::invalid_conversion("string", "bool")),
        },
        _ => Value::error(EvalError::invalid_conversion(&value.type_name(), "bool")),
    }
}

fn to_timestamp(value: &Value) -> Value {
    match value {
        Value::Timestamp(t) => Value::Timestamp(*t),
        Value::String(s) => time_result(time::parse_timestamp(&s.to_cow())),
        Value::Int(i) => {
            let ts = Timestamp::from_seconds(*i);
            if ts.is_valid() {
                Value::Timestamp(ts)
            } else {
                Value::error(EvalError::out_of_range(
                    "timestamp out of range: must be between year 0001 and 9999",
                ))
            }
        }
        _ => Value::error(EvalError::invalid_conversion(&value.type_name(), "timestamp")),
    }
}

fn to_duration(value: &Value) -> Value {
    match value {
        Value::Duration(d) => Value::Duration(*d),
        Value::String(s) => time_result(time::parse_duration(&s.to_cow())),
        Value::Int(i) => {
            let d = Duration::from_seconds(*i);
            if d.is_valid() {
                Value::Duration(d)
            } else {
                Value::error(EvalError::out_of_range(
                    "duration out of range: must be within approximately 10000 years",
                ))
            }
        }
        _ => Value::error(EvalError::invalid_conversion(&value.type_name(), "duration")),
    }
}

/// The type value an identifier denotes, if it names a built-in type.
pub(crate) fn type_ident(name: &str) -> Option<Value> {
    TypeValue::from_type_name(name).map(Value::Type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{EvalErrorKind, FunctionRegistry};

    fn registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        registry.register_all(STANDARD_LIBRARY.iter().cloned());
        registry
    }

    fn call(name: &str, args: &[Value]) -> Value {
        registry().call(name, args, false)
    }

    fn error_kind(value: Value) -> EvalErrorKind {
        match value {
            Value::Error(e) => e.kind,
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(call("_+_", &[Value::Int(1), Value::Int(2)]), Value::Int(3));
        assert_eq!(call("_-_", &[Value::UInt(5), Value::UInt(2)]), Value::UInt(3));
        assert_eq!(call("_*_", &[Value::Double(1.5), Value::Double(2.0)]), Value::Double(3.0));
        assert_eq!(call("_%_", &[Value::Int(7), Value::Int(3)]), Value::Int(1));
        assert_eq!(
            call("_+_", &[Value::string("ab"), Value::string("cd")]),
            Value::string("abcd")
        );
    }

    #[test]
    fn test_arithmetic_errors() {
        assert_eq!(
            error_kind(call("_+_", &[Value::Int(i64::MAX), Value::Int(1)])),
            EvalErrorKind::Overflow
        );
        assert_eq!(
            error_kind(call("_/_", &[Value::Int(1), Value::Int(0)])),
            EvalErrorKind::DivisionByZero
        );
        assert_eq!(
            error_kind(call("_%_", &[Value::UInt(1), Value::UInt(0)])),
            EvalErrorKind::ModuloByZero
        );
        assert_eq!(
            error_kind(call("-_", &[Value::Int(i64::MIN)])),
            EvalErrorKind::Overflow
        );
        assert_eq!(
            error_kind(call("_+_", &[Value::Int(1), Value::UInt(1)])),
            EvalErrorKind::NoMatchingOverload
        );
    }

    #[test]
    fn test_cross_numeric_ordering() {
        assert_eq!(call("_<_", &[Value::Int(-1), Value::UInt(0)]), Value::Bool(true));
        assert_eq!(call("_>=_", &[Value::Double(2.5), Value::Int(2)]), Value::Bool(true));
        assert_eq!(
            call("_<_", &[Value::Double(f64::NAN), Value::Int(1)]),
            Value::Bool(false)
        );
        assert_eq!(
            error_kind(call("_<_", &[Value::Int(1), Value::string("a")])),
            EvalErrorKind::NoMatchingOverload
        );
    }

    #[test]
    fn test_in_and_size() {
        let list = Value::list([1, 2, 3]);
        assert_eq!(call("@in", &[Value::UInt(2), list.clone()]), Value::Bool(true));
        assert_eq!(call("size", &[list]), Value::Int(3));
        assert_eq!(call("size", &[Value::string("héllo")]), Value::Int(5));
        let map = Value::map([("a", 1)]);
        assert_eq!(call("@in", &[Value::string("a"), map]), Value::Bool(true));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call("int", &[Value::string("42")]), Value::Int(42));
        assert_eq!(call("int", &[Value::Double(-2.7)]), Value::Int(-2));
        assert_eq!(
            error_kind(call("int", &[Value::Double(1e20)])),
            EvalErrorKind::Overflow
        );
        assert_eq!(
            error_kind(call("uint", &[Value::Int(-1)])),
            EvalErrorKind::Overflow
        );
        assert_eq!(call("string", &[Value::Double(2.0)]), Value::string("2.0"));
        assert_eq!(call("bool", &[Value::string("true")]), Value::Bool(true));
        assert_eq!(
            call("duration", &[Value::string("1m")]),
            Value::duration(60, 0)
        );
        assert_eq!(call("type", &[Value::Int(1)]), Value::Type(TypeValue::int_type()));
    }

    #[test]
    fn test_string_builtins() {
        let reg = registry();
        assert_eq!(
            reg.call("startsWith", &[Value::string("hello"), Value::string("he")], true),
            Value::Bool(true)
        );
        assert_eq!(
            reg.call("matches", &[Value::string("abc123"), Value::string("[a-z]+\\d+")], true),
            Value::Bool(true)
        );
        assert!(reg
            .call("matches", &[Value::string("a"), Value::string("(")], false)
            .is_error());
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let ts = Value::timestamp(100, 0);
        let d = Value::duration(10, 0);
        assert_eq!(call("_+_", &[ts.clone(), d.clone()]), Value::timestamp(110, 0));
        assert_eq!(call("_-_", &[ts.clone(), d]), Value::timestamp(90, 0));
        assert_eq!(
            call("_-_", &[ts.clone(), Value::timestamp(40, 0)]),
            Value::duration(60, 0)
        );
    }
}
