//! Math extension library for CEL.
//!
//! This module provides additional math functions beyond the CEL standard library,
//! matching the cel-go math extension.
//!
//! # Functions
//!
//! - `math.@max(...)` / `math.@min(...)` - Targets of the `math.greatest` and
//!   `math.least` macros (one value, one list, or two values)
//! - `math.ceil(double)` - Ceiling function
//! - `math.floor(double)` - Floor function
//! - `math.round(double)` - Round half away from zero
//! - `math.trunc(double)` - Truncate toward zero
//! - `math.abs(number)` - Absolute value
//! - `math.sign(number)` - Sign of number (-1, 0, or 1)
//! - `math.isNaN(double)` / `math.isInf(double)` / `math.isFinite(double)`
//! - `math.bitAnd`, `math.bitOr`, `math.bitXor`, `math.bitNot`
//! - `math.bitShiftLeft`, `math.bitShiftRight`

use std::cmp::Ordering;

use cel_core_common::operators;

use crate::eval::value::compare_numeric;
use crate::eval::{EvalError, Function, Kind, Overload, Value};

/// Returns the math extension library functions.
pub fn math_functions() -> Vec<Function> {
    let mut funcs = Vec::new();

    funcs.push(minmax_function(operators::MATH_MAX, "math_@max", Ordering::Greater));
    funcs.push(minmax_function(operators::MATH_MIN, "math_@min", Ordering::Less));

    funcs.push(double_function("math.ceil", "math_ceil_double", f64::ceil));
    funcs.push(double_function("math.floor", "math_floor_double", f64::floor));
    // f64::round rounds half away from zero.
    funcs.push(double_function("math.round", "math_round_double", f64::round));
    funcs.push(double_function("math.trunc", "math_trunc_double", f64::trunc));

    funcs.push(
        Function::new("math.abs")
            .with_overload(Overload::function("math_abs_int", &[Kind::Int], |args| match args {
                [Value::Int(v)] => match v.checked_abs() {
                    Some(abs) => Value::Int(abs),
                    None => Value::error(EvalError::overflow("integer overflow in abs")),
                },
                _ => Value::error(EvalError::invalid_argument("expected int")),
            }))
            .with_overload(Overload::function("math_abs_uint", &[Kind::UInt], |args| match args {
                [Value::UInt(v)] => Value::UInt(*v),
                _ => Value::error(EvalError::invalid_argument("expected uint")),
            }))
            .with_overload(Overload::function("math_abs_double", &[Kind::Double], |args| {
                match args {
                    [Value::Double(v)] => Value::Double(v.abs()),
                    _ => Value::error(EvalError::invalid_argument("expected double")),
                }
            })),
    );

    funcs.push(
        Function::new("math.sign")
            .with_overload(Overload::function("math_sign_int", &[Kind::Int], |args| match args {
                [Value::Int(v)] => Value::Int(v.signum()),
                _ => Value::error(EvalError::invalid_argument("expected int")),
            }))
            .with_overload(Overload::function("math_sign_uint", &[Kind::UInt], |args| match args {
                [Value::UInt(v)] => Value::UInt(u64::from(*v != 0)),
                _ => Value::error(EvalError::invalid_argument("expected uint")),
            }))
            .with_overload(Overload::function("math_sign_double", &[Kind::Double], |args| {
                match args {
                    [Value::Double(v)] if v.is_nan() => Value::Double(f64::NAN),
                    [Value::Double(v)] if *v > 0.0 => Value::Double(1.0),
                    [Value::Double(v)] if *v < 0.0 => Value::Double(-1.0),
                    [Value::Double(_)] => Value::Double(0.0),
                    _ => Value::error(EvalError::invalid_argument("expected double")),
                }
            })),
    );

    funcs.push(double_predicate("math.isNaN", "math_isnan_double", f64::is_nan));
    funcs.push(double_predicate("math.isInf", "math_isinf_double", f64::is_infinite));
    funcs.push(double_predicate("math.isFinite", "math_isfinite_double", f64::is_finite));

    add_bit_operations(&mut funcs);

    funcs
}

fn double_function(name: &str, id: &str, f: fn(f64) -> f64) -> Function {
    Function::new(name).with_overload(Overload::function(id, &[Kind::Double], move |args| {
        match args {
            [Value::Double(v)] => Value::Double(f(*v)),
            _ => Value::error(EvalError::invalid_argument("expected double")),
        }
    }))
}

fn double_predicate(name: &str, id: &str, f: fn(f64) -> bool) -> Function {
    Function::new(name).with_overload(Overload::function(id, &[Kind::Double], move |args| {
        match args {
            [Value::Double(v)] => Value::Bool(f(*v)),
            _ => Value::error(EvalError::invalid_argument("expected double")),
        }
    }))
}

fn is_nan(value: &Value) -> bool {
    matches!(value, Value::Double(d) if d.is_nan())
}

/// Picks the extreme numeric value in `target` direction. A single list
/// argument is searched element-wise; a single scalar is returned as is.
fn pick_extreme(args: &[Value], target: Ordering, name: &str) -> Value {
    let values: &[Value] = match args {
        [Value::List(list)] => list.as_slice(),
        [single] => return single.clone(),
        _ => args,
    };

    let Some(first) = values.first() else {
        return Value::error(EvalError::invalid_argument(format!(
            "{} requires at least one argument",
            name
        )));
    };
    if let Some(err) = values.iter().find(|v| v.is_error()) {
        return err.clone();
    }

    let mut best = first;
    for v in &values[1..] {
        match compare_numeric(v, best) {
            Some(ord) if ord == target => best = v,
            Some(_) => {}
            None if is_nan(best) => best = v,
            None if is_nan(v) => {}
            None => {
                return Value::error(EvalError::invalid_argument(format!(
                    "{}: incomparable types",
                    name
                )))
            }
        }
    }
    best.clone()
}

fn minmax_function(name: &'static str, id: &str, target: Ordering) -> Function {
    let public = if target == Ordering::Greater {
        "math.greatest"
    } else {
        "math.least"
    };
    let unary = move |args: &[Value]| pick_extreme(args, target, public);
    Function::new(name)
        .with_overload(Overload::function(format!("{}_dyn", id), &[Kind::Dyn], unary))
        .with_overload(Overload::function(
            format!("{}_dyn_dyn", id),
            &[Kind::Dyn, Kind::Dyn],
            unary,
        ))
}

fn add_bit_operations(funcs: &mut Vec<Function>) {
    funcs.push(bitwise("math.bitAnd", "math_bitand", |a, b| a & b));
    funcs.push(bitwise("math.bitOr", "math_bitor", |a, b| a | b));
    funcs.push(bitwise("math.bitXor", "math_bitxor", |a, b| a ^ b));

    funcs.push(
        Function::new("math.bitNot")
            .with_overload(Overload::function("math_bitnot_int", &[Kind::Int], |args| match args {
                [Value::Int(a)] => Value::Int(!a),
                _ => Value::error(EvalError::invalid_argument("expected int")),
            }))
            .with_overload(Overload::function("math_bitnot_uint", &[Kind::UInt], |args| {
                match args {
                    [Value::UInt(a)] => Value::UInt(!a),
                    _ => Value::error(EvalError::invalid_argument("expected uint")),
                }
            })),
    );

    funcs.push(shift("math.bitShiftLeft", "math_bitshiftleft", u64::wrapping_shl));
    funcs.push(shift("math.bitShiftRight", "math_bitshiftright", u64::wrapping_shr));
}

/// Same-kind bitwise operator over int pairs and uint pairs.
fn bitwise(name: &'static str, id: &str, op: fn(u64, u64) -> u64) -> Function {
    Function::new(name)
        .with_overload(Overload::function(
            format!("{}_int_int", id),
            &[Kind::Int, Kind::Int],
            move |args| match args {
                [Value::Int(a), Value::Int(b)] => Value::Int(op(*a as u64, *b as u64) as i64),
                _ => Value::error(EvalError::invalid_argument("expected int, int")),
            },
        ))
        .with_overload(Overload::function(
            format!("{}_uint_uint", id),
            &[Kind::UInt, Kind::UInt],
            move |args| match args {
                [Value::UInt(a), Value::UInt(b)] => Value::UInt(op(*a, *b)),
                _ => Value::error(EvalError::invalid_argument("expected uint, uint")),
            },
        ))
}

/// Shifts are logical for both ints and uints; shifting by 64 or more gives 0.
fn shift(name: &'static str, id: &str, op: fn(u64, u32) -> u64) -> Function {
    let apply = move |value: u64, amount: i64| -> Result<u64, EvalError> {
        match u32::try_from(amount) {
            Err(_) => Err(EvalError::invalid_argument(format!(
                "{}: negative shift amount",
                name
            ))),
            Ok(n) if n >= 64 => Ok(0),
            Ok(n) => Ok(op(value, n)),
        }
    };
    Function::new(name)
        .with_overload(Overload::function(
            format!("{}_int_int", id),
            &[Kind::Int, Kind::Int],
            move |args| match args {
                [Value::Int(a), Value::Int(b)] => apply(*a as u64, *b)
                    .map(|v| Value::Int(v as i64))
                    .unwrap_or_else(Value::error),
                _ => Value::error(EvalError::invalid_argument("expected int, int")),
            },
        ))
        .with_overload(Overload::function(
            format!("{}_uint_int", id),
            &[Kind::UInt, Kind::Int],
            move |args| match args {
                [Value::UInt(a), Value::Int(b)] => {
                    apply(*a, *b).map(Value::UInt).unwrap_or_else(Value::error)
                }
                _ => Value::error(EvalError::invalid_argument("expected uint, int")),
            },
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{EvalErrorKind, FunctionRegistry};

    fn registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        registry.register_all(math_functions());
        registry
    }

    fn call(name: &str, args: &[Value]) -> Value {
        registry().call(name, args, false)
    }

    #[test]
    fn test_all_functions_are_standalone() {
        for func in math_functions() {
            for overload in &func.overloads {
                assert!(
                    !overload.is_member,
                    "Expected {} to be standalone, but it's a member function",
                    overload.id
                );
            }
        }
    }

    #[test]
    fn test_rounding() {
        assert_eq!(call("math.ceil", &[Value::Double(1.5)]), Value::Double(2.0));
        assert_eq!(call("math.floor", &[Value::Double(1.5)]), Value::Double(1.0));
        assert_eq!(call("math.round", &[Value::Double(2.5)]), Value::Double(3.0));
        assert_eq!(call("math.round", &[Value::Double(-2.5)]), Value::Double(-3.0));
        assert_eq!(call("math.round", &[Value::Double(1.4)]), Value::Double(1.0));
        assert_eq!(call("math.trunc", &[Value::Double(-1.7)]), Value::Double(-1.0));
    }

    #[test]
    fn test_abs_overflow() {
        assert_eq!(call("math.abs", &[Value::Int(-5)]), Value::Int(5));
        match call("math.abs", &[Value::Int(i64::MIN)]) {
            Value::Error(e) => assert_eq!(e.kind, EvalErrorKind::Overflow),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_sign() {
        assert_eq!(call("math.sign", &[Value::Int(-9)]), Value::Int(-1));
        assert_eq!(call("math.sign", &[Value::UInt(0)]), Value::UInt(0));
        assert_eq!(call("math.sign", &[Value::Double(3.5)]), Value::Double(1.0));
    }

    #[test]
    fn test_greatest_and_least() {
        assert_eq!(
            call(operators::MATH_MAX, &[Value::list([1, 3, 2])]),
            Value::Int(3)
        );
        assert_eq!(
            call(operators::MATH_MIN, &[Value::UInt(5), Value::UInt(2)]),
            Value::UInt(2)
        );
        assert_eq!(call(operators::MATH_MAX, &[Value::Int(7)]), Value::Int(7));
    }

    #[test]
    fn test_greatest_mixed_types() {
        assert_eq!(
            call(operators::MATH_MAX, &[Value::Int(1), Value::UInt(5)]),
            Value::UInt(5)
        );
        assert_eq!(
            call(operators::MATH_MAX, &[Value::Int(-1), Value::Double(-0.5)]),
            Value::Double(-0.5)
        );
    }

    #[test]
    fn test_greatest_empty_list() {
        assert!(call(operators::MATH_MAX, &[Value::list(Vec::<Value>::new())]).is_error());
    }

    #[test]
    fn test_bit_operations() {
        assert_eq!(call("math.bitAnd", &[Value::Int(6), Value::Int(3)]), Value::Int(2));
        assert_eq!(call("math.bitOr", &[Value::UInt(4), Value::UInt(1)]), Value::UInt(5));
        assert_eq!(call("math.bitXor", &[Value::Int(5), Value::Int(1)]), Value::Int(4));
        assert_eq!(call("math.bitNot", &[Value::Int(0)]), Value::Int(-1));
        assert_eq!(
            call("math.bitShiftLeft", &[Value::Int(1), Value::Int(4)]),
            Value::Int(16)
        );
        assert_eq!(
            call("math.bitShiftRight", &[Value::Int(-1), Value::Int(63)]),
            Value::Int(1)
        );
        assert_eq!(
            call("math.bitShiftLeft", &[Value::UInt(1), Value::Int(64)]),
            Value::UInt(0)
        );
    }

    #[test]
    fn test_bitshift_negative() {
        assert!(call("math.bitShiftLeft", &[Value::Int(1), Value::Int(-1)]).is_error());
    }
}
