//! Optionals extension library for CEL.
//!
//! # Functions
//!
//! - `optional.of(T) -> optional<T>` - Wrap a value in an optional
//! - `optional.none() -> optional<dyn>` - Create an empty optional
//! - `optional.ofNonZeroValue(T) -> optional<T>` - Wrap if non-zero
//!
//! # Methods
//!
//! - `.hasValue() -> bool` - Check if optional has a value
//! - `.value() -> T` - Get the value (errors if absent)
//! - `.or(optional<T>) -> optional<T>` - Return first present optional
//! - `.orValue(T) -> T` - Return value or default
//!
//! The evaluator short-circuits `or` and `orValue` on a present receiver, so
//! the alternative is only evaluated when needed.

use crate::eval::{EvalError, Function, Kind, OptionalValue, Overload, Value};

/// Returns the optionals extension library functions.
pub fn optionals_functions() -> Vec<Function> {
    vec![
        Function::new("optional.of").with_overload(Overload::function(
            "optional_of",
            &[Kind::Dyn],
            |args| match args {
                [value] => Value::optional_some(value.clone()),
                _ => Value::error(EvalError::invalid_argument("expected one argument")),
            },
        )),
        Function::new("optional.none").with_overload(Overload::function(
            "optional_none",
            &[],
            |_| Value::optional_none(),
        )),
        Function::new("optional.ofNonZeroValue").with_overload(Overload::function(
            "optional_ofNonZeroValue",
            &[Kind::Dyn],
            |args| match args {
                [value] if value.is_zero_value() => Value::optional_none(),
                [value] => Value::optional_some(value.clone()),
                _ => Value::error(EvalError::invalid_argument("expected one argument")),
            },
        )),
        Function::new("hasValue").with_overload(Overload::method(
            "optional_hasValue",
            &[Kind::Optional],
            |args| match args {
                [Value::Optional(opt)] => Value::Bool(opt.is_present()),
                _ => Value::error(EvalError::invalid_argument("expected optional")),
            },
        )),
        Function::new("value").with_overload(Overload::method(
            "optional_value",
            &[Kind::Optional],
            |args| match args {
                [Value::Optional(OptionalValue::Some(value))] => value.as_ref().clone(),
                [Value::Optional(OptionalValue::None)] => Value::error(
                    EvalError::failed_precondition("optional.none() dereference"),
                ),
                _ => Value::error(EvalError::invalid_argument("expected optional")),
            },
        )),
        Function::new("or").with_overload(Overload::method(
            "optional_or_optional",
            &[Kind::Optional, Kind::Optional],
            |args| match args {
                [Value::Optional(OptionalValue::Some(_)), _] => args[0].clone(),
                [Value::Optional(OptionalValue::None), alternative @ Value::Optional(_)] => {
                    alternative.clone()
                }
                _ => Value::error(EvalError::invalid_argument("expected optional, optional")),
            },
        )),
        Function::new("orValue").with_overload(Overload::method(
            "optional_orValue_value",
            &[Kind::Optional, Kind::Dyn],
            |args| match args {
                [Value::Optional(opt), alternative] => opt.clone().unwrap_or(alternative.clone()),
                _ => Value::error(EvalError::invalid_argument("expected optional, value")),
            },
        )),
    ]
}
