//! String extension library for CEL.
//!
//! This module provides additional string manipulation functions beyond the
//! CEL standard library, matching the cel-go strings extension. Indexes and
//! offsets count code points, not bytes.
//!
//! # Functions
//!
//! - `charAt(index)` - Returns character at index as a string
//! - `indexOf(substring)` / `indexOf(substring, offset)` - Find first occurrence
//! - `lastIndexOf(substring)` / `lastIndexOf(substring, offset)` - Find last occurrence
//! - `lowerAscii()` / `upperAscii()` - Change the case of ASCII characters only
//! - `replace(old, new)` / `replace(old, new, count)` - Replace occurrences
//! - `split(separator)` / `split(separator, limit)` - Split string into list
//! - `substring(start)` / `substring(start, end)` - Extract substring
//! - `trim()` - Remove leading/trailing whitespace
//! - `reverse()` - Reverse the string by code point
//! - `join()` / `join(separator)` - Join list of strings (method on list<string>)
//! - `strings.quote(string)` - Quote a string with escapes

use std::borrow::Cow;

use crate::eval::{EvalError, Function, Kind, ListValue, Overload, Value};

/// Byte offset of code point `index`, allowing one past the end.
fn byte_offset(s: &str, index: usize) -> Option<usize> {
    s.char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(s.len()))
        .nth(index)
}

fn code_points_before(s: &str, byte: usize) -> i64 {
    s[..byte].chars().count() as i64
}

fn out_of_range(index: i64) -> Value {
    Value::error(EvalError::out_of_range(format!("index out of range: {}", index)))
}

/// Validates a code point position in `0..=len`.
fn position(s: &str, index: i64) -> Result<usize, Value> {
    usize::try_from(index)
        .ok()
        .and_then(|i| byte_offset(s, i))
        .ok_or_else(|| out_of_range(index))
}

fn string_method<F>(id: &'static str, kinds: &[Kind], f: F) -> Overload
where
    F: Fn(&str, &[Value]) -> Value + Send + Sync + 'static,
{
    Overload::method(id, kinds, move |args| match args.split_first() {
        Some((Value::String(s), rest)) => f(&s.to_cow(), rest),
        _ => Value::error(EvalError::invalid_argument("expected string receiver")),
    })
}

fn str_arg(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(s.to_cow()),
        _ => None,
    }
}

fn mismatch() -> Value {
    Value::error(EvalError::invalid_argument("unexpected argument types"))
}

/// Returns the strings extension library functions.
pub fn strings_functions() -> Vec<Function> {
    let mut funcs = Vec::new();

    funcs.push(Function::new("charAt").with_overload(string_method(
        "string_char_at_int",
        &[Kind::String, Kind::Int],
        |s, args| match args {
            [Value::Int(index)] => match position(s, *index) {
                Ok(start) => Value::string(
                    s[start..].chars().next().map(String::from).unwrap_or_default(),
                ),
                Err(err) => err,
            },
            _ => mismatch(),
        },
    )));

    funcs.push(
        Function::new("indexOf")
            .with_overload(string_method(
                "string_index_of_string",
                &[Kind::String, Kind::String],
                |s, args| match args {
                    [needle] => match str_arg(needle) {
                        Some(needle) => index_of(s, &needle, 0),
                        None => mismatch(),
                    },
                    _ => mismatch(),
                },
            ))
            .with_overload(string_method(
                "string_index_of_string_int",
                &[Kind::String, Kind::String, Kind::Int],
                |s, args| match args {
                    [needle, Value::Int(offset)] => match (str_arg(needle), position(s, *offset)) {
                        (Some(needle), Ok(start)) => index_of(s, &needle, start),
                        (_, Err(err)) => err,
                        _ => mismatch(),
                    },
                    _ => mismatch(),
                },
            )),
    );

    funcs.push(
        Function::new("lastIndexOf")
            .with_overload(string_method(
                "string_last_index_of_string",
                &[Kind::String, Kind::String],
                |s, args| match args {
                    [needle] => match str_arg(needle) {
                        Some(needle) => last_index_of(s, &needle, s.len()),
                        None => mismatch(),
                    },
                    _ => mismatch(),
                },
            ))
            .with_overload(string_method(
                "string_last_index_of_string_int",
                &[Kind::String, Kind::String, Kind::Int],
                |s, args| match args {
                    [needle, Value::Int(offset)] => match (str_arg(needle), position(s, *offset)) {
                        (Some(needle), Ok(start)) => last_index_of(s, &needle, start),
                        (_, Err(err)) => err,
                        _ => mismatch(),
                    },
                    _ => mismatch(),
                },
            )),
    );

    funcs.push(Function::new("lowerAscii").with_overload(string_method(
        "string_lower_ascii",
        &[Kind::String],
        |s, _| Value::string(s.to_ascii_lowercase()),
    )));
    funcs.push(Function::new("upperAscii").with_overload(string_method(
        "string_upper_ascii",
        &[Kind::String],
        |s, _| Value::string(s.to_ascii_uppercase()),
    )));

    funcs.push(
        Function::new("replace")
            .with_overload(string_method(
                "string_replace_string_string",
                &[Kind::String, Kind::String, Kind::String],
                |s, args| match args {
                    [old, new] => match (str_arg(old), str_arg(new)) {
                        (Some(old), Some(new)) => Value::string(s.replace(&*old, &new)),
                        _ => mismatch(),
                    },
                    _ => mismatch(),
                },
            ))
            .with_overload(string_method(
                "string_replace_string_string_int",
                &[Kind::String, Kind::String, Kind::String, Kind::Int],
                |s, args| match args {
                    [old, new, Value::Int(limit)] => match (str_arg(old), str_arg(new)) {
                        (Some(old), Some(new)) => match usize::try_from(*limit) {
                            Ok(n) => Value::string(s.replacen(&*old, &new, n)),
                            Err(_) => Value::string(s.replace(&*old, &new)),
                        },
                        _ => mismatch(),
                    },
                    _ => mismatch(),
                },
            )),
    );

    funcs.push(
        Function::new("split")
            .with_overload(string_method(
                "string_split_string",
                &[Kind::String, Kind::String],
                |s, args| match args {
                    [sep] => match str_arg(sep) {
                        Some(sep) => split(s, &sep, -1),
                        None => mismatch(),
                    },
                    _ => mismatch(),
                },
            ))
            .with_overload(string_method(
                "string_split_string_int",
                &[Kind::String, Kind::String, Kind::Int],
                |s, args| match args {
                    [sep, Value::Int(limit)] => match str_arg(sep) {
                        Some(sep) => split(s, &sep, *limit),
                        None => mismatch(),
                    },
                    _ => mismatch(),
                },
            )),
    );

    funcs.push(
        Function::new("substring")
            .with_overload(string_method(
                "string_substring_int",
                &[Kind::String, Kind::Int],
                |s, args| match args {
                    [Value::Int(start)] => match position(s, *start) {
                        Ok(start) => Value::string(&s[start..]),
                        Err(err) => err,
                    },
                    _ => mismatch(),
                },
            ))
            .with_overload(string_method(
                "string_substring_int_int",
                &[Kind::String, Kind::Int, Kind::Int],
                |s, args| match args {
                    [Value::Int(start), Value::Int(end)] if start > end => {
                        Value::error(EvalError::out_of_range(format!(
                            "invalid substring range. start: {}, end: {}",
                            start, end
                        )))
                    }
                    [Value::Int(start), Value::Int(end)] => {
                        match (position(s, *start), position(s, *end)) {
                            (Ok(a), Ok(b)) => Value::string(&s[a..b]),
                            (Err(err), _) | (_, Err(err)) => err,
                        }
                    }
                    _ => mismatch(),
                },
            )),
    );

    funcs.push(Function::new("trim").with_overload(string_method(
        "string_trim",
        &[Kind::String],
        |s, _| Value::string(s.trim()),
    )));

    funcs.push(Function::new("reverse").with_overload(string_method(
        "string_reverse",
        &[Kind::String],
        |s, _| Value::string(s.chars().rev().collect::<String>()),
    )));

    funcs.push(
        Function::new("join")
            .with_overload(Overload::method("list_join", &[Kind::List], |args| {
                match args {
                    [Value::List(list)] => join(list, ""),
                    _ => mismatch(),
                }
            }))
            .with_overload(Overload::method(
                "list_join_string",
                &[Kind::List, Kind::String],
                |args| match args {
                    [Value::List(list), Value::String(sep)] => join(list, &sep.to_cow()),
                    _ => mismatch(),
                },
            )),
    );

    funcs.push(Function::new("strings.quote").with_overload(Overload::function(
        "strings_quote",
        &[Kind::String],
        |args| match args {
            [Value::String(s)] => Value::string(quote(&s.to_cow())),
            _ => mismatch(),
        },
    )));

    funcs
}

fn index_of(s: &str, needle: &str, start: usize) -> Value {
    match s[start..].find(needle) {
        Some(found) => Value::Int(code_points_before(s, start + found)),
        None => Value::Int(-1),
    }
}

/// Last match beginning at or before byte offset `start`.
fn last_index_of(s: &str, needle: &str, start: usize) -> Value {
    if needle.is_empty() {
        return Value::Int(code_points_before(s, start));
    }
    let end = start.saturating_add(needle.len()).min(s.len());
    let end = (end..=s.len())
        .find(|i| s.is_char_boundary(*i))
        .unwrap_or(s.len());
    match s[..end].rfind(needle) {
        Some(found) => Value::Int(code_points_before(s, found)),
        None => Value::Int(-1),
    }
}

/// A negative limit splits everywhere; zero yields an empty list.
fn split(s: &str, sep: &str, limit: i64) -> Value {
    let parts: ListValue = match usize::try_from(limit) {
        Ok(0) => ListValue::default(),
        Ok(n) => s.splitn(n, sep).map(Value::string).collect(),
        Err(_) => s.split(sep).map(Value::string).collect(),
    };
    Value::List(parts)
}

fn join(list: &ListValue, sep: &str) -> Value {
    let mut parts = Vec::with_capacity(list.size());
    for value in list {
        match value {
            Value::String(s) => parts.push(s.to_cow()),
            other => {
                return Value::error(EvalError::invalid_argument(format!(
                    "join: list element is {}, not string",
                    other.type_name()
                )))
            }
        }
    }
    Value::string(parts.join(sep))
}

fn quote(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('"');
    for c in s.chars() {
        match c {
            '\x07' => result.push_str("\\a"),
            '\x08' => result.push_str("\\b"),
            '\x0C' => result.push_str("\\f"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\x0B' => result.push_str("\\v"),
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            _ => result.push(c),
        }
    }
    result.push('"');
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: &[Value]) -> Value {
        let mut registry = crate::eval::FunctionRegistry::new();
        registry.register_all(strings_functions());
        let is_member = !name.contains('.');
        registry.call(name, args, is_member)
    }

    fn s(v: &str) -> Value {
        Value::string(v)
    }

    #[test]
    fn test_char_at() {
        assert_eq!(call("charAt", &[s("héllo"), Value::Int(1)]), s("é"));
        assert_eq!(call("charAt", &[s("abc"), Value::Int(3)]), s(""));
        assert!(call("charAt", &[s("abc"), Value::Int(4)]).is_error());
        assert!(call("charAt", &[s("abc"), Value::Int(-1)]).is_error());
    }

    #[test]
    fn test_index_of() {
        assert_eq!(call("indexOf", &[s("hello mellow"), s("ello")]), Value::Int(1));
        assert_eq!(
            call("indexOf", &[s("hello mellow"), s("ello"), Value::Int(2)]),
            Value::Int(7)
        );
        assert_eq!(call("indexOf", &[s("hello"), s("")]), Value::Int(0));
        assert_eq!(call("indexOf", &[s("hello"), s("z")]), Value::Int(-1));
        assert_eq!(call("indexOf", &[s("ça va"), s("va")]), Value::Int(3));
        assert!(call("indexOf", &[s("abc"), s("a"), Value::Int(9)]).is_error());
    }

    #[test]
    fn test_last_index_of() {
        assert_eq!(call("lastIndexOf", &[s("hello mellow"), s("ello")]), Value::Int(7));
        assert_eq!(
            call("lastIndexOf", &[s("hello mellow"), s("ello"), Value::Int(6)]),
            Value::Int(1)
        );
        assert_eq!(call("lastIndexOf", &[s("abc"), s("")]), Value::Int(3));
    }

    #[test]
    fn test_case_and_trim() {
        assert_eq!(call("lowerAscii", &[s("TacoCÆt")]), s("tacocÆt"));
        assert_eq!(call("upperAscii", &[s("tacocat")]), s("TACOCAT"));
        assert_eq!(call("trim", &[s("  \ttrim\n ")]), s("trim"));
        assert_eq!(call("reverse", &[s("gums")]), s("smug"));
    }

    #[test]
    fn test_replace_and_split() {
        assert_eq!(call("replace", &[s("aaa"), s("a"), s("b")]), s("bbb"));
        assert_eq!(
            call("replace", &[s("aaa"), s("a"), s("b"), Value::Int(2)]),
            s("bba")
        );
        assert_eq!(
            call("split", &[s("a,b,c"), s(",")]),
            Value::list(["a", "b", "c"])
        );
        assert_eq!(
            call("split", &[s("a,b,c"), s(","), Value::Int(2)]),
            Value::list(["a", "b,c"])
        );
        assert_eq!(
            call("split", &[s("a,b,c"), s(","), Value::Int(0)]),
            Value::list(Vec::<Value>::new())
        );
    }

    #[test]
    fn test_substring() {
        assert_eq!(call("substring", &[s("tacocat"), Value::Int(4)]), s("cat"));
        assert_eq!(
            call("substring", &[s("tacocat"), Value::Int(0), Value::Int(4)]),
            s("taco")
        );
        assert!(call("substring", &[s("tacocat"), Value::Int(4), Value::Int(2)]).is_error());
        assert!(call("substring", &[s("tacocat"), Value::Int(40)]).is_error());
    }

    #[test]
    fn test_join_and_quote() {
        assert_eq!(call("join", &[Value::list(["a", "b"])]), s("ab"));
        assert_eq!(call("join", &[Value::list(["a", "b"]), s("-")]), s("a-b"));
        assert!(call("join", &[Value::list([1])]).is_error());
        assert_eq!(call("strings.quote", &[s("a\"b\n")]), s("\"a\\\"b\\n\""));
    }
}
