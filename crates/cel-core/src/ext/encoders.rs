//! Encoders extension library for CEL.
//!
//! - `base64.encode(bytes) -> string` - Encodes bytes to a base64 string
//! - `base64.decode(string) -> bytes` - Decodes a base64 string, padded or not

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine as _;

use crate::eval::{EvalError, Function, Kind, Overload, Value};

/// Returns the encoders extension library functions.
pub fn encoders_functions() -> Vec<Function> {
    vec![
        Function::new("base64.encode").with_overload(Overload::function(
            "base64_encode_bytes",
            &[Kind::Bytes],
            |args| match args {
                [Value::Bytes(b)] => Value::string(STANDARD.encode(b.to_cow())),
                _ => Value::error(EvalError::invalid_argument("expected bytes")),
            },
        )),
        Function::new("base64.decode").with_overload(Overload::function(
            "base64_decode_string",
            &[Kind::String],
            |args| match args {
                [Value::String(s)] => decode(&s.to_cow()),
                _ => Value::error(EvalError::invalid_argument("expected string")),
            },
        )),
    ]
}

fn decode(s: &str) -> Value {
    let decoded = if s.ends_with('=') {
        STANDARD.decode(s)
    } else {
        STANDARD_NO_PAD.decode(s)
    };
    match decoded {
        Ok(bytes) => Value::bytes(bytes),
        Err(err) => Value::error(EvalError::invalid_argument(format!(
            "base64.decode: {}",
            err
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arg: Value) -> Value {
        let mut registry = crate::eval::FunctionRegistry::new();
        registry.register_all(encoders_functions());
        registry.call(name, &[arg], false)
    }

    #[test]
    fn test_base64_encode() {
        assert_eq!(
            call("base64.encode", Value::bytes(&b"hello"[..])),
            Value::string("aGVsbG8=")
        );
    }

    #[test]
    fn test_base64_decode() {
        assert_eq!(
            call("base64.decode", Value::string("aGVsbG8=")),
            Value::bytes(&b"hello"[..])
        );
        assert_eq!(
            call("base64.decode", Value::string("aGVsbG8")),
            Value::bytes(&b"hello"[..])
        );
        assert!(call("base64.decode", Value::string("!!")).is_error());
    }
}
