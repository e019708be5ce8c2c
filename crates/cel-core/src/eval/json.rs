//! Conversion between CEL values and JSON.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map as JsonMap, Number, Value as Json};

use super::list::ListValue;
use super::map::{MapKey, MapValue, MapValueBuilder};
use super::time::{format_duration, format_timestamp};
use super::{EvalError, OptionalValue, Value};

/// Largest integer a JSON number can carry without losing precision.
const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

impl Value {
    /// Convert to a JSON value.
    ///
    /// Integers outside the IEEE-754 safe range become strings, bytes are
    /// base64 encoded, and timestamps and durations use their text forms.
    pub fn to_json(&self) -> Result<Json, EvalError> {
        match self {
            Value::Null => Ok(Json::Null),
            Value::Bool(b) => Ok(Json::Bool(*b)),
            Value::Int(i) => {
                if (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(i) {
                    Ok(Json::from(*i))
                } else {
                    Ok(Json::String(i.to_string()))
                }
            }
            Value::UInt(u) => {
                if *u <= MAX_SAFE_INTEGER as u64 {
                    Ok(Json::from(*u))
                } else {
                    Ok(Json::String(u.to_string()))
                }
            }
            Value::Double(d) => match Number::from_f64(*d) {
                Some(n) => Ok(Json::Number(n)),
                None if d.is_nan() => Ok(Json::String("NaN".to_string())),
                None if *d > 0.0 => Ok(Json::String("Infinity".to_string())),
                None => Ok(Json::String("-Infinity".to_string())),
            },
            Value::String(s) => Ok(Json::String(s.to_cow().into_owned())),
            Value::Bytes(b) => Ok(Json::String(STANDARD.encode(b.to_cow()))),
            Value::Duration(d) => Ok(Json::String(format_duration(d))),
            Value::Timestamp(t) => Ok(Json::String(format_timestamp(t))),
            Value::List(l) => l.to_json(),
            Value::Map(m) => m.to_json(),
            Value::Struct(s) => {
                let mut object = JsonMap::new();
                for (name, value) in s.fields() {
                    object.insert(name.clone(), value.to_json()?);
                }
                Ok(Json::Object(object))
            }
            Value::Optional(OptionalValue::Some(v)) => v.to_json(),
            Value::Optional(OptionalValue::None) => Ok(Json::Null),
            Value::Error(e) => Err(e.as_ref().clone()),
            Value::Type(_) | Value::Unknown(_) => Err(EvalError::invalid_conversion(
                &self.type_name(),
                "JSON",
            )),
        }
    }

    /// Build a value from JSON. Numbers become doubles, as JSON has no integer type.
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::string(s.as_str()),
            Json::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            Json::Object(fields) => {
                let mut builder = MapValueBuilder::new();
                for (key, value) in fields {
                    // JSON object keys are unique strings, so this cannot fail.
                    let _ = builder.put(Value::string(key.as_str()), Value::from_json(value));
                }
                Value::Map(builder.build())
            }
        }
    }
}

impl ListValue {
    pub fn to_json(&self) -> Result<Json, EvalError> {
        self.iter()
            .map(Value::to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Json::Array)
    }
}

impl MapValue {
    /// Keys are rendered as strings.
    pub fn to_json(&self) -> Result<Json, EvalError> {
        let mut object = JsonMap::new();
        for (key, value) in self.iter() {
            let name = match key {
                MapKey::String(s) => s.to_cow().into_owned(),
                other => other.to_string(),
            };
            object.insert(name, value.to_json()?);
        }
        Ok(Json::Object(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(Value::Int(42).to_json().unwrap(), json!(42));
        assert_eq!(Value::Bool(true).to_json().unwrap(), json!(true));
        assert_eq!(Value::string("hi").to_json().unwrap(), json!("hi"));
        assert_eq!(Value::Null.to_json().unwrap(), json!(null));
    }

    #[test]
    fn test_large_integers_become_strings() {
        assert_eq!(
            Value::Int(MAX_SAFE_INTEGER).to_json().unwrap(),
            json!(9007199254740991_i64)
        );
        assert_eq!(
            Value::Int(MAX_SAFE_INTEGER + 1).to_json().unwrap(),
            json!("9007199254740992")
        );
        assert_eq!(
            Value::UInt(u64::MAX).to_json().unwrap(),
            json!("18446744073709551615")
        );
    }

    #[test]
    fn test_bytes_and_time() {
        assert_eq!(Value::bytes(&b"hello"[..]).to_json().unwrap(), json!("aGVsbG8="));
        assert_eq!(Value::duration(90, 0).to_json().unwrap(), json!("90s"));
        assert_eq!(
            Value::timestamp(0, 0).to_json().unwrap(),
            json!("1970-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_collections() {
        let value = Value::map([
            (Value::string("a"), Value::list([1, 2])),
            (Value::Int(3), Value::Bool(false)),
        ]);
        assert_eq!(value.to_json().unwrap(), json!({"a": [1, 2], "3": false}));
    }

    #[test]
    fn test_errors_do_not_convert() {
        assert!(Value::error(EvalError::internal("x")).to_json().is_err());
        assert!(Value::unknown("x").to_json().is_err());
    }

    #[test]
    fn test_from_json() {
        let value = Value::from_json(&json!({"a": [1, "b", null]}));
        assert_eq!(
            value,
            Value::map([(
                Value::string("a"),
                Value::list([Value::Double(1.0), Value::string("b"), Value::Null])
            )])
        );
    }
}
