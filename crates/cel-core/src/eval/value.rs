//! Runtime values for CEL evaluation.
//!
//! `Value` represents all CEL values at runtime, including primitive types,
//! collections, timestamps, durations, and special values like errors,
//! unknowns and optionals.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::bytes::{BytesValue, StringValue};
use super::list::{ListValue, ListValueBuilder};
use super::map::{MapValue, MapValueBuilder};
use super::time::{format_duration, format_timestamp};
use super::EvalError;

/// A CEL runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// Unsigned 64-bit integer.
    UInt(u64),
    /// 64-bit floating point.
    Double(f64),
    /// Unicode string, flat or rope.
    String(StringValue),
    /// Byte sequence, flat or rope.
    Bytes(BytesValue),
    /// Duration (seconds and nanos).
    Duration(Duration),
    /// Timestamp (seconds and nanos since Unix epoch).
    Timestamp(Timestamp),
    List(ListValue),
    Map(MapValue),
    /// Record built by a message literal.
    Struct(StructValue),
    /// Optional value (present or absent).
    Optional(OptionalValue),
    /// Type value (represents a CEL type at runtime).
    Type(TypeValue),
    /// Error value (evaluation errors propagate as values).
    Error(Arc<EvalError>),
    /// Result that depends on attributes marked unknown in the activation.
    Unknown(UnknownSet),
}

/// Coarse runtime type tag, used for overload dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Bool,
    Int,
    UInt,
    Double,
    String,
    Bytes,
    Duration,
    Timestamp,
    List,
    Map,
    Struct,
    Optional,
    Type,
    Error,
    Unknown,
    /// Matches any kind in an overload signature.
    Dyn,
}

impl Kind {
    /// Whether a value of kind `actual` satisfies this parameter kind.
    pub fn accepts(self, actual: Kind) -> bool {
        self == Kind::Dyn || self == actual
    }
}

/// Smallest valid timestamp second: 0001-01-01T00:00:00Z.
pub const MIN_TIMESTAMP_SECONDS: i64 = -62_135_596_800;
/// Largest valid timestamp second: 9999-12-31T23:59:59Z.
pub const MAX_TIMESTAMP_SECONDS: i64 = 253_402_300_799;
/// Durations are limited to roughly 10000 years either way.
pub const MAX_DURATION_SECONDS: i64 = 315_576_000_000;

/// A CEL timestamp value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    /// Seconds since Unix epoch.
    pub seconds: i64,
    /// Nanoseconds (0..999_999_999).
    pub nanos: i32,
}

impl Timestamp {
    /// Create a new timestamp.
    pub fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }

    /// Create a timestamp from seconds since Unix epoch.
    pub fn from_seconds(seconds: i64) -> Self {
        Self { seconds, nanos: 0 }
    }

    /// Within years 0001 to 9999 with normalized nanos.
    pub fn is_valid(&self) -> bool {
        (MIN_TIMESTAMP_SECONDS..=MAX_TIMESTAMP_SECONDS).contains(&self.seconds)
            && (0..1_000_000_000).contains(&self.nanos)
    }

    pub fn to_datetime_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, u32::try_from(self.nanos).ok()?)
    }

    /// Returns true if this timestamp is before another.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self < other
    }

    /// Returns true if this timestamp is after another.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        self > other
    }
}

/// A CEL duration value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    /// Seconds component.
    pub seconds: i64,
    /// Nanoseconds component, with the same sign as `seconds`.
    pub nanos: i32,
}

impl Duration {
    /// Create a new duration.
    pub fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }

    /// Create a duration from seconds.
    pub fn from_seconds(seconds: i64) -> Self {
        Self { seconds, nanos: 0 }
    }

    /// Create a duration from nanoseconds.
    pub fn from_nanos(nanos: i128) -> Self {
        let seconds = (nanos / 1_000_000_000) as i64;
        let nanos = (nanos % 1_000_000_000) as i32;
        Self { seconds, nanos }
    }

    /// Convert to total nanoseconds.
    pub fn to_nanos(&self) -> i128 {
        self.seconds as i128 * 1_000_000_000 + self.nanos as i128
    }

    pub fn is_valid(&self) -> bool {
        self.seconds.abs() <= MAX_DURATION_SECONDS
    }

    /// Returns true if this duration is negative.
    pub fn is_negative(&self) -> bool {
        self.seconds < 0 || (self.seconds == 0 && self.nanos < 0)
    }

    pub fn get_hours(&self) -> i64 {
        self.seconds / 3600
    }

    pub fn get_minutes(&self) -> i64 {
        self.seconds / 60
    }

    pub fn get_milliseconds(&self) -> i64 {
        (self.nanos / 1_000_000) as i64
    }
}

/// A CEL type value (runtime representation of types).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeValue {
    /// The type name as it appears in CEL.
    pub name: Arc<str>,
}

impl TypeValue {
    /// Create a new type value.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn null_type() -> Self {
        Self::new("null_type")
    }
    pub fn bool_type() -> Self {
        Self::new("bool")
    }
    pub fn int_type() -> Self {
        Self::new("int")
    }
    pub fn uint_type() -> Self {
        Self::new("uint")
    }
    pub fn double_type() -> Self {
        Self::new("double")
    }
    pub fn string_type() -> Self {
        Self::new("string")
    }
    pub fn bytes_type() -> Self {
        Self::new("bytes")
    }
    pub fn list_type() -> Self {
        Self::new("list")
    }
    pub fn map_type() -> Self {
        Self::new("map")
    }
    pub fn timestamp_type() -> Self {
        Self::new("google.protobuf.Timestamp")
    }
    pub fn duration_type() -> Self {
        Self::new("google.protobuf.Duration")
    }
    pub fn type_type() -> Self {
        Self::new("type")
    }

    /// Built-in type denoted by an identifier such as `int` or `list`.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let value = match name {
            "null_type" => Self::null_type(),
            "bool" => Self::bool_type(),
            "int" => Self::int_type(),
            "uint" => Self::uint_type(),
            "double" => Self::double_type(),
            "string" => Self::string_type(),
            "bytes" => Self::bytes_type(),
            "list" => Self::list_type(),
            "map" => Self::map_type(),
            "type" => Self::type_type(),
            "optional_type" => Self::new("optional_type"),
            "google.protobuf.Timestamp" => Self::timestamp_type(),
            "google.protobuf.Duration" => Self::duration_type(),
            _ => return None,
        };
        Some(value)
    }
}

/// A CEL optional value.
#[derive(Debug, Clone)]
pub enum OptionalValue {
    /// An absent optional value.
    None,
    /// A present optional value.
    Some(Box<Value>),
}

impl OptionalValue {
    /// Create an absent optional.
    pub fn none() -> Self {
        OptionalValue::None
    }

    /// Create a present optional.
    pub fn some(value: Value) -> Self {
        OptionalValue::Some(Box::new(value))
    }

    /// Returns true if the optional is present.
    pub fn is_present(&self) -> bool {
        matches!(self, OptionalValue::Some(_))
    }

    /// Get the inner value, or None if absent.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            OptionalValue::None => None,
            OptionalValue::Some(v) => Some(v),
        }
    }

    /// Unwrap the value or return a default.
    pub fn unwrap_or(self, default: Value) -> Value {
        match self {
            OptionalValue::None => default,
            OptionalValue::Some(v) => *v,
        }
    }
}

/// A generic record produced by a message literal `pkg.Type{field: value}`.
///
/// Fields keep their names sorted so equality and display are stable.
#[derive(Debug, Clone)]
pub struct StructValue {
    type_name: Arc<str>,
    fields: Arc<BTreeMap<String, Value>>,
}

impl StructValue {
    pub fn new(type_name: impl Into<Arc<str>>, fields: BTreeMap<String, Value>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Arc::new(fields),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// The set of unknown attributes a result depends on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnknownSet {
    attributes: Arc<BTreeSet<String>>,
}

impl UnknownSet {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attributes: Arc::new(BTreeSet::from([attribute.into()])),
        }
    }

    /// Union of two sets.
    pub fn merge(&self, other: &UnknownSet) -> UnknownSet {
        if other.attributes.is_subset(&self.attributes) {
            return self.clone();
        }
        let mut attributes = (*self.attributes).clone();
        attributes.extend(other.attributes.iter().cloned());
        Self {
            attributes: Arc::new(attributes),
        }
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(String::as_str)
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.attributes.contains(attribute)
    }
}

// ==================== Value Constructors ====================

impl Value {
    /// Create a string value.
    pub fn string(s: impl Into<StringValue>) -> Self {
        Value::String(s.into())
    }

    /// Create a bytes value.
    pub fn bytes(b: impl Into<BytesValue>) -> Self {
        Value::Bytes(b.into())
    }

    /// Create a list value from anything convertible to values.
    pub fn list<T: Into<Value>>(elements: impl IntoIterator<Item = T>) -> Self {
        let mut builder = ListValueBuilder::new();
        for element in elements {
            builder.add(element.into());
        }
        Value::List(builder.build())
    }

    /// Create a map value. Invalid or duplicate keys produce an error value.
    pub fn map<K: Into<Value>, V: Into<Value>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        let mut builder = MapValueBuilder::new();
        for (key, value) in entries {
            if let Err(err) = builder.put(key.into(), value.into()) {
                return Value::error(err);
            }
        }
        Value::Map(builder.build())
    }

    /// Create a timestamp value.
    pub fn timestamp(seconds: i64, nanos: i32) -> Self {
        Value::Timestamp(Timestamp::new(seconds, nanos))
    }

    /// Create a duration value.
    pub fn duration(seconds: i64, nanos: i32) -> Self {
        Value::Duration(Duration::new(seconds, nanos))
    }

    /// Create a type value.
    pub fn new_type(name: impl Into<Arc<str>>) -> Self {
        Value::Type(TypeValue::new(name))
    }

    /// Create an optional none value.
    pub fn optional_none() -> Self {
        Value::Optional(OptionalValue::None)
    }

    /// Create an optional some value.
    pub fn optional_some(value: Value) -> Self {
        Value::Optional(OptionalValue::some(value))
    }

    /// Create an error value.
    pub fn error(err: impl Into<EvalError>) -> Self {
        Value::Error(Arc::new(err.into()))
    }

    /// Create an unknown value for one attribute.
    pub fn unknown(attribute: impl Into<String>) -> Self {
        Value::Unknown(UnknownSet::new(attribute))
    }
}

// ==================== Type Information ====================

impl Value {
    /// The dispatch kind of this value.
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::UInt(_) => Kind::UInt,
            Value::Double(_) => Kind::Double,
            Value::String(_) => Kind::String,
            Value::Bytes(_) => Kind::Bytes,
            Value::Duration(_) => Kind::Duration,
            Value::Timestamp(_) => Kind::Timestamp,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Map,
            Value::Struct(_) => Kind::Struct,
            Value::Optional(_) => Kind::Optional,
            Value::Type(_) => Kind::Type,
            Value::Error(_) => Kind::Error,
            Value::Unknown(_) => Kind::Unknown,
        }
    }

    /// Get the CEL type value for this value (for the `type()` function).
    pub fn type_value(&self) -> TypeValue {
        match self {
            Value::Null => TypeValue::null_type(),
            Value::Bool(_) => TypeValue::bool_type(),
            Value::Int(_) => TypeValue::int_type(),
            Value::UInt(_) => TypeValue::uint_type(),
            Value::Double(_) => TypeValue::double_type(),
            Value::String(_) => TypeValue::string_type(),
            Value::Bytes(_) => TypeValue::bytes_type(),
            Value::List(_) => TypeValue::list_type(),
            Value::Map(_) => TypeValue::map_type(),
            Value::Timestamp(_) => TypeValue::timestamp_type(),
            Value::Duration(_) => TypeValue::duration_type(),
            Value::Struct(s) => TypeValue::new(s.type_name()),
            Value::Type(_) => TypeValue::type_type(),
            Value::Optional(_) => TypeValue::new("optional_type"),
            Value::Error(_) => TypeValue::new("error"),
            Value::Unknown(_) => TypeValue::new("unknown"),
        }
    }

    /// Name of this value's type, for error messages.
    pub fn type_name(&self) -> Arc<str> {
        self.type_value().name
    }

    /// Check if this value is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown(_))
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The zero value of its type (`0`, `""`, `[]`, ...).
    pub fn is_zero_value(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::UInt(u) => *u == 0,
            Value::Double(d) => *d == 0.0,
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::List(l) => l.is_empty(),
            Value::Map(m) => m.is_empty(),
            Value::Struct(s) => s.is_empty(),
            Value::Duration(d) => d.seconds == 0 && d.nanos == 0,
            Value::Timestamp(t) => t.seconds == 0 && t.nanos == 0,
            Value::Optional(o) => !o.is_present(),
            Value::Type(_) | Value::Error(_) | Value::Unknown(_) => false,
        }
    }
}

// ==================== Value Conversions ====================

impl Value {
    /// Try to convert to bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to convert to i64.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to convert to u64.
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(u) => Some(*u),
            _ => None,
        }
    }

    /// Try to convert to f64.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&StringValue> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&BytesValue> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListValue> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Try to convert to timestamp.
    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Try to convert to duration.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Value::Duration(d) => Some(*d),
            _ => None,
        }
    }

    /// Try to convert to optional.
    pub fn as_optional(&self) -> Option<&OptionalValue> {
        match self {
            Value::Optional(o) => Some(o),
            _ => None,
        }
    }

    /// Try to get the error.
    pub fn as_error(&self) -> Option<&EvalError> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty => $variant:ident as $target:ty),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v as $target)
                }
            }
        )*
    };
}

impl_from_int!(
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => UInt as u64,
    u16 => UInt as u64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    usize => UInt as u64,
);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Double(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(StringValue::new(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v.into())
    }
}

impl From<StringValue> for Value {
    fn from(v: StringValue) -> Self {
        Value::String(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.into())
    }
}

impl From<BytesValue> for Value {
    fn from(v: BytesValue) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => Value::optional_some(inner.into()),
            None => Value::optional_none(),
        }
    }
}

impl From<ListValue> for Value {
    fn from(v: ListValue) -> Self {
        Value::List(v)
    }
}

impl From<MapValue> for Value {
    fn from(v: MapValue) -> Self {
        Value::Map(v)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

impl From<EvalError> for Value {
    fn from(v: EvalError) -> Self {
        Value::error(v)
    }
}

// ==================== Equality ====================

impl PartialEq for Value {
    /// CEL equality: numbers compare across int, uint and double; errors and
    /// unknowns are never equal to anything.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => {
                a.type_name == b.type_name && a.fields == b.fields
            }
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Optional(a), Value::Optional(b)) => match (a, b) {
                (OptionalValue::None, OptionalValue::None) => true,
                (OptionalValue::Some(va), OptionalValue::Some(vb)) => va == vb,
                _ => false,
            },
            (Value::Error(_), _) | (_, Value::Error(_)) => false,
            (Value::Unknown(_), _) | (_, Value::Unknown(_)) => false,
            _ => compare_numeric(self, other) == Some(Ordering::Equal),
        }
    }
}

/// Ordering between two numeric values of any numeric kind.
pub(crate) fn compare_numeric(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::UInt(x), Value::UInt(y)) => Some(x.cmp(y)),
        (Value::Double(x), Value::Double(y)) => x.partial_cmp(y),
        (Value::Int(x), Value::UInt(y)) => {
            if *x < 0 {
                Some(Ordering::Less)
            } else {
                (*x as u64).partial_cmp(y)
            }
        }
        (Value::UInt(x), Value::Int(y)) => {
            if *y < 0 {
                Some(Ordering::Greater)
            } else {
                x.partial_cmp(&(*y as u64))
            }
        }
        (Value::Int(x), Value::Double(y)) => compare_int_double(*x as i128, *y),
        (Value::Double(x), Value::Int(y)) => {
            compare_int_double(*y as i128, *x).map(Ordering::reverse)
        }
        (Value::UInt(x), Value::Double(y)) => compare_int_double(*x as i128, *y),
        (Value::Double(x), Value::UInt(y)) => {
            compare_int_double(*y as i128, *x).map(Ordering::reverse)
        }
        _ => None,
    }
}

fn compare_int_double(i: i128, d: f64) -> Option<Ordering> {
    if d.is_nan() {
        return None;
    }
    if d >= 1.8446744073709552e19 {
        return Some(Ordering::Less);
    }
    if d < -9.223372036854775808e18 {
        return Some(Ordering::Greater);
    }
    let whole = d.trunc();
    match i.cmp(&(whole as i128)) {
        Ordering::Equal if d > whole => Some(Ordering::Less),
        Ordering::Equal if d < whole => Some(Ordering::Greater),
        other => Some(other),
    }
}

// ==================== Comparison ====================

impl Value {
    /// Compare two values, returning an ordering if comparable.
    ///
    /// CEL supports comparison between values of the same type,
    /// and between numeric types (int, uint, double).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
            _ => compare_numeric(self, other),
        }
    }
}

// ==================== Display ====================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}u", v),
            Value::Double(v) => write!(f, "{}", format_double(*v)),
            Value::String(v) => write!(f, "{:?}", v.to_cow()),
            Value::Bytes(v) => write!(f, "b\"{}\"", String::from_utf8_lossy(&v.to_cow())),
            Value::List(v) => {
                write!(f, "[")?;
                for (i, elem) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (key, value)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key.to_value(), value)?;
                }
                write!(f, "}}")
            }
            Value::Struct(s) => {
                write!(f, "{}{{", s.type_name())?;
                for (i, (name, value)) in s.fields().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
            Value::Timestamp(t) => write!(f, "timestamp(\"{}\")", format_timestamp(t)),
            Value::Duration(d) => write!(f, "duration(\"{}\")", format_duration(d)),
            Value::Type(t) => write!(f, "{}", t.name),
            Value::Optional(o) => match o {
                OptionalValue::None => write!(f, "optional.none()"),
                OptionalValue::Some(v) => write!(f, "optional.of({})", v),
            },
            Value::Error(e) => write!(f, "error({})", e),
            Value::Unknown(u) => {
                write!(f, "unknown(")?;
                for (i, attr) in u.attributes().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", attr)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Format a double value according to CEL conventions.
pub(crate) fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d.is_sign_positive() {
            "+infinity".to_string()
        } else {
            "-infinity".to_string()
        }
    } else if d.fract() == 0.0 && d.abs() < 1e15 {
        format!("{:.1}", d)
    } else {
        d.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::Int(42), Value::Int(42));
        assert_ne!(Value::Int(42), Value::Int(43));
        assert_eq!(Value::string("hello"), Value::string("hello"));
    }

    #[test]
    fn test_heterogeneous_numeric_equality() {
        assert_eq!(Value::Int(42), Value::UInt(42));
        assert_eq!(Value::Int(1), Value::Double(1.0));
        assert_ne!(Value::Int(1), Value::Double(1.5));
        assert_ne!(Value::Int(-1), Value::UInt(u64::MAX));
        assert_ne!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::Int(1), Value::string("1"));
    }

    #[test]
    fn test_errors_are_never_equal() {
        let err = Value::error(EvalError::internal("x"));
        assert_ne!(err.clone(), err);
    }

    #[test]
    fn test_value_comparison() {
        assert_eq!(Value::Int(1).compare(&Value::Int(2)), Some(Ordering::Less));
        assert_eq!(
            Value::Int(2).compare(&Value::Int(1)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Int(1).compare(&Value::Int(1)), Some(Ordering::Equal));

        // Cross-numeric comparison
        assert_eq!(Value::Int(-1).compare(&Value::UInt(1)), Some(Ordering::Less));
        assert_eq!(
            Value::Int(1).compare(&Value::Double(1.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Double(1.5).compare(&Value::Int(1)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Int(1).compare(&Value::string("a")), None);
    }

    #[test]
    fn test_optional_value() {
        let none = OptionalValue::none();
        assert!(!none.is_present());
        assert!(none.as_value().is_none());

        let some = OptionalValue::some(Value::Int(42));
        assert!(some.is_present());
        assert_eq!(some.as_value(), Some(&Value::Int(42)));
    }

    #[test]
    fn test_timestamp_comparison() {
        let t1 = Timestamp::new(100, 0);
        let t2 = Timestamp::new(200, 0);
        let t3 = Timestamp::new(100, 500);

        assert!(t1.is_before(&t2));
        assert!(t2.is_after(&t1));
        assert!(t1.is_before(&t3));
    }

    #[test]
    fn test_timestamp_range() {
        assert!(Timestamp::from_seconds(MAX_TIMESTAMP_SECONDS).is_valid());
        assert!(!Timestamp::from_seconds(MAX_TIMESTAMP_SECONDS + 1).is_valid());
    }

    #[test]
    fn test_duration_nanos() {
        let d = Duration::from_nanos(1_500_000_000);
        assert_eq!(d.seconds, 1);
        assert_eq!(d.nanos, 500_000_000);
        assert_eq!(d.to_nanos(), 1_500_000_000);
    }

    #[test]
    fn test_kind_and_type() {
        assert_eq!(Value::Int(42).kind(), Kind::Int);
        assert_eq!(Value::list([1, 2]).kind(), Kind::List);
        assert_eq!(Value::string("a").type_value(), TypeValue::string_type());
        assert!(Kind::Dyn.accepts(Kind::Map));
        assert!(!Kind::Int.accepts(Kind::UInt));
    }

    #[test]
    fn test_unknown_merge() {
        let a = UnknownSet::new("x");
        let b = UnknownSet::new("y");
        let merged = a.merge(&b);
        assert_eq!(merged.attributes().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(merged.merge(&a), merged);
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(5), Value::Int(5));
        assert!(matches!(Value::from(5usize), Value::UInt(5)));
        assert_eq!(Value::from(Some(1)), Value::optional_some(Value::Int(1)));
        assert_eq!(Value::from(vec!["a"]), Value::list(["a"]));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Value::Null), "null");
        assert_eq!(format!("{}", Value::Int(42)), "42");
        assert_eq!(format!("{}", Value::UInt(42)), "42u");
        assert_eq!(format!("{}", Value::Double(2.0)), "2.0");
        assert_eq!(format!("{}", Value::string("hello")), "\"hello\"");
        assert_eq!(format!("{}", Value::Bool(true)), "true");
        assert_eq!(format!("{}", Value::list([1, 2])), "[1, 2]");
    }
}
