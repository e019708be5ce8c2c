//! Evaluation error types.

use std::fmt;

/// An error that occurred during CEL evaluation.
///
/// Errors are values in CEL: they travel through evaluation inside
/// [`Value::Error`](super::Value::Error) until something absorbs them
/// (`false && err`) or they reach the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError {
    /// The error message.
    pub message: String,
    /// The kind of error.
    pub kind: EvalErrorKind,
}

/// The kind of evaluation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvalErrorKind {
    /// An argument had an acceptable type but an unacceptable value.
    InvalidArgument,
    /// Key or field not present.
    NotFound,
    /// Index or value outside the permitted range.
    OutOfRange,
    /// The operation is not valid in the current state (e.g. an exhausted iterator).
    FailedPrecondition,
    /// Division by zero.
    DivisionByZero,
    /// Modulo by zero.
    ModuloByZero,
    /// Integer overflow.
    Overflow,
    /// Type mismatch at runtime.
    TypeMismatch,
    /// Unknown identifier (variable not found).
    UnknownIdentifier,
    /// Unknown function.
    UnknownFunction,
    /// No matching overload found.
    NoMatchingOverload,
    /// Invalid conversion.
    InvalidConversion,
    /// Internal error (unexpected state).
    Internal,
}

impl EvalError {
    /// Create a new error with the given kind and message.
    pub fn new(kind: EvalErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::NotFound, message)
    }

    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::OutOfRange, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::FailedPrecondition, message)
    }

    /// Create a division by zero error.
    pub fn division_by_zero() -> Self {
        Self::new(EvalErrorKind::DivisionByZero, "division by zero")
    }

    /// Create a modulo by zero error.
    pub fn modulo_by_zero() -> Self {
        Self::new(EvalErrorKind::ModuloByZero, "modulus by zero")
    }

    /// Create an overflow error.
    pub fn overflow(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Overflow, message)
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: &str, actual: &str) -> Self {
        Self::new(
            EvalErrorKind::TypeMismatch,
            format!("expected {}, got {}", expected, actual),
        )
    }

    /// Create an unknown identifier error.
    pub fn unknown_identifier(name: &str) -> Self {
        Self::new(
            EvalErrorKind::UnknownIdentifier,
            format!("no such attribute: {}", name),
        )
    }

    /// Create an unknown function error.
    pub fn unknown_function(name: &str) -> Self {
        Self::new(
            EvalErrorKind::UnknownFunction,
            format!("unknown function: {}", name),
        )
    }

    /// Create an index out of range error.
    pub fn index_out_of_range(index: i64, len: usize) -> Self {
        Self::out_of_range(format!("index out of range: {} (size {})", index, len))
    }

    /// Create a missing key error.
    pub fn no_such_key(key: impl fmt::Display) -> Self {
        Self::not_found(format!("no such key: {}", key))
    }

    /// Create a missing field error.
    pub fn no_such_field(field: &str) -> Self {
        Self::not_found(format!("no such field: {}", field))
    }

    /// Create a no matching overload error.
    pub fn no_matching_overload(func: &str) -> Self {
        Self::new(
            EvalErrorKind::NoMatchingOverload,
            format!("no matching overload for '{}'", func),
        )
    }

    /// Create an invalid conversion error.
    pub fn invalid_conversion(from: &str, to: &str) -> Self {
        Self::new(
            EvalErrorKind::InvalidConversion,
            format!("cannot convert {} to {}", from, to),
        )
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Internal, message)
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}

impl From<&str> for EvalError {
    fn from(s: &str) -> Self {
        Self::new(EvalErrorKind::Internal, s)
    }
}

impl From<String> for EvalError {
    fn from(s: String) -> Self {
        Self::new(EvalErrorKind::Internal, s)
    }
}
