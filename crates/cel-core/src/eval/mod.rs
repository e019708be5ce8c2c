//! CEL Evaluation Engine.
//!
//! This module provides the runtime evaluation infrastructure for CEL expressions:
//!
//! - `Value` represents runtime values, with `ListValue`, `MapValue` and the
//!   flat/rope `StringValue` and `BytesValue` behind it
//! - `Activation` provides variable bindings
//! - `Program` wraps a parsed expression with its function registry
//! - `Evaluator` performs tree-walking evaluation
//!
//! # Example
//!
//! ```
//! use cel_core::Env;
//! use cel_core::eval::{MapActivation, Value};
//!
//! let env = Env::with_standard_library();
//! let ast = env.parse("x + 1").unwrap();
//! let program = env.program(&ast);
//!
//! let mut activation = MapActivation::new();
//! activation.insert("x", Value::Int(41));
//!
//! assert_eq!(program.eval(&activation), Value::Int(42));
//! ```

mod activation;
mod bytes;
mod error;
mod evaluator;
mod functions;
mod json;
mod list;
mod map;
mod program;
pub(crate) mod stdlib;
pub(crate) mod time;
pub(crate) mod value;

pub use activation::{
    Activation, EmptyActivation, HierarchicalActivation, MapActivation, Provider,
    SharedActivation,
};
pub use bytes::{BytesValue, ChunkCursor, StringValue};
pub use error::{EvalError, EvalErrorKind};
pub use evaluator::Evaluator;
pub use functions::{Function, FunctionImpl, FunctionRegistry, Overload};
pub use list::{ListIterator, ListValue, ListValueBuilder, ValueIterator};
pub use map::{check_map_key, MapKey, MapKeyIterator, MapValue, MapValueBuilder};
pub use program::Program;
pub use stdlib::STANDARD_LIBRARY;
pub use time::{TimezoneInfo, TimestampComponent};
pub use value::{
    Duration, Kind, OptionalValue, StructValue, Timestamp, TypeValue, UnknownSet, Value,
    MAX_DURATION_SECONDS, MAX_TIMESTAMP_SECONDS, MIN_TIMESTAMP_SECONDS,
};
