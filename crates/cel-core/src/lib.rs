//! CEL-Core: High-level API for the Common Expression Language
//!
//! This crate provides a unified `Env` for parsing and evaluating CEL
//! expressions.
//!
//! # Quick Start
//!
//! ```
//! use cel_core::{Env, MapActivation, Value};
//!
//! let env = Env::with_standard_library();
//! let ast = env.parse("x + 1").unwrap();
//! let program = env.program(&ast);
//!
//! let mut activation = MapActivation::new();
//! activation.insert("x", 41);
//! assert_eq!(program.eval(&activation), Value::Int(42));
//! ```
//!
//! # Architecture
//!
//! The `Env` struct coordinates:
//! - **Parser**: Converts source text into the expression IR, expanding macros
//! - **Macros**: The standard set plus whatever extensions install
//! - **Functions**: Standard library + extension functions used at runtime
//!
//! # Modules
//!
//! - `eval`: Values, activations, the function registry and the evaluator
//! - `ext`: Extension libraries (lists, math, optionals, strings, encoders,
//!   bindings, block, two-variable comprehensions, protos)

mod ast;
mod env;

pub mod eval;
pub mod ext;

pub use ast::Ast;
pub use env::{CompileError, Env, EnvError};
pub use ext::Extension;

// Re-export from eval module
pub use eval::{
    check_map_key, Activation, BytesValue, EmptyActivation, EvalError, EvalErrorKind, Evaluator,
    Function, FunctionRegistry, HierarchicalActivation, Kind, ListValue, ListValueBuilder,
    MapActivation, MapKey, MapValue, MapValueBuilder, OptionalValue, Overload, Program,
    SharedActivation, StringValue, Value, STANDARD_LIBRARY,
};

// Re-export from the parser
pub use cel_core_parser::{
    parse, parse_with, Expr, MacroError, MacroRegistry, ParseError, ParseErrors, ParseResult,
    ParserOptions, SourceInfo, Span, SpannedExpr,
};
