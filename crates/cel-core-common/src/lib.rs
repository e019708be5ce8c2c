//! Common types for CEL: expression IR, operator names and source positions.
//!
//! This crate provides the foundational types shared by the parser and the
//! runtime:
//!
//! - **IR**: [`Expr`], [`SpannedExpr`] and friends. Operators are calls with
//!   canonical names from [`operators`]; macros are already expanded.
//! - **Source info**: [`SourceInfo`] maps expression ids to offsets and keeps
//!   the macro-call side table.
//! - **Unparser**: [`unparse`] and [`unparse_with_source_info`] render IR
//!   back into CEL source.

mod ast;
pub mod operators;
mod source_info;
mod unparser;

pub use ast::{
    Comprehension, Constant, Expr, ListElement, MapEntry, Span, Spanned, SpannedExpr, StructField,
};
pub use source_info::{SourceInfo, DEFAULT_DESCRIPTION};
pub use unparser::{unparse, unparse_with_source_info};
