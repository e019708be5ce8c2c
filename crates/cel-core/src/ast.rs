//! Parsed CEL expression.
//!
//! An `Ast` pairs the expression tree with the [`SourceInfo`] the parser
//! produced for it, so positions and recorded macro calls stay available
//! after parsing.
//!
//! # Example
//!
//! ```
//! use cel_core::Env;
//!
//! let env = Env::with_standard_library();
//! let ast = env.parse("[1, 2].all(x, x > 0)").unwrap();
//!
//! assert_eq!(ast.source(), "[1, 2].all(x, x > 0)");
//! assert_eq!(ast.to_cel_string(), "[1, 2].all(x, x > 0)");
//! ```

use cel_core_common::{unparse_with_source_info, SourceInfo, SpannedExpr};

/// A parsed CEL expression and its source information.
#[derive(Debug, Clone)]
pub struct Ast {
    expr: SpannedExpr,
    source_info: SourceInfo,
}

impl Ast {
    /// Create an AST from a parsed expression.
    pub fn new(expr: SpannedExpr, source_info: SourceInfo) -> Self {
        Self { expr, source_info }
    }

    /// Get the expression tree.
    pub fn expr(&self) -> &SpannedExpr {
        &self.expr
    }

    /// Get the source information.
    pub fn source_info(&self) -> &SourceInfo {
        &self.source_info
    }

    /// Get the original source text.
    pub fn source(&self) -> &str {
        self.source_info.content()
    }

    /// Convert the AST back to CEL source text.
    ///
    /// Macro expansions recorded in the source info are printed as the
    /// original macro call. Formatting may differ from the input
    /// (whitespace, parenthesization).
    pub fn to_cel_string(&self) -> String {
        unparse_with_source_info(&self.expr, &self.source_info)
    }
}

#[cfg(test)]
mod tests {
    use crate::Env;

    #[test]
    fn test_ast_source() {
        let env = Env::with_standard_library();
        let ast = env.parse("x + 1").unwrap();
        assert_eq!(ast.source(), "x + 1");
        assert!(ast.source_info().position(ast.expr().id).is_some());
    }

    #[test]
    fn test_ast_to_cel_string() {
        let env = Env::with_standard_library();

        let ast = env.parse("1 + 2 * 3").unwrap();
        assert_eq!(ast.to_cel_string(), "1 + 2 * 3");

        let ast = env.parse("(1 + 2) * 3").unwrap();
        assert_eq!(ast.to_cel_string(), "(1 + 2) * 3");
    }

    #[test]
    fn test_ast_to_cel_string_restores_macros() {
        let env = Env::with_standard_library();
        let ast = env.parse("has(a.b) && [1].exists(x, x > 0)").unwrap();
        assert_eq!(ast.to_cel_string(), "has(a.b) && [1].exists(x, x > 0)");
    }
}
