//! CEL (Common Expression Language) parser.
//!
//! Source text is lexed with logos, parsed by recursive descent into the
//! canonical [`Expr`] IR, and macro calls (`has`, `all`, `map`, ...) are
//! expanded inline through a [`MacroRegistry`].
//!
//! ```
//! use cel_core_parser::{parse, Expr};
//!
//! let result = parse("[1, 2, 3].exists(x, x > 2)");
//! assert!(result.is_ok());
//! assert!(matches!(result.ast.unwrap().node, Expr::Comprehension(_)));
//! ```

mod error;
mod factory;
mod lexer;
pub mod macros;
mod options;
mod parser;

pub use cel_core_common::{
    operators, unparse, unparse_with_source_info, Comprehension, Constant, Expr, ListElement,
    MapEntry, SourceInfo, Span, Spanned, SpannedExpr, StructField,
};
pub use error::{ParseError, ParseErrors, MAX_STORED_ERRORS};
pub use factory::{ExprFactory, HIDDEN_ACCUMULATOR_VAR, LEGACY_ACCUMULATOR_VAR};
pub use lexer::{lex, LexError, SpannedToken, Token};
pub use macros::{
    ArgCount, Macro, MacroError, MacroExpander, MacroExpansion, MacroRegistry, MacroStyle,
};
pub use options::ParserOptions;

/// Result of parsing a CEL expression.
///
/// Supports error recovery: may return both an AST and errors.
/// The AST may contain `Expr::Unspecified` nodes where parsing failed.
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// The parsed AST, if any parsing succeeded.
    pub ast: Option<SpannedExpr>,
    /// Any parse errors encountered.
    pub errors: ParseErrors,
    /// Positions and recorded macro calls for the parsed source.
    pub source_info: SourceInfo,
}

impl ParseResult {
    /// Returns true if parsing completed without errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty() && self.ast.is_some()
    }

    /// Returns true if there are any parse errors.
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }

    /// Converts to a Result, discarding partial AST on error.
    pub fn into_result(self) -> Result<(SpannedExpr, SourceInfo), ParseErrors> {
        match self.ast {
            Some(ast) if self.errors.is_empty() => Ok((ast, self.source_info)),
            _ => Err(self.errors),
        }
    }

    /// Formatted error report with source snippets.
    pub fn report(&self) -> String {
        self.errors.report(&self.source_info)
    }
}

/// Parse a CEL expression with default options and the standard macros.
pub fn parse(input: &str) -> ParseResult {
    parse_with(input, &ParserOptions::default(), &MacroRegistry::standard())
}

/// Parse a CEL expression with explicit options and macros.
pub fn parse_with(input: &str, options: &ParserOptions, macros: &MacroRegistry) -> ParseResult {
    let source_info = SourceInfo::new(options.description.clone(), input);

    let size = input.chars().count();
    if size > options.expression_size_codepoint_limit {
        let mut errors = ParseErrors::new();
        errors.push(ParseError::unpositioned(format!(
            "expression code point size exceeds limit: size: {}, limit {}",
            size, options.expression_size_codepoint_limit
        )));
        return ParseResult {
            ast: None,
            errors,
            source_info,
        };
    }

    let tokens = match lexer::lex(input) {
        Ok(tokens) => tokens,
        Err(e) => {
            let mut errors = ParseErrors::new();
            errors.push(ParseError::new(format!("Syntax error: {}", e.message), e.span));
            return ParseResult {
                ast: None,
                errors,
                source_info,
            };
        }
    };

    let (ast, source_info, errors) =
        parser::Parser::new(&tokens, source_info, options, macros).parse();
    tracing::debug!(
        description = %options.description,
        errors = errors.total(),
        "parsed expression"
    );
    ParseResult {
        ast,
        errors,
        source_info,
    }
}
