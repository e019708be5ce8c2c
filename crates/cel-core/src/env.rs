//! Unified environment for CEL expression processing.
//!
//! The `Env` struct owns the parser configuration, the macro registry and the
//! runtime function registry, and ties parse and eval together.

use std::sync::Arc;

use cel_core_parser::{MacroError, MacroRegistry, ParseErrors, ParserOptions};

use crate::eval::{FunctionRegistry, Program, STANDARD_LIBRARY};
use crate::ext::Extension;
use crate::Ast;

/// Error installing an extension into an [`Env`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvError {
    /// One of the extension's macros collides with a registered macro.
    #[error("extension {extension}: {source}")]
    Macro {
        extension: &'static str,
        #[source]
        source: MacroError,
    },
}

/// Error returned when an expression fails to parse.
///
/// Displays as the formatted error report, one `ERROR: file:line:col: msg`
/// entry per problem followed by a caret snippet.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{report}")]
pub struct CompileError {
    errors: ParseErrors,
    report: String,
}

impl CompileError {
    /// The individual parse errors.
    pub fn errors(&self) -> &ParseErrors {
        &self.errors
    }

    /// The formatted error report.
    pub fn report(&self) -> &str {
        &self.report
    }
}

/// Unified environment for CEL expression processing.
///
/// # Example
///
/// ```
/// use cel_core::{Env, Extension, MapActivation, Value};
///
/// let env = Env::with_standard_library()
///     .with_extension(Extension::math())
///     .unwrap();
///
/// let ast = env.parse("math.greatest(x, 3)").unwrap();
/// let program = env.program(&ast);
///
/// let mut activation = MapActivation::new();
/// activation.insert("x", Value::Int(7));
/// assert_eq!(program.eval(&activation), Value::Int(7));
/// ```
#[derive(Debug, Clone)]
pub struct Env {
    options: ParserOptions,
    macros: MacroRegistry,
    functions: FunctionRegistry,
}

impl Env {
    /// Create an environment with the standard macros and no functions.
    ///
    /// Use `with_standard_library()` for a fully-featured environment.
    pub fn new() -> Self {
        Self {
            options: ParserOptions::default(),
            macros: MacroRegistry::standard(),
            functions: FunctionRegistry::new(),
        }
    }

    /// Create an environment with the standard macros and the CEL standard
    /// library of operators and functions.
    pub fn with_standard_library() -> Self {
        let mut env = Self::new();
        env.functions.register_all(STANDARD_LIBRARY.iter().cloned());
        env
    }

    /// Replace the parser options (builder pattern).
    ///
    /// Optional syntax enabled by an extension is kept.
    pub fn with_parser_options(mut self, options: ParserOptions) -> Self {
        let optional_syntax = self.options.enable_optional_syntax;
        self.options = options;
        self.options.enable_optional_syntax |= optional_syntax;
        self
    }

    /// Install an extension's macros and functions (builder pattern).
    ///
    /// Fails if any of the extension's macros is already registered; in that
    /// case none of them is installed.
    pub fn with_extension(mut self, extension: Extension) -> Result<Self, EnvError> {
        self.add_extension(extension)?;
        Ok(self)
    }

    /// Install an extension's macros and functions (mutable).
    pub fn add_extension(&mut self, extension: Extension) -> Result<(), EnvError> {
        let name = extension.name();
        let optional_syntax = extension.requires_optional_syntax();
        let (macros, functions) = extension.into_parts();

        self.macros
            .register_all(macros.iter().cloned())
            .map_err(|source| EnvError::Macro {
                extension: name,
                source,
            })?;
        if optional_syntax {
            self.options.enable_optional_syntax = true;
        }
        let function_count = functions.len();
        self.functions.register_all(functions);

        tracing::debug!(
            extension = name,
            macros = macros.len(),
            functions = function_count,
            "installed extension"
        );
        Ok(())
    }

    /// Get the parser options.
    pub fn parser_options(&self) -> &ParserOptions {
        &self.options
    }

    /// Get the macro registry.
    pub fn macros(&self) -> &MacroRegistry {
        &self.macros
    }

    /// Get the function registry.
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Parse a CEL expression.
    ///
    /// Returns the AST when parsing produced no errors. Otherwise the error
    /// carries every reported problem and the formatted report.
    pub fn parse(&self, source: &str) -> Result<Ast, CompileError> {
        let result = cel_core_parser::parse_with(source, &self.options, &self.macros);
        let report = result.report();
        match result.into_result() {
            Ok((expr, source_info)) => Ok(Ast::new(expr, source_info)),
            Err(errors) => {
                tracing::debug!(errors = errors.total(), "parse failed");
                Err(CompileError { errors, report })
            }
        }
    }

    /// Build a program that evaluates `ast` with this environment's functions.
    pub fn program(&self, ast: &Ast) -> Program {
        Program::new(Arc::new(ast.clone()), Arc::new(self.functions.clone()))
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_env() {
        let env = Env::new();
        assert!(env.functions().is_empty());
        assert!(env.macros().contains("has"));
        assert!(env.macros().contains("exists_one"));
    }

    #[test]
    fn test_with_standard_library() {
        let env = Env::with_standard_library();
        assert!(env.functions().contains("_+_"));
        assert!(env.functions().contains("size"));
        assert!(env.functions().contains("contains"));
    }

    #[test]
    fn test_parse() {
        let env = Env::new();
        assert!(env.parse("1 + 2").is_ok());
    }

    #[test]
    fn test_parse_error_report() {
        let env = Env::new();
        let err = env.parse("1 +").unwrap_err();
        assert_eq!(err.errors().total(), 1);
        assert!(err.to_string().starts_with("ERROR: <input>:1:"));
        assert_eq!(err.to_string(), err.report());
    }

    #[test]
    fn test_with_extension_registers_macros_and_functions() {
        let env = Env::with_standard_library()
            .with_extension(Extension::lists())
            .unwrap();
        assert!(env.macros().contains("sortBy"));
        assert!(env.functions().contains("distinct"));
    }

    #[test]
    fn test_duplicate_extension_fails() {
        let env = Env::with_standard_library()
            .with_extension(Extension::math())
            .unwrap();
        let err = env.with_extension(Extension::math()).unwrap_err();
        assert!(matches!(err, EnvError::Macro { extension: "math", .. }));
    }

    #[test]
    fn test_duplicate_extension_leaves_env_unchanged() {
        let mut env = Env::with_standard_library();
        env.add_extension(Extension::math()).unwrap();
        let before = env.macros().len();
        assert!(env.add_extension(Extension::math()).is_err());
        assert_eq!(env.macros().len(), before);
    }

    #[test]
    fn test_optionals_enable_syntax() {
        let env = Env::with_standard_library();
        assert!(env.parse("a.?b").is_err());

        let env = env.with_extension(Extension::optionals()).unwrap();
        assert!(env.parser_options().enable_optional_syntax);
        assert!(env.parse("a.?b").is_ok());
    }

    #[test]
    fn test_parser_options_keep_optional_syntax() {
        let env = Env::with_standard_library()
            .with_extension(Extension::optionals())
            .unwrap()
            .with_parser_options(ParserOptions::default().with_description("rule.cel"));
        assert!(env.parser_options().enable_optional_syntax);
        assert_eq!(env.parser_options().description, "rule.cel");
    }

    #[test]
    fn test_program() {
        let env = Env::with_standard_library();
        let ast = env.parse("[1, 2, 3].map(x, x * 2)").unwrap();
        assert_eq!(env.program(&ast).eval_empty(), Value::list([2, 4, 6]));
    }
}
