//! Parser configuration.

use cel_core_common::DEFAULT_DESCRIPTION;

/// Options controlling parser limits and syntax extensions.
///
/// ```
/// use cel_core_parser::ParserOptions;
///
/// let options = ParserOptions::default()
///     .with_max_recursion_depth(64)
///     .with_optional_syntax(true);
/// assert_eq!(options.max_recursion_depth, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Name of the source used in error reports.
    pub description: String,
    /// Maximum nesting depth of the expression before parsing aborts.
    pub max_recursion_depth: usize,
    /// Maximum number of syntax errors recovered from before parsing aborts.
    pub error_recovery_limit: usize,
    /// Maximum number of tokens skipped in a single recovery.
    pub error_recovery_lookahead_limit: usize,
    /// Maximum input size, in code points.
    pub expression_size_codepoint_limit: usize,
    /// Accept `.?field`, `[?index]`, `[?elem]` and `{?key: value}`.
    pub enable_optional_syntax: bool,
    /// Name comprehension accumulators `__result__` instead of `@result`.
    pub enable_hidden_accumulator_var: bool,
    /// Record the original call of every macro expansion in the source info.
    pub populate_macro_calls: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            description: DEFAULT_DESCRIPTION.to_string(),
            max_recursion_depth: 250,
            error_recovery_limit: 30,
            error_recovery_lookahead_limit: 256,
            expression_size_codepoint_limit: 100_000,
            enable_optional_syntax: false,
            enable_hidden_accumulator_var: true,
            populate_macro_calls: true,
        }
    }
}

impl ParserOptions {
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn with_error_recovery_limit(mut self, limit: usize) -> Self {
        self.error_recovery_limit = limit;
        self
    }

    pub fn with_error_recovery_lookahead_limit(mut self, limit: usize) -> Self {
        self.error_recovery_lookahead_limit = limit;
        self
    }

    pub fn with_expression_size_codepoint_limit(mut self, limit: usize) -> Self {
        self.expression_size_codepoint_limit = limit;
        self
    }

    pub fn with_optional_syntax(mut self, enabled: bool) -> Self {
        self.enable_optional_syntax = enabled;
        self
    }

    pub fn with_hidden_accumulator_var(mut self, enabled: bool) -> Self {
        self.enable_hidden_accumulator_var = enabled;
        self
    }

    pub fn with_macro_calls(mut self, enabled: bool) -> Self {
        self.populate_macro_calls = enabled;
        self
    }

    /// Accumulator variable name used by comprehension macros.
    pub fn accumulator_name(&self) -> &'static str {
        if self.enable_hidden_accumulator_var {
            crate::factory::HIDDEN_ACCUMULATOR_VAR
        } else {
            crate::factory::LEGACY_ACCUMULATOR_VAR
        }
    }
}
