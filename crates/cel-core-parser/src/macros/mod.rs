//! Macro system for CEL parser.
//!
//! Macros in CEL are syntactic transformations that expand at parse time.
//! They transform specific call patterns (like `list.all(x, cond)`) into
//! canonical IR (like a `Comprehension`).
//!
//! This module provides:
//! - [`Macro`] - Definition of a single macro
//! - [`MacroRegistry`] - Collection of macros with lookup by key
//! - [`MacroExpander`] - The expansion function type
//! - the macro sets: [`STANDARD_MACROS`], [`COMPREHENSION_V2_MACROS`],
//!   [`OPTIONAL_MACROS`], [`BINDINGS_MACROS`], [`BLOCK_MACROS`],
//!   [`MATH_MACROS`], [`PROTO_MACROS`] and [`LISTS_MACROS`]
//!
//! # Architecture
//!
//! Macros are keyed by `name:arg_count:is_receiver` (e.g., `"all:2:true"`),
//! or `name:*:is_receiver` for variadic macros. Lookup tries the exact key
//! first, then the variadic key.

use std::collections::HashMap;

use cel_core_common::{Expr, Span, SpannedExpr};

use crate::factory::ExprFactory;

mod bindings;
mod comprehensions;
mod lists;
mod math;
mod optional;
mod proto;
mod standard;

/// Indicates whether a macro is called as a global function or as a method on a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroStyle {
    /// Global function call: `macro_name(args...)`
    Global,
    /// Receiver-style method call: `receiver.macro_name(args...)`
    Receiver,
}

/// Specifies the expected argument count for a macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgCount {
    /// Exact number of arguments required.
    Exact(usize),
    /// Any number of arguments; the expander validates the count.
    VarArg,
}

/// Result of macro expansion.
#[derive(Debug)]
pub enum MacroExpansion {
    /// The call was replaced by this expression. Errors are reported through
    /// the factory and expand to the `Unspecified` node it returns.
    Expanded(SpannedExpr),
    /// The call site does not match the macro. The target and arguments are
    /// handed back untouched and the parser builds an ordinary call.
    Declined {
        target: Option<SpannedExpr>,
        args: Vec<SpannedExpr>,
    },
}

/// Type alias for macro expander functions.
///
/// # Parameters
/// - `factory`: id allocation, node construction and error reporting
/// - `span`: Source span of the entire call expression
/// - `target`: The receiver expression for receiver-style macros, None for global macros
/// - `args`: The arguments passed to the macro
pub type MacroExpander = fn(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion;

/// Definition of a single macro.
#[derive(Clone)]
pub struct Macro {
    /// The macro name (e.g., "all", "has", "map").
    pub name: &'static str,
    /// Whether this is a global or receiver-style macro.
    pub style: MacroStyle,
    /// The expected argument count.
    pub arg_count: ArgCount,
    /// The expansion function.
    pub expander: MacroExpander,
    /// Optional description for documentation/IDE features.
    pub description: Option<&'static str>,
}

impl Macro {
    /// Create a new macro definition.
    pub const fn new(
        name: &'static str,
        style: MacroStyle,
        arg_count: ArgCount,
        expander: MacroExpander,
    ) -> Self {
        Self {
            name,
            style,
            arg_count,
            expander,
            description: None,
        }
    }

    /// Create a new macro definition with a description.
    pub const fn with_description(
        name: &'static str,
        style: MacroStyle,
        arg_count: ArgCount,
        expander: MacroExpander,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            style,
            arg_count,
            expander,
            description: Some(description),
        }
    }

    /// The lookup key for this macro.
    pub fn key(&self) -> String {
        let receiver = self.style == MacroStyle::Receiver;
        match self.arg_count {
            ArgCount::Exact(n) => exact_key(self.name, n, receiver),
            ArgCount::VarArg => vararg_key(self.name, receiver),
        }
    }
}

impl std::fmt::Debug for Macro {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Macro")
            .field("name", &self.name)
            .field("style", &self.style)
            .field("arg_count", &self.arg_count)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

fn exact_key(name: &str, arg_count: usize, is_receiver: bool) -> String {
    format!("{}:{}:{}", name, arg_count, is_receiver)
}

fn vararg_key(name: &str, is_receiver: bool) -> String {
    format!("{}:*:{}", name, is_receiver)
}

/// Errors from macro registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MacroError {
    #[error("macro already exists: {key}")]
    AlreadyExists { key: String },
}

/// Registry of macros with lookup by call shape.
///
/// Built once per parser configuration and borrowed by every parse, so one
/// registry can serve concurrent parses.
#[derive(Debug, Clone, Default)]
pub struct MacroRegistry {
    macros: HashMap<String, Macro>,
}

impl MacroRegistry {
    /// Create an empty macro registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the standard CEL macros.
    pub fn standard() -> Self {
        Self {
            macros: STANDARD_MACROS
                .iter()
                .map(|m| (m.key(), m.clone()))
                .collect(),
        }
    }

    /// Register a macro. Fails if a macro with the same key exists, leaving
    /// the registry unchanged.
    pub fn register(&mut self, macro_def: Macro) -> Result<(), MacroError> {
        let key = macro_def.key();
        if self.macros.contains_key(&key) {
            return Err(MacroError::AlreadyExists { key });
        }
        tracing::debug!(key = %key, "registered macro");
        self.macros.insert(key, macro_def);
        Ok(())
    }

    /// Register macros in order. On the first failure every macro this call
    /// already registered is removed again before the error is returned.
    pub fn register_all<I>(&mut self, macros: I) -> Result<(), MacroError>
    where
        I: IntoIterator<Item = Macro>,
    {
        let mut added = Vec::new();
        for macro_def in macros {
            let key = macro_def.key();
            if let Err(err) = self.register(macro_def) {
                tracing::debug!(key = %key, rolled_back = added.len(), "macro batch rejected");
                for key in added {
                    self.macros.remove(&key);
                }
                return Err(err);
            }
            added.push(key);
        }
        Ok(())
    }

    /// Look up a macro by name, argument count, and receiver style.
    ///
    /// Tries the exact key first, then the variadic key. Names that are empty
    /// or contain `:` never match.
    pub fn lookup(&self, name: &str, arg_count: usize, is_receiver: bool) -> Option<&Macro> {
        if name.is_empty() || name.contains(':') {
            return None;
        }
        self.macros
            .get(&exact_key(name, arg_count, is_receiver))
            .or_else(|| self.macros.get(&vararg_key(name, is_receiver)))
    }

    /// Check if the registry contains a macro with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.macros.values().any(|m| m.name == name)
    }

    /// Get an iterator over all registered macros.
    pub fn iter(&self) -> impl Iterator<Item = &Macro> {
        self.macros.values()
    }

    /// Get the number of registered macros.
    pub fn len(&self) -> usize {
        self.macros.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

// ============================================================================
// Macro sets
// ============================================================================

/// Standard CEL macros.
pub static STANDARD_MACROS: &[Macro] = &[
    Macro::with_description(
        "has",
        MacroStyle::Global,
        ArgCount::Exact(1),
        standard::expand_has,
        "Tests whether a field is set on a message",
    ),
    Macro::with_description(
        "all",
        MacroStyle::Receiver,
        ArgCount::Exact(2),
        standard::expand_all,
        "Tests whether all elements satisfy a condition",
    ),
    Macro::with_description(
        "exists",
        MacroStyle::Receiver,
        ArgCount::Exact(2),
        standard::expand_exists,
        "Tests whether any element satisfies a condition",
    ),
    Macro::with_description(
        "exists_one",
        MacroStyle::Receiver,
        ArgCount::Exact(2),
        standard::expand_exists_one,
        "Tests whether exactly one element satisfies a condition",
    ),
    Macro::with_description(
        "map",
        MacroStyle::Receiver,
        ArgCount::Exact(2),
        standard::expand_map,
        "Transforms elements of a list",
    ),
    Macro::with_description(
        "map",
        MacroStyle::Receiver,
        ArgCount::Exact(3),
        standard::expand_filter_map,
        "Transforms elements of a list with filtering",
    ),
    Macro::with_description(
        "filter",
        MacroStyle::Receiver,
        ArgCount::Exact(2),
        standard::expand_filter,
        "Filters elements of a list by a condition",
    ),
];

/// Two-variable comprehension macros.
pub static COMPREHENSION_V2_MACROS: &[Macro] = &[
    Macro::with_description(
        "all",
        MacroStyle::Receiver,
        ArgCount::Exact(3),
        comprehensions::expand_all,
        "Tests whether all entries satisfy a condition (two-variable form)",
    ),
    Macro::with_description(
        "exists",
        MacroStyle::Receiver,
        ArgCount::Exact(3),
        comprehensions::expand_exists,
        "Tests whether any entry satisfies a condition (two-variable form)",
    ),
    Macro::with_description(
        "existsOne",
        MacroStyle::Receiver,
        ArgCount::Exact(3),
        comprehensions::expand_exists_one,
        "Tests whether exactly one entry satisfies a condition (two-variable form)",
    ),
    Macro::with_description(
        "exists_one",
        MacroStyle::Receiver,
        ArgCount::Exact(3),
        comprehensions::expand_exists_one,
        "Tests whether exactly one entry satisfies a condition (two-variable form)",
    ),
    Macro::with_description(
        "transformList",
        MacroStyle::Receiver,
        ArgCount::Exact(3),
        comprehensions::expand_transform_list,
        "Transforms entries into a list with index and value variables",
    ),
    Macro::with_description(
        "transformList",
        MacroStyle::Receiver,
        ArgCount::Exact(4),
        comprehensions::expand_transform_list,
        "Transforms entries into a list with index, value, and filter",
    ),
    Macro::with_description(
        "transformMap",
        MacroStyle::Receiver,
        ArgCount::Exact(3),
        comprehensions::expand_transform_map,
        "Transforms entries into a map keyed by the first variable",
    ),
    Macro::with_description(
        "transformMap",
        MacroStyle::Receiver,
        ArgCount::Exact(4),
        comprehensions::expand_transform_map,
        "Transforms entries into a map keyed by the first variable, with filter",
    ),
    Macro::with_description(
        "transformMapEntry",
        MacroStyle::Receiver,
        ArgCount::Exact(3),
        comprehensions::expand_transform_map_entry,
        "Transforms entries into a map by merging single-entry maps",
    ),
    Macro::with_description(
        "transformMapEntry",
        MacroStyle::Receiver,
        ArgCount::Exact(4),
        comprehensions::expand_transform_map_entry,
        "Transforms entries into a map by merging single-entry maps, with filter",
    ),
];

/// Optional value macros.
pub static OPTIONAL_MACROS: &[Macro] = &[
    Macro::with_description(
        "optMap",
        MacroStyle::Receiver,
        ArgCount::Exact(2),
        optional::expand_opt_map,
        "Applies a transform to the value of a present optional",
    ),
    Macro::with_description(
        "optFlatMap",
        MacroStyle::Receiver,
        ArgCount::Exact(2),
        optional::expand_opt_flat_map,
        "Applies an optional-returning transform to the value of a present optional",
    ),
];

/// `cel.bind` local bindings.
pub static BINDINGS_MACROS: &[Macro] = &[Macro::with_description(
    "bind",
    MacroStyle::Receiver,
    ArgCount::Exact(3),
    bindings::expand_bind,
    "Binds a variable to a value for use in an expression",
)];

/// `cel.block` and its slot references.
pub static BLOCK_MACROS: &[Macro] = &[
    Macro::new(
        "block",
        MacroStyle::Receiver,
        ArgCount::Exact(2),
        bindings::expand_block,
    ),
    Macro::new(
        "index",
        MacroStyle::Receiver,
        ArgCount::Exact(1),
        bindings::expand_block_index,
    ),
    Macro::new(
        "iterVar",
        MacroStyle::Receiver,
        ArgCount::Exact(2),
        bindings::expand_block_iter_var,
    ),
    Macro::new(
        "accuVar",
        MacroStyle::Receiver,
        ArgCount::Exact(2),
        bindings::expand_block_accu_var,
    ),
];

/// `math.greatest` and `math.least`.
pub static MATH_MACROS: &[Macro] = &[
    Macro::with_description(
        "greatest",
        MacroStyle::Receiver,
        ArgCount::VarArg,
        math::expand_greatest,
        "Returns the greatest numeric argument",
    ),
    Macro::with_description(
        "least",
        MacroStyle::Receiver,
        ArgCount::VarArg,
        math::expand_least,
        "Returns the least numeric argument",
    ),
];

/// `proto.getExt` and `proto.hasExt`.
pub static PROTO_MACROS: &[Macro] = &[
    Macro::with_description(
        "getExt",
        MacroStyle::Receiver,
        ArgCount::Exact(2),
        proto::expand_get_ext,
        "Reads an extension field",
    ),
    Macro::with_description(
        "hasExt",
        MacroStyle::Receiver,
        ArgCount::Exact(2),
        proto::expand_has_ext,
        "Tests whether an extension field is set",
    ),
];

/// `sortBy` list macro.
pub static LISTS_MACROS: &[Macro] = &[Macro::with_description(
    "sortBy",
    MacroStyle::Receiver,
    ArgCount::Exact(2),
    lists::expand_sort_by,
    "Sorts a list by a key computed for each element",
)];

// ============================================================================
// Helpers shared by expanders
// ============================================================================

/// Name of a bare identifier usable as a variable.
fn simple_name(expr: &SpannedExpr) -> Option<&str> {
    match &expr.node {
        Expr::Ident(name) if !name.starts_with('.') => Some(name),
        _ => None,
    }
}

/// True when `target` is the bare identifier `namespace` (e.g. `cel`, `math`).
fn is_namespace(target: &Option<SpannedExpr>, namespace: &str) -> bool {
    matches!(target, Some(t) if simple_name(t) == Some(namespace))
}

/// Validate the iteration variable of a single-variable macro.
///
/// On success the identifier node is consumed and its id retired.
fn iter_var(
    factory: &mut ExprFactory,
    macro_name: &str,
    var: SpannedExpr,
) -> Result<String, SpannedExpr> {
    let Some(name) = simple_name(&var).map(str::to_string) else {
        return Err(factory.report_error(
            var.span,
            format!("{}() variable name must be a simple identifier", macro_name),
        ));
    };
    if name == factory.accumulator_name() {
        return Err(factory.report_error(
            var.span,
            format!(
                "{}() variable name cannot be {}",
                macro_name,
                factory.accumulator_name()
            ),
        ));
    }
    factory.retire_id(var.id);
    Ok(name)
}

/// Validate the iteration variables of a two-variable macro.
///
/// Checks run in a fixed order and only the first failure is reported.
fn iter_vars(
    factory: &mut ExprFactory,
    macro_name: &str,
    first: SpannedExpr,
    second: SpannedExpr,
) -> Result<(String, String), SpannedExpr> {
    let Some(first_name) = simple_name(&first).map(str::to_string) else {
        return Err(factory.report_error(
            first.span,
            format!("{}() first variable name must be a simple identifier", macro_name),
        ));
    };
    let Some(second_name) = simple_name(&second).map(str::to_string) else {
        return Err(factory.report_error(
            second.span,
            format!("{}() second variable name must be a simple identifier", macro_name),
        ));
    };
    if first_name == second_name {
        return Err(factory.report_error(
            second.span,
            format!(
                "{}() second variable must be different from the first variable",
                macro_name
            ),
        ));
    }
    let accu = factory.accumulator_name();
    if first_name == accu {
        return Err(factory.report_error(
            first.span,
            format!("{}() first variable name cannot be {}", macro_name, accu),
        ));
    }
    if second_name == accu {
        return Err(factory.report_error(
            second.span,
            format!("{}() second variable name cannot be {}", macro_name, accu),
        ));
    }
    factory.retire_id(first.id);
    factory.retire_id(second.id);
    Ok((first_name, second_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keys_encode_arity_and_style() {
        assert_eq!(STANDARD_MACROS[0].key(), "has:1:false");
        assert_eq!(STANDARD_MACROS[1].key(), "all:2:true");
        assert_eq!(MATH_MACROS[0].key(), "greatest:*:true");
    }

    #[test]
    fn standard_registry_lookup() {
        let registry = MacroRegistry::standard();
        assert_eq!(registry.len(), STANDARD_MACROS.len());
        assert!(registry.lookup("has", 1, false).is_some());
        assert!(registry.lookup("has", 1, true).is_none());
        assert!(registry.lookup("all", 2, true).is_some());
        assert!(registry.lookup("all", 3, true).is_none());
        assert!(registry.lookup("map", 3, true).is_some());
    }

    #[test]
    fn lookup_falls_back_to_vararg() {
        let mut registry = MacroRegistry::new();
        registry.register_all(MATH_MACROS.iter().cloned()).unwrap();
        for count in [0, 1, 2, 7] {
            let found = registry.lookup("greatest", count, true).map(|m| m.name);
            assert_eq!(found, Some("greatest"));
        }
        assert!(registry.lookup("greatest", 2, false).is_none());
    }

    #[test]
    fn lookup_rejects_malformed_names() {
        let registry = MacroRegistry::standard();
        assert!(registry.lookup("", 1, false).is_none());
        assert!(registry.lookup("has:1", 1, false).is_none());
        assert!(registry.lookup(":", 0, true).is_none());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = MacroRegistry::standard();
        let err = registry.register(STANDARD_MACROS[0].clone()).unwrap_err();
        assert_eq!(
            err,
            MacroError::AlreadyExists {
                key: "has:1:false".to_string()
            }
        );
        assert_eq!(err.to_string(), "macro already exists: has:1:false");
        assert_eq!(registry.len(), STANDARD_MACROS.len());
    }

    #[test]
    fn failed_batch_rolls_back() {
        let mut registry = MacroRegistry::new();
        let has = STANDARD_MACROS[0].clone();
        let all = STANDARD_MACROS[1].clone();
        let result = registry.register_all(vec![has, all.clone(), all]);
        assert!(matches!(result, Err(MacroError::AlreadyExists { .. })));
        assert!(registry.is_empty());
        assert!(!registry.contains("has"));
        assert!(!registry.contains("all"));
    }

    #[test]
    fn failed_batch_keeps_earlier_registrations() {
        let mut registry = MacroRegistry::new();
        registry.register(STANDARD_MACROS[0].clone()).unwrap();
        let result = registry.register_all(vec![
            STANDARD_MACROS[1].clone(),
            STANDARD_MACROS[0].clone(),
        ]);
        assert!(result.is_err());
        assert!(registry.contains("has"));
        assert!(!registry.contains("all"));
        assert_eq!(registry.len(), 1);
    }
}
