//! Common test utilities for cel-core-parser integration tests.

use cel_core_parser::{
    macros, parse_with, MacroRegistry, ParseErrors, ParseResult, ParserOptions, SpannedExpr,
};

/// Registry with every macro set enabled.
#[allow(dead_code)]
pub fn all_macros() -> MacroRegistry {
    let mut registry = MacroRegistry::standard();
    for set in [
        macros::COMPREHENSION_V2_MACROS,
        macros::OPTIONAL_MACROS,
        macros::BINDINGS_MACROS,
        macros::BLOCK_MACROS,
        macros::MATH_MACROS,
        macros::PROTO_MACROS,
        macros::LISTS_MACROS,
    ] {
        registry
            .register_all(set.iter().cloned())
            .expect("macro sets do not overlap");
    }
    registry
}

/// Parse with every macro set and optional syntax enabled.
#[allow(dead_code)]
pub fn parse_all(input: &str) -> ParseResult {
    parse_with(
        input,
        &ParserOptions::default().with_optional_syntax(true),
        &all_macros(),
    )
}

/// Parse input and assert it succeeds, returning the AST.
#[allow(dead_code)]
pub fn assert_parses(input: &str) -> SpannedExpr {
    let result = parse_all(input);
    if !result.errors.is_empty() {
        panic!("failed to parse '{}':\n{}", input, result.report());
    }
    result.ast.expect("expected AST")
}

/// Parse input and assert it fails, returning the errors.
#[allow(dead_code)]
pub fn assert_parse_error(input: &str) -> ParseErrors {
    let result = parse_all(input);
    if result.errors.is_empty() {
        panic!("expected parse error for '{}', but got: {:?}", input, result.ast);
    }
    result.errors
}

/// Messages of the errors produced for `input`, in display order.
#[allow(dead_code)]
pub fn error_messages(input: &str) -> Vec<String> {
    assert_parse_error(input)
        .sorted()
        .into_iter()
        .map(|e| e.message.clone())
        .collect()
}
