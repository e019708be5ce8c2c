//! Macro expansion through the parser.

mod common;

use cel_core_parser::{
    macros, operators, parse, parse_with, unparse, unparse_with_source_info, ArgCount, Constant,
    Expr, ExprFactory, Macro, MacroExpansion, MacroRegistry, MacroStyle, ParserOptions, Span,
    SpannedExpr,
};
use pretty_assertions::assert_eq;

fn comprehension(expr: &SpannedExpr) -> &cel_core_parser::Comprehension {
    match &expr.node {
        Expr::Comprehension(comp) => comp,
        other => panic!("expected comprehension, got {:?}", other),
    }
}

// ============================================================================
// Standard macros
// ============================================================================

#[test]
fn has_becomes_presence_test() {
    let expr = common::assert_parses("has(a.b)");
    match &expr.node {
        Expr::Select {
            operand,
            field,
            test_only,
        } => {
            assert!(*test_only);
            assert_eq!(field, "b");
            assert_eq!(operand.node, Expr::Ident("a".into()));
        }
        other => panic!("expected presence test, got {:?}", other),
    }
}

#[test]
fn has_requires_a_select() {
    assert_eq!(
        common::error_messages("has(a)"),
        vec!["invalid argument to has() macro"]
    );
}

#[test]
fn all_uses_hidden_accumulator() {
    let expr = common::assert_parses("[1, 2].all(x, x > 0)");
    let comp = comprehension(&expr);
    assert_eq!(comp.iter_var, "x");
    assert_eq!(comp.iter_var2, None);
    assert_eq!(comp.accu_var, "__result__");
    assert_eq!(comp.accu_init.node, Expr::Constant(Constant::Bool(true)));
    assert!(comp.loop_condition.node.is_call_to(operators::NOT_STRICTLY_FALSE));
    assert!(comp.loop_step.node.is_call_to(operators::LOGICAL_AND));
    assert_eq!(unparse(&expr), "[1, 2].all(x, x > 0)");
}

#[test]
fn legacy_accumulator_name() {
    let options = ParserOptions::default().with_hidden_accumulator_var(false);
    let result = parse_with("l.exists(x, x)", &options, &MacroRegistry::standard());
    let ast = result.ast.unwrap();
    assert_eq!(comprehension(&ast).accu_var, "@result");
}

#[test]
fn exists_one_counts_matches() {
    let expr = common::assert_parses("l.exists_one(x, x)");
    let comp = comprehension(&expr);
    assert_eq!(comp.accu_init.node, Expr::Constant(Constant::Int(0)));
    assert!(comp.loop_step.node.is_call_to(operators::CONDITIONAL));
    assert!(comp.result.node.is_call_to(operators::EQUALS));
}

#[test]
fn map_and_filter() {
    assert_eq!(unparse(&common::assert_parses("l.map(x, x * 2)")), "l.map(x, x * 2)");
    assert_eq!(unparse(&common::assert_parses("l.filter(x, x > 1)")), "l.filter(x, x > 1)");

    let expr = common::assert_parses("l.map(x, x > 1, x * 2)");
    let comp = comprehension(&expr);
    assert!(comp.loop_step.node.is_call_to(operators::CONDITIONAL));
}

#[test]
fn single_variable_must_be_simple() {
    assert_eq!(
        common::error_messages("l.map(a.b, 1)"),
        vec!["map() variable name must be a simple identifier"]
    );
    assert_eq!(
        common::error_messages("l.filter(__result__, true)"),
        vec!["filter() variable name cannot be __result__"]
    );
}

// ============================================================================
// Two-variable hygiene
// ============================================================================

#[test]
fn accumulator_name_is_reserved() {
    assert_eq!(
        common::error_messages("[].all(__result__, v, v == 0)"),
        vec!["all() first variable name cannot be __result__"]
    );
    assert_eq!(
        common::error_messages("[].exists(k, __result__, true)"),
        vec!["exists() second variable name cannot be __result__"]
    );
}

#[test]
fn variables_must_differ() {
    assert_eq!(
        common::error_messages("[].all(e, e, e == e)"),
        vec!["all() second variable must be different from the first variable"]
    );
}

#[test]
fn first_variable_checked_first() {
    assert_eq!(
        common::error_messages("[].all(foo.bar, e, true)"),
        vec!["all() first variable name must be a simple identifier"]
    );
    assert_eq!(
        common::error_messages("[].all(foo.bar, __result__, true)"),
        vec!["all() first variable name must be a simple identifier"]
    );
    assert_eq!(
        common::error_messages("[].existsOne(k, v.w, true)"),
        vec!["existsOne() second variable name must be a simple identifier"]
    );
}

#[test]
fn two_variable_forms() {
    let expr = common::assert_parses("m.all(k, v, v > 0)");
    let comp = comprehension(&expr);
    assert_eq!(comp.iter_var, "k");
    assert_eq!(comp.iter_var2.as_deref(), Some("v"));

    let expr = common::assert_parses("m.transformMap(k, v, v + 1)");
    let comp = comprehension(&expr);
    assert!(matches!(comp.accu_init.node, Expr::Map(ref entries) if entries.is_empty()));
    assert!(comp.loop_step.node.is_call_to(operators::MAP_INSERT));

    let expr = common::assert_parses("l.transformList(i, v, i > 0, v)");
    let comp = comprehension(&expr);
    assert!(comp.loop_step.node.is_call_to(operators::CONDITIONAL));
}

// ============================================================================
// Extension macros
// ============================================================================

#[test]
fn opt_map_wraps_binding() {
    let expr = common::assert_parses("o.optMap(v, v + 1)");
    match &expr.node {
        Expr::Call { function, args, .. } => {
            assert_eq!(function, operators::CONDITIONAL);
            assert_eq!(args[0].node.call_function(), Some("hasValue"));
            assert_eq!(args[1].node.call_function(), Some("optional.of"));
            assert_eq!(args[2].node.call_function(), Some("optional.none"));
        }
        other => panic!("expected conditional, got {:?}", other),
    }

    let expr = common::assert_parses("o.optFlatMap(v, f(v))");
    match &expr.node {
        Expr::Call { args, .. } => {
            let comp = comprehension(&args[1]);
            assert_eq!(comp.accu_var, "v");
            assert_eq!(comp.iter_var, "#unused");
        }
        other => panic!("expected conditional, got {:?}", other),
    }
}

#[test]
fn bind_produces_binding_comprehension() {
    let expr = common::assert_parses("cel.bind(x, 1, x + 1)");
    let comp = comprehension(&expr);
    assert_eq!(comp.accu_var, "x");
    assert_eq!(comp.accu_init.node, Expr::Constant(Constant::Int(1)));
    assert_eq!(comp.loop_condition.node, Expr::Constant(Constant::Bool(false)));
    assert!(matches!(&comp.iter_range.node, Expr::List(elems) if elems.is_empty()));
    assert!(comp.result.node.is_call_to(operators::ADD));

    assert_eq!(
        common::error_messages("cel.bind(a.b, 1, 2)"),
        vec!["cel.bind() variable names must be simple identifiers"]
    );
}

#[test]
fn block_and_slots() {
    let expr = common::assert_parses("cel.block([1, cel.index(0) + 1], cel.index(1))");
    match &expr.node {
        Expr::Call { target: None, function, args } => {
            assert_eq!(function, operators::BLOCK);
            assert_eq!(args[1].node, Expr::Ident("@index1".into()));
        }
        other => panic!("expected block call, got {:?}", other),
    }
    assert_eq!(
        common::assert_parses("cel.iterVar(0, 1)").node,
        Expr::Ident("@it:0:1".into())
    );
    assert_eq!(
        common::assert_parses("cel.accuVar(2, 0)").node,
        Expr::Ident("@ac:2:0".into())
    );
    assert_eq!(
        common::error_messages("cel.block(1, 2)"),
        vec!["cel.block requires the first arg to be a list literal"]
    );
}

#[test]
fn math_greatest_and_least() {
    let expr = common::assert_parses("math.greatest(1, 2)");
    assert!(expr.node.is_call_to(operators::MATH_MAX));

    let expr = common::assert_parses("math.least(1, 2, 3)");
    match &expr.node {
        Expr::Call { function, args, .. } => {
            assert_eq!(function, operators::MATH_MIN);
            assert_eq!(args.len(), 1);
            assert!(matches!(&args[0].node, Expr::List(elems) if elems.len() == 3));
        }
        other => panic!("expected call, got {:?}", other),
    }

    common::assert_parses("math.greatest([1, 2.5])");
    common::assert_parses("math.greatest(x)");
    assert_eq!(
        common::error_messages("math.greatest()"),
        vec!["math.greatest() requires at least one argument"]
    );
    assert_eq!(
        common::error_messages("math.greatest('a')"),
        vec!["math.greatest() invalid single argument value"]
    );
    assert_eq!(
        common::error_messages("math.least(1, [])"),
        vec!["math.least() invalid arguments"]
    );
}

#[test]
fn proto_extensions() {
    let expr = common::assert_parses("proto.getExt(msg, a.b.ext)");
    assert!(matches!(
        &expr.node,
        Expr::Select { field, test_only: false, .. } if field == "a.b.ext"
    ));
    let expr = common::assert_parses("proto.hasExt(msg, a.b.ext)");
    assert!(matches!(&expr.node, Expr::Select { test_only: true, .. }));
    assert_eq!(
        common::error_messages("proto.getExt(msg, f())"),
        vec!["invalid extension field"]
    );
}

#[test]
fn sort_by_binds_input() {
    let expr = common::assert_parses("[3, 1].sortBy(x, -x)");
    let comp = comprehension(&expr);
    assert_eq!(comp.accu_var, "@__sortBy_input__");
    match &comp.result.node {
        Expr::Call {
            target: Some(target),
            function,
            args,
        } => {
            assert_eq!(function, operators::SORT_BY_ASSOCIATED_KEYS);
            assert_eq!(target.node, Expr::Ident("@__sortBy_input__".into()));
            assert_eq!(comprehension(&args[0]).iter_var, "x");
        }
        other => panic!("expected member call, got {:?}", other),
    }
}

// ============================================================================
// Declined and unmatched call sites
// ============================================================================

#[test]
fn namespace_macros_decline_other_targets() {
    for input in [
        "x.bind(a, 1, a)",
        "x.greatest(1, 2)",
        "x.getExt(m, a.b)",
        "x.block([1], 2)",
    ] {
        let with_macros = common::parse_all(input).ast.unwrap();
        let without = parse_with(
            input,
            &ParserOptions::default(),
            &MacroRegistry::new(),
        )
        .ast
        .unwrap();
        assert_eq!(with_macros, without, "{}", input);
    }
}

#[test]
fn non_matching_call_matches_empty_registry() {
    for input in ["l.all(x)", "has(a, b)", "f(x, y)", "l.map(x, y, z, w)"] {
        let with_macros = parse(input);
        let without = parse_with(input, &ParserOptions::default(), &MacroRegistry::new());
        assert_eq!(with_macros.ast, without.ast, "{}", input);
        assert_eq!(
            with_macros.source_info.positions(),
            without.source_info.positions()
        );
    }
}

// ============================================================================
// Macro call records
// ============================================================================

#[test]
fn nested_macro_calls_render_as_written() {
    let result = parse("has(a.b).filter(c, c)");
    assert!(result.is_ok(), "{}", result.report());
    let ast = result.ast.as_ref().unwrap();

    let call = result.source_info.macro_call(ast.id).unwrap();
    match &call.node {
        Expr::Call {
            target: Some(target),
            ..
        } => {
            assert_eq!(target.node, Expr::Unspecified);
            assert!(result.source_info.macro_call(target.id).is_some());
        }
        other => panic!("expected member call, got {:?}", other),
    }
    assert_eq!(
        unparse_with_source_info(ast, &result.source_info),
        "has(a.b).filter(c, c)"
    );
}

#[test]
fn failed_expansion_is_not_recorded() {
    let result = parse("has(a)");
    assert!(result.is_err());
    assert!(result.source_info.macro_calls().is_empty());
}

// ============================================================================
// Custom macros
// ============================================================================

fn expand_twice(
    factory: &mut ExprFactory,
    span: Span,
    _target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    let Some(arg) = args.into_iter().next() else {
        return MacroExpansion::Expanded(factory.report_error(span, "twice() needs an argument"));
    };
    let copy = factory.copy(&arg);
    MacroExpansion::Expanded(factory.new_call(span, operators::ADD, vec![arg, copy]))
}

#[test]
fn custom_macro_expands() {
    let mut registry = MacroRegistry::new();
    registry
        .register(Macro::new(
            "twice",
            MacroStyle::Global,
            ArgCount::Exact(1),
            expand_twice,
        ))
        .unwrap();
    let result = parse_with("twice(x)", &ParserOptions::default(), &registry);
    let ast = result.ast.unwrap();
    assert_eq!(unparse(&ast), "x + x");
    match &ast.node {
        Expr::Call { args, .. } => assert_ne!(args[0].id, args[1].id),
        other => panic!("expected call, got {:?}", other),
    }
}

#[test]
fn all_macro_sets_register_without_conflict() {
    let registry = common::all_macros();
    let expected: usize = [
        macros::STANDARD_MACROS,
        macros::COMPREHENSION_V2_MACROS,
        macros::OPTIONAL_MACROS,
        macros::BINDINGS_MACROS,
        macros::BLOCK_MACROS,
        macros::MATH_MACROS,
        macros::PROTO_MACROS,
        macros::LISTS_MACROS,
    ]
    .iter()
    .map(|set| set.len())
    .sum();
    assert_eq!(registry.len(), expected);
}
