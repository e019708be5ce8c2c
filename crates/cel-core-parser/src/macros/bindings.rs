//! `cel.bind` and `cel.block`.

use cel_core_common::operators;
use cel_core_common::{Constant, Expr, Span, SpannedExpr};

use super::optional::bind_comprehension;
use super::{is_namespace, simple_name, MacroExpansion};
use crate::factory::ExprFactory;

/// `cel.bind(var, init, body)`.
pub(super) fn expand_bind(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    if !is_namespace(&target, "cel") {
        return MacroExpansion::Declined { target, args };
    }
    let Ok([var, init, body]) = <[SpannedExpr; 3]>::try_from(args) else {
        let error = factory.report_error(span, "cel.bind() requires 3 arguments");
        return MacroExpansion::Expanded(error);
    };
    let Some(name) = simple_name(&var).map(str::to_string) else {
        return MacroExpansion::Expanded(
            factory.report_error(var.span, "cel.bind() variable names must be simple identifiers"),
        );
    };
    retire_namespace(factory, target);
    factory.retire_id(var.id);
    MacroExpansion::Expanded(bind_comprehension(factory, span, name, init, body))
}

/// `cel.block([b0, b1, ...], result)` becomes the internal call
/// `cel.@block([b0, b1, ...], result)`; slot `i` is read with `cel.index(i)`.
pub(super) fn expand_block(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    if !is_namespace(&target, "cel") {
        return MacroExpansion::Declined { target, args };
    }
    let Ok([bindings, result]) = <[SpannedExpr; 2]>::try_from(args) else {
        let error = factory.report_error(span, "cel.block() requires 2 arguments");
        return MacroExpansion::Expanded(error);
    };
    if !matches!(bindings.node, Expr::List(_)) {
        return MacroExpansion::Expanded(factory.report_error(
            bindings.span,
            "cel.block requires the first arg to be a list literal",
        ));
    }
    retire_namespace(factory, target);
    MacroExpansion::Expanded(factory.new_call(span, operators::BLOCK, vec![bindings, result]))
}

/// `cel.index(N)` becomes the identifier `@indexN`.
pub(super) fn expand_block_index(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    if !is_namespace(&target, "cel") {
        return MacroExpansion::Declined { target, args };
    }
    match args.as_slice() {
        [index] => match non_negative_int(index) {
            Some(n) => {
                retire_namespace(factory, target);
                MacroExpansion::Expanded(factory.new_ident(span, format!("@index{}", n)))
            }
            None => MacroExpansion::Expanded(factory.report_error(
                index.span.clone(),
                "cel.index requires a single non-negative int constant arg",
            )),
        },
        _ => MacroExpansion::Expanded(factory.report_error(
            span,
            "cel.index requires a single non-negative int constant arg",
        )),
    }
}

/// `cel.iterVar(i, j)` becomes `@it:i:j`.
pub(super) fn expand_block_iter_var(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    expand_slot_var(factory, span, target, args, "iterVar", "@it")
}

/// `cel.accuVar(i, j)` becomes `@ac:i:j`.
pub(super) fn expand_block_accu_var(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    expand_slot_var(factory, span, target, args, "accuVar", "@ac")
}

fn expand_slot_var(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
    macro_name: &str,
    prefix: &str,
) -> MacroExpansion {
    if !is_namespace(&target, "cel") {
        return MacroExpansion::Declined { target, args };
    }
    let depths = match args.as_slice() {
        [a, b] => non_negative_int(a).zip(non_negative_int(b)),
        _ => None,
    };
    match depths {
        Some((i, j)) => {
            retire_namespace(factory, target);
            MacroExpansion::Expanded(factory.new_ident(span, format!("{}:{}:{}", prefix, i, j)))
        }
        None => MacroExpansion::Expanded(factory.report_error(
            span,
            format!("cel.{} requires two non-negative int constant args", macro_name),
        )),
    }
}

fn non_negative_int(expr: &SpannedExpr) -> Option<i64> {
    match expr.node {
        Expr::Constant(Constant::Int(n)) if n >= 0 => Some(n),
        _ => None,
    }
}

fn retire_namespace(factory: &mut ExprFactory, target: Option<SpannedExpr>) {
    if let Some(target) = target {
        factory.retire_id(target.id);
    }
}
