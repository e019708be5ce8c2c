//! `math.greatest` and `math.least`.

use cel_core_common::operators;
use cel_core_common::{Constant, Expr, Span, SpannedExpr};

use super::{is_namespace, MacroExpansion};
use crate::factory::ExprFactory;

pub(super) fn expand_greatest(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    expand(factory, span, target, args, "math.greatest", operators::MATH_MAX)
}

pub(super) fn expand_least(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    expand(factory, span, target, args, "math.least", operators::MATH_MIN)
}

fn expand(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
    macro_name: &str,
    function: &str,
) -> MacroExpansion {
    if !is_namespace(&target, "math") {
        return MacroExpansion::Declined { target, args };
    }
    if let Some(target) = target {
        factory.retire_id(target.id);
    }
    let call = match args.len() {
        0 => factory.report_error(
            span,
            format!("{}() requires at least one argument", macro_name),
        ),
        1 => {
            if is_numeric_list_literal(&args[0]) || is_valid_arg(&args[0]) {
                factory.new_call(span, function, args)
            } else {
                factory.report_error(
                    args[0].span.clone(),
                    format!("{}() invalid single argument value", macro_name),
                )
            }
        }
        2 => match args.iter().find(|arg| !is_valid_arg(arg)) {
            Some(bad) => {
                let bad_span = bad.span.clone();
                factory.report_error(bad_span, format!("{}() invalid arguments", macro_name))
            }
            None => factory.new_call(span, function, args),
        },
        _ => match args.iter().find(|arg| !is_valid_arg(arg)) {
            Some(bad) => {
                let bad_span = bad.span.clone();
                factory.report_error(bad_span, format!("{}() invalid arguments", macro_name))
            }
            None => {
                let list = factory.new_list(span.clone(), args);
                factory.new_call(span, function, vec![list])
            }
        },
    };
    MacroExpansion::Expanded(call)
}

/// A non-empty list literal whose elements are all valid arguments.
fn is_numeric_list_literal(expr: &SpannedExpr) -> bool {
    match &expr.node {
        Expr::List(elements) => {
            !elements.is_empty()
                && elements
                    .iter()
                    .all(|elem| !elem.optional && is_valid_arg(&elem.expr))
        }
        _ => false,
    }
}

/// Anything except an aggregate literal or a non-numeric constant.
fn is_valid_arg(expr: &SpannedExpr) -> bool {
    match &expr.node {
        Expr::Constant(c) => {
            matches!(c, Constant::Int(_) | Constant::UInt(_) | Constant::Double(_))
        }
        Expr::List(_) | Expr::Map(_) | Expr::Struct { .. } => false,
        _ => true,
    }
}
