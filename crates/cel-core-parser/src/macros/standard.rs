//! Standard macros: `has`, `all`, `exists`, `exists_one`, `map` and `filter`.

use cel_core_common::operators;
use cel_core_common::{Comprehension, Constant, Expr, Span, SpannedExpr};

use super::{iter_var, MacroExpansion};
use crate::factory::ExprFactory;

/// Expand `has(m.x)` to a presence test on `m`.
pub(super) fn expand_has(
    factory: &mut ExprFactory,
    span: Span,
    _target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    let Some(arg) = args.into_iter().next() else {
        return MacroExpansion::Expanded(
            factory.report_error(span, "invalid argument to has() macro"),
        );
    };
    match arg.node {
        Expr::Select {
            operand,
            field,
            test_only: false,
        } => {
            factory.retire_id(arg.id);
            MacroExpansion::Expanded(factory.new_presence_test(span, *operand, field))
        }
        _ => MacroExpansion::Expanded(
            factory.report_error(arg.span, "invalid argument to has() macro"),
        ),
    }
}

pub(super) fn expand_all(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    expand_one_var(factory, span, "all", target, args, |f, span, range, var, pred| {
        all_comprehension(f, span, range, var, None, pred)
    })
}

pub(super) fn expand_exists(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    expand_one_var(factory, span, "exists", target, args, |f, span, range, var, pred| {
        exists_comprehension(f, span, range, var, None, pred)
    })
}

pub(super) fn expand_exists_one(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    expand_one_var(factory, span, "exists_one", target, args, |f, span, range, var, pred| {
        exists_one_comprehension(f, span, range, var, None, pred)
    })
}

pub(super) fn expand_map(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    expand_one_var(factory, span, "map", target, args, |f, span, range, var, transform| {
        list_comprehension(f, span, range, var, None, None, transform)
    })
}

/// `list.map(v, filter, transform)`.
pub(super) fn expand_filter_map(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    let (Some(range), Ok([var, filter, transform])) = (target, <[SpannedExpr; 3]>::try_from(args))
    else {
        let error = factory.report_error(span, "map() requires a receiver and 3 arguments");
        return MacroExpansion::Expanded(error);
    };
    let var = match iter_var(factory, "map", var) {
        Ok(name) => name,
        Err(error) => return MacroExpansion::Expanded(error),
    };
    MacroExpansion::Expanded(list_comprehension(
        factory,
        span,
        range,
        var,
        None,
        Some(filter),
        transform,
    ))
}

pub(super) fn expand_filter(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    expand_one_var(factory, span, "filter", target, args, |f, span, range, var, pred| {
        let element = f.new_ident(span.clone(), var.clone());
        list_comprehension(f, span, range, var, None, Some(pred), element)
    })
}

type OneVarBuilder = fn(&mut ExprFactory, Span, SpannedExpr, String, SpannedExpr) -> SpannedExpr;

/// Shared shape of `range.macro(var, expr)`.
fn expand_one_var(
    factory: &mut ExprFactory,
    span: Span,
    macro_name: &str,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
    build: OneVarBuilder,
) -> MacroExpansion {
    let (Some(range), Ok([var, body])) = (target, <[SpannedExpr; 2]>::try_from(args)) else {
        return MacroExpansion::Expanded(factory.report_error(
            span,
            format!("{}() requires a receiver and 2 arguments", macro_name),
        ));
    };
    match iter_var(factory, macro_name, var) {
        Ok(name) => MacroExpansion::Expanded(build(factory, span, range, name, body)),
        Err(error) => MacroExpansion::Expanded(error),
    }
}

// ============================================================================
// Comprehension shapes
// ============================================================================

/// `accu = true; while @not_strictly_false(accu) { accu = accu && pred }`.
pub(super) fn all_comprehension(
    f: &mut ExprFactory,
    span: Span,
    range: SpannedExpr,
    iter_var: String,
    iter_var2: Option<String>,
    pred: SpannedExpr,
) -> SpannedExpr {
    let accu_init = f.new_const(span.clone(), Constant::Bool(true));
    let cond_accu = f.new_accu_ident(span.clone());
    let loop_condition = f.new_call(span.clone(), operators::NOT_STRICTLY_FALSE, vec![cond_accu]);
    let step_accu = f.new_accu_ident(span.clone());
    let loop_step = f.new_call(span.clone(), operators::LOGICAL_AND, vec![step_accu, pred]);
    let result = f.new_accu_ident(span.clone());
    let accu_var = f.accumulator_name().to_string();
    f.new_comprehension(
        span,
        Comprehension {
            iter_var,
            iter_var2,
            iter_range: range,
            accu_var,
            accu_init,
            loop_condition,
            loop_step,
            result,
        },
    )
}

/// `accu = false; while @not_strictly_false(!accu) { accu = accu || pred }`.
pub(super) fn exists_comprehension(
    f: &mut ExprFactory,
    span: Span,
    range: SpannedExpr,
    iter_var: String,
    iter_var2: Option<String>,
    pred: SpannedExpr,
) -> SpannedExpr {
    let accu_init = f.new_const(span.clone(), Constant::Bool(false));
    let cond_accu = f.new_accu_ident(span.clone());
    let not_accu = f.new_call(span.clone(), operators::LOGICAL_NOT, vec![cond_accu]);
    let loop_condition = f.new_call(span.clone(), operators::NOT_STRICTLY_FALSE, vec![not_accu]);
    let step_accu = f.new_accu_ident(span.clone());
    let loop_step = f.new_call(span.clone(), operators::LOGICAL_OR, vec![step_accu, pred]);
    let result = f.new_accu_ident(span.clone());
    let accu_var = f.accumulator_name().to_string();
    f.new_comprehension(
        span,
        Comprehension {
            iter_var,
            iter_var2,
            iter_range: range,
            accu_var,
            accu_init,
            loop_condition,
            loop_step,
            result,
        },
    )
}

/// `accu = 0; for ... { accu = pred ? accu + 1 : accu }; accu == 1`.
pub(super) fn exists_one_comprehension(
    f: &mut ExprFactory,
    span: Span,
    range: SpannedExpr,
    iter_var: String,
    iter_var2: Option<String>,
    pred: SpannedExpr,
) -> SpannedExpr {
    let accu_init = f.new_const(span.clone(), Constant::Int(0));
    let loop_condition = f.new_const(span.clone(), Constant::Bool(true));
    let sum_accu = f.new_accu_ident(span.clone());
    let one = f.new_const(span.clone(), Constant::Int(1));
    let increment = f.new_call(span.clone(), operators::ADD, vec![sum_accu, one]);
    let keep_accu = f.new_accu_ident(span.clone());
    let loop_step = f.new_call(
        span.clone(),
        operators::CONDITIONAL,
        vec![pred, increment, keep_accu],
    );
    let result_accu = f.new_accu_ident(span.clone());
    let expected = f.new_const(span.clone(), Constant::Int(1));
    let result = f.new_call(span.clone(), operators::EQUALS, vec![result_accu, expected]);
    let accu_var = f.accumulator_name().to_string();
    f.new_comprehension(
        span,
        Comprehension {
            iter_var,
            iter_var2,
            iter_range: range,
            accu_var,
            accu_init,
            loop_condition,
            loop_step,
            result,
        },
    )
}

/// `accu = []; for ... { accu = filter ? accu + [transform] : accu }`.
///
/// Without a filter the step is the bare append.
pub(super) fn list_comprehension(
    f: &mut ExprFactory,
    span: Span,
    range: SpannedExpr,
    iter_var: String,
    iter_var2: Option<String>,
    filter: Option<SpannedExpr>,
    transform: SpannedExpr,
) -> SpannedExpr {
    let accu_init = f.new_list(span.clone(), Vec::new());
    let loop_condition = f.new_const(span.clone(), Constant::Bool(true));
    let append_accu = f.new_accu_ident(span.clone());
    let element = f.new_list(span.clone(), vec![transform]);
    let append = f.new_call(span.clone(), operators::ADD, vec![append_accu, element]);
    let loop_step = guarded_step(f, span.clone(), filter, append);
    let result = f.new_accu_ident(span.clone());
    let accu_var = f.accumulator_name().to_string();
    f.new_comprehension(
        span,
        Comprehension {
            iter_var,
            iter_var2,
            iter_range: range,
            accu_var,
            accu_init,
            loop_condition,
            loop_step,
            result,
        },
    )
}

/// `filter ? step : accu`, or `step` when there is no filter.
pub(super) fn guarded_step(
    f: &mut ExprFactory,
    span: Span,
    filter: Option<SpannedExpr>,
    step: SpannedExpr,
) -> SpannedExpr {
    match filter {
        Some(filter) => {
            let keep_accu = f.new_accu_ident(span.clone());
            f.new_call(span, operators::CONDITIONAL, vec![filter, step, keep_accu])
        }
        None => step,
    }
}
