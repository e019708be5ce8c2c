//! `optMap` and `optFlatMap`.
//!
//! `opt.optMap(v, f)` becomes
//! `opt.hasValue() ? optional.of(<bind v = opt.value() in f>) : optional.none()`,
//! where the binding is a comprehension over an empty list whose accumulator
//! is `v`. `optFlatMap` omits the `optional.of` wrapper.

use cel_core_common::operators;
use cel_core_common::{Comprehension, Constant, Span, SpannedExpr};

use super::{iter_var, MacroExpansion};
use crate::factory::ExprFactory;

/// Iteration variable of the never-iterated binding comprehension.
pub(super) const UNUSED_ITER_VAR: &str = "#unused";

pub(super) fn expand_opt_map(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    expand(factory, span, "optMap", target, args, true)
}

pub(super) fn expand_opt_flat_map(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    expand(factory, span, "optFlatMap", target, args, false)
}

fn expand(
    factory: &mut ExprFactory,
    span: Span,
    macro_name: &str,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
    wrap: bool,
) -> MacroExpansion {
    let (Some(target), Ok([var, body])) = (target, <[SpannedExpr; 2]>::try_from(args)) else {
        return MacroExpansion::Expanded(factory.report_error(
            span,
            format!("{}() requires a receiver and 2 arguments", macro_name),
        ));
    };
    let var = match iter_var(factory, macro_name, var) {
        Ok(name) => name,
        Err(error) => return MacroExpansion::Expanded(error),
    };

    let target_copy = factory.copy(&target);
    let has_value = factory.new_member_call(span.clone(), "hasValue", target, Vec::new());
    let value = factory.new_member_call(span.clone(), "value", target_copy, Vec::new());
    let binding = bind_comprehension(factory, span.clone(), var, value, body);
    let present = if wrap {
        factory.new_call(span.clone(), "optional.of", vec![binding])
    } else {
        binding
    };
    let absent = factory.new_call(span.clone(), "optional.none", Vec::new());
    MacroExpansion::Expanded(factory.new_call(
        span,
        operators::CONDITIONAL,
        vec![has_value, present, absent],
    ))
}

/// `var = init` visible in `body`, expressed as a comprehension over `[]`.
pub(super) fn bind_comprehension(
    f: &mut ExprFactory,
    span: Span,
    var: String,
    init: SpannedExpr,
    body: SpannedExpr,
) -> SpannedExpr {
    let iter_range = f.new_list(span.clone(), Vec::new());
    let loop_condition = f.new_const(span.clone(), Constant::Bool(false));
    let loop_step = f.new_ident(span.clone(), var.clone());
    f.new_comprehension(
        span,
        Comprehension {
            iter_var: UNUSED_ITER_VAR.to_string(),
            iter_var2: None,
            iter_range,
            accu_var: var,
            accu_init: init,
            loop_condition,
            loop_step,
            result: body,
        },
    )
}
