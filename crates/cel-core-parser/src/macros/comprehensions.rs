//! Two-variable comprehension macros.
//!
//! For lists the variables bind the index and the element; for maps they
//! bind the key and the value.

use cel_core_common::operators;
use cel_core_common::{Comprehension, Constant, Span, SpannedExpr};

use super::standard::{
    all_comprehension, exists_comprehension, exists_one_comprehension, guarded_step,
    list_comprehension,
};
use super::{iter_vars, MacroExpansion};
use crate::factory::ExprFactory;

pub(super) fn expand_all(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    expand_predicate(factory, span, "all", target, args, all_comprehension)
}

pub(super) fn expand_exists(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    expand_predicate(factory, span, "exists", target, args, exists_comprehension)
}

pub(super) fn expand_exists_one(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    expand_predicate(factory, span, "existsOne", target, args, exists_one_comprehension)
}

/// `range.transformList(i, v, [filter,] transform)`.
pub(super) fn expand_transform_list(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    let Some(parts) = split_transform(factory, &span, "transformList", target, args) else {
        return MacroExpansion::Expanded(factory.report_error(
            span,
            "transformList() requires a receiver and 3 or 4 arguments",
        ));
    };
    let TransformParts {
        range,
        first,
        second,
        filter,
        body,
    } = match parts {
        Ok(parts) => parts,
        Err(error) => return MacroExpansion::Expanded(error),
    };
    MacroExpansion::Expanded(list_comprehension(
        factory,
        span,
        range,
        first,
        Some(second),
        filter,
        body,
    ))
}

/// `range.transformMap(k, v, [filter,] transform)`: inserts `k -> transform`.
pub(super) fn expand_transform_map(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    let Some(parts) = split_transform(factory, &span, "transformMap", target, args) else {
        return MacroExpansion::Expanded(factory.report_error(
            span,
            "transformMap() requires a receiver and 3 or 4 arguments",
        ));
    };
    let parts = match parts {
        Ok(parts) => parts,
        Err(error) => return MacroExpansion::Expanded(error),
    };
    let accu = factory.new_accu_ident(span.clone());
    let key = factory.new_ident(span.clone(), parts.first.clone());
    let insert = factory.new_call(
        span.clone(),
        operators::MAP_INSERT,
        vec![accu, key, parts.body],
    );
    MacroExpansion::Expanded(map_comprehension(
        factory,
        span,
        parts.range,
        parts.first,
        parts.second,
        parts.filter,
        insert,
    ))
}

/// `range.transformMapEntry(k, v, [filter,] entry)`: merges the single-entry
/// map produced by `entry`.
pub(super) fn expand_transform_map_entry(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    let Some(parts) = split_transform(factory, &span, "transformMapEntry", target, args) else {
        return MacroExpansion::Expanded(factory.report_error(
            span,
            "transformMapEntry() requires a receiver and 3 or 4 arguments",
        ));
    };
    let parts = match parts {
        Ok(parts) => parts,
        Err(error) => return MacroExpansion::Expanded(error),
    };
    let accu = factory.new_accu_ident(span.clone());
    let insert = factory.new_call(span.clone(), operators::MAP_INSERT, vec![accu, parts.body]);
    MacroExpansion::Expanded(map_comprehension(
        factory,
        span,
        parts.range,
        parts.first,
        parts.second,
        parts.filter,
        insert,
    ))
}

type PredicateBuilder =
    fn(&mut ExprFactory, Span, SpannedExpr, String, Option<String>, SpannedExpr) -> SpannedExpr;

/// Shared shape of `range.macro(first, second, pred)`.
fn expand_predicate(
    factory: &mut ExprFactory,
    span: Span,
    macro_name: &str,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
    build: PredicateBuilder,
) -> MacroExpansion {
    let (Some(range), Ok([first, second, pred])) = (target, <[SpannedExpr; 3]>::try_from(args))
    else {
        return MacroExpansion::Expanded(factory.report_error(
            span,
            format!("{}() requires a receiver and 3 arguments", macro_name),
        ));
    };
    match iter_vars(factory, macro_name, first, second) {
        Ok((first, second)) => {
            MacroExpansion::Expanded(build(factory, span, range, first, Some(second), pred))
        }
        Err(error) => MacroExpansion::Expanded(error),
    }
}

struct TransformParts {
    range: SpannedExpr,
    first: String,
    second: String,
    filter: Option<SpannedExpr>,
    body: SpannedExpr,
}

/// Split `(first, second, [filter,] body)` and validate the variables.
///
/// `None` means the call has the wrong shape; `Some(Err(_))` carries the
/// error node for a hygiene failure.
fn split_transform(
    factory: &mut ExprFactory,
    span: &Span,
    macro_name: &str,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> Option<Result<TransformParts, SpannedExpr>> {
    let range = target?;
    let mut args = args.into_iter();
    let (first, second) = (args.next()?, args.next()?);
    let rest: Vec<SpannedExpr> = args.collect();
    let (filter, body) = match <[SpannedExpr; 2]>::try_from(rest) {
        Ok([filter, body]) => (Some(filter), body),
        Err(mut rest) if rest.len() == 1 => (None, rest.pop()?),
        Err(_) => return None,
    };
    tracing::trace!(macro_name, start = span.start, "expanding two-variable transform");
    Some(
        iter_vars(factory, macro_name, first, second).map(|(first, second)| TransformParts {
            range,
            first,
            second,
            filter,
            body,
        }),
    )
}

/// `accu = {}; for ... { accu = filter ? insert : accu }`.
fn map_comprehension(
    f: &mut ExprFactory,
    span: Span,
    range: SpannedExpr,
    iter_var: String,
    iter_var2: String,
    filter: Option<SpannedExpr>,
    insert: SpannedExpr,
) -> SpannedExpr {
    let accu_init = f.new_empty_map(span.clone());
    let loop_condition = f.new_const(span.clone(), Constant::Bool(true));
    let loop_step = guarded_step(f, span.clone(), filter, insert);
    let result = f.new_accu_ident(span.clone());
    let accu_var = f.accumulator_name().to_string();
    f.new_comprehension(
        span,
        Comprehension {
            iter_var,
            iter_var2: Some(iter_var2),
            iter_range: range,
            accu_var,
            accu_init,
            loop_condition,
            loop_step,
            result,
        },
    )
}
