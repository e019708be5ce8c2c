//! `sortBy`.

use cel_core_common::operators;
use cel_core_common::{Span, SpannedExpr};

use super::optional::bind_comprehension;
use super::standard::list_comprehension;
use super::{iter_var, MacroExpansion};
use crate::factory::ExprFactory;

/// Binding that holds the receiver so it is evaluated once.
const SORT_BY_INPUT: &str = "@__sortBy_input__";

/// `list.sortBy(e, key)` becomes
/// `cel.bind(@__sortBy_input__, list,
///     @__sortBy_input__.@sortByAssociatedKeys(@__sortBy_input__.map(e, key)))`.
pub(super) fn expand_sort_by(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    let (Some(list), Ok([var, key])) = (target, <[SpannedExpr; 2]>::try_from(args)) else {
        return MacroExpansion::Expanded(
            factory.report_error(span, "sortBy() requires a receiver and 2 arguments"),
        );
    };
    let var = match iter_var(factory, "sortBy", var) {
        Ok(name) => name,
        Err(error) => return MacroExpansion::Expanded(error),
    };

    let map_range = factory.new_ident(span.clone(), SORT_BY_INPUT);
    let keys = list_comprehension(factory, span.clone(), map_range, var, None, None, key);
    let sort_target = factory.new_ident(span.clone(), SORT_BY_INPUT);
    let sorted = factory.new_member_call(
        span.clone(),
        operators::SORT_BY_ASSOCIATED_KEYS,
        sort_target,
        vec![keys],
    );
    MacroExpansion::Expanded(bind_comprehension(
        factory,
        span,
        SORT_BY_INPUT.to_string(),
        list,
        sorted,
    ))
}
