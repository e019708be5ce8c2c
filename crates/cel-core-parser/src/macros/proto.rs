//! `proto.getExt` and `proto.hasExt`.
//!
//! The extension name is a qualified identifier, so `proto.getExt(msg, a.b.ext)`
//! reads the field named `a.b.ext` on `msg`.

use cel_core_common::{Span, SpannedExpr};

use super::{is_namespace, MacroExpansion};
use crate::factory::ExprFactory;

pub(super) fn expand_get_ext(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    expand(factory, span, target, args, false)
}

pub(super) fn expand_has_ext(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
) -> MacroExpansion {
    expand(factory, span, target, args, true)
}

fn expand(
    factory: &mut ExprFactory,
    span: Span,
    target: Option<SpannedExpr>,
    args: Vec<SpannedExpr>,
    test_only: bool,
) -> MacroExpansion {
    if !is_namespace(&target, "proto") {
        return MacroExpansion::Declined { target, args };
    }
    let Ok([message, extension]) = <[SpannedExpr; 2]>::try_from(args) else {
        return MacroExpansion::Expanded(factory.report_error(span, "invalid extension field"));
    };
    let Some(field) = extension.node.to_qualified_name() else {
        let error = factory.report_error(extension.span, "invalid extension field");
        return MacroExpansion::Expanded(error);
    };
    if let Some(target) = target {
        factory.retire_id(target.id);
    }
    let expr = if test_only {
        factory.new_presence_test(span, message, field)
    } else {
        factory.new_select(span, message, field)
    };
    MacroExpansion::Expanded(expr)
}
