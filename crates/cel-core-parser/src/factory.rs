//! Expression construction during parsing and macro expansion.

use cel_core_common::{
    Comprehension, Constant, Expr, ListElement, MapEntry, SourceInfo, Span, Spanned, SpannedExpr,
    StructField,
};

use crate::error::{ParseError, ParseErrors};

/// Accumulator name used by comprehension macros.
pub const HIDDEN_ACCUMULATOR_VAR: &str = "__result__";

/// Accumulator name used when hidden accumulators are disabled.
pub const LEGACY_ACCUMULATOR_VAR: &str = "@result";

/// Allocates ids, records positions and collects errors for one parse.
///
/// Macro expanders receive a `&mut ExprFactory` and must build every new
/// node through it so that ids stay unique and positions stay complete.
#[derive(Debug)]
pub struct ExprFactory {
    next_id: i64,
    accumulator: &'static str,
    source_info: SourceInfo,
    errors: ParseErrors,
}

impl ExprFactory {
    pub(crate) fn new(source_info: SourceInfo, accumulator: &'static str) -> Self {
        Self {
            next_id: 1,
            accumulator,
            source_info,
            errors: ParseErrors::new(),
        }
    }

    /// Name of the comprehension accumulator variable.
    pub fn accumulator_name(&self) -> &'static str {
        self.accumulator
    }

    /// Allocate a fresh id positioned at the start of `span`.
    pub fn next_id(&mut self, span: &Span) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        self.source_info.record_position(id, span.start);
        id
    }

    pub fn new_expr(&mut self, span: Span, node: Expr) -> SpannedExpr {
        let id = self.next_id(&span);
        Spanned::new(id, node, span)
    }

    pub fn new_const(&mut self, span: Span, value: Constant) -> SpannedExpr {
        self.new_expr(span, Expr::Constant(value))
    }

    pub fn new_ident(&mut self, span: Span, name: impl Into<String>) -> SpannedExpr {
        self.new_expr(span, Expr::Ident(name.into()))
    }

    /// Reference to the comprehension accumulator.
    pub fn new_accu_ident(&mut self, span: Span) -> SpannedExpr {
        self.new_ident(span, self.accumulator)
    }

    pub fn new_select(
        &mut self,
        span: Span,
        operand: SpannedExpr,
        field: impl Into<String>,
    ) -> SpannedExpr {
        self.new_expr(
            span,
            Expr::Select {
                operand: Box::new(operand),
                field: field.into(),
                test_only: false,
            },
        )
    }

    pub fn new_presence_test(
        &mut self,
        span: Span,
        operand: SpannedExpr,
        field: impl Into<String>,
    ) -> SpannedExpr {
        self.new_expr(
            span,
            Expr::Select {
                operand: Box::new(operand),
                field: field.into(),
                test_only: true,
            },
        )
    }

    pub fn new_call(
        &mut self,
        span: Span,
        function: impl Into<String>,
        args: Vec<SpannedExpr>,
    ) -> SpannedExpr {
        self.new_expr(
            span,
            Expr::Call {
                target: None,
                function: function.into(),
                args,
            },
        )
    }

    pub fn new_member_call(
        &mut self,
        span: Span,
        function: impl Into<String>,
        target: SpannedExpr,
        args: Vec<SpannedExpr>,
    ) -> SpannedExpr {
        self.new_expr(
            span,
            Expr::Call {
                target: Some(Box::new(target)),
                function: function.into(),
                args,
            },
        )
    }

    /// List literal with no optional elements.
    pub fn new_list(&mut self, span: Span, elements: Vec<SpannedExpr>) -> SpannedExpr {
        let elements = elements
            .into_iter()
            .map(|expr| ListElement {
                expr,
                optional: false,
            })
            .collect();
        self.new_expr(span, Expr::List(elements))
    }

    /// Empty map literal.
    pub fn new_empty_map(&mut self, span: Span) -> SpannedExpr {
        self.new_expr(span, Expr::Map(Vec::new()))
    }

    pub fn new_comprehension(&mut self, span: Span, comprehension: Comprehension) -> SpannedExpr {
        self.new_expr(span, Expr::Comprehension(Box::new(comprehension)))
    }

    /// Deep copy of `expr` in which every node gets a fresh id.
    pub fn copy(&mut self, expr: &SpannedExpr) -> SpannedExpr {
        rebuild(
            expr,
            &mut |_: i64, span: &Span| self.next_id(span),
            &|_: &SpannedExpr| None,
        )
    }

    /// Record an error and return an `Unspecified` node standing in for the
    /// erroneous expression.
    pub fn report_error(&mut self, span: Span, message: impl Into<String>) -> SpannedExpr {
        self.errors.push(ParseError::new(message, span.clone()));
        self.new_expr(span, Expr::Unspecified)
    }

    pub(crate) fn push_error(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    #[cfg(test)]
    pub(crate) fn error_count(&self) -> usize {
        self.errors.total()
    }

    /// Drop the position of an id that no longer appears in the tree.
    pub(crate) fn retire_id(&mut self, id: i64) {
        tracing::trace!(id, "retiring call id replaced by macro expansion");
        self.source_info.retire_position(id);
    }

    /// Store a copy of a macro call under the id of its expansion.
    ///
    /// Arguments that are themselves expansions are replaced by id-only
    /// `Unspecified` references into the same table.
    pub(crate) fn record_macro_call(
        &mut self,
        expansion_id: i64,
        span: Span,
        function: &str,
        target: Option<&SpannedExpr>,
        args: &[SpannedExpr],
    ) {
        let info = &self.source_info;
        let collapse = |expr: &SpannedExpr| -> SpannedExpr {
            rebuild(expr, &mut |id: i64, _: &Span| id, &|e: &SpannedExpr| {
                info.macro_call(e.id)
                    .map(|_| Spanned::new(e.id, Expr::Unspecified, e.span.clone()))
            })
        };
        let call = Spanned::new(
            0,
            Expr::Call {
                target: target.map(|t| Box::new(collapse(t))),
                function: function.to_string(),
                args: args.iter().map(collapse).collect(),
            },
            span,
        );
        self.source_info.add_macro_call(expansion_id, call);
    }

    pub(crate) fn into_parts(self) -> (SourceInfo, ParseErrors) {
        (self.source_info, self.errors)
    }
}

/// Structural copy of `expr`.
///
/// `relabel` maps each old id (expressions, struct fields, map entries) to
/// the id used in the copy. `replace` may substitute a whole subtree.
fn rebuild(
    expr: &SpannedExpr,
    relabel: &mut dyn FnMut(i64, &Span) -> i64,
    replace: &dyn Fn(&SpannedExpr) -> Option<SpannedExpr>,
) -> SpannedExpr {
    if let Some(replacement) = replace(expr) {
        return replacement;
    }
    let id = relabel(expr.id, &expr.span);
    let node = match &expr.node {
        Expr::Unspecified => Expr::Unspecified,
        Expr::Constant(c) => Expr::Constant(c.clone()),
        Expr::Ident(name) => Expr::Ident(name.clone()),
        Expr::Select {
            operand,
            field,
            test_only,
        } => Expr::Select {
            operand: Box::new(rebuild(operand, relabel, replace)),
            field: field.clone(),
            test_only: *test_only,
        },
        Expr::Call {
            target,
            function,
            args,
        } => Expr::Call {
            target: target.as_ref().map(|t| Box::new(rebuild(t, relabel, replace))),
            function: function.clone(),
            args: args.iter().map(|a| rebuild(a, relabel, replace)).collect(),
        },
        Expr::List(elements) => Expr::List(
            elements
                .iter()
                .map(|elem| ListElement {
                    expr: rebuild(&elem.expr, relabel, replace),
                    optional: elem.optional,
                })
                .collect(),
        ),
        Expr::Struct { name, fields } => Expr::Struct {
            name: name.clone(),
            fields: fields
                .iter()
                .map(|field| StructField {
                    id: relabel(field.id, &field.value.span),
                    name: field.name.clone(),
                    value: rebuild(&field.value, relabel, replace),
                    optional: field.optional,
                })
                .collect(),
        },
        Expr::Map(entries) => Expr::Map(
            entries
                .iter()
                .map(|entry| MapEntry {
                    id: relabel(entry.id, &entry.key.span),
                    key: rebuild(&entry.key, relabel, replace),
                    value: rebuild(&entry.value, relabel, replace),
                    optional: entry.optional,
                })
                .collect(),
        ),
        Expr::Comprehension(comp) => Expr::Comprehension(Box::new(Comprehension {
            iter_var: comp.iter_var.clone(),
            iter_var2: comp.iter_var2.clone(),
            iter_range: rebuild(&comp.iter_range, relabel, replace),
            accu_var: comp.accu_var.clone(),
            accu_init: rebuild(&comp.accu_init, relabel, replace),
            loop_condition: rebuild(&comp.loop_condition, relabel, replace),
            loop_step: rebuild(&comp.loop_step, relabel, replace),
            result: rebuild(&comp.result, relabel, replace),
        })),
    };
    Spanned::new(id, node, expr.span.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cel_core_common::DEFAULT_DESCRIPTION;

    fn factory() -> ExprFactory {
        ExprFactory::new(
            SourceInfo::new(DEFAULT_DESCRIPTION, "a.b"),
            HIDDEN_ACCUMULATOR_VAR,
        )
    }

    #[test]
    fn ids_are_sequential_and_positioned() {
        let mut f = factory();
        let a = f.new_ident(0..1, "a");
        let b = f.new_select(1..3, a, "b");
        assert_eq!(b.id, 2);
        let (info, _) = f.into_parts();
        assert_eq!(info.position(1), Some(0));
        assert_eq!(info.position(2), Some(1));
    }

    #[test]
    fn copy_assigns_fresh_ids() {
        let mut f = factory();
        let a = f.new_ident(0..1, "a");
        let select = f.new_select(1..3, a, "b");
        let copy = f.copy(&select);
        assert_eq!(copy.id, 4);
        match &copy.node {
            Expr::Select { operand, field, .. } => {
                assert_eq!(operand.id, 3);
                assert_eq!(field, "b");
            }
            other => panic!("expected select, got {:?}", other),
        }
    }

    #[test]
    fn report_error_returns_unspecified() {
        let mut f = factory();
        let node = f.report_error(0..3, "boom");
        assert_eq!(node.node, Expr::Unspecified);
        assert_eq!(f.error_count(), 1);
    }

    #[test]
    fn retired_id_loses_position() {
        let mut f = factory();
        let id = f.next_id(&(0..1));
        f.retire_id(id);
        let (info, _) = f.into_parts();
        assert_eq!(info.position(id), None);
    }

    #[test]
    fn recorded_call_collapses_nested_expansions() {
        let mut f = factory();
        let inner = f.new_ident(0..1, "inner");
        let inner_id = inner.id;
        f.record_macro_call(inner_id, 0..1, "has", None, &[]);
        f.record_macro_call(9, 0..3, "filter", Some(&inner), &[]);
        let (info, _) = f.into_parts();
        let call = info.macro_call(9).unwrap();
        assert_eq!(call.id, 0);
        match &call.node {
            Expr::Call { target: Some(t), .. } => {
                assert_eq!(t.id, inner_id);
                assert_eq!(t.node, Expr::Unspecified);
            }
            other => panic!("expected member call, got {:?}", other),
        }
    }
}
