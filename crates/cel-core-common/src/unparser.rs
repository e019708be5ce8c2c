//! CEL expression unparser (IR to source text).
//!
//! The output is semantically equivalent to the original expression but may
//! differ in formatting (whitespace, parenthesization, etc.).
//!
//! When a [`SourceInfo`] with recorded macro calls is supplied, every macro
//! expansion prints as the call that produced it, so `has(a.b).filter(c, c)`
//! renders as written instead of as two comprehensions.

use crate::ast::{Comprehension, Constant, Expr, ListElement, MapEntry, SpannedExpr, StructField};
use crate::operators;
use crate::source_info::SourceInfo;

/// Convert an expression to source text, printing comprehensions in their
/// macro form where the shape is recognizable.
pub fn unparse(expr: &SpannedExpr) -> String {
    Unparser { info: None }.expr(expr)
}

/// Convert an expression to source text, printing each recorded macro
/// expansion as its original call.
pub fn unparse_with_source_info(expr: &SpannedExpr, info: &SourceInfo) -> String {
    Unparser { info: Some(info) }.expr(expr)
}

struct Unparser<'a> {
    info: Option<&'a SourceInfo>,
}

impl Unparser<'_> {
    fn expr(&self, expr: &SpannedExpr) -> String {
        if let Some(call) = self.info.and_then(|info| info.macro_call(expr.id)) {
            return self.expr(call);
        }
        match &expr.node {
            Expr::Unspecified => "<error>".to_string(),
            Expr::Constant(c) => constant(c),
            Expr::Ident(name) => name.clone(),
            Expr::Select {
                operand,
                field,
                test_only: true,
            } => format!("has({}.{})", self.primary(operand), field),
            Expr::Select { operand, field, .. } => format!("{}.{}", self.primary(operand), field),
            Expr::Call {
                target,
                function,
                args,
            } => self.call(target.as_deref(), function, args),
            Expr::List(elements) => self.list(elements),
            Expr::Map(entries) => self.map(entries),
            Expr::Struct { name, fields } => self.message(name, fields),
            Expr::Comprehension(comp) => self.comprehension(comp),
        }
    }

    fn call(&self, target: Option<&SpannedExpr>, function: &str, args: &[SpannedExpr]) -> String {
        match (function, target, args) {
            (operators::CONDITIONAL, None, [cond, then_expr, else_expr]) => {
                let cond_str = if is_operator(cond, operators::CONDITIONAL) {
                    format!("({})", self.expr(cond))
                } else {
                    self.expr(cond)
                };
                format!("{} ? {} : {}", cond_str, self.expr(then_expr), self.expr(else_expr))
            }
            (operators::INDEX, None, [operand, index]) => {
                format!("{}[{}]", self.primary(operand), self.expr(index))
            }
            (operators::OPT_INDEX, None, [operand, index]) => {
                format!("{}[?{}]", self.primary(operand), self.expr(index))
            }
            (
                operators::OPT_SELECT,
                None,
                [operand, SpannedExpr {
                    node: Expr::Constant(Constant::String(field)),
                    ..
                }],
            ) => format!("{}.?{}", self.primary(operand), field),
            (_, None, [operand]) if operators::unary_symbol(function).is_some() => {
                let symbol = operators::unary_symbol(function).unwrap_or_default();
                if is_any_operator(operand) {
                    format!("{}({})", symbol, self.expr(operand))
                } else {
                    format!("{}{}", symbol, self.expr(operand))
                }
            }
            (_, None, [left, right]) if operators::binary_symbol(function).is_some() => {
                let symbol = operators::binary_symbol(function).unwrap_or_default();
                let prec = operators::precedence(function).unwrap_or(0);
                format!(
                    "{} {} {}",
                    self.operand(left, prec, false),
                    symbol,
                    self.operand(right, prec, true)
                )
            }
            (_, Some(target), _) => {
                format!("{}.{}({})", self.primary(target), function, self.args(args))
            }
            (_, None, _) => format!("{}({})", function, self.args(args)),
        }
    }

    /// Operand of a binary operator, parenthesized when it binds looser.
    fn operand(&self, expr: &SpannedExpr, parent_prec: u8, right: bool) -> String {
        let needs_parens = match self.resolve(expr).call_function() {
            Some(function) if is_any_operator(self.resolve_spanned(expr)) => {
                let prec = operators::precedence(function).unwrap_or(u8::MAX);
                prec < parent_prec || (right && prec == parent_prec)
            }
            _ => false,
        };
        if needs_parens {
            format!("({})", self.expr(expr))
        } else {
            self.expr(expr)
        }
    }

    /// Receiver of a select, index or member call.
    fn primary(&self, expr: &SpannedExpr) -> String {
        if is_any_operator(self.resolve_spanned(expr)) {
            format!("({})", self.expr(expr))
        } else {
            self.expr(expr)
        }
    }

    /// Follow a recorded macro call so precedence decisions see the printed shape.
    fn resolve_spanned<'e>(&'e self, expr: &'e SpannedExpr) -> &'e SpannedExpr {
        self.info
            .and_then(|info| info.macro_call(expr.id))
            .unwrap_or(expr)
    }

    fn resolve<'e>(&'e self, expr: &'e SpannedExpr) -> &'e Expr {
        &self.resolve_spanned(expr).node
    }

    fn args(&self, args: &[SpannedExpr]) -> String {
        args.iter()
            .map(|arg| self.expr(arg))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn list(&self, elements: &[ListElement]) -> String {
        let items: Vec<String> = elements
            .iter()
            .map(|elem| {
                if elem.optional {
                    format!("?{}", self.expr(&elem.expr))
                } else {
                    self.expr(&elem.expr)
                }
            })
            .collect();
        format!("[{}]", items.join(", "))
    }

    fn map(&self, entries: &[MapEntry]) -> String {
        let items: Vec<String> = entries
            .iter()
            .map(|entry| {
                let key = self.expr(&entry.key);
                let value = self.expr(&entry.value);
                if entry.optional {
                    format!("?{}: {}", key, value)
                } else {
                    format!("{}: {}", key, value)
                }
            })
            .collect();
        format!("{{{}}}", items.join(", "))
    }

    fn message(&self, name: &str, fields: &[StructField]) -> String {
        let items: Vec<String> = fields
            .iter()
            .map(|f| {
                if f.optional {
                    format!("?{}: {}", f.name, self.expr(&f.value))
                } else {
                    format!("{}: {}", f.name, self.expr(&f.value))
                }
            })
            .collect();
        format!("{}{{{}}}", name, items.join(", "))
    }

    /// Print a comprehension in macro syntax when it has one of the standard
    /// shapes, otherwise as a pseudo-call listing all of its parts.
    fn comprehension(&self, comp: &Comprehension) -> String {
        let accu = comp.accu_var.as_str();
        let is_accu = |e: &SpannedExpr| e.node.as_ident() == Some(accu);
        let range = self.primary(&comp.iter_range);

        if comp.iter_var2.is_none() && is_accu(&comp.result) {
            if let Expr::Call { function, args, .. } = &comp.loop_step.node {
                match (function.as_str(), args.as_slice(), &comp.accu_init.node) {
                    (operators::LOGICAL_AND, [left, pred], Expr::Constant(Constant::Bool(true)))
                        if is_accu(left) =>
                    {
                        return format!("{}.all({}, {})", range, comp.iter_var, self.expr(pred));
                    }
                    (operators::LOGICAL_OR, [left, pred], Expr::Constant(Constant::Bool(false)))
                        if is_accu(left) =>
                    {
                        return format!("{}.exists({}, {})", range, comp.iter_var, self.expr(pred));
                    }
                    (operators::ADD, [left, right], Expr::List(init))
                        if is_accu(left) && init.is_empty() =>
                    {
                        if let Expr::List(elems) = &right.node {
                            if let [elem] = elems.as_slice() {
                                return format!(
                                    "{}.map({}, {})",
                                    range,
                                    comp.iter_var,
                                    self.expr(&elem.expr)
                                );
                            }
                        }
                    }
                    (operators::CONDITIONAL, [cond, then_expr, else_expr], Expr::List(init))
                        if init.is_empty() && is_accu(else_expr) =>
                    {
                        if let Some(appended) = appended_element(then_expr) {
                            if appended.node.as_ident() == Some(comp.iter_var.as_str()) {
                                return format!(
                                    "{}.filter({}, {})",
                                    range,
                                    comp.iter_var,
                                    self.expr(cond)
                                );
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        let iter_vars = match &comp.iter_var2 {
            Some(second) => format!("{}, {}", comp.iter_var, second),
            None => comp.iter_var.clone(),
        };
        format!(
            "__comprehension__({}, {}, {}, {}, {}, {}, {})",
            self.expr(&comp.iter_range),
            iter_vars,
            comp.accu_var,
            self.expr(&comp.accu_init),
            self.expr(&comp.loop_condition),
            self.expr(&comp.loop_step),
            self.expr(&comp.result)
        )
    }
}

fn is_operator(expr: &SpannedExpr, name: &str) -> bool {
    matches!(&expr.node, Expr::Call { target: None, function, .. } if function == name)
}

/// True for calls printed with infix or prefix syntax.
fn is_any_operator(expr: &SpannedExpr) -> bool {
    match &expr.node {
        Expr::Call {
            target: None,
            function,
            ..
        } => {
            function == operators::CONDITIONAL
                || operators::binary_symbol(function).is_some()
                || operators::unary_symbol(function).is_some()
        }
        _ => false,
    }
}

fn constant(c: &Constant) -> String {
    match c {
        Constant::Null => "null".to_string(),
        Constant::Bool(b) => b.to_string(),
        Constant::Int(n) => n.to_string(),
        Constant::UInt(n) => format!("{}u", n),
        Constant::Double(f) => format_double(*f),
        Constant::String(s) => format!("\"{}\"", escape_string(s)),
        Constant::Bytes(b) => format!("b\"{}\"", escape_bytes(b)),
    }
}

/// Format a double, ensuring it always has a decimal point or exponent.
/// The single element `e` of a step shaped `_ + [e]`.
fn appended_element(step: &SpannedExpr) -> Option<&SpannedExpr> {
    let Expr::Call { function, args, .. } = &step.node else {
        return None;
    };
    match (function.as_str(), args.as_slice()) {
        (operators::ADD, [_, appended]) => match &appended.node {
            Expr::List(elems) => match elems.as_slice() {
                [elem] => Some(&elem.expr),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    }
}

fn format_double(f: f64) -> String {
    if f.is_nan() {
        return "double(\"NaN\")".to_string();
    }
    if f.is_infinite() {
        return if f.is_sign_positive() {
            "double(\"Infinity\")".to_string()
        } else {
            "double(\"-Infinity\")".to_string()
        };
    }

    let s = f.to_string();
    if s.contains('.') || s.contains('e') || s.contains('E') {
        s
    } else {
        format!("{}.0", s)
    }
}

fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => result.push_str(&format!("\\u{:04x}", c as u32)),
            c => result.push(c),
        }
    }
    result
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        match b {
            b'\\' => result.push_str("\\\\"),
            b'"' => result.push_str("\\\""),
            b'\n' => result.push_str("\\n"),
            b'\r' => result.push_str("\\r"),
            b'\t' => result.push_str("\\t"),
            b if b.is_ascii_graphic() || b == b' ' => result.push(b as char),
            b => result.push_str(&format!("\\x{:02x}", b)),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Spanned;

    fn e(id: i64, node: Expr) -> SpannedExpr {
        Spanned::new(id, node, 0..0)
    }

    fn ident(id: i64, name: &str) -> SpannedExpr {
        e(id, Expr::Ident(name.to_string()))
    }

    fn call(id: i64, function: &str, args: Vec<SpannedExpr>) -> SpannedExpr {
        e(
            id,
            Expr::Call {
                target: None,
                function: function.to_string(),
                args,
            },
        )
    }

    #[test]
    fn binary_parenthesizes_looser_operands() {
        let sum = call(2, operators::ADD, vec![ident(1, "x"), ident(3, "y")]);
        let product = call(4, operators::MULTIPLY, vec![sum, ident(5, "z")]);
        assert_eq!(unparse(&product), "(x + y) * z");
    }

    #[test]
    fn right_nested_same_precedence_keeps_parens() {
        let inner = call(3, operators::SUBTRACT, vec![ident(2, "b"), ident(4, "c")]);
        let outer = call(1, operators::SUBTRACT, vec![ident(5, "a"), inner]);
        assert_eq!(unparse(&outer), "a - (b - c)");
    }

    #[test]
    fn constants() {
        assert_eq!(unparse(&e(1, Expr::Constant(Constant::Double(3.0)))), "3.0");
        assert_eq!(unparse(&e(1, Expr::Constant(Constant::UInt(7)))), "7u");
        assert_eq!(
            unparse(&e(1, Expr::Constant(Constant::Bytes(vec![0x61, 0xff])))),
            "b\"a\\xff\""
        );
        assert_eq!(
            unparse(&e(1, Expr::Constant(Constant::String("a\"b".to_string())))),
            "\"a\\\"b\""
        );
    }

    #[test]
    fn presence_test_prints_as_has() {
        let select = e(
            2,
            Expr::Select {
                operand: Box::new(ident(1, "a")),
                field: "b".to_string(),
                test_only: true,
            },
        );
        assert_eq!(unparse(&select), "has(a.b)");
    }

    #[test]
    fn recorded_macro_call_replaces_expansion() {
        let mut info = SourceInfo::new("<input>", "m(x)");
        let expansion = ident(7, "expanded");
        info.add_macro_call(7, call(0, "m", vec![ident(0, "x")]));
        assert_eq!(unparse_with_source_info(&expansion, &info), "m(x)");
        assert_eq!(unparse(&expansion), "expanded");
    }
}
