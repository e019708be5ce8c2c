//! Tree-walking evaluator for CEL expressions.
//!
//! The evaluator performs depth-first traversal of the AST, evaluating
//! each node and returning a `Value`. It supports:
//!
//! - Operators and functions dispatched through the function registry
//! - Short-circuit evaluation for `&&`, `||`, and the conditional
//! - Comprehensions, including two-variable forms and `cel.@block`
//! - Error and unknown propagation (both are values in CEL)

use std::collections::BTreeMap;
use std::sync::OnceLock;

use cel_core_common::{
    operators, Comprehension, Constant, Expr, ListElement, MapEntry, SpannedExpr, StructField,
};

use super::map::MapValueBuilder;
use super::stdlib::type_ident;
use super::value::StructValue;
use super::{
    Activation, EvalError, FunctionRegistry, HierarchicalActivation, ListValueBuilder,
    OptionalValue, Value,
};

/// The CEL expression evaluator.
///
/// Evaluates a CEL AST against an activation (variable bindings) and
/// function registry.
pub struct Evaluator<'a> {
    activation: &'a dyn Activation,
    functions: &'a FunctionRegistry,
}

impl<'a> Evaluator<'a> {
    /// Create a new evaluator.
    pub fn new(activation: &'a dyn Activation, functions: &'a FunctionRegistry) -> Self {
        Self {
            activation,
            functions,
        }
    }

    /// Evaluate an expression.
    pub fn eval(&self, expr: &SpannedExpr) -> Value {
        self.eval_expr(expr)
    }

    fn eval_expr(&self, expr: &SpannedExpr) -> Value {
        match &expr.node {
            Expr::Unspecified => Value::error(EvalError::internal(format!(
                "unspecified expression at id {}",
                expr.id
            ))),
            Expr::Constant(constant) => eval_constant(constant),
            Expr::Ident(name) => self.eval_ident(name),
            Expr::Select {
                operand,
                field,
                test_only: true,
            } => self.eval_has(operand, field),
            Expr::Select { operand, field, .. } => self.eval_select(expr, operand, field),
            Expr::Call {
                target,
                function,
                args,
            } => self.eval_call(target.as_deref(), function, args),
            Expr::List(elements) => self.eval_list(elements),
            Expr::Map(entries) => self.eval_map(entries),
            Expr::Struct { name, fields } => self.eval_struct(name, fields),
            Expr::Comprehension(comprehension) => self.eval_comprehension(comprehension),
        }
    }

    fn eval_ident(&self, name: &str) -> Value {
        let name = name.strip_prefix('.').unwrap_or(name);
        if let Some(type_value) = type_ident(name) {
            return type_value;
        }
        if self.activation.is_unknown(name) {
            return Value::unknown(name);
        }
        self.activation
            .resolve(name)
            .unwrap_or_else(|| Value::error(EvalError::unknown_identifier(name)))
    }

    /// `a.b.c` may name a variable bound under its dotted name.
    fn eval_select(&self, expr: &SpannedExpr, operand: &SpannedExpr, field: &str) -> Value {
        if let Some(qualified) = expr.node.to_qualified_name() {
            let qualified = qualified.strip_prefix('.').unwrap_or(&qualified);
            if self.activation.is_unknown(qualified) {
                return Value::unknown(qualified);
            }
            if self.activation.has(qualified) {
                if let Some(value) = self.activation.resolve(qualified) {
                    return value;
                }
            }
        }

        let value = self.eval_expr(operand);
        access_field(&value, field)
    }

    fn eval_has(&self, operand: &SpannedExpr, field: &str) -> Value {
        let value = self.eval_expr(operand);
        match &value {
            Value::Map(map) => map.has(&Value::string(field)),
            Value::Struct(s) => Value::Bool(s.has_field(field)),
            Value::Error(_) | Value::Unknown(_) => value,
            other => Value::error(EvalError::type_mismatch(
                "map or message",
                &other.type_name(),
            )),
        }
    }

    fn eval_call(
        &self,
        target: Option<&SpannedExpr>,
        function: &str,
        args: &[SpannedExpr],
    ) -> Value {
        if target.is_none() {
            match (function, args) {
                (operators::LOGICAL_AND, [left, right]) => {
                    return self.eval_logical(left, right, false)
                }
                (operators::LOGICAL_OR, [left, right]) => {
                    return self.eval_logical(left, right, true)
                }
                (operators::CONDITIONAL, [cond, then_expr, else_expr]) => {
                    return self.eval_conditional(cond, then_expr, else_expr)
                }
                (operators::NOT_STRICTLY_FALSE, [arg]) => {
                    return match self.eval_expr(arg) {
                        Value::Bool(b) => Value::Bool(b),
                        _ => Value::Bool(true),
                    }
                }
                (operators::INDEX, [container, index]) => {
                    return self.eval_index(container, index, false)
                }
                (operators::OPT_INDEX, [container, index]) => {
                    return self.eval_index(container, index, true)
                }
                (operators::OPT_SELECT, [operand, field]) => {
                    return self.eval_opt_select(operand, field)
                }
                (operators::BLOCK, [slots, result]) => return self.eval_block(slots, result),
                _ => {}
            }
        }

        match target {
            None => match self.eval_all(args) {
                Ok(values) => self.functions.call(function, &values, false),
                Err(value) => value,
            },
            Some(target) => {
                if let Some(qualified) = self.qualified_function(target, function) {
                    return match self.eval_all(args) {
                        Ok(values) => self.functions.call(&qualified, &values, false),
                        Err(value) => value,
                    };
                }
                if let ("or" | "orValue", [alternative]) = (function, args) {
                    if self.functions.contains(function) {
                        return self.eval_optional_or(target, function, alternative);
                    }
                }
                match self.eval_all(std::iter::once(target).chain(args)) {
                    Ok(values) => self.functions.call(function, &values, true),
                    Err(value) => value,
                }
            }
        }
    }

    /// `opt.or(alt)` and `opt.orValue(alt)` only evaluate `alt` when `opt` is
    /// empty.
    fn eval_optional_or(
        &self,
        target: &SpannedExpr,
        function: &str,
        alternative: &SpannedExpr,
    ) -> Value {
        let receiver = self.eval_expr(target);
        if let Value::Optional(OptionalValue::Some(value)) = &receiver {
            return if function == "or" {
                receiver.clone()
            } else {
                value.as_ref().clone()
            };
        }
        if matches!(receiver, Value::Error(_) | Value::Unknown(_)) {
            return receiver;
        }
        let alternative = self.eval_expr(alternative);
        if matches!(alternative, Value::Error(_) | Value::Unknown(_)) {
            return alternative;
        }
        self.functions.call(function, &[receiver, alternative], true)
    }

    /// `math.ceil(x)` parses as a member call on `math`; treat it as the global
    /// `math.ceil` when such a function exists and `math` is not a variable.
    fn qualified_function(&self, target: &SpannedExpr, function: &str) -> Option<String> {
        let prefix = target.node.to_qualified_name()?;
        let prefix = prefix.strip_prefix('.').unwrap_or(&prefix);
        let qualified = format!("{}.{}", prefix, function);
        if !self.functions.contains(&qualified) {
            return None;
        }
        let root = prefix.split('.').next().unwrap_or(prefix);
        if self.activation.has(root) || self.activation.is_unknown(root) {
            return None;
        }
        Some(qualified)
    }

    /// Evaluate call arguments. Unknowns win over errors; otherwise the first
    /// error is returned.
    fn eval_all<'e>(
        &self,
        exprs: impl IntoIterator<Item = &'e SpannedExpr>,
    ) -> Result<Vec<Value>, Value> {
        let mut values = Vec::new();
        let mut unknown: Option<Value> = None;
        let mut error: Option<Value> = None;

        for expr in exprs {
            let value = self.eval_expr(expr);
            match &value {
                Value::Unknown(u) => {
                    unknown = Some(match unknown {
                        Some(Value::Unknown(prev)) => Value::Unknown(prev.merge(u)),
                        _ => value.clone(),
                    });
                }
                Value::Error(_) if error.is_none() => error = Some(value.clone()),
                _ => {}
            }
            values.push(value);
        }

        match unknown.or(error) {
            Some(value) => Err(value),
            None => Ok(values),
        }
    }

    /// `&&` and `||`: short-circuit, and let a deciding operand absorb errors
    /// and unknowns from the other side in either order.
    fn eval_logical(&self, left: &SpannedExpr, right: &SpannedExpr, is_or: bool) -> Value {
        let decisive = Value::Bool(is_or);
        let name = if is_or { operators::LOGICAL_OR } else { operators::LOGICAL_AND };

        let left_val = self.eval_expr(left);
        if matches!(left_val, Value::Bool(b) if b == is_or) {
            return decisive;
        }
        let right_val = self.eval_expr(right);
        if matches!(right_val, Value::Bool(b) if b == is_or) {
            return decisive;
        }

        match (left_val, right_val) {
            (Value::Bool(_), Value::Bool(_)) => Value::Bool(!is_or),
            (Value::Unknown(a), Value::Unknown(b)) => Value::Unknown(a.merge(&b)),
            (unknown @ Value::Unknown(_), _) | (_, unknown @ Value::Unknown(_)) => unknown,
            (error @ Value::Error(_), _) | (_, error @ Value::Error(_)) => error,
            _ => Value::error(EvalError::no_matching_overload(name)),
        }
    }

    fn eval_conditional(
        &self,
        cond: &SpannedExpr,
        then_expr: &SpannedExpr,
        else_expr: &SpannedExpr,
    ) -> Value {
        match self.eval_expr(cond) {
            Value::Bool(true) => self.eval_expr(then_expr),
            Value::Bool(false) => self.eval_expr(else_expr),
            value @ (Value::Error(_) | Value::Unknown(_)) => value,
            _ => Value::error(EvalError::no_matching_overload(operators::CONDITIONAL)),
        }
    }

    fn eval_index(&self, container: &SpannedExpr, index: &SpannedExpr, optional: bool) -> Value {
        let (container, index) = match self.eval_all([container, index]) {
            Ok(mut values) => {
                let index = values.pop().unwrap_or(Value::Null);
                let container = values.pop().unwrap_or(Value::Null);
                (container, index)
            }
            Err(value) => return value,
        };

        if !optional {
            return access_index(&container, &index);
        }
        let inner = match &container {
            Value::Optional(OptionalValue::None) => return Value::optional_none(),
            Value::Optional(OptionalValue::Some(inner)) => inner.as_ref(),
            other => other,
        };
        match inner {
            Value::List(list) => match list_position(&index) {
                Ok(i) => match usize::try_from(i).ok().and_then(|i| list.as_slice().get(i)) {
                    Some(elem) => Value::optional_some(elem.clone()),
                    None => Value::optional_none(),
                },
                Err(err) => Value::error(err),
            },
            Value::Map(map) => match map.find(&index) {
                Ok(Some(value)) => Value::optional_some(value),
                Ok(None) => Value::optional_none(),
                Err(err) => Value::error(err),
            },
            other => Value::error(EvalError::no_matching_overload(&format!(
                "{} on {}",
                operators::OPT_INDEX,
                other.type_name()
            ))),
        }
    }

    fn eval_opt_select(&self, operand: &SpannedExpr, field: &SpannedExpr) -> Value {
        let Expr::Constant(Constant::String(field)) = &field.node else {
            return Value::error(EvalError::internal("optional select requires a field name"));
        };
        let value = self.eval_expr(operand);
        let inner = match &value {
            Value::Optional(OptionalValue::None) => return Value::optional_none(),
            Value::Optional(OptionalValue::Some(inner)) => inner.as_ref(),
            Value::Error(_) | Value::Unknown(_) => return value,
            other => other,
        };
        match inner {
            Value::Map(map) => match map.find(&Value::string(field.as_str())) {
                Ok(Some(v)) => Value::optional_some(v),
                Ok(None) => Value::optional_none(),
                Err(err) => Value::error(err),
            },
            Value::Struct(s) => s
                .field(field)
                .cloned()
                .map(Value::optional_some)
                .unwrap_or_else(Value::optional_none),
            other => Value::error(EvalError::type_mismatch(
                "map or message",
                &other.type_name(),
            )),
        }
    }

    fn eval_block(&self, slots: &SpannedExpr, result: &SpannedExpr) -> Value {
        let Expr::List(elements) = &slots.node else {
            return Value::error(EvalError::internal(
                "cel.@block requires a list of slot expressions",
            ));
        };
        let scope = BlockScope {
            parent: self.activation,
            functions: self.functions,
            slots: elements,
            values: elements.iter().map(|_| OnceLock::new()).collect(),
        };
        let view = SlotView {
            scope: &scope,
            visible: elements.len(),
        };
        Evaluator::new(&view, self.functions).eval_expr(result)
    }

    fn eval_list(&self, elements: &[ListElement]) -> Value {
        let mut builder = ListValueBuilder::with_capacity(elements.len());
        let mut pending: Option<Value> = None;

        for elem in elements {
            let value = self.eval_expr(&elem.expr);
            match value {
                Value::Unknown(u) => {
                    pending = Some(match pending {
                        Some(Value::Unknown(prev)) => Value::Unknown(prev.merge(&u)),
                        _ => Value::Unknown(u),
                    });
                }
                Value::Error(_) => {
                    if pending.is_none() {
                        pending = Some(value);
                    }
                }
                Value::Optional(OptionalValue::Some(inner)) if elem.optional => {
                    builder.add(*inner);
                }
                Value::Optional(OptionalValue::None) if elem.optional => {}
                other => {
                    builder.add(other);
                }
            }
        }

        pending.unwrap_or_else(|| Value::List(builder.build()))
    }

    fn eval_map(&self, entries: &[MapEntry]) -> Value {
        let mut builder = MapValueBuilder::new();

        for entry in entries {
            let key = self.eval_expr(&entry.key);
            if key.is_error() || key.is_unknown() {
                return key;
            }
            let value = self.eval_expr(&entry.value);
            if value.is_error() || value.is_unknown() {
                return value;
            }

            let value = match value {
                Value::Optional(OptionalValue::Some(inner)) if entry.optional => *inner,
                Value::Optional(OptionalValue::None) if entry.optional => continue,
                other => other,
            };
            if let Err(err) = builder.put(key, value) {
                return Value::error(err);
            }
        }

        Value::Map(builder.build())
    }

    fn eval_struct(&self, name: &str, fields: &[StructField]) -> Value {
        let mut values = BTreeMap::new();

        for field in fields {
            let value = self.eval_expr(&field.value);
            if value.is_error() || value.is_unknown() {
                return value;
            }
            let value = match value {
                Value::Optional(OptionalValue::Some(inner)) if field.optional => *inner,
                Value::Optional(OptionalValue::None) if field.optional => continue,
                other => other,
            };
            if values.insert(field.name.clone(), value).is_some() {
                return Value::error(EvalError::invalid_argument(format!(
                    "field '{}' is set more than once",
                    field.name
                )));
            }
        }

        let name = name.strip_prefix('.').unwrap_or(name);
        Value::Struct(StructValue::new(name, values))
    }

    /// Runs a comprehension. Errors in the accumulator do not stop the loop;
    /// the loop condition (usually `@not_strictly_false`) decides that.
    fn eval_comprehension(&self, comp: &Comprehension) -> Value {
        let range = self.eval_expr(&comp.iter_range);

        let items: Vec<(Value, Option<Value>)> = match &range {
            Value::List(list) => match comp.iter_var2 {
                None => list.iter().map(|elem| (elem.clone(), None)).collect(),
                Some(_) => list
                    .iter()
                    .enumerate()
                    .map(|(i, elem)| (Value::Int(i as i64), Some(elem.clone())))
                    .collect(),
            },
            Value::Map(map) => match comp.iter_var2 {
                None => map.iter().map(|(key, _)| (key.to_value(), None)).collect(),
                Some(_) => map
                    .iter()
                    .map(|(key, value)| (key.to_value(), Some(value.clone())))
                    .collect(),
            },
            Value::Error(_) | Value::Unknown(_) => return range,
            other => {
                return Value::error(EvalError::type_mismatch("list or map", &other.type_name()))
            }
        };

        let mut accu = self.eval_expr(&comp.accu_init);

        for (first, second) in items {
            let mut scope = HierarchicalActivation::new(self.activation)
                .with_binding(&comp.accu_var, accu.clone());
            scope.insert(&comp.iter_var, first);
            if let (Some(name), Some(value)) = (&comp.iter_var2, second) {
                scope.insert(name, value);
            }
            let iteration = Evaluator::new(&scope, self.functions);

            match iteration.eval_expr(&comp.loop_condition) {
                Value::Bool(true) => {}
                Value::Bool(false) => break,
                value @ (Value::Error(_) | Value::Unknown(_)) => return value,
                other => {
                    return Value::error(EvalError::type_mismatch("bool", &other.type_name()))
                }
            }

            accu = iteration.eval_expr(&comp.loop_step);
        }

        let scope = HierarchicalActivation::new(self.activation).with_binding(&comp.accu_var, accu);
        Evaluator::new(&scope, self.functions).eval_expr(&comp.result)
    }
}

fn eval_constant(constant: &Constant) -> Value {
    match constant {
        Constant::Null => Value::Null,
        Constant::Bool(b) => Value::Bool(*b),
        Constant::Int(i) => Value::Int(*i),
        Constant::UInt(u) => Value::UInt(*u),
        Constant::Double(d) => Value::Double(*d),
        Constant::String(s) => Value::string(s.as_str()),
        Constant::Bytes(b) => Value::bytes(b.as_slice()),
    }
}

fn access_field(value: &Value, field: &str) -> Value {
    match value {
        Value::Map(map) => map.get(&Value::string(field)),
        Value::Struct(s) => s
            .field(field)
            .cloned()
            .unwrap_or_else(|| Value::error(EvalError::no_such_field(field))),
        Value::Error(_) | Value::Unknown(_) => value.clone(),
        other => Value::error(EvalError::type_mismatch(
            "map or message",
            &other.type_name(),
        )),
    }
}

/// List positions may be given as int, uint or an integral double.
fn list_position(index: &Value) -> Result<i64, EvalError> {
    match index {
        Value::Int(i) => Ok(*i),
        Value::UInt(u) => i64::try_from(*u)
            .map_err(|_| EvalError::out_of_range(format!("index out of range: {}", u))),
        Value::Double(d) if d.fract() == 0.0 && d.abs() < 9.2e18 => Ok(*d as i64),
        other => Err(EvalError::type_mismatch("int", &other.type_name())),
    }
}

fn access_index(container: &Value, index: &Value) -> Value {
    match container {
        Value::List(list) => match list_position(index) {
            Ok(i) => list.get(i),
            Err(err) => Value::error(err),
        },
        Value::Map(map) => map.get(index),
        other => Value::error(EvalError::no_matching_overload(&format!(
            "{} on {}",
            operators::INDEX,
            other.type_name()
        ))),
    }
}

/// Lazily evaluated slots of a `cel.@block`.
struct BlockScope<'a> {
    parent: &'a dyn Activation,
    functions: &'a FunctionRegistry,
    slots: &'a [ListElement],
    values: Vec<OnceLock<Value>>,
}

impl BlockScope<'_> {
    /// Slot `i` sees only the slots before it.
    fn slot(&self, index: usize) -> Value {
        self.values[index]
            .get_or_init(|| {
                tracing::trace!(slot = index, "evaluating block slot");
                let view = SlotView {
                    scope: self,
                    visible: index,
                };
                Evaluator::new(&view, self.functions).eval_expr(&self.slots[index].expr)
            })
            .clone()
    }
}

/// Activation exposing the first `visible` slots as `@index0`, `@index1`, ...
struct SlotView<'s, 'a> {
    scope: &'s BlockScope<'a>,
    visible: usize,
}

impl SlotView<'_, '_> {
    fn slot_index(&self, name: &str) -> Option<usize> {
        let index = name.strip_prefix("@index")?.parse::<usize>().ok()?;
        (index < self.visible).then_some(index)
    }
}

impl Activation for SlotView<'_, '_> {
    fn resolve(&self, name: &str) -> Option<Value> {
        match self.slot_index(name) {
            Some(index) => Some(self.scope.slot(index)),
            None => self.scope.parent.resolve(name),
        }
    }

    fn has(&self, name: &str) -> bool {
        self.slot_index(name).is_some() || self.scope.parent.has(name)
    }

    fn is_unknown(&self, name: &str) -> bool {
        self.slot_index(name).is_none() && self.scope.parent.is_unknown(name)
    }
}
