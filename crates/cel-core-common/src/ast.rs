//! CEL expression IR.
//!
//! Every operator is represented as a [`Expr::Call`] with a canonical function
//! name (see [`crate::operators`]), and every macro is expanded into either a
//! [`Expr::Select`] presence test or an [`Expr::Comprehension`].

/// Source span for error reporting.
/// Uses byte offsets into the source string.
pub type Span = std::ops::Range<usize>;

/// IR node with source location and unique ID.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    /// Unique identifier for this node (1-indexed, assigned during parsing).
    /// `0` marks a synthetic node with no position.
    pub id: i64,
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(id: i64, node: T, span: Span) -> Self {
        Self { id, node, span }
    }
}

/// A spanned expression.
pub type SpannedExpr = Spanned<Expr>;

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

/// A list element that may be optional (`[?x]`).
#[derive(Debug, Clone, PartialEq)]
pub struct ListElement {
    pub expr: SpannedExpr,
    pub optional: bool,
}

/// A map entry that may be optional (`{?k: v}`).
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub id: i64,
    pub key: SpannedExpr,
    pub value: SpannedExpr,
    pub optional: bool,
}

/// A struct field initializer that may be optional (`T{?f: v}`).
#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub id: i64,
    pub name: String,
    pub value: SpannedExpr,
    pub optional: bool,
}

/// Comprehension over a list or map.
///
/// ```text
/// let accu_var = accu_init
/// for (let iter_var, iter_var2 in iter_range) {
///    if (!loop_condition) { break }
///    accu_var = loop_step
/// }
/// return result
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    /// The name of the first iteration variable.
    pub iter_var: String,
    /// The name of the second iteration variable, set by the two-variable macros.
    pub iter_var2: Option<String>,
    pub iter_range: SpannedExpr,
    pub accu_var: String,
    pub accu_init: SpannedExpr,
    /// Returns false when the result has been computed.
    pub loop_condition: SpannedExpr,
    pub loop_step: SpannedExpr,
    pub result: SpannedExpr,
}

/// CEL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Placeholder produced for erroneous input, and the id-only reference
    /// used inside recorded macro calls.
    Unspecified,

    Constant(Constant),

    /// Identifier. Root-scoped identifiers keep their leading dot (`.a`).
    Ident(String),

    /// Field selection `operand.field`, or the presence test `has(operand.field)`
    /// when `test_only` is set.
    Select {
        operand: Box<SpannedExpr>,
        field: String,
        test_only: bool,
    },

    /// Function call, member call (`target` set) or operator.
    Call {
        target: Option<Box<SpannedExpr>>,
        function: String,
        args: Vec<SpannedExpr>,
    },

    List(Vec<ListElement>),

    /// Message literal `a.b.Type{field: value}`.
    Struct {
        name: String,
        fields: Vec<StructField>,
    },

    Map(Vec<MapEntry>),

    Comprehension(Box<Comprehension>),
}

impl Expr {
    /// Returns the identifier name if this is an `Ident`.
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the function name if this is a call to any function.
    pub fn call_function(&self) -> Option<&str> {
        match self {
            Expr::Call { function, .. } => Some(function),
            _ => None,
        }
    }

    /// Returns true if this is a call to `function`.
    pub fn is_call_to(&self, function: &str) -> bool {
        self.call_function() == Some(function)
    }

    /// Render a chain of identifiers and non-test selects as a dotted name.
    ///
    /// `a.b.c` gives `Some("a.b.c")`; anything else gives `None`.
    pub fn to_qualified_name(&self) -> Option<String> {
        match self {
            Expr::Ident(name) => Some(name.clone()),
            Expr::Select {
                operand,
                field,
                test_only: false,
            } => operand
                .node
                .to_qualified_name()
                .map(|prefix| format!("{}.{}", prefix, field)),
            _ => None,
        }
    }
}

impl SpannedExpr {
    /// Visit every node of the tree in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a SpannedExpr)) {
        visit(self);
        match &self.node {
            Expr::Unspecified | Expr::Constant(_) | Expr::Ident(_) => {}
            Expr::Select { operand, .. } => operand.walk(visit),
            Expr::Call { target, args, .. } => {
                if let Some(target) = target {
                    target.walk(visit);
                }
                for arg in args {
                    arg.walk(visit);
                }
            }
            Expr::List(elements) => {
                for element in elements {
                    element.expr.walk(visit);
                }
            }
            Expr::Struct { fields, .. } => {
                for field in fields {
                    field.value.walk(visit);
                }
            }
            Expr::Map(entries) => {
                for entry in entries {
                    entry.key.walk(visit);
                    entry.value.walk(visit);
                }
            }
            Expr::Comprehension(comp) => {
                comp.iter_range.walk(visit);
                comp.accu_init.walk(visit);
                comp.loop_condition.walk(visit);
                comp.loop_step.walk(visit);
                comp.result.walk(visit);
            }
        }
    }

    /// Largest node id in the tree, including struct field and map entry ids.
    pub fn max_id(&self) -> i64 {
        let mut max = 0;
        self.walk(&mut |e| {
            max = max.max(e.id);
            match &e.node {
                Expr::Struct { fields, .. } => {
                    for field in fields {
                        max = max.max(field.id);
                    }
                }
                Expr::Map(entries) => {
                    for entry in entries {
                        max = max.max(entry.id);
                    }
                }
                _ => {}
            }
        });
        max
    }
}
