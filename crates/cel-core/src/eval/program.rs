//! Compiled CEL program ready for evaluation.
//!
//! A `Program` combines a parsed AST with a function registry,
//! providing a convenient interface for evaluating expressions.

use std::sync::Arc;

use super::{Activation, EmptyActivation, Evaluator, FunctionRegistry, Value};
use crate::Ast;

/// A compiled CEL program ready for evaluation.
///
/// The program is immutable once built and can be shared across threads;
/// every call to [`Program::eval`] is independent.
#[derive(Clone)]
pub struct Program {
    ast: Arc<Ast>,
    functions: Arc<FunctionRegistry>,
}

impl Program {
    /// Create a new program from an AST and function registry.
    pub fn new(ast: Arc<Ast>, functions: Arc<FunctionRegistry>) -> Self {
        Self { ast, functions }
    }

    /// Get the AST for this program.
    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    /// Get the function registry for this program.
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Evaluate the program with the given variable bindings.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn eval(&self, activation: &dyn Activation) -> Value {
        let result = Evaluator::new(activation, &self.functions).eval(self.ast.expr());
        if let Value::Error(err) = &result {
            tracing::debug!(kind = ?err.kind, error = %err, "evaluation produced an error");
        }
        result
    }

    /// Evaluate the program with no variable bindings.
    pub fn eval_empty(&self) -> Value {
        self.eval(&EmptyActivation)
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("source", &self.ast.source())
            .field("functions", &self.functions.len())
            .finish()
    }
}
