//! Function implementations and registry for CEL evaluation.
//!
//! Functions are stored with their overloads and implementations, and the
//! evaluator dispatches calls on the runtime kinds of the arguments.

use std::collections::HashMap;
use std::sync::Arc;

use super::value::Kind;
use super::{EvalError, Value};

/// A function implementation that takes arguments and returns a value.
///
/// The implementation receives a slice of already-evaluated argument values
/// (including the receiver for member functions as the first argument).
pub type FunctionImpl = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// A function overload with its implementation.
#[derive(Clone)]
pub struct Overload {
    /// The overload ID (e.g., "add_int64_int64").
    pub id: String,
    /// Whether this is a member function (receiver.method(args)).
    pub is_member: bool,
    /// Parameter kinds, receiver first for member functions.
    pub kinds: Vec<Kind>,
    /// The implementation function.
    pub implementation: FunctionImpl,
}

impl Overload {
    /// Create a new overload.
    pub fn new(
        id: impl Into<String>,
        is_member: bool,
        kinds: &[Kind],
        implementation: FunctionImpl,
    ) -> Self {
        Self {
            id: id.into(),
            is_member,
            kinds: kinds.to_vec(),
            implementation,
        }
    }

    /// A global overload: `f(a, b)`.
    pub fn function<F>(id: impl Into<String>, kinds: &[Kind], f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self::new(id, false, kinds, Arc::new(f))
    }

    /// A receiver-style overload: `a.f(b)`.
    pub fn method<F>(id: impl Into<String>, kinds: &[Kind], f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self::new(id, true, kinds, Arc::new(f))
    }

    /// The number of parameters (including receiver for member functions).
    pub fn arity(&self) -> usize {
        self.kinds.len()
    }

    /// Whether this overload accepts the given call shape and arguments.
    pub fn matches(&self, args: &[Value], is_member: bool) -> bool {
        self.is_member == is_member
            && self.kinds.len() == args.len()
            && self
                .kinds
                .iter()
                .zip(args)
                .all(|(kind, arg)| kind.accepts(arg.kind()))
    }

    /// Call this overload with the given arguments.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.implementation)(args)
    }
}

impl std::fmt::Debug for Overload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overload")
            .field("id", &self.id)
            .field("is_member", &self.is_member)
            .field("kinds", &self.kinds)
            .finish()
    }
}

/// A function with all its overloads.
#[derive(Debug, Clone, Default)]
pub struct Function {
    /// The function name.
    pub name: String,
    /// All overloads for this function.
    pub overloads: Vec<Overload>,
}

impl Function {
    /// Create a new function with no overloads.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overloads: Vec::new(),
        }
    }

    /// Add an overload to this function.
    pub fn with_overload(mut self, overload: Overload) -> Self {
        self.overloads.push(overload);
        self
    }

    /// Find an overload by ID.
    pub fn find_overload(&self, id: &str) -> Option<&Overload> {
        self.overloads.iter().find(|o| o.id == id)
    }

    /// First overload accepting these arguments, in registration order.
    pub fn dispatch(&self, args: &[Value], is_member: bool) -> Option<&Overload> {
        self.overloads.iter().find(|o| o.matches(args, is_member))
    }
}

/// Registry of all functions available during evaluation.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Function>,
}

impl FunctionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function. Overloads of an existing name are appended.
    pub fn register(&mut self, function: Function) {
        match self.functions.get_mut(&function.name) {
            Some(existing) => existing.overloads.extend(function.overloads),
            None => {
                self.functions.insert(function.name.clone(), function);
            }
        }
    }

    /// Register every function in `functions`.
    pub fn register_all(&mut self, functions: impl IntoIterator<Item = Function>) {
        for function in functions {
            self.register(function);
        }
    }

    /// Get a function by name.
    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Check if a function exists.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Find an overload by function name and overload ID.
    pub fn find_overload(&self, function_name: &str, overload_id: &str) -> Option<&Overload> {
        self.functions
            .get(function_name)
            .and_then(|f| f.find_overload(overload_id))
    }

    /// Dispatch a call. Unknown names and argument mismatches become error values.
    pub fn call(&self, name: &str, args: &[Value], is_member: bool) -> Value {
        let Some(function) = self.functions.get(name) else {
            return Value::error(EvalError::unknown_function(name));
        };
        match function.dispatch(args, is_member) {
            Some(overload) => overload.call(args),
            None => Value::error(EvalError::no_matching_overload(name)),
        }
    }

    /// Merge another registry into this one.
    ///
    /// If both registries have a function with the same name, the overloads are merged.
    pub fn merge(&mut self, other: FunctionRegistry) {
        for (_, function) in other.functions {
            self.register(function);
        }
    }

    /// Get the number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Iterate over all functions.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Function)> {
        self.functions.iter()
    }
}
