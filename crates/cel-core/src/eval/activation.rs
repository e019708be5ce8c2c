//! Variable bindings for CEL evaluation.
//!
//! The `Activation` trait provides a way to resolve variable names to values
//! during expression evaluation. Different implementations support various
//! use cases like simple maps, hierarchical scopes, and lazy evaluation.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use super::Value;

/// Trait for resolving variable bindings during evaluation.
///
/// An activation provides the values for variables referenced in CEL expressions.
/// Implementations can support simple key-value lookup, hierarchical scopes,
/// or lazy evaluation.
pub trait Activation: Send + Sync {
    /// Resolve a variable name to its value.
    ///
    /// Returns `None` if the variable is not defined in this activation.
    fn resolve(&self, name: &str) -> Option<Value>;

    /// Check if a variable is defined.
    ///
    /// Default implementation returns true if `resolve()` returns Some.
    fn has(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Whether `name` has been declared unknown for partial evaluation.
    fn is_unknown(&self, _name: &str) -> bool {
        false
    }
}

/// A lazily computed value. Stored in an `Arc` so lookups can share the memo.
pub type Provider = Arc<dyn Fn() -> Value + Send + Sync>;

enum Binding {
    Value(Value),
    Provider {
        provider: Provider,
        memo: OnceLock<Value>,
    },
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Binding::Provider { memo, .. } => f
                .debug_struct("Provider")
                .field("memo", &memo.get())
                .finish_non_exhaustive(),
        }
    }
}

/// Activation backed by a map of values and lazy providers.
///
/// Values and providers share one namespace: a name bound to one kind cannot
/// be rebound to the other. Providers run at most once per activation.
#[derive(Debug, Default)]
pub struct MapActivation {
    bindings: HashMap<String, Binding>,
    unknowns: HashSet<String>,
}

impl MapActivation {
    /// Create a new empty activation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an activation from an iterator of bindings.
    pub fn from_iter(bindings: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            bindings: bindings
                .into_iter()
                .map(|(name, value)| (name, Binding::Value(value)))
                .collect(),
            unknowns: HashSet::new(),
        }
    }

    /// Bind a value. Returns `false` if a provider already owns the name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> bool {
        let name = name.into();
        if matches!(self.bindings.get(&name), Some(Binding::Provider { .. })) {
            return false;
        }
        self.bindings.insert(name, Binding::Value(value.into()));
        true
    }

    /// Bind a lazy provider. Returns `false` if a value already owns the name.
    pub fn insert_provider<F>(&mut self, name: impl Into<String>, provider: F) -> bool
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        if matches!(self.bindings.get(&name), Some(Binding::Value(_))) {
            return false;
        }
        self.bindings.insert(
            name,
            Binding::Provider {
                provider: Arc::new(provider),
                memo: OnceLock::new(),
            },
        );
        true
    }

    /// Look up a variable, invoking and memoizing its provider on first use.
    pub fn find_variable(&self, name: &str) -> Option<Value> {
        match self.bindings.get(name)? {
            Binding::Value(value) => Some(value.clone()),
            Binding::Provider { provider, memo } => Some(
                memo.get_or_init(|| {
                    tracing::trace!(name, "invoking variable provider");
                    provider()
                })
                .clone(),
            ),
        }
    }

    /// Treat `name` (and anything selected from it) as unknown.
    pub fn mark_unknown(&mut self, name: impl Into<String>) {
        self.unknowns.insert(name.into());
    }

    /// Remove a binding.
    pub fn remove(&mut self, name: &str) -> bool {
        self.bindings.remove(name).is_some()
    }

    /// Get the number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Activation for MapActivation {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.find_variable(name)
    }

    fn has(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    fn is_unknown(&self, name: &str) -> bool {
        self.unknowns.contains(name)
    }
}

/// A hierarchical activation that delegates to a parent if not found locally.
///
/// Comprehensions use this for iteration and accumulator variables, which
/// shadow outer variables.
pub struct HierarchicalActivation<'a> {
    parent: &'a dyn Activation,
    local: HashMap<String, Value>,
}

impl<'a> HierarchicalActivation<'a> {
    /// Create a new hierarchical activation with a parent.
    pub fn new(parent: &'a dyn Activation) -> Self {
        Self {
            parent,
            local: HashMap::new(),
        }
    }

    /// Add a local binding that shadows the parent.
    pub fn with_binding(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.local.insert(name.into(), value.into());
        self
    }

    /// Insert a local binding.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.local.insert(name.into(), value.into());
    }

    /// Remove a local binding.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.local.remove(name)
    }
}

impl Activation for HierarchicalActivation<'_> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.local
            .get(name)
            .cloned()
            .or_else(|| self.parent.resolve(name))
    }

    fn has(&self, name: &str) -> bool {
        self.local.contains_key(name) || self.parent.has(name)
    }

    fn is_unknown(&self, name: &str) -> bool {
        !self.local.contains_key(name) && self.parent.is_unknown(name)
    }
}

/// An empty activation with no bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyActivation;

impl EmptyActivation {
    /// Create a new empty activation.
    pub fn new() -> Self {
        Self
    }
}

impl Activation for EmptyActivation {
    fn resolve(&self, _name: &str) -> Option<Value> {
        None
    }

    fn has(&self, _name: &str) -> bool {
        false
    }
}

/// An activation that wraps an Arc for shared ownership.
#[derive(Clone)]
pub struct SharedActivation {
    inner: Arc<dyn Activation>,
}

impl fmt::Debug for SharedActivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedActivation").finish_non_exhaustive()
    }
}

impl SharedActivation {
    /// Create a new shared activation.
    pub fn new(activation: impl Activation + 'static) -> Self {
        Self {
            inner: Arc::new(activation),
        }
    }
}

impl Activation for SharedActivation {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.inner.resolve(name)
    }

    fn has(&self, name: &str) -> bool {
        self.inner.has(name)
    }

    fn is_unknown(&self, name: &str) -> bool {
        self.inner.is_unknown(name)
    }
}

impl<T: Activation> Activation for Arc<T> {
    fn resolve(&self, name: &str) -> Option<Value> {
        (**self).resolve(name)
    }

    fn has(&self, name: &str) -> bool {
        (**self).has(name)
    }

    fn is_unknown(&self, name: &str) -> bool {
        (**self).is_unknown(name)
    }
}

impl<T: Activation> Activation for Box<T> {
    fn resolve(&self, name: &str) -> Option<Value> {
        (**self).resolve(name)
    }

    fn has(&self, name: &str) -> bool {
        (**self).has(name)
    }

    fn is_unknown(&self, name: &str) -> bool {
        (**self).is_unknown(name)
    }
}

impl<T: Activation + ?Sized> Activation for &T {
    fn resolve(&self, name: &str) -> Option<Value> {
        (**self).resolve(name)
    }

    fn has(&self, name: &str) -> bool {
        (**self).has(name)
    }

    fn is_unknown(&self, name: &str) -> bool {
        (**self).is_unknown(name)
    }
}
