//! List values and their builder.

use std::sync::Arc;

use super::{EvalError, Value};

/// Pull-style iteration over a collection's elements (or a map's keys).
pub trait ValueIterator {
    /// Whether another element is available.
    fn has_next(&self) -> bool;

    /// The next element. Calling past the end is a `FailedPrecondition` error.
    fn next(&mut self) -> Result<Value, EvalError>;
}

/// An immutable CEL list. Clones share the element storage.
#[derive(Debug, Clone, Default)]
pub struct ListValue {
    elements: Arc<[Value]>,
}

impl ListValue {
    pub fn new(elements: impl Into<Arc<[Value]>>) -> Self {
        Self {
            elements: elements.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Element at `index`, or an `OutOfRange` error value.
    pub fn get(&self, index: i64) -> Value {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.elements.get(i))
            .cloned()
            .unwrap_or_else(|| Value::error(EvalError::index_out_of_range(index, self.size())))
    }

    /// Membership using CEL equality.
    pub fn contains(&self, value: &Value) -> bool {
        self.elements.iter().any(|e| e == value)
    }

    /// Visit elements in order until the callback returns `false`.
    pub fn for_each(&self, mut f: impl FnMut(usize, &Value) -> bool) {
        for (i, element) in self.elements.iter().enumerate() {
            if !f(i, element) {
                break;
            }
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.elements.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.elements
    }

    pub fn new_iterator(&self) -> ListIterator {
        ListIterator {
            list: self.clone(),
            position: 0,
        }
    }

    /// Concatenation, sharing storage when either side is empty.
    pub fn concat(&self, other: &ListValue) -> ListValue {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut elements = Vec::with_capacity(self.size() + other.size());
        elements.extend(self.elements.iter().cloned());
        elements.extend(other.elements.iter().cloned());
        ListValue::new(elements)
    }
}

impl PartialEq for ListValue {
    fn eq(&self, other: &Self) -> bool {
        self.size() == other.size() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl From<Vec<Value>> for ListValue {
    fn from(elements: Vec<Value>) -> Self {
        ListValue::new(elements)
    }
}

impl FromIterator<Value> for ListValue {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        ListValue::new(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'a> IntoIterator for &'a ListValue {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Cursor over a [`ListValue`].
#[derive(Debug, Clone)]
pub struct ListIterator {
    list: ListValue,
    position: usize,
}

impl ValueIterator for ListIterator {
    fn has_next(&self) -> bool {
        self.position < self.list.size()
    }

    fn next(&mut self) -> Result<Value, EvalError> {
        let value = self
            .list
            .as_slice()
            .get(self.position)
            .cloned()
            .ok_or_else(|| {
                EvalError::failed_precondition("ValueIterator.Next called after exhaustion")
            })?;
        self.position += 1;
        Ok(value)
    }
}

/// Accumulates elements and produces an immutable [`ListValue`].
#[derive(Debug, Default)]
pub struct ListValueBuilder {
    elements: Vec<Value>,
}

impl ListValueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, value: impl Into<Value>) -> &mut Self {
        self.elements.push(value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn build(self) -> ListValue {
        ListValue::new(self.elements)
    }
}
