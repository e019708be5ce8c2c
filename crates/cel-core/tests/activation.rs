//! Activation tests: value bindings, lazy providers and sharing across threads.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cel_core::{Activation, Env, HierarchicalActivation, MapActivation, SharedActivation, Value};
use common::eval_with;
use pretty_assertions::assert_eq;

fn counting_provider(value: Value) -> (Arc<AtomicUsize>, impl Fn() -> Value + Send + Sync) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let provider = move || {
        counter.fetch_add(1, Ordering::SeqCst);
        value.clone()
    };
    (calls, provider)
}

#[test]
fn provider_runs_once_per_activation() {
    let (calls, provider) = counting_provider(Value::Int(21));
    let mut activation = MapActivation::new();
    assert!(activation.insert_provider("x", provider));

    assert_eq!(eval_with("x + x", &activation), Value::Int(42));
    assert_eq!(eval_with("[1, 2, 3].map(i, x)", &activation), Value::list([21, 21, 21]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn provider_is_not_invoked_when_unused() {
    let (calls, provider) = counting_provider(Value::Int(1));
    let mut activation = MapActivation::new();
    activation.insert_provider("x", provider);

    assert_eq!(eval_with("false && x == 1", &activation), Value::Bool(false));
    assert!(activation.has("x"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn values_and_providers_share_one_namespace() {
    let mut activation = MapActivation::new();
    assert!(activation.insert("x", 1));
    assert!(!activation.insert_provider("x", || Value::Int(2)));
    assert_eq!(activation.resolve("x"), Some(Value::Int(1)));

    assert!(activation.insert_provider("y", || Value::Int(2)));
    assert!(!activation.insert("y", 3));
    assert_eq!(activation.resolve("y"), Some(Value::Int(2)));
}

#[test]
fn hierarchical_activation_shadows_parent() {
    let mut parent = MapActivation::new();
    parent.insert("x", 1);
    parent.insert("y", 2);

    let child = HierarchicalActivation::new(&parent).with_binding("x", 10);
    assert_eq!(child.resolve("x"), Some(Value::Int(10)));
    assert_eq!(child.resolve("y"), Some(Value::Int(2)));
    assert_eq!(child.resolve("z"), None);
}

#[test]
fn unknown_markers_are_shadowed_by_local_bindings() {
    let mut parent = MapActivation::new();
    parent.mark_unknown("x");

    let child = HierarchicalActivation::new(&parent).with_binding("x", 1);
    assert!(!child.is_unknown("x"));
    assert!(parent.is_unknown("x"));
}

#[test]
fn shared_activation_across_threads() {
    let env = Env::with_standard_library();
    let ast = env.parse("x * factor").unwrap();
    let program = env.program(&ast);

    let (calls, provider) = counting_provider(Value::Int(3));
    let mut activation = MapActivation::new();
    activation.insert("factor", 2);
    activation.insert_provider("x", provider);
    let activation = SharedActivation::new(activation);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let program = program.clone();
            let activation = activation.clone();
            std::thread::spawn(move || program.eval(&activation))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), Value::Int(6));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
