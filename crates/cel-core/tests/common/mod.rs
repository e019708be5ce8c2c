//! Common test utilities for cel-core integration tests.

use cel_core::{Activation, EmptyActivation, Env, EvalErrorKind, Extension, Value};

/// Environment with the standard library and every extension installed.
#[allow(dead_code)]
pub fn full_env() -> Env {
    [
        Extension::lists(),
        Extension::math(),
        Extension::optionals(),
        Extension::strings(),
        Extension::encoders(),
        Extension::bindings(),
        Extension::block(),
        Extension::comprehensions(),
        Extension::proto(),
    ]
    .into_iter()
    .try_fold(Env::with_standard_library(), Env::with_extension)
    .expect("extensions do not overlap")
}

/// Evaluate `source` in `env` against `activation`.
#[allow(dead_code)]
pub fn eval_in(env: &Env, source: &str, activation: &dyn Activation) -> Value {
    let ast = env
        .parse(source)
        .unwrap_or_else(|err| panic!("failed to parse '{}':\n{}", source, err));
    env.program(&ast).eval(activation)
}

/// Evaluate `source` with every extension and no variables.
#[allow(dead_code)]
pub fn eval(source: &str) -> Value {
    eval_in(&full_env(), source, &EmptyActivation)
}

/// Evaluate `source` with every extension against `activation`.
#[allow(dead_code)]
pub fn eval_with(source: &str, activation: &dyn Activation) -> Value {
    eval_in(&full_env(), source, activation)
}

/// Assert that `source` evaluates to `true`.
#[allow(dead_code)]
pub fn assert_true(source: &str) {
    assert_eq!(eval(source), Value::Bool(true), "{}", source);
}

/// Evaluate `source` and return the kind of the resulting error.
#[allow(dead_code)]
pub fn error_kind(source: &str) -> EvalErrorKind {
    match eval(source) {
        Value::Error(err) => err.kind,
        other => panic!("expected error for '{}', got {:?}", source, other),
    }
}
