//! Compile error reporting through `Env::parse`.

use cel_core::{Env, ParserOptions};
use pretty_assertions::assert_eq;

#[test]
fn report_points_at_error() {
    let err = Env::with_standard_library().parse("1 +").unwrap_err();
    assert_eq!(
        err.to_string(),
        "ERROR: <input>:1:4: Syntax error: unexpected end of input\n | 1 +\n | ...^"
    );
}

#[test]
fn report_uses_configured_description() {
    let env = Env::with_standard_library()
        .with_parser_options(ParserOptions::default().with_description("policy.cel"));
    let err = env.parse("has(a)").unwrap_err();
    assert_eq!(
        err.report(),
        "ERROR: policy.cel:1:5: invalid argument to has() macro\n | has(a)\n | ....^"
    );
}

#[test]
fn every_error_is_listed_in_source_order() {
    let err = Env::with_standard_library().parse("[1 2, 3 4]").unwrap_err();
    assert_eq!(err.errors().total(), 2);
    let lines: Vec<&str> = err
        .report()
        .lines()
        .filter(|line| line.starts_with("ERROR:"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("ERROR: <input>:1:4:"), "{}", lines[0]);
    assert!(lines[1].starts_with("ERROR: <input>:1:9:"), "{}", lines[1]);
}

#[test]
fn report_truncates_after_one_hundred_errors() {
    let env = Env::with_standard_library()
        .with_parser_options(ParserOptions::default().with_error_recovery_limit(1000));
    let input = format!("[{}]", "+, ".repeat(150));
    let err = env.parse(&input).unwrap_err();

    assert_eq!(err.errors().total(), 150);
    assert_eq!(err.errors().len(), 100);
    assert!(
        err.report().ends_with("\n50 more errors were truncated"),
        "{}",
        err.report()
    );
}

#[test]
fn recursion_limit_is_reported() {
    let env = Env::with_standard_library()
        .with_parser_options(ParserOptions::default().with_max_recursion_depth(5));
    let err = env.parse("[[[[[[1]]]]]]").unwrap_err();
    assert!(
        err.report().contains("expression recursion limit exceeded: 5"),
        "{}",
        err.report()
    );
}
