//! Handling CEL parse and evaluation errors.
//!
//! Run with: cargo run -p cel-core --example error_handling

use cel_core::{Env, MapActivation, ParserOptions, Value};

fn main() {
    let env = Env::with_standard_library()
        .with_parser_options(ParserOptions::default().with_description("rule.cel"));

    // Parse errors carry a formatted report with a caret under each problem
    println!("=== Parse errors ===");
    match env.parse("a + (b * ") {
        Ok(_) => println!("unexpectedly parsed"),
        Err(err) => println!("{}", err),
    }

    let mut activation = MapActivation::new();

    // Division by zero returns an error value
    println!("\n=== Division by zero ===");
    activation.insert("x", 0);
    let ast = env.parse("10 / x").unwrap();
    let result = env.program(&ast).eval(&activation);

    match &result {
        Value::Error(err) => println!("Error: {}", err),
        other => println!("Result: {}", other),
    }

    // Index out of bounds
    println!("\n=== Index out of bounds ===");
    activation.insert("items", Value::list([1, 2, 3]));
    let ast = env.parse("items[10]").unwrap();
    let result = env.program(&ast).eval(&activation);

    match &result {
        Value::Error(err) => println!("Error: {}", err),
        other => println!("Result: {}", other),
    }

    // Errors are absorbed when the other side of || decides the result
    println!("\n=== Error absorption ===");
    let ast = env.parse("items[10] == 1 || size(items) == 3").unwrap();
    println!("Result: {}", env.program(&ast).eval(&activation));

    // Use has() to safely check field existence
    println!("\n=== Safe field access with has() ===");
    activation.insert("config", Value::map([("host", "localhost")]));
    let ast = env
        .parse("has(config.port) ? config.port : 'default'")
        .unwrap();
    println!("Result: {}", env.program(&ast).eval(&activation));
}
