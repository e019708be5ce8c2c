//! Minimal CEL example.
//!
//! Run with: cargo run -p cel-core --example hello

use cel_core::{Env, MapActivation};

fn main() {
    let env = Env::with_standard_library();

    let ast = env.parse(r#""Hello, " + name + "!""#).unwrap();
    let program = env.program(&ast);

    let mut activation = MapActivation::new();
    activation.insert("name", "World");

    let result = program.eval(&activation);
    println!("{}", result);
}
