//! Using CEL extension libraries.
//!
//! Run with: cargo run -p cel-core --example extensions

use cel_core::{Env, Extension, MapActivation, Value};

fn main() {
    let env = [
        Extension::strings(),
        Extension::math(),
        Extension::lists(),
        Extension::optionals(),
        Extension::bindings(),
        Extension::comprehensions(),
    ]
    .into_iter()
    .try_fold(Env::with_standard_library(), Env::with_extension)
    .unwrap();

    let mut activation = MapActivation::new();
    activation.insert("values", Value::list([3, 1, 2]));
    activation.insert("text", "hello cel world");
    activation.insert("config", Value::map([("host", "localhost")]));

    for source in [
        "math.greatest(values)",
        "math.least(1, 2.5, 3u)",
        "values.sortBy(v, -v)",
        "text.split(' ').join('-')",
        "cel.bind(words, text.split(' '), words.size())",
        "{'a': 1, 'b': 2}.transformMap(k, v, v * 10)",
        "config.?port.orValue(8080)",
    ] {
        let ast = env.parse(source).unwrap();
        let result = env.program(&ast).eval(&activation);
        println!("{:<50} => {}", source, result);
    }
}
