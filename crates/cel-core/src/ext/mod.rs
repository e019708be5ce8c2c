//! Extension libraries for CEL.
//!
//! An [`Extension`] bundles parse-time macros with the runtime functions
//! their expansions call, so `Env::with_extension` can install both at once.
//!
//! - [`Extension::lists`]: `distinct`, `flatten`, `lists.range`, `reverse`,
//!   `slice`, `sort`, `first`, `last` and the `sortBy` macro
//! - [`Extension::math`]: `math.greatest`/`math.least` macros plus numeric
//!   and bitwise helpers
//! - [`Extension::optionals`]: `optional.*` functions, `optMap`/`optFlatMap`
//!   and the `?.`/`[?]` syntax
//! - [`Extension::strings`]: string manipulation methods and `strings.quote`
//! - [`Extension::encoders`]: `base64.encode`/`base64.decode`
//! - [`Extension::bindings`]: `cel.bind`
//! - [`Extension::block`]: `cel.block`, `cel.index`, `cel.iterVar`, `cel.accuVar`
//! - [`Extension::comprehensions`]: two-variable `all`, `exists`,
//!   `existsOne`, `transformList` and `transformMap`
//! - [`Extension::proto`]: `proto.getExt`/`proto.hasExt`

mod comprehensions;
mod encoders;
mod lists;
mod math;
mod optionals;
mod strings;

use cel_core_parser::macros::{
    BINDINGS_MACROS, BLOCK_MACROS, COMPREHENSION_V2_MACROS, LISTS_MACROS, MATH_MACROS,
    OPTIONAL_MACROS, PROTO_MACROS,
};
use cel_core_parser::Macro;

use crate::eval::Function;

pub use comprehensions::comprehensions_functions;
pub use encoders::encoders_functions;
pub use lists::lists_functions;
pub use math::math_functions;
pub use optionals::optionals_functions;
pub use strings::strings_functions;

/// A named bundle of macros and functions.
#[derive(Debug, Clone)]
pub struct Extension {
    name: &'static str,
    macros: &'static [Macro],
    functions: Vec<Function>,
    optional_syntax: bool,
}

impl Extension {
    /// A custom extension.
    pub fn new(name: &'static str, macros: &'static [Macro], functions: Vec<Function>) -> Self {
        Self {
            name,
            macros,
            functions,
            optional_syntax: false,
        }
    }

    pub fn lists() -> Self {
        Self::new("lists", LISTS_MACROS, lists_functions())
    }

    pub fn math() -> Self {
        Self::new("math", MATH_MACROS, math_functions())
    }

    /// Optional values. Also turns on `?.`, `[?` and `{?key: ...}` syntax.
    pub fn optionals() -> Self {
        Self {
            optional_syntax: true,
            ..Self::new("optional", OPTIONAL_MACROS, optionals_functions())
        }
    }

    pub fn strings() -> Self {
        Self::new("strings", &[], strings_functions())
    }

    pub fn encoders() -> Self {
        Self::new("encoders", &[], encoders_functions())
    }

    pub fn bindings() -> Self {
        Self::new("bindings", BINDINGS_MACROS, Vec::new())
    }

    pub fn block() -> Self {
        Self::new("block", BLOCK_MACROS, Vec::new())
    }

    pub fn comprehensions() -> Self {
        Self::new(
            "two-var-comprehensions",
            COMPREHENSION_V2_MACROS,
            comprehensions_functions(),
        )
    }

    pub fn proto() -> Self {
        Self::new("protos", PROTO_MACROS, Vec::new())
    }

    /// The extension's name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Macros registered with the parser.
    pub fn macros(&self) -> &'static [Macro] {
        self.macros
    }

    /// Functions registered with the runtime.
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Whether the extension needs optional syntax enabled in the parser.
    pub fn requires_optional_syntax(&self) -> bool {
        self.optional_syntax
    }

    pub(crate) fn into_parts(self) -> (&'static [Macro], Vec<Function>) {
        (self.macros, self.functions)
    }
}
