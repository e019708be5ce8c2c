//! Canonical function names for CEL operators.
//!
//! The parser lowers every operator into a call with one of these names and
//! the runtime dispatches on them.

pub const CONDITIONAL: &str = "_?_:_";
pub const LOGICAL_AND: &str = "_&&_";
pub const LOGICAL_OR: &str = "_||_";
pub const LOGICAL_NOT: &str = "!_";
pub const NEGATE: &str = "-_";
pub const EQUALS: &str = "_==_";
pub const NOT_EQUALS: &str = "_!=_";
pub const LESS: &str = "_<_";
pub const LESS_EQUALS: &str = "_<=_";
pub const GREATER: &str = "_>_";
pub const GREATER_EQUALS: &str = "_>=_";
pub const IN: &str = "@in";
pub const ADD: &str = "_+_";
pub const SUBTRACT: &str = "_-_";
pub const MULTIPLY: &str = "_*_";
pub const DIVIDE: &str = "_/_";
pub const MODULO: &str = "_%_";
pub const INDEX: &str = "_[_]";
pub const OPT_INDEX: &str = "_[?_]";
pub const OPT_SELECT: &str = "_?._";

/// Loop condition helper: false only for a definite `false`.
pub const NOT_STRICTLY_FALSE: &str = "@not_strictly_false";

/// Internal map insertion used by `transformMap` and `transformMapEntry`.
pub const MAP_INSERT: &str = "cel.@mapInsert";

/// Internal call produced by `cel.block`.
pub const BLOCK: &str = "cel.@block";

/// Internal member function produced by `sortBy`.
pub const SORT_BY_ASSOCIATED_KEYS: &str = "@sortByAssociatedKeys";

/// Internal functions produced by `math.least` and `math.greatest`.
pub const MATH_MIN: &str = "math.@min";
pub const MATH_MAX: &str = "math.@max";

/// Binary operator precedence, higher binds tighter.
pub fn precedence(function: &str) -> Option<u8> {
    match function {
        CONDITIONAL => Some(1),
        LOGICAL_OR => Some(2),
        LOGICAL_AND => Some(3),
        EQUALS | NOT_EQUALS | LESS | LESS_EQUALS | GREATER | GREATER_EQUALS | IN => Some(4),
        ADD | SUBTRACT => Some(5),
        MULTIPLY | DIVIDE | MODULO => Some(6),
        LOGICAL_NOT | NEGATE => Some(7),
        _ => None,
    }
}

/// Display symbol of a binary operator.
pub fn binary_symbol(function: &str) -> Option<&'static str> {
    match function {
        LOGICAL_OR => Some("||"),
        LOGICAL_AND => Some("&&"),
        EQUALS => Some("=="),
        NOT_EQUALS => Some("!="),
        LESS => Some("<"),
        LESS_EQUALS => Some("<="),
        GREATER => Some(">"),
        GREATER_EQUALS => Some(">="),
        IN => Some("in"),
        ADD => Some("+"),
        SUBTRACT => Some("-"),
        MULTIPLY => Some("*"),
        DIVIDE => Some("/"),
        MODULO => Some("%"),
        _ => None,
    }
}

/// Display symbol of a unary operator.
pub fn unary_symbol(function: &str) -> Option<&'static str> {
    match function {
        LOGICAL_NOT => Some("!"),
        NEGATE => Some("-"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplicative_binds_tighter_than_additive() {
        assert!(precedence(MULTIPLY) > precedence(ADD));
        assert!(precedence(ADD) > precedence(LESS));
        assert!(precedence(LOGICAL_AND) > precedence(LOGICAL_OR));
    }
}
