// var.rs — Pure variables, the implicit placeholder, and implicit dimensions
//
// `_` is the placeholder an author writes to mean "all remaining
// dimensions"; `_0`, `_1`, ... are the implicit dimension variables it
// expands into.

use crate::expr::Expr;
use crate::naming;
use crate::types::Type;

/// Name reserved for the implicit placeholder.
pub const PLACEHOLDER_NAME: &str = "_";

/// A named 32-bit integer variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Var {
    name: String,
}

impl Var {
    pub fn new(name: impl Into<String>) -> Self {
        Var { name: name.into() }
    }

    /// A var with a unique auto-generated name.
    pub fn fresh() -> Self {
        Var::new(naming::unique_name('v'))
    }

    /// The implicit placeholder `_`.
    pub fn placeholder() -> Self {
        Var::new(PLACEHOLDER_NAME)
    }

    /// The `n`th implicit dimension variable, `_n`.
    pub fn implicit(n: usize) -> Self {
        Var::new(format!("_{}", n))
    }

    pub fn is_placeholder(name: &str) -> bool {
        name == PLACEHOLDER_NAME
    }

    /// Whether `name` is an implicit dimension variable.
    pub fn is_implicit(name: &str) -> bool {
        Var::implicit_index(name).is_some()
    }

    /// The index `n` of an implicit variable `_n`.
    pub fn implicit_index(name: &str) -> Option<usize> {
        let digits = name.strip_prefix('_')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expr(&self) -> Expr {
        Expr::var(Type::int(32), self.name.clone())
    }
}

impl From<Var> for Expr {
    fn from(v: Var) -> Self {
        v.expr()
    }
}

impl From<&Var> for Expr {
    fn from(v: &Var) -> Self {
        v.expr()
    }
}

/// The placeholder as an expression, for use in image calls.
pub fn placeholder() -> Expr {
    Var::placeholder().expr()
}
