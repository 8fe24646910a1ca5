// param.rs — Typed scalar pipeline parameters
//
// `Param<T>` is a cheap handle on a scalar `Parameter` of type `T`. When
// jitting, bind a value with `set` before evaluating anything that uses it;
// when compiling ahead of time, the param appears in the argument list.

use std::ffi::c_void;
use std::marker::PhantomData;

use crate::argument::Argument;
use crate::diag::{self, Diagnostic};
use crate::expr::Expr;
use crate::naming;
use crate::parameter::Parameter;
use crate::types::{type_of, ScalarType, Type};
use crate::user_warning;

#[derive(Clone)]
pub struct Param<T: ScalarType> {
    param: Parameter,
    _ty: PhantomData<T>,
}

impl<T: ScalarType> Param<T> {
    /// A scalar parameter with a unique auto-generated name.
    pub fn new() -> Self {
        Param::wrap(naming::make_entity_name("Param", 'p'))
    }

    /// A scalar parameter with the given name. The name is kept as given and
    /// later auto-generated names avoid it.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        naming::reserve(&name);
        Param::wrap(name)
    }

    fn wrap(name: String) -> Self {
        Param {
            param: Parameter::scalar(type_of::<T>(), name),
            _ty: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.param.name()
    }

    pub fn ty(&self) -> Type {
        type_of::<T>()
    }

    /// The current value. Zero if never set.
    #[track_caller]
    pub fn get(&self) -> Result<T, Diagnostic> {
        self.param.get_scalar::<T>()
    }

    #[track_caller]
    pub fn set(&self, value: T) -> Result<(), Diagnostic> {
        self.param.set_scalar(value)
    }

    /// Set both bounds. `None` means unbounded on that side. Expressions of
    /// another type are cast to `T`.
    #[track_caller]
    pub fn set_range(
        &self,
        min: impl Into<Option<Expr>>,
        max: impl Into<Option<Expr>>,
    ) -> Result<(), Diagnostic> {
        set_range(&self.param, min.into(), max.into())
    }

    #[track_caller]
    pub fn set_min_value(&self, min: impl Into<Option<Expr>>) -> Result<(), Diagnostic> {
        self.param.set_min_value(min)
    }

    #[track_caller]
    pub fn set_max_value(&self, max: impl Into<Option<Expr>>) -> Result<(), Diagnostic> {
        self.param.set_max_value(max)
    }

    pub fn min_value(&self) -> Option<Expr> {
        self.param.min_value()
    }

    pub fn max_value(&self) -> Option<Expr> {
        self.param.max_value()
    }

    /// The underlying shared parameter.
    pub fn parameter(&self) -> &Parameter {
        &self.param
    }

    /// Use this parameter as an expression.
    pub fn expr(&self) -> Expr {
        Expr::param_var(type_of::<T>(), self.name(), self.param.clone())
    }

    /// The signature entry for this parameter.
    pub fn argument(&self) -> Argument {
        Argument::new(self.name(), false, type_of::<T>())
    }
}

impl<T: ScalarType> Default for Param<T> {
    fn default() -> Self {
        Param::new()
    }
}

impl<T: ScalarType> From<&Param<T>> for Expr {
    fn from(p: &Param<T>) -> Self {
        p.expr()
    }
}

impl<T: ScalarType> From<&Param<T>> for Argument {
    fn from(p: &Param<T>) -> Self {
        p.argument()
    }
}

/// Set both bounds of a scalar parameter, warning when constant bounds
/// describe an empty range. The range is stored either way.
#[track_caller]
pub fn set_range(
    param: &Parameter,
    min: Option<Expr>,
    max: Option<Expr>,
) -> Result<(), Diagnostic> {
    if let (Some(lo), Some(hi)) = (
        min.as_ref().and_then(Expr::as_const_f64),
        max.as_ref().and_then(Expr::as_const_f64),
    ) {
        if lo > hi {
            diag::warn(user_warning!(
                "Param {} has an empty range [{}, {}]",
                param.name(),
                lo,
                hi
            ));
        }
    }
    param.set_min_value(min)?;
    param.set_max_value(max)
}

/// Name of the user-context parameter.
pub const USER_CONTEXT_NAME: &str = "__user_context";

/// The parameter carrying an opaque user-context pointer, passed through to
/// runtime callbacks.
pub fn user_context_param() -> Param<*mut c_void> {
    Param::named(USER_CONTEXT_NAME)
}
