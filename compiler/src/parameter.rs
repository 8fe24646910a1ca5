// parameter.rs — Shared binding record for one pipeline input or output
//
// A `Parameter` is a reference-counted handle. Every `Param`, `ImageParam`,
// and expression node that mentions the input holds a clone of the same
// handle, so binding a value (`set_scalar`, `set_buffer`) is observed by all
// of them without rebuilding any expression tree.
//
// Preconditions: handles are used from one thread; concurrent mutation while
//   a compilation pass reads the parameter is the caller's problem.
// Postconditions: type, buffer-ness, dimensionality, and name never change
//   after construction.
// Failure modes: scalar/buffer misuse and out-of-range dimension indices are
//   internal errors; binding a buffer of the wrong element type is a user
//   error.
// Side effects: setters mutate the shared record in place.
//
// A constraint expression that mentions its own parameter (for example an
// extent tied to another extent of the same image) forms a reference cycle;
// such records live until process exit.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::buffer::Buffer;
use crate::diag::Diagnostic;
use crate::eval::Value;
use crate::expr::Expr;
use crate::types::{type_of, ScalarType, Type};
use crate::{internal_assert, user_assert};

/// Per-dimension symbolic constraints of a buffer parameter. `None` means
/// unconstrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimConstraint {
    pub min: Option<Expr>,
    pub extent: Option<Expr>,
    pub stride: Option<Expr>,
}

#[derive(Default)]
struct ParameterState {
    /// Low `ty.bits` bits of the bound scalar. Zero until first bound.
    scalar_bits: u64,
    buffer: Option<Buffer>,
    min_value: Option<Expr>,
    max_value: Option<Expr>,
    dims: Vec<DimConstraint>,
}

struct ParameterContents {
    ty: Type,
    is_buffer: bool,
    dimensions: usize,
    name: String,
    state: RefCell<ParameterState>,
}

#[derive(Clone)]
pub struct Parameter {
    contents: Rc<ParameterContents>,
}

// ── Construction ────────────────────────────────────────────────────────────

impl Parameter {
    /// Construct a parameter with no bound value and no constraints.
    ///
    /// Scalar parameters must have zero dimensions.
    #[track_caller]
    pub fn new(
        ty: Type,
        is_buffer: bool,
        dimensions: usize,
        name: impl Into<String>,
    ) -> Result<Self, Diagnostic> {
        let name = name.into();
        internal_assert!(!name.is_empty(), "Parameter constructed with an empty name");
        internal_assert!(
            is_buffer || dimensions == 0,
            "Scalar parameter {} constructed with {} dimensions",
            name,
            dimensions
        );
        Ok(Parameter::build(ty, is_buffer, dimensions, name))
    }

    /// A scalar parameter. Infallible: callers supply a well-formed name.
    pub(crate) fn scalar(ty: Type, name: String) -> Self {
        Parameter::build(ty, false, 0, name)
    }

    pub(crate) fn buffer(ty: Type, dimensions: usize, name: String) -> Self {
        Parameter::build(ty, true, dimensions, name)
    }

    fn build(ty: Type, is_buffer: bool, dimensions: usize, name: String) -> Self {
        tracing::trace!(param = %name, %ty, is_buffer, dimensions, "new parameter");
        Parameter {
            contents: Rc::new(ParameterContents {
                ty,
                is_buffer,
                dimensions,
                name,
                state: RefCell::new(ParameterState {
                    dims: vec![DimConstraint::default(); dimensions],
                    ..ParameterState::default()
                }),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.contents.name
    }

    pub fn ty(&self) -> Type {
        self.contents.ty
    }

    pub fn is_buffer(&self) -> bool {
        self.contents.is_buffer
    }

    pub fn dimensions(&self) -> usize {
        self.contents.dimensions
    }

    /// Pointer identity.
    pub fn same_as(&self, other: &Parameter) -> bool {
        Rc::ptr_eq(&self.contents, &other.contents)
    }

    #[track_caller]
    fn check_is_scalar(&self) -> Result<(), Diagnostic> {
        internal_assert!(!self.is_buffer(), "Parameter {} is a Buffer", self.name());
        Ok(())
    }

    #[track_caller]
    fn check_is_buffer(&self) -> Result<(), Diagnostic> {
        internal_assert!(self.is_buffer(), "Parameter {} is not a Buffer", self.name());
        Ok(())
    }

    #[track_caller]
    fn check_type<T: ScalarType>(&self) -> Result<(), Diagnostic> {
        internal_assert!(
            type_of::<T>() == self.ty(),
            "Parameter {} of type {} accessed as {}",
            self.name(),
            self.ty(),
            type_of::<T>()
        );
        Ok(())
    }

    #[track_caller]
    fn check_dim(&self, dim: usize) -> Result<(), Diagnostic> {
        self.check_is_buffer()?;
        internal_assert!(
            dim < self.dimensions(),
            "Dimension {} is out of range for Parameter {}, which has {} dimensions",
            dim,
            self.name(),
            self.dimensions()
        );
        Ok(())
    }
}

// ── Scalar binding ──────────────────────────────────────────────────────────

impl Parameter {
    /// Overwrite the bound scalar value. Range constraints are not checked.
    #[track_caller]
    pub fn set_scalar<T: ScalarType>(&self, value: T) -> Result<(), Diagnostic> {
        self.check_is_scalar()?;
        self.check_type::<T>()?;
        self.contents.state.borrow_mut().scalar_bits = value.to_bits();
        tracing::debug!(param = %self.name(), "bound scalar value");
        Ok(())
    }

    /// The bound scalar value; zero of type `T` if never bound.
    #[track_caller]
    pub fn get_scalar<T: ScalarType>(&self) -> Result<T, Diagnostic> {
        self.check_is_scalar()?;
        self.check_type::<T>()?;
        Ok(T::from_bits(self.contents.state.borrow().scalar_bits))
    }

    /// The bound scalar value as a dynamically typed `Value`.
    #[track_caller]
    pub fn scalar_value(&self) -> Result<Value, Diagnostic> {
        self.check_is_scalar()?;
        Ok(Value::from_bits(
            self.ty(),
            self.contents.state.borrow().scalar_bits,
        ))
    }

    /// Bind a dynamically typed value, converting it to the parameter type.
    #[track_caller]
    pub fn set_scalar_value(&self, value: Value) -> Result<(), Diagnostic> {
        self.check_is_scalar()?;
        self.contents.state.borrow_mut().scalar_bits = value.cast_to(self.ty()).to_bits(self.ty());
        tracing::debug!(param = %self.name(), %value, "bound scalar value");
        Ok(())
    }
}

// ── Buffer binding ──────────────────────────────────────────────────────────

impl Parameter {
    /// Bind (or with `None`, unbind) a runtime buffer.
    #[track_caller]
    pub fn set_buffer(&self, buffer: Option<Buffer>) -> Result<(), Diagnostic> {
        self.check_is_buffer()?;
        if let Some(b) = &buffer {
            user_assert!(
                b.ty() == self.ty(),
                "Can't bind ImageParam {} of type {} to Buffer {} of type {}",
                self.name(),
                self.ty(),
                b.name(),
                b.ty()
            );
            tracing::debug!(param = %self.name(), buffer = %b.name(), "bound buffer");
        }
        self.contents.state.borrow_mut().buffer = buffer;
        Ok(())
    }

    #[track_caller]
    pub fn get_buffer(&self) -> Result<Option<Buffer>, Diagnostic> {
        self.check_is_buffer()?;
        Ok(self.contents.state.borrow().buffer.clone())
    }
}

// ── Range bounds ────────────────────────────────────────────────────────────

impl Parameter {
    /// Wrap `e` in a cast to the parameter type unless it already has it.
    fn coerce(&self, e: Expr) -> Expr {
        if e.ty() == self.ty() {
            e
        } else {
            Expr::cast(self.ty(), e)
        }
    }

    /// Set the lower bound of a scalar parameter. `None` means unbounded.
    #[track_caller]
    pub fn set_min_value(&self, min: impl Into<Option<Expr>>) -> Result<(), Diagnostic> {
        self.check_is_scalar()?;
        let min = min.into().map(|e| self.coerce(e));
        self.contents.state.borrow_mut().min_value = min;
        Ok(())
    }

    /// Set the upper bound of a scalar parameter. `None` means unbounded.
    #[track_caller]
    pub fn set_max_value(&self, max: impl Into<Option<Expr>>) -> Result<(), Diagnostic> {
        self.check_is_scalar()?;
        let max = max.into().map(|e| self.coerce(e));
        self.contents.state.borrow_mut().max_value = max;
        Ok(())
    }

    pub fn min_value(&self) -> Option<Expr> {
        self.contents.state.borrow().min_value.clone()
    }

    pub fn max_value(&self) -> Option<Expr> {
        self.contents.state.borrow().max_value.clone()
    }
}

// ── Dimension constraints ───────────────────────────────────────────────────

impl Parameter {
    #[track_caller]
    pub fn set_min_constraint(
        &self,
        dim: usize,
        e: impl Into<Option<Expr>>,
    ) -> Result<(), Diagnostic> {
        self.check_dim(dim)?;
        self.contents.state.borrow_mut().dims[dim].min = e.into();
        tracing::debug!(param = %self.name(), dim, "set min constraint");
        Ok(())
    }

    #[track_caller]
    pub fn set_extent_constraint(
        &self,
        dim: usize,
        e: impl Into<Option<Expr>>,
    ) -> Result<(), Diagnostic> {
        self.check_dim(dim)?;
        self.contents.state.borrow_mut().dims[dim].extent = e.into();
        tracing::debug!(param = %self.name(), dim, "set extent constraint");
        Ok(())
    }

    #[track_caller]
    pub fn set_stride_constraint(
        &self,
        dim: usize,
        e: impl Into<Option<Expr>>,
    ) -> Result<(), Diagnostic> {
        self.check_dim(dim)?;
        self.contents.state.borrow_mut().dims[dim].stride = e.into();
        tracing::debug!(param = %self.name(), dim, "set stride constraint");
        Ok(())
    }

    #[track_caller]
    pub fn min_constraint(&self, dim: usize) -> Result<Option<Expr>, Diagnostic> {
        self.check_dim(dim)?;
        Ok(self.contents.state.borrow().dims[dim].min.clone())
    }

    #[track_caller]
    pub fn extent_constraint(&self, dim: usize) -> Result<Option<Expr>, Diagnostic> {
        self.check_dim(dim)?;
        Ok(self.contents.state.borrow().dims[dim].extent.clone())
    }

    #[track_caller]
    pub fn stride_constraint(&self, dim: usize) -> Result<Option<Expr>, Diagnostic> {
        self.check_dim(dim)?;
        Ok(self.contents.state.borrow().dims[dim].stride.clone())
    }

    /// Snapshot of all per-dimension constraints (empty for scalars).
    pub fn dim_constraints(&self) -> Vec<DimConstraint> {
        self.contents.state.borrow().dims.clone()
    }
}

// ── Identity ────────────────────────────────────────────────────────────────

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Parameter {}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.contents.name)
            .field("ty", &self.contents.ty)
            .field("is_buffer", &self.contents.is_buffer)
            .field("dimensions", &self.contents.dimensions)
            .finish()
    }
}

// ── Tests ──
