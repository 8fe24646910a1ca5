// image_param.rs — Image parameters: dimensional views over a buffer Parameter
//
// `OutputImageParam` names per-dimension accessors and constraint setters
// for a buffer parameter of fixed dimensionality. `ImageParam` adds runtime
// buffer binding and element-access expressions with implicit placeholder
// expansion.
//
// The accessor variables are named `<name>.min.<d>`, `<name>.extent.<d>`,
// and `<name>.stride.<d>`; lowering and bounds inference find them by these
// names.
//
// Preconditions: none.
// Postconditions: dimensionality never changes after construction.
// Failure modes: dimension indices beyond the declared dimensionality,
//   edge/size accessors on too few dimensions, and malformed element accesses
//   are user errors.
// Side effects: constraint setters and `set` mutate the shared Parameter.

use std::ops::Deref;

use crate::argument::Argument;
use crate::buffer::Buffer;
use crate::diag::Diagnostic;
use crate::expr::Expr;
use crate::indexing;
use crate::naming;
use crate::parameter::Parameter;
use crate::types::Type;
use crate::user_assert;
use crate::var;

// ── OutputImageParam ────────────────────────────────────────────────────────

/// A handle on a pipeline's output buffer, used to make static promises
/// about its shape.
#[derive(Debug, Clone)]
pub struct OutputImageParam {
    param: Parameter,
    dims: usize,
}

impl OutputImageParam {
    /// Wrap an existing buffer parameter.
    #[track_caller]
    pub fn wrap(param: Parameter) -> Result<Self, Diagnostic> {
        user_assert!(
            param.is_buffer(),
            "Can't make an image parameter from scalar Parameter {}",
            param.name()
        );
        let dims = param.dimensions();
        Ok(OutputImageParam { param, dims })
    }

    /// An output of the given element type and dimensionality, auto-named.
    pub fn new(ty: Type, dims: usize) -> Self {
        OutputImageParam::named(ty, dims, naming::make_entity_name("OutputImageParam", 'o'))
    }

    pub fn named(ty: Type, dims: usize, name: impl Into<String>) -> Self {
        OutputImageParam {
            param: Parameter::buffer(ty, dims, name.into()),
            dims,
        }
    }

    pub fn name(&self) -> &str {
        self.param.name()
    }

    /// Element type.
    pub fn ty(&self) -> Type {
        self.param.ty()
    }

    pub fn dimensions(&self) -> usize {
        self.dims
    }

    /// The underlying shared parameter.
    pub fn parameter(&self) -> &Parameter {
        &self.param
    }

    fn accessor(&self, field: &str, d: usize) -> Expr {
        Expr::param_var(
            Type::int(32),
            format!("{}.{}.{}", self.name(), field, d),
            self.param.clone(),
        )
    }

    /// Minimum coordinate in dimension `d`.
    pub fn min(&self, d: usize) -> Expr {
        self.accessor("min", d)
    }

    /// Extent in dimension `d`.
    pub fn extent(&self, d: usize) -> Expr {
        self.accessor("extent", d)
    }

    /// Stride of dimension `d`, in elements.
    pub fn stride(&self, d: usize) -> Expr {
        self.accessor("stride", d)
    }

    #[track_caller]
    fn check_dim(&self, what: &str, d: usize) -> Result<(), Diagnostic> {
        user_assert!(
            d < self.dims,
            "Can't set the {} of dimension {} of ImageParam {}, which has {} dimensions",
            what,
            d,
            self.name(),
            self.dims
        );
        Ok(())
    }

    /// Require the extent of dimension `d` to equal `extent`. Buffers that
    /// violate it are rejected at run time; known extents simplify boundary
    /// handling.
    #[track_caller]
    pub fn set_extent(&self, d: usize, extent: impl Into<Expr>) -> Result<&Self, Diagnostic> {
        self.check_dim("extent", d)?;
        let extent: Expr = extent.into();
        self.param.set_extent_constraint(d, extent)?;
        Ok(self)
    }

    /// Require the min of dimension `d` to equal `min`.
    #[track_caller]
    pub fn set_min(&self, d: usize, min: impl Into<Expr>) -> Result<&Self, Diagnostic> {
        self.check_dim("min", d)?;
        let min: Expr = min.into();
        self.param.set_min_constraint(d, min)?;
        Ok(self)
    }

    /// Require the stride of dimension `d` to equal `stride`. A known stride
    /// in the vectorized dimension generates better code.
    #[track_caller]
    pub fn set_stride(&self, d: usize, stride: impl Into<Expr>) -> Result<&Self, Diagnostic> {
        self.check_dim("stride", d)?;
        let stride: Expr = stride.into();
        self.param.set_stride_constraint(d, stride)?;
        Ok(self)
    }

    /// `set_min` and `set_extent` in one call.
    #[track_caller]
    pub fn set_bounds(
        &self,
        d: usize,
        min: impl Into<Expr>,
        extent: impl Into<Expr>,
    ) -> Result<&Self, Diagnostic> {
        self.set_min(d, min)?.set_extent(d, extent)
    }

    /// Left edge: `min(0)`.
    #[track_caller]
    pub fn left(&self) -> Result<Expr, Diagnostic> {
        user_assert!(self.dims > 0, "Can't ask for the left of a zero-dimensional image");
        Ok(self.min(0))
    }

    /// Right edge: `min(0) + (extent(0) - 1)`.
    #[track_caller]
    pub fn right(&self) -> Result<Expr, Diagnostic> {
        user_assert!(self.dims > 0, "Can't ask for the right of a zero-dimensional image");
        Ok(self.min(0) + (self.extent(0) - 1))
    }

    /// Top edge: `min(1)`.
    #[track_caller]
    pub fn top(&self) -> Result<Expr, Diagnostic> {
        user_assert!(
            self.dims > 1,
            "Can't ask for the top of a zero- or one-dimensional image"
        );
        Ok(self.min(1))
    }

    /// Bottom edge: `min(1) + (extent(1) - 1)`.
    #[track_caller]
    pub fn bottom(&self) -> Result<Expr, Diagnostic> {
        user_assert!(
            self.dims > 1,
            "Can't ask for the bottom of a zero- or one-dimensional image"
        );
        Ok(self.min(1) + (self.extent(1) - 1))
    }

    #[track_caller]
    pub fn width(&self) -> Result<Expr, Diagnostic> {
        user_assert!(self.dims > 0, "Can't ask for the width of a zero-dimensional image");
        Ok(self.extent(0))
    }

    #[track_caller]
    pub fn height(&self) -> Result<Expr, Diagnostic> {
        user_assert!(
            self.dims > 1,
            "Can't ask for the height of a zero or one-dimensional image"
        );
        Ok(self.extent(1))
    }

    #[track_caller]
    pub fn channels(&self) -> Result<Expr, Diagnostic> {
        user_assert!(
            self.dims > 2,
            "Can't ask for the channels of an image with fewer than three dimensions"
        );
        Ok(self.extent(2))
    }

    /// The signature entry for this image.
    pub fn argument(&self) -> Argument {
        Argument::new(self.name(), true, self.ty())
    }
}

impl From<&OutputImageParam> for Argument {
    fn from(p: &OutputImageParam) -> Self {
        p.argument()
    }
}

// ── ImageParam ──────────────────────────────────────────────────────────────

/// An image input to a pipeline.
#[derive(Debug, Clone)]
pub struct ImageParam {
    inner: OutputImageParam,
}

impl ImageParam {
    /// An image parameter with a unique auto-generated name.
    pub fn new(ty: Type, dims: usize) -> Self {
        ImageParam {
            inner: OutputImageParam::named(ty, dims, naming::make_entity_name("ImageParam", 'p')),
        }
    }

    /// An image parameter with the given name. The name is reserved so that
    /// later auto-generated names avoid it.
    pub fn named(ty: Type, dims: usize, name: impl Into<String>) -> Self {
        let name = name.into();
        naming::unique_name_from(&name);
        ImageParam {
            inner: OutputImageParam::named(ty, dims, name),
        }
    }

    /// Bind a buffer for interpreted execution. Its element type must match.
    #[track_caller]
    pub fn set(&self, buffer: Buffer) -> Result<(), Diagnostic> {
        self.inner.param.set_buffer(Some(buffer))
    }

    /// Drop the bound buffer.
    #[track_caller]
    pub fn reset(&self) -> Result<(), Diagnostic> {
        self.inner.param.set_buffer(None)
    }

    /// The bound buffer, if any.
    #[track_caller]
    pub fn get(&self) -> Result<Option<Buffer>, Diagnostic> {
        self.inner.param.get_buffer()
    }

    /// An expression loading from this image at `args`.
    ///
    /// One argument may be the placeholder `_`, which expands into implicit
    /// variables `_0, _1, ...` for the dimensions the other arguments leave
    /// uncovered. Indices are coerced to int32.
    #[track_caller]
    pub fn call(&self, args: &[Expr]) -> Result<Expr, Diagnostic> {
        let args = indexing::image_call_args(self.name(), args, self.dims)?;
        Ok(Expr::call(self.inner.param.clone(), args))
    }

    /// Using the image as an expression: implicit indexing over every
    /// dimension, i.e. `call(&[_])`.
    #[track_caller]
    pub fn to_expr(&self) -> Result<Expr, Diagnostic> {
        self.call(&[var::placeholder()])
    }

    pub fn as_output(&self) -> &OutputImageParam {
        &self.inner
    }
}

impl Deref for ImageParam {
    type Target = OutputImageParam;

    fn deref(&self) -> &OutputImageParam {
        &self.inner
    }
}

impl TryFrom<&ImageParam> for Expr {
    type Error = Diagnostic;

    #[track_caller]
    fn try_from(im: &ImageParam) -> Result<Expr, Diagnostic> {
        im.to_expr()
    }
}

impl From<&ImageParam> for Argument {
    fn from(p: &ImageParam) -> Self {
        p.argument()
    }
}

// ── Tests ──
