// expr.rs — Immutable symbolic expression nodes
//
// `Expr` is a reference-counted handle on an immutable node. Nodes that
// mention a pipeline input hold a shared `Parameter` handle; the parameter's
// current binding is read only when an expression is evaluated or lowered,
// never when it is built.
//
// Preconditions: none.
// Postconditions: every node carries a concrete `Type`.
// Failure modes: none (construction is infallible; binary operators
//   reconcile operand types).
// Side effects: none.

use std::fmt;
use std::rc::Rc;

use crate::parameter::Parameter;
use crate::types::Type;

// ── Nodes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }
}

#[derive(Debug)]
pub enum ExprNode {
    IntImm {
        ty: Type,
        value: i64,
    },
    UIntImm {
        ty: Type,
        value: u64,
    },
    FloatImm {
        ty: Type,
        value: f64,
    },
    /// A named value. `param` is set when the name refers to a pipeline
    /// input (the scalar itself, or a buffer's `.min/.extent/.stride`).
    Variable {
        ty: Type,
        name: String,
        param: Option<Parameter>,
    },
    Cast {
        ty: Type,
        value: Expr,
    },
    Binary {
        op: BinOp,
        a: Expr,
        b: Expr,
    },
    /// Element load from an image parameter.
    Call {
        ty: Type,
        name: String,
        args: Vec<Expr>,
        param: Parameter,
    },
}

/// Shared handle on an immutable expression node.
#[derive(Clone)]
pub struct Expr(Rc<ExprNode>);

// ── Construction ────────────────────────────────────────────────────────────

impl Expr {
    fn make(node: ExprNode) -> Self {
        Expr(Rc::new(node))
    }

    /// 32-bit signed integer constant.
    pub fn int(value: i32) -> Self {
        Expr::make(ExprNode::IntImm {
            ty: Type::int(32),
            value: value as i64,
        })
    }

    pub fn int_of(ty: Type, value: i64) -> Self {
        Expr::make(ExprNode::IntImm { ty, value })
    }

    pub fn uint_of(ty: Type, value: u64) -> Self {
        Expr::make(ExprNode::UIntImm { ty, value })
    }

    /// 32-bit float constant.
    pub fn float(value: f32) -> Self {
        Expr::make(ExprNode::FloatImm {
            ty: Type::float(32),
            value: value as f64,
        })
    }

    pub fn float_of(ty: Type, value: f64) -> Self {
        Expr::make(ExprNode::FloatImm { ty, value })
    }

    /// A free variable.
    pub fn var(ty: Type, name: impl Into<String>) -> Self {
        Expr::make(ExprNode::Variable {
            ty,
            name: name.into(),
            param: None,
        })
    }

    /// A variable bound to a pipeline input.
    pub fn param_var(ty: Type, name: impl Into<String>, param: Parameter) -> Self {
        Expr::make(ExprNode::Variable {
            ty,
            name: name.into(),
            param: Some(param),
        })
    }

    pub fn cast(ty: Type, value: Expr) -> Self {
        Expr::make(ExprNode::Cast { ty, value })
    }

    /// Load from `param` at `args`. Arguments are used as given.
    pub fn call(param: Parameter, args: Vec<Expr>) -> Self {
        Expr::make(ExprNode::Call {
            ty: param.ty(),
            name: param.name().to_string(),
            args,
            param,
        })
    }

    pub fn binary(op: BinOp, a: Expr, b: Expr) -> Self {
        let (a, b) = match_types(a, b);
        Expr::make(ExprNode::Binary { op, a, b })
    }

    pub fn node(&self) -> &ExprNode {
        &self.0
    }

    pub fn ty(&self) -> Type {
        match self.node() {
            ExprNode::IntImm { ty, .. }
            | ExprNode::UIntImm { ty, .. }
            | ExprNode::FloatImm { ty, .. }
            | ExprNode::Variable { ty, .. }
            | ExprNode::Cast { ty, .. }
            | ExprNode::Call { ty, .. } => *ty,
            ExprNode::Binary { a, .. } => a.ty(),
        }
    }

    /// Pointer identity.
    pub fn same_as(&self, other: &Expr) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The variable name, if this is a bare variable reference.
    pub fn as_variable(&self) -> Option<&str> {
        match self.node() {
            ExprNode::Variable { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The constant value, if this is an integer immediate.
    pub fn as_int(&self) -> Option<i64> {
        match self.node() {
            ExprNode::IntImm { value, .. } => Some(*value),
            ExprNode::UIntImm { value, .. } => i64::try_from(*value).ok(),
            _ => None,
        }
    }

    /// The constant value as a float, for any immediate.
    pub fn as_const_f64(&self) -> Option<f64> {
        match self.node() {
            ExprNode::IntImm { value, .. } => Some(*value as f64),
            ExprNode::UIntImm { value, .. } => Some(*value as f64),
            ExprNode::FloatImm { value, .. } => Some(*value),
            ExprNode::Cast { value, .. } => value.as_const_f64(),
            _ => None,
        }
    }

    /// Visit every parameter referenced by this tree, in pre-order.
    pub fn for_each_parameter(&self, f: &mut dyn FnMut(&Parameter)) {
        match self.node() {
            ExprNode::IntImm { .. } | ExprNode::UIntImm { .. } | ExprNode::FloatImm { .. } => {}
            ExprNode::Variable { param, .. } => {
                if let Some(p) = param {
                    f(p);
                }
            }
            ExprNode::Cast { value, .. } => value.for_each_parameter(f),
            ExprNode::Binary { a, b, .. } => {
                a.for_each_parameter(f);
                b.for_each_parameter(f);
            }
            ExprNode::Call { args, param, .. } => {
                f(param);
                for arg in args {
                    arg.for_each_parameter(f);
                }
            }
        }
    }
}

/// Coerce two operands to a common type: float beats int, wider beats
/// narrower, signed beats unsigned of equal width. Integer constants adopt
/// the other operand's type.
fn match_types(a: Expr, b: Expr) -> (Expr, Expr) {
    let (ta, tb) = (a.ty(), b.ty());
    if ta == tb {
        return (a, b);
    }
    let is_int_const = |e: &Expr| matches!(e.node(), ExprNode::IntImm { .. });
    if is_int_const(&b) && !ta.is_handle() {
        return (a, Expr::cast(ta, b));
    }
    if is_int_const(&a) && !tb.is_handle() {
        return (Expr::cast(tb, a), b);
    }
    let target = if ta.is_float() != tb.is_float() {
        if ta.is_float() {
            ta
        } else {
            tb
        }
    } else if ta.bits != tb.bits {
        if ta.bits > tb.bits {
            ta
        } else {
            tb
        }
    } else if ta.is_int() {
        ta
    } else {
        tb
    };
    let a = if ta == target { a } else { Expr::cast(target, a) };
    let b = if tb == target { b } else { Expr::cast(target, b) };
    (a, b)
}

// ── Conversions and operators ───────────────────────────────────────────────

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::int(value)
    }
}

impl From<f32> for Expr {
    fn from(value: f32) -> Self {
        Expr::float(value)
    }
}

macro_rules! impl_binop {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<R: Into<Expr>> std::ops::$trait<R> for Expr {
            type Output = Expr;
            fn $method(self, rhs: R) -> Expr {
                Expr::binary($op, self, rhs.into())
            }
        }
    };
}

impl_binop!(Add, add, BinOp::Add);
impl_binop!(Sub, sub, BinOp::Sub);
impl_binop!(Mul, mul, BinOp::Mul);
impl_binop!(Div, div, BinOp::Div);

// ── Equality ────────────────────────────────────────────────────────────────

/// Structural equality. Parameters compare by identity.
impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        if self.same_as(other) {
            return true;
        }
        match (self.node(), other.node()) {
            (ExprNode::IntImm { ty: t1, value: v1 }, ExprNode::IntImm { ty: t2, value: v2 }) => {
                t1 == t2 && v1 == v2
            }
            (ExprNode::UIntImm { ty: t1, value: v1 }, ExprNode::UIntImm { ty: t2, value: v2 }) => {
                t1 == t2 && v1 == v2
            }
            (
                ExprNode::FloatImm { ty: t1, value: v1 },
                ExprNode::FloatImm { ty: t2, value: v2 },
            ) => t1 == t2 && v1.to_bits() == v2.to_bits(),
            (
                ExprNode::Variable {
                    ty: t1,
                    name: n1,
                    param: p1,
                },
                ExprNode::Variable {
                    ty: t2,
                    name: n2,
                    param: p2,
                },
            ) => t1 == t2 && n1 == n2 && p1 == p2,
            (ExprNode::Cast { ty: t1, value: v1 }, ExprNode::Cast { ty: t2, value: v2 }) => {
                t1 == t2 && v1 == v2
            }
            (
                ExprNode::Binary {
                    op: o1,
                    a: a1,
                    b: b1,
                },
                ExprNode::Binary {
                    op: o2,
                    a: a2,
                    b: b2,
                },
            ) => o1 == o2 && a1 == a2 && b1 == b2,
            (
                ExprNode::Call {
                    args: args1,
                    param: p1,
                    ..
                },
                ExprNode::Call {
                    args: args2,
                    param: p2,
                    ..
                },
            ) => p1 == p2 && args1 == args2,
            _ => false,
        }
    }
}

// ── Printing ────────────────────────────────────────────────────────────────

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            ExprNode::IntImm { ty, value } if *ty == Type::int(32) => write!(f, "{}", value),
            ExprNode::IntImm { ty, value } => write!(f, "({}){}", ty, value),
            ExprNode::UIntImm { ty, value } => write!(f, "({}){}", ty, value),
            ExprNode::FloatImm { ty, value } if ty.bits == 32 => write!(f, "{:?}f", *value as f32),
            ExprNode::FloatImm { value, .. } => write!(f, "{:?}", value),
            ExprNode::Variable { name, .. } => write!(f, "{}", name),
            ExprNode::Cast { ty, value } => write!(f, "{}({})", ty, value),
            ExprNode::Binary { op, a, b } => write!(f, "({} {} {})", a, op.symbol(), b),
            ExprNode::Call { name, args, .. } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({})", self)
    }
}
