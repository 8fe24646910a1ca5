// eval.rs — Interpreted resolution of expressions against live bindings
//
// Evaluates an `Expr` to a concrete `Value`, reading the *current* binding
// of every parameter it mentions: scalar values, the shape of a bound buffer
// for `<name>.min.<d>` / `.extent.<d>` / `.stride.<d>` accessors, and buffer
// elements for image loads. Also validates a parameter's binding against its
// declared range and per-dimension constraints.
//
// Preconditions: parameters referenced by the expression are bound.
// Postconditions: results are normalised to the expression's type (integer
//   arithmetic wraps at the type's width).
// Failure modes: unbound buffers or free variables, out-of-bounds loads,
//   division by zero, and violated constraints are user errors.
// Side effects: none.

use std::collections::HashMap;
use std::fmt;

use crate::diag::Diagnostic;
use crate::expr::{BinOp, Expr, ExprNode};
use crate::parameter::Parameter;
use crate::types::{Type, TypeCode};
use crate::{internal_error, user_assert, user_error};

// ── Values ──────────────────────────────────────────────────────────────────

/// A concrete scalar produced by evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Handle(u64),
}

impl Value {
    /// Decode the low `ty.bits` bits of `bits`.
    pub fn from_bits(ty: Type, bits: u64) -> Value {
        match ty.code {
            TypeCode::Int => {
                let shift = 64 - ty.bits as u32;
                Value::Int(((bits << shift) as i64) >> shift)
            }
            TypeCode::UInt => Value::UInt(bits & mask(ty.bits)),
            TypeCode::Float if ty.bits == 32 => Value::Float(f32::from_bits(bits as u32) as f64),
            TypeCode::Float => Value::Float(f64::from_bits(bits)),
            TypeCode::Handle => Value::Handle(bits),
        }
    }

    /// Encode as the low `ty.bits` bits of a `u64`. The value should already
    /// have been cast to `ty`.
    pub fn to_bits(self, ty: Type) -> u64 {
        let raw = match self {
            Value::Int(v) => v as u64,
            Value::UInt(v) | Value::Handle(v) => v,
            Value::Float(v) if ty.bits == 32 => (v as f32).to_bits() as u64,
            Value::Float(v) => v.to_bits(),
        };
        raw & mask(ty.bits)
    }

    /// Convert to `ty` with C-like semantics: integers wrap, floats truncate
    /// toward zero when converted to integers.
    pub fn cast_to(self, ty: Type) -> Value {
        match ty.code {
            TypeCode::Float => {
                let v = self.as_f64();
                Value::Float(if ty.bits == 32 { v as f32 as f64 } else { v })
            }
            TypeCode::Int | TypeCode::UInt | TypeCode::Handle => {
                let raw = match self {
                    Value::Int(v) => v as u64,
                    Value::UInt(v) | Value::Handle(v) => v,
                    Value::Float(v) => v as i64 as u64,
                };
                Value::from_bits(ty, raw & mask(ty.bits))
            }
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Value::Int(v) => v as f64,
            Value::UInt(v) | Value::Handle(v) => v as f64,
            Value::Float(v) => v,
        }
    }

    /// The raw two's-complement bits of an integer value.
    pub fn as_u64(self) -> u64 {
        match self {
            Value::Int(v) => v as u64,
            Value::UInt(v) | Value::Handle(v) => v,
            Value::Float(v) => v as i64 as u64,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Value::Int(v) => v,
            Value::UInt(v) | Value::Handle(v) => v as i64,
            Value::Float(v) => v as i64,
        }
    }
}

fn mask(bits: u8) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Handle(v) => write!(f, "{:#x}", v),
        }
    }
}

// ── Evaluator ───────────────────────────────────────────────────────────────

/// Evaluates expressions given values for their free variables.
#[derive(Debug, Default)]
pub struct Evaluator {
    vars: HashMap<String, Value>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a free variable (e.g. an implicit dimension `_0`).
    pub fn bind(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.vars.insert(name.into(), value);
        self
    }

    pub fn eval(&self, e: &Expr) -> Result<Value, Diagnostic> {
        match e.node() {
            ExprNode::IntImm { value, .. } => Ok(Value::Int(*value)),
            ExprNode::UIntImm { value, .. } => Ok(Value::UInt(*value)),
            ExprNode::FloatImm { value, .. } => Ok(Value::Float(*value)),
            ExprNode::Variable { ty, name, param } => match param {
                Some(p) if p.is_buffer() => buffer_field(p, name),
                Some(p) => p.scalar_value(),
                None => {
                    let value = self
                        .vars
                        .get(name)
                        .ok_or_else(|| user_error!("Variable {} is not bound", name))?;
                    Ok(value.cast_to(*ty))
                }
            },
            ExprNode::Cast { ty, value } => Ok(self.eval(value)?.cast_to(*ty)),
            ExprNode::Binary { op, a, b } => {
                let ty = a.ty();
                let (x, y) = (self.eval(a)?, self.eval(b)?);
                binary(*op, ty, x, y)
            }
            ExprNode::Call {
                name, args, param, ..
            } => {
                let buffer = param
                    .get_buffer()?
                    .ok_or_else(|| user_error!("ImageParam {} is not bound to a buffer", name))?;
                let mut coords = Vec::with_capacity(args.len());
                for arg in args {
                    coords.push(self.eval(arg)?.as_i64() as i32);
                }
                buffer.load_value(&coords)
            }
        }
    }

    /// Check the current binding of `param` against its range (scalars) or
    /// its per-dimension constraints (buffers).
    pub fn check_constraints(&self, param: &Parameter) -> Result<(), Diagnostic> {
        if !param.is_buffer() {
            let value = param.scalar_value()?;
            if let Some(min) = param.min_value() {
                let lo = self.eval(&min)?;
                user_assert!(
                    value.as_f64() >= lo.as_f64(),
                    "Parameter {} has value {}, which is below its minimum {}",
                    param.name(),
                    value,
                    lo
                );
            }
            if let Some(max) = param.max_value() {
                let hi = self.eval(&max)?;
                user_assert!(
                    value.as_f64() <= hi.as_f64(),
                    "Parameter {} has value {}, which is above its maximum {}",
                    param.name(),
                    value,
                    hi
                );
            }
            return Ok(());
        }

        let buffer = param.get_buffer()?.ok_or_else(|| {
            user_error!("ImageParam {} is not bound to a buffer", param.name())
        })?;
        user_assert!(
            buffer.dimensions() == param.dimensions(),
            "ImageParam {} has {} dimensions, but Buffer {} has {}",
            param.name(),
            param.dimensions(),
            buffer.name(),
            buffer.dimensions()
        );
        for (dim, (constraint, actual)) in param
            .dim_constraints()
            .iter()
            .zip(buffer.dims())
            .enumerate()
        {
            let fields = [
                ("min", &constraint.min, actual.min),
                ("extent", &constraint.extent, actual.extent),
                ("stride", &constraint.stride, actual.stride),
            ];
            for (field, required, actual) in fields {
                let Some(required) = required else {
                    continue;
                };
                let required = self.eval(required)?.as_i64();
                user_assert!(
                    required == actual as i64,
                    "Buffer {} bound to ImageParam {} has {} {} in dimension {}, but {} is required",
                    buffer.name(),
                    param.name(),
                    field,
                    actual,
                    dim,
                    required
                );
            }
        }
        Ok(())
    }
}

/// Read `<name>.min.<d>` / `.extent.<d>` / `.stride.<d>` off the bound buffer.
fn buffer_field(param: &Parameter, name: &str) -> Result<Value, Diagnostic> {
    let suffix = name
        .strip_prefix(param.name())
        .and_then(|rest| rest.strip_prefix('.'))
        .ok_or_else(|| {
            internal_error!("Variable {} does not name a field of {}", name, param.name())
        })?;
    let (field, dim) = suffix
        .split_once('.')
        .and_then(|(field, d)| Some((field, d.parse::<usize>().ok()?)))
        .ok_or_else(|| internal_error!("Malformed buffer field {}", name))?;
    let buffer = param.get_buffer()?.ok_or_else(|| {
        user_error!("ImageParam {} is not bound to a buffer", param.name())
    })?;
    let d = buffer.dim(dim).ok_or_else(|| {
        user_error!(
            "Buffer {} has no dimension {} (needed by {})",
            buffer.name(),
            dim,
            name
        )
    })?;
    match field {
        "min" => Ok(Value::Int(d.min as i64)),
        "extent" => Ok(Value::Int(d.extent as i64)),
        "stride" => Ok(Value::Int(d.stride as i64)),
        _ => Err(internal_error!("Unknown buffer field {}", name)),
    }
}

fn binary(op: BinOp, ty: Type, x: Value, y: Value) -> Result<Value, Diagnostic> {
    if ty.is_float() {
        let (x, y) = (x.as_f64(), y.as_f64());
        let r = match op {
            BinOp::Add => x + y,
            BinOp::Sub => x - y,
            BinOp::Mul => x * y,
            BinOp::Div => x / y,
        };
        return Ok(Value::Float(r).cast_to(ty));
    }
    if ty.is_uint() || ty.is_handle() {
        let (x, y) = (x.as_u64(), y.as_u64());
        let r = match op {
            BinOp::Add => x.wrapping_add(y),
            BinOp::Sub => x.wrapping_sub(y),
            BinOp::Mul => x.wrapping_mul(y),
            BinOp::Div => {
                user_assert!(y != 0, "Division by zero while evaluating a {} expression", ty);
                x / y
            }
        };
        return Ok(Value::UInt(r).cast_to(ty));
    }
    let (x, y) = (x.as_i64(), y.as_i64());
    let r = match op {
        BinOp::Add => x.wrapping_add(y),
        BinOp::Sub => x.wrapping_sub(y),
        BinOp::Mul => x.wrapping_mul(y),
        BinOp::Div => {
            user_assert!(y != 0, "Division by zero while evaluating a {} expression", ty);
            floor_div(x, y)
        }
    };
    Ok(Value::Int(r).cast_to(ty))
}

/// Integer division rounding toward negative infinity; `MIN / -1` wraps.
fn floor_div(x: i64, y: i64) -> i64 {
    if y == -1 {
        return x.wrapping_neg();
    }
    x.div_euclid(y) - if y < 0 && x.rem_euclid(y) != 0 { 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;

    // ── Values ──

    #[test]
    fn from_bits_sign_extends() {
        assert_eq!(Value::from_bits(Type::int(8), 0xff), Value::Int(-1));
        assert_eq!(Value::from_bits(Type::uint(8), 0x1ff), Value::UInt(0xff));
    }

    #[test]
    fn cast_wraps_and_truncates() {
        assert_eq!(Value::Int(-1).cast_to(Type::uint(16)), Value::UInt(0xffff));
        assert_eq!(Value::Float(2.9).cast_to(Type::int(32)), Value::Int(2));
        assert_eq!(Value::Int(3).cast_to(Type::float(32)), Value::Float(3.0));
    }

    #[test]
    fn float32_bits_round_trip() {
        let bits = Value::Float(1.5).to_bits(Type::float(32));
        assert_eq!(Value::from_bits(Type::float(32), bits), Value::Float(1.5));
    }

    // ── Evaluation ──

    #[test]
    fn free_variables_and_arithmetic() {
        let x = Expr::var(Type::int(32), "x");
        let mut ev = Evaluator::new();
        ev.bind("x", Value::Int(7));
        assert_eq!(ev.eval(&(x.clone() * 3 - 1)).unwrap(), Value::Int(20));
        assert_eq!(ev.eval(&(x / 2)).unwrap(), Value::Int(3));
    }

    #[test]
    fn division_rounds_down() {
        let ev = Evaluator::new();
        assert_eq!(ev.eval(&(Expr::int(-7) / 2)).unwrap(), Value::Int(-4));
        assert_eq!(ev.eval(&(Expr::int(7) / -2)).unwrap(), Value::Int(-4));
        assert_eq!(ev.eval(&(Expr::int(-7) / -2)).unwrap(), Value::Int(3));
    }

    #[test]
    fn int64_min_divided_by_minus_one_wraps() {
        let big = Expr::cast(Type::int(64), Expr::int(i32::MIN));
        let e = big.clone() * big * Expr::cast(Type::int(64), Expr::int(2))
            / Expr::cast(Type::int(64), Expr::int(-1));
        assert_eq!(Evaluator::new().eval(&e).unwrap(), Value::Int(i64::MIN));
        assert_eq!(floor_div(i64::MIN, -1), i64::MIN);
        assert_eq!(floor_div(7, -1), -7);
    }

    #[test]
    fn unsigned_arithmetic_stays_unsigned() {
        let u64_of = |v: i32| Expr::cast(Type::uint(64), Expr::int(v));
        let e = (u64_of(0) - u64_of(1)) / u64_of(2);
        assert_eq!(Evaluator::new().eval(&e).unwrap(), Value::UInt(u64::MAX / 2));
        let e = Expr::cast(Type::uint(8), Expr::int(250)) + Expr::cast(Type::uint(8), Expr::int(10));
        assert_eq!(Evaluator::new().eval(&e).unwrap(), Value::UInt(4));
    }

    #[test]
    fn unbound_variable_is_user_error() {
        let err = Evaluator::new()
            .eval(&Expr::var(Type::int(32), "y"))
            .unwrap_err();
        assert_eq!(err.message, "Variable y is not bound");
    }

    #[test]
    fn division_by_zero_is_user_error() {
        let err = Evaluator::new().eval(&(Expr::int(1) / 0)).unwrap_err();
        assert!(err.is_user());
    }

    #[test]
    fn reads_current_scalar_binding() {
        let p = Parameter::scalar(Type::int(32), "gain".into());
        let e = Expr::param_var(Type::int(32), "gain", p.clone()) + 1;
        p.set_scalar(4i32).unwrap();
        assert_eq!(Evaluator::new().eval(&e).unwrap(), Value::Int(5));
        p.set_scalar(10i32).unwrap();
        assert_eq!(Evaluator::new().eval(&e).unwrap(), Value::Int(11));
    }

    #[test]
    fn reads_buffer_fields_and_elements() {
        let p = Parameter::buffer(Type::uint(8), 2, "im".into());
        let b = Buffer::new(Type::uint(8), &[3, 2]).unwrap();
        b.store::<u8>(&[2, 1], 42).unwrap();
        p.set_buffer(Some(b)).unwrap();

        let ev = Evaluator::new();
        let extent = Expr::param_var(Type::int(32), "im.extent.1", p.clone());
        let stride = Expr::param_var(Type::int(32), "im.stride.1", p.clone());
        assert_eq!(ev.eval(&extent).unwrap(), Value::Int(2));
        assert_eq!(ev.eval(&stride).unwrap(), Value::Int(3));

        let load = Expr::call(p, vec![Expr::int(2), Expr::int(1)]);
        assert_eq!(ev.eval(&load).unwrap(), Value::UInt(42));
    }

    #[test]
    fn unbound_buffer_is_user_error() {
        let p = Parameter::buffer(Type::uint(8), 1, "im".into());
        let err = Evaluator::new()
            .eval(&Expr::call(p, vec![Expr::int(0)]))
            .unwrap_err();
        assert_eq!(err.message, "ImageParam im is not bound to a buffer");
    }

    // ── Constraint checks ──

    #[test]
    fn scalar_range_is_checked_at_evaluation_time() {
        let p = Parameter::scalar(Type::float(32), "gain".into());
        p.set_min_value(Expr::float(0.5)).unwrap();
        p.set_max_value(Expr::float(4.0)).unwrap();
        // Binding does not validate.
        p.set_scalar(8.0f32).unwrap();
        let err = Evaluator::new().check_constraints(&p).unwrap_err();
        assert!(err.message.contains("above its maximum"), "{}", err.message);
        p.set_scalar(2.0f32).unwrap();
        Evaluator::new().check_constraints(&p).unwrap();
    }

    #[test]
    fn buffer_constraints_are_checked() {
        let p = Parameter::buffer(Type::uint(8), 2, "im".into());
        p.set_stride_constraint(0, Expr::int(1)).unwrap();
        p.set_extent_constraint(1, Expr::int(4)).unwrap();
        p.set_buffer(Some(Buffer::named(Type::uint(8), &[8, 3], "small").unwrap()))
            .unwrap();
        let err = Evaluator::new().check_constraints(&p).unwrap_err();
        assert_eq!(
            err.message,
            "Buffer small bound to ImageParam im has extent 3 in dimension 1, but 4 is required"
        );
        p.set_buffer(Some(Buffer::new(Type::uint(8), &[8, 4]).unwrap()))
            .unwrap();
        Evaluator::new().check_constraints(&p).unwrap();
    }
}
