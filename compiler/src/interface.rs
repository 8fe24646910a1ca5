// interface.rs — Resolve a parsed .pif interface into live parameters
//
// Walks the AST item by item, creating a `Parameter`, `ImageParam`, or
// `OutputImageParam` per declaration, applying method calls through the
// public binding API, and lowering `show` expressions to `Expr`s. Failures
// are collected as diagnostics located at `path:line:col`; resolution moves
// on to the next item.
//
// Preconditions: `iface` was parsed from `source`.
// Postconditions: `entries` holds every successfully declared name in
//   declaration order; bound parameters have been checked against their
//   constraints.
// Failure modes: unknown types or names, duplicate declarations, bad method
//   calls, and every user error raised by the binding API become error
//   diagnostics. Empty ranges become warnings.
// Side effects: drains this thread's warning queue after every item.

use std::collections::HashMap;

use chumsky::span::Span as _;

use crate::argument::{Argument, ArgumentSignature};
use crate::ast::{self, ExprAst, ExprKind, Ident, ImageDecl, ItemKind, MethodCall, Span};
use crate::buffer::Buffer;
use crate::diag::{self, Diagnostic};
use crate::eval::{Evaluator, Value};
use crate::expr::Expr;
use crate::image_param::{ImageParam, OutputImageParam};
use crate::param;
use crate::parameter::Parameter;
use crate::types::Type;
use crate::var::{self, Var, PLACEHOLDER_NAME};
use crate::{user_assert, user_error};

// ── Resolved form ───────────────────────────────────────────────────────────

/// What a declared name refers to.
#[derive(Debug, Clone)]
pub enum Binding {
    Scalar(Parameter),
    Image(ImageParam),
    Output(OutputImageParam),
}

impl Binding {
    pub fn parameter(&self) -> &Parameter {
        match self {
            Binding::Scalar(p) => p,
            Binding::Image(im) => im.parameter(),
            Binding::Output(out) => out.parameter(),
        }
    }

    pub fn argument(&self) -> Argument {
        Argument::from_parameter(self.parameter())
    }

    /// Keyword that declares this kind of binding.
    pub fn keyword(&self) -> &'static str {
        match self {
            Binding::Scalar(_) => "param",
            Binding::Image(_) => "image",
            Binding::Output(_) => "output",
        }
    }
}

/// A declared name.
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub binding: Binding,
    /// A value or buffer was bound with `set` / `bind`.
    pub bound: bool,
    pub span: Span,
}

/// The result of a `show` item.
#[derive(Debug, Clone)]
pub struct Shown {
    pub expr: Expr,
    /// Present when every input of `expr` is bound.
    pub value: Option<Value>,
}

/// Everything an interface file declared, plus its diagnostics.
#[derive(Debug, Default)]
pub struct ResolvedInterface {
    pub entries: Vec<Entry>,
    pub shown: Vec<Shown>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolvedInterface {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn lookup(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// The entry-point signature in declaration order.
    pub fn signature(&self) -> Result<ArgumentSignature, Diagnostic> {
        ArgumentSignature::from_arguments(
            self.entries.iter().map(|e| e.binding.argument()).collect(),
        )
    }

    /// The signature implied by the `show` expressions alone.
    pub fn inferred_signature(&self) -> ArgumentSignature {
        let exprs: Vec<Expr> = self.shown.iter().map(|s| s.expr.clone()).collect();
        crate::argument::infer_arguments(&exprs)
    }
}

// ── Locations ───────────────────────────────────────────────────────────────

/// 1-based line and column of byte `offset` in `source`.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let col = before
        .rfind('\n')
        .map_or(offset, |nl| offset - nl - 1)
        + 1;
    (line, col)
}

// ── Resolution ──────────────────────────────────────────────────────────────

/// Resolve `iface`. `path` labels diagnostic locations.
pub fn resolve(path: &str, source: &str, iface: &ast::Interface) -> ResolvedInterface {
    let mut resolver = Resolver {
        path,
        source,
        names: HashMap::new(),
        out: ResolvedInterface::default(),
    };
    // Start from a clean queue so earlier library use doesn't leak in.
    drop(diag::take_warnings());
    for item in &iface.items {
        let result = resolver.item(&item.kind);
        resolver.collect(result, item.span);
    }
    resolver.check_bound();
    tracing::debug!(
        entries = resolver.out.entries.len(),
        shown = resolver.out.shown.len(),
        diagnostics = resolver.out.diagnostics.len(),
        "resolved interface"
    );
    resolver.out
}

struct Resolver<'a> {
    path: &'a str,
    source: &'a str,
    names: HashMap<String, usize>,
    out: ResolvedInterface,
}

impl<'a> Resolver<'a> {
    fn locate(&self, diag: Diagnostic, span: Span) -> Diagnostic {
        let (line, col) = line_col(self.source, span.start());
        diag.with_location(format!("{}:{}:{}", self.path, line, col))
    }

    fn collect(&mut self, result: Result<(), Diagnostic>, span: Span) {
        let warnings = diag::take_warnings();
        for w in warnings {
            let located = self.locate(w, span);
            self.out.diagnostics.push(located);
        }
        if let Err(e) = result {
            let located = self.locate(e, span);
            self.out.diagnostics.push(located);
        }
    }

    fn entry(&self, id: &Ident) -> Result<&Entry, Diagnostic> {
        self.names
            .get(&id.name)
            .map(|&i| &self.out.entries[i])
            .ok_or_else(|| user_error!("Unknown name {}", id.name))
    }

    fn item(&mut self, kind: &ItemKind) -> Result<(), Diagnostic> {
        match kind {
            ItemKind::Param(decl) => {
                let ty = parse_type(&decl.ty)?;
                let param = Parameter::new(ty, false, 0, decl.name.name.clone())?;
                self.declare(&decl.name, Binding::Scalar(param))
            }
            ItemKind::Image(decl) => {
                let (ty, dims) = image_shape(decl)?;
                self.declare(&decl.name, Binding::Image(ImageParam::named(ty, dims, &decl.name.name)))
            }
            ItemKind::Output(decl) => {
                let (ty, dims) = image_shape(decl)?;
                self.declare(
                    &decl.name,
                    Binding::Output(OutputImageParam::named(ty, dims, &decl.name.name)),
                )
            }
            ItemKind::Method(call) => {
                self.method(call)?;
                Ok(())
            }
            ItemKind::Show(e) => {
                let expr = self.lower(e)?;
                let value = Evaluator::new().eval(&expr).ok();
                self.out.shown.push(Shown { expr, value });
                Ok(())
            }
        }
    }

    fn declare(&mut self, name: &Ident, binding: Binding) -> Result<(), Diagnostic> {
        user_assert!(
            name.name != PLACEHOLDER_NAME,
            "The name {} is reserved for the implicit placeholder",
            PLACEHOLDER_NAME
        );
        user_assert!(
            !Var::is_implicit(&name.name),
            "The name {} is reserved for implicit dimension variables",
            name.name
        );
        user_assert!(
            !self.names.contains_key(&name.name),
            "Duplicate declaration of {}",
            name.name
        );
        tracing::debug!(name = %name.name, kind = binding.keyword(), "declared");
        self.names.insert(name.name.clone(), self.out.entries.len());
        self.out.entries.push(Entry {
            name: name.name.clone(),
            binding,
            bound: false,
            span: name.span,
        });
        Ok(())
    }

    fn mark_bound(&mut self, id: &Ident, bound: bool) {
        if let Some(&i) = self.names.get(&id.name) {
            self.out.entries[i].bound = bound;
        }
    }

    // ── Methods ──

    /// Apply `recv.method(args)`. Returns the value for accessor methods.
    fn method(&mut self, call: &MethodCall) -> Result<Option<Expr>, Diagnostic> {
        let binding = self.entry(&call.receiver)?.binding.clone();
        let name = call.method.name.as_str();
        let args = call
            .args
            .iter()
            .map(|a| self.lower(a))
            .collect::<Result<Vec<_>, _>>()?;
        let arity = |n: usize| -> Result<(), Diagnostic> {
            user_assert!(
                args.len() == n,
                "{}.{} expects {} argument(s), got {}",
                call.receiver.name,
                name,
                n,
                args.len()
            );
            Ok(())
        };

        match &binding {
            Binding::Scalar(p) => match name {
                "set_range" => {
                    arity(2)?;
                    param::set_range(p, Some(args[0].clone()), Some(args[1].clone()))?;
                }
                "set_min_value" => {
                    arity(1)?;
                    p.set_min_value(args[0].clone())?;
                }
                "set_max_value" => {
                    arity(1)?;
                    p.set_max_value(args[0].clone())?;
                }
                "set" => {
                    arity(1)?;
                    let value = Evaluator::new().eval(&args[0])?;
                    p.set_scalar_value(value)?;
                    self.mark_bound(&call.receiver, true);
                }
                _ => return Err(unknown_method(&call.receiver.name, name, "param")),
            },
            Binding::Image(im) => match name {
                "bind" => {
                    let mut extents = Vec::with_capacity(args.len());
                    for a in &args {
                        extents.push(const_i32(a, &call.receiver.name, name)?);
                    }
                    let buffer = Buffer::named(im.ty(), &extents, format!("{}_buffer", im.name()))?;
                    im.set(buffer)?;
                    self.mark_bound(&call.receiver, true);
                }
                "reset" => {
                    arity(0)?;
                    im.reset()?;
                    self.mark_bound(&call.receiver, false);
                }
                _ => return dimensional(im.as_output(), &call.receiver.name, name, &args),
            },
            Binding::Output(out) => return dimensional(out, &call.receiver.name, name, &args),
        }
        Ok(None)
    }

    // ── Expressions ──

    fn lower(&mut self, e: &ExprAst) -> Result<Expr, Diagnostic> {
        match &e.kind {
            ExprKind::Int(n) => int_literal(*n),
            ExprKind::Float(f) => Ok(Expr::float(*f as f32)),
            ExprKind::Neg(inner) => match &inner.kind {
                ExprKind::Int(n) => int_literal(-*n),
                ExprKind::Float(f) => Ok(Expr::float(-*f as f32)),
                _ => Ok(Expr::int(0) - self.lower(inner)?),
            },
            ExprKind::Name(id) => {
                if id.name == PLACEHOLDER_NAME {
                    return Ok(var::placeholder());
                }
                match self.names.get(&id.name).map(|&i| &self.out.entries[i].binding) {
                    Some(Binding::Scalar(p)) => Ok(Expr::param_var(p.ty(), p.name(), p.clone())),
                    Some(Binding::Image(im)) => im.to_expr(),
                    Some(Binding::Output(_)) => {
                        Err(user_error!("Can't read from output image {}", id.name))
                    }
                    None => Ok(Var::new(id.name.clone()).expr()),
                }
            }
            ExprKind::Call { callee, args } => {
                let lowered = args
                    .iter()
                    .map(|a| self.lower(a))
                    .collect::<Result<Vec<_>, _>>()?;
                match self.names.get(&callee.name).map(|&i| &self.out.entries[i].binding) {
                    Some(Binding::Image(im)) => im.call(&lowered),
                    Some(other) => Err(user_error!(
                        "{} is declared with `{}` and can't be called",
                        callee.name,
                        other.keyword()
                    )),
                    None => {
                        let ty = Type::parse(&callee.name)
                            .ok_or_else(|| user_error!("Unknown function {}", callee.name))?;
                        user_assert!(
                            lowered.len() == 1,
                            "Cast to {} takes one argument, got {}",
                            ty,
                            lowered.len()
                        );
                        let value = lowered.into_iter().next().ok_or_else(|| {
                            user_error!("Cast to {} takes one argument", ty)
                        })?;
                        Ok(Expr::cast(ty, value))
                    }
                }
            }
            ExprKind::Method(call) => self.method(call)?.ok_or_else(|| {
                user_error!(
                    "{}.{}() has no value",
                    call.receiver.name,
                    call.method.name
                )
            }),
            ExprKind::Binary { op, lhs, rhs } => {
                let a = self.lower(lhs)?;
                let b = self.lower(rhs)?;
                Ok(Expr::binary(*op, a, b))
            }
        }
    }

    // ── Validation ──

    /// Check every bound parameter against its declared constraints.
    fn check_bound(&mut self) {
        let eval = Evaluator::new();
        let mut failures = Vec::new();
        for entry in self.out.entries.iter().filter(|e| e.bound) {
            if let Err(e) = eval.check_constraints(entry.binding.parameter()) {
                failures.push((e, entry.span));
            }
        }
        for (e, span) in failures {
            let located = self.locate(e, span);
            self.out.diagnostics.push(located);
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn parse_type(id: &Ident) -> Result<Type, Diagnostic> {
    Type::parse(&id.name).ok_or_else(|| user_error!("Unknown type {}", id.name))
}

fn image_shape(decl: &ImageDecl) -> Result<(Type, usize), Diagnostic> {
    let ty = parse_type(&decl.ty)?;
    user_assert!(
        ty.is_int() || ty.is_uint() || ty.is_float(),
        "Image {} must have a numeric element type, not {}",
        decl.name.name,
        ty
    );
    let dims = usize::try_from(decl.dims)
        .map_err(|_| user_error!("Image {} has a negative dimension count", decl.name.name))?;
    Ok((ty, dims))
}

fn int_literal(n: i64) -> Result<Expr, Diagnostic> {
    let v = i32::try_from(n)
        .map_err(|_| user_error!("Integer literal {} does not fit in int32", n))?;
    Ok(Expr::int(v))
}

fn const_i32(e: &Expr, receiver: &str, method: &str) -> Result<i32, Diagnostic> {
    e.as_int()
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| {
            user_error!(
                "Arguments to {}.{} must be integer constants, not {}",
                receiver,
                method,
                e
            )
        })
}

fn const_dim(e: &Expr, receiver: &str, method: &str) -> Result<usize, Diagnostic> {
    let d = const_i32(e, receiver, method)?;
    usize::try_from(d).map_err(|_| {
        user_error!(
            "Dimension argument to {}.{} must be non-negative, got {}",
            receiver,
            method,
            d
        )
    })
}

fn unknown_method(receiver: &str, method: &str, kind: &str) -> Diagnostic {
    user_error!("Unknown method {} on {} {}", method, kind, receiver)
}

/// Methods shared by images and outputs.
fn dimensional(
    out: &OutputImageParam,
    receiver: &str,
    method: &str,
    args: &[Expr],
) -> Result<Option<Expr>, Diagnostic> {
    let expect = |n: usize| -> Result<(), Diagnostic> {
        user_assert!(
            args.len() == n,
            "{}.{} expects {} argument(s), got {}",
            receiver,
            method,
            n,
            args.len()
        );
        Ok(())
    };
    let value = match method {
        "left" | "right" | "top" | "bottom" | "width" | "height" | "channels" => {
            expect(0)?;
            match method {
                "left" => out.left()?,
                "right" => out.right()?,
                "top" => out.top()?,
                "bottom" => out.bottom()?,
                "width" => out.width()?,
                "height" => out.height()?,
                _ => out.channels()?,
            }
        }
        "min" | "extent" | "stride" => {
            expect(1)?;
            let d = const_dim(&args[0], receiver, method)?;
            user_assert!(
                d < out.dimensions(),
                "Can't ask for the {} of dimension {} of ImageParam {}, which has {} dimensions",
                method,
                d,
                out.name(),
                out.dimensions()
            );
            match method {
                "min" => out.min(d),
                "extent" => out.extent(d),
                _ => out.stride(d),
            }
        }
        "set_min" | "set_extent" | "set_stride" => {
            expect(2)?;
            let d = const_dim(&args[0], receiver, method)?;
            let e = args[1].clone();
            match method {
                "set_min" => out.set_min(d, e)?,
                "set_extent" => out.set_extent(d, e)?,
                _ => out.set_stride(d, e)?,
            };
            return Ok(None);
        }
        "set_bounds" => {
            expect(3)?;
            let d = const_dim(&args[0], receiver, method)?;
            out.set_bounds(d, args[1].clone(), args[2].clone())?;
            return Ok(None);
        }
        _ => return Err(unknown_method(receiver, method, "image")),
    };
    Ok(Some(value))
}

// ── Tests ──
