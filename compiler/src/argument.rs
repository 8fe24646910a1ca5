// argument.rs — Argument signatures for compiled entry points
//
// Flattens the external inputs/outputs of a pipeline into an ordered list of
// (name, is-buffer, type) entries, either from an explicit list or by
// inferring every parameter reachable from a set of expressions.
//
// Preconditions: none.
// Postconditions: entry names are unique within a signature.
// Failure modes: duplicate names in an explicit list are a user error.
// Side effects: none.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::diag::Diagnostic;
use crate::expr::Expr;
use crate::param::USER_CONTEXT_NAME;
use crate::parameter::Parameter;
use crate::types::Type;
use crate::user_assert;

// ── Argument ────────────────────────────────────────────────────────────────

/// One entry of an entry-point signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Argument {
    pub name: String,
    pub is_buffer: bool,
    #[serde(rename = "type")]
    pub ty: Type,
}

impl Argument {
    pub fn new(name: impl Into<String>, is_buffer: bool, ty: Type) -> Self {
        Argument {
            name: name.into(),
            is_buffer,
            ty,
        }
    }

    pub fn from_parameter(p: &Parameter) -> Self {
        Argument::new(p.name(), p.is_buffer(), p.ty())
    }

    /// The C parameter declaration for this entry.
    pub fn c_decl(&self) -> String {
        if self.is_buffer {
            format!("struct pbind_buffer_t *{}", self.name)
        } else {
            let c = self.ty.c_name();
            if c.ends_with('*') {
                format!("{}{}", c, self.name)
            } else {
                format!("{} {}", c, self.name)
            }
        }
    }
}

// ── Signature ───────────────────────────────────────────────────────────────

/// An ordered, duplicate-free list of arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArgumentSignature {
    pub arguments: Vec<Argument>,
}

impl ArgumentSignature {
    /// Use `arguments` in the given order.
    #[track_caller]
    pub fn from_arguments(arguments: Vec<Argument>) -> Result<Self, Diagnostic> {
        let mut seen = HashSet::new();
        for arg in &arguments {
            user_assert!(
                seen.insert(arg.name.as_str()),
                "Duplicate argument name {} in pipeline signature",
                arg.name
            );
        }
        Ok(ArgumentSignature { arguments })
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// Compact JSON, stable across runs; the input to `fingerprint`.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Hex SHA-256 of the canonical JSON.
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};

        let digest = Sha256::digest(self.canonical_json().as_bytes());
        let mut s = String::with_capacity(64);
        for b in digest.iter() {
            use std::fmt::Write;
            let _ = write!(s, "{:02x}", b);
        }
        s
    }

    /// C prototype of an entry point taking these arguments.
    pub fn c_prototype(&self, function: &str) -> String {
        let params: Vec<String> = self.arguments.iter().map(Argument::c_decl).collect();
        format!("int {}({});", function, params.join(", "))
    }
}

impl fmt::Display for ArgumentSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for arg in &self.arguments {
            let kind = if arg.is_buffer { "buffer" } else { "scalar" };
            writeln!(f, "{} {} {}", kind, arg.ty, arg.name)?;
        }
        Ok(())
    }
}

// ── Inference ───────────────────────────────────────────────────────────────

/// Collect every parameter reachable from `exprs`, including parameters
/// mentioned only by other parameters' range or dimension constraints.
///
/// Order: the user context first, then buffers, then scalars, each group
/// sorted by name. Distinct parameters sharing a name are reported once.
pub fn infer_arguments(exprs: &[Expr]) -> ArgumentSignature {
    let mut found: Vec<Parameter> = Vec::new();
    let mut pending: Vec<Parameter> = Vec::new();
    for e in exprs {
        e.for_each_parameter(&mut |p| pending.push(p.clone()));
    }
    while let Some(p) = pending.pop() {
        if found.iter().any(|q| q.same_as(&p)) {
            continue;
        }
        let mut constraint_exprs: Vec<Expr> = Vec::new();
        constraint_exprs.extend(p.min_value());
        constraint_exprs.extend(p.max_value());
        for dim in p.dim_constraints() {
            constraint_exprs.extend(dim.min);
            constraint_exprs.extend(dim.extent);
            constraint_exprs.extend(dim.stride);
        }
        for e in &constraint_exprs {
            e.for_each_parameter(&mut |q| pending.push(q.clone()));
        }
        found.push(p);
    }

    let mut arguments: Vec<Argument> = Vec::new();
    let mut names = HashSet::new();
    for p in &found {
        if names.insert(p.name().to_string()) {
            arguments.push(Argument::from_parameter(p));
        }
    }
    arguments.sort_by(|a, b| {
        let rank = |arg: &Argument| (arg.name != USER_CONTEXT_NAME, !arg.is_buffer);
        rank(a).cmp(&rank(b)).then_with(|| a.name.cmp(&b.name))
    });
    tracing::debug!(count = arguments.len(), "inferred arguments");
    ArgumentSignature { arguments }
}
