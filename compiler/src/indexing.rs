// indexing.rs — Image-call argument expansion and index coercion
//
// Pure functions from (call arguments, declared dimensionality) to the
// argument list of an element access, or a user error.
//
// Preconditions: none.
// Postconditions: a successful result has exactly `dims` entries, each of
//   type int32.
// Failure modes: a second placeholder, a dimension-count mismatch, or an
//   index of float / wide-unsigned / wide-signed type is a user error.
// Side effects: none.

use crate::diag::Diagnostic;
use crate::expr::Expr;
use crate::types::Type;
use crate::var::Var;
use crate::{user_assert, user_error};

/// Replace the placeholder `_` (if present) with as many implicit dimension
/// variables as the explicit arguments leave uncovered.
///
/// With `total` arguments against a `dims`-dimensional image, the
/// placeholder expands to `dims - total + 1` variables `_0, _1, ...` at its
/// own position. Everything else is appended unchanged.
#[track_caller]
pub fn expand_implicit_args(
    name: &str,
    args: &[Expr],
    dims: usize,
) -> Result<Vec<Expr>, Diagnostic> {
    let total = args.len();
    let mut expanded = Vec::with_capacity(dims.max(total));
    let mut placeholder_seen = false;
    for arg in args {
        let is_placeholder = arg.as_variable().is_some_and(Var::is_placeholder);
        if !is_placeholder {
            expanded.push(arg.clone());
            continue;
        }
        user_assert!(
            !placeholder_seen,
            "Only one implicit placeholder ('_') allowed in argument list for ImageParam {}",
            name
        );
        placeholder_seen = true;
        // One of the `total` arguments is the placeholder itself.
        let implicit = (dims + 1).saturating_sub(total);
        tracing::trace!(image = name, position = expanded.len(), implicit, "expanding placeholder");
        for i in 0..implicit {
            expanded.push(Var::implicit(i).expr());
        }
    }
    Ok(expanded)
}

/// Whether an index of type `t` must be cast explicitly by the author.
pub fn is_risky_index_type(t: Type) -> bool {
    t.is_float() || (t.is_uint() && t.bits >= 32) || (t.is_int() && t.bits > 32)
}

/// Check the argument count and force every index to int32.
///
/// Narrow integer indices are cast silently; float, unsigned 32-bit-or-wider,
/// and signed wider-than-32-bit indices are rejected.
#[track_caller]
pub fn check_arg_types(name: &str, args: Vec<Expr>, dims: usize) -> Result<Vec<Expr>, Diagnostic> {
    user_assert!(
        args.len() == dims,
        "{}-argument access to ImageParam {}, which has {} dimensions.",
        args.len(),
        name,
        dims
    );
    let mut checked = Vec::with_capacity(args.len());
    for (i, arg) in args.into_iter().enumerate() {
        let t = arg.ty();
        if is_risky_index_type(t) {
            return Err(user_error!(
                "Implicit cast from {} to int in argument {} in call to {} is not allowed. Use an explicit cast.",
                t,
                i + 1,
                name
            ));
        }
        if t == Type::int(32) {
            checked.push(arg);
        } else {
            checked.push(Expr::cast(Type::int(32), arg));
        }
    }
    Ok(checked)
}

/// Expand the placeholder, then coerce: the full argument pipeline of an
/// image call.
#[track_caller]
pub fn image_call_args(name: &str, args: &[Expr], dims: usize) -> Result<Vec<Expr>, Diagnostic> {
    let expanded = expand_implicit_args(name, args, dims)?;
    check_arg_types(name, expanded, dims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::var::placeholder;

    fn v(name: &str) -> Expr {
        Var::new(name).expr()
    }

    fn implicit(n: usize) -> Expr {
        Var::implicit(n).expr()
    }

    // ── Expansion ──

    #[test]
    fn trailing_placeholder_fills_remaining_dims() {
        let out = expand_implicit_args("im", &[v("x"), placeholder()], 3).unwrap();
        assert_eq!(out, vec![v("x"), implicit(0), implicit(1)]);
    }

    #[test]
    fn sole_placeholder_spans_all_dims() {
        let out = expand_implicit_args("im", &[placeholder()], 2).unwrap();
        assert_eq!(out, vec![implicit(0), implicit(1)]);
    }

    #[test]
    fn leading_placeholder_expands_in_place() {
        let out = expand_implicit_args("im", &[placeholder(), v("c")], 3).unwrap();
        assert_eq!(out, vec![implicit(0), implicit(1), v("c")]);
    }

    #[test]
    fn placeholder_covering_nothing_vanishes() {
        let out = expand_implicit_args("im", &[v("x"), v("y"), placeholder()], 2).unwrap();
        assert_eq!(out, vec![v("x"), v("y")]);
    }

    #[test]
    fn no_placeholder_passes_through() {
        let args = vec![v("x"), v("y")];
        assert_eq!(expand_implicit_args("im", &args, 5).unwrap(), args);
    }

    #[test]
    fn second_placeholder_is_rejected() {
        let err = expand_implicit_args("im", &[placeholder(), placeholder()], 4).unwrap_err();
        assert!(err.is_user());
        assert_eq!(
            err.message,
            "Only one implicit placeholder ('_') allowed in argument list for ImageParam im"
        );
    }

    #[test]
    fn implicit_vars_are_not_placeholders() {
        let out = expand_implicit_args("im", &[implicit(0)], 1).unwrap();
        assert_eq!(out, vec![implicit(0)]);
    }

    // ── Coercion ──

    #[test]
    fn int16_index_is_cast() {
        let arg = Expr::var(Type::int(16), "s");
        let out = check_arg_types("im", vec![arg.clone()], 1).unwrap();
        assert_eq!(out, vec![Expr::cast(Type::int(32), arg)]);
    }

    #[test]
    fn narrow_unsigned_index_is_cast() {
        let arg = Expr::var(Type::uint(16), "u");
        let out = check_arg_types("im", vec![arg], 1).unwrap();
        assert_eq!(out[0].to_string(), "int32(u)");
    }

    #[test]
    fn int32_index_passes_without_cast() {
        let arg = v("x");
        let out = check_arg_types("im", vec![arg.clone()], 1).unwrap();
        assert!(out[0].same_as(&arg));
    }

    #[test]
    fn risky_index_types_are_rejected() {
        for t in [Type::float(64), Type::float(32), Type::uint(32), Type::uint(64), Type::int(64)] {
            let err = check_arg_types("im", vec![v("x"), Expr::var(t, "i")], 2).unwrap_err();
            assert_eq!(
                err.message,
                format!(
                    "Implicit cast from {} to int in argument 2 in call to im is not allowed. Use an explicit cast.",
                    t
                )
            );
        }
    }

    #[test]
    fn count_mismatch_reports_both_counts() {
        let err = check_arg_types("im", vec![v("x")], 3).unwrap_err();
        assert_eq!(err.message, "1-argument access to ImageParam im, which has 3 dimensions.");
    }

    #[test]
    fn full_pipeline_rejects_overfull_placeholder_call() {
        let err = image_call_args("im", &[v("x"), v("y"), v("z"), placeholder()], 2).unwrap_err();
        assert!(err.message.starts_with("3-argument access"), "{}", err.message);
    }
}
