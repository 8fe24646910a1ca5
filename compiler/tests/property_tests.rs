// Property-based tests for binding-layer invariants.
//
// Four categories:
// 1. Placeholder expansion: any single `_` expands to exactly the uncovered
//    dimensions, in place
// 2. Index coercion: acceptance depends only on the index type
// 3. Dimensional accessors: names and edge/size availability by dimensionality
// 4. Argument inference ordering and fingerprint stability
// 5. Type matching of buffer bindings and range bounds, for every type pair
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use pbind::eval::Value;
use pbind::indexing::is_risky_index_type;
use pbind::{
    infer_arguments, placeholder, Argument, ArgumentSignature, Buffer, Expr, ImageParam, Origin, Parameter,
    Type, Var,
};
use proptest::prelude::*;

// ── Generators ──────────────────────────────────────────────────────────────

fn arb_index_type() -> impl Strategy<Value = Type> {
    prop_oneof![
        prop_oneof![Just(8u8), Just(16), Just(32), Just(64)].prop_map(Type::int),
        prop_oneof![Just(1u8), Just(8), Just(16), Just(32), Just(64)].prop_map(Type::uint),
        prop_oneof![Just(16u8), Just(32), Just(64)].prop_map(Type::float),
    ]
}

fn arb_scalar_type() -> impl Strategy<Value = Type> {
    prop_oneof![arb_index_type(), Just(Type::handle())]
}

/// (dims, explicit argument count, placeholder position among the explicit args)
fn arb_placeholder_call() -> impl Strategy<Value = (usize, usize, usize)> {
    (0usize..6).prop_flat_map(|dims| {
        (0..=dims).prop_flat_map(move |explicit| (Just(dims), Just(explicit), 0..=explicit))
    })
}

// ── Placeholder expansion ───────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn placeholder_fills_uncovered_dims((dims, explicit, pos) in arb_placeholder_call()) {
        let im = ImageParam::named(Type::uint(8), dims, "prop_im");
        let named: Vec<Expr> = (0..explicit).map(|i| Var::new(format!("x{}", i)).expr()).collect();
        let mut args = named.clone();
        args.insert(pos, placeholder());

        let call = im.call(&args).unwrap();
        let expected: Vec<Expr> = named[..pos]
            .iter()
            .cloned()
            .chain((0..dims - explicit).map(|i| Var::implicit(i).expr()))
            .chain(named[pos..].iter().cloned())
            .collect();
        prop_assert_eq!(call, im.call(&expected).unwrap());
    }

    #[test]
    fn second_placeholder_always_rejected(dims in 0usize..6, a in 0usize..4, b in 0usize..4) {
        let im = ImageParam::named(Type::uint(8), dims, "prop_twice");
        let mut args: Vec<Expr> = (0..a.max(b)).map(|i| Var::new(format!("y{}", i)).expr()).collect();
        args.insert(a.min(args.len()), placeholder());
        args.insert(b.min(args.len()), placeholder());
        let err = im.call(&args).unwrap_err();
        prop_assert!(err.message.starts_with("Only one implicit placeholder"));
    }

    #[test]
    fn explicit_count_must_match(dims in 0usize..6, given in 0usize..8) {
        prop_assume!(given != dims);
        let im = ImageParam::named(Type::uint(8), dims, "prop_count");
        let args: Vec<Expr> = (0..given).map(|i| Expr::int(i as i32)).collect();
        let err = im.call(&args).unwrap_err();
        let expected = format!("{}-argument access to ImageParam prop_count, which has {} dimensions.", given, dims);
        prop_assert_eq!(err.message, expected);
    }
}

// ── Index coercion ──────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 100,
        .. ProptestConfig::default()
    })]

    #[test]
    fn index_type_decides_acceptance(t in arb_index_type()) {
        let im = ImageParam::named(Type::float(32), 1, "prop_idx");
        let result = im.call(&[Expr::var(t, "i")]);
        let risky = t.is_float() || (t.is_uint() && t.bits >= 32) || (t.is_int() && t.bits > 32);
        prop_assert_eq!(is_risky_index_type(t), risky);
        prop_assert_eq!(result.is_err(), risky);
        if let Ok(call) = result {
            let expected = if t == Type::int(32) {
                "prop_idx(i)".to_string()
            } else {
                "prop_idx(int32(i))".to_string()
            };
            prop_assert_eq!(call.to_string(), expected);
        }
    }

    #[test]
    fn int32_cast_wraps_like_as(v in any::<i64>()) {
        prop_assert_eq!(Value::Int(v).cast_to(Type::int(32)), Value::Int(v as i32 as i64));
        prop_assert_eq!(Value::Int(v).cast_to(Type::uint(8)), Value::UInt(v as u8 as u64));
    }
}

// ── Dimensional accessors ───────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 100,
        .. ProptestConfig::default()
    })]

    #[test]
    fn accessor_names_follow_pattern(dims in 1usize..6, d in 0usize..6) {
        let im = ImageParam::named(Type::int(16), dims, "acc");
        prop_assert_eq!(im.min(d).to_string(), format!("acc.min.{}", d));
        prop_assert_eq!(im.extent(d).to_string(), format!("acc.extent.{}", d));
        prop_assert_eq!(im.stride(d).to_string(), format!("acc.stride.{}", d));
    }

    #[test]
    fn edges_available_by_dimensionality(dims in 0usize..5) {
        let im = ImageParam::named(Type::uint(8), dims, "edges");
        prop_assert_eq!(im.left().is_ok(), dims >= 1);
        prop_assert_eq!(im.right().is_ok(), dims >= 1);
        prop_assert_eq!(im.width().is_ok(), dims >= 1);
        prop_assert_eq!(im.top().is_ok(), dims >= 2);
        prop_assert_eq!(im.bottom().is_ok(), dims >= 2);
        prop_assert_eq!(im.height().is_ok(), dims >= 2);
        prop_assert_eq!(im.channels().is_ok(), dims >= 3);
    }

    #[test]
    fn bare_image_is_placeholder_call(dims in 0usize..6) {
        let im = ImageParam::named(Type::uint(8), dims, "bare");
        let implicit: Vec<Expr> = (0..dims).map(|i| Var::implicit(i).expr()).collect();
        prop_assert_eq!(im.to_expr().unwrap(), im.call(&implicit).unwrap());
    }
}

// ── Signatures ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 50,
        max_shrink_iters: 100,
        .. ProptestConfig::default()
    })]

    #[test]
    fn inferred_buffers_precede_scalars(
        names in prop::collection::btree_set("[a-z]{1,6}", 1..6),
        buffer_mask in any::<u8>(),
    ) {
        let mut exprs = Vec::new();
        for (i, name) in names.iter().enumerate() {
            if buffer_mask & (1 << i) != 0 {
                let im = ImageParam::named(Type::uint(8), 1, name.clone());
                exprs.push(im.call(&[Expr::int(0)]).unwrap());
            } else {
                exprs.push(pbind::Param::<i32>::named(name.clone()).expr());
            }
        }
        let sig = infer_arguments(&exprs);
        prop_assert_eq!(sig.len(), names.len());
        let first_scalar = sig.arguments.iter().position(|a| !a.is_buffer).unwrap_or(sig.len());
        prop_assert!(sig.arguments[first_scalar..].iter().all(|a| !a.is_buffer));
        for group in [&sig.arguments[..first_scalar], &sig.arguments[first_scalar..]] {
            prop_assert!(group.windows(2).all(|w| w[0].name < w[1].name));
        }
    }

    #[test]
    fn fingerprint_depends_only_on_content(names in prop::collection::btree_set("[a-z]{1,6}", 1..6)) {
        let args: Vec<Argument> = names.iter().map(|n| Argument::new(n.clone(), false, Type::int(32))).collect();
        let a = ArgumentSignature::from_arguments(args.clone()).unwrap();
        let b = ArgumentSignature::from_arguments(args).unwrap();
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
    }
}

// ── Type matching ───────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 150,
        max_shrink_iters: 100,
        .. ProptestConfig::default()
    })]

    #[test]
    fn buffer_binding_requires_matching_type(declared in arb_scalar_type(), bound in arb_scalar_type()) {
        let im = ImageParam::named(declared, 2, "prop_bind");
        let buffer = Buffer::new(bound, &[2, 2]).unwrap();
        match im.set(buffer) {
            Ok(()) => {
                prop_assert_eq!(declared, bound);
                prop_assert!(im.get().unwrap().is_some());
            }
            Err(err) => {
                prop_assert_ne!(declared, bound);
                prop_assert_eq!(err.origin, Origin::User);
                prop_assert!(im.get().unwrap().is_none());
            }
        }
    }

    #[test]
    fn range_bounds_are_cast_to_parameter_type(declared in arb_scalar_type(), given in arb_scalar_type()) {
        let p = Parameter::new(declared, false, 0, "prop_range").unwrap();
        let lo = Expr::var(given, "lo");
        let hi = Expr::var(given, "hi");
        p.set_min_value(lo.clone()).unwrap();
        p.set_max_value(hi.clone()).unwrap();
        let (min, max) = (p.min_value().unwrap(), p.max_value().unwrap());
        if declared == given {
            prop_assert!(min.same_as(&lo));
            prop_assert!(max.same_as(&hi));
        } else {
            prop_assert_eq!(min, Expr::cast(declared, lo));
            prop_assert_eq!(max, Expr::cast(declared, hi));
        }
    }
}
