//! End-to-end multiple dispatch scenarios.

mod common;

use common::{arg_count, returns, sig};
use generic_dispatch::{CallSite, DispatchError, Dispatcher, MethodDef, Value};
use generic_dispatch_types::TypeExpr;
use pretty_assertions::assert_eq;

#[test]
fn test_exact_leaf_dispatch() {
    let d = Dispatcher::new();
    let f = d.function("f");
    d.define(
        &f,
        MethodDef::new(
            sig(vec![TypeExpr::Int64, TypeExpr::Int64]),
            returns(Value::I64(1)),
        ),
    );
    d.define(
        &f,
        MethodDef::new(
            sig(vec![TypeExpr::Int64, TypeExpr::Real]),
            returns(Value::I64(2)),
        ),
    );

    let r = d
        .apply(CallSite(101), &f, &[Value::I64(3), Value::I64(4)])
        .unwrap();
    assert_eq!(r, Value::I64(1));
    assert_eq!(f.mtable().cache_len(), 1);
}

#[test]
fn test_specificity_orders_definitions() {
    let d = Dispatcher::new();
    let f = d.function("f");
    d.define(
        &f,
        MethodDef::new(
            sig(vec![TypeExpr::Real, TypeExpr::Real]),
            returns(Value::Str("A".into())),
        ),
    );
    d.define(
        &f,
        MethodDef::new(
            sig(vec![TypeExpr::Int64, TypeExpr::Int64]),
            returns(Value::Str("B".into())),
        ),
    );

    let r1 = d
        .apply(CallSite(201), &f, &[Value::I64(2), Value::I64(3)])
        .unwrap();
    assert_eq!(r1, Value::Str("B".into()));
    let r2 = d
        .apply(CallSite(202), &f, &[Value::F64(2.0), Value::F64(3.0)])
        .unwrap();
    assert_eq!(r2, Value::Str("A".into()));
    assert_eq!(f.mtable().cache_len(), 2);
}

#[test]
fn test_redefinition_invalidates_cached_specialization() {
    let d = Dispatcher::new();
    let h = d.function("h");
    d.define(
        &h,
        MethodDef::new(sig(vec![TypeExpr::Int64]), returns(Value::I64(1))),
    );

    let site = CallSite(301);
    assert_eq!(d.apply(site, &h, &[Value::I64(5)]).unwrap(), Value::I64(1));
    assert_eq!(h.mtable().cache_len(), 1);

    // Redefine h(::Int64); the old specialization must be unlinked even
    // though the call site already has an inline-cache hit.
    d.define(
        &h,
        MethodDef::new(sig(vec![TypeExpr::Int64]), returns(Value::I64(2))),
    );
    assert_eq!(h.mtable().cache_len(), 0);
    assert!(h.mtable().invalidations() >= 1);

    assert_eq!(d.apply(site, &h, &[Value::I64(5)]).unwrap(), Value::I64(2));
    assert_eq!(h.mtable().cache_len(), 1);
}

#[test]
fn test_new_covering_method_takes_over() {
    let d = Dispatcher::new();
    let f = d.function("f");
    let general = d.define(
        &f,
        MethodDef::new(sig(vec![TypeExpr::Real]), returns(Value::I64(1))),
    );

    let spec = f
        .mtable()
        .lookup_by_args(&d, &[Value::I64(2)])
        .unwrap();
    assert!(spec
        .method()
        .is_some_and(|m| std::sync::Arc::ptr_eq(&m, &general)));

    let specific = d.define(
        &f,
        MethodDef::new(sig(vec![TypeExpr::Int64]), returns(Value::I64(2))),
    );
    // The shadowed specialization is gone; the identical call re-runs the
    // builder against the new definition.
    let spec = f
        .mtable()
        .lookup_by_args(&d, &[Value::I64(2)])
        .unwrap();
    assert!(spec
        .method()
        .is_some_and(|m| std::sync::Arc::ptr_eq(&m, &specific)));
}

#[test]
fn test_vararg_truncation_caps_cache_arity() {
    let d = Dispatcher::new();
    let k = d.function("k");
    let m = d.define(
        &k,
        MethodDef::new(sig(vec![TypeExpr::vararg(TypeExpr::Any)]), arg_count()),
    );
    k.mtable().set_max_args(2);

    let r = d
        .apply(
            CallSite(401),
            &k,
            &[
                Value::I64(1),
                Value::Str("a".into()),
                Value::I64(3),
                Value::I64(4),
            ],
        )
        .unwrap();
    assert_eq!(r, Value::I64(4));
    assert_eq!(k.mtable().cache_len(), 1);

    // The cached signature is capped at max_args + 2 slots, vararg-final.
    let spec_sig = m.specializations()[0].sig().clone();
    assert!(spec_sig.nparams() <= 4);
    assert!(spec_sig.has_vararg());

    // A longer call with the same prefix rides the same entry.
    let r = d
        .apply(
            CallSite(402),
            &k,
            &[
                Value::I64(9),
                Value::Str("z".into()),
                Value::I64(7),
                Value::I64(8),
                Value::I64(15),
            ],
        )
        .unwrap();
    assert_eq!(r, Value::I64(5));
    assert_eq!(k.mtable().cache_len(), 1);
}

#[test]
fn test_invoke_forces_less_specific_method() {
    let d = Dispatcher::new();
    let p = d.function("p");
    let real_m = d.define(
        &p,
        MethodDef::new(sig(vec![TypeExpr::Real]), returns(Value::Str("R".into()))),
    );
    d.define(
        &p,
        MethodDef::new(sig(vec![TypeExpr::Int64]), returns(Value::Str("I".into()))),
    );

    // Normal dispatch selects p(::Int64)
    let r = d.apply(CallSite(501), &p, &[Value::I64(3)]).unwrap();
    assert_eq!(r, Value::Str("I".into()));
    let cache_before = p.mtable().cache_len();

    let r = d
        .invoke(&p, &sig(vec![TypeExpr::Real]), &[Value::I64(3)])
        .unwrap();
    assert_eq!(r, Value::Str("R".into()));

    // The shared cache is untouched; the private invoke cache gained one.
    assert_eq!(p.mtable().cache_len(), cache_before);
    assert_eq!(real_m.invoke_cache_len(), 1);

    // Arguments that don't fit the lookup signature are a method error
    let err = d
        .invoke(&p, &sig(vec![TypeExpr::Real]), &[Value::Str("x".into())])
        .unwrap_err();
    assert!(matches!(err, DispatchError::NoMethodMatches { .. }));
}

#[test]
fn test_no_method_matches_error() {
    let d = Dispatcher::new();
    let f = d.function("f");
    d.define(
        &f,
        MethodDef::new(sig(vec![TypeExpr::Int64]), returns(Value::I64(1))),
    );

    let err = d
        .apply(CallSite(601), &f, &[Value::Str("nope".into())])
        .unwrap_err();
    assert!(matches!(err, DispatchError::NoMethodMatches { .. }));
    assert!(err.to_string().contains("no method matching f(::String)"));
}

#[test]
fn test_fast_path_matches_slow_path() {
    let d = Dispatcher::new();
    let f = d.function("f");
    d.define(
        &f,
        MethodDef::new(sig(vec![TypeExpr::Int64]), returns(Value::I64(10))),
    );
    d.define(
        &f,
        MethodDef::new(sig(vec![TypeExpr::Float64]), returns(Value::I64(20))),
    );

    let site = CallSite(0xbeef);
    // First call goes slow, repeats hit the inline cache; results and
    // errors must be identical either way.
    for _ in 0..4 {
        assert_eq!(
            d.apply(site, &f, &[Value::I64(1)]).unwrap(),
            Value::I64(10)
        );
        assert_eq!(
            d.apply(site, &f, &[Value::F64(1.0)]).unwrap(),
            Value::I64(20)
        );
        assert!(d.apply(site, &f, &[Value::Nothing]).is_err());
    }
}

#[test]
fn test_same_site_different_functions() {
    // A callsite value reused across two functions must never cross-wire
    // their caches.
    let d = Dispatcher::new();
    let f = d.function("f");
    let g = d.function("g");
    d.define(
        &f,
        MethodDef::new(sig(vec![TypeExpr::Int64]), returns(Value::I64(1))),
    );
    d.define(
        &g,
        MethodDef::new(sig(vec![TypeExpr::Int64]), returns(Value::I64(2))),
    );

    let site = CallSite(777);
    for _ in 0..3 {
        assert_eq!(d.apply(site, &f, &[Value::I64(0)]).unwrap(), Value::I64(1));
        assert_eq!(d.apply(site, &g, &[Value::I64(0)]).unwrap(), Value::I64(2));
    }
}

#[test]
fn test_ground_instance_dispatches_to_defining_method() {
    let d = Dispatcher::new();
    let f = d.function("f");
    let m_int = d.define(
        &f,
        MethodDef::new(
            sig(vec![TypeExpr::Int64, TypeExpr::String]),
            returns(Value::I64(1)),
        ),
    );
    let m_num = d.define(
        &f,
        MethodDef::new(
            sig(vec![TypeExpr::Number, TypeExpr::String]),
            returns(Value::I64(2)),
        ),
    );

    let spec = f
        .mtable()
        .lookup_by_args(&d, &[Value::I64(1), Value::Str("s".into())])
        .unwrap();
    assert!(spec
        .method()
        .is_some_and(|m| std::sync::Arc::ptr_eq(&m, &m_int)));

    let spec = f
        .mtable()
        .lookup_by_args(&d, &[Value::F64(1.0), Value::Str("s".into())])
        .unwrap();
    assert!(spec
        .method()
        .is_some_and(|m| std::sync::Arc::ptr_eq(&m, &m_num)));

    // Reflection agrees without building anything
    assert!(f
        .mtable()
        .which(&[TypeExpr::Int64, TypeExpr::String])
        .is_some_and(|m| std::sync::Arc::ptr_eq(&m, &m_int)));
    assert!(f.mtable().which(&[TypeExpr::Nothing]).is_none());
}

#[test]
fn test_global_dispatcher_is_shared() {
    let a = Dispatcher::global() as *const Dispatcher;
    let b = Dispatcher::global() as *const Dispatcher;
    assert_eq!(a, b);
}

#[test]
fn test_defs_roundtrip_by_exact_type() {
    let d = Dispatcher::new();
    let f = d.function("f");
    let s = sig(vec![TypeExpr::Int64, TypeExpr::vararg(TypeExpr::Real)]);
    d.define(&f, MethodDef::new(s.clone(), returns(Value::Nothing)));

    assert!(f.mtable().exists(&s));
    assert!(!f.mtable().exists(&sig(vec![TypeExpr::Int64])));
}

#[test]
fn test_tvar_binding_reaches_body() {
    // f(x::T, y::T) where T<:Number returns the bound T's name
    let d = Dispatcher::new();
    let f = d.function("f");
    let tv = generic_dispatch_types::TypeVar::new("T", TypeExpr::Number);
    let s = generic_dispatch::Signature::with_tvars(
        vec![TypeExpr::Var(tv.clone()), TypeExpr::Var(tv.clone())],
        vec![tv],
    );
    d.define(
        &f,
        MethodDef::new(
            s,
            std::sync::Arc::new(|_args, sparams| {
                let bound = sparams
                    .lookup("T")
                    .map(|t| t.to_string())
                    .unwrap_or_default();
                Ok(Value::Str(bound))
            }),
        ),
    );

    let r = d
        .apply(CallSite(801), &f, &[Value::I64(1), Value::I64(2)])
        .unwrap();
    assert_eq!(r, Value::Str("Int64".into()));

    // Mixed concrete types do not unify with the diagonal variable
    let err = d
        .apply(CallSite(802), &f, &[Value::I64(1), Value::F64(2.0)])
        .unwrap_err();
    assert!(matches!(err, DispatchError::NoMethodMatches { .. }));
}

#[test]
fn test_function_argument_widening_shares_cache_entry() {
    let d = Dispatcher::new();
    let ap = d.function("ap");
    // ap(f, x::Int64) never calls f, so the cache slot widens to Function
    d.define(
        &ap,
        MethodDef::new(
            sig(vec![TypeExpr::Any, TypeExpr::Int64]),
            returns(Value::I64(1)),
        ),
    );
    let g = d.function("g");
    let h = d.function("h");

    let r = d
        .apply(CallSite(901), &ap, &[Value::Function(g), Value::I64(5)])
        .unwrap();
    assert_eq!(r, Value::I64(1));
    assert_eq!(ap.mtable().cache_len(), 1);

    // A different function value rides the same widened entry
    let r = d
        .apply(CallSite(902), &ap, &[Value::Function(h), Value::I64(5)])
        .unwrap();
    assert_eq!(r, Value::I64(1));
    assert_eq!(ap.mtable().cache_len(), 1);
}

#[test]
fn test_called_mask_disables_function_widening() {
    let d = Dispatcher::new();
    let ap = d.function("ap");
    // Position 0 is invoked as a callable inside the body, so each function
    // argument gets its own leaf entry.
    d.define(
        &ap,
        MethodDef::new(
            sig(vec![TypeExpr::Any, TypeExpr::Int64]),
            returns(Value::I64(1)),
        )
        .called_mask(0b1),
    );
    let g = d.function("g");
    let h = d.function("h");

    d.apply(CallSite(911), &ap, &[Value::Function(g), Value::I64(5)])
        .unwrap();
    d.apply(CallSite(912), &ap, &[Value::Function(h), Value::I64(5)])
        .unwrap();
    assert_eq!(ap.mtable().cache_len(), 2);
}

#[test]
fn test_type_argument_widens_under_guard() {
    let d = Dispatcher::new();
    let u = d.function("u");
    d.define(
        &u,
        MethodDef::new(sig(vec![TypeExpr::Any]), returns(Value::Str("any".into()))),
    );
    d.define(
        &u,
        MethodDef::new(
            sig(vec![TypeExpr::wrap_as_type_of(TypeExpr::Int64)]),
            returns(Value::Str("int".into())),
        ),
    );

    // Type{Float64} widens to Type{<:Any} inside the Any method, guarded by
    // the Type{Int64} definition
    let r = d
        .apply(CallSite(921), &u, &[Value::Type(TypeExpr::Float64)])
        .unwrap();
    assert_eq!(r, Value::Str("any".into()));

    // The guard forces Type{Int64} past the widened entry to the specific
    // definition
    let r = d
        .apply(CallSite(922), &u, &[Value::Type(TypeExpr::Int64)])
        .unwrap();
    assert_eq!(r, Value::Str("int".into()));

    // And other type arguments still reuse the widened entry
    let r = d
        .apply(CallSite(923), &u, &[Value::Type(TypeExpr::String)])
        .unwrap();
    assert_eq!(r, Value::Str("any".into()));
}

#[test]
fn test_body_error_propagates() {
    let d = Dispatcher::new();
    let f = d.function("f");
    d.define(
        &f,
        MethodDef::new(
            sig(vec![TypeExpr::Int64]),
            std::sync::Arc::new(|_, _| {
                Err(DispatchError::UserRaise("boom".into()))
            }),
        ),
    );
    let err = d.apply(CallSite(931), &f, &[Value::I64(1)]).unwrap_err();
    assert!(matches!(err, DispatchError::UserRaise(msg) if msg == "boom"));
}

#[test]
fn test_kwsorter_sibling_is_reachable() {
    let d = Dispatcher::new();
    let f = d.function("f");
    assert!(f.mtable().kwsorter().is_none());
    let kw = d.function("#f#kw");
    f.mtable().set_kwsorter(std::sync::Arc::clone(&kw));
    assert!(f
        .mtable()
        .kwsorter()
        .is_some_and(|s| std::sync::Arc::ptr_eq(&s, &kw)));
}

#[test]
fn test_concurrent_dispatch_is_safe() {
    use std::sync::Arc;

    let d = Arc::new(Dispatcher::new());
    let f = d.function("f");
    d.define(
        &f,
        MethodDef::new(sig(vec![TypeExpr::Int64]), returns(Value::I64(1))),
    );
    d.define(
        &f,
        MethodDef::new(sig(vec![TypeExpr::Float64]), returns(Value::I64(2))),
    );

    let mut handles = Vec::new();
    for t in 0..8u32 {
        let d = Arc::clone(&d);
        let f = Arc::clone(&f);
        handles.push(std::thread::spawn(move || {
            for i in 0..200u32 {
                let site = CallSite(t.wrapping_mul(31).wrapping_add(i % 7));
                if i % 2 == 0 {
                    assert_eq!(
                        d.apply(site, &f, &[Value::I64(1)]).unwrap(),
                        Value::I64(1)
                    );
                } else {
                    assert_eq!(
                        d.apply(site, &f, &[Value::F64(1.0)]).unwrap(),
                        Value::I64(2)
                    );
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
}
