//! Cache-entry construction: widening, vararg truncation, guards.
//!
//! Given a method selected for a concrete argument-type tuple, decide how
//! coarse a signature the cache entry may carry. Widening trades precision
//! for cache hits; every loosening is paid for with guard signatures so more
//! specific definitions still win inside the widened region.

use std::sync::Arc;

use generic_dispatch_types::{instantiate, subtype, Env, TypeExpr, TypeVar};

use super::Specialization;
use crate::dispatcher::Dispatcher;
use crate::method::Method;
use crate::mtable::MethodTable;
use crate::primitives::sig_morespecific;
use crate::signature::Signature;
use crate::typemap::{TmPayload, TypeMapEntry};

/// Abandon widening once this many competing definitions would need guards.
const GUARD_LIMIT: usize = 32;

/// Build (and optionally record) a cache entry for `m` at the concrete
/// argument-type tuple `tt`.
pub(crate) fn cache_method(
    d: &Dispatcher,
    mt: &MethodTable,
    m: &Arc<Method>,
    tt: &[TypeExpr],
    env: &Env,
    record: bool,
) -> Arc<Specialization> {
    let (repaired, kind_swapped) = join_tsig(tt, &m.sig);
    let mut spec_sig = repaired.clone();
    let mut need_guards = kind_swapped;
    let mut function_widened = vec![false; spec_sig.len()];

    if !m.is_staged {
        for i in 0..spec_sig.len() {
            // A kind-repaired slot stays as-is but forces guard collection
            if repaired[i] != tt[i] {
                need_guards = true;
                continue;
            }
            let Some(decl) = m.sig.slot_at(i) else { continue };
            let arg = &repaired[i];

            if (m.nospecialize_mask >> i) & 1 == 1 {
                spec_sig[i] = TypeExpr::Any;
                continue;
            }
            if declared_callable_slot(decl)
                && subtype(arg, &TypeExpr::Function)
                && (m.called_mask >> i) & 1 == 0
            {
                spec_sig[i] = TypeExpr::Function;
                function_widened[i] = true;
                continue;
            }
            if let TypeExpr::TypeOf(inner) = arg {
                match inner.as_ref() {
                    TypeExpr::TupleOf(_) | TypeExpr::Tuple
                        if !matches!(
                            decl,
                            TypeExpr::TypeOf(_) | TypeExpr::TypeBound(_)
                        ) =>
                    {
                        spec_sig[i] = TypeExpr::type_bound(TypeExpr::Tuple);
                    }
                    // Nested Type{Type{...}}: cap the nesting with a bounded
                    // type inside the declared slot
                    TypeExpr::TypeOf(_) => {
                        let capped = generic_dispatch_types::intersect(
                            &TypeExpr::type_bound(TypeExpr::Any),
                            decl,
                        );
                        if !matches!(capped, TypeExpr::Bottom) {
                            spec_sig[i] = capped;
                        }
                    }
                    _ if very_general(decl) => {
                        spec_sig[i] = TypeExpr::type_bound(TypeExpr::Any);
                    }
                    _ => {}
                }
            }
        }

        // Unbounded trailing vararg: cap the cached arity so one entry
        // serves every longer call
        let max_args = mt.max_args();
        if m.sig.has_vararg() && spec_sig.len() > max_args {
            let keep = max_args + 1;
            let last_arg = spec_sig[spec_sig.len() - 1].clone();
            let elem = if spec_sig[keep..].iter().all(|t| subtype(t, &last_arg)) {
                last_arg
            } else {
                let decl_elem = m
                    .sig
                    .params()
                    .last()
                    .map(|t| t.vararg_elem().clone())
                    .unwrap_or(TypeExpr::Any);
                instantiate(&decl_elem, env)
            };
            spec_sig.truncate(keep);
            spec_sig.push(TypeExpr::vararg(elem));
            function_widened.truncate(keep);
            need_guards = true;
        }
    }

    let widened = spec_sig != tt || need_guards;
    let mut final_sig = Signature::new(spec_sig);
    let mut guardsigs = Vec::new();
    let mut simplesig = None;

    if widened {
        match collect_guards(mt, m, &final_sig) {
            Some(guards) => {
                guardsigs = guards;
                if function_widened.iter().any(|w| *w) {
                    simplesig = Some(simplify(&final_sig, &function_widened));
                }
            }
            // Too many competitors, or a competitor needs variable
            // matching: cache under the original concrete signature
            None => {
                final_sig = Signature::new(tt.to_vec());
            }
        }
    }

    let spec = m.specialization_for(final_sig.clone(), env.clone());

    if record {
        mt.cache_insert(TypeMapEntry::with_guards(
            final_sig,
            simplesig,
            guardsigs,
            TmPayload::Spec(Arc::clone(&spec)),
        ));
    }

    d.after_specialize(m, &spec);
    spec
}

/// Slot types that accept any callable without constraining it.
fn declared_callable_slot(decl: &TypeExpr) -> bool {
    match decl {
        TypeExpr::Any | TypeExpr::Function => true,
        TypeExpr::Union(members) => {
            members.len() == 2
                && members.contains(&TypeExpr::Function)
                && members.contains(&TypeExpr::DataType)
        }
        _ => false,
    }
}

/// "Very general" declared slots: `Any`, `Type`, or a free variable bounded
/// only by `Any`.
fn very_general(decl: &TypeExpr) -> bool {
    match decl {
        TypeExpr::Any | TypeExpr::Type => true,
        TypeExpr::Var(TypeVar { upper, .. }) => matches!(upper.as_ref(), TypeExpr::Any),
        _ => false,
    }
}

/// Competing definitions inside the widened region become guard signatures;
/// `None` means widening must be abandoned.
fn collect_guards(
    mt: &MethodTable,
    m: &Arc<Method>,
    widened: &Signature,
) -> Option<Vec<Signature>> {
    let mut guards = Vec::new();
    let mut ok = true;
    mt.defs_read().intersection_visit(widened, |entry, _isect, _env| {
        let Some(other) = entry.payload.as_method() else {
            return true;
        };
        if Arc::ptr_eq(other, m) {
            return true;
        }
        if !entry.sig.tvars().is_empty() {
            ok = false;
            return false;
        }
        if sig_morespecific(&entry.sig, widened) {
            guards.push(entry.sig.clone());
            if guards.len() > GUARD_LIMIT {
                ok = false;
                return false;
            }
        }
        true
    });
    ok.then_some(guards)
}

/// The coarser rejection filter published next to a Function-widened entry:
/// widened slots relax to `Any`.
fn simplify(sig: &Signature, function_widened: &[bool]) -> Signature {
    let params = sig
        .params()
        .iter()
        .enumerate()
        .map(|(i, p)| {
            if function_widened.get(i).copied().unwrap_or(false) {
                TypeExpr::Any
            } else {
                p.clone()
            }
        })
        .collect();
    Signature::new(params)
}

/// Signature repair after intersection: a slot that matched on the kind
/// rather than on `Type{X}` itself gets the kind as its cache key.
pub(crate) fn join_tsig(tt: &[TypeExpr], decl: &Signature) -> (Vec<TypeExpr>, bool) {
    let mut out = tt.to_vec();
    let mut changed = false;
    for (i, arg) in tt.iter().enumerate() {
        if !arg.is_type_of_type() {
            continue;
        }
        let Some(d) = decl.slot_at(i) else { continue };
        let kind = arg.kind();
        if subtype(&kind, d) && !subtype(&TypeExpr::Type, d) {
            out[i] = kind;
            changed = true;
        }
    }
    (out, changed)
}
