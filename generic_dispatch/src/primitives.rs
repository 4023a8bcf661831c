//! Signature-level adapters over the type-system primitives.
//!
//! Everything the dispatcher needs from the collaborating type system flows
//! through this module: tuple subtyping, intersection, specificity and
//! variable-binding matches, lifted from single types to whole signatures.

use generic_dispatch_types::{match_pattern, tuple_intersect, tuple_subtype, Env, TypeExpr};

use crate::signature::Signature;

/// Type-equality of two signatures (identity of the slot tuple; variables
/// compare by name).
pub fn sigs_equal(a: &Signature, b: &Signature) -> bool {
    a.params() == b.params()
}

/// Whether an argument-type tuple fits a signature, ignoring variables
/// beyond their bounds.
pub fn sig_subtype(tt: &[TypeExpr], sig: &Signature) -> bool {
    tuple_subtype(tt, sig.params())
}

/// `a` covers strictly fewer argument tuples than `b`.
pub fn sig_morespecific(a: &Signature, b: &Signature) -> bool {
    tuple_subtype(a.params(), b.params()) && !tuple_subtype(b.params(), a.params())
}

/// Match an argument-type tuple against a signature, producing bindings for
/// the signature's type variables. `None` when the tuple does not fit.
pub fn sig_match(tt: &[TypeExpr], sig: &Signature) -> Option<Env> {
    if sig.tvars().is_empty() {
        return tuple_subtype(tt, sig.params()).then(Env::new);
    }
    let subject = TypeExpr::TupleOf(tt.to_vec());
    let pattern = TypeExpr::TupleOf(sig.params().to_vec());
    let mut env = Env::new();
    match_pattern(&subject, &pattern, &mut env).then_some(env)
}

/// Intersection of two signatures; `None` when disjoint.
///
/// The returned `Env` binds `pattern`'s type variables as far as the
/// intersection determines them; it is empty when the intersection is too
/// coarse to pin them down.
pub fn sig_intersection(query: &Signature, pattern: &Signature) -> Option<(Signature, Env)> {
    match tuple_intersect(query.params(), pattern.params()) {
        TypeExpr::Bottom => None,
        TypeExpr::TupleOf(elems) => {
            let mut env = Env::new();
            if !pattern.tvars().is_empty() {
                let subject = TypeExpr::TupleOf(elems.clone());
                let pat = TypeExpr::TupleOf(pattern.params().to_vec());
                let mut scratch = Env::new();
                if match_pattern(&subject, &pat, &mut scratch) {
                    env = scratch;
                }
            }
            Some((Signature::new(elems), env))
        }
        other => {
            // tuple_intersect only returns tuples or Bottom
            debug_assert!(false, "non-tuple intersection {other}");
            None
        }
    }
}
