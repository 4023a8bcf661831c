//! TypeMap query modes: exact-argument, by-type, and intersection traversal.

use std::sync::Arc;

use generic_dispatch_types::{Env, TypeExpr};

use super::{TypeMap, TypeMapEntry};
use crate::primitives::{sig_intersection, sig_match, sig_subtype, sigs_equal};
use crate::signature::Signature;

/// How `assoc_by_type` compares the query against stored signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssocMode {
    /// Stored signature must type-equal the query.
    Exact,
    /// Query must fit the stored signature at equal arity, binding type
    /// variables.
    Unify,
    /// Stored signature may be any supertype of the query (vararg-aware).
    Subtype,
}

impl TypeMap {
    /// Find the first entry matching a flat argument-type tuple.
    ///
    /// Leaf entries match slot-by-slot with type equality (the hash-consed
    /// stand-in for pointer comparison); non-leaf cache entries match by
    /// subtype so widened signatures stay reachable. An entry whose
    /// `simplesig` rejects the tuple, or whose any guard accepts it, is
    /// skipped.
    pub fn assoc_exact(&self, argtypes: &[TypeExpr]) -> Option<Arc<TypeMapEntry>> {
        let disc = argtypes.get(self.offs());
        for entry in self.candidates_for(disc) {
            if entry_matches_args(entry, argtypes) {
                return Some(Arc::clone(entry));
            }
        }
        None
    }

    /// Find the first entry whose signature relates to `query` per `mode`,
    /// filling an `Env` for any type variables the match binds.
    pub fn assoc_by_type(
        &self,
        query: &Signature,
        mode: AssocMode,
    ) -> Option<(Arc<TypeMapEntry>, Env)> {
        for entry in self.entries() {
            match mode {
                AssocMode::Exact => {
                    if sigs_equal(&entry.sig, query) {
                        return Some((Arc::clone(entry), Env::new()));
                    }
                }
                AssocMode::Unify => {
                    if entry.sig.nparams() == query.nparams() {
                        if let Some(env) = sig_match(query.params(), &entry.sig) {
                            return Some((Arc::clone(entry), env));
                        }
                    }
                }
                AssocMode::Subtype => {
                    if !entry.sig.accepts_nargs(query.non_vararg_arity())
                        && !query.has_vararg()
                    {
                        continue;
                    }
                    if guard_rejects(entry, query.params()) {
                        continue;
                    }
                    if let Some(env) = sig_match(query.params(), &entry.sig) {
                        return Some((Arc::clone(entry), env));
                    }
                }
            }
        }
        None
    }

    /// Visit every entry whose signature intersects `query`, in specificity
    /// order, passing the intersection and the entry's variable bindings.
    /// The visitor returns `false` to stop early.
    pub fn intersection_visit(
        &self,
        query: &Signature,
        mut visit: impl FnMut(&Arc<TypeMapEntry>, &Signature, &Env) -> bool,
    ) {
        for entry in self.entries() {
            if let Some((isect, env)) = sig_intersection(query, &entry.sig) {
                if !visit(entry, &isect, &env) {
                    return;
                }
            }
        }
    }
}

/// Full match test for one cache entry against concrete argument types.
fn entry_matches_args(entry: &TypeMapEntry, argtypes: &[TypeExpr]) -> bool {
    if !entry.sig.accepts_nargs(argtypes.len()) {
        return false;
    }
    // simplesig is a pure rejection filter
    if let Some(ss) = &entry.simplesig {
        if !sig_subtype(argtypes, ss) {
            return false;
        }
    }
    let matched = if entry.is_leafsig {
        argtypes == entry.sig.params()
    } else {
        sig_subtype(argtypes, &entry.sig)
    };
    if !matched {
        return false;
    }
    !guard_rejects(entry, argtypes)
}

fn guard_rejects(entry: &TypeMapEntry, argtypes: &[TypeExpr]) -> bool {
    entry
        .guardsigs
        .iter()
        .any(|g| sig_subtype(argtypes, g))
}
