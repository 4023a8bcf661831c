//! Ahead-of-time compilation surface.

use std::sync::Arc;

use generic_dispatch_types::{TypeExpr, TypeVar};
use tracing::{debug, warn};

use crate::dispatcher::Dispatcher;
use crate::mtable::GenericFunction;
use crate::signature::Signature;

/// Cap on the cartesian expansion of union slots per method.
const UNION_EXPANSION_LIMIT: usize = 64;

impl Dispatcher {
    /// Try to build and compile a specialization covering `sig`; returns
    /// whether one was produced. Idempotent: repeated calls reuse the
    /// cached specialization.
    pub fn compile_hint(&self, f: &Arc<GenericFunction>, sig: &Signature) -> bool {
        let _cg = self.codegen_guard();
        let spec = match f.mtable().lookup_by_type(self, sig.params(), true, true) {
            Ok(Some(spec)) => spec,
            Ok(None) => return false,
            Err(e) => {
                warn!(function = %f.name(), error = %e, "compile hint lookup failed");
                return false;
            }
        };
        if !spec.is_inferred() {
            if let Err(e) = self.run_inference(&spec, true) {
                warn!(spec = ?spec, error = %e, "inference failed; compiling without it");
            }
        }
        self.compile_spec(&spec)
    }

    /// Sweep inferred-but-uncompiled specializations through the code
    /// generator. With `all`, additionally enumerate a representative leaf
    /// signature per union branch of every definition and compile those.
    pub fn precompile(&self, all: bool) {
        let _cg = self.codegen_guard();
        for f in self.functions() {
            for m in f.mtable().methods() {
                for spec in m.specializations() {
                    if spec.is_inferred() && !spec.has_code() {
                        self.compile_spec(&spec);
                    }
                }
                if all {
                    for leaf in enumerate_leaf_sigs(&m.sig) {
                        self.compile_hint(&f, &leaf);
                    }
                }
            }
        }
    }
}

/// Cartesian product over union members (and typevar union bounds) of every
/// slot, keeping the signatures that come out fully concrete.
fn enumerate_leaf_sigs(sig: &Signature) -> Vec<Signature> {
    let mut partials: Vec<Vec<TypeExpr>> = vec![Vec::new()];
    for slot in sig.params() {
        let alts = slot_alternatives(slot);
        let mut next = Vec::with_capacity(partials.len() * alts.len());
        for partial in &partials {
            for alt in &alts {
                let mut s = partial.clone();
                s.push(alt.clone());
                next.push(s);
            }
        }
        if next.len() > UNION_EXPANSION_LIMIT {
            debug!(
                sig = %sig,
                kept = UNION_EXPANSION_LIMIT,
                total = next.len(),
                "union expansion capped; remaining branches not precompiled"
            );
            next.truncate(UNION_EXPANSION_LIMIT);
        }
        partials = next;
    }
    partials
        .into_iter()
        .map(Signature::new)
        .filter(|s| s.params().iter().all(TypeExpr::is_concrete))
        .collect()
}

fn slot_alternatives(t: &TypeExpr) -> Vec<TypeExpr> {
    match t {
        TypeExpr::Union(members) => members.iter().flat_map(slot_alternatives).collect(),
        TypeExpr::Var(TypeVar { upper, .. }) => match upper.as_ref() {
            TypeExpr::Union(members) => members.iter().flat_map(slot_alternatives).collect(),
            other => vec![other.clone()],
        },
        // A representative single-element instance stands in for the tail
        TypeExpr::Vararg(elem) => slot_alternatives(elem),
        other => vec![other.clone()],
    }
}
