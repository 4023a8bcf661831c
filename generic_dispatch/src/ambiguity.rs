//! Definition-time ambiguity and shadowing analysis.
//!
//! Runs once per method insertion, while the codegen lock is held. Records
//! pairwise ambiguities on the methods involved and unlinks cached
//! specializations whose method lost (part of) its domain to the new
//! definition. Diagnostics are observational only; nothing here changes
//! which method a later call selects beyond the cache invalidation itself.

use std::sync::Arc;

use tracing::warn;

use crate::method::Method;
use crate::mtable::MethodTable;
use crate::primitives::{sig_intersection, sig_morespecific, sigs_equal};
use crate::typemap::AssocMode;

/// Outcome of one insertion's analysis.
#[derive(Debug, Default)]
pub(crate) struct InsertionReport {
    /// Cache entries unlinked because their method was shadowed or
    /// displaced.
    pub invalidated: usize,
}

pub(crate) fn analyze_insertion(
    mt: &MethodTable,
    new: &Arc<Method>,
    displaced: Option<Arc<Method>>,
) -> InsertionReport {
    let mut report = InsertionReport::default();

    // Overwrite: keep the displaced method's ambiguity relations alive on
    // the replacement so unrelated prior ambiguities are preserved.
    if let Some(old) = &displaced {
        warn!(
            method = %new.name,
            sig = %new.sig,
            "method definition overwritten"
        );
        new.inherit_ambiguities(old);
    }

    let mut shadowed: Vec<Arc<Method>> = Vec::new();
    {
        let defs = mt.defs_read();
        let entries = defs.entries();
        let new_idx = entries
            .iter()
            .position(|e| {
                e.payload
                    .as_method()
                    .is_some_and(|m| Arc::ptr_eq(m, new))
            })
            .unwrap_or(entries.len());

        for (idx, entry) in entries.iter().enumerate() {
            let Some(other) = entry.payload.as_method() else {
                continue;
            };
            if Arc::ptr_eq(other, new) {
                continue;
            }
            let Some((isect, _env)) = sig_intersection(&new.sig, &other.sig) else {
                continue;
            };

            // Everything ordered after the new method loses part of its
            // domain to it.
            if idx > new_idx {
                shadowed.push(Arc::clone(other));
            }

            // Pairwise ambiguity: earlier signature A, later signature B.
            let (a, b) = if idx < new_idx {
                (other, new)
            } else {
                (new, other)
            };
            // One of the two owns the whole overlap outright
            if sigs_equal(&isect, &a.sig) || sigs_equal(&isect, &b.sig) {
                continue;
            }
            if sig_morespecific(&a.sig, &b.sig) || sig_morespecific(&b.sig, &a.sig) {
                continue;
            }
            // A third definition covers the overlap only when the ordered
            // lookup of the intersection lands on it before either of the
            // pair; a less specific fallback never does.
            let covered = defs
                .assoc_by_type(&isect, AssocMode::Subtype)
                .is_some_and(|(e, _env)| {
                    e.payload.as_method().is_some_and(|m| {
                        !Arc::ptr_eq(m, a) && !Arc::ptr_eq(m, b)
                    })
                });
            if covered {
                continue;
            }

            new.add_ambiguity(other);
            other.add_ambiguity(new);
            warn!(
                function = %mt.name(),
                new_sig = %new.sig,
                prior_sig = %other.sig,
                "new method definition is ambiguous with an existing one"
            );
        }
    }

    // Unlink cached specializations that belong to a displaced method, or
    // to a shadowed method inside the overlap region.
    report.invalidated = mt.cache_remove_if(|entry| {
        let Some(spec) = entry.payload.as_spec() else {
            return false;
        };
        let Some(owner) = spec.method() else {
            // A specialization whose method is gone can never be right
            return true;
        };
        if let Some(old) = &displaced {
            if Arc::ptr_eq(&owner, old) {
                return true;
            }
        }
        shadowed.iter().any(|s| Arc::ptr_eq(s, &owner))
            && sig_intersection(&new.sig, &entry.sig).is_some()
    });

    let arity = new.sig.non_vararg_arity();
    mt.raise_max_args(arity);

    report
}
