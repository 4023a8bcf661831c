//! Per-method specialization store.
//!
//! Each method owns the specializations built from it, keyed by concrete
//! signature. Lookups and inserts go through one lock so concurrent callers
//! for the same signature observe at most one build.

use std::sync::Arc;

use generic_dispatch_types::Env;

use super::Specialization;
use crate::method::Method;
use crate::primitives::sigs_equal;
use crate::signature::Signature;

impl Method {
    /// Return the specialization for `sig`, creating it if this is the
    /// first request.
    pub fn specialization_for(self: &Arc<Self>, sig: Signature, sparams: Env) -> Arc<Specialization> {
        let mut specs = self.specializations.lock();
        if let Some(existing) = specs.iter().find(|s| sigs_equal(s.sig(), &sig)) {
            return Arc::clone(existing);
        }
        let fresh = Specialization::new(sig, sparams, Arc::downgrade(self));
        specs.push(Arc::clone(&fresh));
        fresh
    }

    /// Lookup only; `None` when no specialization exists for `sig`.
    pub fn find_specialization(&self, sig: &Signature) -> Option<Arc<Specialization>> {
        self.specializations
            .lock()
            .iter()
            .find(|s| sigs_equal(s.sig(), sig))
            .cloned()
    }

    /// Snapshot of every specialization built from this method.
    pub fn specializations(&self) -> Vec<Arc<Specialization>> {
        self.specializations.lock().clone()
    }

    /// The shared unspecialized fallback.
    ///
    /// When the signature binds static parameters the fallback is a
    /// specialization over the template signature whose body receives the
    /// sparam values as data; for parameter-free methods it degenerates to
    /// the template itself. Both shapes are memoized as one template-backed
    /// specialization.
    pub fn unspecialized_fallback(self: &Arc<Self>) -> Arc<Specialization> {
        let mut slot = self.unspecialized.lock();
        if let Some(existing) = slot.as_ref() {
            return Arc::clone(existing);
        }
        let fb = Specialization::new(self.sig.clone(), Env::new(), Arc::downgrade(self));
        *slot = Some(Arc::clone(&fb));
        fb
    }
}
