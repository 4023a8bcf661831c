//! Generic-apply entry: the call-site inline cache and the `invoke`
//! pathway.
//!
//! The fast path is a handful of type comparisons against four candidate
//! slots of a process-wide open-addressed array; it takes no lock beyond
//! one uncontended slot read. Everything slower falls through to the
//! method table.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::dispatcher::{CallCacheSlot, Dispatcher, CALL_CACHE_SIZE};
use crate::error::DispatchError;
use crate::mtable::GenericFunction;
use crate::primitives::{sig_match, sig_subtype};
use crate::signature::Signature;
use crate::typemap::{AssocMode, TmPayload, TypeMapEntry};
use crate::value::{types_of, Value};

/// Stable per-call-site identifier; any value that distinguishes call sites
/// works (a return address, a lowering-assigned counter, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite(pub u32);

/// Four candidate cache indices derived from the callsite value.
pub(crate) fn probe_indices(callsite: u32) -> [usize; 4] {
    let mask = (CALL_CACHE_SIZE - 1) as u32;
    [
        (callsite & mask) as usize,
        ((callsite >> 8) & mask) as usize,
        ((callsite >> 16) & mask) as usize,
        (callsite.rotate_right(24) & mask) as usize,
    ]
}

/// Slot-by-slot comparison of argument types against a leaf signature.
fn sig_match_fast(args: &[Value], sig: &Signature) -> bool {
    args.iter()
        .zip(sig.params())
        .all(|(a, p)| &a.type_of() == p)
}

impl Dispatcher {
    /// Call a generic function with the given arguments.
    ///
    /// Observationally equivalent to going straight to the method table;
    /// the inline cache only short-circuits repeat calls from the same
    /// site.
    pub fn apply(
        &self,
        site: CallSite,
        f: &Arc<GenericFunction>,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        let nargs = args.len();
        let idxs = probe_indices(site.0);

        for idx in idxs {
            let hit = {
                let slot = self.call_cache[idx].read();
                slot.as_ref().and_then(|s| {
                    if Arc::ptr_eq(&s.func, f)
                        && s.entry.sig.nparams() == nargs
                        && sig_match_fast(args, &s.entry.sig)
                    {
                        s.entry.payload.as_spec().cloned()
                    } else {
                        None
                    }
                })
            };
            if let Some(spec) = hit {
                return spec.call(args);
            }
        }

        self.apply_slow(site, f, args)
    }

    /// The slow path: method-table cache probe (installing an eligible
    /// entry into the inline cache), then the full lookup.
    pub(crate) fn apply_slow(
        &self,
        site: CallSite,
        f: &Arc<GenericFunction>,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        let tt = types_of(args);
        let mt = f.mtable();

        if let Some(entry) = mt.probe_cache(&tt) {
            if entry.is_leafsig && entry.simplesig.is_none() && entry.guardsigs.is_empty() {
                self.install_call_cache(site, f, &entry);
            }
            if let Some(spec) = entry.payload.as_spec() {
                return spec.call(args);
            }
        }

        match mt.lookup_by_type(self, &tt, true, false)? {
            Some(spec) => {
                debug!(function = %f.name(), site = site.0, "full dispatch miss; specialized");
                spec.call(args)
            }
            None => Err(DispatchError::NoMethodMatches {
                name: f.name().to_string(),
                args: args.to_vec(),
            }),
        }
    }

    /// Force dispatch to the definition matching `lookup`, even when a more
    /// specific method exists for the argument types. The shared dispatch
    /// cache is untouched; the specialization lands in the chosen method's
    /// private invoke cache.
    pub fn invoke(
        &self,
        f: &Arc<GenericFunction>,
        lookup: &Signature,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        let tt = types_of(args);
        let mt = f.mtable();

        let found = {
            let defs = mt.defs_read();
            defs.assoc_by_type(lookup, AssocMode::Subtype)
        };
        let Some((entry, _env)) = found else {
            return Err(DispatchError::NoMethodMatches {
                name: f.name().to_string(),
                args: args.to_vec(),
            });
        };
        let Some(m) = entry.payload.as_method().cloned() else {
            return Err(DispatchError::Internal {
                what: format!("non-method definition entry in {}", f.name()),
            });
        };
        // The arguments must actually fit the requested lookup signature
        if !sig_subtype(&tt, lookup) {
            return Err(DispatchError::NoMethodMatches {
                name: f.name().to_string(),
                args: args.to_vec(),
            });
        }

        let spec = m.with_invokes(|map| {
            if let Some(e) = map.assoc_exact(&tt) {
                if let Some(s) = e.payload.as_spec() {
                    return Arc::clone(s);
                }
            }
            let env = sig_match(&tt, &m.sig).unwrap_or_default();
            let sig = Signature::new(tt.clone());
            let spec = m.specialization_for(sig.clone(), env);
            map.insert(TypeMapEntry::new(sig, TmPayload::Spec(Arc::clone(&spec))));
            spec
        });
        spec.call(args)
    }

    fn install_call_cache(
        &self,
        site: CallSite,
        f: &Arc<GenericFunction>,
        entry: &Arc<TypeMapEntry>,
    ) {
        let idxs = probe_indices(site.0);
        // 2-bit round-robin pick keyed off the first candidate index
        let k = (self.pick_which[idxs[0]].fetch_add(1, Ordering::Relaxed) & 3) as usize;
        *self.call_cache[idxs[k]].write() = Some(CallCacheSlot {
            func: Arc::clone(f),
            entry: Arc::clone(entry),
        });
    }

    /// Drop every inline-cache slot; called after definition-time
    /// invalidation so no stale entry outlives its method.
    pub(crate) fn flush_call_cache(&self) {
        for slot in &self.call_cache {
            *slot.write() = None;
        }
    }
}
