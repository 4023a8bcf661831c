//! Per-function method tables.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use generic_dispatch_types::TypeExpr;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use tracing::debug;

use crate::ambiguity;
use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::method::{Method, MethodDef};
use crate::primitives::{sig_intersection, sigs_equal};
use crate::signature::Signature;
use crate::specialize::{self, Specialization};
use crate::typemap::{AssocMode, TmPayload, TypeMap, TypeMapEntry};
use crate::value::{types_of, Value};

/// A generic function: a name bound to a method table.
pub struct GenericFunction {
    name: String,
    mtable: MethodTable,
}

impl GenericFunction {
    pub(crate) fn new(name: impl Into<String>, module: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Arc::new(GenericFunction {
            mtable: MethodTable::new(name.clone(), module),
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mtable(&self) -> &MethodTable {
        &self.mtable
    }
}

impl fmt::Debug for GenericFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (generic function with {} methods)",
            self.name,
            self.mtable.defs_len()
        )
    }
}

/// Ordered method definitions plus the dispatch cache built over them.
pub struct MethodTable {
    name: String,
    module: String,
    defs: RwLock<TypeMap>,
    cache: RwLock<TypeMap>,
    max_args: AtomicUsize,
    kwsorter: Mutex<Option<Arc<GenericFunction>>>,
    invalidations: AtomicU64,
}

impl MethodTable {
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        MethodTable {
            name: name.into(),
            module: module.into(),
            defs: RwLock::new(TypeMap::new(0)),
            cache: RwLock::new(TypeMap::new(0)),
            max_args: AtomicUsize::new(0),
            kwsorter: Mutex::new(None),
            invalidations: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Insert a new definition and run the ambiguity/shadowing analysis.
    ///
    /// Serialized by the dispatcher's codegen lock; a displaced type-equal
    /// definition has its cached specializations unlinked.
    pub fn insert_method(&self, d: &Dispatcher, def: MethodDef) -> Arc<Method> {
        let _cg = d.codegen_guard();
        let m = Method::from_def(self.name.clone(), self.module.clone(), def);
        let displaced = {
            let mut defs = self.defs.write();
            defs.insert(TypeMapEntry::new(
                m.sig.clone(),
                TmPayload::Method(Arc::clone(&m)),
            ))
        };
        let displaced = displaced.and_then(|e| e.payload.as_method().cloned());
        let report = ambiguity::analyze_insertion(self, &m, displaced);
        if report.invalidated > 0 {
            debug!(
                function = %self.name,
                invalidated = report.invalidated,
                "shadowed cache entries unlinked"
            );
            d.flush_call_cache();
        }
        d.after_define(&m);
        m
    }

    /// Dispatch for a flat argument array: exact cache probe first, then the
    /// full lookup (which records the built specialization).
    pub fn lookup_by_args(
        &self,
        d: &Dispatcher,
        args: &[Value],
    ) -> Result<Arc<Specialization>, DispatchError> {
        let tt = types_of(args);
        if let Some(entry) = self.probe_cache(&tt) {
            if let Some(spec) = entry.payload.as_spec() {
                return Ok(Arc::clone(spec));
            }
        }
        match self.lookup_by_type(d, &tt, true, false)? {
            Some(spec) => Ok(spec),
            None => Err(DispatchError::NoMethodMatches {
                name: self.name.clone(),
                args: args.to_vec(),
            }),
        }
    }

    /// Find (or build) the specialization dispatched for an argument-type
    /// tuple.
    ///
    /// `use_cache` records a freshly-built specialization in the dispatch
    /// cache. `inexact` admits abstract queries that are subtype-correct
    /// without being exact; an inexact hit whose method is ambiguous for
    /// the query is rejected (`Ok(None)`), while an exact hit with a
    /// runtime-reachable ambiguity is a user-visible error.
    pub fn lookup_by_type(
        &self,
        d: &Dispatcher,
        tt: &[TypeExpr],
        use_cache: bool,
        inexact: bool,
    ) -> Result<Option<Arc<Specialization>>, DispatchError> {
        let query = Signature::new(tt.to_vec());

        if let Some((entry, _env)) = self.cache.read().assoc_by_type(&query, AssocMode::Subtype)
        {
            if let Some(spec) = entry.payload.as_spec() {
                return Ok(Some(Arc::clone(spec)));
            }
        }

        let found = self.defs.read().assoc_by_type(&query, AssocMode::Subtype);
        let Some((entry, env)) = found else {
            return Ok(None);
        };
        let Some(m) = entry.payload.as_method().cloned() else {
            return Ok(None);
        };

        if !inexact
            && !tt.iter().all(|t| t.is_concrete())
            && !sigs_equal(&query, &m.sig)
        {
            return Ok(None);
        }

        let reachable: Vec<_> = m
            .ambiguities()
            .into_iter()
            .filter(|other| sig_intersection(&query, &other.sig).is_some())
            .collect();
        if !reachable.is_empty() {
            if inexact {
                return Ok(None);
            }
            let mut candidates = vec![m.sig.clone()];
            candidates.extend(reachable.iter().map(|o| o.sig.clone()));
            return Err(DispatchError::AmbiguousCall {
                name: self.name.clone(),
                arg_types: tt.to_vec(),
                candidates,
            });
        }

        // Building (and recording) a specialization is serialized with
        // definition insertion and invalidation.
        let _cg = d.codegen_guard();
        Ok(Some(specialize::cache_method(d, self, &m, tt, &env, use_cache)))
    }

    /// The definition a given argument-type tuple dispatches to, without
    /// building anything.
    pub fn which(&self, tt: &[TypeExpr]) -> Option<Arc<Method>> {
        let query = Signature::new(tt.to_vec());
        let (entry, _env) = self.defs.read().assoc_by_type(&query, AssocMode::Subtype)?;
        entry.payload.as_method().cloned()
    }

    /// Whether a definition with this exact signature exists.
    pub fn exists(&self, sig: &Signature) -> bool {
        self.defs
            .read()
            .assoc_by_type(sig, AssocMode::Exact)
            .is_some()
    }

    /// Ordered (most-specific-first) snapshot of the definitions.
    pub fn methods(&self) -> Vec<Arc<Method>> {
        self.defs
            .read()
            .entries()
            .iter()
            .filter_map(|e| e.payload.as_method().cloned())
            .collect()
    }

    pub fn defs_len(&self) -> usize {
        self.defs.read().len()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.read().len()
    }

    /// Highest non-vararg arity across the definitions; vararg cache
    /// entries are truncated past it.
    pub fn max_args(&self) -> usize {
        self.max_args.load(Ordering::Acquire)
    }

    /// Pin the truncation arity explicitly (normally maintained by
    /// insertion).
    pub fn set_max_args(&self, n: usize) {
        self.max_args.store(n, Ordering::Release);
    }

    /// Total cache entries unlinked by shadowing or overwrites.
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    pub fn kwsorter(&self) -> Option<Arc<GenericFunction>> {
        self.kwsorter.lock().clone()
    }

    pub fn set_kwsorter(&self, f: Arc<GenericFunction>) {
        *self.kwsorter.lock() = Some(f);
    }

    pub(crate) fn defs_read(&self) -> RwLockReadGuard<'_, TypeMap> {
        self.defs.read()
    }

    pub(crate) fn probe_cache(&self, tt: &[TypeExpr]) -> Option<Arc<TypeMapEntry>> {
        self.cache.read().assoc_exact(tt)
    }

    pub(crate) fn cache_insert(&self, entry: TypeMapEntry) {
        self.cache.write().insert(entry);
    }

    pub(crate) fn cache_remove_if(
        &self,
        pred: impl FnMut(&TypeMapEntry) -> bool,
    ) -> usize {
        let removed = self.cache.write().remove_if(pred);
        self.invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub(crate) fn raise_max_args(&self, arity: usize) {
        self.max_args.fetch_max(arity, Ordering::AcqRel);
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodTable")
            .field("name", &self.name)
            .field("defs", &self.defs_len())
            .field("cache", &self.cache_len())
            .finish()
    }
}
