//! Associative container keyed by signature tuples.
//!
//! A `TypeMap` stores `(signature, payload)` entries ordered so that
//! more-specific signatures precede less-specific ones, and answers three
//! kinds of queries (see `search`): exact-argument lookup, lookup by
//! signature type, and intersection traversal.
//!
//! Past a small size the map grows a two-level index discriminating on the
//! type of the argument at offset `offs`: one table keyed by concrete slot
//! types, one keyed by the parameter of `Type{X}` slots. Entries whose
//! discriminating slot is neither fall into a linear tail. The ordered entry
//! list is kept alongside the index so that intersection traversal and
//! specificity-ordered scans stay exact.

mod search;

use std::sync::Arc;

use generic_dispatch_types::TypeExpr;
use rustc_hash::FxHashMap;

use crate::method::Method;
use crate::primitives::{sig_morespecific, sigs_equal};
use crate::signature::Signature;
use crate::specialize::Specialization;

/// Entry payload: definition lists hold methods, dispatch caches hold
/// specializations.
#[derive(Debug, Clone)]
pub enum TmPayload {
    Method(Arc<Method>),
    Spec(Arc<Specialization>),
}

impl TmPayload {
    pub fn as_method(&self) -> Option<&Arc<Method>> {
        match self {
            TmPayload::Method(m) => Some(m),
            TmPayload::Spec(_) => None,
        }
    }

    pub fn as_spec(&self) -> Option<&Arc<Specialization>> {
        match self {
            TmPayload::Spec(s) => Some(s),
            TmPayload::Method(_) => None,
        }
    }
}

/// One published `(signature, payload)` pair. Immutable after insertion;
/// invalidation unlinks the entry but never mutates it, so racing readers
/// always observe a fully-initialized entry.
#[derive(Debug)]
pub struct TypeMapEntry {
    pub sig: Signature,
    /// Coarser signature used only to reject candidates quickly.
    pub simplesig: Option<Signature>,
    /// Signatures that must NOT match; a hit on one skips this entry.
    pub guardsigs: Vec<Signature>,
    pub is_leafsig: bool,
    pub payload: TmPayload,
}

impl TypeMapEntry {
    pub fn new(sig: Signature, payload: TmPayload) -> Self {
        let is_leafsig = sig.is_leafsig();
        TypeMapEntry {
            sig,
            simplesig: None,
            guardsigs: Vec::new(),
            is_leafsig,
            payload,
        }
    }

    pub fn with_guards(
        sig: Signature,
        simplesig: Option<Signature>,
        guardsigs: Vec<Signature>,
        payload: TmPayload,
    ) -> Self {
        let is_leafsig = sig.is_leafsig();
        TypeMapEntry {
            sig,
            simplesig,
            guardsigs,
            is_leafsig,
            payload,
        }
    }
}

/// Number of entries above which the two-level index is maintained.
const LEVEL_THRESHOLD: usize = 8;

#[derive(Debug, Default)]
struct LevelIndex {
    /// Keyed by the concrete type in the discriminating slot.
    by_conc: FxHashMap<TypeExpr, Vec<Arc<TypeMapEntry>>>,
    /// Keyed by `X` for entries whose discriminating slot is `Type{X}`.
    by_targ: FxHashMap<TypeExpr, Vec<Arc<TypeMapEntry>>>,
    /// Entries not amenable to either split.
    tail: Vec<Arc<TypeMapEntry>>,
}

/// Ordered signature-keyed map; see the module docs.
#[derive(Debug)]
pub struct TypeMap {
    offs: usize,
    entries: Vec<Arc<TypeMapEntry>>,
    index: Option<LevelIndex>,
}

impl TypeMap {
    pub fn new(offs: usize) -> Self {
        TypeMap {
            offs,
            entries: Vec::new(),
            index: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn offs(&self) -> usize {
        self.offs
    }

    /// Ordered (most-specific-first) snapshot of the entries.
    pub fn entries(&self) -> &[Arc<TypeMapEntry>] {
        &self.entries
    }

    /// Insert an entry, keeping more-specific signatures first.
    ///
    /// A type-equal signature replaces the existing entry; the displaced
    /// entry is returned so the caller can run its "overwritten" handling.
    pub fn insert(&mut self, entry: TypeMapEntry) -> Option<Arc<TypeMapEntry>> {
        let entry = Arc::new(entry);
        if let Some(pos) = self
            .entries
            .iter()
            .position(|e| sigs_equal(&e.sig, &entry.sig))
        {
            let old = std::mem::replace(&mut self.entries[pos], entry);
            self.rebuild_index();
            return Some(old);
        }
        let pos = self
            .entries
            .iter()
            .position(|e| sig_morespecific(&entry.sig, &e.sig))
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, entry);
        self.rebuild_index();
        None
    }

    /// Unlink every entry the predicate selects; returns how many went away.
    pub fn remove_if(&mut self, mut pred: impl FnMut(&TypeMapEntry) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !pred(e));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.rebuild_index();
        }
        removed
    }

    /// How an entry participates in the two-level split, judged by its
    /// discriminating slot. A slot goes into the concrete table only when
    /// equality of the argument's type implies the match: the kind and
    /// unparameterized structs admit proper concrete subtypes and must stay
    /// in the tail.
    fn split_key(&self, entry: &TypeMapEntry) -> SplitKey {
        match entry.sig.params().get(self.offs) {
            Some(TypeExpr::TypeOf(inner)) if !inner.has_free_vars() => {
                SplitKey::TypeArg(inner.as_ref().clone())
            }
            Some(TypeExpr::DataType) => SplitKey::Tail,
            Some(TypeExpr::Struct { params, .. }) if params.is_empty() => SplitKey::Tail,
            Some(slot) if slot.is_concrete() => SplitKey::Concrete(slot.clone()),
            _ => SplitKey::Tail,
        }
    }

    /// The index is rebuilt from the ordered list on every mutation, which
    /// preserves relative specificity order inside each bucket.
    fn rebuild_index(&mut self) {
        if self.entries.len() <= LEVEL_THRESHOLD {
            self.index = None;
            return;
        }
        let mut index = LevelIndex::default();
        for entry in &self.entries {
            match self.split_key(entry) {
                SplitKey::Concrete(key) => {
                    index.by_conc.entry(key).or_default().push(Arc::clone(entry));
                }
                SplitKey::TypeArg(key) => {
                    index.by_targ.entry(key).or_default().push(Arc::clone(entry));
                }
                SplitKey::Tail => index.tail.push(Arc::clone(entry)),
            }
        }
        self.index = Some(index);
    }

    /// Candidate entries for an argument whose discriminating slot has the
    /// given concrete type, cheapest source first.
    pub(crate) fn candidates_for(&self, disc: Option<&TypeExpr>) -> Vec<&Arc<TypeMapEntry>> {
        match (&self.index, disc) {
            (Some(index), Some(ty)) => {
                let mut out: Vec<&Arc<TypeMapEntry>> = Vec::new();
                if let Some(bucket) = index.by_conc.get(ty) {
                    out.extend(bucket.iter());
                }
                if let TypeExpr::TypeOf(inner) = ty {
                    if let Some(bucket) = index.by_targ.get(inner.as_ref()) {
                        out.extend(bucket.iter());
                    }
                }
                out.extend(index.tail.iter());
                out
            }
            _ => self.entries.iter().collect(),
        }
    }
}

enum SplitKey {
    Concrete(TypeExpr),
    TypeArg(TypeExpr),
    Tail,
}

pub use search::AssocMode;
