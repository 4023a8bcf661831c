//! Method definitions.

use std::fmt;
use std::sync::{Arc, Weak};

use generic_dispatch_types::Env;
use parking_lot::Mutex;

use crate::error::DispatchError;
use crate::specialize::Specialization;
use crate::typemap::TypeMap;
use crate::signature::Signature;
use crate::value::Value;

/// An uncompiled method body: receives the flat argument array and the
/// static-parameter bindings inferred at dispatch time.
pub type BodyFn =
    Arc<dyn Fn(&[Value], &Env) -> Result<Value, DispatchError> + Send + Sync>;

/// Everything the frontend supplies when defining a method.
///
/// The per-argument masks are bit-per-position: `called_mask` records which
/// arguments the body invokes as callables, `nospecialize_mask` which
/// positions opt out of specialization.
pub struct MethodDef {
    pub sig: Signature,
    pub template: BodyFn,
    pub is_staged: bool,
    pub is_traced: bool,
    pub called_mask: u32,
    pub nospecialize_mask: u32,
    pub file: String,
    pub line: u32,
}

impl MethodDef {
    pub fn new(sig: Signature, template: BodyFn) -> Self {
        MethodDef {
            sig,
            template,
            is_staged: false,
            is_traced: false,
            called_mask: 0,
            nospecialize_mask: 0,
            file: String::from("none"),
            line: 0,
        }
    }

    pub fn staged(mut self) -> Self {
        self.is_staged = true;
        self
    }

    pub fn traced(mut self) -> Self {
        self.is_traced = true;
        self
    }

    pub fn called_mask(mut self, mask: u32) -> Self {
        self.called_mask = mask;
        self
    }

    pub fn nospecialize_mask(mut self, mask: u32) -> Self {
        self.nospecialize_mask = mask;
        self
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("sig", &self.sig)
            .field("is_staged", &self.is_staged)
            .finish_non_exhaustive()
    }
}

/// One user-supplied definition inside a generic function.
///
/// Identity is by pointer (`Arc::ptr_eq`); two methods with type-equal
/// signatures are still distinct definitions.
pub struct Method {
    pub sig: Signature,
    /// Name of the owning generic function.
    pub name: String,
    pub module: String,
    pub file: String,
    pub line: u32,
    pub template: BodyFn,
    pub is_staged: bool,
    pub is_traced: bool,
    pub called_mask: u32,
    pub nospecialize_mask: u32,
    /// Methods this one is pairwise-ambiguous with; non-owning.
    ambig: Mutex<Vec<Weak<Method>>>,
    /// Private cache for the explicit `invoke()` pathway.
    invokes: Mutex<TypeMap>,
    /// Per-method specialization store (at-most-one per signature).
    pub(crate) specializations: Mutex<Vec<Arc<Specialization>>>,
    /// Memoized shared unspecialized fallback.
    pub(crate) unspecialized: Mutex<Option<Arc<Specialization>>>,
}

impl Method {
    pub fn from_def(name: impl Into<String>, module: impl Into<String>, def: MethodDef) -> Arc<Method> {
        Arc::new(Method {
            sig: def.sig,
            name: name.into(),
            module: module.into(),
            file: def.file,
            line: def.line,
            template: def.template,
            is_staged: def.is_staged,
            is_traced: def.is_traced,
            called_mask: def.called_mask,
            nospecialize_mask: def.nospecialize_mask,
            ambig: Mutex::new(Vec::new()),
            invokes: Mutex::new(TypeMap::new(0)),
            specializations: Mutex::new(Vec::new()),
            unspecialized: Mutex::new(None),
        })
    }

    /// Live methods currently recorded as ambiguous with this one.
    pub fn ambiguities(&self) -> Vec<Arc<Method>> {
        self.ambig.lock().iter().filter_map(Weak::upgrade).collect()
    }

    pub fn has_ambiguities(&self) -> bool {
        !self.ambiguities().is_empty()
    }

    pub(crate) fn add_ambiguity(&self, other: &Arc<Method>) {
        let mut ambig = self.ambig.lock();
        if !ambig
            .iter()
            .any(|w| w.upgrade().is_some_and(|m| Arc::ptr_eq(&m, other)))
        {
            ambig.push(Arc::downgrade(other));
        }
    }

    /// Carry a displaced method's ambiguity relations over to this one, so
    /// that unrelated prior ambiguities survive an overwrite.
    pub(crate) fn inherit_ambiguities(self: &Arc<Self>, displaced: &Arc<Method>) {
        for other in displaced.ambiguities() {
            self.add_ambiguity(&other);
            other.add_ambiguity(self);
        }
    }

    pub(crate) fn with_invokes<R>(&self, f: impl FnOnce(&mut TypeMap) -> R) -> R {
        f(&mut self.invokes.lock())
    }

    /// Entry count of the private `invoke()` cache.
    pub fn invoke_cache_len(&self) -> usize {
        self.invokes.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn for_tests(sig: Signature) -> Arc<Method> {
        Method::from_def(
            "test",
            "Main",
            MethodDef::new(sig, Arc::new(|_, _| Ok(Value::Nothing))),
        )
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} in {}", self.name, self.sig, self.module)
    }
}
