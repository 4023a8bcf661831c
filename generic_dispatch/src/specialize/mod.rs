//! Specializations: a method concretized at one signature.

mod builder;
mod cache;

pub(crate) use builder::cache_method;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use generic_dispatch_types::Env;
use parking_lot::{Mutex, RwLock};

use crate::error::DispatchError;
use crate::method::{BodyFn, Method};
use crate::signature::Signature;
use crate::value::Value;

/// Generated code attached to a specialization.
///
/// The engine never inspects the payload; the code generator collaborator
/// produces it and dispatch just calls through it.
#[derive(Clone)]
pub struct CodeInstance {
    pub entry: BodyFn,
}

impl fmt::Debug for CodeInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CodeInstance")
    }
}

/// The per-call artifact: a method bound to a concrete signature and the
/// static parameters inferred for it.
pub struct Specialization {
    sig: Signature,
    sparams: Env,
    /// Back-reference to the defining method; non-owning.
    method: Weak<Method>,
    code: RwLock<Option<CodeInstance>>,
    inferred: AtomicBool,
    in_inference: AtomicBool,
    /// Shared unspecialized fallback, filled lazily.
    fallback: Mutex<Option<Arc<Specialization>>>,
}

impl Specialization {
    pub(crate) fn new(sig: Signature, sparams: Env, method: Weak<Method>) -> Arc<Self> {
        Arc::new(Specialization {
            sig,
            sparams,
            method,
            code: RwLock::new(None),
            inferred: AtomicBool::new(false),
            in_inference: AtomicBool::new(false),
            fallback: Mutex::new(None),
        })
    }

    pub fn sig(&self) -> &Signature {
        &self.sig
    }

    pub fn sparams(&self) -> &Env {
        &self.sparams
    }

    pub fn method(&self) -> Option<Arc<Method>> {
        self.method.upgrade()
    }

    pub fn has_code(&self) -> bool {
        self.code.read().is_some()
    }

    pub fn set_code(&self, ci: CodeInstance) {
        *self.code.write() = Some(ci);
    }

    pub fn is_inferred(&self) -> bool {
        self.inferred.load(Ordering::Acquire)
    }

    pub fn mark_inferred(&self) {
        self.inferred.store(true, Ordering::Release);
    }

    pub fn in_inference(&self) -> bool {
        self.in_inference.load(Ordering::Acquire)
    }

    /// Claim the inference slot; returns false when another thread is
    /// already inferring this specialization.
    pub(crate) fn begin_inference(&self) -> bool {
        self.in_inference
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_inference(&self) {
        self.in_inference.store(false, Ordering::Release);
    }

    /// The shared unspecialized fallback for this specialization's method.
    pub fn fallback(&self) -> Option<Arc<Specialization>> {
        if let Some(fb) = self.fallback.lock().clone() {
            return Some(fb);
        }
        let method = self.method.upgrade()?;
        let fb = method.unspecialized_fallback();
        *self.fallback.lock() = Some(Arc::clone(&fb));
        Some(fb)
    }

    /// Execute this specialization: generated code when present, the
    /// method's template otherwise.
    pub fn call(&self, args: &[Value]) -> Result<Value, DispatchError> {
        let code = self.code.read().clone();
        if let Some(ci) = code {
            return (ci.entry)(args, &self.sparams);
        }
        let method = self.method.upgrade().ok_or_else(|| DispatchError::Internal {
            what: format!("specialization for dropped method {}", self.sig),
        })?;
        (method.template)(args, &self.sparams)
    }
}

impl fmt::Debug for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .method
            .upgrade()
            .map(|m| m.name.clone())
            .unwrap_or_else(|| String::from("<gone>"));
        write!(f, "Specialization({name}{})", self.sig)
    }
}

#[cfg(test)]
mod tests {
    use generic_dispatch_types::TypeExpr;

    use crate::method::Method;
    use crate::signature::Signature;

    #[test]
    fn test_specialization_store_is_keyed_by_signature() {
        let m = Method::for_tests(Signature::new(vec![TypeExpr::Real]));
        let s1 = m.specialization_for(
            Signature::new(vec![TypeExpr::Int64]),
            generic_dispatch_types::Env::new(),
        );
        let s2 = m.specialization_for(
            Signature::new(vec![TypeExpr::Int64]),
            generic_dispatch_types::Env::new(),
        );
        assert!(std::sync::Arc::ptr_eq(&s1, &s2));
        assert_eq!(m.specializations().len(), 1);
    }

    #[test]
    fn test_fallback_is_shared_and_template_shaped() {
        let m = Method::for_tests(Signature::new(vec![TypeExpr::Real]));
        let spec = m.specialization_for(
            Signature::new(vec![TypeExpr::Int64]),
            generic_dispatch_types::Env::new(),
        );
        let fb1 = spec.fallback().unwrap();
        let fb2 = spec.fallback().unwrap();
        assert!(std::sync::Arc::ptr_eq(&fb1, &fb2));
        assert_eq!(fb1.sig().params(), m.sig.params());
    }
}
