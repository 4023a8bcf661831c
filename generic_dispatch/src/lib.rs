// Prevent accidental debug output in library code; diagnostics go through
// `tracing`.
#![deny(clippy::print_stderr)]

//! Multiple-dispatch method tables and call engine.
//!
//! Given a generic function and a tuple of argument values, the engine
//! finds the most specific matching definition, builds (and caches) a
//! specialization bound to the inferred static parameters, records
//! dispatch ambiguities at definition time, and keeps repeat calls from
//! the same site down to a handful of type comparisons.
//!
//! ```
//! use std::sync::Arc;
//! use generic_dispatch::{CallSite, Dispatcher, MethodDef, Signature, Value};
//! use generic_dispatch_types::TypeExpr;
//!
//! let d = Dispatcher::new();
//! let f = d.function("f");
//! d.define(
//!     &f,
//!     MethodDef::new(
//!         Signature::new(vec![TypeExpr::Int64, TypeExpr::Int64]),
//!         Arc::new(|_, _| Ok(Value::I64(1))),
//!     ),
//! );
//! let r = d.apply(CallSite(1), &f, &[Value::I64(3), Value::I64(4)]).unwrap();
//! assert_eq!(r, Value::I64(1));
//! ```

mod ambiguity;
mod apply;
mod dispatcher;
mod error;
mod method;
mod mtable;
mod precompile;
mod primitives;
mod signature;
mod specialize;
mod typemap;
mod value;

pub use apply::CallSite;
pub use dispatcher::{
    is_in_pure_context, CodegenHook, CompileMode, Dispatcher, InferenceHook, MethodTracer,
    SpecTracer,
};
pub use error::DispatchError;
pub use method::{BodyFn, Method, MethodDef};
pub use mtable::{GenericFunction, MethodTable};
pub use signature::Signature;
pub use specialize::{CodeInstance, Specialization};
pub use typemap::{AssocMode, TmPayload, TypeMap, TypeMapEntry};
pub use value::{types_of, Value};
