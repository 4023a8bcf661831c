//! Shared helpers for the dispatch test suites.

#![allow(dead_code)]

use std::sync::Arc;

use generic_dispatch::{BodyFn, Signature, Value};
use generic_dispatch_types::TypeExpr;

/// A method body that ignores its arguments and returns a constant.
pub fn returns(v: Value) -> BodyFn {
    Arc::new(move |_, _| Ok(v.clone()))
}

/// A method body that reports how many arguments it received.
pub fn arg_count() -> BodyFn {
    Arc::new(|args, _| Ok(Value::I64(args.len() as i64)))
}

pub fn sig(params: Vec<TypeExpr>) -> Signature {
    Signature::new(params)
}
