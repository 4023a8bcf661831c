//! Error types for method dispatch.

use generic_dispatch_types::TypeExpr;
use thiserror::Error;

use crate::signature::Signature;
use crate::value::Value;

/// Errors surfaced by the dispatch engine.
///
/// Recoverable internal conditions (inference failures, tracer panics) are
/// handled where they occur and never reach callers; only genuine dispatch
/// failures do.
#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    /// No definition covers the argument tuple.
    #[error("MethodError: no method matching {name}({})", fmt_arg_types(.args))]
    NoMethodMatches { name: String, args: Vec<Value> },

    /// Two or more definitions match with no strictly-more-specific winner.
    #[error(
        "MethodError: {name}({}) is ambiguous. Candidates:\n{}",
        fmt_types(.arg_types),
        fmt_candidates(.name, .candidates)
    )]
    AmbiguousCall {
        name: String,
        arg_types: Vec<TypeExpr>,
        candidates: Vec<Signature>,
    },

    /// The inference hook raised; carried internally and downgraded to an
    /// uncompiled specialization by the caller.
    #[error("inference failed for {name}: {reason}")]
    InferenceFailure { name: String, reason: String },

    /// A user-supplied method body raised.
    #[error("{0}")]
    UserRaise(String),

    /// An engine invariant was violated; callers cannot recover.
    #[error("internal dispatch error: {what}")]
    Internal { what: String },
}

fn fmt_types(types: &[TypeExpr]) -> String {
    let rendered: Vec<_> = types.iter().map(|t| format!("::{t}")).collect();
    rendered.join(", ")
}

fn fmt_arg_types(args: &[Value]) -> String {
    let rendered: Vec<_> = args.iter().map(|a| format!("::{}", a.type_of())).collect();
    rendered.join(", ")
}

fn fmt_candidates(name: &str, candidates: &[Signature]) -> String {
    let mut msg = String::new();
    for sig in candidates {
        msg.push_str(&format!("  {name}({})\n", fmt_types(sig.params())));
    }
    msg
}
