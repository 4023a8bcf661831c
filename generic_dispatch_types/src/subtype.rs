//! Subtype checking over the type lattice.

use super::TypeExpr;

/// Check `a <: b`.
///
/// Type variables are compared through their upper bounds, which is the only
/// sound answer without an environment; use [`crate::match_pattern`] when
/// bindings must be produced.
///
/// # Examples
/// ```
/// use generic_dispatch_types::{subtype, TypeExpr};
///
/// assert!(subtype(&TypeExpr::Int64, &TypeExpr::Integer));
/// assert!(subtype(&TypeExpr::Int64, &TypeExpr::Number));
/// assert!(!subtype(&TypeExpr::Int64, &TypeExpr::Float64));
/// ```
pub fn subtype(a: &TypeExpr, b: &TypeExpr) -> bool {
    if a == b {
        return true;
    }
    // Bottom is a subtype of everything
    if matches!(a, TypeExpr::Bottom) {
        return true;
    }
    // Union{T1, T2} <: U iff T1 <: U and T2 <: U
    if let TypeExpr::Union(members) = a {
        return members.iter().all(|t| subtype(t, b));
    }
    // T <: Union{T1, T2} iff T <: T1 or T <: T2
    if let TypeExpr::Union(members) = b {
        return members.iter().any(|t| subtype(a, t));
    }
    // A variable stands for some type below its bound
    if let TypeExpr::Var(v) = a {
        return subtype(&v.upper, b);
    }
    if let TypeExpr::Var(v) = b {
        return subtype(a, &v.upper);
    }
    match b {
        TypeExpr::Any => true,
        TypeExpr::Bottom => false,
        TypeExpr::Number => matches!(
            a,
            TypeExpr::Bool
                | TypeExpr::Int32
                | TypeExpr::Int64
                | TypeExpr::UInt64
                | TypeExpr::Float32
                | TypeExpr::Float64
                | TypeExpr::Real
                | TypeExpr::Integer
                | TypeExpr::Signed
                | TypeExpr::Unsigned
                | TypeExpr::AbstractFloat
        ),
        TypeExpr::Real => matches!(
            a,
            TypeExpr::Bool
                | TypeExpr::Int32
                | TypeExpr::Int64
                | TypeExpr::UInt64
                | TypeExpr::Float32
                | TypeExpr::Float64
                | TypeExpr::Integer
                | TypeExpr::Signed
                | TypeExpr::Unsigned
                | TypeExpr::AbstractFloat
        ),
        TypeExpr::Integer => matches!(
            a,
            TypeExpr::Bool
                | TypeExpr::Int32
                | TypeExpr::Int64
                | TypeExpr::UInt64
                | TypeExpr::Signed
                | TypeExpr::Unsigned
        ),
        TypeExpr::Signed => matches!(a, TypeExpr::Int32 | TypeExpr::Int64),
        TypeExpr::Unsigned => matches!(a, TypeExpr::UInt64),
        TypeExpr::AbstractFloat => matches!(a, TypeExpr::Float32 | TypeExpr::Float64),
        TypeExpr::AbstractString => matches!(a, TypeExpr::String),
        TypeExpr::Function => matches!(a, TypeExpr::FuncOf(_)),
        TypeExpr::Type => matches!(
            a,
            TypeExpr::DataType | TypeExpr::TypeOf(_) | TypeExpr::TypeBound(_)
        ),
        // Type{X} is an instance of the kind whenever X is a proper type
        TypeExpr::DataType => {
            matches!(a, TypeExpr::TypeOf(inner) if !inner.has_free_vars())
        }
        // Type{X} is invariant in X
        TypeExpr::TypeOf(inner) => match a {
            TypeExpr::TypeOf(ai) => {
                if let TypeExpr::Var(v) = inner.as_ref() {
                    subtype(ai, &v.upper)
                } else {
                    ai == inner
                }
            }
            _ => false,
        },
        TypeExpr::TypeBound(bound) => match a {
            TypeExpr::TypeOf(ai) => subtype(ai, bound),
            TypeExpr::TypeBound(ab) => subtype(ab, bound),
            TypeExpr::DataType => matches!(bound.as_ref(), TypeExpr::Any),
            _ => false,
        },
        TypeExpr::Tuple => matches!(a, TypeExpr::TupleOf(_)),
        TypeExpr::TupleOf(belems) => match a {
            TypeExpr::TupleOf(aelems) => tuple_subtype(aelems, belems),
            _ => false,
        },
        TypeExpr::Struct {
            name: bname,
            params: bparams,
        } => match a {
            TypeExpr::Struct {
                name: aname,
                params: aparams,
            } => {
                if aname != bname {
                    return false;
                }
                // Foo{Int64} <: Foo (unparameterized supertype)
                if bparams.is_empty() && !aparams.is_empty() {
                    return true;
                }
                if aparams.len() != bparams.len() {
                    return false;
                }
                // Invariant parameters: equal, or below a variable's bound
                aparams.iter().zip(bparams).all(|(ap, bp)| {
                    if let TypeExpr::Var(v) = bp {
                        subtype(ap, &v.upper)
                    } else {
                        ap == bp
                    }
                })
            }
            _ => false,
        },
        TypeExpr::Vararg(belem) => match a {
            TypeExpr::Vararg(aelem) => subtype(aelem, belem),
            _ => false,
        },
        _ => false,
    }
}

/// Covariant tuple subtyping with trailing-vararg expansion.
///
/// `(Int64, Int64) <: (Int64, Vararg{Real})` holds: the vararg slot absorbs
/// every remaining element. A fixed tuple is never a subtype of a longer
/// fixed tuple.
pub fn tuple_subtype(a: &[TypeExpr], b: &[TypeExpr]) -> bool {
    let a_va = a.last().is_some_and(|t| t.is_vararg());
    let b_va = b.last().is_some_and(|t| t.is_vararg());
    let a_fixed = a.len() - usize::from(a_va);
    let b_fixed = b.len() - usize::from(b_va);

    if !b_va {
        if a_va || a.len() != b.len() {
            return false;
        }
        return a.iter().zip(b).all(|(x, y)| subtype(x, y));
    }

    if a_fixed < b_fixed {
        return false;
    }
    let b_elem = b[b.len() - 1].vararg_elem();
    for (i, x) in a.iter().enumerate() {
        let y = if i < b_fixed { &b[i] } else { b_elem };
        if !subtype(x.vararg_elem(), y) {
            return false;
        }
    }
    true
}

/// Strict specificity: `a` denotes a proper sub-lattice of `b`.
pub fn more_specific(a: &TypeExpr, b: &TypeExpr) -> bool {
    subtype(a, b) && !subtype(b, a)
}
