//! Type intersection and pattern matching with variable binding.

use super::subtype::subtype;
use super::TypeExpr;

/// Ordered variable bindings produced while matching a parametric signature.
///
/// Kept as a flat sequence of `(name, binding)` pairs; lookups scan linearly,
/// which is fine for the handful of variables a signature carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Env {
    bindings: Vec<(String, TypeExpr)>,
}

impl Env {
    pub fn new() -> Self {
        Env::default()
    }

    pub fn lookup(&self, name: &str) -> Option<&TypeExpr> {
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    pub fn bind(&mut self, name: impl Into<String>, ty: TypeExpr) {
        self.bindings.push((name.into(), ty));
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeExpr)> {
        self.bindings.iter().map(|(n, t)| (n.as_str(), t))
    }
}

/// Compute the intersection of two types; `Bottom` when disjoint.
///
/// Variables intersect through their upper bounds. The result is exact for
/// the fixed lattice and conservative (never empty when the true meet is
/// non-empty) for parametric combinations.
pub fn intersect(a: &TypeExpr, b: &TypeExpr) -> TypeExpr {
    if a == b {
        return a.clone();
    }
    match (a, b) {
        (TypeExpr::Bottom, _) | (_, TypeExpr::Bottom) => TypeExpr::Bottom,
        (TypeExpr::Any, other) | (other, TypeExpr::Any) => other.clone(),
        (TypeExpr::Union(members), other) | (other, TypeExpr::Union(members)) => {
            let mut hits: Vec<TypeExpr> = Vec::new();
            for m in members {
                match intersect(m, other) {
                    TypeExpr::Bottom => {}
                    t => {
                        if !hits.contains(&t) {
                            hits.push(t);
                        }
                    }
                }
            }
            match hits.len() {
                0 => TypeExpr::Bottom,
                1 => hits.pop().unwrap_or(TypeExpr::Bottom),
                _ => TypeExpr::Union(hits),
            }
        }
        (TypeExpr::Var(v), other) | (other, TypeExpr::Var(v)) => intersect(&v.upper, other),
        (TypeExpr::TupleOf(ae), TypeExpr::TupleOf(be)) => tuple_intersect(ae, be),
        (TypeExpr::TypeOf(x), TypeExpr::TypeBound(bound))
        | (TypeExpr::TypeBound(bound), TypeExpr::TypeOf(x)) => {
            if subtype(x, bound) {
                TypeExpr::TypeOf(x.clone())
            } else {
                TypeExpr::Bottom
            }
        }
        (TypeExpr::TypeBound(ab), TypeExpr::TypeBound(bb)) => {
            match intersect(ab, bb) {
                TypeExpr::Bottom => TypeExpr::Bottom,
                t => TypeExpr::TypeBound(Box::new(t)),
            }
        }
        (TypeExpr::Vararg(ae), TypeExpr::Vararg(be)) => match intersect(ae, be) {
            TypeExpr::Bottom => TypeExpr::Bottom,
            t => TypeExpr::Vararg(Box::new(t)),
        },
        _ => {
            if subtype(a, b) {
                a.clone()
            } else if subtype(b, a) {
                b.clone()
            } else {
                TypeExpr::Bottom
            }
        }
    }
}

/// Elementwise tuple intersection with trailing-vararg expansion.
///
/// Two fixed tuples of different lengths are disjoint; a vararg slot expands
/// to cover the other side's remaining elements.
pub fn tuple_intersect(a: &[TypeExpr], b: &[TypeExpr]) -> TypeExpr {
    let a_va = a.last().is_some_and(|t| t.is_vararg());
    let b_va = b.last().is_some_and(|t| t.is_vararg());
    let a_fixed = a.len() - usize::from(a_va);
    let b_fixed = b.len() - usize::from(b_va);

    // Arity check: a fixed tuple must be reachable by the other side
    if !a_va && (b_fixed > a_fixed || (!b_va && b_fixed != a_fixed)) {
        return TypeExpr::Bottom;
    }
    if !b_va && a_fixed > b_fixed {
        return TypeExpr::Bottom;
    }

    let longest = a.len().max(b.len());
    let mut elems = Vec::with_capacity(longest);
    for i in 0..longest {
        let x = elem_at(a, a_fixed, a_va, i);
        let y = elem_at(b, b_fixed, b_va, i);
        let (x, y) = match (x, y) {
            (Some(x), Some(y)) => (x, y),
            // One side ran out; the other must be inside its own vararg tail
            _ => break,
        };
        let both_va = x.is_vararg() && y.is_vararg();
        let meet = intersect(x.vararg_elem(), y.vararg_elem());
        if matches!(meet, TypeExpr::Bottom) {
            // An empty vararg tail is still satisfiable by zero elements
            if i >= a_fixed.min(b_fixed) && (a_va || b_va) && i >= a_fixed.max(b_fixed) {
                break;
            }
            return TypeExpr::Bottom;
        }
        if both_va {
            elems.push(TypeExpr::Vararg(Box::new(meet)));
            break;
        }
        elems.push(meet);
    }
    TypeExpr::TupleOf(elems)
}

fn elem_at<'a>(
    elems: &'a [TypeExpr],
    fixed: usize,
    has_va: bool,
    i: usize,
) -> Option<&'a TypeExpr> {
    if i < fixed {
        Some(&elems[i])
    } else if has_va {
        elems.last()
    } else {
        None
    }
}

/// Match `subject` (a variable-free type) against `pattern`, binding the
/// pattern's type variables into `env`.
///
/// A variable bound twice must receive equal bindings. Returns `false`
/// without guaranteeing `env` is untouched; callers that need rollback pass
/// a scratch clone.
pub fn match_pattern(subject: &TypeExpr, pattern: &TypeExpr, env: &mut Env) -> bool {
    match pattern {
        TypeExpr::Var(v) => {
            if !subtype(subject, &v.upper) {
                return false;
            }
            match env.lookup(&v.name) {
                Some(prev) => prev == subject,
                None => {
                    env.bind(v.name.clone(), subject.clone());
                    true
                }
            }
        }
        TypeExpr::TypeOf(inner) => match (inner.as_ref(), subject) {
            (TypeExpr::Var(_), TypeExpr::TypeOf(sx)) => match_pattern(sx, inner, env),
            (_, TypeExpr::TypeOf(sx)) => sx.as_ref() == inner.as_ref(),
            _ => false,
        },
        TypeExpr::TupleOf(pelems) => match subject {
            TypeExpr::TupleOf(selems) => {
                let p_va = pelems.last().is_some_and(|t| t.is_vararg());
                let p_fixed = pelems.len() - usize::from(p_va);
                if selems.len() < p_fixed || (!p_va && selems.len() != p_fixed) {
                    return false;
                }
                for (i, s) in selems.iter().enumerate() {
                    let p = if i < p_fixed {
                        &pelems[i]
                    } else {
                        pelems[pelems.len() - 1].vararg_elem()
                    };
                    if !match_pattern(s, p, env) {
                        return false;
                    }
                }
                true
            }
            _ => false,
        },
        TypeExpr::Struct {
            name: pname,
            params: pparams,
        } => match subject {
            TypeExpr::Struct {
                name: sname,
                params: sparams,
            } => {
                if sname != pname || sparams.len() != pparams.len() {
                    return sname == pname && pparams.is_empty();
                }
                sparams
                    .iter()
                    .zip(pparams)
                    .all(|(s, p)| match_pattern(s, p, env))
            }
            _ => false,
        },
        TypeExpr::Union(members) => {
            // First branch that matches wins; roll back failed attempts
            for m in members {
                let mut scratch = env.clone();
                if match_pattern(subject, m, &mut scratch) {
                    *env = scratch;
                    return true;
                }
            }
            false
        }
        TypeExpr::Vararg(elem) => match_pattern(subject.vararg_elem(), elem, env),
        _ => subtype(subject, pattern),
    }
}

/// Substitute bound variables in `ty` with their `env` bindings; unbound
/// variables are left in place.
pub fn instantiate(ty: &TypeExpr, env: &Env) -> TypeExpr {
    match ty {
        TypeExpr::Var(v) => env.lookup(&v.name).cloned().unwrap_or_else(|| ty.clone()),
        TypeExpr::TypeOf(inner) => TypeExpr::TypeOf(Box::new(instantiate(inner, env))),
        TypeExpr::TypeBound(inner) => TypeExpr::TypeBound(Box::new(instantiate(inner, env))),
        TypeExpr::Vararg(inner) => TypeExpr::Vararg(Box::new(instantiate(inner, env))),
        TypeExpr::TupleOf(elems) => {
            TypeExpr::TupleOf(elems.iter().map(|e| instantiate(e, env)).collect())
        }
        TypeExpr::Union(members) => {
            TypeExpr::Union(members.iter().map(|m| instantiate(m, env)).collect())
        }
        TypeExpr::Struct { name, params } => TypeExpr::Struct {
            name: name.clone(),
            params: params.iter().map(|p| instantiate(p, env)).collect(),
        },
        _ => ty.clone(),
    }
}
