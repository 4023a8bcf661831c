//! Method and call signatures.

use generic_dispatch_types::{TypeExpr, TypeVar};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered tuple of parameter types, possibly ending in a vararg slot,
/// plus the type variables bound over it. Immutable once published.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    params: Vec<TypeExpr>,
    tvars: Vec<TypeVar>,
}

impl Signature {
    pub fn new(params: Vec<TypeExpr>) -> Self {
        Signature {
            params,
            tvars: Vec::new(),
        }
    }

    pub fn with_tvars(params: Vec<TypeExpr>, tvars: Vec<TypeVar>) -> Self {
        Signature { params, tvars }
    }

    pub fn params(&self) -> &[TypeExpr] {
        &self.params
    }

    pub fn tvars(&self) -> &[TypeVar] {
        &self.tvars
    }

    pub fn nparams(&self) -> usize {
        self.params.len()
    }

    pub fn has_vararg(&self) -> bool {
        self.params.last().is_some_and(|t| t.is_vararg())
    }

    /// Arity excluding a trailing vararg slot.
    pub fn non_vararg_arity(&self) -> usize {
        self.params.len() - usize::from(self.has_vararg())
    }

    /// Whether an argument list of length `n` can fill these slots.
    pub fn accepts_nargs(&self, n: usize) -> bool {
        if self.has_vararg() {
            n >= self.non_vararg_arity()
        } else {
            n == self.params.len()
        }
    }

    /// The declared type governing argument position `i`, expanding the
    /// trailing vararg slot over every remaining position.
    pub fn slot_at(&self, i: usize) -> Option<&TypeExpr> {
        if i < self.non_vararg_arity() {
            self.params.get(i)
        } else if self.has_vararg() {
            self.params.last().map(|t| t.vararg_elem())
        } else {
            None
        }
    }

    /// A signature is a leaf when every slot is a concrete type with no
    /// variable, union, vararg, or `Type{...}`; leaf signatures can be
    /// matched slot-by-slot against argument types with plain equality.
    /// A kind slot is excluded too: it admits every `Type{X}` argument,
    /// which equality cannot see.
    pub fn is_leafsig(&self) -> bool {
        self.tvars.is_empty()
            && self.params.iter().all(|p| {
                p.is_concrete()
                    && !p.is_union()
                    && !p.is_vararg()
                    && !p.is_type_of_type()
                    && !p.is_kind()
            })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "::{p}")?;
        }
        write!(f, ")")?;
        if !self.tvars.is_empty() {
            write!(f, " where {{")?;
            for (i, tv) in self.tvars.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}<:{}", tv.name, tv.upper)?;
            }
            write!(f, "}}")?;
        }
        Ok(())
    }
}
