//! Type expression representation.

use serde::{Deserialize, Serialize};

/// A bounded type variable, as introduced by a `where`-style clause.
///
/// Variables are identified by name within one signature; the dispatcher
/// never compares variables across signatures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeVar {
    pub name: String,
    /// Upper bound; `Any` when unconstrained.
    pub upper: Box<TypeExpr>,
}

impl TypeVar {
    pub fn new(name: impl Into<String>, upper: TypeExpr) -> Self {
        TypeVar {
            name: name.into(),
            upper: Box::new(upper),
        }
    }

    /// Unconstrained variable (`T where T`).
    pub fn unbounded(name: impl Into<String>) -> Self {
        TypeVar::new(name, TypeExpr::Any)
    }
}

/// Type expression used for method signatures and runtime argument types.
///
/// Concrete leaves are hash-consed by value: two equal `TypeExpr`s denote the
/// same type, so `==` is type-equality for variable-free expressions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeExpr {
    // Concrete leaves
    Bool,
    Int32,
    Int64,
    UInt64,
    Float32,
    Float64,
    String,
    Char,
    Symbol,
    Nothing,

    // Abstract numeric tower
    Any,
    Number,
    Real,
    Integer,
    Signed,
    Unsigned,
    AbstractFloat,
    AbstractString,

    /// Abstract supertype of all callable values.
    Function,
    /// Concrete singleton type of one generic function, keyed by name.
    FuncOf(String),

    /// Abstract supertype of all type objects.
    Type,
    /// The concrete kind of type objects (`typeof(Int64)`).
    DataType,
    /// `Type{X}`: the invariant singleton type of the type `X`.
    TypeOf(Box<TypeExpr>),
    /// `Type{<:B}`: any type object whose parameter is a subtype of `B`.
    TypeBound(Box<TypeExpr>),

    /// Abstract supertype of all tuples.
    Tuple,
    /// Covariant tuple type; the final element may be `Vararg`.
    TupleOf(Vec<TypeExpr>),

    /// User-defined struct with invariant parameters (empty when plain).
    Struct {
        name: String,
        params: Vec<TypeExpr>,
    },

    /// Untagged union of the member types.
    Union(Vec<TypeExpr>),

    /// Occurrence of a bound type variable.
    Var(TypeVar),

    /// Trailing repeat slot `Vararg{T}`; only valid as a final tuple element.
    Vararg(Box<TypeExpr>),

    /// The empty type.
    Bottom,
}

impl TypeExpr {
    /// `Type{X}` for a given `X`.
    pub fn wrap_as_type_of(inner: TypeExpr) -> TypeExpr {
        TypeExpr::TypeOf(Box::new(inner))
    }

    /// `Type{<:B}` for a given bound.
    pub fn type_bound(bound: TypeExpr) -> TypeExpr {
        TypeExpr::TypeBound(Box::new(bound))
    }

    /// `Vararg{T}`.
    pub fn vararg(elem: TypeExpr) -> TypeExpr {
        TypeExpr::Vararg(Box::new(elem))
    }

    pub fn struct_of(name: impl Into<String>, params: Vec<TypeExpr>) -> TypeExpr {
        TypeExpr::Struct {
            name: name.into(),
            params,
        }
    }

    /// Whether a value can have exactly this type (leaf of the lattice).
    ///
    /// `Type{X}` is concrete (it is the singleton type of the value `X`);
    /// `Type{<:B}` is not. A tuple is concrete when every element is and no
    /// element is a vararg slot.
    pub fn is_concrete(&self) -> bool {
        match self {
            TypeExpr::Bool
            | TypeExpr::Int32
            | TypeExpr::Int64
            | TypeExpr::UInt64
            | TypeExpr::Float32
            | TypeExpr::Float64
            | TypeExpr::String
            | TypeExpr::Char
            | TypeExpr::Symbol
            | TypeExpr::Nothing
            | TypeExpr::DataType
            | TypeExpr::FuncOf(_) => true,
            TypeExpr::TypeOf(inner) => !inner.has_free_vars(),
            TypeExpr::TupleOf(elems) => elems
                .iter()
                .all(|e| e.is_concrete() && !matches!(e, TypeExpr::Vararg(_))),
            TypeExpr::Struct { params, .. } => params.iter().all(|p| p.is_concrete()),
            _ => false,
        }
    }

    /// Whether this type carries parameters (its own or a variable).
    pub fn is_parametric(&self) -> bool {
        matches!(
            self,
            TypeExpr::TupleOf(_)
                | TypeExpr::TypeOf(_)
                | TypeExpr::TypeBound(_)
                | TypeExpr::Var(_)
        ) || matches!(self, TypeExpr::Struct { params, .. } if !params.is_empty())
    }

    pub fn is_vararg(&self) -> bool {
        matches!(self, TypeExpr::Vararg(_))
    }

    pub fn is_union(&self) -> bool {
        matches!(self, TypeExpr::Union(_))
    }

    /// `T = Type{X}` for some `X`.
    pub fn is_type_of_type(&self) -> bool {
        matches!(self, TypeExpr::TypeOf(_))
    }

    /// Whether this type is a kind, i.e. the type of a type object.
    pub fn is_kind(&self) -> bool {
        matches!(self, TypeExpr::DataType)
    }

    /// Element type of a vararg slot, or the type itself otherwise.
    pub fn vararg_elem(&self) -> &TypeExpr {
        match self {
            TypeExpr::Vararg(elem) => elem,
            other => other,
        }
    }

    /// Whether any type variable occurs anywhere in the expression.
    pub fn has_free_vars(&self) -> bool {
        match self {
            TypeExpr::Var(_) => true,
            TypeExpr::TypeOf(inner)
            | TypeExpr::TypeBound(inner)
            | TypeExpr::Vararg(inner) => inner.has_free_vars(),
            TypeExpr::TupleOf(elems) | TypeExpr::Union(elems) => {
                elems.iter().any(|e| e.has_free_vars())
            }
            TypeExpr::Struct { params, .. } => params.iter().any(|p| p.has_free_vars()),
            _ => false,
        }
    }

    /// The kind of this type object: `DataType` for every non-variable type.
    pub fn kind(&self) -> TypeExpr {
        TypeExpr::DataType
    }
}
