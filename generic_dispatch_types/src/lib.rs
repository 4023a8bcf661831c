//! Parametric type lattice for the GenericDispatch engine.
//!
//! The dispatch core treats types as opaque values and consumes this crate
//! only through predicates (`is_concrete`, `subtype`, `intersect`, ...) and
//! the `Env` binding machinery. The lattice is a fixed numeric tower plus
//! user structs, tuples, unions, type variables and `Type{...}` meta-types:
//!
//! ```text
//! Any
//!  ├── Number
//!  │    ├── Real
//!  │    │    ├── Integer
//!  │    │    │    ├── Signed
//!  │    │    │    │    └── Int32, Int64 (concrete)
//!  │    │    │    ├── Unsigned
//!  │    │    │    │    └── UInt64 (concrete)
//!  │    │    │    └── Bool (concrete)
//!  │    │    └── AbstractFloat
//!  │    │         └── Float32, Float64 (concrete)
//!  ├── AbstractString
//!  │    └── String (concrete)
//!  ├── Function
//!  │    └── FuncOf(name) (concrete singleton per generic function)
//!  ├── Type
//!  │    ├── DataType (concrete kind)
//!  │    ├── TypeOf(X)      -- Type{X}, invariant singleton
//!  │    └── TypeBound(B)   -- Type{<:B}
//!  ├── Tuple
//!  │    └── TupleOf(...) (covariant, possibly Vararg-terminated)
//!  └── Symbol, Char, Nothing (concrete)
//! ```
//!
//! # Sub-modules
//!
//! - `expr`: the `TypeExpr` enum, `TypeVar`, and structural predicates
//! - `subtype`: subtype checking over the lattice
//! - `intersect`: intersection, pattern matching with variable binding, `Env`
//! - `display`: `fmt::Display` rendering

mod display;
mod expr;
mod intersect;
mod subtype;

#[cfg(test)]
mod tests;

pub use expr::{TypeExpr, TypeVar};
pub use intersect::{instantiate, intersect, match_pattern, tuple_intersect, Env};
pub use subtype::{more_specific, subtype, tuple_subtype};
