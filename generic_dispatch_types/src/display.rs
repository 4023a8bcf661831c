//! Display rendering for type expressions.

use std::fmt;

use super::TypeExpr;

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Bool => write!(f, "Bool"),
            TypeExpr::Int32 => write!(f, "Int32"),
            TypeExpr::Int64 => write!(f, "Int64"),
            TypeExpr::UInt64 => write!(f, "UInt64"),
            TypeExpr::Float32 => write!(f, "Float32"),
            TypeExpr::Float64 => write!(f, "Float64"),
            TypeExpr::String => write!(f, "String"),
            TypeExpr::Char => write!(f, "Char"),
            TypeExpr::Symbol => write!(f, "Symbol"),
            TypeExpr::Nothing => write!(f, "Nothing"),
            TypeExpr::Any => write!(f, "Any"),
            TypeExpr::Number => write!(f, "Number"),
            TypeExpr::Real => write!(f, "Real"),
            TypeExpr::Integer => write!(f, "Integer"),
            TypeExpr::Signed => write!(f, "Signed"),
            TypeExpr::Unsigned => write!(f, "Unsigned"),
            TypeExpr::AbstractFloat => write!(f, "AbstractFloat"),
            TypeExpr::AbstractString => write!(f, "AbstractString"),
            TypeExpr::Function => write!(f, "Function"),
            TypeExpr::FuncOf(name) => write!(f, "typeof({name})"),
            TypeExpr::Type => write!(f, "Type"),
            TypeExpr::DataType => write!(f, "DataType"),
            TypeExpr::TypeOf(inner) => write!(f, "Type{{{inner}}}"),
            TypeExpr::TypeBound(bound) => write!(f, "Type{{<:{bound}}}"),
            TypeExpr::Tuple => write!(f, "Tuple"),
            TypeExpr::TupleOf(elems) => {
                write!(f, "Tuple{{")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "}}")
            }
            TypeExpr::Struct { name, params } => {
                write!(f, "{name}")?;
                if !params.is_empty() {
                    write!(f, "{{")?;
                    for (i, p) in params.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{p}")?;
                    }
                    write!(f, "}}")?;
                }
                Ok(())
            }
            TypeExpr::Union(members) => {
                write!(f, "Union{{")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{m}")?;
                }
                write!(f, "}}")
            }
            TypeExpr::Var(v) => write!(f, "{}", v.name),
            TypeExpr::Vararg(elem) => write!(f, "Vararg{{{elem}}}"),
            TypeExpr::Bottom => write!(f, "Union{{}}"),
        }
    }
}
