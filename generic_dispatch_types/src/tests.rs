use super::*;

fn tuple(elems: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr::TupleOf(elems)
}

#[test]
fn test_subtype_integer_hierarchy() {
    // Int64 <: Signed <: Integer <: Real <: Number <: Any
    assert!(subtype(&TypeExpr::Int64, &TypeExpr::Int64));
    assert!(subtype(&TypeExpr::Int64, &TypeExpr::Signed));
    assert!(subtype(&TypeExpr::Int64, &TypeExpr::Integer));
    assert!(subtype(&TypeExpr::Int64, &TypeExpr::Real));
    assert!(subtype(&TypeExpr::Int64, &TypeExpr::Number));
    assert!(subtype(&TypeExpr::Int64, &TypeExpr::Any));
    assert!(!subtype(&TypeExpr::Int64, &TypeExpr::Float64));
    assert!(!subtype(&TypeExpr::Integer, &TypeExpr::Int64));
}

#[test]
fn test_subtype_float_hierarchy() {
    assert!(subtype(&TypeExpr::Float64, &TypeExpr::AbstractFloat));
    assert!(subtype(&TypeExpr::Float64, &TypeExpr::Real));
    assert!(!subtype(&TypeExpr::Float64, &TypeExpr::Integer));
}

#[test]
fn test_subtype_union() {
    let u = TypeExpr::Union(vec![TypeExpr::Int64, TypeExpr::String]);
    assert!(subtype(&TypeExpr::Int64, &u));
    assert!(subtype(&TypeExpr::String, &u));
    assert!(!subtype(&TypeExpr::Float64, &u));
    // Union on the left requires every member to fit
    assert!(subtype(&u, &TypeExpr::Any));
    assert!(!subtype(&u, &TypeExpr::Number));
}

#[test]
fn test_subtype_type_of_invariant() {
    let t_int = TypeExpr::wrap_as_type_of(TypeExpr::Int64);
    let t_integer = TypeExpr::wrap_as_type_of(TypeExpr::Integer);
    assert!(subtype(&t_int, &TypeExpr::Type));
    assert!(subtype(&t_int, &TypeExpr::DataType));
    // Type{Int64} is not Type{Integer} even though Int64 <: Integer
    assert!(!subtype(&t_int, &t_integer));
    // but it is Type{<:Integer}
    assert!(subtype(&t_int, &TypeExpr::type_bound(TypeExpr::Integer)));
    assert!(!subtype(
        &TypeExpr::wrap_as_type_of(TypeExpr::String),
        &TypeExpr::type_bound(TypeExpr::Integer)
    ));
}

#[test]
fn test_tuple_subtype_vararg() {
    let fixed = vec![TypeExpr::Int64, TypeExpr::Int64];
    let va_real = vec![TypeExpr::vararg(TypeExpr::Real)];
    let one_plus = vec![TypeExpr::Int64, TypeExpr::vararg(TypeExpr::Real)];
    assert!(tuple_subtype(&fixed, &va_real));
    assert!(tuple_subtype(&fixed, &one_plus));
    // vararg side is not a subtype of any fixed arity
    assert!(!tuple_subtype(&va_real, &fixed));
    // arity mismatch on fixed tuples
    assert!(!tuple_subtype(
        &fixed,
        &[TypeExpr::Int64, TypeExpr::Int64, TypeExpr::Int64]
    ));
}

#[test]
fn test_intersect_lattice() {
    assert_eq!(
        intersect(&TypeExpr::Int64, &TypeExpr::Integer),
        TypeExpr::Int64
    );
    assert_eq!(
        intersect(&TypeExpr::Integer, &TypeExpr::AbstractFloat),
        TypeExpr::Bottom
    );
    assert_eq!(intersect(&TypeExpr::Any, &TypeExpr::Real), TypeExpr::Real);
    assert_eq!(
        intersect(&TypeExpr::Int64, &TypeExpr::String),
        TypeExpr::Bottom
    );
}

#[test]
fn test_intersect_union_distributes() {
    let u = TypeExpr::Union(vec![TypeExpr::Int64, TypeExpr::Float64]);
    assert_eq!(intersect(&u, &TypeExpr::Integer), TypeExpr::Int64);
    assert_eq!(intersect(&u, &TypeExpr::Real), u);
}

#[test]
fn test_tuple_intersect_overlap() {
    // (Int64, Any) ∩ (Any, Int64) = (Int64, Int64)
    let a = vec![TypeExpr::Int64, TypeExpr::Any];
    let b = vec![TypeExpr::Any, TypeExpr::Int64];
    assert_eq!(
        tuple_intersect(&a, &b),
        tuple(vec![TypeExpr::Int64, TypeExpr::Int64])
    );
    // disjoint slots kill the whole tuple
    let c = vec![TypeExpr::String, TypeExpr::Any];
    assert_eq!(tuple_intersect(&a, &c), TypeExpr::Bottom);
}

#[test]
fn test_tuple_intersect_vararg_tail() {
    let va_any = vec![TypeExpr::vararg(TypeExpr::Any)];
    let concrete = vec![TypeExpr::Int64, TypeExpr::String];
    assert_eq!(
        tuple_intersect(&va_any, &concrete),
        tuple(vec![TypeExpr::Int64, TypeExpr::String])
    );
}

#[test]
fn test_match_pattern_binds_var() {
    let tv = TypeVar::new("T", TypeExpr::Real);
    let pattern = tuple(vec![
        TypeExpr::Var(tv.clone()),
        TypeExpr::Var(tv.clone()),
    ]);
    let subject = tuple(vec![TypeExpr::Int64, TypeExpr::Int64]);
    let mut env = Env::new();
    assert!(match_pattern(&subject, &pattern, &mut env));
    assert_eq!(env.lookup("T"), Some(&TypeExpr::Int64));

    // Inconsistent occurrence must not match
    let mixed = tuple(vec![TypeExpr::Int64, TypeExpr::Float64]);
    let mut env = Env::new();
    assert!(!match_pattern(&mixed, &pattern, &mut env));

    // Bound violation must not match
    let strings = tuple(vec![TypeExpr::String, TypeExpr::String]);
    let mut env = Env::new();
    assert!(!match_pattern(&strings, &pattern, &mut env));
}

#[test]
fn test_match_pattern_type_of_var() {
    // Type{T} captures the type argument itself
    let tv = TypeVar::unbounded("T");
    let pattern = TypeExpr::wrap_as_type_of(TypeExpr::Var(tv));
    let subject = TypeExpr::wrap_as_type_of(TypeExpr::Int64);
    let mut env = Env::new();
    assert!(match_pattern(&subject, &pattern, &mut env));
    assert_eq!(env.lookup("T"), Some(&TypeExpr::Int64));
}

#[test]
fn test_match_pattern_struct_params() {
    let tv = TypeVar::unbounded("T");
    let pattern = TypeExpr::struct_of("Box", vec![TypeExpr::Var(tv)]);
    let subject = TypeExpr::struct_of("Box", vec![TypeExpr::Float64]);
    let mut env = Env::new();
    assert!(match_pattern(&subject, &pattern, &mut env));
    assert_eq!(env.lookup("T"), Some(&TypeExpr::Float64));

    let other = TypeExpr::struct_of("Ref", vec![TypeExpr::Float64]);
    let mut env = Env::new();
    assert!(!match_pattern(&other, &pattern, &mut env));
}

#[test]
fn test_instantiate_substitutes() {
    let tv = TypeVar::unbounded("T");
    let mut env = Env::new();
    env.bind("T", TypeExpr::Int64);
    let ty = tuple(vec![
        TypeExpr::Var(tv.clone()),
        TypeExpr::vararg(TypeExpr::Var(tv)),
    ]);
    assert_eq!(
        instantiate(&ty, &env),
        tuple(vec![TypeExpr::Int64, TypeExpr::vararg(TypeExpr::Int64)])
    );
}

#[test]
fn test_more_specific_strict() {
    assert!(more_specific(&TypeExpr::Int64, &TypeExpr::Integer));
    assert!(!more_specific(&TypeExpr::Integer, &TypeExpr::Int64));
    assert!(!more_specific(&TypeExpr::Int64, &TypeExpr::Int64));
}

#[test]
fn test_is_concrete() {
    assert!(TypeExpr::Int64.is_concrete());
    assert!(TypeExpr::wrap_as_type_of(TypeExpr::Int64).is_concrete());
    assert!(!TypeExpr::Integer.is_concrete());
    assert!(!TypeExpr::type_bound(TypeExpr::Integer).is_concrete());
    assert!(tuple(vec![TypeExpr::Int64, TypeExpr::String]).is_concrete());
    assert!(!tuple(vec![TypeExpr::Int64, TypeExpr::vararg(TypeExpr::Int64)]).is_concrete());
}

#[test]
fn test_structural_predicates() {
    assert!(TypeExpr::wrap_as_type_of(TypeExpr::Int64).is_type_of_type());
    assert!(!TypeExpr::type_bound(TypeExpr::Int64).is_type_of_type());
    assert!(TypeExpr::DataType.is_kind());
    assert!(!TypeExpr::Type.is_kind());
    assert!(TypeExpr::vararg(TypeExpr::Any).is_vararg());
    assert!(TypeExpr::Union(vec![TypeExpr::Int64, TypeExpr::String]).is_union());
    assert!(TypeExpr::struct_of("Box", vec![TypeExpr::Int64]).is_parametric());
    assert!(!TypeExpr::struct_of("Unit", vec![]).is_parametric());
    assert_eq!(TypeExpr::Int64.kind(), TypeExpr::DataType);
}

#[test]
fn test_display_round_readable() {
    assert_eq!(TypeExpr::Int64.to_string(), "Int64");
    assert_eq!(
        TypeExpr::wrap_as_type_of(TypeExpr::Int64).to_string(),
        "Type{Int64}"
    );
    assert_eq!(
        TypeExpr::type_bound(TypeExpr::Tuple).to_string(),
        "Type{<:Tuple}"
    );
    assert_eq!(
        tuple(vec![TypeExpr::Int64, TypeExpr::vararg(TypeExpr::Real)]).to_string(),
        "Tuple{Int64, Vararg{Real}}"
    );
}
