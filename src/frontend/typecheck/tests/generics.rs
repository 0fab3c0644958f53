//! 泛型实参推断测试

use std::sync::Arc;

use crate::frontend::core::type_system::{
    Callable, Parameter, Type, TypeBindings, TypeParameter, TypeRegistry, Variance,
};
use crate::frontend::typecheck::errors::TypeError;
use crate::frontend::typecheck::inference::generics::{
    replace_type_parameters, widen_literals, TypeArgumentInferrer,
};
use crate::util::span::Span;

fn type_param(name: &str) -> Arc<TypeParameter> {
    Arc::new(TypeParameter::new(name, "Test.run", Variance::Invariant))
}

#[test]
fn test_generic_round_trip() {
    let registry = TypeRegistry::with_std();
    let b = registry.builtins();
    let v = type_param("V");
    let shape = registry.generic(b.array_list, vec![Type::TypeParameter(v.clone())]);
    let given = registry.generic(b.array_list, vec![Type::Class(b.int)]);

    let mut inferrer = TypeArgumentInferrer::new(&registry, &[v], Span::dummy());
    let inferred = inferrer.infer(&given, &shape);
    assert_eq!(inferred.as_ref(), Some(&given));

    let (bindings, errors) = inferrer.finish();
    assert!(errors.is_empty());
    assert_eq!(bindings.get("V"), Some(&Type::Class(b.int)));
    assert_eq!(
        replace_type_parameters(&registry, &shape, &bindings, None),
        given
    );
}

#[test]
fn test_literals_are_widened_when_binding() {
    let registry = TypeRegistry::with_std();
    let v = type_param("V");
    let mut inferrer = TypeArgumentInferrer::new(&registry, &[v.clone()], Span::dummy());

    let inferred = inferrer.infer(&Type::int(5), &Type::TypeParameter(v));
    assert_eq!(inferred, Some(Type::Class(registry.builtins().int)));
}

#[test]
fn test_first_binding_wins() {
    let registry = TypeRegistry::with_std();
    let b = registry.builtins();
    let v = type_param("V");
    let mut seed = TypeBindings::new();
    seed.insert("V".to_string(), Type::Class(b.string));

    let mut inferrer =
        TypeArgumentInferrer::new(&registry, &[v.clone()], Span::dummy()).with_bindings(seed);
    let inferred = inferrer.infer(&Type::Class(b.int), &Type::TypeParameter(v));
    assert_eq!(inferred, Some(Type::Class(b.string)));
}

#[test]
fn test_upper_bound_violation() {
    let registry = TypeRegistry::with_std();
    let b = registry.builtins();
    let bounded = Arc::new(
        TypeParameter::new("T", "Test.run", Variance::Invariant)
            .with_bounds(Type::Class(b.string), Type::Never),
    );
    let mut inferrer = TypeArgumentInferrer::new(&registry, &[bounded.clone()], Span::dummy());

    assert_eq!(
        inferrer.infer(&Type::Class(b.int), &Type::TypeParameter(bounded)),
        None
    );
    let (_, errors) = inferrer.finish();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        TypeError::BoundViolation { which: "upper", .. }
    ));
    assert_eq!(
        errors[0].to_string(),
        "type `Int` does not satisfy the upper bound `String` of type parameter `T`"
    );
}

#[test]
fn test_unbound_parameters_default_to_upper_bound() {
    let registry = TypeRegistry::with_std();
    let v = type_param("V");
    let inferrer = TypeArgumentInferrer::new(&registry, &[v], Span::dummy());
    let (bindings, errors) = inferrer.finish();
    assert!(errors.is_empty());
    assert_eq!(bindings.get("V"), Some(&Type::Any));
}

#[test]
fn test_nilable_shape() {
    let registry = TypeRegistry::with_std();
    let int = Type::Class(registry.builtins().int);
    let v = type_param("V");
    let mut inferrer = TypeArgumentInferrer::new(&registry, &[v.clone()], Span::dummy());

    let inferred = inferrer.infer(
        &Type::nilable(int.clone()),
        &Type::nilable(Type::TypeParameter(v)),
    );
    assert_eq!(inferred, Some(Type::nilable(int.clone())));
    assert_eq!(inferrer.bindings().get("V"), Some(&int));
}

#[test]
fn test_closure_return_is_inferred() {
    let registry = TypeRegistry::with_std();
    let b = registry.builtins();
    let v = type_param("V");
    let given = Type::callable(Callable::closure(
        vec![Parameter::new("a", Type::Class(b.int))],
        Type::Class(b.string),
        Type::Never,
    ));
    let shape = Type::callable(Callable::closure(
        vec![Parameter::new("a", Type::Class(b.int))],
        Type::TypeParameter(v.clone()),
        Type::Never,
    ));

    let mut inferrer = TypeArgumentInferrer::new(&registry, &[v], Span::dummy());
    assert!(inferrer.infer(&given, &shape).is_some());
    assert_eq!(inferrer.bindings().get("V"), Some(&Type::Class(b.string)));
}

#[test]
fn test_widen_literals() {
    let registry = TypeRegistry::with_std();
    let b = registry.builtins();

    assert_eq!(widen_literals(&registry, &Type::True), Type::Bool);
    assert_eq!(
        widen_literals(&registry, &Type::Union(vec![Type::int(1), Type::string("a")])),
        Type::Union(vec![Type::Class(b.int), Type::Class(b.string)])
    );
    assert_eq!(
        widen_literals(&registry, &Type::nilable(Type::int(1))),
        Type::nilable(Type::Class(b.int))
    );
}

#[test]
fn test_lower_bound_widens_candidate() {
    let registry = TypeRegistry::with_std();
    let b = registry.builtins();
    let bounded = Arc::new(
        TypeParameter::new("T", "Test.run", Variance::Invariant)
            .with_bounds(Type::Any, Type::Class(b.value)),
    );
    let mut inferrer = TypeArgumentInferrer::new(&registry, &[bounded.clone()], Span::dummy());

    // `Int` 在下界 `Value` 之下，取下界
    assert_eq!(
        inferrer.infer(&Type::int(3), &Type::TypeParameter(bounded)),
        Some(Type::Class(b.value))
    );
    let (bindings, errors) = inferrer.finish();
    assert!(errors.is_empty());
    assert_eq!(bindings.get("T"), Some(&Type::Class(b.value)));
}

#[test]
fn test_lower_bound_violation() {
    let registry = TypeRegistry::with_std();
    let b = registry.builtins();
    let bounded = Arc::new(
        TypeParameter::new("T", "Test.run", Variance::Invariant)
            .with_bounds(Type::Any, Type::Class(b.int)),
    );
    let mut inferrer = TypeArgumentInferrer::new(&registry, &[bounded.clone()], Span::dummy());

    assert_eq!(
        inferrer.infer(&Type::Class(b.string), &Type::TypeParameter(bounded)),
        None
    );
    let (_, errors) = inferrer.finish();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        TypeError::BoundViolation { which: "lower", .. }
    ));
    assert_eq!(
        errors[0].to_string(),
        "type `String` does not satisfy the lower bound `Int` of type parameter `T`"
    );
}
