//! 类型规范化测试

use crate::frontend::core::type_system::{Type, TypeRegistry};
use crate::frontend::typecheck::checking::Normalizer;

#[test]
fn test_union_deduplicates() {
    let registry = TypeRegistry::with_std();
    let normalizer = Normalizer::new(&registry);
    let b = registry.builtins();
    let int = Type::Class(b.int);
    let string = Type::Class(b.string);

    let union = normalizer.union(vec![int.clone(), int.clone(), string.clone()]);
    assert_eq!(union, Type::Union(vec![int.clone(), string.clone()]));
    assert_eq!(registry.inspect(&union), "Int | String");

    // 输入顺序不影响结果
    let reversed = normalizer.union(vec![string, int.clone(), int]);
    assert_eq!(union, reversed);
}

#[test]
fn test_union_absorption() {
    let registry = TypeRegistry::with_std();
    let normalizer = Normalizer::new(&registry);
    let int = Type::Class(registry.builtins().int);

    assert_eq!(normalizer.union(vec![Type::int(5), int.clone()]), int);
    assert_eq!(normalizer.union(vec![Type::True, Type::False]), Type::Bool);
    assert_eq!(normalizer.union(vec![int.clone(), Type::Any]), Type::Any);
    assert_eq!(normalizer.union(vec![int.clone(), Type::not(int.clone())]), Type::Any);
    assert_eq!(normalizer.union(vec![int.clone(), Type::Never]), int);
    assert_eq!(normalizer.union(Vec::new()), Type::Never);
}

#[test]
fn test_union_with_nil_is_nilable() {
    let registry = TypeRegistry::with_std();
    let normalizer = Normalizer::new(&registry);
    let int = Type::Class(registry.builtins().int);

    assert_eq!(
        normalizer.union(vec![Type::Nil, int.clone()]),
        Type::nilable(int.clone())
    );
    assert_eq!(
        normalizer.normalize(&Type::nilable(int.clone())),
        Type::nilable(int)
    );
}

#[test]
fn test_difference() {
    let registry = TypeRegistry::with_std();
    let normalizer = Normalizer::new(&registry);
    let int = Type::Class(registry.builtins().int);
    let maybe_int = Type::nilable(int.clone());

    assert_eq!(normalizer.difference(&maybe_int, &int), Type::Nil);
    assert_eq!(normalizer.difference(&maybe_int, &Type::Nil), int);
    assert_eq!(normalizer.difference(&int, &int), Type::Never);
}

#[test]
fn test_intersection() {
    let registry = TypeRegistry::with_std();
    let normalizer = Normalizer::new(&registry);
    let b = registry.builtins();
    let int = Type::Class(b.int);
    let string = Type::Class(b.string);

    assert_eq!(
        normalizer.intersection(vec![int.clone(), string]),
        Type::Never
    );
    assert_eq!(
        normalizer.intersection(vec![Type::nilable(int.clone()), int.clone()]),
        int
    );
    assert_eq!(
        normalizer.intersection(vec![int.clone(), Type::int(5)]),
        Type::int(5)
    );
    assert_eq!(normalizer.intersection(vec![int.clone(), Type::Any]), int);
    assert_eq!(normalizer.intersection(Vec::new()), Type::Any);
}

#[test]
fn test_negation() {
    let registry = TypeRegistry::with_std();
    let normalizer = Normalizer::new(&registry);
    let b = registry.builtins();
    let int = Type::Class(b.int);
    let string = Type::Class(b.string);

    assert_eq!(normalizer.not(&Type::not(int.clone())), int);
    assert_eq!(normalizer.not(&Type::Any), Type::Never);
    assert_eq!(normalizer.not(&Type::Never), Type::Any);

    // 德摩根律
    let negated = normalizer.not(&Type::Union(vec![int.clone(), string.clone()]));
    let expected = normalizer.intersection(vec![Type::not(int), Type::not(string)]);
    assert_eq!(negated, expected);
    assert!(matches!(negated, Type::Intersection(ref members) if members.len() == 2));
}

#[test]
fn test_normalize_deep_reaches_generic_arguments() {
    let registry = TypeRegistry::with_std();
    let normalizer = Normalizer::new(&registry);
    let b = registry.builtins();
    let int = Type::Class(b.int);

    let messy = registry.generic(
        b.array_list,
        vec![Type::Union(vec![int.clone(), Type::int(1), int.clone()])],
    );
    let clean = registry.generic(b.array_list, vec![int]);
    assert_eq!(normalizer.normalize_deep(&messy), clean);
    // 只规范化顶层时泛型实参保持原样
    assert_eq!(normalizer.normalize(&messy), messy);
}

#[test]
fn test_negations_merge() {
    let registry = TypeRegistry::with_std();
    let normalizer = Normalizer::new(&registry);
    let b = registry.builtins();
    let int = Type::Class(b.int);
    let value = Type::Class(b.value);

    assert_eq!(
        normalizer.intersection(vec![Type::not(Type::True), Type::not(Type::False)]),
        normalizer.not(&Type::Bool)
    );
    assert_eq!(normalizer.not(&Type::Bool), Type::not(Type::Bool));

    // 德摩根律在包含 `Value` 的并集上同样成立
    let negated = normalizer.not(&Type::Union(vec![int.clone(), value.clone()]));
    assert_eq!(negated, Type::Never);
    assert_eq!(
        normalizer.intersection(vec![Type::not(int.clone()), Type::not(value.clone())]),
        negated
    );
    assert_eq!(normalizer.not(&value), Type::Never);
    assert_eq!(normalizer.intersection(vec![value, int.clone()]), int);
}

#[test]
fn test_union_with_covering_negation() {
    let registry = TypeRegistry::with_std();
    let normalizer = Normalizer::new(&registry);
    let int = Type::Class(registry.builtins().int);

    assert_eq!(
        normalizer.union(vec![Type::not(Type::int(1)), int.clone()]),
        Type::Any
    );
    assert_eq!(
        normalizer.union(vec![Type::Intersection(vec![int.clone(), Type::not(int.clone())]), Type::Nil]),
        Type::Nil
    );
}
