//! 方法解析
//!
//! 根据接收者类型的变体查找方法：
//!
//! - 名义类型直接在祖先链上查找，泛型实例代入实参
//! - 并集要求每个成员都有该方法，交集要求至少一个成员有
//! - 可空类型把 `nil` 的方法表当作一个分支
//! - 类型参数在上界上查找，`self` 替换为类型参数本身
//!
//! 多个候选签名统一为其中最通用的那个，其余必须是它的兼容重写。

use std::sync::Arc;

use crate::frontend::core::type_system::{
    Callable, Substituter, Type, TypeBindings, TypeRegistry,
};
use crate::frontend::typecheck::checking::SubtypeChecker;

/// 解析到的方法
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMethod {
    /// 代入了接收者实参和 `self` 的签名
    pub callable: Arc<Callable>,
    /// 定义该方法的祖先
    pub owner: Type,
}

/// 方法查找结果
#[derive(Debug, Clone, PartialEq)]
pub enum MethodLookup {
    Found(ResolvedMethod),
    /// 接收者类型未知，不报告错误
    Untyped,
    /// 方法不存在（或各分支的签名无法统一）
    Missing,
    /// 接收者类型不能调用方法（`any`、`void`）
    InvalidReceiver,
}

/// 方法解析器
pub struct MethodResolver<'a> {
    registry: &'a TypeRegistry,
    checker: SubtypeChecker<'a>,
    self_type: Option<Type>,
}

impl<'a> MethodResolver<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self {
            registry,
            checker: SubtypeChecker::new(registry),
            self_type: None,
        }
    }

    /// 接收者中出现的 `self` 的含义
    pub fn with_self(
        mut self,
        self_type: Option<Type>,
    ) -> Self {
        self.self_type = self_type.clone();
        self.checker = SubtypeChecker::new(self.registry).with_self(self_type);
        self
    }

    /// 查找 `receiver` 上的方法 `name`
    pub fn resolve(
        &self,
        receiver: &Type,
        name: &str,
    ) -> MethodLookup {
        let lookup = self.resolve_raw(receiver, name);
        match lookup {
            MethodLookup::Found(found) => {
                let bindings = TypeBindings::new();
                let self_type = match receiver {
                    Type::SelfType => self.self_type.clone().unwrap_or(Type::SelfType),
                    other => other.clone(),
                };
                let callable = Substituter::new(&bindings)
                    .with_self(Some(&self_type))
                    .apply_callable(&found.callable);
                MethodLookup::Found(ResolvedMethod {
                    callable: Arc::new(callable),
                    owner: found.owner,
                })
            }
            other => other,
        }
    }

    fn resolve_raw(
        &self,
        receiver: &Type,
        name: &str,
    ) -> MethodLookup {
        match receiver {
            Type::Untyped | Type::Never => MethodLookup::Untyped,
            Type::Any | Type::Void => MethodLookup::InvalidReceiver,
            Type::SelfType => match &self.self_type {
                Some(self_type) => self.resolve_raw(&self_type.clone(), name),
                None => MethodLookup::Missing,
            },
            Type::Nil | Type::Bool | Type::True | Type::False | Type::Literal(_) => {
                match self.registry.backing_class(receiver) {
                    Some(class) => self.resolve_nominal(&class, name),
                    None => MethodLookup::Missing,
                }
            }
            Type::Callable(callable) => {
                if name == callable.name || (callable.closure && name == "call") {
                    MethodLookup::Found(ResolvedMethod {
                        callable: callable.clone(),
                        owner: Type::Class(self.registry.builtins().closure),
                    })
                } else {
                    self.resolve_nominal(&Type::Class(self.registry.builtins().closure), name)
                }
            }
            Type::Class(_)
            | Type::Mixin(_)
            | Type::Interface(_)
            | Type::Module(_)
            | Type::SingletonClass(_)
            | Type::Generic(_) => self.resolve_nominal(receiver, name),
            Type::TypeParameter(param) => {
                match self.resolve_raw(&param.upper_bound, name) {
                    MethodLookup::InvalidReceiver => {
                        // 无界类型参数仍然是一个值
                        self.resolve_nominal(&Type::Class(self.registry.builtins().value), name)
                    }
                    other => other,
                }
            }
            Type::Named(id) => match self.registry.resolve_named(*id) {
                Some(resolved) => self.resolve_raw(&resolved.clone(), name),
                None => MethodLookup::Untyped,
            },
            Type::Union(elements) => self.resolve_all(elements, name),
            Type::Nilable(inner) => self.resolve_all(&[(**inner).clone(), Type::Nil], name),
            Type::Intersection(elements) => {
                let mut found = Vec::new();
                for element in elements {
                    match self.resolve_raw(element, name) {
                        MethodLookup::Found(method) => found.push(method),
                        MethodLookup::Untyped => return MethodLookup::Untyped,
                        MethodLookup::Missing | MethodLookup::InvalidReceiver => {}
                    }
                }
                self.unify(found)
            }
            Type::Not(_) => {
                self.resolve_nominal(&Type::Class(self.registry.builtins().value), name)
            }
            Type::SingletonOf(_) | Type::InstanceOf(_) => {
                match self.checker.unwrap_structural(receiver) {
                    Some(unwrapped) if unwrapped != *receiver => self.resolve_raw(&unwrapped, name),
                    _ => MethodLookup::Missing,
                }
            }
        }
    }

    fn resolve_nominal(
        &self,
        receiver: &Type,
        name: &str,
    ) -> MethodLookup {
        match self.registry.lookup_value_method(receiver, name) {
            Some((callable, owner)) => MethodLookup::Found(ResolvedMethod { callable, owner }),
            None => MethodLookup::Missing,
        }
    }

    fn resolve_all(
        &self,
        elements: &[Type],
        name: &str,
    ) -> MethodLookup {
        let mut found = Vec::with_capacity(elements.len());
        for element in elements {
            match self.resolve_raw(element, name) {
                MethodLookup::Found(method) => found.push(method),
                MethodLookup::Untyped => return MethodLookup::Untyped,
                MethodLookup::Missing | MethodLookup::InvalidReceiver => {
                    return MethodLookup::Missing
                }
            }
        }
        self.unify(found)
    }

    /// 统一多个候选：选出其余都能兼容重写的那个签名
    fn unify(
        &self,
        mut candidates: Vec<ResolvedMethod>,
    ) -> MethodLookup {
        candidates.dedup_by(|a, b| a.callable == b.callable);
        match candidates.len() {
            0 => return MethodLookup::Missing,
            1 => return candidates.pop().map_or(MethodLookup::Missing, MethodLookup::Found),
            _ => {}
        }
        let base = candidates.iter().find(|candidate| {
            candidates
                .iter()
                .all(|other| self.checker.is_method_compatible(&other.callable, &candidate.callable))
        });
        match base {
            Some(base) => MethodLookup::Found(base.clone()),
            None => MethodLookup::Missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::core::type_system::{TypeParameter, Variance};

    #[test]
    fn test_union_receiver_needs_every_member() {
        let registry = TypeRegistry::with_std();
        let b = *registry.builtins();
        let resolver = MethodResolver::new(&registry);
        let union = Type::Union(vec![Type::Class(b.int), Type::Class(b.string)]);
        assert!(matches!(resolver.resolve(&union, "to_string"), MethodLookup::Found(_)));
        assert_eq!(resolver.resolve(&union, "to_float"), MethodLookup::Missing);
    }

    #[test]
    fn test_generic_receiver_substitutes_arguments() {
        let registry = TypeRegistry::with_std();
        let b = *registry.builtins();
        let resolver = MethodResolver::new(&registry);
        let list = registry.generic(b.array_list, vec![Type::Class(b.int)]);
        let MethodLookup::Found(found) = resolver.resolve(&list, "first") else {
            panic!("expected method");
        };
        assert_eq!(found.callable.return_type, Type::nilable(Type::Class(b.int)));
    }

    #[test]
    fn test_intersection_receiver_needs_one_member() {
        let registry = TypeRegistry::with_std();
        let b = *registry.builtins();
        let resolver = MethodResolver::new(&registry);
        let both = Type::Intersection(vec![Type::Class(b.int), Type::Mixin(b.kernel)]);

        let MethodLookup::Found(found) = resolver.resolve(&both, "to_float") else {
            panic!("expected method");
        };
        assert_eq!(found.owner, Type::Class(b.int));
        let MethodLookup::Found(found) = resolver.resolve(&both, "println") else {
            panic!("expected method");
        };
        assert_eq!(found.owner, Type::Mixin(b.kernel));
        // 两边都从 `Value` 得到同一个方法
        let MethodLookup::Found(found) = resolver.resolve(&both, "to_string") else {
            panic!("expected method");
        };
        assert_eq!(found.owner, Type::Class(b.value));
        assert_eq!(resolver.resolve(&both, "nope"), MethodLookup::Missing);
    }

    #[test]
    fn test_type_parameter_receiver_uses_upper_bound() {
        let registry = TypeRegistry::with_std();
        let b = *registry.builtins();
        let resolver = MethodResolver::new(&registry);
        let bounded = Type::parameter(
            TypeParameter::new("T", "Test.run", Variance::Invariant)
                .with_bounds(Type::Class(b.int), Type::Never),
        );
        let MethodLookup::Found(found) = resolver.resolve(&bounded, "to_float") else {
            panic!("expected method");
        };
        assert_eq!(found.owner, Type::Class(b.int));

        // 无界类型参数只能调用 `Value` 的方法
        let unbounded = Type::parameter(TypeParameter::new("U", "Test.run", Variance::Invariant));
        let MethodLookup::Found(found) = resolver.resolve(&unbounded, "to_string") else {
            panic!("expected method");
        };
        assert_eq!(found.owner, Type::Class(b.value));
        assert_eq!(resolver.resolve(&unbounded, "to_float"), MethodLookup::Missing);
    }

    #[test]
    fn test_any_is_invalid_receiver() {
        let registry = TypeRegistry::with_std();
        let resolver = MethodResolver::new(&registry);
        assert_eq!(resolver.resolve(&Type::Any, "foo"), MethodLookup::InvalidReceiver);
        assert_eq!(resolver.resolve(&Type::Untyped, "foo"), MethodLookup::Untyped);
    }
}
