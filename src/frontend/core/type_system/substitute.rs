//! 统一的类型替换模块
//!
//! 把类型参数（按名称）和 `self` 占位符替换为具体类型。
//! 这里只做结构替换，不做规范化；需要规范形式的调用方
//! 使用 `typecheck::inference::generics::replace_type_parameters`。

use std::sync::Arc;

use indexmap::IndexMap;

use super::types::{Callable, Generic, Parameter, Type};

/// 类型参数绑定（参数名 → 类型）
pub type TypeBindings = IndexMap<String, Type>;

/// 类型替换器
pub struct Substituter<'a> {
    bindings: &'a TypeBindings,
    self_type: Option<&'a Type>,
}

impl<'a> Substituter<'a> {
    /// 创建替换器
    pub fn new(bindings: &'a TypeBindings) -> Self {
        Self {
            bindings,
            self_type: None,
        }
    }

    /// 同时替换 `self`
    pub fn with_self(
        mut self,
        self_type: Option<&'a Type>,
    ) -> Self {
        self.self_type = self_type;
        self
    }

    fn is_noop(&self) -> bool {
        self.bindings.is_empty() && self.self_type.is_none()
    }

    /// 应用替换
    pub fn apply(
        &self,
        ty: &Type,
    ) -> Type {
        if self.is_noop() {
            return ty.clone();
        }
        match ty {
            Type::TypeParameter(param) => match self.bindings.get(&param.name) {
                Some(bound) => bound.clone(),
                None => ty.clone(),
            },
            Type::SelfType => match self.self_type {
                Some(self_type) => self_type.clone(),
                None => Type::SelfType,
            },
            Type::Generic(generic) => Type::Generic(Arc::new(Generic {
                namespace: generic.namespace,
                args: generic.args.map_types(|arg| self.apply(arg)),
            })),
            Type::Union(elements) => Type::Union(elements.iter().map(|e| self.apply(e)).collect()),
            Type::Intersection(elements) => {
                Type::Intersection(elements.iter().map(|e| self.apply(e)).collect())
            }
            Type::Nilable(inner) => Type::Nilable(Box::new(self.apply(inner))),
            Type::Not(inner) => Type::Not(Box::new(self.apply(inner))),
            Type::SingletonOf(inner) => Type::SingletonOf(Box::new(self.apply(inner))),
            Type::InstanceOf(inner) => Type::InstanceOf(Box::new(self.apply(inner))),
            Type::Callable(callable) => Type::Callable(Arc::new(self.apply_callable(callable))),
            Type::Never
            | Type::Any
            | Type::Void
            | Type::Untyped
            | Type::Nil
            | Type::Bool
            | Type::True
            | Type::False
            | Type::Literal(_)
            | Type::Class(_)
            | Type::Mixin(_)
            | Type::Interface(_)
            | Type::Module(_)
            | Type::SingletonClass(_)
            | Type::Named(_) => ty.clone(),
        }
    }

    /// 替换方法签名中的参数、返回值和抛出类型
    pub fn apply_callable(
        &self,
        callable: &Callable,
    ) -> Callable {
        if self.is_noop() {
            return callable.clone();
        }
        Callable {
            name: callable.name.clone(),
            params: callable
                .params
                .iter()
                .map(|p| Parameter {
                    name: p.name.clone(),
                    ty: self.apply(&p.ty),
                    kind: p.kind,
                })
                .collect(),
            return_type: self.apply(&callable.return_type),
            throw_type: self.apply(&callable.throw_type),
            type_params: callable.type_params.clone(),
            flags: callable.flags,
            owner: callable.owner,
            closure: callable.closure,
        }
    }
}

/// 由泛型实例构造绑定表
pub fn bindings_of(generic: &Generic) -> TypeBindings {
    generic
        .args
        .iter()
        .map(|(name, arg)| (name.to_string(), arg.ty.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::core::type_system::types::{LiteralKind, TypeParameter, Variance};

    #[test]
    fn test_substitute_parameter_and_self() {
        let v = Type::parameter(TypeParameter::new("V", "Foo", Variance::Invariant));
        let shape = Type::Union(vec![v, Type::SelfType, Type::Nil]);
        let mut bindings = TypeBindings::new();
        bindings.insert("V".to_string(), Type::int(1));
        let self_type = Type::literal(LiteralKind::Symbol, "me");
        let out = Substituter::new(&bindings)
            .with_self(Some(&self_type))
            .apply(&shape);
        assert_eq!(out, Type::Union(vec![Type::int(1), self_type, Type::Nil]));
    }

    #[test]
    fn test_unbound_parameter_is_kept() {
        let v = Type::parameter(TypeParameter::new("V", "Foo", Variance::Invariant));
        let bindings = TypeBindings::new();
        assert_eq!(Substituter::new(&bindings).apply(&v), v);
    }
}
