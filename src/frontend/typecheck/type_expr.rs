//! 类型表达式解析
//!
//! 把语法上的类型表达式解析为 [`Type`]，同时产出带类型的节点。
//! 名字查找顺序：类型参数 → 词法命名空间（由内向外）→ `Std`。

use std::sync::Arc;

use crate::frontend::ast::{ClosureParamType, ParamDeclKind, TypeExpr, TypeExprKind};
use crate::frontend::core::type_system::{
    Callable, NamespaceId, Parameter, ParameterKind, Type, TypeBindings, TypeParameter,
    TypeRegistry,
};
use crate::frontend::typecheck::checking::{Normalizer, SubtypeChecker};
use crate::frontend::typecheck::errors::TypeError;
use crate::frontend::typecheck::inference::generics::replace_type_parameters;
use crate::util::span::Span;

/// 在词法作用域中查找类型名的第一段，其余段在找到的命名空间里逐级查找
pub fn lookup_type_path(
    registry: &TypeRegistry,
    scopes: &[NamespaceId],
    path: &[String],
) -> Option<Type> {
    let (first, rest) = path.split_first()?;
    let mut current = scopes
        .iter()
        .rev()
        .find_map(|scope| registry.lookup_subtype(*scope, first))
        .or_else(|| registry.lookup_subtype(registry.root(), first))
        .or_else(|| registry.lookup_subtype(registry.std_module(), first))
        .cloned()?;
    for segment in rest {
        let id = current.namespace_id()?;
        current = registry.lookup_subtype(id, segment)?.clone();
    }
    Some(current)
}

/// 形参声明种类到类型层面的形参种类
pub fn parameter_kind(
    kind: ParamDeclKind,
    has_default: bool,
) -> ParameterKind {
    match kind {
        ParamDeclKind::PositionalRest => ParameterKind::PositionalRest,
        ParamDeclKind::NamedRest => ParameterKind::NamedRest,
        ParamDeclKind::Normal if has_default => ParameterKind::Default,
        ParamDeclKind::Normal => ParameterKind::Normal,
    }
}

/// 类型表达式解析器
pub struct TypeResolver<'a> {
    registry: &'a TypeRegistry,
    scopes: &'a [NamespaceId],
    type_params: &'a [Arc<TypeParameter>],
    self_type: Option<&'a Type>,
    /// 允许不带实参的泛型（构造调用 `ArrayList()` 由推断补全）
    allow_bare_generic: bool,
    errors: Vec<TypeError>,
}

impl<'a> TypeResolver<'a> {
    pub fn new(
        registry: &'a TypeRegistry,
        scopes: &'a [NamespaceId],
        type_params: &'a [Arc<TypeParameter>],
        self_type: Option<&'a Type>,
    ) -> Self {
        Self {
            registry,
            scopes,
            type_params,
            self_type,
            allow_bare_generic: false,
            errors: Vec::new(),
        }
    }

    pub fn allow_bare_generic(mut self) -> Self {
        self.allow_bare_generic = true;
        self
    }

    pub fn into_errors(self) -> Vec<TypeError> {
        self.errors
    }

    /// 解析类型表达式
    pub fn resolve(
        &mut self,
        expr: &TypeExpr<()>,
    ) -> TypeExpr<Type> {
        let span = expr.span;
        let (kind, ty) = match &expr.kind {
            TypeExprKind::Never => (TypeExprKind::Never, Type::Never),
            TypeExprKind::Any => (TypeExprKind::Any, Type::Any),
            TypeExprKind::Void => (TypeExprKind::Void, Type::Void),
            TypeExprKind::Nil => (TypeExprKind::Nil, Type::Nil),
            TypeExprKind::Bool => (TypeExprKind::Bool, Type::Bool),
            TypeExprKind::True => (TypeExprKind::True, Type::True),
            TypeExprKind::False => (TypeExprKind::False, Type::False),
            TypeExprKind::SelfType => (TypeExprKind::SelfType, Type::SelfType),
            TypeExprKind::Literal { kind, value } => (
                TypeExprKind::Literal {
                    kind: *kind,
                    value: value.clone(),
                },
                Type::literal(*kind, value.clone()),
            ),
            TypeExprKind::Name(path) => {
                let ty = self.resolve_name(path, span);
                (TypeExprKind::Name(path.clone()), ty)
            }
            TypeExprKind::Generic { name, args } => {
                let args: Vec<TypeExpr<Type>> = args.iter().map(|a| self.resolve(a)).collect();
                let arg_types: Vec<Type> = args.iter().map(|a| a.ty.clone()).collect();
                let ty = self.resolve_generic(name, arg_types, span);
                (
                    TypeExprKind::Generic {
                        name: name.clone(),
                        args,
                    },
                    ty,
                )
            }
            TypeExprKind::Nilable(inner) => {
                let inner = self.resolve(inner);
                let ty = Normalizer::new(self.registry).union(vec![inner.ty.clone(), Type::Nil]);
                (TypeExprKind::Nilable(Box::new(inner)), ty)
            }
            TypeExprKind::Union(elements) => {
                let elements: Vec<TypeExpr<Type>> =
                    elements.iter().map(|e| self.resolve(e)).collect();
                let ty = Normalizer::new(self.registry)
                    .union(elements.iter().map(|e| e.ty.clone()).collect());
                (TypeExprKind::Union(elements), ty)
            }
            TypeExprKind::Intersection(elements) => {
                let elements: Vec<TypeExpr<Type>> =
                    elements.iter().map(|e| self.resolve(e)).collect();
                let ty = Normalizer::new(self.registry)
                    .intersection(elements.iter().map(|e| e.ty.clone()).collect());
                (TypeExprKind::Intersection(elements), ty)
            }
            TypeExprKind::Not(inner) => {
                let inner = self.resolve(inner);
                let ty = Normalizer::new(self.registry).not(&inner.ty);
                (TypeExprKind::Not(Box::new(inner)), ty)
            }
            TypeExprKind::Closure {
                params,
                return_type,
                throw_type,
            } => {
                let params: Vec<ClosureParamType<Type>> = params
                    .iter()
                    .map(|p| ClosureParamType {
                        name: p.name.clone(),
                        ty: self.resolve(&p.ty),
                        kind: p.kind,
                    })
                    .collect();
                let return_type = return_type.as_ref().map(|r| Box::new(self.resolve(r)));
                let throw_type = throw_type.as_ref().map(|t| Box::new(self.resolve(t)));
                let callable = Callable::closure(
                    params
                        .iter()
                        .map(|p| {
                            Parameter::new(p.name.clone(), p.ty.ty.clone())
                                .with_kind(parameter_kind(p.kind, false))
                        })
                        .collect(),
                    return_type.as_ref().map_or(Type::Void, |r| r.ty.clone()),
                    throw_type.as_ref().map_or(Type::Never, |t| t.ty.clone()),
                );
                (
                    TypeExprKind::Closure {
                        params,
                        return_type,
                        throw_type,
                    },
                    Type::callable(callable),
                )
            }
            TypeExprKind::SingletonOf(inner) => {
                let inner = self.resolve(inner);
                let ty = Type::SingletonOf(Box::new(inner.ty.clone()));
                (TypeExprKind::SingletonOf(Box::new(inner)), ty)
            }
            TypeExprKind::InstanceOf(inner) => {
                let inner = self.resolve(inner);
                let ty = Type::InstanceOf(Box::new(inner.ty.clone()));
                (TypeExprKind::InstanceOf(Box::new(inner)), ty)
            }
        };
        TypeExpr { kind, span, ty }
    }

    fn lookup(
        &mut self,
        path: &[String],
        span: Span,
    ) -> Option<Type> {
        if let [single] = path {
            if let Some(param) = self.type_params.iter().rev().find(|p| p.name == *single) {
                return Some(Type::TypeParameter(param.clone()));
            }
        }
        match lookup_type_path(self.registry, self.scopes, path) {
            Some(ty) => Some(ty),
            None => {
                self.errors.push(TypeError::UndefinedType {
                    name: path.join("::"),
                    span,
                });
                None
            }
        }
    }

    fn resolve_name(
        &mut self,
        path: &[String],
        span: Span,
    ) -> Type {
        let Some(ty) = self.lookup(path, span) else {
            return Type::Untyped;
        };
        let expected = match &ty {
            Type::Named(id) => self.registry.named(*id).type_params.len(),
            other => other
                .namespace_id()
                .map(|id| self.registry.namespace(id).type_params.len())
                .unwrap_or(0),
        };
        if expected > 0 && !self.allow_bare_generic {
            self.errors.push(TypeError::TypeArgumentCount {
                name: path.join("::"),
                expected,
                given: 0,
                span,
            });
            return Type::Untyped;
        }
        match ty {
            Type::Class(id) => self.registry.marker_of_class(id).unwrap_or(Type::Class(id)),
            other => other,
        }
    }

    fn resolve_generic(
        &mut self,
        path: &[String],
        args: Vec<Type>,
        span: Span,
    ) -> Type {
        let Some(base) = self.lookup(path, span) else {
            return Type::Untyped;
        };
        let params = match &base {
            Type::Named(id) => self.registry.named(*id).type_params.clone(),
            other => match other.namespace_id() {
                Some(id) => self.registry.namespace(id).type_params.clone(),
                None => Vec::new(),
            },
        };
        if params.len() != args.len() {
            self.errors.push(TypeError::TypeArgumentCount {
                name: path.join("::"),
                expected: params.len(),
                given: args.len(),
                span,
            });
            return Type::Untyped;
        }

        let bindings: TypeBindings = params
            .iter()
            .zip(args.iter())
            .map(|(p, a)| (p.name.clone(), a.clone()))
            .collect();
        self.check_bounds(&params, &args, &bindings, span);

        match base {
            Type::Named(id) => match &self.registry.named(id).ty {
                Some(definition) => {
                    replace_type_parameters(self.registry, definition, &bindings, None)
                }
                // 别名阶段会先定义被引用的别名，这里只在循环时出现
                None => Type::Untyped,
            },
            other => match other.namespace_id() {
                Some(id) => self.registry.generic(id, args),
                None => Type::Untyped,
            },
        }
    }

    /// 检查实参是否满足类型参数的上下界
    pub fn check_bounds(
        &mut self,
        params: &[Arc<TypeParameter>],
        args: &[Type],
        bindings: &TypeBindings,
        span: Span,
    ) {
        let checker = SubtypeChecker::new(self.registry).with_self(self.self_type.cloned());
        for (param, arg) in params.iter().zip(args) {
            if arg.contains_type_parameters() || arg.is_untyped() {
                continue;
            }
            let upper = replace_type_parameters(self.registry, &param.upper_bound, bindings, None);
            if !checker.is_subtype(arg, &upper) {
                self.errors.push(TypeError::BoundViolation {
                    ty: self.registry.inspect(arg),
                    bound: self.registry.inspect(&upper),
                    param: param.name.clone(),
                    which: "upper",
                    span,
                });
            }
            let lower = replace_type_parameters(self.registry, &param.lower_bound, bindings, None);
            if !checker.is_subtype(&lower, arg) {
                self.errors.push(TypeError::BoundViolation {
                    ty: self.registry.inspect(arg),
                    bound: self.registry.inspect(&lower),
                    param: param.name.clone(),
                    which: "lower",
                    span,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(parts: &[&str]) -> TypeExpr<()> {
        TypeExpr::new(
            TypeExprKind::Name(parts.iter().map(|p| p.to_string()).collect()),
            Span::dummy(),
        )
    }

    #[test]
    fn test_resolve_std_names_and_nilable() {
        let registry = TypeRegistry::with_std();
        let b = *registry.builtins();
        let mut resolver = TypeResolver::new(&registry, &[], &[], None);
        let expr = TypeExpr::new(TypeExprKind::Nilable(Box::new(name(&["Int"]))), Span::dummy());
        let typed = resolver.resolve(&expr);
        assert_eq!(typed.ty, Type::nilable(Type::Class(b.int)));
        assert_eq!(resolver.resolve(&name(&["Std", "Nil"])).ty, Type::Nil);
        assert!(resolver.into_errors().is_empty());
    }

    #[test]
    fn test_generic_arity_and_bare_generic() {
        let registry = TypeRegistry::with_std();
        let b = *registry.builtins();
        let mut resolver = TypeResolver::new(&registry, &[], &[], None);
        let list = TypeExpr::new(
            TypeExprKind::Generic {
                name: vec!["ArrayList".to_string()],
                args: vec![name(&["String"])],
            },
            Span::dummy(),
        );
        assert_eq!(
            resolver.resolve(&list).ty,
            registry.generic(b.array_list, vec![Type::Class(b.string)])
        );
        assert_eq!(resolver.resolve(&name(&["ArrayList"])).ty, Type::Untyped);
        let errors = resolver.into_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "E2005");
    }

    #[test]
    fn test_undefined_type() {
        let registry = TypeRegistry::with_std();
        let mut resolver = TypeResolver::new(&registry, &[], &[], None);
        assert_eq!(resolver.resolve(&name(&["Nope"])).ty, Type::Untyped);
        assert_eq!(
            resolver.into_errors()[0].to_string(),
            "undefined type `Nope`"
        );
    }
}
