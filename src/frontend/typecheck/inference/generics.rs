//! 泛型类型实参推断
//!
//! 同步遍历形参形状与实参类型，遇到可推断的类型参数时绑定它：
//! 已绑定的直接代入，未绑定的绑定为实参的非字面量形式，
//! 并检查上界、下界（下界不满足时若下界更宽则退化为下界）。
//!
//! 推断结果是一个 `TypeBindings`，配合 [`replace_type_parameters`]
//! 把绑定代回任意类型形状。

use std::sync::Arc;

use crate::frontend::core::type_system::{
    Callable, Generic, Parameter, Substituter, Type, TypeBindings, TypeParameter, TypeRegistry,
};
use crate::frontend::typecheck::checking::{Normalizer, SubtypeChecker};
use crate::frontend::typecheck::errors::TypeError;
use crate::util::span::Span;

/// 把字面量拓宽为它们的类（`5` → `Int`，`true` → `bool`）
pub fn widen_literals(
    registry: &TypeRegistry,
    ty: &Type,
) -> Type {
    match ty {
        Type::Literal(_) => registry.backing_class(ty).unwrap_or_else(|| ty.clone()),
        Type::True | Type::False => Type::Bool,
        Type::Union(elements) => Normalizer::new(registry).union(
            elements
                .iter()
                .map(|e| widen_literals(registry, e))
                .collect(),
        ),
        Type::Nilable(inner) => Type::nilable(widen_literals(registry, inner)),
        _ => ty.clone(),
    }
}

/// 用绑定表替换类型参数和 `self`，并规范化结果
pub fn replace_type_parameters(
    registry: &TypeRegistry,
    ty: &Type,
    bindings: &TypeBindings,
    self_type: Option<&Type>,
) -> Type {
    if bindings.is_empty() && self_type.is_none() {
        return ty.clone();
    }
    let substituted = Substituter::new(bindings).with_self(self_type).apply(ty);
    Normalizer::new(registry).normalize_deep(&substituted)
}

/// 类型实参推断器
pub struct TypeArgumentInferrer<'a> {
    registry: &'a TypeRegistry,
    checker: SubtypeChecker<'a>,
    normalizer: Normalizer<'a>,
    /// 可被推断的类型参数
    params: Vec<Arc<TypeParameter>>,
    bindings: TypeBindings,
    errors: Vec<TypeError>,
    span: Span,
}

impl<'a> TypeArgumentInferrer<'a> {
    pub fn new(
        registry: &'a TypeRegistry,
        params: &[Arc<TypeParameter>],
        span: Span,
    ) -> Self {
        Self {
            registry,
            checker: SubtypeChecker::new(registry),
            normalizer: Normalizer::new(registry),
            params: params.to_vec(),
            bindings: TypeBindings::new(),
            errors: Vec::new(),
            span,
        }
    }

    /// 预先给出的绑定（显式类型实参、接收者的泛型实参）
    pub fn with_bindings(
        mut self,
        bindings: TypeBindings,
    ) -> Self {
        self.bindings.extend(bindings);
        self
    }

    pub fn bindings(&self) -> &TypeBindings {
        &self.bindings
    }

    pub fn take_errors(&mut self) -> Vec<TypeError> {
        std::mem::take(&mut self.errors)
    }

    fn is_inferrable(
        &self,
        param: &TypeParameter,
    ) -> bool {
        self.params
            .iter()
            .any(|p| p.name == param.name && p.owner == param.owner)
    }

    /// 用当前绑定代入
    pub fn substitute(
        &self,
        ty: &Type,
    ) -> Type {
        replace_type_parameters(self.registry, ty, &self.bindings, None)
    }

    /// 以 `given` 推断 `shape` 中的类型参数，返回代入后的形状
    ///
    /// 失败（违反边界）时返回 `None`，错误记录在推断器中。
    pub fn infer(
        &mut self,
        given: &Type,
        shape: &Type,
    ) -> Option<Type> {
        if given.is_untyped() {
            return Some(self.substitute(shape));
        }
        match shape {
            Type::TypeParameter(param) if self.is_inferrable(param) => self.bind(given, param),
            Type::Named(id) => match self.registry.resolve_named(*id) {
                Some(resolved) => {
                    let resolved = resolved.clone();
                    self.infer(given, &resolved)
                }
                None => Some(shape.clone()),
            },
            Type::Generic(target) => self.infer_generic(given, shape, target),
            Type::Callable(target) => self.infer_callable(given, target),
            Type::Union(elements) => self.infer_union(given, elements),
            Type::Nilable(inner) => {
                let rest = self.normalizer.difference(given, &Type::Nil);
                if rest.is_never() {
                    return Some(self.substitute(shape));
                }
                let inner = self.infer(&rest, inner)?;
                Some(self.normalizer.union(vec![inner, Type::Nil]))
            }
            Type::Intersection(elements) => {
                let mut out = Vec::with_capacity(elements.len());
                for element in elements {
                    out.push(self.infer(given, element)?);
                }
                Some(self.normalizer.intersection(out))
            }
            Type::Not(inner) => {
                let inner = self.infer(given, inner)?;
                Some(self.normalizer.not(&inner))
            }
            Type::TypeParameter(_)
            | Type::Never
            | Type::Any
            | Type::Void
            | Type::Untyped
            | Type::SelfType
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
            | Type::SingletonOf(_)
            | Type::InstanceOf(_) => Some(self.substitute(shape)),
        }
    }

    fn bind(
        &mut self,
        given: &Type,
        param: &Arc<TypeParameter>,
    ) -> Option<Type> {
        if let Some(bound) = self.bindings.get(&param.name) {
            return Some(bound.clone());
        }
        let mut candidate = widen_literals(self.registry, given);

        let upper = self.substitute(&param.upper_bound);
        if !self.checker.is_subtype(&candidate, &upper) {
            self.errors.push(TypeError::BoundViolation {
                ty: self.registry.inspect(&candidate),
                bound: self.registry.inspect(&upper),
                param: param.name.clone(),
                which: "upper",
                span: self.span,
            });
            return None;
        }

        let lower = self.substitute(&param.lower_bound);
        if !self.checker.is_subtype(&lower, &candidate) {
            if self.checker.is_subtype(&candidate, &lower) {
                candidate = lower;
            } else {
                self.errors.push(TypeError::BoundViolation {
                    ty: self.registry.inspect(&candidate),
                    bound: self.registry.inspect(&lower),
                    param: param.name.clone(),
                    which: "lower",
                    span: self.span,
                });
                return None;
            }
        }

        tracing::trace!(param = %param.name, ty = %self.registry.inspect(&candidate), "bound type parameter");
        self.bindings.insert(param.name.clone(), candidate.clone());
        Some(candidate)
    }

    fn infer_generic(
        &mut self,
        given: &Type,
        shape: &Type,
        target: &Arc<Generic>,
    ) -> Option<Type> {
        if !shape.contains_type_parameters() {
            return Some(shape.clone());
        }
        let widened = widen_literals(self.registry, given);
        let found = match &widened {
            Type::Generic(generic) if generic.namespace == target.namespace => {
                Some(generic.clone())
            }
            other => match self.registry.find_ancestor(other, target.namespace) {
                Some(Type::Generic(generic)) => Some(generic),
                _ => None,
            },
        };
        let Some(found) = found else {
            // 无法对应，交给后续的子类型检查报告
            return Some(self.substitute(shape));
        };

        let mut args = target.args.clone();
        let names: Vec<String> = target.args.iter().map(|(n, _)| n.to_string()).collect();
        for name in names {
            let (Some(given_arg), Some(target_arg)) = (found.args.get(&name), target.args.get(&name))
            else {
                continue;
            };
            let inferred = self.infer(&given_arg.ty.clone(), &target_arg.ty.clone())?;
            let mut argument = target_arg.clone();
            argument.ty = inferred;
            args.insert(name, argument);
        }
        Some(Type::Generic(Arc::new(Generic {
            namespace: target.namespace,
            args,
        })))
    }

    fn infer_callable(
        &mut self,
        given: &Type,
        target: &Arc<Callable>,
    ) -> Option<Type> {
        let Type::Callable(given) = given else {
            return Some(self.substitute(&Type::Callable(target.clone())));
        };
        let mut changed = false;
        let mut params = Vec::with_capacity(target.params.len());
        for (index, param) in target.params.iter().enumerate() {
            let ty = match given.params.get(index) {
                Some(given_param) => self.infer(&given_param.ty, &param.ty)?,
                None => self.substitute(&param.ty),
            };
            changed |= ty != param.ty;
            params.push(Parameter {
                name: param.name.clone(),
                ty,
                kind: param.kind,
            });
        }
        let return_type = self.infer(&given.return_type, &target.return_type)?;
        let throw_type = self.infer(&given.throw_type, &target.throw_type)?;
        changed |= return_type != target.return_type || throw_type != target.throw_type;
        if !changed {
            return Some(Type::Callable(target.clone()));
        }
        Some(Type::Callable(Arc::new(Callable {
            params,
            return_type,
            throw_type,
            ..(**target).clone()
        })))
    }

    /// 先用形状中不含类型参数的成员吸收实参的对应部分，剩余部分再去推断
    fn infer_union(
        &mut self,
        given: &Type,
        elements: &[Type],
    ) -> Option<Type> {
        let (concrete, parametric): (Vec<&Type>, Vec<&Type>) = elements
            .iter()
            .partition(|e| !e.contains_type_parameters());

        let given_members = match given {
            Type::Union(members) => members.clone(),
            Type::Nilable(inner) => vec![(**inner).clone(), Type::Nil],
            other => vec![other.clone()],
        };
        let remaining: Vec<Type> = given_members
            .into_iter()
            .filter(|member| !concrete.iter().any(|c| self.checker.is_subtype(member, c)))
            .collect();

        let mut out: Vec<Type> = concrete.into_iter().cloned().collect();
        if remaining.is_empty() {
            out.extend(parametric.into_iter().map(|p| self.substitute(p)));
        } else {
            let rest = self.normalizer.union(remaining);
            for element in parametric {
                out.push(self.infer(&rest, element)?);
            }
        }
        Some(self.normalizer.union(out))
    }

    /// 结束推断：未被绑定的类型参数取其上界
    pub fn finish(mut self) -> (TypeBindings, Vec<TypeError>) {
        let params = self.params.clone();
        for param in params {
            if !self.bindings.contains_key(&param.name) {
                let upper = self.substitute(&param.upper_bound);
                self.bindings.insert(param.name.clone(), upper);
            }
        }
        (self.bindings, self.errors)
    }
}
