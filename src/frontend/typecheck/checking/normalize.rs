//! 类型规范化
//!
//! 把并集、交集、否定化简到规范形式：
//!
//! - 并集展平、去重、去掉被其他成员包含的成员，`true | false` 合并为 `bool`，
//!   恰好两个成员且其一为 `nil` 时写成 `T?`
//! - 交集展平、对第一个并集分配、成员两两不相交时为 `never`、去掉超类型；
//!   覆盖全部值的成员被丢弃，否定成员合并为 `~(a | b)` 再拆开
//! - 否定消去双重否定，并用德摩根律下推；`Value` 的否定是 `never`
//!
//! 成员按 [`Type`] 的派生全序排序，因此结果与输入顺序无关。

use std::sync::Arc;

use crate::frontend::core::type_system::{Callable, Generic, Parameter, Type, TypeRegistry};

use super::subtyping::SubtypeChecker;

/// 类型规范化器
pub struct Normalizer<'a> {
    registry: &'a TypeRegistry,
    checker: SubtypeChecker<'a>,
}

impl<'a> Normalizer<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self::with_checker(SubtypeChecker::new(registry))
    }

    /// 使用给定的子类型检查器（保留其 `self` 含义）
    pub fn with_checker(checker: SubtypeChecker<'a>) -> Self {
        Self {
            registry: checker.registry(),
            checker,
        }
    }

    pub fn checker(&self) -> &SubtypeChecker<'a> {
        &self.checker
    }

    /// 规范化任意类型（只处理顶层的代数结构）
    pub fn normalize(
        &self,
        ty: &Type,
    ) -> Type {
        match ty {
            Type::Union(elements) => self.union(elements.clone()),
            Type::Intersection(elements) => self.intersection(elements.clone()),
            Type::Nilable(inner) => self.union(vec![(**inner).clone(), Type::Nil]),
            Type::Not(inner) => self.not(inner),
            other => other.clone(),
        }
    }

    /// 递归规范化（泛型实参、闭包签名内部也会被规范化）
    pub fn normalize_deep(
        &self,
        ty: &Type,
    ) -> Type {
        match ty {
            Type::Union(elements) => {
                self.union(elements.iter().map(|e| self.normalize_deep(e)).collect())
            }
            Type::Intersection(elements) => {
                self.intersection(elements.iter().map(|e| self.normalize_deep(e)).collect())
            }
            Type::Nilable(inner) => self.union(vec![self.normalize_deep(inner), Type::Nil]),
            Type::Not(inner) => self.not(&self.normalize_deep(inner)),
            Type::Generic(generic) => Type::Generic(Arc::new(Generic {
                namespace: generic.namespace,
                args: generic.args.map_types(|t| self.normalize_deep(t)),
            })),
            Type::Callable(callable) => Type::Callable(Arc::new(Callable {
                params: callable
                    .params
                    .iter()
                    .map(|p| Parameter {
                        name: p.name.clone(),
                        ty: self.normalize_deep(&p.ty),
                        kind: p.kind,
                    })
                    .collect(),
                return_type: self.normalize_deep(&callable.return_type),
                throw_type: self.normalize_deep(&callable.throw_type),
                ..(**callable).clone()
            })),
            Type::SingletonOf(inner) => Type::SingletonOf(Box::new(self.normalize_deep(inner))),
            Type::InstanceOf(inner) => Type::InstanceOf(Box::new(self.normalize_deep(inner))),
            Type::Never
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
            | Type::TypeParameter(_)
            | Type::Named(_) => ty.clone(),
        }
    }

    /// `a - b`，即 `a & ~b`
    pub fn difference(
        &self,
        a: &Type,
        b: &Type,
    ) -> Type {
        self.intersection(vec![a.clone(), self.not(b)])
    }

    /// 构造规范化的并集
    pub fn union(
        &self,
        elements: Vec<Type>,
    ) -> Type {
        let mut flat = Vec::with_capacity(elements.len());
        for element in elements {
            if !self.flatten_union(element, &mut flat) {
                return Type::Any;
            }
        }
        flat.sort();
        flat.dedup();

        // ~x | y 在 x <: y 时覆盖一切
        let complete = flat.iter().any(|e| match e {
            Type::Not(inner) => flat
                .iter()
                .any(|other| !matches!(other, Type::Not(_)) && self.checker.is_subtype(inner, other)),
            _ => false,
        });
        if complete {
            return Type::Any;
        }

        let mut kept: Vec<Type> = Vec::with_capacity(flat.len());
        for element in flat {
            if kept.iter().any(|k| self.checker.is_subtype(&element, k)) {
                continue;
            }
            kept.retain(|k| !self.checker.is_subtype(k, &element));
            kept.push(element);
        }

        if kept.contains(&Type::True) && kept.contains(&Type::False) {
            kept.retain(|e| !matches!(e, Type::True | Type::False));
            kept.push(Type::Bool);
        }
        kept.sort();

        match kept.len() {
            0 => Type::Never,
            1 => kept.pop().unwrap_or(Type::Never),
            2 if kept.contains(&Type::Nil) => {
                let other = kept
                    .into_iter()
                    .find(|e| !e.is_nil())
                    .unwrap_or(Type::Nil);
                Type::nilable(other)
            }
            _ => Type::Union(kept),
        }
    }

    /// 展平并集成员；遇到 `any` 返回 `false`
    ///
    /// 交集和否定成员先规范化，空的成员由此被丢弃。
    fn flatten_union(
        &self,
        ty: Type,
        out: &mut Vec<Type>,
    ) -> bool {
        let ty = match ty {
            Type::Intersection(elements) => self.intersection(elements),
            Type::Not(inner) => self.not(&inner),
            other => other,
        };
        match ty {
            Type::Any => false,
            Type::Never | Type::Untyped => true,
            Type::Union(elements) => elements
                .into_iter()
                .all(|element| self.flatten_union(element, out)),
            Type::Nilable(inner) => {
                out.push(Type::Nil);
                self.flatten_union(*inner, out)
            }
            other => {
                out.push(other);
                true
            }
        }
    }

    /// 构造规范化的交集
    pub fn intersection(
        &self,
        elements: Vec<Type>,
    ) -> Type {
        let mut flat = Vec::with_capacity(elements.len());
        for element in elements {
            match element {
                Type::Intersection(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.iter().any(Type::is_never) {
            return Type::Never;
        }
        if flat.iter().any(Type::is_untyped) {
            return Type::Untyped;
        }
        flat.retain(|e| !matches!(e, Type::Any));

        // 尚未定义的别名与否定同时出现时无法判定，保持原样
        let has_not = flat.iter().any(|e| matches!(e, Type::Not(_)));
        let undefined_named = flat
            .iter()
            .any(|e| matches!(e, Type::Named(id) if !self.registry.is_named_defined(*id)));
        if has_not && undefined_named {
            flat.sort();
            flat.dedup();
            return Type::Intersection(flat);
        }

        // 覆盖全部值的成员不收窄交集
        if flat.len() > 1 {
            let narrower: Vec<Type> = flat
                .iter()
                .filter(|e| matches!(e, Type::Not(_)) || !self.checker.covers_values(e))
                .cloned()
                .collect();
            if narrower.is_empty() {
                flat.sort();
                flat.truncate(1);
            } else {
                flat = narrower;
            }
        }

        // 否定成员合并：`~true & ~false` 即 `~bool`
        let negated: Vec<Type> = flat
            .iter()
            .filter_map(|e| match e {
                Type::Not(inner) => Some((**inner).clone()),
                _ => None,
            })
            .collect();
        if !negated.is_empty() {
            let excluded = self.union(negated);
            if matches!(excluded, Type::Any) || self.checker.covers_values(&excluded) {
                return Type::Never;
            }
            flat.retain(|e| !matches!(e, Type::Not(_)));
            flat.extend(Self::members(excluded).into_iter().map(Type::not));
        }
        let has_not = flat.iter().any(|e| matches!(e, Type::Not(_)));

        let mut expanded = Vec::with_capacity(flat.len());
        for element in flat {
            match element {
                Type::Named(id) => match self.registry.resolve_named(id) {
                    Some(resolved) => match resolved.clone() {
                        Type::Intersection(inner) => expanded.extend(inner),
                        other => expanded.push(other),
                    },
                    None => expanded.push(Type::Named(id)),
                },
                Type::Bool if has_not => expanded.push(Type::Union(vec![Type::True, Type::False])),
                Type::Nilable(inner) => expanded.push(Type::Union(vec![*inner, Type::Nil])),
                Type::Any => {}
                other => expanded.push(other),
            }
        }

        // 对第一个并集分配
        if let Some(index) = expanded.iter().position(|e| matches!(e, Type::Union(_))) {
            let Type::Union(members) = expanded.remove(index) else {
                return Type::Never;
            };
            let parts = members
                .into_iter()
                .map(|member| {
                    let mut part = expanded.clone();
                    part.push(member);
                    self.intersection(part)
                })
                .collect();
            return self.union(parts);
        }

        expanded.sort();
        expanded.dedup();

        for (i, a) in expanded.iter().enumerate() {
            for b in &expanded[i + 1..] {
                if !self.checker.can_intersect(a, b) {
                    return Type::Never;
                }
            }
        }

        // 去掉超类型，只保留最具体的成员
        let mut kept: Vec<Type> = Vec::with_capacity(expanded.len());
        for element in expanded {
            if kept.iter().any(|k| self.checker.is_subtype(k, &element)) {
                continue;
            }
            kept.retain(|k| !self.checker.is_subtype(&element, k));
            kept.push(element);
        }
        kept.sort();

        match kept.len() {
            0 => Type::Any,
            1 => kept.pop().unwrap_or(Type::Any),
            _ => Type::Intersection(kept),
        }
    }

    /// 构造规范化的否定
    ///
    /// 覆盖全部值的类型（`Value`）的否定是 `never`。
    pub fn not(
        &self,
        ty: &Type,
    ) -> Type {
        match ty {
            Type::Union(elements) => {
                return self.intersection(elements.iter().map(|e| self.not(e)).collect());
            }
            Type::Intersection(_) | Type::Nilable(_) => {
                let normalized = self.normalize(ty);
                if normalized != *ty {
                    return self.not(&normalized);
                }
            }
            Type::Not(inner) => return self.normalize(inner),
            Type::Any => return Type::Never,
            Type::Never => return Type::Any,
            Type::Untyped => return Type::Untyped,
            _ => {}
        }
        if self.checker.covers_values(ty) {
            return Type::Never;
        }
        match ty {
            Type::Intersection(elements) => self.union(elements.iter().map(|e| self.not(e)).collect()),
            Type::Nilable(inner) => self.intersection(vec![self.not(inner), Type::not(Type::Nil)]),
            Type::Named(id) => match self.registry.resolve_named(*id) {
                Some(resolved) => self.not(&resolved.clone()),
                None => Type::not(ty.clone()),
            },
            other => Type::not(other.clone()),
        }
    }

    /// 规范化并集的成员表（`T?` 视为 `T | nil`）
    fn members(ty: Type) -> Vec<Type> {
        match ty {
            Type::Never => Vec::new(),
            Type::Union(elements) => elements,
            Type::Nilable(inner) => vec![*inner, Type::Nil],
            other => vec![other],
        }
    }
}
