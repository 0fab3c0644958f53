//! 模式检查
//!
//! 每个模式产出两个类型：
//!
//! - 模式节点的类型：被匹配值在模式匹配成功时的类型
//! - 捕获类型：模式一定能匹配的那部分值。`match` 用它计算剩余类型，
//!   剩余类型为 `never` 时后面的分支不可达
//!
//! 带子模式的对象、列表和映射模式不一定匹配，捕获类型为 `never`。

use crate::frontend::ast::{
    AttributePattern, MapPatternEntry, Pattern, PatternKind, RestPattern, TypeExpr,
};
use crate::frontend::core::type_system::{NamespaceId, Type};
use crate::frontend::typecheck::context::{CheckContext, Local};
use crate::frontend::typecheck::errors::TypeError;
use crate::frontend::typecheck::inference::generics::widen_literals;
use crate::frontend::typecheck::methods::MethodLookup;
use crate::util::span::Span;

impl CheckContext<'_> {
    /// 检查模式，返回带类型的模式和捕获类型
    pub fn check_pattern(
        &mut self,
        pattern: &Pattern<()>,
        matched: &Type,
    ) -> (Pattern<Type>, Type) {
        let span = pattern.span;
        match &pattern.kind {
            PatternKind::Wildcard => (
                typed(PatternKind::Wildcard, span, matched.clone()),
                matched.clone(),
            ),
            PatternKind::Identifier(name) => {
                let ty = widen_literals(self.registry(), matched);
                self.declare_local(name, Local::new(ty, true, false));
                (
                    typed(PatternKind::Identifier(name.clone()), span, matched.clone()),
                    matched.clone(),
                )
            }
            PatternKind::As { pattern, name } => {
                let (inner, captured) = self.check_pattern(pattern, matched);
                // 值模式保留字面量类型
                let ty = if matches!(inner.kind, PatternKind::Value(_)) {
                    inner.ty.clone()
                } else {
                    widen_literals(self.registry(), &inner.ty)
                };
                self.declare_local(name, Local::new(ty, true, false));
                let ty = inner.ty.clone();
                (
                    typed(
                        PatternKind::As {
                            pattern: Box::new(inner),
                            name: name.clone(),
                        },
                        span,
                        ty,
                    ),
                    captured,
                )
            }
            PatternKind::Value(value) => {
                let value = self.check_expr(value, Some(matched));
                self.check_can_match(matched, &value.ty, span);
                let ty = self
                    .normalizer()
                    .intersection(vec![matched.clone(), value.ty.clone()]);
                let captured = if value.ty.is_literal() || value.ty.is_nil() {
                    value.ty.clone()
                } else {
                    Type::Never
                };
                (typed(PatternKind::Value(value), span, ty), captured)
            }
            PatternKind::Object { class, attributes } => {
                self.check_object_pattern(class, attributes, matched, span)
            }
            PatternKind::List { elements, rest } => {
                self.check_list_pattern(elements, rest.as_ref(), matched, span)
            }
            PatternKind::Map(entries) => self.check_map_pattern(entries, matched, span),
            PatternKind::Or(left, right) => {
                let (left, left_captured) = self.check_pattern(left, matched);
                let (right, right_captured) = self.check_pattern(right, matched);
                let ty = self.union(vec![left.ty.clone(), right.ty.clone()]);
                let captured = self.union(vec![left_captured, right_captured]);
                (
                    typed(PatternKind::Or(Box::new(left), Box::new(right)), span, ty),
                    captured,
                )
            }
            PatternKind::And(left, right) => {
                let (left, left_captured) = self.check_pattern(left, matched);
                let (right, right_captured) = self.check_pattern(right, &left.ty);
                let ty = right.ty.clone();
                let captured = self
                    .normalizer()
                    .intersection(vec![left_captured, right_captured]);
                (
                    typed(PatternKind::And(Box::new(left), Box::new(right)), span, ty),
                    captured,
                )
            }
        }
    }

    /// 模式类型与被匹配类型不相交时报错
    fn check_can_match(
        &mut self,
        matched: &Type,
        pattern: &Type,
        span: Span,
    ) -> bool {
        if self.subtype_checker().can_intersect(matched, pattern) {
            return true;
        }
        let error = TypeError::PatternMismatch {
            matched: self.inspect(matched),
            pattern: self.inspect(pattern),
            span,
        };
        self.error(error);
        false
    }

    fn check_object_pattern(
        &mut self,
        class: &TypeExpr<()>,
        attributes: &[AttributePattern<()>],
        matched: &Type,
        span: Span,
    ) -> (Pattern<Type>, Type) {
        let class = self.resolve_class_expr(class);
        self.check_can_match(matched, &class.ty, span);
        let ty = self
            .normalizer()
            .intersection(vec![matched.clone(), class.ty.clone()]);

        let mut typed_attributes = Vec::with_capacity(attributes.len());
        for attribute in attributes {
            let attribute_type = self.attribute_type(&ty, &attribute.name, attribute.pattern.span);
            let (pattern, _) = self.check_pattern(&attribute.pattern, &attribute_type);
            typed_attributes.push(AttributePattern {
                name: attribute.name.clone(),
                pattern,
            });
        }
        let captured = if attributes.is_empty() {
            class.ty.clone()
        } else {
            Type::Never
        };
        (
            typed(
                PatternKind::Object {
                    class,
                    attributes: typed_attributes,
                },
                span,
                ty,
            ),
            captured,
        )
    }

    /// 对象模式属性：无参 getter 的返回类型，其次是实例变量
    fn attribute_type(
        &mut self,
        owner: &Type,
        name: &str,
        span: Span,
    ) -> Type {
        if owner.is_untyped() || owner.is_never() {
            return Type::Untyped;
        }
        if let MethodLookup::Found(found) = self.method_resolver().resolve(owner, name) {
            if found.callable.required_count() == 0 {
                return found.callable.return_type.clone();
            }
        }
        if let Some(ivar) = self.registry().lookup_instance_var(owner, name) {
            return ivar;
        }
        let receiver = self.inspect(owner);
        self.error(TypeError::UndefinedMethod {
            method: name.to_string(),
            receiver,
            span,
        });
        Type::Untyped
    }

    fn check_list_pattern(
        &mut self,
        elements: &[Pattern<()>],
        rest: Option<&RestPattern>,
        matched: &Type,
        span: Span,
    ) -> (Pattern<Type>, Type) {
        let array_list = self.registry().builtins().array_list;
        let list_class = Type::Class(array_list);
        self.check_can_match(matched, &list_class, span);
        let ty = self
            .normalizer()
            .intersection(vec![matched.clone(), list_class.clone()]);
        let element = self
            .collection_args(&ty, array_list)
            .and_then(|args| args.into_iter().next())
            .unwrap_or(Type::Any);

        let typed_elements: Vec<Pattern<Type>> = elements
            .iter()
            .map(|e| self.check_pattern(e, &element).0)
            .collect();
        if let Some(RestPattern {
            name: Some(name), ..
        }) = rest
        {
            let rest_type = self.registry().generic(array_list, vec![element.clone()]);
            self.declare_local(name, Local::new(rest_type, true, false));
        }

        // `[*rest]` 匹配任何列表
        let captured = if elements.is_empty() && rest.is_some() {
            ty.clone()
        } else {
            Type::Never
        };
        (
            typed(
                PatternKind::List {
                    elements: typed_elements,
                    rest: rest.cloned(),
                },
                span,
                ty,
            ),
            captured,
        )
    }

    fn check_map_pattern(
        &mut self,
        entries: &[MapPatternEntry<()>],
        matched: &Type,
        span: Span,
    ) -> (Pattern<Type>, Type) {
        let hash_map = self.registry().builtins().hash_map;
        let map_class = Type::Class(hash_map);
        self.check_can_match(matched, &map_class, span);
        let ty = self
            .normalizer()
            .intersection(vec![matched.clone(), map_class]);
        let (key, value) = match self.collection_args(&ty, hash_map).as_deref() {
            Some([key, value]) => (key.clone(), value.clone()),
            _ => (Type::Any, Type::Any),
        };

        let mut typed_entries = Vec::with_capacity(entries.len());
        for entry in entries {
            let key_expr = self.check_expr(&entry.key, Some(&key));
            self.check_can_match(&key, &key_expr.ty, key_expr.span);
            let (pattern, _) = self.check_pattern(&entry.value, &value);
            typed_entries.push(MapPatternEntry {
                key: key_expr,
                value: pattern,
            });
        }
        let captured = if entries.is_empty() {
            ty.clone()
        } else {
            Type::Never
        };
        (typed(PatternKind::Map(typed_entries), span, ty), captured)
    }

    /// `ty` 中集合类 `namespace` 的泛型实参
    fn collection_args(
        &self,
        ty: &Type,
        namespace: NamespaceId,
    ) -> Option<Vec<Type>> {
        match ty {
            Type::Union(elements) | Type::Intersection(elements) => elements
                .iter()
                .find_map(|e| self.collection_args(e, namespace)),
            Type::Nilable(inner) => self.collection_args(inner, namespace),
            Type::Named(id) => self
                .registry()
                .resolve_named(*id)
                .and_then(|t| self.collection_args(t, namespace)),
            other => match self.registry().find_ancestor(other, namespace)? {
                Type::Generic(generic) => {
                    Some(generic.args.iter().map(|(_, a)| a.ty.clone()).collect())
                }
                _ => None,
            },
        }
    }
}

fn typed(
    kind: PatternKind<Type>,
    span: Span,
    ty: Type,
) -> Pattern<Type> {
    Pattern { kind, span, ty }
}
