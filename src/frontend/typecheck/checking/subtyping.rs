//! 子类型检查
//!
//! 实现子类型关系 `A <: B` 的判定，规则按优先级：
//!
//! 1. 左边是 `never`/`untyped` 恒成立；右边是 `any`/`void`/`untyped` 恒成立
//! 2. 解开别名、`self`、`&T`/`^T` 等结构包装
//! 3. 先在左边、再在右边按代数结构分配（并集、可空、否定）；
//!    左边的否定只能是另一个否定的子类型，`~Value` 是空类型
//! 4. 右边交集要求满足每一项；左边交集只需一项满足
//! 5. 名义比较：父类链、混入、接口（显式包含或结构一致）
//! 6. 字面量之间按值比较
//!
//! 结构化接口检查是共归纳的：正在检查的 (类型, 接口) 对被假设成立，
//! 因此自引用接口可以终止。

use std::cell::RefCell;
use std::sync::Arc;

use crate::frontend::core::type_system::{
    bindings_of, Callable, Generic, NamespaceId, NamespaceKind, Substituter, Type, TypeRegistry,
    Variance,
};

use super::normalize::Normalizer;

/// 子类型检查器
pub struct SubtypeChecker<'a> {
    registry: &'a TypeRegistry,
    /// `self` 占位符代表的接收者类型
    self_type: Option<Type>,
    /// 正在进行中的结构化接口检查
    assumptions: RefCell<Vec<(Type, NamespaceId)>>,
}

impl<'a> SubtypeChecker<'a> {
    /// 创建新的子类型检查器
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self {
            registry,
            self_type: None,
            assumptions: RefCell::new(Vec::new()),
        }
    }

    /// 设置 `self` 的含义
    pub fn with_self(
        mut self,
        self_type: Option<Type>,
    ) -> Self {
        self.self_type = self_type;
        self
    }

    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    /// 两侧都可能缺失类型信息时的子类型判定
    ///
    /// 都缺失视为成立，只缺一侧视为不成立。
    pub fn is_subtype_opt(
        &self,
        sub: Option<&Type>,
        sup: Option<&Type>,
    ) -> bool {
        match (sub, sup) {
            (None, None) => true,
            (Some(sub), Some(sup)) => self.is_subtype(sub, sup),
            _ => false,
        }
    }

    /// 解开不参与关系判定的包装：别名、`self`、`&T`、`^T`
    ///
    /// 未定义的别名返回 `None`。
    pub(crate) fn unwrap_structural(
        &self,
        ty: &Type,
    ) -> Option<Type> {
        match ty {
            Type::Named(id) => self.registry.resolve_named(*id).cloned(),
            Type::SelfType => Some(self.self_type.clone().unwrap_or(Type::SelfType)),
            Type::SingletonOf(inner) => {
                let inner = self.unwrap_structural(inner)?;
                match inner.namespace_id() {
                    Some(id) if !matches!(inner, Type::SingletonClass(_)) => Some(
                        self.registry
                            .namespace(id)
                            .singleton
                            .map(Type::SingletonClass)
                            .unwrap_or(Type::SingletonOf(Box::new(inner))),
                    ),
                    _ => Some(Type::SingletonOf(Box::new(inner))),
                }
            }
            Type::InstanceOf(inner) => {
                let inner = self.unwrap_structural(inner)?;
                match &inner {
                    Type::SingletonClass(id) => Some(
                        self.registry
                            .namespace(*id)
                            .attached
                            .map(|attached| self.registry.self_instance(attached))
                            .unwrap_or(Type::InstanceOf(Box::new(inner.clone()))),
                    ),
                    _ => Some(Type::InstanceOf(Box::new(inner))),
                }
            }
            other => Some(other.clone()),
        }
    }

    fn is_wrapper(ty: &Type) -> bool {
        matches!(
            ty,
            Type::Named(_) | Type::SingletonOf(_) | Type::InstanceOf(_)
        ) || matches!(ty, Type::SelfType)
    }

    /// 检查是否为有效子类型
    pub fn is_subtype(
        &self,
        sub: &Type,
        sup: &Type,
    ) -> bool {
        // 规则 1
        if matches!(sub, Type::Never | Type::Untyped) {
            return true;
        }
        if matches!(sup, Type::Any | Type::Void | Type::Untyped) {
            return true;
        }
        if sub == sup {
            return true;
        }

        // 规则 2：解开包装
        if Self::is_wrapper(sub) && !(matches!(sub, Type::SelfType) && self.self_type.is_none()) {
            return match self.unwrap_structural(sub) {
                Some(unwrapped) if unwrapped != *sub => self.is_subtype(&unwrapped, sup),
                _ => false,
            };
        }
        if Self::is_wrapper(sup) && !(matches!(sup, Type::SelfType) && self.self_type.is_none()) {
            return match self.unwrap_structural(sup) {
                Some(unwrapped) if unwrapped != *sup => self.is_subtype(sub, &unwrapped),
                _ => false,
            };
        }

        // 左边的交集先规范化：展开 `bool`、对并集分配、合并否定
        if let Type::Intersection(elements) = sub {
            let normalized = self.normalizer().intersection(elements.clone());
            if normalized != *sub {
                return match normalized {
                    Type::Intersection(_) => self.relate(&normalized, sup),
                    other => self.is_subtype(&other, sup),
                };
            }
        }
        self.relate(sub, sup)
    }

    /// 规则 3 到 6
    fn relate(
        &self,
        sub: &Type,
        sup: &Type,
    ) -> bool {
        if matches!(sub, Type::Never | Type::Untyped)
            || matches!(sup, Type::Any | Type::Void | Type::Untyped)
            || sub == sup
        {
            return true;
        }

        // 规则 3：左边的代数结构
        match sub {
            Type::Union(elements) => return elements.iter().all(|e| self.is_subtype(e, sup)),
            Type::Nilable(inner) => {
                return self.is_subtype(inner, sup) && self.is_subtype(&Type::Nil, sup);
            }
            Type::Not(inner) => return self.is_negation_subtype(sub, inner, sup),
            Type::Bool if Self::is_algebraic(sup) => {
                return self.is_subtype(&Type::True, sup) && self.is_subtype(&Type::False, sup);
            }
            _ => {}
        }

        // 规则 3：右边的代数结构
        match sup {
            Type::Union(elements) => return elements.iter().any(|e| self.is_subtype(sub, e)),
            Type::Nilable(inner) => {
                return self.is_subtype(sub, inner) || self.is_subtype(sub, &Type::Nil);
            }
            Type::Not(inner) => {
                if Self::is_algebraic(inner) {
                    let normalized = self.normalizer().not(inner);
                    if normalized != *sup {
                        return self.relate(sub, &normalized);
                    }
                }
                return !self.can_intersect(sub, inner);
            }
            _ => {}
        }

        // 规则 4
        if let Type::Intersection(elements) = sup {
            return elements.iter().all(|e| self.is_subtype(sub, e));
        }
        if let Type::Intersection(elements) = sub {
            return elements.iter().any(|e| self.is_subtype(e, sup));
        }

        // 右边的类型参数只接受其下界的子类型
        if let Type::TypeParameter(param) = sup {
            if !matches!(sub, Type::TypeParameter(_)) {
                return self.is_subtype(sub, &param.lower_bound);
            }
        }

        // 规则 5、6
        self.is_leaf_subtype(sub, sup)
    }

    /// 左边是否定 `~inner`：只能是另一个否定的子类型
    ///
    /// 例外是空的否定（`~Value`）和覆盖全部值的右边。
    fn is_negation_subtype(
        &self,
        sub: &Type,
        inner: &Type,
        sup: &Type,
    ) -> bool {
        if Self::is_algebraic(inner) {
            let normalized = self.normalizer().not(inner);
            if normalized != *sub {
                return self.is_subtype(&normalized, sup);
            }
        }
        if self.covers_values(inner) {
            return true;
        }
        if let Type::Not(other) = sup {
            return self.is_subtype(other, inner);
        }
        if self.covers_values(sup) {
            return true;
        }
        match sup {
            Type::Union(elements) => elements.iter().any(|e| self.is_subtype(sub, e)),
            Type::Nilable(inner) => {
                self.is_subtype(sub, inner) || self.is_subtype(sub, &Type::Nil)
            }
            Type::Intersection(elements) => elements.iter().all(|e| self.is_subtype(sub, e)),
            _ => false,
        }
    }

    /// 类型是否包含所有值：`Value` 以及结构上等价于它的接口
    pub fn covers_values(
        &self,
        ty: &Type,
    ) -> bool {
        let value = Type::Class(self.registry.builtins().value);
        self.is_subtype(&value, ty)
    }

    /// 共享 `self` 和进行中假设的规范化器
    fn normalizer(&self) -> Normalizer<'a> {
        Normalizer::with_checker(SubtypeChecker {
            registry: self.registry,
            self_type: self.self_type.clone(),
            assumptions: RefCell::new(self.assumptions.borrow().clone()),
        })
    }

    /// 两个类型是否可能有共同的值
    ///
    /// 用于交集化简（不相交时为 `never`）和否定类型的子类型判定。
    /// 无法证明不相交时保守地返回 `true`。
    pub fn can_intersect(
        &self,
        a: &Type,
        b: &Type,
    ) -> bool {
        if a.is_never() || b.is_never() {
            return false;
        }
        if matches!(a, Type::Any | Type::Untyped | Type::Void)
            || matches!(b, Type::Any | Type::Untyped | Type::Void)
        {
            return true;
        }
        if a == b {
            return true;
        }

        for (this, other, swapped) in [(a, b, false), (b, a, true)] {
            if Self::is_wrapper(this) {
                match self.unwrap_structural(this) {
                    Some(unwrapped) if unwrapped != *this => {
                        return if swapped {
                            self.can_intersect(other, &unwrapped)
                        } else {
                            self.can_intersect(&unwrapped, other)
                        };
                    }
                    Some(_) => {}
                    None => return true,
                }
            }
        }

        for (this, other) in [(a, b), (b, a)] {
            match this {
                Type::Union(elements) => return elements.iter().any(|e| self.can_intersect(e, other)),
                Type::Nilable(inner) => {
                    return self.can_intersect(inner, other) || self.can_intersect(&Type::Nil, other);
                }
                Type::Intersection(elements) => {
                    return elements.iter().all(|e| self.can_intersect(e, other));
                }
                Type::Not(inner) => return !self.is_subtype(other, inner),
                Type::Bool if !matches!(other, Type::Bool) => {
                    return self.can_intersect(&Type::True, other)
                        || self.can_intersect(&Type::False, other);
                }
                _ => {}
            }
        }

        if self.is_subtype(a, b) || self.is_subtype(b, a) {
            return true;
        }
        self.can_leaves_intersect(a, b)
    }

    fn can_leaves_intersect(
        &self,
        a: &Type,
        b: &Type,
    ) -> bool {
        for (this, other) in [(a, b), (b, a)] {
            match this {
                Type::TypeParameter(param) => return self.can_intersect(&param.upper_bound, other),
                Type::SelfType | Type::SingletonOf(_) | Type::InstanceOf(_) => return true,
                _ => {}
            }
        }
        for (this, other) in [(a, b), (b, a)] {
            if let Type::Callable(_) = this {
                if let Type::Callable(_) = other {
                    return true;
                }
                let closure = Type::Class(self.registry.builtins().closure);
                return self.can_intersect(&closure, other);
            }
        }
        for (this, other) in [(a, b), (b, a)] {
            if Self::is_marker(this) {
                // 字面量只可能属于非封闭的混入和接口
                return match self.namespace_kind(other) {
                    Some(NamespaceKind::Mixin | NamespaceKind::Interface) => {
                        match self.registry.backing_class(this) {
                            Some(class) => self.can_intersect(&class, other),
                            None => false,
                        }
                    }
                    _ => false,
                };
            }
        }

        let (Some(kind_a), Some(kind_b)) = (self.namespace_kind(a), self.namespace_kind(b)) else {
            return true;
        };
        if a.namespace_id() == b.namespace_id() {
            return true;
        }
        use NamespaceKind::*;
        match (kind_a, kind_b) {
            (Module, _) | (_, Module) => false,
            (Class, Class) | (SingletonClass, SingletonClass) | (Class, SingletonClass)
            | (SingletonClass, Class) => false,
            (Class, Mixin | Interface) => !self.is_namespace_sealed(a),
            (Mixin | Interface, Class) => !self.is_namespace_sealed(b),
            (Mixin | Interface, Mixin | Interface) => true,
            (SingletonClass, Mixin | Interface) | (Mixin | Interface, SingletonClass) => true,
        }
    }

    fn namespace_kind(
        &self,
        ty: &Type,
    ) -> Option<NamespaceKind> {
        ty.namespace_id()
            .map(|id| self.registry.namespace(id).kind)
    }

    fn is_namespace_sealed(
        &self,
        ty: &Type,
    ) -> bool {
        ty.namespace_id()
            .map(|id| self.registry.is_sealed(id))
            .unwrap_or(false)
    }

    fn is_algebraic(ty: &Type) -> bool {
        matches!(
            ty,
            Type::Union(_) | Type::Nilable(_) | Type::Not(_) | Type::Intersection(_)
        )
    }

    /// 字面量标记（`nil`、`true` 等）及字面量值
    fn is_marker(ty: &Type) -> bool {
        matches!(
            ty,
            Type::Nil | Type::Bool | Type::True | Type::False | Type::Literal(_)
        )
    }

    fn is_nominal(ty: &Type) -> bool {
        matches!(
            ty,
            Type::Class(_)
                | Type::Mixin(_)
                | Type::Interface(_)
                | Type::Module(_)
                | Type::SingletonClass(_)
                | Type::Generic(_)
        )
    }

    fn is_leaf_subtype(
        &self,
        sub: &Type,
        sup: &Type,
    ) -> bool {
        if let Type::Class(target) = sup {
            if *target == self.registry.builtins().value && !matches!(sub, Type::Any | Type::Void) {
                return true;
            }
        }
        // `Std::Nil` 等价于 `nil`：右边的标记在名义比较时拓宽为背后的类
        if Self::is_nominal(sub)
            && matches!(sup, Type::Nil | Type::Bool | Type::True | Type::False)
        {
            return match self.registry.backing_class(sup) {
                Some(class) => self.is_subtype(sub, &class),
                None => false,
            };
        }

        match sub {
            Type::Never | Type::Untyped => true,
            Type::Any | Type::Void | Type::SelfType => false,
            Type::True | Type::False if matches!(sup, Type::Bool) => true,
            Type::Nil | Type::Bool | Type::True | Type::False | Type::Literal(_) => {
                // 字面量只有在与名义类型比较时才拓宽
                if Self::is_nominal(sup) {
                    match self.registry.backing_class(sub) {
                        Some(class) => self.is_subtype(&class, sup),
                        None => false,
                    }
                } else {
                    false
                }
            }
            Type::Callable(callable) => match sup {
                Type::Callable(target) => self.is_callable_subtype(callable, target),
                _ if Self::is_nominal(sup) => {
                    let closure = Type::Class(self.registry.builtins().closure);
                    self.is_subtype(&closure, sup)
                }
                _ => false,
            },
            Type::Class(_)
            | Type::Mixin(_)
            | Type::Interface(_)
            | Type::Module(_)
            | Type::SingletonClass(_)
            | Type::Generic(_) => self.is_nominal_subtype(sub, sup),
            Type::TypeParameter(param) => match sup {
                Type::TypeParameter(other) if other.name == param.name && other.owner == param.owner => {
                    true
                }
                _ => self.is_subtype(&param.upper_bound, sup),
            },
            Type::SingletonOf(inner) => match sup {
                Type::SingletonOf(other) => self.is_subtype(inner, other),
                _ => false,
            },
            Type::InstanceOf(inner) => match sup {
                Type::InstanceOf(other) => self.is_subtype(inner, other),
                _ => false,
            },
            // 已在前面的规则中处理
            Type::Union(_)
            | Type::Intersection(_)
            | Type::Nilable(_)
            | Type::Not(_)
            | Type::Named(_) => false,
        }
    }

    /// 值层面的祖先：模块值额外继承 `Std::Module`
    fn value_ancestors(
        &self,
        ty: &Type,
    ) -> Vec<Type> {
        let mut ancestors = self.registry.ancestors(ty);
        if let Type::Module(_) = ty {
            let module = Type::Class(self.registry.builtins().module);
            for ancestor in self.registry.ancestors(&module) {
                if !ancestors.contains(&ancestor) {
                    ancestors.push(ancestor);
                }
            }
        }
        ancestors
    }

    fn is_nominal_subtype(
        &self,
        sub: &Type,
        sup: &Type,
    ) -> bool {
        let builtins = self.registry.builtins();
        match sup {
            Type::Class(target) if *target == builtins.value => true,
            Type::Class(target)
            | Type::Mixin(target)
            | Type::Module(target)
            | Type::SingletonClass(target) => self
                .value_ancestors(sub)
                .iter()
                .any(|ancestor| ancestor.namespace_id() == Some(*target)),
            Type::Interface(target) => {
                let explicit = self
                    .value_ancestors(sub)
                    .iter()
                    .any(|ancestor| ancestor.namespace_id() == Some(*target));
                explicit || self.implements_structurally(sub, sup)
            }
            Type::Generic(target) => {
                let ancestor = self
                    .value_ancestors(sub)
                    .into_iter()
                    .find(|ancestor| ancestor.namespace_id() == Some(target.namespace));
                match ancestor {
                    Some(Type::Generic(found)) => self.is_generic_args_subtype(&found, target),
                    Some(_) => false,
                    None => {
                        self.registry.namespace(target.namespace).kind == NamespaceKind::Interface
                            && self.implements_structurally(sub, sup)
                    }
                }
            }
            _ => false,
        }
    }

    /// 泛型实参按目标实参的型变比较
    fn is_generic_args_subtype(
        &self,
        sub: &Generic,
        sup: &Generic,
    ) -> bool {
        sup.args.iter().all(|(name, target)| {
            let Some(given) = sub.args.get(name) else {
                return false;
            };
            match target.variance {
                Variance::Invariant => {
                    self.is_subtype(&given.ty, &target.ty) && self.is_subtype(&target.ty, &given.ty)
                }
                Variance::Covariant => self.is_subtype(&given.ty, &target.ty),
                Variance::Contravariant => self.is_subtype(&target.ty, &given.ty),
                Variance::Bivariant => {
                    self.is_subtype(&given.ty, &target.ty) || self.is_subtype(&target.ty, &given.ty)
                }
            }
        })
    }

    /// 闭包值之间的子类型：参数逆变，返回值和抛出类型协变
    fn is_callable_subtype(
        &self,
        sub: &Callable,
        sup: &Callable,
    ) -> bool {
        if sub.required_count() > sup.params.len() {
            return false;
        }
        let params_ok = sub
            .params
            .iter()
            .zip(sup.params.iter())
            .all(|(own, target)| self.is_subtype(&target.ty, &own.ty));
        params_ok
            && self.is_subtype(&sub.return_type, &sup.return_type)
            && self.is_subtype(&sub.throw_type, &sup.throw_type)
    }

    /// 结构化接口一致性（共归纳）
    fn implements_structurally(
        &self,
        sub: &Type,
        iface: &Type,
    ) -> bool {
        let Some(iface_id) = iface.namespace_id() else {
            return false;
        };
        let key = (sub.clone(), iface_id);
        if self.assumptions.borrow().contains(&key) {
            return true;
        }
        self.assumptions.borrow_mut().push(key);
        let ok = self.interface_issues(sub, iface).is_empty();
        self.assumptions.borrow_mut().pop();
        ok
    }

    /// 接口（及其父接口）的全部方法，泛型接口的实参已代入
    pub fn interface_methods(
        &self,
        iface: &Type,
    ) -> Vec<(Type, Arc<Callable>)> {
        let mut methods = Vec::new();
        for ancestor in self.registry.ancestors(iface) {
            let Some(id) = ancestor.namespace_id() else {
                continue;
            };
            let bindings = match &ancestor {
                Type::Generic(generic) => bindings_of(generic),
                _ => Default::default(),
            };
            let substituter = Substituter::new(&bindings);
            for method in self.registry.namespace(id).methods.values() {
                if methods
                    .iter()
                    .any(|(_, m): &(Type, Arc<Callable>)| m.name == method.name)
                {
                    continue;
                }
                methods.push((
                    ancestor.clone(),
                    Arc::new(substituter.apply_callable(method)),
                ));
            }
        }
        methods
    }

    /// 列出 `sub` 不满足接口 `iface` 的每一个成员，一行一个
    pub fn interface_issues(
        &self,
        sub: &Type,
        iface: &Type,
    ) -> Vec<String> {
        let receiver = match sub {
            Type::TypeParameter(param) => param.upper_bound.clone(),
            other => self
                .registry
                .backing_class(other)
                .unwrap_or_else(|| other.clone()),
        };
        let checker = SubtypeChecker::new(self.registry).with_self(Some(sub.clone()));
        // 共享进行中的假设
        *checker.assumptions.borrow_mut() = self.assumptions.borrow().clone();

        let mut issues = Vec::new();
        for (owner, expected) in self.interface_methods(iface) {
            let owner_name = self.registry.inspect(&owner);
            let expected_sig = self.registry.inspect_signature(&expected);
            match self.registry.lookup_value_method(&receiver, &expected.name) {
                None => issues.push(format!(
                    "  - missing method `{}.{}` with signature: `{}`",
                    owner_name, expected.name, expected_sig
                )),
                Some((found, _)) => {
                    if !checker.is_method_compatible(&found, &expected) {
                        issues.push(format!(
                            "  - incorrect implementation of `{}.{}`\n      is:        `{}`\n      should be: `{}`",
                            owner_name,
                            expected.name,
                            self.registry.inspect_signature(&found),
                            expected_sig
                        ));
                    }
                }
            }
        }
        issues
    }
}
