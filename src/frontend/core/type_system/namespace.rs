//! 命名空间注册表
//!
//! 所有名义类型（类、混入、接口、模块及其单例类）和类型别名都存放在
//! [`TypeRegistry`] 的数组里，通过下标引用。
//! 注册表只在提升（hoisting）阶段被写入，检查阶段只读。

use std::sync::Arc;

use indexmap::IndexMap;

use super::substitute::{bindings_of, Substituter, TypeBindings};
use super::types::{
    Callable, Generic, LiteralKind, NamedTypeId, NamespaceId, Type, TypeArgument, TypeArguments,
    TypeParameter, Variance,
};

/// 命名空间种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceKind {
    Class,
    Mixin,
    Interface,
    Module,
    SingletonClass,
}

impl NamespaceKind {
    /// 诊断中使用的名称
    pub fn describe(self) -> &'static str {
        match self {
            NamespaceKind::Class => "class",
            NamespaceKind::Mixin => "mixin",
            NamespaceKind::Interface => "interface",
            NamespaceKind::Module => "module",
            NamespaceKind::SingletonClass => "singleton class",
        }
    }
}

/// 命名空间修饰
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NamespaceFlags {
    pub abstract_: bool,
    pub sealed: bool,
    pub primitive: bool,
}

/// 常量声明在 `DeclTable` 中的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstantDeclId(pub u32);

/// 常量表条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstantSlot {
    /// 类型已知（命名空间对象、内置常量）
    Value(Type),
    /// 由常量声明给出，类型在常量阶段确定
    Declared(ConstantDeclId),
}

/// 命名空间
#[derive(Debug, Clone)]
pub struct Namespace {
    /// 全名（`Std::Int`、`Foo::Bar`）
    pub name: String,
    pub kind: NamespaceKind,
    /// 父类（仅类和单例类），可以是泛型实例
    pub parent: Option<Type>,
    /// 按包含顺序排列的混入
    pub includes: Vec<Type>,
    /// 显式实现的接口（接口自身的父接口也放在这里）
    pub implements: Vec<Type>,
    pub methods: IndexMap<String, Arc<Callable>>,
    pub constants: IndexMap<String, ConstantSlot>,
    pub subtypes: IndexMap<String, Type>,
    pub instance_vars: IndexMap<String, Type>,
    pub type_params: Vec<Arc<TypeParameter>>,
    pub flags: NamespaceFlags,
    /// 单例类
    pub singleton: Option<NamespaceId>,
    /// 单例类所依附的命名空间
    pub attached: Option<NamespaceId>,
    /// 词法上的外层命名空间
    pub lexical_parent: Option<NamespaceId>,
}

impl Namespace {
    fn new(
        name: String,
        kind: NamespaceKind,
        lexical_parent: Option<NamespaceId>,
    ) -> Self {
        Self {
            name,
            kind,
            parent: None,
            includes: Vec::new(),
            implements: Vec::new(),
            methods: IndexMap::new(),
            constants: IndexMap::new(),
            subtypes: IndexMap::new(),
            instance_vars: IndexMap::new(),
            type_params: Vec::new(),
            flags: NamespaceFlags::default(),
            singleton: None,
            attached: None,
            lexical_parent,
        }
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    /// 名字中最后一段
    pub fn short_name(&self) -> &str {
        self.name.rsplit("::").next().unwrap_or(&self.name)
    }
}

/// 类型别名定义
#[derive(Debug, Clone)]
pub struct NamedTypeDef {
    /// 全名
    pub name: String,
    /// `None` 表示尚未定义（别名阶段之前）
    pub ty: Option<Type>,
    pub type_params: Vec<Arc<TypeParameter>>,
}

/// 内置命名空间下标
#[derive(Debug, Clone, Copy, Default)]
pub struct Builtins {
    pub value: NamespaceId,
    pub object: NamespaceId,
    pub nil: NamespaceId,
    pub bool_: NamespaceId,
    pub true_: NamespaceId,
    pub false_: NamespaceId,
    pub int: NamespaceId,
    pub int64: NamespaceId,
    pub int32: NamespaceId,
    pub int16: NamespaceId,
    pub int8: NamespaceId,
    pub uint64: NamespaceId,
    pub uint32: NamespaceId,
    pub uint16: NamespaceId,
    pub uint8: NamespaceId,
    pub float: NamespaceId,
    pub float64: NamespaceId,
    pub float32: NamespaceId,
    pub big_float: NamespaceId,
    pub string: NamespaceId,
    pub symbol: NamespaceId,
    pub char_: NamespaceId,
    pub error: NamespaceId,
    pub array_list: NamespaceId,
    pub hash_map: NamespaceId,
    pub class: NamespaceId,
    pub module: NamespaceId,
    pub closure: NamespaceId,
    pub inspectable: NamespaceId,
    pub kernel: NamespaceId,
}

/// 命名空间注册表
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    namespaces: Vec<Namespace>,
    named: Vec<NamedTypeDef>,
    root: NamespaceId,
    std: NamespaceId,
    pub(crate) builtins: Builtins,
}

impl TypeRegistry {
    /// 只含根命名空间的空注册表
    pub(crate) fn empty() -> Self {
        let root = Namespace::new("Root".to_string(), NamespaceKind::Module, None);
        Self {
            namespaces: vec![root],
            named: Vec::new(),
            root: NamespaceId(0),
            std: NamespaceId(0),
            builtins: Builtins::default(),
        }
    }

    /// 预置了 `Std` 的注册表（克隆自全局只读种子）
    pub fn with_std() -> Self {
        super::std_env::std_registry().clone()
    }

    pub(crate) fn set_std(
        &mut self,
        std: NamespaceId,
    ) {
        self.std = std;
    }

    pub fn root(&self) -> NamespaceId {
        self.root
    }

    pub fn std_module(&self) -> NamespaceId {
        self.std
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    pub fn namespace(
        &self,
        id: NamespaceId,
    ) -> &Namespace {
        &self.namespaces[id.index()]
    }

    pub fn get_namespace(
        &self,
        id: NamespaceId,
    ) -> Option<&Namespace> {
        self.namespaces.get(id.index())
    }

    pub fn namespace_mut(
        &mut self,
        id: NamespaceId,
    ) -> &mut Namespace {
        &mut self.namespaces[id.index()]
    }

    pub fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }

    /// 声明命名空间并在外层命名空间中登记类型和常量
    ///
    /// 同时创建单例类。
    pub fn declare_namespace(
        &mut self,
        kind: NamespaceKind,
        name: &str,
        lexical_parent: NamespaceId,
    ) -> NamespaceId {
        let full_name = self.qualified_name(lexical_parent, name);
        let id = NamespaceId(self.namespaces.len() as u32);
        self.namespaces
            .push(Namespace::new(full_name.clone(), kind, Some(lexical_parent)));

        let singleton = NamespaceId(self.namespaces.len() as u32);
        let mut singleton_ns = Namespace::new(
            format!("&{}", full_name),
            NamespaceKind::SingletonClass,
            Some(lexical_parent),
        );
        singleton_ns.attached = Some(id);
        self.namespaces.push(singleton_ns);
        self.namespace_mut(id).singleton = Some(singleton);

        let ty = self.namespace_type(id);
        let value = self.value_type(id);
        let parent = self.namespace_mut(lexical_parent);
        parent.subtypes.insert(name.to_string(), ty);
        parent
            .constants
            .insert(name.to_string(), ConstantSlot::Value(value));
        id
    }

    /// 声明在 `lexical_parent` 中的名字的全名
    pub fn qualified_name(
        &self,
        lexical_parent: NamespaceId,
        name: &str,
    ) -> String {
        if lexical_parent == self.root {
            name.to_string()
        } else {
            format!("{}::{}", self.namespace(lexical_parent).name, name)
        }
    }

    /// 根据命名空间的父类设置其单例类的父类
    ///
    /// `Foo < Bar` 时 `&Foo < &Bar`；没有父类的类以及混入、接口、模块的
    /// 单例类接到 `Std::Class` / `Std::Module`。
    pub fn link_singleton_parent(
        &mut self,
        id: NamespaceId,
    ) {
        let namespace = self.namespace(id);
        let Some(singleton) = namespace.singleton else {
            return;
        };
        let parent = match (namespace.kind, &namespace.parent) {
            (NamespaceKind::Class, Some(parent)) => parent
                .namespace_id()
                .and_then(|parent_id| self.namespace(parent_id).singleton)
                .map(Type::SingletonClass),
            (NamespaceKind::Class, None) => Some(Type::Class(self.builtins.class)),
            (NamespaceKind::SingletonClass, _) => None,
            _ => Some(Type::Class(self.builtins.module)),
        };
        self.namespace_mut(singleton).parent = parent;
    }

    /// 命名空间作为类型时的形式
    pub fn namespace_type(
        &self,
        id: NamespaceId,
    ) -> Type {
        match self.namespace(id).kind {
            NamespaceKind::Class => Type::Class(id),
            NamespaceKind::Mixin => Type::Mixin(id),
            NamespaceKind::Interface => Type::Interface(id),
            NamespaceKind::Module => Type::Module(id),
            NamespaceKind::SingletonClass => Type::SingletonClass(id),
        }
    }

    /// 命名空间作为值（常量）时的类型
    pub fn value_type(
        &self,
        id: NamespaceId,
    ) -> Type {
        let namespace = self.namespace(id);
        match (namespace.kind, namespace.singleton) {
            (NamespaceKind::Module, _) => Type::Module(id),
            (_, Some(singleton)) => Type::SingletonClass(singleton),
            (_, None) => Type::Class(self.builtins.class),
        }
    }

    /// 在命名空间中查找嵌套类型
    pub fn lookup_subtype(
        &self,
        namespace: NamespaceId,
        name: &str,
    ) -> Option<&Type> {
        self.namespace(namespace).subtypes.get(name)
    }

    pub fn lookup_constant(
        &self,
        namespace: NamespaceId,
        name: &str,
    ) -> Option<&ConstantSlot> {
        self.namespace(namespace).constants.get(name)
    }

    /// 按 `A::B::C` 路径从根查找命名空间
    pub fn lookup_path(
        &self,
        path: &[&str],
    ) -> Option<NamespaceId> {
        let mut current = self.root;
        for segment in path {
            current = self.lookup_subtype(current, segment)?.namespace_id()?;
        }
        Some(current)
    }

    /// `Std` 中的类型
    pub fn std_type(
        &self,
        name: &str,
    ) -> Option<Type> {
        self.lookup_subtype(self.std, name).cloned()
    }

    /// 声明类型别名（未定义）
    pub fn declare_named(
        &mut self,
        name: &str,
        lexical_parent: NamespaceId,
        type_params: Vec<Arc<TypeParameter>>,
    ) -> NamedTypeId {
        let full_name = self.qualified_name(lexical_parent, name);
        let id = NamedTypeId(self.named.len() as u32);
        self.named.push(NamedTypeDef {
            name: full_name,
            ty: None,
            type_params,
        });
        self.namespace_mut(lexical_parent)
            .subtypes
            .insert(name.to_string(), Type::Named(id));
        id
    }

    pub fn named(
        &self,
        id: NamedTypeId,
    ) -> &NamedTypeDef {
        &self.named[id.index()]
    }

    pub fn define_named(
        &mut self,
        id: NamedTypeId,
        ty: Type,
    ) {
        self.named[id.index()].ty = Some(ty);
    }

    /// 替换别名的类型参数（上下界在别名阶段才能解析）
    pub fn set_named_type_params(
        &mut self,
        id: NamedTypeId,
        type_params: Vec<Arc<TypeParameter>>,
    ) {
        self.named[id.index()].type_params = type_params;
    }

    pub fn named_count(&self) -> usize {
        self.named.len()
    }

    /// 解引用别名，直到得到非别名类型；未定义时返回 `None`
    ///
    /// 对自身循环的别名（别名阶段已报告并定义为 `untyped`）同样终止。
    pub fn resolve_named(
        &self,
        id: NamedTypeId,
    ) -> Option<&Type> {
        let mut current = id;
        for _ in 0..=self.named.len() {
            match self.named(current).ty.as_ref()? {
                Type::Named(next) => current = *next,
                other => return Some(other),
            }
        }
        None
    }

    pub fn is_named_defined(
        &self,
        id: NamedTypeId,
    ) -> bool {
        self.named(id).ty.is_some()
    }

    /// 构造泛型实例；型变取自命名空间的类型参数
    pub fn generic(
        &self,
        namespace: NamespaceId,
        args: Vec<Type>,
    ) -> Type {
        let params = &self.namespace(namespace).type_params;
        let mut arguments = TypeArguments::new();
        for (param, ty) in params.iter().zip(args) {
            arguments.insert(
                param.name.clone(),
                TypeArgument {
                    ty,
                    variance: param.variance,
                },
            );
        }
        Type::Generic(Arc::new(Generic {
            namespace,
            args: arguments,
        }))
    }

    /// 用类型参数自身作为实参的泛型实例（方法体中 `self` 的类型）
    pub fn self_instance(
        &self,
        namespace: NamespaceId,
    ) -> Type {
        let ns = self.namespace(namespace);
        if ns.type_params.is_empty() {
            return self.namespace_type(namespace);
        }
        let args = ns
            .type_params
            .iter()
            .map(|p| Type::TypeParameter(p.clone()))
            .collect();
        self.generic(namespace, args)
    }

    /// 字面量拓宽后的类
    pub fn literal_class(
        &self,
        kind: LiteralKind,
    ) -> NamespaceId {
        let b = &self.builtins;
        match kind {
            LiteralKind::Int => b.int,
            LiteralKind::Int64 => b.int64,
            LiteralKind::Int32 => b.int32,
            LiteralKind::Int16 => b.int16,
            LiteralKind::Int8 => b.int8,
            LiteralKind::UInt64 => b.uint64,
            LiteralKind::UInt32 => b.uint32,
            LiteralKind::UInt16 => b.uint16,
            LiteralKind::UInt8 => b.uint8,
            LiteralKind::Float => b.float,
            LiteralKind::Float64 => b.float64,
            LiteralKind::Float32 => b.float32,
            LiteralKind::BigFloat => b.big_float,
            LiteralKind::String => b.string,
            LiteralKind::Symbol => b.symbol,
            LiteralKind::Char => b.char_,
        }
    }

    /// 字面量标记对应的背后类；非字面量返回 `None`
    pub fn backing_class(
        &self,
        ty: &Type,
    ) -> Option<Type> {
        let b = &self.builtins;
        match ty {
            Type::Literal(literal) => Some(Type::Class(self.literal_class(literal.kind))),
            Type::Nil => Some(Type::Class(b.nil)),
            Type::Bool => Some(Type::Class(b.bool_)),
            Type::True => Some(Type::Class(b.true_)),
            Type::False => Some(Type::Class(b.false_)),
            Type::Callable(_) => Some(Type::Class(b.closure)),
            _ => None,
        }
    }

    /// 由类反推字面量标记（`Std::Nil` → `nil`）
    pub fn marker_of_class(
        &self,
        id: NamespaceId,
    ) -> Option<Type> {
        let b = &self.builtins;
        if id == b.nil {
            Some(Type::Nil)
        } else if id == b.bool_ {
            Some(Type::Bool)
        } else if id == b.true_ {
            Some(Type::True)
        } else if id == b.false_ {
            Some(Type::False)
        } else {
            None
        }
    }

    pub fn is_sealed(
        &self,
        id: NamespaceId,
    ) -> bool {
        self.namespace(id).flags.sealed
    }

    pub fn is_abstract(
        &self,
        id: NamespaceId,
    ) -> bool {
        self.namespace(id).flags.abstract_
    }

    /// 线性化的祖先序列
    ///
    /// 类：自身、混入（后包含的在前）、接口、父类的祖先。
    /// 单例类沿父单例类上溯，最终接到 `Std::Class`。
    /// 泛型祖先的实参会被代入。结果按命名空间去重，保留首次出现。
    pub fn ancestors(
        &self,
        ty: &Type,
    ) -> Vec<Type> {
        let mut out: Vec<Type> = Vec::new();
        self.collect_ancestors(ty, &mut out, 0);
        out
    }

    fn collect_ancestors(
        &self,
        ty: &Type,
        out: &mut Vec<Type>,
        depth: usize,
    ) {
        // 包含环在提升阶段已报告，这里只需保证终止
        if depth > self.namespaces.len() {
            return;
        }
        let (id, bindings) = match ty {
            Type::Generic(generic) => (generic.namespace, bindings_of(generic)),
            Type::Class(id)
            | Type::Mixin(id)
            | Type::Interface(id)
            | Type::Module(id)
            | Type::SingletonClass(id) => (*id, TypeBindings::new()),
            _ => return,
        };
        if out.iter().any(|seen| seen.namespace_id() == Some(id)) {
            return;
        }
        out.push(ty.clone());

        let substituter = Substituter::new(&bindings);
        let namespace = self.namespace(id);
        for mixin in namespace.includes.iter().rev() {
            self.collect_ancestors(&substituter.apply(mixin), out, depth + 1);
        }
        for iface in &namespace.implements {
            self.collect_ancestors(&substituter.apply(iface), out, depth + 1);
        }
        if let Some(parent) = &namespace.parent {
            self.collect_ancestors(&substituter.apply(parent), out, depth + 1);
        }
    }

    /// 在祖先链上查找方法，泛型祖先的实参会代入签名
    pub fn lookup_method(
        &self,
        ty: &Type,
        name: &str,
    ) -> Option<(Arc<Callable>, Type)> {
        for ancestor in self.ancestors(ty) {
            let Some(id) = ancestor.namespace_id() else {
                continue;
            };
            if let Some(method) = self.namespace(id).methods.get(name) {
                let method = match &ancestor {
                    Type::Generic(generic) => {
                        let bindings = bindings_of(generic);
                        Arc::new(Substituter::new(&bindings).apply_callable(method))
                    }
                    _ => method.clone(),
                };
                return Some((method, ancestor));
            }
        }
        None
    }

    /// 查找某个类型的值可以接收的方法
    ///
    /// 祖先链上找不到时，模块值回退到 `Std::Module`，混入和接口类型的值回退到 `Std::Value`。
    pub fn lookup_value_method(
        &self,
        ty: &Type,
        name: &str,
    ) -> Option<(Arc<Callable>, Type)> {
        if let Some(found) = self.lookup_method(ty, name) {
            return Some(found);
        }
        let fallback = match ty {
            Type::Module(_) => self.builtins.module,
            Type::Mixin(_) | Type::Interface(_) => self.builtins.value,
            Type::Generic(generic)
                if matches!(
                    self.namespace(generic.namespace).kind,
                    NamespaceKind::Interface | NamespaceKind::Mixin
                ) =>
            {
                self.builtins.value
            }
            _ => return None,
        };
        self.lookup_method(&Type::Class(fallback), name)
    }

    /// 在祖先链上查找实例变量
    pub fn lookup_instance_var(
        &self,
        ty: &Type,
        name: &str,
    ) -> Option<Type> {
        for ancestor in self.ancestors(ty) {
            let Some(id) = ancestor.namespace_id() else {
                continue;
            };
            if let Some(ivar) = self.namespace(id).instance_vars.get(name) {
                return Some(match &ancestor {
                    Type::Generic(generic) => {
                        let bindings = bindings_of(generic);
                        Substituter::new(&bindings).apply(ivar)
                    }
                    _ => ivar.clone(),
                });
            }
        }
        None
    }

    /// 在 `ty` 的祖先中寻找命名空间 `target` 的实例
    pub fn find_ancestor(
        &self,
        ty: &Type,
        target: NamespaceId,
    ) -> Option<Type> {
        self.ancestors(ty)
            .into_iter()
            .find(|ancestor| ancestor.namespace_id() == Some(target))
    }

    /// 类型参数的默认型变（无实参时使用）
    pub fn param_variance(
        &self,
        namespace: NamespaceId,
        name: &str,
    ) -> Variance {
        self.namespace(namespace)
            .type_params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.variance)
            .unwrap_or_default()
    }
}
