//! 类型定义
//!
//! `Type` 是一个封闭的枚举，所有关系算法（子类型、规范化、推断、收窄）
//! 都对它做穷尽匹配。类型值一经构造就不可变，通过 `Arc`/`Box` 结构共享。
//!
//! 命名空间（类、混入、接口、模块）不直接存放在类型中，
//! 而是通过 [`NamespaceId`] 指向 [`TypeRegistry`](super::TypeRegistry) 里的条目。

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// 命名空间在注册表中的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NamespaceId(pub u32);

impl NamespaceId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// 类型别名在注册表中的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamedTypeId(pub u32);

impl NamedTypeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// 型变
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Variance {
    #[default]
    Invariant,
    Covariant,
    Contravariant,
    Bivariant,
}

impl Variance {
    /// 逆转方向（参数位置上的型变）
    pub fn flip(self) -> Variance {
        match self {
            Variance::Covariant => Variance::Contravariant,
            Variance::Contravariant => Variance::Covariant,
            other => other,
        }
    }
}

impl fmt::Display for Variance {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Variance::Invariant => write!(f, "invariant"),
            Variance::Covariant => write!(f, "covariant"),
            Variance::Contravariant => write!(f, "contravariant"),
            Variance::Bivariant => write!(f, "bivariant"),
        }
    }
}

/// 字面量种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralKind {
    Int,
    Int64,
    Int32,
    Int16,
    Int8,
    UInt64,
    UInt32,
    UInt16,
    UInt8,
    Float,
    Float64,
    Float32,
    BigFloat,
    String,
    Symbol,
    Char,
}

impl LiteralKind {
    /// 字面量拓宽后对应的 `Std` 类名
    pub fn class_name(self) -> &'static str {
        match self {
            LiteralKind::Int => "Int",
            LiteralKind::Int64 => "Int64",
            LiteralKind::Int32 => "Int32",
            LiteralKind::Int16 => "Int16",
            LiteralKind::Int8 => "Int8",
            LiteralKind::UInt64 => "UInt64",
            LiteralKind::UInt32 => "UInt32",
            LiteralKind::UInt16 => "UInt16",
            LiteralKind::UInt8 => "UInt8",
            LiteralKind::Float => "Float",
            LiteralKind::Float64 => "Float64",
            LiteralKind::Float32 => "Float32",
            LiteralKind::BigFloat => "BigFloat",
            LiteralKind::String => "String",
            LiteralKind::Symbol => "Symbol",
            LiteralKind::Char => "Char",
        }
    }

    /// 字面量在源码中的后缀（`5i64`、`2.5f32`）
    pub(crate) fn suffix(self) -> &'static str {
        match self {
            LiteralKind::Int64 => "i64",
            LiteralKind::Int32 => "i32",
            LiteralKind::Int16 => "i16",
            LiteralKind::Int8 => "i8",
            LiteralKind::UInt64 => "u64",
            LiteralKind::UInt32 => "u32",
            LiteralKind::UInt16 => "u16",
            LiteralKind::UInt8 => "u8",
            LiteralKind::Float64 => "f64",
            LiteralKind::Float32 => "f32",
            LiteralKind::BigFloat => "bf",
            _ => "",
        }
    }

    pub const ALL: [LiteralKind; 16] = [
        LiteralKind::Int,
        LiteralKind::Int64,
        LiteralKind::Int32,
        LiteralKind::Int16,
        LiteralKind::Int8,
        LiteralKind::UInt64,
        LiteralKind::UInt32,
        LiteralKind::UInt16,
        LiteralKind::UInt8,
        LiteralKind::Float,
        LiteralKind::Float64,
        LiteralKind::Float32,
        LiteralKind::BigFloat,
        LiteralKind::String,
        LiteralKind::Symbol,
        LiteralKind::Char,
    ];
}

/// 字面量单例类型，携带精确的字面值
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    pub kind: LiteralKind,
    pub value: String,
}

impl Literal {
    pub fn new(
        kind: LiteralKind,
        value: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// 泛型实参
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeArgument {
    pub ty: Type,
    pub variance: Variance,
}

/// 有序的泛型实参表（参数名 → 实参），顺序即声明顺序
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TypeArguments {
    entries: Vec<(String, TypeArgument)>,
}

impl TypeArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        argument: TypeArgument,
    ) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = argument,
            None => self.entries.push((name, argument)),
        }
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&TypeArgument> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, argument)| argument)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeArgument)> {
        self.entries.iter().map(|(n, a)| (n.as_str(), a))
    }

    /// 对每个实参类型应用 `f`，保留名称与型变
    pub fn map_types(
        &self,
        mut f: impl FnMut(&Type) -> Type,
    ) -> TypeArguments {
        TypeArguments {
            entries: self
                .entries
                .iter()
                .map(|(name, argument)| {
                    (
                        name.clone(),
                        TypeArgument {
                            ty: f(&argument.ty),
                            variance: argument.variance,
                        },
                    )
                })
                .collect(),
        }
    }
}

/// 泛型实例：命名空间 + 实参表
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generic {
    pub namespace: NamespaceId,
    pub args: TypeArguments,
}

/// 类型参数
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeParameter {
    pub name: String,
    /// 所属声明的全名（`Std::ArrayList`、`Foo.bar`）
    pub owner: String,
    pub upper_bound: Type,
    pub lower_bound: Type,
    pub variance: Variance,
}

impl TypeParameter {
    /// 无界类型参数（上界 `any`，下界 `never`）
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        variance: Variance,
    ) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            upper_bound: Type::Any,
            lower_bound: Type::Never,
            variance,
        }
    }

    pub fn with_bounds(
        mut self,
        upper_bound: Type,
        lower_bound: Type,
    ) -> Self {
        self.upper_bound = upper_bound;
        self.lower_bound = lower_bound;
        self
    }
}

/// 形参种类
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    #[default]
    Normal,
    /// `*rest`
    PositionalRest,
    /// `**rest`
    NamedRest,
    /// 带默认值
    Default,
}

/// 形参
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
    pub kind: ParameterKind,
}

impl Parameter {
    pub fn new(
        name: impl Into<String>,
        ty: Type,
    ) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: ParameterKind::Normal,
        }
    }

    pub fn with_kind(
        mut self,
        kind: ParameterKind,
    ) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_required(&self) -> bool {
        self.kind == ParameterKind::Normal
    }

    /// 可以按位置绑定（普通参数或带默认值的参数）
    pub fn is_positional(&self) -> bool {
        matches!(self.kind, ParameterKind::Normal | ParameterKind::Default)
    }
}

/// 方法修饰
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MethodFlags {
    pub abstract_: bool,
    pub sealed: bool,
    pub primitive: bool,
}

/// 方法形状的类型；闭包是 `closure == true` 的 `Callable`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Callable {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: Type,
    pub throw_type: Type,
    pub type_params: Vec<Arc<TypeParameter>>,
    pub flags: MethodFlags,
    pub owner: Option<NamespaceId>,
    pub closure: bool,
}

impl Callable {
    /// 方法签名
    pub fn method(
        name: impl Into<String>,
        params: Vec<Parameter>,
        return_type: Type,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
            throw_type: Type::Never,
            type_params: Vec::new(),
            flags: MethodFlags::default(),
            owner: None,
            closure: false,
        }
    }

    /// 闭包签名
    pub fn closure(
        params: Vec<Parameter>,
        return_type: Type,
        throw_type: Type,
    ) -> Self {
        Self {
            name: "call".to_string(),
            params,
            return_type,
            throw_type,
            type_params: Vec::new(),
            flags: MethodFlags::default(),
            owner: None,
            closure: true,
        }
    }

    pub fn with_owner(
        mut self,
        owner: NamespaceId,
    ) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_throw(
        mut self,
        throw_type: Type,
    ) -> Self {
        self.throw_type = throw_type;
        self
    }

    pub fn with_type_params(
        mut self,
        type_params: Vec<Arc<TypeParameter>>,
    ) -> Self {
        self.type_params = type_params;
        self
    }

    pub fn with_flags(
        mut self,
        flags: MethodFlags,
    ) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_abstract(&self) -> bool {
        self.flags.abstract_
    }

    pub fn is_sealed(&self) -> bool {
        self.flags.sealed
    }

    /// 必填参数个数
    pub fn required_count(&self) -> usize {
        self.params.iter().filter(|p| p.is_required()).count()
    }

    /// 可按位置传入的参数个数（不含 rest）
    pub fn positional_count(&self) -> usize {
        self.params.iter().filter(|p| p.is_positional()).count()
    }

    pub fn positional_rest(&self) -> Option<(usize, &Parameter)> {
        self.params
            .iter()
            .enumerate()
            .find(|(_, p)| p.kind == ParameterKind::PositionalRest)
    }

    pub fn named_rest(&self) -> Option<&Parameter> {
        self.params
            .iter()
            .find(|p| p.kind == ParameterKind::NamedRest)
    }

    /// 位置 rest 参数之后的普通参数个数
    pub fn post_rest_count(&self) -> usize {
        match self.positional_rest() {
            Some((index, _)) => self.params[index + 1..]
                .iter()
                .filter(|p| p.is_positional())
                .count(),
            None => 0,
        }
    }

    pub fn param(
        &self,
        name: &str,
    ) -> Option<(usize, &Parameter)> {
        self.params.iter().enumerate().find(|(_, p)| p.name == name)
    }
}

/// 类型
///
/// 派生的全序（先按变体、再按内容）被规范化用作并集/交集元素的排序依据。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    /// 底类型
    Never,
    /// 顶类型
    Any,
    /// 没有值
    Void,
    /// 错误占位符，抑制级联诊断
    Untyped,
    /// 接收者占位符
    SelfType,
    Nil,
    Bool,
    True,
    False,
    Literal(Literal),
    Class(NamespaceId),
    Mixin(NamespaceId),
    Interface(NamespaceId),
    Module(NamespaceId),
    SingletonClass(NamespaceId),
    Generic(Arc<Generic>),
    TypeParameter(Arc<TypeParameter>),
    Union(Vec<Type>),
    Intersection(Vec<Type>),
    Nilable(Box<Type>),
    Not(Box<Type>),
    Named(NamedTypeId),
    Callable(Arc<Callable>),
    SingletonOf(Box<Type>),
    InstanceOf(Box<Type>),
}

impl Type {
    pub fn literal(
        kind: LiteralKind,
        value: impl Into<String>,
    ) -> Type {
        Type::Literal(Literal::new(kind, value))
    }

    pub fn int(value: i64) -> Type {
        Type::literal(LiteralKind::Int, value.to_string())
    }

    pub fn string(value: &str) -> Type {
        Type::literal(LiteralKind::String, value)
    }

    pub fn nilable(inner: Type) -> Type {
        Type::Nilable(Box::new(inner))
    }

    pub fn not(inner: Type) -> Type {
        Type::Not(Box::new(inner))
    }

    pub fn callable(callable: Callable) -> Type {
        Type::Callable(Arc::new(callable))
    }

    pub fn parameter(param: TypeParameter) -> Type {
        Type::TypeParameter(Arc::new(param))
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Type::Never)
    }

    pub fn is_untyped(&self) -> bool {
        matches!(self, Type::Untyped)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Type::Nil)
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Type::Literal(_) | Type::True | Type::False)
    }

    /// 名义命名空间类型（类、混入、接口、模块）
    pub fn namespace_id(&self) -> Option<NamespaceId> {
        match self {
            Type::Class(id)
            | Type::Mixin(id)
            | Type::Interface(id)
            | Type::Module(id)
            | Type::SingletonClass(id) => Some(*id),
            Type::Generic(generic) => Some(generic.namespace),
            _ => None,
        }
    }

    /// 是否（递归地）包含类型参数或 `self`
    pub fn contains_type_parameters(&self) -> bool {
        match self {
            Type::TypeParameter(_) | Type::SelfType => true,
            Type::Generic(generic) => generic
                .args
                .iter()
                .any(|(_, arg)| arg.ty.contains_type_parameters()),
            Type::Union(elements) | Type::Intersection(elements) => {
                elements.iter().any(Type::contains_type_parameters)
            }
            Type::Nilable(inner)
            | Type::Not(inner)
            | Type::SingletonOf(inner)
            | Type::InstanceOf(inner) => inner.contains_type_parameters(),
            Type::Callable(callable) => {
                callable
                    .params
                    .iter()
                    .any(|p| p.ty.contains_type_parameters())
                    || callable.return_type.contains_type_parameters()
                    || callable.throw_type.contains_type_parameters()
            }
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
            | Type::Named(_) => false,
        }
    }
}

impl From<Callable> for Type {
    fn from(callable: Callable) -> Self {
        Type::Callable(Arc::new(callable))
    }
}
