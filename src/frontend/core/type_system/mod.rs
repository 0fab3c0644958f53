//! 类型系统子模块
//!
//! 将类型系统拆分为多个子模块以提高可维护性：
//! - types: 类型定义（封闭的 `Type` 枚举及其组成部分）
//! - namespace: 命名空间注册表、祖先线性化、方法表
//! - substitute: 统一的类型替换算法
//! - display: 类型的文本表示
//! - std_env: 内置 `Std` 命名空间图

pub mod display;
pub mod namespace;
pub mod std_env;
pub mod substitute;
pub mod types;


// 重新导出主要类型
pub use display::TypeDisplay;
pub use namespace::{
    Builtins, ConstantDeclId, ConstantSlot, NamedTypeDef, Namespace, NamespaceFlags,
    NamespaceKind, TypeRegistry,
};
pub use substitute::{bindings_of, Substituter, TypeBindings};
pub use types::{
    Callable, Generic, Literal, LiteralKind, MethodFlags, NamedTypeId, NamespaceId, Parameter,
    ParameterKind, Type, TypeArgument, TypeArguments, TypeParameter, Variance,
};
