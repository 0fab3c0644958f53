//! 类型关系
//!
//! 子类型判定、方法签名兼容性和类型规范化。
//! 这些算法只读取 [`TypeRegistry`](crate::frontend::core::type_system::TypeRegistry)，
//! 可以在多个检查任务间并发使用。

pub mod compatibility;
pub mod normalize;
pub mod subtyping;

pub use normalize::Normalizer;
pub use subtyping::SubtypeChecker;
