//! 类型推断
//!
//! - `expressions`: 表达式检查与调用
//! - `statements`: 语句块与声明体
//! - `narrowing`: 条件收窄
//! - `patterns`: 模式检查
//! - `generics`: 类型实参推断与代入

pub mod expressions;
pub mod generics;
pub mod narrowing;
pub mod patterns;
pub mod statements;
