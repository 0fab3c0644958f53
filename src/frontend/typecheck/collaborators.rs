//! 外部协作者
//!
//! 检查器只通过这两个窄接口与外部组件交互：
//!
//! - [`MacroEvaluator`]：在提升阶段求值宏调用，返回展开后的语法树
//! - [`CompileHook`]：每个方法体或宏体检查完成后被调用（`compile` 开启时）

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

use crate::frontend::ast::{Expr, MacroDecl, Stmt};
use crate::frontend::core::type_system::Type;

/// 绑定到宏形参的实参（语法节点）
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Single(Expr<()>),
    Rest(Vec<Expr<()>>),
    NamedRest(IndexMap<String, Expr<()>>),
    /// 未提供的可选形参
    Undefined,
}

/// 宏调用的实参绑定，按形参声明顺序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArguments {
    pub values: IndexMap<String, BoundValue>,
}

impl BoundArguments {
    pub fn get(
        &self,
        name: &str,
    ) -> Option<&BoundValue> {
        self.values.get(name)
    }
}

/// 宏的展开结果
#[derive(Debug, Clone, PartialEq)]
pub struct MacroExpansion {
    pub expr: Expr<()>,
}

/// 宏求值失败
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct MacroError {
    pub message: String,
    /// 求值器的调用栈，附在诊断消息后
    pub stack: String,
}

impl MacroError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: String::new(),
        }
    }

    pub fn with_stack(
        mut self,
        stack: impl Into<String>,
    ) -> Self {
        self.stack = stack.into();
        self
    }

    /// 诊断中显示的完整消息
    pub fn describe(&self) -> String {
        if self.stack.is_empty() {
            self.message.clone()
        } else {
            format!("{}\n{}", self.message, self.stack)
        }
    }
}

/// 宏求值器
pub trait MacroEvaluator: Send + Sync {
    fn expand(
        &self,
        decl: &MacroDecl<()>,
        args: &BoundArguments,
    ) -> Result<MacroExpansion, MacroError>;
}

/// 编译单元的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Method,
    Macro,
}

impl fmt::Display for UnitKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            UnitKind::Method => write!(f, "method"),
            UnitKind::Macro => write!(f, "macro"),
        }
    }
}

/// 交给编译钩子的已检查单元
#[derive(Debug, Clone, Copy)]
pub struct CompiledUnit<'a> {
    pub kind: UnitKind,
    /// 全名（`Foo#bar`、`Foo.bar`、`my_macro!`）
    pub name: &'a str,
    pub body: &'a [Stmt<Type>],
}

/// 编译钩子：只通知，不影响检查结果
pub trait CompileHook: Send + Sync {
    fn compile(
        &self,
        unit: CompiledUnit<'_>,
    );
}
