//! 错误收集和报告
//!
//! 定义类型检查过程中的所有错误类型。
//!
//! - [`TypeError`]：面向用户的诊断，累积后继续检查
//! - [`InternalError`]：内部不变量被破坏，只中止当前检查任务，
//!   不进入诊断列表

use std::sync::Arc;

use thiserror::Error;

use crate::util::diagnostic::Diagnostic;
use crate::util::span::{Location, Span};

/// 类型错误
///
/// 类型在构造错误时已经渲染成字符串（渲染需要注册表）。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    // ------------------------------------------------------------------
    // 未定义引用
    // ------------------------------------------------------------------
    #[error("undefined local `{name}`")]
    UndefinedLocal { name: String, span: Span },

    #[error("undefined constant `{name}`")]
    UndefinedConstant { name: String, span: Span },

    #[error("undefined type `{name}`")]
    UndefinedType { name: String, span: Span },

    #[error("method `{method}` is not defined on type `{receiver}`")]
    UndefinedMethod {
        method: String,
        receiver: String,
        span: Span,
    },

    #[error("instance variable `@{name}` is not defined in `{owner}`")]
    UndefinedInstanceVar {
        name: String,
        owner: String,
        span: Span,
    },

    #[error("undefined macro `{name}!`")]
    UndefinedMacro { name: String, span: Span },

    #[error("cannot access uninitialised local `{name}`")]
    UninitializedLocal { name: String, span: Span },

    #[error("local value `{name}` cannot be reassigned")]
    ReassignedValue { name: String, span: Span },

    #[error("cannot redeclare local `{name}`")]
    RedeclaredLocal { name: String, span: Span },

    // ------------------------------------------------------------------
    // 可赋值性
    // ------------------------------------------------------------------
    #[error("type `{value}` cannot be assigned to type `{target}`{details}")]
    NotAssignable {
        value: String,
        target: String,
        /// 接口结构检查失败时逐行列出的缺失成员（含前导换行）
        details: String,
        span: Span,
    },

    #[error("cannot instantiate {reason} `{class}`")]
    CannotInstantiate {
        class: String,
        reason: &'static str,
        span: Span,
    },

    #[error("type `{ty}` does not satisfy the {which} bound `{bound}` of type parameter `{param}`")]
    BoundViolation {
        ty: String,
        bound: String,
        param: String,
        which: &'static str,
        span: Span,
    },

    #[error("unable to infer type parameters in call to `{method}`")]
    CannotInfer { method: String, span: Span },

    #[error("`{name}` requires {expected} type argument(s), got {given}")]
    TypeArgumentCount {
        name: String,
        expected: usize,
        given: usize,
        span: Span,
    },

    #[error("cannot call method `{method}` on a value of type `{receiver}`")]
    InvalidReceiver {
        method: String,
        receiver: String,
        span: Span,
    },

    #[error("`{name}` is not a {expected}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        span: Span,
    },

    #[error("thrown value of type `{ty}` must be caught or declared in the throw type")]
    UncaughtThrow { ty: String, span: Span },

    #[error("cannot infer the type of closure parameter `{name}`")]
    UntypedClosureParam { name: String, span: Span },

    // ------------------------------------------------------------------
    // 模式
    // ------------------------------------------------------------------
    #[error("type `{matched}` cannot ever match type `{pattern}`")]
    PatternMismatch {
        matched: String,
        pattern: String,
        span: Span,
    },

    #[error("unreachable case, type `{matched}` has already been fully matched")]
    UnreachableCase { matched: String, span: Span },

    // ------------------------------------------------------------------
    // 重声明与重写
    // ------------------------------------------------------------------
    #[error("cannot override sealed method `{method}`")]
    SealedOverride { method: String, span: Span },

    #[error("cannot inherit from sealed class `{class}`")]
    SealedParent { class: String, span: Span },

    #[error("{message}")]
    ModifierMismatch { message: String, span: Span },

    #[error("method `{method}` is not a valid override of `{parent}`\n  is:        `{is}`\n  should be: `{should}`")]
    IncompatibleOverride {
        method: String,
        parent: String,
        is: String,
        should: String,
        span: Span,
    },

    #[error("cannot redeclare instance variable `@{name}` with a different type, is `{is}`, should be `{should}`")]
    InstanceVarRedeclared {
        name: String,
        is: String,
        should: String,
        span: Span,
    },

    #[error("cannot redeclare `{name}` as a {kind}")]
    NamespaceRedeclared {
        name: String,
        kind: &'static str,
        span: Span,
    },

    #[error("superclass mismatch in `{class}`, got `{given}`, expected `{expected}`")]
    SuperclassMismatch {
        class: String,
        given: String,
        expected: String,
        span: Span,
    },

    // ------------------------------------------------------------------
    // 循环引用
    // ------------------------------------------------------------------
    #[error("circular reference in {kind} `{name}`")]
    CircularReference {
        kind: &'static str,
        name: String,
        span: Span,
    },

    // ------------------------------------------------------------------
    // 一致性
    // ------------------------------------------------------------------
    #[error("missing abstract method implementations in `{class}`:\n{details}")]
    MissingAbstractMethods {
        class: String,
        details: String,
        span: Span,
    },

    // ------------------------------------------------------------------
    // 实参绑定
    // ------------------------------------------------------------------
    #[error("argument `{param}` is missing in call to `{method}`")]
    MissingArgument {
        param: String,
        method: String,
        span: Span,
    },

    #[error("duplicated argument `{name}` in call to `{method}`")]
    DuplicatedArgument {
        name: String,
        method: String,
        span: Span,
    },

    #[error("nonexistent parameter `{name}` given in call to `{method}`")]
    NonexistentParameter {
        name: String,
        method: String,
        span: Span,
    },

    #[error("expected {expected} arguments in call to `{method}`, got {given}")]
    WrongArity {
        method: String,
        expected: String,
        given: usize,
        span: Span,
    },

    #[error("expected type `{expected}` for parameter `{param}` in call to `{method}`, got type `{given}`")]
    ArgumentType {
        param: String,
        method: String,
        expected: String,
        given: String,
        span: Span,
    },

    // ------------------------------------------------------------------
    // 上下文位置
    // ------------------------------------------------------------------
    #[error("{what} definitions cannot appear in this context")]
    Placement { what: &'static str, span: Span },

    #[error("`{keyword}` cannot be used outside of a loop")]
    OutsideLoop { keyword: &'static str, span: Span },

    #[error("`self` cannot be used in this context")]
    SelfOutsideMethod { span: Span },

    #[error("cannot declare abstract method `{method}` in non-abstract {kind} `{namespace}`")]
    AbstractInConcrete {
        method: String,
        kind: &'static str,
        namespace: String,
        span: Span,
    },

    #[error("cannot declare instance variables in {reason} `{namespace}`")]
    InstanceVarNotAllowed {
        namespace: String,
        reason: &'static str,
        span: Span,
    },

    // ------------------------------------------------------------------
    // 宏
    // ------------------------------------------------------------------
    #[error("error while expanding macro `{name}!`: {message}")]
    MacroFailed {
        name: String,
        message: String,
        span: Span,
    },

    #[error("macro `{name}!` cannot be expanded, no macro evaluator is available")]
    MacroUnavailable { name: String, span: Span },
}

impl TypeError {
    /// 获取错误的位置
    pub fn span(&self) -> Span {
        match self {
            TypeError::UndefinedLocal { span, .. }
            | TypeError::UndefinedConstant { span, .. }
            | TypeError::UndefinedType { span, .. }
            | TypeError::UndefinedMethod { span, .. }
            | TypeError::UndefinedInstanceVar { span, .. }
            | TypeError::UndefinedMacro { span, .. }
            | TypeError::UninitializedLocal { span, .. }
            | TypeError::ReassignedValue { span, .. }
            | TypeError::RedeclaredLocal { span, .. }
            | TypeError::NotAssignable { span, .. }
            | TypeError::CannotInstantiate { span, .. }
            | TypeError::BoundViolation { span, .. }
            | TypeError::CannotInfer { span, .. }
            | TypeError::TypeArgumentCount { span, .. }
            | TypeError::InvalidReceiver { span, .. }
            | TypeError::KindMismatch { span, .. }
            | TypeError::UncaughtThrow { span, .. }
            | TypeError::UntypedClosureParam { span, .. }
            | TypeError::PatternMismatch { span, .. }
            | TypeError::UnreachableCase { span, .. }
            | TypeError::SealedOverride { span, .. }
            | TypeError::SealedParent { span, .. }
            | TypeError::ModifierMismatch { span, .. }
            | TypeError::IncompatibleOverride { span, .. }
            | TypeError::InstanceVarRedeclared { span, .. }
            | TypeError::NamespaceRedeclared { span, .. }
            | TypeError::SuperclassMismatch { span, .. }
            | TypeError::CircularReference { span, .. }
            | TypeError::MissingAbstractMethods { span, .. }
            | TypeError::MissingArgument { span, .. }
            | TypeError::DuplicatedArgument { span, .. }
            | TypeError::NonexistentParameter { span, .. }
            | TypeError::WrongArity { span, .. }
            | TypeError::ArgumentType { span, .. }
            | TypeError::Placement { span, .. }
            | TypeError::OutsideLoop { span, .. }
            | TypeError::SelfOutsideMethod { span }
            | TypeError::AbstractInConcrete { span, .. }
            | TypeError::InstanceVarNotAllowed { span, .. }
            | TypeError::MacroFailed { span, .. }
            | TypeError::MacroUnavailable { span, .. } => *span,
        }
    }

    /// 稳定的错误码
    ///
    /// E1xxx 未定义引用，E2xxx 可赋值性，E3xxx 模式，E4xxx 重声明/重写，
    /// E5xxx 循环引用，E6xxx 一致性，E7xxx 实参绑定，E8xxx 上下文位置，E9xxx 宏。
    pub fn code(&self) -> &'static str {
        match self {
            TypeError::UndefinedLocal { .. } => "E1001",
            TypeError::UndefinedConstant { .. } => "E1002",
            TypeError::UndefinedType { .. } => "E1003",
            TypeError::UndefinedMethod { .. } => "E1004",
            TypeError::UndefinedInstanceVar { .. } => "E1005",
            TypeError::UndefinedMacro { .. } => "E1006",
            TypeError::UninitializedLocal { .. } => "E1007",
            TypeError::ReassignedValue { .. } => "E1008",
            TypeError::RedeclaredLocal { .. } => "E1009",
            TypeError::NotAssignable { .. } => "E2001",
            TypeError::CannotInstantiate { .. } => "E2002",
            TypeError::BoundViolation { .. } => "E2003",
            TypeError::CannotInfer { .. } => "E2004",
            TypeError::TypeArgumentCount { .. } => "E2005",
            TypeError::InvalidReceiver { .. } => "E2006",
            TypeError::KindMismatch { .. } => "E2007",
            TypeError::UncaughtThrow { .. } => "E2008",
            TypeError::UntypedClosureParam { .. } => "E2009",
            TypeError::PatternMismatch { .. } => "E3001",
            TypeError::UnreachableCase { .. } => "W3001",
            TypeError::SealedOverride { .. } => "E4001",
            TypeError::SealedParent { .. } => "E4002",
            TypeError::ModifierMismatch { .. } => "E4003",
            TypeError::IncompatibleOverride { .. } => "E4004",
            TypeError::InstanceVarRedeclared { .. } => "E4005",
            TypeError::NamespaceRedeclared { .. } => "E4006",
            TypeError::SuperclassMismatch { .. } => "E4007",
            TypeError::CircularReference { .. } => "E5001",
            TypeError::MissingAbstractMethods { .. } => "E6001",
            TypeError::MissingArgument { .. } => "E7001",
            TypeError::DuplicatedArgument { .. } => "E7002",
            TypeError::NonexistentParameter { .. } => "E7003",
            TypeError::WrongArity { .. } => "E7004",
            TypeError::ArgumentType { .. } => "E7005",
            TypeError::Placement { .. } => "E8001",
            TypeError::OutsideLoop { .. } => "E8002",
            TypeError::SelfOutsideMethod { .. } => "E8003",
            TypeError::AbstractInConcrete { .. } => "E8004",
            TypeError::InstanceVarNotAllowed { .. } => "E8005",
            TypeError::MacroFailed { .. } => "E9001",
            TypeError::MacroUnavailable { .. } => "E9002",
        }
    }

    /// 是否只是警告
    pub fn is_warning(&self) -> bool {
        matches!(self, TypeError::UnreachableCase { .. })
    }

    /// 转换为诊断
    pub fn into_diagnostic(
        self,
        file: &Arc<str>,
    ) -> Diagnostic {
        let location = Location::new(file.clone(), self.span());
        let code = self.code();
        if self.is_warning() {
            Diagnostic::warning(code, self.to_string(), location)
        } else {
            Diagnostic::failure(code, self.to_string(), location)
        }
    }

    /// 创建不可赋值错误
    pub fn not_assignable(
        value: String,
        target: String,
        span: Span,
    ) -> Self {
        TypeError::NotAssignable {
            value,
            target,
            details: String::new(),
            span,
        }
    }

    /// 创建循环引用错误
    pub fn circular(
        kind: &'static str,
        name: impl Into<String>,
        span: Span,
    ) -> Self {
        TypeError::CircularReference {
            kind,
            name: name.into(),
            span,
        }
    }
}

/// 内部不变量违反
///
/// 只中止产生它的检查任务，兄弟任务照常运行。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("internal error while checking {task}: {message}")]
pub struct InternalError {
    /// 任务描述（`method Foo#bar`、`constant A`）
    pub task: String,
    pub message: String,
    pub span: Span,
}

impl InternalError {
    pub fn new(
        task: impl Into<String>,
        message: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            task: task.into(),
            message: message.into(),
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::diagnostic::Severity;

    #[test]
    fn test_missing_argument_message() {
        let err = TypeError::MissingArgument {
            param: "c".to_string(),
            method: "baz".to_string(),
            span: Span::dummy(),
        };
        assert_eq!(err.to_string(), "argument `c` is missing in call to `baz`");
        assert_eq!(err.code(), "E7001");
    }

    #[test]
    fn test_unreachable_case_is_warning() {
        let file: Arc<str> = Arc::from("main.lx");
        let diagnostic = TypeError::UnreachableCase {
            matched: "Int".to_string(),
            span: Span::dummy(),
        }
        .into_diagnostic(&file);
        assert_eq!(diagnostic.severity, Severity::Warning);
        assert_eq!(diagnostic.location.file.as_ref(), "main.lx");
    }
}
