//! 诊断数据结构
//!
//! - `Diagnostic` 中的 `message` 在构造时即已渲染完成
//! - 类型检查器只通过 `TypeError::into_diagnostic` 生成诊断，
//!   保证每条诊断都带有稳定的错误码

use crate::util::span::Location;

/// 诊断严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Failure,
}

impl Severity {
    /// 检查是否为错误级别
    pub fn is_failure(&self) -> bool {
        matches!(self, Severity::Failure)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Failure => write!(f, "failure"),
        }
    }
}

/// 诊断信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 严重级别
    pub severity: Severity,
    /// 错误码
    pub code: &'static str,
    /// 完整消息
    pub message: String,
    /// 位置信息
    pub location: Location,
}

impl Diagnostic {
    /// 创建错误诊断
    pub(crate) fn failure(
        code: &'static str,
        message: String,
        location: Location,
    ) -> Self {
        Self {
            severity: Severity::Failure,
            code,
            message,
            location,
        }
    }

    /// 创建警告诊断
    pub(crate) fn warning(
        code: &'static str,
        message: String,
        location: Location,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message,
            location,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.severity.is_failure()
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{}: {}[{}]: {}",
            self.location, self.severity, self.code, self.message
        )
    }
}
