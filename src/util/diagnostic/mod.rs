//! 统一诊断系统
//!
//! # 模块结构
//!
//! - [`error`] - 诊断数据结构 (Diagnostic, Severity)
//! - [`collect`] - 诊断列表与并发收集器
//!
//! # 示例
//!
//! ```ignore
//! use leixing::util::diagnostic::DiagnosticRenderer;
//!
//! let renderer = DiagnosticRenderer::new();
//! println!("{}", renderer.render_all(outcome.diagnostics.iter()));
//! ```

pub mod collect;
pub mod error;

pub use collect::{DiagnosticList, DiagnosticSink};
pub use error::{Diagnostic, Severity};

use owo_colors::OwoColorize;

/// 渲染器配置
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// 是否启用颜色输出
    pub use_colors: bool,
    /// 是否显示错误码
    pub show_code: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            use_colors: false,
            show_code: true,
        }
    }
}

/// 诊断渲染器
#[derive(Debug, Clone, Default)]
pub struct DiagnosticRenderer {
    config: EmitterConfig,
}

impl DiagnosticRenderer {
    /// 创建新的渲染器
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用自定义配置创建渲染器
    pub fn with_config(config: EmitterConfig) -> Self {
        Self { config }
    }

    /// 渲染单个诊断信息
    ///
    /// 格式：`file:line:column: severity[code]: message`
    pub fn render(
        &self,
        diagnostic: &Diagnostic,
    ) -> String {
        let severity = self.render_severity(diagnostic.severity);
        let code = if self.config.show_code {
            format!("[{}]", diagnostic.code)
        } else {
            String::new()
        };
        format!(
            "{}: {}{}: {}",
            diagnostic.location, severity, code, diagnostic.message
        )
    }

    /// 渲染多个诊断信息
    pub fn render_all<'a>(
        &self,
        diagnostics: impl IntoIterator<Item = &'a Diagnostic>,
    ) -> String {
        let mut output = String::new();
        for diagnostic in diagnostics {
            output.push_str(&self.render(diagnostic));
            output.push('\n');
        }
        output
    }

    fn render_severity(
        &self,
        severity: Severity,
    ) -> String {
        if !self.config.use_colors {
            return severity.to_string();
        }
        match severity {
            Severity::Failure => severity.red().bold().to_string(),
            Severity::Warning => severity.yellow().bold().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::span::{Location, Position, Span};
    use std::sync::Arc;

    #[test]
    fn test_render_plain() {
        let diagnostic = Diagnostic::failure(
            "E1001",
            "undefined local `a`".to_string(),
            Location::new(
                Arc::from("main.lx"),
                Span::new(Position::new(2, 3), Position::new(2, 4)),
            ),
        );
        let rendered = DiagnosticRenderer::new().render(&diagnostic);
        assert_eq!(rendered, "main.lx:2:3: failure[E1001]: undefined local `a`");
    }

    #[test]
    fn test_render_without_code() {
        let diagnostic = Diagnostic::warning(
            "W3001",
            "unreachable case".to_string(),
            Location::new(Arc::from("m"), Span::new(Position::new(1, 1), Position::new(1, 2))),
        );
        let renderer = DiagnosticRenderer::with_config(EmitterConfig {
            use_colors: false,
            show_code: false,
        });
        assert_eq!(renderer.render(&diagnostic), "m:1:1: warning: unreachable case");
    }
}
