//! 类型检查器模块
//!
//! 为基于类的渐进类型语言实现静态类型检查：
//! - 子类型判定与类型规范化（`checking`）
//! - 泛型实参推断、条件收窄和模式检查（`inference`）
//! - 方法解析与实参绑定（`methods`、`call`）
//! - 提升、常量、声明检查、并发的方法体检查与带类型语法树组装
//!
//! # 示例
//!
//! ```rust,no_run
//! use leixing::frontend::typecheck::Checker;
//! use leixing::util::config::CheckerConfig;
//!
//! let outcome = Checker::new(CheckerConfig::default()).check("main.lx", Vec::new());
//! assert!(outcome.is_ok());
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::frontend::ast::Stmt;
use crate::frontend::core::type_system::{ConstantDeclId, Type, TypeRegistry};
use crate::util::config::CheckerConfig;
use crate::util::diagnostic::{DiagnosticList, DiagnosticSink};

pub mod assemble;
pub mod call;
pub mod checking;
pub mod collaborators;
pub mod context;
pub mod decls;
pub mod errors;
pub mod hoist;
pub mod inference;
pub mod methods;
pub mod tasks;
pub mod type_expr;

#[cfg(test)]
mod tests;

pub use checking::{Normalizer, SubtypeChecker};
pub use collaborators::{
    BoundArguments, BoundValue, CompileHook, CompiledUnit, MacroError, MacroEvaluator,
    MacroExpansion, UnitKind,
};
pub use errors::{InternalError, TypeError};
pub use tasks::CancellationToken;

use context::CheckEnv;
use decls::DeclChecker;
use hoist::Hoister;
use tasks::{TaskOutput, TaskRunner};

/// 一次检查的结果
#[derive(Debug)]
pub struct CheckOutcome {
    /// 带类型的语法树；被取消时为 `None`
    pub typed: Option<Vec<Stmt<Type>>>,
    /// 按声明顺序排列的诊断
    pub diagnostics: DiagnosticList,
    /// 中止了某个任务的内部错误（不属于诊断）
    pub internal_errors: Vec<InternalError>,
    pub cancelled: bool,
    /// 检查结束时的命名空间图
    pub registry: TypeRegistry,
}

impl CheckOutcome {
    /// 没有错误级别的诊断，也没有内部错误
    pub fn is_ok(&self) -> bool {
        !self.diagnostics.has_failures() && self.internal_errors.is_empty() && !self.cancelled
    }
}

/// 类型检查器
pub struct Checker {
    config: CheckerConfig,
    evaluator: Option<Arc<dyn MacroEvaluator>>,
    hook: Option<Arc<dyn CompileHook>>,
    cancel: CancellationToken,
}

impl Checker {
    pub fn new(config: CheckerConfig) -> Self {
        Self {
            config,
            evaluator: None,
            hook: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_macro_evaluator(
        mut self,
        evaluator: Arc<dyn MacroEvaluator>,
    ) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_compile_hook(
        mut self,
        hook: Arc<dyn CompileHook>,
    ) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_cancellation(
        mut self,
        cancel: CancellationToken,
    ) -> Self {
        self.cancel = cancel;
        self
    }

    /// 按配置的日志级别安装全局日志（宿主没有自己的订阅者时使用）
    pub fn with_logging(self) -> Self {
        if self.config.init_logging() {
            tracing::debug!(level = ?self.config.log_level, "logging initialised");
        }
        self
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// 检查一个编译单元
    pub fn check(
        &self,
        name: &str,
        stmts: Vec<Stmt<()>>,
    ) -> CheckOutcome {
        let file: Arc<str> = Arc::from(name);
        tracing::debug!(file = %file, stmts = stmts.len(), "type checking");

        let hoisted = Hoister::new(TypeRegistry::with_std(), file.clone())
            .with_macro_evaluator(self.evaluator.as_deref())
            .hoist(&stmts);
        drop(stmts);

        let sink = DiagnosticSink::new();
        sink.append(0, hoisted.diagnostics);
        let registry = hoisted.registry;
        let decls = hoisted.decls;
        if self.cancel.is_cancelled() {
            return self.cancelled(sink, Vec::new(), registry);
        }

        let env = CheckEnv {
            registry: &registry,
            decls: &decls,
            file: file.clone(),
        };

        // 常量严格按声明顺序检查；被其他常量提前检查过的直接取结果
        let constants = decls.constants.len();
        let mut internal_errors = Vec::new();
        for (index, entry) in decls.constants.iter().enumerate() {
            let id = ConstantDeclId(index as u32);
            if let Err(error) = decls.constant_type(&env, id, entry.span) {
                let mut list = DiagnosticList::new();
                list.push(error.into_diagnostic(&file));
                sink.append(1 + index, list);
            }
            let mut state = entry.state.lock();
            sink.append(1 + index, std::mem::take(&mut state.diagnostics));
            internal_errors.extend(state.internal.take());
        }
        if self.cancel.is_cancelled() {
            return self.cancelled(sink, internal_errors, registry);
        }

        let decl_index = 1 + constants;
        sink.append(
            decl_index,
            DeclChecker::new(&registry, file.clone()).check(&hoisted.sites),
        );
        if self.cancel.is_cancelled() {
            return self.cancelled(sink, internal_errors, registry);
        }

        let results = TaskRunner::new(&self.config, &self.cancel)
            .with_hook(self.hook.as_deref())
            .run(&env, &hoisted.tasks, &sink, decl_index + 1);

        let mut outputs: Vec<Option<TaskOutput>> = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Some(Ok(output)) => outputs.push(Some(output)),
                Some(Err(error)) => {
                    internal_errors.push(error);
                    outputs.push(None);
                }
                None => outputs.push(None),
            }
        }
        if self.cancel.is_cancelled() {
            return self.cancelled(sink, internal_errors, registry);
        }

        let typed = assemble::assemble(hoisted.outline, &mut outputs, &decls);
        let diagnostics = self.finish(sink);
        tracing::debug!(
            file = %file,
            diagnostics = diagnostics.len(),
            internal_errors = internal_errors.len(),
            "type checking finished"
        );
        CheckOutcome {
            typed: Some(typed),
            diagnostics,
            internal_errors,
            cancelled: false,
            registry,
        }
    }

    fn cancelled(
        &self,
        sink: DiagnosticSink,
        internal_errors: Vec<InternalError>,
        registry: TypeRegistry,
    ) -> CheckOutcome {
        tracing::warn!("type checking cancelled");
        CheckOutcome {
            typed: None,
            diagnostics: self.finish(sink),
            internal_errors,
            cancelled: true,
            registry,
        }
    }

    fn finish(
        &self,
        sink: DiagnosticSink,
    ) -> DiagnosticList {
        let mut diagnostics = sink.drain_ordered();
        if !self.config.warnings {
            diagnostics.retain_failures();
        }
        diagnostics
    }
}

impl Default for Checker {
    fn default() -> Self {
        Self::new(CheckerConfig::default())
    }
}

/// 使用默认配置检查一个编译单元
pub fn check_source(
    name: &str,
    stmts: Vec<Stmt<()>>,
) -> CheckOutcome {
    Checker::default().check(name, stmts)
}

/// 检查以 JSON 给出的语法树（外部解析器的输出）
pub fn check_source_json(
    name: &str,
    json: &str,
) -> Result<CheckOutcome> {
    let stmts: Vec<Stmt<()>> = serde_json::from_str(json)
        .with_context(|| format!("invalid syntax tree for `{}`", name))?;
    Ok(check_source(name, stmts))
}
