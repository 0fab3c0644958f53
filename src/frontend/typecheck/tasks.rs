//! 延迟检查任务
//!
//! 提升阶段为每个方法体、宏体和脚本体登记一个 [`Task`]，
//! 同时记下声明处的词法命名空间栈快照。任务之间互不依赖，
//! 在有界的 `rayon` 线程池中并发执行；每个任务拥有独立的
//! [`CheckContext`](super::context::CheckContext) 和诊断列表，
//! 只读共享 [`CheckEnv`]。
//!
//! 诊断按任务登记顺序合并，因此输出与并发度无关。

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::frontend::ast::{MacroDecl, MethodDecl, Stmt};
use crate::frontend::core::type_system::{Callable, NamespaceId, Parameter, Type};
use crate::frontend::typecheck::collaborators::{CompileHook, CompiledUnit, UnitKind};
use crate::frontend::typecheck::context::CheckEnv;
use crate::frontend::typecheck::errors::InternalError;
use crate::frontend::typecheck::inference::statements::{
    check_macro, check_method, check_script, MethodBody,
};
use crate::util::config::CheckerConfig;
use crate::util::diagnostic::{DiagnosticList, DiagnosticSink};
use crate::util::span::Span;

/// 取消标志，在阶段边界和每个任务开始前检查
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 任务种类
#[derive(Debug, Clone)]
pub enum TaskKind {
    /// 顶层脚本或命名空间体中的表达式语句
    Script {
        namespace: Option<NamespaceId>,
        stmts: Vec<Stmt<()>>,
    },
    Method {
        owner: NamespaceId,
        decl: MethodDecl<()>,
        callable: Arc<Callable>,
    },
    Macro {
        decl: MacroDecl<()>,
        params: Vec<Parameter>,
    },
}

/// 延迟检查任务
#[derive(Debug, Clone)]
pub struct Task {
    /// 诊断和日志中使用的名字
    pub name: String,
    /// 声明处的词法命名空间栈
    pub namespaces: Vec<NamespaceId>,
    pub span: Span,
    pub kind: TaskKind,
}

impl Task {
    fn describe(&self) -> String {
        let kind = match self.kind {
            TaskKind::Script { .. } => "script",
            TaskKind::Method { .. } => "method",
            TaskKind::Macro { .. } => "macro",
        };
        format!("{} {}", kind, self.name)
    }
}

/// 任务产出的带类型节点
#[derive(Debug, Clone)]
pub enum TaskOutput {
    Script(Vec<Stmt<Type>>),
    Method(MethodDecl<Type>),
    Macro(MacroDecl<Type>),
}

/// 单个任务的结果；`None` 表示任务因取消没有运行
pub type TaskResult = Option<Result<TaskOutput, InternalError>>;

/// 任务执行器
pub struct TaskRunner<'r> {
    config: &'r CheckerConfig,
    hook: Option<&'r dyn CompileHook>,
    cancel: &'r CancellationToken,
}

impl<'r> TaskRunner<'r> {
    pub fn new(
        config: &'r CheckerConfig,
        cancel: &'r CancellationToken,
    ) -> Self {
        Self {
            config,
            hook: None,
            cancel,
        }
    }

    pub fn with_hook(
        mut self,
        hook: Option<&'r dyn CompileHook>,
    ) -> Self {
        self.hook = hook;
        self
    }

    /// 执行所有任务，结果与 `tasks` 一一对应
    ///
    /// 第 i 个任务的诊断以序号 `base + i` 写入 `sink`。
    pub fn run(
        &self,
        env: &CheckEnv<'_>,
        tasks: &[Task],
        sink: &DiagnosticSink,
        base: usize,
    ) -> Vec<TaskResult> {
        let workers = self.config.effective_workers(tasks.len());
        tracing::debug!(tasks = tasks.len(), workers, "running check tasks");
        if workers <= 1 {
            return self.run_sequential(env, tasks, sink, base);
        }
        let pool = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool,
            Err(error) => {
                tracing::warn!(%error, "failed to build worker pool, checking sequentially");
                return self.run_sequential(env, tasks, sink, base);
            }
        };
        pool.install(|| {
            tasks
                .par_iter()
                .enumerate()
                .map(|(index, task)| self.run_one(env, task, sink, base + index))
                .collect()
        })
    }

    fn run_sequential(
        &self,
        env: &CheckEnv<'_>,
        tasks: &[Task],
        sink: &DiagnosticSink,
        base: usize,
    ) -> Vec<TaskResult> {
        tasks
            .iter()
            .enumerate()
            .map(|(index, task)| self.run_one(env, task, sink, base + index))
            .collect()
    }

    fn run_one(
        &self,
        env: &CheckEnv<'_>,
        task: &Task,
        sink: &DiagnosticSink,
        index: usize,
    ) -> TaskResult {
        if self.cancel.is_cancelled() {
            return None;
        }
        tracing::debug!(task = %task.name, "checking");
        let outcome = catch_unwind(AssertUnwindSafe(|| execute(env, task)));
        match outcome {
            Ok((output, diagnostics)) => {
                sink.append(index, diagnostics);
                if self.config.compile {
                    self.compile(task, &output);
                }
                Some(Ok(output))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let error = InternalError::new(task.describe(), message, task.span);
                tracing::error!(task = %task.name, "{}", error);
                Some(Err(error))
            }
        }
    }

    fn compile(
        &self,
        task: &Task,
        output: &TaskOutput,
    ) {
        let Some(hook) = self.hook else {
            return;
        };
        let (kind, body) = match output {
            TaskOutput::Method(decl) => (UnitKind::Method, decl.body.as_slice()),
            TaskOutput::Macro(decl) => (UnitKind::Macro, decl.body.as_slice()),
            TaskOutput::Script(_) => return,
        };
        hook.compile(CompiledUnit {
            kind,
            name: &task.name,
            body,
        });
    }
}

fn execute(
    env: &CheckEnv<'_>,
    task: &Task,
) -> (TaskOutput, DiagnosticList) {
    match &task.kind {
        TaskKind::Script { namespace, stmts } => {
            let (typed, diagnostics) = check_script(env, *namespace, stmts, &task.namespaces);
            (TaskOutput::Script(typed), diagnostics)
        }
        TaskKind::Method {
            owner,
            decl,
            callable,
        } => {
            let body = MethodBody {
                decl,
                callable,
                owner: *owner,
                namespaces: &task.namespaces,
            };
            let (typed, diagnostics) = check_method(env, body);
            (TaskOutput::Method(typed), diagnostics)
        }
        TaskKind::Macro { decl, params } => {
            let (typed, diagnostics) = check_macro(env, decl, params, &task.namespaces);
            (TaskOutput::Macro(typed), diagnostics)
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
