//! 带类型语法树的组装
//!
//! 提升阶段把源文件拆成独立的检查任务，同时记下一份 [`Outline`]：
//! 每条语句是什么、对应哪个任务。任务全部完成后按 outline
//! 把各任务的产出放回原来的位置，得到与输入结构一致的带类型语法树。
//! 失败或被取消的任务对应的语句会被省略。

use crate::frontend::ast::{
    InstanceVarDecl, Modifiers, NamespaceDecl, NamespaceDeclKind, Stmt, StmtKind, TypeAliasDecl,
    TypeExpr, TypeParamDecl,
};
use crate::frontend::core::type_system::{ConstantDeclId, Type};
use crate::frontend::typecheck::context::DeclTable;
use crate::frontend::typecheck::tasks::TaskOutput;
use crate::util::span::Span;

/// 命名空间声明的头部（已解析）
#[derive(Debug, Clone)]
pub struct NamespaceHeader {
    pub kind: NamespaceDeclKind,
    pub name: String,
    pub type_params: Vec<TypeParamDecl<Type>>,
    pub parent: Option<TypeExpr<Type>>,
    pub modifiers: Modifiers,
}

/// outline 中的一条语句
#[derive(Debug, Clone)]
pub enum OutlineStmt {
    /// 表达式语句，取自所在语句块的脚本任务
    Expr,
    Namespace {
        header: NamespaceHeader,
        body: Outline,
    },
    Method {
        task: usize,
    },
    Macro {
        task: usize,
    },
    Constant(ConstantDeclId),
    TypeAlias(TypeAliasDecl<Type>),
    Include(Vec<TypeExpr<Type>>),
    Implement(Vec<TypeExpr<Type>>),
    InstanceVar(InstanceVarDecl<Type>),
    /// 声明出错，不出现在结果中
    Dropped,
}

#[derive(Debug, Clone)]
pub struct OutlineItem {
    pub span: Span,
    pub stmt: OutlineStmt,
}

/// 一个语句块的 outline
#[derive(Debug, Clone, Default)]
pub struct Outline {
    /// 该块中表达式语句所属的脚本任务
    pub script: Option<usize>,
    pub items: Vec<OutlineItem>,
}

/// 按 outline 组装带类型的语句块
///
/// `outputs[i]` 是第 i 个任务的产出，被取用后置为 `None`。
pub fn assemble(
    outline: Outline,
    outputs: &mut [Option<TaskOutput>],
    decls: &DeclTable,
) -> Vec<Stmt<Type>> {
    let mut script = match outline.script.and_then(|task| take(outputs, task)) {
        Some(TaskOutput::Script(stmts)) => Some(stmts.into_iter()),
        _ => None,
    };

    let mut out = Vec::with_capacity(outline.items.len());
    for item in outline.items {
        let kind = match item.stmt {
            OutlineStmt::Expr => {
                if let Some(stmt) = script.as_mut().and_then(|stmts| stmts.next()) {
                    out.push(stmt);
                }
                continue;
            }
            OutlineStmt::Namespace { header, body } => {
                let body = assemble(body, outputs, decls);
                Some(StmtKind::Namespace(NamespaceDecl {
                    kind: header.kind,
                    name: header.name,
                    type_params: header.type_params,
                    parent: header.parent,
                    modifiers: header.modifiers,
                    body,
                }))
            }
            OutlineStmt::Method { task } => match take(outputs, task) {
                Some(TaskOutput::Method(decl)) => Some(StmtKind::Method(decl)),
                _ => None,
            },
            OutlineStmt::Macro { task } => match take(outputs, task) {
                Some(TaskOutput::Macro(decl)) => Some(StmtKind::Macro(decl)),
                _ => None,
            },
            OutlineStmt::Constant(id) => decls
                .constant(id)
                .state
                .lock()
                .typed
                .take()
                .map(StmtKind::Constant),
            OutlineStmt::TypeAlias(decl) => Some(StmtKind::TypeAlias(decl)),
            OutlineStmt::Include(types) => Some(StmtKind::Include(types)),
            OutlineStmt::Implement(types) => Some(StmtKind::Implement(types)),
            OutlineStmt::InstanceVar(decl) => Some(StmtKind::InstanceVar(decl)),
            OutlineStmt::Dropped => None,
        };
        if let Some(kind) = kind {
            out.push(Stmt {
                kind,
                span: item.span,
            });
        }
    }
    out
}

fn take(
    outputs: &mut [Option<TaskOutput>],
    task: usize,
) -> Option<TaskOutput> {
    outputs.get_mut(task).and_then(Option::take)
}
