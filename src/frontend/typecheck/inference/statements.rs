//! 语句块与声明体的检查
//!
//! 语句块只允许表达式语句；声明在提升阶段已经处理，
//! 出现在块中（方法体、闭包体等）时报告位置错误。
//!
//! 声明体（常量初始值、方法体、宏体、脚本体）各自在一个新的
//! [`CheckContext`] 中检查，入口见本模块的自由函数。

use std::sync::Arc;

use crate::frontend::ast::{
    Block, ConstantDecl, MacroDecl, MethodDecl, ParamDecl, Stmt, StmtKind, TypeExpr,
    TypeParamDecl,
};
use crate::frontend::core::type_system::{
    Callable, NamespaceId, Parameter, ParameterKind, Type, TypeParameter,
};
use crate::frontend::typecheck::context::{CheckContext, CheckEnv, ConstantEntry, Local, Mode};
use crate::frontend::typecheck::errors::{InternalError, TypeError};
use crate::util::diagnostic::DiagnosticList;

impl CheckContext<'_> {
    /// 检查语句块，返回带类型的语句和块的值类型
    ///
    /// 块的值是最后一个表达式的值；任何语句发散时为 `never`，空块为 `nil`。
    pub fn check_block(
        &mut self,
        block: &[Stmt<()>],
    ) -> (Block<Type>, Type) {
        let mut typed = Vec::with_capacity(block.len());
        let mut result = Type::Nil;
        let mut diverges = false;
        for stmt in block {
            match &stmt.kind {
                StmtKind::Expr(expr) => {
                    let expr = self.check_expr(expr, None);
                    diverges |= expr.ty.is_never();
                    result = expr.ty.clone();
                    typed.push(Stmt::new(StmtKind::Expr(expr), stmt.span));
                }
                other => {
                    self.error(TypeError::Placement {
                        what: other.describe(),
                        span: stmt.span,
                    });
                }
            }
        }
        if diverges {
            result = Type::Never;
        }
        (typed, result)
    }

    /// 解析类型表达式但不报告错误（提升阶段已经报告过）
    pub fn resolve_quietly(
        &mut self,
        expr: &TypeExpr<()>,
    ) -> TypeExpr<Type> {
        let saved = std::mem::take(&mut self.diagnostics);
        let typed = self.resolve_type_expr(expr);
        self.diagnostics = saved;
        typed
    }

    fn typed_type_params(
        &mut self,
        decls: &[TypeParamDecl<()>],
    ) -> Vec<TypeParamDecl<Type>> {
        decls
            .iter()
            .map(|decl| TypeParamDecl {
                name: decl.name.clone(),
                variance: decl.variance,
                upper_bound: decl.upper_bound.as_ref().map(|b| self.resolve_quietly(b)),
                lower_bound: decl.lower_bound.as_ref().map(|b| self.resolve_quietly(b)),
                span: decl.span,
            })
            .collect()
    }

    /// 声明形参为局部变量并检查默认值
    fn declare_params(
        &mut self,
        decls: &[ParamDecl<()>],
        params: &[Parameter],
    ) -> Vec<ParamDecl<Type>> {
        let mut typed = Vec::with_capacity(decls.len());
        for (decl, param) in decls.iter().zip(params) {
            let type_expr = decl.type_expr.as_ref().map(|t| self.resolve_quietly(t));
            let default = decl.default.as_ref().map(|d| {
                let value = self.check_expr(d, Some(&param.ty));
                self.check_assignable(&value.ty, &param.ty, value.span);
                value
            });
            let local_type = self.param_local_type(param);
            self.declare_local(&param.name, Local::new(local_type, true, false));
            typed.push(ParamDecl {
                name: decl.name.clone(),
                type_expr,
                kind: decl.kind,
                default,
                span: decl.span,
                ty: param.ty.clone(),
            });
        }
        typed
    }

    /// rest 形参在方法体内是集合
    fn param_local_type(
        &self,
        param: &Parameter,
    ) -> Type {
        let builtins = self.registry().builtins();
        match param.kind {
            ParameterKind::PositionalRest => self
                .registry()
                .generic(builtins.array_list, vec![param.ty.clone()]),
            ParameterKind::NamedRest => self.registry().generic(
                builtins.hash_map,
                vec![Type::Class(builtins.symbol), param.ty.clone()],
            ),
            ParameterKind::Normal | ParameterKind::Default => param.ty.clone(),
        }
    }
}

/// 检查常量的初始值；声明了类型时按声明类型，否则保留字面量类型
///
/// 常量必须带着声明处的词法命名空间栈，否则无法解析其中的名字。
pub(crate) fn check_constant(
    env: &CheckEnv<'_>,
    entry: &ConstantEntry,
) -> Result<(ConstantDecl<Type>, Type, DiagnosticList), InternalError> {
    if entry.scopes.is_empty() {
        return Err(InternalError::new(
            format!("constant {}", entry.name),
            "constant has no lexical namespace",
            entry.span,
        ));
    }
    let mut ctx = CheckContext::new(env, Mode::Constant, entry.scopes.clone());
    let type_expr = entry
        .decl
        .type_expr
        .as_ref()
        .map(|t| ctx.resolve_type_expr(t));
    let declared = type_expr.as_ref().map(|t| t.ty.clone());
    let value = ctx.check_expr(&entry.decl.value, declared.as_ref());
    let ty = match declared {
        Some(declared) => {
            ctx.check_assignable(&value.ty, &declared, value.span);
            declared
        }
        None => value.ty.clone(),
    };
    let typed = ConstantDecl {
        name: entry.decl.name.clone(),
        type_expr,
        value,
    };
    Ok((typed, ty, ctx.diagnostics))
}

/// 方法体检查的输入
pub(crate) struct MethodBody<'d> {
    pub decl: &'d MethodDecl<()>,
    pub callable: &'d Callable,
    /// 方法所在的命名空间（`def self.foo` 时为单例类）
    pub owner: NamespaceId,
    pub namespaces: &'d [NamespaceId],
}

/// 检查方法体
pub(crate) fn check_method(
    env: &CheckEnv<'_>,
    body: MethodBody<'_>,
) -> (MethodDecl<Type>, DiagnosticList) {
    let registry = env.registry;
    let mut ctx = CheckContext::new(env, Mode::Method, body.namespaces.to_vec());
    ctx.method_scope = Some(body.owner);
    ctx.self_type = Some(registry.self_instance(body.owner));
    ctx.type_params = method_type_params(
        &registry.namespace(body.owner).type_params,
        &body.callable.type_params,
    );
    ctx.return_type = Some(body.callable.return_type.clone());
    ctx.throw_type = body.callable.throw_type.clone();

    let type_params = ctx.typed_type_params(&body.decl.type_params);
    let params = ctx.declare_params(&body.decl.params, &body.callable.params);
    let return_type = body
        .decl
        .return_type
        .as_ref()
        .map(|t| ctx.resolve_quietly(t));
    let throw_type = body
        .decl
        .throw_type
        .as_ref()
        .map(|t| ctx.resolve_quietly(t));

    let (stmts, body_type) = ctx.check_block(&body.decl.body);
    let expected = &body.callable.return_type;
    let checks_body = !body.callable.is_abstract() && !matches!(expected, Type::Void);
    if checks_body && !body_type.is_never() {
        let span = body.decl.body.last().map(|s| s.span).unwrap_or_default();
        ctx.check_assignable(&body_type, expected, span);
    }

    let typed = MethodDecl {
        name: body.decl.name.clone(),
        singleton: body.decl.singleton,
        type_params,
        params,
        return_type,
        throw_type,
        modifiers: body.decl.modifiers,
        body: stmts,
    };
    (typed, ctx.diagnostics)
}

/// 检查宏体；宏的形参默认是未类型化的语法节点
pub(crate) fn check_macro(
    env: &CheckEnv<'_>,
    decl: &MacroDecl<()>,
    params: &[Parameter],
    namespaces: &[NamespaceId],
) -> (MacroDecl<Type>, DiagnosticList) {
    let mut ctx = CheckContext::new(env, Mode::Macro, namespaces.to_vec());
    let return_type = decl.return_type.as_ref().map(|t| ctx.resolve_quietly(t));
    ctx.return_type = Some(return_type.as_ref().map_or(Type::Untyped, |t| t.ty.clone()));
    let params = ctx.declare_params(&decl.params, params);
    let (body, body_type) = ctx.check_block(&decl.body);
    if let Some(expected) = &return_type {
        if !body_type.is_never() && !matches!(expected.ty, Type::Void) {
            let span = decl.body.last().map_or(expected.span, |s| s.span);
            ctx.check_assignable(&body_type, &expected.ty, span);
        }
    }
    let typed = MacroDecl {
        name: decl.name.clone(),
        params,
        return_type,
        body,
    };
    (typed, ctx.diagnostics)
}

/// 检查脚本体或命名空间体中的表达式语句
///
/// `namespace` 为 `None` 时是顶层脚本。
pub(crate) fn check_script(
    env: &CheckEnv<'_>,
    namespace: Option<NamespaceId>,
    stmts: &[Stmt<()>],
    namespaces: &[NamespaceId],
) -> (Vec<Stmt<Type>>, DiagnosticList) {
    let registry = env.registry;
    let mode = match namespace {
        Some(_) => Mode::NamespaceBody,
        None => Mode::TopLevel,
    };
    let mut ctx = CheckContext::new(env, mode, namespaces.to_vec());
    if let Some(id) = namespace {
        ctx.self_type = Some(registry.value_type(id));
        ctx.method_scope = Some(id);
    }
    let (typed, _) = ctx.check_block(stmts);
    (typed, ctx.diagnostics)
}

/// 方法体中可见的类型参数：命名空间的在前，方法的在后（同名时方法的优先）
fn method_type_params(
    namespace: &[Arc<TypeParameter>],
    method: &[Arc<TypeParameter>],
) -> Vec<Arc<TypeParameter>> {
    namespace.iter().chain(method.iter()).cloned().collect()
}
