//! 类型检查器测试模块
//!
//! 这里的构造函数用来在测试中直接拼出语法树，省去外部解析器。

mod call;
mod decls;
mod driver;
mod generics;
mod narrowing;
mod normalize;
mod patterns;

use crate::frontend::ast::{
    Arguments, BinaryOp, Expr, ExprKind, MethodDecl, Modifiers, NamespaceDecl,
    NamespaceDeclKind, ParamDecl, ParamDeclKind, Pattern, PatternKind, Stmt, StmtKind, TypeExpr,
    TypeExprKind,
};
use crate::frontend::core::type_system::LiteralKind;
use crate::frontend::typecheck::{CheckOutcome, Checker};
use crate::util::config::CheckerConfig;
use crate::util::span::Span;

fn sp() -> Span {
    Span::dummy()
}

fn expr(kind: ExprKind<()>) -> Expr<()> {
    Expr::new(kind, sp())
}

fn int(value: i64) -> Expr<()> {
    expr(ExprKind::Literal {
        kind: LiteralKind::Int,
        value: value.to_string(),
    })
}

fn string(value: &str) -> Expr<()> {
    expr(ExprKind::Literal {
        kind: LiteralKind::String,
        value: value.to_string(),
    })
}

fn nil() -> Expr<()> {
    expr(ExprKind::Nil)
}

fn ident(name: &str) -> Expr<()> {
    expr(ExprKind::Ident(name.to_string()))
}

fn ty(name: &str) -> TypeExpr<()> {
    TypeExpr::new(TypeExprKind::Name(vec![name.to_string()]), sp())
}

fn nilable(inner: TypeExpr<()>) -> TypeExpr<()> {
    TypeExpr::new(TypeExprKind::Nilable(Box::new(inner)), sp())
}

fn nil_type() -> TypeExpr<()> {
    TypeExpr::new(TypeExprKind::Nil, sp())
}

/// `var name: ty = init`
fn var(
    name: &str,
    type_expr: Option<TypeExpr<()>>,
    init: Expr<()>,
) -> Stmt<()> {
    Stmt::expr(expr(ExprKind::Var {
        name: name.to_string(),
        type_expr,
        init: Some(Box::new(init)),
        single_assignment: false,
    }))
}

/// 没有接收者的调用：`name(args)`
fn call(
    method: &str,
    args: Vec<Expr<()>>,
) -> Expr<()> {
    expr(ExprKind::Call {
        receiver: None,
        method: method.to_string(),
        type_args: Vec::new(),
        args: Arguments::positional(args),
        nil_safe: false,
    })
}

fn send(
    receiver: Expr<()>,
    method: &str,
    args: Vec<Expr<()>>,
) -> Expr<()> {
    expr(ExprKind::Call {
        receiver: Some(Box::new(receiver)),
        method: method.to_string(),
        type_args: Vec::new(),
        args: Arguments::positional(args),
        nil_safe: false,
    })
}

fn binary(
    op: BinaryOp,
    left: Expr<()>,
    right: Expr<()>,
) -> Expr<()> {
    expr(ExprKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn is_a(
    value: Expr<()>,
    class: TypeExpr<()>,
) -> Expr<()> {
    expr(ExprKind::IsA {
        value: Box::new(value),
        class: Box::new(class),
        exact: false,
    })
}

fn if_else(
    condition: Expr<()>,
    then_body: Vec<Stmt<()>>,
    else_body: Option<Vec<Stmt<()>>>,
) -> Stmt<()> {
    Stmt::expr(expr(ExprKind::If {
        condition: Box::new(condition),
        then_body,
        else_body,
    }))
}

fn value_pattern(value: Expr<()>) -> Pattern<()> {
    Pattern::new(PatternKind::Value(value), sp())
}

fn param(
    name: &str,
    type_expr: TypeExpr<()>,
) -> ParamDecl<()> {
    ParamDecl {
        name: name.to_string(),
        type_expr: Some(type_expr),
        kind: ParamDeclKind::Normal,
        default: None,
        span: sp(),
        ty: (),
    }
}

fn method(
    name: &str,
    params: Vec<ParamDecl<()>>,
    return_type: Option<TypeExpr<()>>,
    body: Vec<Stmt<()>>,
) -> MethodDecl<()> {
    MethodDecl {
        name: name.to_string(),
        singleton: false,
        type_params: Vec::new(),
        params,
        return_type,
        throw_type: None,
        modifiers: Modifiers::default(),
        body,
    }
}

fn abstract_method(
    name: &str,
    params: Vec<ParamDecl<()>>,
    return_type: TypeExpr<()>,
) -> MethodDecl<()> {
    MethodDecl {
        modifiers: Modifiers {
            abstract_: true,
            ..Modifiers::default()
        },
        ..method(name, params, Some(return_type), Vec::new())
    }
}

fn def(decl: MethodDecl<()>) -> Stmt<()> {
    Stmt::new(StmtKind::Method(decl), sp())
}

fn namespace(
    kind: NamespaceDeclKind,
    name: &str,
    parent: Option<TypeExpr<()>>,
    modifiers: Modifiers,
    body: Vec<Stmt<()>>,
) -> Stmt<()> {
    Stmt::new(
        StmtKind::Namespace(NamespaceDecl {
            kind,
            name: name.to_string(),
            type_params: Vec::new(),
            parent,
            modifiers,
            body,
        }),
        sp(),
    )
}

fn class(
    name: &str,
    parent: Option<&str>,
    body: Vec<Stmt<()>>,
) -> Stmt<()> {
    namespace(
        NamespaceDeclKind::Class,
        name,
        parent.map(ty),
        Modifiers::default(),
        body,
    )
}

fn abstract_class(
    name: &str,
    body: Vec<Stmt<()>>,
) -> Stmt<()> {
    namespace(
        NamespaceDeclKind::Class,
        name,
        None,
        Modifiers {
            abstract_: true,
            ..Modifiers::default()
        },
        body,
    )
}

/// 单线程检查，诊断顺序与并发度无关，这里只是让失败更容易复现
fn check(stmts: Vec<Stmt<()>>) -> CheckOutcome {
    Checker::new(CheckerConfig::sequential()).check("test.lx", stmts)
}

fn messages(outcome: &CheckOutcome) -> Vec<String> {
    outcome
        .diagnostics
        .iter()
        .map(|d| d.message.clone())
        .collect()
}

fn codes(outcome: &CheckOutcome) -> Vec<&'static str> {
    outcome.diagnostics.iter().map(|d| d.code).collect()
}
