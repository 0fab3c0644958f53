//! 流敏感的类型收窄
//!
//! 条件表达式为真（或为假）时，其中出现的局部变量可以收窄：
//!
//! - `a`：真值分支去掉 `nil` 和 `false`，假值分支只保留它们
//! - `!a`、`a && b`、`a || b`：按布尔代数递归
//! - `a <: Foo`：真值分支取交集，假值分支取差集
//!   （`<<:` 的假值分支只在 `Foo` 封闭时收窄）
//! - `a == nil`、`a != nil`
//!
//! 收窄写入当前作用域的影子变量，离开作用域时失效。
//! 赋值同时让外层作用域的收窄失效；循环开始前，循环体中赋值的变量退回声明类型。

use indexmap::IndexSet;

use crate::frontend::ast::{visit, BinaryOp, Expr, ExprKind, LogicalOp, Stmt, UnaryOp};
use crate::frontend::core::type_system::Type;
use crate::frontend::typecheck::context::CheckContext;

impl CheckContext<'_> {
    /// 假定 `condition` 的真值为 `truthy`，收窄其中的局部变量
    pub fn narrow(
        &mut self,
        condition: &Expr<Type>,
        truthy: bool,
    ) {
        match &condition.kind {
            ExprKind::Ident(name) => {
                let Some(local) = self.lookup_local(name) else {
                    return;
                };
                let narrowed = if truthy {
                    self.to_non_falsy(&local.ty)
                } else {
                    self.to_falsy(&local.ty)
                };
                self.narrow_local(name, narrowed);
            }
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.narrow(operand, !truthy),
            ExprKind::Logical { op, left, right } => match (op, truthy) {
                (LogicalOp::And, true) | (LogicalOp::Or, false) => {
                    self.narrow(left, truthy);
                    self.narrow(right, truthy);
                }
                (LogicalOp::And, false) => {
                    if self.always_truthy(&left.ty) {
                        self.narrow(right, false);
                    } else if self.always_truthy(&right.ty) {
                        self.narrow(left, false);
                    }
                }
                (LogicalOp::Or, true) => {
                    if self.always_falsy(&left.ty) {
                        self.narrow(right, true);
                    } else if self.always_falsy(&right.ty) {
                        self.narrow(left, true);
                    }
                }
            },
            ExprKind::IsA {
                value,
                class,
                exact,
            } => {
                let ExprKind::Ident(name) = &value.kind else {
                    return;
                };
                let Some(local) = self.lookup_local(name) else {
                    return;
                };
                let narrowed = if truthy {
                    self.normalizer()
                        .intersection(vec![local.ty.clone(), class.ty.clone()])
                } else {
                    let sealed = class
                        .ty
                        .namespace_id()
                        .is_some_and(|id| self.registry().is_sealed(id));
                    if *exact && !sealed {
                        return;
                    }
                    self.normalizer().difference(&local.ty, &class.ty)
                };
                self.narrow_local(name, narrowed);
            }
            ExprKind::Binary { op, left, right }
                if matches!(op, BinaryOp::Equal | BinaryOp::NotEqual) =>
            {
                let name = match (&left.kind, &right.kind) {
                    (ExprKind::Ident(name), ExprKind::Nil) | (ExprKind::Nil, ExprKind::Ident(name)) => {
                        name
                    }
                    _ => return,
                };
                let Some(local) = self.lookup_local(name) else {
                    return;
                };
                let is_nil = truthy == (*op == BinaryOp::Equal);
                let narrowed = if is_nil {
                    self.normalizer()
                        .intersection(vec![local.ty.clone(), Type::Nil])
                } else {
                    self.normalizer().difference(&local.ty, &Type::Nil)
                };
                self.narrow_local(name, narrowed);
            }
            _ => {}
        }
    }

    /// 去掉假值（`nil`、`false`）后的类型
    pub fn to_non_falsy(
        &self,
        ty: &Type,
    ) -> Type {
        self.normalizer().difference(ty, &falsy())
    }

    /// 只保留假值的类型
    pub fn to_falsy(
        &self,
        ty: &Type,
    ) -> Type {
        self.normalizer().intersection(vec![ty.clone(), falsy()])
    }

    pub fn always_truthy(
        &self,
        ty: &Type,
    ) -> bool {
        !ty.is_untyped() && self.to_falsy(ty).is_never()
    }

    pub fn always_falsy(
        &self,
        ty: &Type,
    ) -> bool {
        !ty.is_untyped() && self.to_non_falsy(ty).is_never()
    }
}

fn falsy() -> Type {
    Type::Union(vec![Type::Nil, Type::False])
}

/// 语句块中（包括嵌套的分支、循环和闭包）被赋值的局部变量
pub fn assigned_locals(stmts: &[Stmt<()>]) -> IndexSet<String> {
    let mut names = IndexSet::new();
    visit::block(stmts, &mut |expr| collect_assigned(expr, &mut names));
    names
}

pub fn collect_assigned(
    expr: &Expr<()>,
    names: &mut IndexSet<String>,
) {
    if let ExprKind::Assign { name, .. } = &expr.kind {
        names.insert(name.clone());
    }
    visit::for_each_child(expr, &mut |child| collect_assigned(child, names));
}
