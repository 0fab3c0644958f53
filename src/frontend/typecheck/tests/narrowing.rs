//! 条件收窄测试
//!
//! 收窄后的类型通过赋值给声明了类型的新变量来观察：
//! 收窄成功时没有诊断，失败时报告不可赋值。

use super::*;
use crate::frontend::ast::{BinaryOp, ExprKind, LogicalOp, UnaryOp};

fn maybe_int(name: &str) -> Stmt<()> {
    var(name, Some(nilable(ty("Int"))), int(5))
}

#[test]
fn test_is_a_narrows_both_branches() {
    let outcome = check(vec![
        maybe_int("a"),
        if_else(
            is_a(ident("a"), ty("Int")),
            vec![var("b", Some(ty("Int")), ident("a"))],
            Some(vec![var("c", Some(nil_type()), ident("a"))]),
        ),
    ]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
    assert!(outcome.is_ok());
}

#[test]
fn test_else_branch_excludes_tested_class() {
    let outcome = check(vec![
        maybe_int("a"),
        if_else(
            is_a(ident("a"), ty("Int")),
            Vec::new(),
            Some(vec![var("c", Some(ty("Int")), ident("a"))]),
        ),
    ]);
    assert_eq!(codes(&outcome), vec!["E2001"]);
    assert!(messages(&outcome)[0].starts_with("type `nil` cannot be assigned to type `Int`"));
}

#[test]
fn test_narrowing_ends_with_branch() {
    let outcome = check(vec![
        maybe_int("a"),
        if_else(
            ident("a"),
            vec![var("b", Some(ty("Int")), ident("a"))],
            None,
        ),
        var("c", Some(ty("Int")), ident("a")),
    ]);
    // 只有 `if` 之后的赋值失败
    assert_eq!(codes(&outcome), vec!["E2001"]);
    assert!(messages(&outcome)[0].starts_with("type `Int?` cannot be assigned to type `Int`"));
}

#[test]
fn test_nil_comparison() {
    let outcome = check(vec![
        maybe_int("a"),
        if_else(
            binary(BinaryOp::NotEqual, ident("a"), nil()),
            vec![var("b", Some(ty("Int")), ident("a"))],
            Some(vec![var("c", Some(nil_type()), ident("a"))]),
        ),
    ]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}

#[test]
fn test_negated_condition() {
    let not_a = expr(ExprKind::Unary {
        op: UnaryOp::Not,
        operand: Box::new(ident("a")),
    });
    let outcome = check(vec![
        maybe_int("a"),
        if_else(
            not_a,
            Vec::new(),
            Some(vec![var("b", Some(ty("Int")), ident("a"))]),
        ),
    ]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}

#[test]
fn test_conjunction_narrows_both_operands() {
    let both = expr(ExprKind::Logical {
        op: LogicalOp::And,
        left: Box::new(ident("a")),
        right: Box::new(ident("b")),
    });
    let outcome = check(vec![
        maybe_int("a"),
        var("b", Some(nilable(ty("String"))), string("x")),
        if_else(
            both,
            vec![
                var("c", Some(ty("Int")), ident("a")),
                var("d", Some(ty("String")), ident("b")),
            ],
            None,
        ),
    ]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}

#[test]
fn test_early_return_narrows_rest_of_block() {
    let body = vec![
        if_else(
            binary(BinaryOp::Equal, ident("a"), nil()),
            vec![Stmt::expr(expr(ExprKind::Return(Some(Box::new(int(0))))))],
            None,
        ),
        Stmt::expr(ident("a")),
    ];
    let outcome = check(vec![def(method(
        "unwrap",
        vec![param("a", nilable(ty("Int")))],
        Some(ty("Int")),
        body,
    ))]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}

fn assign(
    name: &str,
    value: Expr<()>,
) -> Stmt<()> {
    Stmt::expr(expr(ExprKind::Assign {
        name: name.to_string(),
        value: Box::new(value),
    }))
}

fn while_loop(
    condition: Expr<()>,
    body: Vec<Stmt<()>>,
) -> Stmt<()> {
    Stmt::expr(expr(ExprKind::While {
        condition: Box::new(condition),
        body,
    }))
}

/// 在带 `flag: Bool` 参数的方法中检查
fn check_with_flag(body: Vec<Stmt<()>>) -> CheckOutcome {
    check(vec![def(method(
        "run",
        vec![param("flag", ty("Bool"))],
        None,
        body,
    ))])
}

#[test]
fn test_assignment_narrows_following_code() {
    let outcome = check_with_flag(vec![
        maybe_int("a"),
        assign("a", nil()),
        var("c", Some(nil_type()), ident("a")),
        if_else(
            ident("flag"),
            vec![
                assign("a", int(5)),
                var("d", Some(ty("Int")), ident("a")),
            ],
            None,
        ),
    ]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}

#[test]
fn test_assignment_in_branch_invalidates_outer_narrowing() {
    let outcome = check_with_flag(vec![
        maybe_int("a"),
        assign("a", nil()),
        if_else(ident("flag"), vec![assign("a", int(5))], None),
        var("c", Some(nil_type()), ident("a")),
    ]);
    assert_eq!(codes(&outcome), vec!["E2001"]);
    assert!(
        messages(&outcome)[0].starts_with("type `Int?` cannot be assigned to type `nil`"),
        "{:?}",
        messages(&outcome)
    );
}

#[test]
fn test_assignment_in_loop_body_is_seen_on_next_iteration() {
    let outcome = check_with_flag(vec![
        maybe_int("a"),
        assign("a", nil()),
        while_loop(
            ident("flag"),
            vec![
                var("c", Some(nil_type()), ident("a")),
                assign("a", int(5)),
            ],
        ),
    ]);
    assert_eq!(codes(&outcome), vec!["E2001"]);
    assert!(
        messages(&outcome)[0].starts_with("type `Int?` cannot be assigned to type `nil`"),
        "{:?}",
        messages(&outcome)
    );
}

#[test]
fn test_loop_without_assignment_keeps_narrowing() {
    let outcome = check_with_flag(vec![
        maybe_int("a"),
        assign("a", nil()),
        while_loop(
            ident("flag"),
            vec![var("c", Some(nil_type()), ident("a"))],
        ),
    ]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}
