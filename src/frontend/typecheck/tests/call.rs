//! 方法调用与实参绑定测试

use super::*;
use crate::frontend::ast::NamedArgument;

/// `def baz(bar: String, c: Int)`
fn baz() -> Stmt<()> {
    def(method(
        "baz",
        vec![param("bar", ty("String")), param("c", ty("Int"))],
        None,
        Vec::new(),
    ))
}

fn named(
    name: &str,
    value: Expr<()>,
) -> NamedArgument<()> {
    NamedArgument {
        name: name.to_string(),
        value,
        span: sp(),
    }
}

#[test]
fn test_missing_argument() {
    let outcome = check(vec![baz(), Stmt::expr(call("baz", vec![string("foo")]))]);
    assert_eq!(
        messages(&outcome),
        vec!["argument `c` is missing in call to `baz`".to_string()]
    );
    assert_eq!(codes(&outcome), vec!["E7001"]);
}

#[test]
fn test_argument_type_mismatch() {
    let outcome = check(vec![baz(), Stmt::expr(call("baz", vec![int(1), int(2)]))]);
    assert_eq!(
        messages(&outcome),
        vec![
            "expected type `String` for parameter `bar` in call to `baz`, got type `1`".to_string()
        ]
    );
}

#[test]
fn test_too_many_arguments() {
    let outcome = check(vec![
        baz(),
        Stmt::expr(call("baz", vec![string("a"), int(1), int(2)])),
    ]);
    assert_eq!(codes(&outcome), vec!["E7004"]);
    assert_eq!(
        messages(&outcome)[0],
        "expected 2 arguments in call to `baz`, got 3"
    );
}

#[test]
fn test_named_arguments_in_any_order() {
    let call = expr(ExprKind::Call {
        receiver: None,
        method: "baz".to_string(),
        type_args: Vec::new(),
        args: Arguments {
            positional: Vec::new(),
            named: vec![named("c", int(1)), named("bar", string("x"))],
        },
        nil_safe: false,
    });
    let outcome = check(vec![baz(), Stmt::expr(call)]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}

#[test]
fn test_undefined_method() {
    let outcome = check(vec![
        var("s", Some(nilable(ty("String"))), string("x")),
        Stmt::expr(send(ident("s"), "length", Vec::new())),
    ]);
    assert_eq!(codes(&outcome), vec!["E1004"]);
    assert_eq!(
        messages(&outcome)[0],
        "method `length` is not defined on type `String?`"
    );
}

#[test]
fn test_nil_safe_call() {
    let length = expr(ExprKind::Call {
        receiver: Some(Box::new(ident("s"))),
        method: "length".to_string(),
        type_args: Vec::new(),
        args: Arguments::default(),
        nil_safe: true,
    });
    let outcome = check(vec![
        var("s", Some(nilable(ty("String"))), string("x")),
        var("n", Some(nilable(ty("Int"))), length),
    ]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}

#[test]
fn test_rest_arguments() {
    let outcome = check(vec![Stmt::expr(call(
        "println",
        vec![int(1), string("two"), nil()],
    ))]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}

#[test]
fn test_generic_method_infers_from_closure() {
    let list_of = |element: &str| {
        TypeExpr::new(
            TypeExprKind::Generic {
                name: vec!["ArrayList".to_string()],
                args: vec![ty(element)],
            },
            sp(),
        )
    };
    let closure = expr(ExprKind::Closure {
        params: vec![ParamDecl {
            type_expr: None,
            ..param("e", ty("Int"))
        }],
        return_type: None,
        throw_type: None,
        body: vec![Stmt::expr(send(ident("e"), "to_string", Vec::new()))],
    });
    let body = vec![var(
        "ys",
        Some(list_of("String")),
        send(ident("xs"), "map", vec![closure]),
    )];
    let outcome = check(vec![def(method(
        "stringify",
        vec![param("xs", list_of("Int"))],
        None,
        body,
    ))]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}

#[test]
fn test_return_type_is_checked() {
    let outcome = check(vec![def(method(
        "answer",
        Vec::new(),
        Some(ty("Int")),
        vec![Stmt::expr(string("forty-two"))],
    ))]);
    assert_eq!(codes(&outcome), vec!["E2001"]);
    assert!(messages(&outcome)[0].starts_with("type `\"forty-two\"` cannot be assigned to type `Int`"));
}
