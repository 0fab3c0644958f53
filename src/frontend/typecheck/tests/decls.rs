//! 声明检查测试：抽象方法、覆写、继承、循环引用与宏展开

use std::sync::Arc;

use super::*;
use crate::frontend::ast::{ConstantDecl, InstanceVarDecl, MacroDecl, TypeAliasDecl};
use crate::frontend::typecheck::collaborators::{
    BoundArguments, MacroError, MacroEvaluator, MacroExpansion,
};

fn sealed() -> Modifiers {
    Modifiers {
        sealed: true,
        ..Modifiers::default()
    }
}

fn ivar(
    name: &str,
    type_expr: TypeExpr<()>,
) -> Stmt<()> {
    Stmt::new(
        StmtKind::InstanceVar(InstanceVarDecl {
            name: name.to_string(),
            type_expr,
        }),
        sp(),
    )
}

fn constant(
    name: &str,
    type_expr: Option<TypeExpr<()>>,
    value: Expr<()>,
) -> Stmt<()> {
    Stmt::new(
        StmtKind::Constant(ConstantDecl {
            name: name.to_string(),
            type_expr,
            value,
        }),
        sp(),
    )
}

fn alias(
    name: &str,
    target: TypeExpr<()>,
) -> Stmt<()> {
    Stmt::new(
        StmtKind::TypeAlias(TypeAliasDecl {
            name: name.to_string(),
            type_params: Vec::new(),
            target,
        }),
        sp(),
    )
}

fn new_instance(class: &str) -> Expr<()> {
    expr(ExprKind::New {
        class: Box::new(ty(class)),
        args: Arguments::default(),
    })
}

/// `def name(): Int = value`
fn returning(
    name: &str,
    value: i64,
) -> MethodDecl<()> {
    method(name, Vec::new(), Some(ty("Int")), vec![Stmt::expr(int(value))])
}

#[test]
fn test_missing_abstract_methods() {
    let outcome = check(vec![
        abstract_class(
            "Foo",
            vec![
                def(abstract_method("foo", vec![param("a", ty("Int"))], ty("String"))),
                def(abstract_method("bar", Vec::new(), ty("Int"))),
            ],
        ),
        class("Bar", Some("Foo"), vec![def(returning("bar", 1))]),
    ]);
    assert_eq!(codes(&outcome), vec!["E6001"]);
    let message = &messages(&outcome)[0];
    assert!(message.starts_with("missing abstract method implementations in `Bar`:"));
    assert!(message.contains("Foo#foo"));
    assert!(message.contains("def foo(a: Int): String"));
    assert!(!message.contains("Foo#bar"));
}

#[test]
fn test_abstract_method_in_concrete_class() {
    let outcome = check(vec![class(
        "Foo",
        None,
        vec![def(abstract_method("foo", Vec::new(), ty("Int")))],
    )]);
    assert!(codes(&outcome).contains(&"E8004"));
    assert!(messages(&outcome)
        .contains(&"cannot declare abstract method `foo` in non-abstract class `Foo`".to_string()));
}

#[test]
fn test_incompatible_override() {
    let outcome = check(vec![
        class(
            "Base",
            None,
            vec![def(method(
                "foo",
                vec![param("a", ty("Int"))],
                Some(ty("Int")),
                vec![Stmt::expr(int(1))],
            ))],
        ),
        class(
            "Derived",
            Some("Base"),
            vec![def(method(
                "foo",
                vec![param("a", ty("String"))],
                Some(ty("Int")),
                vec![Stmt::expr(int(2))],
            ))],
        ),
    ]);
    assert_eq!(codes(&outcome), vec!["E4004"]);
    let message = &messages(&outcome)[0];
    assert!(message.starts_with("method `foo` is not a valid override of `Base`"));
    assert!(message.contains("def foo(a: String): Int"));
    assert!(message.contains("def foo(a: Int): Int"));
}

#[test]
fn test_compatible_override() {
    // 返回类型协变
    let outcome = check(vec![
        class(
            "Base",
            None,
            vec![def(method(
                "foo",
                Vec::new(),
                Some(nilable(ty("Int"))),
                vec![Stmt::expr(nil())],
            ))],
        ),
        class("Derived", Some("Base"), vec![def(returning("foo", 1))]),
    ]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}

#[test]
fn test_sealed_method_cannot_be_overridden() {
    let sealed_foo = MethodDecl {
        modifiers: sealed(),
        ..returning("foo", 1)
    };
    let outcome = check(vec![
        class("Base", None, vec![def(sealed_foo)]),
        class("Derived", Some("Base"), vec![def(returning("foo", 2))]),
    ]);
    assert_eq!(codes(&outcome), vec!["E4001"]);
    assert_eq!(
        messages(&outcome),
        vec!["cannot override sealed method `foo`".to_string()]
    );
}

#[test]
fn test_sealed_class_cannot_be_inherited() {
    let outcome = check(vec![
        namespace(NamespaceDeclKind::Class, "Base", None, sealed(), Vec::new()),
        class("Derived", Some("Base"), Vec::new()),
    ]);
    assert_eq!(codes(&outcome), vec!["E4002"]);
    assert_eq!(
        messages(&outcome),
        vec!["cannot inherit from sealed class `Base`".to_string()]
    );
}

#[test]
fn test_circular_inheritance() {
    let outcome = check(vec![
        class("A", Some("B"), Vec::new()),
        class("B", Some("A"), Vec::new()),
    ]);
    assert!(codes(&outcome).contains(&"E5001"), "{:?}", messages(&outcome));
    assert!(messages(&outcome)
        .iter()
        .any(|m| m.starts_with("circular reference in class")));
}

#[test]
fn test_circular_type_alias() {
    let outcome = check(vec![alias("A", ty("B")), alias("B", ty("A"))]);
    assert!(codes(&outcome).contains(&"E5001"), "{:?}", messages(&outcome));
    assert!(messages(&outcome)
        .iter()
        .any(|m| m.starts_with("circular reference in type")));
}

#[test]
fn test_type_alias_resolves() {
    let outcome = check(vec![
        alias("MaybeInt", nilable(ty("Int"))),
        var("a", Some(ty("MaybeInt")), nil()),
    ]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}

#[test]
fn test_namespace_redeclared_as_other_kind() {
    let outcome = check(vec![
        class("X", None, Vec::new()),
        namespace(NamespaceDeclKind::Module, "X", None, Modifiers::default(), Vec::new()),
    ]);
    assert_eq!(codes(&outcome), vec!["E4006"]);
    assert_eq!(
        messages(&outcome),
        vec!["cannot redeclare `X` as a module".to_string()]
    );
}

#[test]
fn test_reopened_class_keeps_methods() {
    let outcome = check(vec![
        class("Foo", None, vec![def(returning("a", 1))]),
        class("Foo", None, vec![def(returning("b", 2))]),
        var("x", Some(ty("Int")), send(new_instance("Foo"), "a", Vec::new())),
        var("y", Some(ty("Int")), send(new_instance("Foo"), "b", Vec::new())),
    ]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}

#[test]
fn test_instance_variable_redeclared() {
    let outcome = check(vec![class(
        "Foo",
        None,
        vec![ivar("a", ty("Int")), ivar("a", ty("String"))],
    )]);
    assert_eq!(codes(&outcome), vec!["E4005"]);
    assert_eq!(
        messages(&outcome),
        vec![
            "cannot redeclare instance variable `@a` with a different type, is `String`, should be `Int`"
                .to_string()
        ]
    );
}

#[test]
fn test_instance_variable_in_interface() {
    let outcome = check(vec![namespace(
        NamespaceDeclKind::Interface,
        "Named",
        None,
        Modifiers::default(),
        vec![ivar("name", ty("String"))],
    )]);
    assert_eq!(codes(&outcome), vec!["E8005"]);
    assert_eq!(
        messages(&outcome),
        vec!["cannot declare instance variables in interface `Named`".to_string()]
    );
}

#[test]
fn test_superclass_mismatch_on_reopen() {
    let outcome = check(vec![
        class("Base", None, Vec::new()),
        class("Other", None, Vec::new()),
        class("Foo", Some("Base"), Vec::new()),
        class("Foo", Some("Other"), Vec::new()),
    ]);
    assert!(codes(&outcome).contains(&"E4007"), "{:?}", messages(&outcome));
}

#[test]
fn test_circular_constants() {
    let outcome = check(vec![
        constant("A", None, expr(ExprKind::Constant(vec!["B".to_string()]))),
        constant("B", None, expr(ExprKind::Constant(vec!["A".to_string()]))),
    ]);
    assert!(codes(&outcome).contains(&"E5001"), "{:?}", messages(&outcome));
    assert!(messages(&outcome)
        .iter()
        .any(|m| m.starts_with("circular reference in constant")));
}

#[test]
fn test_constant_type_is_checked() {
    let outcome = check(vec![constant("A", Some(ty("Int")), string("x"))]);
    assert_eq!(codes(&outcome), vec!["E2001"]);
    assert!(messages(&outcome)[0].starts_with("type `\"x\"` cannot be assigned to type `Int`"));
}

#[test]
fn test_constant_type_flows_into_uses() {
    let outcome = check(vec![
        constant("LIMIT", Some(ty("Int")), int(10)),
        var("a", Some(ty("Int")), expr(ExprKind::Constant(vec!["LIMIT".to_string()]))),
    ]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}

// ----------------------------------------------------------------------------
// 宏
// ----------------------------------------------------------------------------

fn double_macro() -> Stmt<()> {
    Stmt::new(
        StmtKind::Macro(MacroDecl {
            name: "double".to_string(),
            params: vec![ParamDecl {
                type_expr: None,
                ..param("value", ty("Int"))
            }],
            return_type: None,
            body: Vec::new(),
        }),
        sp(),
    )
}

fn macro_call(name: &str) -> Expr<()> {
    expr(ExprKind::MacroCall {
        name: name.to_string(),
        args: Arguments::positional(vec![int(21)]),
        expansion: None,
    })
}

/// 总是展开成 `42`
struct Answer;

impl MacroEvaluator for Answer {
    fn expand(
        &self,
        _decl: &MacroDecl<()>,
        args: &BoundArguments,
    ) -> Result<MacroExpansion, MacroError> {
        assert!(args.get("value").is_some());
        Ok(MacroExpansion { expr: int(42) })
    }
}

struct Failing;

impl MacroEvaluator for Failing {
    fn expand(
        &self,
        _decl: &MacroDecl<()>,
        _args: &BoundArguments,
    ) -> Result<MacroExpansion, MacroError> {
        Err(MacroError::new("boom"))
    }
}

fn check_with(
    evaluator: Arc<dyn MacroEvaluator>,
    stmts: Vec<Stmt<()>>,
) -> CheckOutcome {
    Checker::new(CheckerConfig::sequential())
        .with_macro_evaluator(evaluator)
        .check("test.lx", stmts)
}

#[test]
fn test_macro_expansion_is_checked() {
    let outcome = check_with(
        Arc::new(Answer),
        vec![double_macro(), var("a", Some(ty("Int")), macro_call("double"))],
    );
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}

#[test]
fn test_macro_expansion_type_mismatch() {
    let outcome = check_with(
        Arc::new(Answer),
        vec![double_macro(), var("a", Some(ty("String")), macro_call("double"))],
    );
    assert_eq!(codes(&outcome), vec!["E2001"]);
}

#[test]
fn test_macro_without_evaluator() {
    let outcome = check(vec![
        double_macro(),
        var("a", Some(ty("Int")), macro_call("double")),
    ]);
    assert_eq!(codes(&outcome), vec!["E9002"]);
    assert_eq!(
        messages(&outcome),
        vec!["macro `double!` cannot be expanded, no macro evaluator is available".to_string()]
    );
}

#[test]
fn test_undefined_macro() {
    let outcome = check_with(Arc::new(Answer), vec![Stmt::expr(macro_call("nope"))]);
    assert_eq!(codes(&outcome), vec!["E1006"]);
    assert_eq!(messages(&outcome), vec!["undefined macro `nope!`".to_string()]);
}

#[test]
fn test_failing_macro() {
    let outcome = check_with(
        Arc::new(Failing),
        vec![double_macro(), var("a", Some(ty("Int")), macro_call("double"))],
    );
    // 展开失败的位置视为 untyped，不再产生后续错误
    assert_eq!(codes(&outcome), vec!["E9001"]);
    assert_eq!(
        messages(&outcome),
        vec!["error while expanding macro `double!`: boom".to_string()]
    );
}

#[test]
fn test_declarations_inside_method_body() {
    let outcome = check(vec![def(method(
        "run",
        Vec::new(),
        None,
        vec![
            class("Inner", None, Vec::new()),
            def(method("helper", Vec::new(), None, Vec::new())),
            Stmt::expr(int(1)),
        ],
    ))]);
    assert_eq!(codes(&outcome), vec!["E8001", "E8001"]);
    assert_eq!(
        messages(&outcome),
        vec![
            "class definitions cannot appear in this context",
            "method definitions cannot appear in this context",
        ]
    );
}

#[test]
fn test_module_with_superclass() {
    let outcome = check(vec![namespace(
        NamespaceDeclKind::Module,
        "M",
        Some(ty("Object")),
        Modifiers::default(),
        Vec::new(),
    )]);
    assert_eq!(codes(&outcome), vec!["E8001"]);
    assert_eq!(
        messages(&outcome)[0],
        "superclass definitions cannot appear in this context"
    );
}
