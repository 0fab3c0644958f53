//! 模式检查测试

use super::*;
use crate::frontend::ast::{AttributePattern, MatchCase, RestPattern};

fn match_on(
    subject: &str,
    cases: Vec<(Pattern<()>, Vec<Stmt<()>>)>,
) -> Stmt<()> {
    Stmt::expr(expr(ExprKind::Match {
        value: Box::new(ident(subject)),
        cases: cases
            .into_iter()
            .map(|(pattern, body)| MatchCase {
                pattern,
                body,
                span: sp(),
            })
            .collect(),
        else_body: None,
    }))
}

fn pattern(kind: PatternKind<()>) -> Pattern<()> {
    Pattern::new(kind, sp())
}

fn object(class: &str) -> Pattern<()> {
    pattern(PatternKind::Object {
        class: ty(class),
        attributes: Vec::new(),
    })
}

fn union_type(members: Vec<TypeExpr<()>>) -> TypeExpr<()> {
    TypeExpr::new(TypeExprKind::Union(members), sp())
}

#[test]
fn test_nil_pattern_against_nilable() {
    let outcome = check(vec![
        var("s", Some(nilable(ty("String"))), string("x")),
        match_on("s", vec![(value_pattern(nil()), vec![Stmt::expr(int(1))])]),
    ]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}

#[test]
fn test_nil_pattern_never_matches_string() {
    let outcome = check(vec![
        var("s", Some(ty("String")), string("x")),
        match_on("s", vec![(value_pattern(nil()), vec![Stmt::expr(int(1))])]),
    ]);
    assert_eq!(codes(&outcome), vec!["E3001"]);
    assert_eq!(
        messages(&outcome),
        vec!["type `String` cannot ever match type `nil`".to_string()]
    );
}

#[test]
fn test_object_patterns_narrow_subject() {
    let outcome = check(vec![
        var("v", Some(union_type(vec![ty("Int"), ty("String")])), int(1)),
        match_on(
            "v",
            vec![
                (object("Int"), vec![var("a", Some(ty("Int")), ident("v"))]),
                (object("String"), vec![var("b", Some(ty("String")), ident("v"))]),
            ],
        ),
    ]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}

#[test]
fn test_unreachable_case_is_a_warning() {
    let stmts = vec![
        var("v", Some(union_type(vec![ty("Int"), ty("String")])), int(1)),
        match_on(
            "v",
            vec![
                (object("Int"), Vec::new()),
                (object("String"), Vec::new()),
                (pattern(PatternKind::Wildcard), Vec::new()),
            ],
        ),
    ];

    let outcome = check(stmts.clone());
    assert_eq!(codes(&outcome), vec!["W3001"]);
    assert_eq!(
        messages(&outcome)[0],
        "unreachable case, type `Int | String` has already been fully matched"
    );
    // 警告不影响检查结果
    assert!(outcome.is_ok());

    let quiet = Checker::new(CheckerConfig::sequential().with_warnings(false)).check("test.lx", stmts);
    assert!(quiet.diagnostics.is_empty());
}

#[test]
fn test_identifier_pattern_captures_everything() {
    let outcome = check(vec![
        var("v", Some(nilable(ty("Int"))), int(1)),
        match_on(
            "v",
            vec![
                (pattern(PatternKind::Identifier("x".to_string())), Vec::new()),
                (value_pattern(nil()), Vec::new()),
            ],
        ),
    ]);
    assert_eq!(codes(&outcome), vec!["W3001"]);
}

#[test]
fn test_attribute_pattern_uses_getter_type() {
    let attribute = AttributePattern {
        name: "message".to_string(),
        pattern: pattern(PatternKind::Identifier("m".to_string())),
    };
    let error_pattern = pattern(PatternKind::Object {
        class: ty("Error"),
        attributes: vec![attribute],
    });
    let body = vec![match_on(
        "e",
        vec![(error_pattern, vec![var("s", Some(ty("String")), ident("m"))])],
    )];
    let outcome = check(vec![def(method(
        "show",
        vec![param("e", ty("Error"))],
        None,
        body,
    ))]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}

#[test]
fn test_list_pattern_binds_rest() {
    let list_of_int = TypeExpr::new(
        TypeExprKind::Generic {
            name: vec!["ArrayList".to_string()],
            args: vec![ty("Int")],
        },
        sp(),
    );
    let list_pattern = pattern(PatternKind::List {
        elements: vec![pattern(PatternKind::Identifier("first".to_string()))],
        rest: Some(RestPattern {
            name: Some("rest".to_string()),
            position: 1,
        }),
    });
    let body = vec![match_on(
        "xs",
        vec![(
            list_pattern,
            vec![
                var("a", Some(ty("Int")), ident("first")),
                var("b", Some(list_of_int.clone()), ident("rest")),
            ],
        )],
    )];
    let outcome = check(vec![def(method(
        "head",
        vec![param("xs", list_of_int)],
        None,
        body,
    ))]);
    assert!(outcome.diagnostics.is_empty(), "{:?}", messages(&outcome));
}
