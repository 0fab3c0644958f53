//! 检查驱动测试：诊断顺序、并发、取消、编译钩子

use std::sync::Arc;

use parking_lot::Mutex;

use super::*;
use crate::frontend::ast::MacroDecl;
use crate::frontend::typecheck::collaborators::{CompileHook, CompiledUnit, UnitKind};
use crate::frontend::typecheck::{check_source_json, CancellationToken};

/// 每个方法体都有一个返回类型错误
fn faulty_methods(count: usize) -> Vec<Stmt<()>> {
    (0..count)
        .map(|i| {
            def(method(
                &format!("m{}", i),
                Vec::new(),
                Some(ty("Int")),
                vec![Stmt::expr(string(&format!("s{}", i)))],
            ))
        })
        .collect()
}

#[derive(Default)]
struct Recorder {
    units: Mutex<Vec<(UnitKind, String)>>,
}

impl CompileHook for Recorder {
    fn compile(
        &self,
        unit: CompiledUnit<'_>,
    ) {
        self.units.lock().push((unit.kind, unit.name.to_string()));
    }
}

fn hook_program() -> Vec<Stmt<()>> {
    let singleton = MethodDecl {
        singleton: true,
        ..method("build", Vec::new(), None, Vec::new())
    };
    vec![
        def(method("top", Vec::new(), None, Vec::new())),
        class(
            "Foo",
            None,
            vec![def(method("bar", Vec::new(), None, Vec::new())), def(singleton)],
        ),
        Stmt::new(
            StmtKind::Macro(MacroDecl {
                name: "noop".to_string(),
                params: Vec::new(),
                return_type: None,
                body: Vec::new(),
            }),
            sp(),
        ),
        Stmt::expr(int(1)),
    ]
}

#[test]
fn test_diagnostics_follow_declaration_order() {
    let outcome = check(faulty_methods(5));
    let expected: Vec<String> = (0..5)
        .map(|i| format!("type `\"s{}\"` cannot be assigned to type `Int`", i))
        .collect();
    let actual: Vec<String> = messages(&outcome)
        .into_iter()
        .map(|m| m.lines().next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_parallel_matches_sequential() {
    let stmts = faulty_methods(32);
    let sequential = check(stmts.clone());
    let parallel =
        Checker::new(CheckerConfig::default().with_concurrency_limit(8)).check("test.lx", stmts);

    assert_eq!(sequential.diagnostics.len(), 32);
    assert_eq!(messages(&sequential), messages(&parallel));
    assert_eq!(sequential.typed, parallel.typed);
}

#[test]
fn test_cancelled_before_start() {
    let token = CancellationToken::new();
    token.cancel();
    let outcome = Checker::new(CheckerConfig::sequential())
        .with_cancellation(token)
        .check("test.lx", faulty_methods(3));

    assert!(outcome.cancelled);
    assert!(outcome.typed.is_none());
    assert!(!outcome.is_ok());
    // 方法体没有被检查
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn test_compile_hook_receives_checked_units() {
    let recorder = Arc::new(Recorder::default());
    let outcome = Checker::new(CheckerConfig::default().with_compile(true))
        .with_compile_hook(recorder.clone())
        .check("test.lx", hook_program());
    assert!(outcome.is_ok(), "{:?}", messages(&outcome));

    let mut units = recorder.units.lock().clone();
    units.sort_by(|a, b| a.1.cmp(&b.1));
    assert_eq!(
        units,
        vec![
            (UnitKind::Method, "Foo#bar".to_string()),
            (UnitKind::Method, "Foo.build".to_string()),
            (UnitKind::Method, "Object#top".to_string()),
            (UnitKind::Macro, "noop!".to_string()),
        ]
    );
}

#[test]
fn test_compile_hook_disabled() {
    let recorder = Arc::new(Recorder::default());
    let outcome = Checker::new(CheckerConfig::sequential())
        .with_compile_hook(recorder.clone())
        .check("test.lx", hook_program());
    assert!(outcome.is_ok());
    assert!(recorder.units.lock().is_empty());
}

#[test]
fn test_typed_tree_keeps_statement_order() {
    let outcome = check(hook_program());
    let typed = outcome.typed.expect("typed tree");
    assert_eq!(typed.len(), 4);
    assert!(matches!(typed[0].kind, StmtKind::Method(ref m) if m.name == "top"));
    assert!(matches!(typed[1].kind, StmtKind::Namespace(ref n) if n.name == "Foo"));
    assert!(matches!(typed[2].kind, StmtKind::Macro(ref m) if m.name == "noop"));
    match &typed[3].kind {
        StmtKind::Expr(e) => assert_eq!(outcome.registry.inspect(&e.ty), "1"),
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_check_source_json() {
    let json = r#"[
        {"kind": {"expr": {"kind": {"var": {
            "name": "a",
            "type_expr": {"kind": {"name": ["Int"]}},
            "init": {"kind": {"literal": {"kind": "string", "value": "x"}}}
        }}}}}
    ]"#;
    let outcome = check_source_json("main.lx", json).unwrap();
    assert_eq!(codes(&outcome), vec!["E2001"]);

    let err = check_source_json("broken.lx", "{").unwrap_err();
    assert!(err.to_string().contains("broken.lx"));
}

#[test]
fn test_constant_internal_error_is_recorded() {
    use crate::frontend::ast::ConstantDecl;
    use crate::frontend::core::type_system::{Type, TypeRegistry};
    use crate::frontend::typecheck::context::{
        CheckEnv, CheckState, ConstantEntry, ConstantState, DeclTable,
    };

    let registry = TypeRegistry::with_std();
    let mut decls = DeclTable::new();
    let id = decls.add_constant(ConstantEntry {
        name: "A".to_string(),
        namespace: registry.root(),
        decl: ConstantDecl {
            name: "A".to_string(),
            type_expr: None,
            value: int(1),
        },
        // 没有词法命名空间
        scopes: Vec::new(),
        span: sp(),
        state: Mutex::new(ConstantState::default()),
    });
    let env = CheckEnv {
        registry: &registry,
        decls: &decls,
        file: Arc::from("test.lx"),
    };

    assert!(matches!(decls.constant_type(&env, id, sp()), Ok(Type::Untyped)));
    // 再次引用直接取记录的结果
    assert!(matches!(decls.constant_type(&env, id, sp()), Ok(Type::Untyped)));

    let state = decls.constant(id).state.lock();
    assert_eq!(state.check, CheckState::Checked);
    assert!(state.typed.is_none());
    let error = state.internal.as_ref().expect("internal error recorded");
    assert_eq!(error.task, "constant A");
    assert_eq!(error.message, "constant has no lexical namespace");
}
