//! Integration tests: parallel method-body checking and cancellation

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use leixing::frontend::ast::{
    Expr, ExprKind, MethodDecl, Modifiers, NamespaceDecl, NamespaceDeclKind, Stmt, StmtKind,
    TypeExpr, TypeExprKind,
};
use leixing::frontend::core::type_system::LiteralKind;
use leixing::frontend::typecheck::{CancellationToken, CompileHook, CompiledUnit};
use leixing::util::config::CheckerConfig;
use leixing::util::span::Span;
use leixing::Checker;

fn int_type() -> TypeExpr<()> {
    TypeExpr::new(TypeExprKind::Name(vec!["Int".to_string()]), Span::dummy())
}

fn literal(
    kind: LiteralKind,
    value: &str,
) -> Expr<()> {
    Expr::new(
        ExprKind::Literal {
            kind,
            value: value.to_string(),
        },
        Span::dummy(),
    )
}

/// `class C{i} { def ok(): Int = 1; def bad(): Int = "s{i}" }`
fn program(classes: usize) -> Vec<Stmt<()>> {
    (0..classes)
        .map(|i| {
            let method = |name: &str, value: Expr<()>| {
                Stmt::new(
                    StmtKind::Method(MethodDecl {
                        name: name.to_string(),
                        singleton: false,
                        type_params: Vec::new(),
                        params: Vec::new(),
                        return_type: Some(int_type()),
                        throw_type: None,
                        modifiers: Modifiers::default(),
                        body: vec![Stmt::expr(value)],
                    }),
                    Span::dummy(),
                )
            };
            Stmt::new(
                StmtKind::Namespace(NamespaceDecl {
                    kind: NamespaceDeclKind::Class,
                    name: format!("C{}", i),
                    type_params: Vec::new(),
                    parent: None,
                    modifiers: Modifiers::default(),
                    body: vec![
                        method("ok", literal(LiteralKind::Int, "1")),
                        method("bad", literal(LiteralKind::String, &format!("s{}", i))),
                    ],
                }),
                Span::dummy(),
            )
        })
        .collect()
}

fn messages(config: CheckerConfig) -> Vec<String> {
    Checker::new(config)
        .check("many.lx", program(40))
        .diagnostics
        .iter()
        .map(|d| d.message.clone())
        .collect()
}

#[test]
fn test_diagnostics_independent_of_concurrency() {
    let sequential = messages(CheckerConfig::sequential());
    assert_eq!(sequential.len(), 40);
    assert!(sequential[0].contains("\"s0\""));
    assert!(sequential[39].contains("\"s39\""));

    for limit in [2, 4, 16] {
        let parallel = messages(CheckerConfig::default().with_concurrency_limit(limit));
        assert_eq!(parallel, sequential, "concurrency limit {}", limit);
    }
}

/// Cancels the check as soon as the first unit has been compiled
struct CancelAfterFirst {
    token: CancellationToken,
    seen: AtomicUsize,
}

impl CompileHook for CancelAfterFirst {
    fn compile(
        &self,
        _unit: CompiledUnit<'_>,
    ) {
        self.seen.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
    }
}

#[test]
fn test_cancellation_stops_remaining_tasks() {
    let token = CancellationToken::new();
    let hook = Arc::new(CancelAfterFirst {
        token: token.clone(),
        seen: AtomicUsize::new(0),
    });
    let outcome = Checker::new(CheckerConfig::sequential().with_compile(true))
        .with_compile_hook(hook.clone())
        .with_cancellation(token)
        .check("many.lx", program(10));

    assert!(outcome.cancelled);
    assert!(outcome.typed.is_none());
    assert_eq!(hook.seen.load(Ordering::SeqCst), 1);
}
