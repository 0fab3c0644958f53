//! # LeiXing 性能基准测试
//!
//! 使用 Criterion.rs 进行性能基准测试。
//!
//! ## 基准测试分组
//! - `subtyping`: 子类型判定
//! - `normalize`: 并集、交集与否定的规范化
//! - `check`: 完整检查（顺序与并发）
//!
//! ## 使用方法
//! ```bash
//! cargo bench            # 运行所有
//! cargo bench subtyping  # 只运行子类型判定
//! ```

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use leixing::frontend::ast::{
    Expr, ExprKind, MethodDecl, Modifiers, NamespaceDecl, NamespaceDeclKind, Stmt, StmtKind,
    TypeExpr, TypeExprKind,
};
use leixing::frontend::core::type_system::{LiteralKind, Type, TypeRegistry};
use leixing::frontend::typecheck::{Normalizer, SubtypeChecker};
use leixing::util::config::CheckerConfig;
use leixing::util::span::Span;
use leixing::Checker;

// ============================================================================
// 子类型判定
// ============================================================================

fn bench_subtyping(c: &mut Criterion) {
    let registry = TypeRegistry::with_std();
    let checker = SubtypeChecker::new(&registry);
    let b = registry.builtins();
    let int = Type::Class(b.int);
    let string = Type::Class(b.string);
    let union = Type::Union(vec![int.clone(), string.clone(), Type::Nil]);
    let list = registry.generic(b.array_list, vec![int.clone()]);
    let inspectable = Type::Interface(b.inspectable);

    let mut group = c.benchmark_group("subtyping");
    group.bench_function("literal_to_class", |bench| {
        bench.iter(|| checker.is_subtype(black_box(&Type::int(5)), black_box(&int)))
    });
    group.bench_function("into_union", |bench| {
        bench.iter(|| checker.is_subtype(black_box(&string), black_box(&union)))
    });
    group.bench_function("negation", |bench| {
        let not_string = Type::not(string.clone());
        bench.iter(|| checker.is_subtype(black_box(&int), black_box(&not_string)))
    });
    group.bench_function("structural_interface", |bench| {
        bench.iter(|| checker.is_subtype(black_box(&list), black_box(&inspectable)))
    });
    group.finish();
}

// ============================================================================
// 规范化
// ============================================================================

fn bench_normalize(c: &mut Criterion) {
    let registry = TypeRegistry::with_std();
    let normalizer = Normalizer::new(&registry);
    let b = registry.builtins();
    let members: Vec<Type> = vec![
        Type::Class(b.int),
        Type::int(1),
        Type::Class(b.string),
        Type::string("a"),
        Type::Nil,
        Type::Class(b.float),
        Type::True,
        Type::False,
    ];

    let mut group = c.benchmark_group("normalize");
    group.bench_function("union", |bench| {
        bench.iter(|| normalizer.union(black_box(members.clone())))
    });
    group.bench_function("de_morgan", |bench| {
        let union = Type::Union(members.clone());
        bench.iter(|| normalizer.not(black_box(&union)))
    });
    group.bench_function("difference", |bench| {
        let maybe_int = Type::nilable(Type::Class(b.int));
        bench.iter(|| normalizer.difference(black_box(&maybe_int), black_box(&Type::Nil)))
    });
    group.finish();
}

// ============================================================================
// 完整检查
// ============================================================================

fn method(
    name: String,
    value: i64,
) -> Stmt<()> {
    Stmt::new(
        StmtKind::Method(MethodDecl {
            name,
            singleton: false,
            type_params: Vec::new(),
            params: Vec::new(),
            return_type: Some(TypeExpr::new(
                TypeExprKind::Name(vec!["Int".to_string()]),
                Span::dummy(),
            )),
            throw_type: None,
            modifiers: Modifiers::default(),
            body: vec![Stmt::expr(Expr::new(
                ExprKind::Literal {
                    kind: LiteralKind::Int,
                    value: value.to_string(),
                },
                Span::dummy(),
            ))],
        }),
        Span::dummy(),
    )
}

fn program(classes: usize) -> Vec<Stmt<()>> {
    (0..classes)
        .map(|i| {
            Stmt::new(
                StmtKind::Namespace(NamespaceDecl {
                    kind: NamespaceDeclKind::Class,
                    name: format!("C{}", i),
                    type_params: Vec::new(),
                    parent: None,
                    modifiers: Modifiers::default(),
                    body: (0..8).map(|m| method(format!("m{}", m), m)).collect(),
                }),
                Span::dummy(),
            )
        })
        .collect()
}

fn bench_check(c: &mut Criterion) {
    let stmts = program(50);
    let mut group = c.benchmark_group("check");
    for limit in [1usize, 4] {
        let checker = Checker::new(CheckerConfig::default().with_concurrency_limit(limit));
        group.bench_with_input(BenchmarkId::new("classes_50", limit), &stmts, |bench, stmts| {
            bench.iter(|| checker.check("bench.lx", black_box(stmts.clone())))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_subtyping, bench_normalize, bench_check);
criterion_main!(benches);
