//! 提升阶段
//!
//! 在任何函数体被检查之前，把整个编译单元中的声明写入注册表，
//! 使前向引用可以解析。这是唯一写入命名空间图的阶段，严格串行：
//!
//! 1. 第一遍：声明命名空间、类型别名（未定义）和宏
//! 2. 类型参数上下界、别名阶段（按需先定义被引用的别名，循环报错）
//! 3. 第二遍：父类、混入、接口、方法签名、实例变量、常量，
//!    登记方法体/宏体/脚本体任务（附词法命名空间栈快照）
//! 4. 宏展开：对所有任务和常量初始值中的宏调用求值
//!
//! 两遍遍历的顺序完全一致，第二遍用游标取回第一遍的结果。

use std::sync::Arc;

use crate::frontend::ast::visit::{block_mut, for_each_child_mut};
use crate::frontend::ast::{
    Arguments, Expr, ExprKind, InstanceVarDecl, MacroDecl, MethodDecl, Modifiers, NamespaceDecl,
    NamespaceDeclKind, Stmt, StmtKind, TypeAliasDecl, TypeExpr, TypeExprKind, TypeParamDecl,
};
use crate::frontend::core::type_system::{
    Callable, ConstantSlot, MethodFlags, NamedTypeId, NamespaceFlags, NamespaceId, NamespaceKind,
    Parameter, Type, TypeParameter, TypeRegistry,
};
use crate::frontend::typecheck::assemble::{NamespaceHeader, Outline, OutlineItem, OutlineStmt};
use crate::frontend::typecheck::call::{bind_arguments, ArgumentSlot};
use crate::frontend::typecheck::checking::SubtypeChecker;
use crate::frontend::typecheck::collaborators::{BoundArguments, BoundValue, MacroEvaluator};
use crate::frontend::typecheck::context::{
    CheckState, ConstantEntry, ConstantState, DeclTable, MacroEntry,
};
use crate::frontend::typecheck::errors::TypeError;
use crate::frontend::typecheck::tasks::{Task, TaskKind};
use crate::frontend::typecheck::type_expr::{lookup_type_path, parameter_kind, TypeResolver};
use crate::util::diagnostic::DiagnosticList;
use crate::util::span::Span;

/// 本编译单元中方法定义的位置，供声明检查使用
#[derive(Debug, Clone)]
pub struct MethodSite {
    pub owner: NamespaceId,
    pub name: String,
    pub span: Span,
}

/// 本编译单元中实例变量声明的位置
#[derive(Debug, Clone)]
pub struct InstanceVarSite {
    pub owner: NamespaceId,
    pub name: String,
    pub ty: Type,
    pub span: Span,
}

/// 声明检查需要的位置信息
#[derive(Debug, Clone, Default)]
pub struct DeclSites {
    /// 声明或重新打开的命名空间（按首次出现去重）
    pub namespaces: Vec<(NamespaceId, Span)>,
    pub methods: Vec<MethodSite>,
    pub instance_vars: Vec<InstanceVarSite>,
}

/// 提升阶段的产出
pub struct Hoisted {
    pub registry: TypeRegistry,
    pub decls: DeclTable,
    pub tasks: Vec<Task>,
    pub outline: Outline,
    pub sites: DeclSites,
    pub diagnostics: DiagnosticList,
}

/// 类型别名的声明点
struct AliasSite {
    id: NamedTypeId,
    decl: TypeAliasDecl<()>,
    scopes: Vec<NamespaceId>,
    state: CheckState,
    /// 定义过程中发现自己在引用环上
    cyclic: bool,
    typed: Option<TypeAliasDecl<Type>>,
}

/// 带上下界的类型参数，在别名阶段之后解析
struct BoundSite {
    namespace: NamespaceId,
    decls: Vec<TypeParamDecl<()>>,
    scopes: Vec<NamespaceId>,
}

/// 第二遍中当前语句所在的位置
#[derive(Clone)]
struct BodyScope {
    /// `None` 为顶层
    namespace: Option<NamespaceId>,
    /// 词法命名空间栈（由外向内，不含根）
    scopes: Vec<NamespaceId>,
}

/// 提升器
pub struct Hoister<'h> {
    registry: TypeRegistry,
    decls: DeclTable,
    tasks: Vec<Task>,
    diagnostics: DiagnosticList,
    file: Arc<str>,
    evaluator: Option<&'h dyn MacroEvaluator>,
    namespace_sites: Vec<Option<NamespaceId>>,
    alias_sites: Vec<Option<AliasSite>>,
    bound_sites: Vec<BoundSite>,
    namespace_cursor: usize,
    alias_cursor: usize,
    sites: DeclSites,
}

impl<'h> Hoister<'h> {
    pub fn new(
        registry: TypeRegistry,
        file: Arc<str>,
    ) -> Self {
        Self {
            registry,
            decls: DeclTable::new(),
            tasks: Vec::new(),
            diagnostics: DiagnosticList::new(),
            file,
            evaluator: None,
            namespace_sites: Vec::new(),
            alias_sites: Vec::new(),
            bound_sites: Vec::new(),
            namespace_cursor: 0,
            alias_cursor: 0,
            sites: DeclSites::default(),
        }
    }

    pub fn with_macro_evaluator(
        mut self,
        evaluator: Option<&'h dyn MacroEvaluator>,
    ) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// 执行全部提升步骤
    pub fn hoist(
        mut self,
        stmts: &[Stmt<()>],
    ) -> Hoisted {
        let root = self.registry.root();
        tracing::debug!(file = %self.file, "hoisting declarations");
        self.declare_pass(stmts, root, &mut Vec::new());
        self.define_type_param_bounds();
        self.define_aliases();
        let outline = self.define_pass(
            stmts,
            BodyScope {
                namespace: None,
                scopes: Vec::new(),
            },
        );
        self.expand_macros();
        tracing::debug!(
            namespaces = self.registry.namespace_count(),
            tasks = self.tasks.len(),
            constants = self.decls.constants.len(),
            "hoisting finished"
        );
        Hoisted {
            registry: self.registry,
            decls: self.decls,
            tasks: self.tasks,
            outline,
            sites: self.sites,
            diagnostics: self.diagnostics,
        }
    }

    fn error(
        &mut self,
        error: TypeError,
    ) {
        self.diagnostics.push(error.into_diagnostic(&self.file));
    }

    fn errors(
        &mut self,
        errors: Vec<TypeError>,
    ) {
        for error in errors {
            self.error(error);
        }
    }

    // ------------------------------------------------------------------
    // 第一遍
    // ------------------------------------------------------------------

    fn declare_pass(
        &mut self,
        stmts: &[Stmt<()>],
        scope: NamespaceId,
        scopes: &mut Vec<NamespaceId>,
    ) {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Namespace(decl) => {
                    let id = self.declare_namespace(decl, scope, scopes, stmt.span);
                    self.namespace_sites.push(id);
                    if let Some(id) = id {
                        scopes.push(id);
                        self.declare_pass(&decl.body, id, scopes);
                        scopes.pop();
                    }
                }
                StmtKind::TypeAlias(decl) => {
                    let site = self.declare_alias(decl, scope, scopes, stmt.span);
                    self.alias_sites.push(site);
                }
                StmtKind::Macro(decl) => {
                    let name = self.registry.qualified_name(scope, &decl.name);
                    self.decls.macros.push(MacroEntry {
                        name,
                        namespace: scope,
                        decl: decl.clone(),
                        scopes: scopes.clone(),
                    });
                }
                _ => {}
            }
        }
    }

    fn declare_namespace(
        &mut self,
        decl: &NamespaceDecl<()>,
        scope: NamespaceId,
        scopes: &[NamespaceId],
        span: Span,
    ) -> Option<NamespaceId> {
        let kind = namespace_kind(decl.kind);
        let flags = NamespaceFlags {
            abstract_: decl.modifiers.abstract_,
            sealed: decl.modifiers.sealed,
            primitive: decl.modifiers.primitive,
        };
        if let Some(existing) = self.registry.lookup_subtype(scope, &decl.name).cloned() {
            let reopened = match existing {
                Type::Class(id) | Type::Mixin(id) | Type::Interface(id) | Type::Module(id)
                    if self.registry.namespace(id).kind == kind =>
                {
                    Some(id)
                }
                _ => None,
            };
            let Some(id) = reopened else {
                let name = self.registry.qualified_name(scope, &decl.name);
                self.error(TypeError::NamespaceRedeclared {
                    name,
                    kind: decl.kind.describe(),
                    span,
                });
                return None;
            };
            let current = self.registry.namespace(id).flags;
            if decl.modifiers != Modifiers::default() && current != flags {
                let name = self.registry.namespace_name(id);
                self.error(TypeError::ModifierMismatch {
                    message: format!(
                        "cannot reopen {} `{}` with different modifiers",
                        kind.describe(),
                        name
                    ),
                    span,
                });
            }
            return Some(id);
        }

        let id = self.registry.declare_namespace(kind, &decl.name, scope);
        let owner = self.registry.namespace(id).name.clone();
        let type_params = decl
            .type_params
            .iter()
            .map(|p| Arc::new(TypeParameter::new(p.name.clone(), owner.clone(), p.variance)))
            .collect();
        let namespace = self.registry.namespace_mut(id);
        namespace.flags = flags;
        namespace.type_params = type_params;
        if decl
            .type_params
            .iter()
            .any(|p| p.upper_bound.is_some() || p.lower_bound.is_some())
        {
            let mut inner = scopes.to_vec();
            inner.push(id);
            self.bound_sites.push(BoundSite {
                namespace: id,
                decls: decl.type_params.clone(),
                scopes: inner,
            });
        }
        tracing::trace!(namespace = %owner, kind = kind.describe(), "declared");
        Some(id)
    }

    fn declare_alias(
        &mut self,
        decl: &TypeAliasDecl<()>,
        scope: NamespaceId,
        scopes: &[NamespaceId],
        span: Span,
    ) -> Option<AliasSite> {
        let name = self.registry.qualified_name(scope, &decl.name);
        if self.registry.lookup_subtype(scope, &decl.name).is_some() {
            self.error(TypeError::NamespaceRedeclared {
                name,
                kind: "type",
                span,
            });
            return None;
        }
        let type_params = decl
            .type_params
            .iter()
            .map(|p| Arc::new(TypeParameter::new(p.name.clone(), name.clone(), p.variance)))
            .collect();
        let id = self.registry.declare_named(&decl.name, scope, type_params);
        Some(AliasSite {
            id,
            decl: decl.clone(),
            scopes: scopes.to_vec(),
            state: CheckState::New,
            cyclic: false,
            typed: None,
        })
    }

    // ------------------------------------------------------------------
    // 类型参数上下界与别名
    // ------------------------------------------------------------------

    fn define_type_param_bounds(&mut self) {
        let sites = std::mem::take(&mut self.bound_sites);
        for site in sites {
            let current = self.registry.namespace(site.namespace).type_params.clone();
            let (bounded, _, errors) =
                resolve_type_params(&self.registry, &site.scopes, &[], &current, &site.decls);
            self.errors(errors);
            self.registry.namespace_mut(site.namespace).type_params = bounded;
        }
    }

    fn define_aliases(&mut self) {
        for index in 0..self.alias_sites.len() {
            self.define_alias(index);
        }
    }

    /// 定义别名；目标中处于“头部”位置的别名先被定义
    fn define_alias(
        &mut self,
        index: usize,
    ) {
        let Some(site) = self.alias_sites[index].as_mut() else {
            return;
        };
        if site.state != CheckState::New {
            return;
        }
        site.state = CheckState::Checking;
        let id = site.id;
        let decl = site.decl.clone();
        let scopes = site.scopes.clone();

        let params = self.registry.named(id).type_params.clone();
        let mut references = Vec::new();
        collect_alias_refs(&self.registry, &scopes, &params, &decl.target, true, &mut references);
        for (reference, span) in references {
            let Some(target) = self.alias_index(reference) else {
                continue;
            };
            let in_progress = self.alias_sites[target]
                .as_ref()
                .is_some_and(|s| s.state == CheckState::Checking);
            if in_progress {
                let name = self.registry.named(reference).name.clone();
                self.error(TypeError::circular("type", name, span));
                if let Some(site) = self.alias_sites[target].as_mut() {
                    site.cyclic = true;
                }
            } else {
                self.define_alias(target);
            }
        }

        let (bounded, type_params, mut errors) =
            resolve_type_params(&self.registry, &scopes, &[], &params, &decl.type_params);
        let mut resolver = TypeResolver::new(&self.registry, &scopes, &bounded, None);
        let target = resolver.resolve(&decl.target);
        errors.extend(resolver.into_errors());
        self.errors(errors);

        let Some(site) = self.alias_sites[index].as_mut() else {
            return;
        };
        let ty = if site.cyclic {
            Type::Untyped
        } else {
            target.ty.clone()
        };
        site.state = CheckState::Checked;
        site.typed = Some(TypeAliasDecl {
            name: decl.name.clone(),
            type_params,
            target,
        });
        self.registry.set_named_type_params(id, bounded);
        self.registry.define_named(id, ty);
    }

    fn alias_index(
        &self,
        id: NamedTypeId,
    ) -> Option<usize> {
        self.alias_sites
            .iter()
            .position(|site| site.as_ref().is_some_and(|s| s.id == id))
    }

    // ------------------------------------------------------------------
    // 第二遍
    // ------------------------------------------------------------------

    fn define_pass(
        &mut self,
        stmts: &[Stmt<()>],
        body: BodyScope,
    ) -> Outline {
        let mut items = Vec::with_capacity(stmts.len());
        let mut script = Vec::new();
        for stmt in stmts {
            let item = match &stmt.kind {
                StmtKind::Expr(_) => {
                    script.push(stmt.clone());
                    OutlineStmt::Expr
                }
                StmtKind::Namespace(decl) => self.define_namespace(decl, &body, stmt.span),
                StmtKind::Method(decl) => self.define_method(decl, &body, stmt.span),
                StmtKind::Constant(decl) => {
                    let namespace = body.namespace.unwrap_or_else(|| self.registry.root());
                    if self.registry.lookup_constant(namespace, &decl.name).is_some() {
                        let name = self.registry.qualified_name(namespace, &decl.name);
                        self.error(TypeError::NamespaceRedeclared {
                            name,
                            kind: "constant",
                            span: stmt.span,
                        });
                        OutlineStmt::Dropped
                    } else {
                        let name = self.registry.qualified_name(namespace, &decl.name);
                        let id = self.decls.add_constant(ConstantEntry {
                            name,
                            namespace,
                            decl: decl.clone(),
                            scopes: body.scopes.clone(),
                            span: stmt.span,
                            state: parking_lot::Mutex::new(ConstantState::default()),
                        });
                        self.registry
                            .namespace_mut(namespace)
                            .constants
                            .insert(decl.name.clone(), ConstantSlot::Declared(id));
                        OutlineStmt::Constant(id)
                    }
                }
                StmtKind::TypeAlias(_) => {
                    let index = self.alias_cursor;
                    self.alias_cursor += 1;
                    self.alias_sites
                        .get_mut(index)
                        .and_then(|site| site.as_mut())
                        .and_then(|site| site.typed.take())
                        .map_or(OutlineStmt::Dropped, OutlineStmt::TypeAlias)
                }
                StmtKind::Include(types) => self.define_includes(types, &body, stmt.span),
                StmtKind::Implement(types) => self.define_implements(types, &body, stmt.span),
                StmtKind::InstanceVar(decl) => self.define_instance_var(decl, &body, stmt.span),
                StmtKind::Macro(decl) => {
                    let params = macro_params(decl);
                    let name = format!("{}!", decl.name);
                    let task = self.push_task(
                        name,
                        &body,
                        stmt.span,
                        TaskKind::Macro {
                            decl: decl.clone(),
                            params,
                        },
                    );
                    OutlineStmt::Macro { task }
                }
            };
            items.push(OutlineItem {
                span: stmt.span,
                stmt: item,
            });
        }

        let script = if script.is_empty() {
            None
        } else {
            let name = match body.namespace {
                Some(id) => self.registry.namespace_name(id),
                None => self.file.to_string(),
            };
            let span = script.first().map(|s| s.span).unwrap_or_default();
            Some(self.push_task(
                name,
                &body,
                span,
                TaskKind::Script {
                    namespace: body.namespace,
                    stmts: script,
                },
            ))
        };
        Outline { script, items }
    }

    fn push_task(
        &mut self,
        name: String,
        body: &BodyScope,
        span: Span,
        kind: TaskKind,
    ) -> usize {
        self.tasks.push(Task {
            name,
            namespaces: body.scopes.clone(),
            span,
            kind,
        });
        self.tasks.len() - 1
    }

    fn define_namespace(
        &mut self,
        decl: &NamespaceDecl<()>,
        body: &BodyScope,
        span: Span,
    ) -> OutlineStmt {
        let index = self.namespace_cursor;
        self.namespace_cursor += 1;
        let Some(id) = self.namespace_sites.get(index).copied().flatten() else {
            return OutlineStmt::Dropped;
        };
        if !self.sites.namespaces.iter().any(|(seen, _)| *seen == id) {
            self.sites.namespaces.push((id, span));
        }

        let own_params = self.registry.namespace(id).type_params.clone();
        let (_, type_params, _) =
            resolve_type_params(&self.registry, &body.scopes, &[], &own_params, &decl.type_params);
        let parent = self.define_parent(id, decl, &body.scopes, span);

        let mut scopes = body.scopes.clone();
        scopes.push(id);
        let inner = self.define_pass(
            &decl.body,
            BodyScope {
                namespace: Some(id),
                scopes,
            },
        );
        OutlineStmt::Namespace {
            header: NamespaceHeader {
                kind: decl.kind,
                name: decl.name.clone(),
                type_params,
                parent,
                modifiers: decl.modifiers,
            },
            body: inner,
        }
    }

    /// 设置父类；未声明父类的类默认继承 `Std::Object`
    fn define_parent(
        &mut self,
        id: NamespaceId,
        decl: &NamespaceDecl<()>,
        scopes: &[NamespaceId],
        span: Span,
    ) -> Option<TypeExpr<Type>> {
        let kind = self.registry.namespace(id).kind;
        let object = self.registry.builtins().object;
        let Some(parent_expr) = &decl.parent else {
            if kind == NamespaceKind::Class
                && self.registry.namespace(id).parent.is_none()
                && id != object
            {
                self.registry.namespace_mut(id).parent = Some(Type::Class(object));
            }
            self.registry.link_singleton_parent(id);
            return None;
        };
        if kind != NamespaceKind::Class {
            self.error(TypeError::Placement {
                what: "superclass",
                span: parent_expr.span,
            });
            self.registry.link_singleton_parent(id);
            return None;
        }

        let params = self.registry.namespace(id).type_params.clone();
        let mut resolver = TypeResolver::new(&self.registry, scopes, &params, None);
        let typed = resolver.resolve(parent_expr);
        let errors = resolver.into_errors();
        self.errors(errors);

        let parent_id = match &typed.ty {
            Type::Class(parent) => Some(*parent),
            Type::Generic(generic)
                if self.registry.namespace(generic.namespace).kind == NamespaceKind::Class =>
            {
                Some(generic.namespace)
            }
            Type::Untyped => None,
            other => {
                let name = self.registry.inspect(other);
                self.error(TypeError::KindMismatch {
                    name,
                    expected: "class",
                    span: parent_expr.span,
                });
                None
            }
        };
        if let Some(parent_id) = parent_id {
            let class = self.registry.namespace_name(id);
            if self.registry.is_sealed(parent_id) {
                let parent = self.registry.namespace_name(parent_id);
                self.error(TypeError::SealedParent {
                    class: parent,
                    span: parent_expr.span,
                });
            } else if self.inherits_from(&typed.ty, id) {
                self.error(TypeError::circular("class", class, span));
            } else {
                match self.registry.namespace(id).parent.clone() {
                    Some(existing) if existing != typed.ty => {
                        let given = self.registry.inspect(&typed.ty);
                        let expected = self.registry.inspect(&existing);
                        self.error(TypeError::SuperclassMismatch {
                            class,
                            given,
                            expected,
                            span: parent_expr.span,
                        });
                    }
                    Some(_) => {}
                    None => self.registry.namespace_mut(id).parent = Some(typed.ty.clone()),
                }
            }
        }
        self.registry.link_singleton_parent(id);
        Some(typed)
    }

    /// `ty` 的祖先中是否已经有 `id`
    fn inherits_from(
        &self,
        ty: &Type,
        id: NamespaceId,
    ) -> bool {
        self.registry
            .ancestors(ty)
            .iter()
            .any(|ancestor| ancestor.namespace_id() == Some(id))
    }

    fn define_includes(
        &mut self,
        types: &[TypeExpr<()>],
        body: &BodyScope,
        span: Span,
    ) -> OutlineStmt {
        let target = body
            .namespace
            .filter(|id| {
                matches!(
                    self.registry.namespace(*id).kind,
                    NamespaceKind::Class | NamespaceKind::Mixin
                )
            });
        let Some(id) = target else {
            self.error(TypeError::Placement {
                what: "include",
                span,
            });
            return OutlineStmt::Dropped;
        };
        let typed = self.resolve_in_namespace(types, id, &body.scopes);
        for expr in &typed {
            let Some(mixin) = self.expect_kind(&expr.ty, NamespaceKind::Mixin, expr.span) else {
                continue;
            };
            if mixin == id || self.inherits_from(&expr.ty, id) {
                let name = self.registry.namespace_name(mixin);
                self.error(TypeError::circular("mixin", name, expr.span));
                continue;
            }
            let namespace = self.registry.namespace_mut(id);
            if !namespace
                .includes
                .iter()
                .any(|included| included.namespace_id() == Some(mixin))
            {
                namespace.includes.push(expr.ty.clone());
            }
        }
        OutlineStmt::Include(typed)
    }

    fn define_implements(
        &mut self,
        types: &[TypeExpr<()>],
        body: &BodyScope,
        span: Span,
    ) -> OutlineStmt {
        let target = body.namespace.filter(|id| {
            matches!(
                self.registry.namespace(*id).kind,
                NamespaceKind::Class | NamespaceKind::Mixin | NamespaceKind::Interface
            )
        });
        let Some(id) = target else {
            self.error(TypeError::Placement {
                what: "implement",
                span,
            });
            return OutlineStmt::Dropped;
        };
        let typed = self.resolve_in_namespace(types, id, &body.scopes);
        for expr in &typed {
            let Some(iface) = self.expect_kind(&expr.ty, NamespaceKind::Interface, expr.span) else {
                continue;
            };
            if iface == id || self.inherits_from(&expr.ty, id) {
                let name = self.registry.namespace_name(iface);
                self.error(TypeError::circular("interface", name, expr.span));
                continue;
            }
            let namespace = self.registry.namespace_mut(id);
            if !namespace
                .implements
                .iter()
                .any(|implemented| implemented.namespace_id() == Some(iface))
            {
                namespace.implements.push(expr.ty.clone());
            }
        }
        OutlineStmt::Implement(typed)
    }

    /// 在命名空间体内解析类型表达式（可见命名空间的类型参数）
    fn resolve_in_namespace(
        &mut self,
        types: &[TypeExpr<()>],
        id: NamespaceId,
        scopes: &[NamespaceId],
    ) -> Vec<TypeExpr<Type>> {
        let params = self.registry.namespace(id).type_params.clone();
        let mut resolver = TypeResolver::new(&self.registry, scopes, &params, None);
        let typed: Vec<TypeExpr<Type>> = types.iter().map(|t| resolver.resolve(t)).collect();
        let errors = resolver.into_errors();
        self.errors(errors);
        typed
    }

    /// 要求类型是给定种类的命名空间（或其泛型实例）
    fn expect_kind(
        &mut self,
        ty: &Type,
        kind: NamespaceKind,
        span: Span,
    ) -> Option<NamespaceId> {
        if ty.is_untyped() {
            return None;
        }
        let id = match ty {
            Type::Generic(generic) => Some(generic.namespace),
            Type::Class(id) | Type::Mixin(id) | Type::Interface(id) | Type::Module(id) => {
                Some(*id)
            }
            _ => None,
        };
        match id {
            Some(id) if self.registry.namespace(id).kind == kind => Some(id),
            _ => {
                let name = self.registry.inspect(ty);
                self.error(TypeError::KindMismatch {
                    name,
                    expected: kind.describe(),
                    span,
                });
                None
            }
        }
    }

    fn define_instance_var(
        &mut self,
        decl: &InstanceVarDecl<()>,
        body: &BodyScope,
        span: Span,
    ) -> OutlineStmt {
        let Some(id) = body.namespace else {
            self.error(TypeError::Placement {
                what: "instance variable",
                span,
            });
            return OutlineStmt::Dropped;
        };
        let namespace = self.registry.namespace(id);
        let reason = match namespace.kind {
            NamespaceKind::Class if namespace.flags.primitive => Some("primitive class"),
            NamespaceKind::Class | NamespaceKind::Mixin => None,
            other => Some(other.describe()),
        };
        if let Some(reason) = reason {
            let name = self.registry.namespace_name(id);
            self.error(TypeError::InstanceVarNotAllowed {
                namespace: name,
                reason,
                span,
            });
            return OutlineStmt::Dropped;
        }

        let typed = self
            .resolve_in_namespace(std::slice::from_ref(&decl.type_expr), id, &body.scopes)
            .pop();
        let Some(type_expr) = typed else {
            return OutlineStmt::Dropped;
        };
        let ty = type_expr.ty.clone();
        match self.registry.namespace(id).instance_vars.get(&decl.name).cloned() {
            Some(existing) if existing != ty => {
                let is = self.registry.inspect(&ty);
                let should = self.registry.inspect(&existing);
                self.error(TypeError::InstanceVarRedeclared {
                    name: decl.name.clone(),
                    is,
                    should,
                    span,
                });
            }
            Some(_) => {}
            None => {
                self.registry
                    .namespace_mut(id)
                    .instance_vars
                    .insert(decl.name.clone(), ty.clone());
                self.sites.instance_vars.push(InstanceVarSite {
                    owner: id,
                    name: decl.name.clone(),
                    ty,
                    span,
                });
            }
        }
        OutlineStmt::InstanceVar(InstanceVarDecl {
            name: decl.name.clone(),
            type_expr,
        })
    }

    fn define_method(
        &mut self,
        decl: &MethodDecl<()>,
        body: &BodyScope,
        span: Span,
    ) -> OutlineStmt {
        let object = self.registry.builtins().object;
        let namespace = body.namespace.unwrap_or(object);
        let kind = self.registry.namespace(namespace).kind;
        let owner = match (kind, decl.singleton) {
            (NamespaceKind::Module, _) | (_, false) => namespace,
            (_, true) => self.registry.namespace(namespace).singleton.unwrap_or(namespace),
        };

        let mut flags = MethodFlags {
            abstract_: decl.modifiers.abstract_,
            sealed: decl.modifiers.sealed,
            primitive: decl.modifiers.primitive,
        };
        if kind == NamespaceKind::Interface {
            flags.abstract_ = true;
        } else if flags.abstract_ && !self.registry.is_abstract(namespace) {
            let name = self.registry.namespace_name(namespace);
            self.error(TypeError::AbstractInConcrete {
                method: decl.name.clone(),
                kind: kind.describe(),
                namespace: name,
                span,
            });
        }

        let task_name = if owner == namespace {
            format!("{}#{}", self.registry.namespace_name(namespace), decl.name)
        } else {
            format!("{}.{}", self.registry.namespace_name(namespace), decl.name)
        };
        let namespace_params = if owner == namespace {
            self.registry.namespace(namespace).type_params.clone()
        } else {
            Vec::new()
        };
        let callable = self.method_signature(decl, &task_name, &namespace_params, &body.scopes);
        let callable = Arc::new(callable.with_flags(flags).with_owner(owner));

        let existing = self.registry.namespace(owner).methods.get(&decl.name).cloned();
        if let Some(existing) = existing {
            self.check_redefinition(&callable, &existing, owner, span);
        }
        self.registry
            .namespace_mut(owner)
            .methods
            .insert(decl.name.clone(), callable.clone());
        self.sites.methods.push(MethodSite {
            owner,
            name: decl.name.clone(),
            span,
        });

        let task = self.push_task(
            task_name,
            body,
            span,
            TaskKind::Method {
                owner,
                decl: decl.clone(),
                callable,
            },
        );
        OutlineStmt::Method { task }
    }

    /// 同一命名空间中重新定义方法：新签名必须兼容旧签名
    fn check_redefinition(
        &mut self,
        callable: &Callable,
        existing: &Callable,
        owner: NamespaceId,
        span: Span,
    ) {
        if existing.is_sealed() {
            self.error(TypeError::SealedOverride {
                method: callable.name.clone(),
                span,
            });
            return;
        }
        let self_type = self.registry.self_instance(owner);
        let checker = SubtypeChecker::new(&self.registry).with_self(Some(self_type));
        if !checker.is_method_compatible(callable, existing) {
            let error = TypeError::IncompatibleOverride {
                method: callable.name.clone(),
                parent: self.registry.namespace_name(owner),
                is: self.registry.inspect_signature(callable),
                should: self.registry.inspect_signature(existing),
                span,
            };
            self.error(error);
        }
    }

    /// 由方法声明构造签名；缺省的形参类型为 `untyped`，返回类型为 `void`
    fn method_signature(
        &mut self,
        decl: &MethodDecl<()>,
        owner: &str,
        namespace_params: &[Arc<TypeParameter>],
        scopes: &[NamespaceId],
    ) -> Callable {
        let unbounded: Vec<Arc<TypeParameter>> = decl
            .type_params
            .iter()
            .map(|p| Arc::new(TypeParameter::new(p.name.clone(), owner, p.variance)))
            .collect();
        let (bounded, _, mut errors) = resolve_type_params(
            &self.registry,
            scopes,
            namespace_params,
            &unbounded,
            &decl.type_params,
        );
        let visible: Vec<Arc<TypeParameter>> =
            namespace_params.iter().chain(bounded.iter()).cloned().collect();

        let mut resolver = TypeResolver::new(&self.registry, scopes, &visible, None);
        let params = decl
            .params
            .iter()
            .map(|p| {
                let ty = p
                    .type_expr
                    .as_ref()
                    .map_or(Type::Untyped, |t| resolver.resolve(t).ty);
                Parameter::new(p.name.clone(), ty).with_kind(parameter_kind(p.kind, p.default.is_some()))
            })
            .collect();
        let return_type = decl
            .return_type
            .as_ref()
            .map_or(Type::Void, |t| resolver.resolve(t).ty);
        let throw_type = decl
            .throw_type
            .as_ref()
            .map_or(Type::Never, |t| resolver.resolve(t).ty);
        errors.extend(resolver.into_errors());
        self.errors(errors);

        Callable::method(decl.name.clone(), params, return_type)
            .with_throw(throw_type)
            .with_type_params(bounded)
    }

    // ------------------------------------------------------------------
    // 宏展开
    // ------------------------------------------------------------------

    fn expand_macros(&mut self) {
        let mut tasks = std::mem::take(&mut self.tasks);
        for task in &mut tasks {
            let scopes = task.namespaces.clone();
            match &mut task.kind {
                TaskKind::Script { stmts, .. } => self.expand_block(stmts, &scopes),
                TaskKind::Method { decl, .. } => {
                    for param in &mut decl.params {
                        if let Some(default) = &mut param.default {
                            self.expand_expr(default, &scopes, &mut Vec::new());
                        }
                    }
                    self.expand_block(&mut decl.body, &scopes);
                }
                TaskKind::Macro { .. } => {}
            }
        }
        self.tasks = tasks;

        for index in 0..self.decls.constants.len() {
            let entry = &mut self.decls.constants[index];
            let span = entry.decl.value.span;
            let scopes = entry.scopes.clone();
            let mut value = std::mem::replace(
                &mut entry.decl.value,
                Expr::new(ExprKind::Invalid, span),
            );
            self.expand_expr(&mut value, &scopes, &mut Vec::new());
            self.decls.constants[index].decl.value = value;
        }
    }

    fn expand_block(
        &mut self,
        block: &mut Vec<Stmt<()>>,
        scopes: &[NamespaceId],
    ) {
        block_mut(block, &mut |expr| {
            self.expand_expr(expr, scopes, &mut Vec::new())
        });
    }

    /// 展开表达式中的宏调用；`stack` 是正在展开的宏，用于检测循环展开
    fn expand_expr(
        &mut self,
        expr: &mut Expr<()>,
        scopes: &[NamespaceId],
        stack: &mut Vec<String>,
    ) {
        let span = expr.span;
        if let ExprKind::MacroCall {
            name,
            args,
            expansion,
        } = &mut expr.kind
        {
            if expansion.is_none() {
                let expanded = self.expand_call(name, args, span, scopes, stack);
                *expansion = Some(Box::new(expanded));
            }
            if let Some(expansion) = expansion {
                stack.push(name.clone());
                self.expand_expr(expansion, scopes, stack);
                stack.pop();
            }
            return;
        }
        for_each_child_mut(expr, &mut |child| self.expand_expr(child, scopes, stack));
    }

    /// 求值一次宏调用；失败时返回 `Invalid` 节点
    fn expand_call(
        &mut self,
        name: &str,
        args: &Arguments<()>,
        span: Span,
        scopes: &[NamespaceId],
        stack: &[String],
    ) -> Expr<()> {
        let invalid = Expr::new(ExprKind::Invalid, span);
        if stack.iter().any(|active| active == name) {
            self.error(TypeError::circular("macro", format!("{}!", name), span));
            return invalid;
        }
        let Some(decl) = self
            .decls
            .lookup_macro(scopes, name)
            .map(|entry| entry.decl.clone())
        else {
            self.error(TypeError::UndefinedMacro {
                name: name.to_string(),
                span,
            });
            return invalid;
        };
        let Some(evaluator) = self.evaluator else {
            self.error(TypeError::MacroUnavailable {
                name: name.to_string(),
                span,
            });
            return invalid;
        };

        let method = format!("{}!", name);
        let signature = Callable::method(method.clone(), macro_params(&decl), Type::Untyped);
        let named: Vec<&str> = args.named.iter().map(|a| a.name.as_str()).collect();
        let plan = bind_arguments(&signature, args.positional.len(), &named);
        if !plan.is_ok() {
            let named_spans: Vec<Span> = args.named.iter().map(|a| a.span).collect();
            for issue in &plan.issues {
                self.error(issue.to_error(&method, &named_spans, span));
            }
            return invalid;
        }

        let mut bound = BoundArguments::default();
        for (param, slot) in signature.params.iter().zip(plan.slots) {
            let value = match slot {
                ArgumentSlot::Positional(i) => BoundValue::Single(args.positional[i].clone()),
                ArgumentSlot::Named(i) => BoundValue::Single(args.named[i].value.clone()),
                ArgumentSlot::Rest(indices) => BoundValue::Rest(
                    indices
                        .into_iter()
                        .map(|i| args.positional[i].clone())
                        .collect(),
                ),
                ArgumentSlot::NamedRest(indices) => BoundValue::NamedRest(
                    indices
                        .into_iter()
                        .map(|i| (args.named[i].name.clone(), args.named[i].value.clone()))
                        .collect(),
                ),
                ArgumentSlot::Undefined => BoundValue::Undefined,
            };
            bound.values.insert(param.name.clone(), value);
        }

        tracing::debug!(macro_name = %name, "expanding macro");
        match evaluator.expand(&decl, &bound) {
            Ok(expansion) => expansion.expr,
            Err(error) => {
                self.error(TypeError::MacroFailed {
                    name: name.to_string(),
                    message: error.describe(),
                    span,
                });
                invalid
            }
        }
    }
}

fn namespace_kind(kind: NamespaceDeclKind) -> NamespaceKind {
    match kind {
        NamespaceDeclKind::Class => NamespaceKind::Class,
        NamespaceDeclKind::Mixin => NamespaceKind::Mixin,
        NamespaceDeclKind::Interface => NamespaceKind::Interface,
        NamespaceDeclKind::Module => NamespaceKind::Module,
    }
}

/// 宏形参：未声明类型的形参接受任何语法节点
pub(crate) fn macro_params(decl: &MacroDecl<()>) -> Vec<Parameter> {
    decl.params
        .iter()
        .map(|p| {
            Parameter::new(p.name.clone(), Type::Untyped)
                .with_kind(parameter_kind(p.kind, p.default.is_some()))
        })
        .collect()
}

/// 解析类型参数的上下界
///
/// 返回替换了上下界的类型参数、带类型的声明节点和解析错误。
/// 上下界中可以引用 `outer` 和这组类型参数自身。
fn resolve_type_params(
    registry: &TypeRegistry,
    scopes: &[NamespaceId],
    outer: &[Arc<TypeParameter>],
    params: &[Arc<TypeParameter>],
    decls: &[TypeParamDecl<()>],
) -> (
    Vec<Arc<TypeParameter>>,
    Vec<TypeParamDecl<Type>>,
    Vec<TypeError>,
) {
    let visible: Vec<Arc<TypeParameter>> = outer.iter().chain(params.iter()).cloned().collect();
    let mut resolver = TypeResolver::new(registry, scopes, &visible, None);
    let mut bounded = Vec::with_capacity(params.len());
    let mut typed = Vec::with_capacity(decls.len());
    for (param, decl) in params.iter().zip(decls) {
        let upper = decl.upper_bound.as_ref().map(|b| resolver.resolve(b));
        let lower = decl.lower_bound.as_ref().map(|b| resolver.resolve(b));
        if upper.is_some() || lower.is_some() {
            let upper_type = upper.as_ref().map_or(Type::Any, |b| b.ty.clone());
            let lower_type = lower.as_ref().map_or(Type::Never, |b| b.ty.clone());
            bounded.push(Arc::new(
                (**param).clone().with_bounds(upper_type, lower_type),
            ));
        } else {
            bounded.push(param.clone());
        }
        typed.push(TypeParamDecl {
            name: decl.name.clone(),
            variance: decl.variance,
            upper_bound: upper,
            lower_bound: lower,
            span: decl.span,
        });
    }
    (bounded, typed, resolver.into_errors())
}

/// 收集别名目标中必须先定义的别名引用
///
/// 泛型类的实参、闭包签名等位置的引用可以保持惰性，不会被收集；
/// 泛型别名的头部总是被收集（应用时要代入它的定义）。
fn collect_alias_refs(
    registry: &TypeRegistry,
    scopes: &[NamespaceId],
    params: &[Arc<TypeParameter>],
    expr: &TypeExpr<()>,
    forced: bool,
    out: &mut Vec<(NamedTypeId, Span)>,
) {
    let named = |path: &[String]| -> Option<NamedTypeId> {
        if let [single] = path {
            if params.iter().any(|p| p.name == *single) {
                return None;
            }
        }
        match lookup_type_path(registry, scopes, path)? {
            Type::Named(id) => Some(id),
            _ => None,
        }
    };
    match &expr.kind {
        TypeExprKind::Name(path) => {
            if forced {
                if let Some(id) = named(path) {
                    out.push((id, expr.span));
                }
            }
        }
        TypeExprKind::Generic { name, args } => {
            if let Some(id) = named(name) {
                out.push((id, expr.span));
            }
            for arg in args {
                collect_alias_refs(registry, scopes, params, arg, false, out);
            }
        }
        TypeExprKind::Nilable(inner) | TypeExprKind::Not(inner) => {
            collect_alias_refs(registry, scopes, params, inner, forced, out);
        }
        TypeExprKind::Union(elements) | TypeExprKind::Intersection(elements) => {
            for element in elements {
                collect_alias_refs(registry, scopes, params, element, forced, out);
            }
        }
        TypeExprKind::Closure {
            params: closure_params,
            return_type,
            throw_type,
        } => {
            for param in closure_params {
                collect_alias_refs(registry, scopes, params, &param.ty, false, out);
            }
            for ty in return_type.iter().chain(throw_type.iter()) {
                collect_alias_refs(registry, scopes, params, ty, false, out);
            }
        }
        TypeExprKind::SingletonOf(inner) | TypeExprKind::InstanceOf(inner) => {
            collect_alias_refs(registry, scopes, params, inner, false, out);
        }
        TypeExprKind::Never
        | TypeExprKind::Any
        | TypeExprKind::Void
        | TypeExprKind::Nil
        | TypeExprKind::Bool
        | TypeExprKind::True
        | TypeExprKind::False
        | TypeExprKind::SelfType
        | TypeExprKind::Literal { .. } => {}
    }
}
