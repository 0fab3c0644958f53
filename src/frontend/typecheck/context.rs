//! 检查上下文
//!
//! 每个检查任务（方法体、宏体、常量、脚本体）拥有一个独立的
//! [`CheckContext`]：模式、词法命名空间栈、局部变量作用域栈、
//! 循环与 `catch` 栈以及诊断列表。所有任务共享只读的 [`CheckEnv`]。

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::frontend::ast::{ConstantDecl, MacroDecl};
use crate::frontend::core::type_system::{
    ConstantDeclId, NamespaceId, Type, TypeParameter, TypeRegistry,
};
use crate::frontend::typecheck::checking::{Normalizer, SubtypeChecker};
use crate::frontend::typecheck::errors::{InternalError, TypeError};
use crate::frontend::typecheck::inference::statements::check_constant;
use crate::frontend::typecheck::methods::MethodResolver;
use crate::frontend::typecheck::tasks::panic_message;
use crate::util::diagnostic::DiagnosticList;
use crate::util::span::Span;

/// 延迟检查的声明的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckState {
    #[default]
    New,
    Checking,
    Checked,
}

/// 常量的检查结果
#[derive(Debug, Default)]
pub struct ConstantState {
    pub check: CheckState,
    pub ty: Option<Type>,
    pub typed: Option<ConstantDecl<Type>>,
    pub diagnostics: DiagnosticList,
    /// 检查初始值时的内部错误；此时常量的类型是 `untyped`
    pub internal: Option<InternalError>,
}

/// 常量声明
#[derive(Debug)]
pub struct ConstantEntry {
    /// 全名
    pub name: String,
    pub namespace: NamespaceId,
    pub decl: ConstantDecl<()>,
    /// 声明处的词法命名空间栈快照
    pub scopes: Vec<NamespaceId>,
    pub span: Span,
    pub state: Mutex<ConstantState>,
}

/// 宏声明
#[derive(Debug, Clone)]
pub struct MacroEntry {
    pub name: String,
    pub namespace: NamespaceId,
    pub decl: MacroDecl<()>,
    pub scopes: Vec<NamespaceId>,
}

/// 提升阶段登记的延迟声明
#[derive(Debug, Default)]
pub struct DeclTable {
    pub constants: Vec<ConstantEntry>,
    pub macros: Vec<MacroEntry>,
}

impl DeclTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_constant(
        &mut self,
        entry: ConstantEntry,
    ) -> ConstantDeclId {
        let id = ConstantDeclId(self.constants.len() as u32);
        self.constants.push(entry);
        id
    }

    pub fn constant(
        &self,
        id: ConstantDeclId,
    ) -> &ConstantEntry {
        &self.constants[id.0 as usize]
    }

    /// 在词法作用域中查找宏
    pub fn lookup_macro(
        &self,
        scopes: &[NamespaceId],
        name: &str,
    ) -> Option<&MacroEntry> {
        scopes
            .iter()
            .rev()
            .find_map(|scope| {
                self.macros
                    .iter()
                    .find(|m| m.namespace == *scope && m.decl.name == name)
            })
            .or_else(|| self.macros.iter().find(|m| m.decl.name == name))
    }

    /// 常量的类型，必要时先检查它的初始值
    ///
    /// 正在检查中的常量再次被引用时报告循环引用。
    pub fn constant_type(
        &self,
        env: &CheckEnv<'_>,
        id: ConstantDeclId,
        span: Span,
    ) -> Result<Type, TypeError> {
        let entry = self.constant(id);
        {
            let mut state = entry.state.lock();
            match state.check {
                CheckState::Checked => return Ok(state.ty.clone().unwrap_or(Type::Untyped)),
                CheckState::Checking => return Err(TypeError::circular("constant", &entry.name, span)),
                CheckState::New => state.check = CheckState::Checking,
            }
        }
        tracing::debug!(constant = %entry.name, "checking constant");
        let checked = catch_unwind(AssertUnwindSafe(|| check_constant(env, entry)))
            .unwrap_or_else(|payload| {
                Err(InternalError::new(
                    format!("constant {}", entry.name),
                    panic_message(payload.as_ref()),
                    entry.span,
                ))
            });
        let mut state = entry.state.lock();
        state.check = CheckState::Checked;
        match checked {
            Ok((typed, ty, diagnostics)) => {
                state.ty = Some(ty.clone());
                state.typed = Some(typed);
                state.diagnostics = diagnostics;
                Ok(ty)
            }
            Err(error) => {
                tracing::error!(constant = %entry.name, "{}", error);
                state.ty = Some(Type::Untyped);
                state.internal = Some(error);
                Ok(Type::Untyped)
            }
        }
    }
}

/// 所有任务共享的只读环境
pub struct CheckEnv<'a> {
    pub registry: &'a TypeRegistry,
    pub decls: &'a DeclTable,
    pub file: Arc<str>,
}

/// 检查模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// 顶层脚本
    TopLevel,
    /// 命名空间体中的表达式
    NamespaceBody,
    Method,
    Closure,
    Constant,
    Macro,
}

/// 局部变量
#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    /// 声明类型
    pub declared: Type,
    /// 当前（收窄后的）类型
    pub ty: Type,
    pub initialized: bool,
    /// `val`
    pub single_assignment: bool,
    /// 外层变量在本作用域中的收窄副本
    pub shadow: bool,
}

impl Local {
    pub fn new(
        ty: Type,
        initialized: bool,
        single_assignment: bool,
    ) -> Self {
        Self {
            declared: ty.clone(),
            ty,
            initialized,
            single_assignment,
            shadow: false,
        }
    }
}

/// 局部变量作用域
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub locals: IndexMap<String, Local>,
    /// 闭包边界：向外查找时只能看到声明类型
    pub closure_boundary: bool,
}

/// 单个检查任务的上下文
pub struct CheckContext<'a> {
    pub env: &'a CheckEnv<'a>,
    pub mode: Mode,
    /// 词法命名空间栈（常量和类型查找）
    pub namespaces: Vec<NamespaceId>,
    /// 隐式接收者调用的查找目标
    pub method_scope: Option<NamespaceId>,
    pub type_params: Vec<Arc<TypeParameter>>,
    pub self_type: Option<Type>,
    pub scopes: Vec<Scope>,
    /// 期望的返回类型
    pub return_type: Option<Type>,
    /// 允许抛出的类型
    pub throw_type: Type,
    pub loop_depth: usize,
    /// `try` 栈，每层收集抛出的类型
    pub catch_frames: Vec<Vec<Type>>,
    /// 未声明返回类型的闭包中 `return` 的值类型
    pub closure_returns: Vec<Vec<Type>>,
    pub diagnostics: DiagnosticList,
}

impl<'a> CheckContext<'a> {
    pub fn new(
        env: &'a CheckEnv<'a>,
        mode: Mode,
        namespaces: Vec<NamespaceId>,
    ) -> Self {
        Self {
            env,
            mode,
            namespaces,
            method_scope: None,
            type_params: Vec::new(),
            self_type: None,
            scopes: vec![Scope::default()],
            return_type: None,
            throw_type: Type::Never,
            loop_depth: 0,
            catch_frames: Vec::new(),
            closure_returns: Vec::new(),
            diagnostics: DiagnosticList::new(),
        }
    }

    pub fn registry(&self) -> &'a TypeRegistry {
        self.env.registry
    }

    pub fn subtype_checker(&self) -> SubtypeChecker<'a> {
        SubtypeChecker::new(self.env.registry).with_self(self.self_type.clone())
    }

    pub fn normalizer(&self) -> Normalizer<'a> {
        Normalizer::new(self.env.registry)
    }

    pub fn method_resolver(&self) -> MethodResolver<'a> {
        MethodResolver::new(self.env.registry).with_self(self.self_type.clone())
    }

    pub fn inspect(
        &self,
        ty: &Type,
    ) -> String {
        self.env.registry.inspect(ty)
    }

    /// 记录诊断
    pub fn error(
        &mut self,
        error: TypeError,
    ) {
        tracing::trace!(code = error.code(), "{}", error);
        self.diagnostics.push(error.into_diagnostic(&self.env.file));
    }

    pub fn errors(
        &mut self,
        errors: impl IntoIterator<Item = TypeError>,
    ) {
        for error in errors {
            self.error(error);
        }
    }

    pub fn is_subtype(
        &self,
        sub: &Type,
        sup: &Type,
    ) -> bool {
        self.subtype_checker().is_subtype(sub, sup)
    }

    /// 检查可赋值性，不满足时报告诊断
    ///
    /// 目标是接口时，诊断逐行列出缺失或不兼容的成员。
    pub fn check_assignable(
        &mut self,
        value: &Type,
        target: &Type,
        span: Span,
    ) -> bool {
        let checker = self.subtype_checker();
        if checker.is_subtype(value, target) {
            return true;
        }
        let mut details = String::new();
        let iface = match target {
            Type::Named(id) => self.registry().resolve_named(*id).cloned(),
            other => Some(other.clone()),
        };
        if let Some(iface @ Type::Interface(_)) = iface {
            let issues = checker.interface_issues(value, &iface);
            if !issues.is_empty() {
                details.push_str(&format!(
                    ":\n  `{}` does not implement interface `{}`:\n{}",
                    self.inspect(value),
                    self.inspect(&iface),
                    issues.join("\n")
                ));
            }
        }
        let error = TypeError::NotAssignable {
            value: self.inspect(value),
            target: self.inspect(target),
            details,
            span,
        };
        self.error(error);
        false
    }

    // ------------------------------------------------------------------
    // 局部变量
    // ------------------------------------------------------------------

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn push_closure_scope(&mut self) {
        self.scopes.push(Scope {
            locals: IndexMap::new(),
            closure_boundary: true,
        });
    }

    pub fn pop_scope(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    /// 在当前作用域声明局部变量
    pub fn declare_local(
        &mut self,
        name: &str,
        local: Local,
    ) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.locals.insert(name.to_string(), local);
        }
    }

    pub fn is_declared_in_current_scope(
        &self,
        name: &str,
    ) -> bool {
        self.scopes
            .last()
            .and_then(|scope| scope.locals.get(name))
            .is_some_and(|local| !local.shadow)
    }

    /// 查找局部变量；越过闭包边界时只暴露声明类型
    pub fn lookup_local(
        &self,
        name: &str,
    ) -> Option<Local> {
        let mut crossed_closure = false;
        for scope in self.scopes.iter().rev() {
            if let Some(local) = scope.locals.get(name) {
                let mut local = local.clone();
                if crossed_closure {
                    local.ty = local.declared.clone();
                }
                return Some(local);
            }
            if scope.closure_boundary {
                crossed_closure = true;
            }
        }
        None
    }

    /// 收窄局部变量的当前类型
    ///
    /// 变量声明在外层作用域时，在当前作用域安装一个收窄副本，
    /// 离开作用域时自动丢弃。
    pub fn narrow_local(
        &mut self,
        name: &str,
        ty: Type,
    ) {
        let Some(existing) = self.lookup_local(name) else {
            return;
        };
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        match scope.locals.get_mut(name) {
            Some(local) => local.ty = ty,
            None => {
                scope.locals.insert(
                    name.to_string(),
                    Local {
                        ty,
                        shadow: true,
                        ..existing
                    },
                );
            }
        }
    }

    /// 赋值后的收窄
    ///
    /// 当前作用域取赋值后的类型；外层作用域看到的类型退回声明类型，
    /// 因为赋值可能只发生在某个分支或某次循环中。
    pub fn assign_local(
        &mut self,
        name: &str,
        ty: Type,
    ) {
        let depth = self.scopes.len().saturating_sub(1);
        self.reset_local_in(name, depth);
        self.narrow_local(name, ty);
    }

    /// 丢弃局部变量在所有作用域中的收窄
    pub fn reset_local(
        &mut self,
        name: &str,
    ) {
        let depth = self.scopes.len();
        self.reset_local_in(name, depth);
    }

    /// 重置前 `depth` 层作用域中的收窄，直到遇到原始声明
    fn reset_local_in(
        &mut self,
        name: &str,
        depth: usize,
    ) {
        for scope in self.scopes[..depth].iter_mut().rev() {
            if let Some(local) = scope.locals.get_mut(name) {
                local.ty = local.declared.clone();
                if !local.shadow {
                    return;
                }
            }
        }
    }

    /// 把局部变量标记为已初始化（写到原始声明上）
    pub fn mark_initialized(
        &mut self,
        name: &str,
    ) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(local) = scope.locals.get_mut(name) {
                local.initialized = true;
                if !local.shadow {
                    return;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // 类型工具
    // ------------------------------------------------------------------

    pub fn union(
        &self,
        types: Vec<Type>,
    ) -> Type {
        self.normalizer().union(types)
    }

    /// 记录一次 `throw`；在 `try` 中时交给 `catch` 处理
    pub fn record_throw(
        &mut self,
        ty: Type,
        span: Span,
    ) {
        if let Some(frame) = self.catch_frames.last_mut() {
            frame.push(ty);
            return;
        }
        let allowed = self.throw_type.clone();
        if !self.is_subtype(&ty, &allowed) {
            let error = TypeError::UncaughtThrow {
                ty: self.inspect(&ty),
                span,
            };
            self.error(error);
        }
    }
}
