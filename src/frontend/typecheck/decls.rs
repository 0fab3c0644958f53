//! 声明一致性检查
//!
//! 在提升完成、命名空间图固定之后执行：
//!
//! - 非抽象类必须实现所有继承来的抽象方法
//! - 方法覆写必须与祖先中的签名兼容，且不能覆写 `sealed` 方法
//! - 实例变量不能以不同的类型重新声明

use std::sync::Arc;

use crate::frontend::core::type_system::{
    bindings_of, Callable, NamespaceId, NamespaceKind, Substituter, Type, TypeRegistry,
};
use crate::frontend::typecheck::checking::SubtypeChecker;
use crate::frontend::typecheck::errors::TypeError;
use crate::frontend::typecheck::hoist::DeclSites;
use crate::util::diagnostic::DiagnosticList;
use crate::util::span::Span;

/// 构造器不参与覆写检查
const CONSTRUCTOR: &str = "#init";

pub struct DeclChecker<'a> {
    registry: &'a TypeRegistry,
    file: Arc<str>,
    diagnostics: DiagnosticList,
}

impl<'a> DeclChecker<'a> {
    pub fn new(
        registry: &'a TypeRegistry,
        file: Arc<str>,
    ) -> Self {
        Self {
            registry,
            file,
            diagnostics: DiagnosticList::new(),
        }
    }

    pub fn check(
        mut self,
        sites: &DeclSites,
    ) -> DiagnosticList {
        for (id, span) in &sites.namespaces {
            if let Some(error) = self.missing_abstract_methods(*id, *span) {
                self.error(error);
            }
        }
        let mut checked: Vec<(NamespaceId, &str)> = Vec::new();
        for site in &sites.methods {
            let key = (site.owner, site.name.as_str());
            if site.name == CONSTRUCTOR || checked.contains(&key) {
                continue;
            }
            checked.push(key);
            if let Some(error) = self.check_override(site.owner, &site.name, site.span) {
                self.error(error);
            }
        }
        for site in &sites.instance_vars {
            if let Some(inherited) = self.inherited_instance_var(site.owner, &site.name) {
                if inherited != site.ty {
                    self.error(TypeError::InstanceVarRedeclared {
                        name: site.name.clone(),
                        is: self.registry.inspect(&site.ty),
                        should: self.registry.inspect(&inherited),
                        span: site.span,
                    });
                }
            }
        }
        tracing::debug!(
            diagnostics = self.diagnostics.len(),
            "declaration checks finished"
        );
        self.diagnostics
    }

    fn error(
        &mut self,
        error: TypeError,
    ) {
        self.diagnostics.push(error.into_diagnostic(&self.file));
    }

    /// 非抽象类中仍然是抽象的继承方法
    fn missing_abstract_methods(
        &self,
        id: NamespaceId,
        span: Span,
    ) -> Option<TypeError> {
        let namespace = self.registry.namespace(id);
        if namespace.kind != NamespaceKind::Class || namespace.flags.abstract_ {
            return None;
        }
        let instance = self.registry.self_instance(id);
        let mut seen: Vec<&str> = Vec::new();
        let mut details = Vec::new();
        for ancestor in self.registry.ancestors(&instance) {
            let Some(ancestor_id) = ancestor.namespace_id() else {
                continue;
            };
            for (name, method) in &self.registry.namespace(ancestor_id).methods {
                if !method.is_abstract() || seen.contains(&name.as_str()) {
                    continue;
                }
                seen.push(name);
                let still_abstract = self
                    .registry
                    .lookup_method(&instance, name)
                    .is_some_and(|(found, _)| found.is_abstract());
                if still_abstract {
                    details.push(format!(
                        "  - {}#{}: `{}`",
                        self.registry.namespace_name(ancestor_id),
                        name,
                        self.registry.inspect_signature(method)
                    ));
                }
            }
        }
        if details.is_empty() {
            return None;
        }
        Some(TypeError::MissingAbstractMethods {
            class: self.registry.namespace_name(id),
            details: details.join("\n"),
            span,
        })
    }

    /// 与祖先中最近的同名方法比较
    fn check_override(
        &self,
        owner: NamespaceId,
        name: &str,
        span: Span,
    ) -> Option<TypeError> {
        let method = self.registry.namespace(owner).methods.get(name)?;
        let instance = self.registry.self_instance(owner);
        let (base, ancestor) = self.inherited_method(&instance, name)?;
        if base.is_sealed() {
            return Some(TypeError::SealedOverride {
                method: name.to_string(),
                span,
            });
        }
        let checker = SubtypeChecker::new(self.registry).with_self(Some(instance));
        if checker.is_method_compatible(method, &base) {
            return None;
        }
        let parent = ancestor
            .namespace_id()
            .map(|id| self.registry.namespace_name(id))
            .unwrap_or_default();
        Some(TypeError::IncompatibleOverride {
            method: name.to_string(),
            parent,
            is: self.registry.inspect_signature(method),
            should: self.registry.inspect_signature(&base),
            span,
        })
    }

    /// 跳过自身，在祖先链上查找方法（代入泛型实参）
    fn inherited_method(
        &self,
        instance: &Type,
        name: &str,
    ) -> Option<(Arc<Callable>, Type)> {
        self.registry
            .ancestors(instance)
            .into_iter()
            .skip(1)
            .find_map(|ancestor| {
                let id = ancestor.namespace_id()?;
                let method = self.registry.namespace(id).methods.get(name)?;
                let method = match &ancestor {
                    Type::Generic(generic) => {
                        let bindings = bindings_of(generic);
                        Arc::new(Substituter::new(&bindings).apply_callable(method))
                    }
                    _ => method.clone(),
                };
                Some((method, ancestor))
            })
    }

    fn inherited_instance_var(
        &self,
        owner: NamespaceId,
        name: &str,
    ) -> Option<Type> {
        let instance = self.registry.self_instance(owner);
        self.registry
            .ancestors(&instance)
            .into_iter()
            .skip(1)
            .find_map(|ancestor| {
                let id = ancestor.namespace_id()?;
                let ivar = self.registry.namespace(id).instance_vars.get(name)?;
                Some(match &ancestor {
                    Type::Generic(generic) => {
                        let bindings = bindings_of(generic);
                        Substituter::new(&bindings).apply(ivar)
                    }
                    _ => ivar.clone(),
                })
            })
    }
}
