//! 表达式检查
//!
//! 对每个表达式节点产出带类型的节点。出错的表达式类型为 `untyped`，
//! 以抑制级联诊断；检查总会继续下去。

use std::sync::Arc;

use crate::frontend::ast::{
    Arguments, Block, CatchClause, Expr, ExprKind, LogicalOp, MatchCase, NamedArgument, ParamDecl,
    TypeExpr, UnaryOp,
};
use crate::frontend::core::type_system::{
    Callable, ConstantSlot, NamespaceId, NamespaceKind, Parameter, ParameterKind, Type,
    TypeBindings, TypeRegistry,
};
use crate::frontend::typecheck::call::{bind_arguments, ArgumentSlot};
use crate::frontend::typecheck::context::{CheckContext, Local, Mode};
use crate::frontend::typecheck::errors::TypeError;
use crate::frontend::typecheck::inference::generics::{
    replace_type_parameters, widen_literals, TypeArgumentInferrer,
};
use crate::frontend::typecheck::inference::narrowing::{assigned_locals, collect_assigned};
use crate::frontend::typecheck::methods::MethodLookup;
use crate::frontend::typecheck::type_expr::{parameter_kind, TypeResolver};
use crate::util::span::Span;

impl<'a> CheckContext<'a> {
    /// 解析类型表达式并报告其中的错误
    pub fn resolve_type_expr(
        &mut self,
        expr: &TypeExpr<()>,
    ) -> TypeExpr<Type> {
        self.resolve_with(expr, false)
    }

    /// 解析用作类的类型表达式（`Foo(...)`、`a <: Foo`、对象模式），允许省略泛型实参
    pub fn resolve_class_expr(
        &mut self,
        expr: &TypeExpr<()>,
    ) -> TypeExpr<Type> {
        self.resolve_with(expr, true)
    }

    fn resolve_with(
        &mut self,
        expr: &TypeExpr<()>,
        bare_generic: bool,
    ) -> TypeExpr<Type> {
        let namespaces = self.namespaces.clone();
        let type_params = self.type_params.clone();
        let self_type = self.self_type.clone();
        let mut resolver =
            TypeResolver::new(self.registry(), &namespaces, &type_params, self_type.as_ref());
        if bare_generic {
            resolver = resolver.allow_bare_generic();
        }
        let typed = resolver.resolve(expr);
        self.errors(resolver.into_errors());
        typed
    }

    /// 检查表达式；`expected` 用于闭包参数和空集合字面量的推断
    pub fn check_expr(
        &mut self,
        expr: &Expr<()>,
        expected: Option<&Type>,
    ) -> Expr<Type> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Nil => Expr::typed(ExprKind::Nil, span, Type::Nil),
            ExprKind::True => Expr::typed(ExprKind::True, span, Type::True),
            ExprKind::False => Expr::typed(ExprKind::False, span, Type::False),
            ExprKind::SelfLiteral => {
                let ty = match &self.self_type {
                    Some(self_type) => self_type.clone(),
                    None => {
                        self.error(TypeError::SelfOutsideMethod { span });
                        Type::Untyped
                    }
                };
                Expr::typed(ExprKind::SelfLiteral, span, ty)
            }
            ExprKind::Literal { kind, value } => Expr::typed(
                ExprKind::Literal {
                    kind: *kind,
                    value: value.clone(),
                },
                span,
                Type::literal(*kind, value.clone()),
            ),
            ExprKind::Ident(name) => {
                let ty = self.check_ident(name, span);
                Expr::typed(ExprKind::Ident(name.clone()), span, ty)
            }
            ExprKind::InstanceVar(name) => {
                let ty = self.check_instance_var(name, span);
                Expr::typed(ExprKind::InstanceVar(name.clone()), span, ty)
            }
            ExprKind::Constant(path) => {
                let ty = self.check_constant_path(path, span);
                Expr::typed(ExprKind::Constant(path.clone()), span, ty)
            }
            ExprKind::Var {
                name,
                type_expr,
                init,
                single_assignment,
            } => self.check_var(name, type_expr.as_ref(), init.as_deref(), *single_assignment, span),
            ExprKind::Assign { name, value } => self.check_assign(name, value, span),
            ExprKind::IvarAssign { name, value } => {
                let target = self.check_instance_var(name, span);
                let value = self.check_expr(value, Some(&target));
                if !target.is_untyped() {
                    self.check_assignable(&value.ty, &target, value.span);
                }
                let ty = value.ty.clone();
                Expr::typed(
                    ExprKind::IvarAssign {
                        name: name.clone(),
                        value: Box::new(value),
                    },
                    span,
                    ty,
                )
            }
            ExprKind::Call {
                receiver,
                method,
                type_args,
                args,
                nil_safe,
            } => self.check_method_call(receiver.as_deref(), method, type_args, args, *nil_safe, span),
            ExprKind::New { class, args } => self.check_new(class, args, span),
            ExprKind::MacroCall {
                name, expansion, ..
            } => {
                let expansion = expansion
                    .as_deref()
                    .map(|expansion| Box::new(self.check_expr(expansion, expected)));
                let ty = expansion.as_ref().map_or(Type::Untyped, |e| e.ty.clone());
                Expr::typed(
                    ExprKind::MacroCall {
                        name: name.clone(),
                        args: Arguments::default(),
                        expansion,
                    },
                    span,
                    ty,
                )
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.check_expr(left, None);
                let (args, ty) = self.check_operator(&left.ty, op.method_name(), right, span);
                let right = args.positional.into_iter().next().unwrap_or_else(|| {
                    Expr::typed(ExprKind::Invalid, span, Type::Untyped)
                });
                Expr::typed(
                    ExprKind::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    span,
                    ty,
                )
            }
            ExprKind::Logical { op, left, right } => self.check_logical(*op, left, right, span),
            ExprKind::Unary { op, operand } => {
                let operand = self.check_expr(operand, None);
                let ty = match op {
                    UnaryOp::Not => {
                        if self.always_truthy(&operand.ty) {
                            Type::False
                        } else if self.always_falsy(&operand.ty) {
                            Type::True
                        } else {
                            Type::Bool
                        }
                    }
                    UnaryOp::Minus => self.check_unary_method(&operand.ty, "-@", span),
                };
                Expr::typed(
                    ExprKind::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    },
                    span,
                    ty,
                )
            }
            ExprKind::IsA {
                value,
                class,
                exact,
            } => {
                let value = self.check_expr(value, None);
                let class = self.resolve_class_expr(class);
                let ty = if self.subtype_checker().can_intersect(&value.ty, &class.ty) {
                    Type::Bool
                } else {
                    Type::False
                };
                Expr::typed(
                    ExprKind::IsA {
                        value: Box::new(value),
                        class: Box::new(class),
                        exact: *exact,
                    },
                    span,
                    ty,
                )
            }
            ExprKind::If {
                condition,
                then_body,
                else_body,
            } => self.check_if(condition, then_body, else_body.as_ref(), span),
            ExprKind::While { condition, body } => {
                // 循环体中赋值的变量在每次迭代开始时只能按声明类型看待
                let mut assigned = assigned_locals(body);
                collect_assigned(condition, &mut assigned);
                for name in &assigned {
                    self.reset_local(name);
                }
                let condition = self.check_expr(condition, None);
                self.push_scope();
                self.narrow(&condition, true);
                self.loop_depth += 1;
                let (body, _) = self.check_block(body);
                self.loop_depth -= 1;
                self.pop_scope();
                Expr::typed(
                    ExprKind::While {
                        condition: Box::new(condition),
                        body,
                    },
                    span,
                    Type::Nil,
                )
            }
            ExprKind::Match {
                value,
                cases,
                else_body,
            } => self.check_match(value, cases, else_body.as_ref(), span),
            ExprKind::Do(body) => {
                self.push_scope();
                let (body, ty) = self.check_block(body);
                self.pop_scope();
                Expr::typed(ExprKind::Do(body), span, ty)
            }
            ExprKind::Return(value) => self.check_return(value.as_deref(), span),
            ExprKind::Throw(value) => {
                let value = self.check_expr(value, None);
                self.record_throw(value.ty.clone(), span);
                Expr::typed(ExprKind::Throw(Box::new(value)), span, Type::Never)
            }
            ExprKind::Break => self.check_jump(ExprKind::Break, "break", span),
            ExprKind::Continue => self.check_jump(ExprKind::Continue, "continue", span),
            ExprKind::Try { body, catches } => self.check_try(body, catches, span),
            ExprKind::Closure {
                params,
                return_type,
                throw_type,
                body,
            } => self.check_closure(params, return_type.as_ref(), throw_type.as_ref(), body, expected, span),
            ExprKind::ArrayList(elements) => self.check_array_list(elements, expected, span),
            ExprKind::HashMap(pairs) => self.check_hash_map(pairs, expected, span),
            ExprKind::Invalid => Expr::typed(ExprKind::Invalid, span, Type::Untyped),
        }
    }

    // ------------------------------------------------------------------
    // 变量与常量
    // ------------------------------------------------------------------

    fn check_ident(
        &mut self,
        name: &str,
        span: Span,
    ) -> Type {
        match self.lookup_local(name) {
            Some(local) => {
                if !local.initialized {
                    self.error(TypeError::UninitializedLocal {
                        name: name.to_string(),
                        span,
                    });
                    return Type::Untyped;
                }
                local.ty
            }
            None => {
                self.error(TypeError::UndefinedLocal {
                    name: name.to_string(),
                    span,
                });
                Type::Untyped
            }
        }
    }

    fn check_instance_var(
        &mut self,
        name: &str,
        span: Span,
    ) -> Type {
        let Some(self_type) = self.self_type.clone() else {
            self.error(TypeError::SelfOutsideMethod { span });
            return Type::Untyped;
        };
        match self.registry().lookup_instance_var(&self_type, name) {
            Some(ty) => ty,
            None => {
                let owner = self.inspect(&self_type);
                self.error(TypeError::UndefinedInstanceVar {
                    name: name.to_string(),
                    owner,
                    span,
                });
                Type::Untyped
            }
        }
    }

    /// 常量路径：第一段在词法作用域中由内向外查找，其余段逐级查找
    pub fn check_constant_path(
        &mut self,
        path: &[String],
        span: Span,
    ) -> Type {
        let registry = self.registry();
        let Some((first, rest)) = path.split_first() else {
            return Type::Untyped;
        };
        let mut slot = self
            .namespaces
            .iter()
            .rev()
            .find_map(|scope| registry.lookup_constant(*scope, first))
            .or_else(|| registry.lookup_constant(registry.root(), first))
            .or_else(|| registry.lookup_constant(registry.std_module(), first))
            .cloned();
        for segment in rest {
            let container = match &slot {
                Some(ConstantSlot::Value(ty)) => constant_namespace(registry, ty),
                _ => None,
            };
            slot = container.and_then(|id| registry.lookup_constant(id, segment).cloned());
        }
        match slot {
            Some(ConstantSlot::Value(ty)) => ty,
            Some(ConstantSlot::Declared(id)) => {
                match self.env.decls.constant_type(self.env, id, span) {
                    Ok(ty) => ty,
                    Err(error) => {
                        self.error(error);
                        Type::Untyped
                    }
                }
            }
            None => {
                self.error(TypeError::UndefinedConstant {
                    name: path.join("::"),
                    span,
                });
                Type::Untyped
            }
        }
    }

    fn check_var(
        &mut self,
        name: &str,
        type_expr: Option<&TypeExpr<()>>,
        init: Option<&Expr<()>>,
        single_assignment: bool,
        span: Span,
    ) -> Expr<Type> {
        if self.is_declared_in_current_scope(name) {
            self.error(TypeError::RedeclaredLocal {
                name: name.to_string(),
                span,
            });
        }
        let type_expr = type_expr.map(|t| self.resolve_type_expr(t));
        let declared = type_expr.as_ref().map(|t| t.ty.clone());
        let init = init.map(|init| self.check_expr(init, declared.as_ref()));

        let local_type = match (&declared, &init) {
            (Some(declared), Some(init)) => {
                self.check_assignable(&init.ty, declared, init.span);
                declared.clone()
            }
            (Some(declared), None) => declared.clone(),
            (None, Some(init)) if single_assignment => init.ty.clone(),
            (None, Some(init)) => widen_literals(self.registry(), &init.ty),
            (None, None) => Type::Untyped,
        };
        self.declare_local(
            name,
            Local::new(local_type, init.is_some(), single_assignment),
        );
        let ty = init.as_ref().map_or(Type::Void, |init| init.ty.clone());
        Expr::typed(
            ExprKind::Var {
                name: name.to_string(),
                type_expr,
                init: init.map(Box::new),
                single_assignment,
            },
            span,
            ty,
        )
    }

    fn check_assign(
        &mut self,
        name: &str,
        value: &Expr<()>,
        span: Span,
    ) -> Expr<Type> {
        let local = self.lookup_local(name);
        let expected = local.as_ref().map(|l| l.declared.clone());
        let value = self.check_expr(value, expected.as_ref());
        match local {
            None => self.error(TypeError::UndefinedLocal {
                name: name.to_string(),
                span,
            }),
            Some(local) => {
                if local.single_assignment && local.initialized {
                    self.error(TypeError::ReassignedValue {
                        name: name.to_string(),
                        span,
                    });
                }
                if self.check_assignable(&value.ty, &local.declared, value.span) {
                    let widened = widen_literals(self.registry(), &value.ty);
                    let narrowed = self
                        .normalizer()
                        .intersection(vec![local.declared.clone(), widened]);
                    self.assign_local(name, narrowed);
                }
                self.mark_initialized(name);
            }
        }
        let ty = value.ty.clone();
        Expr::typed(
            ExprKind::Assign {
                name: name.to_string(),
                value: Box::new(value),
            },
            span,
            ty,
        )
    }

    // ------------------------------------------------------------------
    // 调用
    // ------------------------------------------------------------------

    fn implicit_receiver(&self) -> Type {
        match &self.self_type {
            Some(self_type) => self_type.clone(),
            None => Type::Class(self.registry().builtins().object),
        }
    }

    fn check_method_call(
        &mut self,
        receiver: Option<&Expr<()>>,
        method: &str,
        type_args: &[TypeExpr<()>],
        args: &Arguments<()>,
        nil_safe: bool,
        span: Span,
    ) -> Expr<Type> {
        let receiver = receiver.map(|r| self.check_expr(r, None));
        let receiver_type = match &receiver {
            Some(receiver) => receiver.ty.clone(),
            None => self.implicit_receiver(),
        };
        let (lookup_type, nil_safe_applied) = if nil_safe {
            let rest = self.normalizer().difference(&receiver_type, &Type::Nil);
            let applied = rest != receiver_type;
            (rest, applied)
        } else {
            (receiver_type.clone(), false)
        };

        let type_args: Vec<TypeExpr<Type>> =
            type_args.iter().map(|t| self.resolve_type_expr(t)).collect();
        let (args, ty) = match self.method_resolver().resolve(&lookup_type, method) {
            MethodLookup::Found(found) => {
                self.check_call(&found.callable, &type_args, args, TypeBindings::new(), span)
            }
            MethodLookup::Untyped => (self.check_args_unbound(args), Type::Untyped),
            MethodLookup::Missing => {
                let receiver = self.inspect(&lookup_type);
                self.error(TypeError::UndefinedMethod {
                    method: method.to_string(),
                    receiver,
                    span,
                });
                (self.check_args_unbound(args), Type::Untyped)
            }
            MethodLookup::InvalidReceiver => {
                let receiver = self.inspect(&lookup_type);
                self.error(TypeError::InvalidReceiver {
                    method: method.to_string(),
                    receiver,
                    span,
                });
                (self.check_args_unbound(args), Type::Untyped)
            }
        };
        let ty = if nil_safe_applied {
            self.union(vec![ty, Type::Nil])
        } else {
            ty
        };
        Expr::typed(
            ExprKind::Call {
                receiver: receiver.map(Box::new),
                method: method.to_string(),
                type_args,
                args,
                nil_safe,
            },
            span,
            ty,
        )
    }

    fn check_operator(
        &mut self,
        left: &Type,
        method: &str,
        right: &Expr<()>,
        span: Span,
    ) -> (Arguments<Type>, Type) {
        let args = Arguments::positional(vec![right.clone()]);
        match self.method_resolver().resolve(left, method) {
            MethodLookup::Found(found) => {
                self.check_call(&found.callable, &[], &args, TypeBindings::new(), span)
            }
            MethodLookup::Untyped => (self.check_args_unbound(&args), Type::Untyped),
            MethodLookup::Missing | MethodLookup::InvalidReceiver => {
                let receiver = self.inspect(left);
                self.error(TypeError::UndefinedMethod {
                    method: method.to_string(),
                    receiver,
                    span,
                });
                (self.check_args_unbound(&args), Type::Untyped)
            }
        }
    }

    fn check_unary_method(
        &mut self,
        operand: &Type,
        method: &str,
        span: Span,
    ) -> Type {
        match self.method_resolver().resolve(operand, method) {
            MethodLookup::Found(found) => found.callable.return_type.clone(),
            MethodLookup::Untyped => Type::Untyped,
            MethodLookup::Missing | MethodLookup::InvalidReceiver => {
                let receiver = self.inspect(operand);
                self.error(TypeError::UndefinedMethod {
                    method: method.to_string(),
                    receiver,
                    span,
                });
                Type::Untyped
            }
        }
    }

    /// 不知道形参时仍然检查实参，以便给它们标注类型
    fn check_args_unbound(
        &mut self,
        args: &Arguments<()>,
    ) -> Arguments<Type> {
        Arguments {
            positional: args
                .positional
                .iter()
                .map(|a| self.check_expr(a, None))
                .collect(),
            named: args
                .named
                .iter()
                .map(|a| NamedArgument {
                    name: a.name.clone(),
                    value: self.check_expr(&a.value, None),
                    span: a.span,
                })
                .collect(),
        }
    }

    /// 绑定并检查实参，必要时推断类型参数，返回带类型的实参和返回类型
    pub fn check_call(
        &mut self,
        callable: &Callable,
        type_args: &[TypeExpr<Type>],
        args: &Arguments<()>,
        seed: TypeBindings,
        span: Span,
    ) -> (Arguments<Type>, Type) {
        let method = callable.name.clone();
        let named_names: Vec<&str> = args.named.iter().map(|a| a.name.as_str()).collect();
        let plan = bind_arguments(callable, args.positional.len(), &named_names);
        let named_spans: Vec<Span> = args.named.iter().map(|a| a.span).collect();
        for issue in &plan.issues {
            self.error(issue.to_error(&method, &named_spans, span));
        }

        // 显式类型实参
        let mut seed = seed;
        if !type_args.is_empty() {
            if type_args.len() != callable.type_params.len() {
                self.error(TypeError::TypeArgumentCount {
                    name: method.clone(),
                    expected: callable.type_params.len(),
                    given: type_args.len(),
                    span,
                });
            } else {
                for (param, arg) in callable.type_params.iter().zip(type_args) {
                    seed.insert(param.name.clone(), arg.ty.clone());
                }
            }
        }
        let mut inferrer =
            TypeArgumentInferrer::new(self.registry(), &callable.type_params, span).with_bindings(seed);
        let mut failed = false;

        let mut positional: Vec<Option<Expr<Type>>> = vec![None; args.positional.len()];
        let mut named: Vec<Option<Expr<Type>>> = vec![None; args.named.len()];

        for (param, slot) in callable.params.iter().zip(plan.slots.iter()) {
            let indices: Vec<(bool, usize)> = match slot {
                ArgumentSlot::Positional(i) => vec![(false, *i)],
                ArgumentSlot::Named(i) => vec![(true, *i)],
                ArgumentSlot::Rest(list) => list.iter().map(|i| (false, *i)).collect(),
                ArgumentSlot::NamedRest(list) => list.iter().map(|i| (true, *i)).collect(),
                ArgumentSlot::Undefined => Vec::new(),
            };
            for (is_named, index) in indices {
                let source = if is_named {
                    &args.named[index].value
                } else {
                    &args.positional[index]
                };
                let expected = inferrer.substitute(&param.ty);
                let typed = self.check_expr(source, Some(&expected));
                let instantiated = if failed {
                    None
                } else {
                    inferrer.infer(&typed.ty, &param.ty)
                };
                match instantiated {
                    Some(instantiated) => {
                        if !self.is_subtype(&typed.ty, &instantiated) {
                            let error = TypeError::ArgumentType {
                                param: param.name.clone(),
                                method: method.clone(),
                                expected: self.inspect(&instantiated),
                                given: self.inspect(&typed.ty),
                                span: typed.span,
                            };
                            self.error(error);
                        }
                    }
                    None if !failed => {
                        failed = true;
                        self.errors(inferrer.take_errors());
                        self.error(TypeError::CannotInfer {
                            method: method.clone(),
                            span,
                        });
                    }
                    None => {}
                }
                if is_named {
                    named[index] = Some(typed);
                } else {
                    positional[index] = Some(typed);
                }
            }
        }

        // 没有绑定到形参的实参也要检查
        let positional: Vec<Expr<Type>> = positional
            .into_iter()
            .zip(args.positional.iter())
            .map(|(typed, source)| typed.unwrap_or_else(|| self.check_expr(source, None)))
            .collect();
        let named: Vec<NamedArgument<Type>> = named
            .into_iter()
            .zip(args.named.iter())
            .map(|(typed, source)| NamedArgument {
                name: source.name.clone(),
                value: typed.unwrap_or_else(|| self.check_expr(&source.value, None)),
                span: source.span,
            })
            .collect();

        let (bindings, errors) = inferrer.finish();
        if failed {
            return (Arguments { positional, named }, Type::Untyped);
        }
        self.errors(errors);
        let return_type =
            replace_type_parameters(self.registry(), &callable.return_type, &bindings, None);
        let throw_type =
            replace_type_parameters(self.registry(), &callable.throw_type, &bindings, None);
        if !throw_type.is_never() {
            self.record_throw(throw_type, span);
        }
        (Arguments { positional, named }, return_type)
    }

    fn check_new(
        &mut self,
        class: &TypeExpr<()>,
        args: &Arguments<()>,
        span: Span,
    ) -> Expr<Type> {
        let class = self.resolve_class_expr(class);
        let registry = self.registry();
        let target = match &class.ty {
            Type::Nil | Type::Bool | Type::True | Type::False => registry.backing_class(&class.ty),
            other => Some(other.clone()),
        };
        let Some(id) = target.as_ref().and_then(Type::namespace_id) else {
            if !class.ty.is_untyped() {
                let name = self.inspect(&class.ty);
                self.error(TypeError::CannotInstantiate {
                    class: name,
                    reason: "type",
                    span,
                });
            }
            let args = self.check_args_unbound(args);
            return Expr::typed(
                ExprKind::New {
                    class: Box::new(class),
                    args,
                },
                span,
                Type::Untyped,
            );
        };

        let namespace = registry.namespace(id);
        let reason = match namespace.kind {
            NamespaceKind::Class if namespace.flags.abstract_ => Some("abstract class"),
            NamespaceKind::Class if namespace.flags.primitive => Some("primitive class"),
            NamespaceKind::Class => None,
            NamespaceKind::Mixin => Some("mixin"),
            NamespaceKind::Interface => Some("interface"),
            NamespaceKind::Module => Some("module"),
            NamespaceKind::SingletonClass => Some("singleton class"),
        };
        if let Some(reason) = reason {
            let name = registry.namespace_name(id);
            self.error(TypeError::CannotInstantiate {
                class: name,
                reason,
                span,
            });
            let args = self.check_args_unbound(args);
            return Expr::typed(
                ExprKind::New {
                    class: Box::new(class),
                    args,
                },
                span,
                Type::Untyped,
            );
        }

        let bare_generic = namespace.is_generic() && !matches!(class.ty, Type::Generic(_));
        let instance = target.unwrap_or(Type::Untyped);
        let init = registry.lookup_method(&instance, "#init");
        let (args, ty) = match init {
            Some((init, _)) if bare_generic => {
                let params = namespace.type_params.clone();
                let init = Callable {
                    type_params: params.clone(),
                    return_type: registry.self_instance(id),
                    ..(*init).clone()
                };
                self.check_call(&init, &[], args, TypeBindings::new(), span)
            }
            Some((init, _)) => {
                let (args, _) = self.check_call(&init, &[], args, TypeBindings::new(), span);
                (args, instance)
            }
            None => (self.check_args_unbound(args), instance),
        };
        Expr::typed(
            ExprKind::New {
                class: Box::new(class),
                args,
            },
            span,
            ty,
        )
    }

    // ------------------------------------------------------------------
    // 控制流
    // ------------------------------------------------------------------

    fn check_logical(
        &mut self,
        op: LogicalOp,
        left: &Expr<()>,
        right: &Expr<()>,
        span: Span,
    ) -> Expr<Type> {
        let left = self.check_expr(left, None);
        self.push_scope();
        self.narrow(&left, op == LogicalOp::And);
        let right = self.check_expr(right, None);
        self.pop_scope();

        let ty = match op {
            LogicalOp::And => {
                if self.always_falsy(&left.ty) {
                    left.ty.clone()
                } else {
                    let falsy = self.to_falsy(&left.ty);
                    self.union(vec![falsy, right.ty.clone()])
                }
            }
            LogicalOp::Or => {
                if self.always_truthy(&left.ty) {
                    left.ty.clone()
                } else {
                    let truthy = self.to_non_falsy(&left.ty);
                    self.union(vec![truthy, right.ty.clone()])
                }
            }
        };
        Expr::typed(
            ExprKind::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
            ty,
        )
    }

    fn check_if(
        &mut self,
        condition: &Expr<()>,
        then_body: &Block<()>,
        else_body: Option<&Block<()>>,
        span: Span,
    ) -> Expr<Type> {
        let condition = self.check_expr(condition, None);

        self.push_scope();
        self.narrow(&condition, true);
        let (then_body, then_type) = self.check_block(then_body);
        self.pop_scope();

        let (else_body, else_type) = match else_body {
            Some(else_body) => {
                self.push_scope();
                self.narrow(&condition, false);
                let (body, ty) = self.check_block(else_body);
                self.pop_scope();
                (Some(body), ty)
            }
            None => (None, Type::Nil),
        };

        // 提前退出的分支收窄后续代码
        if then_type.is_never() && !else_type.is_never() {
            self.narrow(&condition, false);
        } else if else_type.is_never() && !then_type.is_never() {
            self.narrow(&condition, true);
        }

        let ty = self.union(vec![then_type, else_type]);
        Expr::typed(
            ExprKind::If {
                condition: Box::new(condition),
                then_body,
                else_body,
            },
            span,
            ty,
        )
    }

    fn check_match(
        &mut self,
        value: &Expr<()>,
        cases: &[MatchCase<()>],
        else_body: Option<&Block<()>>,
        span: Span,
    ) -> Expr<Type> {
        let value = self.check_expr(value, None);
        let subject = match &value.kind {
            ExprKind::Ident(name) => Some(name.clone()),
            _ => None,
        };
        let mut remaining = value.ty.clone();
        let mut types = Vec::with_capacity(cases.len() + 1);
        let mut typed_cases = Vec::with_capacity(cases.len());
        for case in cases {
            let unreachable = remaining.is_never() && !value.ty.is_never();
            if unreachable {
                let matched = self.inspect(&value.ty);
                self.error(TypeError::UnreachableCase {
                    matched,
                    span: case.span,
                });
            }
            let matched = if unreachable {
                value.ty.clone()
            } else {
                remaining.clone()
            };
            self.push_scope();
            let (pattern, captured) = self.check_pattern(&case.pattern, &matched);
            if let Some(name) = &subject {
                if !self.is_declared_in_current_scope(name) {
                    self.narrow_local(name, pattern.ty.clone());
                }
            }
            let (body, ty) = self.check_block(&case.body);
            self.pop_scope();
            types.push(ty);
            remaining = self.normalizer().difference(&remaining, &captured);
            typed_cases.push(MatchCase {
                pattern,
                body,
                span: case.span,
            });
        }

        let else_body = match else_body {
            Some(else_body) => {
                self.push_scope();
                if let Some(name) = &subject {
                    self.narrow_local(name, remaining.clone());
                }
                let (body, ty) = self.check_block(else_body);
                self.pop_scope();
                types.push(ty);
                Some(body)
            }
            None => {
                if !remaining.is_never() {
                    types.push(Type::Nil);
                }
                None
            }
        };
        let ty = self.union(types);
        Expr::typed(
            ExprKind::Match {
                value: Box::new(value),
                cases: typed_cases,
                else_body,
            },
            span,
            ty,
        )
    }

    fn check_return(
        &mut self,
        value: Option<&Expr<()>>,
        span: Span,
    ) -> Expr<Type> {
        if matches!(self.mode, Mode::Constant) {
            self.error(TypeError::Placement {
                what: "return",
                span,
            });
        }
        let expected = self.return_type.clone();
        let value = value.map(|v| self.check_expr(v, expected.as_ref()));
        let value_type = value.as_ref().map_or(Type::Nil, |v| v.ty.clone());
        match &expected {
            Some(expected) => {
                if !matches!(expected, Type::Void) {
                    let value_span = value.as_ref().map_or(span, |v| v.span);
                    self.check_assignable(&value_type, expected, value_span);
                }
            }
            None => {
                if let Some(returns) = self.closure_returns.last_mut() {
                    returns.push(value_type);
                }
            }
        }
        Expr::typed(ExprKind::Return(value.map(Box::new)), span, Type::Never)
    }

    fn check_jump(
        &mut self,
        kind: ExprKind<Type>,
        keyword: &'static str,
        span: Span,
    ) -> Expr<Type> {
        if self.loop_depth == 0 {
            self.error(TypeError::OutsideLoop { keyword, span });
        }
        Expr::typed(kind, span, Type::Never)
    }

    fn check_try(
        &mut self,
        body: &Block<()>,
        catches: &[CatchClause<()>],
        span: Span,
    ) -> Expr<Type> {
        self.catch_frames.push(Vec::new());
        self.push_scope();
        let (body, body_type) = self.check_block(body);
        self.pop_scope();
        let thrown = self.catch_frames.pop().unwrap_or_default();
        let nothing_thrown = thrown.is_empty();
        // 没有可见的 throw 时，catch 仍可能捕获任何值
        let mut remaining = if nothing_thrown {
            Type::Class(self.registry().builtins().value)
        } else {
            self.union(thrown)
        };

        let mut types = vec![body_type];
        let mut typed_catches = Vec::with_capacity(catches.len());
        for clause in catches {
            self.push_scope();
            let (pattern, captured) = self.check_pattern(&clause.pattern, &remaining);
            let (catch_body, ty) = self.check_block(&clause.body);
            self.pop_scope();
            types.push(ty);
            remaining = self.normalizer().difference(&remaining, &captured);
            typed_catches.push(CatchClause {
                pattern,
                body: catch_body,
                span: clause.span,
            });
        }
        // 没被捕获的部分继续向外抛出
        if !nothing_thrown && !remaining.is_never() {
            self.record_throw(remaining, span);
        }
        let ty = self.union(types);
        Expr::typed(
            ExprKind::Try {
                body,
                catches: typed_catches,
            },
            span,
            ty,
        )
    }

    // ------------------------------------------------------------------
    // 闭包
    // ------------------------------------------------------------------

    fn check_closure(
        &mut self,
        params: &[ParamDecl<()>],
        return_type: Option<&TypeExpr<()>>,
        throw_type: Option<&TypeExpr<()>>,
        body: &Block<()>,
        expected: Option<&Type>,
        span: Span,
    ) -> Expr<Type> {
        let expected = expected.and_then(|expected| self.expected_callable(expected));

        let mut typed_params = Vec::with_capacity(params.len());
        let mut signature = Vec::with_capacity(params.len());
        for (index, param) in params.iter().enumerate() {
            let type_expr = param.type_expr.as_ref().map(|t| self.resolve_type_expr(t));
            let ty = match (&type_expr, &expected) {
                (Some(t), _) => t.ty.clone(),
                (None, Some(expected)) => match expected.params.get(index) {
                    Some(p) => p.ty.clone(),
                    None => Type::Untyped,
                },
                (None, None) => {
                    self.error(TypeError::UntypedClosureParam {
                        name: param.name.clone(),
                        span: param.span,
                    });
                    Type::Untyped
                }
            };
            let default = param.default.as_ref().map(|d| self.check_expr(d, Some(&ty)));
            signature.push(
                Parameter::new(param.name.clone(), ty.clone())
                    .with_kind(parameter_kind(param.kind, default.is_some())),
            );
            typed_params.push(ParamDecl {
                name: param.name.clone(),
                type_expr,
                kind: param.kind,
                default,
                span: param.span,
                ty,
            });
        }
        let return_expr = return_type.map(|t| self.resolve_type_expr(t));
        let throw_expr = throw_type.map(|t| self.resolve_type_expr(t));

        // 进入闭包
        let saved_mode = std::mem::replace(&mut self.mode, Mode::Closure);
        let saved_return = std::mem::replace(
            &mut self.return_type,
            return_expr.as_ref().map(|t| t.ty.clone()),
        );
        let saved_throw = std::mem::replace(
            &mut self.throw_type,
            throw_expr.as_ref().map_or(Type::Never, |t| t.ty.clone()),
        );
        let saved_loop = std::mem::replace(&mut self.loop_depth, 0);
        let saved_catch = std::mem::take(&mut self.catch_frames);
        if throw_expr.is_none() {
            self.catch_frames.push(Vec::new());
        }
        self.closure_returns.push(Vec::new());
        self.push_closure_scope();
        for param in &signature {
            let ty = match param.kind {
                ParameterKind::PositionalRest => {
                    let builtins = self.registry().builtins();
                    self.registry().generic(builtins.array_list, vec![param.ty.clone()])
                }
                ParameterKind::NamedRest => {
                    let builtins = self.registry().builtins();
                    self.registry().generic(
                        builtins.hash_map,
                        vec![Type::Class(builtins.symbol), param.ty.clone()],
                    )
                }
                _ => param.ty.clone(),
            };
            self.declare_local(&param.name, Local::new(ty, true, false));
        }
        let (body, body_type) = self.check_block(body);
        self.pop_scope();
        let returns = self.closure_returns.pop().unwrap_or_default();
        let thrown = if throw_expr.is_none() {
            self.catch_frames.pop().unwrap_or_default()
        } else {
            Vec::new()
        };

        self.mode = saved_mode;
        self.return_type = saved_return;
        self.throw_type = saved_throw;
        self.loop_depth = saved_loop;
        self.catch_frames = saved_catch;

        let return_ty = match &return_expr {
            Some(declared) => {
                if !matches!(declared.ty, Type::Void) && !body_type.is_never() {
                    self.check_assignable(&body_type, &declared.ty, span);
                }
                declared.ty.clone()
            }
            None => {
                let mut all = returns;
                all.push(body_type);
                self.union(all)
            }
        };
        let throw_ty = match &throw_expr {
            Some(declared) => declared.ty.clone(),
            None => self.union(thrown),
        };
        let callable = Callable::closure(signature, return_ty, throw_ty);
        Expr::typed(
            ExprKind::Closure {
                params: typed_params,
                return_type: return_expr,
                throw_type: throw_expr,
                body,
            },
            span,
            Type::callable(callable),
        )
    }

    /// 从期望类型中取出闭包签名（可能包在可空类型或并集中）
    fn expected_callable(
        &self,
        expected: &Type,
    ) -> Option<Arc<Callable>> {
        match expected {
            Type::Callable(callable) => Some(callable.clone()),
            Type::Nilable(inner) => self.expected_callable(inner),
            Type::Union(elements) => elements.iter().find_map(|e| self.expected_callable(e)),
            Type::Named(id) => self
                .registry()
                .resolve_named(*id)
                .and_then(|t| self.expected_callable(t)),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // 集合字面量
    // ------------------------------------------------------------------

    /// 期望类型中 `namespace` 的泛型实例
    fn expected_generic(
        &self,
        expected: Option<&Type>,
        namespace: NamespaceId,
    ) -> Option<Vec<Type>> {
        let expected = expected?;
        match expected {
            Type::Generic(generic) if generic.namespace == namespace => {
                Some(generic.args.iter().map(|(_, a)| a.ty.clone()).collect())
            }
            Type::Nilable(inner) => self.expected_generic(Some(inner), namespace),
            Type::Union(elements) | Type::Intersection(elements) => elements
                .iter()
                .find_map(|e| self.expected_generic(Some(e), namespace)),
            Type::Named(id) => self
                .registry()
                .resolve_named(*id)
                .and_then(|t| self.expected_generic(Some(t), namespace)),
            _ => None,
        }
    }

    /// 集合元素类型：有期望类型时逐个检查，否则取字面量拓宽后的并集
    fn collection_element(
        &mut self,
        expected: Option<Type>,
        elements: Vec<&Expr<Type>>,
    ) -> Type {
        match expected {
            Some(expected) => {
                for element in elements {
                    self.check_assignable(&element.ty, &expected, element.span);
                }
                expected
            }
            None if elements.is_empty() => Type::Any,
            None => {
                let widened = elements
                    .iter()
                    .map(|e| widen_literals(self.registry(), &e.ty))
                    .collect();
                self.union(widened)
            }
        }
    }

    fn check_array_list(
        &mut self,
        elements: &[Expr<()>],
        expected: Option<&Type>,
        span: Span,
    ) -> Expr<Type> {
        let array_list = self.registry().builtins().array_list;
        let element = self
            .expected_generic(expected, array_list)
            .and_then(|args| args.into_iter().next());
        let typed: Vec<Expr<Type>> = elements
            .iter()
            .map(|e| self.check_expr(e, element.as_ref()))
            .collect();
        let element = self.collection_element(element, typed.iter().collect());
        let ty = self.registry().generic(array_list, vec![element]);
        Expr::typed(ExprKind::ArrayList(typed), span, ty)
    }

    fn check_hash_map(
        &mut self,
        pairs: &[(Expr<()>, Expr<()>)],
        expected: Option<&Type>,
        span: Span,
    ) -> Expr<Type> {
        let hash_map = self.registry().builtins().hash_map;
        let expected_args = self.expected_generic(expected, hash_map);
        let (key, value) = match expected_args.as_deref() {
            Some([key, value]) => (Some(key.clone()), Some(value.clone())),
            _ => (None, None),
        };
        let typed: Vec<(Expr<Type>, Expr<Type>)> = pairs
            .iter()
            .map(|(k, v)| (self.check_expr(k, key.as_ref()), self.check_expr(v, value.as_ref())))
            .collect();

        let key = self.collection_element(key, typed.iter().map(|(k, _)| k).collect());
        let value = self.collection_element(value, typed.iter().map(|(_, v)| v).collect());
        let ty = self.registry().generic(hash_map, vec![key, value]);
        Expr::typed(ExprKind::HashMap(typed), span, ty)
    }
}

/// 常量值所代表的命名空间（`Foo::Bar` 中的 `Foo`）
fn constant_namespace(
    registry: &TypeRegistry,
    ty: &Type,
) -> Option<NamespaceId> {
    match ty {
        Type::Module(id) => Some(*id),
        Type::SingletonClass(id) => registry.namespace(*id).attached,
        _ => None,
    }
}
