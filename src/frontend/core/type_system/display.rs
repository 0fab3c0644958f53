//! 类型的文本表示
//!
//! 诊断消息中的类型都经由这里渲染，`Std::` 前缀会被省略。

use std::fmt;

use super::namespace::TypeRegistry;
use super::types::{Callable, LiteralKind, NamespaceId, ParameterKind, Type, Variance};

/// 借助注册表显示类型
pub struct TypeDisplay<'a> {
    ty: &'a Type,
    registry: &'a TypeRegistry,
}

impl<'a> TypeDisplay<'a> {
    pub fn new(
        ty: &'a Type,
        registry: &'a TypeRegistry,
    ) -> Self {
        Self { ty, registry }
    }
}

impl TypeRegistry {
    /// 类型的显示字符串
    pub fn inspect(
        &self,
        ty: &Type,
    ) -> String {
        TypeDisplay::new(ty, self).to_string()
    }

    /// 命名空间的显示名
    pub fn namespace_name(
        &self,
        id: NamespaceId,
    ) -> String {
        let namespace = self.namespace(id);
        if let Some(attached) = namespace.attached {
            return format!("&{}", self.namespace_name(attached));
        }
        strip_std(&namespace.name).to_string()
    }

    /// 方法签名：`def foo[V](a: Int, *b: String): V ! Error`
    pub fn inspect_signature(
        &self,
        callable: &Callable,
    ) -> String {
        let mut out = String::from("def ");
        if callable.flags.sealed {
            out.insert_str(0, "sealed ");
        }
        if callable.flags.abstract_ {
            out.insert_str(0, "abstract ");
        }
        out.push_str(&callable.name);
        if !callable.type_params.is_empty() {
            let params: Vec<String> = callable
                .type_params
                .iter()
                .map(|p| {
                    let mut text = format!("{}{}", variance_prefix(p.variance), p.name);
                    if p.upper_bound != Type::Any {
                        text.push_str(&format!(" < {}", self.inspect(&p.upper_bound)));
                    }
                    if p.lower_bound != Type::Never {
                        text.push_str(&format!(" > {}", self.inspect(&p.lower_bound)));
                    }
                    text
                })
                .collect();
            out.push_str(&format!("[{}]", params.join(", ")));
        }
        out.push('(');
        out.push_str(&self.inspect_params(callable));
        out.push_str(&format!("): {}", self.inspect(&callable.return_type)));
        if callable.throw_type != Type::Never {
            out.push_str(&format!(" ! {}", self.inspect(&callable.throw_type)));
        }
        out
    }

    fn inspect_params(
        &self,
        callable: &Callable,
    ) -> String {
        callable
            .params
            .iter()
            .map(|p| {
                let prefix = match p.kind {
                    ParameterKind::PositionalRest => "*",
                    ParameterKind::NamedRest => "**",
                    ParameterKind::Normal | ParameterKind::Default => "",
                };
                let suffix = if p.kind == ParameterKind::Default {
                    " = ..."
                } else {
                    ""
                };
                format!("{}{}: {}{}", prefix, p.name, self.inspect(&p.ty), suffix)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn strip_std(name: &str) -> &str {
    name.strip_prefix("Std::").unwrap_or(name)
}

fn variance_prefix(variance: Variance) -> &'static str {
    match variance {
        Variance::Covariant => "+",
        Variance::Contravariant => "-",
        Variance::Bivariant => "*",
        Variance::Invariant => "",
    }
}

/// 复合类型作为元素时是否需要括号
fn needs_parens(ty: &Type) -> bool {
    matches!(
        ty,
        Type::Union(_) | Type::Intersection(_) | Type::Callable(_)
    )
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let registry = self.registry;
        let nested = |f: &mut fmt::Formatter<'_>, ty: &Type| -> fmt::Result {
            if needs_parens(ty) {
                write!(f, "({})", TypeDisplay::new(ty, registry))
            } else {
                write!(f, "{}", TypeDisplay::new(ty, registry))
            }
        };
        match self.ty {
            Type::Never => write!(f, "never"),
            Type::Any => write!(f, "any"),
            Type::Void => write!(f, "void"),
            Type::Untyped => write!(f, "untyped"),
            Type::SelfType => write!(f, "self"),
            Type::Nil => write!(f, "nil"),
            Type::Bool => write!(f, "bool"),
            Type::True => write!(f, "true"),
            Type::False => write!(f, "false"),
            Type::Literal(literal) => match literal.kind {
                LiteralKind::String => write!(f, "\"{}\"", literal.value),
                LiteralKind::Symbol => write!(f, ":{}", literal.value),
                LiteralKind::Char => write!(f, "`{}`", literal.value),
                kind => write!(f, "{}{}", literal.value, kind.suffix()),
            },
            Type::Class(id)
            | Type::Mixin(id)
            | Type::Interface(id)
            | Type::Module(id)
            | Type::SingletonClass(id) => write!(f, "{}", registry.namespace_name(*id)),
            Type::Generic(generic) => {
                write!(f, "{}[", registry.namespace_name(generic.namespace))?;
                for (i, (_, arg)) in generic.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", TypeDisplay::new(&arg.ty, registry))?;
                }
                write!(f, "]")
            }
            Type::TypeParameter(param) => write!(f, "{}", param.name),
            Type::Union(elements) | Type::Intersection(elements) => {
                let separator = if matches!(self.ty, Type::Union(_)) {
                    " | "
                } else {
                    " & "
                };
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", separator)?;
                    }
                    nested(f, element)?;
                }
                Ok(())
            }
            Type::Nilable(inner) => {
                nested(f, inner)?;
                write!(f, "?")
            }
            Type::Not(inner) => {
                write!(f, "~")?;
                nested(f, inner)
            }
            Type::Named(id) => write!(f, "{}", strip_std(&registry.named(*id).name)),
            Type::Callable(callable) => {
                if callable.closure {
                    write!(f, "|{}|: ", registry.inspect_params(callable))?;
                    nested(f, &callable.return_type)?;
                    if callable.throw_type != Type::Never {
                        write!(f, " ! ")?;
                        nested(f, &callable.throw_type)?;
                    }
                    Ok(())
                } else {
                    write!(f, "{}", registry.inspect_signature(callable))
                }
            }
            Type::SingletonOf(inner) => {
                write!(f, "&")?;
                nested(f, inner)
            }
            Type::InstanceOf(inner) => {
                write!(f, "^")?;
                nested(f, inner)
            }
        }
    }
}
