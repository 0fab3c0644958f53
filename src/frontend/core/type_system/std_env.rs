//! 内置 `Std` 命名空间图
//!
//! 种子只构建一次（`once_cell::sync::Lazy`），之后只读；
//! 每个编译单元克隆一份作为自己注册表的起点。

use std::sync::Arc;

use once_cell::sync::Lazy;

use super::namespace::{NamespaceFlags, NamespaceKind, TypeRegistry};
use super::types::{
    Callable, NamespaceId, Parameter, ParameterKind, Type, TypeParameter, Variance,
};

static STD_REGISTRY: Lazy<TypeRegistry> = Lazy::new(build_std);

/// 全局只读种子
pub(crate) fn std_registry() -> &'static TypeRegistry {
    &STD_REGISTRY
}

struct StdBuilder {
    registry: TypeRegistry,
    std: NamespaceId,
}

impl StdBuilder {
    fn class(
        &mut self,
        name: &str,
        parent: Option<NamespaceId>,
        flags: NamespaceFlags,
    ) -> NamespaceId {
        let id = self
            .registry
            .declare_namespace(NamespaceKind::Class, name, self.std);
        let namespace = self.registry.namespace_mut(id);
        namespace.parent = parent.map(Type::Class);
        namespace.flags = flags;
        id
    }

    fn primitive(
        &mut self,
        name: &str,
        parent: NamespaceId,
    ) -> NamespaceId {
        self.class(
            name,
            Some(parent),
            NamespaceFlags {
                abstract_: false,
                sealed: true,
                primitive: true,
            },
        )
    }

    fn type_param(
        &mut self,
        namespace: NamespaceId,
        name: &str,
        variance: Variance,
    ) -> Type {
        let owner = self.registry.namespace(namespace).name.clone();
        let param = Arc::new(TypeParameter::new(name, owner, variance));
        self.registry
            .namespace_mut(namespace)
            .type_params
            .push(param.clone());
        Type::TypeParameter(param)
    }

    fn def(
        &mut self,
        namespace: NamespaceId,
        name: &str,
        params: Vec<Parameter>,
        return_type: Type,
    ) {
        let callable = Callable::method(name, params, return_type).with_owner(namespace);
        self.def_callable(namespace, callable);
    }

    fn def_callable(
        &mut self,
        namespace: NamespaceId,
        callable: Callable,
    ) {
        self.registry
            .namespace_mut(namespace)
            .methods
            .insert(callable.name.clone(), Arc::new(callable));
    }

    fn operators(
        &mut self,
        namespace: NamespaceId,
        arithmetic: &[&str],
        comparison: &[&str],
    ) {
        let own = Type::Class(namespace);
        for op in arithmetic {
            self.def(
                namespace,
                op,
                vec![Parameter::new("other", own.clone())],
                own.clone(),
            );
        }
        for op in comparison {
            self.def(
                namespace,
                op,
                vec![Parameter::new("other", own.clone())],
                Type::Bool,
            );
        }
    }
}

fn param(
    name: &str,
    ty: Type,
) -> Parameter {
    Parameter::new(name, ty)
}

fn build_std() -> TypeRegistry {
    let mut registry = TypeRegistry::empty();
    let root = registry.root();
    let std = registry.declare_namespace(NamespaceKind::Module, "Std", root);
    registry.set_std(std);
    let mut b = StdBuilder { registry, std };

    let plain = NamespaceFlags::default();
    let value = b.class("Value", None, plain);
    let object = b.class("Object", Some(value), plain);
    let module = b.class("Module", Some(object), plain);
    let class = b.class("Class", Some(module), plain);
    let nil = b.primitive("Nil", value);
    let bool_ = b.class(
        "Bool",
        Some(value),
        NamespaceFlags {
            abstract_: false,
            sealed: false,
            primitive: true,
        },
    );
    let true_ = b.primitive("True", bool_);
    let false_ = b.primitive("False", bool_);
    let int = b.primitive("Int", value);
    let int64 = b.primitive("Int64", value);
    let int32 = b.primitive("Int32", value);
    let int16 = b.primitive("Int16", value);
    let int8 = b.primitive("Int8", value);
    let uint64 = b.primitive("UInt64", value);
    let uint32 = b.primitive("UInt32", value);
    let uint16 = b.primitive("UInt16", value);
    let uint8 = b.primitive("UInt8", value);
    let float = b.primitive("Float", value);
    let float64 = b.primitive("Float64", value);
    let float32 = b.primitive("Float32", value);
    let big_float = b.primitive("BigFloat", value);
    let string = b.primitive("String", value);
    let symbol = b.primitive("Symbol", value);
    let char_ = b.primitive("Char", value);
    let closure = b.primitive("Closure", value);
    let error = b.class("Error", Some(object), plain);
    let array_list = b.class("ArrayList", Some(object), plain);
    let hash_map = b.class("HashMap", Some(object), plain);
    let inspectable = b
        .registry
        .declare_namespace(NamespaceKind::Interface, "Inspectable", std);
    let kernel = b
        .registry
        .declare_namespace(NamespaceKind::Mixin, "Kernel", std);

    b.registry.builtins = super::namespace::Builtins {
        value,
        object,
        nil,
        bool_,
        true_,
        false_,
        int,
        int64,
        int32,
        int16,
        int8,
        uint64,
        uint32,
        uint16,
        uint8,
        float,
        float64,
        float32,
        big_float,
        string,
        symbol,
        char_,
        error,
        array_list,
        hash_map,
        class,
        module,
        closure,
        inspectable,
        kernel,
    };

    let string_ty = Type::Class(string);
    let int_ty = Type::Class(int);

    // Value
    b.def(value, "==", vec![param("other", Type::Any)], Type::Bool);
    b.def(value, "!=", vec![param("other", Type::Any)], Type::Bool);
    b.def(value, "inspect", vec![], string_ty.clone());
    b.def(value, "to_string", vec![], string_ty.clone());

    // Object
    b.registry.namespace_mut(object).includes.push(Type::Mixin(kernel));
    b.def(object, "#init", vec![], Type::Void);

    // Kernel
    for name in ["println", "print"] {
        b.def(
            kernel,
            name,
            vec![param("values", Type::Class(value)).with_kind(ParameterKind::PositionalRest)],
            Type::Void,
        );
    }

    // Inspectable
    b.def_callable(
        inspectable,
        Callable::method("inspect", vec![], string_ty.clone())
            .with_owner(inspectable)
            .with_flags(super::types::MethodFlags {
                abstract_: true,
                ..Default::default()
            }),
    );

    // Module / Class
    b.def(module, "name", vec![], string_ty.clone());

    // 数值
    let numeric = [
        int, int64, int32, int16, int8, uint64, uint32, uint16, uint8, float, float64, float32,
        big_float,
    ];
    for id in numeric {
        b.operators(id, &["+", "-", "*", "/", "%"], &["<", "<=", ">", ">="]);
        b.def(id, "-@", vec![], Type::Class(id));
    }
    b.def(int, "to_float", vec![], Type::Class(float));
    b.def(float, "to_int", vec![], int_ty.clone());

    // String
    b.operators(string, &["+"], &["<", "<=", ">", ">="]);
    b.def(string, "*", vec![param("times", int_ty.clone())], string_ty.clone());
    b.def(string, "length", vec![], int_ty.clone());
    b.def(string, "uppercase", vec![], string_ty.clone());
    b.def(string, "lowercase", vec![], string_ty.clone());
    b.def(string, "to_symbol", vec![], Type::Class(symbol));
    b.def(symbol, "to_string", vec![], string_ty.clone());
    b.def(char_, "to_string", vec![], string_ty.clone());

    // Error
    b.def(
        error,
        "#init",
        vec![param("message", string_ty.clone()).with_kind(ParameterKind::Default)],
        Type::Void,
    );
    b.def(error, "message", vec![], string_ty.clone());
    b.registry.namespace_mut(error).instance_vars.insert("message".to_string(), string_ty.clone());

    // ArrayList[Element]
    let element = b.type_param(array_list, "Element", Variance::Invariant);
    b.def(
        array_list,
        "#init",
        vec![param("capacity", int_ty.clone()).with_kind(ParameterKind::Default)],
        Type::Void,
    );
    b.def(array_list, "push", vec![param("value", element.clone())], Type::SelfType);
    b.def(
        array_list,
        "append",
        vec![param("values", element.clone()).with_kind(ParameterKind::PositionalRest)],
        Type::SelfType,
    );
    b.def(array_list, "[]", vec![param("index", int_ty.clone())], element.clone());
    b.def(
        array_list,
        "[]=",
        vec![param("index", int_ty.clone()), param("value", element.clone())],
        element.clone(),
    );
    b.def(array_list, "first", vec![], Type::nilable(element.clone()));
    b.def(array_list, "length", vec![], int_ty.clone());
    let mapped = Arc::new(TypeParameter::new("V", "Std::ArrayList.map", Variance::Invariant));
    let mapped_ty = Type::TypeParameter(mapped.clone());
    let mapper = Type::callable(Callable::closure(
        vec![param("element", element.clone())],
        mapped_ty.clone(),
        Type::Never,
    ));
    let map_result = b.registry.generic(array_list, vec![mapped_ty]);
    b.def_callable(
        array_list,
        Callable::method("map", vec![param("func", mapper)], map_result)
            .with_owner(array_list)
            .with_type_params(vec![mapped]),
    );

    // HashMap[Key, Value]
    let key = b.type_param(hash_map, "Key", Variance::Invariant);
    let val = b.type_param(hash_map, "Value", Variance::Invariant);
    b.def(
        hash_map,
        "#init",
        vec![param("capacity", int_ty.clone()).with_kind(ParameterKind::Default)],
        Type::Void,
    );
    b.def(hash_map, "[]", vec![param("key", key.clone())], Type::nilable(val.clone()));
    b.def(
        hash_map,
        "[]=",
        vec![param("key", key.clone()), param("value", val.clone())],
        val.clone(),
    );
    b.def(hash_map, "length", vec![], int_ty);

    for id in (0..b.registry.namespace_count() as u32).map(NamespaceId) {
        b.registry.link_singleton_parent(id);
    }
    b.registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_lookup() {
        let registry = TypeRegistry::with_std();
        let int = registry.std_type("Int").unwrap();
        assert_eq!(int, Type::Class(registry.builtins().int));
        assert_eq!(registry.inspect(&int), "Int");
        assert!(registry.lookup_path(&["Std", "String"]).is_some());
    }

    #[test]
    fn test_object_includes_kernel() {
        let registry = TypeRegistry::with_std();
        let object = Type::Class(registry.builtins().object);
        let (method, owner) = registry.lookup_method(&object, "println").unwrap();
        assert_eq!(owner, Type::Mixin(registry.builtins().kernel));
        assert_eq!(method.params[0].kind, ParameterKind::PositionalRest);
    }

    #[test]
    fn test_generic_method_substitution() {
        let registry = TypeRegistry::with_std();
        let b = registry.builtins();
        let list = registry.generic(b.array_list, vec![Type::Class(b.string)]);
        let (method, _) = registry.lookup_method(&list, "[]").unwrap();
        assert_eq!(method.return_type, Type::Class(b.string));
        assert_eq!(registry.inspect(&list), "ArrayList[String]");
    }

    #[test]
    fn test_singleton_chain_reaches_class() {
        let registry = TypeRegistry::with_std();
        let b = registry.builtins();
        let singleton = registry.namespace(b.int).singleton.unwrap();
        let ancestors = registry.ancestors(&Type::SingletonClass(singleton));
        assert!(ancestors.contains(&Type::Class(b.class)));
        assert_eq!(registry.inspect(&Type::SingletonClass(singleton)), "&Int");
    }
}
