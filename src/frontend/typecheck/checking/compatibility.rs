//! 兼容性检查
//!
//! 判断一个方法签名能否替代另一个：覆写检查、接口实现检查和
//! 联合接收者上的签名统一都依赖这里的规则。

use std::borrow::Cow;
use std::sync::Arc;

use crate::frontend::core::type_system::{Callable, Substituter, Type, TypeBindings};

use super::subtyping::SubtypeChecker;

impl SubtypeChecker<'_> {
    /// `child` 是否可以替代 `base`
    ///
    /// - 返回类型、抛出类型协变
    /// - 参数个数不少于 `base`，对应参数逆变
    /// - 多出的参数必须可选
    /// - 参数种类（普通 / 默认 / rest）必须一致，名称必须一致
    pub fn is_method_compatible(
        &self,
        child: &Callable,
        base: &Callable,
    ) -> bool {
        let child = Self::align_type_params(child, base);
        let child = child.as_ref();

        if !self.is_subtype(&child.return_type, &base.return_type) {
            return false;
        }
        if !self.is_subtype(&child.throw_type, &base.throw_type) {
            return false;
        }
        if child.params.len() < base.params.len() {
            return false;
        }
        for (own, target) in child.params.iter().zip(base.params.iter()) {
            if own.name != target.name {
                return false;
            }
            // 必填参数不能替代可选参数
            if own.kind != target.kind && !(target.is_required() && !own.is_required()) {
                return false;
            }
            if !self.is_subtype(&target.ty, &own.ty) {
                return false;
            }
        }
        child.params[base.params.len()..]
            .iter()
            .all(|extra| !extra.is_required())
    }

    /// 两个泛型方法的类型参数按位置对齐，让 `child` 的参数改用 `base` 的
    fn align_type_params<'c>(
        child: &'c Callable,
        base: &Callable,
    ) -> Cow<'c, Callable> {
        if child.type_params.is_empty() || child.type_params.len() != base.type_params.len() {
            return Cow::Borrowed(child);
        }
        let bindings: TypeBindings = child
            .type_params
            .iter()
            .zip(base.type_params.iter())
            .map(|(own, target)| (own.name.clone(), Type::TypeParameter(Arc::clone(target))))
            .collect();
        let mut aligned = Substituter::new(&bindings).apply_callable(child);
        aligned.type_params = base.type_params.clone();
        Cow::Owned(aligned)
    }
}
