//! 实参绑定
//!
//! 调用、构造和宏调用共用同一个绑定算法：
//!
//! 1. 按顺序把位置实参绑定到位置形参
//! 2. 遇到第一个位置 rest 形参时，吞下 `实参数 - rest 之后的形参数` 个实参
//! 3. 继续绑定 rest 之后的位置形参
//! 4. 按名字绑定命名实参；重复的报错，不认识的进入命名 rest 或报错
//! 5. 没有绑定的必填形参报 “缺少实参”，可选形参绑定到 `Undefined`
//!
//! 这里只计算绑定方案，不检查实参类型。

use crate::frontend::core::type_system::{Callable, ParameterKind};
use crate::frontend::typecheck::errors::TypeError;
use crate::util::span::Span;

/// 一个形参最终绑定到的实参
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentSlot {
    /// 第 n 个位置实参
    Positional(usize),
    /// 第 n 个命名实参
    Named(usize),
    /// 被位置 rest 形参收集的位置实参
    Rest(Vec<usize>),
    /// 被命名 rest 形参收集的命名实参
    NamedRest(Vec<usize>),
    /// 未提供的可选形参
    Undefined,
}

/// 绑定问题，调用方负责转换为诊断
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingIssue {
    Missing { param: String },
    Duplicated { name: String, argument: usize },
    Nonexistent { name: String, argument: usize },
    WrongArity { expected: String, given: usize },
}

impl BindingIssue {
    /// 转换为诊断；`named_spans` 是命名实参的位置
    pub fn to_error(
        &self,
        method: &str,
        named_spans: &[Span],
        span: Span,
    ) -> TypeError {
        let named_span = |argument: usize| named_spans.get(argument).copied().unwrap_or(span);
        match self {
            BindingIssue::Missing { param } => TypeError::MissingArgument {
                param: param.clone(),
                method: method.to_string(),
                span,
            },
            BindingIssue::Duplicated { name, argument } => TypeError::DuplicatedArgument {
                name: name.clone(),
                method: method.to_string(),
                span: named_span(*argument),
            },
            BindingIssue::Nonexistent { name, argument } => TypeError::NonexistentParameter {
                name: name.clone(),
                method: method.to_string(),
                span: named_span(*argument),
            },
            BindingIssue::WrongArity { expected, given } => TypeError::WrongArity {
                method: method.to_string(),
                expected: expected.clone(),
                given: *given,
                span,
            },
        }
    }
}

/// 绑定方案：`slots[i]` 对应第 i 个形参
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BindingPlan {
    pub slots: Vec<ArgumentSlot>,
    pub issues: Vec<BindingIssue>,
}

impl BindingPlan {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// 计算实参到形参的绑定
pub fn bind_arguments(
    callable: &Callable,
    positional_count: usize,
    named: &[&str],
) -> BindingPlan {
    let params = &callable.params;
    let mut slots: Vec<Option<ArgumentSlot>> = vec![None; params.len()];
    let mut issues = Vec::new();
    let post_rest = callable.post_rest_count();

    let mut next = 0;
    for (index, param) in params.iter().enumerate() {
        match param.kind {
            ParameterKind::PositionalRest => {
                let take = positional_count.saturating_sub(next + post_rest);
                slots[index] = Some(ArgumentSlot::Rest((next..next + take).collect()));
                next += take;
            }
            ParameterKind::Normal | ParameterKind::Default => {
                if next < positional_count {
                    slots[index] = Some(ArgumentSlot::Positional(next));
                    next += 1;
                }
            }
            ParameterKind::NamedRest => {}
        }
    }
    if next < positional_count {
        issues.push(BindingIssue::WrongArity {
            expected: expected_arity(callable),
            given: positional_count,
        });
    }

    let named_rest = params
        .iter()
        .position(|p| p.kind == ParameterKind::NamedRest);
    let mut collected: Vec<usize> = Vec::new();
    for (argument, name) in named.iter().enumerate() {
        let target = params
            .iter()
            .position(|p| p.name == *name && p.is_positional());
        match target {
            Some(index) if slots[index].is_some() => issues.push(BindingIssue::Duplicated {
                name: name.to_string(),
                argument,
            }),
            Some(index) => slots[index] = Some(ArgumentSlot::Named(argument)),
            None if named_rest.is_some() => {
                if collected.iter().any(|&seen| named[seen] == *name) {
                    issues.push(BindingIssue::Duplicated {
                        name: name.to_string(),
                        argument,
                    });
                } else {
                    collected.push(argument);
                }
            }
            None => issues.push(BindingIssue::Nonexistent {
                name: name.to_string(),
                argument,
            }),
        }
    }
    if let Some(index) = named_rest {
        slots[index] = Some(ArgumentSlot::NamedRest(collected));
    }

    let slots = params
        .iter()
        .zip(slots)
        .map(|(param, slot)| match slot {
            Some(slot) => slot,
            None => {
                if param.is_required() {
                    issues.push(BindingIssue::Missing {
                        param: param.name.clone(),
                    });
                }
                ArgumentSlot::Undefined
            }
        })
        .collect();

    BindingPlan { slots, issues }
}

/// 诊断中显示的期望实参个数：`2` 或 `1...3`
fn expected_arity(callable: &Callable) -> String {
    let required = callable
        .params
        .iter()
        .filter(|p| p.kind == ParameterKind::Normal)
        .count();
    let max = callable.positional_count();
    if required == max {
        required.to_string()
    } else {
        format!("{}...{}", required, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::core::type_system::{Parameter, Type};

    fn method(params: Vec<Parameter>) -> Callable {
        Callable::method("baz", params, Type::Void)
    }

    #[test]
    fn test_rest_collects_middle_arguments() {
        let callable = method(vec![
            Parameter::new("a", Type::Any),
            Parameter::new("rest", Type::Any).with_kind(ParameterKind::PositionalRest),
            Parameter::new("z", Type::Any),
        ]);
        let plan = bind_arguments(&callable, 4, &[]);
        assert!(plan.is_ok());
        assert_eq!(
            plan.slots,
            vec![
                ArgumentSlot::Positional(0),
                ArgumentSlot::Rest(vec![1, 2]),
                ArgumentSlot::Positional(3),
            ]
        );
    }

    #[test]
    fn test_optional_is_undefined() {
        let callable = method(vec![
            Parameter::new("a", Type::Any),
            Parameter::new("b", Type::Any).with_kind(ParameterKind::Default),
        ]);
        let plan = bind_arguments(&callable, 1, &[]);
        assert!(plan.is_ok());
        assert_eq!(plan.slots[1], ArgumentSlot::Undefined);
    }

    #[test]
    fn test_too_many_positional_arguments() {
        let callable = method(vec![
            Parameter::new("a", Type::Any),
            Parameter::new("b", Type::Any).with_kind(ParameterKind::Default),
        ]);
        let plan = bind_arguments(&callable, 3, &[]);
        assert_eq!(
            plan.issues,
            vec![BindingIssue::WrongArity {
                expected: "1...2".to_string(),
                given: 3
            }]
        );
    }

    #[test]
    fn test_named_arguments() {
        let callable = method(vec![
            Parameter::new("a", Type::Any),
            Parameter::new("opts", Type::Any).with_kind(ParameterKind::NamedRest),
        ]);
        let plan = bind_arguments(&callable, 1, &["a", "x", "x"]);
        assert_eq!(
            plan.issues,
            vec![
                BindingIssue::Duplicated {
                    name: "a".to_string(),
                    argument: 0
                },
                BindingIssue::Duplicated {
                    name: "x".to_string(),
                    argument: 2
                },
            ]
        );
        assert_eq!(plan.slots[1], ArgumentSlot::NamedRest(vec![1]));

        let strict = method(vec![Parameter::new("a", Type::Any)]);
        let plan = bind_arguments(&strict, 0, &["b"]);
        assert_eq!(
            plan.issues,
            vec![
                BindingIssue::Nonexistent {
                    name: "b".to_string(),
                    argument: 0
                },
                BindingIssue::Missing {
                    param: "a".to_string()
                },
            ]
        );
    }
}
