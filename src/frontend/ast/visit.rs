//! 语法树遍历
//!
//! 只提供“访问直接子表达式”这一个原语，递归由调用方决定
//! （宏展开不进入宏调用的实参）。

use super::{Arguments, Block, Expr, ExprKind, Pattern, PatternKind, Stmt, StmtKind};

/// 对 `expr` 的每个直接子表达式调用 `f`
///
/// 语句块中只访问表达式语句；模式中的值表达式和映射键也会被访问。
pub fn for_each_child_mut<T>(
    expr: &mut Expr<T>,
    f: &mut impl FnMut(&mut Expr<T>),
) {
    match &mut expr.kind {
        ExprKind::Nil
        | ExprKind::True
        | ExprKind::False
        | ExprKind::SelfLiteral
        | ExprKind::Literal { .. }
        | ExprKind::Ident(_)
        | ExprKind::InstanceVar(_)
        | ExprKind::Constant(_)
        | ExprKind::Break
        | ExprKind::Continue
        | ExprKind::Invalid => {}
        ExprKind::Var { init, .. } => {
            if let Some(init) = init {
                f(init);
            }
        }
        ExprKind::Assign { value, .. } | ExprKind::IvarAssign { value, .. } => f(value),
        ExprKind::Call { receiver, args, .. } => {
            if let Some(receiver) = receiver {
                f(receiver);
            }
            arguments_mut(args, f);
        }
        ExprKind::New { args, .. } => arguments_mut(args, f),
        ExprKind::MacroCall {
            args, expansion, ..
        } => {
            arguments_mut(args, f);
            if let Some(expansion) = expansion {
                f(expansion);
            }
        }
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            f(left);
            f(right);
        }
        ExprKind::Unary { operand, .. } => f(operand),
        ExprKind::IsA { value, .. } => f(value),
        ExprKind::If {
            condition,
            then_body,
            else_body,
        } => {
            f(condition);
            block_mut(then_body, f);
            if let Some(else_body) = else_body {
                block_mut(else_body, f);
            }
        }
        ExprKind::While { condition, body } => {
            f(condition);
            block_mut(body, f);
        }
        ExprKind::Match {
            value,
            cases,
            else_body,
        } => {
            f(value);
            for case in cases {
                pattern_mut(&mut case.pattern, f);
                block_mut(&mut case.body, f);
            }
            if let Some(else_body) = else_body {
                block_mut(else_body, f);
            }
        }
        ExprKind::Do(body) => block_mut(body, f),
        ExprKind::Return(value) => {
            if let Some(value) = value {
                f(value);
            }
        }
        ExprKind::Throw(value) => f(value),
        ExprKind::Try { body, catches } => {
            block_mut(body, f);
            for clause in catches {
                pattern_mut(&mut clause.pattern, f);
                block_mut(&mut clause.body, f);
            }
        }
        ExprKind::Closure { params, body, .. } => {
            for param in params {
                if let Some(default) = &mut param.default {
                    f(default);
                }
            }
            block_mut(body, f);
        }
        ExprKind::ArrayList(elements) => elements.iter_mut().for_each(|e| f(e)),
        ExprKind::HashMap(pairs) => {
            for (key, value) in pairs {
                f(key);
                f(value);
            }
        }
    }
}

/// 对语句块中每个表达式语句调用 `f`
pub fn block_mut<T>(
    block: &mut Block<T>,
    f: &mut impl FnMut(&mut Expr<T>),
) {
    for stmt in block {
        if let StmtKind::Expr(expr) = &mut stmt.kind {
            f(expr);
        }
    }
}

fn arguments_mut<T>(
    args: &mut Arguments<T>,
    f: &mut impl FnMut(&mut Expr<T>),
) {
    for arg in &mut args.positional {
        f(arg);
    }
    for arg in &mut args.named {
        f(&mut arg.value);
    }
}

fn pattern_mut<T>(
    pattern: &mut Pattern<T>,
    f: &mut impl FnMut(&mut Expr<T>),
) {
    match &mut pattern.kind {
        PatternKind::Wildcard | PatternKind::Identifier(_) => {}
        PatternKind::As { pattern, .. } => pattern_mut(pattern, f),
        PatternKind::Value(value) => f(value),
        PatternKind::Object { attributes, .. } => {
            for attribute in attributes {
                pattern_mut(&mut attribute.pattern, f);
            }
        }
        PatternKind::List { elements, .. } => {
            for element in elements {
                pattern_mut(element, f);
            }
        }
        PatternKind::Map(entries) => {
            for entry in entries {
                f(&mut entry.key);
                pattern_mut(&mut entry.value, f);
            }
        }
        PatternKind::Or(left, right) | PatternKind::And(left, right) => {
            pattern_mut(left, f);
            pattern_mut(right, f);
        }
    }
}

/// [`for_each_child_mut`] 的只读版本
pub fn for_each_child<T>(
    expr: &Expr<T>,
    f: &mut impl FnMut(&Expr<T>),
) {
    match &expr.kind {
        ExprKind::Nil
        | ExprKind::True
        | ExprKind::False
        | ExprKind::SelfLiteral
        | ExprKind::Literal { .. }
        | ExprKind::Ident(_)
        | ExprKind::InstanceVar(_)
        | ExprKind::Constant(_)
        | ExprKind::Break
        | ExprKind::Continue
        | ExprKind::Invalid => {}
        ExprKind::Var { init, .. } => {
            if let Some(init) = init {
                f(init);
            }
        }
        ExprKind::Assign { value, .. } | ExprKind::IvarAssign { value, .. } => f(value),
        ExprKind::Call { receiver, args, .. } => {
            if let Some(receiver) = receiver {
                f(receiver);
            }
            arguments(args, f);
        }
        ExprKind::New { args, .. } => arguments(args, f),
        ExprKind::MacroCall {
            args, expansion, ..
        } => {
            arguments(args, f);
            if let Some(expansion) = expansion {
                f(expansion);
            }
        }
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            f(left);
            f(right);
        }
        ExprKind::Unary { operand, .. } => f(operand),
        ExprKind::IsA { value, .. } => f(value),
        ExprKind::If {
            condition,
            then_body,
            else_body,
        } => {
            f(condition);
            block(then_body, f);
            if let Some(else_body) = else_body {
                block(else_body, f);
            }
        }
        ExprKind::While { condition, body } => {
            f(condition);
            block(body, f);
        }
        ExprKind::Match {
            value,
            cases,
            else_body,
        } => {
            f(value);
            for case in cases {
                pattern(&case.pattern, f);
                block(&case.body, f);
            }
            if let Some(else_body) = else_body {
                block(else_body, f);
            }
        }
        ExprKind::Do(body) => block(body, f),
        ExprKind::Return(value) => {
            if let Some(value) = value {
                f(value);
            }
        }
        ExprKind::Throw(value) => f(value),
        ExprKind::Try { body, catches } => {
            block(body, f);
            for clause in catches {
                pattern(&clause.pattern, f);
                block(&clause.body, f);
            }
        }
        ExprKind::Closure { params, body, .. } => {
            for param in params {
                if let Some(default) = &param.default {
                    f(default);
                }
            }
            block(body, f);
        }
        ExprKind::ArrayList(elements) => elements.iter().for_each(|e| f(e)),
        ExprKind::HashMap(pairs) => {
            for (key, value) in pairs {
                f(key);
                f(value);
            }
        }
    }
}

/// 对语句块中每个表达式语句调用 `f`（只读）
pub fn block<T>(
    stmts: &[Stmt<T>],
    f: &mut impl FnMut(&Expr<T>),
) {
    for stmt in stmts {
        if let StmtKind::Expr(expr) = &stmt.kind {
            f(expr);
        }
    }
}

fn arguments<T>(
    args: &Arguments<T>,
    f: &mut impl FnMut(&Expr<T>),
) {
    for arg in &args.positional {
        f(arg);
    }
    for arg in &args.named {
        f(&arg.value);
    }
}

fn pattern<T>(
    pattern: &Pattern<T>,
    f: &mut impl FnMut(&Expr<T>),
) {
    match &pattern.kind {
        PatternKind::Wildcard | PatternKind::Identifier(_) => {}
        PatternKind::As { pattern: inner, .. } => self::pattern(inner, f),
        PatternKind::Value(value) => f(value),
        PatternKind::Object { attributes, .. } => {
            for attribute in attributes {
                self::pattern(&attribute.pattern, f);
            }
        }
        PatternKind::List { elements, .. } => {
            for element in elements {
                self::pattern(element, f);
            }
        }
        PatternKind::Map(entries) => {
            for entry in entries {
                f(&entry.key);
                self::pattern(&entry.value, f);
            }
        }
        PatternKind::Or(left, right) | PatternKind::And(left, right) => {
            self::pattern(left, f);
            self::pattern(right, f);
        }
    }
}
