//! 抽象语法树
//!
//! 同一套节点定义同时表示外部解析器产出的语法树（`T = ()`）
//! 和检查器产出的带类型树（`T = Type`）。每个表达式、模式和类型表达式
//! 节点都带一个 `ty: T` 标注。
//!
//! 语法树实现了 `serde` 反序列化，外部解析器可以用 JSON 交付。

use serde::{Deserialize, Serialize};

use crate::frontend::core::type_system::{LiteralKind, Variance};
use crate::util::span::Span;

pub mod visit;

/// 语句块
pub type Block<T> = Vec<Stmt<T>>;

// ============================================================================
// 表达式
// ============================================================================

/// 表达式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct Expr<T> {
    pub kind: ExprKind<T>,
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub ty: T,
}

impl Expr<()> {
    /// 创建语法节点
    pub fn new(
        kind: ExprKind<()>,
        span: Span,
    ) -> Self {
        Self { kind, span, ty: () }
    }
}

impl<T> Expr<T> {
    /// 带类型节点
    pub fn typed(
        kind: ExprKind<T>,
        span: Span,
        ty: T,
    ) -> Self {
        Self { kind, span, ty }
    }
}

/// 二元运算符（按方法调用检查）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl BinaryOp {
    /// 对应的方法名
    pub fn method_name(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
        }
    }
}

/// 逻辑运算符（短路）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    And,
    Or,
}

/// 一元运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Minus,
}

/// 命名实参
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct NamedArgument<T> {
    pub name: String,
    pub value: Expr<T>,
    #[serde(default)]
    pub span: Span,
}

/// 实参列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct Arguments<T> {
    #[serde(default)]
    pub positional: Vec<Expr<T>>,
    #[serde(default)]
    pub named: Vec<NamedArgument<T>>,
}

impl<T> Default for Arguments<T> {
    fn default() -> Self {
        Self {
            positional: Vec::new(),
            named: Vec::new(),
        }
    }
}

impl<T> Arguments<T> {
    pub fn positional(positional: Vec<Expr<T>>) -> Self {
        Self {
            positional,
            named: Vec::new(),
        }
    }
}

/// `match` 的一个分支
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct MatchCase<T> {
    pub pattern: Pattern<T>,
    pub body: Block<T>,
    #[serde(default)]
    pub span: Span,
}

/// `catch` 分支
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct CatchClause<T> {
    pub pattern: Pattern<T>,
    pub body: Block<T>,
    #[serde(default)]
    pub span: Span,
}

/// 表达式种类
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub enum ExprKind<T> {
    Nil,
    True,
    False,
    SelfLiteral,
    Literal {
        kind: LiteralKind,
        value: String,
    },
    /// 局部变量
    Ident(String),
    /// `@name`
    InstanceVar(String),
    /// `Foo::Bar`
    Constant(Vec<String>),
    /// `var a: T = v` / `val a = v`
    Var {
        name: String,
        #[serde(default)]
        type_expr: Option<TypeExpr<T>>,
        #[serde(default)]
        init: Option<Box<Expr<T>>>,
        /// `val`：只能赋值一次
        #[serde(default)]
        single_assignment: bool,
    },
    Assign {
        name: String,
        value: Box<Expr<T>>,
    },
    IvarAssign {
        name: String,
        value: Box<Expr<T>>,
    },
    Call {
        #[serde(default)]
        receiver: Option<Box<Expr<T>>>,
        method: String,
        #[serde(default)]
        type_args: Vec<TypeExpr<T>>,
        #[serde(default)]
        args: Arguments<T>,
        /// `a?.b()`
        #[serde(default)]
        nil_safe: bool,
    },
    /// `Foo(args)` / `Foo::[Int](args)`
    New {
        class: Box<TypeExpr<T>>,
        #[serde(default)]
        args: Arguments<T>,
    },
    /// `name!(args)`；提升阶段填入展开结果
    MacroCall {
        name: String,
        #[serde(default)]
        args: Arguments<T>,
        #[serde(default)]
        expansion: Option<Box<Expr<T>>>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr<T>>,
        right: Box<Expr<T>>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr<T>>,
        right: Box<Expr<T>>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr<T>>,
    },
    /// `a <: Foo`，`exact` 时为 `a <<: Foo`
    IsA {
        value: Box<Expr<T>>,
        class: Box<TypeExpr<T>>,
        #[serde(default)]
        exact: bool,
    },
    If {
        condition: Box<Expr<T>>,
        then_body: Block<T>,
        #[serde(default)]
        else_body: Option<Block<T>>,
    },
    While {
        condition: Box<Expr<T>>,
        body: Block<T>,
    },
    Match {
        value: Box<Expr<T>>,
        cases: Vec<MatchCase<T>>,
        #[serde(default)]
        else_body: Option<Block<T>>,
    },
    Do(Block<T>),
    Return(Option<Box<Expr<T>>>),
    Throw(Box<Expr<T>>),
    Break,
    Continue,
    Try {
        body: Block<T>,
        catches: Vec<CatchClause<T>>,
    },
    Closure {
        params: Vec<ParamDecl<T>>,
        #[serde(default)]
        return_type: Option<TypeExpr<T>>,
        #[serde(default)]
        throw_type: Option<TypeExpr<T>>,
        body: Block<T>,
    },
    ArrayList(Vec<Expr<T>>),
    HashMap(Vec<(Expr<T>, Expr<T>)>),
    /// 解析器或宏展开留下的无效节点
    Invalid,
}

// ============================================================================
// 类型表达式
// ============================================================================

/// 类型表达式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct TypeExpr<T> {
    pub kind: TypeExprKind<T>,
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub ty: T,
}

impl TypeExpr<()> {
    pub fn new(
        kind: TypeExprKind<()>,
        span: Span,
    ) -> Self {
        Self { kind, span, ty: () }
    }
}

/// 闭包类型中的参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct ClosureParamType<T> {
    pub name: String,
    pub ty: TypeExpr<T>,
    #[serde(default)]
    pub kind: ParamDeclKind,
}

/// 类型表达式种类
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub enum TypeExprKind<T> {
    Never,
    Any,
    Void,
    Nil,
    Bool,
    True,
    False,
    SelfType,
    Literal {
        kind: LiteralKind,
        value: String,
    },
    /// `Foo::Bar`
    Name(Vec<String>),
    /// `Foo[Int, String]`
    Generic {
        name: Vec<String>,
        args: Vec<TypeExpr<T>>,
    },
    Nilable(Box<TypeExpr<T>>),
    Union(Vec<TypeExpr<T>>),
    Intersection(Vec<TypeExpr<T>>),
    /// `~T`
    Not(Box<TypeExpr<T>>),
    /// `|a: Int|: String ! Error`
    Closure {
        params: Vec<ClosureParamType<T>>,
        #[serde(default)]
        return_type: Option<Box<TypeExpr<T>>>,
        #[serde(default)]
        throw_type: Option<Box<TypeExpr<T>>>,
    },
    /// `&T`
    SingletonOf(Box<TypeExpr<T>>),
    /// `^T`
    InstanceOf(Box<TypeExpr<T>>),
}

// ============================================================================
// 模式
// ============================================================================

/// 模式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct Pattern<T> {
    pub kind: PatternKind<T>,
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub ty: T,
}

impl Pattern<()> {
    pub fn new(
        kind: PatternKind<()>,
        span: Span,
    ) -> Self {
        Self { kind, span, ty: () }
    }
}

/// 对象模式中的属性
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct AttributePattern<T> {
    pub name: String,
    pub pattern: Pattern<T>,
}

/// 列表模式的 rest 部分：`*rest` 或 `*`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestPattern {
    #[serde(default)]
    pub name: Option<String>,
    /// rest 之前的元素个数
    pub position: usize,
}

/// 映射模式条目（键是值表达式）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct MapPatternEntry<T> {
    pub key: Expr<T>,
    pub value: Pattern<T>,
}

/// 模式种类
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub enum PatternKind<T> {
    /// `_`
    Wildcard,
    /// 绑定新变量
    Identifier(String),
    /// `pattern as name`
    As {
        pattern: Box<Pattern<T>>,
        name: String,
    },
    /// 字面量或常量值
    Value(Expr<T>),
    /// `Foo(a: pattern, b: pattern)`
    Object {
        class: TypeExpr<T>,
        #[serde(default)]
        attributes: Vec<AttributePattern<T>>,
    },
    /// `[a, *rest, b]`
    List {
        elements: Vec<Pattern<T>>,
        #[serde(default)]
        rest: Option<RestPattern>,
    },
    /// `{ key => pattern }`
    Map(Vec<MapPatternEntry<T>>),
    Or(Box<Pattern<T>>, Box<Pattern<T>>),
    And(Box<Pattern<T>>, Box<Pattern<T>>),
}

// ============================================================================
// 语句与声明
// ============================================================================

/// 语句
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct Stmt<T> {
    pub kind: StmtKind<T>,
    #[serde(default)]
    pub span: Span,
}

impl<T> Stmt<T> {
    pub fn new(
        kind: StmtKind<T>,
        span: Span,
    ) -> Self {
        Self { kind, span }
    }

    pub fn expr(expr: Expr<T>) -> Self {
        let span = expr.span;
        Self {
            kind: StmtKind::Expr(expr),
            span,
        }
    }

    /// 是否是声明（而非表达式语句）
    pub fn is_declaration(&self) -> bool {
        !matches!(self.kind, StmtKind::Expr(_))
    }
}

/// 命名空间声明种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceDeclKind {
    Class,
    Mixin,
    Interface,
    Module,
}

impl NamespaceDeclKind {
    pub fn describe(self) -> &'static str {
        match self {
            NamespaceDeclKind::Class => "class",
            NamespaceDeclKind::Mixin => "mixin",
            NamespaceDeclKind::Interface => "interface",
            NamespaceDeclKind::Module => "module",
        }
    }
}

/// 类型参数声明：`+V < Foo > Bar`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct TypeParamDecl<T> {
    pub name: String,
    #[serde(default)]
    pub variance: Variance,
    #[serde(default)]
    pub upper_bound: Option<TypeExpr<T>>,
    #[serde(default)]
    pub lower_bound: Option<TypeExpr<T>>,
    #[serde(default)]
    pub span: Span,
}

/// 形参种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamDeclKind {
    #[default]
    Normal,
    PositionalRest,
    NamedRest,
}

/// 形参声明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct ParamDecl<T> {
    pub name: String,
    #[serde(default)]
    pub type_expr: Option<TypeExpr<T>>,
    #[serde(default)]
    pub kind: ParamDeclKind,
    #[serde(default)]
    pub default: Option<Expr<T>>,
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub ty: T,
}

/// 修饰
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default, rename = "abstract")]
    pub abstract_: bool,
    #[serde(default)]
    pub sealed: bool,
    #[serde(default)]
    pub primitive: bool,
}

/// `class` / `mixin` / `interface` / `module`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct NamespaceDecl<T> {
    pub kind: NamespaceDeclKind,
    pub name: String,
    #[serde(default)]
    pub type_params: Vec<TypeParamDecl<T>>,
    #[serde(default)]
    pub parent: Option<TypeExpr<T>>,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub body: Block<T>,
}

/// `def` / `sig`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct MethodDecl<T> {
    pub name: String,
    /// `def self.foo`
    #[serde(default)]
    pub singleton: bool,
    #[serde(default)]
    pub type_params: Vec<TypeParamDecl<T>>,
    #[serde(default)]
    pub params: Vec<ParamDecl<T>>,
    #[serde(default)]
    pub return_type: Option<TypeExpr<T>>,
    #[serde(default)]
    pub throw_type: Option<TypeExpr<T>>,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub body: Block<T>,
}

/// `const A: T = v`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct ConstantDecl<T> {
    pub name: String,
    #[serde(default)]
    pub type_expr: Option<TypeExpr<T>>,
    pub value: Expr<T>,
}

/// `type A[V] = T`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct TypeAliasDecl<T> {
    pub name: String,
    #[serde(default)]
    pub type_params: Vec<TypeParamDecl<T>>,
    pub target: TypeExpr<T>,
}

/// `var @a: T`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct InstanceVarDecl<T> {
    pub name: String,
    pub type_expr: TypeExpr<T>,
}

/// `macro name!(params)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct MacroDecl<T> {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDecl<T>>,
    #[serde(default)]
    pub return_type: Option<TypeExpr<T>>,
    #[serde(default)]
    pub body: Block<T>,
}

/// 语句种类
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub enum StmtKind<T> {
    Expr(Expr<T>),
    Namespace(NamespaceDecl<T>),
    Method(MethodDecl<T>),
    Constant(ConstantDecl<T>),
    TypeAlias(TypeAliasDecl<T>),
    Include(Vec<TypeExpr<T>>),
    Implement(Vec<TypeExpr<T>>),
    InstanceVar(InstanceVarDecl<T>),
    Macro(MacroDecl<T>),
}

impl<T> StmtKind<T> {
    /// 诊断中使用的声明名称
    pub fn describe(&self) -> &'static str {
        match self {
            StmtKind::Expr(_) => "expression",
            StmtKind::Namespace(decl) => decl.kind.describe(),
            StmtKind::Method(_) => "method",
            StmtKind::Constant(_) => "constant",
            StmtKind::TypeAlias(_) => "type",
            StmtKind::Include(_) => "include",
            StmtKind::Implement(_) => "implement",
            StmtKind::InstanceVar(_) => "instance variable",
            StmtKind::Macro(_) => "macro",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_syntax_tree() {
        let json = r#"[
            {"kind": {"expr": {"kind": {"var": {
                "name": "a",
                "type_expr": {"kind": {"nilable": {"kind": {"name": ["Int"]}}}},
                "init": {"kind": {"literal": {"kind": "int", "value": "5"}}}
            }}}}}
        ]"#;
        let stmts: Vec<Stmt<()>> = serde_json::from_str(json).unwrap();
        assert_eq!(stmts.len(), 1);
        let StmtKind::Expr(expr) = &stmts[0].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Var { name, init, .. } = &expr.kind else {
            panic!("expected var");
        };
        assert_eq!(name, "a");
        assert!(init.is_some());
    }

    #[test]
    fn test_binary_method_names() {
        assert_eq!(BinaryOp::Add.method_name(), "+");
        assert_eq!(BinaryOp::NotEqual.method_name(), "!=");
    }
}
