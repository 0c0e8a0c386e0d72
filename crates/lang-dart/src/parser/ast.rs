//! Syntax tree of the supported Dart subset.
//!
//! Every identifier keeps its offset so the resolver can report
//! occurrences; declarations keep their full source range.

use refscope_plugin::Directive;
use smol_str::SmolStr;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub name: SmolStr,
    pub offset: usize,
}

impl Name {
    pub fn end(&self) -> usize {
        self.offset + self.name.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct CompilationUnit {
    pub source: Arc<str>,
    pub library_name: Option<Name>,
    /// Directives with the span of the whole directive statement.
    pub directives: Vec<(Directive, Span)>,
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone)]
pub struct TypeRef {
    pub prefix: Option<Name>,
    pub name: Name,
    pub args: Vec<TypeRef>,
    /// Parameter types of a `Function(...)` type.
    pub function_params: Vec<TypeRef>,
}

#[derive(Debug)]
pub enum Declaration {
    Type(TypeDecl),
    Extension(ExtensionDecl),
    TypeAlias(TypeAliasDecl),
    Function(FunctionDecl),
    Variables(VariablesDecl),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeDeclKind {
    Class,
    Mixin,
    Enum,
    ExtensionType,
}

#[derive(Debug)]
pub struct TypeDecl {
    pub kind: TypeDeclKind,
    pub name: Name,
    pub type_params: Vec<Name>,
    pub extends: Option<TypeRef>,
    pub with: Vec<TypeRef>,
    pub implements: Vec<TypeRef>,
    pub on: Vec<TypeRef>,
    /// `extension type E(int value)`.
    pub representation: Option<Param>,
    pub enum_constants: Vec<EnumConstant>,
    pub members: Vec<Member>,
    pub span: Span,
}

#[derive(Debug)]
pub struct EnumConstant {
    pub name: Name,
    /// `a.named(...)`.
    pub constructor: Option<Name>,
    pub args: Option<Vec<Argument>>,
    pub span: Span,
}

#[derive(Debug)]
pub struct ExtensionDecl {
    pub name: Option<Name>,
    /// Offset of the `extension` keyword.
    pub keyword: usize,
    pub type_params: Vec<Name>,
    pub on: Option<TypeRef>,
    pub members: Vec<Member>,
    pub span: Span,
}

#[derive(Debug)]
pub struct TypeAliasDecl {
    pub name: Name,
    pub type_params: Vec<Name>,
    pub aliased: Option<TypeRef>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Function,
    Getter,
    Setter,
    Operator,
}

#[derive(Debug)]
pub struct FunctionDecl {
    pub kind: FunctionKind,
    pub name: Name,
    pub return_type: Option<TypeRef>,
    pub type_params: Vec<Name>,
    pub params: Vec<Param>,
    /// Source range of the parameter list, parentheses included.
    pub params_span: Option<Span>,
    pub body: Body,
    pub is_static: bool,
    pub span: Span,
}

#[derive(Debug)]
pub struct VariablesDecl {
    pub ty: Option<TypeRef>,
    pub is_static: bool,
    pub vars: Vec<VarDecl>,
    pub span: Span,
}

#[derive(Debug)]
pub struct VarDecl {
    pub name: Name,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug)]
pub enum Member {
    Method(FunctionDecl),
    Field(VariablesDecl),
    Constructor(ConstructorDecl),
}

#[derive(Debug)]
pub struct ConstructorDecl {
    pub class_name: Name,
    /// `None` for the unnamed constructor; `A.new` is also unnamed.
    pub name: Option<Name>,
    pub params: Vec<Param>,
    pub params_span: Span,
    pub initializers: Vec<Initializer>,
    /// `: this.other(...)` or `= B` factory redirection.
    pub redirect: Option<Redirect>,
    pub body: Body,
    pub span: Span,
}

#[derive(Debug)]
pub enum Redirect {
    This {
        name: Option<Name>,
        args: Vec<Argument>,
    },
    Factory {
        ty: TypeRef,
        name: Option<Name>,
    },
}

#[derive(Debug)]
pub enum Initializer {
    Field { name: Name, value: Expr },
    Super { keyword: usize, name: Option<Name>, args: Vec<Argument> },
    Assert(Vec<Argument>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    Plain,
    /// `this.x`
    Field,
    /// `super.x`
    Super,
}

#[derive(Debug)]
pub struct Param {
    pub name: Name,
    pub ty: Option<TypeRef>,
    pub mode: ParamMode,
    pub named: bool,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug)]
pub enum Body {
    None,
    Block(Vec<Stmt>),
    Expr(Expr),
}

#[derive(Debug)]
pub enum Stmt {
    Block(Vec<Stmt>),
    Variables(VariablesDecl),
    LocalFunction(FunctionDecl),
    Expr(Expr),
    Return(Option<Expr>),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        updates: Vec<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        var: ForInVar,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Switch {
        subject: Expr,
        cases: Vec<SwitchCase>,
    },
    Try {
        body: Vec<Stmt>,
        catches: Vec<CatchClause>,
        finally: Option<Vec<Stmt>>,
    },
    Labeled {
        label: Name,
        body: Box<Stmt>,
    },
    Break(Option<Name>),
    Continue(Option<Name>),
    Empty,
}

#[derive(Debug)]
pub enum ForInVar {
    Declared { ty: Option<TypeRef>, name: Name },
    Existing(Expr),
}

#[derive(Debug)]
pub struct SwitchCase {
    pub labels: Vec<Name>,
    /// `None` for `default:`.
    pub pattern: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub struct CatchClause {
    pub on: Option<TypeRef>,
    pub exception: Option<Name>,
    pub stack: Option<Name>,
    pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub struct Argument {
    pub label: Option<Name>,
    pub value: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignKind {
    Plain,
    /// `+=`, `??=`, `++`, ...
    Compound,
}

#[derive(Debug)]
pub enum Expr {
    Ident(Name),
    Literal,
    This(usize),
    Super(usize),
    /// The implicit receiver of a cascade section.
    CascadeReceiver,
    Member {
        target: Box<Expr>,
        name: Name,
    },
    Call {
        callee: Box<Expr>,
        type_args: Vec<TypeRef>,
        args: Vec<Argument>,
    },
    /// `new A.b()` / `const A()`.
    New {
        ty: TypeRef,
        constructor: Option<Name>,
        args: Vec<Argument>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        kind: AssignKind,
        value: Option<Box<Expr>>,
    },
    Binary {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary(Box<Expr>),
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Is {
        expr: Box<Expr>,
        ty: TypeRef,
    },
    As {
        expr: Box<Expr>,
        ty: TypeRef,
    },
    Collection {
        type_args: Vec<TypeRef>,
        elements: Vec<Expr>,
    },
    Function {
        params: Vec<Param>,
        body: Box<Body>,
        span: Span,
    },
    Cascade {
        target: Box<Expr>,
        sections: Vec<Expr>,
    },
    /// `throw e`, `await e`, `e!`, spreads and parenthesized expressions.
    Wrapped(Box<Expr>),
    /// A type literal used as a value, e.g. `List<int>` in an argument.
    TypeLiteral(TypeRef),
}

impl CompilationUnit {
    /// Source text of `span` with runs of whitespace collapsed.
    pub fn text(&self, span: Span) -> String {
        let raw = self.source.get(span.start..span.end).unwrap_or_default();
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
