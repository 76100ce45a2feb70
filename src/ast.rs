//! Syntax tree
//!
//! The untyped tree produced by [crate::parsing] and consumed by the binder. Every node carries
//! the [Span] it was parsed from so that diagnostics can point at it.

use std::fmt;
use std::rc::Rc;

use crate::util::{SourceFile, Span};

/// One parsed source file
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    pub source: Rc<SourceFile>,
    pub unit: CompilationUnit,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilationUnit {
    pub namespace: Option<Path>,
    pub uses: Vec<Path>,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    pub text: String,
    pub span: Span,
}

/// A dotted name like `app.util.Point`
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub segments: Vec<Name>,
    pub span: Span,
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i != 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", segment.text)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Function(FunctionDeclaration),
    Struct(StructDeclaration),
    Global(GlobalDeclaration),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub is_private: bool,
    pub is_internal: bool,
    pub is_inline: bool,
    pub is_extern: bool,
    pub is_entry: bool,
    pub is_extension: bool,
    pub is_operator: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub modifiers: Modifiers,
    pub name: Name,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeClause>,
    pub cname: Option<String>,
    pub body: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: Name,
    pub ty: TypeClause,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeClause {
    pub kind: TypeClauseKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeClauseKind {
    Named(Path),
    Pointer(Box<TypeClause>),
    Function {
        params: Vec<TypeClause>,
        return_type: Option<Box<TypeClause>>,
    },
}

impl fmt::Display for TypeClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeClauseKind::Named(path) => write!(f, "{path}"),
            TypeClauseKind::Pointer(inner) => write!(f, "*{inner}"),
            TypeClauseKind::Function {
                params,
                return_type,
            } => {
                write!(f, "fn(")?;
                for (i, param) in params.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ")")?;
                if let Some(return_type) = return_type {
                    write!(f, ": {return_type}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDeclaration {
    pub is_private: bool,
    pub is_internal: bool,
    pub name: Name,
    pub parent: Option<TypeClause>,
    pub fields: Vec<FieldDeclaration>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDeclaration {
    pub name: Name,
    pub ty: TypeClause,
    pub is_read_only: bool,
    pub is_override: bool,
    pub default: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKeyword {
    Val,
    Var,
    Const,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDeclaration {
    pub is_private: bool,
    pub is_internal: bool,
    pub keyword: VariableKeyword,
    pub name: Name,
    pub ty: Option<TypeClause>,
    pub initializer: Expression,
    pub span: Span,
}

/// `{ statements; value }`
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub value: Option<Box<Expression>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Variable {
        keyword: VariableKeyword,
        name: Name,
        ty: Option<TypeClause>,
        initializer: Expression,
    },
    Assignment {
        target: Expression,
        operator: Option<BinaryOperator>,
        value: Expression,
    },
    While {
        condition: Expression,
        body: Block,
    },
    Loop {
        body: Block,
    },
    For {
        variable: Name,
        lower: Expression,
        upper: Expression,
        body: Block,
    },
    Break,
    Continue,
    Return(Option<Expression>),
    Expression {
        expression: Expression,
        has_semicolon: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Int(String),
    Float(String),
    Bool(bool),
    Str(String),
    Name(Name),
    Field {
        target: Box<Expression>,
        name: Name,
    },
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
    },
    Index {
        target: Box<Expression>,
        index: Box<Expression>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        operator: BinaryOperator,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Cast {
        expression: Box<Expression>,
        ty: TypeClause,
    },
    StructInit {
        ty: TypeClause,
        fields: Vec<(Name, Expression)>,
    },
    Block(Block),
    Unsafe(Block),
    If {
        condition: Box<Expression>,
        then_branch: Block,
        else_branch: Option<Box<Expression>>,
    },
    Array(Vec<Expression>),
    ZeroedArray {
        element: TypeClause,
        length: Box<Expression>,
    },
    Lambda {
        params: Vec<Parameter>,
        return_type: Option<TypeClause>,
        body: Block,
    },
    /// Placeholder left behind by error recovery
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Negate,
    Not,
    BitwiseNot,
    AddressOf,
    Deref,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Equals,
    NotEquals,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
            UnaryOperator::Not => write!(f, "!"),
            UnaryOperator::BitwiseNot => write!(f, "~"),
            UnaryOperator::AddressOf => write!(f, "&"),
            UnaryOperator::Deref => write!(f, "*"),
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOperator::Add => write!(f, "+"),
            BinaryOperator::Sub => write!(f, "-"),
            BinaryOperator::Mul => write!(f, "*"),
            BinaryOperator::Div => write!(f, "/"),
            BinaryOperator::Rem => write!(f, "%"),
            BinaryOperator::BitAnd => write!(f, "&"),
            BinaryOperator::BitOr => write!(f, "|"),
            BinaryOperator::BitXor => write!(f, "^"),
            BinaryOperator::Shl => write!(f, "<<"),
            BinaryOperator::Shr => write!(f, ">>"),
            BinaryOperator::Equals => write!(f, "=="),
            BinaryOperator::NotEquals => write!(f, "!="),
            BinaryOperator::Less => write!(f, "<"),
            BinaryOperator::LessEq => write!(f, "<="),
            BinaryOperator::Greater => write!(f, ">"),
            BinaryOperator::GreaterEq => write!(f, ">="),
            BinaryOperator::And => write!(f, "&&"),
            BinaryOperator::Or => write!(f, "||"),
        }
    }
}
