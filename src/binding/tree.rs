//! Bound tree
//!
//! The typed representation produced by the binder. Every expression knows its type and, if it
//! can be computed at compile time, its constant value. The lowerer consumes this tree and
//! produces a flat list of the same statement type in which only [BoundStatement::Label],
//! [BoundStatement::Goto] and [BoundStatement::ConditionalGoto] express control flow.

use crate::ast::BinaryOperator;
use crate::symbols::{Constant, FunctionId, Label, NamespaceId, TypeId, VariableId};

#[derive(Debug, Clone, PartialEq)]
pub struct BoundExpression {
    pub kind: BoundExpressionKind,
    pub ty: TypeId,
    pub constant: Option<Constant>,
}

impl BoundExpression {
    pub fn new(kind: BoundExpressionKind, ty: TypeId) -> Self {
        Self {
            kind,
            ty,
            constant: None,
        }
    }

    pub fn literal(constant: Constant, ty: TypeId) -> Self {
        Self {
            kind: BoundExpressionKind::Literal(constant.clone()),
            ty,
            constant: Some(constant),
        }
    }

    pub fn variable(variable: VariableId, ty: TypeId) -> Self {
        Self::new(BoundExpressionKind::Variable(variable), ty)
    }

    /// Placeholder for an expression whose problem was already reported
    pub fn error(ty: TypeId) -> Self {
        Self::new(BoundExpressionKind::Error, ty)
    }

    pub fn with_constant(mut self, constant: Option<Constant>) -> Self {
        self.constant = constant;
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, BoundExpressionKind::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundUnaryOperator {
    Negate,
    Not,
    BitwiseNot,
}

/// A binary operator resolved against concrete operand types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundBinaryOperator {
    pub kind: BinaryOperator,
    pub operand_type: TypeId,
    pub result_type: TypeId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    Function(FunctionId),
    /// A value of function type
    Value(Box<BoundExpression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpressionKind {
    Literal(Constant),
    Variable(VariableId),
    /// A global reached through a namespace path like `app.config.limit`
    NamespaceVariable {
        namespace: NamespaceId,
        variable: VariableId,
    },
    /// A function used as a value
    Function(FunctionId),
    Unary {
        operator: BoundUnaryOperator,
        operand: Box<BoundExpression>,
    },
    Binary {
        operator: BoundBinaryOperator,
        lhs: Box<BoundExpression>,
        rhs: Box<BoundExpression>,
    },
    Call {
        callee: Callee,
        args: Vec<BoundExpression>,
    },
    /// Conversion to the type of the expression
    Cast(Box<BoundExpression>),
    Field {
        target: Box<BoundExpression>,
        index: usize,
    },
    /// Values for every field slot in order, defaults already filled in
    StructInit(Vec<BoundExpression>),
    Block {
        statements: Vec<BoundStatement>,
        value: Option<Box<BoundExpression>>,
    },
    If {
        condition: Box<BoundExpression>,
        then_branch: Box<BoundExpression>,
        else_branch: Option<Box<BoundExpression>>,
    },
    /// `[a, b, c]`
    ArrayInit(Vec<BoundExpression>),
    /// `[T; n]`
    ZeroedArray(Box<BoundExpression>),
    /// `*p` or `p[i]`
    Deref {
        pointer: Box<BoundExpression>,
        index: Option<Box<BoundExpression>>,
    },
    /// `&x`
    Reference(VariableId),
    Lambda(FunctionId),
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundStatement {
    Expression(BoundExpression),
    Variable {
        variable: VariableId,
        initializer: BoundExpression,
    },
    /// `while` and `loop`
    Loop {
        condition: Option<BoundExpression>,
        body: Vec<BoundStatement>,
        break_label: Label,
        continue_label: Label,
    },
    /// `for variable in lower..upper`, bounds inclusive
    For {
        variable: VariableId,
        lower: BoundExpression,
        upper: BoundExpression,
        body: Vec<BoundStatement>,
        break_label: Label,
        continue_label: Label,
    },
    Label(Label),
    Goto(Label),
    ConditionalGoto {
        label: Label,
        condition: BoundExpression,
        jump_if_true: bool,
    },
    Return(Option<BoundExpression>),
    /// Assignment to a variable or a field
    Assignment {
        target: BoundExpression,
        value: BoundExpression,
    },
    /// `*p = v` or `p[i] = v`
    PointerAssignment {
        pointer: BoundExpression,
        index: Option<BoundExpression>,
        value: BoundExpression,
    },
    NoOp,
}

impl BoundStatement {
    /// Statements after which control never falls through
    pub fn is_terminator(&self) -> bool {
        matches!(self, BoundStatement::Goto(_) | BoundStatement::Return(_))
    }
}
