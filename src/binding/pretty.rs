//! Printing of bound and lowered code
//!
//! Bound bodies print as trees, lowered bodies as one statement per line with labels flush
//! left, which reads like assembly and makes the jumps easy to follow.

use std::borrow::Cow;
use std::io;

use ptree::{write_tree, Style, TreeItem};

use super::{BoundExpression, BoundExpressionKind, BoundStatement, BoundUnaryOperator, Callee};
use crate::context::CompilationContext;
use crate::symbols::FunctionId;

#[derive(Clone)]
enum NodeKind<'a> {
    Function(FunctionId, &'a [BoundStatement]),
    Statement(&'a BoundStatement),
    Expression(&'a BoundExpression),
    Group(&'static str, Vec<BoundNode<'a>>),
}

/// A node of the bound tree as printed by `--mode bound`
#[derive(Clone)]
pub struct BoundNode<'a> {
    ctx: &'a CompilationContext,
    kind: NodeKind<'a>,
}

impl<'a> BoundNode<'a> {
    pub fn function(ctx: &'a CompilationContext, function: FunctionId, body: &'a [BoundStatement]) -> Self {
        Self {
            ctx,
            kind: NodeKind::Function(function, body),
        }
    }

    fn statement(&self, statement: &'a BoundStatement) -> Self {
        Self {
            ctx: self.ctx,
            kind: NodeKind::Statement(statement),
        }
    }

    fn expression(&self, expression: &'a BoundExpression) -> Self {
        Self {
            ctx: self.ctx,
            kind: NodeKind::Expression(expression),
        }
    }

    fn group(&self, label: &'static str, statements: &'a [BoundStatement]) -> Self {
        Self {
            ctx: self.ctx,
            kind: NodeKind::Group(label, statements.iter().map(|s| self.statement(s)).collect()),
        }
    }

    fn label(&self) -> String {
        let ctx = self.ctx;
        match &self.kind {
            NodeKind::Function(function, _) => ctx.signature(*function),
            NodeKind::Group(label, _) => label.to_string(),
            NodeKind::Statement(statement) => match statement {
                BoundStatement::Expression(_) => String::from("expression"),
                BoundStatement::Variable { variable, .. } => {
                    let symbol = &ctx.variables[*variable];
                    let keyword = if symbol.is_mutable { "var" } else { "val" };
                    format!("{keyword} {}: {}", symbol.emit_name, ctx.type_name(symbol.ty))
                }
                BoundStatement::Loop { condition: None, .. } => String::from("loop"),
                BoundStatement::Loop { .. } => String::from("while"),
                BoundStatement::For { variable, .. } => {
                    format!("for {}", ctx.variables[*variable].emit_name)
                }
                BoundStatement::Assignment { .. } => String::from("assign"),
                BoundStatement::PointerAssignment { .. } => String::from("store"),
                other => render_statement(ctx, other),
            },
            NodeKind::Expression(expression) => {
                let head = match &expression.kind {
                    BoundExpressionKind::Unary { operator, .. } => {
                        format!("unary {}", unary_symbol(*operator))
                    }
                    BoundExpressionKind::Binary { operator, .. } => format!("binary {}", operator.kind),
                    BoundExpressionKind::Call {
                        callee: Callee::Function(function),
                        ..
                    } => format!("call {}", ctx.functions[*function].path),
                    BoundExpressionKind::Call { .. } => String::from("call"),
                    BoundExpressionKind::Cast(_) => String::from("cast"),
                    BoundExpressionKind::Field { target, index } => {
                        format!("field {}", ctx.types.field(target.ty, *index).name)
                    }
                    BoundExpressionKind::StructInit(_) => String::from("struct"),
                    BoundExpressionKind::Block { .. } => String::from("block"),
                    BoundExpressionKind::If { .. } => String::from("if"),
                    BoundExpressionKind::ArrayInit(_) => String::from("array"),
                    BoundExpressionKind::ZeroedArray(_) => String::from("zeroed array"),
                    BoundExpressionKind::Deref { index: None, .. } => String::from("deref"),
                    BoundExpressionKind::Deref { .. } => String::from("index"),
                    _ => render_expression(ctx, expression),
                };
                match &expression.constant {
                    Some(constant) if !matches!(expression.kind, BoundExpressionKind::Literal(_)) => {
                        format!("{head}: {} = {constant}", ctx.type_name(expression.ty))
                    }
                    _ => format!("{head}: {}", ctx.type_name(expression.ty)),
                }
            }
        }
    }
}

impl TreeItem for BoundNode<'_> {
    type Child = Self;

    fn write_self<W: io::Write>(&self, f: &mut W, style: &Style) -> io::Result<()> {
        write!(f, "{}", style.paint(self.label()))
    }

    fn children(&self) -> Cow<[Self::Child]> {
        let children = match &self.kind {
            NodeKind::Function(_, body) => body.iter().map(|s| self.statement(s)).collect(),
            NodeKind::Group(_, children) => children.clone(),
            NodeKind::Statement(statement) => match *statement {
                BoundStatement::Expression(expression) => vec![self.expression(expression)],
                BoundStatement::Variable { initializer, .. } => vec![self.expression(initializer)],
                BoundStatement::Loop {
                    condition, body, ..
                } => {
                    let mut children: Vec<_> = condition.iter().map(|c| self.expression(c)).collect();
                    children.push(self.group("body", body));
                    children
                }
                BoundStatement::For {
                    lower, upper, body, ..
                } => vec![
                    self.expression(lower),
                    self.expression(upper),
                    self.group("body", body),
                ],
                BoundStatement::ConditionalGoto { condition, .. } => vec![self.expression(condition)],
                BoundStatement::Return(Some(value)) => vec![self.expression(value)],
                BoundStatement::Assignment { target, value } => {
                    vec![self.expression(target), self.expression(value)]
                }
                BoundStatement::PointerAssignment {
                    pointer,
                    index,
                    value,
                } => {
                    let mut children = vec![self.expression(pointer)];
                    children.extend(index.iter().map(|i| self.expression(i)));
                    children.push(self.expression(value));
                    children
                }
                _ => vec![],
            },
            NodeKind::Expression(expression) => match &expression.kind {
                BoundExpressionKind::Unary { operand, .. } => vec![self.expression(operand)],
                BoundExpressionKind::Binary { lhs, rhs, .. } => {
                    vec![self.expression(lhs), self.expression(rhs)]
                }
                BoundExpressionKind::Call { callee, args } => {
                    let mut children = match callee {
                        Callee::Value(value) => vec![self.expression(value)],
                        Callee::Function(_) => vec![],
                    };
                    children.extend(args.iter().map(|a| self.expression(a)));
                    children
                }
                BoundExpressionKind::Cast(operand) | BoundExpressionKind::ZeroedArray(operand) => {
                    vec![self.expression(operand)]
                }
                BoundExpressionKind::Field { target, .. } => vec![self.expression(target)],
                BoundExpressionKind::StructInit(values) | BoundExpressionKind::ArrayInit(values) => {
                    values.iter().map(|v| self.expression(v)).collect()
                }
                BoundExpressionKind::Block { statements, value } => {
                    let mut children: Vec<_> = statements.iter().map(|s| self.statement(s)).collect();
                    children.extend(value.iter().map(|v| self.expression(v)));
                    children
                }
                BoundExpressionKind::If {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    let mut children = vec![self.expression(condition), self.expression(then_branch)];
                    children.extend(else_branch.iter().map(|e| self.expression(e)));
                    children
                }
                BoundExpressionKind::Deref { pointer, index } => {
                    let mut children = vec![self.expression(pointer)];
                    children.extend(index.iter().map(|i| self.expression(i)));
                    children
                }
                _ => vec![],
            },
        };
        Cow::from(children)
    }
}

/// Write the bound body of a function as a tree
pub fn write_bound_function<W: io::Write>(
    ctx: &CompilationContext,
    function: FunctionId,
    body: &[BoundStatement],
    out: W,
) -> io::Result<()> {
    write_tree(&BoundNode::function(ctx, function, body), out)
}

/// Write a lowered body, one statement per line
pub fn write_lowered_function<W: io::Write>(
    ctx: &CompilationContext,
    function: FunctionId,
    body: &[BoundStatement],
    mut out: W,
) -> io::Result<()> {
    writeln!(out, "{}", ctx.signature(function))?;
    for statement in body {
        match statement {
            BoundStatement::Label(_) => writeln!(out, "{}", render_statement(ctx, statement))?,
            _ => writeln!(out, "    {}", render_statement(ctx, statement))?,
        }
    }
    Ok(())
}

fn unary_symbol(operator: BoundUnaryOperator) -> &'static str {
    match operator {
        BoundUnaryOperator::Negate => "-",
        BoundUnaryOperator::Not => "!",
        BoundUnaryOperator::BitwiseNot => "~",
    }
}

fn render_list(ctx: &CompilationContext, expressions: &[BoundExpression]) -> String {
    expressions
        .iter()
        .map(|e| render_expression(ctx, e))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_expression(ctx: &CompilationContext, expression: &BoundExpression) -> String {
    match &expression.kind {
        BoundExpressionKind::Literal(constant) => constant.to_string(),
        BoundExpressionKind::Variable(variable) => ctx.variables[*variable].emit_name.clone(),
        BoundExpressionKind::NamespaceVariable {
            namespace,
            variable,
        } => ctx.namespaces[*namespace].qualify(&ctx.variables[*variable].name),
        BoundExpressionKind::Function(function) | BoundExpressionKind::Lambda(function) => {
            ctx.functions[*function].path.clone()
        }
        BoundExpressionKind::Unary { operator, operand } => {
            format!("{}{}", unary_symbol(*operator), render_expression(ctx, operand))
        }
        BoundExpressionKind::Binary { operator, lhs, rhs } => format!(
            "({} {} {})",
            render_expression(ctx, lhs),
            operator.kind,
            render_expression(ctx, rhs)
        ),
        BoundExpressionKind::Call { callee, args } => {
            let callee = match callee {
                Callee::Function(function) => ctx.functions[*function].path.clone(),
                Callee::Value(value) => render_expression(ctx, value),
            };
            format!("{callee}({})", render_list(ctx, args))
        }
        BoundExpressionKind::Cast(operand) => format!(
            "({} as {})",
            render_expression(ctx, operand),
            ctx.type_name(expression.ty)
        ),
        BoundExpressionKind::Field { target, index } => format!(
            "{}.{}",
            render_expression(ctx, target),
            ctx.types.field(target.ty, *index).name
        ),
        BoundExpressionKind::StructInit(values) => {
            let fields: Vec<_> = values
                .iter()
                .enumerate()
                .map(|(i, value)| {
                    format!(
                        "{}: {}",
                        ctx.types.field(expression.ty, i).name,
                        render_expression(ctx, value)
                    )
                })
                .collect();
            format!("{} {{ {} }}", ctx.type_name(expression.ty), fields.join(", "))
        }
        BoundExpressionKind::Block { statements, value } => {
            let mut parts: Vec<_> = statements.iter().map(|s| render_statement(ctx, s)).collect();
            parts.extend(value.iter().map(|v| render_expression(ctx, v)));
            format!("{{ {} }}", parts.join("; "))
        }
        BoundExpressionKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let mut text = format!(
                "if {} {}",
                render_expression(ctx, condition),
                render_expression(ctx, then_branch)
            );
            if let Some(else_branch) = else_branch {
                text.push_str(" else ");
                text.push_str(&render_expression(ctx, else_branch));
            }
            text
        }
        BoundExpressionKind::ArrayInit(values) => format!("[{}]", render_list(ctx, values)),
        BoundExpressionKind::ZeroedArray(length) => {
            let element = ctx.types.pointee(expression.ty).unwrap_or(expression.ty);
            format!("[{}; {}]", ctx.type_name(element), render_expression(ctx, length))
        }
        BoundExpressionKind::Deref {
            pointer,
            index: None,
        } => format!("*{}", render_expression(ctx, pointer)),
        BoundExpressionKind::Deref {
            pointer,
            index: Some(index),
        } => format!(
            "{}[{}]",
            render_expression(ctx, pointer),
            render_expression(ctx, index)
        ),
        BoundExpressionKind::Reference(variable) => {
            format!("&{}", ctx.variables[*variable].emit_name)
        }
        BoundExpressionKind::Error => String::from("?"),
    }
}

pub fn render_statement(ctx: &CompilationContext, statement: &BoundStatement) -> String {
    match statement {
        BoundStatement::Expression(expression) => render_expression(ctx, expression),
        BoundStatement::Variable {
            variable,
            initializer,
        } => {
            let symbol = &ctx.variables[*variable];
            let keyword = if symbol.is_mutable { "var" } else { "val" };
            format!(
                "{keyword} {}: {} = {}",
                symbol.emit_name,
                ctx.type_name(symbol.ty),
                render_expression(ctx, initializer)
            )
        }
        BoundStatement::Loop {
            condition, body, ..
        } => {
            let head = match condition {
                Some(condition) => format!("while {}", render_expression(ctx, condition)),
                None => String::from("loop"),
            };
            let body: Vec<_> = body.iter().map(|s| render_statement(ctx, s)).collect();
            format!("{head} {{ {} }}", body.join("; "))
        }
        BoundStatement::For {
            variable,
            lower,
            upper,
            body,
            ..
        } => {
            let body: Vec<_> = body.iter().map(|s| render_statement(ctx, s)).collect();
            format!(
                "for {} in {}..{} {{ {} }}",
                ctx.variables[*variable].emit_name,
                render_expression(ctx, lower),
                render_expression(ctx, upper),
                body.join("; ")
            )
        }
        BoundStatement::Label(label) => format!("{label}:"),
        BoundStatement::Goto(label) => format!("goto {label}"),
        BoundStatement::ConditionalGoto {
            label,
            condition,
            jump_if_true,
        } => {
            let keyword = if *jump_if_true { "if" } else { "unless" };
            format!("goto {label} {keyword} {}", render_expression(ctx, condition))
        }
        BoundStatement::Return(None) => String::from("return"),
        BoundStatement::Return(Some(value)) => format!("return {}", render_expression(ctx, value)),
        BoundStatement::Assignment { target, value } => format!(
            "{} = {}",
            render_expression(ctx, target),
            render_expression(ctx, value)
        ),
        BoundStatement::PointerAssignment {
            pointer,
            index,
            value,
        } => {
            let place = match index {
                Some(index) => format!(
                    "{}[{}]",
                    render_expression(ctx, pointer),
                    render_expression(ctx, index)
                ),
                None => format!("*{}", render_expression(ctx, pointer)),
            };
            format!("{place} = {}", render_expression(ctx, value))
        }
        BoundStatement::NoOp => String::from("nop"),
    }
}
