//! Lowering
//!
//! Rewrites bound bodies into flat statement lists. Loops, `for` ranges, `if` expressions and
//! blocks disappear; what remains is plain statements plus [labels](BoundStatement::Label) and
//! jumps. Nested scopes are flattened, so every local gets an emit name that is unique within
//! its function.
//!
//! Lowering runs on programs that bound without errors. It reports nothing and treats
//! inconsistent input as a bug.

use std::collections::{BTreeMap, HashSet};
use std::mem;

use tracing::{debug, trace};

use crate::ast::BinaryOperator;
use crate::binding::{
    BoundBinaryOperator, BoundExpression, BoundExpressionKind, BoundProgram, BoundStatement,
    Callee,
};
use crate::context::CompilationContext;
use crate::symbols::{
    Constant, FunctionId, Label, PrimitiveKind, TypeId, VariableId, VariableKind, VariableSymbol,
};

pub mod cfg;

pub use cfg::{BasicBlock, ControlFlowGraph};

/// Lower every function body and the global initializers of a bound program
pub fn lower_program(
    ctx: &mut CompilationContext,
    program: &BoundProgram,
) -> (BTreeMap<FunctionId, Vec<BoundStatement>>, Vec<BoundStatement>) {
    let functions = program
        .functions
        .iter()
        .map(|(&function, body)| (function, lower_function(ctx, function, body.clone())))
        .collect();
    let globals = lower_globals(ctx, &program.globals);
    (functions, globals)
}

/// Lower one function body and remove the statements that can never run
pub fn lower_function(
    ctx: &mut CompilationContext,
    function: FunctionId,
    body: Vec<BoundStatement>,
) -> Vec<BoundStatement> {
    let mut lowerer = Lowerer::new(ctx);
    for param in lowerer.ctx.functions[function].params.clone() {
        lowerer.register_name(param);
    }
    for statement in body {
        lowerer.lower_statement(statement);
    }

    let statements = eliminate_dead_code(lowerer.statements);
    debug!(function = %ctx.functions[function].path, statements = statements.len(), "lowered");
    statements
}

/// Lower the global initializers into one flat list that runs before the entry point
pub fn lower_globals(
    ctx: &mut CompilationContext,
    globals: &[(VariableId, BoundExpression)],
) -> Vec<BoundStatement> {
    let mut lowerer = Lowerer::new(ctx);
    for (variable, initializer) in globals {
        lowerer.lower_statement(BoundStatement::Variable {
            variable: *variable,
            initializer: initializer.clone(),
        });
    }
    eliminate_dead_code(lowerer.statements)
}

/// Drop statements the control flow graph cannot reach, no-ops and labels nothing jumps to.
///
/// Running this on its own output changes nothing.
pub fn eliminate_dead_code(statements: Vec<BoundStatement>) -> Vec<BoundStatement> {
    let reachable = ControlFlowGraph::build(&statements).reachable_statements();
    let before = statements.len();

    let live: Vec<_> = statements
        .into_iter()
        .zip(reachable)
        .filter(|(statement, reachable)| *reachable && *statement != BoundStatement::NoOp)
        .map(|(statement, _)| statement)
        .collect();

    let targets: HashSet<Label> = live
        .iter()
        .filter_map(|statement| match statement {
            BoundStatement::Goto(label) | BoundStatement::ConditionalGoto { label, .. } => {
                Some(label.clone())
            }
            _ => None,
        })
        .collect();

    let live: Vec<_> = live
        .into_iter()
        .filter(|statement| match statement {
            BoundStatement::Label(label) => targets.contains(label),
            _ => true,
        })
        .collect();

    trace!(before, after = live.len(), "eliminated dead code");
    live
}

/// Whether evaluating the expression can have effects or fail. Such expressions may not be
/// evaluated speculatively or moved past other code.
fn has_effects(expression: &BoundExpression) -> bool {
    match &expression.kind {
        BoundExpressionKind::Literal(_)
        | BoundExpressionKind::Variable(_)
        | BoundExpressionKind::NamespaceVariable { .. }
        | BoundExpressionKind::Function(_)
        | BoundExpressionKind::Lambda(_)
        | BoundExpressionKind::Reference(_)
        | BoundExpressionKind::Error => false,
        BoundExpressionKind::Unary { operand, .. }
        | BoundExpressionKind::Cast(operand)
        | BoundExpressionKind::Field {
            target: operand, ..
        } => has_effects(operand),
        BoundExpressionKind::Binary { operator, lhs, rhs } => {
            let may_trap = matches!(operator.kind, BinaryOperator::Div | BinaryOperator::Rem)
                && rhs.constant.as_ref().map_or(true, |c| *c == Constant::Int(0));
            may_trap || has_effects(lhs) || has_effects(rhs)
        }
        _ => true,
    }
}

/// Whether the value of the expression is fixed no matter what runs before it is read.
/// Reads of variables, fields and pointers are not: hoisted statements may write them.
fn is_stable(expression: &BoundExpression) -> bool {
    expression.constant.is_some()
        || matches!(
            expression.kind,
            BoundExpressionKind::Literal(_)
                | BoundExpressionKind::Function(_)
                | BoundExpressionKind::Lambda(_)
                | BoundExpressionKind::Reference(_)
                | BoundExpressionKind::Error
        )
}

struct Lowerer<'a> {
    ctx: &'a mut CompilationContext,
    statements: Vec<BoundStatement>,
    /// Emit names already taken in the body
    names: HashSet<String>,
}

impl<'a> Lowerer<'a> {
    fn new(ctx: &'a mut CompilationContext) -> Self {
        Self {
            ctx,
            statements: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Give a variable an emit name no other variable of the body uses
    fn register_name(&mut self, variable: VariableId) {
        let name = self.ctx.variables[variable].name.clone();
        let mut emit_name = name.clone();
        let mut counter = 0;
        while !self.names.insert(emit_name.clone()) {
            counter += 1;
            emit_name = format!("{counter}_{name}");
        }
        self.ctx.variables[variable].emit_name = emit_name;
    }

    fn emit(&mut self, statement: BoundStatement) {
        self.statements.push(statement);
    }

    /// Declare a hidden variable holding `initializer`
    fn temporary(&mut self, name: &str, initializer: BoundExpression) -> VariableId {
        let symbol = VariableSymbol::new(name, VariableKind::Local, initializer.ty, true);
        let variable = self.ctx.add_variable(symbol);
        self.register_name(variable);
        self.emit(BoundStatement::Variable {
            variable,
            initializer,
        });
        variable
    }

    /// Jump to `label` when `condition` is `jump_if_true`. Decidable conditions become a plain
    /// jump or nothing.
    fn goto_if(&mut self, label: Label, condition: BoundExpression, jump_if_true: bool) {
        let statement = match condition.constant {
            Some(Constant::Bool(value)) if value == jump_if_true => BoundStatement::Goto(label),
            Some(Constant::Bool(_)) => BoundStatement::NoOp,
            _ => BoundStatement::ConditionalGoto {
                label,
                condition,
                jump_if_true,
            },
        };
        self.emit(statement);
    }

    /// The lowered form of expressions that leave no value behind
    fn nothing(&self) -> BoundExpression {
        BoundExpression::new(
            BoundExpressionKind::Block {
                statements: Vec::new(),
                value: None,
            },
            self.ctx.types.void(),
        )
    }

    fn is_nothing(expression: &BoundExpression) -> bool {
        matches!(
            &expression.kind,
            BoundExpressionKind::Block { statements, value: None } if statements.is_empty()
        )
    }

    fn lower_statement(&mut self, statement: BoundStatement) {
        match statement {
            BoundStatement::Expression(expression) => {
                let expression = self.lower_expression(expression);
                if !Self::is_nothing(&expression) {
                    self.emit(BoundStatement::Expression(expression));
                }
            }
            BoundStatement::Variable {
                variable,
                initializer,
            } => {
                let initializer = self.lower_expression(initializer);
                if self.ctx.variables[variable].kind == VariableKind::Local {
                    self.register_name(variable);
                }
                self.emit(BoundStatement::Variable {
                    variable,
                    initializer,
                });
            }
            BoundStatement::Loop {
                condition,
                body,
                break_label,
                continue_label,
            } => {
                self.emit(BoundStatement::Label(continue_label.clone()));
                if let Some(condition) = condition {
                    let condition = self.lower_expression(condition);
                    self.goto_if(break_label.clone(), condition, false);
                }
                for statement in body {
                    self.lower_statement(statement);
                }
                self.emit(BoundStatement::Goto(continue_label));
                self.emit(BoundStatement::Label(break_label));
            }
            BoundStatement::For {
                variable,
                lower,
                upper,
                body,
                break_label,
                continue_label,
            } => self.lower_for(variable, lower, upper, body, break_label, continue_label),
            BoundStatement::ConditionalGoto {
                label,
                condition,
                jump_if_true,
            } => {
                let condition = self.lower_expression(condition);
                self.goto_if(label, condition, jump_if_true);
            }
            BoundStatement::Return(value) => {
                let value = value.map(|value| self.lower_expression(value));
                let value = value.filter(|value| !Self::is_nothing(value));
                self.emit(BoundStatement::Return(value));
            }
            BoundStatement::Assignment { target, value } => {
                let value = self.lower_expression(value);
                let target = self.lower_expression(target);
                self.emit(BoundStatement::Assignment { target, value });
            }
            BoundStatement::PointerAssignment {
                pointer,
                index,
                value,
            } => {
                let mut operands = vec![pointer];
                let has_index = index.is_some();
                operands.extend(index);
                operands.push(value);

                let mut operands = self.lower_operands(operands).into_iter();
                let (Some(pointer), index, Some(value)) = (
                    operands.next(),
                    if has_index { operands.next() } else { None },
                    operands.next(),
                ) else {
                    unreachable!("operand count is preserved by lowering");
                };
                self.emit(BoundStatement::PointerAssignment {
                    pointer,
                    index,
                    value,
                });
            }
            BoundStatement::NoOp => {}
            statement @ (BoundStatement::Label(_) | BoundStatement::Goto(_)) => self.emit(statement),
        }
    }

    /// ```text
    /// val i = lower
    /// val $upper = upper
    /// start:
    ///     goto break unless i <= $upper
    ///     body
    /// continue:
    ///     i = i + 1
    ///     goto start
    /// break:
    /// ```
    fn lower_for(
        &mut self,
        variable: VariableId,
        lower: BoundExpression,
        upper: BoundExpression,
        body: Vec<BoundStatement>,
        break_label: Label,
        continue_label: Label,
    ) {
        let ty = self.ctx.variables[variable].ty;
        let bool = self.ctx.types.bool();

        let lower = self.lower_expression(lower);
        self.register_name(variable);
        self.emit(BoundStatement::Variable {
            variable,
            initializer: lower,
        });
        let upper = self.lower_expression(upper);
        let upper = self.temporary("$upper", upper);

        let start = self.ctx.fresh_label("for");
        self.emit(BoundStatement::Label(start.clone()));

        let condition = BoundExpression::new(
            BoundExpressionKind::Binary {
                operator: BoundBinaryOperator {
                    kind: BinaryOperator::LessEq,
                    operand_type: ty,
                    result_type: bool,
                },
                lhs: Box::new(BoundExpression::variable(variable, ty)),
                rhs: Box::new(BoundExpression::variable(upper, ty)),
            },
            bool,
        );
        self.goto_if(break_label.clone(), condition, false);

        for statement in body {
            self.lower_statement(statement);
        }

        self.emit(BoundStatement::Label(continue_label));
        let increment = BoundExpression::new(
            BoundExpressionKind::Binary {
                operator: BoundBinaryOperator {
                    kind: BinaryOperator::Add,
                    operand_type: ty,
                    result_type: ty,
                },
                lhs: Box::new(BoundExpression::variable(variable, ty)),
                rhs: Box::new(BoundExpression::literal(Constant::Int(1), ty)),
            },
            ty,
        );
        self.emit(BoundStatement::Assignment {
            target: BoundExpression::variable(variable, ty),
            value: increment,
        });
        self.emit(BoundStatement::Goto(start));
        self.emit(BoundStatement::Label(break_label));
    }

    /// Lower sibling operands so they still evaluate left to right. If a later operand has to
    /// emit statements, every earlier operand whose value those statements could change is
    /// saved in a temporary first.
    fn lower_operands(&mut self, operands: Vec<BoundExpression>) -> Vec<BoundExpression> {
        let mut lowered: Vec<BoundExpression> = Vec::with_capacity(operands.len());
        for operand in operands {
            let mark = self.statements.len();
            let value = self.lower_expression(operand);

            if self.statements.len() > mark && !lowered.iter().all(is_stable) {
                let hoisted = self.statements.split_off(mark);
                for earlier in &mut lowered {
                    if !is_stable(earlier) {
                        let ty = earlier.ty;
                        let saved = mem::replace(earlier, BoundExpression::error(ty));
                        let temporary = self.temporary("$tmp", saved);
                        *earlier = BoundExpression::variable(temporary, ty);
                    }
                }
                self.statements.extend(hoisted);
            }
            lowered.push(value);
        }
        lowered
    }

    fn lower_boxed(&mut self, expression: Box<BoundExpression>) -> Box<BoundExpression> {
        Box::new(self.lower_expression(*expression))
    }

    fn lower_expression(&mut self, expression: BoundExpression) -> BoundExpression {
        let BoundExpression { kind, ty, constant } = expression;

        // folded values replace their computation, variables keep their name
        if let Some(constant) = &constant {
            if !matches!(
                kind,
                BoundExpressionKind::Variable(_)
                    | BoundExpressionKind::NamespaceVariable { .. }
                    | BoundExpressionKind::Literal(_)
            ) {
                return BoundExpression::literal(constant.clone(), ty);
            }
        }

        let kind = match kind {
            BoundExpressionKind::Lambda(function) => BoundExpressionKind::Function(function),
            BoundExpressionKind::Unary { operator, operand } => BoundExpressionKind::Unary {
                operator,
                operand: self.lower_boxed(operand),
            },
            BoundExpressionKind::Binary { operator, lhs, rhs }
                if matches!(operator.kind, BinaryOperator::And | BinaryOperator::Or) =>
            {
                return self.lower_logical(operator, *lhs, *rhs, ty);
            }
            BoundExpressionKind::Binary { operator, lhs, rhs } => {
                let mut operands = self.lower_operands(vec![*lhs, *rhs]);
                let rhs = operands.pop().map(Box::new);
                let lhs = operands.pop().map(Box::new);
                let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
                    unreachable!("operand count is preserved by lowering");
                };
                BoundExpressionKind::Binary { operator, lhs, rhs }
            }
            BoundExpressionKind::Call { callee, args } => match callee {
                Callee::Function(function) => BoundExpressionKind::Call {
                    callee: Callee::Function(function),
                    args: self.lower_operands(args),
                },
                Callee::Value(callee) => {
                    let mut operands = vec![*callee];
                    operands.extend(args);
                    let mut operands = self.lower_operands(operands);
                    let callee = operands.remove(0);
                    BoundExpressionKind::Call {
                        callee: Callee::Value(Box::new(callee)),
                        args: operands,
                    }
                }
            },
            BoundExpressionKind::Cast(operand) => BoundExpressionKind::Cast(self.lower_boxed(operand)),
            BoundExpressionKind::Field { target, index } => BoundExpressionKind::Field {
                target: self.lower_boxed(target),
                index,
            },
            BoundExpressionKind::StructInit(values) => {
                BoundExpressionKind::StructInit(self.lower_operands(values))
            }
            BoundExpressionKind::ArrayInit(values) => {
                BoundExpressionKind::ArrayInit(self.lower_operands(values))
            }
            BoundExpressionKind::ZeroedArray(length) => {
                BoundExpressionKind::ZeroedArray(self.lower_boxed(length))
            }
            BoundExpressionKind::Deref { pointer, index } => {
                let mut operands = vec![*pointer];
                operands.extend(index.map(|index| *index));
                let mut operands = self.lower_operands(operands).into_iter();
                let Some(pointer) = operands.next() else {
                    unreachable!("operand count is preserved by lowering");
                };
                BoundExpressionKind::Deref {
                    pointer: Box::new(pointer),
                    index: operands.next().map(Box::new),
                }
            }
            BoundExpressionKind::Block { statements, value } => {
                for statement in statements {
                    self.lower_statement(statement);
                }
                return match value {
                    Some(value) => self.lower_expression(*value),
                    None => self.nothing(),
                };
            }
            BoundExpressionKind::If {
                condition,
                then_branch,
                else_branch,
            } => return self.lower_if(*condition, *then_branch, else_branch.map(|e| *e), ty),
            kind @ (BoundExpressionKind::Literal(_)
            | BoundExpressionKind::Variable(_)
            | BoundExpressionKind::NamespaceVariable { .. }
            | BoundExpressionKind::Function(_)
            | BoundExpressionKind::Reference(_)
            | BoundExpressionKind::Error) => kind,
        };

        BoundExpression::new(kind, ty).with_constant(constant)
    }

    /// Evaluate a branch for its effects only
    fn lower_into_statement(&mut self, expression: BoundExpression) {
        self.lower_statement(BoundStatement::Expression(expression));
    }

    /// ```text
    ///     var $if = <zero>
    ///     goto else unless condition
    ///     $if = then
    ///     goto end
    /// else:
    ///     $if = else
    /// end:
    /// ```
    fn lower_if(
        &mut self,
        condition: BoundExpression,
        then_branch: BoundExpression,
        else_branch: Option<BoundExpression>,
        ty: TypeId,
    ) -> BoundExpression {
        let end = self.ctx.fresh_label("end");
        let condition = self.lower_expression(condition);

        let Some(else_branch) = else_branch else {
            self.goto_if(end.clone(), condition, false);
            self.lower_into_statement(then_branch);
            self.emit(BoundStatement::Label(end));
            return self.nothing();
        };

        let else_label = self.ctx.fresh_label("else");
        if ty == self.ctx.types.void() || self.ctx.types.is_error(ty) {
            self.goto_if(else_label.clone(), condition, false);
            self.lower_into_statement(then_branch);
            self.emit(BoundStatement::Goto(end.clone()));
            self.emit(BoundStatement::Label(else_label));
            self.lower_into_statement(else_branch);
            self.emit(BoundStatement::Label(end));
            return self.nothing();
        }

        let zero = BoundExpression::literal(self.zero_value(ty), ty);
        let result = self.temporary("$if", zero);
        let target = BoundExpression::variable(result, ty);

        self.goto_if(else_label.clone(), condition, false);
        let value = self.lower_expression(then_branch);
        self.emit(BoundStatement::Assignment {
            target: target.clone(),
            value,
        });
        self.emit(BoundStatement::Goto(end.clone()));
        self.emit(BoundStatement::Label(else_label));
        let value = self.lower_expression(else_branch);
        self.emit(BoundStatement::Assignment {
            target: target.clone(),
            value,
        });
        self.emit(BoundStatement::Label(end));
        target
    }

    /// `a && b` and `a || b`. If `b` has to emit statements, they only run when `a` does not
    /// already decide the result.
    fn lower_logical(
        &mut self,
        operator: BoundBinaryOperator,
        lhs: BoundExpression,
        rhs: BoundExpression,
        ty: TypeId,
    ) -> BoundExpression {
        let lhs = self.lower_expression(lhs);

        let mark = self.statements.len();
        let rhs = self.lower_expression(rhs);
        if self.statements.len() == mark && !has_effects(&rhs) {
            return BoundExpression::new(
                BoundExpressionKind::Binary {
                    operator,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                ty,
            );
        }

        let rhs_statements = self.statements.split_off(mark);
        let decides_on = operator.kind == BinaryOperator::Or;
        let name = if decides_on { "$or" } else { "$and" };
        let result = self.temporary(name, lhs);
        let target = BoundExpression::variable(result, ty);

        // `a && b` is done when a is false, `a || b` when a is true
        let end = self.ctx.fresh_label("end");
        self.goto_if(end.clone(), target.clone(), decides_on);
        self.statements.extend(rhs_statements);
        self.emit(BoundStatement::Assignment {
            target: target.clone(),
            value: rhs,
        });
        self.emit(BoundStatement::Label(end));
        target
    }

    fn zero_value(&self, ty: TypeId) -> Constant {
        match self.ctx.types.as_primitive(ty) {
            Some(kind) if kind.is_integer() => Constant::Int(0),
            Some(kind) if kind.is_float() => Constant::Float(0.0),
            Some(PrimitiveKind::Bool) => Constant::Bool(false),
            _ => Constant::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (CompilationContext, TypeId) {
        let ctx = CompilationContext::new();
        let int = ctx.types.primitive(PrimitiveKind::I32);
        (ctx, int)
    }

    fn local(ctx: &mut CompilationContext, name: &str, ty: TypeId) -> VariableId {
        ctx.add_variable(VariableSymbol::new(name, VariableKind::Local, ty, true))
    }

    fn int(value: i64, ty: TypeId) -> BoundExpression {
        BoundExpression::literal(Constant::Int(value), ty)
    }

    #[test]
    fn shadowed_names_are_made_unique() {
        let (mut ctx, int_type) = setup();
        let outer = local(&mut ctx, "x", int_type);
        let inner = local(&mut ctx, "x", int_type);
        let third = local(&mut ctx, "x", int_type);

        let mut lowerer = Lowerer::new(&mut ctx);
        lowerer.register_name(outer);
        lowerer.register_name(inner);
        lowerer.register_name(third);

        assert_eq!(ctx.variables[outer].emit_name, "x");
        assert_eq!(ctx.variables[inner].emit_name, "1_x");
        assert_eq!(ctx.variables[third].emit_name, "2_x");
    }

    #[test]
    fn constant_conditions_become_plain_jumps() {
        let (mut ctx, _) = setup();
        let bool = ctx.types.bool();
        let mut lowerer = Lowerer::new(&mut ctx);
        let label = Label::new("target");

        lowerer.goto_if(label.clone(), BoundExpression::literal(Constant::Bool(false), bool), false);
        lowerer.goto_if(label.clone(), BoundExpression::literal(Constant::Bool(false), bool), true);
        assert_eq!(
            lowerer.statements,
            [BoundStatement::Goto(label), BoundStatement::NoOp]
        );
    }

    #[test]
    fn dead_code_elimination_is_idempotent() {
        let (mut ctx, int_type) = setup();
        let x = local(&mut ctx, "x", int_type);
        let statements = vec![
            BoundStatement::Variable {
                variable: x,
                initializer: int(1, int_type),
            },
            BoundStatement::Label(Label::new("unused")),
            BoundStatement::NoOp,
            BoundStatement::Return(None),
            BoundStatement::Expression(int(2, int_type)),
        ];

        let once = eliminate_dead_code(statements);
        assert_eq!(once.len(), 2);
        let twice = eliminate_dead_code(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn value_ifs_assign_a_temporary() {
        let (mut ctx, int_type) = setup();
        let bool = ctx.types.bool();
        let flag = local(&mut ctx, "flag", bool);
        let x = local(&mut ctx, "x", int_type);

        let body = vec![BoundStatement::Variable {
            variable: x,
            initializer: BoundExpression::new(
                BoundExpressionKind::If {
                    condition: Box::new(BoundExpression::variable(flag, bool)),
                    then_branch: Box::new(int(1, int_type)),
                    else_branch: Some(Box::new(int(2, int_type))),
                },
                int_type,
            ),
        }];

        let mut lowerer = Lowerer::new(&mut ctx);
        for statement in body {
            lowerer.lower_statement(statement);
        }
        let statements = eliminate_dead_code(lowerer.statements);

        assert!(matches!(statements[0], BoundStatement::Variable { .. }));
        assert!(matches!(
            statements[1],
            BoundStatement::ConditionalGoto {
                jump_if_true: false,
                ..
            }
        ));
        assert!(matches!(statements[3], BoundStatement::Goto(_)));
        assert!(matches!(statements[4], BoundStatement::Label(_)));
        let BoundStatement::Variable { initializer, .. } = &statements[7] else {
            panic!("expected the declaration of x, got {:?}", statements[7]);
        };
        assert!(matches!(initializer.kind, BoundExpressionKind::Variable(_)));
        assert_eq!(ctx.variables[x].emit_name, "x");
    }
}
