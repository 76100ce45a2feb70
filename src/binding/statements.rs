use super::{Binder, BoundExpression, BoundExpressionKind, BoundStatement, LoopLabels};
use crate::ast::{
    BinaryOperator, Block, Expression, ExpressionKind, Name, Statement, StatementKind, UnaryOperator,
    VariableKeyword,
};
use crate::symbols::{FunctionId, PrimitiveKind, VariableKind};
use crate::util::Span;

impl Binder<'_> {
    /// Bind the body of a function. A trailing value becomes the return value.
    pub(super) fn bind_function_body(&mut self, function: FunctionId, body: &Block) -> Vec<BoundStatement> {
        self.function = Some(function);
        self.enter_scope();

        let params = self.ctx.functions[function].params.clone();
        for param in params {
            let name = self.ctx.variables[param].name.clone();
            // duplicates were reported with the signature
            self.scope.try_declare_variable(&name, param);
        }

        let mut statements: Vec<_> = body
            .statements
            .iter()
            .map(|statement| self.bind_statement(statement))
            .collect();

        if let Some(value) = &body.value {
            let return_type = self.ctx.functions[function].return_type;
            let bound = self.bind_expression(value);
            let statement = if return_type == self.void() || bound.ty == self.void() {
                BoundStatement::Expression(bound)
            } else {
                BoundStatement::Return(Some(self.convert(bound, return_type, value.span)))
            };
            statements.push(statement);
        }

        self.leave_scope();
        self.function = None;
        statements
    }

    /// Statements of a nested block in a scope of their own
    fn bind_block_statements(&mut self, block: &Block) -> Vec<BoundStatement> {
        self.enter_scope();
        let mut statements: Vec<_> = block
            .statements
            .iter()
            .map(|statement| self.bind_statement(statement))
            .collect();
        if let Some(value) = &block.value {
            statements.push(BoundStatement::Expression(self.bind_expression(value)));
        }
        self.leave_scope();
        statements
    }

    fn bind_loop_body(&mut self, body: &Block) -> (Vec<BoundStatement>, LoopLabels) {
        let labels = LoopLabels {
            break_label: self.ctx.fresh_label("break"),
            continue_label: self.ctx.fresh_label("continue"),
        };
        self.loops.push(labels.clone());
        let body = self.bind_block_statements(body);
        self.loops.pop();
        (body, labels)
    }

    pub(super) fn bind_statement(&mut self, statement: &Statement) -> BoundStatement {
        let span = statement.span;
        match &statement.kind {
            StatementKind::Variable {
                keyword,
                name,
                ty,
                initializer,
            } => {
                let bound = self.bind_expression(initializer);
                let value = match ty {
                    Some(clause) => {
                        let ty = self.resolve_type(clause);
                        self.convert(bound, ty, initializer.span)
                    }
                    None if bound.ty == self.void() => {
                        self.diagnostics
                            .report_expression_has_no_value(self.location(initializer.span));
                        self.error_expression()
                    }
                    None => bound,
                };

                self.check_constant_initializer(*keyword, &name.text, &value, initializer.span);
                let is_mutable = *keyword == VariableKeyword::Var;
                let constant = if is_mutable { None } else { value.constant.clone() };
                let variable =
                    self.declare_variable(name, VariableKind::Local, value.ty, is_mutable, constant);
                BoundStatement::Variable {
                    variable,
                    initializer: value,
                }
            }
            StatementKind::Assignment {
                target,
                operator,
                value,
            } => self.bind_assignment(target, *operator, value, span),
            StatementKind::While { condition, body } => {
                let bool = self.ctx.types.bool();
                let bound = self.bind_expression(condition);
                let condition = self.convert(bound, bool, condition.span);
                let (body, labels) = self.bind_loop_body(body);
                BoundStatement::Loop {
                    condition: Some(condition),
                    body,
                    break_label: labels.break_label,
                    continue_label: labels.continue_label,
                }
            }
            StatementKind::Loop { body } => {
                let (body, labels) = self.bind_loop_body(body);
                BoundStatement::Loop {
                    condition: None,
                    body,
                    break_label: labels.break_label,
                    continue_label: labels.continue_label,
                }
            }
            StatementKind::For {
                variable,
                lower,
                upper,
                body,
            } => self.bind_for(variable, lower, upper, body),
            StatementKind::Break | StatementKind::Continue => {
                let is_break = matches!(statement.kind, StatementKind::Break);
                match self.loops.last() {
                    Some(labels) if is_break => BoundStatement::Goto(labels.break_label.clone()),
                    Some(labels) => BoundStatement::Goto(labels.continue_label.clone()),
                    None => {
                        let keyword = if is_break { "break" } else { "continue" };
                        self.diagnostics
                            .report_invalid_break_or_continue(self.location(span), keyword);
                        BoundStatement::NoOp
                    }
                }
            }
            StatementKind::Return(value) => self.bind_return(value.as_ref(), span),
            StatementKind::Expression { expression, .. } => {
                BoundStatement::Expression(self.bind_expression(expression))
            }
        }
    }

    fn bind_return(&mut self, value: Option<&Expression>, span: Span) -> BoundStatement {
        let bound = value.map(|value| (self.bind_expression(value), value.span));
        let Some(function) = self.function else {
            self.diagnostics.report_invalid_return(self.location(span));
            return BoundStatement::NoOp;
        };

        let return_type = self.ctx.functions[function].return_type;
        let void = self.void();
        match bound {
            // `return f()` of a void function in a void function
            Some((value, _)) if return_type == void && value.ty == void => {
                BoundStatement::Return(Some(value))
            }
            Some((value, value_span)) if return_type == void => {
                if !self.is_error(value.ty) {
                    self.diagnostics
                        .report_unexpected_return_value(self.location(value_span));
                }
                BoundStatement::Return(None)
            }
            Some((value, value_span)) => {
                BoundStatement::Return(Some(self.convert(value, return_type, value_span)))
            }
            None if return_type == void || self.is_error(return_type) => BoundStatement::Return(None),
            None => {
                self.diagnostics
                    .report_missing_return_value(self.location(span), &self.type_name(return_type));
                BoundStatement::Return(None)
            }
        }
    }

    fn bind_for(
        &mut self,
        variable: &Name,
        lower: &Expression,
        upper: &Expression,
        body: &Block,
    ) -> BoundStatement {
        let lower_bound = self.bind_expression(lower);
        let upper_bound = self.bind_expression(upper);
        let (lower_bound, upper_bound) = self.unify_operands(lower_bound, upper_bound);

        let ty = if self.is_error(lower_bound.ty) || self.is_error(upper_bound.ty) {
            self.ctx.types.error()
        } else {
            let is_integer = self
                .ctx
                .types
                .as_primitive(lower_bound.ty)
                .is_some_and(PrimitiveKind::is_integer);
            if lower_bound.ty != upper_bound.ty || !is_integer {
                self.diagnostics.report_binary_operator_incompatible(
                    self.location(lower.span.to(upper.span)),
                    "..",
                    &self.type_name(lower_bound.ty),
                    &self.type_name(upper_bound.ty),
                );
                self.ctx.types.error()
            } else {
                lower_bound.ty
            }
        };

        self.enter_scope();
        let variable = self.declare_variable(variable, VariableKind::Local, ty, false, None);
        let (body, labels) = self.bind_loop_body(body);
        self.leave_scope();

        BoundStatement::For {
            variable,
            lower: lower_bound,
            upper: upper_bound,
            body,
            break_label: labels.break_label,
            continue_label: labels.continue_label,
        }
    }

    fn bind_assignment(
        &mut self,
        target: &Expression,
        operator: Option<BinaryOperator>,
        value: &Expression,
        span: Span,
    ) -> BoundStatement {
        let Some(bound_target) = self.bind_assignment_target(target) else {
            self.bind_expression(value);
            return BoundStatement::NoOp;
        };

        let bound_value = self.bind_expression(value);
        let bound_value = match operator {
            Some(operator) => {
                // the target is read here, its constant value is stale at this point
                let current = bound_target.clone().with_constant(None);
                self.bind_binary(current, operator, bound_value, span)
            }
            None => bound_value,
        };
        let bound_value = self.convert(bound_value, bound_target.ty, value.span);

        match bound_target.kind {
            BoundExpressionKind::Deref { pointer, index } => BoundStatement::PointerAssignment {
                pointer: *pointer,
                index: index.map(|index| *index),
                value: bound_value,
            },
            _ => BoundStatement::Assignment {
                target: bound_target,
                value: bound_value,
            },
        }
    }

    /// The place an assignment writes to, or `None` after reporting why it cannot be written
    fn bind_assignment_target(&mut self, target: &Expression) -> Option<BoundExpression> {
        match &target.kind {
            ExpressionKind::Name(name) => {
                let Some(variable) = self.lookup_variable(&name.text) else {
                    self.diagnostics
                        .report_undefined_name(self.location(name.span), &name.text);
                    return None;
                };
                let symbol = &self.ctx.variables[variable];
                if !symbol.is_mutable {
                    self.diagnostics
                        .report_immutable_assignment(self.location(target.span), &name.text);
                    return None;
                }
                Some(BoundExpression::variable(variable, symbol.ty))
            }
            ExpressionKind::Field { target: inner, name } => {
                if let Some(namespace) = self.namespace_prefix(inner) {
                    let Some(global) = self.bind_namespace_variable(namespace, name) else {
                        let path = self.ctx.namespaces[namespace].qualify(&name.text);
                        self.diagnostics
                            .report_undefined_name(self.location(name.span), &path);
                        return None;
                    };
                    let BoundExpressionKind::NamespaceVariable { variable, .. } = global.kind else {
                        return None;
                    };
                    if !self.ctx.variables[variable].is_mutable {
                        self.diagnostics
                            .report_immutable_assignment(self.location(target.span), &name.text);
                        return None;
                    }
                    return Some(global.with_constant(None));
                }

                let owner = self.bind_expression(inner);
                let field = self.bind_field_of(owner, name);
                if let BoundExpressionKind::Field { target: owner, index } = &field.kind {
                    if self.ctx.types.field(owner.ty, *index).is_read_only {
                        self.diagnostics
                            .report_immutable_assignment(self.location(target.span), &name.text);
                        return None;
                    }
                }
                (!field.is_error()).then_some(field)
            }
            ExpressionKind::Unary {
                operator: UnaryOperator::Deref,
                ..
            }
            | ExpressionKind::Index { .. } => {
                let place = self.bind_expression(target);
                (!place.is_error()).then_some(place)
            }
            _ => {
                self.diagnostics
                    .report_invalid_assignment_target(self.location(target.span));
                None
            }
        }
    }
}
