use std::collections::HashSet;
use std::mem;

use super::operators::{
    bind_binary_operator, bind_unary_operator, binary_operator_function, unary_operator_function,
};
use super::{
    root_scope, Binder, BoundBinaryOperator, BoundExpression, BoundExpressionKind,
    BoundUnaryOperator, Callee,
};
use crate::ast::{self, BinaryOperator, Expression, ExpressionKind, UnaryOperator};
use crate::folding;
use crate::symbols::{
    Constant, FunctionId, FunctionSymbol, NamespaceId, PrimitiveKind, TypeId, VariableId,
    VariableKind, VariableSymbol,
};
use crate::util::Span;

impl Binder<'_> {
    pub(super) fn bind_expression(&mut self, expression: &Expression) -> BoundExpression {
        let span = expression.span;
        match &expression.kind {
            ExpressionKind::Int(text) => self.bind_int_literal(text, span),
            ExpressionKind::Float(text) => match text.parse::<f64>() {
                Ok(value) => {
                    BoundExpression::literal(Constant::Float(value), self.primitive(PrimitiveKind::F64))
                }
                Err(_) => {
                    self.diagnostics
                        .report_invalid_number(self.location(span), text);
                    self.error_expression()
                }
            },
            ExpressionKind::Bool(value) => {
                BoundExpression::literal(Constant::Bool(*value), self.ctx.types.bool())
            }
            ExpressionKind::Str(raw) => self.bind_string_literal(raw, span),
            ExpressionKind::Name(name) => self.bind_name(name),
            ExpressionKind::Field { target, name } => self.bind_field_access(target, name),
            ExpressionKind::Call { callee, args } => self.bind_call(callee, args, span),
            ExpressionKind::Index { target, index } => self.bind_index(target, index, span),
            ExpressionKind::Unary { operator, operand } => self.bind_unary(*operator, operand, span),
            ExpressionKind::Binary { operator, lhs, rhs } => {
                let lhs = self.bind_expression(lhs);
                let rhs = self.bind_expression(rhs);
                self.bind_binary(lhs, *operator, rhs, span)
            }
            ExpressionKind::Cast { expression, ty } => self.bind_cast(expression, ty, span),
            ExpressionKind::StructInit { ty, fields } => self.bind_struct_init(ty, fields, span),
            ExpressionKind::Block(block) => self.bind_block_expression(block),
            ExpressionKind::Unsafe(block) => {
                self.unsafe_depth += 1;
                let expression = self.bind_block_expression(block);
                self.unsafe_depth -= 1;
                expression
            }
            ExpressionKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.bind_if(condition, then_branch, else_branch.as_deref()),
            ExpressionKind::Array(elements) => self.bind_array(elements),
            ExpressionKind::ZeroedArray { element, length } => {
                let element = self.resolve_type(element);
                let length = self.bind_integer(length);
                if self.is_error(element) {
                    return self.error_expression();
                }
                let ty = self.ctx.types.pointer_to(element);
                BoundExpression::new(BoundExpressionKind::ZeroedArray(Box::new(length)), ty)
            }
            ExpressionKind::Lambda {
                params,
                return_type,
                body,
            } => self.bind_lambda(params, return_type.as_ref(), body, span),
            ExpressionKind::Missing => self.error_expression(),
        }
    }

    fn primitive(&self, kind: PrimitiveKind) -> TypeId {
        self.ctx.types.primitive(kind)
    }

    /// Integer literals are `i32` if they fit, `i64` otherwise, and `u64` beyond that
    fn bind_int_literal(&mut self, text: &str, span: Span) -> BoundExpression {
        if let Ok(value) = text.parse::<i64>() {
            let kind = if i32::try_from(value).is_ok() {
                PrimitiveKind::I32
            } else {
                PrimitiveKind::I64
            };
            return BoundExpression::literal(Constant::Int(value), self.primitive(kind));
        }
        if let Ok(value) = text.parse::<u64>() {
            return BoundExpression::literal(
                Constant::Int(value as i64),
                self.primitive(PrimitiveKind::U64),
            );
        }

        self.diagnostics
            .report_invalid_number(self.location(span), text);
        self.error_expression()
    }

    fn bind_string_literal(&mut self, raw: &str, span: Span) -> BoundExpression {
        let mut value = String::with_capacity(raw.len());
        let mut chars = raw.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                value.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some('r') => value.push('\r'),
                Some('0') => value.push('\0'),
                Some(c @ ('\\' | '"' | '\'')) => value.push(c),
                Some(other) => self
                    .diagnostics
                    .report_invalid_escape(self.location(span), other),
                None => self
                    .diagnostics
                    .report_invalid_escape(self.location(span), '\\'),
            }
        }

        let byte = self.primitive(PrimitiveKind::U8);
        let ty = self.ctx.types.pointer_to(byte);
        BoundExpression::literal(Constant::Str(value), ty)
    }

    /// A read of a variable, counted for the unused variable lint
    fn read_variable(&mut self, variable: VariableId) -> BoundExpression {
        let symbol = &mut self.ctx.variables[variable];
        symbol.use_count += 1;
        BoundExpression::variable(variable, symbol.ty).with_constant(symbol.constant.clone())
    }

    fn bind_name(&mut self, name: &ast::Name) -> BoundExpression {
        if let Some(variable) = self.lookup_variable(&name.text) {
            return self.read_variable(variable);
        }

        // a function used as a value, the first overload wins
        if let Some(&function) = self.lookup_functions(&name.text).first() {
            let ty = self.ctx.functions[function].ty;
            return BoundExpression::new(BoundExpressionKind::Function(function), ty);
        }

        if name.text == "null" {
            let ptr = self.primitive(PrimitiveKind::Ptr);
            return BoundExpression::literal(Constant::Null, ptr);
        }

        self.diagnostics
            .report_undefined_name(self.location(name.span), &name.text);
        self.error_expression()
    }

    /// The namespace named by a dotted path, unless its first segment is a variable
    pub(super) fn namespace_prefix(&self, expression: &Expression) -> Option<NamespaceId> {
        fn segments<'e>(expression: &'e Expression, out: &mut Vec<&'e str>) -> bool {
            match &expression.kind {
                ExpressionKind::Name(name) => {
                    out.push(&name.text);
                    true
                }
                ExpressionKind::Field { target, name } => {
                    let valid = segments(target, out);
                    out.push(&name.text);
                    valid
                }
                _ => false,
            }
        }

        let mut path = Vec::new();
        if !segments(expression, &mut path) || self.lookup_variable(path[0]).is_some() {
            return None;
        }
        self.ctx.namespaces.lookup(path)
    }

    pub(super) fn bind_namespace_variable(
        &mut self,
        namespace: NamespaceId,
        name: &ast::Name,
    ) -> Option<BoundExpression> {
        let variable = self.namespace_variable(namespace, &name.text)?;
        let mut expression = self.read_variable(variable);
        expression.kind = BoundExpressionKind::NamespaceVariable {
            namespace,
            variable,
        };
        Some(expression)
    }

    fn bind_field_access(&mut self, target: &Expression, name: &ast::Name) -> BoundExpression {
        if let Some(namespace) = self.namespace_prefix(target) {
            return match self.bind_namespace_variable(namespace, name) {
                Some(expression) => expression,
                None => {
                    let path = self.ctx.namespaces[namespace].qualify(&name.text);
                    self.diagnostics
                        .report_undefined_name(self.location(name.span), &path);
                    self.error_expression()
                }
            };
        }

        let target = self.bind_expression(target);
        self.bind_field_of(target, name)
    }

    pub(super) fn bind_field_of(&mut self, target: BoundExpression, name: &ast::Name) -> BoundExpression {
        if self.is_error(target.ty) {
            return self.error_expression();
        }

        let field = self
            .ctx
            .types
            .field_by_name(target.ty, &name.text)
            .map(|(index, field)| (index, field.ty));
        match field {
            Some((index, ty)) => BoundExpression::new(
                BoundExpressionKind::Field {
                    target: Box::new(target),
                    index,
                },
                ty,
            ),
            None => {
                self.diagnostics.report_undefined_field(
                    self.location(name.span),
                    &self.type_name(target.ty),
                    &name.text,
                );
                self.error_expression()
            }
        }
    }

    fn bind_call(&mut self, callee: &Expression, args: &[Expression], span: Span) -> BoundExpression {
        match &callee.kind {
            ExpressionKind::Field { target, name } => {
                if let Some(namespace) = self.namespace_prefix(target) {
                    let args = self.bind_arguments(args);
                    let candidates = self.namespace_functions(namespace, &name.text);
                    let path = self.ctx.namespaces[namespace].qualify(&name.text);
                    return self.resolve_call(&path, candidates, args, span, false);
                }

                let receiver = self.bind_expression(target);
                if self.is_error(receiver.ty) {
                    self.bind_arguments(args);
                    return self.error_expression();
                }

                // a field holding a function value
                let is_function_field = self
                    .ctx
                    .types
                    .field_by_name(receiver.ty, &name.text)
                    .is_some_and(|(_, field)| self.ctx.types.function_signature(field.ty).is_some());
                if is_function_field {
                    let callee = self.bind_field_of(receiver, name);
                    let args = self.bind_arguments(args);
                    return self.call_value(callee, args, span);
                }

                let mut arguments = vec![receiver];
                arguments.extend(self.bind_arguments(args));
                let candidates: Vec<_> = self
                    .lookup_functions(&name.text)
                    .into_iter()
                    .filter(|&f| self.ctx.functions[f].is_extension)
                    .collect();
                self.resolve_call(&name.text, candidates, arguments, span, true)
            }
            ExpressionKind::Name(name) if self.lookup_variable(&name.text).is_none() => {
                let args = self.bind_arguments(args);
                let candidates = self.lookup_functions(&name.text);
                self.resolve_call(&name.text, candidates, args, span, false)
            }
            _ => {
                let callee = self.bind_expression(callee);
                let args = self.bind_arguments(args);
                self.call_value(callee, args, span)
            }
        }
    }

    fn bind_arguments(&mut self, args: &[Expression]) -> Vec<BoundExpression> {
        args.iter().map(|arg| self.bind_expression(arg)).collect()
    }

    /// The first overload whose parameters accept the arguments as they are, else the first one
    /// that accepts them once literals are adapted
    fn find_overload(&self, candidates: &[FunctionId], args: &[BoundExpression]) -> Option<FunctionId> {
        let accepts = |function: FunctionId, exact: bool| {
            let params = self.ctx.param_types(function);
            params.len() == args.len()
                && args.iter().zip(&params).all(|(arg, &param)| {
                    if exact {
                        self.ctx.types.is_of_type(arg.ty, param)
                    } else {
                        self.is_assignable(arg, param)
                    }
                })
        };

        let candidates = || candidates.iter().copied();
        candidates()
            .find(|&function| accepts(function, true))
            .or_else(|| candidates().find(|&function| accepts(function, false)))
    }

    fn call_function(&mut self, function: FunctionId, args: Vec<BoundExpression>, span: Span) -> BoundExpression {
        let params = self.ctx.param_types(function);
        let args = args
            .into_iter()
            .zip(params)
            .map(|(arg, param)| self.convert(arg, param, span))
            .collect();
        BoundExpression::new(
            BoundExpressionKind::Call {
                callee: Callee::Function(function),
                args,
            },
            self.ctx.functions[function].return_type,
        )
    }

    fn resolve_call(
        &mut self,
        name: &str,
        candidates: Vec<FunctionId>,
        args: Vec<BoundExpression>,
        span: Span,
        is_extension: bool,
    ) -> BoundExpression {
        if args.iter().any(|arg| self.is_error(arg.ty)) {
            return self.error_expression();
        }

        if let Some(function) = self.find_overload(&candidates, &args) {
            return self.call_function(function, args, span);
        }

        let mut types: Vec<_> = args.iter().map(|arg| self.type_name(arg.ty)).collect();
        let signature = if is_extension && !types.is_empty() {
            let receiver = types.remove(0);
            format!("{receiver}.{name}({})", types.join(", "))
        } else {
            format!("{name}({})", types.join(", "))
        };
        self.diagnostics
            .report_undefined_function(self.location(span), &signature);
        self.error_expression()
    }

    /// Call a value of function type
    fn call_value(&mut self, callee: BoundExpression, args: Vec<BoundExpression>, span: Span) -> BoundExpression {
        if self.is_error(callee.ty) {
            return self.error_expression();
        }

        let Some((params, return_type)) = self
            .ctx
            .types
            .function_signature(callee.ty)
            .map(|(params, return_type)| (params.to_vec(), return_type))
        else {
            self.diagnostics
                .report_not_callable(self.location(span), &self.type_name(callee.ty));
            return self.error_expression();
        };

        if params.len() != args.len() {
            self.diagnostics
                .report_argument_count(self.location(span), params.len(), args.len());
            return self.error_expression();
        }

        let args = args
            .into_iter()
            .zip(params)
            .map(|(arg, param)| self.convert(arg, param, span))
            .collect();
        BoundExpression::new(
            BoundExpressionKind::Call {
                callee: Callee::Value(Box::new(callee)),
                args,
            },
            return_type,
        )
    }

    /// Operator functions named `name` that accept the operands
    fn resolve_operator_function(&self, name: &str, operands: &[BoundExpression]) -> Option<FunctionId> {
        let candidates: Vec<_> = self
            .lookup_functions(name)
            .into_iter()
            .filter(|&f| self.ctx.functions[f].is_operator)
            .collect();
        self.find_overload(&candidates, operands)
    }

    fn bind_unary(&mut self, operator: UnaryOperator, operand: &Expression, span: Span) -> BoundExpression {
        match operator {
            UnaryOperator::AddressOf => return self.bind_reference(operand),
            UnaryOperator::Deref => {
                let pointer = self.bind_expression(operand);
                self.require_unsafe(span);
                return self.bind_deref(pointer, None, span);
            }
            _ => {}
        }

        let operand = self.bind_expression(operand);
        if self.is_error(operand.ty) {
            return self.error_expression();
        }

        let bound = self
            .ctx
            .types
            .as_primitive(operand.ty)
            .and_then(|kind| bind_unary_operator(kind, operator));
        if let Some(bound) = bound {
            let constant = folding::fold_unary(&self.ctx.types, bound, &operand);
            let ty = operand.ty;
            return BoundExpression::new(
                BoundExpressionKind::Unary {
                    operator: bound,
                    operand: Box::new(operand),
                },
                ty,
            )
            .with_constant(constant);
        }

        let operands = [operand];
        if let Some(function) = unary_operator_function(operator)
            .and_then(|name| self.resolve_operator_function(name, &operands))
        {
            return self.call_function(function, operands.into(), span);
        }

        self.diagnostics.report_unary_operator_incompatible(
            self.location(span),
            &operator.to_string(),
            &self.type_name(operands[0].ty),
        );
        self.error_expression()
    }

    fn bind_reference(&mut self, operand: &Expression) -> BoundExpression {
        let ExpressionKind::Name(name) = &operand.kind else {
            self.diagnostics
                .report_invalid_reference(self.location(operand.span));
            return self.error_expression();
        };

        let Some(variable) = self.lookup_variable(&name.text) else {
            self.diagnostics
                .report_undefined_name(self.location(name.span), &name.text);
            return self.error_expression();
        };

        let symbol = &mut self.ctx.variables[variable];
        if !symbol.is_mutable {
            self.diagnostics
                .report_reference_to_immutable(self.location(name.span), &name.text);
            return self.error_expression();
        }
        symbol.use_count += 1;

        let inner = symbol.ty;
        let ty = self.ctx.types.pointer_to(inner);
        BoundExpression::new(BoundExpressionKind::Reference(variable), ty)
    }

    /// `*pointer` or `pointer[index]`
    pub(super) fn bind_deref(
        &mut self,
        pointer: BoundExpression,
        index: Option<BoundExpression>,
        span: Span,
    ) -> BoundExpression {
        if self.is_error(pointer.ty) {
            return self.error_expression();
        }

        let Some(element) = self.ctx.types.pointee(pointer.ty) else {
            match index {
                Some(_) => self.diagnostics.report_type_mismatch(
                    self.location(span),
                    "pointer",
                    &self.type_name(pointer.ty),
                ),
                None => self.diagnostics.report_unary_operator_incompatible(
                    self.location(span),
                    "*",
                    &self.type_name(pointer.ty),
                ),
            }
            return self.error_expression();
        };

        BoundExpression::new(
            BoundExpressionKind::Deref {
                pointer: Box::new(pointer),
                index: index.map(Box::new),
            },
            element,
        )
    }

    fn bind_index(&mut self, target: &Expression, index: &Expression, span: Span) -> BoundExpression {
        let pointer = self.bind_expression(target);
        let index = self.bind_integer(index);
        self.require_unsafe(span);
        self.bind_deref(pointer, Some(index), span)
    }

    /// Bind an expression that has to be of an integer type
    pub(super) fn bind_integer(&mut self, expression: &Expression) -> BoundExpression {
        let bound = self.bind_expression(expression);
        let is_integer = self
            .ctx
            .types
            .as_primitive(bound.ty)
            .is_some_and(PrimitiveKind::is_integer);
        if is_integer || self.is_error(bound.ty) {
            return bound;
        }

        self.diagnostics.report_type_mismatch(
            self.location(expression.span),
            PrimitiveKind::I64.name(),
            &self.type_name(bound.ty),
        );
        self.error_expression()
    }

    /// Bind a binary operation on already bound operands
    pub(super) fn bind_binary(
        &mut self,
        lhs: BoundExpression,
        operator: BinaryOperator,
        rhs: BoundExpression,
        span: Span,
    ) -> BoundExpression {
        if self.is_error(lhs.ty) || self.is_error(rhs.ty) {
            return self.error_expression();
        }

        let (lhs, rhs) = self.unify_operands(lhs, rhs);
        let types = &self.ctx.types;

        let result = if lhs.ty == rhs.ty {
            types
                .as_primitive(lhs.ty)
                .and_then(|kind| bind_binary_operator(kind, operator))
                .map(|kind| types.primitive(kind))
        } else {
            None
        };

        // pointers compare by address
        let pointers = matches!(operator, BinaryOperator::Equals | BinaryOperator::NotEquals)
            && types.is_pointer_like(lhs.ty)
            && types.is_pointer_like(rhs.ty)
            && (types.is_of_type(lhs.ty, rhs.ty) || types.is_of_type(rhs.ty, lhs.ty));
        let result = result.or_else(|| pointers.then(|| types.bool()));

        if let Some(result_type) = result {
            let operator = BoundBinaryOperator {
                kind: operator,
                operand_type: lhs.ty,
                result_type,
            };
            let constant = folding::fold_binary(types, &lhs, operator, &rhs);
            return BoundExpression::new(
                BoundExpressionKind::Binary {
                    operator,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                result_type,
            )
            .with_constant(constant);
        }

        let operands = [lhs, rhs];
        if let Some(function) = binary_operator_function(operator)
            .and_then(|name| self.resolve_operator_function(name, &operands))
        {
            return self.call_function(function, operands.into(), span);
        }

        // `a != b` and friends fall back to the negated operator function
        if operator == BinaryOperator::NotEquals {
            if let Some(function) = self.resolve_operator_function("equals", &operands) {
                let equals = self.call_function(function, operands.into(), span);
                return self.negate(equals, span);
            }
        }

        self.diagnostics.report_binary_operator_incompatible(
            self.location(span),
            &operator.to_string(),
            &self.type_name(operands[0].ty),
            &self.type_name(operands[1].ty),
        );
        self.error_expression()
    }

    fn negate(&mut self, expression: BoundExpression, span: Span) -> BoundExpression {
        let is_bool = expression.ty == self.ctx.types.bool();
        if !is_bool {
            self.diagnostics.report_unary_operator_incompatible(
                self.location(span),
                "!",
                &self.type_name(expression.ty),
            );
            return self.error_expression();
        }
        let ty = expression.ty;
        BoundExpression::new(
            BoundExpressionKind::Unary {
                operator: BoundUnaryOperator::Not,
                operand: Box::new(expression),
            },
            ty,
        )
    }

    fn bind_cast(&mut self, expression: &Expression, clause: &ast::TypeClause, span: Span) -> BoundExpression {
        let operand = self.bind_expression(expression);
        let target = self.resolve_type(clause);
        if self.is_error(operand.ty) || self.is_error(target) {
            return self.error_expression();
        }

        if operand.ty == target {
            self.diagnostics
                .report_redundant_cast(self.location(span), &self.type_name(target));
            return operand;
        }

        let types = &self.ctx.types;
        let allowed = match (types.as_primitive(operand.ty), types.as_primitive(target)) {
            (Some(from), Some(to)) => from.can_be_cast_to(to),
            _ if types.is_pointer_like(operand.ty) => types.is_pointer_like(target),
            // only towards an ancestor: the value has no storage for a descendant's fields
            _ if types.is_struct(operand.ty) && types.is_struct(target) => {
                types.is_of_type(operand.ty, target)
            }
            _ => false,
        };

        if !allowed {
            self.diagnostics.report_cannot_cast(
                self.location(span),
                &self.type_name(operand.ty),
                &self.type_name(target),
            );
            return self.error_expression();
        }

        let constant = folding::fold_cast(types, &operand, target);
        BoundExpression::new(BoundExpressionKind::Cast(Box::new(operand)), target).with_constant(constant)
    }

    fn field_default(&self, ty: TypeId, name: &str) -> Option<&BoundExpression> {
        let mut current = Some(ty);
        while let Some(ty) = current {
            if let Some(default) = self.field_defaults.get(&(ty, name.to_string())) {
                return Some(default);
            }
            current = self.ctx.types[ty].parent;
        }
        None
    }

    fn bind_struct_init(
        &mut self,
        clause: &ast::TypeClause,
        fields: &[(ast::Name, Expression)],
        span: Span,
    ) -> BoundExpression {
        let ty = self.resolve_type(clause);
        if self.is_error(ty) {
            for (_, value) in fields {
                self.bind_expression(value);
            }
            return self.error_expression();
        }
        if !self.ctx.types.is_struct(ty) {
            self.diagnostics.report_type_mismatch(
                self.location(clause.span),
                "struct",
                &self.type_name(ty),
            );
            return self.error_expression();
        }

        let mut values: Vec<Option<BoundExpression>> = vec![None; self.ctx.types.field_count(ty)];
        for (name, value) in fields {
            let bound = self.bind_expression(value);
            let Some((slot, field)) = self
                .ctx
                .types
                .field_by_name(ty, &name.text)
                .map(|(slot, field)| (slot, field.clone()))
            else {
                self.diagnostics.report_undefined_field(
                    self.location(name.span),
                    &self.type_name(ty),
                    &name.text,
                );
                continue;
            };

            if field.must_not_be_initialized() {
                self.diagnostics
                    .report_field_must_not_be_initialized(self.location(name.span), &name.text);
                continue;
            }
            if values[slot].is_some() {
                self.diagnostics
                    .report_already_declared(self.location(name.span), &name.text);
                continue;
            }
            values[slot] = Some(self.convert(bound, field.ty, value.span));
        }

        let mut slots = Vec::with_capacity(values.len());
        for (slot, value) in values.into_iter().enumerate() {
            if let Some(value) = value {
                slots.push(value);
                continue;
            }

            let field = self.ctx.types.field(ty, slot).clone();
            if let Some(default) = self.field_default(ty, &field.name) {
                slots.push(default.clone());
                continue;
            }
            if field.must_be_initialized() {
                self.diagnostics
                    .report_field_must_be_initialized(self.location(span), &field.name);
            }
            slots.push(self.error_expression());
        }

        BoundExpression::new(BoundExpressionKind::StructInit(slots), ty)
    }

    pub(super) fn bind_block_expression(&mut self, block: &ast::Block) -> BoundExpression {
        self.enter_scope();
        let statements: Vec<_> = block
            .statements
            .iter()
            .map(|statement| self.bind_statement(statement))
            .collect();
        let value = block
            .value
            .as_ref()
            .map(|value| self.bind_expression(value));
        self.leave_scope();

        let ty = value.as_ref().map_or(self.void(), |value| value.ty);
        let constant = match &value {
            Some(value) if statements.is_empty() => value.constant.clone(),
            _ => None,
        };
        BoundExpression::new(
            BoundExpressionKind::Block {
                statements,
                value: value.map(Box::new),
            },
            ty,
        )
        .with_constant(constant)
    }

    fn bind_if(
        &mut self,
        condition: &Expression,
        then_branch: &ast::Block,
        else_branch: Option<&Expression>,
    ) -> BoundExpression {
        let bool = self.ctx.types.bool();
        let bound_condition = self.bind_expression(condition);
        let condition = self.convert(bound_condition, bool, condition.span);
        let then_branch = self.bind_block_expression(then_branch);
        let else_branch = else_branch.map(|branch| self.bind_expression(branch));

        let void = self.void();
        let (then_branch, else_branch, ty) = match else_branch {
            None => (then_branch, None, void),
            Some(else_branch) => {
                let (then_branch, else_branch) = self.unify_operands(then_branch, else_branch);
                let ty = if then_branch.ty == void || else_branch.ty == void {
                    void
                } else if self.is_error(then_branch.ty) || self.is_error(else_branch.ty) {
                    self.ctx.types.error()
                } else {
                    self.ctx.types.common_type(then_branch.ty, else_branch.ty)
                };
                (then_branch, Some(else_branch), ty)
            }
        };

        let constant = match (&condition.constant, ty == void) {
            (_, true) => None,
            (Some(Constant::Bool(true)), _) => then_branch.constant.clone(),
            (Some(Constant::Bool(false)), _) => else_branch.as_ref().and_then(|e| e.constant.clone()),
            _ => None,
        };

        BoundExpression::new(
            BoundExpressionKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: else_branch.map(Box::new),
            },
            ty,
        )
        .with_constant(constant)
    }

    fn bind_array(&mut self, elements: &[Expression]) -> BoundExpression {
        let mut bound = Vec::with_capacity(elements.len());
        let mut element_type = None;

        for element in elements {
            let value = self.bind_expression(element);
            let value = match element_type {
                Some(ty) => self.convert(value, ty, element.span),
                None if value.ty == self.void() => {
                    self.diagnostics
                        .report_expression_has_no_value(self.location(element.span));
                    self.error_expression()
                }
                None => {
                    element_type = Some(value.ty);
                    value
                }
            };
            bound.push(value);
        }

        let element_type = element_type.unwrap_or_else(|| self.ctx.types.any());
        if self.is_error(element_type) {
            return self.error_expression();
        }
        let ty = self.ctx.types.pointer_to(element_type);
        BoundExpression::new(BoundExpressionKind::ArrayInit(bound), ty)
    }

    /// Lambdas become functions of their own. They see the globals of the file but not the
    /// locals around them.
    fn bind_lambda(
        &mut self,
        params: &[ast::Parameter],
        return_type: Option<&ast::TypeClause>,
        body: &ast::Block,
        span: Span,
    ) -> BoundExpression {
        let mut seen = HashSet::new();
        let mut param_ids = Vec::with_capacity(params.len());
        for param in params {
            let ty = self.resolve_type(&param.ty);
            if !seen.insert(param.name.text.as_str()) {
                self.diagnostics
                    .report_already_declared(self.location(param.name.span), &param.name.text);
            }
            let mut symbol =
                VariableSymbol::new(param.name.text.as_str(), VariableKind::Parameter, ty, false);
            symbol.location = Some(self.location(param.name.span));
            param_ids.push(self.ctx.add_variable(symbol));
        }

        let return_type = match return_type {
            Some(clause) => self.resolve_type(clause),
            None => self.void(),
        };
        let param_types: Vec<_> = param_ids.iter().map(|&p| self.ctx.variables[p].ty).collect();
        let ty = self.ctx.types.function_type(param_types, return_type);

        let namespace = self.file.namespace;
        let name = format!("$lambda{}", self.ctx.functions.len());
        let path = self.ctx.namespaces[namespace].qualify(&name);
        let location = self.location(span);
        let function = self.ctx.add_function(FunctionSymbol {
            name,
            path,
            namespace,
            params: param_ids,
            return_type,
            ty,
            is_inline: false,
            is_extern: false,
            is_entry: false,
            is_extension: false,
            is_operator: false,
            is_private: true,
            is_internal: true,
            is_lambda: true,
            cname: None,
            file: Some(self.file.source.id),
            location: Some(location),
        });

        let outer_scope = mem::replace(&mut self.scope, root_scope(self.ctx, &self.file));
        let outer_function = self.function.take();
        let outer_loops = mem::take(&mut self.loops);
        let outer_unsafe = mem::replace(&mut self.unsafe_depth, 0);

        let statements = self.bind_function_body(function, body);

        self.scope = outer_scope;
        self.function = outer_function;
        self.loops = outer_loops;
        self.unsafe_depth = outer_unsafe;

        self.bodies.insert(function, statements);
        BoundExpression::new(BoundExpressionKind::Lambda(function), ty)
    }
}
