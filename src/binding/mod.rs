//! Binding
//!
//! The binder turns syntax trees into the [bound tree](tree), resolving every name against the
//! scope chain and every type annotation against the [TypeTable](crate::symbols::TypeTable).
//! Problems are reported into a [DiagnosticBag] and replaced by error expressions, so a single
//! run reports every independent error.
//!
//! Binding happens in two passes so that declarations may be used before they appear:
//! - [bind_global_scope] declares namespaces, structs, function signatures and globals of all
//!   files
//! - [bind_program] binds the function bodies

use std::collections::{BTreeMap, HashMap};
use std::mem;
use std::rc::Rc;

use tracing::{debug, info};

use crate::ast::{self, SyntaxTree, TypeClause, TypeClauseKind};
use crate::context::CompilationContext;
use crate::diagnostics::DiagnosticBag;
use crate::symbols::{
    Constant, FunctionId, InvokeError, Label, NamespaceId, PrimitiveKind, TypeId, VariableId,
    VariableKind, VariableSymbol,
};
use crate::util::{SourceFile, Span, TextLocation};

mod declarations;
mod expressions;
mod operators;
pub mod pretty;
mod scope;
mod statements;
mod tree;

pub use operators::OPERATOR_FUNCTION_NAMES;
pub use scope::Scope;
pub use tree::*;

/// The namespace a file contributes to
#[derive(Debug, Clone)]
struct FileScope {
    tree: usize,
    source: Rc<SourceFile>,
    namespace: NamespaceId,
}

/// A declared function whose body is bound in the second pass
#[derive(Debug, Clone, Copy)]
struct FunctionItem {
    function: FunctionId,
    file: usize,
    item: usize,
}

/// Everything the declaration pass found
#[derive(Debug, Default)]
pub struct GlobalScope {
    files: Vec<FileScope>,
    functions: Vec<FunctionItem>,
    field_defaults: HashMap<(TypeId, String), BoundExpression>,
    bodies: BTreeMap<FunctionId, Vec<BoundStatement>>,
    /// Global variables with their initializers, in initialization order
    pub globals: Vec<(VariableId, BoundExpression)>,
    pub entry: Option<FunctionId>,
}

/// The bound, not yet lowered program
#[derive(Debug, Clone, Default)]
pub struct BoundProgram {
    /// Bodies of all functions, lambdas included. Extern functions have none.
    pub functions: BTreeMap<FunctionId, Vec<BoundStatement>>,
    pub globals: Vec<(VariableId, BoundExpression)>,
    pub entry: Option<FunctionId>,
}

/// First pass: declare everything that lives at the top level of the given files
pub fn bind_global_scope(
    ctx: &mut CompilationContext,
    trees: &[SyntaxTree],
    diagnostics: &mut DiagnosticBag,
) -> GlobalScope {
    let mut global = GlobalScope::default();
    declarations::declare(ctx, trees, &mut global, diagnostics);

    info!(
        files = trees.len(),
        functions = global.functions.len(),
        globals = global.globals.len(),
        diagnostics = diagnostics.len(),
        "declared global scope"
    );
    global
}

/// Second pass: bind the bodies of all declared functions
pub fn bind_program(
    ctx: &mut CompilationContext,
    trees: &[SyntaxTree],
    global: GlobalScope,
    diagnostics: &mut DiagnosticBag,
) -> BoundProgram {
    let GlobalScope {
        files,
        functions,
        field_defaults,
        mut bodies,
        globals,
        entry,
    } = global;

    for item in functions {
        let file = &files[item.file];
        let ast::Item::Function(declaration) = &trees[file.tree].unit.items[item.item] else {
            continue;
        };
        let Some(body) = &declaration.body else {
            continue;
        };
        if ctx.functions[item.function].is_extern {
            continue;
        }

        let statements = {
            let mut binder =
                Binder::new(ctx, diagnostics, &field_defaults, &mut bodies, file.clone());
            binder.bind_function_body(item.function, body)
        };
        debug!(function = %ctx.functions[item.function].path, statements = statements.len(), "bound");
        bodies.insert(item.function, statements);
    }

    info!(functions = bodies.len(), diagnostics = diagnostics.len(), "bound program");
    BoundProgram {
        functions: bodies,
        globals,
        entry,
    }
}

/// Warn about local variables that are never read. Names starting with `_` are exempt.
pub fn check_unused_variables(ctx: &CompilationContext, diagnostics: &mut DiagnosticBag) {
    for variable in ctx.variables.iter() {
        let exempt = variable.name.starts_with('_') || variable.name.starts_with('$');
        if variable.kind != VariableKind::Local || variable.use_count > 0 || exempt {
            continue;
        }
        if let Some(location) = &variable.location {
            diagnostics.report_unused_variable(location.clone(), &variable.name);
        }
    }
}

#[derive(Debug, Clone)]
struct LoopLabels {
    break_label: Label,
    continue_label: Label,
}

/// Binding state for one file
pub(crate) struct Binder<'a> {
    ctx: &'a mut CompilationContext,
    diagnostics: &'a mut DiagnosticBag,
    field_defaults: &'a HashMap<(TypeId, String), BoundExpression>,
    bodies: &'a mut BTreeMap<FunctionId, Vec<BoundStatement>>,
    file: FileScope,
    scope: Scope,
    function: Option<FunctionId>,
    loops: Vec<LoopLabels>,
    unsafe_depth: usize,
}

impl<'a> Binder<'a> {
    fn new(
        ctx: &'a mut CompilationContext,
        diagnostics: &'a mut DiagnosticBag,
        field_defaults: &'a HashMap<(TypeId, String), BoundExpression>,
        bodies: &'a mut BTreeMap<FunctionId, Vec<BoundStatement>>,
        file: FileScope,
    ) -> Self {
        let scope = root_scope(ctx, &file);
        Self {
            ctx,
            diagnostics,
            field_defaults,
            bodies,
            file,
            scope,
            function: None,
            loops: Vec::new(),
            unsafe_depth: 0,
        }
    }

    fn location(&self, span: Span) -> TextLocation {
        TextLocation::new(self.file.source.clone(), span)
    }

    fn enter_scope(&mut self) {
        self.scope = Scope::with_parent(mem::take(&mut self.scope));
    }

    fn leave_scope(&mut self) {
        self.scope = mem::take(&mut self.scope).into_parent().unwrap_or_default();
    }

    fn void(&self) -> TypeId {
        self.ctx.types.void()
    }

    fn error_expression(&self) -> BoundExpression {
        BoundExpression::error(self.ctx.types.error())
    }

    fn type_name(&self, ty: TypeId) -> String {
        self.ctx.type_name(ty)
    }

    fn is_error(&self, ty: TypeId) -> bool {
        self.ctx.types.is_error(ty)
    }

    /// `const` variables need a value the constant folder could compute
    fn check_constant_initializer(
        &mut self,
        keyword: ast::VariableKeyword,
        name: &str,
        initializer: &BoundExpression,
        span: Span,
    ) {
        if keyword == ast::VariableKeyword::Const
            && initializer.constant.is_none()
            && !initializer.is_error()
            && !self.is_error(initializer.ty)
        {
            self.diagnostics
                .report_not_constant(self.location(span), name);
        }
    }

    /// Namespaces searched after the scope chain: imports, `std`, then the root namespace
    fn imported_namespaces(&self) -> Vec<NamespaceId> {
        let current = self.file.namespace;
        let mut namespaces = self.ctx.namespaces[current].uses.clone();

        let implicit = [
            self.ctx.namespaces.lookup(["std"]),
            Some(self.ctx.namespaces.root()),
        ];
        for namespace in implicit.into_iter().flatten() {
            if namespace != current && !namespaces.contains(&namespace) {
                namespaces.push(namespace);
            }
        }
        namespaces
    }

    fn is_variable_visible(&self, variable: VariableId) -> bool {
        self.ctx.variables[variable]
            .private_to
            .map_or(true, |file| file == self.file.source.id)
    }

    fn namespace_variable(&self, namespace: NamespaceId, name: &str) -> Option<VariableId> {
        self.ctx.namespaces[namespace]
            .globals
            .get(name)
            .copied()
            .filter(|&variable| self.is_variable_visible(variable))
    }

    fn namespace_functions(&self, namespace: NamespaceId, name: &str) -> Vec<FunctionId> {
        let file = self.file.source.id;
        self.ctx.namespaces[namespace]
            .functions
            .get(name)
            .into_iter()
            .flatten()
            .copied()
            .filter(|&function| self.ctx.functions[function].is_visible_from(file))
            .collect()
    }

    fn lookup_variable(&self, name: &str) -> Option<VariableId> {
        self.scope.try_lookup_variable(name).or_else(|| {
            self.imported_namespaces()
                .into_iter()
                .find_map(|namespace| self.namespace_variable(namespace, name))
        })
    }

    /// All visible overloads of a name, in lookup order
    fn lookup_functions(&self, name: &str) -> Vec<FunctionId> {
        let mut candidates = self
            .scope
            .try_lookup_functions(name)
            .map(<[_]>::to_vec)
            .unwrap_or_default();

        for namespace in self.imported_namespaces() {
            for function in self.namespace_functions(namespace, name) {
                if !candidates.contains(&function) {
                    candidates.push(function);
                }
            }
        }
        candidates
    }

    /// Declare a variable in the current scope
    fn declare_variable(
        &mut self,
        name: &ast::Name,
        kind: VariableKind,
        ty: TypeId,
        is_mutable: bool,
        constant: Option<Constant>,
    ) -> VariableId {
        let mut symbol = VariableSymbol::new(name.text.as_str(), kind, ty, is_mutable);
        symbol.constant = constant;
        symbol.location = Some(self.location(name.span));

        let variable = self.ctx.add_variable(symbol);
        if !self.scope.try_declare_variable(&name.text, variable) {
            self.diagnostics
                .report_already_declared(self.location(name.span), &name.text);
        }
        variable
    }

    fn resolve_type(&mut self, clause: &TypeClause) -> TypeId {
        match &clause.kind {
            TypeClauseKind::Named(path) => self.resolve_named_type(path),
            TypeClauseKind::Pointer(inner) => {
                let inner = self.resolve_type(inner);
                if self.is_error(inner) {
                    return inner;
                }

                let generic = self.ctx.types.pointer_generic();
                match self.ctx.types.invoke(generic, vec![inner]) {
                    Ok(ty) => ty,
                    Err(err) => {
                        self.report_invoke_error(clause.span, err);
                        self.ctx.types.error()
                    }
                }
            }
            TypeClauseKind::Function {
                params,
                return_type,
            } => {
                let params: Vec<_> = params.iter().map(|p| self.resolve_type(p)).collect();
                let return_type = match return_type {
                    Some(return_type) => self.resolve_type(return_type),
                    None => self.void(),
                };
                if params.iter().chain([&return_type]).any(|&ty| self.is_error(ty)) {
                    return self.ctx.types.error();
                }
                self.ctx.types.function_type(params, return_type)
            }
        }
    }

    fn resolve_named_type(&mut self, path: &ast::Path) -> TypeId {
        let Some((last, prefix)) = path.segments.split_last() else {
            return self.ctx.types.error();
        };

        let found = if prefix.is_empty() {
            let mut namespaces = vec![self.file.namespace];
            namespaces.extend(self.imported_namespaces());
            namespaces
                .into_iter()
                .find_map(|namespace| self.ctx.namespaces[namespace].types.get(&last.text).copied())
                .or_else(|| {
                    self.ctx
                        .types
                        .lookup(&last.text)
                        .filter(|&ty| !self.ctx.types.is_struct(ty))
                })
        } else {
            self.ctx
                .namespaces
                .lookup(prefix.iter().map(|segment| segment.text.as_str()))
                .and_then(|namespace| self.ctx.namespaces[namespace].types.get(&last.text).copied())
        };

        let visible = found.filter(|&ty| {
            self.ctx
                .types
                .struct_private_to(ty)
                .map_or(true, |file| file == self.file.source.id)
        });

        match visible {
            Some(ty) if ty == self.ctx.types.pointer_generic() => {
                self.diagnostics.report_type_argument_count(
                    self.location(path.span),
                    &path.to_string(),
                    1,
                    0,
                );
                self.ctx.types.error()
            }
            Some(ty) => ty,
            None => {
                self.diagnostics
                    .report_undefined_type(self.location(path.span), &path.to_string());
                self.ctx.types.error()
            }
        }
    }

    fn report_invoke_error(&mut self, span: Span, err: InvokeError) {
        let location = self.location(span);
        match err {
            InvokeError::Arity {
                ty,
                expected,
                found,
            } => self
                .diagnostics
                .report_type_argument_count(location, &ty, expected, found),
            InvokeError::Mismatch { ty, argument, .. } => self
                .diagnostics
                .report_type_argument_mismatch(location, &ty, &argument),
        }
    }

    /// A constant expression retyped to `target`, if its value fits
    fn adapt_literal(&self, expression: &BoundExpression, target: TypeId) -> Option<BoundExpression> {
        let types = &self.ctx.types;
        let adapted = match expression.constant.as_ref()? {
            &Constant::Int(value) => {
                let from = types.as_primitive(expression.ty)?;
                let to = types.as_primitive(target)?;
                (from.is_integer() && to.is_integer() && fits(value, from, to))
                    .then_some(Constant::Int(value))?
            }
            &Constant::Float(value) => {
                let to = types.as_primitive(target)?;
                match to {
                    PrimitiveKind::F32 => Constant::Float(value as f32 as f64),
                    PrimitiveKind::F64 => Constant::Float(value),
                    _ => return None,
                }
            }
            Constant::Null if types.is_pointer_like(target) => Constant::Null,
            _ => return None,
        };
        Some(BoundExpression::literal(adapted, target))
    }

    /// Whether a value can be passed where `target` is expected
    fn is_assignable(&self, expression: &BoundExpression, target: TypeId) -> bool {
        self.is_error(expression.ty)
            || self.is_error(target)
            || self.ctx.types.is_of_type(expression.ty, target)
            || self.adapt_literal(expression, target).is_some()
    }

    /// Check that a value fits `target`, adapting literals on the way
    fn convert(&mut self, expression: BoundExpression, target: TypeId, span: Span) -> BoundExpression {
        let types = &self.ctx.types;
        if types.is_error(expression.ty)
            || types.is_error(target)
            || (expression.ty != self.void() && types.is_of_type(expression.ty, target))
        {
            return expression;
        }
        if let Some(adapted) = self.adapt_literal(&expression, target) {
            return adapted;
        }

        if expression.ty == self.void() {
            self.diagnostics
                .report_expression_has_no_value(self.location(span));
        } else {
            self.diagnostics.report_type_mismatch(
                self.location(span),
                &self.type_name(target),
                &self.type_name(expression.ty),
            );
        }
        self.error_expression()
    }

    /// Give both operands the same type if one of them is a literal that fits the other
    fn unify_operands(
        &self,
        lhs: BoundExpression,
        rhs: BoundExpression,
    ) -> (BoundExpression, BoundExpression) {
        if lhs.ty == rhs.ty {
            return (lhs, rhs);
        }
        if let Some(rhs) = self.adapt_literal(&rhs, lhs.ty) {
            return (lhs, rhs);
        }
        if let Some(lhs) = self.adapt_literal(&lhs, rhs.ty) {
            return (lhs, rhs);
        }
        (lhs, rhs)
    }

    fn require_unsafe(&mut self, span: Span) {
        if self.unsafe_depth == 0 {
            self.diagnostics
                .report_unsafe_outside_unsafe_block(self.location(span));
        }
    }
}

/// The scope of a file: functions and globals of its own namespace
fn root_scope(ctx: &CompilationContext, file: &FileScope) -> Scope {
    let mut scope = Scope::new();
    let namespace = &ctx.namespaces[file.namespace];

    for (name, overloads) in &namespace.functions {
        for &function in overloads {
            if ctx.functions[function].is_visible_from(file.source.id) {
                scope.try_declare_function(name, function, |_| false);
            }
        }
    }
    for (name, &variable) in &namespace.globals {
        let visible = ctx.variables[variable]
            .private_to
            .map_or(true, |private| private == file.source.id);
        if visible {
            scope.try_declare_variable(name, variable);
        }
    }
    scope
}

/// Whether an integer of kind `from` keeps its value as kind `to`
fn fits(value: i64, from: PrimitiveKind, to: PrimitiveKind) -> bool {
    let value = if from == PrimitiveKind::U64 {
        value as u64 as i128
    } else {
        value as i128
    };

    let bits = to.size();
    let (min, max) = if to.is_signed() {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    };
    (min..=max).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_ranges() {
        use PrimitiveKind::*;
        assert!(fits(255, I32, U8));
        assert!(!fits(256, I32, U8));
        assert!(!fits(-1, I32, U64));
        assert!(fits(-128, I32, I8));
        assert!(!fits(-129, I32, I8));
        assert!(fits(-1, U64, U64));
        assert!(!fits(-1, U64, I64));
    }
}
