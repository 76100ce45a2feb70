//! The declaration pass: everything reachable by name from other files is declared here before
//! any function body is bound.

use std::collections::HashSet;

use tracing::trace;

use super::operators::operator_function_arity;
use super::{Binder, BoundExpression, FileScope, FunctionItem, GlobalScope};
use crate::ast::{
    FunctionDeclaration, GlobalDeclaration, Item, StructDeclaration, SyntaxTree, VariableKeyword,
};
use crate::context::CompilationContext;
use crate::diagnostics::DiagnosticBag;
use crate::symbols::{
    Field, FunctionId, FunctionSymbol, PrimitiveKind, TypeId, TypeKind, VariableId, VariableKind,
    VariableSymbol,
};
use crate::util::TextLocation;

pub(super) fn declare(
    ctx: &mut CompilationContext,
    trees: &[SyntaxTree],
    global: &mut GlobalScope,
    diagnostics: &mut DiagnosticBag,
) {
    declare_namespaces(ctx, trees, global, diagnostics);
    let files = global.files.clone();

    // struct names first, so that fields and signatures can refer to any struct
    let mut structs: Vec<Vec<(usize, TypeId)>> = Vec::with_capacity(files.len());
    for file in &files {
        let mut binder = Binder::new(
            ctx,
            diagnostics,
            &global.field_defaults,
            &mut global.bodies,
            file.clone(),
        );
        structs.push(binder.declare_structs(&trees[file.tree]));
    }

    // parents of all structs before any fields, overrides look at the whole chain
    for step in [StructStep::Parent, StructStep::Fields, StructStep::Overrides] {
        for (file, declared) in files.iter().zip(&structs) {
            let mut binder = Binder::new(
                ctx,
                diagnostics,
                &global.field_defaults,
                &mut global.bodies,
                file.clone(),
            );
            for &(item, ty) in declared {
                let Item::Struct(declaration) = &trees[file.tree].unit.items[item] else {
                    continue;
                };
                match step {
                    StructStep::Parent => binder.define_struct_parent(declaration, ty),
                    StructStep::Fields => binder.define_struct_fields(declaration, ty),
                    StructStep::Overrides => binder.check_overrides(declaration, ty),
                }
            }
        }
    }

    for (index, file) in files.iter().enumerate() {
        let mut binder = Binder::new(
            ctx,
            diagnostics,
            &global.field_defaults,
            &mut global.bodies,
            file.clone(),
        );
        for (item, declaration) in trees[file.tree].unit.items.iter().enumerate() {
            if let Item::Function(declaration) = declaration {
                if let Some(function) = binder.declare_function(declaration, &mut global.entry) {
                    global.functions.push(FunctionItem {
                        function,
                        file: index,
                        item,
                    });
                }
            }
        }
    }

    // defaults are bound with the full set of signatures known
    let mut defaults = Vec::new();
    for (file, declared) in files.iter().zip(&structs) {
        let mut binder = Binder::new(
            ctx,
            diagnostics,
            &global.field_defaults,
            &mut global.bodies,
            file.clone(),
        );
        for &(item, ty) in declared {
            if let Item::Struct(declaration) = &trees[file.tree].unit.items[item] {
                defaults.extend(binder.bind_field_defaults(declaration, ty));
            }
        }
    }
    global.field_defaults.extend(defaults);

    for file in &files {
        let mut binder = Binder::new(
            ctx,
            diagnostics,
            &global.field_defaults,
            &mut global.bodies,
            file.clone(),
        );
        for declaration in &trees[file.tree].unit.items {
            if let Item::Global(declaration) = declaration {
                if let Some(global_variable) = binder.bind_global(declaration) {
                    global.globals.push(global_variable);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum StructStep {
    Parent,
    Fields,
    Overrides,
}

fn declare_namespaces(
    ctx: &mut CompilationContext,
    trees: &[SyntaxTree],
    global: &mut GlobalScope,
    diagnostics: &mut DiagnosticBag,
) {
    for (index, tree) in trees.iter().enumerate() {
        let namespace = match &tree.unit.namespace {
            Some(path) => ctx
                .namespaces
                .get_or_create(path.segments.iter().map(|segment| segment.text.as_str())),
            None => ctx.namespaces.root(),
        };
        global.files.push(FileScope {
            tree: index,
            source: tree.source.clone(),
            namespace,
        });
    }

    // every namespace exists now, so imports can be resolved regardless of file order
    for file in &global.files {
        for path in &trees[file.tree].unit.uses {
            let segments = path.segments.iter().map(|segment| segment.text.as_str());
            match ctx.namespaces.lookup(segments) {
                Some(used) if used == file.namespace => {}
                Some(used) => {
                    let uses = &mut ctx.namespaces[file.namespace].uses;
                    if !uses.contains(&used) {
                        uses.push(used);
                    }
                }
                None => diagnostics.report_undefined_namespace(
                    TextLocation::new(file.source.clone(), path.span),
                    &path.to_string(),
                ),
            }
        }
    }
}

impl Binder<'_> {
    fn declare_structs(&mut self, tree: &SyntaxTree) -> Vec<(usize, TypeId)> {
        let mut declared = Vec::new();
        for (item, declaration) in tree.unit.items.iter().enumerate() {
            let Item::Struct(declaration) = declaration else {
                continue;
            };

            let name = &declaration.name;
            let path = self.ctx.namespaces[self.file.namespace].qualify(&name.text);
            let private_to = declaration.is_private.then_some(self.file.source.id);

            match self.ctx.types.declare_struct(path, private_to) {
                Some(ty) => {
                    self.ctx.namespaces[self.file.namespace]
                        .types
                        .insert(name.text.clone(), ty);
                    declared.push((item, ty));
                }
                None => self
                    .diagnostics
                    .report_already_declared(self.location(name.span), &name.text),
            }
        }
        declared
    }

    fn parent_struct(&self, ty: TypeId) -> Option<TypeId> {
        self.ctx.types[ty]
            .parent
            .filter(|&parent| self.ctx.types.is_struct(parent))
    }

    fn define_struct_parent(&mut self, declaration: &StructDeclaration, ty: TypeId) {
        let parent = declaration.parent.as_ref().and_then(|clause| {
            let parent = self.resolve_type(clause);
            if self.is_error(parent) {
                return None;
            }
            // the second check rejects cycles
            if !self.ctx.types.is_struct(parent) || self.ctx.types.is_of_type(parent, ty) {
                self.diagnostics
                    .report_invalid_parent_type(self.location(clause.span), &self.type_name(parent));
                return None;
            }
            Some(parent)
        });
        self.ctx.types.define_struct(ty, parent, Vec::new());
    }

    fn define_struct_fields(&mut self, declaration: &StructDeclaration, ty: TypeId) {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(declaration.fields.len());

        for field in &declaration.fields {
            let field_type = self.resolve_type(&field.ty);
            if !seen.insert(field.name.text.as_str()) {
                self.diagnostics
                    .report_already_declared(self.location(field.name.span), &field.name.text);
                continue;
            }
            fields.push(Field {
                name: field.name.text.clone(),
                ty: field_type,
                is_read_only: field.is_read_only,
                is_override: field.is_override,
                has_default: field.default.is_some(),
            });
        }

        let parent = self.parent_struct(ty);
        self.ctx.types.define_struct(ty, parent, fields);
    }

    /// Overrides that match no compatible parent field are reported and demoted to new fields
    fn check_overrides(&mut self, declaration: &StructDeclaration, ty: TypeId) {
        let TypeKind::Struct { fields, .. } = &self.ctx.types[ty].kind else {
            return;
        };
        let mut fields = fields.clone();
        let parent = self.parent_struct(ty);

        let mut changed = false;
        for field in fields.iter_mut().filter(|field| field.is_override) {
            let valid = parent
                .and_then(|parent| self.ctx.types.field_by_name(parent, &field.name))
                .is_some_and(|(_, inherited)| self.ctx.types.is_of_type(field.ty, inherited.ty));
            if valid {
                continue;
            }

            if let Some(syntax) = declaration.fields.iter().find(|f| f.name.text == field.name) {
                self.diagnostics
                    .report_invalid_override(self.location(syntax.name.span), &field.name);
            }
            field.is_override = false;
            changed = true;
        }

        if changed {
            self.ctx.types.define_struct(ty, parent, fields);
        }
    }

    fn declare_function(
        &mut self,
        declaration: &FunctionDeclaration,
        entry: &mut Option<FunctionId>,
    ) -> Option<FunctionId> {
        let name = &declaration.name;
        let modifiers = declaration.modifiers;

        let mut seen = HashSet::new();
        let mut params = Vec::with_capacity(declaration.params.len());
        for param in &declaration.params {
            let ty = self.resolve_type(&param.ty);
            if !seen.insert(param.name.text.as_str()) {
                self.diagnostics
                    .report_already_declared(self.location(param.name.span), &param.name.text);
            }
            let mut symbol =
                VariableSymbol::new(param.name.text.as_str(), VariableKind::Parameter, ty, false);
            symbol.location = Some(self.location(param.name.span));
            params.push(self.ctx.add_variable(symbol));
        }

        let return_type = match &declaration.return_type {
            Some(clause) => self.resolve_type(clause),
            None => self.void(),
        };
        let param_types: Vec<_> = params.iter().map(|&p| self.ctx.variables[p].ty).collect();
        let ty = self.ctx.types.function_type(param_types.clone(), return_type);

        let namespace = self.file.namespace;
        let duplicate = self.ctx.namespaces[namespace]
            .functions
            .get(&name.text)
            .is_some_and(|overloads| {
                overloads
                    .iter()
                    .any(|&other| self.ctx.param_types(other) == param_types)
            });
        if duplicate {
            self.diagnostics
                .report_already_declared(self.location(name.span), &name.text);
            return None;
        }

        let path = self.ctx.namespaces[namespace].qualify(&name.text);
        let location = self.location(name.span);
        let function = self.ctx.add_function(FunctionSymbol {
            name: name.text.clone(),
            path,
            namespace,
            params,
            return_type,
            ty,
            is_inline: modifiers.is_inline,
            is_extern: modifiers.is_extern,
            is_entry: modifiers.is_entry,
            is_extension: modifiers.is_extension,
            is_operator: modifiers.is_operator,
            is_private: modifiers.is_private,
            is_internal: modifiers.is_internal,
            is_lambda: false,
            cname: declaration.cname.clone(),
            file: Some(self.file.source.id),
            location: Some(location),
        });
        self.ctx.namespaces[namespace]
            .functions
            .entry(name.text.clone())
            .or_default()
            .push(function);
        trace!(function = %self.ctx.functions[function].path, "declared");

        self.check_function_declaration(declaration, function, entry);
        Some(function)
    }

    fn check_function_declaration(
        &mut self,
        declaration: &FunctionDeclaration,
        function: FunctionId,
        entry: &mut Option<FunctionId>,
    ) {
        let location = self.location(declaration.name.span);
        let symbol = &self.ctx.functions[function];
        let path = symbol.path.clone();
        let param_count = symbol.params.len();
        let modifiers = declaration.modifiers;

        match (modifiers.is_extern, declaration.body.is_some()) {
            (true, true) => self.diagnostics.report_extern_with_body(location.clone(), &path),
            (false, false) => self.diagnostics.report_missing_body(location.clone(), &path),
            _ => {}
        }

        if modifiers.is_entry {
            if entry.is_some() {
                self.diagnostics.report_multiple_entry_points(location.clone());
            } else {
                *entry = Some(function);
            }

            let returns = self.ctx.types.as_primitive(symbol.return_type);
            let valid_return = returns == Some(PrimitiveKind::Void)
                || returns.is_some_and(PrimitiveKind::is_integer);
            if param_count != 0 || !valid_return {
                self.diagnostics.report_invalid_entry_signature(location.clone());
            }
        }

        if modifiers.is_operator && operator_function_arity(&declaration.name.text) != Some(param_count) {
            self.diagnostics
                .report_invalid_operator_function(location.clone(), &path);
        }

        if modifiers.is_extension && param_count == 0 {
            self.diagnostics
                .report_invalid_extension_function(location, &path);
        }
    }

    fn bind_field_defaults(
        &mut self,
        declaration: &StructDeclaration,
        ty: TypeId,
    ) -> Vec<((TypeId, String), BoundExpression)> {
        let TypeKind::Struct { fields, .. } = &self.ctx.types[ty].kind else {
            return Vec::new();
        };
        let field_types: Vec<_> = fields.iter().map(|f| (f.name.clone(), f.ty)).collect();

        let mut defaults = Vec::new();
        for field in &declaration.fields {
            let Some(default) = &field.default else {
                continue;
            };
            let Some(&(_, field_type)) = field_types.iter().find(|(name, _)| *name == field.name.text)
            else {
                continue;
            };

            let value = self.bind_expression(default);
            let value = self.convert(value, field_type, default.span);
            defaults.push(((ty, field.name.text.clone()), value));
        }
        defaults
    }

    /// Bind a global declaration and make it visible to the globals that follow
    fn bind_global(&mut self, declaration: &GlobalDeclaration) -> Option<(VariableId, BoundExpression)> {
        let name = &declaration.name;
        let initializer = self.bind_expression(&declaration.initializer);
        let (initializer, ty) = match &declaration.ty {
            Some(clause) => {
                let ty = self.resolve_type(clause);
                (self.convert(initializer, ty, declaration.initializer.span), ty)
            }
            None => {
                let ty = initializer.ty;
                (initializer, ty)
            }
        };

        let ty = if ty == self.void() {
            self.diagnostics
                .report_expression_has_no_value(self.location(declaration.initializer.span));
            self.ctx.types.error()
        } else {
            ty
        };

        self.check_constant_initializer(
            declaration.keyword,
            &name.text,
            &initializer,
            declaration.initializer.span,
        );
        let is_mutable = declaration.keyword == VariableKeyword::Var;
        let mut symbol = VariableSymbol::new(name.text.as_str(), VariableKind::Global, ty, is_mutable);
        symbol.constant = initializer.constant.clone().filter(|_| !is_mutable);
        symbol.is_internal = declaration.is_internal;
        symbol.private_to = declaration.is_private.then_some(self.file.source.id);
        symbol.location = Some(self.location(name.span));

        let namespace = self.file.namespace;
        if self.ctx.namespaces[namespace].globals.contains_key(&name.text) {
            self.diagnostics
                .report_already_declared(self.location(name.span), &name.text);
            return None;
        }

        let variable = self.ctx.add_variable(symbol);
        self.ctx.namespaces[namespace]
            .globals
            .insert(name.text.clone(), variable);
        self.scope.try_declare_variable(&name.text, variable);
        Some((variable, initializer))
    }
}
