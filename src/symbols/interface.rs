//! Public interface of a compilation
//!
//! Collects the signatures other modules may link against: every top-level function and
//! struct that is neither private nor internal. The builtin `std` namespace is left out.

use std::collections::BTreeMap;
use std::fmt;

use super::{FunctionId, TypeKind};
use crate::binding::pretty::render_statement;
use crate::binding::BoundStatement;
use crate::context::CompilationContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInterface {
    pub name: String,
    pub linkage_name: String,
    /// Parameter names and type names in order
    pub params: Vec<(String, String)>,
    pub return_type: String,
    pub is_extension: bool,
    /// Body of an inline function, one statement per entry
    pub inline_body: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInterface {
    pub is_read_only: bool,
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructInterface {
    pub name: String,
    pub parent: Option<String>,
    /// Fields declared by the struct itself, overrides included
    pub fields: Vec<FieldInterface>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interface {
    pub structs: Vec<StructInterface>,
    pub functions: Vec<FunctionInterface>,
}

impl Interface {
    pub fn collect(
        ctx: &CompilationContext,
        bodies: &BTreeMap<FunctionId, Vec<BoundStatement>>,
    ) -> Self {
        let std = ctx.namespaces.lookup(["std"]);

        let functions = ctx
            .functions
            .iter_enumerated()
            .filter(|(_, symbol)| {
                !symbol.is_internal
                    && !symbol.is_private
                    && !symbol.is_lambda
                    && Some(symbol.namespace) != std
            })
            .map(|(function, symbol)| FunctionInterface {
                name: symbol.path.clone(),
                linkage_name: ctx.mangled_name(function),
                params: symbol
                    .params
                    .iter()
                    .map(|&param| {
                        let param = &ctx.variables[param];
                        (param.name.clone(), ctx.type_name(param.ty))
                    })
                    .collect(),
                return_type: ctx.type_name(symbol.return_type),
                is_extension: symbol.is_extension,
                inline_body: symbol
                    .is_inline
                    .then(|| bodies.get(&function))
                    .flatten()
                    .map(|body| body.iter().map(|s| render_statement(ctx, s)).collect()),
            })
            .collect();

        let any = ctx.types.any();
        let structs = ctx
            .types
            .iter()
            .filter_map(|(_, ty)| match &ty.kind {
                TypeKind::Struct {
                    fields,
                    private_to: None,
                } => Some(StructInterface {
                    name: ty.path.clone(),
                    parent: ty
                        .parent
                        .filter(|&parent| parent != any)
                        .map(|parent| ctx.type_name(parent)),
                    fields: fields
                        .iter()
                        .map(|field| FieldInterface {
                            is_read_only: field.is_read_only,
                            name: field.name.clone(),
                            ty: ctx.type_name(field.ty),
                        })
                        .collect(),
                }),
                _ => None,
            })
            .collect();

        Self { structs, functions }
    }
}

impl fmt::Display for StructInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "struct {}", self.name)?;
        if let Some(parent) = &self.parent {
            write!(f, ": {parent}")?;
        }
        let fields: Vec<_> = self
            .fields
            .iter()
            .map(|field| {
                let keyword = if field.is_read_only { "val" } else { "var" };
                format!("{keyword} {}: {}", field.name, field.ty)
            })
            .collect();
        write!(f, " {{ {} }}", fields.join(", "))
    }
}

impl fmt::Display for FunctionInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_extension {
            write!(f, "ext ")?;
        }
        if self.inline_body.is_some() {
            write!(f, "inline ")?;
        }
        let params: Vec<_> = self
            .params
            .iter()
            .map(|(name, ty)| format!("{name}: {ty}"))
            .collect();
        write!(
            f,
            "fn {}({}): {} as {:?}",
            self.name,
            params.join(", "),
            self.return_type,
            self.linkage_name
        )?;
        if let Some(body) = &self.inline_body {
            write!(f, " {{ {} }}", body.join("; "))?;
        }
        Ok(())
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.structs {
            writeln!(f, "{item}")?;
        }
        for item in &self.functions {
            writeln!(f, "{item}")?;
        }
        Ok(())
    }
}
