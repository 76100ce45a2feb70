use std::fmt::Write;

use crate::symbols::{
    FunctionId, FunctionSymbol, Label, NamespaceTree, TypeId, TypeKind, TypeTable, VariableId,
    VariableSymbol,
};
use crate::util::IndexVec;

/// Owns every symbol and type of one compilation.
///
/// Passes receive the context by reference instead of reaching for global registries, so
/// independent compilations never observe each other.
#[derive(Debug, Clone, Default)]
pub struct CompilationContext {
    pub types: TypeTable,
    pub namespaces: NamespaceTree,
    pub functions: IndexVec<FunctionId, FunctionSymbol>,
    pub variables: IndexVec<VariableId, VariableSymbol>,
    next_label: usize,
}

impl CompilationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, variable: VariableSymbol) -> VariableId {
        self.variables.push(variable)
    }

    pub fn add_function(&mut self, function: FunctionSymbol) -> FunctionId {
        self.functions.push(function)
    }

    /// A label that is unique within the compilation
    pub fn fresh_label(&mut self, prefix: &str) -> Label {
        let label = Label::new(format!("{prefix}{}", self.next_label));
        self.next_label += 1;
        label
    }

    pub fn type_name(&self, ty: TypeId) -> String {
        self.types.name(ty)
    }

    pub fn param_types(&self, function: FunctionId) -> Vec<TypeId> {
        self.functions[function]
            .params
            .iter()
            .map(|&p| self.variables[p].ty)
            .collect()
    }

    /// `path(T1, T2): R`
    pub fn signature(&self, function: FunctionId) -> String {
        let symbol = &self.functions[function];
        let params: Vec<_> = symbol
            .params
            .iter()
            .map(|&p| {
                let param = &self.variables[p];
                format!("{}: {}", param.name, self.type_name(param.ty))
            })
            .collect();

        let mut signature = format!("{}({})", symbol.path, params.join(", "));
        if symbol.return_type != self.types.void() {
            let _ = write!(signature, ": {}", self.type_name(symbol.return_type));
        }
        signature
    }

    /// The external symbol name of a function.
    ///
    /// An explicit linkage name wins, the entry point is always `main`, and functions with
    /// parameters encode their parameter types so that overloads do not collide.
    pub fn mangled_name(&self, function: FunctionId) -> String {
        let symbol = &self.functions[function];
        if let Some(cname) = &symbol.cname {
            return cname.clone();
        }
        if symbol.is_entry {
            return String::from("main");
        }

        let mut name = symbol.path.clone();
        for ty in self.param_types(function) {
            name.push('$');
            self.encode_type(ty, &mut name);
        }
        name
    }

    fn encode_type(&self, ty: TypeId, out: &mut String) {
        if let Some(inner) = self.types.pointee(ty) {
            out.push('p');
            self.encode_type(inner, out);
            return;
        }

        match &self.types[ty].kind {
            TypeKind::Function {
                params,
                return_type,
            } => {
                out.push_str("fn");
                for &param in params {
                    out.push('_');
                    self.encode_type(param, out);
                }
                out.push_str("_r");
                self.encode_type(*return_type, out);
            }
            _ => out.push_str(&self.types[ty].path.replace('.', "_")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{PrimitiveKind, VariableKind};

    fn function(ctx: &mut CompilationContext, name: &str, params: &[TypeId]) -> FunctionId {
        let params = params
            .iter()
            .map(|&ty| ctx.add_variable(VariableSymbol::new("x", VariableKind::Parameter, ty, false)))
            .collect();
        let void = ctx.types.void();
        let ty = ctx.types.function_type(Vec::new(), void);
        let root = ctx.namespaces.root();
        ctx.add_function(FunctionSymbol {
            name: name.to_string(),
            path: format!("app.{name}"),
            namespace: root,
            params,
            return_type: void,
            ty,
            is_inline: false,
            is_extern: false,
            is_entry: false,
            is_extension: false,
            is_operator: false,
            is_private: false,
            is_internal: false,
            is_lambda: false,
            cname: None,
            file: None,
            location: None,
        })
    }

    #[test]
    fn mangling() {
        let mut ctx = CompilationContext::new();
        let int = ctx.types.primitive(PrimitiveKind::I32);
        let byte = ctx.types.primitive(PrimitiveKind::U8);
        let bytes = ctx.types.pointer_to(byte);

        let bare = function(&mut ctx, "run", &[]);
        let overloaded = function(&mut ctx, "put", &[int, bytes]);
        let linked = function(&mut ctx, "putchar", &[int]);
        ctx.functions[linked].cname = Some(String::from("putchar"));
        let entry = function(&mut ctx, "start", &[]);
        ctx.functions[entry].is_entry = true;

        assert_eq!(ctx.mangled_name(bare), "app.run");
        assert_eq!(ctx.mangled_name(overloaded), "app.put$i32$pu8");
        assert_eq!(ctx.mangled_name(linked), "putchar");
        assert_eq!(ctx.mangled_name(entry), "main");
        assert_eq!(ctx.signature(overloaded), "app.put(x: i32, x: *u8)");
    }

    #[test]
    fn labels_are_unique() {
        let mut ctx = CompilationContext::new();
        let a = ctx.fresh_label("end");
        let b = ctx.fresh_label("end");
        assert_ne!(a, b);
        assert_eq!(a, Label::new("end0"));
    }
}
