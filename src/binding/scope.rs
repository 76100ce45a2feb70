use std::collections::HashMap;

use crate::symbols::{FunctionId, VariableId};

/// A lexical scope, chained to the scope it is nested in.
///
/// Variables map one to one. Functions can be overloaded, so a name maps to all overloads
/// declared at this level.
#[derive(Debug, Default)]
pub struct Scope {
    parent: Option<Box<Scope>>,
    variables: HashMap<String, VariableId>,
    functions: HashMap<String, Vec<FunctionId>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Scope) -> Self {
        Self {
            parent: Some(Box::new(parent)),
            ..Self::default()
        }
    }

    /// Leave the scope, returning the one it was nested in
    pub fn into_parent(self) -> Option<Scope> {
        self.parent.map(|parent| *parent)
    }

    /// Declare a variable at this level. Fails if the name is already taken here, shadowing
    /// an outer scope is fine.
    pub fn try_declare_variable(&mut self, name: &str, variable: VariableId) -> bool {
        if self.variables.contains_key(name) {
            return false;
        }
        self.variables.insert(name.to_string(), variable);
        true
    }

    /// Add an overload. `conflicts` decides whether an existing overload has the same
    /// signature.
    pub fn try_declare_function(
        &mut self,
        name: &str,
        function: FunctionId,
        conflicts: impl Fn(FunctionId) -> bool,
    ) -> bool {
        let overloads = self.functions.entry(name.to_string()).or_default();
        if overloads.iter().any(|&existing| conflicts(existing)) {
            return false;
        }
        overloads.push(function);
        true
    }

    pub fn try_lookup_variable(&self, name: &str) -> Option<VariableId> {
        match self.variables.get(name) {
            Some(&variable) => Some(variable),
            None => self.parent.as_ref()?.try_lookup_variable(name),
        }
    }

    /// The overloads of the innermost scope declaring the name
    pub fn try_lookup_functions(&self, name: &str) -> Option<&[FunctionId]> {
        match self.functions.get(name) {
            Some(overloads) if !overloads.is_empty() => Some(overloads),
            _ => self.parent.as_ref()?.try_lookup_functions(name),
        }
    }

    /// Variables declared directly in this scope
    pub fn variables(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.variables.values().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Idx;

    #[test]
    fn shadowing() {
        let outer_x = VariableId::new(0);
        let inner_x = VariableId::new(1);

        let mut scope = Scope::new();
        assert!(scope.try_declare_variable("x", outer_x));

        let mut inner = Scope::with_parent(scope);
        assert!(inner.try_declare_variable("x", inner_x));
        assert_eq!(inner.try_lookup_variable("x"), Some(inner_x));

        let scope = inner.into_parent().unwrap();
        assert_eq!(scope.try_lookup_variable("x"), Some(outer_x));
    }

    #[test]
    fn redeclaration_in_the_same_scope_fails() {
        let mut scope = Scope::new();
        assert!(scope.try_declare_variable("x", VariableId::new(0)));
        assert!(!scope.try_declare_variable("x", VariableId::new(1)));
        assert_eq!(scope.try_lookup_variable("x"), Some(VariableId::new(0)));
        assert_eq!(scope.try_lookup_variable("y"), None);
    }

    #[test]
    fn lookup_walks_parents() {
        let mut root = Scope::new();
        root.try_declare_variable("g", VariableId::new(0));
        let scope = Scope::with_parent(Scope::with_parent(root));
        assert_eq!(scope.try_lookup_variable("g"), Some(VariableId::new(0)));
    }

    #[test]
    fn overloads() {
        let (f, g, h) = (FunctionId::new(0), FunctionId::new(1), FunctionId::new(2));
        let mut scope = Scope::new();
        assert!(scope.try_declare_function("f", f, |_| false));
        assert!(scope.try_declare_function("f", g, |_| false));
        assert!(!scope.try_declare_function("f", h, |existing| existing == g));
        assert_eq!(scope.try_lookup_functions("f"), Some(&[f, g][..]));

        let inner = Scope::with_parent(scope);
        assert_eq!(inner.try_lookup_functions("f").map(<[_]>::len), Some(2));
        assert_eq!(inner.try_lookup_functions("missing"), None);
    }
}
