//! Symbols
//!
//! Descriptors for everything a program can name: variables, functions, namespaces and types.
//! Symbols are stored in arenas owned by the [CompilationContext](crate::CompilationContext)
//! and referenced by id everywhere else.

use std::fmt;
use std::rc::Rc;

use crate::util::{FileId, TextLocation};

pub mod interface;
mod namespace;
pub mod types;

pub use namespace::{Namespace, NamespaceId, NamespaceTree};
pub use types::{Field, InvokeError, PrimitiveKind, Type, TypeId, TypeKind, TypeTable};

simple_index! {
    pub struct VariableId;
}

simple_index! {
    pub struct FunctionId;
}

/// A value known at compile time
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Any integer, stored as the two's complement bit pattern of its type
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(x) => write!(f, "{x}"),
            Constant::Float(x) => write!(f, "{x:?}"),
            Constant::Bool(x) => write!(f, "{x}"),
            Constant::Str(s) => write!(f, "{s:?}"),
            Constant::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Local,
    Parameter,
    Global,
}

#[derive(Debug, Clone)]
pub struct VariableSymbol {
    pub name: String,
    /// The name the variable is emitted under once nested scopes are flattened
    pub emit_name: String,
    pub kind: VariableKind,
    pub ty: TypeId,
    pub is_mutable: bool,
    pub constant: Option<Constant>,
    pub is_internal: bool,
    pub private_to: Option<FileId>,
    pub location: Option<TextLocation>,
    pub use_count: u32,
}

impl VariableSymbol {
    pub fn new(name: impl Into<String>, kind: VariableKind, ty: TypeId, is_mutable: bool) -> Self {
        let name = name.into();
        Self {
            emit_name: name.clone(),
            name,
            kind,
            ty,
            is_mutable,
            constant: None,
            is_internal: false,
            private_to: None,
            location: None,
            use_count: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionSymbol {
    pub name: String,
    /// Fully qualified name, e.g. `app.util.clamp`
    pub path: String,
    pub namespace: NamespaceId,
    pub params: Vec<VariableId>,
    pub return_type: TypeId,
    /// The function type `fn(..): ..` of the symbol used as a value
    pub ty: TypeId,
    pub is_inline: bool,
    pub is_extern: bool,
    pub is_entry: bool,
    pub is_extension: bool,
    pub is_operator: bool,
    pub is_private: bool,
    pub is_internal: bool,
    pub is_lambda: bool,
    pub cname: Option<String>,
    pub file: Option<FileId>,
    pub location: Option<TextLocation>,
}

impl FunctionSymbol {
    /// Private functions are only visible from the file that declares them
    pub fn is_visible_from(&self, file: FileId) -> bool {
        !self.is_private || self.file == Some(file)
    }
}

/// A jump target. Labels compare by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(Rc<str>);

impl Label {
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
