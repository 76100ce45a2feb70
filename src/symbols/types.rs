//! The type lattice
//!
//! Every type lives in a [TypeTable] and is referred to by its [TypeId]. Types are interned by
//! their path and type arguments, so two ids are equal exactly when the types are equal.
//!
//! The lattice is single rooted: `any` is the only type without a parent. Builtin primitives
//! hang directly off `any`, structs hang off their parent struct (or `any`), and the
//! parametrized pointer `*T` hangs off the raw pointer type `ptr`.

use std::collections::HashMap;
use std::ops::Index;

use strum::{EnumIter, IntoEnumIterator};
use thiserror::Error;

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::util::{FileId, IndexVec};

simple_index! {
    /// Handle of an interned type
    pub struct TypeId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum PrimitiveKind {
    Any,
    Void,
    Error,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Ptr,
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Any => "any",
            PrimitiveKind::Void => "void",
            PrimitiveKind::Error => "?",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
            PrimitiveKind::Ptr => "ptr",
        }
    }

    /// Width in bits
    pub fn size(self) -> u32 {
        match self {
            PrimitiveKind::Any | PrimitiveKind::Void | PrimitiveKind::Error => 0,
            PrimitiveKind::Bool => 1,
            PrimitiveKind::I8 | PrimitiveKind::U8 => 8,
            PrimitiveKind::I16 | PrimitiveKind::U16 => 16,
            PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::F32 => 32,
            PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 | PrimitiveKind::Ptr => 64,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimitiveKind::I8 | PrimitiveKind::I16 | PrimitiveKind::I32 | PrimitiveKind::I64
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            PrimitiveKind::U8 | PrimitiveKind::U16 | PrimitiveKind::U32 | PrimitiveKind::U64
        )
    }

    pub fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn is_float(self) -> bool {
        matches!(self, PrimitiveKind::F32 | PrimitiveKind::F64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn supports_binary_op(self, op: BinaryOperator) -> bool {
        use BinaryOperator::*;
        match self {
            // everything but logic
            _ if self.is_integer() => !matches!(op, And | Or),
            // no bitwise or logical ops
            PrimitiveKind::F32 | PrimitiveKind::F64 => matches!(
                op,
                Add | Sub | Mul | Div | Rem | Equals | NotEquals | Less | LessEq | Greater
                    | GreaterEq
            ),
            PrimitiveKind::Bool => matches!(op, Equals | NotEquals | And | Or | BitAnd | BitOr | BitXor),
            PrimitiveKind::Ptr => matches!(op, Equals | NotEquals),
            _ => false,
        }
    }

    /// Whether the operator maps the primitive to itself. Address-of and dereference are not
    /// tied to a primitive and are resolved by the binder.
    pub fn supports_unary_op(self, op: UnaryOperator) -> bool {
        match op {
            UnaryOperator::Negate => self.is_signed() || self.is_float(),
            UnaryOperator::BitwiseNot => self.is_integer(),
            UnaryOperator::Not => self == PrimitiveKind::Bool,
            UnaryOperator::AddressOf | UnaryOperator::Deref => false,
        }
    }

    pub fn can_be_cast_to(self, target: Self) -> bool {
        match self {
            _ if self.is_numeric() => target.is_numeric() || target == PrimitiveKind::Bool,
            PrimitiveKind::Bool => target.is_numeric() || target == PrimitiveKind::Bool,
            PrimitiveKind::Ptr => target == PrimitiveKind::Ptr,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
    pub is_read_only: bool,
    pub is_override: bool,
    pub has_default: bool,
}

impl Field {
    /// Fields without a default have to be set by every initializer
    pub fn must_be_initialized(&self) -> bool {
        !self.has_default
    }

    /// Read only fields with a default are computed, not set
    pub fn must_not_be_initialized(&self) -> bool {
        self.is_read_only && self.has_default
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    /// `*T`: uninstantiated when the type has no arguments
    Pointer,
    Struct {
        fields: Vec<Field>,
        private_to: Option<FileId>,
    },
    Function {
        params: Vec<TypeId>,
        return_type: TypeId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub path: String,
    pub parent: Option<TypeId>,
    pub size: u32,
    pub params: Vec<TypeId>,
    /// Bounds of the type parameters, one per parameter of a generic definition
    pub bounds: Vec<TypeId>,
    pub kind: TypeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("`{ty}` expects {expected} type argument(s) but got {found}")]
    Arity {
        ty: String,
        expected: usize,
        found: usize,
    },

    #[error("type argument `{argument}` does not satisfy the bound `{bound}` of `{ty}`")]
    Mismatch {
        ty: String,
        argument: String,
        bound: String,
    },
}

#[derive(Debug, Clone)]
pub struct TypeTable {
    types: IndexVec<TypeId, Type>,
    interned: HashMap<(String, Vec<TypeId>), TypeId>,
    primitives: HashMap<PrimitiveKind, TypeId>,
    pointer: TypeId,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<TypeId> for TypeTable {
    type Output = Type;

    fn index(&self, id: TypeId) -> &Type {
        &self.types[id]
    }
}

impl TypeTable {
    pub fn new() -> Self {
        let mut types = IndexVec::new();
        let mut interned = HashMap::new();
        let mut primitives = HashMap::new();

        let mut any = None;
        for kind in PrimitiveKind::iter() {
            let id = types.push(Type {
                path: kind.name().to_string(),
                parent: any,
                size: kind.size(),
                params: Vec::new(),
                bounds: Vec::new(),
                kind: TypeKind::Primitive(kind),
            });
            any = any.or(Some(id));
            interned.insert((kind.name().to_string(), Vec::new()), id);
            primitives.insert(kind, id);
        }

        let pointer = types.push(Type {
            path: String::from("Ptr"),
            parent: primitives.get(&PrimitiveKind::Ptr).copied(),
            size: PrimitiveKind::Ptr.size(),
            params: Vec::new(),
            bounds: any.into_iter().collect(),
            kind: TypeKind::Pointer,
        });

        Self {
            types,
            interned,
            primitives,
            pointer,
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &Type)> {
        self.types.iter_enumerated()
    }

    pub fn primitive(&self, kind: PrimitiveKind) -> TypeId {
        self.primitives[&kind]
    }

    pub fn any(&self) -> TypeId {
        self.primitive(PrimitiveKind::Any)
    }

    pub fn void(&self) -> TypeId {
        self.primitive(PrimitiveKind::Void)
    }

    pub fn error(&self) -> TypeId {
        self.primitive(PrimitiveKind::Error)
    }

    pub fn bool(&self) -> TypeId {
        self.primitive(PrimitiveKind::Bool)
    }

    /// The uninstantiated pointer type
    pub fn pointer_generic(&self) -> TypeId {
        self.pointer
    }

    /// Look up a builtin or struct type by its full path
    pub fn lookup(&self, path: &str) -> Option<TypeId> {
        self.interned.get(&(path.to_string(), Vec::new())).copied()
    }

    pub fn as_primitive(&self, ty: TypeId) -> Option<PrimitiveKind> {
        match self[ty].kind {
            TypeKind::Primitive(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_error(&self, ty: TypeId) -> bool {
        ty == self.error()
    }

    pub fn is_struct(&self, ty: TypeId) -> bool {
        matches!(self[ty].kind, TypeKind::Struct { .. })
    }

    /// The element type of an instantiated pointer
    pub fn pointee(&self, ty: TypeId) -> Option<TypeId> {
        match (&self[ty].kind, self[ty].params.as_slice()) {
            (TypeKind::Pointer, [inner]) => Some(*inner),
            _ => None,
        }
    }

    /// Whether values of the type can be a pointer at runtime
    pub fn is_pointer_like(&self, ty: TypeId) -> bool {
        self.pointee(ty).is_some() || self.as_primitive(ty) == Some(PrimitiveKind::Ptr)
    }

    pub fn function_signature(&self, ty: TypeId) -> Option<(&[TypeId], TypeId)> {
        match &self[ty].kind {
            TypeKind::Function {
                params,
                return_type,
            } => Some((params, *return_type)),
            _ => None,
        }
    }

    /// Human readable name of a type
    pub fn name(&self, ty: TypeId) -> String {
        let data = &self[ty];
        match (&data.kind, data.params.as_slice()) {
            (TypeKind::Pointer, [inner]) => format!("*{}", self.name(*inner)),
            _ => data.path.clone(),
        }
    }

    /// `ty` is `other` or one of its descendants, with type arguments checked pairwise
    pub fn is_of_type(&self, ty: TypeId, other: TypeId) -> bool {
        if ty == other {
            return true;
        }

        let target = &self[other];
        let mut current = Some(ty);
        while let Some(id) = current {
            let candidate = &self[id];
            if candidate.path == target.path && self.arguments_match(candidate, target) {
                return true;
            }
            current = candidate.parent;
        }
        false
    }

    fn arguments_match(&self, candidate: &Type, target: &Type) -> bool {
        // an open generic accepts every instantiation
        if target.params.is_empty() {
            return true;
        }
        candidate.params.len() == target.params.len()
            && candidate
                .params
                .iter()
                .zip(&target.params)
                .all(|(&a, &b)| self.is_of_type(a, b))
    }

    /// Returns `this` if both share a path, otherwise retries with the parent of `other`.
    ///
    /// The search only climbs the ancestors of `other`, so the result depends on the argument
    /// order: for a struct `Child: Base`, `common_type(Base, Child)` is `Base` while
    /// `common_type(Child, Base)` is `any`.
    pub fn common_type(&self, this: TypeId, other: TypeId) -> TypeId {
        if self[this].path == self[other].path {
            return this;
        }
        match self[other].parent {
            Some(parent) => self.common_type(this, parent),
            None => self.any(),
        }
    }

    /// Instantiate a generic type with type arguments
    pub fn invoke(&mut self, generic: TypeId, params: Vec<TypeId>) -> Result<TypeId, InvokeError> {
        let bounds = self[generic].bounds.clone();
        if bounds.len() != params.len() {
            return Err(InvokeError::Arity {
                ty: self.name(generic),
                expected: bounds.len(),
                found: params.len(),
            });
        }

        if let Some((&argument, &bound)) = params
            .iter()
            .zip(&bounds)
            .find(|&(&argument, &bound)| !self.is_of_type(argument, bound))
        {
            return Err(InvokeError::Mismatch {
                ty: self.name(generic),
                argument: self.name(argument),
                bound: self.name(bound),
            });
        }

        Ok(self.instantiate(generic, params))
    }

    fn instantiate(&mut self, generic: TypeId, params: Vec<TypeId>) -> TypeId {
        let key = (self[generic].path.clone(), params);
        if let Some(&id) = self.interned.get(&key) {
            return id;
        }

        let data = &self[generic];
        let instance = Type {
            path: data.path.clone(),
            parent: data.parent,
            size: data.size,
            params: key.1.clone(),
            bounds: data.bounds.clone(),
            kind: data.kind.clone(),
        };
        let id = self.types.push(instance);
        self.interned.insert(key, id);
        id
    }

    /// `*inner`
    pub fn pointer_to(&mut self, inner: TypeId) -> TypeId {
        // every type satisfies the `any` bound of the pointer
        self.instantiate(self.pointer, vec![inner])
    }

    /// The type of a function value, interned by its signature
    pub fn function_type(&mut self, params: Vec<TypeId>, return_type: TypeId) -> TypeId {
        let rendered: Vec<_> = params.iter().map(|&p| self.name(p)).collect();
        let mut path = format!("fn({})", rendered.join(", "));
        if return_type != self.void() {
            path = format!("{path}: {}", self.name(return_type));
        }

        let key = (path, Vec::new());
        if let Some(&id) = self.interned.get(&key) {
            return id;
        }

        let any = self.any();
        let id = self.types.push(Type {
            path: key.0.clone(),
            parent: Some(any),
            size: PrimitiveKind::Ptr.size(),
            params: Vec::new(),
            bounds: Vec::new(),
            kind: TypeKind::Function {
                params,
                return_type,
            },
        });
        self.interned.insert(key, id);
        id
    }

    /// Reserve a struct type so that it can be referenced before its fields are known.
    /// Returns `None` if the path is taken.
    pub fn declare_struct(&mut self, path: String, private_to: Option<FileId>) -> Option<TypeId> {
        let key = (path, Vec::new());
        if self.interned.contains_key(&key) {
            return None;
        }

        let any = self.any();
        let id = self.types.push(Type {
            path: key.0.clone(),
            parent: Some(any),
            size: 0,
            params: Vec::new(),
            bounds: Vec::new(),
            kind: TypeKind::Struct {
                fields: Vec::new(),
                private_to,
            },
        });
        self.interned.insert(key, id);
        Some(id)
    }

    /// Fill in the parent and the own fields of a declared struct
    pub fn define_struct(&mut self, ty: TypeId, parent: Option<TypeId>, own_fields: Vec<Field>) {
        let any = self.any();
        let data = &mut self.types[ty];
        data.parent = Some(parent.unwrap_or(any));
        match &mut data.kind {
            TypeKind::Struct { fields, .. } => *fields = own_fields,
            _ => panic!("`{}` is not a struct", data.path),
        }
    }

    pub fn struct_private_to(&self, ty: TypeId) -> Option<FileId> {
        match &self[ty].kind {
            TypeKind::Struct { private_to, .. } => *private_to,
            _ => None,
        }
    }

    fn own_fields(&self, ty: TypeId) -> &[Field] {
        match &self[ty].kind {
            TypeKind::Struct { fields, .. } => fields,
            _ => &[],
        }
    }

    fn parent_struct(&self, ty: TypeId) -> Option<TypeId> {
        self[ty].parent.filter(|&parent| self.is_struct(parent))
    }

    /// Number of field slots including inherited ones
    pub fn field_count(&self, ty: TypeId) -> usize {
        let inherited = self.parent_struct(ty).map_or(0, |p| self.field_count(p));
        let own = self.own_fields(ty).iter().filter(|f| !f.is_override).count();
        inherited + own
    }

    /// The field in slot `index`, taking overrides into account.
    ///
    /// Ancestor fields occupy the lower slots. Panics if the index is out of range.
    pub fn field(&self, ty: TypeId, index: usize) -> &Field {
        let parent = self.parent_struct(ty);
        let inherited = parent.map_or(0, |p| self.field_count(p));

        if let (Some(parent), true) = (parent, index < inherited) {
            let field = self.field(parent, index);
            return self
                .own_fields(ty)
                .iter()
                .find(|f| f.is_override && f.name == field.name)
                .unwrap_or(field);
        }

        match self
            .own_fields(ty)
            .iter()
            .filter(|f| !f.is_override)
            .nth(index - inherited)
        {
            Some(field) => field,
            None => panic!("field index {index} out of range for `{}`", self[ty].path),
        }
    }

    /// Find a field and its slot by name, own fields first
    pub fn field_by_name(&self, ty: TypeId, name: &str) -> Option<(usize, &Field)> {
        let parent = self.parent_struct(ty);
        let inherited = parent.map_or(0, |p| self.field_count(p));

        let mut slot = inherited;
        for field in self.own_fields(ty) {
            if field.name == name {
                return match (field.is_override, parent) {
                    (false, _) => Some((slot, field)),
                    (true, Some(parent)) => self
                        .field_by_name(parent, name)
                        .map(|(index, _)| (index, field)),
                    (true, None) => None,
                };
            }
            if !field.is_override {
                slot += 1;
            }
        }

        parent.and_then(|p| self.field_by_name(p, name))
    }

    /// All field slots in order
    pub fn fields(&self, ty: TypeId) -> Vec<&Field> {
        (0..self.field_count(ty)).map(|i| self.field(ty, i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, ty: TypeId) -> Field {
        Field {
            name: name.to_string(),
            ty,
            is_read_only: false,
            is_override: false,
            has_default: false,
        }
    }

    fn shapes(types: &mut TypeTable) -> (TypeId, TypeId) {
        let int = types.primitive(PrimitiveKind::I32);
        let s0 = types.declare_struct(String::from("S0"), None).unwrap();
        let s1 = types.declare_struct(String::from("S1"), None).unwrap();
        types.define_struct(s0, None, vec![field("a", int)]);
        types.define_struct(s1, Some(s0), vec![field("b", int)]);
        (s0, s1)
    }

    #[test]
    fn lattice_is_reflexive_and_follows_parents() {
        let mut types = TypeTable::new();
        let (s0, s1) = shapes(&mut types);
        let ids: Vec<_> = types.iter().map(|(id, _)| id).collect();

        for &ty in &ids {
            assert!(types.is_of_type(ty, ty));
            if let Some(parent) = types[ty].parent {
                assert!(types.is_of_type(ty, parent));
            }
        }

        let int = types.primitive(PrimitiveKind::I32);
        assert!(types.is_of_type(int, types.any()));
        assert!(!types.is_of_type(types.any(), int));
        assert!(types.is_of_type(s1, s0));
        assert!(!types.is_of_type(s0, s1));
    }

    #[test]
    fn pointers_are_covariant() {
        let mut types = TypeTable::new();
        let (s0, s1) = shapes(&mut types);
        let p0 = types.pointer_to(s0);
        let p1 = types.pointer_to(s1);

        assert_eq!(types.pointer_to(s0), p0);
        assert!(types.is_of_type(p1, p0));
        assert!(!types.is_of_type(p0, p1));
        assert!(types.is_of_type(p0, types.pointer_generic()));
        assert!(types.is_of_type(p0, types.primitive(PrimitiveKind::Ptr)));
        assert_eq!(types.name(p1), "*S1");
    }

    #[test]
    fn common_type_only_climbs_the_second_argument() {
        let mut types = TypeTable::new();
        let (s0, s1) = shapes(&mut types);

        assert_eq!(types.common_type(s0, s1), s0);
        assert_eq!(types.common_type(s1, s0), types.any());
        assert_eq!(types.common_type(s1, s1), s1);
    }

    #[test]
    fn invoke_checks_arity_and_bounds() {
        let mut types = TypeTable::new();
        let generic = types.pointer_generic();
        let int = types.primitive(PrimitiveKind::I32);

        assert!(matches!(
            types.invoke(generic, vec![]),
            Err(InvokeError::Arity {
                expected: 1,
                found: 0,
                ..
            })
        ));
        let instance = types.invoke(generic, vec![int]).unwrap();
        assert_eq!(types.pointee(instance), Some(int));

        // narrow the bound to exercise the mismatch path
        let bool = types.bool();
        types.types[generic].bounds = vec![int];
        assert!(matches!(
            types.invoke(generic, vec![bool]),
            Err(InvokeError::Mismatch { .. })
        ));
    }

    #[test]
    fn fields_are_inherited() {
        let mut types = TypeTable::new();
        let (_, s1) = shapes(&mut types);

        assert_eq!(types.field_count(s1), 2);
        assert_eq!(types.field(s1, 0).name, "a");
        assert_eq!(types.field(s1, 1).name, "b");
        assert_eq!(types.field_by_name(s1, "a").map(|(i, _)| i), Some(0));
        assert_eq!(types.field_by_name(s1, "b").map(|(i, _)| i), Some(1));
        assert!(types.field_by_name(s1, "c").is_none());
    }

    #[test]
    fn overrides_replace_the_parent_slot() {
        let mut types = TypeTable::new();
        let (s0, s1) = shapes(&mut types);
        let long = types.primitive(PrimitiveKind::I64);
        let s2 = types.declare_struct(String::from("S2"), None).unwrap();
        let mut area = field("a", long);
        area.is_override = true;
        area.has_default = true;
        types.define_struct(s2, Some(s1), vec![area, field("c", long)]);

        assert_eq!(types.field_count(s2), 3);
        assert_eq!(types.field(s2, 0).ty, long);
        assert_eq!(types.field(s0, 0).ty, types.primitive(PrimitiveKind::I32));
        assert_eq!(types.field(s2, 2).name, "c");
        assert_eq!(types.field_by_name(s2, "a").map(|(i, f)| (i, f.ty)), Some((0, long)));
    }

    #[test]
    #[should_panic]
    fn field_index_out_of_range() {
        let mut types = TypeTable::new();
        let (_, s1) = shapes(&mut types);
        types.field(s1, 2);
    }

    #[test]
    fn operator_tables() {
        assert!(PrimitiveKind::I32.supports_binary_op(BinaryOperator::Shl));
        assert!(!PrimitiveKind::F64.supports_binary_op(BinaryOperator::BitAnd));
        assert!(PrimitiveKind::Bool.supports_binary_op(BinaryOperator::And));
        assert!(!PrimitiveKind::U8.supports_unary_op(UnaryOperator::Negate));
        assert!(PrimitiveKind::Bool.can_be_cast_to(PrimitiveKind::I64));
        assert!(!PrimitiveKind::Void.can_be_cast_to(PrimitiveKind::I64));
    }
}
