//! Type model
//!
//! Types are immutable values shared through [`TypeRef`]. They are not
//! interned, so equality always goes through [`Type::is_same`], a deep
//! comparison. Structs are the exception to pure structural equality: two
//! struct types must also share a name.
//!
//! Mapping a type to a backend type lives in [`crate::codegen::TypeCache`];
//! nothing here depends on a backend.

use std::fmt;
use std::rc::Rc;

pub type TypeRef = Rc<Type>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinKind {
    Bool,
    Char,
    Short,
    Int,
    Long,
    Float,
}

impl BuiltinKind {
    pub fn bit_size(self) -> u32 {
        match self {
            BuiltinKind::Bool => 1,
            BuiltinKind::Char => 8,
            BuiltinKind::Short => 16,
            BuiltinKind::Int | BuiltinKind::Float => 32,
            BuiltinKind::Long => 64,
        }
    }

    pub fn is_integer_kind(self) -> bool {
        !matches!(self, BuiltinKind::Float)
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltinKind::Bool => "bool",
            BuiltinKind::Char => "char",
            BuiltinKind::Short => "short",
            BuiltinKind::Int => "int",
            BuiltinKind::Long => "long",
            BuiltinKind::Float => "float",
        }
    }
}

/// One field of a struct. `field_num` is the field's position, used as the
/// member index when addressing it.
#[derive(Debug, Clone)]
pub struct Element {
    pub field_num: usize,
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
pub struct StructType {
    pub name: String,
    pub elements: Vec<Element>,
}

impl StructType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), elements: Vec::new() }
    }

    /// Append a field, numbering it after the existing ones.
    pub fn push(&mut self, name: impl Into<String>, ty: TypeRef) {
        let field_num = self.elements.len();
        self.elements.push(Element { field_num, name: name.into(), ty });
    }

    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub fn is_same(&self, other: &StructType) -> bool {
        self.name == other.name
            && self.elements.len() == other.elements.len()
            && self
                .elements
                .iter()
                .zip(&other.elements)
                .all(|(a, b)| a.name == b.name && a.ty.is_same(&b.ty))
    }
}

#[derive(Debug, Clone)]
pub enum Type {
    Builtin(BuiltinKind),
    Pointer(TypeRef),
    Array { base: TypeRef, count: usize },
    Struct(Rc<StructType>),
    Void,
}

impl Type {
    pub fn builtin(kind: BuiltinKind) -> TypeRef {
        Rc::new(Type::Builtin(kind))
    }

    pub fn int() -> TypeRef {
        Self::builtin(BuiltinKind::Int)
    }

    pub fn bool() -> TypeRef {
        Self::builtin(BuiltinKind::Bool)
    }

    pub fn pointer(pointee: TypeRef) -> TypeRef {
        Rc::new(Type::Pointer(pointee))
    }

    pub fn array(base: TypeRef, count: usize) -> TypeRef {
        Rc::new(Type::Array { base, count })
    }

    pub fn void() -> TypeRef {
        Rc::new(Type::Void)
    }

    pub fn is_same(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Builtin(a), Type::Builtin(b)) => a == b,
            (Type::Pointer(a), Type::Pointer(b)) => a.is_same(b),
            (
                Type::Array { base: a, count: n },
                Type::Array { base: b, count: m },
            ) => n == m && a.is_same(b),
            (Type::Struct(a), Type::Struct(b)) => a.is_same(b),
            (Type::Void, Type::Void) => true,
            _ => false,
        }
    }

    pub fn as_builtin(&self) -> Option<BuiltinKind> {
        match self {
            Type::Builtin(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Rc<StructType>> {
        match self {
            Type::Struct(st) => Some(st),
            _ => None,
        }
    }

    pub fn pointee(&self) -> Option<&TypeRef> {
        match self {
            Type::Pointer(pointee) => Some(pointee),
            _ => None,
        }
    }

    pub fn array_base(&self) -> Option<&TypeRef> {
        match self {
            Type::Array { base, .. } => Some(base),
            _ => None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_void_ptr(&self) -> bool {
        matches!(self, Type::Pointer(pointee) if pointee.is_void())
    }

    pub fn is_integer_kind(&self) -> bool {
        self.as_builtin().is_some_and(BuiltinKind::is_integer_kind)
    }

    pub fn is_float(&self) -> bool {
        self.as_builtin() == Some(BuiltinKind::Float)
    }

    /// Width in bits of an integer-kind builtin.
    pub fn bit_size(&self) -> Option<u32> {
        self.as_builtin()
            .filter(|kind| kind.is_integer_kind())
            .map(BuiltinKind::bit_size)
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Builtin(kind) => f.write_str(kind.name()),
            Type::Pointer(pointee) => write!(f, "ptr {pointee}"),
            Type::Array { base, count } => write!(f, "array({count}) {base}"),
            Type::Struct(st) => write!(f, "struct {}", st.name),
            Type::Void => f.write_str("void"),
        }
    }
}
