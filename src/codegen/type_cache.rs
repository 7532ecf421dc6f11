//! Type projection into a backend
//!
//! Scalar, pointer and array types are rebuilt on every request. Struct
//! types are declared with the backend the first time their name is seen and
//! reused afterwards, since a backend must not see two definitions of one
//! named struct. A cache belongs to exactly one backend instance.

use rustc_hash::FxHashMap;

use super::backend::Backend;
use crate::types::{BuiltinKind, Type};

#[derive(Debug)]
pub struct TypeCache<T> {
    structs: FxHashMap<String, T>,
}

impl<T> Default for TypeCache<T> {
    fn default() -> Self {
        Self { structs: FxHashMap::default() }
    }
}

impl<T: Clone> TypeCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lower<B: Backend<Type = T>>(&mut self, backend: &mut B, ty: &Type) -> T {
        match ty {
            Type::Builtin(BuiltinKind::Float) => backend.float_type(),
            Type::Builtin(kind) => backend.int_type(kind.bit_size()),
            Type::Pointer(_) => backend.pointer_type(),
            Type::Array { base, count } => {
                let element = self.lower(backend, base);
                backend.array_type(element, *count as u64)
            }
            Type::Struct(st) => {
                if let Some(cached) = self.structs.get(&st.name) {
                    return cached.clone();
                }
                let fields: Vec<T> = st.elements.iter().map(|e| self.lower(backend, &e.ty)).collect();
                let lowered = backend.struct_type(&st.name, &fields);
                self.structs.insert(st.name.clone(), lowered.clone());
                lowered
            }
            Type::Void => backend.void_type(),
        }
    }

    pub fn len(&self) -> usize {
        self.structs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{IrBuilder, IrType};
    use crate::types::StructType;
    use std::rc::Rc;

    #[test]
    fn test_struct_declared_once() {
        let mut st = StructType::new("Pair");
        st.push("a", Type::int());
        st.push("b", Type::builtin(BuiltinKind::Char));
        let pair = Rc::new(Type::Struct(Rc::new(st)));

        let mut backend = IrBuilder::new();
        let mut cache = TypeCache::new();
        let first = cache.lower(&mut backend, &pair);
        let nested = cache.lower(&mut backend, &Type::array(Rc::clone(&pair), 2));
        assert_eq!(nested, IrType::Array(Box::new(first.clone()), 2));
        assert_eq!(cache.len(), 1);
        assert_eq!(backend.module().structs.len(), 1);
        assert_eq!(backend.module().structs[0].fields, vec![IrType::Int(32), IrType::Int(8)]);
    }

    #[test]
    fn test_scalar_projection() {
        let mut backend = IrBuilder::new();
        let mut cache = TypeCache::new();
        assert_eq!(cache.lower(&mut backend, &Type::Builtin(BuiltinKind::Bool)), IrType::Int(1));
        assert_eq!(cache.lower(&mut backend, &Type::Builtin(BuiltinKind::Float)), IrType::Float);
        assert_eq!(cache.lower(&mut backend, &Type::pointer(Type::int())), IrType::Ptr);
        assert!(cache.is_empty());
    }
}
