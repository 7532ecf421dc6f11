//! IR data model
//!
//! A [`Module`] holds struct definitions, string globals and functions.
//! Functions are lists of blocks; a block is a run of [`Inst`]s closed by a
//! [`Terminator`]. Registers are numbered per function and written once.
//!
//! # Type Sizes
//!
//! Sizes are fixed and platform independent:
//! - `iN`: `N / 8` bytes rounded up, so `i1` takes 1 byte
//! - `float`: 4 bytes
//! - `ptr`: 8 bytes
//! - structs: sum of field sizes (no padding or alignment)

use crate::codegen::{ArithOp, CastOp, FloatPredicate, IntPredicate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reg(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StructId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrType {
    Int(u32),
    Float,
    /// Untyped pointer
    Ptr,
    Void,
    Array(Box<IrType>, u64),
    Struct(StructId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<IrType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg),
    /// Incoming argument of the enclosing function
    Param(u32),
    Int { bits: u32, value: i64 },
    /// Address of a string global
    Global(GlobalId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inst {
    Alloca { dst: Reg, ty: IrType, name: String },
    Load { dst: Reg, ty: IrType, ptr: Operand },
    Store { value: Operand, ptr: Operand },
    Gep { dst: Reg, ty: IrType, ptr: Operand, indices: Vec<Operand> },
    IntArith { dst: Reg, op: ArithOp, lhs: Operand, rhs: Operand },
    FloatArith { dst: Reg, op: ArithOp, lhs: Operand, rhs: Operand },
    ICmp { dst: Reg, pred: IntPredicate, lhs: Operand, rhs: Operand },
    FCmp { dst: Reg, pred: FloatPredicate, lhs: Operand, rhs: Operand },
    Cast { dst: Reg, op: CastOp, value: Operand, to: IrType },
    Call { dst: Option<Reg>, callee: FuncId, args: Vec<Operand> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    Ret(Option<Operand>),
    Br(BlockId),
    CondBr { cond: Operand, then_block: BlockId, else_block: BlockId },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub insts: Vec<Inst>,
    pub terminator: Option<Terminator>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub params: Vec<IrType>,
    pub ret: IrType,
    pub external: bool,
    pub blocks: Vec<Block>,
    pub reg_count: u32,
}

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<IrType>, ret: IrType, external: bool) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
            external,
            blocks: Vec::new(),
            reg_count: 0,
        }
    }

    /// Every instruction in block order.
    pub fn insts(&self) -> impl Iterator<Item = &Inst> {
        self.blocks.iter().flat_map(|b| b.insts.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    pub structs: Vec<StructDef>,
    pub globals: Vec<String>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn find_function(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|index| FuncId(index as u32))
    }

    pub fn struct_def(&self, id: StructId) -> &StructDef {
        &self.structs[id.0 as usize]
    }

    /// Size of a type in bytes, saturating at `u64::MAX` for sizes no
    /// memory could hold.
    pub fn size_of(&self, ty: &IrType) -> u64 {
        match ty {
            IrType::Int(bits) => u64::from(bits.div_ceil(8)),
            IrType::Float => 4,
            IrType::Ptr => 8,
            IrType::Void => 0,
            IrType::Array(element, count) => self.size_of(element).saturating_mul(*count),
            IrType::Struct(id) => self.sum_sizes(&self.struct_def(*id).fields),
        }
    }

    /// Byte offset of field `index` and the field's type.
    pub fn field(&self, id: StructId, index: usize) -> Option<(u64, &IrType)> {
        let fields = &self.struct_def(id).fields;
        let ty = fields.get(index)?;
        let offset = self.sum_sizes(&fields[..index]);
        Some((offset, ty))
    }

    fn sum_sizes(&self, fields: &[IrType]) -> u64 {
        fields.iter().fold(0, |total, f| total.saturating_add(self.size_of(f)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_without_padding() {
        let mut module = Module::default();
        module.structs.push(StructDef {
            name: "Mixed".into(),
            fields: vec![IrType::Int(8), IrType::Int(32), IrType::Ptr, IrType::Int(1)],
        });
        let mixed = IrType::Struct(StructId(0));
        assert_eq!(module.size_of(&mixed), 14);
        assert_eq!(module.size_of(&IrType::Array(Box::new(mixed), 3)), 42);
        assert_eq!(module.field(StructId(0), 2), Some((5, &IrType::Ptr)));
        assert_eq!(module.field(StructId(0), 4), None);
        assert_eq!(module.size_of(&IrType::Int(16)), 2);
    }

    #[test]
    fn test_huge_array_size_saturates() {
        let module = Module::default();
        let longs = IrType::Array(Box::new(IrType::Int(64)), 1 << 62);
        assert_eq!(module.size_of(&longs), u64::MAX);
        assert_eq!(module.size_of(&IrType::Array(Box::new(longs), 2)), u64::MAX);
    }
}
