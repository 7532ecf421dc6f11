//! IR builder
//!
//! [`IrBuilder`] is the reference [`Backend`]: it records everything lowering
//! emits into a [`Module`] that can be printed or evaluated.
//!
//! Emitting into a block that already has a terminator (statements after a
//! `ret`) opens a fresh, unreachable block first, so every block keeps at
//! most one terminator.

use super::instr::{
    Block, BlockId, FuncId, Function, GlobalId, Inst, IrType, Module, Operand, Reg, StructDef,
    StructId, Terminator,
};
use crate::codegen::{ArithOp, Backend, CastOp, FloatPredicate, IntPredicate};

/// A block of a specific function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef {
    pub function: FuncId,
    pub block: BlockId,
}

#[derive(Debug, Default)]
pub struct IrBuilder {
    module: Module,
    cursor: Option<BlockRef>,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn finish(self) -> Module {
        self.module
    }

    fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.module.functions[id.0 as usize]
    }

    fn new_block(&mut self, function: FuncId) -> BlockRef {
        let blocks = &mut self.function_mut(function).blocks;
        blocks.push(Block::default());
        BlockRef { function, block: BlockId(blocks.len() as u32 - 1) }
    }

    /// The insertion block, reopened if it is already terminated.
    fn open_block(&mut self) -> BlockRef {
        let cursor = self.cursor.expect("no insertion point: position the builder first");
        let terminated = self.function_mut(cursor.function).blocks[cursor.block.0 as usize]
            .terminator
            .is_some();
        if terminated {
            let fresh = self.new_block(cursor.function);
            self.cursor = Some(fresh);
            fresh
        } else {
            cursor
        }
    }

    fn emit(&mut self, inst: Inst) {
        let at = self.open_block();
        self.function_mut(at.function).blocks[at.block.0 as usize].insts.push(inst);
    }

    fn fresh_reg(&mut self) -> Reg {
        let at = self.open_block();
        let function = self.function_mut(at.function);
        let reg = Reg(function.reg_count);
        function.reg_count += 1;
        reg
    }

    fn emit_value(&mut self, make: impl FnOnce(Reg) -> Inst) -> Operand {
        let dst = self.fresh_reg();
        self.emit(make(dst));
        Operand::Reg(dst)
    }

    fn terminate(&mut self, terminator: Terminator) {
        let at = self.open_block();
        self.function_mut(at.function).blocks[at.block.0 as usize].terminator = Some(terminator);
    }
}

impl Backend for IrBuilder {
    type Type = IrType;
    type Value = Operand;
    type Function = FuncId;
    type Block = BlockRef;

    fn int_type(&mut self, bits: u32) -> IrType {
        IrType::Int(bits)
    }

    fn float_type(&mut self) -> IrType {
        IrType::Float
    }

    fn void_type(&mut self) -> IrType {
        IrType::Void
    }

    fn pointer_type(&mut self) -> IrType {
        IrType::Ptr
    }

    fn array_type(&mut self, element: IrType, count: u64) -> IrType {
        IrType::Array(Box::new(element), count)
    }

    fn struct_type(&mut self, name: &str, fields: &[IrType]) -> IrType {
        self.module.structs.push(StructDef { name: name.to_string(), fields: fields.to_vec() });
        IrType::Struct(StructId(self.module.structs.len() as u32 - 1))
    }

    fn declare_function(&mut self, name: &str, params: &[IrType], ret: IrType, external: bool) -> FuncId {
        tracing::trace!(name, external, "declare function");
        self.module.functions.push(Function::new(name, params.to_vec(), ret, external));
        FuncId(self.module.functions.len() as u32 - 1)
    }

    fn param(&mut self, _function: &FuncId, index: usize) -> Operand {
        Operand::Param(index as u32)
    }

    fn append_block(&mut self, function: &FuncId) -> BlockRef {
        self.new_block(*function)
    }

    fn position_at_end(&mut self, block: BlockRef) {
        self.cursor = Some(block);
    }

    fn alloca(&mut self, ty: &IrType, name: &str) -> Operand {
        self.emit_value(|dst| Inst::Alloca { dst, ty: ty.clone(), name: name.to_string() })
    }

    fn load(&mut self, ty: &IrType, ptr: &Operand) -> Operand {
        self.emit_value(|dst| Inst::Load { dst, ty: ty.clone(), ptr: ptr.clone() })
    }

    fn store(&mut self, value: &Operand, ptr: &Operand) {
        self.emit(Inst::Store { value: value.clone(), ptr: ptr.clone() });
    }

    fn gep(&mut self, ty: &IrType, ptr: &Operand, indices: &[Operand]) -> Operand {
        self.emit_value(|dst| Inst::Gep {
            dst,
            ty: ty.clone(),
            ptr: ptr.clone(),
            indices: indices.to_vec(),
        })
    }

    fn const_int(&mut self, bits: u32, value: i64) -> Operand {
        Operand::Int { bits, value }
    }

    fn global_string(&mut self, value: &str) -> Operand {
        self.module.globals.push(value.to_string());
        Operand::Global(GlobalId(self.module.globals.len() as u32 - 1))
    }

    fn int_arith(&mut self, op: ArithOp, lhs: &Operand, rhs: &Operand) -> Operand {
        self.emit_value(|dst| Inst::IntArith { dst, op, lhs: lhs.clone(), rhs: rhs.clone() })
    }

    fn float_arith(&mut self, op: ArithOp, lhs: &Operand, rhs: &Operand) -> Operand {
        self.emit_value(|dst| Inst::FloatArith { dst, op, lhs: lhs.clone(), rhs: rhs.clone() })
    }

    fn icmp(&mut self, pred: IntPredicate, lhs: &Operand, rhs: &Operand) -> Operand {
        self.emit_value(|dst| Inst::ICmp { dst, pred, lhs: lhs.clone(), rhs: rhs.clone() })
    }

    fn fcmp(&mut self, pred: FloatPredicate, lhs: &Operand, rhs: &Operand) -> Operand {
        self.emit_value(|dst| Inst::FCmp { dst, pred, lhs: lhs.clone(), rhs: rhs.clone() })
    }

    fn cast(&mut self, op: CastOp, value: &Operand, to: &IrType) -> Operand {
        self.emit_value(|dst| Inst::Cast { dst, op, value: value.clone(), to: to.clone() })
    }

    fn call(&mut self, function: &FuncId, args: &[Operand]) -> Option<Operand> {
        let callee = *function;
        if self.module.function(callee).ret == IrType::Void {
            self.emit(Inst::Call { dst: None, callee, args: args.to_vec() });
            return None;
        }
        Some(self.emit_value(|dst| Inst::Call { dst: Some(dst), callee, args: args.to_vec() }))
    }

    fn ret(&mut self, value: Option<&Operand>) {
        self.terminate(Terminator::Ret(value.cloned()));
    }

    fn br(&mut self, target: BlockRef) {
        self.terminate(Terminator::Br(target.block));
    }

    fn cond_br(&mut self, cond: &Operand, then_block: BlockRef, else_block: BlockRef) {
        self.terminate(Terminator::CondBr {
            cond: cond.clone(),
            then_block: then_block.block,
            else_block: else_block.block,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_after_terminator_opens_block() {
        let mut builder = IrBuilder::new();
        let f = builder.declare_function("f", &[], IrType::Void, false);
        let entry = builder.append_block(&f);
        builder.position_at_end(entry);
        builder.ret(None);
        let slot = builder.alloca(&IrType::Int(32), "late");
        builder.ret(None);

        let module = builder.finish();
        let function = module.function(f);
        assert_eq!(function.blocks.len(), 2);
        assert_eq!(function.blocks[0].terminator, Some(Terminator::Ret(None)));
        assert_eq!(slot, Operand::Reg(Reg(0)));
        assert_eq!(function.blocks[1].insts.len(), 1);
        assert!(function.blocks[1].terminator.is_some());
    }

    #[test]
    fn test_void_call_has_no_result() {
        let mut builder = IrBuilder::new();
        let sink = builder.declare_function("sink", &[IrType::Int(32)], IrType::Void, true);
        let main = builder.declare_function("main", &[], IrType::Int(32), false);
        let entry = builder.append_block(&main);
        builder.position_at_end(entry);
        let arg = builder.const_int(32, 4);
        assert_eq!(builder.call(&sink, &[arg]), None);
        assert_eq!(builder.module().function(main).reg_count, 0);
    }
}
