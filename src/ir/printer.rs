//! Textual form of a [`Module`]
//!
//! ```text
//! %Point = type { i32, i32 }
//! @str.0 = "hi"
//!
//! declare i32 @puts(ptr)
//!
//! define i32 @main() {
//! bb0:
//!   %0 = alloca i32 ; x
//!   store i32 1, %0
//!   %1 = load i32, %0
//!   ret %1
//! }
//! ```

use std::fmt::{self, Write as _};

use super::instr::{Function, Inst, IrType, Module, Operand, Terminator};

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "%{}", reg.0),
            Operand::Param(index) => write!(f, "%arg{index}"),
            Operand::Int { bits, value } => write!(f, "i{bits} {value}"),
            Operand::Global(global) => write!(f, "@str.{}", global.0),
        }
    }
}

struct Printer<'m> {
    module: &'m Module,
}

impl Printer<'_> {
    fn ty(&self, ty: &IrType) -> String {
        match ty {
            IrType::Int(bits) => format!("i{bits}"),
            IrType::Float => "float".to_string(),
            IrType::Ptr => "ptr".to_string(),
            IrType::Void => "void".to_string(),
            IrType::Array(element, count) => format!("[{count} x {}]", self.ty(element)),
            IrType::Struct(id) => format!("%{}", self.module.struct_def(*id).name),
        }
    }

    fn operands(values: &[Operand]) -> String {
        values.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    }

    fn inst(&self, inst: &Inst) -> String {
        match inst {
            Inst::Alloca { dst, ty, name } => format!("%{} = alloca {} ; {name}", dst.0, self.ty(ty)),
            Inst::Load { dst, ty, ptr } => format!("%{} = load {}, {ptr}", dst.0, self.ty(ty)),
            Inst::Store { value, ptr } => format!("store {value}, {ptr}"),
            Inst::Gep { dst, ty, ptr, indices } => format!(
                "%{} = getelementptr {}, {ptr}, {}",
                dst.0,
                self.ty(ty),
                Self::operands(indices)
            ),
            Inst::IntArith { dst, op, lhs, rhs } => {
                format!("%{} = {} {lhs}, {rhs}", dst.0, op.mnemonic(false))
            }
            Inst::FloatArith { dst, op, lhs, rhs } => {
                format!("%{} = {} {lhs}, {rhs}", dst.0, op.mnemonic(true))
            }
            Inst::ICmp { dst, pred, lhs, rhs } => {
                format!("%{} = icmp {} {lhs}, {rhs}", dst.0, pred.mnemonic())
            }
            Inst::FCmp { dst, pred, lhs, rhs } => {
                format!("%{} = fcmp {} {lhs}, {rhs}", dst.0, pred.mnemonic())
            }
            Inst::Cast { dst, op, value, to } => {
                format!("%{} = {} {value} to {}", dst.0, op.mnemonic(), self.ty(to))
            }
            Inst::Call { dst, callee, args } => {
                let name = &self.module.function(*callee).name;
                let call = format!("call @{name}({})", Self::operands(args));
                match dst {
                    Some(dst) => format!("%{} = {call}", dst.0),
                    None => call,
                }
            }
        }
    }

    fn terminator(terminator: &Terminator) -> String {
        match terminator {
            Terminator::Ret(None) => "ret void".to_string(),
            Terminator::Ret(Some(value)) => format!("ret {value}"),
            Terminator::Br(target) => format!("br bb{}", target.0),
            Terminator::CondBr { cond, then_block, else_block } => {
                format!("br {cond}, bb{}, bb{}", then_block.0, else_block.0)
            }
        }
    }

    fn function(&self, function: &Function, out: &mut String) -> fmt::Result {
        let params: Vec<String> = function.params.iter().map(|p| self.ty(p)).collect();
        let ret = self.ty(&function.ret);
        if function.external {
            return writeln!(out, "declare {ret} @{}({})", function.name, params.join(", "));
        }
        writeln!(out, "define {ret} @{}({}) {{", function.name, params.join(", "))?;
        for (index, block) in function.blocks.iter().enumerate() {
            writeln!(out, "bb{index}:")?;
            for inst in &block.insts {
                writeln!(out, "  {}", self.inst(inst))?;
            }
            if let Some(terminator) = &block.terminator {
                writeln!(out, "  {}", Self::terminator(terminator))?;
            }
        }
        writeln!(out, "}}")
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let printer = Printer { module: self };
        let mut out = String::new();
        for def in &self.structs {
            let fields: Vec<String> = def.fields.iter().map(|t| printer.ty(t)).collect();
            writeln!(out, "%{} = type {{ {} }}", def.name, fields.join(", "))?;
        }
        for (index, global) in self.globals.iter().enumerate() {
            writeln!(out, "@str.{index} = {global:?}")?;
        }
        for function in &self.functions {
            if !out.is_empty() {
                out.push('\n');
            }
            printer.function(function, &mut out)?;
        }
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use crate::codegen::{ArithOp, Backend};
    use crate::ir::{IrBuilder, IrType};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_print_small_function() {
        let mut b = IrBuilder::new();
        let pair = b.struct_type("Pair", &[IrType::Int(32), IrType::Int(8)]);
        let f = b.declare_function("f", &[IrType::Int(32)], IrType::Int(32), false);
        let entry = b.append_block(&f);
        b.position_at_end(entry);
        let slot = b.alloca(&pair, "p");
        let zero = b.const_int(32, 0);
        let field = b.gep(&pair, &slot, &[zero.clone(), zero]);
        let arg = b.param(&f, 0);
        b.store(&arg, &field);
        let loaded = b.load(&IrType::Int(32), &field);
        let one = b.const_int(32, 1);
        let sum = b.int_arith(ArithOp::Div, &loaded, &one);
        b.ret(Some(&sum));

        assert_eq!(
            b.finish().to_string(),
            "\
%Pair = type { i32, i8 }

define i32 @f(i32) {
bb0:
  %0 = alloca %Pair ; p
  %1 = getelementptr %Pair, %0, i32 0, i32 0
  store %arg0, %1
  %2 = load i32, %1
  %3 = sdiv %2, i32 1
  ret %3
}
"
        );
    }
}
