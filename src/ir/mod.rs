//! Reference backend
//!
//! - [`instr`]: the [`Module`] data model and type sizes
//! - [`builder`]: [`IrBuilder`], the [`Backend`](crate::codegen::Backend)
//!   implementation that records a module
//! - `printer`: `Display` for [`Module`]
//! - [`eval`]: the [`Evaluator`] that runs a module

pub mod builder;
pub mod eval;
pub mod instr;
mod printer;

pub use builder::{BlockRef, IrBuilder};
pub use eval::{EvalError, Evaluator, HostFn, Memory, RtValue};
pub use instr::{
    Block, BlockId, FuncId, Function, GlobalId, Inst, IrType, Module, Operand, Reg, StructDef,
    StructId, Terminator,
};
