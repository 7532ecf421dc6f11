//! Reference evaluator for IR modules
//!
//! Executes a [`Module`] directly so lowered programs can be run without a
//! native toolchain. Memory is one flat byte array: string globals are laid
//! out first, and each call's `alloca`s are stacked above them and released
//! when the call returns. Address 0 up to [`NULL_GUARD`] is never handed out,
//! so null accesses are caught.
//!
//! External functions are resolved against host functions registered with
//! [`Evaluator::register_host`].

use rustc_hash::FxHashMap;
use thiserror::Error;

use super::instr::{FuncId, Function, Inst, IrType, Module, Operand, Terminator};
use crate::codegen::{ArithOp, CastOp, FloatPredicate, IntPredicate};

pub const NULL_GUARD: u64 = 8;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("undefined function '{0}'")]
    UndefinedFunction(String),
    #[error("external function '{0}' has no host implementation")]
    MissingHost(String),
    #[error("'{name}' takes {expected} arguments but {found} were given")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("null pointer access")]
    NullPointer,
    #[error("out of bounds access of {size} bytes at {address:#x}")]
    OutOfBounds { address: u64, size: u64 },
    #[error("out of memory: {requested} bytes requested, limit is {limit}")]
    OutOfMemory { requested: u64, limit: u64 },
    #[error("division by zero")]
    DivisionByZero,
    #[error("step limit of {0} exceeded")]
    StepLimit(u64),
    #[error("call depth limit of {0} exceeded")]
    StackOverflow(usize),
    #[error("block bb{block} of '{function}' has no terminator")]
    Unterminated { function: String, block: u32 },
    #[error("type error: {0}")]
    TypeMismatch(String),
    #[error("host function '{name}' failed: {message}")]
    Host { name: String, message: String },
}

/// A runtime value. Integers keep their raw bits, masked to their width.
#[derive(Debug, Clone, PartialEq)]
pub enum RtValue {
    Int { bits: u32, raw: u64 },
    Float(f32),
    Ptr(u64),
    /// Bytes of a loaded struct or array
    Aggregate(Vec<u8>),
}

fn mask(raw: u64, bits: u32) -> u64 {
    if bits >= 64 {
        raw
    } else {
        raw & ((1u64 << bits) - 1)
    }
}

fn sign_extend(raw: u64, bits: u32) -> i64 {
    if bits >= 64 {
        raw as i64
    } else {
        let shift = 64 - bits;
        ((raw << shift) as i64) >> shift
    }
}

impl RtValue {
    pub fn int(bits: u32, value: i64) -> Self {
        RtValue::Int { bits, raw: mask(value as u64, bits) }
    }

    pub fn bool(value: bool) -> Self {
        RtValue::Int { bits: 1, raw: u64::from(value) }
    }

    /// Signed interpretation; an `i1` holding 1 reads as -1.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RtValue::Int { bits, raw } => Some(sign_extend(*raw, *bits)),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            RtValue::Int { raw, .. } => Some(*raw),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            RtValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_ptr(&self) -> Option<u64> {
        match self {
            RtValue::Ptr(address) => Some(*address),
            _ => None,
        }
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            RtValue::Int { bits, raw } => raw.to_le_bytes()[..bits.div_ceil(8) as usize].to_vec(),
            RtValue::Float(value) => value.to_le_bytes().to_vec(),
            RtValue::Ptr(address) => address.to_le_bytes().to_vec(),
            RtValue::Aggregate(bytes) => bytes.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Memory {
    bytes: Vec<u8>,
    limit: u64,
}

impl Memory {
    pub const DEFAULT_LIMIT: u64 = 16 * 1024 * 1024;

    pub fn new(limit: u64) -> Self {
        Self { bytes: vec![0; NULL_GUARD as usize], limit }
    }

    /// Zero-filled block of `size` bytes.
    pub fn allocate(&mut self, size: u64) -> Result<u64, EvalError> {
        let address = self.bytes.len() as u64;
        let end = match address.checked_add(size) {
            Some(end) if end <= self.limit => end,
            _ => return Err(EvalError::OutOfMemory { requested: size, limit: self.limit }),
        };
        self.bytes.resize(end as usize, 0);
        Ok(address)
    }

    pub fn top(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Free everything allocated since `top` was taken.
    pub fn release(&mut self, top: u64) {
        self.bytes.truncate(top as usize);
    }

    fn range(&self, address: u64, size: u64) -> Result<std::ops::Range<usize>, EvalError> {
        if address < NULL_GUARD {
            return Err(EvalError::NullPointer);
        }
        match address.checked_add(size) {
            Some(end) if end <= self.top() => Ok(address as usize..end as usize),
            _ => Err(EvalError::OutOfBounds { address, size }),
        }
    }

    pub fn read(&self, address: u64, size: u64) -> Result<&[u8], EvalError> {
        let range = self.range(address, size)?;
        Ok(&self.bytes[range])
    }

    pub fn write(&mut self, address: u64, data: &[u8]) -> Result<(), EvalError> {
        let range = self.range(address, data.len() as u64)?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// Bytes from `address` up to the next NUL, decoded lossily.
    pub fn read_c_string(&self, address: u64) -> Result<String, EvalError> {
        let start = self.range(address, 0)?.start;
        let tail = &self.bytes[start..];
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(EvalError::OutOfBounds { address, size: tail.len() as u64 + 1 })?;
        Ok(String::from_utf8_lossy(&tail[..len]).into_owned())
    }
}

pub type HostFn = Box<dyn FnMut(&mut Memory, &[RtValue]) -> Result<Option<RtValue>, String>>;

pub struct Evaluator<'m> {
    module: &'m Module,
    memory: Memory,
    globals: Vec<u64>,
    hosts: FxHashMap<String, HostFn>,
    max_steps: u64,
    steps: u64,
    max_depth: usize,
    depth: usize,
}

impl<'m> Evaluator<'m> {
    pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;
    pub const DEFAULT_MAX_DEPTH: usize = 1_000;

    pub fn new(module: &'m Module) -> Result<Self, EvalError> {
        let mut memory = Memory::new(Memory::DEFAULT_LIMIT);
        let mut globals = Vec::with_capacity(module.globals.len());
        for value in &module.globals {
            let address = memory.allocate(value.len() as u64 + 1)?;
            memory.write(address, value.as_bytes())?;
            globals.push(address);
        }
        Ok(Self {
            module,
            memory,
            globals,
            hosts: FxHashMap::default(),
            max_steps: Self::DEFAULT_MAX_STEPS,
            steps: 0,
            max_depth: Self::DEFAULT_MAX_DEPTH,
            depth: 0,
        })
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Back the external function `name` with a host closure.
    pub fn register_host(
        &mut self,
        name: impl Into<String>,
        host: impl FnMut(&mut Memory, &[RtValue]) -> Result<Option<RtValue>, String> + 'static,
    ) {
        self.hosts.insert(name.into(), Box::new(host));
    }

    /// Instructions and terminators executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn call(&mut self, name: &str, args: &[RtValue]) -> Result<Option<RtValue>, EvalError> {
        let id = self
            .module
            .find_function(name)
            .ok_or_else(|| EvalError::UndefinedFunction(name.to_string()))?;
        tracing::debug!(name, "evaluate");
        self.invoke(id, args.to_vec())
    }

    fn invoke(&mut self, id: FuncId, args: Vec<RtValue>) -> Result<Option<RtValue>, EvalError> {
        let module = self.module;
        let function = module.function(id);
        if args.len() != function.params.len() {
            return Err(EvalError::ArgumentCount {
                name: function.name.clone(),
                expected: function.params.len(),
                found: args.len(),
            });
        }

        if function.external {
            let host = self
                .hosts
                .get_mut(&function.name)
                .ok_or_else(|| EvalError::MissingHost(function.name.clone()))?;
            return host(&mut self.memory, &args)
                .map_err(|message| EvalError::Host { name: function.name.clone(), message });
        }

        if self.depth >= self.max_depth {
            return Err(EvalError::StackOverflow(self.max_depth));
        }
        self.depth += 1;
        let top = self.memory.top();
        let result = self.run(function, &args);
        self.memory.release(top);
        self.depth -= 1;
        result
    }

    fn tick(&mut self) -> Result<(), EvalError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(EvalError::StepLimit(self.max_steps));
        }
        Ok(())
    }

    fn run(&mut self, function: &'m Function, args: &[RtValue]) -> Result<Option<RtValue>, EvalError> {
        let mut frame = Frame { regs: vec![None; function.reg_count as usize], args };
        let mut block = 0usize;
        loop {
            let current = function.blocks.get(block).ok_or_else(|| {
                EvalError::TypeMismatch(format!("'{}' has no block bb{block}", function.name))
            })?;
            for inst in &current.insts {
                self.tick()?;
                self.step(inst, &mut frame)?;
            }
            self.tick()?;
            match &current.terminator {
                None => {
                    return Err(EvalError::Unterminated {
                        function: function.name.clone(),
                        block: block as u32,
                    })
                }
                Some(Terminator::Ret(None)) => return Ok(None),
                Some(Terminator::Ret(Some(value))) => return Ok(Some(self.operand(value, &frame)?)),
                Some(Terminator::Br(target)) => block = target.0 as usize,
                Some(Terminator::CondBr { cond, then_block, else_block }) => {
                    let taken = self.int(cond, &frame)?.1 != 0;
                    block = if taken { then_block.0 as usize } else { else_block.0 as usize };
                }
            }
        }
    }

    fn operand(&self, operand: &Operand, frame: &Frame<'_>) -> Result<RtValue, EvalError> {
        match operand {
            Operand::Reg(reg) => frame.regs[reg.0 as usize]
                .clone()
                .ok_or_else(|| EvalError::TypeMismatch(format!("%{} read before it is set", reg.0))),
            Operand::Param(index) => frame.args.get(*index as usize).cloned().ok_or_else(|| {
                EvalError::TypeMismatch(format!("no argument {index}"))
            }),
            Operand::Int { bits, value } => Ok(RtValue::int(*bits, *value)),
            Operand::Global(global) => Ok(RtValue::Ptr(self.globals[global.0 as usize])),
        }
    }

    /// Width and raw bits of an integer operand.
    fn int(&self, operand: &Operand, frame: &Frame<'_>) -> Result<(u32, u64), EvalError> {
        match self.operand(operand, frame)? {
            RtValue::Int { bits, raw } => Ok((bits, raw)),
            other => Err(EvalError::TypeMismatch(format!("expected an integer, found {other:?}"))),
        }
    }

    fn float(&self, operand: &Operand, frame: &Frame<'_>) -> Result<f32, EvalError> {
        self.operand(operand, frame)?
            .as_f32()
            .ok_or_else(|| EvalError::TypeMismatch("expected a float".to_string()))
    }

    fn pointer(&self, operand: &Operand, frame: &Frame<'_>) -> Result<u64, EvalError> {
        self.operand(operand, frame)?
            .as_ptr()
            .ok_or_else(|| EvalError::TypeMismatch("expected a pointer".to_string()))
    }

    fn load(&self, ty: &IrType, address: u64) -> Result<RtValue, EvalError> {
        let size = self.module.size_of(ty);
        let bytes = self.memory.read(address, size)?;
        let mut word = [0u8; 8];
        Ok(match ty {
            IrType::Int(bits) => {
                word[..bytes.len()].copy_from_slice(bytes);
                RtValue::Int { bits: *bits, raw: mask(u64::from_le_bytes(word), *bits) }
            }
            IrType::Float => {
                let mut four = [0u8; 4];
                four.copy_from_slice(bytes);
                RtValue::Float(f32::from_le_bytes(four))
            }
            IrType::Ptr => {
                word.copy_from_slice(bytes);
                RtValue::Ptr(u64::from_le_bytes(word))
            }
            IrType::Array(..) | IrType::Struct(_) => RtValue::Aggregate(bytes.to_vec()),
            IrType::Void => return Err(EvalError::TypeMismatch("load of void".to_string())),
        })
    }

    fn step(&mut self, inst: &Inst, frame: &mut Frame<'_>) -> Result<(), EvalError> {
        let (dst, value) = match inst {
            Inst::Alloca { dst, ty, .. } => {
                let address = self.memory.allocate(self.module.size_of(ty))?;
                (*dst, RtValue::Ptr(address))
            }
            Inst::Load { dst, ty, ptr } => {
                let address = self.pointer(ptr, frame)?;
                (*dst, self.load(ty, address)?)
            }
            Inst::Store { value, ptr } => {
                let value = self.operand(value, frame)?;
                let address = self.pointer(ptr, frame)?;
                return self.memory.write(address, &value.encode());
            }
            Inst::Gep { dst, ty, ptr, indices } => {
                let base = self.pointer(ptr, frame)?;
                let offset = self.gep_offset(ty, indices, frame)?;
                (*dst, RtValue::Ptr(base.wrapping_add_signed(offset)))
            }
            Inst::IntArith { dst, op, lhs, rhs } => {
                let (bits, a) = self.int(lhs, frame)?;
                let (_, b) = self.int(rhs, frame)?;
                let (a, b) = (sign_extend(a, bits), sign_extend(b, bits));
                let result = match op {
                    ArithOp::Add => a.wrapping_add(b),
                    ArithOp::Sub => a.wrapping_sub(b),
                    ArithOp::Mul => a.wrapping_mul(b),
                    ArithOp::Div if b == 0 => return Err(EvalError::DivisionByZero),
                    ArithOp::Div => a.wrapping_div(b),
                };
                (*dst, RtValue::int(bits, result))
            }
            Inst::FloatArith { dst, op, lhs, rhs } => {
                let (a, b) = (self.float(lhs, frame)?, self.float(rhs, frame)?);
                let result = match op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => a / b,
                };
                (*dst, RtValue::Float(result))
            }
            Inst::ICmp { dst, pred, lhs, rhs } => {
                let (bits, a) = self.int(lhs, frame)?;
                let (_, b) = self.int(rhs, frame)?;
                let (a, b) = (sign_extend(a, bits), sign_extend(b, bits));
                let result = match pred {
                    IntPredicate::Eq => a == b,
                    IntPredicate::Ne => a != b,
                    IntPredicate::Sgt => a > b,
                    IntPredicate::Sge => a >= b,
                    IntPredicate::Slt => a < b,
                    IntPredicate::Sle => a <= b,
                };
                (*dst, RtValue::bool(result))
            }
            Inst::FCmp { dst, pred, lhs, rhs } => {
                let (a, b) = (self.float(lhs, frame)?, self.float(rhs, frame)?);
                let ordered = !a.is_nan() && !b.is_nan();
                let result = ordered
                    && match pred {
                        FloatPredicate::Oeq => a == b,
                        FloatPredicate::One => a != b,
                        FloatPredicate::Ogt => a > b,
                        FloatPredicate::Oge => a >= b,
                        FloatPredicate::Olt => a < b,
                        FloatPredicate::Ole => a <= b,
                    };
                (*dst, RtValue::bool(result))
            }
            Inst::Cast { dst, op, value, to } => (*dst, self.cast(*op, value, to, frame)?),
            Inst::Call { dst, callee, args } => {
                let values = args
                    .iter()
                    .map(|arg| self.operand(arg, frame))
                    .collect::<Result<Vec<_>, _>>()?;
                let result = self.invoke(*callee, values)?;
                match (dst, result) {
                    (None, _) => return Ok(()),
                    (Some(dst), Some(result)) => (*dst, result),
                    (Some(_), None) => {
                        let name = &self.module.function(*callee).name;
                        return Err(EvalError::TypeMismatch(format!("'{name}' returned no value")));
                    }
                }
            }
        };
        frame.regs[dst.0 as usize] = Some(value);
        Ok(())
    }

    fn gep_offset(&self, ty: &IrType, indices: &[Operand], frame: &Frame<'_>) -> Result<i64, EvalError> {
        let mut indices = indices.iter();
        let first = match indices.next() {
            Some(index) => self.index(index, frame)?,
            None => return Ok(0),
        };
        let mut offset = first.wrapping_mul(self.module.size_of(ty) as i64);
        let mut current = ty;
        for index in indices {
            let index = self.index(index, frame)?;
            match current {
                IrType::Struct(id) => {
                    let (field_offset, field) = usize::try_from(index)
                        .ok()
                        .and_then(|i| self.module.field(*id, i))
                        .ok_or_else(|| EvalError::TypeMismatch(format!("no field {index}")))?;
                    offset += field_offset as i64;
                    current = field;
                }
                IrType::Array(element, _) => {
                    offset += index.wrapping_mul(self.module.size_of(element) as i64);
                    current = element;
                }
                other => {
                    return Err(EvalError::TypeMismatch(format!("cannot index into {other:?}")));
                }
            }
        }
        Ok(offset)
    }

    fn index(&self, operand: &Operand, frame: &Frame<'_>) -> Result<i64, EvalError> {
        let (bits, raw) = self.int(operand, frame)?;
        Ok(sign_extend(raw, bits))
    }

    fn cast(&self, op: CastOp, value: &Operand, to: &IrType, frame: &Frame<'_>) -> Result<RtValue, EvalError> {
        let target_bits = || match to {
            IrType::Int(bits) => Ok(*bits),
            other => Err(EvalError::TypeMismatch(format!("cannot {} to {other:?}", op.mnemonic()))),
        };
        Ok(match op {
            CastOp::SExt => {
                let (bits, raw) = self.int(value, frame)?;
                RtValue::int(target_bits()?, sign_extend(raw, bits))
            }
            CastOp::ZExt => {
                let (_, raw) = self.int(value, frame)?;
                RtValue::Int { bits: target_bits()?, raw }
            }
            CastOp::Trunc => {
                let (_, raw) = self.int(value, frame)?;
                let bits = target_bits()?;
                RtValue::Int { bits, raw: mask(raw, bits) }
            }
            CastOp::SIToFP => {
                let (bits, raw) = self.int(value, frame)?;
                RtValue::Float(sign_extend(raw, bits) as f32)
            }
            CastOp::UIToFP => {
                let (_, raw) = self.int(value, frame)?;
                RtValue::Float(raw as f32)
            }
            CastOp::FPToSI => {
                let value = self.float(value, frame)?;
                RtValue::int(target_bits()?, value as i64)
            }
        })
    }
}

struct Frame<'a> {
    regs: Vec<Option<RtValue>>,
    args: &'a [RtValue],
}
