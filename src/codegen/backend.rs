//! The interface lowering drives
//!
//! A [`Backend`] owns whatever module and builder state it needs; lowering
//! only sees opaque handles for types, values, functions and blocks. Pointers
//! are untyped at this level: loads, stores and element addressing always
//! say which type they operate on.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    /// Signed for integers.
    Div,
}

/// Signed integer comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Sgt,
    Sge,
    Slt,
    Sle,
}

/// Ordered float comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatPredicate {
    Oeq,
    One,
    Ogt,
    Oge,
    Olt,
    Ole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    SExt,
    ZExt,
    Trunc,
    SIToFP,
    UIToFP,
    FPToSI,
}

impl ArithOp {
    pub fn mnemonic(self, float: bool) -> &'static str {
        match (self, float) {
            (ArithOp::Add, false) => "add",
            (ArithOp::Sub, false) => "sub",
            (ArithOp::Mul, false) => "mul",
            (ArithOp::Div, false) => "sdiv",
            (ArithOp::Add, true) => "fadd",
            (ArithOp::Sub, true) => "fsub",
            (ArithOp::Mul, true) => "fmul",
            (ArithOp::Div, true) => "fdiv",
        }
    }
}

impl IntPredicate {
    pub fn mnemonic(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
        }
    }
}

impl FloatPredicate {
    pub fn mnemonic(self) -> &'static str {
        match self {
            FloatPredicate::Oeq => "oeq",
            FloatPredicate::One => "one",
            FloatPredicate::Ogt => "ogt",
            FloatPredicate::Oge => "oge",
            FloatPredicate::Olt => "olt",
            FloatPredicate::Ole => "ole",
        }
    }
}

impl CastOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CastOp::SExt => "sext",
            CastOp::ZExt => "zext",
            CastOp::Trunc => "trunc",
            CastOp::SIToFP => "sitofp",
            CastOp::UIToFP => "uitofp",
            CastOp::FPToSI => "fptosi",
        }
    }
}

pub trait Backend {
    type Type: Clone;
    type Value: Clone;
    type Function: Clone;
    type Block: Copy;

    fn int_type(&mut self, bits: u32) -> Self::Type;
    fn float_type(&mut self) -> Self::Type;
    fn void_type(&mut self) -> Self::Type;
    fn pointer_type(&mut self) -> Self::Type;
    fn array_type(&mut self, element: Self::Type, count: u64) -> Self::Type;
    /// Called once per struct name; see [`TypeCache`](super::TypeCache).
    fn struct_type(&mut self, name: &str, fields: &[Self::Type]) -> Self::Type;

    fn declare_function(
        &mut self,
        name: &str,
        params: &[Self::Type],
        ret: Self::Type,
        external: bool,
    ) -> Self::Function;
    fn param(&mut self, function: &Self::Function, index: usize) -> Self::Value;
    fn append_block(&mut self, function: &Self::Function) -> Self::Block;
    fn position_at_end(&mut self, block: Self::Block);

    fn alloca(&mut self, ty: &Self::Type, name: &str) -> Self::Value;
    fn load(&mut self, ty: &Self::Type, ptr: &Self::Value) -> Self::Value;
    fn store(&mut self, value: &Self::Value, ptr: &Self::Value);
    /// Address of an element inside `ty`-typed storage at `ptr`.
    fn gep(&mut self, ty: &Self::Type, ptr: &Self::Value, indices: &[Self::Value]) -> Self::Value;

    fn const_int(&mut self, bits: u32, value: i64) -> Self::Value;
    /// Pointer to a NUL-terminated copy of `value`.
    fn global_string(&mut self, value: &str) -> Self::Value;
    fn int_arith(&mut self, op: ArithOp, lhs: &Self::Value, rhs: &Self::Value) -> Self::Value;
    fn float_arith(&mut self, op: ArithOp, lhs: &Self::Value, rhs: &Self::Value) -> Self::Value;
    fn icmp(&mut self, pred: IntPredicate, lhs: &Self::Value, rhs: &Self::Value) -> Self::Value;
    fn fcmp(&mut self, pred: FloatPredicate, lhs: &Self::Value, rhs: &Self::Value) -> Self::Value;
    fn cast(&mut self, op: CastOp, value: &Self::Value, to: &Self::Type) -> Self::Value;
    /// `None` for functions returning void.
    fn call(&mut self, function: &Self::Function, args: &[Self::Value]) -> Option<Self::Value>;

    fn ret(&mut self, value: Option<&Self::Value>);
    fn br(&mut self, target: Self::Block);
    fn cond_br(&mut self, cond: &Self::Value, then_block: Self::Block, else_block: Self::Block);
}
