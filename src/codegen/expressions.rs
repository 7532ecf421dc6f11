//! Expression typing and lowering
//!
//! Typing is a pure walk over the tree ([`Lowering::expr_type`]) and runs
//! before anything is emitted for an expression, so a mistyped statement
//! leaves no half-built instructions behind.
//!
//! # Postfix chains
//!
//! For every link of a chain there are two types:
//! - the *container*: the storage the link indexes into (the symbol's type
//!   for a root, the previous link's element type otherwise, the operand's
//!   type for `deref`)
//! - the *element*: what the link itself addresses
//!
//! The chain's type is the element type of its last link. Addresses are
//! built the same way, link by link from the root.

use std::rc::Rc;

use super::backend::{ArithOp, Backend, CastOp, FloatPredicate, IntPredicate};
use super::errors::LowerError;
use super::lower::{signature, Lowering};
use crate::parser::ast::{BinaryOp, Locator, NodeId, NodeKind, PostfixBase};
use crate::sema::Symbol;
use crate::types::{BuiltinKind, Element, Type, TypeRef};

impl<B: Backend> Lowering<'_, B> {
    pub(super) fn lookup(&self, at: NodeId, name: &str) -> Result<&Symbol<B::Value>, LowerError> {
        self.symbols
            .lookup(self.ast, at, name)
            .map_err(|source| LowerError::Symbol { node: at, source })
    }

    fn callee(&self, at: NodeId, name: &str) -> Result<(NodeId, B::Function), LowerError> {
        let entry = self
            .symbols
            .function(name)
            .map_err(|source| LowerError::Symbol { node: at, source })?;
        Ok((entry.decl, entry.handle.clone()))
    }

    pub(super) fn expr_type(&self, id: NodeId) -> Result<TypeRef, LowerError> {
        let ast = self.ast;
        match ast.kind(id) {
            NodeKind::Constant { .. } => Ok(Type::int()),
            NodeKind::StringLiteral { .. } => Ok(Type::pointer(Type::builtin(BuiltinKind::Char))),
            NodeKind::Ref { expr } => Ok(Type::pointer(self.expr_type(expr.id())?)),
            NodeKind::Cast { ty, .. } => Ok(Rc::clone(ty)),
            NodeKind::Identifier { name } => Ok(Rc::clone(&self.lookup(id, name)?.ty)),
            NodeKind::Call { name, .. } => {
                let (decl, _) = self.callee(id, name)?;
                Ok(Rc::clone(signature(ast, decl).1))
            }
            NodeKind::Binary { op, lhs, rhs } => self.binary_type(id, *op, *lhs, *rhs),
            NodeKind::MemberAccess { .. } | NodeKind::ArrayAccess { .. } | NodeKind::DeRef { .. } => {
                self.chain_type(id)
            }
            other => unreachable!("{:?} is not an expression", other.code()),
        }
    }

    /// Comparisons give `bool`. Otherwise a float operand makes the result
    /// float, and two integers give the wider of the two (the right one on a
    /// tie).
    fn binary_type(
        &self,
        id: NodeId,
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    ) -> Result<TypeRef, LowerError> {
        let lt = self.expr_type(lhs)?;
        let rt = self.expr_type(rhs)?;
        let (Some(lk), Some(rk)) = (lt.as_builtin(), rt.as_builtin()) else {
            return Err(LowerError::InvalidOperands { node: id, op: op.symbol(), lhs: lt, rhs: rt });
        };
        if op.is_comparison() {
            return Ok(Type::bool());
        }
        if lk == BuiltinKind::Float || rk == BuiltinKind::Float {
            return Ok(Type::builtin(BuiltinKind::Float));
        }
        Ok(if lk.bit_size() > rk.bit_size() { lt } else { rt })
    }

    fn postfix_child(&self, id: NodeId) -> Option<NodeId> {
        match self.ast.kind(id) {
            NodeKind::MemberAccess { child, .. }
            | NodeKind::ArrayAccess { child, .. }
            | NodeKind::DeRef { child, .. } => *child,
            _ => None,
        }
    }

    fn chain_type(&self, id: NodeId) -> Result<TypeRef, LowerError> {
        match self.postfix_child(id) {
            Some(child) => self.chain_type(child),
            None => self.element_type(id),
        }
    }

    fn container_type(&self, id: NodeId) -> Result<TypeRef, LowerError> {
        match self.ast.kind(id) {
            NodeKind::MemberAccess { base, .. } | NodeKind::ArrayAccess { base, .. } => match base {
                PostfixBase::Name(name) => Ok(Rc::clone(&self.lookup(id, name)?.ty)),
                PostfixBase::Parent(parent) => self.element_type(parent.id()),
            },
            NodeKind::DeRef { expr, .. } => self.expr_type(*expr),
            other => unreachable!("{:?} is not a postfix link", other.code()),
        }
    }

    fn element_type(&self, id: NodeId) -> Result<TypeRef, LowerError> {
        let container = self.container_type(id)?;
        let element = match self.ast.kind(id) {
            NodeKind::MemberAccess { member, .. } => {
                return Ok(Rc::clone(&member_of(id, &container, member)?.ty));
            }
            NodeKind::ArrayAccess { .. } => container
                .array_base()
                .or_else(|| container.pointee())
                .cloned()
                .ok_or_else(|| LowerError::NotIndexable { node: id, found: Rc::clone(&container) })?,
            NodeKind::DeRef { .. } => container
                .pointee()
                .cloned()
                .ok_or_else(|| LowerError::NotAPointer { node: id, found: Rc::clone(&container) })?,
            other => unreachable!("{:?} is not a postfix link", other.code()),
        };
        if element.is_void() {
            return Err(LowerError::VoidDereference { node: id });
        }
        Ok(element)
    }

    pub(super) fn lower_value(&mut self, id: NodeId) -> Result<B::Value, LowerError> {
        let ast = self.ast;
        match ast.kind(id) {
            NodeKind::Constant { value } => Ok(self.backend.const_int(32, *value)),
            NodeKind::StringLiteral { value } => Ok(self.backend.global_string(value)),
            NodeKind::Ref { expr } => self.lower_ref(*expr),
            NodeKind::Cast { ty, expr } => self.lower_cast(id, ty, *expr),
            NodeKind::Binary { op, lhs, rhs } => self.lower_binary(id, *op, *lhs, *rhs),
            NodeKind::Call { name, .. } => self
                .lower_call(id)?
                .ok_or_else(|| LowerError::VoidValue { node: id, name: name.clone() }),
            NodeKind::Identifier { .. }
            | NodeKind::MemberAccess { .. }
            | NodeKind::ArrayAccess { .. }
            | NodeKind::DeRef { .. } => {
                let ty = self.expr_type(id)?;
                let ptr = self.lower_ref(Locator::of(id))?;
                let ty = self.backend_type(&ty);
                Ok(self.backend.load(&ty, &ptr))
            }
            other => unreachable!("{:?} is not an expression", other.code()),
        }
    }

    /// Address of the storage `target` names.
    pub(super) fn lower_ref(&mut self, target: Locator) -> Result<B::Value, LowerError> {
        let id = target.id();
        if let NodeKind::Identifier { name } = self.ast.kind(id) {
            return Ok(self.lookup(id, name)?.value.clone());
        }
        match self.postfix_child(id) {
            Some(child) => self.lower_ref(Locator::of(child)),
            None => self.link_address(id),
        }
    }

    fn link_address(&mut self, id: NodeId) -> Result<B::Value, LowerError> {
        let ast = self.ast;
        match ast.kind(id) {
            NodeKind::DeRef { expr, .. } => {
                self.element_type(id)?;
                self.lower_value(*expr)
            }
            NodeKind::MemberAccess { base, member, .. } => {
                let container = self.container_type(id)?;
                let field = member_of(id, &container, member)?.field_num;
                let base = self.base_address(id, base)?;
                let ty = self.backend_type(&container);
                let zero = self.backend.const_int(32, 0);
                let field = self.backend.const_int(32, field as i64);
                Ok(self.backend.gep(&ty, &base, &[zero, field]))
            }
            NodeKind::ArrayAccess { base, index, .. } => {
                let container = self.container_type(id)?;
                let element = self.element_type(id)?;
                let index_ty = self.expr_type(*index)?;
                if !index_ty.is_integer_kind() {
                    return Err(LowerError::NonIntegerIndex { node: *index, found: index_ty });
                }
                let base = self.base_address(id, base)?;
                let index = self.lower_value(*index)?;
                if container.is_array() {
                    let ty = self.backend_type(&container);
                    let zero = self.backend.const_int(32, 0);
                    Ok(self.backend.gep(&ty, &base, &[zero, index]))
                } else {
                    // Indexing through a pointer: load it, then step over elements.
                    let ptr_ty = self.backend.pointer_type();
                    let pointer = self.backend.load(&ptr_ty, &base);
                    let ty = self.backend_type(&element);
                    Ok(self.backend.gep(&ty, &pointer, &[index]))
                }
            }
            other => unreachable!("{:?} is not a postfix link", other.code()),
        }
    }

    fn base_address(&mut self, id: NodeId, base: &PostfixBase) -> Result<B::Value, LowerError> {
        match base {
            PostfixBase::Name(name) => Ok(self.lookup(id, name)?.value.clone()),
            PostfixBase::Parent(parent) => self.link_address(parent.id()),
        }
    }

    fn lower_cast(&mut self, id: NodeId, to: &TypeRef, expr: NodeId) -> Result<B::Value, LowerError> {
        let from = self.expr_type(expr)?;
        let op = match (from.as_builtin(), to.as_builtin()) {
            _ if from.is_same(to) => None,
            (Some(f), Some(t)) => Some(builtin_cast(f, t)),
            _ if from.is_pointer() && to.is_pointer() && (from.is_void_ptr() || to.is_void_ptr()) => None,
            _ => return Err(LowerError::InvalidCast { node: id, from, to: Rc::clone(to) }),
        };
        let value = self.lower_value(expr)?;
        match op {
            None => Ok(value),
            Some(op) => {
                let ty = self.backend_type(to);
                Ok(self.backend.cast(op, &value, &ty))
            }
        }
    }

    fn lower_binary(
        &mut self,
        id: NodeId,
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    ) -> Result<B::Value, LowerError> {
        self.binary_type(id, op, lhs, rhs)?;
        let lt = self.expr_type(lhs)?;
        let rt = self.expr_type(rhs)?;
        let l = self.lower_value(lhs)?;
        let r = self.lower_value(rhs)?;

        if lt.is_float() || rt.is_float() {
            let l = self.to_float(l, &lt);
            let r = self.to_float(r, &rt);
            return Ok(match float_predicate(op) {
                Some(pred) => self.backend.fcmp(pred, &l, &r),
                None => self.backend.float_arith(arith_op(op), &l, &r),
            });
        }

        let width = lt.bit_size().max(rt.bit_size()).unwrap_or(32);
        let l = self.widen(l, &lt, width);
        let r = self.widen(r, &rt, width);
        Ok(match int_predicate(op) {
            Some(pred) => self.backend.icmp(pred, &l, &r),
            None => self.backend.int_arith(arith_op(op), &l, &r),
        })
    }

    fn to_float(&mut self, value: B::Value, ty: &Type) -> B::Value {
        if ty.is_float() {
            return value;
        }
        let op = if ty.bit_size() == Some(1) { CastOp::UIToFP } else { CastOp::SIToFP };
        let float = self.backend.float_type();
        self.backend.cast(op, &value, &float)
    }

    /// Extend an integer to `width` bits; booleans are zero-extended.
    fn widen(&mut self, value: B::Value, ty: &Type, width: u32) -> B::Value {
        let bits = ty.bit_size().unwrap_or(width);
        if bits >= width {
            return value;
        }
        let op = if bits == 1 { CastOp::ZExt } else { CastOp::SExt };
        let wide = self.backend.int_type(width);
        self.backend.cast(op, &value, &wide)
    }

    /// Checks the argument count, then each argument's type, then emits the
    /// call. `None` when the callee returns void.
    pub(super) fn lower_call(&mut self, id: NodeId) -> Result<Option<B::Value>, LowerError> {
        let ast = self.ast;
        let NodeKind::Call { name, args } = ast.kind(id) else {
            unreachable!("{id:?} is not a call");
        };
        let (decl, handle) = self.callee(id, name)?;
        let (params, _) = signature(ast, decl);
        if args.len() != params.len() {
            return Err(LowerError::ArgumentCount {
                node: id,
                name: name.clone(),
                expected: params.len(),
                found: args.len(),
            });
        }
        for (index, (&arg, param)) in args.iter().zip(params).enumerate() {
            let found = self.expr_type(arg)?;
            if !found.is_same(&param.ty) {
                return Err(LowerError::ArgumentType {
                    node: arg,
                    name: name.clone(),
                    index: index + 1,
                    expected: Rc::clone(&param.ty),
                    found,
                });
            }
        }
        let values = args
            .iter()
            .map(|&arg| self.lower_value(arg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.backend.call(&handle, &values))
    }
}

fn member_of<'t>(id: NodeId, container: &'t TypeRef, member: &str) -> Result<&'t Element, LowerError> {
    let st = container
        .as_struct()
        .ok_or_else(|| LowerError::NotAStruct { node: id, found: Rc::clone(container) })?;
    st.element(member).ok_or_else(|| LowerError::NoSuchMember {
        node: id,
        name: st.name.clone(),
        member: member.to_string(),
    })
}

/// Conversion between two distinct builtin types.
fn builtin_cast(from: BuiltinKind, to: BuiltinKind) -> CastOp {
    match (from.is_integer_kind(), to.is_integer_kind()) {
        (true, false) if from == BuiltinKind::Bool => CastOp::UIToFP,
        (true, false) => CastOp::SIToFP,
        (false, _) => CastOp::FPToSI,
        _ if from == BuiltinKind::Bool => CastOp::ZExt,
        _ if from.bit_size() > to.bit_size() => CastOp::Trunc,
        _ => CastOp::SExt,
    }
}

fn arith_op(op: BinaryOp) -> ArithOp {
    match op {
        BinaryOp::Add => ArithOp::Add,
        BinaryOp::Subtract => ArithOp::Sub,
        BinaryOp::Multiply => ArithOp::Mul,
        BinaryOp::Divide => ArithOp::Div,
        other => unreachable!("'{}' is a comparison", other.symbol()),
    }
}

fn int_predicate(op: BinaryOp) -> Option<IntPredicate> {
    Some(match op {
        BinaryOp::Equal => IntPredicate::Eq,
        BinaryOp::NotEqual => IntPredicate::Ne,
        BinaryOp::GreaterThan => IntPredicate::Sgt,
        BinaryOp::GreaterEqual => IntPredicate::Sge,
        BinaryOp::LessThan => IntPredicate::Slt,
        BinaryOp::LessEqual => IntPredicate::Sle,
        _ => return None,
    })
}

fn float_predicate(op: BinaryOp) -> Option<FloatPredicate> {
    Some(match op {
        BinaryOp::Equal => FloatPredicate::Oeq,
        BinaryOp::NotEqual => FloatPredicate::One,
        BinaryOp::GreaterThan => FloatPredicate::Ogt,
        BinaryOp::GreaterEqual => FloatPredicate::Oge,
        BinaryOp::LessThan => FloatPredicate::Olt,
        BinaryOp::LessEqual => FloatPredicate::Ole,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_casts() {
        use BuiltinKind::*;
        assert_eq!(builtin_cast(Bool, Int), CastOp::ZExt);
        assert_eq!(builtin_cast(Bool, Float), CastOp::UIToFP);
        assert_eq!(builtin_cast(Long, Short), CastOp::Trunc);
        assert_eq!(builtin_cast(Char, Long), CastOp::SExt);
        assert_eq!(builtin_cast(Int, Float), CastOp::SIToFP);
        assert_eq!(builtin_cast(Float, Char), CastOp::FPToSI);
    }

    #[test]
    fn test_operator_mapping() {
        assert_eq!(arith_op(BinaryOp::Divide), ArithOp::Div);
        assert_eq!(int_predicate(BinaryOp::LessEqual), Some(IntPredicate::Sle));
        assert_eq!(int_predicate(BinaryOp::Add), None);
        assert_eq!(float_predicate(BinaryOp::NotEqual), Some(FloatPredicate::One));
    }
}
