//! Function and statement lowering
//!
//! Functions are lowered in source order. Each one is declared with the
//! backend and entered in the function table before its body is lowered, so
//! a function can call itself and anything defined above it.
//!
//! Every local of a function gets its storage in the entry block: arguments
//! first, then each declaration found anywhere in the body, in source order.
//! The symbol table is filled in the same pass, which leaves statement
//! lowering with nothing to allocate.
//!
//! A statement that fails is reported and skipped; lowering continues with
//! the next statement.

use std::rc::Rc;

use super::backend::{Backend, IntPredicate};
use super::errors::LowerError;
use super::type_cache::TypeCache;
use crate::diagnostics::Diagnostics;
use crate::parser::ast::{Ast, NodeId, NodeKind, Parameter, TreeCode};
use crate::parser::stream::SourceStream;
use crate::parser::CompilationUnit;
use crate::sema::{SymbolError, SymbolTable};
use crate::types::{Type, TypeRef};

/// Lower every function of `unit` into `backend`, reporting semantic errors
/// to the unit's diagnostics.
pub fn lower<B: Backend>(unit: &mut CompilationUnit, backend: &mut B) {
    let CompilationUnit { ast, functions, diagnostics, source, .. } = unit;
    let mut lowering = Lowering::new(ast, source, backend, diagnostics);
    for &function in functions.iter() {
        lowering.lower_function(function);
    }
}

pub struct Lowering<'a, B: Backend> {
    pub(super) ast: &'a Ast,
    source: &'a SourceStream,
    pub(super) backend: &'a mut B,
    diagnostics: &'a mut Diagnostics,
    pub(super) symbols: SymbolTable<B::Value, B::Function>,
    types: TypeCache<B::Type>,
    current: Option<B::Function>,
}

impl<'a, B: Backend> Lowering<'a, B> {
    pub fn new(
        ast: &'a Ast,
        source: &'a SourceStream,
        backend: &'a mut B,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            ast,
            source,
            backend,
            diagnostics,
            symbols: SymbolTable::new(),
            types: TypeCache::new(),
            current: None,
        }
    }

    pub fn lower_function(&mut self, id: NodeId) {
        let ast = self.ast;
        let NodeKind::FunctionDecl { name, return_type, args, body, is_extern } = ast.kind(id)
        else {
            panic!("{id:?} is not a function declaration");
        };
        let _span = tracing::debug_span!("lower_function", %name).entered();

        if self.symbols.function(name).is_ok() {
            let source = SymbolError::DuplicateFunction { name: name.clone() };
            self.report(LowerError::Symbol { node: id, source });
            return;
        }
        let (params, _) = signature(ast, id);
        if let Some(param) = params.iter().find(|p| p.ty.is_void()) {
            self.report(LowerError::VoidVariable { node: *args, name: param.name.clone() });
            return;
        }

        let param_types: Vec<B::Type> = params.iter().map(|p| self.backend_type(&p.ty)).collect();
        let ret = self.backend_type(return_type);
        let handle = self.backend.declare_function(name, &param_types, ret, *is_extern);
        if let Err(source) = self.symbols.add_function(name, id, handle.clone()) {
            self.report(LowerError::Symbol { node: id, source });
            return;
        }
        if *is_extern {
            return;
        }

        let entry = self.backend.append_block(&handle);
        self.backend.position_at_end(entry);
        self.current = Some(handle.clone());

        self.lower_arguments(*args, params, &handle);
        self.allocate_declarations(id);
        self.lower_block(body);
        if return_type.is_void() && !ends_with_return(ast, body) {
            self.backend.ret(None);
        }
        self.current = None;
    }

    fn lower_arguments(&mut self, args: NodeId, params: &[Parameter], function: &B::Function) {
        let ast = self.ast;
        for (index, param) in params.iter().enumerate() {
            let ty = self.backend_type(&param.ty);
            let slot = self.backend.alloca(&ty, &param.name);
            let incoming = self.backend.param(function, index);
            self.backend.store(&incoming, &slot);
            if let Err(source) = self.symbols.insert(ast, args, &param.name, Rc::clone(&param.ty), slot) {
                self.report(LowerError::Symbol { node: args, source });
            }
        }
    }

    fn allocate_declarations(&mut self, function: NodeId) {
        let ast = self.ast;
        for decl in ast.declarations(function) {
            let NodeKind::Declaration { name, ty, .. } = ast.kind(decl) else {
                continue;
            };
            if ty.is_void() {
                self.report(LowerError::VoidVariable { node: decl, name: name.clone() });
                continue;
            }
            let lowered = self.backend_type(ty);
            let slot = self.backend.alloca(&lowered, name);
            if let Err(source) = self.symbols.insert(ast, decl, name, Rc::clone(ty), slot) {
                self.report(LowerError::Symbol { node: decl, source });
            }
        }
    }

    fn lower_block(&mut self, body: &[NodeId]) {
        for &statement in body {
            if let Err(error) = self.lower_statement(statement) {
                self.report(error);
            }
        }
    }

    fn lower_statement(&mut self, id: NodeId) -> Result<(), LowerError> {
        let ast = self.ast;
        match ast.kind(id) {
            NodeKind::Assignment { target, value } => {
                let target_ty = self.expr_type(target.id())?;
                let value_ty = self.expr_type(*value)?;
                if !target_ty.is_same(&value_ty) {
                    return Err(LowerError::InvalidAssignment {
                        node: id,
                        target: target_ty,
                        value: value_ty,
                    });
                }
                let value = self.lower_value(*value)?;
                let ptr = self.lower_ref(*target)?;
                self.backend.store(&value, &ptr);
                Ok(())
            }
            NodeKind::Return { value } => self.lower_return(id, *value),
            NodeKind::If { cond, body } => self.lower_if(*cond, body),
            NodeKind::While { cond, body } => self.lower_while(*cond, body),
            NodeKind::Declaration { name, ty, init } => {
                // Void declarations were already reported during allocation.
                let Some(init) = init else { return Ok(()) };
                if ty.is_void() {
                    return Ok(());
                }
                let init_ty = self.expr_type(*init)?;
                if !init_ty.is_same(ty) {
                    return Err(LowerError::DeclarationMismatch {
                        node: id,
                        name: name.clone(),
                        declared: Rc::clone(ty),
                        init: init_ty,
                    });
                }
                let value = self.lower_value(*init)?;
                let slot = self.lookup(id, name)?.value.clone();
                self.backend.store(&value, &slot);
                Ok(())
            }
            NodeKind::CallStatement { call } => self.lower_call(*call).map(|_| ()),
            other => unreachable!("{:?} is not a statement", other.code()),
        }
    }

    fn lower_return(&mut self, id: NodeId, value: Option<NodeId>) -> Result<(), LowerError> {
        let ast = self.ast;
        let function = ast
            .first_function_decl(id)
            .expect("return statement outside a function");
        let (_, expected) = signature(ast, function);
        match value {
            None if expected.is_void() => {
                self.backend.ret(None);
                Ok(())
            }
            None => Err(LowerError::MissingReturnValue { node: id, expected: Rc::clone(expected) }),
            Some(value) => {
                let found = self.expr_type(value)?;
                if !found.is_same(expected) {
                    return Err(LowerError::ReturnMismatch {
                        node: id,
                        expected: Rc::clone(expected),
                        found,
                    });
                }
                let value = self.lower_value(value)?;
                self.backend.ret(Some(&value));
                Ok(())
            }
        }
    }

    fn lower_if(&mut self, cond: NodeId, body: &[NodeId]) -> Result<(), LowerError> {
        let function = self.current_function();
        let cond = match self.lower_condition(cond) {
            Ok(cond) => cond,
            Err(error) => {
                self.lower_rejected_body(error, body);
                return Ok(());
            }
        };
        let then_block = self.backend.append_block(&function);
        let after = self.backend.append_block(&function);
        self.backend.cond_br(&cond, then_block, after);

        self.backend.position_at_end(then_block);
        self.lower_block(body);
        if !ends_with_return(self.ast, body) {
            self.backend.br(after);
        }
        self.backend.position_at_end(after);
        Ok(())
    }

    fn lower_while(&mut self, cond: NodeId, body: &[NodeId]) -> Result<(), LowerError> {
        let function = self.current_function();
        // Fail before any block is created.
        if let Err(error) = self.condition_type(cond) {
            self.lower_rejected_body(error, body);
            return Ok(());
        }
        let cond_block = self.backend.append_block(&function);
        let body_block = self.backend.append_block(&function);
        let after = self.backend.append_block(&function);
        self.backend.br(cond_block);

        self.backend.position_at_end(cond_block);
        let cond = self.lower_condition(cond)?;
        self.backend.cond_br(&cond, body_block, after);

        self.backend.position_at_end(body_block);
        self.lower_block(body);
        if !ends_with_return(self.ast, body) {
            self.backend.br(cond_block);
        }
        self.backend.position_at_end(after);
        Ok(())
    }

    /// Report a rejected condition and still check the body for its own
    /// errors.
    fn lower_rejected_body(&mut self, error: LowerError, body: &[NodeId]) {
        self.report(error);
        self.lower_block(body);
    }

    fn condition_type(&self, cond: NodeId) -> Result<u32, LowerError> {
        let ty = self.expr_type(cond)?;
        ty.bit_size()
            .ok_or(LowerError::InvalidCondition { node: cond, found: ty })
    }

    /// Compare the condition against zero.
    fn lower_condition(&mut self, cond: NodeId) -> Result<B::Value, LowerError> {
        let bits = self.condition_type(cond)?;
        let value = self.lower_value(cond)?;
        let zero = self.backend.const_int(bits, 0);
        Ok(self.backend.icmp(IntPredicate::Ne, &value, &zero))
    }

    fn current_function(&self) -> B::Function {
        self.current
            .clone()
            .expect("statement lowered outside a function body")
    }

    pub(super) fn backend_type(&mut self, ty: &Type) -> B::Type {
        self.types.lower(&mut *self.backend, ty)
    }

    fn report(&mut self, error: LowerError) {
        let pos = self.ast.pos(error.node());
        let line = self.source.get_line(pos.loc);
        self.diagnostics.report(pos, line, error.to_string());
    }
}

/// Parameters and return type of the function declared at `function`.
pub(super) fn signature(ast: &Ast, function: NodeId) -> (&[Parameter], &TypeRef) {
    let NodeKind::FunctionDecl { args, return_type, .. } = ast.kind(function) else {
        panic!("{function:?} is not a function declaration");
    };
    let NodeKind::FunctionArgList { params } = ast.kind(*args) else {
        panic!("{args:?} is not an argument list");
    };
    (params, return_type)
}

fn ends_with_return(ast: &Ast, body: &[NodeId]) -> bool {
    body.last().is_some_and(|&last| ast.code(last) == TreeCode::Return)
}
