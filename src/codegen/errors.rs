//! Semantic errors found while lowering
//!
//! Each [`LowerError`] names the node it was found at. Lowering reports it
//! with that node's position and carries on with the next statement, so a
//! single run surfaces every independent error.

use thiserror::Error;

use crate::parser::ast::NodeId;
use crate::sema::SymbolError;
use crate::types::TypeRef;

#[derive(Debug, Clone, Error)]
pub enum LowerError {
    /// Name resolution failed
    #[error("{source}")]
    Symbol {
        node: NodeId,
        #[source]
        source: SymbolError,
    },

    #[error("invalid type: cannot assign {value} to {target}")]
    InvalidAssignment {
        node: NodeId,
        target: TypeRef,
        value: TypeRef,
    },

    #[error("type mismatch: '{name}' is declared as {declared} but initialized with {init}")]
    DeclarationMismatch {
        node: NodeId,
        name: String,
        declared: TypeRef,
        init: TypeRef,
    },

    #[error("number of argument mismatch: '{name}' takes {expected} but {found} were given")]
    ArgumentCount {
        node: NodeId,
        name: String,
        expected: usize,
        found: usize,
    },

    /// `index` counts from 1
    #[error("type mismatch: argument {index} of '{name}' expects {expected}, found {found}")]
    ArgumentType {
        node: NodeId,
        name: String,
        index: usize,
        expected: TypeRef,
        found: TypeRef,
    },

    #[error("cannot perform a cast from {from} to {to}")]
    InvalidCast {
        node: NodeId,
        from: TypeRef,
        to: TypeRef,
    },

    #[error("type mismatch: function returns {expected}, found {found}")]
    ReturnMismatch {
        node: NodeId,
        expected: TypeRef,
        found: TypeRef,
    },

    #[error("missing return value in function returning {expected}")]
    MissingReturnValue { node: NodeId, expected: TypeRef },

    #[error("invalid operands to '{op}': {lhs} and {rhs}")]
    InvalidOperands {
        node: NodeId,
        op: &'static str,
        lhs: TypeRef,
        rhs: TypeRef,
    },

    #[error("condition must be an integer, found {found}")]
    InvalidCondition { node: NodeId, found: TypeRef },

    #[error("member access on non-struct type {found}")]
    NotAStruct { node: NodeId, found: TypeRef },

    #[error("struct '{name}' has no member '{member}'")]
    NoSuchMember {
        node: NodeId,
        name: String,
        member: String,
    },

    #[error("cannot index into type {found}")]
    NotIndexable { node: NodeId, found: TypeRef },

    #[error("array index must be an integer, found {found}")]
    NonIntegerIndex { node: NodeId, found: TypeRef },

    #[error("cannot dereference non-pointer type {found}")]
    NotAPointer { node: NodeId, found: TypeRef },

    #[error("cannot dereference a void pointer")]
    VoidDereference { node: NodeId },

    #[error("variable '{name}' cannot have type void")]
    VoidVariable { node: NodeId, name: String },

    /// A call to a void function used where a value is needed
    #[error("function '{name}' does not return a value")]
    VoidValue { node: NodeId, name: String },
}

impl LowerError {
    pub fn node(&self) -> NodeId {
        match self {
            LowerError::Symbol { node, .. }
            | LowerError::InvalidAssignment { node, .. }
            | LowerError::DeclarationMismatch { node, .. }
            | LowerError::ArgumentCount { node, .. }
            | LowerError::ArgumentType { node, .. }
            | LowerError::InvalidCast { node, .. }
            | LowerError::ReturnMismatch { node, .. }
            | LowerError::MissingReturnValue { node, .. }
            | LowerError::InvalidOperands { node, .. }
            | LowerError::InvalidCondition { node, .. }
            | LowerError::NotAStruct { node, .. }
            | LowerError::NoSuchMember { node, .. }
            | LowerError::NotIndexable { node, .. }
            | LowerError::NonIntegerIndex { node, .. }
            | LowerError::NotAPointer { node, .. }
            | LowerError::VoidDereference { node }
            | LowerError::VoidVariable { node, .. }
            | LowerError::VoidValue { node, .. } => *node,
        }
    }
}
