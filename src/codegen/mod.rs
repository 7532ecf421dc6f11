//! Lowering from the syntax tree to a backend
//!
//! - [`backend`]: the [`Backend`] trait lowering is written against
//! - [`type_cache`]: projection of [`Type`](crate::types::Type) into backend types
//! - [`lower`]: functions, storage allocation and statements
//! - `expressions`: typing and lowering of expressions and postfix chains
//! - [`errors`]: [`LowerError`]

pub mod backend;
pub mod errors;
mod expressions;
pub mod lower;
pub mod type_cache;

pub use backend::{ArithOp, Backend, CastOp, FloatPredicate, IntPredicate};
pub use errors::LowerError;
pub use lower::{lower, Lowering};
pub use type_cache::TypeCache;
