//! vcc source parser
//!
//! This module turns source text into an arena-backed syntax tree:
//! - [`stream`]: position-tracked byte stream with seek support
//! - [`lexer`]: the lazy [`Tokenizer`](lexer::Tokenizer) and token kinds
//! - [`ast`]: node arena, node variants and tree queries
//! - [`parse`]: the [`Parser`] and its productions (split across
//!   `declarations`, `statements` and `expressions`)
//!
//! # Parser Implementation
//!
//! Hand-written recursive descent with precedence climbing for binary
//! operators. Struct definitions are collected into a registry while parsing,
//! so a struct must be defined before it is used.

pub mod ast;
mod declarations;
mod expressions;
pub mod lexer;
pub mod parse;
mod statements;
pub mod stream;

pub use parse::{CompilationUnit, ParseError, Parser, StructRegistry};
