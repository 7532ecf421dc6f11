//! Name resolution
//!
//! - [`symbol_table`]: the per-function scope trie and the function table

pub mod symbol_table;

pub use symbol_table::{FunctionEntry, Symbol, SymbolError, SymbolTable, TrieTree};
