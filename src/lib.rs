//! # Introduction
//!
//! vcc is a compiler front-end for a small, statically typed, block
//! structured language. It parses source text into an arena syntax tree,
//! resolves names through a per-function scope trie, checks types, and
//! lowers the program through the [`codegen::Backend`] trait.
//!
//! ## Compilation pipeline
//!
//! ```text
//! Source → SourceStream → Tokenizer → Parser → Ast → Lowering → Backend
//!                                                       │
//!                                               SymbolTable, TypeCache
//! ```
//!
//! 1. [`parser`]: the position-tracked stream, the lazy tokenizer, the
//!    syntax tree arena and the recursive descent parser.
//! 2. [`types`]: the immutable type model and structural equality.
//! 3. [`sema`]: the scope trie symbol table and the function table.
//! 4. [`codegen`]: type checking and lowering against a [`codegen::Backend`].
//! 5. [`ir`]: the reference backend, which records a module that can be
//!    printed or evaluated.
//! 6. [`diagnostics`]: the error sink shared by parsing and lowering.
//!
//! ## Language at a glance
//!
//! ```text
//! struct Point { int x, int y }
//! external function putint gives void [int v];
//!
//! function main gives int [] {
//!   struct Point p;
//!   p.x = 2;
//!   while p.x lt 10 then
//!     p.x = p.x * 2;
//!   end
//!   putint(p.x);
//!   ret p.x;
//! }
//! ```

pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod ir;
pub mod parser;
pub mod sema;
pub mod types;

use diagnostics::Diagnostics;
use parser::{CompilationUnit, Parser};

/// A parsed unit together with the module lowered from it.
#[derive(Debug)]
pub struct Compilation {
    pub unit: CompilationUnit,
    pub module: ir::Module,
}

impl Compilation {
    pub fn have_error(&self) -> bool {
        self.unit.have_error()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.unit.diagnostics
    }
}

/// Parse and lower `source` into the reference backend, collecting
/// diagnostics silently.
pub fn compile(source: &str) -> Compilation {
    compile_unit(Parser::new(source).parse())
}

/// Lower an already parsed unit. A unit with syntax errors is not lowered.
pub fn compile_unit(mut unit: CompilationUnit) -> Compilation {
    let mut backend = ir::IrBuilder::new();
    if !unit.have_error() {
        codegen::lower(&mut unit, &mut backend);
    }
    Compilation { unit, module: backend.finish() }
}
