//! Main parser coordinator
//!
//! This module provides the [`Parser`] struct, the error type, the token
//! helpers shared by every production, and the top-level loop.
//!
//! # Parser Architecture
//!
//! - This module: Parser struct, helper methods, top-level dispatch and recovery
//! - `declarations`: functions, external declarations, structs, types
//! - `statements`: `if`, `while`, `ret`, declarations, assignments, calls
//! - `expressions`: precedence climbing and postfix chains
//!
//! Parser methods are split across those files using `impl Parser` blocks.
//!
//! # Error handling
//!
//! Productions return `Result<_, ParseError>`. A [`ParseError`] is reported
//! to the diagnostics sink at the moment it is created, so callers only
//! propagate it with `?`. The top-level loop then skips ahead to the next
//! `function`, `struct` or `external` and keeps going; the error flag stays
//! set for the rest of the session.

use rustc_hash::FxHashMap;
use std::rc::Rc;
use thiserror::Error;

use crate::diagnostics::Diagnostics;
use crate::parser::ast::{Ast, NodeId};
use crate::parser::lexer::{TokenKind, Tokenizer};
use crate::parser::stream::{FilePos, SourceStream};
use crate::types::StructType;

/// Struct definitions seen so far, by name.
pub type StructRegistry = FxHashMap<String, Rc<StructType>>;

/// A syntax error that has already been reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{pos}: {message}")]
pub struct ParseError {
    pub message: String,
    pub pos: FilePos,
}

/// Everything a parse session produces.
#[derive(Debug)]
pub struct CompilationUnit {
    pub ast: Ast,
    /// Top-level function and external declarations, in source order.
    pub functions: Vec<NodeId>,
    pub structs: StructRegistry,
    pub diagnostics: Diagnostics,
    pub source: SourceStream,
}

impl CompilationUnit {
    pub fn have_error(&self) -> bool {
        self.diagnostics.has_error()
    }

    /// Tree dump of every top-level declaration.
    pub fn dump(&self) -> String {
        self.functions.iter().map(|id| self.ast.dump(*id)).collect()
    }
}

pub struct Parser {
    pub(crate) tokenizer: Tokenizer,
    pub(crate) ast: Ast,
    pub(crate) structs: StructRegistry,
    pub(crate) diagnostics: Diagnostics,
    functions: Vec<NodeId>,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Self::from_stream(SourceStream::from_source(source), Diagnostics::new())
    }

    pub fn from_stream(stream: SourceStream, diagnostics: Diagnostics) -> Self {
        Self {
            tokenizer: Tokenizer::new(stream),
            ast: Ast::new(),
            structs: StructRegistry::default(),
            diagnostics,
            functions: Vec::new(),
        }
    }

    /// Parse the whole input.
    pub fn start(&mut self) {
        while !self.check(TokenKind::EndOfFile) {
            let result = match self.tokenizer.current_kind() {
                TokenKind::FunctionDecl => self.parse_function_decl().map(Some),
                TokenKind::External => self.parse_external_decl().map(Some),
                TokenKind::Struct => self.parse_struct_def().map(|_| None),
                _ => Err(self.log_error("cannot parse things starting here")),
            };
            match result {
                Ok(Some(function)) => self.functions.push(function),
                Ok(None) => {}
                Err(_) => self.synchronize(),
            }
        }
        tracing::debug!(
            functions = self.functions.len(),
            structs = self.structs.len(),
            errors = self.diagnostics.len(),
            "parse finished"
        );
    }

    pub fn have_error(&self) -> bool {
        self.diagnostics.has_error()
    }

    pub fn finish(self) -> CompilationUnit {
        CompilationUnit {
            ast: self.ast,
            functions: self.functions,
            structs: self.structs,
            diagnostics: self.diagnostics,
            source: self.tokenizer.into_stream(),
        }
    }

    /// [`start`](Self::start) followed by [`finish`](Self::finish).
    pub fn parse(mut self) -> CompilationUnit {
        self.start();
        self.finish()
    }

    /// Skip to the next token that can begin a top-level construct.
    fn synchronize(&mut self) {
        if !self.check(TokenKind::EndOfFile) {
            self.advance();
        }
        loop {
            match self.tokenizer.current_kind() {
                TokenKind::EndOfFile | TokenKind::FunctionDecl | TokenKind::External => return,
                TokenKind::Struct if self.at_struct_definition() => return,
                _ => self.advance(),
            }
        }
    }

    /// `struct NAME {` as opposed to a `struct NAME` type use.
    fn at_struct_definition(&mut self) -> bool {
        self.tokenizer.peek().is(TokenKind::Identifier)
            && self.tokenizer.peek_n(2).is(TokenKind::LeftBrace)
    }

    // ===== Helper methods =====

    /// Report an error at the current token and hand back the error value.
    ///
    /// An `Invalid` current token replaces the message with its lexical
    /// error, so a bad character is reported once, by its own reason.
    pub(crate) fn log_error(&mut self, message: impl Into<String>) -> ParseError {
        let current = self.tokenizer.current();
        let message = if current.is(TokenKind::Invalid) {
            current.lex_error().to_string()
        } else {
            message.into()
        };
        let pos = current.pos;
        self.log_error_at(pos, message)
    }

    pub(crate) fn log_error_at(&mut self, pos: FilePos, message: impl Into<String>) -> ParseError {
        let message = message.into();
        let line = self.tokenizer.get_line(pos);
        self.diagnostics.report(pos, line, message.clone());
        ParseError { message, pos }
    }

    /// Report a problem that does not stop the current production.
    pub(crate) fn report_at(&mut self, pos: FilePos, message: impl Into<String>) {
        self.log_error_at(pos, message);
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.tokenizer.current_kind() == kind
    }

    pub(crate) fn advance(&mut self) {
        self.tokenizer.consume();
    }

    pub(crate) fn current_pos(&self) -> FilePos {
        self.tokenizer.pos()
    }

    /// Consume a token of the given kind, returning its position.
    pub(crate) fn expect(&mut self, kind: TokenKind, context: &str) -> Result<FilePos, ParseError> {
        if self.check(kind) {
            let pos = self.current_pos();
            self.advance();
            Ok(pos)
        } else {
            let found = self.tokenizer.current().to_string();
            Err(self.log_error(format!("expected {kind} {context}, found {found}")))
        }
    }

    pub(crate) fn expect_identifier(
        &mut self,
        context: &str,
    ) -> Result<(String, FilePos), ParseError> {
        if self.check(TokenKind::Identifier) {
            let token = self.tokenizer.current();
            let found = (token.string_literal().to_string(), token.pos);
            self.advance();
            Ok(found)
        } else {
            let found = self.tokenizer.current().to_string();
            Err(self.log_error(format!("expected identifier {context}, found {found}")))
        }
    }
}
