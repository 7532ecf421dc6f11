//! Statement parsing implementation
//!
//! ```text
//! statement   ::= if_stmt | while_stmt | return | declaration | call_stmt | assignment
//! if_stmt     ::= "if" expression "then" statement* "end"
//! while_stmt  ::= "while" expression "then" statement* "end"
//! return      ::= "ret" expression? ";"
//! declaration ::= type IDENT ("=" expression)? ";"
//! call_stmt   ::= IDENT "(" arguments ")" ";"
//! assignment  ::= locator "=" expression ";"
//! ```
//!
//! A statement list ends at the first token that cannot start a statement;
//! the enclosing construct then checks for its closing `}` or `end`.

use crate::parser::ast::{NodeId, NodeKind};
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

impl Parser {
    pub(crate) fn parse_statement_list(&mut self) -> Result<Vec<NodeId>, ParseError> {
        let mut statements = Vec::new();
        while let Some(statement) = self.parse_statement()? {
            statements.push(statement);
        }
        Ok(statements)
    }

    /// Parse one statement, or return `None` if the current token cannot
    /// start one.
    pub(crate) fn parse_statement(&mut self) -> Result<Option<NodeId>, ParseError> {
        let statement = match self.tokenizer.current_kind() {
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::Ret => self.parse_return()?,
            kind if kind.is_type_qualification() => self.parse_declaration()?,
            TokenKind::Identifier if self.tokenizer.peek().is(TokenKind::LeftParenthesis) => {
                self.parse_call_statement()?
            }
            TokenKind::Identifier | TokenKind::Deref => self.parse_assignment()?,
            _ => return Ok(None),
        };
        Ok(Some(statement))
    }

    fn parse_if(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.expect(TokenKind::If, "")?;
        let cond = self.parse_expression()?;
        self.expect(TokenKind::Then, "after if condition")?;
        let body = self.parse_statement_list()?;
        self.expect(TokenKind::End, "to close the if block")?;
        Ok(self.ast.add(NodeKind::If { cond, body }, pos))
    }

    fn parse_while(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.expect(TokenKind::While, "")?;
        let cond = self.parse_expression()?;
        self.expect(TokenKind::Then, "after while condition")?;
        let body = self.parse_statement_list()?;
        self.expect(TokenKind::End, "to close the while block")?;
        Ok(self.ast.add(NodeKind::While { cond, body }, pos))
    }

    fn parse_return(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.expect(TokenKind::Ret, "")?;
        let value = if self.check(TokenKind::SemiColon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::SemiColon, "after return statement")?;
        Ok(self.ast.add(NodeKind::Return { value }, pos))
    }

    fn parse_declaration(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.current_pos();
        let ty = self.parse_type()?;
        let (name, _) = self.expect_identifier("in declaration")?;
        let init = if self.check(TokenKind::Equal) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect(TokenKind::SemiColon, "after declaration")?;
        Ok(self.ast.add(NodeKind::Declaration { name, ty, init }, pos))
    }

    fn parse_call_statement(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.current_pos();
        let call = self.parse_call()?;
        self.expect(TokenKind::SemiColon, "after call")?;
        Ok(self.ast.add(NodeKind::CallStatement { call }, pos))
    }

    fn parse_assignment(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.current_pos();
        let target = self.parse_trivial_expression()?;
        let Some(target) = self.ast.as_locator(target) else {
            return Err(self.log_error_at(pos, "left-hand side of assignment is not addressable"));
        };
        self.expect(TokenKind::Equal, "in assignment")?;
        let value = self.parse_expression()?;
        self.expect(TokenKind::SemiColon, "after assignment")?;
        Ok(self.ast.add(NodeKind::Assignment { target, value }, pos))
    }
}
