//! Expression parsing implementation
//!
//! Binary operators are parsed with precedence climbing over the levels
//! comparison (1) < additive (2) < multiplicative (3); all of them are left
//! associative. Operands are *trivial* expressions:
//!
//! ```text
//! trivial ::= INTEGER | STRING | "(" expression ")"
//!           | "cast" "<" type ">" "(" expression ")"
//!           | "ref" "<" trivial ">"
//!           | "deref" "<" trivial ">" postfix*
//!           | IDENT "(" arguments ")"
//!           | IDENT postfix*
//! postfix ::= "." IDENT | "[" expression "]"
//! ```

use crate::parser::ast::{BinaryOp, Locator, NodeId, NodeKind, PostfixBase};
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};
use crate::parser::stream::FilePos;

impl Parser {
    pub(crate) fn parse_expression(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Result<NodeId, ParseError> {
        let mut lhs = self.parse_trivial_expression()?;
        loop {
            let kind = self.tokenizer.current_kind();
            let (Some(op), Some(precedence)) = (BinaryOp::from_token(kind), kind.precedence())
            else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            let pos = self.current_pos();
            self.advance();
            let rhs = self.parse_binary(precedence + 1)?;
            lhs = self.ast.add(NodeKind::Binary { op, lhs, rhs }, pos);
        }
        Ok(lhs)
    }

    pub(crate) fn parse_trivial_expression(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.current_pos();
        match self.tokenizer.current_kind() {
            TokenKind::IntegerLiteral => {
                let value = self.tokenizer.current().integer_literal();
                if i32::try_from(value).is_err() {
                    return Err(self.log_error(format!("integer literal {value} does not fit in int")));
                }
                self.advance();
                Ok(self.ast.add(NodeKind::Constant { value }, pos))
            }
            TokenKind::String => {
                let value = self.tokenizer.current().string_literal().to_string();
                self.advance();
                Ok(self.ast.add(NodeKind::StringLiteral { value }, pos))
            }
            TokenKind::Cast => self.parse_cast(),
            TokenKind::Ref => self.parse_ref(),
            TokenKind::Deref => self.parse_deref(),
            TokenKind::LeftParenthesis => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RightParenthesis, "to close parenthesized expression")?;
                Ok(inner)
            }
            TokenKind::Identifier => match self.tokenizer.peek().kind {
                TokenKind::LeftParenthesis => self.parse_call(),
                TokenKind::Fullstop | TokenKind::LeftBracket => self.parse_postfix_expression(),
                _ => {
                    let name = self.tokenizer.current().string_literal().to_string();
                    self.advance();
                    Ok(self.ast.add(NodeKind::Identifier { name }, pos))
                }
            },
            _ => {
                let found = self.tokenizer.current().to_string();
                Err(self.log_error(format!("expected an expression, found {found}")))
            }
        }
    }

    /// `NAME(arg, arg, ...)`, with an optional trailing comma.
    pub(crate) fn parse_call(&mut self) -> Result<NodeId, ParseError> {
        let (name, pos) = self.expect_identifier("for function name")?;
        self.expect(TokenKind::LeftParenthesis, "after function name")?;
        let mut args = Vec::new();
        while !self.check(TokenKind::RightParenthesis) {
            args.push(self.parse_expression()?);
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RightParenthesis, "to close the call arguments")?;
        Ok(self.ast.add(NodeKind::Call { name, args }, pos))
    }

    fn parse_cast(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.expect(TokenKind::Cast, "")?;
        self.expect(TokenKind::LessSign, "after 'cast'")?;
        let ty = self.parse_type()?;
        self.expect(TokenKind::GreaterSign, "after cast type")?;
        self.expect(TokenKind::LeftParenthesis, "before cast operand")?;
        let expr = self.parse_expression()?;
        self.expect(TokenKind::RightParenthesis, "after cast operand")?;
        Ok(self.ast.add(NodeKind::Cast { ty, expr }, pos))
    }

    fn parse_ref(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.expect(TokenKind::Ref, "")?;
        self.expect(TokenKind::LessSign, "after 'ref'")?;
        let operand_pos = self.current_pos();
        let operand = self.parse_trivial_expression()?;
        let Some(expr) = self.ast.as_locator(operand) else {
            return Err(self.log_error_at(operand_pos, "operand of 'ref' is not addressable"));
        };
        self.expect(TokenKind::GreaterSign, "after 'ref' operand")?;
        Ok(self.ast.add(NodeKind::Ref { expr }, pos))
    }

    fn parse_deref(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.expect(TokenKind::Deref, "")?;
        self.expect(TokenKind::LessSign, "after 'deref'")?;
        let expr = self.parse_trivial_expression()?;
        self.expect(TokenKind::GreaterSign, "after 'deref' operand")?;
        let deref = self.ast.add(NodeKind::DeRef { expr, child: None }, pos);
        self.parse_postfix_tail(Locator::of(deref))
    }

    /// `NAME` followed by at least one `.member` or `[index]`.
    fn parse_postfix_expression(&mut self) -> Result<NodeId, ParseError> {
        let (name, pos) = self.expect_identifier("")?;
        let root = self.parse_postfix_link(PostfixBase::Name(name), pos)?;
        self.parse_postfix_tail(Locator::of(root))
    }

    /// Extend the chain rooted at `root` while `.` or `[` follows; returns the
    /// root.
    fn parse_postfix_tail(&mut self, root: Locator) -> Result<NodeId, ParseError> {
        let mut tail = root;
        while matches!(
            self.tokenizer.current_kind(),
            TokenKind::Fullstop | TokenKind::LeftBracket
        ) {
            let pos = self.current_pos();
            let link = self.parse_postfix_link(PostfixBase::Parent(tail), pos)?;
            self.ast.link_postfix(tail, link);
            tail = Locator::of(link);
        }
        Ok(root.id())
    }

    fn parse_postfix_link(&mut self, base: PostfixBase, pos: FilePos) -> Result<NodeId, ParseError> {
        if self.check(TokenKind::Fullstop) {
            self.advance();
            let (member, _) = self.expect_identifier("after '.'")?;
            Ok(self.ast.add(NodeKind::MemberAccess { base, member, child: None }, pos))
        } else {
            self.expect(TokenKind::LeftBracket, "")?;
            let index = self.parse_expression()?;
            self.expect(TokenKind::RightBracket, "to close the index")?;
            Ok(self.ast.add(NodeKind::ArrayAccess { base, index, child: None }, pos))
        }
    }
}
