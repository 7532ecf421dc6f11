//! Declaration parsing implementation
//!
//! Top-level constructs and type qualifications:
//!
//! ```text
//! function_decl ::= "function" IDENT "gives" type "[" params "]" "{" statement* "}"
//! external_decl ::= "external" "function" IDENT "gives" type "[" params "]" ";"
//! struct_def    ::= "struct" IDENT "{" (type IDENT ",")+ "}"
//! params        ::= (type IDENT ("," type IDENT)* ","?)?
//! type          ::= "int" | "float" | "char" | "bool" | "long" | "short" | "void"
//!                 | "struct" IDENT | "array" "(" INTEGER ")" type | "ptr" type
//! ```
//!
//! The trailing comma after the last parameter or struct field is optional.

use std::rc::Rc;

use crate::parser::ast::{NodeId, NodeKind, Parameter};
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};
use crate::parser::stream::FilePos;
use crate::types::{BuiltinKind, StructType, Type, TypeRef};

/// Name, return type and argument-list node of a function header.
struct Signature {
    name: String,
    return_type: TypeRef,
    args: NodeId,
}

impl Parser {
    pub(crate) fn parse_function_decl(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.current_pos();
        let signature = self.parse_signature()?;
        self.expect(TokenKind::LeftBrace, "to open the function body")?;
        let body = self.parse_statement_list()?;
        self.expect(TokenKind::RightBrace, "to close the function body")?;

        tracing::debug!(name = %signature.name, statements = body.len(), "parsed function");
        Ok(self.ast.add(
            NodeKind::FunctionDecl {
                name: signature.name,
                return_type: signature.return_type,
                args: signature.args,
                body,
                is_extern: false,
            },
            pos,
        ))
    }

    pub(crate) fn parse_external_decl(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.expect(TokenKind::External, "")?;
        if !self.check(TokenKind::FunctionDecl) {
            let found = self.tokenizer.current().to_string();
            return Err(self.log_error(format!("expected 'function' after 'external', found {found}")));
        }
        let signature = self.parse_signature()?;
        self.expect(TokenKind::SemiColon, "after external declaration")?;

        tracing::debug!(name = %signature.name, "parsed external declaration");
        Ok(self.ast.add(
            NodeKind::FunctionDecl {
                name: signature.name,
                return_type: signature.return_type,
                args: signature.args,
                body: Vec::new(),
                is_extern: true,
            },
            pos,
        ))
    }

    fn parse_signature(&mut self) -> Result<Signature, ParseError> {
        self.expect(TokenKind::FunctionDecl, "")?;
        let (name, _) = self.expect_identifier("after 'function'")?;
        self.expect(TokenKind::Gives, "after function name")?;
        let return_type = self.parse_type()?;

        let args_pos = self.expect(TokenKind::LeftBracket, "to open the argument list")?;
        let mut params = Vec::new();
        while self.tokenizer.current_kind().is_type_qualification() {
            let ty = self.parse_type()?;
            let (name, _) = self.expect_identifier("for argument name")?;
            params.push(Parameter { name, ty });
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RightBracket, "to close the argument list")?;

        let args = self.ast.add(NodeKind::FunctionArgList { params }, args_pos);
        Ok(Signature { name, return_type, args })
    }

    /// Parse a struct definition and add it to the registry.
    pub(crate) fn parse_struct_def(&mut self) -> Result<(), ParseError> {
        self.expect(TokenKind::Struct, "")?;
        let (name, name_pos) = self.expect_identifier("after 'struct'")?;
        self.expect(TokenKind::LeftBrace, "to open the struct body")?;

        let mut st = StructType::new(name.clone());
        while self.tokenizer.current_kind().is_type_qualification() {
            let ty = self.parse_type()?;
            let (field, field_pos) = self.expect_identifier("for field name")?;
            if st.element(&field).is_some() {
                self.report_at(field_pos, format!("duplicate field '{field}' in struct '{name}'"));
            } else {
                st.push(field, ty);
            }
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        if st.elements.is_empty() {
            return Err(self.log_error(format!("struct '{name}' must declare at least one field")));
        }
        self.expect(TokenKind::RightBrace, "to close the struct body")?;

        self.register_struct(st, name_pos);
        Ok(())
    }

    fn register_struct(&mut self, st: StructType, pos: FilePos) {
        if self.structs.contains_key(&st.name) {
            self.report_at(pos, format!("redefinition of struct '{}'", st.name));
            return;
        }
        tracing::debug!(name = %st.name, fields = st.elements.len(), "registered struct");
        self.structs.insert(st.name.clone(), Rc::new(st));
    }

    /// Parse a type qualification starting at the current token.
    pub(crate) fn parse_type(&mut self) -> Result<TypeRef, ParseError> {
        let kind = self.tokenizer.current_kind();
        if !kind.is_type_qualification() {
            let found = self.tokenizer.current().to_string();
            return Err(self.log_error(format!("expected a type, found {found}")));
        }
        self.advance();

        match kind {
            TokenKind::Int => Ok(Type::builtin(BuiltinKind::Int)),
            TokenKind::Float => Ok(Type::builtin(BuiltinKind::Float)),
            TokenKind::Char => Ok(Type::builtin(BuiltinKind::Char)),
            TokenKind::Bool => Ok(Type::builtin(BuiltinKind::Bool)),
            TokenKind::Long => Ok(Type::builtin(BuiltinKind::Long)),
            TokenKind::Short => Ok(Type::builtin(BuiltinKind::Short)),
            TokenKind::Void => Ok(Type::void()),
            TokenKind::Ptr => Ok(Type::pointer(self.parse_type()?)),
            TokenKind::Array => {
                self.expect(TokenKind::LeftParenthesis, "after 'array'")?;
                if !self.check(TokenKind::IntegerLiteral) {
                    let found = self.tokenizer.current().to_string();
                    return Err(self.log_error(format!("expected array size, found {found}")));
                }
                let count = self.tokenizer.current().integer_literal();
                self.advance();
                self.expect(TokenKind::RightParenthesis, "after array size")?;
                let base = self.parse_type()?;
                let count = usize::try_from(count).unwrap_or(usize::MAX);
                Ok(Type::array(base, count))
            }
            TokenKind::Struct => {
                let (name, pos) = self.expect_identifier("after 'struct'")?;
                match self.structs.get(&name).cloned() {
                    Some(st) => Ok(Rc::new(Type::Struct(st))),
                    None => Err(self.log_error_at(pos, format!("undefined reference to struct '{name}'"))),
                }
            }
            other => unreachable!("{other:?} is not a type qualification"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::NodeKind;
    use crate::parser::parse::Parser;

    #[test]
    fn test_function_signature() {
        let unit = Parser::new("function add gives long [int a, ptr char b,] { ret a; }").parse();
        assert!(!unit.have_error());
        let NodeKind::FunctionDecl { name, return_type, args, body, is_extern } =
            unit.ast.kind(unit.functions[0])
        else {
            panic!("expected a function");
        };
        assert_eq!(name, "add");
        assert_eq!(return_type.to_string(), "long");
        assert!(!is_extern);
        assert_eq!(body.len(), 1);
        let NodeKind::FunctionArgList { params } = unit.ast.kind(*args) else {
            panic!("expected an argument list");
        };
        let rendered: Vec<String> = params.iter().map(|p| format!("{} {}", p.ty, p.name)).collect();
        assert_eq!(rendered, ["int a", "ptr char b"]);
        assert_eq!(unit.ast.children(unit.functions[0])[0], *args);
    }

    #[test]
    fn test_external_decl() {
        let unit = Parser::new("external function puts gives int [ptr char s];").parse();
        assert!(!unit.have_error());
        assert!(matches!(
            unit.ast.kind(unit.functions[0]),
            NodeKind::FunctionDecl { is_extern: true, body, .. } if body.is_empty()
        ));
    }

    #[test]
    fn test_struct_registry() {
        let unit = Parser::new("struct Point { int x, int y, }\nstruct Line { struct Point a, struct Point b }").parse();
        assert!(!unit.have_error());
        let line = &unit.structs["Line"];
        assert_eq!(line.elements[1].name, "b");
        assert_eq!(line.elements[1].field_num, 1);
        assert_eq!(line.elements[1].ty.to_string(), "struct Point");
        assert_eq!(unit.structs["Point"].elements.len(), 2);
    }

    #[test]
    fn test_nested_types() {
        let unit = Parser::new("function f gives void [array(4) ptr short xs, ptr ptr float p] { }").parse();
        assert!(!unit.have_error());
        let dump = unit.dump();
        assert!(dump.contains("array(4) ptr short xs"), "{dump}");
        assert!(dump.contains("ptr ptr float p"), "{dump}");
    }

    #[test]
    fn test_undefined_struct() {
        let unit = Parser::new("function f gives struct Missing [] { }").parse();
        assert!(unit.have_error());
        let message = &unit.diagnostics.iter().next().unwrap().message;
        assert_eq!(message, "undefined reference to struct 'Missing'");
    }

    #[test]
    fn test_duplicate_struct_and_field() {
        let unit = Parser::new("struct S { int a, int a, }\nstruct S { int b, }").parse();
        let messages: Vec<&str> = unit.diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, ["duplicate field 'a' in struct 'S'", "redefinition of struct 'S'"]);
        assert_eq!(unit.structs["S"].elements[0].name, "a");
    }
}
