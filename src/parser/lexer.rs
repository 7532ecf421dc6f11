//! Tokenizer for vcc source code
//!
//! Unlike a batch lexer, the [`Tokenizer`] reads tokens lazily from a
//! [`SourceStream`]. It always holds one *current* token, and lookahead is
//! done by reading ahead and seeking the stream back.
//!
//! Token kinds are ordered so that keywords, type qualifications and binary
//! operators each sit between a pair of sentinel kinds; classification is a
//! range check on the enum rather than a per-kind match.

use std::fmt;

use thiserror::Error;

use super::stream::{FilePos, SourceStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TokenKind {
    IntegerLiteral,
    Identifier,
    EndOfFile,
    Invalid,

    KeywordStart,
    LeftParenthesis,
    RightParenthesis,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    FunctionDecl,
    Fullstop,
    LessSign,
    GreaterSign,
    Gives,
    External,
    Deref,
    Ref,
    SemiColon,
    Equal,
    Ret,
    Cast,
    If,
    Then,
    End,
    While,
    String,

    TypeQualificationStart,
    Int,
    Struct,
    Array,
    Ptr,
    Char,
    Float,
    Bool,
    Long,
    Short,
    Void,
    TypeQualificationEnd,

    BinaryOperatorStart,
    Add,
    Subtract,
    Multiply,
    Divide,
    EqualKeyword,
    NEquals,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    BinaryOperatorEnd,
    KeywordEnd,
}

/// Spelling of every keyword and punctuation token. Entries of length one
/// are the single-character tokens that break identifier accumulation.
pub const KEYWORDS: &[(&str, TokenKind)] = &[
    ("function", TokenKind::FunctionDecl),
    ("(", TokenKind::LeftParenthesis),
    (")", TokenKind::RightParenthesis),
    ("<", TokenKind::LessSign),
    (">", TokenKind::GreaterSign),
    ("[", TokenKind::LeftBracket),
    ("]", TokenKind::RightBracket),
    ("{", TokenKind::LeftBrace),
    ("}", TokenKind::RightBrace),
    (",", TokenKind::Comma),
    ("while", TokenKind::While),
    ("struct", TokenKind::Struct),
    ("external", TokenKind::External),
    ("if", TokenKind::If),
    ("then", TokenKind::Then),
    ("end", TokenKind::End),
    ("deref", TokenKind::Deref),
    ("ref", TokenKind::Ref),
    ("eq", TokenKind::EqualKeyword),
    ("ne", TokenKind::NEquals),
    ("gt", TokenKind::GreaterThan),
    ("ge", TokenKind::GreaterEqual),
    ("le", TokenKind::LessEqual),
    ("lt", TokenKind::LessThan),
    ("int", TokenKind::Int),
    ("float", TokenKind::Float),
    ("long", TokenKind::Long),
    ("short", TokenKind::Short),
    ("array", TokenKind::Array),
    ("bool", TokenKind::Bool),
    ("gives", TokenKind::Gives),
    ("cast", TokenKind::Cast),
    ("char", TokenKind::Char),
    ("void", TokenKind::Void),
    ("ptr", TokenKind::Ptr),
    (";", TokenKind::SemiColon),
    ("=", TokenKind::Equal),
    (".", TokenKind::Fullstop),
    ("ret", TokenKind::Ret),
    ("+", TokenKind::Add),
    ("/", TokenKind::Divide),
    ("-", TokenKind::Subtract),
    ("*", TokenKind::Multiply),
];

pub fn keyword_kind(word: &str) -> Option<TokenKind> {
    KEYWORDS
        .iter()
        .find(|(spelling, _)| *spelling == word)
        .map(|(_, kind)| *kind)
}

pub fn single_char_kind(c: u8) -> Option<TokenKind> {
    KEYWORDS
        .iter()
        .find(|(spelling, _)| spelling.len() == 1 && spelling.as_bytes()[0] == c)
        .map(|(_, kind)| *kind)
}

impl TokenKind {
    pub fn is_keyword(self) -> bool {
        self > TokenKind::KeywordStart && self < TokenKind::KeywordEnd
    }

    pub fn is_type_qualification(self) -> bool {
        self > TokenKind::TypeQualificationStart && self < TokenKind::TypeQualificationEnd
    }

    pub fn is_binary_operator(self) -> bool {
        self > TokenKind::BinaryOperatorStart && self < TokenKind::BinaryOperatorEnd
    }

    /// Binding power of a binary operator; higher binds tighter.
    pub fn precedence(self) -> Option<u8> {
        match self {
            TokenKind::Multiply | TokenKind::Divide => Some(3),
            TokenKind::Add | TokenKind::Subtract => Some(2),
            TokenKind::EqualKeyword
            | TokenKind::NEquals
            | TokenKind::GreaterThan
            | TokenKind::GreaterEqual
            | TokenKind::LessThan
            | TokenKind::LessEqual => Some(1),
            _ => None,
        }
    }

    pub fn spelling(self) -> Option<&'static str> {
        KEYWORDS
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(spelling, _)| *spelling)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.spelling()) {
            (_, Some(spelling)) => write!(f, "'{spelling}'"),
            (TokenKind::IntegerLiteral, _) => write!(f, "integer literal"),
            (TokenKind::Identifier, _) => write!(f, "identifier"),
            (TokenKind::String, _) => write!(f, "string literal"),
            (TokenKind::EndOfFile, _) => write!(f, "end of file"),
            (TokenKind::Invalid, _) => write!(f, "invalid token"),
            (other, None) => write!(f, "{other:?}"),
        }
    }
}

/// Why a character sequence could not be turned into a real token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unrecognized character '{0}'")]
    UnrecognizedCharacter(String),
    #[error("integer literal '{0}' is out of range")]
    IntegerOutOfRange(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Payload {
    None,
    Text(String),
    Integer(i64),
    Error(LexError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: FilePos,
    payload: Payload,
}

impl Token {
    pub fn new(kind: TokenKind, pos: FilePos) -> Self {
        Self { kind, pos, payload: Payload::None }
    }

    pub fn identifier(name: impl Into<String>, pos: FilePos) -> Self {
        Self { kind: TokenKind::Identifier, pos, payload: Payload::Text(name.into()) }
    }

    pub fn string(text: impl Into<String>, pos: FilePos) -> Self {
        Self { kind: TokenKind::String, pos, payload: Payload::Text(text.into()) }
    }

    pub fn integer(value: i64, pos: FilePos) -> Self {
        Self { kind: TokenKind::IntegerLiteral, pos, payload: Payload::Integer(value) }
    }

    pub fn invalid(error: LexError, pos: FilePos) -> Self {
        Self { kind: TokenKind::Invalid, pos, payload: Payload::Error(error) }
    }

    /// Text of an identifier or string literal.
    pub fn string_literal(&self) -> &str {
        match &self.payload {
            Payload::Text(text)
                if matches!(self.kind, TokenKind::Identifier | TokenKind::String) =>
            {
                text
            }
            _ => panic!("string payload requested from {:?} token", self.kind),
        }
    }

    pub fn integer_literal(&self) -> i64 {
        match self.payload {
            Payload::Integer(value) if self.kind == TokenKind::IntegerLiteral => value,
            _ => panic!("integer payload requested from {:?} token", self.kind),
        }
    }

    pub fn lex_error(&self) -> &LexError {
        match &self.payload {
            Payload::Error(error) => error,
            _ => panic!("lex error requested from {:?} token", self.kind),
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Payload::Text(text) if self.kind == TokenKind::Identifier => {
                write!(f, "identifier '{text}'")
            }
            Payload::Text(text) => write!(f, "string literal \"{text}\""),
            Payload::Integer(value) => write!(f, "integer literal {value}"),
            Payload::Error(error) => write!(f, "invalid token ({error})"),
            Payload::None => write!(f, "{}", self.kind),
        }
    }
}

fn is_word_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\n' | b'\t' | b'\r')
}

pub struct Tokenizer {
    stream: SourceStream,
    current: Token,
}

impl Tokenizer {
    /// Wrap a stream; the first token is read immediately.
    pub fn new(stream: SourceStream) -> Self {
        let mut tokenizer = Self {
            stream,
            current: Token::new(TokenKind::EndOfFile, FilePos::start()),
        };
        tokenizer.consume();
        tokenizer
    }

    pub fn from_source(source: &str) -> Self {
        Self::new(SourceStream::from_source(source))
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    pub fn current_kind(&self) -> TokenKind {
        self.current.kind
    }

    /// Advance and return the new current token.
    pub fn next(&mut self) -> &Token {
        self.consume();
        &self.current
    }

    pub fn next_kind(&mut self) -> TokenKind {
        self.next().kind
    }

    pub fn consume(&mut self) {
        self.current = self.read_token();
    }

    /// The token after the current one, without advancing.
    pub fn peek(&mut self) -> Token {
        self.peek_n(1)
    }

    /// The token `n` places after the current one, without advancing.
    pub fn peek_n(&mut self, n: usize) -> Token {
        assert!(n >= 1, "lookahead distance must be at least one");
        let saved = self.stream.tellg();
        let mut token = self.read_token();
        for _ in 1..n {
            token = self.read_token();
        }
        self.stream.seekg(saved);
        token
    }

    /// Position of the current token.
    pub fn pos(&self) -> FilePos {
        self.current.pos
    }

    pub fn get_line(&self, pos: FilePos) -> String {
        self.stream.get_line(pos.loc)
    }

    pub fn stream(&self) -> &SourceStream {
        &self.stream
    }

    pub fn into_stream(self) -> SourceStream {
        self.stream
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.stream.peek() {
            if is_whitespace(c) {
                self.stream.get();
            } else if c == b'#' {
                while let Some(c) = self.stream.peek() {
                    if c == b'\n' {
                        break;
                    }
                    self.stream.get();
                }
            } else {
                break;
            }
        }
    }

    fn read_token(&mut self) -> Token {
        self.skip_whitespace();
        let pos = self.stream.get_pos();

        let Some(c) = self.stream.get() else {
            return Token::new(TokenKind::EndOfFile, pos);
        };
        if c == b'"' {
            return self.read_string(pos);
        }
        if let Some(kind) = single_char_kind(c) {
            return Token::new(kind, pos);
        }
        if !is_word_byte(c) {
            return self.read_unrecognized(c, pos);
        }

        let mut word = String::from(c as char);
        while let Some(c) = self.stream.peek() {
            if !is_word_byte(c) {
                break;
            }
            self.stream.get();
            word.push(c as char);
        }
        Self::classify(word, pos)
    }

    fn classify(word: String, pos: FilePos) -> Token {
        if word.bytes().all(|c| c.is_ascii_digit()) {
            return match word.parse::<i64>() {
                Ok(value) => Token::integer(value, pos),
                Err(_) => Token::invalid(LexError::IntegerOutOfRange(word), pos),
            };
        }
        match keyword_kind(&word) {
            Some(kind) => Token::new(kind, pos),
            None => Token::identifier(word, pos),
        }
    }

    fn read_string(&mut self, pos: FilePos) -> Token {
        let mut bytes = Vec::new();
        loop {
            match self.stream.get() {
                None => return Token::invalid(LexError::UnterminatedString, pos),
                Some(b'"') => break,
                Some(b'\\') => match self.stream.get() {
                    None => return Token::invalid(LexError::UnterminatedString, pos),
                    Some(b'n') => bytes.push(b'\n'),
                    Some(b't') => bytes.push(b'\t'),
                    Some(b'0') => bytes.push(0),
                    Some(b'\\') => bytes.push(b'\\'),
                    Some(b'"') => bytes.push(b'"'),
                    Some(other) => bytes.extend([b'\\', other]),
                },
                Some(c) => bytes.push(c),
            }
        }
        Token::string(String::from_utf8_lossy(&bytes), pos)
    }

    /// Swallow one unrecognized character, including the continuation bytes of
    /// a multi-byte UTF-8 sequence, so it yields a single `Invalid` token.
    fn read_unrecognized(&mut self, first: u8, pos: FilePos) -> Token {
        let mut bytes = vec![first];
        if first >= 0x80 {
            while let Some(c) = self.stream.peek() {
                if !(0x80..0xC0).contains(&c) {
                    break;
                }
                self.stream.get();
                bytes.push(c);
            }
        }
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Token::invalid(LexError::UnrecognizedCharacter(text), pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut tokenizer = Tokenizer::from_source(source);
        let mut kinds = vec![tokenizer.current_kind()];
        while tokenizer.current_kind() != TokenKind::EndOfFile {
            kinds.push(tokenizer.next_kind());
        }
        kinds
    }

    #[test]
    fn test_single_char_tokens() {
        for (spelling, kind) in KEYWORDS.iter().filter(|(s, _)| s.len() == 1) {
            let tokenizer = Tokenizer::from_source(spelling);
            assert_eq!(tokenizer.current_kind(), *kind, "tokenizing {spelling:?}");
            assert_eq!(kinds(spelling), vec![*kind, TokenKind::EndOfFile]);
        }
    }

    #[test]
    fn test_every_keyword_round_trips() {
        for (spelling, kind) in KEYWORDS {
            assert!(kind.is_keyword(), "{spelling} outside keyword range");
            assert_eq!(Tokenizer::from_source(spelling).current_kind(), *kind);
        }
    }

    #[test]
    fn test_identifier_split_by_operator() {
        let mut tokenizer = Tokenizer::from_source("ab+cd");
        assert_eq!(tokenizer.current().string_literal(), "ab");
        assert_eq!(tokenizer.next_kind(), TokenKind::Add);
        assert_eq!(tokenizer.next().string_literal(), "cd");
        assert_eq!(tokenizer.next_kind(), TokenKind::EndOfFile);
    }

    #[test]
    fn test_literals() {
        let mut tokenizer = Tokenizer::from_source("42 \"hi there\" x1");
        assert_eq!(tokenizer.current().integer_literal(), 42);
        let string = tokenizer.next();
        assert_eq!(string.kind, TokenKind::String);
        assert_eq!(string.string_literal(), "hi there");
        assert_eq!(tokenizer.next().string_literal(), "x1");
    }

    #[test]
    fn test_string_escapes() {
        let tokenizer = Tokenizer::from_source(r#""a\n\"b\"""#);
        assert_eq!(tokenizer.current().string_literal(), "a\n\"b\"");
    }

    #[test]
    fn test_comments_and_whitespace_skipped() {
        assert_eq!(
            kinds("# leading comment\n\tret # trailing\r\n  x ;"),
            vec![
                TokenKind::Ret,
                TokenKind::Identifier,
                TokenKind::SemiColon,
                TokenKind::EndOfFile
            ]
        );
    }

    #[test]
    fn test_positions() {
        let mut tokenizer = Tokenizer::from_source("int x\n  = 3;");
        assert_eq!(tokenizer.pos(), FilePos::new(1, 1, 0));
        tokenizer.consume();
        assert_eq!(tokenizer.pos(), FilePos::new(1, 5, 4));
        tokenizer.consume();
        assert_eq!(tokenizer.pos(), FilePos::new(2, 3, 8));
        assert_eq!(tokenizer.get_line(tokenizer.pos()), "  = 3;");
    }

    #[test]
    fn test_peek_is_pure() {
        let mut tokenizer = Tokenizer::from_source("a b c d");
        let tell = tokenizer.stream().tellg();
        let pos = tokenizer.stream().get_pos();
        for _ in 0..4 {
            assert_eq!(tokenizer.peek().string_literal(), "b");
        }
        assert_eq!(tokenizer.peek_n(3).string_literal(), "d");
        assert_eq!(tokenizer.peek_n(2).string_literal(), "c");
        assert_eq!(tokenizer.stream().tellg(), tell);
        assert_eq!(tokenizer.stream().get_pos(), pos);
        assert_eq!(tokenizer.current().string_literal(), "a");
        assert_eq!(tokenizer.next().string_literal(), "b");
    }

    #[test]
    #[should_panic(expected = "lookahead distance")]
    fn test_peek_zero_panics() {
        Tokenizer::from_source("a").peek_n(0);
    }

    #[test]
    fn test_invalid_tokens() {
        let mut tokenizer = Tokenizer::from_source("a $ \"open");
        assert_eq!(tokenizer.next_kind(), TokenKind::Invalid);
        assert_eq!(
            tokenizer.current().lex_error(),
            &LexError::UnrecognizedCharacter("$".into())
        );
        assert_eq!(tokenizer.next_kind(), TokenKind::Invalid);
        assert_eq!(tokenizer.current().lex_error(), &LexError::UnterminatedString);
        assert_eq!(tokenizer.next_kind(), TokenKind::EndOfFile);
    }

    #[test]
    fn test_integer_overflow_is_invalid() {
        let tokenizer = Tokenizer::from_source("99999999999999999999");
        assert!(matches!(
            tokenizer.current().lex_error(),
            LexError::IntegerOutOfRange(_)
        ));
    }

    #[test]
    #[should_panic(expected = "integer payload")]
    fn test_payload_tag_checked() {
        Tokenizer::from_source("name").current().integer_literal();
    }

    #[test]
    fn test_kind_ranges() {
        assert!(TokenKind::Void.is_type_qualification());
        assert!(TokenKind::Short.is_type_qualification());
        assert!(!TokenKind::Identifier.is_type_qualification());
        assert!(TokenKind::LessEqual.is_binary_operator());
        assert!(!TokenKind::LessSign.is_binary_operator());
        assert!(!TokenKind::Void.is_binary_operator());
        assert_eq!(TokenKind::Multiply.precedence(), Some(3));
        assert_eq!(TokenKind::Subtract.precedence(), Some(2));
        assert_eq!(TokenKind::GreaterEqual.precedence(), Some(1));
        assert_eq!(TokenKind::Comma.precedence(), None);
    }
}
