//! Token vocabulary shared by the lexer and the parser.

use std::fmt;

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    KwInt,
    KwReturn,
    KwIf,
    KwElse,
    Identifier,
    Number,
    EqEq,
    NotEq,
    Less,
    Greater,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semicolon,
}

impl TokenKind {
    /// Resolve an identifier against the reserved-word table.
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        match ident {
            "int" => Some(TokenKind::KwInt),
            "return" => Some(TokenKind::KwReturn),
            "if" => Some(TokenKind::KwIf),
            "else" => Some(TokenKind::KwElse),
            _ => None,
        }
    }

    /// Upper-case name used in the token listing.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::KwInt => "INT",
            TokenKind::KwReturn => "RETURN",
            TokenKind::KwIf => "IF",
            TokenKind::KwElse => "ELSE",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Number => "NUMBER",
            TokenKind::EqEq => "EQUALS_EQUALS",
            TokenKind::NotEq => "NOT_EQUALS",
            TokenKind::Less => "LESS_THAN",
            TokenKind::Greater => "GREATER_THAN",
            TokenKind::Assign => "EQUALS",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Star => "TIMES",
            TokenKind::Slash => "DIVIDE",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::LBrace => "LBRACE",
            TokenKind::RBrace => "RBRACE",
            TokenKind::Semicolon => "SEMICOLON",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            TokenKind::EqEq | TokenKind::NotEq | TokenKind::Less | TokenKind::Greater
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte range of a token in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A classified lexeme with enough position data for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Integer value of a `Number` token; `None` for every other kind and for
    /// literals too wide for `i64`.
    pub value: Option<i64>,
    pub line: usize,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            value: None,
            line,
            span,
        }
    }

    pub fn number(text: impl Into<String>, value: Option<i64>, line: usize, span: Span) -> Self {
        Self {
            value,
            ..Self::new(TokenKind::Number, text, line, span)
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' @ line {}", self.kind, self.text, self.line)
    }
}

/// One token per line, as printed by `--emit tokens`.
pub fn listing(tokens: &[Token]) -> String {
    tokens.iter().map(|t| format!("{t}\n")).collect()
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>) -> String {
    match token {
        Some(t) => format!("`{}` (line {})", t.text, t.line),
        None => "end of input".to_string(),
    }
}
