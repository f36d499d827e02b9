//! Lexical analysis: turns raw source text into a lazy stream of tokens.
//!
//! The lexer never fails. An unrecognised character is recorded as a
//! diagnostic, logged, and skipped (exactly one character) before scanning
//! resumes. Multi-character operators are matched before their
//! single-character prefixes.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::token::{Span, Token, TokenKind};

/// An illegal character the lexer skipped over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexDiagnostic {
    pub ch: char,
    pub line: usize,
    pub offset: usize,
}

impl std::fmt::Display for LexDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "illegal character '{}' at line {}", self.ch.escape_debug(), self.line)
    }
}

struct Rules {
    ident: Regex,
    number: Regex,
    // alternation is leftmost-first, so `==`/`!=` win over `=`
    punct: Regex,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| Rules {
        ident: Regex::new(r"\A[A-Za-z_][A-Za-z_0-9]*").expect("identifier pattern"),
        number: Regex::new(r"\A[0-9]+").expect("number pattern"),
        punct: Regex::new(r"\A(?:==|!=|<|>|=|\+|-|\*|/|\(|\)|\{|\}|;)").expect("operator pattern"),
    })
}

fn punct_kind(text: &str) -> Option<TokenKind> {
    Some(match text {
        "==" => TokenKind::EqEq,
        "!=" => TokenKind::NotEq,
        "<" => TokenKind::Less,
        ">" => TokenKind::Greater,
        "=" => TokenKind::Assign,
        "+" => TokenKind::Plus,
        "-" => TokenKind::Minus,
        "*" => TokenKind::Star,
        "/" => TokenKind::Slash,
        "(" => TokenKind::LParen,
        ")" => TokenKind::RParen,
        "{" => TokenKind::LBrace,
        "}" => TokenKind::RBrace,
        ";" => TokenKind::Semicolon,
        _ => return None,
    })
}

/// Restartable, lazily evaluated token stream over one source string.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    diagnostics: Vec<LexDiagnostic>,
}

impl<'a> Lexer<'a> {
    /// Construct a lexer over a slice of source.
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            diagnostics: Vec::new(),
        }
    }

    /// Rewind to the beginning of the source and forget earlier diagnostics.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.line = 1;
        self.diagnostics.clear();
    }

    /// Illegal characters skipped so far.
    pub fn diagnostics(&self) -> &[LexDiagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<LexDiagnostic> {
        self.diagnostics
    }

    fn token_at(&mut self, kind: TokenKind, len: usize) -> Token {
        let start = self.pos;
        self.pos += len;
        let text = &self.src[start..self.pos];
        match kind {
            TokenKind::Number => Token::number(text, text.parse::<i64>().ok(), self.line, Span::new(start, self.pos)),
            _ => Token::new(kind, text, self.line, Span::new(start, self.pos)),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let rules = rules();
        loop {
            let rest = &self.src[self.pos..];
            let c = rest.chars().next()?;

            if c == '\n' {
                self.line += 1;
                self.pos += 1;
                continue;
            }
            if c.is_whitespace() {
                self.pos += c.len_utf8();
                continue;
            }

            if let Some(m) = rules.ident.find(rest) {
                let kind = TokenKind::keyword(m.as_str()).unwrap_or(TokenKind::Identifier);
                return Some(self.token_at(kind, m.end()));
            }
            if let Some(m) = rules.number.find(rest) {
                return Some(self.token_at(TokenKind::Number, m.end()));
            }
            if let Some(kind) = rules.punct.find(rest).and_then(|m| punct_kind(m.as_str()).map(|k| (k, m.end()))) {
                return Some(self.token_at(kind.0, kind.1));
            }

            let diag = LexDiagnostic { ch: c, line: self.line, offset: self.pos };
            warn!(ch = %c.escape_debug(), line = self.line, offset = self.pos, "illegal character skipped");
            self.diagnostics.push(diag);
            self.pos += c.len_utf8();
        }
    }
}

/// Lex the whole input, returning the tokens and any skipped characters.
pub fn tokenize(src: &str) -> (Vec<Token>, Vec<LexDiagnostic>) {
    let mut lexer = Lexer::new(src);
    let tokens: Vec<Token> = lexer.by_ref().collect();
    (tokens, lexer.into_diagnostics())
}
