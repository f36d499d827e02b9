//! Hand-rolled parser: recursive descent for statements plus a Pratt
//! expression parser. Fails fast on the first mismatch; there is no
//! resynchronisation.

use std::iter::Peekable;

use tracing::debug;

use crate::ast::{BinaryOp, Expr, Function, Program, Stmt};
use crate::error::ParseError;
use crate::token::{describe_token, Token, TokenKind};

type Result<T> = std::result::Result<T, ParseError>;

/// Parse a complete program from a token sequence.
pub fn parse<I>(tokens: I) -> Result<Program>
where
    I: IntoIterator<Item = Token>,
{
    Parser::new(tokens).parse_program()
}

/// Entry point for turning tokens into an AST.
pub struct Parser<I: Iterator<Item = Token>> {
    tokens: Peekable<I>,
}

impl<I: Iterator<Item = Token>> Parser<I> {
    pub fn new<T>(tokens: T) -> Self
    where
        T: IntoIterator<Item = Token, IntoIter = I>,
    {
        Self {
            tokens: tokens.into_iter().peekable(),
        }
    }

    /// `program := function EOF`
    pub fn parse_program(mut self) -> Result<Program> {
        let function = self.function()?;
        if let Some(tok) = self.tokens.next() {
            return Err(unexpected(&tok, "end of input"));
        }
        debug!(function = %function.name, statements = function.body.len(), "parsed program");
        Ok(Program {
            functions: vec![function],
        })
    }

    /// `function := 'int' IDENT '(' ')' '{' statement* '}'`
    fn function(&mut self) -> Result<Function> {
        self.expect(TokenKind::KwInt, "`int`")?;
        let name = self.expect(TokenKind::Identifier, "function name")?.text;
        self.expect(TokenKind::LParen, "`(`")?;
        self.expect(TokenKind::RParen, "`)`")?;
        let body = self.block()?;
        Ok(Function { name, body })
    }

    /// `'{' statement* '}'`
    fn block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut body = Vec::new();
        loop {
            match self.tokens.peek() {
                Some(tok) if tok.kind == TokenKind::RBrace => {
                    self.tokens.next();
                    return Ok(body);
                }
                Some(_) => body.push(self.statement()?),
                None => return Err(eof("`}`")),
            }
        }
    }

    fn statement(&mut self) -> Result<Stmt> {
        let tok = self.next_token("statement")?;
        match tok.kind {
            TokenKind::KwInt => {
                let name = self.expect(TokenKind::Identifier, "variable name")?.text;
                self.expect(TokenKind::Semicolon, "`;`")?;
                Ok(Stmt::VarDeclare { name })
            }
            TokenKind::KwReturn => {
                let expr = self.expr(0)?;
                self.expect(TokenKind::Semicolon, "`;`")?;
                Ok(Stmt::Return { expr })
            }
            TokenKind::KwIf => self.if_tail(),
            TokenKind::Identifier => {
                let name = tok.text;
                let next = self.next_token("`=` or `(`")?;
                match next.kind {
                    TokenKind::Assign => {
                        let expr = self.expr(0)?;
                        self.expect(TokenKind::Semicolon, "`;`")?;
                        Ok(Stmt::VarAssign { name, expr })
                    }
                    TokenKind::LParen => {
                        let arg = self.expr(0)?;
                        self.expect(TokenKind::RParen, "`)`")?;
                        self.expect(TokenKind::Semicolon, "`;`")?;
                        Ok(Stmt::Call { name, args: vec![arg] })
                    }
                    _ => Err(unexpected(&next, "`=` or `(`")),
                }
            }
            _ => Err(unexpected(&tok, "statement")),
        }
    }

    /// Everything after the `if` keyword.
    fn if_tail(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::LParen, "`(`")?;
        let condition = self.expr(0)?;
        self.expect(TokenKind::RParen, "`)`")?;
        let then_body = self.block()?;
        let else_body = match self.tokens.peek() {
            Some(tok) if tok.kind == TokenKind::KwElse => {
                self.tokens.next();
                Some(self.block()?)
            }
            _ => None,
        };
        Ok(Stmt::If {
            condition,
            then_body,
            else_body,
        })
    }

    // =============== expression parser ==================
    //
    // Pratt parser / precedence climbing:
    //   infix left:  '*','/'           binding power: 5
    //   infix left:  '+','-'           binding power: 3
    //   non-assoc:   '==','!=','<','>' binding power: 1
    // atoms: NUMBER, IDENT, '(' expr ')'
    //
    // A comparison's right operand is parsed above comparison strength, so a
    // second comparison always surfaces in the loop that consumed the first.

    fn expr(&mut self, min_bp: u8) -> Result<Expr> {
        let tok = self.next_token("expression")?;
        let mut lhs = match tok.kind {
            TokenKind::Number => {
                let value = tok
                    .value
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| ParseError::LiteralOutOfRange {
                        text: tok.text.clone(),
                        line: tok.line,
                    })?;
                Expr::num(value)
            }
            TokenKind::Identifier => Expr::var(tok.text),
            TokenKind::LParen => {
                let inner = self.expr(0)?;
                self.expect(TokenKind::RParen, "`)`")?;
                inner
            }
            _ => return Err(unexpected(&tok, "expression")),
        };

        let mut compared = false;
        loop {
            let Some((op, lbp, rbp)) = self.tokens.peek().and_then(|t| infix_binding(t.kind)) else {
                break;
            };
            if lbp < min_bp {
                break;
            }
            let op_tok = self.next_token("operator")?;
            if op.is_comparison() {
                if compared {
                    return Err(ParseError::ChainedComparison {
                        op: op_tok.text,
                        line: op_tok.line,
                    });
                }
                compared = true;
            }
            let rhs = self.expr(rbp)?;
            lhs = Expr::binary(lhs, op, rhs);
        }

        Ok(lhs)
    }

    fn next_token(&mut self, expected: &str) -> Result<Token> {
        self.tokens.next().ok_or_else(|| eof(expected))
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token> {
        let tok = self.next_token(expected)?;
        if tok.kind == kind {
            Ok(tok)
        } else {
            Err(unexpected(&tok, expected))
        }
    }
}

/// Operator plus its left/right binding powers.
fn infix_binding(kind: TokenKind) -> Option<(BinaryOp, u8, u8)> {
    Some(match kind {
        TokenKind::EqEq => (BinaryOp::Eq, 1, 2),
        TokenKind::NotEq => (BinaryOp::Ne, 1, 2),
        TokenKind::Less => (BinaryOp::Lt, 1, 2),
        TokenKind::Greater => (BinaryOp::Gt, 1, 2),
        TokenKind::Plus => (BinaryOp::Add, 3, 4),
        TokenKind::Minus => (BinaryOp::Sub, 3, 4),
        TokenKind::Star => (BinaryOp::Mul, 5, 6),
        TokenKind::Slash => (BinaryOp::Div, 5, 6),
        _ => return None,
    })
}

fn unexpected(tok: &Token, expected: &str) -> ParseError {
    debug!(found = %describe_token(Some(tok)), expected, "parse failed");
    ParseError::UnexpectedToken {
        expected: expected.to_string(),
        found: tok.text.clone(),
        line: tok.line,
    }
}

fn eof(expected: &str) -> ParseError {
    debug!(found = %describe_token(None), expected, "parse failed");
    ParseError::UnexpectedEof {
        expected: expected.to_string(),
    }
}
