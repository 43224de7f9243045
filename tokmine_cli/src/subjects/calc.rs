//! Integer arithmetic expressions.
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := NUM | '-' factor | '(' expr ')'
//! ```
//!
//! Accepted inputs are evaluated; division by zero is a subject fault with
//! exit status [`DIVISION_BY_ZERO_EXIT`].

use super::{Subject, read_while, skip_space};
use tokmine_core::{ByteStream, HarnessError, ProxyToken, TokenSource};

pub const DIVISION_BY_ZERO_EXIT: i32 = 7;

/// Parentheses nested deeper than this are rejected.
const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Eof,
    Num,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Invalid,
}

impl Kind {
    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Kind {
        match id {
            0 => Kind::Eof,
            1 => Kind::Num,
            2 => Kind::Plus,
            3 => Kind::Minus,
            4 => Kind::Star,
            5 => Kind::Slash,
            6 => Kind::LParen,
            7 => Kind::RParen,
            _ => Kind::Invalid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: Kind,
    pub text: String,
}

impl Token {
    fn new(kind: Kind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    /// Numeric value of a `Num` token. Placeholder payloads read as zero.
    fn value(&self) -> i64 {
        self.text.parse().unwrap_or(0)
    }
}

impl ProxyToken for Token {
    fn from_kind(kind: u32, payload: &'static str) -> Self {
        Token::new(Kind::from_id(kind), payload)
    }
}

pub fn next_token(stream: &mut dyn ByteStream) -> Result<Token, HarnessError> {
    let byte = skip_space(stream)?;
    let kind = match byte {
        0 => return Ok(Token::new(Kind::Eof, "")),
        b'0'..=b'9' => {
            let mut text = String::from(byte as char);
            read_while(stream, &mut text, |b| b.is_ascii_digit())?;
            return Ok(Token::new(Kind::Num, text));
        }
        b'+' => Kind::Plus,
        b'-' => Kind::Minus,
        b'*' => Kind::Star,
        b'/' => Kind::Slash,
        b'(' => Kind::LParen,
        b')' => Kind::RParen,
        _ => Kind::Invalid,
    };
    Ok(Token::new(kind, (byte as char).to_string()))
}

struct Parser<'a> {
    tokens: &'a mut dyn TokenSource<Token>,
    current: Token,
    depth: usize,
}

/// `Ok(None)` is a syntax error; faults propagate as errors.
type Parsed = Result<Option<i64>, HarnessError>;

impl<'a> Parser<'a> {
    fn new(tokens: &'a mut dyn TokenSource<Token>) -> Result<Self, HarnessError> {
        let current = tokens.next_token()?;
        Ok(Self {
            tokens,
            current,
            depth: 0,
        })
    }

    fn advance(&mut self) -> Result<(), HarnessError> {
        self.current = self.tokens.next_token()?;
        Ok(())
    }

    fn expr(&mut self) -> Parsed {
        let Some(mut acc) = self.term()? else {
            return Ok(None);
        };
        while matches!(self.current.kind, Kind::Plus | Kind::Minus) {
            let op = self.current.kind;
            self.advance()?;
            let Some(rhs) = self.term()? else {
                return Ok(None);
            };
            acc = if op == Kind::Plus {
                acc.wrapping_add(rhs)
            } else {
                acc.wrapping_sub(rhs)
            };
        }
        Ok(Some(acc))
    }

    fn term(&mut self) -> Parsed {
        let Some(mut acc) = self.factor()? else {
            return Ok(None);
        };
        while matches!(self.current.kind, Kind::Star | Kind::Slash) {
            let op = self.current.kind;
            self.advance()?;
            let Some(rhs) = self.factor()? else {
                return Ok(None);
            };
            acc = if op == Kind::Star {
                acc.wrapping_mul(rhs)
            } else if rhs == 0 {
                return Err(HarnessError::Subject {
                    code: DIVISION_BY_ZERO_EXIT,
                    message: format!("division by zero: {acc} / 0"),
                });
            } else {
                acc.wrapping_div(rhs)
            };
        }
        Ok(Some(acc))
    }

    fn factor(&mut self) -> Parsed {
        match self.current.kind {
            Kind::Num => {
                let value = self.current.value();
                self.advance()?;
                Ok(Some(value))
            }
            Kind::Minus => {
                self.advance()?;
                Ok(self.factor()?.map(i64::wrapping_neg))
            }
            Kind::LParen => {
                if self.depth == MAX_DEPTH {
                    return Ok(None);
                }
                self.depth += 1;
                self.advance()?;
                let inner = self.expr()?;
                self.depth -= 1;
                if inner.is_none() || self.current.kind != Kind::RParen {
                    return Ok(None);
                }
                self.advance()?;
                Ok(inner)
            }
            _ => Ok(None),
        }
    }
}

/// Parses and evaluates one expression followed by end of input.
pub fn evaluate(tokens: &mut dyn TokenSource<Token>) -> Parsed {
    let mut parser = Parser::new(tokens)?;
    let value = parser.expr()?;
    if parser.current.kind != Kind::Eof {
        return Ok(None);
    }
    Ok(value)
}

pub struct Calc;

impl Subject for Calc {
    type Token = Token;

    fn next_token(stream: &mut dyn ByteStream) -> Result<Token, HarnessError> {
        next_token(stream)
    }

    fn kind_id(token: &Token) -> u32 {
        token.kind.id()
    }

    fn parse(tokens: &mut dyn TokenSource<Token>) -> Result<bool, HarnessError> {
        Ok(evaluate(tokens)?.is_some())
    }
}
