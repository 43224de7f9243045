//! An s-expression reader: lists, quoted data, symbols and numbers.

use super::{Subject, read_while, skip_space};
use tokmine_core::{ByteStream, HarnessError, ProxyToken, TokenSource};

const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Eof,
    LParen,
    RParen,
    Quote,
    Symbol,
    Number,
    Invalid,
}

impl Kind {
    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Kind {
        match id {
            0 => Kind::Eof,
            1 => Kind::LParen,
            2 => Kind::RParen,
            3 => Kind::Quote,
            4 => Kind::Symbol,
            5 => Kind::Number,
            _ => Kind::Invalid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: Kind,
    pub text: String,
}

impl ProxyToken for Token {
    fn from_kind(kind: u32, payload: &'static str) -> Self {
        Token {
            kind: Kind::from_id(kind),
            text: payload.to_string(),
        }
    }
}

fn is_symbol_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || b"+-*/<>=!?_".contains(&byte)
}

fn is_symbol_rest(byte: u8) -> bool {
    is_symbol_start(byte) || byte.is_ascii_digit()
}

pub fn next_token(stream: &mut dyn ByteStream) -> Result<Token, HarnessError> {
    let byte = skip_space(stream)?;
    let mut text = String::new();
    let kind = match byte {
        0 => Kind::Eof,
        b'(' => Kind::LParen,
        b')' => Kind::RParen,
        b'\'' => Kind::Quote,
        b'0'..=b'9' => {
            text.push(byte as char);
            read_while(stream, &mut text, |b| b.is_ascii_digit())?;
            return Ok(Token {
                kind: Kind::Number,
                text,
            });
        }
        b if is_symbol_start(b) => {
            text.push(byte as char);
            read_while(stream, &mut text, is_symbol_rest)?;
            return Ok(Token {
                kind: Kind::Symbol,
                text,
            });
        }
        _ => Kind::Invalid,
    };
    if byte != 0 {
        text.push(byte as char);
    }
    Ok(Token { kind, text })
}

/// A parsed datum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datum {
    Symbol(String),
    Number(String),
    Quote(Box<Datum>),
    List(Vec<Datum>),
}

fn datum(tokens: &mut dyn TokenSource<Token>, depth: usize) -> Result<Option<Datum>, HarnessError> {
    let token = tokens.next_token()?;
    datum_from(tokens, token, depth)
}

fn datum_from(
    tokens: &mut dyn TokenSource<Token>,
    token: Token,
    depth: usize,
) -> Result<Option<Datum>, HarnessError> {
    if depth >= MAX_DEPTH {
        return Ok(None);
    }
    match token.kind {
        Kind::Symbol => Ok(Some(Datum::Symbol(token.text))),
        Kind::Number => Ok(Some(Datum::Number(token.text))),
        Kind::Quote => Ok(datum(tokens, depth + 1)?.map(|d| Datum::Quote(Box::new(d)))),
        Kind::LParen => {
            let mut items = Vec::new();
            loop {
                let next = tokens.next_token()?;
                if next.kind == Kind::RParen {
                    return Ok(Some(Datum::List(items)));
                }
                match datum_from(tokens, next, depth + 1)? {
                    Some(item) => items.push(item),
                    None => return Ok(None),
                }
            }
        }
        Kind::Eof | Kind::RParen | Kind::Invalid => Ok(None),
    }
}

/// Reads exactly one datum followed by end of input.
pub fn read(tokens: &mut dyn TokenSource<Token>) -> Result<Option<Datum>, HarnessError> {
    let Some(value) = datum(tokens, 0)? else {
        return Ok(None);
    };
    if tokens.next_token()?.kind != Kind::Eof {
        return Ok(None);
    }
    Ok(Some(value))
}

pub struct Sexpr;

impl Subject for Sexpr {
    type Token = Token;

    fn next_token(stream: &mut dyn ByteStream) -> Result<Token, HarnessError> {
        next_token(stream)
    }

    fn kind_id(token: &Token) -> u32 {
        token.kind.id()
    }

    fn parse(tokens: &mut dyn TokenSource<Token>) -> Result<bool, HarnessError> {
        Ok(read(tokens)?.is_some())
    }
}
