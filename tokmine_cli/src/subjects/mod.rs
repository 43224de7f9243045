//! Demo subjects with real tokenizers and parsers.

pub mod calc;
pub mod sexpr;

use clap::ValueEnum;
use std::str::FromStr;
use tokmine_core::{ByteStream, HarnessError, ProxyToken, TokenSource};

/// What the harness needs from a subject: one token-acquisition call and a
/// parser written against [`TokenSource`].
pub trait Subject {
    type Token: ProxyToken;

    /// Reads one token from raw bytes. This is the hook point the replay
    /// pool stands in for.
    fn next_token(stream: &mut dyn ByteStream) -> Result<Self::Token, HarnessError>;

    fn kind_id(token: &Self::Token) -> u32;

    /// Parses one complete input; `Ok(false)` means the subject rejected it.
    fn parse(tokens: &mut dyn TokenSource<Self::Token>) -> Result<bool, HarnessError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SubjectName {
    Calc,
    Sexpr,
}

impl FromStr for SubjectName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "calc" => Ok(SubjectName::Calc),
            "sexpr" => Ok(SubjectName::Sexpr),
            other => Err(anyhow::anyhow!(
                "Unknown subject '{other}', expected 'calc' or 'sexpr'"
            )),
        }
    }
}

pub(crate) fn is_space(byte: u8) -> bool {
    byte == b' ' || (9..=13).contains(&byte)
}

/// Reads the next byte that is not whitespace.
pub(crate) fn skip_space(stream: &mut dyn ByteStream) -> Result<u8, HarnessError> {
    loop {
        let byte = stream.read_byte()?;
        if !is_space(byte) {
            return Ok(byte);
        }
    }
}

/// Appends bytes to `text` while `accept` holds, leaving the first rejected
/// byte unread.
pub(crate) fn read_while(
    stream: &mut dyn ByteStream,
    text: &mut String,
    accept: impl Fn(u8) -> bool,
) -> Result<(), HarnessError> {
    loop {
        let byte = stream.read_byte()?;
        if byte != 0 && accept(byte) {
            text.push(byte as char);
            continue;
        }
        if byte != 0 {
            stream.unread_byte()?;
        }
        return Ok(());
    }
}
