//! Token sources: the single seam between a subject's parser and the way its
//! tokens are produced.
//!
//! A parser written against [`TokenSource`] runs unchanged on real lexing
//! ([`LexedTokens`]) and on mined identifiers replayed from the token pool
//! ([`PooledTokens`]). The pooled source fixes only the token kind; any text
//! the token carries is the placeholder [`PLACEHOLDER_PAYLOAD`].

use crate::context::HarnessContext;
use crate::cursor::ByteStream;
use crate::engine::Engine;
use crate::error::HarnessError;

/// Text given to every pooled token.
pub const PLACEHOLDER_PAYLOAD: &str = "A";

pub trait TokenSource<T> {
    fn next_token(&mut self) -> Result<T, HarnessError>;
}

/// A subject token type that can be built from a bare kind identifier.
pub trait ProxyToken: Sized {
    fn from_kind(kind: u32, payload: &'static str) -> Self;
}

/// Tokens produced by running a real lexer over a byte stream.
pub struct LexedTokens<S, F> {
    stream: S,
    lexer: F,
}

impl<S, F> LexedTokens<S, F> {
    pub fn new(stream: S, lexer: F) -> Self {
        Self { stream, lexer }
    }

    pub fn into_stream(self) -> S {
        self.stream
    }
}

impl<S, F, T> TokenSource<T> for LexedTokens<S, F>
where
    S: ByteStream,
    F: FnMut(&mut dyn ByteStream) -> Result<T, HarnessError>,
{
    fn next_token(&mut self) -> Result<T, HarnessError> {
        (self.lexer)(&mut self.stream)
    }
}

/// Tokens fetched from the run's token pool in slot order.
pub struct PooledTokens<'c, E: Engine> {
    ctx: &'c mut HarnessContext<E>,
}

impl<'c, E: Engine> PooledTokens<'c, E> {
    pub fn new(ctx: &'c mut HarnessContext<E>) -> Self {
        Self { ctx }
    }
}

impl<E: Engine, T: ProxyToken> TokenSource<T> for PooledTokens<'_, E> {
    fn next_token(&mut self) -> Result<T, HarnessError> {
        let kind = self.ctx.next_token_id()?;
        Ok(T::from_kind(kind, PLACEHOLDER_PAYLOAD))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allowlist::AllowList;
    use crate::context::PoolSetup;
    use crate::cursor::SliceStream;
    use crate::engine::{DomainEngine, PathPlan};

    #[derive(Debug, PartialEq)]
    struct Word {
        kind: u32,
        text: String,
    }

    impl ProxyToken for Word {
        fn from_kind(kind: u32, payload: &'static str) -> Self {
            Word {
                kind,
                text: payload.to_string(),
            }
        }
    }

    fn lex_word(stream: &mut dyn ByteStream) -> Result<Word, HarnessError> {
        let mut text = String::new();
        loop {
            let byte = stream.read_byte()?;
            if !byte.is_ascii_alphabetic() {
                if byte != 0 {
                    stream.unread_byte()?;
                }
                break;
            }
            text.push(byte as char);
        }
        let kind = if text.is_empty() { 0 } else { 1 };
        if text.is_empty() {
            let byte = stream.read_byte()?;
            if byte != 0 {
                return Ok(Word {
                    kind: 2,
                    text: (byte as char).to_string(),
                });
            }
        }
        Ok(Word { kind, text })
    }

    #[test]
    fn lexed_tokens_run_the_real_lexer() {
        let mut source = LexedTokens::new(SliceStream::new(b"ab,c"), lex_word);
        let tokens: Vec<Word> = (0..4).map(|_| source.next_token().unwrap()).collect();
        let kinds: Vec<u32> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![1, 2, 1, 0]);
        assert_eq!(tokens[0].text, "ab");
        assert_eq!(tokens[2].text, "c");
    }

    #[test]
    fn pooled_tokens_carry_kind_and_placeholder() {
        let list: AllowList = [1, 2].into_iter().collect();
        let mut ctx = HarnessContext::new(DomainEngine::new(&PathPlan::replay(vec![1, 0])));
        ctx.setup_tokens(PoolSetup::Replay(&list)).unwrap();
        ctx.bind_tokens().unwrap();
        let mut source = PooledTokens::new(&mut ctx);
        let first: Word = source.next_token().unwrap();
        let second: Word = source.next_token().unwrap();
        assert_eq!(
            first,
            Word {
                kind: 2,
                text: PLACEHOLDER_PAYLOAD.to_string()
            }
        );
        assert_eq!(second.kind, 1);
    }
}
