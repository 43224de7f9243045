use crate::charclass::{SymbolicByteBuffer, TERMINATOR};
use crate::engine::Engine;
use crate::error::HarnessError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CursorError {
    /// Pushback with nothing read; the cursor is already at the buffer origin.
    #[error("Cannot push back a byte at the start of the stream")]
    Underflow,
}

/// The stream contract a tokenizer is written against: read the next byte,
/// or push the last one back so it is read again.
///
/// Once the stream is exhausted every read yields [`TERMINATOR`] and the
/// position stops moving.
pub trait ByteStream {
    fn read_byte(&mut self) -> Result<u8, HarnessError>;

    fn unread_byte(&mut self) -> Result<(), HarnessError>;

    fn position(&self) -> usize;
}

/// A [`ByteStream`] over a symbolic buffer, reading through the engine.
///
/// The cursor lives in the harness context so that exactly one buffer/cursor
/// binding exists per run; this type only borrows it.
pub struct CursorStream<'a, E: Engine> {
    engine: &'a mut E,
    buffer: SymbolicByteBuffer,
    cursor: &'a mut usize,
}

impl<'a, E: Engine> CursorStream<'a, E> {
    pub(crate) fn new(engine: &'a mut E, buffer: SymbolicByteBuffer, cursor: &'a mut usize) -> Self {
        Self {
            engine,
            buffer,
            cursor,
        }
    }

    pub fn buffer(&self) -> &SymbolicByteBuffer {
        &self.buffer
    }
}

impl<E: Engine> ByteStream for CursorStream<'_, E> {
    fn read_byte(&mut self) -> Result<u8, HarnessError> {
        if *self.cursor >= self.buffer.len() {
            return Ok(TERMINATOR);
        }
        let byte = self.engine.read_byte(self.buffer.object(), *self.cursor)?;
        *self.cursor += 1;
        Ok(byte)
    }

    fn unread_byte(&mut self) -> Result<(), HarnessError> {
        if *self.cursor == 0 {
            return Err(CursorError::Underflow.into());
        }
        *self.cursor -= 1;
        Ok(())
    }

    fn position(&self) -> usize {
        *self.cursor
    }
}

/// A [`ByteStream`] over concrete bytes, for running tokenizers outside the
/// harness. A slice without a trailing NUL behaves as if it had one.
#[derive(Debug, Clone)]
pub struct SliceStream<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> SliceStream<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }
}

impl ByteStream for SliceStream<'_> {
    fn read_byte(&mut self) -> Result<u8, HarnessError> {
        match self.bytes.get(self.position) {
            Some(byte) => {
                self.position += 1;
                Ok(*byte)
            }
            None => Ok(TERMINATOR),
        }
    }

    fn unread_byte(&mut self) -> Result<(), HarnessError> {
        if self.position == 0 {
            return Err(CursorError::Underflow.into());
        }
        self.position -= 1;
        Ok(())
    }

    fn position(&self) -> usize {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charclass::{RestrictionProfile, constrain_token_input};
    use crate::engine::{DomainEngine, PathPlan};
    use proptest::prelude::*;

    #[test]
    fn cursor_stream_reads_through_engine_and_stops_at_end() {
        let mut engine = DomainEngine::new(&PathPlan::default());
        let buffer = constrain_token_input(&mut engine, 3, RestrictionProfile::Digits).unwrap();
        let mut cursor = 0usize;
        let mut stream = CursorStream::new(&mut engine, buffer, &mut cursor);

        let first = stream.read_byte().unwrap();
        assert!(RestrictionProfile::Digits.accepts(0, first));
        stream.read_byte().unwrap();
        assert_eq!(stream.read_byte().unwrap(), TERMINATOR);
        assert_eq!(stream.position(), 3);
        assert_eq!(stream.read_byte().unwrap(), TERMINATOR);
        assert_eq!(stream.position(), 3, "reading past the end never advances");
    }

    #[test]
    fn cursor_stream_pushback_rereads_same_byte() {
        let mut engine = DomainEngine::new(&PathPlan::replay(vec![5]));
        let buffer = constrain_token_input(&mut engine, 4, RestrictionProfile::Letters).unwrap();
        let mut cursor = 0usize;
        let mut stream = CursorStream::new(&mut engine, buffer, &mut cursor);

        let byte = stream.read_byte().unwrap();
        stream.unread_byte().unwrap();
        assert_eq!(stream.position(), 0);
        assert_eq!(stream.read_byte().unwrap(), byte);
    }

    #[test]
    fn pushback_at_origin_underflows() {
        let mut stream = SliceStream::new(b"ab");
        let err = stream.unread_byte().unwrap_err();
        assert!(matches!(err, HarnessError::Cursor(CursorError::Underflow)));
    }

    #[test]
    fn slice_stream_terminates_like_a_buffer() {
        let mut stream = SliceStream::new(b"a");
        assert_eq!(stream.read_byte().unwrap(), b'a');
        assert_eq!(stream.read_byte().unwrap(), TERMINATOR);
        assert_eq!(stream.position(), 1);
        stream.unread_byte().unwrap();
        assert_eq!(stream.read_byte().unwrap(), b'a');
    }

    proptest! {
        #[test]
        fn read_pushback_read_round_trips(
            bytes in prop::collection::vec(1u8..=255, 1..16),
            reads in 0usize..24,
        ) {
            let mut terminated = bytes.clone();
            terminated.push(TERMINATOR);
            let mut stream = SliceStream::new(&terminated);
            for _ in 0..reads {
                stream.read_byte().unwrap();
            }
            let before = stream.position();
            let byte = stream.read_byte().unwrap();
            let advanced = stream.position() > before;
            if advanced {
                stream.unread_byte().unwrap();
                prop_assert_eq!(stream.read_byte().unwrap(), byte);
            } else {
                prop_assert_eq!(byte, TERMINATOR);
                prop_assert_eq!(stream.position(), terminated.len());
                stream.unread_byte().unwrap();
                prop_assert_eq!(stream.read_byte().unwrap(), TERMINATOR);
            }
        }
    }
}
