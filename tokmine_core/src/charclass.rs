//! Character-class constraints for symbolic input buffers.
//!
//! A [`RestrictionProfile`] narrows every byte of a symbolic buffer to one
//! alphabet so token mining explores one family of lexemes at a time. The
//! first two positions also admit whitespace under every profile, and the
//! final byte is always the NUL terminator.

use crate::engine::{ByteSet, Constraint, Engine, EngineError, ObjectId};
use crate::error::HarnessError;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// End-of-stream marker at the last index of every buffer.
pub const TERMINATOR: u8 = 0;

/// Label of the symbolic input object, as it appears in engine output.
pub const INPUT_LABEL: &str = "input_str";

/// Positions below this index also accept whitespace.
const WHITESPACE_PREFIX: usize = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Unknown restriction profile '{0}' (expected letters, digits, punctuation or none)")]
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestrictionProfile {
    None,
    Letters,
    Digits,
    Punctuation,
}

impl RestrictionProfile {
    pub const ALL: [RestrictionProfile; 4] = [
        RestrictionProfile::Letters,
        RestrictionProfile::Digits,
        RestrictionProfile::Punctuation,
        RestrictionProfile::None,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RestrictionProfile::None => "none",
            RestrictionProfile::Letters => "letters",
            RestrictionProfile::Digits => "digits",
            RestrictionProfile::Punctuation => "punctuation",
        }
    }

    fn class_accepts(self, byte: u8) -> bool {
        match self {
            RestrictionProfile::None => true,
            RestrictionProfile::Letters => is_letter(byte),
            RestrictionProfile::Digits => is_digit(byte),
            RestrictionProfile::Punctuation => is_punctuation(byte),
        }
    }

    /// Whether `byte` may appear at `position` of a constrained buffer,
    /// ignoring the forced terminator at the last index.
    pub fn accepts(self, position: usize, byte: u8) -> bool {
        byte == TERMINATOR
            || (position < WHITESPACE_PREFIX && is_leading_whitespace(byte))
            || self.class_accepts(byte)
    }

    pub fn allowed_at(self, position: usize) -> ByteSet {
        ByteSet::from_predicate(|byte| self.accepts(position, byte))
    }
}

impl fmt::Display for RestrictionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RestrictionProfile {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(RestrictionProfile::None),
            "letters" => Ok(RestrictionProfile::Letters),
            "digits" => Ok(RestrictionProfile::Digits),
            "punctuation" => Ok(RestrictionProfile::Punctuation),
            other => Err(ProfileError::Unknown(other.to_string())),
        }
    }
}

/// Space or one of the control codes 9 to 13.
pub fn is_leading_whitespace(byte: u8) -> bool {
    byte == b' ' || (9..=13).contains(&byte)
}

pub fn is_letter(byte: u8) -> bool {
    byte.is_ascii_alphabetic()
}

/// Accepts only `'0'`. Mining with the digits profile therefore never sees a
/// multi-valued digit; kept this narrow on purpose.
pub fn is_digit(byte: u8) -> bool {
    byte == b'0'
}

pub fn is_punctuation(byte: u8) -> bool {
    matches!(byte, b'!'..=b'/' | b':'..=b'@' | b'['..=b'`' | b'{'..=b'~')
}

/// The plain byte-cursor alphabet, 0 through 126.
pub fn is_printable(byte: u8) -> bool {
    byte < 127
}

/// A fixed-length symbolic byte buffer whose last byte is the terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolicByteBuffer {
    object: ObjectId,
    len: usize,
}

impl SymbolicByteBuffer {
    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn terminator_index(&self) -> usize {
        self.len - 1
    }
}

fn allocate<E: Engine>(engine: &mut E, length: usize) -> Result<SymbolicByteBuffer, HarnessError> {
    if length == 0 {
        return Err(HarnessError::Argument(
            "input length must be at least 1".to_string(),
        ));
    }
    let object = engine.make_symbolic(length, INPUT_LABEL);
    Ok(SymbolicByteBuffer {
        object,
        len: length,
    })
}

fn restrict<E: Engine>(
    engine: &mut E,
    buffer: &SymbolicByteBuffer,
    offset: usize,
    allowed: ByteSet,
) -> Result<(), EngineError> {
    engine.assume(Constraint::ByteIn {
        object: buffer.object,
        offset,
        allowed,
    })
}

/// Builds a `length`-byte symbolic buffer restricted to `profile`.
pub fn constrain_token_input<E: Engine>(
    engine: &mut E,
    length: usize,
    profile: RestrictionProfile,
) -> Result<SymbolicByteBuffer, HarnessError> {
    let buffer = allocate(engine, length)?;
    if profile != RestrictionProfile::None {
        for offset in 0..buffer.terminator_index() {
            restrict(engine, &buffer, offset, profile.allowed_at(offset))?;
        }
    }
    restrict(
        engine,
        &buffer,
        buffer.terminator_index(),
        ByteSet::single(TERMINATOR),
    )?;
    Ok(buffer)
}

/// Builds a `length`-byte symbolic buffer of printable bytes for byte-cursor
/// subjects.
pub fn constrain_printable_input<E: Engine>(
    engine: &mut E,
    length: usize,
) -> Result<SymbolicByteBuffer, HarnessError> {
    let buffer = allocate(engine, length)?;
    let printable = ByteSet::from_predicate(is_printable);
    for offset in 0..buffer.terminator_index() {
        restrict(engine, &buffer, offset, printable)?;
    }
    restrict(
        engine,
        &buffer,
        buffer.terminator_index(),
        ByteSet::single(TERMINATOR),
    )?;
    Ok(buffer)
}
