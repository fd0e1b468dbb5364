use crate::{Cursor, XmlErrorKind};

pub mod core;
pub mod cursor;
pub mod string;

/// Error produced while matching a single token.
///
/// Carries the byte offset (in the decoded stream) at which matching
/// failed. An `UnexpectedEndOfInput` kind means the buffer ended before
/// the token could be decided; the incremental front end treats that as
/// "wait for more bytes" rather than as a fatal error.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenError {
    pub kind: XmlErrorKind,
    pub offset: usize,
}

impl TokenError {
    pub fn new(kind: XmlErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }

    /// Input ran out at the end of `cursor`'s text.
    pub fn incomplete(cursor: Cursor) -> Self {
        Self {
            kind: XmlErrorKind::UnexpectedEndOfInput,
            offset: cursor.end_offset(),
        }
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self.kind, XmlErrorKind::UnexpectedEndOfInput)
    }
}

pub trait Parser<'a> {
    type Attribute;
    type Error;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error>;
}
