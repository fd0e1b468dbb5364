/// Read position inside a decoded text buffer.
///
/// Offsets are absolute within the decoded character stream, not within
/// the (possibly drained) buffer the `rest` slice points into.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Cursor<'a> {
    rest: &'a str,
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            rest: input,
            offset: 0,
        }
    }

    pub fn with_offset(input: &'a str, offset: usize) -> Self {
        Self {
            rest: input,
            offset,
        }
    }

    pub fn next_char(&self) -> Option<char> {
        self.rest.chars().next()
    }

    pub fn next_byte(&self, i: usize) -> Option<u8> {
        self.rest.as_bytes().get(i).copied()
    }

    #[inline]
    pub fn has_next_str(&self, pat: impl AsRef<str>) -> bool {
        self.rest.starts_with(pat.as_ref())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Offset just past the last byte of the remaining text.
    pub fn end_offset(&self) -> usize {
        self.offset + self.rest.len()
    }

    pub fn rest(&self) -> &'a str {
        self.rest
    }

    pub fn rest_bytes(&self) -> &'a [u8] {
        self.rest.as_bytes()
    }

    pub fn is_at_end(&self) -> bool {
        self.rest.is_empty()
    }

    pub fn advance(&self, bytes: usize) -> Self {
        let (_, rest) = self.rest.split_at(bytes);
        Self {
            rest,
            offset: self.offset + bytes,
        }
    }

    pub fn advance2(&self, bytes: usize) -> (&'a str, Self) {
        let (head, rest) = self.rest.split_at(bytes);
        (
            head,
            Self {
                rest,
                offset: self.offset + bytes,
            },
        )
    }
}
