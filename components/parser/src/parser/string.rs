use crate::parser::{Parser, TokenError};
use crate::{Cursor, XmlErrorKind};

pub fn lit(lit: &'static str) -> Lit {
    Lit { lit }
}

pub struct Lit {
    lit: &'static str,
}

impl<'a> Parser<'a> for Lit {
    type Attribute = ();
    type Error = TokenError;

    fn parse(&self, cur: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        if cur.has_next_str(self.lit) {
            Ok(((), cur.advance(self.lit.len())))
        } else if self.lit.as_bytes().starts_with(cur.rest_bytes()) {
            // buffer holds a proper prefix of the literal
            Err(TokenError::incomplete(cur))
        } else {
            Err(TokenError::new(
                XmlErrorKind::expect_token(self.lit),
                cur.offset(),
            ))
        }
    }
}
