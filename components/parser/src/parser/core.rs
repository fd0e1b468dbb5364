use crate::parser::{Parser, TokenError};
use crate::Cursor;

pub fn optional<'a, T: Parser<'a, Error = TokenError>>(parser: T) -> Optional<T> {
    Optional(parser)
}

/// Zero-or-one.
///
/// An incomplete-input error is not recoverable: the construct may still
/// match once more bytes arrive, so it must abort the enclosing token.
pub struct Optional<T>(T);

impl<'a, T: Parser<'a, Error = TokenError>> Parser<'a> for Optional<T> {
    type Attribute = Option<T::Attribute>;
    type Error = TokenError;

    fn parse(&self, cur: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), TokenError> {
        match self.0.parse(cur) {
            Ok((attr, cur)) => Ok((Some(attr), cur)),
            Err(err) if err.is_incomplete() => Err(err),
            Err(_) => Ok((None, cur)),
        }
    }
}

macro_rules! def_seq {
    ($($i:tt: $t:ident),+ $(,)?) => {
        impl<
                'a,
                $($t: Parser<'a, Error = E>),*,
                E,
            > Parser<'a> for ($($t),*,)
        {
            type Attribute = ($($t::Attribute),*,);
            type Error = E;

            #[allow(non_snake_case)]
            fn parse(&self, cur: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
                $(let ($t, cur) = self.$i.parse(cur)?;)*
                Ok((($($t),*,), cur))
            }
        }
    };
}

def_seq!(0: T1);
def_seq!(0: T1, 1: T2);
def_seq!(0: T1, 1: T2, 2: T3);
def_seq!(0: T1, 1: T2, 2: T3, 3: T4);
