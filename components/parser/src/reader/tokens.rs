//! Token parsers, one per XML production.
//!
//! All parsers run over a [`Cursor`] and fail with a [`TokenError`]; an
//! `UnexpectedEndOfInput` kind means the buffer ended before the token
//! was complete, which the state machine turns into "wait for more
//! bytes" while the document is still being fed.

use sxl_chars::{XmlByte, XmlChar};

use crate::parser::core::optional;
use crate::parser::string::lit;
use crate::parser::{Parser, TokenError};
use crate::{Cursor, SyntaxError, XmlErrorKind};

fn syntax(err: SyntaxError, offset: usize) -> TokenError {
    TokenError::new(XmlErrorKind::Syntax(err), offset)
}

// 2.3 Common Syntactic Constructs

/// White Space
///
///     S ::= (#x20 | #x9 | #xD | #xA)+
///
pub(crate) struct SToken;

impl<'a> Parser<'a> for SToken {
    type Attribute = ();
    type Error = TokenError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        let size = cursor
            .rest_bytes()
            .iter()
            .take_while(|c| c.is_xml_whitespace())
            .count();
        if size == 0 {
            if cursor.is_at_end() {
                Err(TokenError::incomplete(cursor))
            } else {
                Err(syntax(SyntaxError::ExpectedWhitespace, cursor.offset()))
            }
        } else if size == cursor.rest().len() {
            // the run may continue in the next chunk
            Err(TokenError::incomplete(cursor))
        } else {
            Ok(((), cursor.advance(size)))
        }
    }
}

/// Consumes optional whitespace inside a tag. Reports whether any was
/// seen; incomplete when the run touches the end of the buffer.
pub(crate) fn skip_whitespace(cursor: Cursor) -> Result<(bool, Cursor), TokenError> {
    let size = cursor
        .rest_bytes()
        .iter()
        .take_while(|c| c.is_xml_whitespace())
        .count();
    if size > 0 && size == cursor.rest().len() {
        Err(TokenError::incomplete(cursor))
    } else {
        Ok((size > 0, cursor.advance(size)))
    }
}

///     Name ::= NameStartChar (NameChar)*
pub(crate) struct NameToken;

impl<'a> Parser<'a> for NameToken {
    type Attribute = &'a str;
    type Error = TokenError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        let mut chars = cursor.rest().char_indices();

        match chars.next() {
            Some((_, c)) if c.is_xml_name_start_char() => {}
            Some((_, c)) => {
                return Err(syntax(SyntaxError::IllegalNameStartChar(c), cursor.offset()))
            }
            None => return Err(TokenError::incomplete(cursor)),
        }

        if let Some((i, _)) = chars.find(|(_, c)| !c.is_xml_name_char()) {
            Ok(cursor.advance2(i))
        } else {
            // the name may continue in the next chunk
            Err(TokenError::incomplete(cursor))
        }
    }
}

///     Eq ::= S? '=' S?
pub(crate) struct EqToken;

impl<'a> Parser<'a> for EqToken {
    type Attribute = ();
    type Error = TokenError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        let (_, cursor) = skip_whitespace(cursor)?;
        match cursor.next_byte(0) {
            Some(b'=') => {}
            Some(_) => return Err(syntax(SyntaxError::ExpectedEquals, cursor.offset())),
            None => return Err(TokenError::incomplete(cursor)),
        }
        let (_, cursor) = skip_whitespace(cursor.advance(1))?;
        Ok(((), cursor))
    }
}

/// A quoted literal; returns the span between the quotes unprocessed.
pub(crate) fn take_quoted(cursor: Cursor) -> Result<(&str, usize, Cursor), TokenError> {
    let quote = match cursor.next_byte(0) {
        Some(q @ (b'"' | b'\'')) => q,
        Some(_) => return Err(syntax(SyntaxError::ExpectedAttrValue, cursor.offset())),
        None => return Err(TokenError::incomplete(cursor)),
    };
    let start = cursor.advance(1);
    match memchr::memchr(quote, start.rest_bytes()) {
        Some(end) => {
            let (value, after) = start.advance2(end);
            Ok((value, start.offset(), after.advance(1)))
        }
        None => Err(TokenError::incomplete(start)),
    }
}

/// Attribute value with its content offset; references inside are left
/// to the expansion pass.
#[derive(Copy, Clone, Debug)]
pub(crate) struct AttValue<'a> {
    pub(crate) raw: &'a str,
    pub(crate) offset: usize,
}

pub(crate) struct AttValueToken;

impl<'a> Parser<'a> for AttValueToken {
    type Attribute = AttValue<'a>;
    type Error = TokenError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        let (raw, offset, cursor) = take_quoted(cursor)?;
        for (i, c) in raw.char_indices() {
            if c == '<' {
                return Err(syntax(SyntaxError::LtInAttributeValue, offset + i));
            }
            if !c.is_xml_char() {
                return Err(syntax(SyntaxError::IllegalChar(c), offset + i));
            }
        }
        Ok((AttValue { raw, offset }, cursor))
    }
}

/// Characters up to a fixed terminator, all of which must be valid XML
/// characters. The terminator itself is not consumed.
pub(crate) struct TerminatedChars(pub(crate) &'static str);

impl<'a> Parser<'a> for TerminatedChars {
    type Attribute = &'a str;
    type Error = TokenError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        match memchr::memmem::find(cursor.rest_bytes(), self.0.as_bytes()) {
            Some(pos) => {
                let (span, after) = cursor.advance2(pos);
                if let Some((i, c)) = span.char_indices().find(|(_, c)| !c.is_xml_char()) {
                    return Err(syntax(SyntaxError::IllegalChar(c), cursor.offset() + i));
                }
                Ok((span, after))
            }
            None => Err(TokenError::incomplete(cursor)),
        }
    }
}

// 2.5 Comments

///     Comment ::= '<!--' ((Char - '-') | ('-' (Char - '-')))* '-->'
pub(crate) struct CommentToken;

impl<'a> Parser<'a> for CommentToken {
    type Attribute = &'a str;
    type Error = TokenError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), TokenError> {
        let (_, cursor) = lit("<!--").parse(cursor)?;
        let (comment, cursor) = TerminatedChars("--").parse(cursor)?;
        match cursor.next_byte(2) {
            Some(b'>') => Ok((comment, cursor.advance(3))),
            Some(_) => Err(syntax(SyntaxError::DoubleDashInComment, cursor.offset())),
            None => Err(TokenError::incomplete(cursor)),
        }
    }
}

// 2.6 Processing Instructions

///     PI       ::= '<?' PITarget (S (Char* - (Char* '?>' Char*)))? '?>'
///     PITarget ::= Name - (('X' | 'x') ('M' | 'm') ('L' | 'l'))
pub(crate) struct PIToken;

impl<'a> Parser<'a> for PIToken {
    type Attribute = (&'a str, Option<&'a str>);
    type Error = TokenError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), TokenError> {
        let (_, cursor) = lit("<?").parse(cursor)?;
        let target_offset = cursor.offset();
        let (target, cursor) = NameToken.parse(cursor)?;
        if target.eq_ignore_ascii_case("xml") {
            return Err(syntax(SyntaxError::InvalidPITarget, target_offset));
        }
        let (maybe_data, cursor) = optional((SToken, TerminatedChars("?>"))).parse(cursor)?;
        let (_, cursor) = lit("?>").parse(cursor)?;

        Ok(((target, maybe_data.map(|data| data.1)), cursor))
    }
}

// 2.7 CDATA Sections

///     CDSect  ::= CDStart CData CDEnd
///     CDStart ::= '<![CDATA['
///     CData   ::= (Char* - (Char* ']]>' Char*))
///     CDEnd   ::= ']]>'
pub(crate) struct CDataToken;

impl<'a> Parser<'a> for CDataToken {
    type Attribute = &'a str;
    type Error = TokenError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), TokenError> {
        let (_, cursor) = lit("<![CDATA[").parse(cursor)?;
        let (chars, cursor) = TerminatedChars("]]>").parse(cursor)?;
        let (_, cursor) = lit("]]>").parse(cursor)?;
        Ok((chars, cursor))
    }
}

// 2.8 Prolog

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct XmlDecl {
    pub(crate) version: String,
    pub(crate) encoding: Option<String>,
    pub(crate) standalone: Option<bool>,
}

///     XMLDecl ::= '<?xml' VersionInfo EncodingDecl? SDDecl? S? '?>'
pub(crate) struct XmlDeclToken;

impl<'a> Parser<'a> for XmlDeclToken {
    type Attribute = XmlDecl;
    type Error = TokenError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), TokenError> {
        let (_, cursor) = lit("<?xml").parse(cursor)?;
        let (version, cursor) = VersionInfoToken.parse(cursor)?;
        let (encoding, cursor) = optional(EncodingDeclToken).parse(cursor)?;
        let (standalone, cursor) = optional(SDDeclToken).parse(cursor)?;
        let (_, cursor) = skip_whitespace(cursor)?;
        let (_, cursor) = lit("?>").parse(cursor)?;

        Ok((
            XmlDecl {
                version: version.to_string(),
                encoding: encoding.map(|encoding| encoding.to_string()),
                standalone,
            },
            cursor,
        ))
    }
}

///     VersionInfo ::= S 'version' Eq ("'" VersionNum "'" | '"' VersionNum '"')
struct VersionInfoToken;

impl<'a> Parser<'a> for VersionInfoToken {
    type Attribute = &'a str;
    type Error = TokenError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), TokenError> {
        let (_, cursor) = SToken.parse(cursor)?;
        let (_, cursor) = lit("version").parse(cursor)?;
        let (_, cursor) = EqToken.parse(cursor)?;
        let (version, offset, cursor) = take_quoted(cursor)?;

        // VersionNum ::= '1.' [0-9]+
        let rest = version.strip_prefix("1.").unwrap_or("");
        if rest.is_empty() || !rest.bytes().all(|c| c.is_ascii_digit()) {
            return Err(syntax(
                SyntaxError::UnsupportedVersion(version.to_string()),
                offset,
            ));
        }
        if version != "1.0" {
            return Err(syntax(
                SyntaxError::UnsupportedVersion(version.to_string()),
                offset,
            ));
        }
        Ok((version, cursor))
    }
}

///     EncodingDecl ::= S 'encoding' Eq ('"' EncName '"' | "'" EncName "'")
struct EncodingDeclToken;

impl<'a> Parser<'a> for EncodingDeclToken {
    type Attribute = &'a str;
    type Error = TokenError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), TokenError> {
        let (_, cursor) = SToken.parse(cursor)?;
        let (_, cursor) = lit("encoding").parse(cursor)?;
        let (_, cursor) = EqToken.parse(cursor)?;
        let (label, offset, cursor) = take_quoted(cursor)?;

        // EncName ::= [A-Za-z] ([A-Za-z0-9._] | '-')*
        let valid = label
            .bytes()
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic())
            && label
                .bytes()
                .all(|c| c.is_ascii_alphanumeric() || c == b'.' || c == b'_' || c == b'-');
        if !valid {
            return Err(syntax(
                SyntaxError::ExpectToken("encoding name: [A-Za-z][A-Za-z0-9._-]*"),
                offset,
            ));
        }
        Ok((label, cursor))
    }
}

///     SDDecl ::= S 'standalone' Eq (("'" ('yes' | 'no') "'") | ('"' ('yes' | 'no') '"'))
struct SDDeclToken;

impl<'a> Parser<'a> for SDDeclToken {
    type Attribute = bool;
    type Error = TokenError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), TokenError> {
        let (_, cursor) = SToken.parse(cursor)?;
        let (_, cursor) = lit("standalone").parse(cursor)?;
        let (_, cursor) = EqToken.parse(cursor)?;
        let (value, offset, cursor) = take_quoted(cursor)?;

        match value {
            "yes" => Ok((true, cursor)),
            "no" => Ok((false, cursor)),
            _ => Err(syntax(SyntaxError::ExpectToken("'yes' or 'no'"), offset)),
        }
    }
}

// 4.1 Character and Entity References

/// Character Reference
///
///     CharRef ::= '&#' [0-9]+ ';' | '&#x' [0-9a-fA-F]+ ';'
pub(crate) struct CharRefToken;

impl<'a> Parser<'a> for CharRefToken {
    type Attribute = char;
    type Error = TokenError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), TokenError> {
        let (_, cursor) = lit("&#").parse(cursor)?;
        let (radix, cursor) = if cursor.has_next_str("x") {
            (16, cursor.advance(1))
        } else {
            (10, cursor)
        };

        let end = match memchr::memchr(b';', cursor.rest_bytes()) {
            Some(end) => end,
            None if cursor.rest_bytes().iter().all(u8::is_ascii_alphanumeric) => {
                return Err(TokenError::incomplete(cursor))
            }
            None => {
                return Err(syntax(
                    SyntaxError::InvalidCharacterReference(String::new()),
                    cursor.offset(),
                ))
            }
        };
        let (code, cursor) = cursor.advance2(end);
        u32::from_str_radix(code, radix)
            .ok()
            .and_then(|code| char::try_from(code).ok())
            .filter(|c| c.is_xml_char())
            .map(|c| (c, cursor.advance(1)))
            .ok_or_else(|| {
                syntax(
                    SyntaxError::InvalidCharacterReference(code.to_string()),
                    cursor.offset() - code.len(),
                )
            })
    }
}

/// Entity Reference
///
///     EntityRef ::= '&' Name ';'
pub(crate) struct EntityRefToken;

impl<'a> Parser<'a> for EntityRefToken {
    type Attribute = &'a str;
    type Error = TokenError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), TokenError> {
        let ((_, name, _), cursor) = (lit("&"), NameToken, lit(";")).parse(cursor)?;
        Ok((name, cursor))
    }
}

// 3.1 Start-Tags, End-Tags, and Empty-Element Tags

#[derive(Debug)]
pub(crate) struct RawAttribute<'a> {
    pub(crate) name: &'a str,
    pub(crate) name_offset: usize,
    pub(crate) value: AttValue<'a>,
}

#[derive(Debug)]
pub(crate) struct RawStag<'a> {
    pub(crate) name: &'a str,
    pub(crate) name_offset: usize,
    pub(crate) attributes: Vec<RawAttribute<'a>>,
    pub(crate) empty: bool,
}

/// Parses a start tag; the cursor sits just past the `<`.
///
/// Duplicate attribute names are rejected here, before the caller gets
/// to see the tag at all.
pub(crate) fn parse_stag(cursor: Cursor) -> Result<(RawStag<'_>, Cursor), TokenError> {
    let name_offset = cursor.offset();
    let (name, cursor) = NameToken.parse(cursor)?;
    let (mut saw_whitespace, mut cursor) = skip_whitespace(cursor)?;
    let mut attributes: Vec<RawAttribute> = vec![];

    loop {
        match cursor.next_byte(0) {
            None => return Err(TokenError::incomplete(cursor)),
            Some(b'/') => {
                return match cursor.next_byte(1) {
                    Some(b'>') => Ok((
                        RawStag {
                            name,
                            name_offset,
                            attributes,
                            empty: true,
                        },
                        cursor.advance(2),
                    )),
                    Some(_) => Err(syntax(SyntaxError::ExpectedElementEnd, cursor.offset())),
                    None => Err(TokenError::incomplete(cursor)),
                };
            }
            Some(b'>') => {
                return Ok((
                    RawStag {
                        name,
                        name_offset,
                        attributes,
                        empty: false,
                    },
                    cursor.advance(1),
                ));
            }
            Some(_) => {
                if !saw_whitespace {
                    return Err(syntax(SyntaxError::ExpectedWhitespace, cursor.offset()));
                }

                let name_offset = cursor.offset();
                let (attr_name, cur) = NameToken.parse(cursor)?;
                let (_, cur) = EqToken.parse(cur)?;
                let (value, cur) = AttValueToken.parse(cur)?;

                if attributes.iter().any(|attr| attr.name == attr_name) {
                    return Err(syntax(
                        SyntaxError::NonUniqueAttribute {
                            attribute: attr_name.to_string(),
                        },
                        name_offset,
                    ));
                }
                attributes.push(RawAttribute {
                    name: attr_name,
                    name_offset,
                    value,
                });

                let (ws, cur) = skip_whitespace(cur)?;
                saw_whitespace = ws;
                cursor = cur;
            }
        }
    }
}

/// Parses an end tag; the cursor sits just past the `</`.
pub(crate) fn parse_etag(cursor: Cursor) -> Result<(&str, Cursor), TokenError> {
    let (name, cursor) = NameToken.parse(cursor)?;
    let (_, cursor) = skip_whitespace(cursor)?;
    match cursor.next_byte(0) {
        Some(b'>') => Ok((name, cursor.advance(1))),
        Some(_) => Err(syntax(SyntaxError::ExpectedElementEnd, cursor.offset())),
        None => Err(TokenError::incomplete(cursor)),
    }
}

// 2.4 Character Data

/// Scans a run of character data up to the next `<` or `&`.
///
/// Without a terminator the run cannot be closed yet: with `at_eof` the
/// remaining text is the final run, otherwise the caller has to wait
/// for more input. A literal `]]>` inside character data is rejected.
pub(crate) fn scan_characters(
    cursor: Cursor,
    at_eof: bool,
) -> Result<(&str, Cursor), TokenError> {
    let rest = cursor.rest();
    for (i, c) in rest.char_indices() {
        match c {
            '<' | '&' => {
                return Ok(cursor.advance2(i));
            }
            ']' => {
                let tail = &rest[i..];
                if tail.starts_with("]]>") {
                    return Err(syntax(SyntaxError::CDataEndInContent, cursor.offset() + i));
                }
                if tail.len() < 3 && !at_eof && "]]>".starts_with(tail) {
                    // "]" or "]]" at the end of the buffer is undecided
                    return Err(TokenError::incomplete(cursor));
                }
            }
            c if !c.is_xml_char() => {
                return Err(syntax(SyntaxError::IllegalChar(c), cursor.offset() + i));
            }
            _ => {}
        }
    }

    if at_eof {
        Ok(cursor.advance2(rest.len()))
    } else {
        Err(TokenError::incomplete(cursor))
    }
}

/// Distinguishes "tail begins with `pat`" from "tail is a prefix of
/// `pat` and needs more bytes".
pub(crate) enum ConstructMatch {
    Yes,
    No,
    Undecided,
}

pub(crate) fn match_construct(cursor: Cursor, pat: &str) -> ConstructMatch {
    let rest = cursor.rest();
    if rest.len() >= pat.len() {
        if rest.starts_with(pat) {
            ConstructMatch::Yes
        } else {
            ConstructMatch::No
        }
    } else if pat.starts_with(rest) {
        ConstructMatch::Undecided
    } else {
        ConstructMatch::No
    }
}
