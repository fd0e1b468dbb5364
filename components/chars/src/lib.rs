//! Character classes of the XML 1.0 grammar.
//!
//! The lexer decides almost everything by looking at a single byte or
//! character, so the predicates here are the hot path of the whole
//! toolkit. ASCII is answered without touching the range tables.

/// Character classes on raw bytes.
///
/// Only classes that are fully decidable within ASCII live here; the
/// lexer uses them while scanning byte-wise.
pub trait XmlByte {
    /// https://www.w3.org/TR/REC-xml/#NT-S
    fn is_xml_whitespace(&self) -> bool;
}

/// Character classes on decoded characters.
pub trait XmlChar: Copy {
    /// https://www.w3.org/TR/REC-xml/#NT-S
    fn is_xml_whitespace(&self) -> bool;

    /// https://www.w3.org/TR/REC-xml/#NT-Char
    fn is_xml_char(&self) -> bool;

    /// https://www.w3.org/TR/REC-xml/#NT-NameStartChar
    fn is_xml_name_start_char(&self) -> bool;

    /// https://www.w3.org/TR/REC-xml/#NT-NameChar
    fn is_xml_name_char(&self) -> bool;

    /// `PubidChar ::= #x20 | #xD | #xA | [a-zA-Z0-9] | [-'()+,./:=?;!*#@$_%]`
    fn is_xml_pubid_char(&self) -> bool;

    /// Character data that needs no further look: a valid `Char` that is
    /// neither `<`, `&`, nor `]` (the latter starts a possible `]]>`).
    fn is_xml_plain_content_char(&self) -> bool;
}

impl XmlByte for u8 {
    #[inline]
    fn is_xml_whitespace(&self) -> bool {
        matches!(*self, b'\x20' | b'\x09' | b'\x0D' | b'\x0A')
    }
}

impl XmlChar for char {
    #[inline]
    fn is_xml_whitespace(&self) -> bool {
        matches!(*self, '\u{20}' | '\u{9}' | '\u{D}' | '\u{A}')
    }

    #[inline]
    fn is_xml_char(&self) -> bool {
        matches!(*self,
            '\u{9}' | '\u{A}' | '\u{D}'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}')
    }

    #[inline]
    fn is_xml_name_start_char(&self) -> bool {
        matches!(*self,
            ':' | '_' | 'A'..='Z' | 'a'..='z'
            | '\u{C0}'..='\u{D6}'
            | '\u{D8}'..='\u{F6}'
            | '\u{F8}'..='\u{2FF}'
            | '\u{370}'..='\u{37D}'
            | '\u{37F}'..='\u{1FFF}'
            | '\u{200C}'..='\u{200D}'
            | '\u{2070}'..='\u{218F}'
            | '\u{2C00}'..='\u{2FEF}'
            | '\u{3001}'..='\u{D7FF}'
            | '\u{F900}'..='\u{FDCF}'
            | '\u{FDF0}'..='\u{FFFD}'
            | '\u{10000}'..='\u{EFFFF}')
    }

    #[inline]
    fn is_xml_name_char(&self) -> bool {
        self.is_xml_name_start_char()
            || matches!(*self,
                '-' | '.' | '0'..='9'
                | '\u{B7}'
                | '\u{300}'..='\u{36F}'
                | '\u{203F}'..='\u{2040}')
    }

    #[inline]
    fn is_xml_pubid_char(&self) -> bool {
        matches!(*self,
            '\u{20}' | '\u{D}' | '\u{A}'
            | 'a'..='z' | 'A'..='Z' | '0'..='9')
            || "-'()+,./:=?;!*#@$_%".contains(*self)
    }

    #[inline]
    fn is_xml_plain_content_char(&self) -> bool {
        if self.is_ascii() {
            matches!(*self, '\u{9}' | '\u{A}' | '\u{D}' | '\u{20}'..='\u{7F}')
                && !matches!(*self, '<' | '&' | ']')
        } else {
            self.is_xml_char()
        }
    }
}
