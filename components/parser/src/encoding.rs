//! Incremental byte-to-text decoding.
//!
//! The decoder buffers input until the encoding can be decided, in this
//! order: explicit hint, byte-order mark, `<?xml ... encoding="..."?>`
//! pseudo-attribute, the `<\0` / `\0<` pattern of BOM-less UTF-16,
//! UTF-8 otherwise. After the decision bytes stream straight through;
//! a multi-byte sequence split across `feed` calls is carried over.

use crate::{EncodingError, SyntaxError, XmlErrorKind};

#[cfg(feature = "encoding")]
use encoding_rs::{Decoder, DecoderResult, Encoding, UTF_16BE, UTF_16LE, UTF_8};

use sxl_chars::XmlByte;

/// Bytes to buffer at most while waiting for the end of an XML
/// declaration; a declaration longer than this is decoded as UTF-8.
const PRESCAN_LIMIT: usize = 1024;

pub(crate) struct StreamDecoder {
    state: State,
    hint: Option<String>,
}

enum State {
    Sniffing { pending: Vec<u8> },
    Running(Running),
    Done,
    Failed,
}

#[cfg(feature = "encoding")]
struct Running {
    decoder: Decoder,
    name: &'static str,
}

#[cfg(not(feature = "encoding"))]
struct Running {
    /// Trailing bytes of an incomplete UTF-8 sequence from the last chunk.
    carry: Vec<u8>,
    /// Not yet past the first chunk, where a BOM may be dropped.
    at_start: bool,
}

impl StreamDecoder {
    pub(crate) fn new(hint: Option<String>) -> Self {
        Self {
            state: State::Sniffing { pending: vec![] },
            hint,
        }
    }

    pub(crate) fn feed(&mut self, chunk: &[u8], out: &mut String) -> Result<(), XmlErrorKind> {
        self.advance(chunk, false, out)
    }

    pub(crate) fn finish(&mut self, out: &mut String) -> Result<(), XmlErrorKind> {
        self.advance(&[], true, out)
    }

    fn advance(&mut self, chunk: &[u8], last: bool, out: &mut String) -> Result<(), XmlErrorKind> {
        // on any error the state stays Failed
        let state = std::mem::replace(&mut self.state, State::Failed);
        match state {
            State::Failed | State::Done => {
                self.state = state;
                Ok(())
            }
            State::Running(mut running) => {
                running.decode(chunk, last, out)?;
                self.state = if last {
                    State::Done
                } else {
                    State::Running(running)
                };
                Ok(())
            }
            State::Sniffing { mut pending } => {
                pending.extend_from_slice(chunk);
                match decide(&pending, self.hint.as_deref(), last)? {
                    Some(mut running) => {
                        running.decode(&pending, last, out)?;
                        self.state = if last {
                            State::Done
                        } else {
                            State::Running(running)
                        };
                        Ok(())
                    }
                    None => {
                        self.state = State::Sniffing { pending };
                        Ok(())
                    }
                }
            }
        }
    }
}

/// Decides the stream encoding, or returns `Ok(None)` when more bytes
/// are needed.
fn decide(
    pending: &[u8],
    hint: Option<&str>,
    last: bool,
) -> Result<Option<Running>, XmlErrorKind> {
    if let Some(label) = hint {
        return Running::for_label(label).map(Some);
    }

    if !last {
        // both BOM detection and the UTF-16 pattern need a stable
        // three-byte window
        if pending.len() < 3 {
            return Ok(None);
        }
        if let Some(prefix) = ascii_prefix_overlap(pending, b"<?xml ") {
            if prefix {
                return Ok(None);
            }
        }
        if pending.starts_with(b"<?xml") && is_decl_boundary(pending[5]) {
            // wait for the whole declaration to read its encoding label
            if memchr::memmem::find(pending, b"?>").is_none() && pending.len() <= PRESCAN_LIMIT {
                return Ok(None);
            }
        }
    }

    Running::sniff(pending)
}

/// `Some(true)` if `data` is a proper prefix of `pat` (undecidable yet),
/// `Some(false)` if it diverges within the window.
fn ascii_prefix_overlap(data: &[u8], pat: &[u8]) -> Option<bool> {
    if data.len() >= pat.len() {
        None
    } else {
        Some(pat.starts_with(data))
    }
}

fn is_decl_boundary(c: u8) -> bool {
    c.is_xml_whitespace()
}

/// Extracts the `encoding` pseudo-attribute label from the raw bytes of
/// an XML or text declaration.
fn declared_label(decl: &[u8]) -> Option<&[u8]> {
    let key = memchr::memmem::find(decl, b"encoding")?;
    let mut rest = &decl[key + b"encoding".len()..];
    while let [c, tail @ ..] = rest {
        if c.is_xml_whitespace() {
            rest = tail;
        } else {
            break;
        }
    }
    let quote = match rest {
        [b'=', tail @ ..] => {
            let mut tail = tail;
            while let [c, inner @ ..] = tail {
                if c.is_xml_whitespace() {
                    tail = inner;
                } else {
                    break;
                }
            }
            rest = tail;
            match rest {
                [q @ (b'"' | b'\''), tail @ ..] => {
                    rest = tail;
                    *q
                }
                _ => return None,
            }
        }
        _ => return None,
    };
    let end = memchr::memchr(quote, rest)?;
    Some(&rest[..end])
}

#[cfg(feature = "encoding")]
impl Running {
    fn for_label(label: &str) -> Result<Self, XmlErrorKind> {
        match Encoding::for_label(label.as_bytes()) {
            Some(encoding) => Ok(Self::for_encoding(encoding)),
            None => Err(XmlErrorKind::Encoding(EncodingError::UnsupportedEncoding(
                label.to_string(),
            ))),
        }
    }

    fn for_encoding(encoding: &'static Encoding) -> Self {
        Self {
            // the decoder re-checks for a BOM itself and drops it
            decoder: encoding.new_decoder(),
            name: encoding.name(),
        }
    }

    fn sniff(pending: &[u8]) -> Result<Option<Self>, XmlErrorKind> {
        if let Some((encoding, _)) = Encoding::for_bom(pending) {
            return Ok(Some(Self::for_encoding(encoding)));
        }
        if pending.starts_with(b"<\0") {
            return Ok(Some(Self::for_encoding(UTF_16LE)));
        }
        if pending.starts_with(b"\0<") {
            return Ok(Some(Self::for_encoding(UTF_16BE)));
        }
        if pending.starts_with(b"<?xml") && pending.get(5).copied().map_or(false, is_decl_boundary)
        {
            if let Some(end) = memchr::memmem::find(pending, b"?>") {
                if let Some(label) = declared_label(&pending[..end]) {
                    let label = std::str::from_utf8(label).map_err(|_| {
                        XmlErrorKind::Encoding(EncodingError::UnsupportedEncoding(
                            String::from_utf8_lossy(label).into_owned(),
                        ))
                    })?;
                    return Self::for_label(label).map(Some);
                }
            }
        }
        Ok(Some(Self::for_encoding(UTF_8)))
    }

    fn decode(&mut self, chunk: &[u8], last: bool, out: &mut String) -> Result<(), XmlErrorKind> {
        let mut read = 0;
        loop {
            out.reserve(chunk.len() - read + 16);
            let (result, consumed) =
                self.decoder
                    .decode_to_string_without_replacement(&chunk[read..], out, last);
            read += consumed;
            match result {
                DecoderResult::InputEmpty => return Ok(()),
                DecoderResult::OutputFull => continue,
                DecoderResult::Malformed(..) => {
                    return Err(XmlErrorKind::Encoding(EncodingError::MalformedSequence {
                        encoding: self.name,
                    }))
                }
            }
        }
    }
}

#[cfg(not(feature = "encoding"))]
impl Running {
    fn for_label(label: &str) -> Result<Self, XmlErrorKind> {
        if label.eq_ignore_ascii_case("utf-8") || label.eq_ignore_ascii_case("utf8") {
            Ok(Self {
                carry: vec![],
                at_start: true,
            })
        } else {
            Err(XmlErrorKind::Encoding(EncodingError::UnsupportedEncoding(
                label.to_string(),
            )))
        }
    }

    fn sniff(pending: &[u8]) -> Result<Option<Self>, XmlErrorKind> {
        if pending.starts_with(b"<\0")
            || pending.starts_with(b"\0<")
            || pending.starts_with(b"\xFE\xFF")
            || pending.starts_with(b"\xFF\xFE")
        {
            return Err(XmlErrorKind::Encoding(EncodingError::UnsupportedEncoding(
                "UTF-16".to_string(),
            )));
        }
        if pending.starts_with(b"<?xml") && pending.get(5).copied().map_or(false, is_decl_boundary)
        {
            if let Some(end) = memchr::memmem::find(pending, b"?>") {
                if let Some(label) = declared_label(&pending[..end]) {
                    let label = String::from_utf8_lossy(label);
                    return Self::for_label(&label).map(Some);
                }
            }
        }
        Ok(Some(Self {
            carry: vec![],
            at_start: true,
        }))
    }

    fn decode(&mut self, chunk: &[u8], last: bool, out: &mut String) -> Result<(), XmlErrorKind> {
        let malformed = || {
            XmlErrorKind::Encoding(EncodingError::MalformedSequence { encoding: "UTF-8" })
        };

        let bytes;
        let input: &[u8] = if self.carry.is_empty() {
            chunk
        } else {
            let mut joined = std::mem::take(&mut self.carry);
            joined.extend_from_slice(chunk);
            bytes = joined;
            &bytes
        };

        let mut input = input;
        if self.at_start && !input.is_empty() {
            self.at_start = false;
            if input.starts_with(b"\xEF\xBB\xBF") {
                input = &input[3..];
            }
        }

        match std::str::from_utf8(input) {
            Ok(text) => {
                out.push_str(text);
                Ok(())
            }
            Err(err) => {
                let (valid, rest) = input.split_at(err.valid_up_to());
                out.push_str(std::str::from_utf8(valid).expect("validated prefix"));
                if err.error_len().is_none() && !last {
                    self.carry = rest.to_vec();
                    Ok(())
                } else {
                    Err(malformed())
                }
            }
        }
    }
}

/// Whether an encoding label names a supported encoding.
pub(crate) fn known_label(label: &str) -> bool {
    #[cfg(feature = "encoding")]
    {
        encoding_rs::Encoding::for_label(label.as_bytes()).is_some()
    }
    #[cfg(not(feature = "encoding"))]
    {
        label.eq_ignore_ascii_case("utf-8") || label.eq_ignore_ascii_case("utf8")
    }
}

/// Decodes the payload of an external parsed entity and strips its text
/// declaration, if any.
pub(crate) fn decode_entity(bytes: &[u8]) -> Result<String, XmlErrorKind> {
    let mut decoder = StreamDecoder::new(None);
    let mut text = String::new();
    decoder.feed(bytes, &mut text)?;
    decoder.finish(&mut text)?;

    if text.starts_with("<?xml")
        && text[5..]
            .chars()
            .next()
            .map_or(false, |c| c == ' ' || c == '\t' || c == '\r' || c == '\n')
    {
        match text.find("?>") {
            Some(end) => Ok(text[end + 2..].to_string()),
            None => Err(XmlErrorKind::Syntax(SyntaxError::ExpectToken("?>"))),
        }
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&[u8]], hint: Option<&str>) -> Result<String, XmlErrorKind> {
        let mut decoder = StreamDecoder::new(hint.map(|h| h.to_string()));
        let mut out = String::new();
        for chunk in chunks {
            decoder.feed(chunk, &mut out)?;
        }
        decoder.finish(&mut out)?;
        Ok(out)
    }

    #[test]
    fn plain_utf8() {
        assert_eq!(decode_all(&[b"<a/>"], None).unwrap(), "<a/>");
    }

    #[test]
    fn utf8_bom_is_stripped() {
        assert_eq!(decode_all(&[b"\xEF\xBB\xBF<a/>"], None).unwrap(), "<a/>");
    }

    #[test]
    fn multibyte_sequence_split_across_chunks() {
        // "¤" is C2 A4
        let out = decode_all(&[b"<a>\xC2", b"\xA4</a>"], None).unwrap();
        assert_eq!(out, "<a>\u{A4}</a>");
    }

    #[test]
    fn malformed_utf8_fails() {
        assert!(matches!(
            decode_all(&[b"<a>\xC2<"], None),
            Err(XmlErrorKind::Encoding(EncodingError::MalformedSequence { .. }))
        ));
    }

    #[test]
    fn dangling_partial_sequence_fails_at_finish() {
        assert!(decode_all(&[b"<a>\xC2"], None).is_err());
    }

    #[cfg(feature = "encoding")]
    #[test]
    fn declared_latin1_label() {
        let out = decode_all(
            &[b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>\xA4</a>"],
            None,
        )
        .unwrap();
        assert_eq!(out, "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>\u{A4}</a>");
    }

    #[cfg(feature = "encoding")]
    #[test]
    fn declaration_split_across_chunks() {
        let first: &[u8] = b"<?xml version=\"1.0\" enco";
        let second: &[u8] = b"ding=\"ISO-8859-1\"?><a>\xA4</a>";
        let out = decode_all(&[first, second], None).unwrap();
        assert!(out.ends_with("<a>\u{A4}</a>"));
    }

    #[cfg(feature = "encoding")]
    #[test]
    fn utf16_little_endian_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<a/>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_all(&[&bytes], None).unwrap(), "<a/>");
    }

    #[cfg(feature = "encoding")]
    #[test]
    fn utf16_without_bom_is_sniffed() {
        let mut bytes = vec![];
        for unit in "<a/>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_all(&[&bytes], None).unwrap(), "<a/>");
    }

    #[test]
    fn unknown_label_fails() {
        assert!(matches!(
            decode_all(&[b"<a/>"], Some("UTF-128")),
            Err(XmlErrorKind::Encoding(EncodingError::UnsupportedEncoding(label))) if label == "UTF-128"
        ));
    }

    #[test]
    fn hint_overrides_sniffing() {
        let out = decode_all(&[b"<a/>"], Some("utf-8")).unwrap();
        assert_eq!(out, "<a/>");
    }

    #[test]
    fn entity_text_declaration_is_stripped() {
        let text = decode_entity(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>payload").unwrap();
        assert_eq!(text, "payload");
    }
}
