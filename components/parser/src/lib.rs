//! Streaming XML event parser.
//!
//! A non-validating XML 1.0 parser with namespace support. Input bytes
//! are fed incrementally (or as one buffer) and come out the other end
//! as a flat sequence of [`XmlEvent`]s; no tree is ever built. See
//! [`FeedParser`] for the push-bytes front end and [`Reader`] for
//! pulling events out of a complete document.
//!
//! ```
//! use sxl_parser::{Reader, XmlEvent};
//!
//! let mut reader = Reader::from_str("<greeting lang='en'>hi</greeting>");
//! while let Some(event) = reader.next().unwrap() {
//!     if let XmlEvent::Characters(text) = event {
//!         assert_eq!(text, "hi");
//!     }
//! }
//! ```

use std::fmt;

use parser::cursor::Cursor;

pub use entity::{Entities, ExternalEntityResolver, ResolvedEntity};
pub use namespace::{Namespace, XML_NAMESPACE_URI, XMLNS_NAMESPACE_URI};
pub use push::{parse_bytes_into, parse_str_into, XmlHandler};
pub use reader::{FeedParser, ParseStep, Reader};

mod encoding;
mod entity;
mod namespace;
pub mod parser;
mod push;
mod reader;

/// Position inside the decoded character stream.
///
/// `offset` counts bytes of decoded UTF-8; `line` and `column` are
/// 1-based, with columns counted in characters.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct TextPosition {
    pub offset: usize,
    pub line: u64,
    pub column: u64,
}

impl TextPosition {
    pub fn start() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Advances over `text`, which must be the exact decoded text
    /// between the old and the new position.
    pub(crate) fn advance_over(&mut self, text: &str) {
        self.offset += text.len();
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// An element or attribute name, resolved against the in-scope
/// namespace declarations.
///
/// With namespace processing disabled the raw qualified name is passed
/// through in `local` and both `prefix` and `namespace` stay `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct Name {
    pub prefix: Option<String>,
    pub local: String,
    pub namespace: Option<Namespace>,
}

impl Name {
    /// Name without prefix and namespace.
    pub fn plain(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
            namespace: None,
        }
    }

    pub fn prefixed(
        prefix: impl Into<String>,
        local: impl Into<String>,
        namespace: Namespace,
    ) -> Self {
        Self {
            prefix: Some(prefix.into()),
            local: local.into(),
            namespace: Some(namespace),
        }
    }

    pub fn in_namespace(local: impl Into<String>, namespace: Namespace) -> Self {
        Self {
            prefix: None,
            local: local.into(),
            namespace: Some(namespace),
        }
    }

    /// The name as written in the document.
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local),
            None => self.local.clone(),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, "{}:{}", prefix, self.local)
        } else {
            f.write_str(&self.local)
        }
    }
}

/// Attribute of a start tag, with its value fully expanded.
#[derive(Clone, PartialEq)]
pub struct Attribute {
    pub name: Name,
    pub value: String,
}

impl Attribute {
    pub fn new(name: Name, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("value", &self.value)
            .finish()
    }
}

/// Event of the parser.
///
/// Events are emitted in document order. Character data between a
/// [`XmlEvent::CDataStart`]/[`XmlEvent::CDataEnd`] pair stems from a
/// CDATA section and was taken verbatim.
#[derive(Clone, Debug, PartialEq)]
pub enum XmlEvent {
    /// XML declaration (`<?xml version='1.0' ...?>`).
    StartDocument {
        version: String,
        encoding: Option<String>,
        standalone: Option<bool>,
    },
    StartElement {
        name: Name,
        attributes: Vec<Attribute>,
    },
    EndElement {
        name: Name,
    },
    /// Text content, reported verbatim. Consecutive runs are not
    /// coalesced; a reference produces its own event.
    Characters(String),
    CDataStart,
    CDataEnd,
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: Option<String>,
    },
    /// A namespace declaration coming into scope; emitted before the
    /// `StartElement` that carries it.
    StartNamespace {
        prefix: Option<String>,
        uri: Namespace,
    },
    /// The matching declaration going out of scope; emitted after the
    /// owning `EndElement`.
    EndNamespace {
        prefix: Option<String>,
    },
    /// An external entity reference that was left unexpanded because
    /// the resolver declined it (or none was configured).
    EntityReference(String),
}

impl XmlEvent {
    pub fn characters(text: impl Into<String>) -> Self {
        XmlEvent::Characters(text.into())
    }

    pub fn comment(text: impl Into<String>) -> Self {
        XmlEvent::Comment(text.into())
    }

    pub fn pi(target: impl Into<String>, data: Option<&str>) -> Self {
        XmlEvent::ProcessingInstruction {
            target: target.into(),
            data: data.map(|d| d.to_string()),
        }
    }

    pub fn start_element(name: Name, attributes: Vec<Attribute>) -> Self {
        XmlEvent::StartElement { name, attributes }
    }

    pub fn end_element(name: Name) -> Self {
        XmlEvent::EndElement { name }
    }

    pub fn entity_reference(name: impl Into<String>) -> Self {
        XmlEvent::EntityReference(name.into())
    }
}

/// Parser options.
///
/// `preserve_whitespace` documents the contract that character data is
/// never normalized; the parser has no code path that would touch it.
#[derive(Clone, Debug)]
pub struct ParserConfig {
    pub namespace_aware: bool,
    pub preserve_whitespace: bool,
    pub normalize_attribute_values: bool,
    pub max_entity_expansion_depth: usize,
    pub max_entity_expansion_size: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            namespace_aware: true,
            preserve_whitespace: true,
            normalize_attribute_values: false,
            max_entity_expansion_depth: 20,
            max_entity_expansion_size: 1 << 20,
        }
    }
}

impl ParserConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace_aware(mut self, value: bool) -> Self {
        self.namespace_aware = value;
        self
    }

    pub fn normalize_attribute_values(mut self, value: bool) -> Self {
        self.normalize_attribute_values = value;
        self
    }

    pub fn max_entity_expansion_depth(mut self, value: usize) -> Self {
        self.max_entity_expansion_depth = value;
        self
    }

    pub fn max_entity_expansion_size(mut self, value: usize) -> Self {
        self.max_entity_expansion_size = value;
        self
    }
}

/// Fatal parsing error.
///
/// The first error ends the parse; the instance stays in the failed
/// state and keeps returning the same error.
#[derive(Clone, Debug, PartialEq)]
pub struct XmlError {
    kind: XmlErrorKind,
    position: TextPosition,
}

impl XmlError {
    pub fn new(kind: XmlErrorKind, position: TextPosition) -> Self {
        Self { kind, position }
    }

    pub fn kind(&self) -> &XmlErrorKind {
        &self.kind
    }

    pub fn position(&self) -> TextPosition {
        self.position
    }
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {} (offset {})",
            self.kind, self.position, self.position.offset
        )
    }
}

impl std::error::Error for XmlError {}

#[derive(Clone, Debug, PartialEq)]
pub enum XmlErrorKind {
    Encoding(EncodingError),
    Syntax(SyntaxError),
    Namespace(NamespaceError),
    Entity(EntityError),
    /// Input ended while a construct or the document was still open.
    UnexpectedEndOfInput,
}

impl XmlErrorKind {
    pub(crate) fn expect_token(token: &'static str) -> Self {
        XmlErrorKind::Syntax(SyntaxError::ExpectToken(token))
    }

    pub(crate) fn unexpected_char(c: char) -> Self {
        XmlErrorKind::Syntax(SyntaxError::UnexpectedCharacter(c))
    }
}

impl fmt::Display for XmlErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmlErrorKind::Encoding(err) => write!(f, "encoding error: {}", err),
            XmlErrorKind::Syntax(err) => write!(f, "syntax error: {}", err),
            XmlErrorKind::Namespace(err) => write!(f, "namespace error: {}", err),
            XmlErrorKind::Entity(err) => write!(f, "entity error: {}", err),
            XmlErrorKind::UnexpectedEndOfInput => f.write_str("unexpected end of input"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EncodingError {
    UnsupportedEncoding(String),
    MalformedSequence { encoding: &'static str },
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingError::UnsupportedEncoding(label) => {
                write!(f, "unsupported encoding {:?}", label)
            }
            EncodingError::MalformedSequence { encoding } => {
                write!(f, "malformed {} byte sequence", encoding)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SyntaxError {
    IllegalNameStartChar(char),
    IllegalChar(char),
    UnexpectedCharacter(char),
    ExpectToken(&'static str),
    ExpectedElementStart,
    ExpectedElementEnd,
    ExpectedAttrValue,
    ExpectedEquals,
    ExpectedWhitespace,
    WrongETagName { expected: String, found: String },
    ETagAfterRootElement,
    ExpectedDocumentEnd,
    NonUniqueAttribute { attribute: String },
    LtInAttributeValue,
    InvalidCharacterReference(String),
    InvalidPITarget,
    DoubleDashInComment,
    CDataEndInContent,
    UnsupportedVersion(String),
    IllegalName { name: String },
    MisplacedDoctype,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxError::IllegalNameStartChar(c) => {
                write!(f, "character {:?} cannot start a name", c)
            }
            SyntaxError::IllegalChar(c) => write!(f, "character {:?} is not allowed in XML", c),
            SyntaxError::UnexpectedCharacter(c) => write!(f, "unexpected character {:?}", c),
            SyntaxError::ExpectToken(token) => write!(f, "expected {:?}", token),
            SyntaxError::ExpectedElementStart => f.write_str("expected start of tag"),
            SyntaxError::ExpectedElementEnd => f.write_str("expected end of tag"),
            SyntaxError::ExpectedAttrValue => f.write_str("expected quoted attribute value"),
            SyntaxError::ExpectedEquals => f.write_str("expected '='"),
            SyntaxError::ExpectedWhitespace => f.write_str("expected whitespace"),
            SyntaxError::WrongETagName { expected, found } => {
                write!(f, "closing tag {:?} does not match open {:?}", found, expected)
            }
            SyntaxError::ETagAfterRootElement => f.write_str("closing tag after the root element"),
            SyntaxError::ExpectedDocumentEnd => {
                f.write_str("content not allowed after the root element")
            }
            SyntaxError::NonUniqueAttribute { attribute } => {
                write!(f, "attribute {:?} appears twice in one tag", attribute)
            }
            SyntaxError::LtInAttributeValue => f.write_str("'<' is not allowed in attribute values"),
            SyntaxError::InvalidCharacterReference(code) => {
                write!(f, "invalid character reference {:?}", code)
            }
            SyntaxError::InvalidPITarget => {
                f.write_str("'xml' is not a valid processing instruction target")
            }
            SyntaxError::DoubleDashInComment => f.write_str("'--' is not allowed inside a comment"),
            SyntaxError::CDataEndInContent => {
                f.write_str("']]>' is not allowed in character data")
            }
            SyntaxError::UnsupportedVersion(version) => {
                write!(f, "unsupported XML version {:?}", version)
            }
            SyntaxError::IllegalName { name } => write!(f, "illegal name {:?}", name),
            SyntaxError::MisplacedDoctype => f.write_str("misplaced document type declaration"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NamespaceError {
    UnboundPrefix(String),
    ReservedPrefix(String),
    IllegalNamespaceUri(String),
    DuplicateAttribute { namespace: String, local: String },
}

impl fmt::Display for NamespaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceError::UnboundPrefix(prefix) => {
                write!(f, "prefix {:?} is not bound to a namespace", prefix)
            }
            NamespaceError::ReservedPrefix(prefix) => {
                write!(f, "prefix {:?} is reserved", prefix)
            }
            NamespaceError::IllegalNamespaceUri(uri) => {
                write!(f, "namespace URI {:?} cannot be bound here", uri)
            }
            NamespaceError::DuplicateAttribute { namespace, local } => {
                write!(f, "attribute {{{}}}{} appears twice in one tag", namespace, local)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EntityError {
    Undefined(String),
    Recursive(String),
    DepthLimitExceeded(usize),
    SizeLimitExceeded(usize),
    Redefinition(String),
    ExternalInAttributeValue(String),
    UnparsedReference(String),
    UnbalancedReplacement(String),
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityError::Undefined(name) => write!(f, "entity {:?} is not defined", name),
            EntityError::Recursive(name) => write!(f, "entity {:?} expands to itself", name),
            EntityError::DepthLimitExceeded(limit) => {
                write!(f, "entity expansion deeper than {} levels", limit)
            }
            EntityError::SizeLimitExceeded(limit) => {
                write!(f, "entity expansion larger than {} characters", limit)
            }
            EntityError::Redefinition(name) => {
                write!(f, "built-in entity {:?} cannot be redefined", name)
            }
            EntityError::ExternalInAttributeValue(name) => {
                write!(f, "external entity {:?} referenced in an attribute value", name)
            }
            EntityError::UnparsedReference(name) => {
                write!(f, "unparsed entity {:?} referenced as content", name)
            }
            EntityError::UnbalancedReplacement(name) => {
                write!(f, "replacement text of entity {:?} is not well-balanced", name)
            }
        }
    }
}
