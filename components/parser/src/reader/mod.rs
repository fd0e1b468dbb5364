//! The parser state machine.
//!
//! Bytes go in through [`FeedParser::feed`], decoded text accumulates
//! in a buffer, and the machine pulls events out of it one token at a
//! time. A token that runs into the end of the buffer is abandoned and
//! retried once more bytes arrive; only `finish` turns a dangling token
//! into an error. Entity references in content push an expansion frame
//! whose replacement text is parsed like document content.

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, trace};

use sxl_chars::XmlByte;

use crate::encoding::{decode_entity, known_label, StreamDecoder};
use crate::entity::EntityDef;
use crate::namespace::stack::NamespaceStack;
use crate::namespace::QName;
use crate::parser::{Parser, TokenError};
use crate::reader::dtd::{DoctypeDecl, DoctypeToken, EntityDeclDef, EntityKind, ExternalId};
use crate::reader::tokens::{
    match_construct, parse_etag, parse_stag, scan_characters, CDataToken, CharRefToken,
    CommentToken, ConstructMatch, EntityRefToken, PIToken, RawStag, XmlDeclToken,
};
use crate::{
    Attribute, Cursor, Entities, EntityError, EncodingError, ExternalEntityResolver, Name,
    NamespaceError, ParserConfig, ResolvedEntity, SyntaxError, TextPosition, XmlError,
    XmlErrorKind, XmlEvent,
};

pub(crate) mod dtd;
pub(crate) mod tokens;

/// Result of pulling on the parser.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseStep {
    Event(XmlEvent),
    /// The buffered input is exhausted mid-token; feed more bytes or
    /// call [`FeedParser::finish`].
    NeedMoreInput,
    /// The document ended well-formed; no further events will come.
    Finished,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum MachineState {
    /// Nothing consumed yet; an XML declaration is still possible.
    Initial,
    Prolog,
    /// Inside the root element; nesting is tracked by the element
    /// stack, not by more states.
    Content,
    Epilog,
    Finished,
}

struct OpenElement {
    /// Name exactly as written, for matching the end tag.
    raw_name: String,
    name: Name,
    /// Prefixes declared on this element, for the EndNamespace events.
    ns_decl_prefixes: Vec<Option<String>>,
}

/// One level of entity expansion, parsed like document content.
struct EntityFrame {
    name: String,
    text: Arc<str>,
    offset: usize,
    /// Element stack depth at entry; the frame must return to it, or
    /// the replacement text was not well-balanced.
    stack_base: usize,
    /// Where the reference stood; errors inside the expansion point
    /// here.
    ref_position: TextPosition,
}

enum EntityAction {
    Expand { name: String, text: Arc<str> },
    Skip(String),
}

/// Incremental push parser.
///
/// Feed byte chunks as they arrive; each call returns the events that
/// chunk completed. `finish` flushes the rest and verifies the document
/// actually ended. The event sequence is the same for every chunking of
/// the same bytes.
///
/// ```
/// use sxl_parser::FeedParser;
///
/// let mut parser = FeedParser::new();
/// let mut events = parser.feed(b"<doc>hel").unwrap();
/// events.extend(parser.feed(b"lo</doc>").unwrap());
/// events.extend(parser.finish().unwrap());
/// assert_eq!(events.len(), 3);
/// ```
pub struct FeedParser {
    config: ParserConfig,
    decoder: StreamDecoder,
    /// Decoded text; the prefix up to `consumed` is already parsed.
    buf: String,
    consumed: usize,
    /// Absolute offset of `buf[0]` in the decoded stream.
    base: usize,
    /// Position of `buf[consumed]`.
    pos: TextPosition,
    state: MachineState,
    seen_doctype: bool,
    stack: Vec<OpenElement>,
    scopes: NamespaceStack,
    entities: Entities,
    frames: Vec<EntityFrame>,
    /// Total replacement text brought in by entity expansion.
    expanded_size: usize,
    pending: VecDeque<XmlEvent>,
    resolver: Option<Box<dyn ExternalEntityResolver>>,
    eof: bool,
    failed: Option<XmlError>,
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedParser {
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            config,
            decoder: StreamDecoder::new(None),
            buf: String::new(),
            consumed: 0,
            base: 0,
            pos: TextPosition::start(),
            state: MachineState::Initial,
            seen_doctype: false,
            stack: vec![],
            scopes: NamespaceStack::new(),
            entities: Entities::default(),
            frames: vec![],
            expanded_size: 0,
            pending: VecDeque::new(),
            resolver: None,
            eof: false,
            failed: None,
        }
    }

    /// Overrides encoding detection with a known label. Only meaningful
    /// before the first `feed`.
    pub fn with_encoding_hint(mut self, label: &str) -> Self {
        self.decoder = StreamDecoder::new(Some(label.to_string()));
        self
    }

    pub fn with_resolver(mut self, resolver: Box<dyn ExternalEntityResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Position of the first not-yet-parsed character.
    pub fn position(&self) -> TextPosition {
        self.pos
    }

    pub fn is_finished(&self) -> bool {
        self.state == MachineState::Finished
    }

    /// Decodes a chunk into the internal buffer without parsing.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Result<(), XmlError> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        if let Err(kind) = self.decoder.feed(chunk, &mut self.buf) {
            return Err(self.fail_decode(kind));
        }
        Ok(())
    }

    /// Marks the end of input; flushes the decoder.
    pub fn push_eof(&mut self) -> Result<(), XmlError> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        if !self.eof {
            self.eof = true;
            if let Err(kind) = self.decoder.finish(&mut self.buf) {
                return Err(self.fail_decode(kind));
            }
        }
        Ok(())
    }

    /// Pulls the next event out of the buffered input.
    pub fn next_event(&mut self) -> Result<ParseStep, XmlError> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(ParseStep::Event(event));
            }
            if self.state == MachineState::Finished {
                return Ok(ParseStep::Finished);
            }
            match self.step() {
                Ok(true) => continue,
                Ok(false) => return Ok(ParseStep::NeedMoreInput),
                Err(err) => {
                    self.failed = Some(err.clone());
                    return Err(err);
                }
            }
        }
    }

    /// Feeds a chunk and returns the events it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<XmlEvent>, XmlError> {
        self.push_bytes(chunk)?;
        let events = self.drain_events()?;
        self.compact();
        Ok(events)
    }

    /// Ends the input and returns the remaining events. The document
    /// must be complete: an open element or a dangling token is an
    /// `UnexpectedEndOfInput` error.
    pub fn finish(&mut self) -> Result<Vec<XmlEvent>, XmlError> {
        self.push_eof()?;
        self.drain_events()
    }

    fn drain_events(&mut self) -> Result<Vec<XmlEvent>, XmlError> {
        let mut events = vec![];
        loop {
            match self.next_event()? {
                ParseStep::Event(event) => events.push(event),
                ParseStep::NeedMoreInput | ParseStep::Finished => return Ok(events),
            }
        }
    }

    fn fail_decode(&mut self, kind: XmlErrorKind) -> XmlError {
        let mut pos = self.pos;
        pos.advance_over(&self.buf[self.consumed..]);
        let err = XmlError::new(kind, pos);
        self.failed = Some(err.clone());
        err
    }

    /// Drops the already-parsed buffer prefix.
    fn compact(&mut self) {
        if self.consumed > 0 {
            self.buf.drain(..self.consumed);
            self.base += self.consumed;
            self.consumed = 0;
        }
    }

    /// Advances the machine by one token. `Ok(true)` means progress
    /// (events may be pending), `Ok(false)` means the buffer ran dry.
    fn step(&mut self) -> Result<bool, XmlError> {
        if self.frames.is_empty() {
            let buf = std::mem::take(&mut self.buf);
            let result = self.step_document(&buf);
            self.buf = buf;
            result
        } else {
            self.step_frame()
        }
    }

    fn step_document(&mut self, buf: &str) -> Result<bool, XmlError> {
        let cursor = Cursor::with_offset(&buf[self.consumed..], self.base + self.consumed);
        if cursor.is_at_end() {
            if !self.eof {
                return Ok(false);
            }
            return match self.state {
                MachineState::Epilog => {
                    trace!("document finished at {}", self.pos);
                    self.state = MachineState::Finished;
                    Ok(true)
                }
                MachineState::Finished => Ok(true),
                _ => Err(XmlError::new(XmlErrorKind::UnexpectedEndOfInput, self.pos)),
            };
        }

        let result = match self.state {
            MachineState::Content => self.run_content(Some(buf), cursor),
            _ => self.run_misc(buf, cursor),
        };
        match result {
            Ok(()) => Ok(true),
            Err(err) if err.is_incomplete() && !self.eof => Ok(false),
            Err(err) => Err(self.error_at(buf, err)),
        }
    }

    fn step_frame(&mut self) -> Result<bool, XmlError> {
        let (text, offset, stack_base, ref_position, name) = {
            let frame = self.frames.last().expect("active entity frame");
            (
                frame.text.clone(),
                frame.offset,
                frame.stack_base,
                frame.ref_position,
                frame.name.clone(),
            )
        };
        let cursor = Cursor::with_offset(&text[offset..], offset);

        if cursor.is_at_end() {
            if self.stack.len() != stack_base {
                return Err(XmlError::new(
                    XmlErrorKind::Entity(EntityError::UnbalancedReplacement(name)),
                    ref_position,
                ));
            }
            trace!("finished expanding entity {:?}", name);
            self.frames.pop();
            return Ok(true);
        }

        match self.run_content(None, cursor) {
            Ok(()) => Ok(true),
            Err(err) => {
                let kind = if err.is_incomplete() {
                    XmlErrorKind::UnexpectedEndOfInput
                } else {
                    err.kind
                };
                Err(XmlError::new(kind, ref_position))
            }
        }
    }

    /// Prolog and epilog: whitespace, comments, PIs, the XML
    /// declaration, the DOCTYPE, and eventually the root element.
    fn run_misc(&mut self, buf: &str, cursor: Cursor) -> Result<(), TokenError> {
        let c = cursor.next_byte(0).expect("nonempty tail");

        if c.is_xml_whitespace() {
            let run = cursor
                .rest_bytes()
                .iter()
                .take_while(|c| c.is_xml_whitespace())
                .count();
            self.commit_doc(buf, cursor.offset() + run);
            if self.state == MachineState::Initial {
                self.state = MachineState::Prolog;
            }
            return Ok(());
        }

        if c != b'<' {
            let c = cursor.next_char().expect("nonempty tail");
            return Err(TokenError::new(
                XmlErrorKind::unexpected_char(c),
                cursor.offset(),
            ));
        }

        match cursor.next_byte(1) {
            None => Err(TokenError::incomplete(cursor)),
            Some(b'?') => {
                if self.state == MachineState::Initial {
                    match decl_start(cursor) {
                        ConstructMatch::Yes => return self.run_decl(buf, cursor),
                        ConstructMatch::Undecided => return Err(TokenError::incomplete(cursor)),
                        ConstructMatch::No => {}
                    }
                }
                let ((target, data), cur) = PIToken.parse(cursor)?;
                let event = XmlEvent::pi(target, data);
                self.commit_doc(buf, cur.offset());
                self.pending.push_back(event);
                if self.state == MachineState::Initial {
                    self.state = MachineState::Prolog;
                }
                Ok(())
            }
            Some(b'!') => {
                match match_construct(cursor, "<!--") {
                    ConstructMatch::Yes => {
                        let (comment, cur) = CommentToken.parse(cursor)?;
                        let event = XmlEvent::comment(comment);
                        self.commit_doc(buf, cur.offset());
                        self.pending.push_back(event);
                        if self.state == MachineState::Initial {
                            self.state = MachineState::Prolog;
                        }
                        return Ok(());
                    }
                    ConstructMatch::Undecided => return Err(TokenError::incomplete(cursor)),
                    ConstructMatch::No => {}
                }
                match match_construct(cursor, "<!DOCTYPE") {
                    ConstructMatch::Yes => self.run_doctype(buf, cursor),
                    ConstructMatch::Undecided => Err(TokenError::incomplete(cursor)),
                    ConstructMatch::No => Err(TokenError::new(
                        XmlErrorKind::Syntax(SyntaxError::ExpectedElementStart),
                        cursor.offset(),
                    )),
                }
            }
            Some(b'/') => {
                let kind = if self.state == MachineState::Epilog {
                    XmlErrorKind::Syntax(SyntaxError::ETagAfterRootElement)
                } else {
                    XmlErrorKind::Syntax(SyntaxError::ExpectedElementStart)
                };
                Err(TokenError::new(kind, cursor.offset()))
            }
            Some(_) => {
                if self.state == MachineState::Epilog {
                    return Err(TokenError::new(
                        XmlErrorKind::Syntax(SyntaxError::ExpectedDocumentEnd),
                        cursor.offset(),
                    ));
                }
                let (stag, cur) = parse_stag(cursor.advance(1))?;
                self.state = MachineState::Content;
                self.apply_stag(&stag)?;
                self.commit_doc(buf, cur.offset());
                Ok(())
            }
        }
    }

    fn run_decl(&mut self, buf: &str, cursor: Cursor) -> Result<(), TokenError> {
        let (decl, cur) = XmlDeclToken.parse(cursor)?;
        if let Some(label) = &decl.encoding {
            if !known_label(label) {
                return Err(TokenError::new(
                    XmlErrorKind::Encoding(EncodingError::UnsupportedEncoding(label.clone())),
                    cursor.offset(),
                ));
            }
        }
        self.commit_doc(buf, cur.offset());
        self.pending.push_back(XmlEvent::StartDocument {
            version: decl.version,
            encoding: decl.encoding,
            standalone: decl.standalone,
        });
        self.state = MachineState::Prolog;
        Ok(())
    }

    fn run_doctype(&mut self, buf: &str, cursor: Cursor) -> Result<(), TokenError> {
        if self.state == MachineState::Epilog || self.seen_doctype {
            return Err(TokenError::new(
                XmlErrorKind::Syntax(SyntaxError::MisplacedDoctype),
                cursor.offset(),
            ));
        }
        let token = DoctypeToken {
            max_expansion_depth: self.config.max_entity_expansion_depth,
        };
        let (decl, cur) = token.parse(cursor)?;
        self.apply_doctype(decl, cursor.offset())?;
        self.commit_doc(buf, cur.offset());
        self.seen_doctype = true;
        if self.state == MachineState::Initial {
            self.state = MachineState::Prolog;
        }
        Ok(())
    }

    fn apply_doctype(&mut self, decl: DoctypeDecl, offset: usize) -> Result<(), TokenError> {
        trace!("document type {:?}", decl.name);
        if let Some(id) = &decl.external_id {
            // non-validating: the external subset is not fetched
            debug!("skipping external subset {:?}", id);
        }
        for entity in decl.entities {
            let result = match entity.kind {
                // parameter entities only matter inside the subset,
                // which has already been read
                EntityKind::Parameter => Ok(()),
                EntityKind::General => match entity.def {
                    EntityDeclDef::Internal(text) => {
                        self.entities.define_internal(&entity.name, &text)
                    }
                    EntityDeclDef::External { id, ndata } => {
                        let (system, public) = match id {
                            ExternalId::System { system } => (system, None),
                            ExternalId::Public { public, system } => (system, Some(public)),
                        };
                        self.entities.define_external(
                            &entity.name,
                            &system,
                            public.as_deref(),
                            ndata.as_deref(),
                        )
                    }
                },
            };
            result.map_err(|kind| TokenError::new(kind, offset))?;
        }
        Ok(())
    }

    /// Content: tags, character data, references, CDATA, comments, PIs.
    /// `buf` is `None` while expanding an entity frame.
    fn run_content(&mut self, buf: Option<&str>, cursor: Cursor) -> Result<(), TokenError> {
        let at_eof = buf.is_none() || self.eof;
        let c = cursor.next_byte(0).expect("nonempty tail");

        match c {
            b'<' => match cursor.next_byte(1) {
                None => Err(TokenError::incomplete(cursor)),
                Some(b'/') => {
                    let name_offset = cursor.offset() + 2;
                    let (name, cur) = parse_etag(cursor.advance(2))?;
                    self.apply_etag(name, name_offset)?;
                    self.commit(buf, cur.offset());
                    Ok(())
                }
                Some(b'?') => {
                    let ((target, data), cur) = PIToken.parse(cursor)?;
                    let event = XmlEvent::pi(target, data);
                    self.commit(buf, cur.offset());
                    self.pending.push_back(event);
                    Ok(())
                }
                Some(b'!') => {
                    match match_construct(cursor, "<!--") {
                        ConstructMatch::Yes => {
                            let (comment, cur) = CommentToken.parse(cursor)?;
                            let event = XmlEvent::comment(comment);
                            self.commit(buf, cur.offset());
                            self.pending.push_back(event);
                            return Ok(());
                        }
                        ConstructMatch::Undecided => return Err(TokenError::incomplete(cursor)),
                        ConstructMatch::No => {}
                    }
                    match match_construct(cursor, "<![CDATA[") {
                        ConstructMatch::Yes => {
                            let (text, cur) = CDataToken.parse(cursor)?;
                            let event = if text.is_empty() {
                                None
                            } else {
                                Some(XmlEvent::characters(text))
                            };
                            self.commit(buf, cur.offset());
                            self.pending.push_back(XmlEvent::CDataStart);
                            self.pending.extend(event);
                            self.pending.push_back(XmlEvent::CDataEnd);
                            return Ok(());
                        }
                        ConstructMatch::Undecided => return Err(TokenError::incomplete(cursor)),
                        ConstructMatch::No => {}
                    }
                    match match_construct(cursor, "<!DOCTYPE") {
                        ConstructMatch::Yes => Err(TokenError::new(
                            XmlErrorKind::Syntax(SyntaxError::MisplacedDoctype),
                            cursor.offset(),
                        )),
                        ConstructMatch::Undecided => Err(TokenError::incomplete(cursor)),
                        ConstructMatch::No => Err(TokenError::new(
                            XmlErrorKind::Syntax(SyntaxError::ExpectedElementStart),
                            cursor.offset(),
                        )),
                    }
                }
                Some(_) => {
                    let (stag, cur) = parse_stag(cursor.advance(1))?;
                    self.apply_stag(&stag)?;
                    self.commit(buf, cur.offset());
                    Ok(())
                }
            },
            b'&' => match cursor.next_byte(1) {
                None => Err(TokenError::incomplete(cursor)),
                Some(b'#') => {
                    let (c, cur) = CharRefToken.parse(cursor)?;
                    self.commit(buf, cur.offset());
                    self.pending.push_back(XmlEvent::characters(c.to_string()));
                    Ok(())
                }
                Some(_) => {
                    let offset = cursor.offset();
                    let (name, cur) = EntityRefToken.parse(cursor)?;
                    let action = self.entity_action(name, offset)?;
                    let ref_position = match buf {
                        Some(buf) => self.position_at(buf, offset),
                        None => self.frames.last().expect("active frame").ref_position,
                    };
                    match action {
                        EntityAction::Expand { name, text } => {
                            self.check_expansion_guards(&name, &text, offset)?;
                            self.commit(buf, cur.offset());
                            debug!("expanding entity {:?} ({} chars)", name, text.len());
                            self.frames.push(EntityFrame {
                                name,
                                text,
                                offset: 0,
                                stack_base: self.stack.len(),
                                ref_position,
                            });
                        }
                        EntityAction::Skip(name) => {
                            debug!("leaving external entity {:?} unexpanded", name);
                            self.commit(buf, cur.offset());
                            self.pending.push_back(XmlEvent::EntityReference(name));
                        }
                    }
                    Ok(())
                }
            },
            _ => {
                let (text, cur) = scan_characters(cursor, at_eof)?;
                let event = XmlEvent::characters(text);
                self.commit(buf, cur.offset());
                self.pending.push_back(event);
                Ok(())
            }
        }
    }

    fn apply_stag(&mut self, stag: &RawStag) -> Result<(), TokenError> {
        let mut values = Vec::with_capacity(stag.attributes.len());
        for attr in &stag.attributes {
            let value = expand_attr_value(
                &self.entities,
                &self.config,
                attr.value.raw,
                0,
                &mut self.expanded_size,
            )
            .map_err(|kind| TokenError::new(kind, attr.value.offset))?;
            values.push(value);
        }

        if self.config.namespace_aware {
            self.apply_stag_namespaced(stag, values)?;
        } else {
            let name = Name::plain(stag.name);
            let attributes = stag
                .attributes
                .iter()
                .zip(values)
                .map(|(attr, value)| Attribute::new(Name::plain(attr.name), value))
                .collect();
            self.pending
                .push_back(XmlEvent::start_element(name.clone(), attributes));
            self.stack.push(OpenElement {
                raw_name: stag.name.to_string(),
                name,
                ns_decl_prefixes: vec![],
            });
        }

        if stag.empty {
            self.pop_element();
        }
        Ok(())
    }

    fn apply_stag_namespaced(
        &mut self,
        stag: &RawStag,
        values: Vec<String>,
    ) -> Result<(), TokenError> {
        // split the attribute list into namespace declarations and
        // ordinary attributes
        let mut decls: Vec<(Option<String>, String, usize)> = vec![];
        let mut plain: Vec<(QName, String, usize)> = vec![];
        for (attr, value) in stag.attributes.iter().zip(values) {
            let qname = QName::from_str(attr.name)
                .map_err(|kind| TokenError::new(kind, attr.name_offset))?;
            if qname.prefix() == Some("xmlns") {
                decls.push((Some(qname.local().to_string()), value, attr.name_offset));
            } else if qname.prefix().is_none() && qname.local() == "xmlns" {
                decls.push((None, value, attr.name_offset));
            } else {
                plain.push((qname, value, attr.name_offset));
            }
        }

        let mut scope = self.scopes.build_scope();
        for (prefix, uri, offset) in &decls {
            let result = match prefix {
                Some(prefix) => scope.bind_prefix(prefix, uri),
                None => scope.bind_default(uri),
            };
            if let Err(kind) = result {
                return Err(TokenError::new(kind, *offset));
            }
        }
        scope.finish();

        let qname = QName::from_str(stag.name)
            .map_err(|kind| TokenError::new(kind, stag.name_offset))?;
        if qname.prefix() == Some("xmlns") || (qname.prefix().is_none() && qname.local() == "xmlns")
        {
            return Err(TokenError::new(
                XmlErrorKind::Namespace(NamespaceError::ReservedPrefix("xmlns".to_string())),
                stag.name_offset,
            ));
        }
        let namespace = self
            .scopes
            .resolve_element(&qname)
            .map_err(|kind| TokenError::new(kind, stag.name_offset))?;
        let name = Name {
            prefix: qname.prefix().map(str::to_string),
            local: qname.local().to_string(),
            namespace,
        };

        let mut attributes = Vec::with_capacity(plain.len());
        for (qname, value, offset) in plain {
            let namespace = self
                .scopes
                .resolve_attribute(&qname)
                .map_err(|kind| TokenError::new(kind, offset))?;
            if let Some(ns) = &namespace {
                let duplicate = attributes.iter().any(|attr: &Attribute| {
                    attr.name.namespace.as_ref() == Some(ns) && attr.name.local == qname.local()
                });
                if duplicate {
                    return Err(TokenError::new(
                        XmlErrorKind::Namespace(NamespaceError::DuplicateAttribute {
                            namespace: ns.to_string(),
                            local: qname.local().to_string(),
                        }),
                        offset,
                    ));
                }
            }
            attributes.push(Attribute::new(
                Name {
                    prefix: qname.prefix().map(str::to_string),
                    local: qname.local().to_string(),
                    namespace,
                },
                value,
            ));
        }

        let mut ns_decl_prefixes = Vec::with_capacity(decls.len());
        for (prefix, uri, _) in decls {
            self.pending.push_back(XmlEvent::StartNamespace {
                prefix: prefix.clone(),
                uri: crate::Namespace::new(uri),
            });
            ns_decl_prefixes.push(prefix);
        }
        self.pending
            .push_back(XmlEvent::start_element(name.clone(), attributes));
        self.stack.push(OpenElement {
            raw_name: stag.name.to_string(),
            name,
            ns_decl_prefixes,
        });
        Ok(())
    }

    fn apply_etag(&mut self, name: &str, offset: usize) -> Result<(), TokenError> {
        if let Some(frame) = self.frames.last() {
            if self.stack.len() <= frame.stack_base {
                return Err(TokenError::new(
                    XmlErrorKind::Entity(EntityError::UnbalancedReplacement(frame.name.clone())),
                    offset,
                ));
            }
        }
        let top = match self.stack.last() {
            Some(top) => top,
            None => {
                return Err(TokenError::new(
                    XmlErrorKind::Syntax(SyntaxError::ETagAfterRootElement),
                    offset,
                ))
            }
        };
        if top.raw_name != name {
            return Err(TokenError::new(
                XmlErrorKind::Syntax(SyntaxError::WrongETagName {
                    expected: top.raw_name.clone(),
                    found: name.to_string(),
                }),
                offset,
            ));
        }
        self.pop_element();
        Ok(())
    }

    /// Pops the innermost element, emitting EndElement and the
    /// EndNamespace events of its declarations.
    fn pop_element(&mut self) {
        let elem = self.stack.pop().expect("open element");
        self.pending
            .push_back(XmlEvent::end_element(elem.name));
        if self.config.namespace_aware {
            for prefix in elem.ns_decl_prefixes.into_iter().rev() {
                self.pending.push_back(XmlEvent::EndNamespace { prefix });
            }
            self.scopes.pop_scope();
        }
        if self.stack.is_empty() {
            self.state = MachineState::Epilog;
        }
    }

    fn entity_action(&mut self, name: &str, offset: usize) -> Result<EntityAction, TokenError> {
        enum Found {
            Missing,
            Internal(Arc<str>),
            Unparsed,
            External {
                system: String,
                public: Option<String>,
            },
        }

        let found = match self.entities.general(name) {
            None => Found::Missing,
            Some(entity) => match &entity.def {
                EntityDef::Internal(text) => Found::Internal(text.clone()),
                EntityDef::External { ndata: Some(_), .. } => Found::Unparsed,
                EntityDef::External {
                    system_id,
                    public_id,
                    ..
                } => Found::External {
                    system: system_id.clone(),
                    public: public_id.clone(),
                },
            },
        };

        let entity_err =
            |err: EntityError| TokenError::new(XmlErrorKind::Entity(err), offset);

        match found {
            Found::Missing => Err(entity_err(EntityError::Undefined(name.to_string()))),
            Found::Unparsed => Err(entity_err(EntityError::UnparsedReference(name.to_string()))),
            Found::Internal(text) => Ok(EntityAction::Expand {
                name: name.to_string(),
                text,
            }),
            Found::External { system, public } => {
                if let Some(text) = self.entities.resolved(name) {
                    return Ok(EntityAction::Expand {
                        name: name.to_string(),
                        text,
                    });
                }
                match &mut self.resolver {
                    Some(resolver) => match resolver.resolve(&system, public.as_deref()) {
                        ResolvedEntity::Bytes(bytes) => {
                            let text = decode_entity(&bytes)
                                .map_err(|kind| TokenError::new(kind, offset))?;
                            let text: Arc<str> = text.into();
                            self.entities.cache_resolved(name, text.clone());
                            Ok(EntityAction::Expand {
                                name: name.to_string(),
                                text,
                            })
                        }
                        ResolvedEntity::Declined => Ok(EntityAction::Skip(name.to_string())),
                    },
                    None => Ok(EntityAction::Skip(name.to_string())),
                }
            }
        }
    }

    fn check_expansion_guards(
        &mut self,
        name: &str,
        text: &str,
        offset: usize,
    ) -> Result<(), TokenError> {
        let entity_err =
            |err: EntityError| TokenError::new(XmlErrorKind::Entity(err), offset);

        if self.frames.iter().any(|frame| frame.name == name) {
            return Err(entity_err(EntityError::Recursive(name.to_string())));
        }
        if self.frames.len() + 1 > self.config.max_entity_expansion_depth {
            return Err(entity_err(EntityError::DepthLimitExceeded(
                self.config.max_entity_expansion_depth,
            )));
        }
        self.expanded_size += text.len();
        if self.expanded_size > self.config.max_entity_expansion_size {
            return Err(entity_err(EntityError::SizeLimitExceeded(
                self.config.max_entity_expansion_size,
            )));
        }
        Ok(())
    }

    fn commit(&mut self, buf: Option<&str>, to: usize) {
        match buf {
            Some(buf) => self.commit_doc(buf, to),
            None => self.frames.last_mut().expect("active frame").offset = to,
        }
    }

    fn commit_doc(&mut self, buf: &str, to: usize) {
        let upto = to - self.base;
        self.pos.advance_over(&buf[self.consumed..upto]);
        self.consumed = upto;
    }

    fn position_at(&self, buf: &str, offset: usize) -> TextPosition {
        let mut pos = self.pos;
        let upto = (offset - self.base).min(buf.len());
        pos.advance_over(&buf[self.consumed..upto]);
        pos
    }

    fn error_at(&self, buf: &str, err: TokenError) -> XmlError {
        let kind = if err.is_incomplete() {
            XmlErrorKind::UnexpectedEndOfInput
        } else {
            err.kind
        };
        let position = if err.offset >= self.base + self.consumed {
            self.position_at(buf, err.offset)
        } else {
            self.pos
        };
        XmlError::new(kind, position)
    }
}

/// `<?xml` followed by whitespace is the declaration; anything else
/// starting with `<?` is a processing instruction.
fn decl_start(cursor: Cursor) -> ConstructMatch {
    match match_construct(cursor, "<?xml") {
        ConstructMatch::Yes => match cursor.next_byte(5) {
            None => ConstructMatch::Undecided,
            Some(c) if c.is_xml_whitespace() => ConstructMatch::Yes,
            Some(_) => ConstructMatch::No,
        },
        other => other,
    }
}

/// Expands character and entity references in an attribute value.
///
/// Entity replacement text is scanned recursively, so a literal `<`
/// smuggled in through an entity is still rejected while `&lt;` is
/// fine. Literal whitespace is turned into spaces only when the
/// normalization option asks for it.
fn expand_attr_value(
    entities: &Entities,
    config: &ParserConfig,
    raw: &str,
    depth: usize,
    budget: &mut usize,
) -> Result<String, XmlErrorKind> {
    if depth > config.max_entity_expansion_depth {
        return Err(XmlErrorKind::Entity(EntityError::DepthLimitExceeded(
            config.max_entity_expansion_depth,
        )));
    }

    let mut out = String::with_capacity(raw.len());
    let mut cursor = Cursor::new(raw);
    while let Some(c) = cursor.next_char() {
        match c {
            '<' => return Err(XmlErrorKind::Syntax(SyntaxError::LtInAttributeValue)),
            '&' => {
                if cursor.next_byte(1) == Some(b'#') {
                    let (c, cur) = CharRefToken
                        .parse(cursor)
                        .map_err(complete_ref_kind)?;
                    out.push(c);
                    cursor = cur;
                } else {
                    let (name, cur) = EntityRefToken
                        .parse(cursor)
                        .map_err(complete_ref_kind)?;
                    match entities.general(name) {
                        None => {
                            return Err(XmlErrorKind::Entity(EntityError::Undefined(
                                name.to_string(),
                            )))
                        }
                        Some(entity) => match &entity.def {
                            EntityDef::Internal(text) => {
                                *budget += text.len();
                                if *budget > config.max_entity_expansion_size {
                                    return Err(XmlErrorKind::Entity(
                                        EntityError::SizeLimitExceeded(
                                            config.max_entity_expansion_size,
                                        ),
                                    ));
                                }
                                let text = text.clone();
                                out.push_str(&expand_attr_value(
                                    entities,
                                    config,
                                    &text,
                                    depth + 1,
                                    budget,
                                )?);
                            }
                            EntityDef::External { .. } => {
                                return Err(XmlErrorKind::Entity(
                                    EntityError::ExternalInAttributeValue(name.to_string()),
                                ))
                            }
                        },
                    }
                    cursor = cur;
                }
            }
            '\t' | '\n' | '\r' if config.normalize_attribute_values => {
                out.push(' ');
                cursor = cursor.advance(1);
            }
            c => {
                out.push(c);
                cursor = cursor.advance(c.len_utf8());
            }
        }
    }
    Ok(out)
}

/// Attribute values are fully buffered; a reference cut short by the
/// end of the value is malformed, not incomplete.
fn complete_ref_kind(err: TokenError) -> XmlErrorKind {
    if err.is_incomplete() {
        XmlErrorKind::expect_token(";")
    } else {
        err.kind
    }
}

/// Pull reader over a complete document.
pub struct Reader {
    parser: FeedParser,
}

impl Reader {
    pub fn from_str(input: &str) -> Self {
        Self::from_str_with_config(input, ParserConfig::default())
    }

    pub fn from_str_with_config(input: &str, config: ParserConfig) -> Self {
        // the input is already UTF-8, skip detection
        let parser = FeedParser::with_config(config).with_encoding_hint("UTF-8");
        Self::preloaded(parser, input.as_bytes())
    }

    pub fn from_bytes(input: &[u8]) -> Self {
        Self::from_bytes_with_config(input, ParserConfig::default())
    }

    pub fn from_bytes_with_config(input: &[u8], config: ParserConfig) -> Self {
        Self::preloaded(FeedParser::with_config(config), input)
    }

    /// Runs a pre-configured [`FeedParser`] over a complete buffer;
    /// useful when a resolver or encoding hint is needed.
    pub fn with_parser(parser: FeedParser, input: &[u8]) -> Self {
        Self::preloaded(parser, input)
    }

    fn preloaded(mut parser: FeedParser, input: &[u8]) -> Self {
        // errors latch inside the parser and surface on the first next()
        if parser.push_bytes(input).is_ok() {
            let _ = parser.push_eof();
        }
        Self { parser }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<XmlEvent>, XmlError> {
        match self.parser.next_event()? {
            ParseStep::Event(event) => Ok(Some(event)),
            ParseStep::Finished | ParseStep::NeedMoreInput => Ok(None),
        }
    }

    pub fn position(&self) -> TextPosition {
        self.parser.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! assert_evt {
        ($exp:expr, $reader:expr) => {{
            let evt = $reader.next();
            assert_eq!($exp, evt, "at {}", $reader.position())
        }};
    }

    macro_rules! assert_err {
        ($exp:expr, $reader:expr) => {{
            match $reader.next() {
                Err(err) => assert_eq!(&$exp, err.kind(), "at {}", err.position()),
                other => panic!("expected error {:?}, got {:?}", $exp, other),
            }
        }};
    }

    fn elem(name: &str) -> Option<XmlEvent> {
        Some(XmlEvent::start_element(Name::plain(name), vec![]))
    }

    fn elem_attrs(name: &str, attrs: &[(&str, &str)]) -> Option<XmlEvent> {
        let attributes = attrs
            .iter()
            .map(|(name, value)| Attribute::new(Name::plain(*name), *value))
            .collect();
        Some(XmlEvent::start_element(Name::plain(name), attributes))
    }

    fn end(name: &str) -> Option<XmlEvent> {
        Some(XmlEvent::end_element(Name::plain(name)))
    }

    fn text(content: &str) -> Option<XmlEvent> {
        Some(XmlEvent::characters(content))
    }

    mod stag {
        use super::*;

        #[test]
        fn single_element() {
            let mut reader = Reader::from_str("<elem></elem>");
            assert_evt!(Ok(elem("elem")), reader);
            assert_evt!(Ok(end("elem")), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn single_element_whitespace() {
            let mut reader = Reader::from_str("<elem  ></elem   >");
            assert_evt!(Ok(elem("elem")), reader);
            assert_evt!(Ok(end("elem")), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn empty_element() {
            let mut reader = Reader::from_str("<elem/>");
            assert_evt!(Ok(elem("elem")), reader);
            assert_evt!(Ok(end("elem")), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn nested_elements() {
            let mut reader = Reader::from_str("<a><b/><c></c></a>");
            assert_evt!(Ok(elem("a")), reader);
            assert_evt!(Ok(elem("b")), reader);
            assert_evt!(Ok(end("b")), reader);
            assert_evt!(Ok(elem("c")), reader);
            assert_evt!(Ok(end("c")), reader);
            assert_evt!(Ok(end("a")), reader);
            assert_evt!(Ok(None), reader);
        }
    }

    mod attributes {
        use super::*;

        #[test]
        fn attribute() {
            let mut reader = Reader::from_str("<elem attr=\"value\"/>");
            assert_evt!(Ok(elem_attrs("elem", &[("attr", "value")])), reader);
            assert_evt!(Ok(end("elem")), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn attribute_whitespace() {
            let mut reader = Reader::from_str("<elem \t \n \r attr  =  \"value\"  />");
            assert_evt!(Ok(elem_attrs("elem", &[("attr", "value")])), reader);
            assert_evt!(Ok(end("elem")), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn single_quote_attribute() {
            let mut reader = Reader::from_str("<elem attr='value'/>");
            assert_evt!(Ok(elem_attrs("elem", &[("attr", "value")])), reader);
        }

        #[test]
        fn multiple_attributes() {
            let mut reader = Reader::from_str("<e a='v' b='w' />");
            assert_evt!(Ok(elem_attrs("e", &[("a", "v"), ("b", "w")])), reader);
        }

        #[test]
        fn attribute_duplicate() {
            let mut reader = Reader::from_str("<e a='' a='' />");
            assert_err!(
                XmlErrorKind::Syntax(SyntaxError::NonUniqueAttribute {
                    attribute: "a".to_string()
                }),
                reader
            );
        }

        #[test]
        fn references_expand_in_values() {
            let mut reader = Reader::from_str("<e a='x&amp;y&#x20;z'/>");
            assert_evt!(Ok(elem_attrs("e", &[("a", "x&y z")])), reader);
        }

        #[test]
        fn literal_whitespace_is_kept_by_default() {
            let mut reader = Reader::from_str("<e a='a\nb'/>");
            assert_evt!(Ok(elem_attrs("e", &[("a", "a\nb")])), reader);
        }

        #[test]
        fn normalization_is_opt_in() {
            let config = ParserConfig::new().normalize_attribute_values(true);
            let mut reader = Reader::from_str_with_config("<e a='a\n\tb'/>", config);
            assert_evt!(Ok(elem_attrs("e", &[("a", "a  b")])), reader);
        }

        #[test]
        fn char_ref_whitespace_survives_normalization() {
            let config = ParserConfig::new().normalize_attribute_values(true);
            let mut reader = Reader::from_str_with_config("<e a='a&#10;b'/>", config);
            assert_evt!(Ok(elem_attrs("e", &[("a", "a\nb")])), reader);
        }

        #[test]
        fn undefined_entity_in_value() {
            let mut reader = Reader::from_str("<e a='&nope;'/>");
            assert_err!(
                XmlErrorKind::Entity(EntityError::Undefined("nope".to_string())),
                reader
            );
        }
    }

    mod etag {
        use super::*;

        #[test]
        fn fail_on_missing_etag() {
            let mut reader = Reader::from_str("<e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_err!(XmlErrorKind::UnexpectedEndOfInput, reader);
        }

        #[test]
        fn fail_on_extra_etag() {
            let mut reader = Reader::from_str("<e></e></e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(end("e")), reader);
            assert_err!(XmlErrorKind::Syntax(SyntaxError::ETagAfterRootElement), reader);
        }

        #[test]
        fn fail_on_wrong_etag() {
            let mut reader = Reader::from_str("<e></d>");
            assert_evt!(Ok(elem("e")), reader);
            assert_err!(
                XmlErrorKind::Syntax(SyntaxError::WrongETagName {
                    expected: "e".to_string(),
                    found: "d".to_string(),
                }),
                reader
            );
        }

        #[test]
        fn fail_on_wrong_etag_in_depth() {
            let mut reader = Reader::from_str("<a><e><e></e><e/></d></a>");
            assert_evt!(Ok(elem("a")), reader);
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(end("e")), reader);
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(end("e")), reader);
            assert_err!(
                XmlErrorKind::Syntax(SyntaxError::WrongETagName {
                    expected: "e".to_string(),
                    found: "d".to_string(),
                }),
                reader
            );
        }
    }

    mod top_level_content {
        use super::*;

        #[test]
        fn only_one_root_element() {
            let mut reader = Reader::from_str("<e/><e/>");
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(end("e")), reader);
            assert_err!(XmlErrorKind::Syntax(SyntaxError::ExpectedDocumentEnd), reader);
        }

        #[test]
        fn accept_whitespace_after_root() {
            let mut reader = Reader::from_str("<e/> \r\t\n");
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(end("e")), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn comment_and_pi_in_epilog() {
            let mut reader = Reader::from_str("<e/><!-- done --><?next step?>");
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(end("e")), reader);
            assert_evt!(Ok(Some(XmlEvent::comment(" done "))), reader);
            assert_evt!(Ok(Some(XmlEvent::pi("next", Some("step")))), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn empty_input_fails() {
            let mut reader = Reader::from_str("");
            assert_err!(XmlErrorKind::UnexpectedEndOfInput, reader);
        }

        #[test]
        fn whitespace_only_input_fails() {
            let mut reader = Reader::from_str("  \n ");
            assert_err!(XmlErrorKind::UnexpectedEndOfInput, reader);
        }
    }

    mod decl {
        use super::*;

        #[test]
        fn parse_minimal_decl() {
            let mut reader = Reader::from_str("<?xml version='1.0' ?><e/>");
            assert_evt!(
                Ok(Some(XmlEvent::StartDocument {
                    version: "1.0".to_string(),
                    encoding: None,
                    standalone: None,
                })),
                reader
            );
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(end("e")), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn parse_full_decl() {
            let mut reader =
                Reader::from_str("<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><e/>");
            assert_evt!(
                Ok(Some(XmlEvent::StartDocument {
                    version: "1.0".to_string(),
                    encoding: Some("UTF-8".to_string()),
                    standalone: Some(true),
                })),
                reader
            );
        }

        #[test]
        fn parse_decl_double_quote() {
            let mut reader =
                Reader::from_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?><e/>");
            assert_evt!(
                Ok(Some(XmlEvent::StartDocument {
                    version: "1.0".to_string(),
                    encoding: Some("UTF-8".to_string()),
                    standalone: Some(false),
                })),
                reader
            );
        }

        #[cfg(feature = "encoding")]
        #[test]
        fn unknown_encoding_label() {
            let mut reader = Reader::from_str("<?xml version='1.0' encoding='UTF128'?><e/>");
            assert_err!(
                XmlErrorKind::Encoding(EncodingError::UnsupportedEncoding("UTF128".to_string())),
                reader
            );
        }

        #[test]
        fn unsupported_version() {
            let mut reader = Reader::from_str("<?xml version='2.0'?><e/>");
            assert_err!(
                XmlErrorKind::Syntax(SyntaxError::UnsupportedVersion("2.0".to_string())),
                reader
            );
        }

        #[test]
        fn decl_after_whitespace_is_a_bad_pi() {
            let mut reader = Reader::from_str(" <?xml version='1.0'?><e/>");
            assert_err!(XmlErrorKind::Syntax(SyntaxError::InvalidPITarget), reader);
        }
    }

    mod characters {
        use super::*;

        #[test]
        fn parse_chars() {
            let mut reader = Reader::from_str("<e>abc</e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(text("abc")), reader);
            assert_evt!(Ok(end("e")), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn fail_on_chars_in_prolog() {
            let mut reader = Reader::from_str("abc <e/>");
            assert_err!(
                XmlErrorKind::Syntax(SyntaxError::UnexpectedCharacter('a')),
                reader
            );
        }

        #[test]
        fn fail_on_chars_in_epilog() {
            let mut reader = Reader::from_str("<e/>abc");
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(end("e")), reader);
            assert_err!(
                XmlErrorKind::Syntax(SyntaxError::UnexpectedCharacter('a')),
                reader
            );
        }

        #[test]
        fn valid_content() {
            let mut reader =
                Reader::from_str("<e>\u{9}\u{A}\u{20}\u{D7FF}\u{E000}\u{FFFD}\u{10000}\u{10FFFF}</e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(
                Ok(text("\u{9}\u{A}\u{20}\u{D7FF}\u{E000}\u{FFFD}\u{10000}\u{10FFFF}")),
                reader
            );
            assert_evt!(Ok(end("e")), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn line_endings_are_reported_verbatim() {
            let mut reader = Reader::from_str("<e>a\rb\r\nc\nd</e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(text("a\rb\r\nc\nd")), reader);
            assert_evt!(Ok(end("e")), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn invalid_control_char() {
            let mut reader = Reader::from_str("<e>\u{1}</e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_err!(XmlErrorKind::Syntax(SyntaxError::IllegalChar('\u{1}')), reader);
        }

        #[test]
        fn invalid_ffff() {
            let mut reader = Reader::from_str("<e>\u{FFFF}</e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_err!(
                XmlErrorKind::Syntax(SyntaxError::IllegalChar('\u{FFFF}')),
                reader
            );
        }

        #[test]
        fn cdata_end_sequence_in_content() {
            let mut reader = Reader::from_str("<e>a]]>b</e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_err!(XmlErrorKind::Syntax(SyntaxError::CDataEndInContent), reader);
        }

        #[test]
        fn lone_brackets_are_content() {
            let mut reader = Reader::from_str("<e>a]b]]c</e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(text("a]b]]c")), reader);
            assert_evt!(Ok(end("e")), reader);
            assert_evt!(Ok(None), reader);
        }
    }

    mod comment {
        use super::*;

        #[test]
        fn parse_comment() {
            let mut reader = Reader::from_str("<!-- declarations for <head> & <body> --><r/>");
            assert_evt!(
                Ok(Some(XmlEvent::comment(" declarations for <head> & <body> "))),
                reader
            );
        }

        #[test]
        fn parse_empty_comment() {
            let mut reader = Reader::from_str("<!----><r/>");
            assert_evt!(Ok(Some(XmlEvent::comment(""))), reader);
        }

        #[test]
        fn parse_invalid_comment() {
            let mut reader = Reader::from_str("<!-- B+, B, or B--->");
            assert_err!(XmlErrorKind::Syntax(SyntaxError::DoubleDashInComment), reader);
        }
    }

    mod pi {
        use super::*;

        #[test]
        fn parse_pi() {
            let mut reader = Reader::from_str("<?e?><r/>");
            assert_evt!(Ok(Some(XmlEvent::pi("e", None))), reader);
        }

        #[test]
        fn parse_pi_data() {
            let mut reader = Reader::from_str("<?e abc=gdsfh ?><r/>");
            assert_evt!(Ok(Some(XmlEvent::pi("e", Some("abc=gdsfh ")))), reader);
        }

        #[test]
        fn parse_pi_starting_with_xml() {
            let mut reader = Reader::from_str("<?xml version='1.0'?><?xml-abc?><r/>");
            assert_evt!(
                Ok(Some(XmlEvent::StartDocument {
                    version: "1.0".to_string(),
                    encoding: None,
                    standalone: None,
                })),
                reader
            );
            assert_evt!(Ok(Some(XmlEvent::pi("xml-abc", None))), reader);
        }

        #[test]
        fn invalid_target_name() {
            let mut reader = Reader::from_str("<?xml version='1.0'?><?XmL?>");
            let _ = reader.next();
            assert_err!(XmlErrorKind::Syntax(SyntaxError::InvalidPITarget), reader);
        }

        #[test]
        fn missing_end() {
            let mut reader = Reader::from_str("<?e abc=gdsfh");
            assert_err!(XmlErrorKind::UnexpectedEndOfInput, reader);
        }
    }

    mod cdata {
        use super::*;

        #[test]
        fn cdata_is_bracketed_and_verbatim() {
            let mut reader = Reader::from_str("<e><![CDATA[<greeting>Hello, world!</greeting>]]></e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(Some(XmlEvent::CDataStart)), reader);
            assert_evt!(Ok(text("<greeting>Hello, world!</greeting>")), reader);
            assert_evt!(Ok(Some(XmlEvent::CDataEnd)), reader);
            assert_evt!(Ok(end("e")), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn trailing_brackets() {
            let mut reader = Reader::from_str("<e><![CDATA[]]]]></e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(Some(XmlEvent::CDataStart)), reader);
            assert_evt!(Ok(text("]]")), reader);
            assert_evt!(Ok(Some(XmlEvent::CDataEnd)), reader);
        }

        #[test]
        fn bracket_content() {
            let mut reader = Reader::from_str("<e><![CDATA[[]]]></e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(Some(XmlEvent::CDataStart)), reader);
            assert_evt!(Ok(text("[]")), reader);
            assert_evt!(Ok(Some(XmlEvent::CDataEnd)), reader);
        }

        #[test]
        fn empty_cdata() {
            let mut reader = Reader::from_str("<e><![CDATA[]]></e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(Some(XmlEvent::CDataStart)), reader);
            assert_evt!(Ok(Some(XmlEvent::CDataEnd)), reader);
            assert_evt!(Ok(end("e")), reader);
        }

        #[test]
        fn unterminated_cdata() {
            let mut reader = Reader::from_str("<e><![CDATA[]></e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_err!(XmlErrorKind::UnexpectedEndOfInput, reader);
        }
    }

    mod char_ref {
        use super::*;

        #[test]
        fn pass_hex() {
            let mut reader = Reader::from_str("<e>&#x20;</e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(text("\u{20}")), reader);
        }

        #[test]
        fn pass_decimal() {
            let mut reader = Reader::from_str("<e>&#32;</e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(text("\u{20}")), reader);
        }

        #[test]
        fn pass_ref_in_chars() {
            let mut reader = Reader::from_str("<e>test&#x20;seq</e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(text("test")), reader);
            assert_evt!(Ok(text("\u{20}")), reader);
            assert_evt!(Ok(text("seq")), reader);
            assert_evt!(Ok(end("e")), reader);
        }

        #[test]
        fn fail_invalid_char() {
            let mut reader = Reader::from_str("<e>&#x0;</e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_err!(
                XmlErrorKind::Syntax(SyntaxError::InvalidCharacterReference("0".to_string())),
                reader
            );
        }

        #[test]
        fn fail_surrogate() {
            let mut reader = Reader::from_str("<e>&#xD800;</e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_err!(
                XmlErrorKind::Syntax(SyntaxError::InvalidCharacterReference("D800".to_string())),
                reader
            );
        }

        #[test]
        fn fail_non_digit() {
            let mut reader = Reader::from_str("<e>&#1F;</e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_err!(
                XmlErrorKind::Syntax(SyntaxError::InvalidCharacterReference("1F".to_string())),
                reader
            );
        }
    }

    mod entity_replacement {
        use super::*;

        #[test]
        fn builtins_expand_to_their_characters() {
            let mut reader = Reader::from_str("<e>&amp;&lt;&gt;&apos;&quot;</e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_evt!(Ok(text("&")), reader);
            assert_evt!(Ok(text("<")), reader);
            assert_evt!(Ok(text(">")), reader);
            assert_evt!(Ok(text("'")), reader);
            assert_evt!(Ok(text("\"")), reader);
            assert_evt!(Ok(end("e")), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn fail_on_unterminated_reference() {
            let mut reader = Reader::from_str("<e>&quot</e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_err!(XmlErrorKind::Syntax(SyntaxError::ExpectToken(";")), reader);
        }

        #[test]
        fn fail_on_unknown_entity() {
            let mut reader = Reader::from_str("<e>&nent;</e>");
            assert_evt!(Ok(elem("e")), reader);
            assert_err!(
                XmlErrorKind::Entity(EntityError::Undefined("nent".to_string())),
                reader
            );
        }
    }

    mod declared_entities {
        use super::*;

        #[test]
        fn internal_entity_in_content() {
            let mut reader =
                Reader::from_str("<!DOCTYPE d [<!ENTITY greet \"hi\">]><d>&greet;</d>");
            assert_evt!(Ok(elem("d")), reader);
            assert_evt!(Ok(text("hi")), reader);
            assert_evt!(Ok(end("d")), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn entity_with_markup() {
            let mut reader = Reader::from_str(
                "<!DOCTYPE d [<!ENTITY frag \"<b>bold</b>\">]><d>&frag;</d>",
            );
            assert_evt!(Ok(elem("d")), reader);
            assert_evt!(Ok(elem("b")), reader);
            assert_evt!(Ok(text("bold")), reader);
            assert_evt!(Ok(end("b")), reader);
            assert_evt!(Ok(end("d")), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn entities_nest() {
            let mut reader = Reader::from_str(
                "<!DOCTYPE d [<!ENTITY a \"1&b;3\"><!ENTITY b \"2\">]><d>&a;</d>",
            );
            assert_evt!(Ok(elem("d")), reader);
            assert_evt!(Ok(text("1")), reader);
            assert_evt!(Ok(text("2")), reader);
            assert_evt!(Ok(text("3")), reader);
            assert_evt!(Ok(end("d")), reader);
        }

        #[test]
        fn direct_recursion_fails() {
            let mut reader =
                Reader::from_str("<!DOCTYPE d [<!ENTITY e \"&e;\">]><d>&e;</d>");
            assert_evt!(Ok(elem("d")), reader);
            assert_err!(
                XmlErrorKind::Entity(EntityError::Recursive("e".to_string())),
                reader
            );
        }

        #[test]
        fn indirect_recursion_fails() {
            let mut reader = Reader::from_str(
                "<!DOCTYPE d [<!ENTITY a \"&b;\"><!ENTITY b \"&a;\">]><d>&a;</d>",
            );
            assert_evt!(Ok(elem("d")), reader);
            assert_err!(
                XmlErrorKind::Entity(EntityError::Recursive("a".to_string())),
                reader
            );
        }

        #[test]
        fn chain_deeper_than_the_guard_fails() {
            let mut subset = String::new();
            for i in 0..6 {
                subset.push_str(&format!("<!ENTITY e{} \"&e{};\">", i, i + 1));
            }
            subset.push_str("<!ENTITY e6 \"x\">");
            let doc = format!("<!DOCTYPE d [{}]><d>&e0;</d>", subset);

            let config = ParserConfig::new().max_entity_expansion_depth(4);
            let mut reader = Reader::from_str_with_config(&doc, config);
            assert_evt!(Ok(elem("d")), reader);
            assert_err!(
                XmlErrorKind::Entity(EntityError::DepthLimitExceeded(4)),
                reader
            );
        }

        #[test]
        fn billion_laughs_hits_the_size_guard() {
            let mut subset = String::from("<!ENTITY lol0 \"lolololololololololol\">");
            for i in 1..10 {
                let prev: String = format!("&lol{};", i - 1).repeat(10);
                subset.push_str(&format!("<!ENTITY lol{} \"{}\">", i, prev));
            }
            let doc = format!("<!DOCTYPE d [{}]><d>&lol9;</d>", subset);

            let mut reader = Reader::from_str(&doc);
            assert_evt!(Ok(elem("d")), reader);
            loop {
                match reader.next() {
                    Ok(Some(XmlEvent::Characters(_))) => continue,
                    Err(err) => {
                        assert_eq!(
                            err.kind(),
                            &XmlErrorKind::Entity(EntityError::SizeLimitExceeded(1 << 20))
                        );
                        break;
                    }
                    other => panic!("expected size guard, got {:?}", other),
                }
            }
        }

        #[test]
        fn unbalanced_replacement_fails() {
            let mut reader =
                Reader::from_str("<!DOCTYPE d [<!ENTITY open \"<b>\">]><d>&open;</d>");
            assert_evt!(Ok(elem("d")), reader);
            assert_evt!(Ok(elem("b")), reader);
            assert_err!(
                XmlErrorKind::Entity(EntityError::UnbalancedReplacement("open".to_string())),
                reader
            );
        }

        #[test]
        fn builtin_redefinition_fails() {
            let mut reader = Reader::from_str("<!DOCTYPE d [<!ENTITY lt \"x\">]><d/>");
            assert_err!(
                XmlErrorKind::Entity(EntityError::Redefinition("lt".to_string())),
                reader
            );
        }

        #[test]
        fn canonical_builtin_declaration_is_accepted() {
            let mut reader =
                Reader::from_str("<!DOCTYPE d [<!ENTITY lt \"&#38;#60;\">]><d>&lt;</d>");
            assert_evt!(Ok(elem("d")), reader);
            assert_evt!(Ok(text("<")), reader);
            assert_evt!(Ok(end("d")), reader);
        }

        #[test]
        fn declared_entity_in_attribute_value() {
            let mut reader = Reader::from_str(
                "<!DOCTYPE d [<!ENTITY who \"world\">]><d greeting='hello &who;'/>",
            );
            assert_evt!(Ok(elem_attrs("d", &[("greeting", "hello world")])), reader);
        }

        #[test]
        fn entity_smuggling_lt_into_attribute_fails() {
            let mut reader = Reader::from_str(
                "<!DOCTYPE d [<!ENTITY bad \"a<b\">]><d x='&bad;'/>",
            );
            assert_err!(XmlErrorKind::Syntax(SyntaxError::LtInAttributeValue), reader);
        }
    }

    mod external_entities {
        use super::*;

        struct FixedResolver(Option<Vec<u8>>);

        impl ExternalEntityResolver for FixedResolver {
            fn resolve(&mut self, _system_id: &str, _public_id: Option<&str>) -> ResolvedEntity {
                match self.0.take() {
                    Some(bytes) => ResolvedEntity::Bytes(bytes),
                    None => ResolvedEntity::Declined,
                }
            }
        }

        const DOC: &str = "<!DOCTYPE d [<!ENTITY ext SYSTEM \"urn:ext\">]><d>&ext;</d>";

        #[test]
        fn without_resolver_the_reference_is_reported() {
            let mut reader = Reader::from_str(DOC);
            assert_evt!(Ok(elem("d")), reader);
            assert_evt!(Ok(Some(XmlEvent::entity_reference("ext"))), reader);
            assert_evt!(Ok(end("d")), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn declined_resolution_is_reported() {
            let parser = FeedParser::new().with_resolver(Box::new(FixedResolver(None)));
            let mut reader = Reader::with_parser(parser, DOC.as_bytes());
            assert_evt!(Ok(elem("d")), reader);
            assert_evt!(Ok(Some(XmlEvent::entity_reference("ext"))), reader);
        }

        #[test]
        fn resolved_bytes_are_parsed_as_content() {
            let parser = FeedParser::new()
                .with_resolver(Box::new(FixedResolver(Some(b"resolved <i/>".to_vec()))));
            let mut reader = Reader::with_parser(parser, DOC.as_bytes());
            assert_evt!(Ok(elem("d")), reader);
            assert_evt!(Ok(text("resolved ")), reader);
            assert_evt!(Ok(elem("i")), reader);
            assert_evt!(Ok(end("i")), reader);
            assert_evt!(Ok(end("d")), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn text_declaration_is_stripped() {
            let parser = FeedParser::new().with_resolver(Box::new(FixedResolver(Some(
                b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>payload".to_vec(),
            ))));
            let mut reader = Reader::with_parser(parser, DOC.as_bytes());
            assert_evt!(Ok(elem("d")), reader);
            assert_evt!(Ok(text("payload")), reader);
        }

        #[test]
        fn unparsed_entity_reference_fails() {
            let mut reader = Reader::from_str(
                "<!DOCTYPE d [<!ENTITY img SYSTEM \"img.gif\" NDATA gif>]><d>&img;</d>",
            );
            assert_evt!(Ok(elem("d")), reader);
            assert_err!(
                XmlErrorKind::Entity(EntityError::UnparsedReference("img".to_string())),
                reader
            );
        }

        #[test]
        fn external_entity_in_attribute_fails() {
            let mut reader = Reader::from_str(
                "<!DOCTYPE d [<!ENTITY ext SYSTEM \"urn:ext\">]><d a='&ext;'/>",
            );
            assert_err!(
                XmlErrorKind::Entity(EntityError::ExternalInAttributeValue("ext".to_string())),
                reader
            );
        }
    }

    mod namespaces {
        use super::*;
        use crate::Namespace;

        #[test]
        fn prefix_resolves_to_declared_uri() {
            let mut reader = Reader::from_str("<a xmlns:p=\"urn:x\"><p:b/></a>");
            assert_evt!(
                Ok(Some(XmlEvent::StartNamespace {
                    prefix: Some("p".to_string()),
                    uri: Namespace::new("urn:x"),
                })),
                reader
            );
            assert_evt!(Ok(elem("a")), reader);
            assert_evt!(
                Ok(Some(XmlEvent::start_element(
                    Name::prefixed("p", "b", Namespace::new("urn:x")),
                    vec![],
                ))),
                reader
            );
            assert_evt!(
                Ok(Some(XmlEvent::end_element(Name::prefixed(
                    "p",
                    "b",
                    Namespace::new("urn:x")
                )))),
                reader
            );
            assert_evt!(Ok(end("a")), reader);
            assert_evt!(
                Ok(Some(XmlEvent::EndNamespace {
                    prefix: Some("p".to_string())
                })),
                reader
            );
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn default_namespace_applies_to_elements_not_attributes() {
            let mut reader = Reader::from_str("<a xmlns=\"urn:d\" k=\"v\"/>");
            assert_evt!(
                Ok(Some(XmlEvent::StartNamespace {
                    prefix: None,
                    uri: Namespace::new("urn:d"),
                })),
                reader
            );
            assert_evt!(
                Ok(Some(XmlEvent::start_element(
                    Name::in_namespace("a", Namespace::new("urn:d")),
                    vec![Attribute::new(Name::plain("k"), "v")],
                ))),
                reader
            );
        }

        #[test]
        fn default_namespace_can_be_undeclared() {
            let mut reader = Reader::from_str("<a xmlns=\"urn:d\"><b xmlns=\"\"/></a>");
            let _ = reader.next(); // StartNamespace
            assert_evt!(
                Ok(Some(XmlEvent::start_element(
                    Name::in_namespace("a", Namespace::new("urn:d")),
                    vec![],
                ))),
                reader
            );
            let _ = reader.next(); // StartNamespace (undeclare)
            assert_evt!(Ok(elem("b")), reader);
        }

        #[test]
        fn unbound_prefix_fails() {
            let mut reader = Reader::from_str("<p:a/>");
            assert_err!(
                XmlErrorKind::Namespace(NamespaceError::UnboundPrefix("p".to_string())),
                reader
            );
        }

        #[test]
        fn unbound_attribute_prefix_fails() {
            let mut reader = Reader::from_str("<a p:k=\"v\"/>");
            assert_err!(
                XmlErrorKind::Namespace(NamespaceError::UnboundPrefix("p".to_string())),
                reader
            );
        }

        #[test]
        fn xml_prefix_is_predeclared() {
            let mut reader = Reader::from_str("<a xml:space=\"preserve\"/>");
            assert_evt!(
                Ok(Some(XmlEvent::start_element(
                    Name::plain("a"),
                    vec![Attribute::new(
                        Name::prefixed(
                            "xml",
                            "space",
                            Namespace::new(crate::XML_NAMESPACE_URI)
                        ),
                        "preserve",
                    )],
                ))),
                reader
            );
        }

        #[test]
        fn xml_prefix_cannot_be_rebound() {
            let mut reader = Reader::from_str("<a xmlns:xml=\"urn:other\"/>");
            assert_err!(
                XmlErrorKind::Namespace(NamespaceError::IllegalNamespaceUri(
                    "urn:other".to_string()
                )),
                reader
            );
        }

        #[test]
        fn xmlns_prefix_cannot_be_declared() {
            let mut reader = Reader::from_str("<a xmlns:xmlns=\"urn:x\"/>");
            assert_err!(
                XmlErrorKind::Namespace(NamespaceError::ReservedPrefix("xmlns".to_string())),
                reader
            );
        }

        #[test]
        fn duplicate_expanded_attribute_fails() {
            let mut reader = Reader::from_str(
                "<e xmlns:a=\"urn:x\" xmlns:b=\"urn:x\" a:k=\"1\" b:k=\"2\"/>",
            );
            assert_err!(
                XmlErrorKind::Namespace(NamespaceError::DuplicateAttribute {
                    namespace: "urn:x".to_string(),
                    local: "k".to_string(),
                }),
                reader
            );
        }

        #[test]
        fn declarations_do_not_appear_as_attributes() {
            let mut reader = Reader::from_str("<a xmlns:p=\"urn:x\" k=\"v\"/>");
            let _ = reader.next(); // StartNamespace
            assert_evt!(Ok(elem_attrs("a", &[("k", "v")])), reader);
        }

        #[test]
        fn passthrough_when_disabled() {
            let config = ParserConfig::new().namespace_aware(false);
            let mut reader = Reader::from_str_with_config("<p:a xmlns:p=\"urn:x\"/>", config);
            assert_evt!(
                Ok(elem_attrs("p:a", &[("xmlns:p", "urn:x")])),
                reader
            );
            assert_evt!(Ok(end("p:a")), reader);
            assert_evt!(Ok(None), reader);
        }
    }

    mod doctype {
        use super::*;
        use assert_matches::assert_matches;

        #[test]
        fn doctype_is_consumed_silently() {
            let mut reader = Reader::from_str("<!DOCTYPE d SYSTEM \"d.dtd\"><d/>");
            assert_evt!(Ok(elem("d")), reader);
            assert_evt!(Ok(end("d")), reader);
            assert_evt!(Ok(None), reader);
        }

        #[test]
        fn doctype_after_root_fails() {
            let mut reader = Reader::from_str("<d/><!DOCTYPE d>");
            let _ = reader.next();
            let _ = reader.next();
            assert_err!(XmlErrorKind::Syntax(SyntaxError::MisplacedDoctype), reader);
        }

        #[test]
        fn second_doctype_fails() {
            let mut reader = Reader::from_str("<!DOCTYPE d><!DOCTYPE d><d/>");
            assert_err!(XmlErrorKind::Syntax(SyntaxError::MisplacedDoctype), reader);
        }

        #[test]
        fn doctype_inside_content_fails() {
            let mut reader = Reader::from_str("<d><!DOCTYPE d></d>");
            assert_matches!(reader.next(), Ok(Some(XmlEvent::StartElement { .. })));
            assert_err!(XmlErrorKind::Syntax(SyntaxError::MisplacedDoctype), reader);
        }
    }

    mod feeding {
        use super::*;
        use assert_matches::assert_matches;

        fn collect_all(parser: &mut FeedParser, chunks: &[&[u8]]) -> Vec<XmlEvent> {
            let mut events = vec![];
            for chunk in chunks.iter().copied() {
                events.extend(parser.feed(chunk).unwrap());
            }
            events.extend(parser.finish().unwrap());
            events
        }

        #[test]
        fn byte_at_a_time_equals_whole_buffer() {
            let doc = "<?xml version='1.0'?><!DOCTYPE d [<!ENTITY e \"ok\">]>\
                       <d a='1&amp;2'><![CDATA[x]]>&e;<c>text</c><!--c--></d>";

            let mut whole = FeedParser::new();
            let expected = collect_all(&mut whole, &[doc.as_bytes()]);

            let mut dribble = FeedParser::new();
            let chunks: Vec<&[u8]> = doc.as_bytes().chunks(1).collect();
            let actual = collect_all(&mut dribble, &chunks);

            assert_eq!(expected, actual);
            assert!(!expected.is_empty());
        }

        #[test]
        fn feed_returns_events_as_they_complete() {
            let mut parser = FeedParser::new();
            let first = parser.feed(b"<a><b>hello").unwrap();
            assert_eq!(
                first,
                vec![
                    XmlEvent::start_element(Name::plain("a"), vec![]),
                    XmlEvent::start_element(Name::plain("b"), vec![]),
                ]
            );
            let second = parser.feed(b"</b>").unwrap();
            assert_eq!(
                second,
                vec![
                    XmlEvent::characters("hello"),
                    XmlEvent::end_element(Name::plain("b")),
                ]
            );
            let rest = parser.feed(b"</a>").unwrap();
            assert_eq!(rest, vec![XmlEvent::end_element(Name::plain("a"))]);
            assert_eq!(parser.finish().unwrap(), vec![]);
            assert!(parser.is_finished());
        }

        #[test]
        fn finish_with_open_element_fails() {
            let mut parser = FeedParser::new();
            parser.feed(b"<a><b>").unwrap();
            let err = parser.finish().unwrap_err();
            assert_eq!(err.kind(), &XmlErrorKind::UnexpectedEndOfInput);
        }

        #[test]
        fn failed_parser_keeps_returning_the_error() {
            let mut parser = FeedParser::new();
            let err = parser.feed(b"<a></b>").unwrap_err();
            let again = parser.feed(b"<ignored/>").unwrap_err();
            assert_eq!(err, again);
        }

        #[test]
        fn next_event_signals_need_more_input() {
            let mut parser = FeedParser::new();
            parser.push_bytes(b"<a").unwrap();
            assert_matches!(parser.next_event(), Ok(ParseStep::NeedMoreInput));
            parser.push_bytes(b"/>").unwrap();
            assert_matches!(parser.next_event(), Ok(ParseStep::Event(_)));
        }

        #[test]
        fn two_instances_agree() {
            let doc: &[u8] = b"<a><b>x</b><b>y</b></a>";
            let mut first = FeedParser::new();
            let mut second = FeedParser::new();
            assert_eq!(
                collect_all(&mut first, &[doc]),
                collect_all(&mut second, &[doc])
            );
        }
    }

    mod positions {
        use super::*;

        #[test]
        fn error_position_points_at_the_offender() {
            let mut reader = Reader::from_str("<a>\n<b></c>");
            let _ = reader.next(); // <a>
            let _ = reader.next(); // "\n"
            let _ = reader.next(); // <b>
            let err = reader.next().unwrap_err();
            assert_eq!(err.position().line, 2);
            assert_eq!(err.position().column, 6);
            assert_eq!(err.position().offset, 9);
        }

        #[test]
        fn position_advances_with_consumption() {
            let mut reader = Reader::from_str("<a>x</a>");
            assert_eq!(reader.position().offset, 0);
            let _ = reader.next();
            assert_eq!(reader.position().offset, 3);
        }
    }
}
