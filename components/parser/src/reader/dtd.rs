//! Document type declaration.
//!
//! The declaration is parsed for what a non-validating processor needs:
//! entity declarations from the internal subset. Element, attribute
//! list, and notation declarations are skipped over; parameter-entity
//! references are expanded while the subset is read.

use log::debug;

use sxl_chars::XmlChar;

use crate::parser::string::lit;
use crate::parser::{Parser, TokenError};
use crate::reader::tokens::{
    match_construct, skip_whitespace, take_quoted, CharRefToken, CommentToken, ConstructMatch,
    EntityRefToken, NameToken, PIToken, SToken,
};
use crate::{Cursor, EntityError, SyntaxError, XmlErrorKind};

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DoctypeDecl {
    pub(crate) name: String,
    pub(crate) external_id: Option<ExternalId>,
    pub(crate) entities: Vec<EntityDecl>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ExternalId {
    System { system: String },
    Public { public: String, system: String },
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum EntityKind {
    General,
    Parameter,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum EntityDeclDef {
    /// Replacement text with character and parameter-entity references
    /// already substituted.
    Internal(String),
    External {
        id: ExternalId,
        ndata: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct EntityDecl {
    pub(crate) name: String,
    pub(crate) kind: EntityKind,
    pub(crate) def: EntityDeclDef,
}

///     doctypedecl ::= '<!DOCTYPE' S Name (S ExternalID)? S? ('[' intSubset ']' S?)? '>'
pub(crate) struct DoctypeToken {
    pub(crate) max_expansion_depth: usize,
}

impl<'a> Parser<'a> for DoctypeToken {
    type Attribute = DoctypeDecl;
    type Error = TokenError;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        let (_, cursor) = lit("<!DOCTYPE").parse(cursor)?;
        let (_, cursor) = SToken.parse(cursor)?;
        let (name, cursor) = NameToken.parse(cursor)?;
        let (_, mut cursor) = skip_whitespace(cursor)?;

        let mut external_id = None;
        if matches!(cursor.next_byte(0), Some(b'S' | b'P')) {
            let (id, cur) = parse_external_id(cursor)?;
            external_id = Some(id);
            let (_, cur) = skip_whitespace(cur)?;
            cursor = cur;
        }

        let mut entities = vec![];
        if cursor.next_byte(0) == Some(b'[') {
            let cur = self.parse_int_subset(cursor.advance(1), &mut entities)?;
            let (_, cur) = skip_whitespace(cur)?;
            cursor = cur;
        }

        match cursor.next_byte(0) {
            Some(b'>') => Ok((
                DoctypeDecl {
                    name: name.to_string(),
                    external_id,
                    entities,
                },
                cursor.advance(1),
            )),
            Some(_) => Err(TokenError::new(
                XmlErrorKind::expect_token(">"),
                cursor.offset(),
            )),
            None => Err(TokenError::incomplete(cursor)),
        }
    }
}

impl DoctypeToken {
    ///     intSubset ::= (markupdecl | DeclSep)*
    ///
    /// Consumes the closing `]` as well.
    fn parse_int_subset<'a>(
        &self,
        mut cursor: Cursor<'a>,
        entities: &mut Vec<EntityDecl>,
    ) -> Result<Cursor<'a>, TokenError> {
        loop {
            let (_, cur) = skip_whitespace(cursor)?;
            cursor = cur;
            match cursor.next_byte(0) {
                None => return Err(TokenError::incomplete(cursor)),
                Some(b']') => return Ok(cursor.advance(1)),
                Some(b'%') => {
                    let offset = cursor.offset();
                    let (pe_name, cur) = parse_pe_reference(cursor)?;
                    match find_parameter(entities, pe_name) {
                        Some(text) => {
                            self.parse_subset_fragment(&text, entities, 1)
                                .map_err(|kind| TokenError::new(kind, offset))?;
                        }
                        None => {
                            debug!("skipping unresolved parameter entity %{};", pe_name);
                        }
                    }
                    cursor = cur;
                }
                Some(b'<') => {
                    cursor = self.parse_markup_decl(cursor, entities, 1)?;
                }
                Some(_) => {
                    return Err(TokenError::new(
                        XmlErrorKind::expect_token("markup declaration"),
                        cursor.offset(),
                    ))
                }
            }
        }
    }

    /// Declarations brought in by a parameter entity; the text is
    /// complete, so running out of it is a syntax error rather than a
    /// reason to wait for input.
    fn parse_subset_fragment(
        &self,
        text: &str,
        entities: &mut Vec<EntityDecl>,
        depth: usize,
    ) -> Result<(), XmlErrorKind> {
        if depth > self.max_expansion_depth {
            return Err(XmlErrorKind::Entity(EntityError::DepthLimitExceeded(
                self.max_expansion_depth,
            )));
        }

        let mut cursor = Cursor::new(text);
        loop {
            let (_, cur) = match skip_whitespace(cursor) {
                Ok(step) => step,
                // only whitespace left in the fragment
                Err(_) => return Ok(()),
            };
            cursor = cur;
            match cursor.next_byte(0) {
                None => return Ok(()),
                Some(b'%') => {
                    let (pe_name, cur) = parse_pe_reference(cursor).map_err(complete_kind)?;
                    match find_parameter(entities, pe_name) {
                        Some(inner) => self.parse_subset_fragment(&inner, entities, depth + 1)?,
                        None => debug!("skipping unresolved parameter entity %{};", pe_name),
                    }
                    cursor = cur;
                }
                Some(b'<') => {
                    cursor = self
                        .parse_markup_decl(cursor, entities, depth)
                        .map_err(complete_kind)?;
                }
                Some(_) => return Err(XmlErrorKind::expect_token("markup declaration")),
            }
        }
    }

    ///     markupdecl ::= elementdecl | AttlistDecl | EntityDecl | NotationDecl | PI | Comment
    fn parse_markup_decl<'a>(
        &self,
        cursor: Cursor<'a>,
        entities: &mut Vec<EntityDecl>,
        depth: usize,
    ) -> Result<Cursor<'a>, TokenError> {
        match match_construct(cursor, "<!ENTITY") {
            ConstructMatch::Yes => return self.parse_entity_decl(cursor, entities, depth),
            ConstructMatch::Undecided => return Err(TokenError::incomplete(cursor)),
            ConstructMatch::No => {}
        }
        match match_construct(cursor, "<!--") {
            ConstructMatch::Yes => {
                let (_, cur) = CommentToken.parse(cursor)?;
                return Ok(cur);
            }
            ConstructMatch::Undecided => return Err(TokenError::incomplete(cursor)),
            ConstructMatch::No => {}
        }
        match match_construct(cursor, "<?") {
            ConstructMatch::Yes => {
                let (_, cur) = PIToken.parse(cursor)?;
                return Ok(cur);
            }
            ConstructMatch::Undecided => return Err(TokenError::incomplete(cursor)),
            ConstructMatch::No => {}
        }
        for keyword in ["<!ELEMENT", "<!ATTLIST", "<!NOTATION"] {
            match match_construct(cursor, keyword) {
                ConstructMatch::Yes => return skip_markup_decl(cursor),
                ConstructMatch::Undecided => return Err(TokenError::incomplete(cursor)),
                ConstructMatch::No => {}
            }
        }
        Err(TokenError::new(
            XmlErrorKind::expect_token("markup declaration"),
            cursor.offset(),
        ))
    }

    ///     EntityDecl ::= GEDecl | PEDecl
    ///     GEDecl     ::= '<!ENTITY' S Name S EntityDef S? '>'
    ///     PEDecl     ::= '<!ENTITY' S '%' S Name S PEDef S? '>'
    fn parse_entity_decl<'a>(
        &self,
        cursor: Cursor<'a>,
        entities: &mut Vec<EntityDecl>,
        depth: usize,
    ) -> Result<Cursor<'a>, TokenError> {
        let (_, cursor) = lit("<!ENTITY").parse(cursor)?;
        let (_, cursor) = SToken.parse(cursor)?;

        let (kind, cursor) = if cursor.next_byte(0) == Some(b'%') {
            let (_, cur) = SToken.parse(cursor.advance(1))?;
            (EntityKind::Parameter, cur)
        } else {
            (EntityKind::General, cursor)
        };

        let (name, cursor) = NameToken.parse(cursor)?;
        let (_, cursor) = SToken.parse(cursor)?;

        let (def, cursor) = match cursor.next_byte(0) {
            Some(b'"' | b'\'') => {
                let (raw, offset, cur) = take_quoted(cursor)?;
                let replacement = self
                    .process_entity_value(raw, entities, depth)
                    .map_err(|kind| TokenError::new(kind, offset))?;
                (EntityDeclDef::Internal(replacement), cur)
            }
            Some(_) => {
                let (id, cur) = parse_external_id(cursor)?;
                let (saw_ws, cur) = skip_whitespace(cur)?;
                let (ndata, cur) = if saw_ws {
                    match match_construct(cur, "NDATA") {
                        ConstructMatch::Yes => {
                            if kind == EntityKind::Parameter {
                                return Err(TokenError::new(
                                    XmlErrorKind::expect_token(">"),
                                    cur.offset(),
                                ));
                            }
                            let (_, cur) = lit("NDATA").parse(cur)?;
                            let (_, cur) = SToken.parse(cur)?;
                            let (notation, cur) = NameToken.parse(cur)?;
                            (Some(notation.to_string()), cur)
                        }
                        ConstructMatch::Undecided => return Err(TokenError::incomplete(cur)),
                        ConstructMatch::No => (None, cur),
                    }
                } else {
                    (None, cur)
                };
                (EntityDeclDef::External { id, ndata }, cur)
            }
            None => return Err(TokenError::incomplete(cursor)),
        };

        let (_, cursor) = skip_whitespace(cursor)?;
        match cursor.next_byte(0) {
            Some(b'>') => {
                entities.push(EntityDecl {
                    name: name.to_string(),
                    kind,
                    def,
                });
                Ok(cursor.advance(1))
            }
            Some(_) => Err(TokenError::new(
                XmlErrorKind::expect_token(">"),
                cursor.offset(),
            )),
            None => Err(TokenError::incomplete(cursor)),
        }
    }

    /// Builds the replacement text of an internal entity: character
    /// references and parameter-entity references are substituted now,
    /// general-entity references stay for the lazy expansion at the
    /// reference site.
    fn process_entity_value(
        &self,
        raw: &str,
        entities: &[EntityDecl],
        depth: usize,
    ) -> Result<String, XmlErrorKind> {
        if depth > self.max_expansion_depth {
            return Err(XmlErrorKind::Entity(EntityError::DepthLimitExceeded(
                self.max_expansion_depth,
            )));
        }

        let mut out = String::with_capacity(raw.len());
        let mut cursor = Cursor::new(raw);
        while let Some(c) = cursor.next_char() {
            match c {
                '&' => {
                    if cursor.next_byte(1) == Some(b'#') {
                        let (c, cur) = CharRefToken.parse(cursor).map_err(complete_kind)?;
                        out.push(c);
                        cursor = cur;
                    } else {
                        // kept literally, expanded lazily at the
                        // reference site
                        let start = cursor;
                        let (_, cur) = EntityRefToken.parse(cursor).map_err(complete_kind)?;
                        out.push_str(&start.rest()[..cur.offset() - start.offset()]);
                        cursor = cur;
                    }
                }
                '%' => {
                    let (pe_name, cur) = parse_pe_reference(cursor).map_err(complete_kind)?;
                    match find_parameter(entities, pe_name) {
                        Some(text) => {
                            out.push_str(&self.process_entity_value(
                                &text,
                                entities,
                                depth + 1,
                            )?);
                        }
                        None => {
                            return Err(XmlErrorKind::Entity(EntityError::Undefined(format!(
                                "%{}",
                                pe_name
                            ))))
                        }
                    }
                    cursor = cur;
                }
                c if !c.is_xml_char() => {
                    return Err(XmlErrorKind::Syntax(SyntaxError::IllegalChar(c)))
                }
                c => {
                    out.push(c);
                    cursor = cursor.advance(c.len_utf8());
                }
            }
        }
        Ok(out)
    }
}

///     PEReference ::= '%' Name ';'
fn parse_pe_reference(cursor: Cursor) -> Result<(&str, Cursor), TokenError> {
    let (_, cursor) = lit("%").parse(cursor)?;
    let (name, cursor) = NameToken.parse(cursor)?;
    let (_, cursor) = lit(";").parse(cursor)?;
    Ok((name, cursor))
}

///     ExternalID ::= 'SYSTEM' S SystemLiteral | 'PUBLIC' S PubidLiteral S SystemLiteral
fn parse_external_id(cursor: Cursor) -> Result<(ExternalId, Cursor), TokenError> {
    match match_construct(cursor, "SYSTEM") {
        ConstructMatch::Yes => {
            let (_, cursor) = lit("SYSTEM").parse(cursor)?;
            let (_, cursor) = SToken.parse(cursor)?;
            let (system, cursor) = parse_system_literal(cursor)?;
            return Ok((
                ExternalId::System {
                    system: system.to_string(),
                },
                cursor,
            ));
        }
        ConstructMatch::Undecided => return Err(TokenError::incomplete(cursor)),
        ConstructMatch::No => {}
    }
    match match_construct(cursor, "PUBLIC") {
        ConstructMatch::Yes => {
            let (_, cursor) = lit("PUBLIC").parse(cursor)?;
            let (_, cursor) = SToken.parse(cursor)?;
            let (public, offset, cursor) = take_quoted(cursor)?;
            if let Some((i, c)) = public.char_indices().find(|(_, c)| !c.is_xml_pubid_char()) {
                return Err(TokenError::new(
                    XmlErrorKind::Syntax(SyntaxError::IllegalChar(c)),
                    offset + i,
                ));
            }
            let (_, cursor) = SToken.parse(cursor)?;
            let (system, cursor) = parse_system_literal(cursor)?;
            Ok((
                ExternalId::Public {
                    public: public.to_string(),
                    system: system.to_string(),
                },
                cursor,
            ))
        }
        ConstructMatch::Undecided => Err(TokenError::incomplete(cursor)),
        ConstructMatch::No => Err(TokenError::new(
            XmlErrorKind::expect_token("SYSTEM or PUBLIC"),
            cursor.offset(),
        )),
    }
}

fn parse_system_literal(cursor: Cursor) -> Result<(&str, Cursor), TokenError> {
    let (system, offset, cursor) = take_quoted(cursor)?;
    if let Some((i, c)) = system.char_indices().find(|(_, c)| !c.is_xml_char()) {
        return Err(TokenError::new(
            XmlErrorKind::Syntax(SyntaxError::IllegalChar(c)),
            offset + i,
        ));
    }
    Ok((system, cursor))
}

/// Skips an ELEMENT, ATTLIST, or NOTATION declaration up to its closing
/// `>`, stepping over quoted literals (attribute defaults may contain
/// `>`).
fn skip_markup_decl(cursor: Cursor) -> Result<Cursor, TokenError> {
    let bytes = cursor.rest_bytes();
    let mut quote: Option<u8> = None;
    for (i, &c) in bytes.iter().enumerate() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                b'"' | b'\'' => quote = Some(c),
                b'>' => return Ok(cursor.advance(i + 1)),
                _ => {}
            },
        }
    }
    Err(TokenError::incomplete(cursor))
}

/// In fully-buffered replacement text running out of input is a plain
/// syntax error, never a reason to wait.
fn complete_kind(err: TokenError) -> XmlErrorKind {
    if err.is_incomplete() {
        XmlErrorKind::expect_token("complete declaration")
    } else {
        err.kind
    }
}

fn find_parameter(entities: &[EntityDecl], name: &str) -> Option<String> {
    entities.iter().find_map(|decl| {
        if decl.kind == EntityKind::Parameter && decl.name == name {
            match &decl.def {
                EntityDeclDef::Internal(text) => Some(text.clone()),
                EntityDeclDef::External { .. } => None,
            }
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> DoctypeDecl {
        let (decl, _) = DoctypeToken {
            max_expansion_depth: 20,
        }
        .parse(Cursor::new(input))
        .unwrap();
        decl
    }

    #[test]
    fn bare_doctype() {
        let decl = parse("<!DOCTYPE greeting>");
        assert_eq!(decl.name, "greeting");
        assert_eq!(decl.external_id, None);
        assert!(decl.entities.is_empty());
    }

    #[test]
    fn system_external_id() {
        let decl = parse("<!DOCTYPE greeting SYSTEM \"hello.dtd\">");
        assert_eq!(
            decl.external_id,
            Some(ExternalId::System {
                system: "hello.dtd".to_string()
            })
        );
    }

    #[test]
    fn public_external_id() {
        let decl = parse("<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0//EN\" 'xhtml1.dtd'>");
        assert_eq!(
            decl.external_id,
            Some(ExternalId::Public {
                public: "-//W3C//DTD XHTML 1.0//EN".to_string(),
                system: "xhtml1.dtd".to_string(),
            })
        );
    }

    #[test]
    fn internal_entity_declaration() {
        let decl = parse("<!DOCTYPE d [ <!ENTITY greeting \"hi there\"> ]>");
        assert_eq!(decl.entities.len(), 1);
        assert_eq!(decl.entities[0].name, "greeting");
        assert_eq!(decl.entities[0].kind, EntityKind::General);
        assert_eq!(
            decl.entities[0].def,
            EntityDeclDef::Internal("hi there".to_string())
        );
    }

    #[test]
    fn char_refs_expand_at_declaration_time() {
        let decl = parse("<!DOCTYPE d [ <!ENTITY e \"a&#x20;b\"> ]>");
        assert_eq!(decl.entities[0].def, EntityDeclDef::Internal("a b".to_string()));
    }

    #[test]
    fn general_refs_stay_literal() {
        let decl = parse("<!DOCTYPE d [ <!ENTITY e \"x&other;y\"> ]>");
        assert_eq!(
            decl.entities[0].def,
            EntityDeclDef::Internal("x&other;y".to_string())
        );
    }

    #[test]
    fn parameter_entity_expands_in_entity_value() {
        let decl = parse(
            "<!DOCTYPE d [ <!ENTITY % p \"world\"> <!ENTITY e \"hello %p;\"> ]>",
        );
        assert_eq!(decl.entities.len(), 2);
        assert_eq!(
            decl.entities[1].def,
            EntityDeclDef::Internal("hello world".to_string())
        );
    }

    #[test]
    fn parameter_entity_provides_declarations() {
        let decl = parse(
            "<!DOCTYPE d [ <!ENTITY % decls '<!ENTITY a \"1\"><!ENTITY b \"2\">'> %decls; ]>",
        );
        let names: Vec<_> = decl.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["decls", "a", "b"]);
    }

    #[test]
    fn external_entity_with_ndata() {
        let decl = parse("<!DOCTYPE d [ <!ENTITY img SYSTEM \"img.gif\" NDATA gif> ]>");
        assert_eq!(
            decl.entities[0].def,
            EntityDeclDef::External {
                id: ExternalId::System {
                    system: "img.gif".to_string()
                },
                ndata: Some("gif".to_string()),
            }
        );
    }

    #[test]
    fn element_and_attlist_declarations_are_skipped() {
        let decl = parse(
            "<!DOCTYPE d [ <!ELEMENT d (#PCDATA)> <!ATTLIST d a CDATA \"x>y\"> <!ENTITY e \"v\"> ]>",
        );
        assert_eq!(decl.entities.len(), 1);
        assert_eq!(decl.entities[0].name, "e");
    }

    #[test]
    fn comments_and_pis_inside_subset() {
        let decl = parse("<!DOCTYPE d [ <!-- note --> <?keep going?> ]>");
        assert!(decl.entities.is_empty());
    }

    #[test]
    fn undefined_parameter_entity_in_value_fails() {
        let result = DoctypeToken {
            max_expansion_depth: 20,
        }
        .parse(Cursor::new("<!DOCTYPE d [ <!ENTITY e \"%nope;\"> ]>"));
        assert!(matches!(
            result.unwrap_err().kind,
            XmlErrorKind::Entity(EntityError::Undefined(name)) if name == "%nope"
        ));
    }

    #[test]
    fn parameter_entity_cannot_reference_itself() {
        // expansion happens at declaration time, so a self-reference
        // sees an undeclared name
        let result = DoctypeToken {
            max_expansion_depth: 20,
        }
        .parse(Cursor::new("<!DOCTYPE d [ <!ENTITY % a \"%a;\"> ]>"));
        assert!(matches!(
            result.unwrap_err().kind,
            XmlErrorKind::Entity(EntityError::Undefined(name)) if name == "%a"
        ));
    }

    #[test]
    fn unterminated_doctype_is_incomplete() {
        let result = DoctypeToken {
            max_expansion_depth: 20,
        }
        .parse(Cursor::new("<!DOCTYPE d [ <!ENT"));
        assert!(result.unwrap_err().is_incomplete());
    }
}
