use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::{EntityError, XmlErrorKind};

/// The five predefined entities with their replacement text.
///
/// The replacement text keeps the character-reference form (the way the
/// XML specification declares them), so re-parsing it as content yields
/// the literal character without the tokenizer mistaking `<` or `&` for
/// markup.
const BUILTIN_ENTITIES: &[(&str, &str)] = &[
    ("lt", "&#60;"),
    ("gt", "&#62;"),
    ("amp", "&#38;"),
    ("apos", "&#39;"),
    ("quot", "&#34;"),
];

/// How a general entity is defined.
#[derive(Clone, Debug)]
pub(crate) enum EntityDef {
    /// Replacement text, with character and parameter-entity references
    /// already substituted at declaration time.
    Internal(Arc<str>),
    External {
        system_id: String,
        public_id: Option<String>,
        /// `NDATA` notation name; present on unparsed entities, which
        /// must not be referenced in content.
        ndata: Option<String>,
    },
}

#[derive(Clone, Debug)]
pub(crate) struct Entity {
    pub(crate) def: EntityDef,
}

/// General and parameter entities known to one parse.
///
/// The built-ins are seeded from an immutable constant table and cannot
/// be overridden with different replacement text; among user
/// declarations the first one wins (later ones are ignored, as the XML
/// specification requires).
pub struct Entities {
    general: HashMap<String, Entity>,
    /// Decoded replacement text of external entities the resolver
    /// produced, so repeated references fetch only once.
    resolved: HashMap<String, Arc<str>>,
}

impl Default for Entities {
    fn default() -> Self {
        let mut general = HashMap::with_capacity(BUILTIN_ENTITIES.len());
        for (name, text) in BUILTIN_ENTITIES {
            general.insert(
                name.to_string(),
                Entity {
                    def: EntityDef::Internal(Arc::from(*text)),
                },
            );
        }
        Self {
            general,
            resolved: HashMap::new(),
        }
    }
}

impl Entities {
    /// Accepted re-declarations of a built-in: its canonical
    /// (character-reference) replacement, or the literal character for
    /// the entities the XML specification allows to be declared
    /// directly (`gt`, `apos`, `quot`).
    fn builtin_accepts(name: &str, replacement: &str) -> Option<bool> {
        let (_, canonical) = BUILTIN_ENTITIES.iter().find(|(n, _)| *n == name)?;
        let literal = match name {
            "gt" => Some(">"),
            "apos" => Some("'"),
            "quot" => Some("\""),
            _ => None,
        };
        Some(replacement == *canonical || literal == Some(replacement))
    }

    pub(crate) fn define_internal(
        &mut self,
        name: &str,
        replacement: &str,
    ) -> Result<(), XmlErrorKind> {
        match Self::builtin_accepts(name, replacement) {
            Some(true) => return Ok(()),
            Some(false) => {
                return Err(XmlErrorKind::Entity(EntityError::Redefinition(
                    name.to_string(),
                )))
            }
            None => {}
        }

        if self.general.contains_key(name) {
            debug!("ignoring re-declaration of entity {:?}", name);
            return Ok(());
        }
        self.general.insert(
            name.to_string(),
            Entity {
                def: EntityDef::Internal(Arc::from(replacement)),
            },
        );
        Ok(())
    }

    pub(crate) fn define_external(
        &mut self,
        name: &str,
        system_id: &str,
        public_id: Option<&str>,
        ndata: Option<&str>,
    ) -> Result<(), XmlErrorKind> {
        if BUILTIN_ENTITIES.iter().any(|(n, _)| *n == name) {
            return Err(XmlErrorKind::Entity(EntityError::Redefinition(
                name.to_string(),
            )));
        }
        if self.general.contains_key(name) {
            debug!("ignoring re-declaration of entity {:?}", name);
            return Ok(());
        }
        self.general.insert(
            name.to_string(),
            Entity {
                def: EntityDef::External {
                    system_id: system_id.to_string(),
                    public_id: public_id.map(|id| id.to_string()),
                    ndata: ndata.map(|n| n.to_string()),
                },
            },
        );
        Ok(())
    }

    pub(crate) fn general(&self, name: &str) -> Option<&Entity> {
        self.general.get(name)
    }

    pub(crate) fn cache_resolved(&mut self, name: &str, text: Arc<str>) {
        self.resolved.insert(name.to_string(), text);
    }

    pub(crate) fn resolved(&self, name: &str) -> Option<Arc<str>> {
        self.resolved.get(name).cloned()
    }
}

/// Result of asking the resolver for an external entity.
pub enum ResolvedEntity {
    /// Raw bytes of the entity; the parser decodes and parses them.
    Bytes(Vec<u8>),
    /// The resolver chose not to provide the entity; the reference is
    /// reported as an [`crate::XmlEvent::EntityReference`] event.
    Declined,
}

/// Fetches external entities (`SYSTEM`/`PUBLIC` references) on behalf
/// of the parser.
///
/// The parser never touches the filesystem or the network itself; all
/// retrieval goes through this collaborator.
pub trait ExternalEntityResolver {
    fn resolve(&mut self, system_id: &str, public_id: Option<&str>) -> ResolvedEntity;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_seeded() {
        let entities = Entities::default();
        for name in ["lt", "gt", "amp", "apos", "quot"] {
            assert!(entities.general(name).is_some());
        }
    }

    #[test]
    fn builtin_redeclaration_with_canonical_text_is_ignored() {
        let mut entities = Entities::default();
        entities.define_internal("lt", "&#60;").unwrap();
        entities.define_internal("gt", ">").unwrap();
        entities.define_internal("quot", "\"").unwrap();
    }

    #[test]
    fn builtin_redefinition_fails() {
        let mut entities = Entities::default();
        assert!(matches!(
            entities.define_internal("lt", "<"),
            Err(XmlErrorKind::Entity(EntityError::Redefinition(name))) if name == "lt"
        ));
        assert!(entities.define_external("amp", "urn:x", None, None).is_err());
    }

    #[test]
    fn first_declaration_wins() {
        let mut entities = Entities::default();
        entities.define_internal("e", "first").unwrap();
        entities.define_internal("e", "second").unwrap();
        match &entities.general("e").unwrap().def {
            EntityDef::Internal(text) => assert_eq!(&**text, "first"),
            def => panic!("unexpected definition {:?}", def),
        }
    }
}
