use crate::namespace::{Namespace, QName, XMLNS_NAMESPACE_URI, XML_NAMESPACE_URI};
use crate::{NamespaceError, XmlErrorKind};

/// In-scope namespace declarations.
///
/// One scope is opened per element, holding that element's
/// declarations as (prefix, binding) pairs on a flat vector; per-scope
/// counts allow popping without back references. Lookup walks the
/// vector from the innermost binding outwards. A `None` binding
/// records an undeclared default namespace (`xmlns=""`).
pub struct NamespaceStack {
    bindings: Vec<(Option<String>, Option<Namespace>)>,
    scope_sizes: Vec<usize>,
}

impl NamespaceStack {
    pub fn new() -> Self {
        Self {
            bindings: vec![
                (Some("xml".to_string()), Some(Namespace::new(XML_NAMESPACE_URI))),
                (
                    Some("xmlns".to_string()),
                    Some(Namespace::new(XMLNS_NAMESPACE_URI)),
                ),
            ],
            scope_sizes: vec![],
        }
    }

    pub fn build_scope(&mut self) -> ScopeBuilder<'_> {
        ScopeBuilder {
            stack: self,
            size: 0,
        }
    }

    pub fn pop_scope(&mut self) {
        let size = self.scope_sizes.pop().expect("no open namespace scope");
        self.bindings.truncate(self.bindings.len() - size);
    }

    pub fn resolve_prefix(&self, prefix: &str) -> Option<Namespace> {
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p.as_deref() == Some(prefix))
            .and_then(|(_, ns)| ns.clone())
    }

    pub fn resolve_default(&self) -> Option<Namespace> {
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p.is_none())
            .and_then(|(_, ns)| ns.clone())
    }

    /// Namespace of an element name: the default namespace applies to
    /// unprefixed names.
    pub fn resolve_element(&self, qname: &QName) -> Result<Option<Namespace>, XmlErrorKind> {
        match qname.prefix() {
            Some(prefix) => match self.resolve_prefix(prefix) {
                Some(ns) => Ok(Some(ns)),
                None => Err(XmlErrorKind::Namespace(NamespaceError::UnboundPrefix(
                    prefix.to_string(),
                ))),
            },
            None => Ok(self.resolve_default()),
        }
    }

    /// Namespace of an attribute name: unprefixed attributes never take
    /// the default namespace.
    pub fn resolve_attribute(&self, qname: &QName) -> Result<Option<Namespace>, XmlErrorKind> {
        match qname.prefix() {
            Some(prefix) => match self.resolve_prefix(prefix) {
                Some(ns) => Ok(Some(ns)),
                None => Err(XmlErrorKind::Namespace(NamespaceError::UnboundPrefix(
                    prefix.to_string(),
                ))),
            },
            None => Ok(None),
        }
    }
}

impl Default for NamespaceStack {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ScopeBuilder<'a> {
    stack: &'a mut NamespaceStack,
    size: usize,
}

impl<'a> ScopeBuilder<'a> {
    /// `xmlns:prefix="uri"`
    pub fn bind_prefix(&mut self, prefix: &str, uri: &str) -> Result<(), XmlErrorKind> {
        if prefix == "xmlns" {
            return Err(XmlErrorKind::Namespace(NamespaceError::ReservedPrefix(
                prefix.to_string(),
            )));
        }
        // `xml` may only carry its fixed namespace, and that namespace
        // may not move to another prefix; same for the xmlns namespace.
        if uri.is_empty()
            || ((prefix == "xml") != (uri == XML_NAMESPACE_URI))
            || uri == XMLNS_NAMESPACE_URI
        {
            return Err(XmlErrorKind::Namespace(NamespaceError::IllegalNamespaceUri(
                uri.to_string(),
            )));
        }

        self.stack
            .bindings
            .push((Some(prefix.to_string()), Some(Namespace::new(uri))));
        self.size += 1;
        Ok(())
    }

    /// `xmlns="uri"` or `xmlns=""`
    pub fn bind_default(&mut self, uri: &str) -> Result<(), XmlErrorKind> {
        if uri == XML_NAMESPACE_URI || uri == XMLNS_NAMESPACE_URI {
            return Err(XmlErrorKind::Namespace(NamespaceError::IllegalNamespaceUri(
                uri.to_string(),
            )));
        }

        let binding = if uri.is_empty() {
            None
        } else {
            Some(Namespace::new(uri))
        };
        self.stack.bindings.push((None, binding));
        self.size += 1;
        Ok(())
    }

    pub fn finish(self) {
        self.stack.scope_sizes.push(self.size);
    }
}
