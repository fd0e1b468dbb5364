use std::fmt;
use std::sync::Arc;

use crate::{SyntaxError, XmlErrorKind};

pub mod stack;

/// Namespace of the `xml` prefix, bound in every document.
pub const XML_NAMESPACE_URI: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespace of the `xmlns` prefix, never usable as a content namespace.
pub const XMLNS_NAMESPACE_URI: &str = "http://www.w3.org/2000/xmlns/";

/// Namespace URI, cheap to clone and shareable across threads.
#[derive(Clone, Eq)]
pub struct Namespace {
    uri: Arc<str>,
}

impl Namespace {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into().into_boxed_str().into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }
}

impl PartialEq for Namespace {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl PartialEq<str> for Namespace {
    fn eq(&self, other: &str) -> bool {
        &*self.uri == other
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Namespace").field(&self.uri).finish()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Qualified name split into prefix and local part, borrowing from the
/// input buffer.
#[derive(PartialEq, Debug, Copy, Clone)]
pub struct QName<'a> {
    prefix: Option<&'a str>,
    local: &'a str,
}

impl<'a> QName<'a> {
    pub fn from_str(input: &'a str) -> Result<Self, XmlErrorKind> {
        if let Some((prefix, local)) = input.split_once(':') {
            if prefix.is_empty() || local.is_empty() || local.as_bytes().contains(&b':') {
                return Err(XmlErrorKind::Syntax(SyntaxError::IllegalName {
                    name: input.to_string(),
                }));
            }

            Ok(QName {
                prefix: Some(prefix),
                local,
            })
        } else {
            Ok(QName {
                prefix: None,
                local: input,
            })
        }
    }

    pub fn prefix(&self) -> Option<&'a str> {
        self.prefix
    }

    pub fn local(&self) -> &'a str {
        self.local
    }
}

impl<'a> fmt::Display for QName<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = self.prefix {
            write!(f, "{}:{}", prefix, self.local)
        } else {
            f.write_str(self.local)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qname_without_prefix() {
        let qname = QName::from_str("elem").unwrap();
        assert_eq!(qname.prefix(), None);
        assert_eq!(qname.local(), "elem");
    }

    #[test]
    fn qname_with_prefix() {
        let qname = QName::from_str("ns:elem").unwrap();
        assert_eq!(qname.prefix(), Some("ns"));
        assert_eq!(qname.local(), "elem");
    }

    #[test]
    fn qname_rejects_double_colon() {
        assert!(QName::from_str("a:b:c").is_err());
    }

    #[test]
    fn qname_rejects_empty_parts() {
        assert!(QName::from_str(":a").is_err());
        assert!(QName::from_str("a:").is_err());
    }
}
