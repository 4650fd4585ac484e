//! Documents: mutable, timestamped, signed profile records
//!
//! Users publish a visa (which carries their communication key), groups
//! publish a bulletin. Several documents may exist for one identifier; the
//! latest one per type is authoritative, and a document is superseded only by
//! another whose time is strictly later.

use alloc::collections::BTreeMap;
use core::fmt;
use serde::{Deserialize, Serialize};

use crate::keys::PublicKey;
use crate::types::{Identifier, Timestamp};

// ----------------------------------------------------------------------------
// Document Type
// ----------------------------------------------------------------------------

/// Declared document type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    /// User profile carrying the communication key
    Visa,
    /// Group profile
    Bulletin,
    /// Any other declared type
    Other(String),
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentType::Visa => write!(f, "visa"),
            DocumentType::Bulletin => write!(f, "bulletin"),
            DocumentType::Other(name) => write!(f, "{}", name),
        }
    }
}

// ----------------------------------------------------------------------------
// Document
// ----------------------------------------------------------------------------

/// Signed profile record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    identifier: Identifier,
    doc_type: Option<DocumentType>,
    time: Option<Timestamp>,
    public_key: Option<PublicKey>,
    properties: BTreeMap<String, String>,
    signature: Option<Vec<u8>>,
}

impl Document {
    /// Create an unsigned document
    pub fn new(identifier: Identifier, doc_type: Option<DocumentType>, time: Option<Timestamp>) -> Self {
        Self {
            identifier,
            doc_type,
            time,
            public_key: None,
            properties: BTreeMap::new(),
            signature: None,
        }
    }

    /// Create an unsigned visa with its communication key
    pub fn visa(identifier: Identifier, time: Timestamp, public_key: PublicKey) -> Self {
        let mut doc = Self::new(identifier, Some(DocumentType::Visa), Some(time));
        doc.public_key = Some(public_key);
        doc
    }

    /// Create an unsigned bulletin
    pub fn bulletin(identifier: Identifier, time: Timestamp) -> Self {
        Self::new(identifier, Some(DocumentType::Bulletin), Some(time))
    }

    /// Attach the signature produced by the crypto library
    pub fn signed(mut self, signature: Vec<u8>) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Set a profile property (name, avatar, ...)
    pub fn with_property<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn doc_type(&self) -> Option<&DocumentType> {
        self.doc_type.as_ref()
    }

    pub fn time(&self) -> Option<Timestamp> {
        self.time
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Display name declared in the document
    pub fn name(&self) -> Option<&str> {
        self.property("name")
    }

    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    /// A document is usable once signed; verifying the signature against the
    /// meta key is done by the crypto library before it is handed over
    pub fn is_valid(&self) -> bool {
        self.signature.as_ref().is_some_and(|s| !s.is_empty())
    }

    pub fn is_visa(&self) -> bool {
        self.doc_type == Some(DocumentType::Visa)
    }

    pub fn is_bulletin(&self) -> bool {
        self.doc_type == Some(DocumentType::Bulletin)
    }

    /// Communication key carried by a visa
    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    /// Whether this document is strictly older than `other`
    ///
    /// Documents without a time are never considered expired.
    pub fn is_expired_by(&self, other: &Document) -> bool {
        match (self.time, other.time) {
            (Some(this_time), Some(other_time)) => this_time.is_before(other_time),
            _ => false,
        }
    }
}

// ----------------------------------------------------------------------------
// Selection Helpers
// ----------------------------------------------------------------------------

/// Latest document matching `kind`
///
/// `None` matches every document. Documents with no declared type match any
/// requested kind. Later entries win ties.
pub fn last_document<'a>(documents: &'a [Document], kind: Option<&DocumentType>) -> Option<&'a Document> {
    let mut last: Option<&Document> = None;
    for doc in documents {
        if let (Some(kind), Some(doc_type)) = (kind, doc.doc_type()) {
            if kind != doc_type {
                continue;
            }
        }
        if let Some(current) = last {
            if doc.is_expired_by(current) {
                continue;
            }
        }
        last = Some(doc);
    }
    last
}

/// Latest visa in the list
pub fn last_visa(documents: &[Document]) -> Option<&Document> {
    last_of(documents, Document::is_visa)
}

/// Latest bulletin in the list
pub fn last_bulletin(documents: &[Document]) -> Option<&Document> {
    last_of(documents, Document::is_bulletin)
}

fn last_of<F>(documents: &[Document], matches: F) -> Option<&Document>
where
    F: Fn(&Document) -> bool,
{
    documents
        .iter()
        .filter(|doc| matches(doc))
        .fold(None, |last: Option<&Document>, doc| match last {
            Some(current) if doc.is_expired_by(current) => Some(current),
            _ => Some(doc),
        })
}
