//! Message model consumed by the admission gate and transmitter
//!
//! Only the fields this core looks at are modelled: the envelope, the content
//! kind, the sender-document-time header and the meta/visa attachments. The
//! wire encoding belongs to the protocol library.

use alloc::collections::BTreeMap;
use core::fmt;
use serde::{Deserialize, Serialize};

use crate::handshake::HandshakeCommand;
use crate::identity::{Document, GroupCommand, Meta};
use crate::types::{Identifier, Timestamp};

// ----------------------------------------------------------------------------
// Envelope
// ----------------------------------------------------------------------------

/// Routing header shared by every message form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: Identifier,
    pub receiver: Identifier,
    pub time: Timestamp,
    /// Group the message belongs to when split for a single member
    pub group: Option<Identifier>,
}

impl Envelope {
    pub fn new(sender: Identifier, receiver: Identifier, time: Timestamp) -> Self {
        Self {
            sender,
            receiver,
            time,
            group: None,
        }
    }

    /// Sender and receiver are the same identity
    pub fn is_cycled(&self) -> bool {
        self.sender == self.receiver
    }
}

// ----------------------------------------------------------------------------
// Content
// ----------------------------------------------------------------------------

/// Explicit content-type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    Text,
    Receipt,
    Handshake,
    Meta,
    Documents,
    Group,
    Unknown,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Decrypted message content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Content {
    /// Plain text chat message
    Text { text: String },
    /// Delivery receipt
    Receipt { text: String },
    /// Session handshake command
    Handshake(HandshakeCommand),
    /// Meta response for an identifier
    Meta { identifier: Identifier, meta: Meta },
    /// Document response for an identifier
    Documents {
        identifier: Identifier,
        meta: Option<Meta>,
        documents: Vec<Document>,
    },
    /// Group-management command
    Group(GroupCommand),
    /// Content type this core does not understand
    Unknown { type_name: String },
}

impl Content {
    pub fn text<T: Into<String>>(text: T) -> Self {
        Content::Text { text: text.into() }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            Content::Text { .. } => ContentType::Text,
            Content::Receipt { .. } => ContentType::Receipt,
            Content::Handshake(_) => ContentType::Handshake,
            Content::Meta { .. } => ContentType::Meta,
            Content::Documents { .. } => ContentType::Documents,
            Content::Group(_) => ContentType::Group,
            Content::Unknown { .. } => ContentType::Unknown,
        }
    }

    /// Commands are protocol traffic rather than user conversation
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            Content::Handshake(_) | Content::Meta { .. } | Content::Documents { .. } | Content::Group(_)
        )
    }
}

// ----------------------------------------------------------------------------
// Instant / Secure / Reliable
// ----------------------------------------------------------------------------

/// Plain outbound message, before encryption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantMessage {
    pub envelope: Envelope,
    pub content: Content,
    /// Sender document time ("SDT") attached for the receiver
    pub sender_document_time: Option<Timestamp>,
}

impl InstantMessage {
    pub fn new(envelope: Envelope, content: Content) -> Self {
        Self {
            envelope,
            content,
            sender_document_time: None,
        }
    }

    pub fn sender(&self) -> &Identifier {
        &self.envelope.sender
    }

    pub fn receiver(&self) -> &Identifier {
        &self.envelope.receiver
    }
}

/// Encrypted but unsigned message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureMessage {
    pub envelope: Envelope,
    pub data: Vec<u8>,
    /// Encrypted message keys by receiver
    pub keys: BTreeMap<String, Vec<u8>>,
    pub sender_document_time: Option<Timestamp>,
}

impl SecureMessage {
    pub fn new(envelope: Envelope, data: Vec<u8>) -> Self {
        Self {
            envelope,
            data,
            keys: BTreeMap::new(),
            sender_document_time: None,
        }
    }
}

/// Encrypted and signed network message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReliableMessage {
    pub secure: SecureMessage,
    pub signature: Vec<u8>,
    /// Sender's meta, attached on first contact
    pub meta: Option<Meta>,
    /// Sender's visa, attached on first contact or after an update
    pub visa: Option<Document>,
}

impl ReliableMessage {
    pub fn new(secure: SecureMessage, signature: Vec<u8>) -> Self {
        Self {
            secure,
            signature,
            meta: None,
            visa: None,
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_visa(mut self, visa: Document) -> Self {
        self.visa = Some(visa);
        self
    }

    pub fn envelope(&self) -> &Envelope {
        &self.secure.envelope
    }

    pub fn sender(&self) -> &Identifier {
        &self.secure.envelope.sender
    }

    pub fn receiver(&self) -> &Identifier {
        &self.secure.envelope.receiver
    }

    pub fn sender_document_time(&self) -> Option<Timestamp> {
        self.secure.sender_document_time
    }
}

/// A message on its way to the signer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SealedMessage {
    /// Encrypted, still needs a signature
    Secure(SecureMessage),
    /// Already carries a signature
    Reliable(ReliableMessage),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::GroupCommandKind;

    #[test]
    fn test_command_classification() {
        assert!(!Content::text("hi").is_command());
        assert!(Content::Handshake(HandshakeCommand::start()).is_command());
        let group = Identifier::group("g", "gaddr");
        let sender = Identifier::user("u", "uaddr");
        let cmd = GroupCommand::new(GroupCommandKind::Quit, group, sender, None);
        assert_eq!(Content::Group(cmd).content_type(), ContentType::Group);
        assert_eq!(
            Content::Unknown { type_name: "poll".into() }.content_type(),
            ContentType::Unknown
        );
    }

    #[test]
    fn test_cycled_envelope() {
        let me = Identifier::user("me", "maddr");
        let env = Envelope::new(me.clone(), me, Timestamp::new(1));
        assert!(env.is_cycled());
    }
}
