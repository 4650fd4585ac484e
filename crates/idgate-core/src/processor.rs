//! Content processing hooks
//!
//! After an inbound message has been admitted, verified and decrypted, its
//! content is dispatched here. Identity-related content feeds the freshness
//! checker and the directory; conversation content passes through. Every
//! message is finally checked for a sender document time newer than what we
//! hold.

use alloc::sync::Arc;

use crate::directory::IdentityDirectory;
use crate::handshake::HandshakeState;
use crate::identity::{Document, GroupCommand, Meta};
use crate::message::{Content, ReliableMessage};
use crate::types::Identifier;

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        use tracing::debug;
    } else {
        use log::debug;
    }
}

/// What processing a content did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Handshake classified for the session layer
    Handshake(HandshakeState),
    /// Group activity recorded for the group
    GroupActivity { group: Identifier },
    /// Identity records persisted from a meta/documents response
    IdentitySaved { meta: bool, documents: usize },
    /// Nothing for this core to do
    Ignored,
}

#[derive(Debug)]
pub struct ContentProcessor {
    directory: Arc<IdentityDirectory>,
}

impl ContentProcessor {
    pub fn new(directory: Arc<IdentityDirectory>) -> Self {
        Self { directory }
    }

    /// Dispatch `content` carried by `msg`, then check the sender's
    /// document time
    pub fn process(&self, content: &Content, msg: &ReliableMessage) -> ProcessOutcome {
        let outcome = match content {
            Content::Handshake(command) => ProcessOutcome::Handshake(command.state()),
            Content::Group(command) => self.record_group_activity(command),
            Content::Meta { identifier, meta } => self.save_identity(identifier, Some(meta), &[]),
            Content::Documents {
                identifier,
                meta,
                documents,
            } => self.save_identity(identifier, meta.as_ref(), documents),
            Content::Text { .. } | Content::Receipt { .. } => ProcessOutcome::Ignored,
            Content::Unknown { type_name } => {
                debug!("Ignoring unsupported content type {}", type_name);
                ProcessOutcome::Ignored
            }
        };
        self.check_visa_time(msg);
        outcome
    }

    fn record_group_activity(&self, command: &GroupCommand) -> ProcessOutcome {
        let checker = self.directory.checker();
        checker.set_last_active_member(&command.group, &command.sender);
        if let Some(time) = command.time {
            checker.set_last_group_history_time(&command.group, time);
        }
        ProcessOutcome::GroupActivity {
            group: command.group.clone(),
        }
    }

    fn save_identity(
        &self,
        identifier: &Identifier,
        meta: Option<&Meta>,
        documents: &[Document],
    ) -> ProcessOutcome {
        let meta = meta.is_some_and(|meta| self.directory.save_meta(meta, identifier));
        let documents = documents
            .iter()
            .filter(|doc| self.directory.save_document(doc, identifier))
            .count();
        ProcessOutcome::IdentitySaved { meta, documents }
    }

    /// Record the sender document time carried by `msg`
    ///
    /// Returns true when it was recorded, in which case the sender's
    /// documents are re-read so the checker can query fresh ones.
    pub fn check_visa_time(&self, msg: &ReliableMessage) -> bool {
        let Some(time) = msg.sender_document_time() else {
            return false;
        };
        let time = time.clamp_to(self.directory.time_source().now());
        let sender = msg.sender();
        let updated = self
            .directory
            .checker()
            .set_last_document_time(sender, time);
        if updated {
            self.directory.documents(sender);
        }
        updated
    }
}
