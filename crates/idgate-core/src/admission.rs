//! Message admission gate
//!
//! Decides whether a message can proceed to encryption or verification given
//! the key material on hand. Messages that cannot proceed yet are parked in
//! the [`SuspendedMessageQueue`] until the missing visa arrives.

use alloc::sync::Arc;

use crate::collaborators::{SuspendReason, SuspendedMessageQueue};
use crate::directory::IdentityDirectory;
use crate::errors::{CoreError, Result};
use crate::identity::last_visa;
use crate::keys::{KeyPurpose, PublicKey};
use crate::message::{InstantMessage, ReliableMessage, SealedMessage, SecureMessage};
use crate::types::Identifier;

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        use tracing::{debug, warn};
    } else {
        use log::{debug, warn};
    }
}

/// Suspend reason for outbound messages without a receiver key
pub const ENCRYPT_KEY_NOT_FOUND: &str = "encrypt key not found";

/// Suspend reason for inbound messages without a sender key
pub const VERIFY_KEY_NOT_FOUND: &str = "verify key not found";

/// Outcome of handing a sealed message to the signer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningDecision {
    /// Already carries a signature, pass through untouched
    AlreadySigned(ReliableMessage),
    /// Encrypted only, must be signed before sending
    NeedsSignature(SecureMessage),
}

// ----------------------------------------------------------------------------
// Message Admission Gate
// ----------------------------------------------------------------------------

pub struct MessageAdmissionGate {
    directory: Arc<IdentityDirectory>,
    queue: Arc<dyn SuspendedMessageQueue>,
}

impl MessageAdmissionGate {
    pub fn new(directory: Arc<IdentityDirectory>, queue: Arc<dyn SuspendedMessageQueue>) -> Self {
        Self { directory, queue }
    }

    pub fn builder() -> MessageAdmissionGateBuilder {
        MessageAdmissionGateBuilder::default()
    }

    pub fn directory(&self) -> &Arc<IdentityDirectory> {
        &self.directory
    }

    /// Public key usable for `purpose` when talking to `id`
    ///
    /// The latest visa's key wins; the meta key is the fallback, and only
    /// when its algorithm supports the purpose.
    pub fn resolve_key(&self, id: &Identifier, purpose: KeyPurpose) -> Option<PublicKey> {
        let documents = self.directory.documents(id);
        let visa_key = last_visa(&documents)
            .filter(|visa| visa.is_valid())
            .and_then(|visa| visa.public_key())
            .filter(|key| key.is_usable_for(purpose));
        if let Some(key) = visa_key {
            return Some(key.clone());
        }
        self.directory
            .meta(id)
            .map(|meta| meta.public_key().clone())
            .filter(|key| key.is_usable_for(purpose))
    }

    /// Check the receiver before encrypting
    pub fn admit_outbound(&self, msg: &InstantMessage) -> bool {
        let receiver = msg.receiver();
        if receiver.is_broadcast() {
            return true;
        }
        if receiver.is_group() {
            // group messages are split per member before encryption
            debug!("Refusing to encrypt for group {}", receiver);
            return false;
        }
        if self.resolve_key(receiver, KeyPurpose::Encryption).is_some() {
            return true;
        }
        warn!("Suspending message to {}: {}", receiver, ENCRYPT_KEY_NOT_FOUND);
        let reason = SuspendReason::new(ENCRYPT_KEY_NOT_FOUND, receiver.clone());
        self.queue.suspend_outbound(msg.clone(), reason);
        false
    }

    /// Check the sender before verifying, then persist its attachments
    pub fn admit_inbound(&self, msg: &ReliableMessage) -> bool {
        let sender = msg.sender();
        let attached = msg
            .visa
            .as_ref()
            .is_some_and(|visa| visa.identifier() == sender);
        if !attached && self.resolve_key(sender, KeyPurpose::Verification).is_none() {
            warn!("Suspending message from {}: {}", sender, VERIFY_KEY_NOT_FOUND);
            let reason = SuspendReason::new(VERIFY_KEY_NOT_FOUND, sender.clone());
            self.queue.suspend_inbound(msg.clone(), reason);
            return false;
        }
        self.save_attachments(msg, attached);
        true
    }

    /// Persist attached meta, then attached visa
    fn save_attachments(&self, msg: &ReliableMessage, admitted_on_visa: bool) {
        let sender = msg.sender();
        if let Some(meta) = &msg.meta {
            self.directory.save_meta(meta, sender);
        }
        if let Some(visa) = &msg.visa {
            if !self.directory.save_document(visa, sender) && admitted_on_visa {
                warn!("Admitted message from {} but its attached visa was not stored", sender);
            }
        }
    }

    pub fn admit_signing(&self, sealed: SealedMessage) -> SigningDecision {
        match sealed {
            SealedMessage::Reliable(msg) => SigningDecision::AlreadySigned(msg),
            SealedMessage::Secure(msg) => SigningDecision::NeedsSignature(msg),
        }
    }
}

impl core::fmt::Debug for MessageAdmissionGate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MessageAdmissionGate")
            .field("directory", &self.directory)
            .finish()
    }
}

#[derive(Default)]
pub struct MessageAdmissionGateBuilder {
    directory: Option<Arc<IdentityDirectory>>,
    queue: Option<Arc<dyn SuspendedMessageQueue>>,
}

impl MessageAdmissionGateBuilder {
    pub fn directory(mut self, directory: Arc<IdentityDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn queue(mut self, queue: Arc<dyn SuspendedMessageQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn build(self) -> Result<MessageAdmissionGate> {
        let directory = self
            .directory
            .ok_or_else(|| CoreError::missing_collaborator("MessageAdmissionGate", "directory"))?;
        let queue = self
            .queue
            .ok_or_else(|| CoreError::missing_collaborator("MessageAdmissionGate", "suspended message queue"))?;
        Ok(MessageAdmissionGate::new(directory, queue))
    }
}
