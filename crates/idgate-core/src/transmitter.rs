//! Transmission-layer checks around the admission gate
//!
//! Outbound: drop self-addressed messages, stamp the sender's visa time
//! ("SDT") on conversation content, then ask the gate. Inbound: drop
//! self-addressed messages, then ask the gate.

use alloc::sync::Arc;

use crate::admission::MessageAdmissionGate;
use crate::message::{Content, Envelope, InstantMessage, ReliableMessage};
use crate::types::Identifier;

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        use tracing::{debug, warn};
    } else {
        use log::{debug, warn};
    }
}

#[derive(Debug)]
pub struct Transmitter {
    gate: Arc<MessageAdmissionGate>,
}

impl Transmitter {
    pub fn new(gate: Arc<MessageAdmissionGate>) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &Arc<MessageAdmissionGate> {
        &self.gate
    }

    /// Wrap `content` in a message from `sender` (the current user when
    /// `None`) to `receiver` and prepare it for encryption
    pub fn compose(
        &self,
        content: Content,
        sender: Option<Identifier>,
        receiver: Identifier,
    ) -> Option<InstantMessage> {
        let directory = self.gate.directory();
        let sender = match sender {
            Some(sender) => sender,
            None => directory.current_user()?,
        };
        let envelope = Envelope::new(sender, receiver, directory.time_source().now());
        self.prepare_outbound(InstantMessage::new(envelope, content))
    }

    /// Stamp and admit an outbound message
    ///
    /// Returns the message ready for encryption, or `None` when it was
    /// dropped or suspended.
    pub fn prepare_outbound(&self, mut msg: InstantMessage) -> Option<InstantMessage> {
        if msg.envelope.is_cycled() {
            debug!("Dropping cycled message to {}", msg.receiver());
            return None;
        }
        self.attach_visa_time(&mut msg);
        if self.gate.admit_outbound(&msg) {
            Some(msg)
        } else {
            None
        }
    }

    /// Admit an inbound message for verification
    pub fn accept_inbound(&self, msg: &ReliableMessage) -> bool {
        if msg.envelope().is_cycled() {
            debug!("Dropping cycled message from {}", msg.sender());
            return false;
        }
        self.gate.admit_inbound(msg)
    }

    /// Commands are protocol traffic and carry no sender document time
    fn attach_visa_time(&self, msg: &mut InstantMessage) -> bool {
        if msg.content.is_command() {
            return false;
        }
        let Some(visa) = self.gate.directory().visa(msg.sender()) else {
            warn!("No visa for sender {}", msg.sender());
            return false;
        };
        if let Some(time) = visa.time() {
            msg.sender_document_time = Some(time);
        }
        true
    }
}
