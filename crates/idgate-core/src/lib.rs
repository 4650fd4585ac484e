//! Identity Gate Core
//!
//! Identity freshness and message admission for a decentralized messaging
//! client. This crate decides when cached public identity records (meta,
//! documents, group members) must be re-queried, whether a message may be
//! encrypted or verified with the key material on hand, and which private
//! keys sign and decrypt for a local user. Session handshakes are classified
//! here as well.
//!
//! Cryptography, wire encoding, persistence and transport belong to the
//! embedding application and are reached through the traits in
//! [`collaborators`].

extern crate alloc;

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod errors;
pub mod types;

pub mod config;
pub mod freshness;
pub mod handshake;
pub mod identity;
pub mod keys;
pub mod message;
pub mod throttle;

pub mod collaborators;

pub mod admission;
pub mod checker;
pub mod directory;
pub mod emitter;
pub mod keyring;
pub mod processor;
pub mod transmitter;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use admission::{MessageAdmissionGate, MessageAdmissionGateBuilder, SigningDecision};
pub use checker::{IdentityFreshnessChecker, IdentityFreshnessCheckerBuilder};
pub use collaborators::{
    EntityRequester, EntityResponder, IdentityStore, MemoryIdentityStore, QueryDispatcher,
    SuspendReason, SuspendedMessageQueue,
};
pub use config::{ConfigBuilderError, CoreConfig, CoreConfigBuilder};
pub use directory::IdentityDirectory;
pub use emitter::ThrottledEmitter;
pub use errors::{CoreError, CoreResult, Result};
pub use freshness::FreshnessTracker;
pub use handshake::{classify, plan_response, HandshakeAction, HandshakeCommand, HandshakeState};
pub use identity::{Document, DocumentType, GroupCommand, GroupCommandKind, Meta};
pub use keyring::KeyRing;
pub use keys::{KeyAlgorithm, KeyPurpose, PrivateKey, PublicKey};
pub use message::{
    Content, ContentType, Envelope, InstantMessage, ReliableMessage, SealedMessage, SecureMessage,
};
pub use processor::{ContentProcessor, ProcessOutcome};
pub use throttle::Throttle;
pub use transmitter::Transmitter;
pub use types::{EntityType, Identifier, SystemTimeSource, TimeSource, Timestamp};
