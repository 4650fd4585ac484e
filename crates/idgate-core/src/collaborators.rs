//! Contracts with the collaborators this core depends on
//!
//! The requester, responder, identity store, suspended-message queue and
//! query dispatcher are supplied by the embedding application. Every trait is
//! `Send + Sync` and takes `&self`: implementations are shared behind `Arc`
//! and are expected to queue work rather than block on the network.

use hashbrown::HashMap;
use std::sync::RwLock;

use crate::identity::{Document, GroupCommand, Meta};
use crate::message::{InstantMessage, ReliableMessage};
use crate::types::{Identifier, Timestamp};

// ----------------------------------------------------------------------------
// Requester / Responder
// ----------------------------------------------------------------------------

/// Issues identity queries to the network
///
/// Implementations apply their own throttling; each call returns false when
/// the request was suppressed as a duplicate.
pub trait EntityRequester: Send + Sync {
    /// Request meta for an identifier
    fn query_meta(&self, id: &Identifier) -> bool;

    /// Request documents, given those already known
    fn query_documents(&self, id: &Identifier, known: &[Document]) -> bool;

    /// Request group members, given those already known
    fn query_members(&self, group: &Identifier, known: &[Identifier]) -> bool;
}

/// Pushes the local user's visa to contacts
pub trait EntityResponder: Send + Sync {
    /// Send `visa` to `receiver`; at most once per window unless `updated`
    fn send_visa(&self, visa: &Document, receiver: &Identifier, updated: bool) -> bool;
}

/// Network-facing sink for the commands produced by the throttled emitter
pub trait QueryDispatcher: Send + Sync {
    fn send_meta_query(&self, id: &Identifier) -> bool;

    /// `last_time` is the newest document time already known, if any
    fn send_documents_query(&self, id: &Identifier, last_time: Option<Timestamp>) -> bool;

    /// `last_time` is the newest group history time already known, if any
    fn send_members_query(&self, group: &Identifier, last_time: Option<Timestamp>) -> bool;

    fn send_visa(&self, visa: &Document, receiver: &Identifier) -> bool;
}

// ----------------------------------------------------------------------------
// Suspended Messages
// ----------------------------------------------------------------------------

/// Why a message was parked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspendReason {
    pub message: String,
    /// The identity whose key material is missing
    pub user: Identifier,
}

impl SuspendReason {
    pub fn new<M: Into<String>>(message: M, user: Identifier) -> Self {
        Self {
            message: message.into(),
            user,
        }
    }
}

/// Holds messages until the blocking identity's key material arrives
pub trait SuspendedMessageQueue: Send + Sync {
    /// Park an inbound message waiting for the sender's visa
    fn suspend_inbound(&self, msg: ReliableMessage, reason: SuspendReason);

    /// Park an outbound message waiting for the receiver's visa
    fn suspend_outbound(&self, msg: InstantMessage, reason: SuspendReason);
}

// ----------------------------------------------------------------------------
// Identity Store
// ----------------------------------------------------------------------------

/// Source of truth for public identity records
pub trait IdentityStore: Send + Sync {
    fn load_meta(&self, id: &Identifier) -> Option<Meta>;

    fn save_meta(&self, meta: &Meta, id: &Identifier) -> bool;

    fn load_documents(&self, id: &Identifier) -> Vec<Document>;

    /// Store a document, replacing any stored document of the same type
    fn save_document(&self, doc: &Document, id: &Identifier) -> bool;

    fn group_histories(&self, group: &Identifier) -> Vec<GroupCommand>;

    fn save_group_history(&self, command: &GroupCommand, group: &Identifier) -> bool;

    fn members(&self, group: &Identifier) -> Vec<Identifier>;

    fn save_members(&self, members: &[Identifier], group: &Identifier) -> bool;

    fn local_users(&self) -> Vec<Identifier>;

    fn contacts(&self, user: &Identifier) -> Vec<Identifier>;
}

// ----------------------------------------------------------------------------
// Memory Identity Store
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct IdentityTables {
    metas: HashMap<Identifier, Meta>,
    documents: HashMap<Identifier, Vec<Document>>,
    histories: HashMap<Identifier, Vec<GroupCommand>>,
    members: HashMap<Identifier, Vec<Identifier>>,
    local_users: Vec<Identifier>,
    contacts: HashMap<Identifier, Vec<Identifier>>,
}

/// In-memory identity store for testing and as a fallback
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    tables: RwLock<IdentityTables>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a local user account
    pub fn add_local_user(&self, user: Identifier) {
        let mut tables = self.write();
        if !tables.local_users.contains(&user) {
            tables.local_users.push(user);
        }
    }

    pub fn add_contact(&self, user: &Identifier, contact: Identifier) {
        let mut tables = self.write();
        let contacts = tables.contacts.entry(user.clone()).or_default();
        if !contacts.contains(&contact) {
            contacts.push(contact);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, IdentityTables> {
        self.tables.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, IdentityTables> {
        self.tables.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load_meta(&self, id: &Identifier) -> Option<Meta> {
        self.read().metas.get(id).cloned()
    }

    fn save_meta(&self, meta: &Meta, id: &Identifier) -> bool {
        self.write().metas.insert(id.clone(), meta.clone());
        true
    }

    fn load_documents(&self, id: &Identifier) -> Vec<Document> {
        self.read().documents.get(id).cloned().unwrap_or_default()
    }

    fn save_document(&self, doc: &Document, id: &Identifier) -> bool {
        let mut tables = self.write();
        let documents = tables.documents.entry(id.clone()).or_default();
        documents.retain(|old| old.doc_type() != doc.doc_type());
        documents.push(doc.clone());
        true
    }

    fn group_histories(&self, group: &Identifier) -> Vec<GroupCommand> {
        self.read().histories.get(group).cloned().unwrap_or_default()
    }

    fn save_group_history(&self, command: &GroupCommand, group: &Identifier) -> bool {
        self.write()
            .histories
            .entry(group.clone())
            .or_default()
            .push(command.clone());
        true
    }

    fn members(&self, group: &Identifier) -> Vec<Identifier> {
        self.read().members.get(group).cloned().unwrap_or_default()
    }

    fn save_members(&self, members: &[Identifier], group: &Identifier) -> bool {
        self.write().members.insert(group.clone(), members.to_vec());
        true
    }

    fn local_users(&self) -> Vec<Identifier> {
        self.read().local_users.clone()
    }

    fn contacts(&self, user: &Identifier) -> Vec<Identifier> {
        self.read().contacts.get(user).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::DocumentType;
    use crate::keys::{KeyAlgorithm, PublicKey};

    #[test]
    fn test_save_document_replaces_same_type() {
        let store = MemoryIdentityStore::new();
        let id = Identifier::user("moky", "addr");
        let key = PublicKey::new(KeyAlgorithm::Rsa, vec![1]);

        let v1 = Document::visa(id.clone(), Timestamp::new(1), key.clone()).signed(vec![1]);
        let v2 = Document::visa(id.clone(), Timestamp::new(2), key).signed(vec![1]);
        let other = Document::new(id.clone(), Some(DocumentType::Other("profile".into())), None);

        store.save_document(&v1, &id);
        store.save_document(&other, &id);
        store.save_document(&v2, &id);

        let docs = store.load_documents(&id);
        assert_eq!(docs.len(), 2);
        assert!(docs.contains(&v2));
        assert!(!docs.contains(&v1));
    }

    #[test]
    fn test_local_users_and_contacts() {
        let store = MemoryIdentityStore::new();
        let me = Identifier::user("me", "maddr");
        let friend = Identifier::user("friend", "faddr");
        store.add_local_user(me.clone());
        store.add_local_user(me.clone());
        store.add_contact(&me, friend.clone());
        assert_eq!(store.local_users(), vec![me.clone()]);
        assert_eq!(store.contacts(&me), vec![friend]);
    }
}
