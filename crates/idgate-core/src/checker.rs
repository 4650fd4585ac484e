//! Identity Freshness Checker
//!
//! Decides whether the locally cached meta, documents or member list of an
//! identity should be re-queried, and hands the query to an
//! [`EntityRequester`]. Throttling is the requester's job; the checker only
//! answers "is this missing or stale".

use alloc::sync::Arc;
use dashmap::DashMap;

use crate::collaborators::{EntityRequester, IdentityStore};
use crate::errors::{CoreError, Result};
use crate::freshness::FreshnessTracker;
use crate::identity::{earliest_history_time, Document, Meta};
use crate::types::{Identifier, Timestamp};

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        use tracing::debug;
    } else {
        use log::debug;
    }
}

// ----------------------------------------------------------------------------
// Identity Freshness Checker
// ----------------------------------------------------------------------------

pub struct IdentityFreshnessChecker {
    requester: Arc<dyn EntityRequester>,
    store: Arc<dyn IdentityStore>,
    /// Sender document times ("SDT") reported by peers
    document_times: FreshnessTracker<Identifier>,
    /// Group history times ("GHT") reported by peers
    history_times: FreshnessTracker<Identifier>,
    last_active_members: DashMap<Identifier, Identifier>,
}

impl core::fmt::Debug for IdentityFreshnessChecker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdentityFreshnessChecker")
            .field("document_times", &self.document_times.len())
            .field("history_times", &self.history_times.len())
            .field("last_active_members", &self.last_active_members.len())
            .finish()
    }
}

impl IdentityFreshnessChecker {
    pub fn new(requester: Arc<dyn EntityRequester>, store: Arc<dyn IdentityStore>) -> Self {
        Self {
            requester,
            store,
            document_times: FreshnessTracker::new(),
            history_times: FreshnessTracker::new(),
            last_active_members: DashMap::with_capacity(128),
        }
    }

    pub fn builder() -> IdentityFreshnessCheckerBuilder {
        IdentityFreshnessCheckerBuilder::new()
    }

    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    // ------------------------------------------------------------------------
    // Reported Times
    // ------------------------------------------------------------------------

    /// Record the document time a peer claims for `id`
    pub fn set_last_document_time(&self, id: &Identifier, time: Timestamp) -> bool {
        self.document_times.record_if_newer(id.clone(), time)
    }

    /// Record the group history time a peer claims for `group`
    pub fn set_last_group_history_time(&self, group: &Identifier, time: Timestamp) -> bool {
        self.history_times.record_if_newer(group.clone(), time)
    }

    pub fn set_last_active_member(&self, group: &Identifier, member: &Identifier) {
        self.last_active_members.insert(group.clone(), member.clone());
    }

    pub fn last_active_member(&self, group: &Identifier) -> Option<Identifier> {
        self.last_active_members
            .get(group)
            .map(|entry| entry.value().clone())
    }

    /// Earliest time among `documents`, ignoring those without a time
    pub fn last_document_time(&self, documents: &[Document]) -> Option<Timestamp> {
        documents.iter().filter_map(Document::time).min()
    }

    /// Earliest time in the stored history of `group`
    pub fn last_group_history_time(&self, group: &Identifier) -> Option<Timestamp> {
        earliest_history_time(&self.store.group_histories(group))
    }

    // ------------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------------

    /// Query meta once if it is missing; a present meta never changes
    pub fn check_meta(&self, id: &Identifier, meta: Option<&Meta>) -> bool {
        if !self.needs_meta(id, meta) {
            return false;
        }
        self.requester.query_meta(id)
    }

    pub fn check_documents(&self, id: &Identifier, documents: &[Document]) -> bool {
        if !self.needs_documents(id, documents) {
            return false;
        }
        debug!("Querying documents for {}", id);
        self.requester.query_documents(id, documents)
    }

    pub fn check_members(&self, group: &Identifier, members: &[Identifier]) -> bool {
        if !self.needs_members(group, members) {
            return false;
        }
        debug!("Querying members for {}", group);
        self.requester.query_members(group, members)
    }

    fn needs_meta(&self, id: &Identifier, meta: Option<&Meta>) -> bool {
        !id.is_broadcast() && meta.is_none()
    }

    fn needs_documents(&self, id: &Identifier, documents: &[Document]) -> bool {
        if id.is_broadcast() {
            return false;
        }
        if documents.is_empty() {
            return true;
        }
        let current = self.last_document_time(documents);
        self.document_times.is_stale(id, current)
    }

    fn needs_members(&self, group: &Identifier, members: &[Identifier]) -> bool {
        if group.is_broadcast() {
            return false;
        }
        if members.is_empty() {
            return true;
        }
        let current = self.last_group_history_time(group);
        self.history_times.is_stale(group, current)
    }
}

// ----------------------------------------------------------------------------
// Checker Builder
// ----------------------------------------------------------------------------

/// Builder that refuses to produce a checker without its collaborators
#[derive(Default)]
pub struct IdentityFreshnessCheckerBuilder {
    requester: Option<Arc<dyn EntityRequester>>,
    store: Option<Arc<dyn IdentityStore>>,
}

impl IdentityFreshnessCheckerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requester(mut self, requester: Arc<dyn EntityRequester>) -> Self {
        self.requester = Some(requester);
        self
    }

    pub fn store(mut self, store: Arc<dyn IdentityStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<IdentityFreshnessChecker> {
        let requester = self
            .requester
            .ok_or_else(|| CoreError::missing_collaborator("IdentityFreshnessChecker", "requester"))?;
        let store = self
            .store
            .ok_or_else(|| CoreError::missing_collaborator("IdentityFreshnessChecker", "store"))?;
        Ok(IdentityFreshnessChecker::new(requester, store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::MemoryIdentityStore;
    use crate::identity::{GroupCommand, GroupCommandKind};
    use crate::keys::{KeyAlgorithm, PublicKey};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingRequester {
        calls: Mutex<Vec<&'static str>>,
    }

    impl EntityRequester for CountingRequester {
        fn query_meta(&self, _id: &Identifier) -> bool {
            self.calls.lock().unwrap().push("meta");
            true
        }
        fn query_documents(&self, _id: &Identifier, _known: &[Document]) -> bool {
            self.calls.lock().unwrap().push("documents");
            true
        }
        fn query_members(&self, _group: &Identifier, _known: &[Identifier]) -> bool {
            self.calls.lock().unwrap().push("members");
            true
        }
    }

    fn checker() -> (IdentityFreshnessChecker, Arc<CountingRequester>, Arc<MemoryIdentityStore>) {
        let requester = Arc::new(CountingRequester::default());
        let store = Arc::new(MemoryIdentityStore::new());
        let checker = IdentityFreshnessChecker::new(requester.clone(), store.clone());
        (checker, requester, store)
    }

    fn visa_at(id: &Identifier, millis: u64) -> Document {
        Document::visa(
            id.clone(),
            Timestamp::new(millis),
            PublicKey::new(KeyAlgorithm::Rsa, vec![7]),
        )
    }

    #[test]
    fn test_broadcast_never_queried() {
        let (checker, requester, _) = checker();
        let everyone = Identifier::everyone();
        assert!(!checker.check_meta(&Identifier::anyone(), None));
        assert!(!checker.check_documents(&everyone, &[]));
        assert!(!checker.check_members(&everyone, &[]));
        assert!(requester.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_present_meta_not_queried() {
        let (checker, requester, _) = checker();
        let id = Identifier::user("moky", "addr");
        let meta = Meta::new(PublicKey::new(KeyAlgorithm::Ed25519, vec![1]));
        assert!(!checker.check_meta(&id, Some(&meta)));
        assert!(checker.check_meta(&id, None));
        assert_eq!(*requester.calls.lock().unwrap(), vec!["meta"]);
    }

    #[test]
    fn test_documents_stale_after_newer_report() {
        let (checker, _, _) = checker();
        let id = Identifier::user("moky", "addr");
        let docs = vec![visa_at(&id, 100)];

        // nothing reported yet
        assert!(!checker.check_documents(&id, &docs));

        checker.set_last_document_time(&id, Timestamp::new(50));
        assert!(checker.check_documents(&id, &docs));
    }

    #[test]
    fn test_documents_without_time_are_stale() {
        let (checker, _, _) = checker();
        let id = Identifier::user("moky", "addr");
        let untimed = Document::new(id.clone(), None, None);
        assert!(checker.check_documents(&id, &[untimed]));
    }

    #[test]
    fn test_last_document_time_is_earliest() {
        let (checker, _, _) = checker();
        let id = Identifier::user("moky", "addr");
        let docs = vec![visa_at(&id, 30), Document::new(id.clone(), None, None), visa_at(&id, 10)];
        assert_eq!(checker.last_document_time(&docs), Some(Timestamp::new(10)));
        assert_eq!(checker.last_document_time(&[]), None);
    }

    #[test]
    fn test_members_use_stored_history() {
        let (checker, requester, store) = checker();
        let group = Identifier::group("g", "gaddr");
        let member = Identifier::user("m", "maddr");
        let cmd = GroupCommand::new(
            GroupCommandKind::Invite,
            group.clone(),
            member.clone(),
            Some(Timestamp::new(200)),
        );
        store.save_group_history(&cmd, &group);

        checker.set_last_group_history_time(&group, Timestamp::new(100));
        assert!(checker.check_members(&group, &[member.clone()]));
        assert!(checker.check_members(&group, &[]));
        assert_eq!(requester.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_last_active_member() {
        let (checker, _, _) = checker();
        let group = Identifier::group("g", "gaddr");
        let member = Identifier::user("m", "maddr");
        assert!(checker.last_active_member(&group).is_none());
        checker.set_last_active_member(&group, &member);
        assert_eq!(checker.last_active_member(&group), Some(member));
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let err = IdentityFreshnessChecker::builder()
            .store(Arc::new(MemoryIdentityStore::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));

        let ok = IdentityFreshnessChecker::builder()
            .requester(Arc::new(CountingRequester::default()))
            .store(Arc::new(MemoryIdentityStore::new()))
            .build();
        assert!(ok.is_ok());
    }
}
