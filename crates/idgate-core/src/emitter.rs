//! Throttled query/response emitter
//!
//! [`ThrottledEmitter`] is the stock [`EntityRequester`] and
//! [`EntityResponder`]: it keeps each query and visa response to at most one
//! per window per identifier and hands the surviving ones to a
//! [`QueryDispatcher`].

use alloc::sync::Arc;

use crate::collaborators::{EntityRequester, EntityResponder, IdentityStore, QueryDispatcher};
use crate::config::CoreConfig;
use crate::identity::{Document, GroupCommand};
use crate::throttle::Throttle;
use crate::types::{Identifier, TimeSource, Timestamp};

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        use tracing::debug;
    } else {
        use log::debug;
    }
}

pub struct ThrottledEmitter {
    dispatcher: Arc<dyn QueryDispatcher>,
    store: Arc<dyn IdentityStore>,
    time_source: Arc<dyn TimeSource>,
    meta_queries: Throttle<Identifier>,
    document_queries: Throttle<Identifier>,
    member_queries: Throttle<Identifier>,
    visa_responses: Throttle<Identifier>,
}

impl ThrottledEmitter {
    pub fn new(
        dispatcher: Arc<dyn QueryDispatcher>,
        store: Arc<dyn IdentityStore>,
        time_source: Arc<dyn TimeSource>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            dispatcher,
            store,
            time_source,
            meta_queries: Throttle::new(config.query_expires),
            document_queries: Throttle::new(config.query_expires),
            member_queries: Throttle::new(config.query_expires),
            visa_responses: Throttle::new(config.respond_expires),
        }
    }

    /// Drop throttle records whose window has elapsed
    pub fn purge(&self) -> usize {
        let now = self.time_source.now();
        self.meta_queries.purge(now)
            + self.document_queries.purge(now)
            + self.member_queries.purge(now)
            + self.visa_responses.purge(now)
    }

    fn is_local_user(&self, id: &Identifier) -> bool {
        self.store.local_users().iter().any(|user| user == id)
    }
}

impl core::fmt::Debug for ThrottledEmitter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ThrottledEmitter")
            .field("meta_queries", &self.meta_queries.len())
            .field("document_queries", &self.document_queries.len())
            .field("member_queries", &self.member_queries.len())
            .field("visa_responses", &self.visa_responses.len())
            .finish()
    }
}

/// Newest time among `documents`, sent so the peer can answer incrementally
fn newest_document_time(documents: &[Document]) -> Option<Timestamp> {
    documents.iter().filter_map(Document::time).max()
}

fn newest_history_time(history: &[GroupCommand]) -> Option<Timestamp> {
    history.iter().filter_map(|cmd| cmd.time).max()
}

impl EntityRequester for ThrottledEmitter {
    fn query_meta(&self, id: &Identifier) -> bool {
        if !self.meta_queries.allow(id.clone(), self.time_source.now(), false) {
            debug!("Meta query for {} throttled", id);
            return false;
        }
        self.dispatcher.send_meta_query(id)
    }

    fn query_documents(&self, id: &Identifier, known: &[Document]) -> bool {
        if !self.document_queries.allow(id.clone(), self.time_source.now(), false) {
            debug!("Document query for {} throttled", id);
            return false;
        }
        self.dispatcher
            .send_documents_query(id, newest_document_time(known))
    }

    fn query_members(&self, group: &Identifier, _known: &[Identifier]) -> bool {
        if !self.member_queries.allow(group.clone(), self.time_source.now(), false) {
            debug!("Member query for {} throttled", group);
            return false;
        }
        let last_time = newest_history_time(&self.store.group_histories(group));
        self.dispatcher.send_members_query(group, last_time)
    }
}

impl EntityResponder for ThrottledEmitter {
    fn send_visa(&self, visa: &Document, receiver: &Identifier, updated: bool) -> bool {
        if receiver.is_broadcast() {
            return false;
        }
        if visa.identifier() == receiver || self.is_local_user(receiver) {
            debug!("Not sending visa to self {}", receiver);
            return false;
        }
        if !self
            .visa_responses
            .allow(receiver.clone(), self.time_source.now(), updated)
        {
            debug!("Visa response to {} throttled", receiver);
            return false;
        }
        self.dispatcher.send_visa(visa, receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::MemoryIdentityStore;
    use crate::keys::{KeyAlgorithm, PublicKey};
    use crate::types::SystemTimeSource;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDispatcher {
        sent: Mutex<Vec<String>>,
    }

    impl QueryDispatcher for RecordingDispatcher {
        fn send_meta_query(&self, id: &Identifier) -> bool {
            self.sent.lock().unwrap().push(format!("meta:{id}"));
            true
        }
        fn send_documents_query(&self, id: &Identifier, _last_time: Option<Timestamp>) -> bool {
            self.sent.lock().unwrap().push(format!("documents:{id}"));
            true
        }
        fn send_members_query(&self, group: &Identifier, _last_time: Option<Timestamp>) -> bool {
            self.sent.lock().unwrap().push(format!("members:{group}"));
            true
        }
        fn send_visa(&self, _visa: &Document, receiver: &Identifier) -> bool {
            self.sent.lock().unwrap().push(format!("visa:{receiver}"));
            true
        }
    }

    fn emitter() -> (ThrottledEmitter, Arc<RecordingDispatcher>, Arc<MemoryIdentityStore>) {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let store = Arc::new(MemoryIdentityStore::new());
        let emitter = ThrottledEmitter::new(
            dispatcher.clone(),
            store.clone(),
            Arc::new(SystemTimeSource::new()),
            &CoreConfig::default(),
        );
        (emitter, dispatcher, store)
    }

    #[test]
    fn test_queries_throttled_per_identifier() {
        let (emitter, dispatcher, _) = emitter();
        let a = Identifier::user("a", "aaddr");
        let b = Identifier::user("b", "baddr");
        assert!(emitter.query_meta(&a));
        assert!(!emitter.query_meta(&a));
        assert!(emitter.query_meta(&b));
        assert!(emitter.query_documents(&a, &[]));
        assert!(!emitter.query_documents(&a, &[]));
        assert_eq!(dispatcher.sent.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_updated_visa_bypasses_window() {
        let (emitter, dispatcher, store) = emitter();
        let me = Identifier::user("me", "maddr");
        let friend = Identifier::user("friend", "faddr");
        store.add_local_user(me.clone());
        let visa = Document::visa(
            me.clone(),
            Timestamp::new(1),
            PublicKey::new(KeyAlgorithm::Rsa, vec![1]),
        );

        assert!(emitter.send_visa(&visa, &friend, false));
        assert!(!emitter.send_visa(&visa, &friend, false));
        assert!(emitter.send_visa(&visa, &friend, true));

        assert!(!emitter.send_visa(&visa, &me, true));
        assert!(!emitter.send_visa(&visa, &Identifier::anyone(), true));
        assert_eq!(dispatcher.sent.lock().unwrap().len(), 2);
    }
}
