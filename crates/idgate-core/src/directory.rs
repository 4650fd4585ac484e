//! Identity directory
//!
//! Read-through and write-through access to identity records. Every read
//! hands what it found to the [`IdentityFreshnessChecker`], so a missing or
//! outdated record schedules a query as a side effect. Every write is
//! validated first: metas must match their identifier and never change,
//! documents must be signed, not stamped in the far future, and not older
//! than what is already stored.
//!
//! Metas and documents are cached per identifier. The cache entry doubles as
//! the lock for that identifier's write-through, so the validation and the
//! store write happen in one critical section.

use alloc::sync::Arc;
use core::time::Duration;
use dashmap::DashMap;
use std::sync::RwLock;

use crate::checker::IdentityFreshnessChecker;
use crate::collaborators::IdentityStore;
use crate::config::CoreConfig;
use crate::identity::{last_bulletin, last_document, last_visa, Document, DocumentType, Meta};
use crate::types::{Identifier, TimeSource};

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        use tracing::{debug, warn};
    } else {
        use log::{debug, warn};
    }
}

#[derive(Debug, Default)]
struct IdentityRecord {
    meta: Option<Meta>,
    documents: Option<Vec<Document>>,
}

impl IdentityRecord {
    /// Cached meta, loading it on a miss; absence is not cached
    fn meta(&mut self, store: &dyn IdentityStore, id: &Identifier) -> Option<Meta> {
        if self.meta.is_none() {
            self.meta = store.load_meta(id);
        }
        self.meta.clone()
    }

    fn documents(&mut self, store: &dyn IdentityStore, id: &Identifier) -> Vec<Document> {
        self.documents
            .get_or_insert_with(|| store.load_documents(id))
            .clone()
    }
}

pub struct IdentityDirectory {
    store: Arc<dyn IdentityStore>,
    records: DashMap<Identifier, IdentityRecord>,
    checker: Arc<IdentityFreshnessChecker>,
    time_source: Arc<dyn TimeSource>,
    future_time_tolerance: Duration,
    current_user: RwLock<Option<Identifier>>,
}

impl IdentityDirectory {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        checker: Arc<IdentityFreshnessChecker>,
        time_source: Arc<dyn TimeSource>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            store,
            records: DashMap::new(),
            checker,
            time_source,
            future_time_tolerance: config.future_time_tolerance,
            current_user: RwLock::new(None),
        }
    }

    pub fn checker(&self) -> &Arc<IdentityFreshnessChecker> {
        &self.checker
    }

    pub fn time_source(&self) -> &Arc<dyn TimeSource> {
        &self.time_source
    }

    // ------------------------------------------------------------------------
    // Write-through
    // ------------------------------------------------------------------------

    /// Persist `meta` for `id`
    ///
    /// Meta never changes once stored. Saving the same meta again succeeds
    /// without touching the store; a different one is refused.
    pub fn save_meta(&self, meta: &Meta, id: &Identifier) -> bool {
        if !meta.matches(id) {
            warn!("Meta does not match {}", id);
            return false;
        }
        let mut record = self.records.entry(id.clone()).or_default();
        match record.meta(self.store.as_ref(), id) {
            Some(existing) if existing == *meta => true,
            Some(_) => {
                warn!("Refusing to replace meta for {}", id);
                false
            }
            None => {
                if !self.store.save_meta(meta, id) {
                    return false;
                }
                record.meta = Some(meta.clone());
                true
            }
        }
    }

    /// Persist `doc` for `id` unless it is invalid or outdated
    pub fn save_document(&self, doc: &Document, id: &Identifier) -> bool {
        if !doc.is_valid() || doc.identifier() != id {
            warn!("Invalid document for {}", id);
            return false;
        }
        let now = self.time_source.now();
        if let Some(time) = doc.time() {
            if time.is_after(now + self.future_time_tolerance) {
                warn!("Document for {} stamped too far ahead: {}", id, time);
                return false;
            }
        }

        let mut record = self.records.entry(id.clone()).or_default();
        let stored = record.documents(self.store.as_ref(), id);
        if let Some(old) = last_document(&stored, doc.doc_type()) {
            let outdated = match (doc.time(), old.time()) {
                (Some(new_time), Some(old_time)) => {
                    new_time.clamp_to(now).is_before(old_time.clamp_to(now))
                }
                _ => false,
            };
            if outdated {
                debug!("Dropping outdated document for {}", id);
                return false;
            }
        }
        if !self.store.save_document(doc, id) {
            return false;
        }
        // the store decides what a save replaces, so re-read it
        record.documents = Some(self.store.load_documents(id));
        true
    }

    // ------------------------------------------------------------------------
    // Read-through
    // ------------------------------------------------------------------------

    pub fn meta(&self, id: &Identifier) -> Option<Meta> {
        let meta = self
            .records
            .entry(id.clone())
            .or_default()
            .meta(self.store.as_ref(), id);
        self.checker.check_meta(id, meta.as_ref());
        meta
    }

    pub fn documents(&self, id: &Identifier) -> Vec<Document> {
        let documents = self
            .records
            .entry(id.clone())
            .or_default()
            .documents(self.store.as_ref(), id);
        self.checker.check_documents(id, &documents);
        documents
    }

    pub fn members(&self, group: &Identifier) -> Vec<Identifier> {
        let members = self.store.members(group);
        self.checker.check_members(group, &members);
        members
    }

    /// Latest document of `kind` (any kind when `None`)
    pub fn document(&self, id: &Identifier, kind: Option<&DocumentType>) -> Option<Document> {
        last_document(&self.documents(id), kind).cloned()
    }

    pub fn visa(&self, id: &Identifier) -> Option<Document> {
        last_visa(&self.documents(id)).cloned()
    }

    pub fn bulletin(&self, group: &Identifier) -> Option<Document> {
        last_bulletin(&self.documents(group)).cloned()
    }

    /// Display name from the latest visa or bulletin, else the identifier's
    /// own name or address
    pub fn name(&self, id: &Identifier) -> String {
        let doc = if id.is_user() {
            self.visa(id)
        } else if id.is_group() {
            self.bulletin(id)
        } else {
            self.document(id, None)
        };
        doc.as_ref()
            .and_then(|doc| doc.name())
            .filter(|name| !name.is_empty())
            .or_else(|| id.name())
            .unwrap_or_else(|| id.address())
            .to_string()
    }

    // ------------------------------------------------------------------------
    // Memory
    // ------------------------------------------------------------------------

    /// Number of identifiers with cached records
    pub fn cached_count(&self) -> usize {
        self.records.len()
    }

    /// Evict every other cached record
    ///
    /// Evicted records are reloaded from the store on the next access.
    /// Returns the number of records still cached.
    pub fn reduce_memory(&self) -> usize {
        let mut finger = 0usize;
        self.records.retain(|_, _| {
            finger += 1;
            finger % 2 == 0
        });
        let survivors = self.records.len();
        debug!("Identity cache reduced to {} records", survivors);
        survivors
    }

    // ------------------------------------------------------------------------
    // Local Accounts
    // ------------------------------------------------------------------------

    pub fn local_users(&self) -> Vec<Identifier> {
        self.store.local_users()
    }

    pub fn contacts(&self, user: &Identifier) -> Vec<Identifier> {
        self.store.contacts(user)
    }

    /// The selected local user, defaulting to the first local account
    pub fn current_user(&self) -> Option<Identifier> {
        if let Some(user) = self.read_current().clone() {
            return Some(user);
        }
        let first = self.store.local_users().into_iter().next()?;
        *self.write_current() = Some(first.clone());
        Some(first)
    }

    pub fn set_current_user(&self, user: Identifier) {
        *self.write_current() = Some(user);
    }

    fn read_current(&self) -> std::sync::RwLockReadGuard<'_, Option<Identifier>> {
        self.current_user
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_current(&self) -> std::sync::RwLockWriteGuard<'_, Option<Identifier>> {
        self.current_user
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl core::fmt::Debug for IdentityDirectory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdentityDirectory")
            .field("cached", &self.records.len())
            .field("future_time_tolerance", &self.future_time_tolerance)
            .field("current_user", &*self.read_current())
            .finish()
    }
}
