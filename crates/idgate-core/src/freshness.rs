//! Per-key observed-time tracking
//!
//! A [`FreshnessTracker`] keeps the earliest timestamp observed for each key
//! and reports a cached observation as stale once the caller holds something
//! newer.

use core::hash::Hash;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::types::Timestamp;

/// Key → last-observed-time gate with "earliest wins" updates
#[derive(Debug)]
pub struct FreshnessTracker<K: Eq + Hash> {
    times: DashMap<K, Timestamp>,
}

impl<K: Eq + Hash> FreshnessTracker<K> {
    pub fn new() -> Self {
        Self {
            times: DashMap::with_capacity(1024),
        }
    }

    /// Record `time` for `key` if there is no record yet or `time` is
    /// strictly earlier than the recorded one
    ///
    /// Two racing writers always leave the earlier value behind.
    pub fn record_if_newer(&self, key: K, time: Timestamp) -> bool {
        match self.times.entry(key) {
            Entry::Occupied(mut entry) => {
                if time.is_before(*entry.get()) {
                    entry.insert(time);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(time);
                true
            }
        }
    }

    /// Whether the recorded observation for `key` is older than `current`
    ///
    /// Unknown keys are never stale; a missing `current` always is.
    pub fn is_stale(&self, key: &K, current: Option<Timestamp>) -> bool {
        let Some(current) = current else {
            return true;
        };
        self.times
            .get(key)
            .is_some_and(|recorded| current.is_after(*recorded))
    }

    pub fn get(&self, key: &K) -> Option<Timestamp> {
        self.times.get(key).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn clear(&self) {
        self.times.clear();
    }
}

impl<K: Eq + Hash> Default for FreshnessTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}
