//! Per-key time-window throttling
//!
//! A [`Throttle`] remembers, for each key, the earliest time at which the
//! guarded action may fire again. It is used to keep meta/document/member
//! queries and visa responses to at most one per window per identifier.

use core::hash::Hash;
use core::time::Duration;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::types::Timestamp;

/// Default window for query and response throttles (10 minutes)
pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_secs(600);

// ----------------------------------------------------------------------------
// Throttle
// ----------------------------------------------------------------------------

/// Key → next-allowed-time gate
///
/// The check and the update happen under the map's per-key entry lock, so
/// concurrent callers racing on the same key see exactly one `true` per
/// window.
#[derive(Debug)]
pub struct Throttle<K: Eq + Hash> {
    window: Duration,
    records: DashMap<K, Timestamp>,
}

impl<K: Eq + Hash> Throttle<K> {
    /// Create a throttle with the given window
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            records: DashMap::with_capacity(1024),
        }
    }

    /// Get the configured window
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether the action for `key` may fire at `now`
    ///
    /// Returns true (and starts a new window at `now`) when `force` is set,
    /// when the key has never been seen, or when `now` has reached the
    /// recorded next-allowed time. Otherwise returns false and leaves the
    /// record untouched.
    pub fn allow(&self, key: K, now: Timestamp, force: bool) -> bool {
        let next = now + self.window;
        match self.records.entry(key) {
            Entry::Occupied(mut entry) => {
                if !force && now.is_before(*entry.get()) {
                    return false;
                }
                entry.insert(next);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(next);
                true
            }
        }
    }

    /// Next time the action for `key` may fire, if recorded
    pub fn next_allowed(&self, key: &K) -> Option<Timestamp> {
        self.records.get(key).map(|entry| *entry.value())
    }

    /// Drop records whose window has already elapsed at `now`
    ///
    /// Returns the number of records left.
    pub fn purge(&self, now: Timestamp) -> usize {
        self.records.retain(|_, next| now.is_before(*next));
        self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&self) {
        self.records.clear();
    }
}

impl<K: Eq + Hash> Default for Throttle<K> {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_WINDOW)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(600);

    #[test]
    fn test_first_call_allowed() {
        let throttle: Throttle<&str> = Throttle::new(WINDOW);
        assert!(throttle.allow("moky", Timestamp::from_secs(100), false));
        assert_eq!(throttle.next_allowed(&"moky"), Some(Timestamp::from_secs(700)));
    }

    #[test]
    fn test_denied_within_window() {
        let throttle: Throttle<&str> = Throttle::new(WINDOW);
        assert!(throttle.allow("moky", Timestamp::from_secs(100), false));
        assert!(!throttle.allow("moky", Timestamp::from_secs(101), false));
        assert!(!throttle.allow("moky", Timestamp::new(699_999), false));
        // a denied call must not extend the window
        assert_eq!(throttle.next_allowed(&"moky"), Some(Timestamp::from_secs(700)));
    }

    #[test]
    fn test_allowed_at_window_boundary() {
        let throttle: Throttle<&str> = Throttle::new(WINDOW);
        assert!(throttle.allow("moky", Timestamp::from_secs(100), false));
        assert!(throttle.allow("moky", Timestamp::from_secs(700), false));
        assert_eq!(throttle.next_allowed(&"moky"), Some(Timestamp::from_secs(1300)));
    }

    #[test]
    fn test_force_resets_window() {
        let throttle: Throttle<&str> = Throttle::new(WINDOW);
        assert!(throttle.allow("moky", Timestamp::from_secs(100), false));
        assert!(throttle.allow("moky", Timestamp::from_secs(200), true));
        assert!(!throttle.allow("moky", Timestamp::from_secs(700), false));
        assert!(throttle.allow("moky", Timestamp::from_secs(800), false));
    }

    #[test]
    fn test_keys_are_independent() {
        let throttle: Throttle<&str> = Throttle::new(WINDOW);
        assert!(throttle.allow("a", Timestamp::from_secs(1), false));
        assert!(throttle.allow("b", Timestamp::from_secs(1), false));
        assert_eq!(throttle.len(), 2);
    }

    #[test]
    fn test_purge_drops_elapsed_records() {
        let throttle: Throttle<&str> = Throttle::new(WINDOW);
        throttle.allow("old", Timestamp::from_secs(0), false);
        throttle.allow("new", Timestamp::from_secs(500), false);
        assert_eq!(throttle.purge(Timestamp::from_secs(800)), 1);
        assert!(throttle.next_allowed(&"old").is_none());
        throttle.clear();
        assert!(throttle.is_empty());
    }
}
