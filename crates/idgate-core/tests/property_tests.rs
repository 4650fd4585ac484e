//! Property-based tests for the throttle, freshness tracker, key ring and
//! handshake classification.

use idgate_core::{
    classify, FreshnessTracker, HandshakeState, Identifier, KeyAlgorithm, KeyRing, PrivateKey,
    Throttle, Timestamp,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::time::Duration;

fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
    (0u64..=10_000_000u64).prop_map(Timestamp::new)
}

fn arb_key() -> impl Strategy<Value = PrivateKey> {
    any::<u8>().prop_map(|tag| PrivateKey::new(KeyAlgorithm::X25519, vec![tag; 32]))
}

proptest! {
    /// Property: the tracker always holds the minimum of what it was fed
    #[test]
    fn tracker_keeps_earliest(times in prop::collection::vec(arb_timestamp(), 1..50)) {
        let tracker = FreshnessTracker::new();
        for time in &times {
            tracker.record_if_newer("k", *time);
        }
        prop_assert_eq!(tracker.get(&"k"), times.iter().min().copied());
    }

    /// Property: within one window at most one call is allowed
    #[test]
    fn throttle_allows_once_per_window(
        start in 0u64..1_000_000,
        offsets in prop::collection::vec(0u64..600_000, 1..30),
    ) {
        let throttle: Throttle<u8> = Throttle::new(Duration::from_millis(600_000));
        let mut sorted = offsets.clone();
        sorted.sort_unstable();

        let mut allowed = 0;
        for offset in sorted {
            if throttle.allow(1, Timestamp::new(start + offset), false) {
                allowed += 1;
            }
        }
        prop_assert_eq!(allowed, 1);
    }

    /// Property: forced calls are always allowed
    #[test]
    fn throttle_force_always_allowed(times in prop::collection::vec(arb_timestamp(), 1..30)) {
        let throttle: Throttle<u8> = Throttle::new(Duration::from_secs(600));
        for time in times {
            prop_assert!(throttle.allow(7, time, true));
        }
    }

    /// Property: the ring never exceeds its capacity and the last key set is
    /// always the current one
    #[test]
    fn keyring_bounded_and_newest_first(
        capacity in 1usize..6,
        keys in prop::collection::vec(arb_key(), 1..40),
    ) {
        let ring = KeyRing::new(capacity);
        let owner = Identifier::user("moky", "addr");
        for key in &keys {
            ring.set_communication_key(&owner, key.clone());
        }
        let stored = ring.communication_keys(&owner);
        prop_assert!(stored.len() <= capacity);
        prop_assert_eq!(stored.first(), keys.last());

        // no duplicates survive move-to-front
        let unique: HashSet<&PrivateKey> = stored.iter().collect();
        prop_assert_eq!(unique.len(), stored.len());
    }

    /// Property: handshake classification depends only on title and key
    /// emptiness outside the two station titles
    #[test]
    fn handshake_client_titles(title in "[a-zA-Z ]{1,20}", key in "[a-z0-9]{0,12}") {
        prop_assume!(title != "DIM!" && title != "DIM?");
        let expected = if key.is_empty() {
            HandshakeState::Start
        } else {
            HandshakeState::Restart
        };
        prop_assert_eq!(classify(&title, &key), expected);
    }
}
