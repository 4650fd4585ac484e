//! Concurrency tests: shared components hammered from several threads,
//! including the directory write-through behind the admission gate.

use idgate_core::{
    CoreConfig, Document, EntityRequester, Envelope, FreshnessTracker, GroupCommand, IdentityDirectory,
    IdentityFreshnessChecker, IdentityStore, Identifier, KeyAlgorithm, KeyRing,
    MemoryIdentityStore, Meta, PrivateKey, PublicKey, ReliableMessage, SecureMessage,
    ThrottledEmitter, Throttle, TimeSource, Timestamp,
};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use test_utils::{
    rsa_meta, signed_visa, user, MockTimeSource, RecordingDispatcher, RecordingRequester,
    TestEnvironment,
};

const THREADS: usize = 8;

#[test]
fn test_throttle_single_winner_under_contention() {
    let throttle: Arc<Throttle<&'static str>> = Arc::new(Throttle::new(Duration::from_secs(600)));
    let now = Timestamp::from_secs(1_000);

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let throttle = Arc::clone(&throttle);
            thread::spawn(move || (0..100).filter(|_| throttle.allow("moky", now, false)).count())
        })
        .collect();

    let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(allowed, 1);
}

#[test]
fn test_tracker_never_regresses_under_contention() {
    let tracker: Arc<FreshnessTracker<&'static str>> = Arc::new(FreshnessTracker::new());

    let handles: Vec<_> = (0..THREADS as u64)
        .map(|worker| {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                for step in 0..200u64 {
                    tracker.record_if_newer("group", Timestamp::new(10_000 - worker * 200 - step));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let earliest = 10_000 - (THREADS as u64 - 1) * 200 - 199;
    assert_eq!(tracker.get(&"group"), Some(Timestamp::new(earliest)));
}

#[test]
fn test_keyring_rotation_from_many_threads() {
    let ring = Arc::new(KeyRing::new(3));
    let owner = Identifier::user("moky", "addr");

    let handles: Vec<_> = (0..THREADS as u8)
        .map(|worker| {
            let ring = Arc::clone(&ring);
            let owner = owner.clone();
            thread::spawn(move || {
                for round in 0..50u8 {
                    let key = PrivateKey::new(KeyAlgorithm::X25519, vec![worker, round]);
                    ring.set_communication_key(&owner, key);
                    assert!(ring.decryption_keys(&owner).len() <= 3);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let keys = ring.communication_keys(&owner);
    assert_eq!(keys.len(), 3);
    assert_eq!(ring.decryption_keys(&owner), keys);
}

#[test]
fn test_emitter_dispatches_once_across_threads() {
    let time = MockTimeSource::new_at(5_000);
    let clock: Arc<dyn TimeSource> = Arc::new(time);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let emitter = Arc::new(ThrottledEmitter::new(
        dispatcher.clone(),
        Arc::new(MemoryIdentityStore::new()),
        clock,
        &CoreConfig::default(),
    ));
    let bob = Identifier::user("bob", "baddr");

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let emitter = Arc::clone(&emitter);
            let bob = bob.clone();
            thread::spawn(move || {
                emitter.query_meta(&bob);
                emitter.query_documents(&bob, &[]);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(dispatcher.count(), 2);
}

// ----------------------------------------------------------------------------
// Write-through
// ----------------------------------------------------------------------------

/// Memory store whose loads stall, widening the gap between a directory's
/// check and its write
#[derive(Debug, Default)]
struct SlowStore {
    inner: MemoryIdentityStore,
}

const STALL: Duration = Duration::from_millis(30);

impl IdentityStore for SlowStore {
    fn load_meta(&self, id: &Identifier) -> Option<Meta> {
        thread::sleep(STALL);
        self.inner.load_meta(id)
    }

    fn save_meta(&self, meta: &Meta, id: &Identifier) -> bool {
        self.inner.save_meta(meta, id)
    }

    fn load_documents(&self, id: &Identifier) -> Vec<Document> {
        thread::sleep(STALL);
        self.inner.load_documents(id)
    }

    fn save_document(&self, doc: &Document, id: &Identifier) -> bool {
        self.inner.save_document(doc, id)
    }

    fn group_histories(&self, group: &Identifier) -> Vec<GroupCommand> {
        self.inner.group_histories(group)
    }

    fn save_group_history(&self, command: &GroupCommand, group: &Identifier) -> bool {
        self.inner.save_group_history(command, group)
    }

    fn members(&self, group: &Identifier) -> Vec<Identifier> {
        self.inner.members(group)
    }

    fn save_members(&self, members: &[Identifier], group: &Identifier) -> bool {
        self.inner.save_members(members, group)
    }

    fn local_users(&self) -> Vec<Identifier> {
        self.inner.local_users()
    }

    fn contacts(&self, user: &Identifier) -> Vec<Identifier> {
        self.inner.contacts(user)
    }
}

fn slow_directory(now: u64) -> (Arc<SlowStore>, Arc<IdentityDirectory>) {
    let store = Arc::new(SlowStore::default());
    let checker = Arc::new(IdentityFreshnessChecker::new(
        Arc::new(RecordingRequester::default()),
        store.clone(),
    ));
    let clock: Arc<dyn TimeSource> = Arc::new(MockTimeSource::new_at(now));
    let directory = Arc::new(IdentityDirectory::new(
        store.clone(),
        checker,
        clock,
        &CoreConfig::default(),
    ));
    (store, directory)
}

#[test]
fn test_meta_first_writer_wins_under_contention() {
    let (store, directory) = slow_directory(1_000_000_000);
    let moky = Identifier::user("moky", "addr");
    let metas: Vec<Meta> = (0..THREADS as u8)
        .map(|tag| {
            let key = PublicKey::new(KeyAlgorithm::Rsa, vec![tag; 64]);
            Meta::with_seed(key, "moky", vec![9; 64])
        })
        .collect();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = metas
        .iter()
        .cloned()
        .map(|meta| {
            let directory = Arc::clone(&directory);
            let barrier = Arc::clone(&barrier);
            let moky = moky.clone();
            thread::spawn(move || {
                barrier.wait();
                directory.save_meta(&meta, &moky)
            })
        })
        .collect();
    let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|accepted| **accepted).count(), 1);
    let winner = results.iter().position(|accepted| *accepted).unwrap();
    assert_eq!(store.inner.load_meta(&moky), Some(metas[winner].clone()));
}

#[test]
fn test_older_visa_never_overwrites_newer_under_contention() {
    let (store, directory) = slow_directory(1_000_000_000);
    let moky = Identifier::user("moky", "addr");
    let newer = signed_visa(&moky, Timestamp::new(999_000_000));
    let older = signed_visa(&moky, Timestamp::new(900_000_000));
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [newer.clone(), older]
        .into_iter()
        .map(|visa| {
            let directory = Arc::clone(&directory);
            let barrier = Arc::clone(&barrier);
            let moky = moky.clone();
            thread::spawn(move || {
                barrier.wait();
                directory.save_document(&visa, &moky)
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.inner.load_documents(&moky), vec![newer.clone()]);
    assert_eq!(directory.visa(&moky), Some(newer));
}

#[test]
fn test_concurrent_admission_of_same_message_is_idempotent() {
    let env = Arc::new(TestEnvironment::new());
    let alice = user("alice");
    let visa = signed_visa(&alice, env.now());
    let envelope = Envelope::new(alice.clone(), user("bob"), env.now());
    let msg = ReliableMessage::new(
        SecureMessage::new(envelope, vec![0xAB; 16]),
        vec![0xCD; 64],
    )
    .with_meta(rsa_meta(&alice))
    .with_visa(visa.clone());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let env = Arc::clone(&env);
            let barrier = Arc::clone(&barrier);
            let msg = msg.clone();
            thread::spawn(move || {
                barrier.wait();
                env.gate.admit_inbound(&msg)
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert!(env.queue.inbound().is_empty());
    assert_eq!(env.store.load_meta(&alice), Some(rsa_meta(&alice)));
    assert_eq!(env.store.load_documents(&alice), vec![visa]);
}
