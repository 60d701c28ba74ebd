use std::sync::{Arc, Barrier};
use std::thread;

use reelbot::errors::RegistryError;
use reelbot::games::{DigRules, DigSession, Direction};
use reelbot::sessions::SessionRegistry;

// Many threads racing to register the same key: exactly one wins, the rest see DuplicateKey.
#[test]
fn concurrent_add_same_key_has_one_winner() {
    let reg: Arc<SessionRegistry<String, u32>> = Arc::new(SessionRegistry::new());
    let barrier = Arc::new(Barrier::new(16));
    let workers: Vec<_> = (0..16u32)
        .map(|i| {
            let reg = reg.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                reg.add("node-42".to_string(), i)
            })
        })
        .collect();

    let results: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for r in results.iter().filter(|r| r.is_err()) {
        assert_eq!(
            r.as_ref().unwrap_err(),
            &RegistryError::DuplicateKey("node-42".to_string())
        );
    }
    assert_eq!(reg.len(), 1);
}

#[test]
fn duplicate_add_keeps_existing_session() {
    let reg: SessionRegistry<String, DigSession> = SessionRegistry::new();
    let first = reg
        .add("alice".to_string(), DigSession::new(1, DigRules::default()))
        .unwrap();
    first.with(|s| s.move_dir(Direction::North));

    let err = reg
        .add("alice".to_string(), DigSession::new(2, DigRules::default()))
        .unwrap_err();
    assert!(err.to_string().contains("alice"));

    let current = reg.try_get(&"alice".to_string()).unwrap();
    assert!(current.same_session(&first));
    assert_eq!(current.with(|s| (s.owner_id(), s.position())), (1, (2, 1)));
}

#[test]
fn remove_is_single_shot() {
    let reg: SessionRegistry<String, u32> = SessionRegistry::new();
    reg.add("k".to_string(), 7).unwrap();
    assert_eq!(reg.try_remove(&"k".to_string()).map(|h| h.with(|n| *n)), Some(7));
    assert!(reg.try_remove(&"k".to_string()).is_none());
    assert!(reg.try_get(&"k".to_string()).is_none());
    assert!(reg.is_empty());
}

#[test]
fn snapshot_is_unaffected_by_later_changes() {
    let reg: SessionRegistry<String, u32> = SessionRegistry::new();
    reg.add("a".to_string(), 1).unwrap();
    reg.add("b".to_string(), 2).unwrap();

    let snapshot = reg.get_all();
    reg.try_remove(&"a".to_string());
    reg.add("c".to_string(), 3).unwrap();

    let mut keys: Vec<_> = snapshot.iter().map(|(k, _)| k.clone()).collect();
    keys.sort();
    assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    // The removed session is still readable through the snapshot handle
    let a = snapshot.iter().find(|(k, _)| k == "a").unwrap();
    assert_eq!(*a.1.lock(), 1);
}

// Interactions on one key serialize through the handle, so no increment is lost.
#[test]
fn same_key_interactions_serialize() {
    let reg: Arc<SessionRegistry<u64, u64>> = Arc::new(SessionRegistry::new());
    reg.add(9, 0).unwrap();
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let reg = reg.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    let handle = reg.try_get(&9).unwrap();
                    handle.with(|n| *n += 1);
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
    assert_eq!(*reg.try_get(&9).unwrap().lock(), 4000);
}

#[test]
fn panic_inside_session_does_not_lock_it_out() {
    let reg: Arc<SessionRegistry<String, u32>> = Arc::new(SessionRegistry::new());
    let handle = reg.add("p".to_string(), 1).unwrap();
    let h2 = handle.clone();
    let _ = thread::spawn(move || {
        h2.with(|_| panic!("boom"));
    })
    .join();
    assert_eq!(handle.with(|n| *n), 1);
}
