//! Behaviour every `SignalStore` backend must share.
//!
//! Each backend's test module calls these against a fresh instance.

use std::sync::Barrier;
use std::time::Duration;

use chrono::{DateTime, Utc};

use globalshutdown_core::Identity;

use super::{Admission, InsertOutcome, SignalStore};
use crate::origin::{OriginHash, OriginHasher};

/// Whole-second base time so durable backends round-trip it exactly.
fn base_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn origin(addr: &str) -> OriginHash {
    OriginHasher::from_salt("conformance").hash(addr)
}

fn per_origin(limit: usize) -> Admission {
    Admission {
        max_per_origin: Some(limit),
        max_entries: None,
    }
}

pub fn insert_is_idempotent(store: &dyn SignalStore) {
    let id = Identity::generate();
    assert!(store.insert(id, origin("10.0.0.1"), base_time()).unwrap());
    assert!(!store.insert(id, origin("10.0.0.1"), base_time()).unwrap());
    assert_eq!(store.len().unwrap(), 1);
}

pub fn rearm_keeps_original_metadata(store: &dyn SignalStore) {
    let id = Identity::generate();
    let first = base_time();
    store.insert(id, origin("10.0.0.1"), first).unwrap();

    let later = first + chrono::Duration::minutes(30);
    assert!(!store.insert(id, origin("10.0.0.2"), later).unwrap());
    assert_eq!(
        store
            .insert_within_limit(id, origin("10.0.0.3"), later, per_origin(5))
            .unwrap(),
        InsertOutcome::AlreadyArmed
    );

    let entry = store.get(&id).unwrap().unwrap();
    assert_eq!(entry.identity, id);
    assert_eq!(entry.origin, origin("10.0.0.1"));
    assert_eq!(entry.armed_at, first);
    assert_eq!(store.count_by_origin(&origin("10.0.0.2")).unwrap(), 0);
}

pub fn take_is_exactly_once(store: &dyn SignalStore) {
    let id = Identity::generate();
    assert!(!store.take_if_present(&id).unwrap());

    store.insert(id, origin("10.0.0.1"), base_time()).unwrap();
    assert!(store.take_if_present(&id).unwrap());
    assert!(!store.take_if_present(&id).unwrap());
    assert!(store.get(&id).unwrap().is_none());
    assert!(store.is_empty().unwrap());
}

pub fn concurrent_takes_deliver_once(store: &dyn SignalStore) {
    const POLLERS: usize = 16;

    for _ in 0..20 {
        let id = Identity::generate();
        store.insert(id, origin("10.0.0.1"), base_time()).unwrap();

        let barrier = &Barrier::new(POLLERS);
        let hits = std::thread::scope(|s| {
            let handles: Vec<_> = (0..POLLERS)
                .map(|_| {
                    s.spawn(move || {
                        barrier.wait();
                        store.take_if_present(&id).unwrap()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|hit| *hit)
                .count()
        });
        assert_eq!(hits, 1);
    }
}

pub fn limit_rejects_without_insert(store: &dyn SignalStore) {
    let now = base_time();
    let noisy = origin("10.0.0.1");
    for _ in 0..5 {
        assert_eq!(
            store
                .insert_within_limit(Identity::generate(), noisy, now, per_origin(5))
                .unwrap(),
            InsertOutcome::Created { evicted: 0 }
        );
    }

    let sixth = Identity::generate();
    assert_eq!(
        store.insert_within_limit(sixth, noisy, now, per_origin(5)).unwrap(),
        InsertOutcome::RateLimited
    );
    assert!(store.get(&sixth).unwrap().is_none());
    assert_eq!(store.count_by_origin(&noisy).unwrap(), 5);

    // Other origins are unaffected, and no limit means no check
    assert_eq!(
        store
            .insert_within_limit(Identity::generate(), origin("10.0.0.2"), now, per_origin(5))
            .unwrap(),
        InsertOutcome::Created { evicted: 0 }
    );
    assert_eq!(
        store
            .insert_within_limit(Identity::generate(), noisy, now, Admission::default())
            .unwrap(),
        InsertOutcome::Created { evicted: 0 }
    );
    assert_eq!(store.len().unwrap(), 7);
}

pub fn sweep_removes_only_expired(store: &dyn SignalStore) {
    let now = base_time();
    let stale = Identity::generate();
    let fresh = Identity::generate();
    let edge = Identity::generate();
    store
        .insert(stale, origin("10.0.0.1"), now - chrono::Duration::hours(2))
        .unwrap();
    store.insert(fresh, origin("10.0.0.1"), now).unwrap();
    store
        .insert(edge, origin("10.0.0.1"), now - chrono::Duration::hours(1))
        .unwrap();

    assert_eq!(store.sweep(now, Duration::from_secs(3600)).unwrap(), 1);
    assert!(!store.take_if_present(&stale).unwrap());
    assert!(store.take_if_present(&fresh).unwrap());
    assert!(store.take_if_present(&edge).unwrap());
}

pub fn evict_removes_oldest(store: &dyn SignalStore) {
    let now = base_time();
    let ids: Vec<Identity> = (0..1001).map(|_| Identity::generate()).collect();
    for (i, id) in ids.iter().enumerate() {
        let armed_at = now + chrono::Duration::seconds(i as i64);
        assert!(store
            .insert(*id, origin(&format!("10.0.{}.{}", i / 256, i % 256)), armed_at)
            .unwrap());
    }

    assert_eq!(store.evict_over_capacity(1000).unwrap(), 1);
    assert_eq!(store.evict_over_capacity(1000).unwrap(), 0);
    assert!(!store.take_if_present(&ids[0]).unwrap());
    for id in &ids[1..] {
        assert!(store.take_if_present(id).unwrap());
    }
}

pub fn evict_breaks_ties_by_insertion_order(store: &dyn SignalStore) {
    let now = base_time();
    let ids: Vec<Identity> = (0..3).map(|_| Identity::generate()).collect();
    for id in &ids {
        store.insert(*id, origin("10.0.0.1"), now).unwrap();
    }

    assert_eq!(store.evict_over_capacity(1).unwrap(), 2);
    assert!(store.get(&ids[0]).unwrap().is_none());
    assert!(store.get(&ids[1]).unwrap().is_none());
    assert!(store.get(&ids[2]).unwrap().is_some());
}

pub fn insert_evicts_within_capacity(store: &dyn SignalStore) {
    let now = base_time();
    let bounded = Admission {
        max_per_origin: None,
        max_entries: Some(3),
    };
    let ids: Vec<Identity> = (0..3).map(|_| Identity::generate()).collect();
    for (i, id) in ids.iter().enumerate() {
        let armed_at = now + chrono::Duration::seconds(i as i64);
        assert_eq!(
            store
                .insert_within_limit(*id, origin("10.0.0.1"), armed_at, bounded)
                .unwrap(),
            InsertOutcome::Created { evicted: 0 }
        );
    }

    let newest = Identity::generate();
    let later = now + chrono::Duration::minutes(1);
    assert_eq!(
        store
            .insert_within_limit(newest, origin("10.0.0.2"), later, bounded)
            .unwrap(),
        InsertOutcome::Created { evicted: 1 }
    );
    assert_eq!(store.len().unwrap(), 3);
    assert!(store.get(&ids[0]).unwrap().is_none());
    assert!(store.get(&newest).unwrap().is_some());

    // Re-arming at the bound creates nothing, so nothing is evicted
    assert_eq!(
        store
            .insert_within_limit(newest, origin("10.0.0.2"), later, bounded)
            .unwrap(),
        InsertOutcome::AlreadyArmed
    );
    assert!(store.get(&ids[1]).unwrap().is_some());

    // A backdated arm is itself the oldest and is evicted straight away
    let backdated = Identity::generate();
    assert_eq!(
        store
            .insert_within_limit(
                backdated,
                origin("10.0.0.3"),
                now - chrono::Duration::hours(1),
                bounded,
            )
            .unwrap(),
        InsertOutcome::Created { evicted: 1 }
    );
    assert!(store.get(&backdated).unwrap().is_none());
    assert_eq!(store.len().unwrap(), 3);
}
