//! In-memory signal store

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;

use globalshutdown_core::Identity;

use super::{Admission, InsertOutcome, SignalEntry, SignalStore, expiry_cutoff};
use crate::error::RelayError;
use crate::origin::OriginHash;

/// Ordering key: arm time, then insertion sequence for ties.
type AgeKey = (DateTime<Utc>, u64);

struct Slot {
    entry: SignalEntry,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    entries: FxHashMap<Identity, Slot>,
    /// Oldest first; always holds exactly the keys of `entries`
    by_age: BTreeMap<AgeKey, Identity>,
    next_seq: u64,
}

impl Inner {
    fn count_by_origin(&self, origin: &OriginHash) -> usize {
        self.entries
            .values()
            .filter(|slot| slot.entry.origin == *origin)
            .count()
    }

    fn insert(&mut self, identity: Identity, origin: OriginHash, now: DateTime<Utc>) -> bool {
        if self.entries.contains_key(&identity) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_age.insert((now, seq), identity);
        self.entries.insert(
            identity,
            Slot {
                entry: SignalEntry {
                    identity,
                    origin,
                    armed_at: now,
                },
                seq,
            },
        );
        true
    }

    fn evict_over(&mut self, max_count: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > max_count {
            let Some((_, identity)) = self.by_age.pop_first() else {
                break;
            };
            self.entries.remove(&identity);
            evicted += 1;
        }
        evicted
    }
}

/// Signal store held in process memory. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every critical section leaves `Inner` consistent before it can panic
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SignalStore for MemoryStore {
    fn insert(
        &self,
        identity: Identity,
        origin: OriginHash,
        now: DateTime<Utc>,
    ) -> Result<bool, RelayError> {
        Ok(self.lock().insert(identity, origin, now))
    }

    fn insert_within_limit(
        &self,
        identity: Identity,
        origin: OriginHash,
        now: DateTime<Utc>,
        admission: Admission,
    ) -> Result<InsertOutcome, RelayError> {
        let mut inner = self.lock();
        if let Some(limit) = admission.max_per_origin {
            if inner.count_by_origin(&origin) >= limit {
                return Ok(InsertOutcome::RateLimited);
            }
        }
        if !inner.insert(identity, origin, now) {
            return Ok(InsertOutcome::AlreadyArmed);
        }
        let evicted = admission
            .max_entries
            .map_or(0, |max_count| inner.evict_over(max_count));
        Ok(InsertOutcome::Created { evicted })
    }

    fn count_by_origin(&self, origin: &OriginHash) -> Result<usize, RelayError> {
        Ok(self.lock().count_by_origin(origin))
    }

    fn take_if_present(&self, identity: &Identity) -> Result<bool, RelayError> {
        let mut inner = self.lock();
        match inner.entries.remove(identity) {
            Some(slot) => {
                inner.by_age.remove(&(slot.entry.armed_at, slot.seq));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn sweep(&self, now: DateTime<Utc>, ttl: Duration) -> Result<usize, RelayError> {
        let Some(cutoff) = expiry_cutoff(now, ttl) else {
            return Ok(0);
        };
        let mut inner = self.lock();
        let live = inner.by_age.split_off(&(cutoff, 0));
        let expired = std::mem::replace(&mut inner.by_age, live);
        for identity in expired.values() {
            inner.entries.remove(identity);
        }
        Ok(expired.len())
    }

    fn evict_over_capacity(&self, max_count: usize) -> Result<usize, RelayError> {
        Ok(self.lock().evict_over(max_count))
    }

    fn get(&self, identity: &Identity) -> Result<Option<SignalEntry>, RelayError> {
        Ok(self.lock().entries.get(identity).map(|slot| slot.entry.clone()))
    }

    fn len(&self) -> Result<usize, RelayError> {
        Ok(self.lock().entries.len())
    }
}
