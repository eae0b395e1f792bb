//! Signal store: identity -> armed signal
//!
//! Two backends behind one trait:
//! - [`MemoryStore`]: mutex-guarded hash map, lost on restart
//! - [`DuckDbStore`]: embedded table, survives restart when file-backed
//!
//! Every mutating operation is a single critical section. `take_if_present`
//! is check-and-delete in one step, so two pollers can never both observe
//! the same signal. `insert_within_limit` runs the origin check, the insert
//! and capacity eviction together, so a failed arm leaves nothing behind.

#[cfg(test)]
mod conformance;
mod durable;
mod memory;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use globalshutdown_core::Identity;

use crate::error::RelayError;
use crate::origin::OriginHash;

pub use self::durable::DuckDbStore;
pub use self::memory::MemoryStore;

/// One armed signal. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalEntry {
    pub identity: Identity,
    pub origin: OriginHash,
    pub armed_at: DateTime<Utc>,
}

/// Limits applied inside an admission-checked insert. `None` disables a check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Admission {
    /// Reject when this many live entries already share the origin
    pub max_per_origin: Option<usize>,
    /// After inserting, evict oldest entries until at most this many remain
    pub max_entries: Option<usize>,
}

/// Result of an admission-checked insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// New entry stored; `evicted` older entries made room for it
    Created { evicted: usize },
    AlreadyArmed,
    RateLimited,
}

pub trait SignalStore: Send + Sync {
    /// Insert if absent. Returns whether a new entry was created.
    fn insert(
        &self,
        identity: Identity,
        origin: OriginHash,
        now: DateTime<Utc>,
    ) -> Result<bool, RelayError>;

    /// Admission check, insert and capacity eviction in one critical section.
    ///
    /// With `max_per_origin = Some(n)`, rejects when `n` entries already share
    /// `origin`, even if `identity` itself is already armed. Eviction only runs
    /// when a new entry was created. On error nothing is changed.
    fn insert_within_limit(
        &self,
        identity: Identity,
        origin: OriginHash,
        now: DateTime<Utc>,
        admission: Admission,
    ) -> Result<InsertOutcome, RelayError>;

    /// Number of live entries armed from `origin`.
    fn count_by_origin(&self, origin: &OriginHash) -> Result<usize, RelayError>;

    /// Remove the entry for `identity`, reporting whether it was there.
    fn take_if_present(&self, identity: &Identity) -> Result<bool, RelayError>;

    /// Remove entries armed before `now - ttl`. Returns how many were removed.
    fn sweep(&self, now: DateTime<Utc>, ttl: Duration) -> Result<usize, RelayError>;

    /// Remove oldest entries until at most `max_count` remain.
    fn evict_over_capacity(&self, max_count: usize) -> Result<usize, RelayError>;

    fn get(&self, identity: &Identity) -> Result<Option<SignalEntry>, RelayError>;

    fn len(&self) -> Result<usize, RelayError>;

    fn is_empty(&self) -> Result<bool, RelayError> {
        Ok(self.len()? == 0)
    }
}

/// Which backend to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    /// DuckDB table; `None` keeps the database in memory
    DuckDb { path: Option<PathBuf> },
}

impl StoreBackend {
    pub fn open(&self) -> Result<Arc<dyn SignalStore>, RelayError> {
        match self {
            Self::Memory => Ok(Arc::new(MemoryStore::new())),
            Self::DuckDb { path: Some(path) } => Ok(Arc::new(DuckDbStore::open(path)?)),
            Self::DuckDb { path: None } => Ok(Arc::new(DuckDbStore::open_in_memory()?)),
        }
    }
}

/// Entries armed strictly before the returned instant are expired.
///
/// `None` when the TTL reaches past the representable range (nothing expires).
pub(crate) fn expiry_cutoff(now: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_sub_signed(ttl))
}
