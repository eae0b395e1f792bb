//! DuckDB-backed signal store
//!
//! One table, one connection. The connection mutex is the store's critical
//! section; consuming is a single conditional `DELETE` whose affected-row
//! count is the answer, never a separate check. Admission-checked inserts run
//! in a transaction, so a failed eviction rolls the new row back too.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use duckdb::{Connection, params};

use globalshutdown_core::Identity;

use super::{Admission, InsertOutcome, SignalEntry, SignalStore, expiry_cutoff};
use crate::error::RelayError;
use crate::origin::OriginHash;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS pending (
        id       VARCHAR PRIMARY KEY,
        origin   VARCHAR NOT NULL,
        armed_at BIGINT  NOT NULL,
        seq      BIGINT  NOT NULL
    );";

struct Inner {
    conn: Connection,
    next_seq: i64,
}

// Statement helpers take a `Connection` so they run the same on the bare
// connection and inside a transaction (which derefs to one).

fn count_by_origin(conn: &Connection, origin: &OriginHash) -> Result<usize, RelayError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pending WHERE origin = ?",
        params![origin.to_hex()],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

fn contains(conn: &Connection, identity: &Identity) -> Result<bool, RelayError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pending WHERE id = ?",
        params![identity.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn count_all(conn: &Connection) -> Result<usize, RelayError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM pending", params![], |row| row.get(0))?;
    Ok(count as usize)
}

/// Insert unless present. Does not advance the sequence; the caller does
/// that once the row is committed.
fn insert_row(
    conn: &Connection,
    identity: Identity,
    origin: OriginHash,
    now: DateTime<Utc>,
    seq: i64,
) -> Result<bool, RelayError> {
    if contains(conn, &identity)? {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO pending (id, origin, armed_at, seq) VALUES (?, ?, ?, ?)",
        params![
            identity.to_string(),
            origin.to_hex(),
            now.timestamp_micros(),
            seq
        ],
    )?;
    Ok(true)
}

fn evict_over(conn: &Connection, max_count: usize) -> Result<usize, RelayError> {
    let len = count_all(conn)?;
    if len <= max_count {
        return Ok(0);
    }
    let excess = len - max_count;
    let removed = conn.execute(
        &format!(
            "DELETE FROM pending WHERE id IN \
             (SELECT id FROM pending ORDER BY armed_at, seq LIMIT {excess})"
        ),
        params![],
    )?;
    Ok(removed)
}

/// Signal store in a DuckDB table.
///
/// File-backed databases keep armed signals across relay restarts.
pub struct DuckDbStore {
    inner: Mutex<Inner>,
}

impl DuckDbStore {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> Result<Self, RelayError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                RelayError::StoreUnavailable(format!(
                    "failed to create {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path)?;
        log::info!("Opened signal store at {}", path.display());
        Self::with_connection(conn)
    }

    /// In-memory database (same semantics, no persistence).
    pub fn open_in_memory() -> Result<Self, RelayError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, RelayError> {
        conn.execute_batch(SCHEMA)?;
        let next_seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(seq), -1) + 1 FROM pending",
            params![],
            |row| row.get(0),
        )?;
        if next_seq > 0 {
            log::debug!("Signal store resumed at seq {next_seq}");
        }
        Ok(Self {
            inner: Mutex::new(Inner { conn, next_seq }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SignalStore for DuckDbStore {
    fn insert(
        &self,
        identity: Identity,
        origin: OriginHash,
        now: DateTime<Utc>,
    ) -> Result<bool, RelayError> {
        let mut inner = self.lock();
        let inserted = insert_row(&inner.conn, identity, origin, now, inner.next_seq)?;
        if inserted {
            inner.next_seq += 1;
        }
        Ok(inserted)
    }

    fn insert_within_limit(
        &self,
        identity: Identity,
        origin: OriginHash,
        now: DateTime<Utc>,
        admission: Admission,
    ) -> Result<InsertOutcome, RelayError> {
        let mut guard = self.lock();
        let Inner { conn, next_seq } = &mut *guard;
        // Dropped without commit on any early return, which rolls back
        let tx = conn.transaction()?;

        if let Some(limit) = admission.max_per_origin {
            if count_by_origin(&tx, &origin)? >= limit {
                return Ok(InsertOutcome::RateLimited);
            }
        }
        if !insert_row(&tx, identity, origin, now, *next_seq)? {
            return Ok(InsertOutcome::AlreadyArmed);
        }
        let evicted = match admission.max_entries {
            Some(max_count) => evict_over(&tx, max_count)?,
            None => 0,
        };
        tx.commit()?;

        *next_seq += 1;
        Ok(InsertOutcome::Created { evicted })
    }

    fn count_by_origin(&self, origin: &OriginHash) -> Result<usize, RelayError> {
        count_by_origin(&self.lock().conn, origin)
    }

    fn take_if_present(&self, identity: &Identity) -> Result<bool, RelayError> {
        let removed = self.lock().conn.execute(
            "DELETE FROM pending WHERE id = ?",
            params![identity.to_string()],
        )?;
        Ok(removed > 0)
    }

    fn sweep(&self, now: DateTime<Utc>, ttl: Duration) -> Result<usize, RelayError> {
        let Some(cutoff) = expiry_cutoff(now, ttl) else {
            return Ok(0);
        };
        let removed = self.lock().conn.execute(
            "DELETE FROM pending WHERE armed_at < ?",
            params![cutoff.timestamp_micros()],
        )?;
        Ok(removed)
    }

    fn evict_over_capacity(&self, max_count: usize) -> Result<usize, RelayError> {
        evict_over(&self.lock().conn, max_count)
    }

    fn get(&self, identity: &Identity) -> Result<Option<SignalEntry>, RelayError> {
        let inner = self.lock();
        let mut stmt = inner
            .conn
            .prepare("SELECT origin, armed_at FROM pending WHERE id = ?")?;
        let mut rows = stmt.query(params![identity.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let origin: String = row.get(0)?;
        let armed_at: i64 = row.get(1)?;

        let origin = OriginHash::from_hex(&origin).ok_or_else(|| {
            RelayError::StoreUnavailable(format!("corrupt origin for {}", identity.short()))
        })?;
        let armed_at = DateTime::from_timestamp_micros(armed_at).ok_or_else(|| {
            RelayError::StoreUnavailable(format!("corrupt timestamp for {}", identity.short()))
        })?;
        Ok(Some(SignalEntry {
            identity: *identity,
            origin,
            armed_at,
        }))
    }

    fn len(&self) -> Result<usize, RelayError> {
        count_all(&self.lock().conn)
    }
}
