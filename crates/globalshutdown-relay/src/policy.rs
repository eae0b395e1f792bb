//! Admission and expiry policy
//!
//! Three independent toggles layered over the store: per-origin rate limit,
//! TTL sweep, and a total capacity bound with oldest-first eviction.

use std::time::Duration;

use crate::store::Admission;

pub const DEFAULT_MAX_PER_ORIGIN: usize = 5;
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Cap on concurrently armed signals sharing one origin hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_per_origin: usize,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            max_per_origin: DEFAULT_MAX_PER_ORIGIN,
        }
    }
}

/// Periodic removal of signals nobody consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for Expiry {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Hard cap on total live entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub max_entries: usize,
}

impl Default for Capacity {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Which policies are active. `None` disables a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub rate_limit: Option<RateLimit>,
    pub expiry: Option<Expiry>,
    pub capacity: Option<Capacity>,
}

impl Default for Policy {
    /// All three policies with recommended values.
    fn default() -> Self {
        Self {
            rate_limit: Some(RateLimit::default()),
            expiry: Some(Expiry::default()),
            capacity: Some(Capacity::default()),
        }
    }
}

impl Policy {
    /// No admission control, no expiry, unbounded.
    pub const fn unrestricted() -> Self {
        Self {
            rate_limit: None,
            expiry: None,
            capacity: None,
        }
    }

    pub fn with_rate_limit(mut self, max_per_origin: usize) -> Self {
        self.rate_limit = Some(RateLimit { max_per_origin });
        self
    }

    pub fn with_expiry(mut self, ttl: Duration, sweep_interval: Duration) -> Self {
        self.expiry = Some(Expiry {
            ttl,
            sweep_interval,
        });
        self
    }

    pub fn with_capacity(mut self, max_entries: usize) -> Self {
        self.capacity = Some(Capacity { max_entries });
        self
    }

    /// Per-origin limit passed to the store, if rate limiting is on.
    pub fn origin_limit(&self) -> Option<usize> {
        self.rate_limit.map(|r| r.max_per_origin)
    }

    /// Limits the store enforces while arming.
    pub fn admission(&self) -> Admission {
        Admission {
            max_per_origin: self.origin_limit(),
            max_entries: self.capacity.map(|c| c.max_entries),
        }
    }
}
