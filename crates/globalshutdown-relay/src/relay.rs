//! Relay service: validates requests, applies admission policy, drives the store.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use globalshutdown_core::Identity;

use crate::error::RelayError;
use crate::origin::OriginHasher;
use crate::policy::Policy;
use crate::store::{InsertOutcome, SignalStore};

/// Mediates `arm` and `consume_if_pending` over an injected store.
///
/// Holds no request state of its own; the store is the only shared mutable state.
pub struct Relay {
    store: Arc<dyn SignalStore>,
    hasher: OriginHasher,
    policy: Policy,
}

impl Relay {
    pub fn new(store: Arc<dyn SignalStore>, hasher: OriginHasher, policy: Policy) -> Self {
        Self {
            store,
            hasher,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn SignalStore> {
        &self.store
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Arm a shutdown signal for `raw_identity`, requested from `origin`.
    pub fn arm(&self, raw_identity: &str, origin: &str) -> Result<(), RelayError> {
        self.arm_at(raw_identity, origin, Utc::now())
    }

    pub fn arm_at(
        &self,
        raw_identity: &str,
        origin: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RelayError> {
        let identity = Identity::parse(raw_identity)?;
        let origin_hash = self.hasher.hash(origin);

        // One store call: a failure anywhere in it leaves the store untouched
        match self
            .store
            .insert_within_limit(identity, origin_hash, now, self.policy.admission())?
        {
            InsertOutcome::Created { evicted } => {
                log::info!("armed {} (origin {origin_hash})", identity.short());
                if evicted > 0 {
                    log::warn!("store at capacity, evicted {evicted} oldest signal(s)");
                }
                Ok(())
            }
            InsertOutcome::AlreadyArmed => {
                log::debug!("{} already armed", identity.short());
                Ok(())
            }
            InsertOutcome::RateLimited => {
                log::warn!("origin {origin_hash} rate limited arming {}", identity.short());
                Err(RelayError::RateLimited)
            }
        }
    }

    /// Take the pending signal for `raw_identity`, if any.
    ///
    /// `true` is returned to exactly one caller per armed signal.
    pub fn consume_if_pending(&self, raw_identity: &str) -> Result<bool, RelayError> {
        let identity = Identity::parse(raw_identity)?;
        let present = self.store.take_if_present(&identity)?;
        if present {
            log::info!("delivered signal to {}", identity.short());
        }
        Ok(present)
    }

    /// Run one expiry sweep if expiry is enabled. Returns entries removed.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> Result<usize, RelayError> {
        match self.policy.expiry {
            Some(expiry) => self.store.sweep(now, expiry.ttl),
            None => Ok(0),
        }
    }
}
