//! globalshutdown-relay: Pending-signal relay
//!
//! Stores one-shot shutdown signals keyed by machine identity and hands each
//! one out exactly once. Arming is deduplicated, rate-limited per origin,
//! expired by a background sweep, and bounded in total size; each of those
//! policies can be switched off independently.

pub mod error;
pub mod http;
pub mod origin;
pub mod policy;
pub mod relay;
pub mod store;
pub mod sweeper;

pub use error::RelayError;
pub use http::{HttpOptions, router, serve};
pub use globalshutdown_core::Identity;
pub use origin::{OriginHash, OriginHasher};
pub use policy::{Capacity, Expiry, Policy, RateLimit};
pub use relay::Relay;
pub use store::{
    Admission, DuckDbStore, InsertOutcome, MemoryStore, SignalEntry, SignalStore, StoreBackend,
};
pub use sweeper::run_sweeper;
