//! Machine-side agent: owns an identity, polls the relay, shuts down on signal.

mod action;
mod client;
pub mod identity_file;
mod poller;

pub use action::{CommandAction, DryRunAction, ShutdownAction, default_command};
pub use client::{PendingSource, RelayClient};
pub use poller::{DEFAULT_POLL_INTERVAL, PollOutcome, Poller};
