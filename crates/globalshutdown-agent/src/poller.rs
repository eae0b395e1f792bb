//! Poll loop: ask the relay, act on `true`, sleep, repeat

use std::time::Duration;

use globalshutdown_core::{Identity, is_shutdown_requested, sleep_unless_shutdown};

use crate::action::ShutdownAction;
use crate::client::PendingSource;

/// Default time between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Result of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Relay answered `false`
    Idle,
    /// Relay answered `true` and the action ran
    Triggered,
    /// Relay answered `true` but the action failed. The signal is consumed.
    ActionFailed,
    /// Relay unreachable or answered garbage; no action taken
    Unreachable,
}

pub struct Poller<S, A> {
    source: S,
    action: A,
    identity: Identity,
    interval: Duration,
}

impl<S: PendingSource, A: ShutdownAction> Poller<S, A> {
    pub fn new(source: S, action: A, identity: Identity, interval: Duration) -> Self {
        Self {
            source,
            action,
            identity,
            interval,
        }
    }

    /// Ask once. Errors never trigger the action.
    pub fn poll_once(&self) -> PollOutcome {
        match self.source.check_pending(&self.identity) {
            Ok(false) => {
                log::debug!("No signal pending for {}", self.identity.short());
                PollOutcome::Idle
            }
            Ok(true) => {
                log::warn!("Shutdown signal received for {}", self.identity.short());
                match self.action.execute() {
                    Ok(()) => PollOutcome::Triggered,
                    Err(e) => {
                        log::error!("Shutdown action failed: {e:#}");
                        PollOutcome::ActionFailed
                    }
                }
            }
            Err(e) => {
                log::warn!("Relay poll failed: {e}");
                PollOutcome::Unreachable
            }
        }
    }

    /// Poll immediately, then every `interval` until shutdown is requested.
    /// A delivered signal doesn't stop the loop; the next one is acted on too.
    pub fn run(&self) {
        log::info!(
            "Polling every {}s as {}",
            self.interval.as_secs(),
            self.identity.short()
        );
        self.run_until(|_| false);
    }

    /// `run` with an extra exit condition checked after every poll.
    pub fn run_until(&self, mut done: impl FnMut(PollOutcome) -> bool) {
        while !is_shutdown_requested() {
            if done(self.poll_once()) || !sleep_unless_shutdown(self.interval) {
                break;
            }
        }
    }
}
