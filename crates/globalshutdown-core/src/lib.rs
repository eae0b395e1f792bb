//! globalshutdown-core - Shared process infrastructure
//!
//! Machine identity, logging setup, signal-driven shutdown flag, the shared
//! HTTP client and runtime used by the agent, and retry backoff.

pub mod http;
pub mod identity;
pub mod logging;
pub mod retry;
pub mod shutdown;

// Re-exports for convenience
pub use http::{HttpError, SHARED_RUNTIME, http_client};
pub use identity::{Identity, InvalidIdentity};
pub use logging::init_logging;
pub use retry::{backoff_duration, retry_with_backoff};
pub use shutdown::{
    install_signal_handlers, is_shutdown_requested, shutdown_flag, sleep_unless_shutdown,
    wait_for_shutdown,
};
