//! Error type for relay operations

use globalshutdown_core::InvalidIdentity;

/// Error from arming or consuming a signal.
///
/// The relay never recovers these locally; each maps to one caller-visible
/// status code via [`RelayError::status_code`].
#[derive(Debug)]
pub enum RelayError {
    /// Identity string is not a UUID. Not retryable without correction.
    InvalidIdentity(String),
    /// The origin already has the maximum number of armed signals.
    RateLimited,
    /// Durable backend failure. The store is left as it was before the call.
    StoreUnavailable(String),
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentity(msg) => write!(f, "invalid identity: {msg}"),
            Self::RateLimited => write!(f, "rate limited"),
            Self::StoreUnavailable(msg) => write!(f, "store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for RelayError {}

impl RelayError {
    /// HTTP status the transport answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidIdentity(_) => 400,
            Self::RateLimited => 429,
            Self::StoreUnavailable(_) => 500,
        }
    }
}

impl From<InvalidIdentity> for RelayError {
    fn from(e: InvalidIdentity) -> Self {
        Self::InvalidIdentity(e.0)
    }
}

impl From<duckdb::Error> for RelayError {
    fn from(e: duckdb::Error) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}
