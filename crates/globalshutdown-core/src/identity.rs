//! Machine identity token, shared by the relay and the agent

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// Identity string is not a UUID. Not retryable without correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidIdentity(pub String);

impl fmt::Display for InvalidIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid identity: {}", self.0)
    }
}

impl std::error::Error for InvalidIdentity {}

/// Opaque per-machine token. Anyone holding it may arm or consume its signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(Uuid);

impl Identity {
    /// Fresh random (v4) identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse any UUID form (hyphenated, simple, braced, urn).
    ///
    /// Surrounding whitespace is not accepted; callers reading from files trim first.
    pub fn parse(raw: &str) -> Result<Self, InvalidIdentity> {
        if raw.is_empty() {
            return Err(InvalidIdentity("empty".to_string()));
        }
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|e| InvalidIdentity(e.to_string()))
    }

    /// First 8 characters of the canonical form, for log lines.
    pub fn short(&self) -> String {
        self.to_string()[..8].to_string()
    }
}

impl fmt::Display for Identity {
    /// Canonical hyphenated lowercase rendering.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for Identity {
    type Err = InvalidIdentity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
