//! Salted origin hashing for admission control
//!
//! The origin (client IP) is never stored; only a keyed blake3 hash of it.
//! With a random key the hashes are not comparable across restarts.

use std::fmt;

use uuid::Uuid;

const KEY_CONTEXT: &str = "globalshutdown origin hash key v1";

/// Keyed hash of a request's network origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OriginHash([u8; blake3::OUT_LEN]);

impl OriginHash {
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }

    /// Parse the 64-character form written by [`OriginHash::to_hex`].
    pub fn from_hex(hex: &str) -> Option<Self> {
        blake3::Hash::from_hex(hex).ok().map(|h| Self(*h.as_bytes()))
    }
}

impl fmt::Display for OriginHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex()[..8])
    }
}

/// Hashes origins under a fixed key.
#[derive(Clone)]
pub struct OriginHasher {
    key: [u8; blake3::KEY_LEN],
}

impl OriginHasher {
    /// Process-lifetime random key.
    pub fn random() -> Self {
        let mut material = [0u8; 32];
        material[..16].copy_from_slice(Uuid::new_v4().as_bytes());
        material[16..].copy_from_slice(Uuid::new_v4().as_bytes());
        Self {
            key: blake3::derive_key(KEY_CONTEXT, &material),
        }
    }

    /// Key derived from a configured salt, stable across restarts.
    pub fn from_salt(salt: &str) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, salt.as_bytes()),
        }
    }

    pub fn hash(&self, origin: &str) -> OriginHash {
        OriginHash(*blake3::keyed_hash(&self.key, origin.as_bytes()).as_bytes())
    }
}

impl fmt::Debug for OriginHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OriginHasher").finish_non_exhaustive()
    }
}
