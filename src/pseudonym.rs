//! Salted one-way identifiers standing in for internal user ids.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::config::ConfigError;

/// Minimum accepted salt length, in characters.
pub const MIN_SALT_LEN: usize = 32;

/// The server-side pseudonym salt. Never printed.
#[derive(Clone)]
pub struct PseudonymSalt(String);

impl PseudonymSalt {
    pub fn new(salt: impl Into<String>) -> Result<Self, ConfigError> {
        let salt = salt.into();
        if salt.is_empty() {
            return Err(ConfigError::MissingSalt);
        }
        let len = salt.chars().count();
        if len < MIN_SALT_LEN {
            return Err(ConfigError::SaltTooShort { len });
        }
        Ok(Self(salt))
    }

    /// Hash an internal user id under this salt.
    pub fn pseudonymize(&self, user_id: &str) -> PseudonymousId {
        PseudonymousId::derive(self, user_id)
    }
}

impl fmt::Debug for PseudonymSalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PseudonymSalt(<redacted>)")
    }
}

/// Lowercase hex SHA-256 of `salt || user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PseudonymousId(String);

impl PseudonymousId {
    /// Same as [`PseudonymSalt::pseudonymize`].
    pub fn derive(salt: &PseudonymSalt, user_id: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(salt.0.as_bytes());
        hasher.update(user_id.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PseudonymousId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
