use std::{fmt, time::Duration};

use ed25519_dalek::SigningKey;

use crate::field::strip_hex_prefix;
use crate::pseudonym::PseudonymSalt;
use crate::submission::RetryPolicy;

/// Longest credential validity accepted from configuration.
pub const MAX_VALIDITY_DAYS: u32 = 3650;

/// Configuration errors. Secrets are never echoed back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("CREDENTIAL_SIGNING_KEY is not set")]
    MissingSigningKey,

    #[error("CREDENTIAL_SIGNING_KEY must be a 32-byte hex Ed25519 seed")]
    InvalidSigningKey,

    #[error("PSEUDONYM_SALT is not set")]
    MissingSalt,

    #[error("PSEUDONYM_SALT must be at least 32 characters, got {len}")]
    SaltTooShort { len: usize },

    #[error("CREDENTIAL_VALIDITY_DAYS must be between 1 and {MAX_VALIDITY_DAYS}")]
    InvalidValidity,
}

/// Runtime configuration for the identity core.
///
/// Loaded once at startup; the signing key and salt are turned into
/// [`SigningKey`] and [`PseudonymSalt`] and passed explicitly from there.
#[derive(Clone, clap::Args)]
pub struct CoreConfig {
    /// Hex-encoded Ed25519 seed used to sign district credentials
    #[arg(long, env = "CREDENTIAL_SIGNING_KEY", hide_env_values = true)]
    pub signing_key: Option<String>,

    /// Salt for pseudonymous user ids (at least 32 characters)
    #[arg(long, env = "PSEUDONYM_SALT", hide_env_values = true)]
    pub pseudonym_salt: Option<String>,

    /// Validity period of issued district credentials, in days
    #[arg(long, env = "CREDENTIAL_VALIDITY_DAYS", default_value = "90")]
    pub credential_validity_days: u32,

    /// Attempts made to enqueue a proof for on-chain verification
    #[arg(long, env = "VERIFICATION_RETRY_ATTEMPTS", default_value = "5")]
    pub verification_retry_attempts: u32,

    /// Base delay of the enqueue retry backoff, in milliseconds
    #[arg(long, env = "VERIFICATION_RETRY_BASE_MS", default_value = "500")]
    pub verification_retry_base_ms: u64,
}

impl CoreConfig {
    /// Check every setting up front so startup fails before serving.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.signing_key()?;
        self.pseudonym_salt()?;
        self.credential_validity()?;
        Ok(())
    }

    pub fn signing_key(&self) -> Result<SigningKey, ConfigError> {
        let raw = self
            .signing_key
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSigningKey)?;
        let bytes = hex::decode(strip_hex_prefix(raw)).map_err(|_| ConfigError::InvalidSigningKey)?;
        let seed: [u8; 32] = bytes.try_into().map_err(|_| ConfigError::InvalidSigningKey)?;
        Ok(SigningKey::from_bytes(&seed))
    }

    pub fn pseudonym_salt(&self) -> Result<PseudonymSalt, ConfigError> {
        PseudonymSalt::new(self.pseudonym_salt.clone().unwrap_or_default())
    }

    pub fn credential_validity(&self) -> Result<chrono::Duration, ConfigError> {
        if !(1..=MAX_VALIDITY_DAYS).contains(&self.credential_validity_days) {
            return Err(ConfigError::InvalidValidity);
        }
        Ok(chrono::Duration::days(i64::from(self.credential_validity_days)))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.verification_retry_attempts.max(1),
            base_delay: Duration::from_millis(self.verification_retry_base_ms),
        }
    }
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("CoreConfig")
            .field("signing_key", &redact(&self.signing_key))
            .field("pseudonym_salt", &redact(&self.pseudonym_salt))
            .field("credential_validity_days", &self.credential_validity_days)
            .field("verification_retry_attempts", &self.verification_retry_attempts)
            .field("verification_retry_base_ms", &self.verification_retry_base_ms)
            .finish()
    }
}
