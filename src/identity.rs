//! Per-user secret derivation.
//!
//! The user secret is `hash2(identityCommitment, userEntropy)`. The commitment
//! is public (a registered identity-tree leaf); the entropy never leaves the
//! user's device in plaintext, so the secret cannot be recomputed by anyone
//! holding only public data.

use rand::{rngs::OsRng, CryptoRng, RngCore};

use crate::field::{hex_to_field, FieldElement, FieldError};
use crate::hash::hash2;

/// Errors from user secret derivation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserSecretError {
    #[error("identityCommitment is invalid: {0}")]
    IdentityCommitment(FieldError),

    #[error("userEntropy is invalid: {0}")]
    UserEntropy(FieldError),
}

/// Derive the user secret from a registered commitment and local entropy.
///
/// Both inputs are hex with or without a `0x` prefix.
pub fn derive_user_secret(
    identity_commitment: &str,
    user_entropy: &str,
) -> Result<FieldElement, UserSecretError> {
    let commitment = hex_to_field(identity_commitment).map_err(UserSecretError::IdentityCommitment)?;
    let entropy = hex_to_field(user_entropy).map_err(UserSecretError::UserEntropy)?;
    Ok(hash2(&commitment, &entropy))
}

/// Fresh registration entropy from the operating system CSPRNG.
pub fn generate_user_entropy() -> FieldElement {
    generate_user_entropy_with(&mut OsRng)
}

/// Registration entropy from a caller-supplied CSPRNG.
pub fn generate_user_entropy_with<R: RngCore + CryptoRng>(rng: &mut R) -> FieldElement {
    FieldElement::random(rng)
}
