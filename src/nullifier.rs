//! Anti-replay nullifiers.
//!
//! `nullifier = hash2(userSecret, actionDomain)`, identical to the public
//! nullifier output the proof circuit asserts. Any other construction would
//! make host-side deduplication disagree with on-chain verification.

use crate::field::FieldElement;
use crate::hash::hash2;

/// Compute the nullifier for one user and one action domain.
pub fn compute_nullifier(user_secret: &FieldElement, action_domain: &FieldElement) -> FieldElement {
    hash2(user_secret, action_domain)
}
