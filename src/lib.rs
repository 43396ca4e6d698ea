//! Civic identity core - prove district residency without revealing who you are
//!
//! Building blocks for a privacy-preserving civic participation platform:
//! - BN254 field codec and domain-separated Poseidon2 hashing
//! - Merkle roots over identity and census-cell trees
//! - Per-user secrets, per-action domains and anti-replay nullifiers
//! - `did:key` derivation from WebAuthn public keys
//! - Signed district residency credentials
//! - Submission intake with nullifier deduplication
//!
//! # Flow
//!
//! 1. A user registers an identity commitment and keeps local entropy
//! 2. The user secret and action domain yield a nullifier for each action
//! 3. A proof carrying that nullifier is submitted and stored pseudonymously
//! 4. Verification happens out of band; replays are rejected by nullifier

pub mod action_domain;
pub mod cell_id;
pub mod config;
pub mod credential;
pub mod did;
pub mod error;
pub mod field;
pub mod hash;
pub mod identity;
pub mod merkle;
pub mod nullifier;
pub mod pseudonym;
pub mod submission;

// WASM bindings (only compiled when wasm feature is enabled)
#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export main types
pub use action_domain::{build_action_domain, ActionDomainParams, JurisdictionType};
pub use cell_id::{is_cell_id, CellId};
pub use config::{ConfigError, CoreConfig};
pub use credential::{
    hash_credential, hash_district, verify_district_credential, CredentialIssuer,
    DistrictResidencyCredential, IssueCredentialRequest,
};
pub use did::{derive_did_key, get_cose_key_algorithm, CoseAlgorithm, DidKeyError};
pub use error::{Error, ErrorCategory, Result};
pub use field::{hex_to_field, FieldElement, FieldError};
pub use hash::{hash2, hash3, hash4, Poseidon2Hasher};
pub use identity::derive_user_secret;
pub use merkle::{compute_merkle_root, MerkleTree};
pub use nullifier::compute_nullifier;
pub use pseudonym::{PseudonymSalt, PseudonymousId};
pub use submission::{SubmissionHandler, SubmissionReceipt, SubmissionRequest};
