//! Pluggable persistence for submissions, keyed by nullifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, future::Future, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::field::FieldElement;
use crate::pseudonym::PseudonymousId;

/// Lifecycle of a stored submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Stored, awaiting on-chain verification.
    #[default]
    Pending,
    Verified,
    Rejected,
    /// Enqueueing for verification failed every attempt; needs out-of-band pickup.
    VerificationRetryExhausted,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
            Self::VerificationRetryExhausted => "verification_retry_exhausted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::Rejected)
    }

    pub fn can_transition_to(&self, next: &Self) -> bool {
        use SubmissionStatus::*;
        matches!(
            (self, next),
            (Pending, Verified)
                | (Pending, Rejected)
                | (Pending, VerificationRetryExhausted)
                | (VerificationRetryExhausted, Verified)
                | (VerificationRetryExhausted, Rejected)
        )
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted submission. Holds the pseudonymous id, never the raw user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub nullifier: FieldElement,
    pub pseudonymous_id: PseudonymousId,
    pub action_domain: FieldElement,
    pub template_id: String,
    pub district_id: String,
    #[serde(with = "hex_bytes")]
    pub proof: Vec<u8>,
    pub public_inputs: Vec<FieldElement>,
    pub encrypted_message: String,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("a submission with nullifier {0} already exists")]
    DuplicateNullifier(FieldElement),

    #[error("submission not found for nullifier {0}")]
    NotFound(FieldElement),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: SubmissionStatus,
        to: SubmissionStatus,
    },

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Storage backend for submissions.
///
/// `insert` is the authoritative uniqueness check: it must fail with
/// [`StoreError::DuplicateNullifier`] when the nullifier already exists.
pub trait SubmissionStore: Send + Sync + Clone + 'static {
    fn find_by_nullifier(
        &self,
        nullifier: FieldElement,
    ) -> impl Future<Output = Result<Option<SubmissionRecord>, StoreError>> + Send;

    fn insert(
        &self,
        record: SubmissionRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn update_status(
        &self,
        nullifier: FieldElement,
        status: SubmissionStatus,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-process store. Uniqueness is enforced under the write lock.
#[derive(Clone, Default)]
pub struct InMemorySubmissionStore {
    records: Arc<RwLock<HashMap<FieldElement, SubmissionRecord>>>,
}

impl InMemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn records(&self) -> Vec<SubmissionRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

impl SubmissionStore for InMemorySubmissionStore {
    async fn find_by_nullifier(
        &self,
        nullifier: FieldElement,
    ) -> Result<Option<SubmissionRecord>, StoreError> {
        Ok(self.records.read().await.get(&nullifier).cloned())
    }

    async fn insert(&self, record: SubmissionRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.nullifier) {
            return Err(StoreError::DuplicateNullifier(record.nullifier));
        }
        records.insert(record.nullifier, record);
        Ok(())
    }

    async fn update_status(
        &self,
        nullifier: FieldElement,
        status: SubmissionStatus,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&nullifier)
            .ok_or(StoreError::NotFound(nullifier))?;
        if !record.status.can_transition_to(&status) {
            return Err(StoreError::InvalidTransition {
                from: record.status,
                to: status,
            });
        }
        record.status = status;
        Ok(())
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
