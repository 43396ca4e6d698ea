//! Proof submission intake: nullifier deduplication, pseudonymous
//! persistence, and fire-and-forget hand-off to verification.

pub mod public_inputs;
pub mod queue;
pub mod store;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use public_inputs::{PublicInputs, PUBLIC_INPUT_COUNT};
pub use queue::{
    enqueue_with_retry, ChannelVerificationQueue, QueueError, RetryPolicy, VerificationJob,
    VerificationQueue,
};
pub use store::{
    InMemorySubmissionStore, StoreError, SubmissionRecord, SubmissionStatus, SubmissionStore,
};

use crate::config::{ConfigError, CoreConfig};
use crate::field::{strip_hex_prefix, FieldElement, FieldError};
use crate::pseudonym::PseudonymSalt;

/// Why a submission was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("userId must not be empty")]
    EmptyUserId,

    #[error("templateId must not be empty")]
    EmptyTemplateId,

    #[error("proof must be non-empty hex")]
    InvalidProof,

    #[error("publicInputs must contain {expected} elements, got {actual}")]
    PublicInputCount { expected: usize, actual: usize },

    #[error("publicInputs[{index}] is invalid: {source}")]
    PublicInput { index: usize, source: FieldError },

    #[error("authority level must be an integer 1-5, got {0}")]
    InvalidAuthorityLevel(String),

    #[error("nullifier already used: this action has already been performed")]
    NullifierAlreadyUsed { nullifier: FieldElement },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SubmissionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateNullifier(nullifier) => {
                SubmissionError::NullifierAlreadyUsed { nullifier }
            }
            other => SubmissionError::Store(other),
        }
    }
}

/// A proof submission as received from the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    /// Hex-encoded proof bytes.
    pub proof: String,
    pub public_inputs: Vec<String>,
    /// Opaque ciphertext for the delivery pipeline.
    pub encrypted_message: String,
    pub template_id: String,
    pub district_id: String,
}

/// Returned once the submission is durably stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub status: SubmissionStatus,
    pub submission_id: Uuid,
    pub nullifier: FieldElement,
}

/// Entry point for proof submissions, generic over where records live and
/// how verification jobs are handed off.
pub struct SubmissionHandler<S, Q> {
    store: S,
    queue: Q,
    salt: PseudonymSalt,
    retry: RetryPolicy,
}

impl<S, Q> SubmissionHandler<S, Q>
where
    S: SubmissionStore,
    Q: VerificationQueue,
{
    pub fn new(store: S, queue: Q, salt: PseudonymSalt, retry: RetryPolicy) -> Self {
        Self {
            store,
            queue,
            salt,
            retry,
        }
    }

    /// Fails with [`ConfigError::MissingSalt`] or [`ConfigError::SaltTooShort`]
    /// when the pseudonym salt is not usable.
    pub fn from_config(config: &CoreConfig, store: S, queue: Q) -> Result<Self, ConfigError> {
        Ok(Self::new(
            store,
            queue,
            config.pseudonym_salt()?,
            config.retry_policy(),
        ))
    }

    /// The backing store, for status lookups.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate, deduplicate and persist a submission, then hand it to
    /// verification in the background.
    #[tracing::instrument(skip_all, fields(template_id = %request.template_id))]
    pub async fn handle_submission(
        &self,
        user_id: &str,
        request: SubmissionRequest,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        if user_id.is_empty() {
            return Err(SubmissionError::EmptyUserId);
        }
        if request.template_id.is_empty() {
            return Err(SubmissionError::EmptyTemplateId);
        }
        let public_inputs = PublicInputs::parse(&request.public_inputs)?;
        let proof = decode_proof(&request.proof)?;
        let nullifier = public_inputs.nullifier();

        // fast path; the store's insert is the authoritative check
        if self.store.find_by_nullifier(nullifier).await?.is_some() {
            tracing::info!(%nullifier, "duplicate nullifier rejected");
            return Err(SubmissionError::NullifierAlreadyUsed { nullifier });
        }

        let record = SubmissionRecord {
            id: Uuid::new_v4(),
            nullifier,
            pseudonymous_id: self.salt.pseudonymize(user_id),
            action_domain: public_inputs.action_domain(),
            template_id: request.template_id,
            district_id: request.district_id,
            proof,
            public_inputs: public_inputs.into_inner(),
            encrypted_message: request.encrypted_message,
            status: SubmissionStatus::Pending,
            created_at: Utc::now(),
        };
        let job = VerificationJob {
            submission_id: record.id,
            nullifier,
            proof: record.proof.clone(),
            public_inputs: record.public_inputs.clone(),
        };
        let submission_id = record.id;

        if let Err(e) = self.store.insert(record).await {
            let err = SubmissionError::from(e);
            if matches!(err, SubmissionError::NullifierAlreadyUsed { .. }) {
                tracing::info!(%nullifier, "duplicate nullifier rejected at insert");
            }
            return Err(err);
        }
        tracing::info!(%submission_id, %nullifier, "submission stored");

        let (queue, store, retry) = (self.queue.clone(), self.store.clone(), self.retry);
        tokio::spawn(async move {
            enqueue_with_retry(&queue, &store, job, retry).await;
        });

        Ok(SubmissionReceipt {
            status: SubmissionStatus::Pending,
            submission_id,
            nullifier,
        })
    }
}

fn decode_proof(proof: &str) -> Result<Vec<u8>, SubmissionError> {
    let bytes = hex::decode(strip_hex_prefix(proof)).map_err(|_| SubmissionError::InvalidProof)?;
    if bytes.is_empty() {
        return Err(SubmissionError::InvalidProof);
    }
    Ok(bytes)
}
