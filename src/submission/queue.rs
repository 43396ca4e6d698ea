//! Hand-off of stored submissions to on-chain proof verification.

use std::{future::Future, time::Duration};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::store::{SubmissionStatus, SubmissionStore};
use crate::field::FieldElement;

/// Work item for the external verification pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationJob {
    pub submission_id: Uuid,
    pub nullifier: FieldElement,
    pub proof: Vec<u8>,
    pub public_inputs: Vec<FieldElement>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("verification enqueue failed: {0}")]
pub struct QueueError(pub String);

/// Destination for verification jobs.
pub trait VerificationQueue: Send + Sync + Clone + 'static {
    fn enqueue(&self, job: VerificationJob) -> impl Future<Output = Result<(), QueueError>> + Send;
}

/// Queue backed by a bounded tokio channel; the receiver is the verifier side.
#[derive(Clone)]
pub struct ChannelVerificationQueue {
    tx: mpsc::Sender<VerificationJob>,
}

impl ChannelVerificationQueue {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<VerificationJob>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

impl VerificationQueue for ChannelVerificationQueue {
    async fn enqueue(&self, job: VerificationJob) -> Result<(), QueueError> {
        self.tx
            .send(job)
            .await
            .map_err(|_| QueueError("verification channel closed".to_string()))
    }
}

/// Bounded exponential backoff for enqueue attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Enqueue `job`, retrying with backoff. When every attempt fails the stored
/// record moves to [`SubmissionStatus::VerificationRetryExhausted`].
///
/// Returns whether the job was enqueued. Failures are logged, never raised.
pub async fn enqueue_with_retry<Q, S>(
    queue: &Q,
    store: &S,
    job: VerificationJob,
    policy: RetryPolicy,
) -> bool
where
    Q: VerificationQueue,
    S: SubmissionStore,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        match queue.enqueue(job.clone()).await {
            Ok(()) => {
                tracing::debug!(submission_id = %job.submission_id, attempt, "verification enqueued");
                return true;
            }
            Err(e) if attempt < attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    submission_id = %job.submission_id,
                    attempt,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "verification enqueue failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::error!(
                    submission_id = %job.submission_id,
                    attempts,
                    error = %e,
                    "verification enqueue retries exhausted"
                );
            }
        }
    }

    if let Err(e) = store
        .update_status(job.nullifier, SubmissionStatus::VerificationRetryExhausted)
        .await
    {
        tracing::error!(
            submission_id = %job.submission_id,
            error = %e,
            "failed to mark submission for out-of-band pickup"
        );
    }
    false
}
