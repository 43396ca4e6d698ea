use crate::action_domain::ActionDomainError;
use crate::config::ConfigError;
use crate::credential::CredentialError;
use crate::did::DidKeyError;
use crate::field::FieldError;
use crate::identity::UserSecretError;
use crate::merkle::MerkleError;
use crate::submission::{StoreError, SubmissionError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// How a caller should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or out-of-range input. Caller-fixable, never retried.
    Validation,
    /// Missing or unusable signing key or salt. Fatal for the operation.
    Configuration,
    /// The action was already performed. User-facing, not a system fault.
    DuplicateNullifier,
    /// Persistence failure.
    Storage,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error(transparent)]
    ActionDomain(#[from] ActionDomainError),

    #[error(transparent)]
    UserSecret(#[from] UserSecretError),

    #[error(transparent)]
    DidKey(#[from] DidKeyError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::Submission(err.into())
    }
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::Configuration,
            Error::Submission(SubmissionError::NullifierAlreadyUsed { .. }) => {
                ErrorCategory::DuplicateNullifier
            }
            Error::Submission(SubmissionError::Store(_)) => ErrorCategory::Storage,
            Error::Credential(CredentialError::Serialization(_)) => ErrorCategory::Storage,
            Error::Credential(CredentialError::ValidityOverflow { .. }) => {
                ErrorCategory::Configuration
            }
            _ => ErrorCategory::Validation,
        }
    }
}
