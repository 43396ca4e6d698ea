//! Per-action scalars binding a nullifier to one concrete civic action.
//!
//! The action domain is SHA-256 over a protocol tag and the length-prefixed
//! action fields, reduced into the scalar field.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};

use crate::field::FieldElement;

/// Protocol tag mixed into every action domain.
pub const ACTION_DOMAIN_TAG: &[u8] = b"civic-action-domain:v1";

/// Level of government an action is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JurisdictionType {
    Federal,
    State,
    Local,
    International,
}

impl JurisdictionType {
    pub const ALL: [JurisdictionType; 4] = [
        JurisdictionType::Federal,
        JurisdictionType::State,
        JurisdictionType::Local,
        JurisdictionType::International,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JurisdictionType::Federal => "federal",
            JurisdictionType::State => "state",
            JurisdictionType::Local => "local",
            JurisdictionType::International => "international",
        }
    }
}

impl fmt::Display for JurisdictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JurisdictionType {
    type Err = ActionDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|j| j.as_str() == s)
            .ok_or_else(|| ActionDomainError::InvalidJurisdictionType(s.to_string()))
    }
}

/// Errors from [`build_action_domain`], one per violated field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionDomainError {
    #[error("country must be a two-letter code, got {0:?}")]
    InvalidCountry(String),

    #[error("jurisdictionType must be one of federal, state, local, international; got {0:?}")]
    InvalidJurisdictionType(String),

    #[error("recipientSubdivision must not be empty")]
    EmptyRecipientSubdivision,

    #[error("templateId must not be empty")]
    EmptyTemplateId,

    #[error("sessionId must not be empty")]
    EmptySessionId,
}

/// The tuple an action domain is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDomainParams {
    pub country: String,
    pub jurisdiction_type: JurisdictionType,
    pub recipient_subdivision: String,
    pub template_id: String,
    pub session_id: String,
}

/// Derive the action-domain scalar.
pub fn build_action_domain(params: &ActionDomainParams) -> Result<FieldElement, ActionDomainError> {
    if params.country.len() != 2 || !params.country.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(ActionDomainError::InvalidCountry(params.country.clone()));
    }
    if params.recipient_subdivision.is_empty() {
        return Err(ActionDomainError::EmptyRecipientSubdivision);
    }
    if params.template_id.is_empty() {
        return Err(ActionDomainError::EmptyTemplateId);
    }
    if params.session_id.is_empty() {
        return Err(ActionDomainError::EmptySessionId);
    }

    let country = params.country.to_ascii_uppercase();
    let mut hasher = Sha256::new();
    hasher.update(ACTION_DOMAIN_TAG);
    for part in [
        country.as_str(),
        params.jurisdiction_type.as_str(),
        params.recipient_subdivision.as_str(),
        params.template_id.as_str(),
        params.session_id.as_str(),
    ] {
        hasher.update((part.len() as u32).to_be_bytes());
        hasher.update(part.as_bytes());
    }

    Ok(FieldElement::from_be_bytes_mod_order(&hasher.finalize()))
}
