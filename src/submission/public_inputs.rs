//! Public-input layout shared with the proof circuit and the on-chain verifier.
//!
//! Reordering any of these offsets is a breaking protocol change.

use serde::{Deserialize, Serialize};

use super::SubmissionError;
use crate::field::{hex_to_field, FieldElement};

/// Length of the three-tree public-input vector.
pub const PUBLIC_INPUT_COUNT: usize = 31;

pub const USER_ROOT_INDEX: usize = 0;
pub const CELL_MAP_ROOT_INDEX: usize = 1;
pub const NULLIFIER_INDEX: usize = 26;
pub const ACTION_DOMAIN_INDEX: usize = 27;
pub const AUTHORITY_LEVEL_INDEX: usize = 28;

pub const MIN_AUTHORITY_LEVEL: u8 = 1;
pub const MAX_AUTHORITY_LEVEL: u8 = 5;

/// A validated public-input vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicInputs(Vec<FieldElement>);

impl PublicInputs {
    /// Parse hex strings through the field codec and check the layout.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self, SubmissionError> {
        if raw.len() != PUBLIC_INPUT_COUNT {
            return Err(SubmissionError::PublicInputCount {
                expected: PUBLIC_INPUT_COUNT,
                actual: raw.len(),
            });
        }
        let values = raw
            .iter()
            .enumerate()
            .map(|(index, s)| {
                hex_to_field(s.as_ref()).map_err(|source| SubmissionError::PublicInput { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_elements(values)
    }

    /// Wrap already-parsed elements, checking length and authority level.
    pub fn from_elements(values: Vec<FieldElement>) -> Result<Self, SubmissionError> {
        if values.len() != PUBLIC_INPUT_COUNT {
            return Err(SubmissionError::PublicInputCount {
                expected: PUBLIC_INPUT_COUNT,
                actual: values.len(),
            });
        }
        let inputs = Self(values);
        inputs.authority_level()?;
        Ok(inputs)
    }

    /// Root of the user identity tree.
    pub fn user_root(&self) -> FieldElement {
        self.0[USER_ROOT_INDEX]
    }

    /// Root of the census cell-to-district map.
    pub fn cell_map_root(&self) -> FieldElement {
        self.0[CELL_MAP_ROOT_INDEX]
    }

    /// `hash2(userSecret, actionDomain)`, unique per user and action.
    pub fn nullifier(&self) -> FieldElement {
        self.0[NULLIFIER_INDEX]
    }

    pub fn action_domain(&self) -> FieldElement {
        self.0[ACTION_DOMAIN_INDEX]
    }

    /// Authority level as an integer in `1..=5`.
    pub fn authority_level(&self) -> Result<u8, SubmissionError> {
        let value = self.0[AUTHORITY_LEVEL_INDEX];
        (MIN_AUTHORITY_LEVEL..=MAX_AUTHORITY_LEVEL)
            .find(|level| FieldElement::from_u64(u64::from(*level)) == value)
            .ok_or_else(|| SubmissionError::InvalidAuthorityLevel(value.to_decimal_string()))
    }

    pub fn as_slice(&self) -> &[FieldElement] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<FieldElement> {
        self.0
    }
}
