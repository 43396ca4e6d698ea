//! Census-block cell identifiers used as geographic Merkle leaves.
//!
//! A cell id is the 15-digit GEOID of a census block:
//! state FIPS (2) + county FIPS (3) + tract (6) + block (4).
//! Formatting never reveals more than the state+county prefix.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::field::FieldElement;

/// Number of digits in a block-level GEOID.
pub const CELL_ID_LEN: usize = 15;

const STATE_END: usize = 2;
const COUNTY_END: usize = 5;
const TRACT_END: usize = 11;

/// A validated 15-digit census block identifier.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellId(String);

/// The fixed-offset components of a [`CellId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellIdComponents {
    pub state_fips: String,
    pub county_fips: String,
    pub tract: String,
    pub block: String,
    pub full_geoid: String,
}

/// Whether `input` is exactly fifteen ASCII digits.
pub fn is_cell_id(input: &str) -> bool {
    input.len() == CELL_ID_LEN && input.bytes().all(|b| b.is_ascii_digit())
}

impl CellId {
    /// Validate a candidate cell id.
    ///
    /// Malformed geocoder output is an expected case, so this returns `None`
    /// rather than an error.
    pub fn create(input: &str) -> Option<Self> {
        is_cell_id(input).then(|| Self(input.to_string()))
    }

    /// Split into state, county, tract and block components.
    pub fn parse(&self) -> CellIdComponents {
        let id = self.0.as_str();
        CellIdComponents {
            state_fips: id[..STATE_END].to_string(),
            county_fips: id[STATE_END..COUNTY_END].to_string(),
            tract: id[COUNTY_END..TRACT_END].to_string(),
            block: id[TRACT_END..].to_string(),
            full_geoid: id.to_string(),
        }
    }

    /// The 5-digit state+county prefix, the only part safe to log.
    pub fn county_prefix(&self) -> &str {
        &self.0[..COUNTY_END]
    }

    /// The full identifier. Callers are responsible for not logging it.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The decimal value as a field element, for use as a Merkle leaf.
    pub fn to_field(&self) -> FieldElement {
        // fifteen decimal digits always fit in a u64
        let value = self.0.bytes().fold(0u64, |acc, b| acc * 10 + u64::from(b - b'0'));
        FieldElement::from_u64(value)
    }
}

impl fmt::Debug for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellId({}…)", self.county_prefix())
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}…", self.county_prefix())
    }
}

impl TryFrom<String> for CellId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_cell_id(&value) {
            Ok(Self(value))
        } else {
            Err("cell id must be exactly 15 digits".to_string())
        }
    }
}

impl From<CellId> for String {
    fn from(value: CellId) -> Self {
        value.0
    }
}
