//! Canonical BN254 scalar-field elements and the hex codec guarding them.
//!
//! Every value that later flows into a Poseidon2 hash, a nullifier or a
//! public input passes through [`hex_to_field`]. A value outside
//! `[0, modulus)` is rejected here instead of being silently reduced, because
//! the external proof circuit would never reduce it the same way.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

/// Width of the canonical hex form, without the `0x` prefix.
pub const FIELD_HEX_WIDTH: usize = 64;

/// Decimal form of the BN254 scalar modulus.
pub const MODULUS_DECIMAL: &str =
    "21888242871839275222246405745257275088548364400416034343698204186575808495617";

/// Errors produced by the field codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("field element input is empty")]
    EmptyInput,

    #[error("field element input contains non-hex characters")]
    InvalidHex,

    #[error("field element value is not below the BN254 scalar modulus")]
    OutOfRange,
}

/// An element of the BN254 scalar field, always in `[0, modulus)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FieldElement(Fr);

impl FieldElement {
    /// The additive identity.
    pub fn zero() -> Self {
        Self(Fr::from(0u64))
    }

    /// Lift a small integer into the field.
    pub fn from_u64(value: u64) -> Self {
        Self(Fr::from(value))
    }

    /// Parse a 32-byte big-endian value, rejecting anything at or above the modulus.
    pub fn from_be_bytes(bytes: &[u8; 32]) -> Result<Self, FieldError> {
        from_biguint(BigUint::from_bytes_be(bytes))
    }

    /// Reduce an arbitrary byte string modulo the field order.
    ///
    /// Only for digests whose bias is acceptable (action domains). Never use
    /// this for values supplied by clients.
    pub(crate) fn from_be_bytes_mod_order(bytes: &[u8]) -> Self {
        Self(Fr::from_be_bytes_mod_order(bytes))
    }

    /// Draw a uniformly distributed element by rejection sampling 254-bit candidates.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        loop {
            let mut bytes = [0u8; 32];
            rng.fill_bytes(&mut bytes);
            bytes[0] &= 0x3f;
            if let Ok(element) = Self::from_be_bytes(&bytes) {
                return element;
            }
        }
    }

    /// 32-byte big-endian encoding.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        let bytes = self.0.into_bigint().to_bytes_be();
        out[32 - bytes.len()..].copy_from_slice(&bytes);
        out
    }

    /// Canonical fixed-width form: `0x` followed by 64 lowercase hex digits.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_be_bytes()))
    }

    /// Decimal form, as used by circuit tooling and golden vectors.
    pub fn to_decimal_string(&self) -> String {
        BigUint::from(self.0.into_bigint()).to_str_radix(10)
    }

    /// Whether this is the zero element.
    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    pub(crate) fn inner(&self) -> Fr {
        self.0
    }
}

impl From<Fr> for FieldElement {
    fn from(value: Fr) -> Self {
        Self(value)
    }
}

impl From<FieldElement> for Fr {
    fn from(value: FieldElement) -> Self {
        value.0
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for FieldElement {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex_to_field(s)
    }
}

impl Serialize for FieldElement {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.to_be_bytes())
        }
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            hex_to_field(&s).map_err(D::Error::custom)
        } else {
            let bytes = Vec::<u8>::deserialize(deserializer)?;
            let bytes: [u8; 32] = bytes
                .try_into()
                .map_err(|_| D::Error::custom("expected 32 bytes"))?;
            Self::from_be_bytes(&bytes).map_err(D::Error::custom)
        }
    }
}

/// The BN254 scalar modulus as a big integer.
pub fn modulus() -> BigUint {
    BigUint::from(Fr::MODULUS)
}

/// Strip an optional `0x`/`0X` prefix.
pub fn strip_hex_prefix(input: &str) -> &str {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input)
}

/// Convert a hex string (with or without `0x`) into a canonical field element.
///
/// Leading zeros are accepted, so inputs of any width parse as long as the
/// value itself is below the modulus.
pub fn hex_to_field(input: &str) -> Result<FieldElement, FieldError> {
    let digits = strip_hex_prefix(input);
    if digits.is_empty() {
        return Err(FieldError::EmptyInput);
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(FieldError::InvalidHex);
    }
    let value = BigUint::parse_bytes(digits.as_bytes(), 16).ok_or(FieldError::InvalidHex)?;
    from_biguint(value)
}

fn from_biguint(value: BigUint) -> Result<FieldElement, FieldError> {
    if value >= modulus() {
        return Err(FieldError::OutOfRange);
    }
    Ok(FieldElement(Fr::from(value)))
}
