//! `did:key` identifiers derived from authenticator public keys.
//!
//! The COSE_Key record is decoded by [`cose`]; this module only maps the
//! decoded labels onto a multicodec-prefixed, base58btc-encoded key.

pub mod cose;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use self::cose::{CoseError, CoseKey, LABEL_ALG, LABEL_CRV, LABEL_KTY, LABEL_X, LABEL_Y};

/// Prefix shared by every `did:key` identifier (multibase `z` = base58btc).
pub const DID_KEY_PREFIX: &str = "did:key:z";

/// Multicodec tag for a compressed P-256 public key.
pub const P256_MULTICODEC: [u8; 2] = [0x80, 0x24];
/// Multicodec tag for an Ed25519 public key.
pub const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

const KTY_OKP: i64 = 1;
const KTY_EC2: i64 = 2;
const CRV_P256: i64 = 1;
const CRV_ED25519: i64 = 6;

const COORDINATE_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DidKeyError {
    #[error("public key record is not a CBOR map")]
    NotAMap,

    #[error("public key record is truncated")]
    Truncated,

    #[error("malformed public key record: {0}")]
    Malformed(CoseError),

    #[error("unsupported key type (kty {kty:?}, crv {crv:?})")]
    UnsupportedKeyType { kty: Option<i64>, crv: Option<i64> },

    #[error("public key record is missing coordinate {0}")]
    MissingCoordinate(&'static str),

    #[error("coordinate {coordinate} must be {expected} bytes, got {actual}")]
    WrongLength {
        coordinate: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("public key record is not valid base64url")]
    InvalidEncoding,
}

impl From<CoseError> for DidKeyError {
    fn from(err: CoseError) -> Self {
        match err {
            CoseError::NotAMap => DidKeyError::NotAMap,
            CoseError::Truncated => DidKeyError::Truncated,
            other => DidKeyError::Malformed(other),
        }
    }
}

/// Signature algorithm a COSE_Key declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoseAlgorithm {
    /// ECDSA with SHA-256 on P-256 (-7).
    Es256,
    /// EdDSA (-8).
    EdDsa,
    Other(i64),
}

impl CoseAlgorithm {
    pub fn from_label(value: i64) -> Self {
        match value {
            -7 => CoseAlgorithm::Es256,
            -8 => CoseAlgorithm::EdDsa,
            other => CoseAlgorithm::Other(other),
        }
    }

    pub fn label(&self) -> i64 {
        match self {
            CoseAlgorithm::Es256 => -7,
            CoseAlgorithm::EdDsa => -8,
            CoseAlgorithm::Other(v) => *v,
        }
    }
}

/// Derive a `did:key` from a CBOR COSE_Key public key record.
pub fn derive_did_key(public_key: &[u8]) -> Result<String, DidKeyError> {
    let key = CoseKey::decode(public_key)?;
    let kty = key.int(LABEL_KTY);
    let crv = key.int(LABEL_CRV);

    match (kty, crv) {
        (Some(KTY_EC2), Some(CRV_P256)) => {
            let x = coordinate(&key, LABEL_X, "x")?;
            let y = coordinate(&key, LABEL_Y, "y")?;
            let mut compressed = Vec::with_capacity(1 + COORDINATE_LEN);
            compressed.push(if y[COORDINATE_LEN - 1] % 2 == 0 { 0x02 } else { 0x03 });
            compressed.extend_from_slice(x);
            Ok(encode_did_key(P256_MULTICODEC, &compressed))
        }
        (Some(KTY_OKP), Some(CRV_ED25519)) => {
            let x = coordinate(&key, LABEL_X, "x")?;
            Ok(encode_did_key(ED25519_MULTICODEC, x))
        }
        (kty, crv) => Err(DidKeyError::UnsupportedKeyType { kty, crv }),
    }
}

/// [`derive_did_key`] over the unpadded base64url string authenticators return.
pub fn derive_did_key_from_base64url(public_key: &str) -> Result<String, DidKeyError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(public_key.trim_end_matches('='))
        .map_err(|_| DidKeyError::InvalidEncoding)?;
    derive_did_key(&bytes)
}

/// The declared `alg` of a COSE_Key, or `None` when absent.
pub fn get_cose_key_algorithm(public_key: &[u8]) -> Result<Option<CoseAlgorithm>, DidKeyError> {
    let key = CoseKey::decode(public_key)?;
    Ok(key.int(LABEL_ALG).map(CoseAlgorithm::from_label))
}

/// `did:key` for a raw Ed25519 public key.
pub fn ed25519_did_key(public_key: &[u8; 32]) -> String {
    encode_did_key(ED25519_MULTICODEC, public_key)
}

/// The multibase part of a `did:key`, used as its verification-method fragment.
pub fn did_key_fragment(did: &str) -> Option<&str> {
    did.strip_prefix("did:key:").filter(|f| f.starts_with('z'))
}

fn coordinate<'a>(
    key: &'a CoseKey,
    label: i64,
    name: &'static str,
) -> Result<&'a [u8], DidKeyError> {
    let bytes = key.bytes(label).ok_or(DidKeyError::MissingCoordinate(name))?;
    if bytes.len() != COORDINATE_LEN {
        return Err(DidKeyError::WrongLength {
            coordinate: name,
            expected: COORDINATE_LEN,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

fn encode_did_key(multicodec: [u8; 2], key: &[u8]) -> String {
    let mut prefixed = Vec::with_capacity(multicodec.len() + key.len());
    prefixed.extend_from_slice(&multicodec);
    prefixed.extend_from_slice(key);
    format!("{DID_KEY_PREFIX}{}", bs58::encode(prefixed).into_string())
}
