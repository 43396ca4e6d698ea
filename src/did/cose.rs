//! Minimal COSE_Key decoder.
//!
//! Walks the CBOR bytes as a state machine over type-tagged items. Only the
//! subset a WebAuthn public key uses is accepted: one definite-length map
//! whose keys are integers and whose values are integers, byte strings or
//! text strings. Everything else is a structural error.

use std::collections::BTreeMap;

/// COSE_Key labels.
pub const LABEL_KTY: i64 = 1;
pub const LABEL_ALG: i64 = 3;
pub const LABEL_CRV: i64 = -1;
pub const LABEL_X: i64 = -2;
pub const LABEL_Y: i64 = -3;

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_MAP: u8 = 5;

/// Structural decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoseError {
    #[error("public key record is not a CBOR map")]
    NotAMap,

    #[error("public key record is truncated")]
    Truncated,

    #[error("unsupported CBOR item (major type {major}) in public key record")]
    UnsupportedItem { major: u8 },

    #[error("indefinite-length CBOR items are not supported")]
    IndefiniteLength,

    #[error("map key must be an integer label")]
    NonIntegerLabel,

    #[error("label {0} appears more than once")]
    DuplicateLabel(i64),

    #[error("integer does not fit in 64 bits")]
    IntegerOverflow,

    #[error("{0} trailing bytes after public key record")]
    TrailingBytes(usize),
}

/// A decoded map value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoseValue {
    Int(i64),
    Bytes(Vec<u8>),
    Text(String),
}

/// A decoded COSE_Key: integer labels to values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoseKey {
    entries: BTreeMap<i64, CoseValue>,
}

impl CoseKey {
    /// Decode a COSE_Key from CBOR bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoseError> {
        Decoder::new(bytes).run()
    }

    /// Integer value under `label`, if present and an integer.
    pub fn int(&self, label: i64) -> Option<i64> {
        match self.entries.get(&label) {
            Some(CoseValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Byte-string value under `label`, if present and a byte string.
    pub fn bytes(&self, label: i64) -> Option<&[u8]> {
        match self.entries.get(&label) {
            Some(CoseValue::Bytes(v)) => Some(v),
            _ => None,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

enum State {
    MapHeader,
    Key { remaining: u64 },
    Value { label: i64, remaining: u64 },
    Done,
}

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    key: CoseKey,
}

impl<'a> Decoder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            key: CoseKey::default(),
        }
    }

    fn run(mut self) -> Result<CoseKey, CoseError> {
        let mut state = State::MapHeader;
        loop {
            state = match state {
                State::MapHeader => {
                    let (major, len) = self.header().map_err(|e| match e {
                        CoseError::Truncated if self.bytes.is_empty() => CoseError::NotAMap,
                        other => other,
                    })?;
                    if major != MAJOR_MAP {
                        return Err(CoseError::NotAMap);
                    }
                    State::Key { remaining: len }
                }
                State::Key { remaining: 0 } => State::Done,
                State::Key { remaining } => {
                    let label = match self.header()? {
                        (MAJOR_UNSIGNED, arg) => unsigned_to_i64(arg)?,
                        (MAJOR_NEGATIVE, arg) => negative_to_i64(arg)?,
                        _ => return Err(CoseError::NonIntegerLabel),
                    };
                    if self.key.entries.contains_key(&label) {
                        return Err(CoseError::DuplicateLabel(label));
                    }
                    State::Value { label, remaining }
                }
                State::Value { label, remaining } => {
                    let value = match self.header()? {
                        (MAJOR_UNSIGNED, arg) => CoseValue::Int(unsigned_to_i64(arg)?),
                        (MAJOR_NEGATIVE, arg) => CoseValue::Int(negative_to_i64(arg)?),
                        (MAJOR_BYTES, len) => CoseValue::Bytes(self.take(len)?.to_vec()),
                        (MAJOR_TEXT, len) => {
                            let raw = self.take(len)?;
                            let text = std::str::from_utf8(raw)
                                .map_err(|_| CoseError::UnsupportedItem { major: MAJOR_TEXT })?;
                            CoseValue::Text(text.to_string())
                        }
                        (major, _) => return Err(CoseError::UnsupportedItem { major }),
                    };
                    self.key.entries.insert(label, value);
                    State::Key {
                        remaining: remaining - 1,
                    }
                }
                State::Done => {
                    let trailing = self.bytes.len() - self.pos;
                    if trailing != 0 {
                        return Err(CoseError::TrailingBytes(trailing));
                    }
                    return Ok(self.key);
                }
            };
        }
    }

    /// Read an item header: major type and its argument.
    fn header(&mut self) -> Result<(u8, u64), CoseError> {
        let initial = self.take_byte()?;
        let major = initial >> 5;
        let info = initial & 0x1f;
        let arg = match info {
            0..=23 => u64::from(info),
            24 => u64::from(self.take_byte()?),
            25 => self.take_be(2)?,
            26 => self.take_be(4)?,
            27 => self.take_be(8)?,
            31 => return Err(CoseError::IndefiniteLength),
            _ => return Err(CoseError::UnsupportedItem { major }),
        };
        Ok((major, arg))
    }

    fn take_byte(&mut self) -> Result<u8, CoseError> {
        let byte = *self.bytes.get(self.pos).ok_or(CoseError::Truncated)?;
        self.pos += 1;
        Ok(byte)
    }

    fn take_be(&mut self, width: usize) -> Result<u64, CoseError> {
        let raw = self.take(width as u64)?;
        Ok(raw.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    fn take(&mut self, len: u64) -> Result<&'a [u8], CoseError> {
        let len = usize::try_from(len).map_err(|_| CoseError::Truncated)?;
        let end = self.pos.checked_add(len).ok_or(CoseError::Truncated)?;
        let slice = self.bytes.get(self.pos..end).ok_or(CoseError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }
}

fn unsigned_to_i64(arg: u64) -> Result<i64, CoseError> {
    i64::try_from(arg).map_err(|_| CoseError::IntegerOverflow)
}

fn negative_to_i64(arg: u64) -> Result<i64, CoseError> {
    // CBOR negative integers encode -1 - arg
    let magnitude = i64::try_from(arg).map_err(|_| CoseError::IntegerOverflow)?;
    Ok(-1 - magnitude)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encode a COSE_Key map for tests.
    pub(crate) fn encode_map(entries: &[(i64, CoseValue)]) -> Vec<u8> {
        let mut out = Vec::new();
        push_header(&mut out, MAJOR_MAP, entries.len() as u64);
        for (label, value) in entries {
            push_int(&mut out, *label);
            match value {
                CoseValue::Int(v) => push_int(&mut out, *v),
                CoseValue::Bytes(b) => {
                    push_header(&mut out, MAJOR_BYTES, b.len() as u64);
                    out.extend_from_slice(b);
                }
                CoseValue::Text(t) => {
                    push_header(&mut out, MAJOR_TEXT, t.len() as u64);
                    out.extend_from_slice(t.as_bytes());
                }
            }
        }
        out
    }

    fn push_int(out: &mut Vec<u8>, v: i64) {
        if v >= 0 {
            push_header(out, MAJOR_UNSIGNED, v as u64);
        } else {
            push_header(out, MAJOR_NEGATIVE, (-1 - v) as u64);
        }
    }

    fn push_header(out: &mut Vec<u8>, major: u8, arg: u64) {
        let m = major << 5;
        if arg < 24 {
            out.push(m | arg as u8);
        } else if arg <= 0xff {
            out.extend_from_slice(&[m | 24, arg as u8]);
        } else if arg <= 0xffff {
            out.push(m | 25);
            out.extend_from_slice(&(arg as u16).to_be_bytes());
        } else {
            out.push(m | 26);
            out.extend_from_slice(&(arg as u32).to_be_bytes());
        }
    }

    #[test]
    fn test_decodes_ec2_key() {
        let bytes = encode_map(&[
            (LABEL_KTY, CoseValue::Int(2)),
            (LABEL_ALG, CoseValue::Int(-7)),
            (LABEL_CRV, CoseValue::Int(1)),
            (LABEL_X, CoseValue::Bytes(vec![0xaa; 32])),
            (LABEL_Y, CoseValue::Bytes(vec![0xbb; 32])),
        ]);
        let key = CoseKey::decode(&bytes).unwrap();
        assert_eq!(key.len(), 5);
        assert_eq!(key.int(LABEL_KTY), Some(2));
        assert_eq!(key.int(LABEL_ALG), Some(-7));
        assert_eq!(key.int(LABEL_CRV), Some(1));
        assert_eq!(key.bytes(LABEL_X), Some(&[0xaa; 32][..]));
        assert_eq!(key.bytes(LABEL_Y), Some(&[0xbb; 32][..]));
    }

    #[test]
    fn test_known_webauthn_prefix() {
        // a5 01 02 03 26 20 01 21 58 20 ...
        let mut bytes = vec![0xa5, 0x01, 0x02, 0x03, 0x26, 0x20, 0x01, 0x21, 0x58, 0x20];
        bytes.extend_from_slice(&[1u8; 32]);
        bytes.extend_from_slice(&[0x22, 0x58, 0x20]);
        bytes.extend_from_slice(&[2u8; 32]);
        let key = CoseKey::decode(&bytes).unwrap();
        assert_eq!(key.int(LABEL_ALG), Some(-7));
        assert_eq!(key.bytes(LABEL_Y).map(<[u8]>::len), Some(32));
    }

    #[test]
    fn test_not_a_map() {
        assert_eq!(CoseKey::decode(&[]), Err(CoseError::NotAMap));
        assert_eq!(CoseKey::decode(&[0x82, 0x01, 0x02]), Err(CoseError::NotAMap));
        assert_eq!(CoseKey::decode(&[0x01]), Err(CoseError::NotAMap));
    }

    #[test]
    fn test_truncated() {
        let bytes = encode_map(&[(LABEL_X, CoseValue::Bytes(vec![0u8; 32]))]);
        assert_eq!(CoseKey::decode(&bytes[..bytes.len() - 1]), Err(CoseError::Truncated));
        assert_eq!(CoseKey::decode(&[0xa2, 0x01, 0x02]), Err(CoseError::Truncated));
        assert_eq!(CoseKey::decode(&[0xb8]), Err(CoseError::Truncated));
    }

    #[test]
    fn test_rejects_structural_oddities() {
        assert_eq!(CoseKey::decode(&[0xbf]), Err(CoseError::IndefiniteLength));
        assert_eq!(
            CoseKey::decode(&[0xa1, 0x61, 0x61, 0x01]),
            Err(CoseError::NonIntegerLabel)
        );
        assert_eq!(
            CoseKey::decode(&[0xa2, 0x01, 0x01, 0x01, 0x02]),
            Err(CoseError::DuplicateLabel(1))
        );
        assert_eq!(
            CoseKey::decode(&[0xa1, 0x01, 0xa0]),
            Err(CoseError::UnsupportedItem { major: MAJOR_MAP })
        );
        assert_eq!(CoseKey::decode(&[0xa0, 0x00]), Err(CoseError::TrailingBytes(1)));
    }
}
