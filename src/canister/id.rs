use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const CRC_LENGTH_IN_BYTES: usize = 4;
const MAX_LENGTH_IN_BYTES: usize = 29;
const GROUP_LEN: usize = 5;

/// Reasons a textual canister identifier is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanisterIdError {
    #[error("identifier is empty")]
    Empty,
    #[error("not valid base32: {0}")]
    InvalidBase32(String),
    #[error("decoded length {0} is too short for a checksum")]
    TooShort(usize),
    #[error("decoded length {0} exceeds {MAX_LENGTH_IN_BYTES} bytes")]
    TooLong(usize),
    #[error("checksum mismatch: expected {expected:08x}, found {found:08x}")]
    ChecksumMismatch { expected: u32, found: u32 },
    #[error("not in canonical form, expected {0:?}")]
    NotCanonical(String),
}

/// A validated canister identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanisterId {
    bytes: Box<[u8]>,
}

impl CanisterId {
    /// Parse the textual form, checking checksum and canonical grouping.
    pub fn from_text(text: &str) -> Result<Self, CanisterIdError> {
        if text.is_empty() {
            return Err(CanisterIdError::Empty);
        }

        let compact: String = text
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        let decoded = BASE32_NOPAD
            .decode(compact.as_bytes())
            .map_err(|e| CanisterIdError::InvalidBase32(e.to_string()))?;

        if decoded.len() < CRC_LENGTH_IN_BYTES {
            return Err(CanisterIdError::TooShort(decoded.len()));
        }
        let (crc, raw) = decoded.split_at(CRC_LENGTH_IN_BYTES);
        if raw.len() > MAX_LENGTH_IN_BYTES {
            return Err(CanisterIdError::TooLong(raw.len()));
        }

        let found = u32::from_be_bytes([crc[0], crc[1], crc[2], crc[3]]);
        let expected = crc32fast::hash(raw);
        if found != expected {
            return Err(CanisterIdError::ChecksumMismatch { expected, found });
        }

        let id = Self {
            bytes: raw.to_vec().into_boxed_slice(),
        };
        let canonical = id.to_text();
        if canonical != text {
            return Err(CanisterIdError::NotCanonical(canonical));
        }
        Ok(id)
    }

    /// Build from raw id bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CanisterIdError> {
        if bytes.len() > MAX_LENGTH_IN_BYTES {
            return Err(CanisterIdError::TooLong(bytes.len()));
        }
        Ok(Self {
            bytes: bytes.to_vec().into_boxed_slice(),
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Canonical textual form.
    pub fn to_text(&self) -> String {
        let mut buf = Vec::with_capacity(CRC_LENGTH_IN_BYTES + self.bytes.len());
        buf.extend_from_slice(&crc32fast::hash(&self.bytes).to_be_bytes());
        buf.extend_from_slice(&self.bytes);

        let encoded = BASE32_NOPAD.encode(&buf).to_ascii_lowercase();
        let mut text = String::with_capacity(encoded.len() + encoded.len() / GROUP_LEN);
        for (i, c) in encoded.chars().enumerate() {
            if i > 0 && i % GROUP_LEN == 0 {
                text.push('-');
            }
            text.push(c);
        }
        text
    }
}

impl FromStr for CanisterId {
    type Err = CanisterIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s)
    }
}

impl fmt::Display for CanisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for CanisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CanisterId({})", self.to_text())
    }
}

impl Serialize for CanisterId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for CanisterId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        CanisterId::from_text(&text).map_err(serde::de::Error::custom)
    }
}
