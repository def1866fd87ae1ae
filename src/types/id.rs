//! 12-byte sortable identifiers
//!
//! Textual form is 20 characters of lowercase base32hex without padding, so
//! string order matches byte order. Serialized as a string to human-readable
//! formats (JSON, query strings) and as a byte string to CBOR.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::error::ApiError;

/// Raw length in bytes
pub const ID_LEN: usize = 12;

/// Encoded length in characters
pub const ID_STR_LEN: usize = 20;

const ALPHABET: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

/// Sortable identifier shared by every backend
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id([u8; ID_LEN]);

impl Id {
    /// The all-zero id, used for "absent" (anonymous user, no app)
    pub const ZERO: Id = Id([0u8; ID_LEN]);

    pub const fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ID_LEN]
    }

    fn from_slice(bytes: &[u8]) -> Result<Self, ApiError> {
        let raw: [u8; ID_LEN] = bytes.try_into().map_err(|_| {
            ApiError::BadRequest(format!("invalid id length: {} bytes", bytes.len()))
        })?;
        Ok(Self(raw))
    }

    fn encode(&self) -> String {
        let mut out = String::with_capacity(ID_STR_LEN);
        let mut buffer: u32 = 0;
        let mut bits = 0u32;
        for byte in self.0 {
            buffer = (buffer << 8) | byte as u32;
            bits += 8;
            while bits >= 5 {
                bits -= 5;
                out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
            }
        }
        if bits > 0 {
            out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
        }
        out
    }

    fn decode(s: &str) -> Result<Self, ApiError> {
        if s.len() != ID_STR_LEN {
            return Err(ApiError::BadRequest(format!("invalid id: {:?}", s)));
        }

        let mut raw = [0u8; ID_LEN];
        let mut buffer: u32 = 0;
        let mut bits = 0u32;
        let mut pos = 0usize;
        for c in s.bytes() {
            let v = match c {
                b'0'..=b'9' => c - b'0',
                b'a'..=b'v' => c - b'a' + 10,
                b'A'..=b'V' => c - b'A' + 10,
                _ => return Err(ApiError::BadRequest(format!("invalid id: {:?}", s))),
            };
            buffer = (buffer << 5) | v as u32;
            bits += 5;
            if bits >= 8 {
                bits -= 8;
                if pos < ID_LEN {
                    raw[pos] = (buffer >> bits) as u8;
                }
                pos += 1;
            }
        }
        // 20 chars carry 100 bits; the 4 trailing bits must be zero
        if buffer & ((1 << bits) - 1) != 0 {
            return Err(ApiError::BadRequest(format!("invalid id: {:?}", s)));
        }
        Ok(Self(raw))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.encode())
    }
}

impl FromStr for Id {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.encode())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl<'de> Visitor<'de> for IdVisitor {
            type Value = Id;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a 12-byte id or its 20-character string form")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Id, E> {
                Id::decode(v).map_err(E::custom)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Id, E> {
                Id::from_slice(v).map_err(E::custom)
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Id, E> {
                Id::from_slice(&v).map_err(E::custom)
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(IdVisitor)
        } else {
            deserializer.deserialize_bytes(IdVisitor)
        }
    }
}
