//! Opaque byte payloads that cross service boundaries untouched
//!
//! Messages and ledger payloads are CBOR blobs owned by other services. They
//! travel as a CBOR byte string on binary wires and as unpadded base64url on
//! JSON, and are never re-encoded on the way through.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::ops::Deref;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct RawBytes(pub Vec<u8>);

impl RawBytes {
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }

    /// CBOR-encode a value into an opaque payload
    pub fn from_cbor<T: Serialize>(value: &T) -> Result<Self, serde_cbor::Error> {
        serde_cbor::to_vec(value).map(Self)
    }

    /// Decode the payload as CBOR
    pub fn decode_cbor<'a, T: Deserialize<'a>>(&'a self) -> Result<T, serde_cbor::Error> {
        serde_cbor::from_slice(&self.0)
    }
}

impl Deref for RawBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for RawBytes {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl fmt::Debug for RawBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawBytes({} bytes)", self.0.len())
    }
}

impl Serialize for RawBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&URL_SAFE_NO_PAD.encode(&self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for RawBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RawVisitor;

        impl<'de> Visitor<'de> for RawVisitor {
            type Value = RawBytes;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a byte string or base64url text")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<RawBytes, E> {
                // accept padded input from lenient clients
                URL_SAFE_NO_PAD
                    .decode(v.trim_end_matches('='))
                    .map(RawBytes)
                    .map_err(E::custom)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<RawBytes, E> {
                Ok(RawBytes(v.to_vec()))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<RawBytes, E> {
                Ok(RawBytes(v))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RawBytes, A::Error> {
                let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(b) = seq.next_element::<u8>()? {
                    out.push(b);
                }
                Ok(RawBytes(out))
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_any(RawVisitor)
        } else {
            deserializer.deserialize_bytes(RawVisitor)
        }
    }
}
