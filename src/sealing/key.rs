//! Pre-shared symmetric keys for sealed tokens
//!
//! # Format
//!
//! A key file holds base64url text (no padding) of a CBOR document, usually
//! prefixed with the self-describe tag 55799, containing a COSE_Key map:
//!
//! ```text
//! { 1: 4 (kty Symmetric), 2: kid, 3: alg, -1: k }
//! ```
//!
//! - alg 3 (`A256GCM`): 32-byte AES key, tokens are COSE_Encrypt0
//! - alg 4 (`HMAC 256/64`): HMAC-SHA-256 key, tokens are COSE_Mac0

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_cbor::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::cose::{generate_random_bytes, strip_tag, SELF_DESCRIBE_PREFIX};
use crate::types::{ApiError, Result};

// =============================================================================
// Constants
// =============================================================================

const LABEL_KTY: i128 = 1;
const LABEL_KID: i128 = 2;
const LABEL_ALG: i128 = 3;
const LABEL_K: i128 = -1;

const KTY_SYMMETRIC: i128 = 4;

/// COSE algorithm id of AES-GCM with a 256-bit key
pub const ALG_A256GCM: i128 = 3;

/// COSE algorithm id of HMAC-SHA-256 truncated to 64 bits
pub const ALG_HMAC_256_64: i128 = 4;

/// AES-256 key length
pub const AES_KEY_LEN: usize = 32;

/// Shortest HMAC key we accept
pub const MIN_HMAC_KEY_LEN: usize = 32;

// =============================================================================
// Key
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    AesGcm,
    Hmac,
}

impl KeyKind {
    fn alg(self) -> i128 {
        match self {
            Self::AesGcm => ALG_A256GCM,
            Self::Hmac => ALG_HMAC_256_64,
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AesGcm => f.write_str("aesgcm"),
            Self::Hmac => f.write_str("hmac"),
        }
    }
}

/// Symmetric key material, wiped on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SealKey {
    #[zeroize(skip)]
    kind: KeyKind,
    kid: Vec<u8>,
    k: Vec<u8>,
}

impl fmt::Debug for SealKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealKey")
            .field("kind", &self.kind)
            .field("kid", &URL_SAFE_NO_PAD.encode(&self.kid))
            .finish_non_exhaustive()
    }
}

impl SealKey {
    /// Create a fresh random key of the given kind
    pub fn generate(kind: KeyKind, kid: &[u8]) -> Self {
        Self {
            kind,
            kid: kid.to_vec(),
            k: generate_random_bytes::<AES_KEY_LEN>().to_vec(),
        }
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn kid(&self) -> &[u8] {
        &self.kid
    }

    pub(crate) fn secret(&self) -> &[u8] {
        &self.k
    }

    /// Read a key file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ApiError::Config(format!("failed to read key file {}: {}", path.display(), e))
        })?;
        Self::from_base64(&text)
    }

    /// Parse the base64url text form
    pub fn from_base64(text: &str) -> Result<Self> {
        let data = URL_SAFE_NO_PAD
            .decode(text.trim().trim_end_matches('='))
            .map_err(|e| ApiError::Config(format!("key is not base64url: {}", e)))?;
        Self::from_cbor(&data)
    }

    pub fn from_cbor(data: &[u8]) -> Result<Self> {
        let value: Value = serde_cbor::from_slice(strip_tag(data, SELF_DESCRIBE_PREFIX))
            .map_err(|e| ApiError::Config(format!("key is not CBOR: {}", e)))?;
        let Value::Map(map) = value else {
            return Err(ApiError::Config("key is not a COSE_Key map".into()));
        };

        match map.get(&Value::Integer(LABEL_KTY)) {
            Some(Value::Integer(KTY_SYMMETRIC)) => {}
            other => {
                return Err(ApiError::Config(format!(
                    "unsupported key type {:?}",
                    other
                )))
            }
        }

        let kind = match map.get(&Value::Integer(LABEL_ALG)) {
            Some(Value::Integer(ALG_A256GCM)) => KeyKind::AesGcm,
            Some(Value::Integer(ALG_HMAC_256_64)) => KeyKind::Hmac,
            other => {
                return Err(ApiError::Config(format!(
                    "unsupported key algorithm {:?}",
                    other
                )))
            }
        };

        let kid = match map.get(&Value::Integer(LABEL_KID)) {
            Some(Value::Bytes(kid)) => kid.clone(),
            Some(Value::Text(kid)) => kid.as_bytes().to_vec(),
            _ => Vec::new(),
        };

        let k = match map.get(&Value::Integer(LABEL_K)) {
            Some(Value::Bytes(k)) => k.clone(),
            _ => return Err(ApiError::Config("key has no secret".into())),
        };

        match kind {
            KeyKind::AesGcm if k.len() != AES_KEY_LEN => Err(ApiError::Config(format!(
                "A256GCM key must be {} bytes, got {}",
                AES_KEY_LEN,
                k.len()
            ))),
            KeyKind::Hmac if k.len() < MIN_HMAC_KEY_LEN => Err(ApiError::Config(format!(
                "HMAC key must be at least {} bytes, got {}",
                MIN_HMAC_KEY_LEN,
                k.len()
            ))),
            _ => Ok(Self { kind, kid, k }),
        }
    }

    /// Tagged CBOR COSE_Key, the inverse of [`SealKey::from_cbor`]
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let map = BTreeMap::from([
            (Value::Integer(LABEL_KTY), Value::Integer(KTY_SYMMETRIC)),
            (Value::Integer(LABEL_KID), Value::Bytes(self.kid.clone())),
            (Value::Integer(LABEL_ALG), Value::Integer(self.kind.alg())),
            (Value::Integer(LABEL_K), Value::Bytes(self.k.clone())),
        ]);
        let body = serde_cbor::to_vec(&Value::Map(map))
            .map_err(|e| ApiError::Internal(format!("failed to encode key: {}", e)))?;
        let mut out = SELF_DESCRIBE_PREFIX.to_vec();
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub fn to_base64(&self) -> Result<String> {
        Ok(URL_SAFE_NO_PAD.encode(self.to_cbor()?))
    }
}
