//! COSE_Encrypt0 and COSE_Mac0 with empty protected headers
//!
//! # Layout
//!
//! - Encrypt0 (tag 16): `[h'', {5: iv}, ciphertext]`, AES-256-GCM over the
//!   payload with `["Encrypt0", h'', external_aad]` as associated data
//! - Mac0 (tag 17): `[h'', {}, payload, tag]`, HMAC-SHA-256 over
//!   `["MAC0", h'', external_aad, payload]` truncated to 8 bytes
//!
//! The external data is never transmitted. Opening with a different purpose
//! string fails authentication.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use serde_bytes::{ByteBuf, Bytes};
use sha2::Sha256;
use std::collections::BTreeMap;

use crate::types::{ApiError, Result};

// =============================================================================
// Constants
// =============================================================================

/// CBOR tag 55799, "self-describe CBOR"
pub const SELF_DESCRIBE_PREFIX: &[u8] = &[0xd9, 0xd9, 0xf7];

/// CBOR tag 16, COSE_Encrypt0
pub const ENCRYPT0_PREFIX: &[u8] = &[0xd0];

/// CBOR tag 17, COSE_Mac0
pub const MAC0_PREFIX: &[u8] = &[0xd1];

/// Unprotected header label of the IV
const HEADER_IV: i64 = 5;

/// AES-GCM nonce length (12 bytes)
pub const IV_LEN: usize = 12;

/// Truncated HMAC tag length (8 bytes)
pub const MAC_TAG_LEN: usize = 8;

type HmacSha256 = Hmac<Sha256>;

type Headers = BTreeMap<i64, ByteBuf>;

// =============================================================================
// Helpers
// =============================================================================

/// Generate cryptographically secure random bytes.
pub fn generate_random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Drop a leading tag encoding when present
pub(crate) fn strip_tag<'a>(data: &'a [u8], tag: &[u8]) -> &'a [u8] {
    data.strip_prefix(tag).unwrap_or(data)
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_cbor::to_vec(value).map_err(|e| ApiError::Internal(format!("COSE encode: {}", e)))
}

fn invalid() -> ApiError {
    ApiError::BadRequest("invalid sealed token".into())
}

// =============================================================================
// Encrypt0
// =============================================================================

fn enc_structure(protected: &[u8], external_aad: &[u8]) -> Result<Vec<u8>> {
    encode(&("Encrypt0", Bytes::new(protected), Bytes::new(external_aad)))
}

/// Encrypt `plaintext` into a tagged COSE_Encrypt0 message
pub fn encrypt0(key: &[u8], plaintext: &[u8], external_aad: &[u8]) -> Result<Vec<u8>> {
    let protected: &[u8] = &[];
    let iv: [u8; IV_LEN] = generate_random_bytes();
    let aad = enc_structure(protected, external_aad)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|e| ApiError::Internal(format!("Encryption failed: {e}")))?;

    let unprotected: Headers = BTreeMap::from([(HEADER_IV, ByteBuf::from(iv.to_vec()))]);
    let body = encode(&(
        Bytes::new(protected),
        unprotected,
        ByteBuf::from(ciphertext),
    ))?;

    let mut out = ENCRYPT0_PREFIX.to_vec();
    out.extend_from_slice(&body);
    Ok(out)
}

/// Authenticate and decrypt a COSE_Encrypt0 message
pub fn decrypt0(key: &[u8], data: &[u8], external_aad: &[u8]) -> Result<Vec<u8>> {
    let data = strip_tag(strip_tag(data, SELF_DESCRIBE_PREFIX), ENCRYPT0_PREFIX);
    let (protected, unprotected, ciphertext): (ByteBuf, Headers, ByteBuf) =
        serde_cbor::from_slice(data).map_err(|_| invalid())?;

    let iv = unprotected
        .get(&HEADER_IV)
        .filter(|iv| iv.len() == IV_LEN)
        .ok_or_else(invalid)?;
    let aad = enc_structure(&protected, external_aad)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(
            Nonce::from_slice(iv),
            Payload {
                msg: &ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| invalid())
}

// =============================================================================
// Mac0
// =============================================================================

fn mac(key: &[u8], protected: &[u8], external_aad: &[u8], payload: &[u8]) -> Result<HmacSha256> {
    let structure = encode(&(
        "MAC0",
        Bytes::new(protected),
        Bytes::new(external_aad),
        Bytes::new(payload),
    ))?;
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| ApiError::Internal(format!("HMAC key: {e}")))?;
    mac.update(&structure);
    Ok(mac)
}

/// Wrap `payload` in a tagged COSE_Mac0 message
pub fn mac0(key: &[u8], payload: &[u8], external_aad: &[u8]) -> Result<Vec<u8>> {
    let protected: &[u8] = &[];
    let tag = mac(key, protected, external_aad, payload)?.finalize().into_bytes();

    let body = encode(&(
        Bytes::new(protected),
        Headers::new(),
        Bytes::new(payload),
        Bytes::new(&tag[..MAC_TAG_LEN]),
    ))?;

    let mut out = MAC0_PREFIX.to_vec();
    out.extend_from_slice(&body);
    Ok(out)
}

/// Verify a COSE_Mac0 message and return its payload
pub fn verify0(key: &[u8], data: &[u8], external_aad: &[u8]) -> Result<Vec<u8>> {
    let data = strip_tag(strip_tag(data, SELF_DESCRIBE_PREFIX), MAC0_PREFIX);
    let (protected, _unprotected, payload, tag): (ByteBuf, Headers, ByteBuf, ByteBuf) =
        serde_cbor::from_slice(data).map_err(|_| invalid())?;
    if tag.len() != MAC_TAG_LEN {
        return Err(invalid());
    }

    mac(key, &protected, external_aad, &payload)?
        .verify_truncated_left(&tag)
        .map_err(|_| invalid())?;
    Ok(payload.into_vec())
}

// =============================================================================
// Tests
// =============================================================================
