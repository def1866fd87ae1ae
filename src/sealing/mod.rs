//! Sealed tokens
//!
//! A sealed token is a COSE message around the packed CBOR of a value,
//! base64url encoded without padding. AEAD keys produce Encrypt0 tokens
//! (confidential), HMAC keys produce Mac0 tokens (integrity only). The
//! purpose string passed to [`Sealer::seal`] and [`Sealer::open`] is bound
//! as external data.

pub mod cose;
pub mod key;

pub use key::{KeyKind, SealKey};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{ApiError, Result};

#[derive(Debug, Clone)]
pub struct Sealer {
    key: SealKey,
}

impl Sealer {
    pub fn new(key: SealKey) -> Self {
        Self { key }
    }

    pub fn kind(&self) -> KeyKind {
        self.key.kind()
    }

    /// Seal raw bytes
    pub fn seal_bytes(&self, payload: &[u8], purpose: &str) -> Result<Vec<u8>> {
        match self.key.kind() {
            KeyKind::AesGcm => cose::encrypt0(self.key.secret(), payload, purpose.as_bytes()),
            KeyKind::Hmac => cose::mac0(self.key.secret(), payload, purpose.as_bytes()),
        }
    }

    pub fn open_bytes(&self, data: &[u8], purpose: &str) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Err(ApiError::BadRequest("empty sealed token".into()));
        }
        match self.key.kind() {
            KeyKind::AesGcm => cose::decrypt0(self.key.secret(), data, purpose.as_bytes()),
            KeyKind::Hmac => cose::verify0(self.key.secret(), data, purpose.as_bytes()),
        }
    }

    /// Seal a value into its text form. Struct fields are keyed by index.
    pub fn seal<T: Serialize>(&self, value: &T, purpose: &str) -> Result<String> {
        let payload = serde_cbor::ser::to_vec_packed(value)
            .map_err(|e| ApiError::Internal(format!("failed to encode sealed value: {}", e)))?;
        Ok(URL_SAFE_NO_PAD.encode(self.seal_bytes(&payload, purpose)?))
    }

    /// Open a token produced by [`Sealer::seal`] with the same purpose
    pub fn open<T: DeserializeOwned>(&self, token: &str, purpose: &str) -> Result<T> {
        let token = token.trim().trim_end_matches('=');
        if token.is_empty() {
            return Err(ApiError::BadRequest("empty sealed token".into()));
        }
        let data = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| ApiError::BadRequest("sealed token is not base64url".into()))?;
        let payload = self.open_bytes(&data, purpose)?;
        serde_cbor::from_slice(&payload)
            .map_err(|e| ApiError::BadRequest(format!("unexpected sealed payload: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ticket {
        owner: String,
        seats: u32,
    }

    #[derive(Debug, Deserialize)]
    struct Other {
        #[allow(dead_code)]
        name: Vec<u8>,
        #[allow(dead_code)]
        when: String,
    }

    fn ticket() -> Ticket {
        Ticket {
            owner: "alice".into(),
            seats: 2,
        }
    }

    #[test]
    fn test_seal_open_with_both_key_kinds() {
        for kind in [KeyKind::AesGcm, KeyKind::Hmac] {
            let sealer = Sealer::new(SealKey::generate(kind, b"t"));
            let token = sealer.seal(&ticket(), "Ticket").unwrap();
            assert!(!token.contains('='));
            let back: Ticket = sealer.open(&token, "Ticket").unwrap();
            assert_eq!(back, ticket());
        }
    }

    #[test]
    fn test_aead_hides_payload() {
        let sealer = Sealer::new(SealKey::generate(KeyKind::AesGcm, b"t"));
        let token = sealer.seal(&ticket(), "Ticket").unwrap();
        let raw = URL_SAFE_NO_PAD.decode(&token).unwrap();
        assert!(!raw.windows(5).any(|w| w == b"alice"));
    }

    #[test]
    fn test_purpose_binding() {
        let sealer = Sealer::new(SealKey::generate(KeyKind::AesGcm, b"t"));
        let token = sealer.seal(&ticket(), "PaymentCode").unwrap();
        let err = sealer.open::<Ticket>(&token, "OtherPurpose").unwrap_err();
        assert_eq!(err.status_code(), hyper::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_empty_and_wrong_shape() {
        let sealer = Sealer::new(SealKey::generate(KeyKind::AesGcm, b"t"));
        assert!(sealer.open::<Ticket>("", "Ticket").is_err());
        assert!(sealer.open::<Ticket>("!!!", "Ticket").is_err());

        let token = sealer.seal(&ticket(), "Ticket").unwrap();
        assert!(matches!(
            sealer.open::<Other>(&token, "Ticket"),
            Err(ApiError::BadRequest(_))
        ));
    }
}
