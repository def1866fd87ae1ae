//! Message bodies: named (KV) or positional (Array) translatable units
//!
//! The variant is not stored anywhere; it is whatever the CBOR decodes to,
//! trying KV first.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::te::TEContents;
use crate::types::{ApiError, Result};

/// `mapping<string, string>`
pub type KvMessage = BTreeMap<String, String>;

/// Ordered list of strings, addressed by index
pub type ArrayMessage = Vec<String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageBody {
    Kv(KvMessage),
    Array(ArrayMessage),
}

impl MessageBody {
    /// Decode CBOR bytes, KV first, then Array
    pub fn decode(data: &[u8]) -> Result<Self> {
        if let Ok(kv) = serde_cbor::from_slice::<KvMessage>(data) {
            return Ok(Self::Kv(kv));
        }
        match serde_cbor::from_slice::<ArrayMessage>(data) {
            Ok(arr) => Ok(Self::Array(arr)),
            Err(e) => Err(ApiError::BadRequest(format!(
                "message is neither a KV nor an Array message: {}",
                e
            ))),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let data = match self {
            Self::Kv(kv) => serde_cbor::to_vec(kv),
            Self::Array(arr) => serde_cbor::to_vec(arr),
        };
        data.map_err(|e| ApiError::Internal(format!("failed to encode message: {}", e)))
    }

    /// An empty body of the same variant
    pub fn new_like(&self) -> Self {
        match self {
            Self::Kv(_) => Self::Kv(KvMessage::new()),
            Self::Array(_) => Self::Array(ArrayMessage::new()),
        }
    }

    pub fn is_kv(&self) -> bool {
        matches!(self, Self::Kv(_))
    }

    /// True when there is no non-blank text left
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Kv(kv) => kv.values().all(|v| v.trim().is_empty()),
            Self::Array(arr) => arr.iter().all(|v| v.trim().is_empty()),
        }
    }

    pub fn to_te(&self) -> TEContents {
        let mut te = TEContents::default();
        match self {
            Self::Kv(kv) => {
                for (k, v) in kv {
                    te.push(k.clone(), vec![v.clone()]);
                }
            }
            Self::Array(arr) => {
                for (i, v) in arr.iter().enumerate() {
                    te.push(i.to_string(), vec![v.clone()]);
                }
            }
        }
        te
    }

    /// Merge translated groups in. Units not named by `te` keep their value.
    pub fn from_te(&mut self, te: &TEContents) -> Result<()> {
        match self {
            Self::Kv(kv) => {
                for content in te.iter() {
                    kv.insert(content.id.clone(), content.texts.concat());
                }
            }
            Self::Array(arr) => {
                for content in te.iter() {
                    let idx: usize = content.id.parse().map_err(|_| {
                        ApiError::BadRequest(format!("invalid array index {:?}", content.id))
                    })?;
                    if idx >= arr.len() {
                        arr.resize(idx + 1, String::new());
                    }
                    arr[idx] = content.texts.concat();
                }
            }
        }
        Ok(())
    }

    /// The part of `self` that `dst` has no translation for yet.
    ///
    /// Arrays keep their positions: already translated slots become blank.
    pub fn newly_add(&self, dst: &Self) -> Result<Self> {
        match (self, dst) {
            (Self::Kv(src), Self::Kv(dst)) => Ok(Self::Kv(
                src.iter()
                    .filter(|(k, _)| dst.get(*k).map_or(true, |v| v.trim().is_empty()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )),
            (Self::Array(src), Self::Array(dst)) => Ok(Self::Array(
                src.iter()
                    .enumerate()
                    .map(|(i, v)| match dst.get(i) {
                        Some(done) if !done.trim().is_empty() => String::new(),
                        _ => v.clone(),
                    })
                    .collect(),
            )),
            _ => Err(ApiError::BadRequest(
                "translated message has a different shape than its source".into(),
            )),
        }
    }
}
