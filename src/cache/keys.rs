//! Redis key definitions

use std::fmt;

use crate::types::Id;

/// Single-flight key of one translation: message, target language, version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageLockKey {
    pub id: Id,
    pub language: String,
    pub version: u16,
}

impl MessageLockKey {
    pub fn new(id: Id, language: &str, version: u16) -> Self {
        Self {
            id,
            language: language.to_string(),
            version,
        }
    }

    /// Storage key under the configured prefix
    /// Format: <prefix>UM:<id>:<language>:<version>
    pub fn to_storage_key(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self)
    }
}

impl fmt::Display for MessageLockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UM:{}:{}:{}", self.id, self.language, self.version)
    }
}
